// ============================
// basecamp-backend-lib/src/audit.rs
// ============================
/** Append-only security event log.
Request handlers enqueue events without waiting; a single writer task keeps
the newest events in memory and persists them through an [`AuditSink`]. A slow
or failing sink never stalls or fails a request: overflow and write errors are
reported through `tracing` and otherwise ignored. */
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::{
    collections::VecDeque,
    fmt,
    net::IpAddr,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::{
    fs as tokio_fs,
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::client::ClientInfo;
use crate::error::AppError;
use crate::metrics::{AUDIT_DROPPED, AUDIT_WRITE_FAILED};

/// Default number of events retained by the log
pub const DEFAULT_AUDIT_CAPACITY: usize = 1000;

/// Events buffered between request handlers and the writer task
const CHANNEL_CAPACITY: usize = 1024;

/// Security-relevant actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityEventType {
    BlockedIpAccess,
    BlockedLoginAttempt,
    AdminAreaAccess,
    UnauthorizedAdminAccess,
    InsufficientPrivileges,
    SuccessfulLogin,
    FailedLogin,
    IpBlocked,
    LoginRateLimited,
    Logout,
}

impl SecurityEventType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BlockedIpAccess => "blocked_ip_access",
            Self::BlockedLoginAttempt => "blocked_login_attempt",
            Self::AdminAreaAccess => "admin_area_access",
            Self::UnauthorizedAdminAccess => "unauthorized_admin_access",
            Self::InsufficientPrivileges => "insufficient_privileges",
            Self::SuccessfulLogin => "successful_login",
            Self::FailedLogin => "failed_login",
            Self::IpBlocked => "ip_blocked",
            Self::LoginRateLimited => "login_rate_limited",
            Self::Logout => "logout",
        }
    }
}

impl fmt::Display for SecurityEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One audit record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SecurityEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub event_type: SecurityEventType,
    pub details: String,
    pub ip_address: IpAddr,
    pub user_agent: String,
}

impl SecurityEvent {
    pub fn new(event_type: SecurityEventType, details: impl Into<String>, client: &ClientInfo) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event_type,
            details: details.into(),
            ip_address: client.ip,
            user_agent: client.user_agent.clone(),
        }
    }
}

/// Destination for the retained events
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Replace the persisted log with `events` (oldest first)
    async fn persist(&self, events: &[SecurityEvent]) -> Result<(), AppError>;

    /// Events persisted by a previous run
    async fn load(&self) -> Result<Vec<SecurityEvent>, AppError> {
        Ok(Vec::new())
    }
}

/// Sink writing a pretty-printed JSON array to a file
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl AuditSink for JsonFileSink {
    async fn persist(&self, events: &[SecurityEvent]) -> Result<(), AppError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio_fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_vec_pretty(events)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio_fs::write(&tmp, json).await?;
        tokio_fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    async fn load(&self) -> Result<Vec<SecurityEvent>, AppError> {
        if !tokio_fs::try_exists(&self.path).await? {
            return Ok(Vec::new());
        }
        let content = tokio_fs::read(&self.path).await?;
        Ok(serde_json::from_slice(&content)?)
    }
}

/// Sink keeping the persisted events in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<SecurityEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the last persisted state
    pub fn snapshot(&self) -> Vec<SecurityEvent> {
        self.events.lock().clone()
    }

    pub fn count(&self, event_type: SecurityEventType) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }
}

#[async_trait]
impl AuditSink for MemorySink {
    async fn persist(&self, events: &[SecurityEvent]) -> Result<(), AppError> {
        *self.events.lock() = events.to_vec();
        Ok(())
    }
}

enum AuditCommand {
    Record(SecurityEvent),
    Flush(oneshot::Sender<()>),
}

/// Handle used to append to the security log
#[derive(Debug, Clone)]
pub struct AuditLog {
    tx: mpsc::Sender<AuditCommand>,
}

impl AuditLog {
    /// Start the writer task. It runs until every `AuditLog` clone is dropped.
    pub fn spawn(sink: Arc<dyn AuditSink>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let writer = AuditWriter {
            sink,
            capacity: capacity.max(1),
            events: VecDeque::new(),
        };
        let handle = tokio::spawn(writer.run(rx));
        (Self { tx }, handle)
    }

    /// Append an event. Never waits on the sink.
    pub fn record(&self, event_type: SecurityEventType, details: impl Into<String>, client: &ClientInfo) {
        let event = SecurityEvent::new(event_type, details, client);
        info!(
            target: "security",
            event_type = %event.event_type,
            ip = %event.ip_address,
            user_agent = %event.user_agent,
            "{}",
            event.details
        );

        if let Err(err) = self.tx.try_send(AuditCommand::Record(event)) {
            counter!(AUDIT_DROPPED).increment(1);
            let reason = match err {
                mpsc::error::TrySendError::Full(_) => "queue full",
                mpsc::error::TrySendError::Closed(_) => "writer stopped",
            };
            warn!(target: "security", event_type = %event_type, reason, "audit event not persisted");
        }
    }

    /// Wait until everything recorded so far has been handed to the sink
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(AuditCommand::Flush(ack_tx)).await.is_ok() {
            let _ = ack_rx.await;
        }
    }
}

struct AuditWriter {
    sink: Arc<dyn AuditSink>,
    capacity: usize,
    events: VecDeque<SecurityEvent>,
}

impl AuditWriter {
    async fn run(mut self, mut rx: mpsc::Receiver<AuditCommand>) {
        match self.sink.load().await {
            Ok(previous) => {
                for event in previous {
                    self.push(event);
                }
            }
            Err(e) => warn!(target: "security", error = %e, "could not load previous audit log"),
        }

        while let Some(command) = rx.recv().await {
            let mut acks = Vec::new();
            let mut dirty = self.apply(command, &mut acks);

            // Batch whatever else is already queued into one write.
            while let Ok(command) = rx.try_recv() {
                dirty |= self.apply(command, &mut acks);
            }

            if dirty {
                self.persist().await;
            }
            for ack in acks {
                let _ = ack.send(());
            }
        }
    }

    fn apply(&mut self, command: AuditCommand, acks: &mut Vec<oneshot::Sender<()>>) -> bool {
        match command {
            AuditCommand::Record(event) => {
                self.push(event);
                true
            }
            AuditCommand::Flush(ack) => {
                acks.push(ack);
                false
            }
        }
    }

    fn push(&mut self, event: SecurityEvent) {
        self.events.push_back(event);
        while self.events.len() > self.capacity {
            self.events.pop_front();
        }
    }

    async fn persist(&mut self) {
        let events = self.events.make_contiguous();
        if let Err(e) = self.sink.persist(events).await {
            counter!(AUDIT_WRITE_FAILED).increment(1);
            error!(target: "security", error = %e, "failed to write audit log");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use tempfile::tempdir;

    fn client() -> ClientInfo {
        ClientInfo::new(IpAddr::V4(Ipv4Addr::new(1, 2, 3, 4)), "test-agent")
    }

    struct FailingSink;

    #[async_trait]
    impl AuditSink for FailingSink {
        async fn persist(&self, _events: &[SecurityEvent]) -> Result<(), AppError> {
            Err(AppError::Internal("disk full".to_string()))
        }
    }

    #[tokio::test]
    async fn test_events_reach_the_sink() {
        let sink = Arc::new(MemorySink::new());
        let (audit, _writer) = AuditLog::spawn(sink.clone(), DEFAULT_AUDIT_CAPACITY);

        audit.record(SecurityEventType::FailedLogin, "bad password for admin", &client());
        audit.record(SecurityEventType::IpBlocked, "1.2.3.4 blocked", &client());
        audit.flush().await;

        let events = sink.snapshot();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, SecurityEventType::FailedLogin);
        assert_eq!(events[0].details, "bad password for admin");
        assert_eq!(events[0].ip_address, client().ip);
        assert_eq!(events[0].user_agent, "test-agent");
        assert_eq!(events[1].event_type, SecurityEventType::IpBlocked);
    }

    #[tokio::test]
    async fn test_log_keeps_newest_events() {
        let sink = Arc::new(MemorySink::new());
        let (audit, _writer) = AuditLog::spawn(sink.clone(), 10);
        assert!(format!("{audit:?}").starts_with("AuditLog"));

        for n in 0..25 {
            audit.record(SecurityEventType::AdminAreaAccess, format!("access {n}"), &client());
        }
        audit.flush().await;

        let events = sink.snapshot();
        assert_eq!(events.len(), 10);
        assert_eq!(events.first().unwrap().details, "access 15");
        assert_eq!(events.last().unwrap().details, "access 24");
    }

    #[tokio::test]
    async fn test_failing_sink_is_swallowed() {
        let (audit, writer) = AuditLog::spawn(Arc::new(FailingSink), DEFAULT_AUDIT_CAPACITY);

        audit.record(SecurityEventType::Logout, "raju logged out", &client());
        audit.flush().await;
        audit.record(SecurityEventType::Logout, "raju logged out", &client());
        audit.flush().await;

        assert!(!writer.is_finished());
    }

    #[tokio::test]
    async fn test_file_sink_persists_and_reloads() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("logs").join("security_events.json");
        let sink = Arc::new(JsonFileSink::new(&path));

        let (audit, writer) = AuditLog::spawn(sink.clone(), DEFAULT_AUDIT_CAPACITY);
        audit.record(SecurityEventType::SuccessfulLogin, "User admin logged in", &client());
        audit.flush().await;
        drop(audit);
        writer.await.unwrap();

        let stored: Vec<SecurityEvent> =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].event_type, SecurityEventType::SuccessfulLogin);

        // A second run appends to what the first one left behind.
        let (audit, _writer) = AuditLog::spawn(sink.clone(), DEFAULT_AUDIT_CAPACITY);
        audit.record(SecurityEventType::Logout, "User admin logged out", &client());
        audit.flush().await;

        let reloaded = sink.load().await.unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded[0].id, stored[0].id);
        assert_eq!(reloaded[1].event_type, SecurityEventType::Logout);
    }

    #[test]
    fn test_event_type_serialization() {
        let json = serde_json::to_string(&SecurityEventType::UnauthorizedAdminAccess).unwrap();
        assert_eq!(json, "\"unauthorized_admin_access\"");
        assert_eq!(
            SecurityEventType::BlockedIpAccess.to_string(),
            "blocked_ip_access"
        );
    }
}
