//! Identification of the calling client.
use axum::extract::ConnectInfo;
use axum::http::{header::USER_AGENT, HeaderMap, Request};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Address and user agent of the client behind a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub ip: IpAddr,
    pub user_agent: String,
}

impl ClientInfo {
    pub fn new(ip: IpAddr, user_agent: impl Into<String>) -> Self {
        Self {
            ip,
            user_agent: user_agent.into(),
        }
    }

    /// Resolve the client of a request.
    ///
    /// Proxy headers (`x-real-ip`, then the first `x-forwarded-for` hop) are
    /// only honoured when `trust_proxy_headers` is set; otherwise the socket
    /// peer address is used.
    pub fn from_request<B>(request: &Request<B>, trust_proxy_headers: bool) -> Self {
        let headers = request.headers();

        let forwarded = trust_proxy_headers
            .then(|| forwarded_ip(headers))
            .flatten();
        let peer = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());

        let ip = forwarded
            .or(peer)
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

        let user_agent = headers
            .get(USER_AGENT)
            .and_then(|h| h.to_str().ok())
            .unwrap_or("unknown");

        Self::new(ip, user_agent)
    }
}

fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    if let Some(ip) = headers
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
    {
        return Some(ip);
    }

    headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_peer_address_used_by_default() {
        let mut request = Request::builder()
            .uri("/")
            .header("x-real-ip", "1.2.3.4")
            .header("user-agent", "curl/8.0")
            .body(Body::empty())
            .unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 168, 1, 20], 51000))));

        let client = ClientInfo::from_request(&request, false);
        assert_eq!(client.ip, IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20)));
        assert_eq!(client.user_agent, "curl/8.0");
    }

    #[test]
    fn test_proxy_headers_when_trusted() {
        let request = Request::builder()
            .uri("/")
            .header("x-forwarded-for", "5.6.7.8, 10.0.0.1")
            .body(Body::empty())
            .unwrap();

        let client = ClientInfo::from_request(&request, true);
        assert_eq!(client.ip, IpAddr::V4(Ipv4Addr::new(5, 6, 7, 8)));
        assert_eq!(client.user_agent, "unknown");
    }

    #[test]
    fn test_missing_address_falls_back_to_unspecified() {
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let client = ClientInfo::from_request(&request, true);
        assert_eq!(client, ClientInfo::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), "unknown"));
    }
}
