//! Keys taken from who is calling: the client's address or a credential
//! header.

use std::net::IpAddr;

use crate::key::ExtractKey;

/// What the key extractors need to know about an incoming request.
pub trait ClientRequest {
    /// Address of the connected peer, without the port.
    fn peer_ip(&self) -> Option<IpAddr>;

    /// Value of the header `name` (lowercase), if present and valid text.
    fn header(&self, name: &str) -> Option<&str> {
        let _ = name;
        None
    }
}

/// A header a reverse proxy uses to pass on the real client address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyHeader {
    /// `X-Forwarded-For`; the left-most entry is the client.
    ForwardedFor,
    /// `X-Real-IP`, a single address.
    RealIp,
}

impl ProxyHeader {
    fn name(self) -> &'static str {
        match self {
            Self::ForwardedFor => "x-forwarded-for",
            Self::RealIp => "x-real-ip",
        }
    }

    fn client_ip(self, value: &str) -> Option<IpAddr> {
        let first = match self {
            Self::ForwardedFor => value.split(',').next()?,
            Self::RealIp => value,
        };
        first.trim().parse().ok()
    }
}

/// Keys a request by client IP address, so each address has its own budget.
///
/// The default is the connected peer's address with the port stripped.
/// Behind a reverse proxy every request comes from the proxy, so use
/// [`IpKey::behind_proxy`]. Only do that when the proxy overwrites the header:
/// clients can send it themselves. A header that is missing or does not
/// parse as an address falls back to the peer.
#[derive(Debug, Clone, Copy, Default)]
pub struct IpKey {
    proxy: Option<ProxyHeader>,
}

impl IpKey {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn behind_proxy(header: ProxyHeader) -> Self {
        Self {
            proxy: Some(header),
        }
    }
}

impl<R: ClientRequest> ExtractKey<R> for IpKey {
    fn extract_key(&self, request: &R) -> Option<String> {
        let forwarded = self
            .proxy
            .and_then(|proxy| proxy.client_ip(request.header(proxy.name())?));

        forwarded.or_else(|| request.peer_ip()).map(|ip| ip.to_string())
    }

    fn label(&self) -> &'static str {
        "ip"
    }
}

/// Keys a request by a credential header such as an API token.
///
/// Requests without the header, or with an empty one, are not keyed.
#[derive(Debug, Clone, Copy)]
pub struct HeaderKey {
    name: &'static str,
}

impl HeaderKey {
    /// Key by the header `name`, given in lowercase.
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }

    pub fn api_key() -> Self {
        Self::new("x-api-key")
    }

    pub fn authorization() -> Self {
        Self::new("authorization")
    }
}

impl<R: ClientRequest> ExtractKey<R> for HeaderKey {
    fn extract_key(&self, request: &R) -> Option<String> {
        request
            .header(self.name)
            .filter(|value| !value.is_empty())
            .map(|value| format!("{}={}", self.name, value))
    }

    fn label(&self) -> &'static str {
        "header"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Conn {
        peer: Option<IpAddr>,
        headers: Vec<(&'static str, &'static str)>,
    }

    impl Conn {
        fn peer(addr: &str) -> Self {
            Self {
                peer: Some(addr.parse().unwrap()),
                headers: Vec::new(),
            }
        }

        fn with_header(mut self, name: &'static str, value: &'static str) -> Self {
            self.headers.push((name, value));
            self
        }
    }

    impl ClientRequest for Conn {
        fn peer_ip(&self) -> Option<IpAddr> {
            self.peer
        }

        fn header(&self, name: &str) -> Option<&str> {
            self.headers.iter().find(|(n, _)| *n == name).map(|(_, v)| *v)
        }
    }

    #[test]
    fn test_ip_key_is_bare_peer_address() {
        let key = IpKey::new();
        assert_eq!(key.extract_key(&Conn::peer("192.168.1.1")), Some("192.168.1.1".to_owned()));
        assert_eq!(key.extract_key(&Conn::peer("2001:db8::7")), Some("2001:db8::7".to_owned()));
    }

    #[test]
    fn test_ip_key_ignores_proxy_header_by_default() {
        let conn = Conn::peer("10.0.0.1").with_header("x-forwarded-for", "203.0.113.50");
        assert_eq!(IpKey::new().extract_key(&conn), Some("10.0.0.1".to_owned()));
    }

    #[test]
    fn test_ip_key_forwarded_for_takes_first_hop() {
        let key = IpKey::behind_proxy(ProxyHeader::ForwardedFor);
        let conn = Conn::peer("10.0.0.1").with_header("x-forwarded-for", " 203.0.113.50 , 70.41.3.18");
        assert_eq!(key.extract_key(&conn), Some("203.0.113.50".to_owned()));
    }

    #[test]
    fn test_ip_key_bad_proxy_header_falls_back_to_peer() {
        let key = IpKey::behind_proxy(ProxyHeader::RealIp);
        assert_eq!(key.extract_key(&Conn::peer("::1")), Some("::1".to_owned()));

        let spoofed = Conn::peer("10.0.0.1").with_header("x-real-ip", "not-an-address");
        assert_eq!(key.extract_key(&spoofed), Some("10.0.0.1".to_owned()));
    }

    #[test]
    fn test_ip_key_without_peer() {
        let conn = Conn {
            peer: None,
            headers: Vec::new(),
        };
        assert_eq!(IpKey::new().extract_key(&conn), None);
    }

    #[test]
    fn test_header_key() {
        let conn = Conn::peer("10.0.0.1").with_header("x-api-key", "secret-key");
        assert_eq!(
            HeaderKey::api_key().extract_key(&conn),
            Some("x-api-key=secret-key".to_owned())
        );
        assert_eq!(HeaderKey::authorization().extract_key(&conn), None);

        let empty = Conn::peer("10.0.0.1").with_header("x-api-key", "");
        assert_eq!(HeaderKey::api_key().extract_key(&empty), None);
    }
}
