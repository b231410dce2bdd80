//! Event stream endpoint resolution and the HTTP request that opens it.

use std::fmt;

use attraccess_core::ResourceId;
use base64::{Engine, engine::general_purpose::STANDARD};
use url::Url;

use crate::error::{Result, TransportError};

/// HTTP basic credentials for the event stream.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// `Basic base64(username:password)`.
    pub fn basic_auth(&self) -> String {
        let token = STANDARD.encode(format!("{}:{}", self.username, self.password));
        format!("Basic {token}")
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

fn has_api_segment(api_url: &str) -> bool {
    Url::parse(api_url)
        .ok()
        .and_then(|url| url.path_segments().map(|mut segments| segments.any(|s| s == "api")))
        .unwrap_or(false)
}

/// Events URL for a resource: `/api` is appended when the API URL path has
/// no `api` segment, then `/resources/{id}/events`.
pub fn events_url(api_url: &str, resource_id: &ResourceId) -> String {
    let mut url = api_url.to_string();
    if !has_api_segment(api_url) {
        if !url.ends_with('/') {
            url.push('/');
        }
        url.push_str("api");
    }
    if !url.ends_with('/') {
        url.push('/');
    }
    url.push_str(&format!("resources/{resource_id}/events"));
    url
}

/// Host, port and path of a plaintext event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEndpoint {
    pub host: String,
    pub port: u16,
    pub path: String,
    explicit_port: bool,
}

impl StreamEndpoint {
    /// Resolve the events endpoint of `resource_id` under `api_url`.
    ///
    /// # Errors
    ///
    /// - [`TransportError::InvalidUrl`] if the URL does not parse or has no
    ///   host
    /// - [`TransportError::UnsupportedScheme`] for anything but `http`
    pub fn resolve(api_url: &str, resource_id: &ResourceId) -> Result<Self> {
        let full = events_url(api_url, resource_id);
        let url = Url::parse(&full).map_err(|e| TransportError::InvalidUrl(format!("{full}: {e}")))?;

        if url.scheme() != "http" {
            return Err(TransportError::UnsupportedScheme(url.scheme().to_string()));
        }
        let host = url
            .host_str()
            .ok_or_else(|| TransportError::InvalidUrl(format!("{full}: missing host")))?
            .to_string();
        let port = url.port_or_known_default().unwrap_or(80);

        let mut path = url.path().to_string();
        if let Some(query) = url.query() {
            path.push('?');
            path.push_str(query);
        }

        Ok(Self {
            host,
            port,
            path,
            explicit_port: url.port().is_some(),
        })
    }

    /// Value of the `Host` header.
    pub fn host_header(&self) -> String {
        if self.explicit_port {
            format!("{}:{}", self.host, self.port)
        } else {
            self.host.clone()
        }
    }

    /// Raw HTTP/1.1 request that opens the stream.
    pub fn request(&self, credentials: Option<&Credentials>) -> String {
        let mut request = format!(
            "GET {} HTTP/1.1\r\nHost: {}\r\nCache-Control: no-cache\r\nAccept: text/event-stream\r\n",
            self.path,
            self.host_header()
        );
        if let Some(credentials) = credentials {
            request.push_str(&format!("Authorization: {}\r\n", credentials.basic_auth()));
        }
        request.push_str("Connection: keep-alive\r\n\r\n");
        request
    }
}

impl fmt::Display for StreamEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "http://{}:{}{}", self.host, self.port, self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn resource() -> ResourceId {
        "12".parse().unwrap()
    }

    #[rstest]
    #[case("http://host", "http://host/api/resources/12/events")]
    #[case("http://host/", "http://host/api/resources/12/events")]
    #[case("http://host/api", "http://host/api/resources/12/events")]
    #[case("http://host:3000/api/", "http://host:3000/api/resources/12/events")]
    #[case("http://api.example.com", "http://api.example.com/api/resources/12/events")]
    #[case("http://host/apis", "http://host/apis/api/resources/12/events")]
    #[case("http://host/v1/api", "http://host/v1/api/resources/12/events")]
    fn test_events_url(#[case] api_url: &str, #[case] expected: &str) {
        assert_eq!(events_url(api_url, &resource()), expected);
    }

    #[test]
    fn test_resolve_default_port() {
        let endpoint = StreamEndpoint::resolve("http://attraccess.local", &resource()).unwrap();
        assert_eq!(endpoint.host, "attraccess.local");
        assert_eq!(endpoint.port, 80);
        assert_eq!(endpoint.path, "/api/resources/12/events");
        assert_eq!(endpoint.host_header(), "attraccess.local");
    }

    #[test]
    fn test_resolve_explicit_port() {
        let endpoint = StreamEndpoint::resolve("http://10.0.0.5:3000/api", &resource()).unwrap();
        assert_eq!(endpoint.port, 3000);
        assert_eq!(endpoint.host_header(), "10.0.0.5:3000");
    }

    #[test]
    fn test_resolve_rejects_https() {
        let err = StreamEndpoint::resolve("https://attraccess.local", &resource()).unwrap_err();
        assert!(matches!(err, TransportError::UnsupportedScheme(s) if s == "https"));
    }

    #[test]
    fn test_resolve_rejects_garbage() {
        assert!(matches!(
            StreamEndpoint::resolve("not a url", &resource()),
            Err(TransportError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_request_without_credentials() {
        let endpoint = StreamEndpoint::resolve("http://h", &resource()).unwrap();
        assert_eq!(
            endpoint.request(None),
            "GET /api/resources/12/events HTTP/1.1\r\n\
             Host: h\r\n\
             Cache-Control: no-cache\r\n\
             Accept: text/event-stream\r\n\
             Connection: keep-alive\r\n\r\n"
        );
    }

    #[test]
    fn test_request_with_basic_auth() {
        let endpoint = StreamEndpoint::resolve("http://h", &resource()).unwrap();
        let request = endpoint.request(Some(&Credentials::new("user", "pass")));
        assert!(request.contains("Authorization: Basic dXNlcjpwYXNz\r\n"));
        assert!(request.ends_with("Connection: keep-alive\r\n\r\n"));
    }

    #[test]
    fn test_credentials_debug_redacted() {
        let rendered = format!("{:?}", Credentials::new("user", "hunter2"));
        assert!(!rendered.contains("hunter2"));
    }
}
