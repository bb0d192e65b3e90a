use crate::{
    http::{
        headers::HeaderMap,
        types::{Method, Url, Version},
    },
    limits::ReqLimits,
};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// A parsed HTTP request.
///
/// Instances are created by the server and lent to
/// [`Handler::handle`](crate::Handler::handle) for the duration of one
/// exchange.
///
/// # Reuse
///
/// There may be multiple requests per connection (keep-alive), and the
/// server reuses one `Request` per connection: every field is cleared in
/// place before the next exchange. Do not key any session state on a
/// request's identity, and do not try to smuggle data out of the handler
/// through it - the borrow ends with the handler call, which is what makes
/// the reuse safe.
///
/// # Body
///
/// The body is accumulated from the connection before dispatch, decoded
/// from `Content-Length` or chunked framing, and bounded by
/// [`ReqLimits::body_size`]. Bodyless requests expose an empty slice.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub(crate) method: Method,
    pub(crate) url: Url,
    pub(crate) version: Version,

    pub(crate) headers: HeaderMap,
    pub(crate) content_length: Option<usize>,
    pub(crate) keep_alive: bool,
    pub(crate) chunked: bool,

    pub(crate) body: Vec<u8>,

    pub(crate) client_addr: SocketAddr,
    pub(crate) server_addr: SocketAddr,
}

impl Request {
    const UNKNOWN_CLIENT: SocketAddr = { SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0) };
    const DEFAULT_SERVER: SocketAddr = { SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0) };

    #[inline(always)]
    pub(crate) fn new(limits: &ReqLimits) -> Self {
        Request {
            method: Method::Get,
            url: Url::new(),
            version: Version::Http11,

            headers: HeaderMap::with_capacity(limits.header_count),
            content_length: None,
            keep_alive: true,
            chunked: false,

            body: Vec::new(),

            client_addr: Self::UNKNOWN_CLIENT,
            server_addr: Self::DEFAULT_SERVER,
        }
    }

    // Clears everything except the peer addresses, which belong to the
    // connection rather than to any single exchange.
    #[inline(always)]
    pub(crate) fn reset(&mut self) {
        self.method = Method::Get;
        self.url.clear();
        self.version = Version::Http11;

        self.headers.clear();
        self.content_length = None;
        self.keep_alive = true;
        self.chunked = false;

        self.body.clear();
    }
}

// Public API
impl Request {
    /// Returns the address of the peer that sent this request.
    #[inline(always)]
    pub const fn client_addr(&self) -> &SocketAddr {
        &self.client_addr
    }

    /// Returns the local address the request arrived on.
    #[inline(always)]
    pub const fn server_addr(&self) -> &SocketAddr {
        &self.server_addr
    }

    #[inline(always)]
    pub const fn method(&self) -> Method {
        self.method
    }

    #[inline(always)]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    #[inline(always)]
    pub const fn version(&self) -> Version {
        self.version
    }

    /// Returns the first header value with case-insensitive name matching
    /// (per [RFC 7230](https://tools.ietf.org/html/rfc7230#section-3.2)).
    #[inline(always)]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Returns all headers, insertion order and name casing preserved.
    #[inline(always)]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the value of the `Content-Length` header if present.
    #[inline(always)]
    pub const fn content_length(&self) -> Option<usize> {
        self.content_length
    }

    /// Returns the keep-alive intent of this request: the version default
    /// (keep-alive for HTTP/1.1, close for HTTP/1.0) combined with any
    /// explicit `Connection` header.
    #[inline(always)]
    pub const fn is_keep_alive(&self) -> bool {
        self.keep_alive
    }

    /// Returns `true` if the request carries an `Upgrade` header.
    #[inline(always)]
    pub fn is_upgrade(&self) -> bool {
        self.headers.contains("upgrade")
    }

    /// Returns the protocol the client wants to upgrade to, if any.
    ///
    /// The server only detects the header; deciding whether the token and
    /// its handshake are acceptable is the
    /// [`UpgradeHandler`](crate::UpgradeHandler)'s job.
    #[inline(always)]
    pub fn upgrade_protocol(&self) -> Option<&str> {
        self.headers.get("upgrade")
    }

    /// Returns the request body, empty for bodyless requests.
    #[inline(always)]
    pub fn body(&self) -> &[u8] {
        &self.body
    }
}
