//! Server configuration limits
//!
//! # Security-First Defaults
//!
//! Default limits are intentionally conservative to prevent:
//! - Resource exhaustion attacks
//! - Header flooding
//! - Unbounded body buffering
//!
//! Deliberately absent: socket timeouts. The core treats a transport
//! disconnect as its only cancellation signal; deadline policy belongs to
//! whatever wraps the transport (a proxy, a load balancer, an OS-level
//! keepalive). See the crate-level documentation.
//!
//! # Examples
//!
//! ```no_run
//! # surge_web::demo_handler!{MyHandler}
//! use surge_web::{Server, limits::{ConnLimits, ReqLimits}};
//!
//! #[tokio::main]
//! async fn main() {
//!     Server::builder()
//!         .listener(surge_web::bind("127.0.0.1:8080".parse().unwrap()).unwrap())
//!         .handler(MyHandler)
//!         .connection_limits(ConnLimits {
//!             max_requests_per_connection: 10_000,
//!             ..ConnLimits::default()
//!         })
//!         .request_limits(ReqLimits {
//!             header_count: 48,         // More headers for complex APIs
//!             body_size: 64 * 1024,     // 64KB for larger payloads
//!             ..ReqLimits::default()
//!         })
//!         .build()
//!         .launch()
//!         .await;
//! }
//! ```

/// Connection-level limits
///
/// Controls individual TCP connection behavior across keep-alive exchanges.
#[derive(Debug, Clone)]
pub struct ConnLimits {
    /// Maximum number of requests served per connection (default: `100`)
    ///
    /// The connection closes after processing this many requests. Keeps
    /// long-lived keep-alive connections from monopolizing a socket and
    /// bounds per-connection buffer growth over time.
    pub max_requests_per_connection: usize,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for ConnLimits {
    #[inline(always)]
    fn default() -> Self {
        Self {
            max_requests_per_connection: 100,

            _priv: (),
        }
    }
}

/// HTTP request parsing limits
///
/// Every bound here maps to a distinct error on the wire: an overlong
/// request line is answered with `414`, too many headers with `431`, an
/// oversized body with `413`. Increase them if legitimate traffic trips
/// those responses.
#[derive(Debug, Clone)]
pub struct ReqLimits {
    /// Maximum length of the request line in bytes, CRLF included
    /// (default: `2048`)
    pub request_line_size: usize,

    /// Maximum length of the request target within the request line
    /// (default: `1024`)
    pub url_size: usize,

    /// Maximum number of header lines per request (default: `32`)
    pub header_count: usize,

    /// Maximum length of a single header line in bytes, CRLF included
    /// (default: `1024`)
    pub header_line_size: usize,

    /// Maximum body size in bytes (default: `16384`)
    ///
    /// Applies to `Content-Length` bodies and to the decoded size of
    /// chunked bodies alike.
    pub body_size: usize,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for ReqLimits {
    #[inline(always)]
    fn default() -> Self {
        Self {
            request_line_size: 2048,
            url_size: 1024,
            header_count: 32,
            header_line_size: 1024,
            body_size: 16 * 1024,

            _priv: (),
        }
    }
}

/// Response buffer management
///
/// Each connection keeps one response buffer alive across keep-alive
/// exchanges. After an exchange whose response outgrew `max_capacity` the
/// buffer is shrunk back to `default_capacity` instead of being carried
/// forward, so one large response does not pin memory for the rest of the
/// connection's life.
#[derive(Debug, Clone)]
pub struct RespLimits {
    /// Initial capacity of the response buffer in bytes (default: `1024`)
    pub default_capacity: usize,

    /// Capacity above which the buffer is released after an exchange
    /// (default: `16384`)
    pub max_capacity: usize,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for RespLimits {
    #[inline(always)]
    fn default() -> Self {
        Self {
            default_capacity: 1024,
            max_capacity: 16 * 1024,

            _priv: (),
        }
    }
}
