use crate::{
    errors::ErrorKind,
    http::{
        parser::{ParseStatus, Parser},
        request::Request,
        response::{Handled, Response},
    },
    limits::{ConnLimits, ReqLimits, RespLimits},
    server::server_impl::{Handler, UpgradeHandler},
};
use bytes::Bytes;
use std::sync::Arc;
use tokio::{io::AsyncReadExt, net::TcpStream};
use tracing::{debug, trace};

pub(crate) type AllLimits = (ConnLimits, ReqLimits, RespLimits);

// How one exchange left the connection.
enum Exchange {
    KeepAlive,
    Close,
    Upgrade(Bytes),
}

/// One accepted socket, one state machine.
///
/// Owns the transport, the incremental parser, and exactly one
/// request/response pair that is cleared in place between keep-alive
/// exchanges - nothing is reallocated while the connection lives. Pipelined
/// bytes already buffered are served from the buffer before the socket is
/// read again, so responses always go out in arrival order.
pub(crate) struct HttpConnection<H: Handler<S>, S: ConnectionData, U: UpgradeHandler> {
    handler: Arc<H>,
    upgrade: Arc<U>,
    connection_data: S,

    pub(crate) parser: Parser,
    pub(crate) request: Request,
    pub(crate) response: Response,
    request_count: usize,

    conn_limits: ConnLimits,
    pub(crate) req_limits: ReqLimits,
    resp_limits: RespLimits,
}

impl<H: Handler<S>, S: ConnectionData, U: UpgradeHandler> HttpConnection<H, S, U> {
    #[inline]
    pub(crate) fn new(handler: Arc<H>, upgrade: Arc<U>, limits: AllLimits) -> Self {
        Self {
            handler,
            upgrade,
            connection_data: S::new(),

            parser: Parser::new(&limits.1),
            request: Request::new(&limits.1),
            response: Response::new(&limits.2),
            request_count: 0,

            conn_limits: limits.0,
            req_limits: limits.1,
            resp_limits: limits.2,
        }
    }

    // Clears the owned pair for the next exchange on the same socket.
    // Bytes of a pipelined follow-up request stay in the parser's buffer.
    #[inline]
    fn reset_exchange(&mut self) {
        self.parser.reset_message();
        self.request.reset();
        self.response.reset(&self.resp_limits);
    }
}

impl<H: Handler<S>, S: ConnectionData, U: UpgradeHandler> HttpConnection<H, S, U> {
    /// Drives the connection until it closes or is upgraded away.
    ///
    /// Dropping the stream at the end is what closes the transport; the
    /// upgrade arm instead moves it out, so an upgraded socket survives
    /// this connection's teardown untouched.
    pub(crate) async fn run(&mut self, mut stream: TcpStream) {
        if let Ok(peer) = stream.peer_addr() {
            self.request.client_addr = peer;
        }
        if let Ok(local) = stream.local_addr() {
            self.request.server_addr = local;
        }

        loop {
            self.reset_exchange();

            match self.next_exchange(&mut stream).await {
                Ok(Exchange::KeepAlive) => {
                    self.request_count += 1;
                    if self.request_count >= self.conn_limits.max_requests_per_connection {
                        debug!("request budget exhausted, closing");
                        break;
                    }
                }
                Ok(Exchange::Close) => break,
                Ok(Exchange::Upgrade(head)) => {
                    if !self.upgrade.accepts(&self.request) {
                        // Nobody serves the requested protocol, and the
                        // client has already stopped speaking HTTP framing
                        // past the head - ordinary dispatch is not safe.
                        debug!(
                            protocol = self.request.upgrade_protocol().unwrap_or(""),
                            "unsupported upgrade, closing"
                        );
                        break;
                    }

                    debug!(
                        protocol = self.request.upgrade_protocol().unwrap_or(""),
                        head_bytes = head.len(),
                        "connection upgraded"
                    );
                    self.upgrade.serve(&self.request, stream, head).await;
                    return;
                }
                Err(ErrorKind::Disconnected) => break,
                Err(err) => {
                    if let Some(wire) = err.as_http(self.request.version()) {
                        let _ = writer::write_bytes(&mut stream, wire).await;
                    }
                    debug!(error = %err, "exchange failed, closing");
                    break;
                }
            }
        }
    }

    // Parses exactly one message - serving buffered pipelined bytes before
    // touching the socket - then dispatches it.
    async fn next_exchange(&mut self, stream: &mut TcpStream) -> Result<Exchange, ErrorKind> {
        loop {
            match self.parser.advance(&mut self.request, &self.req_limits)? {
                ParseStatus::Complete => break,
                ParseStatus::HeadersComplete { upgrade: true } => {
                    return Ok(Exchange::Upgrade(self.parser.take_head()));
                }
                ParseStatus::HeadersComplete { upgrade: false } => {}
                ParseStatus::Incomplete => {
                    if stream.read_buf(&mut self.parser.buf).await? == 0 {
                        return if self.parser.is_idle() {
                            Ok(Exchange::Close)
                        } else {
                            Err(ErrorKind::Disconnected)
                        };
                    }
                }
            }
        }

        self.dispatch(stream).await
    }

    // Exactly one handler call per completed request. The borrows end with
    // the call, which is what lets the pair be reused afterwards.
    async fn dispatch(&mut self, stream: &mut TcpStream) -> Result<Exchange, ErrorKind> {
        self.response.version = self.request.version();
        self.response.keep_alive = self.request.is_keep_alive();

        let _proof: Handled = self
            .handler
            .handle(&mut self.connection_data, &self.request, &mut self.response)
            .await;
        debug_assert!(self.response.is_ended());

        writer::write_bytes(stream, self.response.buffer()).await?;
        trace!(path = self.request.url().path(), "request served");

        match self.response.keep_alive {
            true => Ok(Exchange::KeepAlive),
            false => Ok(Exchange::Close),
        }
    }
}

pub(crate) mod writer {
    use std::io;
    use tokio::{io::AsyncWriteExt, net::TcpStream};

    #[inline(always)]
    pub(crate) async fn write_bytes(
        stream: &mut TcpStream,
        response: &[u8],
    ) -> Result<(), io::Error> {
        stream.write_all(response).await
    }
}

//

/// Managing user session data stored between requests within a single HTTP
/// connection.
///
/// Lets a [`Handler`] keep arbitrary state (authentication, multistep form
/// progress, a small cache) that lives as long as the keep-alive connection
/// and is available to every request on it. The state never outlives its
/// connection.
///
/// # Examples
/// ```
/// use surge_web::ConnectionData;
///
/// struct MyConnectionData {
///     user_id: Option<i32>,
///     request_count: usize,
/// }
///
/// impl ConnectionData for MyConnectionData {
///     fn new() -> Self {
///         Self {
///             user_id: None,
///             request_count: 0,
///         }
///     }
///
///     fn reset(&mut self) {
///         self.user_id = None;
///         self.request_count = 0;
///     }
/// }
/// ```
pub trait ConnectionData: Sync + Send + 'static {
    /// Creates the state for a freshly accepted connection.
    fn new() -> Self;

    /// Returns the state to its initial values.
    fn reset(&mut self);
}

impl ConnectionData for () {
    #[inline(always)]
    fn new() -> Self {}

    #[inline(always)]
    fn reset(&mut self) {}
}

#[cfg(test)]
mod reuse_tests {
    use super::*;
    use crate::StatusCode;

    struct DefHandler;

    impl Handler<()> for DefHandler {
        async fn handle(&self, _: &mut (), _: &Request, resp: &mut Response) -> Handled {
            resp.status(StatusCode::Ok).send("test")
        }
    }

    fn connection() -> HttpConnection<DefHandler, (), ()> {
        HttpConnection::new(
            Arc::new(DefHandler),
            Arc::new(()),
            (
                ConnLimits::default(),
                ReqLimits::default(),
                RespLimits::default(),
            ),
        )
    }

    fn parse_buffered(conn: &mut HttpConnection<DefHandler, (), ()>) {
        loop {
            match conn
                .parser
                .advance(&mut conn.request, &conn.req_limits)
                .unwrap()
            {
                ParseStatus::Complete => return,
                ParseStatus::Incomplete => panic!("parser starved"),
                ParseStatus::HeadersComplete { .. } => {}
            }
        }
    }

    #[test]
    fn exchange_reset_keeps_pipelined_bytes() {
        let mut conn = connection();

        conn.parser
            .buf
            .extend_from_slice(b"GET /a HTTP/1.1\r\n\r\nGET /b HTTP/1.1\r\n\r\n");

        parse_buffered(&mut conn);
        assert_eq!(conn.request.url().path(), "/a");
        conn.response.status(StatusCode::Ok).send("one");
        assert!(conn.response.is_ended());

        conn.reset_exchange();

        assert!(conn.response.buffer().is_empty());
        assert!(!conn.response.is_ended());
        assert!(conn.request.url().target().is_empty());

        // The second pipelined request is still buffered and parses
        // without another read.
        assert!(!conn.parser.is_idle());
        parse_buffered(&mut conn);
        assert_eq!(conn.request.url().path(), "/b");
        assert!(conn.parser.is_idle());
    }

    #[test]
    fn upgrade_head_is_the_unparsed_remainder() {
        let mut conn = connection();

        conn.parser.buf.extend_from_slice(
            b"GET /chat HTTP/1.1\r\nUpgrade: echo\r\nConnection: Upgrade\r\n\r\n\x01\x02\x03",
        );

        loop {
            match conn
                .parser
                .advance(&mut conn.request, &conn.req_limits)
                .unwrap()
            {
                ParseStatus::HeadersComplete { upgrade } => {
                    assert!(upgrade);
                    break;
                }
                ParseStatus::Incomplete | ParseStatus::Complete => panic!("expected headers"),
            }
        }

        assert_eq!(&conn.parser.take_head()[..], b"\x01\x02\x03");
    }
}
