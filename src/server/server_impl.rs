use crate::{
    http::{
        request::Request,
        response::{Handled, Response},
    },
    limits::{ConnLimits, ReqLimits, RespLimits},
    server::connection::{writer, AllLimits, ConnectionData, HttpConnection},
};
use bytes::Bytes;
use socket2::{Domain, Protocol, Socket, Type};
use std::{
    future::Future,
    io,
    marker::PhantomData,
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};
use tokio::{
    net::{TcpListener, TcpStream},
    sync::Notify,
};
use tracing::{info, trace, warn};

/// A trait for handling HTTP requests and generating responses.
///
/// You can use:
/// - `&self` for shared immutable data (e.g. database connection pool, router configuration)
/// - `&mut S` for connection-specific mutable state (e.g. authentication tokens, session data)
///
/// The request and response are lent to the handler for exactly one
/// exchange; the borrows end with the call, and the server reuses both
/// objects for the connection's next request. The returned [`Handled`]
/// token can only come from one of the response's finalizing methods, so a
/// handler that compiles has driven its response to completion.
///
/// # Examples
///
/// Basic request handler
/// ```
/// use surge_web::{Handler, Request, Response, Handled, StatusCode};
///
/// struct MyHandler;
///
/// impl Handler<()> for MyHandler {
///     async fn handle(&self, _: &mut (), req: &Request, resp: &mut Response) -> Handled {
///         // Simple echo handler
///         if req.url().path() == "/echo" {
///             resp.status(StatusCode::Ok).send(req.body())
///         } else {
///             resp.status(StatusCode::NotFound).send("Not found :(")
///         }
///     }
/// }
/// ```
/// Handler with [`ConnectionData`]
/// ```
/// use surge_web::{Handler, ConnectionData, Request, Response, Handled, StatusCode};
///
/// struct CountingHandler;
///
/// impl Handler<State> for CountingHandler {
///     async fn handle(&self, data: &mut State, req: &Request, resp: &mut Response) -> Handled {
///         data.request_count += 1;
///
///         resp.status(StatusCode::Ok)
///             .send(format!("Request #{}", data.request_count))
///     }
/// }
///
/// struct State {
///     request_count: usize,
/// }
///
/// impl ConnectionData for State {
///     fn new() -> Self {
///         Self { request_count: 0 }
///     }
///
///     fn reset(&mut self) {
///         self.request_count = 0;
///     }
/// }
/// ```
pub trait Handler<S = ()>
where
    Self: Sync + Send + 'static,
    S: ConnectionData,
{
    /// Processes an HTTP request and generates a response.
    ///
    /// Invoked exactly once per completed request, in arrival order, from
    /// the connection's own task. Completion is the response reaching its
    /// terminal state - that is what the [`Handled`] return proves - not
    /// the return from this method as such.
    fn handle(
        &self,
        connection_data: &mut S,
        request: &Request,
        response: &mut Response,
    ) -> impl Future<Output = Handled> + Send;
}

/// Receiver of protocol upgrades.
///
/// When a request carries an `Upgrade` header the server asks the
/// registered handler whether it serves that protocol. On `true` the
/// socket and any bytes already read past the HTTP header terminator are
/// handed over; the server forgets the socket entirely and the handler is
/// responsible for its whole remaining lifecycle, closing included. On
/// `false` the connection is closed - a client that requested an upgrade
/// has stopped speaking HTTP framing, so there is nothing safe to fall
/// back to.
///
/// Which upgrade tokens exist and how their handshakes are validated is
/// entirely this trait's business; the server only detects the header.
///
/// # Examples
/// ```no_run
/// use bytes::Bytes;
/// use surge_web::{Request, UpgradeHandler};
/// use tokio::io::{AsyncReadExt, AsyncWriteExt};
/// use tokio::net::TcpStream;
///
/// struct EchoUpgrade;
///
/// impl UpgradeHandler for EchoUpgrade {
///     fn accepts(&self, request: &Request) -> bool {
///         request
///             .upgrade_protocol()
///             .is_some_and(|p| p.eq_ignore_ascii_case("echo"))
///     }
///
///     async fn serve(&self, _: &Request, mut stream: TcpStream, head: Bytes) {
///         let _ = stream.write_all(&head).await;
///
///         let mut buf = [0u8; 1024];
///         while let Ok(n) = stream.read(&mut buf).await {
///             if n == 0 || stream.write_all(&buf[..n]).await.is_err() {
///                 break;
///             }
///         }
///     }
/// }
/// ```
pub trait UpgradeHandler: Send + Sync + 'static {
    /// Decides whether this handler serves the requested protocol,
    /// without taking the socket.
    fn accepts(&self, request: &Request) -> bool;

    /// Takes over the socket.
    ///
    /// `head` holds the bytes that were already read past the header
    /// terminator - they belong to the next protocol and were never parsed
    /// as HTTP.
    fn serve(
        &self,
        request: &Request,
        stream: TcpStream,
        head: Bytes,
    ) -> impl Future<Output = ()> + Send;
}

/// The default: no protocol is served, upgrades close the connection.
impl UpgradeHandler for () {
    #[inline(always)]
    fn accepts(&self, _: &Request) -> bool {
        false
    }

    async fn serve(&self, _: &Request, _: TcpStream, _: Bytes) {}
}

/// Early check of incoming TCP connections, before the first read.
///
/// Allows rejection of unwanted peers (address blacklists, per-IP
/// policies) with a prepared error response. Runs on the connection's own
/// task right after the accept.
///
/// # Examples
///
/// ```no_run
/// # surge_web::demo_handler!{ MyStruct }
/// use std::net::{IpAddr, SocketAddr};
/// use surge_web::{ConnectionFilter, Server};
///
/// struct MyConnFilter {
///     blacklist: Vec<IpAddr>,
/// }
///
/// impl ConnectionFilter for MyConnFilter {
///     fn filter(
///         &self, client_addr: SocketAddr, _: SocketAddr, err_resp: &mut Response
///     ) -> Result<(), Handled> {
///         if self.blacklist.contains(&client_addr.ip()) {
///             Err(err_resp
///                 .status(StatusCode::Forbidden)
///                 .close()
///                 .send("Your IP is permanently banned"))
///         } else {
///             Ok(())
///         }
///     }
/// }
///
/// # #[tokio::main]
/// # async fn main() {
/// let filter = MyConnFilter {
///     blacklist: vec!["192.0.2.1".parse().unwrap()],
/// };
///
/// Server::builder()
///     .listener(surge_web::bind("127.0.0.1:8080".parse().unwrap()).unwrap())
///     .handler(MyStruct)
///     .conn_filter(filter)
///     .build()
///     .launch()
///     .await;
/// # }
/// ```
pub trait ConnectionFilter: Send + Sync + 'static {
    /// Returns `Ok(())` to admit the connection. To reject, finalize
    /// `err_resp` and return its token; the response is written and the
    /// socket closed without any of the peer's bytes being read.
    fn filter(
        &self,
        client_addr: SocketAddr,
        server_addr: SocketAddr,
        err_resp: &mut Response,
    ) -> Result<(), Handled>;
}

/// The default: every connection is admitted.
impl ConnectionFilter for () {
    #[inline(always)]
    fn filter(&self, _: SocketAddr, _: SocketAddr, _: &mut Response) -> Result<(), Handled> {
        Ok(())
    }
}

/// Builds a TCP listener ready for [`ServerBuilder::listener`].
///
/// Goes through `socket2` so the usual server options are applied before
/// the first accept: `SO_REUSEADDR` for fast restarts and non-blocking
/// mode for the tokio reactor. Bind to port `0` to let the OS pick one;
/// [`Server::port`] reports the outcome.
///
/// Must be called from within a tokio runtime.
///
/// # Examples
/// ```no_run
/// # #[tokio::main]
/// # async fn main() {
/// let listener = surge_web::bind("127.0.0.1:0".parse().unwrap()).unwrap();
/// # }
/// ```
pub fn bind(addr: SocketAddr) -> io::Result<TcpListener> {
    let domain = match addr {
        SocketAddr::V4(_) => Domain::IPV4,
        SocketAddr::V6(_) => Domain::IPV6,
    };

    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(1024)?;

    TcpListener::from_std(socket.into())
}

struct ListenerState {
    listening: AtomicBool,
    shutdown: AtomicBool,
    notify: Notify,
}

impl ListenerState {
    fn new() -> Self {
        Self {
            listening: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }
}

/// Handle for stopping a running [`Server`].
///
/// Obtained with [`Server::shutdown_handle`] before `launch()` consumes
/// the server. [`close()`](Shutdown::close) stops the accept loop;
/// connections already handed to their tasks finish on their own.
#[derive(Clone)]
pub struct Shutdown {
    state: Arc<ListenerState>,
}

impl Shutdown {
    /// Stops the server's accept loop. The server will no longer listen
    /// for incoming connections.
    pub fn close(&self) {
        self.state.shutdown.store(true, Ordering::Release);
        self.state.notify.notify_waiters();
    }

    /// Returns `true` while the server is accepting connections.
    pub fn is_listening(&self) -> bool {
        self.state.listening.load(Ordering::Acquire)
    }
}

type SpawnFn = Box<dyn Fn(TcpStream, SocketAddr) + Send + Sync>;

/// An HTTP server: accepts connections and runs one connection state
/// machine per socket.
///
/// The listener imposes no connection cap of its own - every accepted
/// socket gets a task; admission control beyond [`ConnectionFilter`]
/// belongs in front of the listener.
///
/// # Examples
///
/// ```no_run
/// use surge_web::{Server, Handler, Request, Response, Handled, StatusCode};
///
/// struct MyHandler;
///
/// impl Handler<()> for MyHandler {
///     async fn handle(&self, _: &mut (), _: &Request, resp: &mut Response) -> Handled {
///         resp.status(StatusCode::Ok).send("Hello world!")
///     }
/// }
///
/// #[tokio::main]
/// async fn main() {
///     Server::builder()
///         .listener(surge_web::bind("127.0.0.1:8080".parse().unwrap()).unwrap())
///         .handler(MyHandler)
///         .build()
///         .launch()
///         .await
/// }
/// ```
pub struct Server {
    listener: TcpListener,
    state: Arc<ListenerState>,
    spawn_connection: SpawnFn,
}

impl Server {
    /// Creates a new builder for configuring the server instance.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # surge_web::demo_handler!{ MyStruct }
    /// # #[tokio::main]
    /// # async fn main() {
    /// use surge_web::Server;
    ///
    /// let server = Server::builder()
    ///     .listener(surge_web::bind("127.0.0.1:8080".parse().unwrap()).unwrap())
    ///     .handler(MyStruct) // structure with Handler implementation
    ///     .build();
    /// # }
    /// ```
    #[inline]
    pub fn builder<H, S>() -> ServerBuilder<H, S>
    where
        H: Handler<S>,
        S: ConnectionData,
    {
        ServerBuilder {
            listener: None,
            handler: None,
            upgrade_handler: Arc::new(()),
            connection_filter: Arc::new(()),
            _marker: PhantomData,

            connection_limits: None,
            request_limits: None,
            response_limits: None,
        }
    }

    /// Returns the address the listener is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Returns the bound port, or `0` if it cannot be determined.
    pub fn port(&self) -> u16 {
        self.listener
            .local_addr()
            .map(|addr| addr.port())
            .unwrap_or(0)
    }

    /// Returns a handle that can stop the server after
    /// [`launch()`](Server::launch) has consumed it.
    pub fn shutdown_handle(&self) -> Shutdown {
        Shutdown {
            state: self.state.clone(),
        }
    }

    /// Starts accepting connections, one task per accepted socket.
    ///
    /// Runs until [`Shutdown::close`] is called; a failed accept is logged
    /// and the loop keeps going.
    pub async fn launch(self) {
        self.state.listening.store(true, Ordering::Release);
        if let Ok(addr) = self.listener.local_addr() {
            info!(%addr, "listening");
        }

        loop {
            if self.state.shutdown.load(Ordering::Acquire) {
                break;
            }

            let accepted = tokio::select! {
                accepted = self.listener.accept() => accepted,
                _ = self.state.notify.notified() => break,
            };

            match accepted {
                Ok((stream, peer)) => {
                    trace!(%peer, "connection accepted");
                    (self.spawn_connection)(stream, peer);
                }
                Err(err) => warn!(error = %err, "accept failed"),
            }
        }

        self.state.listening.store(false, Ordering::Release);
        info!("listener closed");
    }
}

//

/// Builder for configuring and creating [`Server`] instances.
///
/// Required components: [`listener`](ServerBuilder::listener) and
/// [`handler`](ServerBuilder::handler). Everything else - upgrade handler,
/// connection filter, limits - has a default.
pub struct ServerBuilder<H, S = (), U = (), F = ()>
where
    H: Handler<S>,
    S: ConnectionData,
    U: UpgradeHandler,
    F: ConnectionFilter,
{
    listener: Option<TcpListener>,
    handler: Option<Arc<H>>,
    upgrade_handler: Arc<U>,
    connection_filter: Arc<F>,
    _marker: PhantomData<S>,

    connection_limits: Option<ConnLimits>,
    request_limits: Option<ReqLimits>,
    response_limits: Option<RespLimits>,
}

impl<H, S, U, F> ServerBuilder<H, S, U, F>
where
    H: Handler<S>,
    S: ConnectionData,
    U: UpgradeHandler,
    F: ConnectionFilter,
{
    /// Sets the TCP listener the server will accept connections from.
    ///
    /// **This is a required component.** Use [`bind`] to construct one, or
    /// hand over any pre-configured [`TcpListener`].
    #[inline(always)]
    pub fn listener(mut self, listener: TcpListener) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Sets the request handler that will process incoming requests.
    ///
    /// **This is a required component.**
    #[inline(always)]
    pub fn handler(mut self, handler: H) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Installs a protocol upgrade handler.
    ///
    /// Without one, every request carrying an `Upgrade` header closes its
    /// connection (see [`UpgradeHandler`]).
    #[inline(always)]
    pub fn upgrade_handler<NewU>(self, upgrade: NewU) -> ServerBuilder<H, S, NewU, F>
    where
        NewU: UpgradeHandler,
    {
        ServerBuilder {
            listener: self.listener,
            handler: self.handler,
            upgrade_handler: Arc::new(upgrade),
            connection_filter: self.connection_filter,
            _marker: PhantomData,

            connection_limits: self.connection_limits,
            request_limits: self.request_limits,
            response_limits: self.response_limits,
        }
    }

    /// Installs a connection filter to check incoming TCP connections
    /// before the first read (see [`ConnectionFilter`]).
    #[inline(always)]
    pub fn conn_filter<NewF>(self, filter: NewF) -> ServerBuilder<H, S, U, NewF>
    where
        NewF: ConnectionFilter,
    {
        ServerBuilder {
            listener: self.listener,
            handler: self.handler,
            upgrade_handler: self.upgrade_handler,
            connection_filter: Arc::new(filter),
            _marker: PhantomData,

            connection_limits: self.connection_limits,
            request_limits: self.request_limits,
            response_limits: self.response_limits,
        }
    }

    /// Configures connection behavior across keep-alive exchanges.
    #[inline(always)]
    pub fn connection_limits(mut self, limits: ConnLimits) -> Self {
        self.connection_limits = Some(limits);
        self
    }

    /// Configures request parsing limits.
    #[inline(always)]
    pub fn request_limits(mut self, limits: ReqLimits) -> Self {
        self.request_limits = Some(limits);
        self
    }

    /// Configures response buffer management.
    #[inline(always)]
    pub fn response_limits(mut self, limits: RespLimits) -> Self {
        self.response_limits = Some(limits);
        self
    }

    /// Finalizes the builder and constructs a [`Server`] instance.
    ///
    /// # Panics
    ///
    /// Error messages:
    /// - ``The `listener` method must be called to create``
    /// - ``The `handler` method must be called to create``
    ///
    /// Panics when:
    /// - The `listener` method was not called.
    /// - The `handler` method was not called.
    #[inline]
    #[track_caller]
    pub fn build(self) -> Server {
        let listener = self
            .listener
            .expect("The `listener` method must be called to create");
        let handler = self
            .handler
            .expect("The `handler` method must be called to create");
        let upgrade = self.upgrade_handler;
        let filter = self.connection_filter;

        let limits: AllLimits = (
            self.connection_limits.unwrap_or_default(),
            self.request_limits.unwrap_or_default(),
            self.response_limits.unwrap_or_default(),
        );

        let spawn_connection: SpawnFn = Box::new(move |stream, peer| {
            let handler = handler.clone();
            let upgrade = upgrade.clone();
            let filter = filter.clone();
            let limits = limits.clone();

            tokio::spawn(async move {
                let _ = stream.set_nodelay(true);
                let Ok(local_addr) = stream.local_addr() else {
                    return;
                };

                let mut conn = HttpConnection::<H, S, U>::new(handler, upgrade, limits);

                if filter.filter(peer, local_addr, &mut conn.response).is_err() {
                    let mut stream = stream;
                    let _ = writer::write_bytes(&mut stream, conn.response.buffer()).await;
                    return;
                }

                conn.run(stream).await;
            });
        });

        Server {
            listener,
            state: Arc::new(ListenerState::new()),
            spawn_connection,
        }
    }
}
