//! surge_web - Embeddable asynchronous HTTP/1.x server core
//!
//! A small server core built around one idea: a per-connection protocol
//! state machine that multiplexes any number of sequential keep-alive
//! requests over a single socket, reuses its request/response pair between
//! exchanges instead of reallocating, and hands the socket away cleanly
//! when a client negotiates a protocol upgrade.
//!
//! # Protocol Support
//!
//! - **HTTP/1.1**: persistent connections, pipelining, chunked bodies in
//!   both directions, `Upgrade` handoff
//! - **HTTP/1.0**: close-by-default connections, explicit
//!   `Connection: keep-alive` honored
//!
//! # Design
//!
//! - **Object reuse** - each connection owns exactly one [`Request`] and one
//!   [`Response`]; both are cleared in place between keep-alive exchanges
//! - **Incremental parsing** - bytes may arrive split across any protocol
//!   boundary; parse state is kept across socket reads
//! - **In-order dispatch** - pipelined requests are answered strictly in
//!   arrival order, one handler call per request
//! - **Upgrade as a move** - on an accepted upgrade the connection
//!   relinquishes the socket to the [`UpgradeHandler`] and never touches it
//!   again; the handler owns its lifecycle from there
//! - **No timeouts of its own** - disconnect is the only cancellation
//!   signal; deadline policy belongs to the layer that wraps the transport
//!
//! # Examples
//!
//! Quick start:
//! ```no_run
//! use surge_web::{Server, Handler, Request, Response, Handled, StatusCode};
//!
//! struct MyHandler;
//!
//! impl Handler<()> for MyHandler {
//!     async fn handle(&self, _: &mut (), _: &Request, resp: &mut Response) -> Handled {
//!         resp.status(StatusCode::Ok).send("Hello World!")
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     Server::builder()
//!         .listener(surge_web::bind("127.0.0.1:8080".parse().unwrap()).unwrap())
//!         .handler(MyHandler)
//!         .build()
//!         .launch()
//!         .await;
//! }
//! ```
//! Streaming a response with chunked framing:
//! ```no_run
//! use surge_web::{Server, Handler, Request, Response, Handled, StatusCode};
//!
//! struct Streaming;
//!
//! impl Handler<()> for Streaming {
//!     async fn handle(&self, _: &mut (), _: &Request, resp: &mut Response) -> Handled {
//!         resp.status(StatusCode::Ok)
//!             .header("Content-Type", "text/plain")
//!             .write_head()
//!             .write("part one, ")
//!             .write("part two")
//!             .end()
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     Server::builder()
//!         .listener(surge_web::bind("127.0.0.1:8080".parse().unwrap()).unwrap())
//!         .handler(Streaming)
//!         .build()
//!         .launch()
//!         .await;
//! }
//! ```

pub(crate) mod http {
    pub(crate) mod headers;
    pub(crate) mod parser;
    pub(crate) mod request;
    pub(crate) mod response;
    pub(crate) mod types;
}
pub(crate) mod server {
    pub(crate) mod connection;
    pub(crate) mod server_impl;
}
pub(crate) mod errors;
pub mod limits;

pub use crate::{
    http::{
        headers::{Header, HeaderMap},
        request::Request,
        response::{
            write::{BodyWriter, WriteBuffer},
            Handled, Response,
        },
        types::{Method, StatusCode, Url, Version},
    },
    server::{
        connection::ConnectionData,
        server_impl::{
            bind, ConnectionFilter, Handler, Server, ServerBuilder, Shutdown, UpgradeHandler,
        },
    },
};

#[doc(hidden)]
pub fn run_test<F: FnOnce(&Request, &mut Response) -> Handled>(f: F) {
    f(
        &Request::new(&crate::limits::ReqLimits::default()),
        &mut Response::new(&crate::limits::RespLimits::default()),
    );
}

#[doc(hidden)]
#[macro_export]
macro_rules! demo_handler {
    ($name:ident) => {
        use surge_web::{Handled, Handler, Request, Response, StatusCode};
        struct $name;

        impl Handler<()> for $name {
            async fn handle(&self, _: &mut (), _: &Request, resp: &mut Response) -> Handled {
                resp.status(StatusCode::Ok).send("Hello world!")
            }
        }
    };
}

#[cfg(test)]
pub mod tools {
    use std::str::from_utf8;

    #[inline]
    pub fn str_op(value: &[u8]) -> &str {
        from_utf8(value).unwrap()
    }
}
