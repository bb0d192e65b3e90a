//! HTTP response builder with explicit head/body/end lifecycle.

use crate::{
    http::{
        headers::HeaderMap,
        types::{self, StatusCode, Version},
    },
    limits::RespLimits,
};

/// HTTP response builder for constructing server responses.
///
/// Instances are created by the server and passed to
/// [`Handler::handle`](crate::Handler::handle); like the request they are
/// reused across a connection's keep-alive exchanges and cleared in place
/// in between.
///
/// A response moves through three states:
///
/// - **unsent** - status and headers may still change
/// - **head sent** - the status line and headers are serialized; only body
///   writes are allowed from here on
/// - **ended** - terminal; further [`end()`](Response::end) calls have no
///   wire effect
///
/// Two ways to produce a body:
///
/// - [`send()`](Response::send) / [`send_with()`](Response::send_with) -
///   one shot, `content-length` computed automatically
/// - [`write_head()`](Response::write_head) + [`write()`](Response::write)
///   + [`end()`](Response::end) - streaming; when no length is declared up
///   front the body goes out in chunked framing on HTTP/1.1, and
///   close-delimited on HTTP/1.0
///
/// Every finalizing method returns [`Handled`], the token a
/// [`Handler`](crate::Handler) must produce - a handler cannot forget to
/// complete its response.
///
/// # Examples
/// ```
/// # surge_web::run_test(|_, resp| {
/// use surge_web::StatusCode;
///
/// resp.status(StatusCode::Ok)
///     .header("content-type", "text/html")
///     .send("<h1>Hello World</h1>")
/// # });
/// ```
///
/// # Panics
/// Lifecycle violations (mutating headers after the head went out, writing
/// after `end()`) panic in `debug` mode. In `release` mode these checks are
/// omitted for performance, which may produce invalid HTTP responses.
/// Before creating a release version, conduct tests.
#[derive(Debug)]
pub struct Response {
    pub(crate) version: Version,
    pub(crate) keep_alive: bool,

    status: StatusCode,
    headers: HeaderMap,
    state: ResponseState,
    framing: Framing,

    body_written: usize,
    length_at: usize,
    body_start: usize,
    buffer: Vec<u8>,
}

/// Proof that a response was driven to its terminal state.
///
/// Only the finalizing methods of [`Response`] produce this token.
#[doc(hidden)]
pub struct Handled(pub(crate) ());

#[derive(Debug, Clone, Copy, PartialEq)]
enum ResponseState {
    Unsent,
    HeadSent,
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Framing {
    /// Total length was known at head-send time.
    Sized(usize),
    /// Length unknown on HTTP/1.1: chunked transfer coding.
    Chunked,
    /// Length unknown on HTTP/1.0: body runs until the connection closes.
    Unframed,
}

impl Response {
    #[inline(always)]
    pub(crate) fn new(limits: &RespLimits) -> Self {
        Self {
            version: Version::Http11,
            keep_alive: true,

            status: StatusCode::Ok,
            headers: HeaderMap::default(),
            state: ResponseState::Unsent,
            framing: Framing::Unframed,

            body_written: 0,
            length_at: 0,
            body_start: 0,
            buffer: Vec::with_capacity(limits.default_capacity),
        }
    }

    #[inline(always)]
    pub(crate) fn reset(&mut self, limits: &RespLimits) {
        if self.buffer.capacity() > limits.max_capacity {
            self.buffer = Vec::with_capacity(limits.default_capacity);
        } else {
            self.buffer.clear();
        }

        self.version = Version::Http11;
        self.keep_alive = true;
        self.status = StatusCode::Ok;
        self.headers.clear();
        self.state = ResponseState::Unsent;
        self.framing = Framing::Unframed;
        self.body_written = 0;
        self.length_at = 0;
        self.body_start = 0;
    }

    #[inline(always)]
    pub(crate) fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    #[inline(always)]
    pub(crate) fn is_ended(&self) -> bool {
        self.state == ResponseState::Ended
    }
}

/// Status, headers and the keep-alive decision
impl Response {
    /// Sets the HTTP status code; the default is `200 OK`.
    ///
    /// # Examples
    /// ```
    /// # surge_web::run_test(|_, resp| {
    /// use surge_web::StatusCode;
    ///
    /// resp.status(StatusCode::NotFound)
    ///     .send(r#"{"status": "not found", "code": 404}"#)
    /// # });
    /// ```
    ///
    /// # Panics
    /// Panics in `debug` mode when called after the head was sent.
    #[inline]
    #[track_caller]
    pub fn status(&mut self, status: StatusCode) -> &mut Self {
        debug_assert!(
            self.state == ResponseState::Unsent,
            "Headers are frozen once the head is sent"
        );

        self.status = status;
        self
    }

    /// Appends a header to the response.
    ///
    /// Name casing and insertion order are preserved on the wire, and a
    /// repeated name goes out as repeated header lines.
    ///
    /// PLEASE DO NOT ADD THE FOLLOWING HEADINGS:
    /// - `content-length` - calculated automatically
    /// - `connection` - use [`close()`](Response::close)
    ///
    /// # Examples
    /// ```
    /// # surge_web::run_test(|_, resp| {
    /// use surge_web::StatusCode;
    ///
    /// resp.status(StatusCode::Ok)
    ///     .header("content-type", "text/plain")
    ///     .header("x-request-id", "7f9c")
    ///     .send("Done")
    /// # });
    /// ```
    ///
    /// # Panics
    /// Panics in `debug` mode when called after the head was sent.
    #[inline]
    #[track_caller]
    pub fn header(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        debug_assert!(
            self.state == ResponseState::Unsent,
            "Headers are frozen once the head is sent"
        );

        self.headers.append(name, value);
        self
    }

    /// Forces the connection to close after this response.
    ///
    /// The close is announced to the client with a `connection: close`
    /// header, so it must be decided before the head goes out.
    ///
    /// # Examples
    /// ```
    /// # surge_web::run_test(|_, resp| {
    /// use surge_web::StatusCode;
    ///
    /// resp.status(StatusCode::Ok)
    ///     .close()  // Connection will close after this response
    ///     .send("Closing connection")
    /// # });
    /// ```
    ///
    /// # Panics
    /// Panics in `debug` mode when called after the head was sent.
    #[inline]
    #[track_caller]
    pub fn close(&mut self) -> &mut Self {
        debug_assert!(
            self.state == ResponseState::Unsent,
            "Must be decided before the head is sent"
        );

        self.keep_alive = false;
        self
    }
}

/// One-shot finalizers
impl Response {
    /// Writes the whole response and finalizes it.
    ///
    /// # Side Effects
    /// - Adds a `connection` header if necessary
    /// - Calculates and sets the `content-length` header
    ///
    /// # Examples
    /// ```
    /// # surge_web::run_test(|_, resp| {
    /// use surge_web::StatusCode;
    ///
    /// resp.status(StatusCode::Ok)
    ///     .header("content-type", "text/plain")
    ///     .send("Hello, World!")
    /// # });
    /// ```
    ///
    /// # Panics
    /// Panics in `debug` mode when the response was already finalized or
    /// its head already sent.
    #[inline]
    #[track_caller]
    pub fn send<T: WriteBuffer>(&mut self, body: T) -> Handled {
        debug_assert!(
            self.state == ResponseState::Unsent,
            "Must be the response's only finalizing call"
        );

        self.send_head_deferred_length();
        body.write_to(&mut self.buffer);
        self.patch_content_length();

        self.state = ResponseState::Ended;
        Handled(())
    }

    /// Writes the response body via closure and finalizes the response.
    ///
    /// # Examples
    /// ```
    /// # surge_web::run_test(|_, resp| {
    /// use surge_web::StatusCode;
    /// use std::io::Write;
    ///
    /// resp.status(StatusCode::Ok)
    ///     .header("content-type", "application/json")
    ///     .send_with(|writer| {
    ///         let _ = write!(writer, r#"{{"status": "ok", "id": {}}}"#, 12345);
    ///     })
    /// # });
    /// ```
    ///
    /// # Panics
    /// Panics in `debug` mode when the response was already finalized or
    /// its head already sent.
    #[inline]
    #[track_caller]
    pub fn send_with<F: FnOnce(&mut BodyWriter)>(&mut self, f: F) -> Handled {
        debug_assert!(
            self.state == ResponseState::Unsent,
            "Must be the response's only finalizing call"
        );

        self.send_head_deferred_length();
        f(&mut BodyWriter(&mut self.buffer));
        self.patch_content_length();

        self.state = ResponseState::Ended;
        Handled(())
    }
}

/// Streaming: explicit head, incremental body, explicit end
impl Response {
    /// Serializes the status line and headers, freezing them.
    ///
    /// When no `content-length` is known at this point the body is framed
    /// with chunked transfer coding on HTTP/1.1; on HTTP/1.0, which has no
    /// chunked coding, the body is close-delimited and the keep-alive
    /// decision resolves to close.
    ///
    /// # Panics
    /// Panics in `debug` mode when the head was already sent.
    #[inline]
    #[track_caller]
    pub fn write_head(&mut self) -> &mut Self {
        debug_assert!(self.state == ResponseState::Unsent, "Head already sent");

        self.send_head(None);
        self
    }

    /// Appends one body chunk, sending the head first if it has not gone
    /// out yet.
    ///
    /// Under chunked framing every call produces one chunk on the wire.
    /// Empty chunks are skipped - a zero-length chunk would terminate the
    /// chunked body early.
    ///
    /// # Examples
    /// ```
    /// # surge_web::run_test(|_, resp| {
    /// use surge_web::StatusCode;
    ///
    /// resp.status(StatusCode::Ok)
    ///     .header("content-type", "text/plain")
    ///     .write_head()
    ///     .write("chunk one, ")
    ///     .write("chunk two")
    ///     .end()
    /// # });
    /// ```
    ///
    /// # Panics
    /// Panics in `debug` mode after [`end()`](Response::end), or when a
    /// declared `content-length` is exceeded.
    #[inline]
    #[track_caller]
    pub fn write(&mut self, chunk: impl AsRef<[u8]>) -> &mut Self {
        debug_assert!(
            self.state != ResponseState::Ended,
            "No body writes after end()"
        );

        if self.state == ResponseState::Unsent {
            self.send_head(None);
        }

        let chunk = chunk.as_ref();
        if chunk.is_empty() {
            return self;
        }

        match self.framing {
            Framing::Chunked => {
                let (arr, start) = Self::number_to_hex_bytes(chunk.len());
                self.buffer.extend_from_slice(&arr[start..]);
                self.buffer.extend_from_slice(b"\r\n");
                self.buffer.extend_from_slice(chunk);
                self.buffer.extend_from_slice(b"\r\n");
            }
            Framing::Sized(declared) => {
                debug_assert!(
                    self.body_written + chunk.len() <= declared,
                    "Body exceeds the declared content-length"
                );
                self.buffer.extend_from_slice(chunk);
            }
            Framing::Unframed => self.buffer.extend_from_slice(chunk),
        }

        self.body_written += chunk.len();
        self
    }

    /// Finalizes the response.
    ///
    /// Called on an unsent response it produces an empty-bodied one; under
    /// chunked framing it emits the terminal zero chunk. Calling `end()`
    /// again after that has no further wire effect.
    #[inline]
    pub fn end(&mut self) -> Handled {
        match self.state {
            ResponseState::Unsent => {
                self.send_head(Some(0));
                self.state = ResponseState::Ended;
            }
            ResponseState::HeadSent => {
                if self.framing == Framing::Chunked {
                    self.buffer.extend_from_slice(b"0\r\n\r\n");
                }
                if let Framing::Sized(declared) = self.framing {
                    debug_assert!(
                        self.body_written == declared,
                        "Body shorter than the declared content-length"
                    );
                }
                self.state = ResponseState::Ended;
            }
            ResponseState::Ended => {}
        }

        Handled(())
    }
}

// Serialization
impl Response {
    // Resolves the keep-alive intent against explicit response headers and
    // picks the body framing, then serializes the complete head.
    fn send_head(&mut self, length: Option<usize>) {
        let (connection_set, declared_length) = self.scan_overrides();

        let framing = match (length, declared_length) {
            (Some(n), None) => Framing::Sized(n),
            (_, Some(n)) => Framing::Sized(n),
            (None, None) => match self.version {
                Version::Http11 => Framing::Chunked,
                Version::Http10 => {
                    self.keep_alive = false;
                    Framing::Unframed
                }
            },
        };

        self.emit_head_prefix(connection_set);

        match framing {
            Framing::Sized(n) if declared_length.is_none() => {
                self.buffer.extend_from_slice(b"content-length: ");
                let (arr, start) = Self::number_to_bytes(n as u128);
                self.buffer.extend_from_slice(&arr[start..]);
                self.buffer.extend_from_slice(b"\r\n");
            }
            Framing::Chunked => {
                self.buffer.extend_from_slice(b"transfer-encoding: chunked\r\n");
            }
            _ => {}
        }

        self.buffer.extend_from_slice(b"\r\n");
        self.framing = framing;
        self.state = ResponseState::HeadSent;
    }

    // The one-shot path: the length is known only after the body is
    // written, so a fixed-width placeholder goes out and is patched later.
    fn send_head_deferred_length(&mut self) {
        let (connection_set, _) = self.scan_overrides();

        self.emit_head_prefix(connection_set);

        self.buffer.extend_from_slice(b"content-length: ");
        self.length_at = self.buffer.len();
        self.buffer.extend_from_slice(b"0000000000\r\n\r\n");
        self.body_start = self.buffer.len();

        self.framing = Framing::Sized(0);
        self.state = ResponseState::HeadSent;
    }

    #[inline(always)]
    fn patch_content_length(&mut self) {
        let body_len = self.buffer.len() - self.body_start;
        let (arr, _) = Self::number_to_bytes(body_len as u128);

        let target_range = self.length_at..self.length_at + 10;
        self.buffer[target_range].copy_from_slice(&arr[29..39]);
        self.framing = Framing::Sized(body_len);
        self.body_written = body_len;
    }

    // An explicit `connection` header on the response overrides the intent
    // derived from the request; an explicit `content-length` overrides the
    // automatic framing choice.
    fn scan_overrides(&mut self) -> (bool, Option<usize>) {
        let mut keep_alive = self.keep_alive;
        let mut connection_set = false;
        let mut declared_length = None;

        for (name, value) in self.headers.iter() {
            if name.eq_ignore_ascii_case("connection") {
                connection_set = true;
                for token in value.split(',') {
                    let token = token.trim();
                    if token.eq_ignore_ascii_case("close") {
                        keep_alive = false;
                    } else if token.eq_ignore_ascii_case("keep-alive") {
                        keep_alive = true;
                    }
                }
            } else if name.eq_ignore_ascii_case("content-length") {
                declared_length = types::slice_to_usize(value.trim().as_bytes());
            }
        }

        self.keep_alive = keep_alive;
        (connection_set, declared_length)
    }

    #[inline]
    fn emit_head_prefix(&mut self, connection_set: bool) {
        self.buffer
            .extend_from_slice(self.status.first_line(self.version));
        self.headers.write_to(&mut self.buffer);

        if !connection_set {
            match (self.version, self.keep_alive) {
                (Version::Http11, true) => {}
                (Version::Http11, false) => {
                    self.buffer.extend_from_slice(b"connection: close\r\n")
                }
                (Version::Http10, true) => self
                    .buffer
                    .extend_from_slice(b"connection: keep-alive\r\n"),
                (Version::Http10, false) => {
                    self.buffer.extend_from_slice(b"connection: close\r\n")
                }
            }
        }
    }

    #[inline]
    const fn number_to_bytes(mut n: u128) -> ([u8; 39], usize) {
        let mut buffer = [b'0'; 39];
        let mut i = 39;

        if n == 0 {
            return (buffer, 38);
        }

        while n > 0 {
            i -= 1;
            buffer[i] = b'0' + (n % 10) as u8;
            n /= 10;
        }

        (buffer, i)
    }

    #[inline]
    const fn number_to_hex_bytes(mut n: usize) -> ([u8; 16], usize) {
        let mut buffer = [b'0'; 16];
        let mut i = 16;

        if n == 0 {
            return (buffer, 15);
        }

        while n > 0 {
            i -= 1;
            let digit = (n % 16) as u8;
            buffer[i] = if digit < 10 { b'0' + digit } else { b'a' + digit - 10 };
            n /= 16;
        }

        (buffer, i)
    }
}

pub mod write {
    use super::*;

    /// Writer for constructing the HTTP response body.
    /// Used in [send_with](Response::send_with).
    ///
    /// # Examples
    ///
    /// With [std::io::Write]:
    /// ```
    /// # surge_web::run_test(|_, resp| {
    /// use surge_web::StatusCode;
    /// use std::io::Write;
    ///
    /// resp.status(StatusCode::Ok)
    ///     .send_with(|w| {
    ///         let _ = write!(w, "{} - {} = {}", 6, 2, 4);
    ///     })
    /// # });
    /// ```
    #[derive(Debug)]
    pub struct BodyWriter<'a>(pub(crate) &'a mut Vec<u8>);

    impl BodyWriter<'_> {
        /// Appends content to the response body.
        #[inline]
        pub fn write<T: WriteBuffer>(&mut self, value: T) {
            value.write_to(self.0);
        }
    }

    impl std::io::Write for BodyWriter<'_> {
        #[inline]
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.extend_from_slice(buf);
            Ok(buf.len())
        }

        #[inline]
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// Trait for writing data to the [`Response`] buffer.
    ///
    /// Implemented for common string, byte and integer types. Floats are
    /// deliberately absent: protocol text has no business depending on
    /// locale or precision formatting.
    ///
    /// # Example
    /// ```
    /// use surge_web::WriteBuffer;
    ///
    /// struct MyString(String);
    ///
    /// impl WriteBuffer for MyString {
    ///     fn write_to(&self, buffer: &mut Vec<u8>) {
    ///         buffer.extend_from_slice(self.0.as_bytes())
    ///     }
    /// }
    /// ```
    pub trait WriteBuffer {
        /// Writes the value's representation directly to the buffer.
        fn write_to(&self, buffer: &mut Vec<u8>);
    }

    impl<T: WriteBuffer + ?Sized> WriteBuffer for &T {
        #[inline]
        fn write_to(&self, buffer: &mut Vec<u8>) {
            T::write_to(*self, buffer);
        }
    }

    impl WriteBuffer for str {
        #[inline]
        fn write_to(&self, buffer: &mut Vec<u8>) {
            buffer.extend_from_slice(self.as_bytes());
        }
    }
    impl WriteBuffer for String {
        #[inline]
        fn write_to(&self, buffer: &mut Vec<u8>) {
            buffer.extend_from_slice(self.as_bytes());
        }
    }
    impl WriteBuffer for [u8] {
        #[inline]
        fn write_to(&self, buffer: &mut Vec<u8>) {
            buffer.extend_from_slice(self);
        }
    }
    impl WriteBuffer for Vec<u8> {
        #[inline]
        fn write_to(&self, buffer: &mut Vec<u8>) {
            buffer.extend_from_slice(self);
        }
    }
    impl<const N: usize> WriteBuffer for [u8; N] {
        #[inline]
        fn write_to(&self, buffer: &mut Vec<u8>) {
            buffer.extend_from_slice(self);
        }
    }
    impl WriteBuffer for bool {
        #[inline]
        fn write_to(&self, buffer: &mut Vec<u8>) {
            buffer.extend_from_slice(match self {
                true => b"true",
                false => b"false",
            });
        }
    }

    macro_rules! impl_write_buffer {
        (unsigned => $($t:ty),*) => {
            $(impl WriteBuffer for $t {
                #[inline] fn write_to(&self, buffer: &mut Vec<u8>) {
                    let (arr, start) = Response::number_to_bytes(*self as u128);
                    buffer.extend_from_slice(&arr[start..]);
                }
            })*
        };
        (signed => $($t:ty),*) => {
            $(impl WriteBuffer for $t {
                #[inline] fn write_to(&self, buffer: &mut Vec<u8>) {
                    if *self < 0 {
                        buffer.push(b'-');
                    }
                    let (arr, start) = Response::number_to_bytes(self.unsigned_abs() as u128);
                    buffer.extend_from_slice(&arr[start..]);
                }
            })*
        };
    }

    impl_write_buffer! { unsigned => u8, u16, u32, u64, u128, usize }
    impl_write_buffer! { signed => i8, i16, i32, i64, i128, isize }
}
pub use write::{BodyWriter, WriteBuffer};

#[cfg(test)]
mod status_tests {
    use super::*;
    use crate::tools::*;

    #[test]
    fn first_line() {
        let cases = [
            (StatusCode::Ok, "HTTP/1.1 200 OK\r\n"),
            (StatusCode::NotFound, "HTTP/1.1 404 Not Found\r\n"),
            (StatusCode::Found, "HTTP/1.1 302 Found\r\n"),
            (StatusCode::BadRequest, "HTTP/1.1 400 Bad Request\r\n"),
        ];

        for (status, expected) in cases {
            let mut resp = Response::new(&RespLimits::default());
            resp.status(status).send("");

            assert!(str_op(resp.buffer()).starts_with(expected), "{status:?}");
        }
    }

    #[test]
    fn default_is_200() {
        let mut resp = Response::new(&RespLimits::default());
        resp.send("ok");

        assert!(str_op(resp.buffer()).starts_with("HTTP/1.1 200 OK\r\n"));
    }

    #[test]
    #[should_panic(expected = "Headers are frozen once the head is sent")]
    fn status_after_head() {
        let mut resp = Response::new(&RespLimits::default());
        resp.write_head();
        resp.status(StatusCode::Found);
    }
}


#[cfg(test)]
mod close_tests {
    use super::*;
    use crate::tools::*;

    #[test]
    fn connection_header_table() {
        #[rustfmt::skip]
        let cases = [
            (Version::Http11, false, ""),
            (Version::Http11, true,  "connection: close\r\n"),
            (Version::Http10, false, "connection: keep-alive\r\n"),
            (Version::Http10, true,  "connection: close\r\n"),
        ];

        for (version, is_close, header) in cases {
            let mut resp = Response::new(&RespLimits::default());
            resp.version = version;

            assert!(resp.keep_alive);
            if is_close {
                resp.close();
                assert!(!resp.keep_alive);
            }

            resp.status(StatusCode::Ok).send("");
            assert_eq!(
                str_op(resp.buffer()),
                format!(
                    "{}{header}content-length: 0000000000\r\n\r\n",
                    str_op(StatusCode::Ok.first_line(version))
                )
            );
        }
    }

    #[test]
    #[should_panic(expected = "Must be decided before the head is sent")]
    fn close_after_head() {
        let mut resp = Response::new(&RespLimits::default());
        resp.write_head();
        resp.close();
    }
}


#[cfg(test)]
mod streaming_tests {
    use super::*;
    use crate::tools::*;

    #[test]
    fn chunked_when_length_unknown() {
        let mut resp = Response::new(&RespLimits::default());
        resp.status(StatusCode::Ok)
            .write_head()
            .write("Hello")
            .write(" world!")
            .end();

        assert_eq!(
            str_op(resp.buffer()),
            "HTTP/1.1 200 OK\r\ntransfer-encoding: chunked\r\n\r\n\
             5\r\nHello\r\n7\r\n world!\r\n0\r\n\r\n"
        );
    }

    #[test]
    fn sized_when_length_declared() {
        let mut resp = Response::new(&RespLimits::default());
        resp.status(StatusCode::Ok)
            .header("content-length", "12")
            .write_head()
            .write("Hello")
            .write(" world!")
            .end();

        assert_eq!(
            str_op(resp.buffer()),
            "HTTP/1.1 200 OK\r\ncontent-length: 12\r\n\r\nHello world!"
        );
    }

    #[test]
    fn http10_streams_close_delimited() {
        let mut resp = Response::new(&RespLimits::default());
        resp.version = Version::Http10;

        resp.status(StatusCode::Ok)
            .write_head()
            .write("raw body")
            .end();

        assert!(!resp.keep_alive);
        assert_eq!(
            str_op(resp.buffer()),
            "HTTP/1.0 200 OK\r\nconnection: close\r\n\r\nraw body"
        );
    }

    #[test]
    fn empty_chunks_are_skipped() {
        let mut resp = Response::new(&RespLimits::default());
        resp.write_head().write("").write("x").write("").end();

        assert_eq!(
            str_op(resp.buffer()),
            "HTTP/1.1 200 OK\r\ntransfer-encoding: chunked\r\n\r\n1\r\nx\r\n0\r\n\r\n"
        );
    }

    #[test]
    fn end_without_head_sends_empty_response() {
        let mut resp = Response::new(&RespLimits::default());
        resp.end();

        assert_eq!(
            str_op(resp.buffer()),
            "HTTP/1.1 200 OK\r\ncontent-length: 0\r\n\r\n"
        );
    }

    #[test]
    fn end_is_idempotent() {
        let mut resp = Response::new(&RespLimits::default());
        resp.write_head().write("data").end();

        let first = resp.buffer().to_vec();
        resp.end();
        resp.end();

        // No duplicate terminal framing.
        assert_eq!(resp.buffer(), &first[..]);
    }

    #[test]
    #[should_panic(expected = "No body writes after end()")]
    fn write_after_end() {
        let mut resp = Response::new(&RespLimits::default());
        resp.write_head().end();
        resp.write("late");
    }
}

#[cfg(test)]
mod reset_tests {
    use super::*;
    use crate::tools::*;

    #[test]
    fn reset_makes_the_response_reusable() {
        let limits = RespLimits::default();
        let mut resp = Response::new(&limits);

        resp.version = Version::Http10;
        resp.status(StatusCode::NotFound)
            .header("x-first", "1")
            .close()
            .send("first exchange");
        assert!(resp.is_ended());

        resp.reset(&limits);
        assert!(!resp.is_ended());
        assert!(resp.keep_alive);
        assert_eq!(resp.version, Version::Http11);
        assert!(resp.buffer().is_empty());

        // No state from the first exchange leaks into the second.
        resp.status(StatusCode::Ok).send("second");
        let wire = str_op(resp.buffer());
        assert!(!wire.contains("x-first"));
        assert!(wire.starts_with("HTTP/1.1 200 OK\r\n"));
    }

    #[test]
    fn oversized_buffer_is_released() {
        let limits = RespLimits {
            default_capacity: 64,
            max_capacity: 128,
            ..RespLimits::default()
        };
        let mut resp = Response::new(&limits);

        resp.send("x".repeat(4096));
        resp.reset(&limits);

        assert!(resp.buffer.capacity() <= 128);
    }
}
