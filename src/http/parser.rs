use crate::{
    errors::ErrorKind,
    http::{
        request::Request,
        types::{self, Method, Version},
    },
    limits::ReqLimits,
};
use bytes::{Bytes, BytesMut};
use memchr::memchr;

/// Progress reported by [`Parser::advance`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum ParseStatus {
    /// More bytes are needed before the next grammatical unit completes.
    Incomplete,
    /// Request line and all headers are parsed. Reported exactly once per
    /// message; `upgrade` is set when an `Upgrade` header is present.
    HeadersComplete { upgrade: bool },
    /// The message, body included, is fully consumed.
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ParseState {
    RequestLine,
    Headers,
    FixedBody { remaining: usize },
    ChunkSize,
    ChunkData { remaining: usize },
    ChunkDataEnd,
    Trailers { seen: usize },
    Complete,
}

/// Incremental HTTP/1.x request parser.
///
/// Consumes as many buffered bytes as form complete grammatical units
/// (request line, header line, body chunk) and keeps its position across
/// calls - a read may end anywhere, including mid-line. Bytes belonging to
/// a pipelined follow-up request stay in the buffer untouched until
/// [`Parser::reset_message`] starts the next message.
#[derive(Debug)]
pub(crate) struct Parser {
    pub(crate) buf: BytesMut,
    state: ParseState,
}

impl Parser {
    #[inline(always)]
    pub(crate) fn new(limits: &ReqLimits) -> Self {
        Parser {
            buf: BytesMut::with_capacity(limits.request_line_size),
            state: ParseState::RequestLine,
        }
    }

    // Per-message state only; buffered bytes past the previous message
    // boundary are the next request and must survive.
    #[inline(always)]
    pub(crate) fn reset_message(&mut self) {
        self.state = ParseState::RequestLine;
    }

    /// True when no message is underway and nothing is buffered, i.e. a
    /// peer disconnect here is a clean end of the connection rather than a
    /// truncated request.
    #[inline(always)]
    pub(crate) fn is_idle(&self) -> bool {
        matches!(self.state, ParseState::RequestLine) && self.buf.is_empty()
    }

    /// Hands out the buffered bytes past the header terminator: the opening
    /// bytes of the next protocol after an upgrade.
    #[inline(always)]
    pub(crate) fn take_head(&mut self) -> Bytes {
        self.buf.split().freeze()
    }
}

impl Parser {
    /// Advances the parse as far as the buffered bytes allow, filling in
    /// `request` along the way.
    pub(crate) fn advance(
        &mut self,
        request: &mut Request,
        limits: &ReqLimits,
    ) -> Result<ParseStatus, ErrorKind> {
        loop {
            match self.state {
                ParseState::RequestLine => {
                    let Some(line) = self.take_line(
                        limits.request_line_size,
                        ErrorKind::UriTooLong,
                        ErrorKind::InvalidVersion,
                    )?
                    else {
                        return Ok(ParseStatus::Incomplete);
                    };

                    Self::parse_request_line(request, &line, limits)?;
                    self.state = ParseState::Headers;
                }

                ParseState::Headers => {
                    let Some(line) = self.take_line(
                        limits.header_line_size,
                        ErrorKind::InvalidHeader,
                        ErrorKind::InvalidHeader,
                    )?
                    else {
                        return Ok(ParseStatus::Incomplete);
                    };

                    if line.is_empty() {
                        self.state = Self::body_state(request);
                        return Ok(ParseStatus::HeadersComplete {
                            upgrade: request.is_upgrade(),
                        });
                    }

                    Self::parse_header_line(request, &line, limits)?;
                }

                ParseState::FixedBody { remaining } => {
                    if self.buf.is_empty() {
                        return Ok(ParseStatus::Incomplete);
                    }

                    let take = remaining.min(self.buf.len());
                    let chunk = self.buf.split_to(take);
                    request.body.extend_from_slice(&chunk);

                    match remaining - take {
                        0 => self.state = ParseState::Complete,
                        left => self.state = ParseState::FixedBody { remaining: left },
                    }
                }

                ParseState::ChunkSize => {
                    let Some(line) = self.take_line(
                        limits.header_line_size,
                        ErrorKind::InvalidChunk,
                        ErrorKind::InvalidChunk,
                    )?
                    else {
                        return Ok(ParseStatus::Incomplete);
                    };

                    // Chunk extensions after ';' are tolerated and ignored.
                    let size_part = match memchr(b';', &line) {
                        Some(semi) => &line[..semi],
                        None => &line[..],
                    };
                    let size =
                        types::hex_to_usize(size_part).ok_or(ErrorKind::InvalidChunk)?;

                    if request.body.len() + size > limits.body_size {
                        return Err(ErrorKind::BodyTooLarge);
                    }

                    match size {
                        0 => self.state = ParseState::Trailers { seen: 0 },
                        n => self.state = ParseState::ChunkData { remaining: n },
                    }
                }

                ParseState::ChunkData { remaining } => {
                    if self.buf.is_empty() {
                        return Ok(ParseStatus::Incomplete);
                    }

                    let take = remaining.min(self.buf.len());
                    let chunk = self.buf.split_to(take);
                    request.body.extend_from_slice(&chunk);

                    match remaining - take {
                        0 => self.state = ParseState::ChunkDataEnd,
                        left => self.state = ParseState::ChunkData { remaining: left },
                    }
                }

                ParseState::ChunkDataEnd => {
                    if self.buf.len() < 2 {
                        return Ok(ParseStatus::Incomplete);
                    }
                    if &self.buf[..2] != b"\r\n" {
                        return Err(ErrorKind::InvalidChunk);
                    }

                    let _ = self.buf.split_to(2);
                    self.state = ParseState::ChunkSize;
                }

                ParseState::Trailers { seen } => {
                    let Some(line) = self.take_line(
                        limits.header_line_size,
                        ErrorKind::InvalidChunk,
                        ErrorKind::InvalidChunk,
                    )?
                    else {
                        return Ok(ParseStatus::Incomplete);
                    };

                    if line.is_empty() {
                        self.state = ParseState::Complete;
                    } else if seen >= limits.header_count {
                        return Err(ErrorKind::InvalidChunk);
                    } else {
                        // Trailer fields carry no semantics for this server.
                        self.state = ParseState::Trailers { seen: seen + 1 };
                    }
                }

                ParseState::Complete => return Ok(ParseStatus::Complete),
            }
        }
    }

    // Takes one CRLF-terminated line out of the buffer, CRLF stripped.
    // `overflow` fires when the line outgrows `max` bytes, `malformed` when
    // the terminator is a bare LF.
    #[inline]
    fn take_line(
        &mut self,
        max: usize,
        overflow: ErrorKind,
        malformed: ErrorKind,
    ) -> Result<Option<BytesMut>, ErrorKind> {
        match memchr(b'\n', &self.buf) {
            Some(nl) => {
                if nl + 1 > max {
                    return Err(overflow);
                }
                if nl == 0 || self.buf[nl - 1] != b'\r' {
                    return Err(malformed);
                }

                let mut line = self.buf.split_to(nl + 1);
                line.truncate(nl - 1);
                Ok(Some(line))
            }
            None if self.buf.len() > max => Err(overflow),
            None => Ok(None),
        }
    }
}

// Request line and header fields
impl Parser {
    #[inline]
    fn parse_request_line(
        request: &mut Request,
        line: &[u8],
        limits: &ReqLimits,
    ) -> Result<(), ErrorKind> {
        let line = simdutf8::basic::from_utf8(line).map_err(|_| ErrorKind::InvalidUrl)?;
        let mut parts = line.split(' ');

        let method = parts.next().ok_or(ErrorKind::InvalidMethod)?;
        request.method = Method::from_bytes(method.as_bytes())?;

        let target = parts
            .next()
            .filter(|t| !t.is_empty())
            .ok_or(ErrorKind::InvalidUrl)?;
        if !target.starts_with('/') {
            return Err(ErrorKind::InvalidUrl);
        }
        if target.len() > limits.url_size {
            return Err(ErrorKind::UriTooLong);
        }

        let version = parts.next().ok_or(ErrorKind::InvalidVersion)?;
        if parts.next().is_some() {
            return Err(ErrorKind::InvalidVersion);
        }
        request.version = Version::from_bytes(version.as_bytes())?;

        request.url.set(target);
        request.keep_alive = request.version.default_keep_alive();
        Ok(())
    }

    #[inline]
    fn parse_header_line(
        request: &mut Request,
        line: &[u8],
        limits: &ReqLimits,
    ) -> Result<(), ErrorKind> {
        if request.headers.len() >= limits.header_count {
            return Err(ErrorKind::TooManyHeaders);
        }

        let line = simdutf8::basic::from_utf8(line).map_err(|_| ErrorKind::InvalidHeader)?;
        let (name, value) = line.split_once(':').ok_or(ErrorKind::InvalidHeader)?;

        if name.is_empty() || name.bytes().any(|b| b.is_ascii_whitespace()) {
            return Err(ErrorKind::InvalidHeader);
        }
        let value = value.trim_matches(|c| c == ' ' || c == '\t');

        if name.eq_ignore_ascii_case("content-length") {
            let length =
                types::slice_to_usize(value.as_bytes()).ok_or(ErrorKind::InvalidContentLength)?;

            if length > limits.body_size {
                return Err(ErrorKind::BodyTooLarge);
            }
            // Two differing Content-Length fields make the framing
            // untrustworthy (RFC 7230 section 3.3.3).
            match request.content_length {
                Some(existing) if existing != length => {
                    return Err(ErrorKind::InvalidContentLength)
                }
                _ => request.content_length = Some(length),
            }
        } else if name.eq_ignore_ascii_case("connection") {
            for token in value.split(',') {
                let token = token.trim();
                if token.eq_ignore_ascii_case("close") {
                    request.keep_alive = false;
                } else if token.eq_ignore_ascii_case("keep-alive") {
                    request.keep_alive = true;
                }
            }
        } else if name.eq_ignore_ascii_case("transfer-encoding") {
            if !value.eq_ignore_ascii_case("chunked") {
                return Err(ErrorKind::UnsupportedTransferEncoding);
            }
            request.chunked = true;
        }

        request.headers.append(name, value);
        Ok(())
    }

    #[inline]
    fn body_state(request: &Request) -> ParseState {
        if request.chunked {
            // Transfer-Encoding overrides Content-Length (RFC 7230 3.3.3).
            return ParseState::ChunkSize;
        }

        match request.content_length {
            Some(remaining) if remaining > 0 => ParseState::FixedBody { remaining },
            _ => ParseState::Complete,
        }
    }
}





#[cfg(test)]
mod delivery_tests {
    use super::harness::*;
    use super::*;

    #[test]
    fn split_across_every_boundary() {
        let raw = b"POST /api HTTP/1.1\r\nHost: x\r\nContent-Length: 5\r\n\r\nhello";
        let limits = ReqLimits::default();

        let mut parser = Parser::new(&limits);
        let mut request = Request::new(&limits);
        let mut headers_seen = 0;

        for &byte in raw.iter() {
            parser.buf.extend_from_slice(&[byte]);

            loop {
                match parser.advance(&mut request, &limits).unwrap() {
                    ParseStatus::Incomplete => break,
                    ParseStatus::HeadersComplete { upgrade } => {
                        assert!(!upgrade);
                        headers_seen += 1;
                    }
                    ParseStatus::Complete => {
                        assert_eq!(request.body(), b"hello");
                        assert_eq!(headers_seen, 1);
                        return;
                    }
                }
            }
        }

        panic!("message never completed");
    }

    #[test]
    fn pipelined_messages_share_the_buffer() {
        let limits = ReqLimits::default();
        let mut parser = Parser::new(&limits);
        let mut request = Request::new(&limits);

        parser
            .buf
            .extend_from_slice(b"GET /first HTTP/1.1\r\n\r\nGET /second HTTP/1.1\r\n\r\n");

        drive(&mut parser, &mut request, &limits).unwrap();
        assert_eq!(request.url().path(), "/first");
        assert!(!parser.is_idle());

        parser.reset_message();
        request.reset();

        drive(&mut parser, &mut request, &limits).unwrap();
        assert_eq!(request.url().path(), "/second");
        assert!(parser.is_idle());
    }

    #[test]
    fn upgrade_stops_at_the_header_boundary() {
        let limits = ReqLimits::default();
        let mut parser = Parser::new(&limits);
        let mut request = Request::new(&limits);

        parser.buf.extend_from_slice(
            b"GET /chat HTTP/1.1\r\nUpgrade: websocket\r\nConnection: Upgrade\r\n\r\nHELLO",
        );

        let upgraded = drive(&mut parser, &mut request, &limits).unwrap();
        assert!(upgraded);
        assert_eq!(request.upgrade_protocol(), Some("websocket"));

        // Everything past the blank line belongs to the next protocol.
        assert_eq!(&parser.take_head()[..], b"HELLO");
        assert!(parser.buf.is_empty());
    }
}
