use crate::Version;
use std::{error, fmt, io};

#[derive(Debug, PartialEq)]
pub(crate) enum ErrorKind {
    InvalidMethod,
    InvalidUrl,
    UriTooLong,

    InvalidVersion,
    UnsupportedVersion,

    InvalidHeader,
    TooManyHeaders,
    InvalidContentLength,

    InvalidChunk,
    UnsupportedTransferEncoding,
    BodyTooLarge,

    // Kinds without a wire response: the peer either stopped speaking HTTP
    // or is no longer there at all.
    UnsupportedUpgrade,
    Disconnected,
    Io(IoError),
}

macro_rules! http_errors {
    ($($name:ident: $status_code:expr, $len:literal => $json:literal; )*) => {
        /// Best-effort wire response for errors that still deserve one.
        /// Always announces `connection: close`; a request-line position
        /// after a parse error cannot be trusted for continued pipelining.
        pub(crate) const fn as_http(&self, version: Version) -> Option<&'static [u8]> {
            match (self, version) {
                $(
                (Self::$name { .. }, Version::Http11) => Some(concat!(
                    "HTTP/1.1 ", $status_code, "\r\n",
                    "connection: close\r\n",
                    "content-length: ", $len, "\r\n",
                    "content-type: application/json\r\n",
                    "\r\n",
                    $json
                ).as_bytes()),
                (Self::$name { .. }, Version::Http10) => Some(concat!(
                    "HTTP/1.0 ", $status_code, "\r\n",
                    "connection: close\r\n",
                    "content-length: ", $len, "\r\n",
                    "content-type: application/json\r\n",
                    "\r\n",
                    $json
                ).as_bytes()),
                )*
                _ => None,
            }
        }
    };
}

impl ErrorKind {
    http_errors! {
        InvalidMethod: "400 Bad Request", "55"
            => r#"{"error":"Invalid HTTP method","code":"INVALID_METHOD"}"#;

        InvalidUrl: "400 Bad Request", "51"
            => r#"{"error":"Invalid URL format","code":"INVALID_URL"}"#;
        UriTooLong: "414 URI Too Long", "54"
            => r#"{"error":"Request URI too long","code":"URI_TOO_LONG"}"#;

        InvalidVersion: "400 Bad Request", "57"
            => r#"{"error":"Invalid HTTP version","code":"INVALID_VERSION"}"#;
        UnsupportedVersion: "505 HTTP Version Not Supported", "67"
            => r#"{"error":"HTTP version not supported","code":"UNSUPPORTED_VERSION"}"#;

        InvalidHeader: "400 Bad Request", "57"
            => r#"{"error":"Invalid header format","code":"INVALID_HEADER"}"#;
        TooManyHeaders: "431 Request Header Fields Too Large", "54"
            => r#"{"error":"Too many headers","code":"TOO_MANY_HEADERS"}"#;
        InvalidContentLength: "400 Bad Request", "66"
            => r#"{"error":"Invalid Content-Length","code":"INVALID_CONTENT_LENGTH"}"#;

        InvalidChunk: "400 Bad Request", "59"
            => r#"{"error":"Invalid chunked encoding","code":"INVALID_CHUNK"}"#;
        UnsupportedTransferEncoding: "501 Not Implemented", "82"
            => r#"{"error":"Transfer encoding not supported","code":"UNSUPPORTED_TRANSFER_ENCODING"}"#;
        BodyTooLarge: "413 Payload Too Large", "58"
            => r#"{"error":"Request body too large","code":"BODY_TOO_LARGE"}"#;
    }
}

impl error::Error for ErrorKind {}
impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl From<io::Error> for ErrorKind {
    fn from(err: io::Error) -> Self {
        ErrorKind::Io(IoError(err))
    }
}

#[derive(Debug)]
pub(crate) struct IoError(pub(crate) io::Error);

impl PartialEq for IoError {
    fn eq(&self, other: &Self) -> bool {
        self.0.kind() == other.0.kind()
    }
}

#[cfg(test)]
mod wire_responses {
    use super::*;
    use crate::tools::*;

    #[test]
    fn body_lengths_match_declared() {
        let kinds = [
            ErrorKind::InvalidMethod,
            ErrorKind::InvalidUrl,
            ErrorKind::UriTooLong,
            ErrorKind::InvalidVersion,
            ErrorKind::UnsupportedVersion,
            ErrorKind::InvalidHeader,
            ErrorKind::TooManyHeaders,
            ErrorKind::InvalidContentLength,
            ErrorKind::InvalidChunk,
            ErrorKind::UnsupportedTransferEncoding,
            ErrorKind::BodyTooLarge,
        ];

        for kind in kinds {
            for version in [Version::Http10, Version::Http11] {
                let wire = str_op(kind.as_http(version).unwrap());
                let (head, body) = wire.split_once("\r\n\r\n").unwrap();

                let declared: usize = head
                    .lines()
                    .find_map(|line| line.strip_prefix("content-length: "))
                    .unwrap()
                    .trim_end()
                    .parse()
                    .unwrap();

                assert_eq!(declared, body.len(), "{kind:?} over {version:?}");
                assert!(head.contains("connection: close"));
            }
        }
    }

    #[test]
    fn silent_kinds_have_no_wire_response() {
        let kinds = [
            ErrorKind::UnsupportedUpgrade,
            ErrorKind::Disconnected,
            ErrorKind::Io(IoError(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))),
        ];

        for kind in kinds {
            assert_eq!(kind.as_http(Version::Http11), None);
            assert_eq!(kind.as_http(Version::Http10), None);
        }
    }
}
