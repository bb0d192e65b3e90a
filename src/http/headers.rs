//! Ordered, case-preserving header storage

/// A single header line.
///
/// Name and value are stored exactly as received or set; nothing is
/// normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub(crate) name: String,
    pub(crate) value: String,
}

impl Header {
    /// Returns the header name with its original casing.
    #[inline(always)]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the header value.
    #[inline(always)]
    pub fn value(&self) -> &str {
        &self.value
    }
}

/// Ordered multimap of HTTP headers.
///
/// Lookup is case-insensitive per
/// [RFC 7230](https://tools.ietf.org/html/rfc7230#section-3.2); storage and
/// serialization preserve the original name casing and insertion order.
/// Repeated names are kept as separate entries and serialize as repeated
/// header lines. Uses linear search - header counts are bounded by
/// [`ReqLimits::header_count`](crate::limits::ReqLimits::header_count) on
/// the request side and stay small in practice on the response side.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HeaderMap {
    entries: Vec<Header>,
}

impl HeaderMap {
    #[inline(always)]
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    #[inline(always)]
    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    #[inline(always)]
    pub(crate) fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push(Header {
            name: name.into(),
            value: value.into(),
        });
    }

    // Serializes every entry as `name: value\r\n`, in insertion order.
    #[inline]
    pub(crate) fn write_to(&self, buffer: &mut Vec<u8>) {
        for header in &self.entries {
            buffer.extend_from_slice(header.name.as_bytes());
            buffer.extend_from_slice(b": ");
            buffer.extend_from_slice(header.value.as_bytes());
            buffer.extend_from_slice(b"\r\n");
        }
    }
}

// Public API
impl HeaderMap {
    /// Returns the first value for `name`, matching case-insensitively.
    #[inline(always)]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    /// Returns every value for `name` in insertion order,
    /// matching case-insensitively.
    #[inline]
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> {
        self.entries
            .iter()
            .filter(move |h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    /// Returns `true` if at least one entry matches `name`
    /// case-insensitively.
    #[inline(always)]
    pub fn contains(&self, name: &str) -> bool {
        self.entries
            .iter()
            .any(|h| h.name.eq_ignore_ascii_case(name))
    }

    /// Iterates over all `(name, value)` pairs in insertion order.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|h| (h.name.as_str(), h.value.as_str()))
    }

    /// Returns the number of entries, repeated names counted separately.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no headers are stored.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
