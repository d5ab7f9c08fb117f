use core::fmt;

/// A structured error code identifying the reason an encode or decode failed.
///
/// This enum is intentionally stable and string-free to remain hot-path friendly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorCode {
    /// Unexpected end of input while decoding (source exhausted mid-item).
    UnexpectedEof,
    /// Arithmetic overflow while computing a length/offset.
    LengthOverflow,
    /// Memory allocation failed while decoding into owned structures.
    AllocationFailed,
    /// Input contains trailing bytes after the expected CBOR data item.
    TrailingBytes,
    /// I/O failure in the underlying source or sink.
    Io,

    /// Reserved additional-info value (28..30) was used.
    ReservedAdditionalInfo,
    /// Ill-formed simple value (two-byte simple encoding a value below 32).
    InvalidSimpleValue,
    /// A break stop-code appeared outside an indefinite-length item.
    MisplacedBreak,
    /// An indefinite-length string contained a chunk of the wrong major type,
    /// or a nested indefinite-length chunk.
    InvalidChunk,
    /// Invalid UTF-8 in a text string.
    Utf8Invalid,

    /// Non-shortest integer/length encoding under strict decoding, or input
    /// that fails canonical-form validation.
    NonCanonicalEncoding,
    /// Indefinite-length emission requested but disabled by the encode options.
    IndefiniteLengthForbidden,

    /// Nesting depth limit exceeded.
    DepthLimitExceeded,
    /// Duplicate map key rejected by decoder policy or canonical encoding.
    DuplicateMapKey,
    /// Total items limit exceeded.
    TotalItemsLimitExceeded,
    /// Array length exceeds decode limits.
    ArrayLenLimitExceeded,
    /// Map length exceeds decode limits.
    MapLenLimitExceeded,
    /// Byte string length exceeds decode limits.
    BytesLenLimitExceeded,
    /// Text string length exceeds decode limits.
    TextLenLimitExceeded,

    /// No encoder is registered for the native value's type.
    UnencodableType,
    /// Unknown tag while the registry is configured to deny unknown tags.
    UnknownTag,
    /// A registry slot is already bound and override was not requested.
    RegistryConflict,
    /// A tag 0/1 payload does not describe a representable date/time.
    InvalidTimestamp,
    /// A well-known tag wraps an item of the wrong type (for example tag 2
    /// around a text string).
    InvalidTagPayload,
}

/// The coarse class of an error, mirroring the codec's failure taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Source exhausted mid-item; retry is possible once more bytes arrive.
    Truncated,
    /// Reserved or ill-formed header byte.
    MalformedHeader,
    /// Indefinite-length framing violated, or unconsumed trailing input.
    MalformedStream,
    /// Text payload is not valid UTF-8 after chunk assembly.
    InvalidUtf8,
    /// Non-canonical encoding rejected under strict or canonical rules.
    NonCanonical,
    /// Nesting beyond the configured depth bound.
    DepthExceeded,
    /// Repeated map key rejected by policy.
    DuplicateKey,
    /// The value cannot be represented as requested.
    Unencodable,
    /// Tag-level decode failure (unknown tag, malformed tag payload).
    Tag,
    /// Registry registration failure.
    Registry,
    /// Resource limit or allocation failure.
    Resource,
    /// I/O failure propagated from the source or sink.
    Io,
}

/// A codec error with a stable code and the byte offset where it was detected.
///
/// Offsets are meaningful for decode errors; encode and registry errors carry
/// the sink position or `0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CborError {
    /// The error code.
    pub code: ErrorCode,
    /// Byte offset into the input/output where the error was detected.
    pub offset: usize,
}

impl CborError {
    /// Construct an error with `code` at `offset`.
    #[inline]
    #[must_use]
    pub const fn new(code: ErrorCode, offset: usize) -> Self {
        Self { code, offset }
    }

    /// The coarse class of this error.
    #[must_use]
    pub const fn kind(self) -> ErrorKind {
        match self.code {
            ErrorCode::UnexpectedEof => ErrorKind::Truncated,
            ErrorCode::ReservedAdditionalInfo | ErrorCode::InvalidSimpleValue => {
                ErrorKind::MalformedHeader
            }
            ErrorCode::MisplacedBreak | ErrorCode::InvalidChunk | ErrorCode::TrailingBytes => {
                ErrorKind::MalformedStream
            }
            ErrorCode::Utf8Invalid => ErrorKind::InvalidUtf8,
            ErrorCode::NonCanonicalEncoding => ErrorKind::NonCanonical,
            ErrorCode::DepthLimitExceeded => ErrorKind::DepthExceeded,
            ErrorCode::DuplicateMapKey => ErrorKind::DuplicateKey,
            ErrorCode::UnencodableType | ErrorCode::IndefiniteLengthForbidden => {
                ErrorKind::Unencodable
            }
            ErrorCode::UnknownTag
            | ErrorCode::InvalidTimestamp
            | ErrorCode::InvalidTagPayload => ErrorKind::Tag,
            ErrorCode::RegistryConflict => ErrorKind::Registry,
            ErrorCode::LengthOverflow
            | ErrorCode::AllocationFailed
            | ErrorCode::TotalItemsLimitExceeded
            | ErrorCode::ArrayLenLimitExceeded
            | ErrorCode::MapLenLimitExceeded
            | ErrorCode::BytesLenLimitExceeded
            | ErrorCode::TextLenLimitExceeded => ErrorKind::Resource,
            ErrorCode::Io => ErrorKind::Io,
        }
    }

    /// Returns `true` iff the failure is recoverable by supplying more input
    /// and retrying at the same parse position.
    #[inline]
    #[must_use]
    pub const fn is_truncated(self) -> bool {
        matches!(self.code, ErrorCode::UnexpectedEof)
    }
}

impl fmt::Display for CborError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self.code {
            ErrorCode::UnexpectedEof => "unexpected end of input",
            ErrorCode::LengthOverflow => "length overflow",
            ErrorCode::AllocationFailed => "allocation failed",
            ErrorCode::TrailingBytes => "trailing bytes after CBOR item",
            ErrorCode::Io => "i/o failure in source or sink",

            ErrorCode::ReservedAdditionalInfo => "reserved additional info value",
            ErrorCode::InvalidSimpleValue => "ill-formed simple value",
            ErrorCode::MisplacedBreak => "break code outside indefinite-length item",
            ErrorCode::InvalidChunk => "invalid chunk in indefinite-length string",
            ErrorCode::Utf8Invalid => "text must be valid UTF-8",

            ErrorCode::NonCanonicalEncoding => "non-canonical encoding",
            ErrorCode::IndefiniteLengthForbidden => "indefinite length forbidden by options",

            ErrorCode::DepthLimitExceeded => "nesting depth limit exceeded",
            ErrorCode::DuplicateMapKey => "duplicate map key",
            ErrorCode::TotalItemsLimitExceeded => "total items limit exceeded",
            ErrorCode::ArrayLenLimitExceeded => "array length exceeds decode limits",
            ErrorCode::MapLenLimitExceeded => "map length exceeds decode limits",
            ErrorCode::BytesLenLimitExceeded => "byte string length exceeds decode limits",
            ErrorCode::TextLenLimitExceeded => "text string length exceeds decode limits",

            ErrorCode::UnencodableType => "no encoder registered for native type",
            ErrorCode::UnknownTag => "unknown tag rejected by registry policy",
            ErrorCode::RegistryConflict => "registry slot already bound",
            ErrorCode::InvalidTimestamp => "tag 0/1 payload is not a valid date/time",
            ErrorCode::InvalidTagPayload => "tag wraps an item of the wrong type",
        };
        write!(f, "cbor error at {}: {msg}", self.offset)
    }
}

impl std::error::Error for CborError {}
