/// Default maximum nesting depth limit.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Default maximum container length limit for arrays/maps.
///
/// This is a safety limit; adjust explicitly for your deployment.
pub const DEFAULT_MAX_CONTAINER_LEN: usize = 1 << 16;

/// Default chunk threshold: strings at least this long are emitted as
/// indefinite-length chunk sequences when the options permit it.
pub const DEFAULT_CHUNK_THRESHOLD: usize = 1 << 16;

/// Decode-time resource limits enforced while parsing untrusted bytes.
///
/// Limits are enforced deterministically and must not depend on background timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeLimits {
    /// Maximum total count of container items:
    /// `sum(array_len) + sum(2 * map_pairs)` across the entire decoded item
    /// (maps count both keys and values).
    pub max_total_items: usize,
    /// Maximum array length.
    pub max_array_len: usize,
    /// Maximum map length (pairs).
    pub max_map_len: usize,
    /// Maximum byte-string length, including assembled chunk sequences.
    pub max_bytes_len: usize,
    /// Maximum text-string length in UTF-8 bytes, including assembled chunks.
    pub max_text_len: usize,
}

impl DecodeLimits {
    /// Construct conservative limits derived from a maximum message size.
    ///
    /// `max_array_len` and `max_map_len` are additionally capped by
    /// [`DEFAULT_MAX_CONTAINER_LEN`]. This is a pragmatic baseline; production
    /// deployments should tune these explicitly.
    #[must_use]
    pub fn for_bytes(max_message_bytes: usize) -> Self {
        let max_container_len = max_message_bytes.min(DEFAULT_MAX_CONTAINER_LEN);
        Self {
            max_total_items: max_message_bytes.max(16),
            max_array_len: max_container_len,
            max_map_len: max_container_len,
            max_bytes_len: max_message_bytes,
            max_text_len: max_message_bytes,
        }
    }
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_total_items: usize::MAX,
            max_array_len: usize::MAX,
            max_map_len: usize::MAX,
            max_bytes_len: usize::MAX,
            max_text_len: usize::MAX,
        }
    }
}

/// Options controlling a decode operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Maximum nesting depth of arrays, maps and tags.
    pub max_depth: usize,
    /// Reject integers and lengths encoded in a longer-than-necessary form.
    ///
    /// Required for canonical-input validation.
    pub strict_minimal_encoding: bool,
    /// Accept structurally legal duplicate map keys.
    ///
    /// When `false`, a repeated key (by item equality) is a
    /// [`ErrorCode::DuplicateMapKey`](crate::ErrorCode::DuplicateMapKey) error.
    pub allow_duplicate_map_keys: bool,
    /// Resource limits for untrusted input.
    pub limits: DecodeLimits,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            strict_minimal_encoding: false,
            allow_duplicate_map_keys: true,
            limits: DecodeLimits::default(),
        }
    }
}

impl DecodeOptions {
    /// Options for validating canonical input: strict minimal encoding and
    /// duplicate keys rejected.
    #[must_use]
    pub fn canonical() -> Self {
        Self {
            strict_minimal_encoding: true,
            allow_duplicate_map_keys: false,
            ..Self::default()
        }
    }
}

/// Options controlling an encode operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    /// Force deterministic output: shortest-form integers and floats, no
    /// indefinite lengths, map entries sorted by encoded key bytes.
    pub canonical: bool,
    /// Permit streaming emission of strings/containers whose final size is
    /// not known up front.
    pub allow_indefinite: bool,
    /// Maximum nesting depth before encoding aborts.
    pub max_depth: usize,
    /// Definite strings at least this long are emitted as indefinite chunk
    /// sequences when `allow_indefinite` is set and `canonical` is not.
    pub chunk_threshold: usize,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            canonical: false,
            allow_indefinite: true,
            max_depth: DEFAULT_MAX_DEPTH,
            chunk_threshold: DEFAULT_CHUNK_THRESHOLD,
        }
    }
}

impl EncodeOptions {
    /// Options for canonical (deterministic) output.
    #[must_use]
    pub fn canonical() -> Self {
        Self {
            canonical: true,
            allow_indefinite: false,
            ..Self::default()
        }
    }
}
