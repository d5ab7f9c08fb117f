use crate::alloc_util::try_reserve;
use crate::{CborError, ErrorCode};

#[cfg(feature = "simdutf8")]
use simdutf8::basic as simd_utf8;

/// Validates UTF-8 bytes and returns a borrowed `&str` on success.
#[inline]
pub fn validate(bytes: &[u8]) -> Result<&str, ()> {
    #[cfg(feature = "simdutf8")]
    {
        simd_utf8::from_utf8(bytes).map_err(|_| ())
    }

    #[cfg(not(feature = "simdutf8"))]
    {
        core::str::from_utf8(bytes).map_err(|_| ())
    }
}

/// Incremental UTF-8 validator for chunked text strings.
///
/// Chunk boundaries may split a multi-byte code point; the incomplete suffix
/// of each chunk is carried over and prepended to the next. The concatenation
/// must be valid UTF-8, which [`Utf8Carry::finish`] checks by requiring the
/// carry to be empty at the end of the chunk sequence.
#[derive(Debug, Default)]
pub struct Utf8Carry {
    pending: [u8; 4],
    pending_len: usize,
}

impl Utf8Carry {
    /// Create an empty carry state.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pending: [0; 4],
            pending_len: 0,
        }
    }

    /// Consume one raw chunk and return the complete text it yields.
    ///
    /// An incomplete trailing code point is held back for the next chunk.
    ///
    /// # Errors
    ///
    /// Returns `Utf8Invalid` at `offset` if the bytes seen so far cannot be a
    /// prefix of valid UTF-8, or `AllocationFailed` if buffering fails.
    pub fn push_chunk(&mut self, chunk: &[u8], offset: usize) -> Result<String, CborError> {
        let mut buf = Vec::new();
        try_reserve(&mut buf, self.pending_len + chunk.len(), offset)?;
        buf.extend_from_slice(&self.pending[..self.pending_len]);
        buf.extend_from_slice(chunk);
        self.pending_len = 0;

        match core::str::from_utf8(&buf) {
            Ok(_) => {
                // Complete chunk; reuse the buffer as the output string.
                Ok(string_from_validated(buf))
            }
            Err(err) => {
                let valid = err.valid_up_to();
                let rest = buf.len() - valid;
                if err.error_len().is_some() || rest > 3 {
                    return Err(CborError::new(ErrorCode::Utf8Invalid, offset));
                }
                self.pending[..rest].copy_from_slice(&buf[valid..]);
                self.pending_len = rest;
                buf.truncate(valid);
                Ok(string_from_validated(buf))
            }
        }
    }

    /// Check that no partial code point is left dangling at the end of the
    /// chunk sequence.
    ///
    /// # Errors
    ///
    /// Returns `Utf8Invalid` at `offset` if a partial code point remains.
    pub fn finish(&self, offset: usize) -> Result<(), CborError> {
        if self.pending_len == 0 {
            Ok(())
        } else {
            Err(CborError::new(ErrorCode::Utf8Invalid, offset))
        }
    }
}

// The buffer has been validated up to its (possibly truncated) length.
fn string_from_validated(buf: Vec<u8>) -> String {
    debug_assert!(core::str::from_utf8(&buf).is_ok());
    String::from_utf8(buf).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn carry_spans_chunk_boundary() {
        // U+00E9 is 0xC3 0xA9; split it across two chunks.
        let mut carry = Utf8Carry::new();
        let first = carry.push_chunk(b"caf\xc3", 0).unwrap();
        assert_eq!(first, "caf");
        let second = carry.push_chunk(b"\xa9", 0).unwrap();
        assert_eq!(second, "é");
        carry.finish(0).unwrap();
    }

    #[test]
    fn dangling_partial_code_point_is_invalid() {
        let mut carry = Utf8Carry::new();
        carry.push_chunk(b"\xc3", 0).unwrap();
        let err = carry.finish(9).unwrap_err();
        assert_eq!(err.code, ErrorCode::Utf8Invalid);
        assert_eq!(err.offset, 9);
    }

    #[test]
    fn invalid_byte_rejected_immediately() {
        let mut carry = Utf8Carry::new();
        let err = carry.push_chunk(b"\xff", 4).unwrap_err();
        assert_eq!(err.code, ErrorCode::Utf8Invalid);
    }
}
