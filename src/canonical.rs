//! Canonical (deterministic) encoding: one value, one byte sequence.
//!
//! Canonical form means minimal-length integer and length operands, the
//! narrowest exact float width with NaN collapsed to `f9 7e00`, no
//! indefinite-length encodings, map keys unique and sorted by their encoded
//! bytes, and exactly one item with no trailing input. Two canonical
//! encodings are byte-equal iff the values are equal, so hashing and
//! signature checks can treat the bytes as the value.

use crate::decode::Decoder;
use crate::encode::Encoder;
use crate::io::{SliceSource, Source, VecSink};
use crate::item::Item;
use crate::limits::{DecodeOptions, EncodeOptions};
use crate::{CborError, ErrorCode};

/// An owned, canonically encoded CBOR data item.
///
/// Values of this type are only constructed through validation or canonical
/// encoding, so holding one is proof the bytes are canonical.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalCbor {
    bytes: Vec<u8>,
}

impl CanonicalCbor {
    /// Canonically encode an item.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateMapKey` if any map repeats a key, or
    /// `DepthLimitExceeded` past the default nesting bound.
    pub fn from_item(item: &Item) -> Result<Self, CborError> {
        let mut enc = Encoder::with_options(VecSink::new(), EncodeOptions::canonical());
        enc.item(item)?;
        Ok(Self {
            bytes: enc.into_sink().into_vec(),
        })
    }

    /// Validate that `bytes` is exactly one canonically encoded item.
    ///
    /// Validation decodes under strict rules and re-encodes canonically; the
    /// input is canonical iff the bytes match. This single check covers
    /// operand minimality, float width, NaN collapsing, definite-length
    /// forms, and map-key ordering.
    ///
    /// # Errors
    ///
    /// `NonCanonicalEncoding` for well-formed but non-canonical input,
    /// `TrailingBytes` for extra input after the item, or any decode error.
    pub fn validate(bytes: &[u8]) -> Result<Self, CborError> {
        let item = Self::validate_item(bytes)?;
        Self::from_item(&item)
    }

    /// Like [`CanonicalCbor::validate`], but returns the decoded item.
    ///
    /// # Errors
    ///
    /// As for [`CanonicalCbor::validate`].
    pub fn validate_item(bytes: &[u8]) -> Result<Item, CborError> {
        let mut src = SliceSource::new(bytes);
        let item = Decoder::with_options(&mut src, DecodeOptions::canonical()).decode_item()?;
        if !src.is_exhausted() {
            return Err(CborError::new(ErrorCode::TrailingBytes, src.position()));
        }
        // Strict decoding rejects overlong operands but admits indefinite
        // forms and unsorted maps; the re-encode comparison catches those.
        let reencoded = Self::from_item(&item)?;
        if reencoded.bytes != bytes {
            return Err(CborError::new(ErrorCode::NonCanonicalEncoding, 0));
        }
        Ok(item)
    }

    /// The canonical bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume and return the canonical bytes.
    #[must_use]
    pub fn into_vec(self) -> Vec<u8> {
        self.bytes
    }

    /// Length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns `true` iff empty; never the case for a validated item.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// SHA-256 digest of the canonical bytes.
    #[cfg(feature = "sha2")]
    #[cfg_attr(docsrs, doc(cfg(feature = "sha2")))]
    #[must_use]
    pub fn sha256(&self) -> [u8; 32] {
        use sha2::{Digest, Sha256};
        let mut h = Sha256::new();
        h.update(&self.bytes);
        let out = h.finalize();
        let mut digest = [0u8; 32];
        digest.copy_from_slice(out.as_slice());
        digest
    }
}

impl AsRef<[u8]> for CanonicalCbor {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

/// Returns `true` iff `bytes` is exactly one canonically encoded item.
#[must_use]
pub fn is_canonical(bytes: &[u8]) -> bool {
    CanonicalCbor::validate(bytes).is_ok()
}
