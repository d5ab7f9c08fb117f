//! One-call conveniences over the encoder, decoder and registry.

use std::any::Any;

use crate::canonical::CanonicalCbor;
use crate::decode::Decoder;
use crate::encode::Encoder;
use crate::io::{SliceSource, Source, VecSink};
use crate::item::Item;
use crate::limits::{DecodeOptions, EncodeOptions};
use crate::registry::Registry;
use crate::value::Value;
use crate::{CborError, ErrorCode};

/// Encode an item with default options.
///
/// # Errors
///
/// Any encode-side [`CborError`].
pub fn to_vec(item: &Item) -> Result<Vec<u8>, CborError> {
    to_vec_with(item, EncodeOptions::default())
}

/// Encode an item with explicit options.
///
/// # Errors
///
/// Any encode-side [`CborError`].
pub fn to_vec_with(item: &Item, options: EncodeOptions) -> Result<Vec<u8>, CborError> {
    let mut enc = Encoder::with_options(VecSink::new(), options);
    enc.item(item)?;
    Ok(enc.into_sink().into_vec())
}

/// Encode an item canonically.
///
/// # Errors
///
/// Any encode-side [`CborError`], including `DuplicateMapKey`.
pub fn to_canonical_vec(item: &Item) -> Result<Vec<u8>, CborError> {
    CanonicalCbor::from_item(item).map(CanonicalCbor::into_vec)
}

/// Decode exactly one item from `bytes` with default options.
///
/// # Errors
///
/// Any decode-side [`CborError`]; `TrailingBytes` if input remains after the
/// item.
pub fn from_slice(bytes: &[u8]) -> Result<Item, CborError> {
    from_slice_with(bytes, DecodeOptions::default())
}

/// Decode exactly one item from `bytes` with explicit options.
///
/// # Errors
///
/// As for [`from_slice`].
pub fn from_slice_with(bytes: &[u8], options: DecodeOptions) -> Result<Item, CborError> {
    let mut src = SliceSource::new(bytes);
    let item = Decoder::with_options(&mut src, options).decode_item()?;
    if !src.is_exhausted() {
        return Err(CborError::new(ErrorCode::TrailingBytes, src.position()));
    }
    Ok(item)
}

/// Decode one item and map it to a native [`Value`] through `registry`.
///
/// # Errors
///
/// Any decode-side [`CborError`], or a tag/registry error from the mapping.
pub fn from_slice_native(bytes: &[u8], registry: &Registry) -> Result<Value, CborError> {
    let item = from_slice(bytes)?;
    registry.to_value(&item)
}

/// Encode a native value through `registry` with default options.
///
/// # Errors
///
/// `UnencodableType` if no encoder claims the value, or any encode-side
/// [`CborError`].
pub fn to_vec_native(value: &dyn Any, registry: &Registry) -> Result<Vec<u8>, CborError> {
    let item = registry.encode_value(value)?;
    to_vec(&item)
}

/// An iterator over back-to-back top-level items in one source.
///
/// Iteration ends at a clean end of input on an item boundary; a mid-item end
/// of input yields an `UnexpectedEof` error. After yielding an error the
/// iterator is fused.
#[derive(Debug)]
pub struct ItemIter<S: Source> {
    src: S,
    options: DecodeOptions,
    failed: bool,
}

impl<S: Source> ItemIter<S> {
    /// Iterate items from `src` with explicit options. The total-items limit
    /// applies per item, not across the sequence.
    pub fn with_options(src: S, options: DecodeOptions) -> Self {
        Self {
            src,
            options,
            failed: false,
        }
    }

    /// Iterate items from `src` with default options.
    pub fn new(src: S) -> Self {
        Self::with_options(src, DecodeOptions::default())
    }

    /// Consume the iterator and return the source.
    pub fn into_source(self) -> S {
        self.src
    }
}

impl<S: Source> Iterator for ItemIter<S> {
    type Item = Result<Item, CborError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.src.peek_u8() {
            Ok(None) => return None,
            Ok(Some(_)) => {}
            Err(err) => {
                self.failed = true;
                return Some(Err(err));
            }
        }
        let result = Decoder::with_options(&mut self.src, self.options).decode_item();
        if result.is_err() {
            self.failed = true;
        }
        Some(result)
    }
}

/// Iterate back-to-back items in a byte slice.
pub fn iter_slice(bytes: &[u8]) -> ItemIter<SliceSource<'_>> {
    ItemIter::new(SliceSource::new(bytes))
}
