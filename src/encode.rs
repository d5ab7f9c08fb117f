//! Streaming encoder: emit CBOR through any [`Sink`].
//!
//! The encoder works in two styles. Tree style takes an [`Item`] and writes
//! its encoding in one call. Streaming style exposes scalar methods plus
//! closure-scoped builders for containers and indefinite-length sequences, so
//! callers can emit without materializing a tree first.
//!
//! With canonical options the output is deterministic: shortest-form integer
//! and float encodings, no indefinite lengths, and map entries sorted by their
//! encoded key bytes.

use crate::io::{Sink, VecSink};
use crate::item::Item;
use crate::limits::EncodeOptions;
use crate::wire::{self, BREAK};
use crate::{CborError, ErrorCode};

/// Canonical NaN, half-precision.
const CANONICAL_NAN: [u8; 3] = [0xf9, 0x7e, 0x00];

/// An encoder writing through a sink.
#[derive(Debug)]
pub struct Encoder<S: Sink> {
    sink: S,
    options: EncodeOptions,
}

impl<S: Sink> Encoder<S> {
    /// Create an encoder with default options.
    pub fn new(sink: S) -> Self {
        Self::with_options(sink, EncodeOptions::default())
    }

    /// Create an encoder with explicit options.
    pub const fn with_options(sink: S, options: EncodeOptions) -> Self {
        Self { sink, options }
    }

    /// The options this encoder runs under.
    #[must_use]
    pub const fn options(&self) -> &EncodeOptions {
        &self.options
    }

    /// Consume the encoder and return the sink.
    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Flush the underlying sink.
    ///
    /// # Errors
    ///
    /// Propagates sink failures.
    pub fn flush(&mut self) -> Result<(), CborError> {
        self.sink.flush()
    }

    /// Encode one complete item.
    ///
    /// # Errors
    ///
    /// Returns `DepthLimitExceeded` beyond the configured nesting depth,
    /// `DuplicateMapKey` for repeated keys under canonical sorting, or a sink
    /// failure.
    pub fn item(&mut self, item: &Item) -> Result<(), CborError> {
        self.item_at(item, 0)
    }

    fn enter(&self, depth: usize) -> Result<(), CborError> {
        if depth >= self.options.max_depth {
            return Err(CborError::new(
                ErrorCode::DepthLimitExceeded,
                self.sink.position(),
            ));
        }
        Ok(())
    }

    fn item_at(&mut self, item: &Item, depth: usize) -> Result<(), CborError> {
        match item {
            Item::Unsigned(v) => self.unsigned(*v),
            Item::Negative(n) => self.negative_raw(*n),
            Item::Bytes(b) => self.bytes(b),
            Item::BytesChunks(chunks) => self.byte_chunks(chunks),
            Item::Text(s) => self.text(s),
            Item::TextChunks(chunks) => self.text_chunks(chunks),
            Item::Array(items) => {
                self.enter(depth)?;
                wire::write_major_len(&mut self.sink, 4, items.len())?;
                for it in items {
                    self.item_at(it, depth + 1)?;
                }
                Ok(())
            }
            Item::IndefiniteArray(items) => {
                self.enter(depth)?;
                if self.definite_only() {
                    wire::write_major_len(&mut self.sink, 4, items.len())?;
                } else {
                    self.sink.write_u8(0x9f)?;
                }
                for it in items {
                    self.item_at(it, depth + 1)?;
                }
                if !self.definite_only() {
                    self.sink.write_u8(BREAK)?;
                }
                Ok(())
            }
            Item::Map(entries) | Item::IndefiniteMap(entries) => {
                self.map_at(item, entries, depth)
            }
            Item::Tag(tag, inner) => {
                self.enter(depth)?;
                wire::write_major_uint(&mut self.sink, 6, *tag)?;
                self.item_at(inner, depth + 1)
            }
            Item::Simple(v) => self.simple(*v),
            Item::Float(v) => self.float(*v),
        }
    }

    fn definite_only(&self) -> bool {
        self.options.canonical || !self.options.allow_indefinite
    }

    fn map_at(
        &mut self,
        item: &Item,
        entries: &[(Item, Item)],
        depth: usize,
    ) -> Result<(), CborError> {
        self.enter(depth)?;
        if self.options.canonical {
            return self.canonical_map(entries, depth);
        }
        let indefinite =
            matches!(item, Item::IndefiniteMap(_)) && self.options.allow_indefinite;
        if indefinite {
            self.sink.write_u8(0xbf)?;
        } else {
            wire::write_major_len(&mut self.sink, 5, entries.len())?;
        }
        for (k, v) in entries {
            self.item_at(k, depth + 1)?;
            self.item_at(v, depth + 1)?;
        }
        if indefinite {
            self.sink.write_u8(BREAK)?;
        }
        Ok(())
    }

    /// Encode a map with entries sorted by the byte-wise lexicographic order
    /// of their encoded keys. Equal encoded keys are duplicates.
    fn canonical_map(&mut self, entries: &[(Item, Item)], depth: usize) -> Result<(), CborError> {
        let mut encoded: Vec<(Vec<u8>, Vec<u8>)> = Vec::with_capacity(entries.len());
        for (k, v) in entries {
            let mut ke = Encoder::with_options(VecSink::new(), self.options);
            ke.item_at(k, depth + 1)?;
            let mut ve = Encoder::with_options(VecSink::new(), self.options);
            ve.item_at(v, depth + 1)?;
            encoded.push((ke.into_sink().into_vec(), ve.into_sink().into_vec()));
        }
        encoded.sort_by(|a, b| a.0.cmp(&b.0));
        for pair in encoded.windows(2) {
            if pair[0].0 == pair[1].0 {
                return Err(CborError::new(
                    ErrorCode::DuplicateMapKey,
                    self.sink.position(),
                ));
            }
        }
        wire::write_major_len(&mut self.sink, 5, encoded.len())?;
        for (k, v) in &encoded {
            self.sink.write(k)?;
            self.sink.write(v)?;
        }
        Ok(())
    }

    /// Encode an unsigned integer (major 0).
    ///
    /// # Errors
    ///
    /// Propagates sink failures.
    pub fn unsigned(&mut self, v: u64) -> Result<(), CborError> {
        wire::write_major_uint(&mut self.sink, 0, v)
    }

    /// Encode a negative integer `-1 - n` from its raw payload `n` (major 1).
    ///
    /// # Errors
    ///
    /// Propagates sink failures.
    pub fn negative_raw(&mut self, n: u64) -> Result<(), CborError> {
        wire::write_major_uint(&mut self.sink, 1, n)
    }

    /// Encode a signed integer.
    ///
    /// # Errors
    ///
    /// Returns `UnencodableType` outside `[-2^64, 2^64 - 1]`; integers beyond
    /// that range need a bignum tag.
    pub fn int(&mut self, v: i128) -> Result<(), CborError> {
        match Item::int(v) {
            Some(Item::Unsigned(v)) => self.unsigned(v),
            Some(Item::Negative(n)) => self.negative_raw(n),
            _ => Err(CborError::new(
                ErrorCode::UnencodableType,
                self.sink.position(),
            )),
        }
    }

    /// Encode a boolean.
    ///
    /// # Errors
    ///
    /// Propagates sink failures.
    pub fn bool(&mut self, v: bool) -> Result<(), CborError> {
        self.sink.write_u8(if v { 0xf5 } else { 0xf4 })
    }

    /// Encode `null`.
    ///
    /// # Errors
    ///
    /// Propagates sink failures.
    pub fn null(&mut self) -> Result<(), CborError> {
        self.sink.write_u8(0xf6)
    }

    /// Encode `undefined`.
    ///
    /// # Errors
    ///
    /// Propagates sink failures.
    pub fn undefined(&mut self) -> Result<(), CborError> {
        self.sink.write_u8(0xf7)
    }

    /// Encode a simple value.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSimpleValue` for 24..=31, which have no legal wire
    /// form, or propagates sink failures.
    pub fn simple(&mut self, v: u8) -> Result<(), CborError> {
        if v < 24 {
            return self.sink.write_u8(0xe0 | v);
        }
        if v < 32 {
            return Err(CborError::new(
                ErrorCode::InvalidSimpleValue,
                self.sink.position(),
            ));
        }
        self.sink.write_u8(0xf8)?;
        self.sink.write_u8(v)
    }

    /// Encode a float.
    ///
    /// Canonical options select the narrowest of binary16/32/64 that
    /// round-trips the value exactly and collapse every NaN to `f9 7e00`.
    /// Otherwise the value is emitted as binary64 with its payload intact.
    ///
    /// # Errors
    ///
    /// Propagates sink failures.
    pub fn float(&mut self, v: f64) -> Result<(), CborError> {
        if !self.options.canonical {
            self.sink.write_u8(0xfb)?;
            return self.sink.write(&v.to_bits().to_be_bytes());
        }
        if v.is_nan() {
            return self.sink.write(&CANONICAL_NAN);
        }
        let h = half::f16::from_f64(v);
        if f64::from(h).to_bits() == v.to_bits() {
            self.sink.write_u8(0xf9)?;
            return self.sink.write(&h.to_bits().to_be_bytes());
        }
        #[allow(clippy::cast_possible_truncation)]
        let f = v as f32;
        if f64::from(f).to_bits() == v.to_bits() {
            self.sink.write_u8(0xfa)?;
            return self.sink.write(&f.to_bits().to_be_bytes());
        }
        self.sink.write_u8(0xfb)?;
        self.sink.write(&v.to_bits().to_be_bytes())
    }

    /// Encode a byte string.
    ///
    /// Inputs at or above the chunk threshold are emitted as an
    /// indefinite-length chunk sequence when the options allow it.
    ///
    /// # Errors
    ///
    /// Propagates sink failures.
    pub fn bytes(&mut self, bytes: &[u8]) -> Result<(), CborError> {
        if self.should_chunk(bytes.len()) {
            self.sink.write_u8(0x5f)?;
            // The threshold is a public field and may be zero; chunks() needs
            // a nonzero size.
            for chunk in bytes.chunks(self.options.chunk_threshold.max(1)) {
                wire::write_major_len(&mut self.sink, 2, chunk.len())?;
                self.sink.write(chunk)?;
            }
            return self.sink.write_u8(BREAK);
        }
        wire::write_major_len(&mut self.sink, 2, bytes.len())?;
        self.sink.write(bytes)
    }

    /// Encode a text string.
    ///
    /// Large inputs chunk like [`Encoder::bytes`], with each chunk cut at a
    /// code-point boundary so every chunk is itself valid UTF-8.
    ///
    /// # Errors
    ///
    /// Propagates sink failures.
    pub fn text(&mut self, s: &str) -> Result<(), CborError> {
        if self.should_chunk(s.len()) {
            self.sink.write_u8(0x7f)?;
            let mut rest = s;
            while !rest.is_empty() {
                let cut = floor_char_boundary(rest, self.options.chunk_threshold.max(4));
                let (chunk, tail) = rest.split_at(cut);
                wire::write_major_len(&mut self.sink, 3, chunk.len())?;
                self.sink.write(chunk.as_bytes())?;
                rest = tail;
            }
            return self.sink.write_u8(BREAK);
        }
        wire::write_major_len(&mut self.sink, 3, s.len())?;
        self.sink.write(s.as_bytes())
    }

    fn should_chunk(&self, len: usize) -> bool {
        !self.definite_only() && len >= self.options.chunk_threshold && len > 0
    }

    /// Encode stored byte-string chunks.
    ///
    /// Under definite-only options the chunks are concatenated into a single
    /// definite byte string.
    ///
    /// # Errors
    ///
    /// Propagates sink failures.
    pub fn byte_chunks(&mut self, chunks: &[Vec<u8>]) -> Result<(), CborError> {
        if self.definite_only() {
            let total: usize = chunks.iter().map(Vec::len).sum();
            wire::write_major_len(&mut self.sink, 2, total)?;
            for chunk in chunks {
                self.sink.write(chunk)?;
            }
            return Ok(());
        }
        self.sink.write_u8(0x5f)?;
        for chunk in chunks {
            wire::write_major_len(&mut self.sink, 2, chunk.len())?;
            self.sink.write(chunk)?;
        }
        self.sink.write_u8(BREAK)
    }

    /// Encode stored text-string chunks; see [`Encoder::byte_chunks`].
    ///
    /// # Errors
    ///
    /// Propagates sink failures.
    pub fn text_chunks(&mut self, chunks: &[String]) -> Result<(), CborError> {
        if self.definite_only() {
            let total: usize = chunks.iter().map(String::len).sum();
            wire::write_major_len(&mut self.sink, 3, total)?;
            for chunk in chunks {
                self.sink.write(chunk.as_bytes())?;
            }
            return Ok(());
        }
        self.sink.write_u8(0x7f)?;
        for chunk in chunks {
            wire::write_major_len(&mut self.sink, 3, chunk.len())?;
            self.sink.write(chunk.as_bytes())?;
        }
        self.sink.write_u8(BREAK)
    }

    /// Encode a tag header; the caller must encode exactly one inner item next.
    ///
    /// # Errors
    ///
    /// Propagates sink failures.
    pub fn tag(&mut self, tag: u64) -> Result<(), CborError> {
        wire::write_major_uint(&mut self.sink, 6, tag)
    }

    /// Encode a definite-length array whose `len` elements are written by the
    /// closure.
    ///
    /// The closure must emit exactly `len` items; the encoder does not count.
    ///
    /// # Errors
    ///
    /// Propagates the closure's error or sink failures.
    pub fn array<F>(&mut self, len: usize, f: F) -> Result<(), CborError>
    where
        F: FnOnce(&mut Self) -> Result<(), CborError>,
    {
        wire::write_major_len(&mut self.sink, 4, len)?;
        f(self)
    }

    /// Encode a definite-length map whose `len` entries are written by the
    /// closure as alternating keys and values.
    ///
    /// # Errors
    ///
    /// Propagates the closure's error or sink failures.
    pub fn map<F>(&mut self, len: usize, f: F) -> Result<(), CborError>
    where
        F: FnOnce(&mut Self) -> Result<(), CborError>,
    {
        wire::write_major_len(&mut self.sink, 5, len)?;
        f(self)
    }

    fn require_indefinite(&self) -> Result<(), CborError> {
        if self.definite_only() {
            return Err(CborError::new(
                ErrorCode::IndefiniteLengthForbidden,
                self.sink.position(),
            ));
        }
        Ok(())
    }

    /// Encode an indefinite-length array; the closure writes the elements and
    /// the break stop-code is appended afterwards.
    ///
    /// # Errors
    ///
    /// Returns `IndefiniteLengthForbidden` under definite-only options.
    pub fn indefinite_array<F>(&mut self, f: F) -> Result<(), CborError>
    where
        F: FnOnce(&mut Self) -> Result<(), CborError>,
    {
        self.require_indefinite()?;
        self.sink.write_u8(0x9f)?;
        f(self)?;
        self.sink.write_u8(BREAK)
    }

    /// Encode an indefinite-length map; the closure writes alternating keys
    /// and values.
    ///
    /// # Errors
    ///
    /// Returns `IndefiniteLengthForbidden` under definite-only options.
    pub fn indefinite_map<F>(&mut self, f: F) -> Result<(), CborError>
    where
        F: FnOnce(&mut Self) -> Result<(), CborError>,
    {
        self.require_indefinite()?;
        self.sink.write_u8(0xbf)?;
        f(self)?;
        self.sink.write_u8(BREAK)
    }

    /// Encode an indefinite-length byte string from chunks written through a
    /// [`ChunkWriter`].
    ///
    /// # Errors
    ///
    /// Returns `IndefiniteLengthForbidden` under definite-only options.
    pub fn indefinite_bytes<F>(&mut self, f: F) -> Result<(), CborError>
    where
        F: FnOnce(&mut ChunkWriter<'_, S>) -> Result<(), CborError>,
    {
        self.require_indefinite()?;
        self.sink.write_u8(0x5f)?;
        f(&mut ChunkWriter {
            sink: &mut self.sink,
            major: 2,
        })?;
        self.sink.write_u8(BREAK)
    }

    /// Encode an indefinite-length text string from chunks.
    ///
    /// # Errors
    ///
    /// Returns `IndefiniteLengthForbidden` under definite-only options.
    pub fn indefinite_text<F>(&mut self, f: F) -> Result<(), CborError>
    where
        F: FnOnce(&mut ChunkWriter<'_, S>) -> Result<(), CborError>,
    {
        self.require_indefinite()?;
        self.sink.write_u8(0x7f)?;
        f(&mut ChunkWriter {
            sink: &mut self.sink,
            major: 3,
        })?;
        self.sink.write_u8(BREAK)
    }
}

/// Writes the chunks of one indefinite-length string.
#[derive(Debug)]
pub struct ChunkWriter<'a, S: Sink> {
    sink: &'a mut S,
    major: u8,
}

impl<S: Sink> ChunkWriter<'_, S> {
    /// Emit one definite-length chunk.
    ///
    /// # Errors
    ///
    /// Propagates sink failures.
    pub fn chunk(&mut self, bytes: &[u8]) -> Result<(), CborError> {
        wire::write_major_len(self.sink, self.major, bytes.len())?;
        self.sink.write(bytes)
    }

    /// Emit one text chunk; only available on text-string writers by
    /// construction of the input.
    ///
    /// # Errors
    ///
    /// Propagates sink failures.
    pub fn text_chunk(&mut self, s: &str) -> Result<(), CborError> {
        self.chunk(s.as_bytes())
    }
}

/// Largest byte index `<= max` that sits on a char boundary of `s`.
fn floor_char_boundary(s: &str, max: usize) -> usize {
    if max >= s.len() {
        return s.len();
    }
    let mut i = max;
    while !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}
