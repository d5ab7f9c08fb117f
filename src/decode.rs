//! Tree decoder: parse one CBOR data item from a [`Source`] into an [`Item`].
//!
//! The decoder is a recursive-descent parser with an explicit depth counter.
//! Resource limits and structural policy come from [`DecodeOptions`]; a
//! malformed input always fails with the byte offset of the offending header.

use crate::alloc_util::{try_reserve, try_vec_from_slice};
use crate::io::Source;
use crate::item::Item;
use crate::limits::DecodeOptions;
use crate::utf8::{self, Utf8Carry};
use crate::wire::{self, Header, Len};
use crate::{CborError, ErrorCode};

/// A decoder over a byte source.
///
/// The decoder borrows its source, so a caller can decode several items in
/// sequence from the same stream, or inspect the source position afterwards
/// to detect trailing bytes.
#[derive(Debug)]
pub struct Decoder<'a, S: Source> {
    src: &'a mut S,
    options: DecodeOptions,
    items: usize,
}

impl<'a, S: Source> Decoder<'a, S> {
    /// Create a decoder with default options.
    pub fn new(src: &'a mut S) -> Self {
        Self::with_options(src, DecodeOptions::default())
    }

    /// Create a decoder with explicit options.
    pub fn with_options(src: &'a mut S, options: DecodeOptions) -> Self {
        Self {
            src,
            options,
            items: 0,
        }
    }

    /// The options this decoder runs under.
    #[must_use]
    pub const fn options(&self) -> &DecodeOptions {
        &self.options
    }

    /// Decode exactly one data item.
    ///
    /// The item counter used for the total-items limit spans calls, so a
    /// sequence decoded through one `Decoder` shares a single budget.
    ///
    /// # Errors
    ///
    /// Any [`CborError`]: truncation, malformed framing, limit violations, or
    /// I/O failure from the source.
    pub fn decode_item(&mut self) -> Result<Item, CborError> {
        let h = wire::read_header(self.src)?;
        if is_break(h) {
            return Err(CborError::new(ErrorCode::MisplacedBreak, h.offset));
        }
        self.item(h, 0)
    }

    /// Decode one item and map it to a native value through `registry`.
    ///
    /// # Errors
    ///
    /// As for [`Decoder::decode_item`], plus tag/registry errors from the
    /// mapping.
    pub fn decode_native(
        &mut self,
        registry: &crate::registry::Registry,
    ) -> Result<crate::value::Value, CborError> {
        let item = self.decode_item()?;
        registry.to_value(&item)
    }

    fn strict(&self) -> bool {
        self.options.strict_minimal_encoding
    }

    fn enter(&self, h: Header, depth: usize) -> Result<(), CborError> {
        if depth >= self.options.max_depth {
            return Err(CborError::new(ErrorCode::DepthLimitExceeded, h.offset));
        }
        Ok(())
    }

    fn bump_items(&mut self, n: usize, off: usize) -> Result<(), CborError> {
        self.items = self
            .items
            .checked_add(n)
            .ok_or_else(|| CborError::new(ErrorCode::LengthOverflow, off))?;
        if self.items > self.options.limits.max_total_items {
            return Err(CborError::new(ErrorCode::TotalItemsLimitExceeded, off));
        }
        Ok(())
    }

    /// Decode the item whose header has already been read.
    fn item(&mut self, h: Header, depth: usize) -> Result<Item, CborError> {
        match h.major {
            0 => wire::read_uint(self.src, h.ai, h.offset, self.strict()).map(Item::Unsigned),
            1 => wire::read_uint(self.src, h.ai, h.offset, self.strict()).map(Item::Negative),
            2 => self.string(h, /* text */ false),
            3 => self.string(h, /* text */ true),
            4 => self.array(h, depth),
            5 => self.map(h, depth),
            6 => self.tag(h, depth),
            _ => self.simple_or_float(h),
        }
    }

    fn string(&mut self, h: Header, text: bool) -> Result<Item, CborError> {
        match wire::read_len(self.src, h.ai, h.offset, self.strict())? {
            Len::Definite(len) => {
                let len = wire::len_to_usize(len, h.offset)?;
                self.check_string_len(len, text, h.offset)?;
                let payload_off = self.src.position();
                let payload = self.src.read_exact(len)?;
                if text {
                    let s = utf8::validate(payload)
                        .map_err(|()| CborError::new(ErrorCode::Utf8Invalid, payload_off))?;
                    Ok(Item::Text(s.to_owned()))
                } else {
                    Ok(Item::Bytes(try_vec_from_slice(payload, payload_off)?))
                }
            }
            Len::Indefinite => self.chunked_string(h, text),
        }
    }

    /// Assemble an indefinite-length string as a chunk sequence.
    ///
    /// Every chunk must be a definite-length string of the same major type.
    /// For text, chunk boundaries may split a code point; the carried suffix
    /// moves into the following chunk so each produced `String` is whole.
    fn chunked_string(&mut self, h: Header, text: bool) -> Result<Item, CborError> {
        let mut bytes_chunks: Vec<Vec<u8>> = Vec::new();
        let mut text_chunks: Vec<String> = Vec::new();
        let mut carry = Utf8Carry::new();
        let mut total = 0usize;

        loop {
            let ch = wire::read_header(self.src)?;
            if is_break(ch) {
                break;
            }
            if ch.major != h.major || ch.ai == 31 {
                return Err(CborError::new(ErrorCode::InvalidChunk, ch.offset));
            }
            let len = match wire::read_len(self.src, ch.ai, ch.offset, self.strict())? {
                Len::Definite(len) => wire::len_to_usize(len, ch.offset)?,
                Len::Indefinite => unreachable!("ai 31 rejected above"),
            };
            total = total
                .checked_add(len)
                .ok_or_else(|| CborError::new(ErrorCode::LengthOverflow, ch.offset))?;
            self.check_string_len(total, text, ch.offset)?;

            let payload_off = self.src.position();
            let payload = self.src.read_exact(len)?;
            if text {
                let s = carry.push_chunk(payload, payload_off)?;
                try_reserve(&mut text_chunks, 1, payload_off)?;
                text_chunks.push(s);
            } else {
                try_reserve(&mut bytes_chunks, 1, payload_off)?;
                bytes_chunks.push(try_vec_from_slice(payload, payload_off)?);
            }
        }

        if text {
            carry.finish(self.src.position())?;
            Ok(Item::TextChunks(text_chunks))
        } else {
            Ok(Item::BytesChunks(bytes_chunks))
        }
    }

    fn check_string_len(&self, len: usize, text: bool, off: usize) -> Result<(), CborError> {
        if text {
            if len > self.options.limits.max_text_len {
                return Err(CborError::new(ErrorCode::TextLenLimitExceeded, off));
            }
        } else if len > self.options.limits.max_bytes_len {
            return Err(CborError::new(ErrorCode::BytesLenLimitExceeded, off));
        }
        Ok(())
    }

    fn array(&mut self, h: Header, depth: usize) -> Result<Item, CborError> {
        self.enter(h, depth)?;
        match wire::read_len(self.src, h.ai, h.offset, self.strict())? {
            Len::Definite(len) => {
                let len = wire::len_to_usize(len, h.offset)?;
                if len > self.options.limits.max_array_len {
                    return Err(CborError::new(ErrorCode::ArrayLenLimitExceeded, h.offset));
                }
                self.bump_items(len, h.offset)?;
                let mut items = Vec::new();
                // Cap speculative allocation: a short input cannot make us
                // reserve more elements than it could possibly contain.
                try_reserve(&mut items, len.min(1 << 12), h.offset)?;
                for _ in 0..len {
                    let eh = wire::read_header(self.src)?;
                    if is_break(eh) {
                        return Err(CborError::new(ErrorCode::MisplacedBreak, eh.offset));
                    }
                    items.push(self.item(eh, depth + 1)?);
                }
                Ok(Item::Array(items))
            }
            Len::Indefinite => {
                let mut items = Vec::new();
                loop {
                    let eh = wire::read_header(self.src)?;
                    if is_break(eh) {
                        return Ok(Item::IndefiniteArray(items));
                    }
                    if items.len() >= self.options.limits.max_array_len {
                        return Err(CborError::new(ErrorCode::ArrayLenLimitExceeded, eh.offset));
                    }
                    self.bump_items(1, eh.offset)?;
                    try_reserve(&mut items, 1, eh.offset)?;
                    items.push(self.item(eh, depth + 1)?);
                }
            }
        }
    }

    fn map(&mut self, h: Header, depth: usize) -> Result<Item, CborError> {
        self.enter(h, depth)?;
        match wire::read_len(self.src, h.ai, h.offset, self.strict())? {
            Len::Definite(pairs) => {
                let pairs = wire::len_to_usize(pairs, h.offset)?;
                if pairs > self.options.limits.max_map_len {
                    return Err(CborError::new(ErrorCode::MapLenLimitExceeded, h.offset));
                }
                let total = pairs
                    .checked_mul(2)
                    .ok_or_else(|| CborError::new(ErrorCode::LengthOverflow, h.offset))?;
                self.bump_items(total, h.offset)?;
                let mut entries = Vec::new();
                try_reserve(&mut entries, pairs.min(1 << 12), h.offset)?;
                for _ in 0..pairs {
                    let entry = self.map_entry(depth, &entries)?;
                    entries.push(entry);
                }
                Ok(Item::Map(entries))
            }
            Len::Indefinite => {
                let mut entries = Vec::new();
                loop {
                    let kh = wire::read_header(self.src)?;
                    if is_break(kh) {
                        return Ok(Item::IndefiniteMap(entries));
                    }
                    if entries.len() >= self.options.limits.max_map_len {
                        return Err(CborError::new(ErrorCode::MapLenLimitExceeded, kh.offset));
                    }
                    self.bump_items(2, kh.offset)?;
                    let key = self.item(kh, depth + 1)?;
                    self.check_duplicate(&key, &entries, kh.offset)?;
                    let value = self.value_item(depth)?;
                    try_reserve(&mut entries, 1, kh.offset)?;
                    entries.push((key, value));
                }
            }
        }
    }

    fn map_entry(
        &mut self,
        depth: usize,
        seen: &[(Item, Item)],
    ) -> Result<(Item, Item), CborError> {
        let kh = wire::read_header(self.src)?;
        if is_break(kh) {
            return Err(CborError::new(ErrorCode::MisplacedBreak, kh.offset));
        }
        let key = self.item(kh, depth + 1)?;
        self.check_duplicate(&key, seen, kh.offset)?;
        let value = self.value_item(depth)?;
        Ok((key, value))
    }

    fn value_item(&mut self, depth: usize) -> Result<Item, CborError> {
        let vh = wire::read_header(self.src)?;
        if is_break(vh) {
            return Err(CborError::new(ErrorCode::MisplacedBreak, vh.offset));
        }
        self.item(vh, depth + 1)
    }

    fn check_duplicate(
        &self,
        key: &Item,
        seen: &[(Item, Item)],
        off: usize,
    ) -> Result<(), CborError> {
        if !self.options.allow_duplicate_map_keys && seen.iter().any(|(k, _)| k == key) {
            return Err(CborError::new(ErrorCode::DuplicateMapKey, off));
        }
        Ok(())
    }

    fn tag(&mut self, h: Header, depth: usize) -> Result<Item, CborError> {
        self.enter(h, depth)?;
        let tag = wire::read_uint(self.src, h.ai, h.offset, self.strict())?;
        let ih = wire::read_header(self.src)?;
        if is_break(ih) {
            return Err(CborError::new(ErrorCode::MisplacedBreak, ih.offset));
        }
        let inner = self.item(ih, depth + 1)?;
        Ok(Item::Tag(tag, Box::new(inner)))
    }

    fn simple_or_float(&mut self, h: Header) -> Result<Item, CborError> {
        match h.ai {
            0..=23 => Ok(Item::Simple(h.ai)),
            24 => {
                let v = self.src.read_u8()?;
                // Two-byte simple values below 32 shadow the one-byte range.
                if v < 32 {
                    return Err(CborError::new(ErrorCode::InvalidSimpleValue, h.offset));
                }
                Ok(Item::Simple(v))
            }
            25 => {
                let s = self.src.read_exact(2)?;
                let bits = u16::from_be_bytes([s[0], s[1]]);
                Ok(Item::Float(f64::from(half::f16::from_bits(bits))))
            }
            26 => {
                let s = self.src.read_exact(4)?;
                let bits = u32::from_be_bytes([s[0], s[1], s[2], s[3]]);
                Ok(Item::Float(f64::from(f32::from_bits(bits))))
            }
            27 => {
                let s = self.src.read_exact(8)?;
                let bits = u64::from_be_bytes([s[0], s[1], s[2], s[3], s[4], s[5], s[6], s[7]]);
                Ok(Item::Float(f64::from_bits(bits)))
            }
            28..=30 => Err(CborError::new(ErrorCode::ReservedAdditionalInfo, h.offset)),
            // ai 31 (break) is intercepted by every caller before `item`.
            _ => Err(CborError::new(ErrorCode::MisplacedBreak, h.offset)),
        }
    }
}

const fn is_break(h: Header) -> bool {
    h.major == 7 && h.ai == 31
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::SliceSource;
    use crate::limits::DecodeLimits;
    use hex_literal::hex;

    fn decode(bytes: &[u8]) -> Result<Item, CborError> {
        decode_with(bytes, DecodeOptions::default())
    }

    fn decode_with(bytes: &[u8], options: DecodeOptions) -> Result<Item, CborError> {
        let mut src = SliceSource::new(bytes);
        Decoder::with_options(&mut src, options).decode_item()
    }

    #[test]
    fn scalars() {
        assert_eq!(decode(&hex!("17")).unwrap(), Item::Unsigned(23));
        assert_eq!(decode(&hex!("1818")).unwrap(), Item::Unsigned(24));
        assert_eq!(decode(&hex!("20")).unwrap(), Item::Negative(0));
        assert_eq!(decode(&hex!("3903e7")).unwrap(), Item::Negative(999));
        assert_eq!(decode(&hex!("f4")).unwrap(), Item::FALSE);
        assert_eq!(decode(&hex!("f6")).unwrap(), Item::NULL);
        assert_eq!(decode(&hex!("f820")).unwrap(), Item::Simple(32));
    }

    #[test]
    fn two_byte_simple_below_32_is_malformed() {
        let err = decode(&hex!("f81f")).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidSimpleValue);
        assert_eq!(err.offset, 0);
    }

    #[test]
    fn floats_widen_to_f64() {
        assert_eq!(decode(&hex!("f93c00")).unwrap(), Item::Float(1.0));
        assert_eq!(decode(&hex!("fa47c35000")).unwrap(), Item::Float(100_000.0));
        assert_eq!(
            decode(&hex!("fb3ff199999999999a")).unwrap(),
            Item::Float(1.1)
        );
        // Half-precision NaN widens to a NaN.
        assert_eq!(decode(&hex!("f97e00")).unwrap(), Item::Float(f64::NAN));
    }

    #[test]
    fn chunked_byte_string() {
        let item = decode(&hex!("5f41014201 02ff")).unwrap();
        assert_eq!(item, Item::BytesChunks(vec![vec![1], vec![1, 2]]));
        assert_eq!(item, Item::Bytes(vec![1, 1, 2]));
    }

    #[test]
    fn chunked_text_respects_code_point_boundaries() {
        // Major mismatch: 0x44 is a byte string chunk inside a text string.
        let err = decode(&hex!("7f 44 636166c3 41 a9 ff")).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidChunk);

        // "caf" + 0xC3 | 0xA9: the split code point moves to the second chunk.

        let item = decode(&hex!("7f 6463 6166 c3 61a9 ff")).unwrap();
        assert_eq!(
            item,
            Item::TextChunks(vec!["caf".to_owned(), "é".to_owned()])
        );
    }

    #[test]
    fn dangling_code_point_at_break_is_invalid() {
        let err = decode(&hex!("7f 61c3 ff")).unwrap_err();
        assert_eq!(err.code, ErrorCode::Utf8Invalid);
    }

    #[test]
    fn nested_indefinite_chunk_is_invalid() {
        let err = decode(&hex!("5f 5f41 01ff ff")).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidChunk);
    }

    #[test]
    fn containers() {
        assert_eq!(decode(&hex!("80")).unwrap(), Item::Array(vec![]));
        assert_eq!(
            decode(&hex!("9f01 02ff")).unwrap(),
            Item::IndefiniteArray(vec![Item::Unsigned(1), Item::Unsigned(2)])
        );
        assert_eq!(
            decode(&hex!("a1 6161 01")).unwrap(),
            Item::Map(vec![(Item::Text("a".into()), Item::Unsigned(1))])
        );
        assert_eq!(
            decode(&hex!("bf 6161 01 ff")).unwrap(),
            Item::IndefiniteMap(vec![(Item::Text("a".into()), Item::Unsigned(1))])
        );
        assert_eq!(
            decode(&hex!("c2 4201 00")).unwrap(),
            Item::Tag(2, Box::new(Item::Bytes(vec![1, 0])))
        );
    }

    #[test]
    fn top_level_break_is_misplaced() {
        let err = decode(&hex!("ff")).unwrap_err();
        assert_eq!(err.code, ErrorCode::MisplacedBreak);
    }

    #[test]
    fn break_between_key_and_value_is_misplaced() {
        let err = decode(&hex!("bf 6161 ff")).unwrap_err();
        assert_eq!(err.code, ErrorCode::MisplacedBreak);
    }

    #[test]
    fn reserved_additional_info() {
        for b in [0x1cu8, 0x1d, 0x1e, 0xfc, 0xfd, 0xfe] {
            let err = decode(&[b]).unwrap_err();
            assert_eq!(err.code, ErrorCode::ReservedAdditionalInfo, "byte {b:#x}");
        }
    }

    #[test]
    fn truncation_reports_eof() {
        let err = decode(&hex!("19")).unwrap_err();
        assert_eq!(err.code, ErrorCode::UnexpectedEof);
        let err = decode(&hex!("62 61")).unwrap_err();
        assert_eq!(err.code, ErrorCode::UnexpectedEof);
        let err = decode(&hex!("9f 01")).unwrap_err();
        assert_eq!(err.code, ErrorCode::UnexpectedEof);
    }

    #[test]
    fn depth_bound_is_exact() {
        // [[[]]] nests three containers.
        let three = hex!("818180");
        let mut opts = DecodeOptions::default();
        opts.max_depth = 3;
        assert!(decode_with(&three, opts).is_ok());
        opts.max_depth = 2;
        let err = decode_with(&three, opts).unwrap_err();
        assert_eq!(err.code, ErrorCode::DepthLimitExceeded);
        assert_eq!(err.offset, 2);

        // A scalar needs no depth budget at all.
        opts.max_depth = 0;
        assert_eq!(decode_with(&hex!("00"), opts).unwrap(), Item::Unsigned(0));
        let err = decode_with(&hex!("80"), opts).unwrap_err();
        assert_eq!(err.code, ErrorCode::DepthLimitExceeded);
    }

    #[test]
    fn tags_consume_depth() {
        let mut opts = DecodeOptions::default();
        opts.max_depth = 1;
        assert!(decode_with(&hex!("c100"), opts).is_ok());
        let err = decode_with(&hex!("c1c100"), opts).unwrap_err();
        assert_eq!(err.code, ErrorCode::DepthLimitExceeded);
    }

    #[test]
    fn strict_rejects_overlong_forms() {
        let opts = DecodeOptions::canonical();
        let err = decode_with(&hex!("1800"), opts).unwrap_err();
        assert_eq!(err.code, ErrorCode::NonCanonicalEncoding);
        let err = decode_with(&hex!("1900ff"), opts).unwrap_err();
        assert_eq!(err.code, ErrorCode::NonCanonicalEncoding);
        // Minimal forms still pass.
        assert_eq!(decode_with(&hex!("1818"), opts).unwrap(), Item::Unsigned(24));
    }

    #[test]
    fn duplicate_keys_rejected_on_request() {
        let doubled = hex!("a2 6161 01 6161 02");
        assert!(decode(&doubled).is_ok());
        let mut opts = DecodeOptions::default();
        opts.allow_duplicate_map_keys = false;
        let err = decode_with(&doubled, opts).unwrap_err();
        assert_eq!(err.code, ErrorCode::DuplicateMapKey);
        assert_eq!(err.offset, 4);
    }

    #[test]
    fn duplicate_detection_covers_indefinite_maps_and_chunked_keys() {
        let mut opts = DecodeOptions::default();
        opts.allow_duplicate_map_keys = false;

        // Indefinite maps apply the same policy.
        let err = decode_with(&hex!("bf 6161 01 6161 02 ff"), opts).unwrap_err();
        assert_eq!(err.code, ErrorCode::DuplicateMapKey);

        // A chunked key collides with its definite form, since key equality
        // is item equality and ignores chunking.
        let err = decode_with(&hex!("a2 6161 01 7f6161ff 02"), opts).unwrap_err();
        assert_eq!(err.code, ErrorCode::DuplicateMapKey);
        assert_eq!(err.offset, 4);

        // Distinct keys in either form still pass.
        assert!(decode_with(&hex!("a2 6161 01 7f6162ff 02"), opts).is_ok());
    }

    #[test]
    fn limits_bound_containers_and_strings() {
        let mut opts = DecodeOptions::default();
        opts.limits = DecodeLimits {
            max_array_len: 2,
            ..DecodeLimits::default()
        };
        assert!(decode_with(&hex!("820101"), opts).is_ok());
        let err = decode_with(&hex!("83010101"), opts).unwrap_err();
        assert_eq!(err.code, ErrorCode::ArrayLenLimitExceeded);
        let err = decode_with(&hex!("9f01010101ff"), opts).unwrap_err();
        assert_eq!(err.code, ErrorCode::ArrayLenLimitExceeded);

        opts.limits = DecodeLimits {
            max_text_len: 2,
            ..DecodeLimits::default()
        };
        let err = decode_with(&hex!("63616263"), opts).unwrap_err();
        assert_eq!(err.code, ErrorCode::TextLenLimitExceeded);
        // Chunk totals accumulate against the same cap.
        let err = decode_with(&hex!("7f 6161 6162 6163 ff"), opts).unwrap_err();
        assert_eq!(err.code, ErrorCode::TextLenLimitExceeded);

        opts.limits = DecodeLimits {
            max_total_items: 3,
            ..DecodeLimits::default()
        };
        let err = decode_with(&hex!("8401020304"), opts).unwrap_err();
        assert_eq!(err.code, ErrorCode::TotalItemsLimitExceeded);
    }

    #[test]
    fn oversized_length_header_fails_before_allocating() {
        // Byte string claiming u64::MAX bytes.
        let mut opts = DecodeOptions::default();
        opts.limits = DecodeLimits::for_bytes(1 << 20);
        let err = decode_with(&hex!("5bffffffffffffffff"), opts).unwrap_err();
        assert_eq!(err.code, ErrorCode::BytesLenLimitExceeded);
    }
}
