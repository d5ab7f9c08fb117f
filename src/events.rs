//! Event-stream decoder: parse CBOR into a flat sequence of structural
//! events without building a tree.
//!
//! This is the incremental counterpart of [`crate::Decoder`]. Container
//! nesting lives in an explicit frame stack instead of the call stack, so a
//! caller can process arbitrarily large documents with bounded memory. A pull
//! that fails with a `Truncated` error can be retried once the source has
//! more bytes: partially read item headers are carried over internally, and a
//! resumable source such as [`crate::ReaderSource`] retains the bytes of the
//! read that failed.

use crate::io::Source;
use crate::limits::DecodeOptions;
use crate::utf8::{self, Utf8Carry};
use crate::wire::{self, Header, Len};
use crate::{CborError, ErrorCode};

/// Which kind of string an indefinite-length sequence carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringKind {
    /// Major 2, byte string.
    Bytes,
    /// Major 3, text string.
    Text,
}

/// One structural event pulled from the stream.
///
/// A well-formed document yields a balanced sequence: every `ArrayStart`,
/// `MapStart` and `StringStart` is closed by a matching `ContainerEnd` or
/// `StringEnd`, and every `TagStart` is followed by exactly one complete
/// item. Definite and indefinite containers close with the same
/// `ContainerEnd`, so consumers need no per-form logic.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Unsigned integer.
    Unsigned(u64),
    /// Negative integer `-1 - n`, carrying the raw payload `n`.
    Negative(u64),
    /// Complete definite-length byte string.
    Bytes(Vec<u8>),
    /// Complete definite-length text string.
    Text(String),
    /// Start of an indefinite-length string; chunk events follow.
    StringStart(StringKind),
    /// One chunk of an indefinite-length byte string.
    BytesChunk(Vec<u8>),
    /// One chunk of an indefinite-length text string. Chunk boundaries are
    /// adjusted so every event carries whole code points.
    TextChunk(String),
    /// End of an indefinite-length string.
    StringEnd,
    /// Start of an array; `Some(len)` for definite lengths.
    ArrayStart(Option<u64>),
    /// Start of a map; `Some(pairs)` for definite lengths.
    MapStart(Option<u64>),
    /// End of an array or map, definite or indefinite.
    ContainerEnd,
    /// A tag; the tagged item follows as the next complete item.
    TagStart(u64),
    /// Simple value.
    Simple(u8),
    /// Floating-point number, widened to binary64.
    Float(f64),
}

#[derive(Debug)]
enum Frame {
    /// `remaining` counts individual items; `None` for indefinite lengths.
    Array { remaining: Option<u64> },
    Map {
        remaining: Option<u64>,
        awaiting_value: bool,
    },
    Tag,
    /// Indefinite-length string awaiting chunks or a break.
    Chunks(StringKind),
}

/// A pull-based decoder producing [`Event`]s.
///
/// Map-key duplicate detection requires materialized keys and is not
/// performed at this level; `allow_duplicate_map_keys` is ignored here.
#[derive(Debug)]
pub struct EventDecoder<'a, S: Source> {
    src: &'a mut S,
    options: DecodeOptions,
    frames: Vec<Frame>,
    carry: Utf8Carry,
    items: usize,
    string_total: usize,
    // Resume state for a pull interrupted by truncation after the header (and
    // possibly its length operand) was consumed.
    pending_header: Option<Header>,
    pending_len: Option<usize>,
}

impl<'a, S: Source> EventDecoder<'a, S> {
    /// Create an event decoder with default options.
    pub fn new(src: &'a mut S) -> Self {
        Self::with_options(src, DecodeOptions::default())
    }

    /// Create an event decoder with explicit options.
    pub fn with_options(src: &'a mut S, options: DecodeOptions) -> Self {
        Self {
            src,
            options,
            frames: Vec::new(),
            carry: Utf8Carry::new(),
            items: 0,
            string_total: 0,
            pending_header: None,
            pending_len: None,
        }
    }

    /// Current nesting depth (open containers, strings and pending tags).
    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Returns `true` iff the stream is at a top-level item boundary.
    #[must_use]
    pub const fn at_item_boundary(&self) -> bool {
        self.frames.is_empty() && self.pending_header.is_none()
    }

    /// Pull the next event.
    ///
    /// Returns `Ok(None)` on a clean end of input at a top-level item
    /// boundary. End of input anywhere else is `UnexpectedEof`; the pull can
    /// then be retried after feeding the source.
    ///
    /// # Errors
    ///
    /// Any [`CborError`]; see [`crate::ErrorKind`] for the taxonomy.
    pub fn next_event(&mut self) -> Result<Option<Event>, CborError> {
        // A definite container whose slots are exhausted closes without
        // consuming input.
        if let Some(ev) = self.close_exhausted() {
            self.item_done();
            return Ok(Some(ev));
        }

        let (h, resumed) = match self.pending_header.take() {
            Some(h) => (h, true),
            None => {
                if self.frames.is_empty() && self.src.peek_u8()?.is_none() {
                    return Ok(None);
                }
                (wire::read_header(self.src)?, false)
            }
        };

        let result = if h.major == 7 && h.ai == 31 {
            self.on_break(h)
        } else if let Some(Frame::Chunks(kind)) = self.frames.last() {
            let kind = *kind;
            self.chunk(h, kind)
        } else {
            if !resumed {
                self.consume_slot(h)?;
            }
            self.begin_item(h)
        };

        match result {
            Ok(ev) => {
                self.pending_len = None;
                Ok(Some(ev))
            }
            Err(err) if err.is_truncated() => {
                self.pending_header = Some(h);
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    fn close_exhausted(&mut self) -> Option<Event> {
        let done = matches!(
            self.frames.last(),
            Some(
                Frame::Array { remaining: Some(0) }
                    | Frame::Map {
                        remaining: Some(0),
                        ..
                    }
            )
        );
        if done {
            self.frames.pop();
            Some(Event::ContainerEnd)
        } else {
            None
        }
    }

    /// Pop tag frames once the item they wrap has completed.
    fn item_done(&mut self) {
        while let Some(Frame::Tag) = self.frames.last() {
            self.frames.pop();
        }
    }

    /// Account for one item slot in the enclosing container.
    fn consume_slot(&mut self, h: Header) -> Result<(), CborError> {
        let indefinite_parent = match self.frames.last_mut() {
            Some(Frame::Array { remaining }) => {
                if let Some(r) = remaining {
                    *r -= 1;
                    false
                } else {
                    true
                }
            }
            Some(Frame::Map {
                remaining,
                awaiting_value,
            }) => {
                *awaiting_value = !*awaiting_value;
                if let Some(r) = remaining {
                    *r -= 1;
                    false
                } else {
                    true
                }
            }
            _ => return Ok(()),
        };
        if indefinite_parent {
            self.bump_items(1, h.offset)?;
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

    fn on_break(&mut self, h: Header) -> Result<Event, CborError> {
        match self.frames.last() {
            Some(Frame::Chunks(kind)) => {
                if *kind == StringKind::Text {
                    self.carry.finish(h.offset)?;
                }
                self.frames.pop();
                self.item_done();
                Ok(Event::StringEnd)
            }
            Some(Frame::Array { remaining: None }) => {
                self.frames.pop();
                self.item_done();
                Ok(Event::ContainerEnd)
            }
            Some(Frame::Map {
                remaining: None,
                awaiting_value: false,
            }) => {
                self.frames.pop();
                self.item_done();
                Ok(Event::ContainerEnd)
            }
            // Break mid-entry, inside a definite container, or at top level.
            _ => Err(CborError::new(ErrorCode::MisplacedBreak, h.offset)),
        }
    }

    fn chunk(&mut self, h: Header, kind: StringKind) -> Result<Event, CborError> {
        let expected_major = match kind {
            StringKind::Bytes => 2,
            StringKind::Text => 3,
        };
        if h.major != expected_major || h.ai == 31 {
            return Err(CborError::new(ErrorCode::InvalidChunk, h.offset));
        }
        let len = self.resolve_len(h, kind, /* accumulate */ true)?;
        let payload_off = self.src.position();
        let payload = self.src.read_exact(len)?;
        match kind {
            StringKind::Bytes => Ok(Event::BytesChunk(payload.to_vec())),
            StringKind::Text => {
                let owned: Vec<u8> = payload.to_vec();
                Ok(Event::TextChunk(self.carry.push_chunk(&owned, payload_off)?))
            }
        }
    }

    /// Resolve a definite string/chunk length, reusing one carried over from
    /// an interrupted pull so limit accounting happens exactly once.
    fn resolve_len(
        &mut self,
        h: Header,
        kind: StringKind,
        accumulate: bool,
    ) -> Result<usize, CborError> {
        if let Some(len) = self.pending_len {
            return Ok(len);
        }
        let len = match wire::read_len(self.src, h.ai, h.offset, self.strict())? {
            Len::Definite(len) => wire::len_to_usize(len, h.offset)?,
            Len::Indefinite => unreachable!("callers reject ai 31 first"),
        };
        let effective = if accumulate {
            self.string_total = self
                .string_total
                .checked_add(len)
                .ok_or_else(|| CborError::new(ErrorCode::LengthOverflow, h.offset))?;
            self.string_total
        } else {
            len
        };
        self.check_string_len(effective, kind, h.offset)?;
        self.pending_len = Some(len);
        Ok(len)
    }

    fn strict(&self) -> bool {
        self.options.strict_minimal_encoding
    }

    fn check_string_len(&self, len: usize, kind: StringKind, off: usize) -> Result<(), CborError> {
        match kind {
            StringKind::Text if len > self.options.limits.max_text_len => {
                Err(CborError::new(ErrorCode::TextLenLimitExceeded, off))
            }
            StringKind::Bytes if len > self.options.limits.max_bytes_len => {
                Err(CborError::new(ErrorCode::BytesLenLimitExceeded, off))
            }
            _ => Ok(()),
        }
    }

    fn push_frame(&mut self, frame: Frame, off: usize) -> Result<(), CborError> {
        if self.frames.len() >= self.options.max_depth {
            return Err(CborError::new(ErrorCode::DepthLimitExceeded, off));
        }
        self.frames.push(frame);
        Ok(())
    }

    fn begin_item(&mut self, h: Header) -> Result<Event, CborError> {
        match h.major {
            0 => {
                let v = wire::read_uint(self.src, h.ai, h.offset, self.strict())?;
                self.item_done();
                Ok(Event::Unsigned(v))
            }
            1 => {
                let n = wire::read_uint(self.src, h.ai, h.offset, self.strict())?;
                self.item_done();
                Ok(Event::Negative(n))
            }
            2 => self.string(h, StringKind::Bytes),
            3 => self.string(h, StringKind::Text),
            4 => match wire::read_len(self.src, h.ai, h.offset, self.strict())? {
                Len::Definite(len) => {
                    let len_us = wire::len_to_usize(len, h.offset)?;
                    if len_us > self.options.limits.max_array_len {
                        return Err(CborError::new(ErrorCode::ArrayLenLimitExceeded, h.offset));
                    }
                    self.bump_items(len_us, h.offset)?;
                    self.push_frame(Frame::Array { remaining: Some(len) }, h.offset)?;
                    Ok(Event::ArrayStart(Some(len)))
                }
                Len::Indefinite => {
                    self.push_frame(Frame::Array { remaining: None }, h.offset)?;
                    Ok(Event::ArrayStart(None))
                }
            },
            5 => match wire::read_len(self.src, h.ai, h.offset, self.strict())? {
                Len::Definite(pairs) => {
                    let pairs_us = wire::len_to_usize(pairs, h.offset)?;
                    if pairs_us > self.options.limits.max_map_len {
                        return Err(CborError::new(ErrorCode::MapLenLimitExceeded, h.offset));
                    }
                    let total = pairs_us
                        .checked_mul(2)
                        .ok_or_else(|| CborError::new(ErrorCode::LengthOverflow, h.offset))?;
                    self.bump_items(total, h.offset)?;
                    self.push_frame(
                        Frame::Map {
                            remaining: Some(pairs.saturating_mul(2)),
                            awaiting_value: false,
                        },
                        h.offset,
                    )?;
                    Ok(Event::MapStart(Some(pairs)))
                }
                Len::Indefinite => {
                    self.push_frame(
                        Frame::Map {
                            remaining: None,
                            awaiting_value: false,
                        },
                        h.offset,
                    )?;
                    Ok(Event::MapStart(None))
                }
            },
            6 => {
                let tag = wire::read_uint(self.src, h.ai, h.offset, self.strict())?;
                self.push_frame(Frame::Tag, h.offset)?;
                Ok(Event::TagStart(tag))
            }
            _ => self.simple_or_float(h),
        }
    }

    fn string(&mut self, h: Header, kind: StringKind) -> Result<Event, CborError> {
        if self.pending_len.is_none() && h.ai == 31 {
            self.string_total = 0;
            self.push_frame(Frame::Chunks(kind), h.offset)?;
            return Ok(Event::StringStart(kind));
        }
        let len = self.resolve_len(h, kind, /* accumulate */ false)?;
        let payload_off = self.src.position();
        let payload = self.src.read_exact(len)?;
        let ev = match kind {
            StringKind::Bytes => Event::Bytes(payload.to_vec()),
            StringKind::Text => {
                let s = utf8::validate(payload)
                    .map_err(|()| CborError::new(ErrorCode::Utf8Invalid, payload_off))?;
                Event::Text(s.to_owned())
            }
        };
        self.item_done();
        Ok(ev)
    }

    fn simple_or_float(&mut self, h: Header) -> Result<Event, CborError> {
        let ev = match h.ai {
            0..=23 => Event::Simple(h.ai),
            24 => {
                let v = self.src.read_u8()?;
                if v < 32 {
                    return Err(CborError::new(ErrorCode::InvalidSimpleValue, h.offset));
                }
                Event::Simple(v)
            }
            25 => {
                let s = self.src.read_exact(2)?;
                Event::Float(f64::from(half::f16::from_bits(u16::from_be_bytes([
                    s[0], s[1],
                ]))))
            }
            26 => {
                let s = self.src.read_exact(4)?;
                Event::Float(f64::from(f32::from_bits(u32::from_be_bytes([
                    s[0], s[1], s[2], s[3],
                ]))))
            }
            27 => {
                let s = self.src.read_exact(8)?;
                Event::Float(f64::from_bits(u64::from_be_bytes([
                    s[0], s[1], s[2], s[3], s[4], s[5], s[6], s[7],
                ])))
            }
            _ => return Err(CborError::new(ErrorCode::ReservedAdditionalInfo, h.offset)),
        };
        self.item_done();
        Ok(ev)
    }
}

impl<S: Source> Iterator for EventDecoder<'_, S> {
    type Item = Result<Event, CborError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_event().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{ReaderSource, SliceSource};
    use hex_literal::hex;

    fn events(bytes: &[u8]) -> Result<Vec<Event>, CborError> {
        let mut src = SliceSource::new(bytes);
        let mut dec = EventDecoder::new(&mut src);
        let mut out = Vec::new();
        while let Some(ev) = dec.next_event()? {
            out.push(ev);
        }
        Ok(out)
    }

    #[test]
    fn flat_sequence_of_items() {
        let evs = events(&hex!("01 6161 f5")).unwrap();
        assert_eq!(
            evs,
            vec![
                Event::Unsigned(1),
                Event::Text("a".into()),
                Event::Simple(21)
            ]
        );
    }

    #[test]
    fn definite_and_indefinite_close_alike() {
        let evs = events(&hex!("8101")).unwrap();
        assert_eq!(
            evs,
            vec![
                Event::ArrayStart(Some(1)),
                Event::Unsigned(1),
                Event::ContainerEnd
            ]
        );
        let evs = events(&hex!("9f01ff")).unwrap();
        assert_eq!(
            evs,
            vec![
                Event::ArrayStart(None),
                Event::Unsigned(1),
                Event::ContainerEnd
            ]
        );
    }

    #[test]
    fn empty_definite_containers_close_immediately() {
        assert_eq!(
            events(&hex!("80")).unwrap(),
            vec![Event::ArrayStart(Some(0)), Event::ContainerEnd]
        );
        assert_eq!(
            events(&hex!("a0")).unwrap(),
            vec![Event::MapStart(Some(0)), Event::ContainerEnd]
        );
    }

    #[test]
    fn map_entries_alternate() {
        let evs = events(&hex!("a1 6161 01")).unwrap();
        assert_eq!(
            evs,
            vec![
                Event::MapStart(Some(1)),
                Event::Text("a".into()),
                Event::Unsigned(1),
                Event::ContainerEnd
            ]
        );
    }

    #[test]
    fn break_mid_entry_is_misplaced() {
        let err = events(&hex!("bf 6161 ff")).unwrap_err();
        assert_eq!(err.code, ErrorCode::MisplacedBreak);
    }

    #[test]
    fn tag_wraps_following_item() {
        let evs = events(&hex!("c2 4101")).unwrap();
        assert_eq!(evs, vec![Event::TagStart(2), Event::Bytes(vec![1])]);
        // Tagged container: the tag closes when the container does.
        let evs = events(&hex!("c1 8100")).unwrap();
        assert_eq!(
            evs,
            vec![
                Event::TagStart(1),
                Event::ArrayStart(Some(1)),
                Event::Unsigned(0),
                Event::ContainerEnd
            ]
        );
    }

    #[test]
    fn chunked_text_adjusts_boundaries() {
        let evs = events(&hex!("7f 6463 6166 c3 61a9 ff")).unwrap();
        assert_eq!(
            evs,
            vec![
                Event::StringStart(StringKind::Text),
                Event::TextChunk("caf".into()),
                Event::TextChunk("é".into()),
                Event::StringEnd
            ]
        );
    }

    #[test]
    fn truncated_pull_is_retryable() {
        let mut src = SliceSource::new(&hex!("82 01"));
        let mut dec = EventDecoder::new(&mut src);
        assert_eq!(dec.next_event().unwrap(), Some(Event::ArrayStart(Some(2))));
        assert_eq!(dec.next_event().unwrap(), Some(Event::Unsigned(1)));
        let err = dec.next_event().unwrap_err();
        assert!(err.is_truncated());
        assert!(!dec.at_item_boundary());
    }

    #[test]
    fn resumes_mid_item_on_feedable_source() {
        // A reader that reveals the encoding of "ab" two bytes at a time, with
        // a fake end-of-input between servings.
        struct Feed {
            data: &'static [u8],
            pos: usize,
            starve: bool,
        }
        impl std::io::Read for Feed {
            fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
                if self.starve {
                    self.starve = false;
                    return Ok(0);
                }
                let n = (self.data.len() - self.pos).min(2).min(buf.len());
                buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
                self.pos += n;
                self.starve = true;
                Ok(n)
            }
        }

        let mut src = ReaderSource::new(Feed {
            data: &hex!("626162"),
            pos: 0,
            starve: false,
        });
        let mut dec = EventDecoder::new(&mut src);
        let mut tries = 0;
        let ev = loop {
            match dec.next_event() {
                Ok(ev) => break ev,
                Err(err) => {
                    assert!(err.is_truncated());
                    tries += 1;
                    assert!(tries < 10);
                }
            }
        };
        assert_eq!(ev, Some(Event::Text("ab".into())));
        assert_eq!(dec.next_event().unwrap(), None);
    }

    #[test]
    fn clean_eof_only_at_item_boundary() {
        assert_eq!(events(&hex!("")).unwrap(), vec![]);
        let err = events(&hex!("81")).unwrap_err();
        assert_eq!(err.code, ErrorCode::UnexpectedEof);
    }

    #[test]
    fn depth_counts_open_frames() {
        let mut opts = DecodeOptions::default();
        opts.max_depth = 1;
        let mut src = SliceSource::new(&hex!("818100"));
        let mut dec = EventDecoder::with_options(&mut src, opts);
        assert_eq!(dec.next_event().unwrap(), Some(Event::ArrayStart(Some(1))));
        let err = dec.next_event().unwrap_err();
        assert_eq!(err.code, ErrorCode::DepthLimitExceeded);
    }
}
