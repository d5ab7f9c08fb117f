//! The in-memory representation of a single CBOR data item.
//!
//! An [`Item`] is pure data: construction and structural equality only.
//! Equality is item-wise, not byte-wise — a chunked string equals its
//! definite-length equivalent once chunks are concatenated, and indefinite
//! containers equal their definite counterparts element-wise.

/// One CBOR data item, independent of any native type mapping.
#[derive(Debug, Clone)]
pub enum Item {
    /// Major 0: unsigned integer.
    Unsigned(u64),
    /// Major 1: negative integer; the payload `n` represents `-1 - n`.
    Negative(u64),
    /// Major 2: definite-length byte string.
    Bytes(Vec<u8>),
    /// Major 2: indefinite-length byte string as a chunk sequence.
    BytesChunks(Vec<Vec<u8>>),
    /// Major 3: definite-length text string (always valid UTF-8).
    Text(String),
    /// Major 3: indefinite-length text string as a chunk sequence.
    TextChunks(Vec<String>),
    /// Major 4: definite-length array.
    Array(Vec<Item>),
    /// Major 4: indefinite-length array (length unknown at start).
    IndefiniteArray(Vec<Item>),
    /// Major 5: definite-length map of ordered key/value pairs.
    ///
    /// The model enforces no key uniqueness; duplicates are a decoder policy.
    Map(Vec<(Item, Item)>),
    /// Major 5: indefinite-length map.
    IndefiniteMap(Vec<(Item, Item)>),
    /// Major 6: tagged item. The tag exclusively owns its inner item.
    Tag(u64, Box<Item>),
    /// Major 7: simple value 0..=255 (20..=23 are false/true/null/undefined).
    ///
    /// The break stop-code never surfaces here; it is consumed by the
    /// decoder's container loops.
    Simple(u8),
    /// Major 7: floating-point number, widened to binary64.
    Float(f64),
}

/// The kind of an item, used for registry dispatch on untagged items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    /// Unsigned integer.
    Unsigned,
    /// Negative integer.
    Negative,
    /// Byte string (definite or chunked).
    Bytes,
    /// Text string (definite or chunked).
    Text,
    /// Array (definite or indefinite).
    Array,
    /// Map (definite or indefinite).
    Map,
    /// Tagged item.
    Tag,
    /// Simple value.
    Simple,
    /// Floating-point number.
    Float,
}

impl Item {
    /// Simple value `false`.
    pub const FALSE: Self = Self::Simple(20);
    /// Simple value `true`.
    pub const TRUE: Self = Self::Simple(21);
    /// Simple value `null`.
    pub const NULL: Self = Self::Simple(22);
    /// Simple value `undefined`.
    pub const UNDEFINED: Self = Self::Simple(23);

    /// Construct a boolean item.
    #[inline]
    #[must_use]
    pub const fn bool(v: bool) -> Self {
        if v {
            Self::TRUE
        } else {
            Self::FALSE
        }
    }

    /// Construct an integer item; `None` if outside the major 0/1 range
    /// `[-2^64, 2^64 - 1]`.
    #[must_use]
    pub fn int(v: i128) -> Option<Self> {
        if v >= 0 {
            u64::try_from(v).ok().map(Self::Unsigned)
        } else {
            u64::try_from(-1_i128 - v).ok().map(Self::Negative)
        }
    }

    /// The item's kind.
    #[must_use]
    pub const fn kind(&self) -> ItemKind {
        match self {
            Self::Unsigned(_) => ItemKind::Unsigned,
            Self::Negative(_) => ItemKind::Negative,
            Self::Bytes(_) | Self::BytesChunks(_) => ItemKind::Bytes,
            Self::Text(_) | Self::TextChunks(_) => ItemKind::Text,
            Self::Array(_) | Self::IndefiniteArray(_) => ItemKind::Array,
            Self::Map(_) | Self::IndefiniteMap(_) => ItemKind::Map,
            Self::Tag(..) => ItemKind::Tag,
            Self::Simple(_) => ItemKind::Simple,
            Self::Float(_) => ItemKind::Float,
        }
    }

    /// Returns `true` iff this item uses an indefinite/chunked form.
    #[must_use]
    pub const fn is_indefinite(&self) -> bool {
        matches!(
            self,
            Self::BytesChunks(_)
                | Self::TextChunks(_)
                | Self::IndefiniteArray(_)
                | Self::IndefiniteMap(_)
        )
    }

    /// The integer value as `i128`, covering the full major 0/1 range.
    #[must_use]
    pub const fn as_int(&self) -> Option<i128> {
        match self {
            Self::Unsigned(v) => Some(*v as i128),
            Self::Negative(n) => Some(-1 - (*n as i128)),
            _ => None,
        }
    }

    /// The unsigned value, if this is a major-0 item.
    #[must_use]
    pub const fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Unsigned(v) => Some(*v),
            _ => None,
        }
    }

    /// The text, if this is a definite text string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The bytes, if this is a definite byte string.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// The boolean, if this is simple 20 or 21.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Simple(20) => Some(false),
            Self::Simple(21) => Some(true),
            _ => None,
        }
    }

    /// Returns `true` iff this is the simple value `null`.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Simple(22))
    }

    /// The array elements, definite or indefinite.
    #[must_use]
    pub fn as_array(&self) -> Option<&[Item]> {
        match self {
            Self::Array(items) | Self::IndefiniteArray(items) => Some(items),
            _ => None,
        }
    }

    /// The map entries, definite or indefinite.
    #[must_use]
    pub fn as_map(&self) -> Option<&[(Item, Item)]> {
        match self {
            Self::Map(entries) | Self::IndefiniteMap(entries) => Some(entries),
            _ => None,
        }
    }
}

/// Compare two logical byte sequences presented as chunk iterators without
/// concatenating them.
fn chunks_eq<'a, A, B>(a: A, b: B) -> bool
where
    A: Iterator<Item = &'a [u8]>,
    B: Iterator<Item = &'a [u8]>,
{
    let mut a = a.filter(|c| !c.is_empty());
    let mut b = b.filter(|c| !c.is_empty());
    let mut ca: &[u8] = &[];
    let mut cb: &[u8] = &[];
    loop {
        if ca.is_empty() {
            ca = a.next().unwrap_or(&[]);
        }
        if cb.is_empty() {
            cb = b.next().unwrap_or(&[]);
        }
        match (ca.is_empty(), cb.is_empty()) {
            (true, true) => return true,
            (true, false) | (false, true) => return false,
            (false, false) => {
                let n = ca.len().min(cb.len());
                if ca[..n] != cb[..n] {
                    return false;
                }
                ca = &ca[n..];
                cb = &cb[n..];
            }
        }
    }
}

fn byte_view<'a>(item: &'a Item) -> Option<Box<dyn Iterator<Item = &'a [u8]> + 'a>> {
    match item {
        Item::Bytes(b) => Some(Box::new(core::iter::once(b.as_slice()))),
        Item::BytesChunks(chunks) => Some(Box::new(chunks.iter().map(Vec::as_slice))),
        Item::Text(s) => Some(Box::new(core::iter::once(s.as_bytes()))),
        Item::TextChunks(chunks) => Some(Box::new(chunks.iter().map(String::as_bytes))),
        _ => None,
    }
}

impl PartialEq for Item {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Unsigned(a), Self::Unsigned(b)) | (Self::Negative(a), Self::Negative(b)) => {
                a == b
            }
            (
                Self::Bytes(_) | Self::BytesChunks(_),
                Self::Bytes(_) | Self::BytesChunks(_),
            )
            | (
                Self::Text(_) | Self::TextChunks(_),
                Self::Text(_) | Self::TextChunks(_),
            ) => match (byte_view(self), byte_view(other)) {
                (Some(a), Some(b)) => chunks_eq(a, b),
                _ => false,
            },
            (
                Self::Array(a) | Self::IndefiniteArray(a),
                Self::Array(b) | Self::IndefiniteArray(b),
            ) => a == b,
            (
                Self::Map(a) | Self::IndefiniteMap(a),
                Self::Map(b) | Self::IndefiniteMap(b),
            ) => a == b,
            (Self::Tag(ta, ia), Self::Tag(tb, ib)) => ta == tb && ia == ib,
            (Self::Simple(a), Self::Simple(b)) => a == b,
            // All NaN payloads compare equal; otherwise bit-for-bit.
            (Self::Float(a), Self::Float(b)) => {
                a.to_bits() == b.to_bits() || (a.is_nan() && b.is_nan())
            }
            _ => false,
        }
    }
}

impl Eq for Item {}

impl From<u64> for Item {
    fn from(v: u64) -> Self {
        Self::Unsigned(v)
    }
}

impl From<i64> for Item {
    fn from(v: i64) -> Self {
        if v >= 0 {
            Self::Unsigned(v as u64)
        } else {
            Self::Negative(!(v as u64))
        }
    }
}

impl From<bool> for Item {
    fn from(v: bool) -> Self {
        Self::bool(v)
    }
}

impl From<&str> for Item {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<f64> for Item {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}
