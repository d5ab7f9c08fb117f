//! Native value model: the Rust-side counterpart of the wire-level
//! [`Item`](crate::Item), produced and consumed through a
//! [`Registry`](crate::Registry).
//!
//! [`Value`] folds wire artifacts away: chunked strings arrive joined,
//! definite and indefinite containers are indistinguishable, and the
//! well-known tags are resolved (0/1 to [`Timestamp`](Value::Timestamp),
//! 2/3 to integers or [`BigInt`]). Unknown tags survive losslessly as
//! [`Value::Tagged`].

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::{CborError, ErrorCode};

/// An arbitrary-precision integer, as carried by tags 2 and 3.
///
/// The magnitude is a big-endian byte string without leading zeros. For
/// negative values the magnitude `n` represents `-1 - n`, mirroring the wire
/// convention, so `-1` has an empty magnitude.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BigInt {
    negative: bool,
    magnitude: Vec<u8>,
}

impl BigInt {
    /// Build from a raw tag 2/3 payload. Leading zero bytes are stripped, so
    /// two encodings of the same number compare equal.
    #[must_use]
    pub fn from_tag_bytes(negative: bool, bytes: &[u8]) -> Self {
        let lead = bytes.iter().take_while(|&&b| b == 0).count();
        Self {
            negative,
            magnitude: bytes[lead..].to_vec(),
        }
    }

    /// Returns `true` iff the value is below zero.
    #[must_use]
    pub const fn is_negative(&self) -> bool {
        self.negative
    }

    /// The magnitude bytes, big-endian, no leading zeros. For negative values
    /// this is `n` where the value is `-1 - n`.
    #[must_use]
    pub fn magnitude(&self) -> &[u8] {
        &self.magnitude
    }

    /// The value as `i128`, if it fits.
    #[must_use]
    pub fn to_i128(&self) -> Option<i128> {
        if self.magnitude.len() > 16 {
            return None;
        }
        let mut n: u128 = 0;
        for &b in &self.magnitude {
            n = (n << 8) | u128::from(b);
        }
        if self.negative {
            // Value is -1 - n; representable iff n <= i128::MAX.
            let n = i128::try_from(n).ok()?;
            Some(-1 - n)
        } else {
            i128::try_from(n).ok()
        }
    }

    /// The value as `u64`, if it fits.
    #[must_use]
    pub fn to_u64(&self) -> Option<u64> {
        if self.negative {
            return None;
        }
        self.to_i128().and_then(|v| u64::try_from(v).ok())
    }
}

/// Big-endian magnitude bytes of `n`, no leading zeros; empty for zero.
#[must_use]
pub(crate) fn magnitude_from_u128(n: u128) -> Vec<u8> {
    let bytes = n.to_be_bytes();
    let lead = bytes.iter().take_while(|&&b| b == 0).count();
    bytes[lead..].to_vec()
}

impl From<u128> for BigInt {
    fn from(n: u128) -> Self {
        Self {
            negative: false,
            magnitude: magnitude_from_u128(n),
        }
    }
}

impl From<i128> for BigInt {
    fn from(v: i128) -> Self {
        if v >= 0 {
            #[allow(clippy::cast_sign_loss)]
            Self::from(v as u128)
        } else {
            // -1 - v cannot overflow: v < 0 implies -1 - v in [0, i128::MAX].
            #[allow(clippy::cast_sign_loss)]
            let n = (-1 - v) as u128;
            Self {
                negative: true,
                magnitude: magnitude_from_u128(n),
            }
        }
    }
}

/// A decoded native value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// `null`.
    Null,
    /// `undefined`.
    Undefined,
    /// Boolean.
    Bool(bool),
    /// Integer within `i128`.
    Int(i128),
    /// Integer beyond `i128`, from tag 2/3.
    Bignum(BigInt),
    /// Floating-point number.
    Float(f64),
    /// Byte string, chunks joined.
    Bytes(Vec<u8>),
    /// Text string, chunks joined.
    Text(String),
    /// Array.
    Array(Vec<Value>),
    /// Map as ordered key/value pairs.
    Map(Vec<(Value, Value)>),
    /// Date/time from tag 0 or 1.
    Timestamp(OffsetDateTime),
    /// Simple value other than 20..=23.
    Simple(u8),
    /// An item under a tag the registry does not know.
    Tagged(u64, Box<Value>),
}

impl Value {
    /// The integer, from `Int` or a fitting `Bignum`.
    #[must_use]
    pub fn as_int(&self) -> Option<i128> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Bignum(b) => b.to_i128(),
            _ => None,
        }
    }

    /// The text, if this is a text string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Look up a map entry by text key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Self> {
        match self {
            Self::Map(entries) => entries
                .iter()
                .find(|(k, _)| k.as_str() == Some(key))
                .map(|(_, v)| v),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(i128::from(v))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

/// Parse a tag 0 payload (RFC 3339 text).
///
/// # Errors
///
/// Returns `InvalidTimestamp` if the text does not parse.
pub fn timestamp_from_rfc3339(text: &str, offset: usize) -> Result<OffsetDateTime, CborError> {
    OffsetDateTime::parse(text, &Rfc3339)
        .map_err(|_| CborError::new(ErrorCode::InvalidTimestamp, offset))
}

/// Render a date/time as a tag 0 payload.
///
/// # Errors
///
/// Returns `InvalidTimestamp` for dates RFC 3339 cannot express.
pub fn timestamp_to_rfc3339(ts: OffsetDateTime) -> Result<String, CborError> {
    ts.format(&Rfc3339)
        .map_err(|_| CborError::new(ErrorCode::InvalidTimestamp, 0))
}

/// Interpret a tag 1 integer payload (seconds since the epoch).
///
/// # Errors
///
/// Returns `InvalidTimestamp` outside the representable range.
pub fn timestamp_from_epoch_secs(secs: i128, offset: usize) -> Result<OffsetDateTime, CborError> {
    let secs =
        i64::try_from(secs).map_err(|_| CborError::new(ErrorCode::InvalidTimestamp, offset))?;
    OffsetDateTime::from_unix_timestamp(secs)
        .map_err(|_| CborError::new(ErrorCode::InvalidTimestamp, offset))
}

/// Interpret a tag 1 float payload (fractional seconds since the epoch).
///
/// # Errors
///
/// Returns `InvalidTimestamp` for non-finite input or out-of-range values.
pub fn timestamp_from_epoch_float(secs: f64, offset: usize) -> Result<OffsetDateTime, CborError> {
    if !secs.is_finite() {
        return Err(CborError::new(ErrorCode::InvalidTimestamp, offset));
    }
    let nanos = secs * 1e9;
    if nanos.abs() >= 0x8000_0000_0000_0000_0000_0000_0000_0000u128 as f64 {
        return Err(CborError::new(ErrorCode::InvalidTimestamp, offset));
    }
    #[allow(clippy::cast_possible_truncation)]
    OffsetDateTime::from_unix_timestamp_nanos(nanos as i128)
        .map_err(|_| CborError::new(ErrorCode::InvalidTimestamp, offset))
}
