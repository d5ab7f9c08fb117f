//! Header-byte grammar shared by the encoder and decoder: major type and
//! additional-info split, operand resolution, and minimal-length emission.

use crate::io::{Sink, Source};
use crate::{CborError, ErrorCode};

/// Break stop-code (major 7, additional info 31).
pub const BREAK: u8 = 0xff;

/// A parsed header byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Major type (top 3 bits).
    pub major: u8,
    /// Additional info (low 5 bits).
    pub ai: u8,
    /// Byte offset of the header in the input.
    pub offset: usize,
}

/// The resolved length operand of a string or container header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Len {
    /// Length known up front.
    Definite(u64),
    /// Indefinite-length marker; the item runs until a break stop-code.
    Indefinite,
}

/// Read and split one header byte.
///
/// # Errors
///
/// Propagates source failures (`UnexpectedEof`, `Io`).
pub fn read_header<S: Source>(src: &mut S) -> Result<Header, CborError> {
    let offset = src.position();
    let ib = src.read_u8()?;
    Ok(Header {
        major: ib >> 5,
        ai: ib & 0x1f,
        offset,
    })
}

/// Resolve the unsigned operand following a header.
///
/// `strict` additionally rejects operands encoded in a longer-than-necessary
/// form with `NonCanonicalEncoding`.
///
/// # Errors
///
/// Returns `ReservedAdditionalInfo` for additional info 28..=31 (indefinite
/// markers are not valid here) and propagates source failures.
pub fn read_uint<S: Source>(src: &mut S, ai: u8, off: usize, strict: bool) -> Result<u64, CborError> {
    let v = match ai {
        0..=23 => return Ok(u64::from(ai)),
        24 => u64::from(src.read_u8()?),
        25 => {
            let s = src.read_exact(2)?;
            u64::from(u16::from_be_bytes([s[0], s[1]]))
        }
        26 => {
            let s = src.read_exact(4)?;
            u64::from(u32::from_be_bytes([s[0], s[1], s[2], s[3]]))
        }
        27 => {
            let s = src.read_exact(8)?;
            u64::from_be_bytes([s[0], s[1], s[2], s[3], s[4], s[5], s[6], s[7]])
        }
        _ => return Err(CborError::new(ErrorCode::ReservedAdditionalInfo, off)),
    };
    if strict && !is_minimal(ai, v) {
        return Err(CborError::new(ErrorCode::NonCanonicalEncoding, off));
    }
    Ok(v)
}

/// Resolve a length operand, allowing the indefinite marker.
///
/// # Errors
///
/// As for [`read_uint`].
pub fn read_len<S: Source>(src: &mut S, ai: u8, off: usize, strict: bool) -> Result<Len, CborError> {
    if ai == 31 {
        return Ok(Len::Indefinite);
    }
    read_uint(src, ai, off, strict).map(Len::Definite)
}

/// Returns `true` iff `value` could not have been encoded in a shorter form
/// than the one selected by `ai`.
#[must_use]
pub const fn is_minimal(ai: u8, value: u64) -> bool {
    match ai {
        0..=23 => true,
        24 => value >= 24,
        25 => value > u8::MAX as u64,
        26 => value > u16::MAX as u64,
        27 => value > u32::MAX as u64,
        _ => false,
    }
}

/// Narrow a length operand to `usize`.
///
/// # Errors
///
/// Returns `LengthOverflow` if the platform cannot address `len` bytes.
pub fn len_to_usize(len: u64, off: usize) -> Result<usize, CborError> {
    usize::try_from(len).map_err(|_| CborError::new(ErrorCode::LengthOverflow, off))
}

/// Emit a header with the smallest additional-info encoding of `value`.
///
/// # Errors
///
/// Propagates sink failures.
pub fn write_major_uint<S: Sink>(sink: &mut S, major: u8, value: u64) -> Result<(), CborError> {
    debug_assert!(major <= 7);
    if let Ok(v8) = u8::try_from(value) {
        if v8 < 24 {
            return sink.write_u8((major << 5) | v8);
        }
        sink.write_u8((major << 5) | 24)?;
        return sink.write_u8(v8);
    }
    if let Ok(v16) = u16::try_from(value) {
        sink.write_u8((major << 5) | 25)?;
        return sink.write(&v16.to_be_bytes());
    }
    if let Ok(v32) = u32::try_from(value) {
        sink.write_u8((major << 5) | 26)?;
        return sink.write(&v32.to_be_bytes());
    }
    sink.write_u8((major << 5) | 27)?;
    sink.write(&value.to_be_bytes())
}

/// Emit a length header.
///
/// # Errors
///
/// Returns `LengthOverflow` if `len` does not fit the wire representation,
/// or propagates sink failures.
pub fn write_major_len<S: Sink>(sink: &mut S, major: u8, len: usize) -> Result<(), CborError> {
    let len_u64 =
        u64::try_from(len).map_err(|_| CborError::new(ErrorCode::LengthOverflow, sink.position()))?;
    write_major_uint(sink, major, len_u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::SliceSource;

    #[test]
    fn strict_rejects_overlong_operand() {
        // 24 encoded with a one-byte operand below 24.
        let mut src = SliceSource::new(&[0x17]);
        let h = read_header(&mut src).unwrap();
        assert_eq!((h.major, h.ai), (0, 0x17));

        let mut src = SliceSource::new(&[0x00]);
        let err = read_uint(&mut src, 24, 0, true).unwrap_err();
        assert_eq!(err.code, ErrorCode::NonCanonicalEncoding);

        let mut src = SliceSource::new(&[0x00]);
        assert_eq!(read_uint(&mut src, 24, 0, false).unwrap(), 0);
    }

    #[test]
    fn reserved_additional_info_is_malformed() {
        let mut src = SliceSource::new(&[]);
        let err = read_uint(&mut src, 28, 5, false).unwrap_err();
        assert_eq!(err.code, ErrorCode::ReservedAdditionalInfo);
        assert_eq!(err.offset, 5);
    }

    #[test]
    fn minimal_header_emission() {
        let mut sink = crate::io::VecSink::new();
        write_major_uint(&mut sink, 0, 23).unwrap();
        write_major_uint(&mut sink, 0, 24).unwrap();
        write_major_uint(&mut sink, 0, 256).unwrap();
        assert_eq!(sink.as_bytes(), &[0x17, 0x18, 0x18, 0x19, 0x01, 0x00]);
    }
}
