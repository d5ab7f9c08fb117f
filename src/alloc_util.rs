use core::alloc::Layout;

use crate::{CborError, ErrorCode};

#[inline]
fn check_reserve_len<T>(len: usize, additional: usize, offset: usize) -> Result<(), CborError> {
    let needed = len
        .checked_add(additional)
        .ok_or_else(|| CborError::new(ErrorCode::LengthOverflow, offset))?;
    Layout::array::<T>(needed).map_err(|_| CborError::new(ErrorCode::LengthOverflow, offset))?;
    Ok(())
}

#[inline]
pub fn try_reserve_exact<T>(
    v: &mut Vec<T>,
    additional: usize,
    offset: usize,
) -> Result<(), CborError> {
    let needed = v
        .len()
        .checked_add(additional)
        .ok_or_else(|| CborError::new(ErrorCode::LengthOverflow, offset))?;
    if needed <= v.capacity() {
        return Ok(());
    }
    check_reserve_len::<T>(v.len(), additional, offset)?;
    v.try_reserve_exact(additional)
        .map_err(|_| CborError::new(ErrorCode::AllocationFailed, offset))
}

#[inline]
pub fn try_reserve<T>(v: &mut Vec<T>, additional: usize, offset: usize) -> Result<(), CborError> {
    let needed = v
        .len()
        .checked_add(additional)
        .ok_or_else(|| CborError::new(ErrorCode::LengthOverflow, offset))?;
    if needed <= v.capacity() {
        return Ok(());
    }
    check_reserve_len::<T>(v.len(), additional, offset)?;
    v.try_reserve(additional)
        .map_err(|_| CborError::new(ErrorCode::AllocationFailed, offset))
}

#[inline]
pub fn try_vec_from_slice(bytes: &[u8], offset: usize) -> Result<Vec<u8>, CborError> {
    let mut v = Vec::new();
    try_reserve_exact(&mut v, bytes.len(), offset)?;
    v.extend_from_slice(bytes);
    Ok(v)
}
