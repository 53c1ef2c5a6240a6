//! The variable-length integer (VINT) at the heart of EBML encoding.
//!
//! Unlike the read-path `VInt64` this crate's teacher carried, there is no
//! decode direction here: every size this muxer writes is either a concrete,
//! already-known value or the single well-known "unknown size" sentinel used
//! to open a master element (see [`crate::ebml`]).

use crate::error::Error;

/// Smallest byte width `B` such that `value <= 2^(7B) - 2`.
///
/// This is the general form of the "avoid colliding with the all-ones
/// unknown-size marker" rule: a VINT of `B` bytes has `7B` payload bits, but
/// the all-ones payload is reserved, so only `2^(7B) - 1` values are
/// representable and the all-ones value itself is excluded from ordinary
/// use, leaving `2^(7B) - 2` representable values... plus the one at
/// `2^(7B) - 2` itself, hence the `<=`. Equivalent to `ceil(log2(n+2)/7)`.
pub fn vint_size_bytes(value: u64) -> usize {
    let mut bytes = 1usize;
    while bytes < 8 && value > (1u64 << (7 * bytes)) - 2 {
        bytes += 1;
    }
    bytes
}

/// Byte length of an EBML element id of the given magnitude.
///
/// The id is written verbatim — its leading "VINT marker" bits are already
/// part of the nominal id constant — so the only question is how many
/// significant bytes it occupies.
pub fn id_size_bytes(id: u64) -> usize {
    if id == 0 {
        return 1;
    }
    let significant_bits = 64 - id.leading_zeros() as usize;
    significant_bits.div_ceil(8)
}

/// Encode `value` as a VINT in exactly `width` bytes.
///
/// `width` must be `>= vint_size_bytes(value)` and `<= 8`; callers are
/// expected to have already computed `max(min_bytes, vint_size_bytes(value))`.
pub fn encode_vint_fixed(value: u64, width: usize) -> Result<[u8; 8], Error> {
    if width == 0 || width > 8 || vint_size_bytes(value) > width {
        return Err(Error::InvalidVInt(value));
    }
    let mut buf = [0u8; 8];
    let slice = &mut buf[8 - width..];
    slice.copy_from_slice(&value.to_be_bytes()[8 - width..]);
    slice[0] |= 1u8 << (8 - width);
    Ok(buf)
}

/// The canonical 8-byte "unknown size" sentinel: a VINT whose payload bits
/// are all set, used to open every master element before its true size is
/// known (see `open_master`/`close_master`).
pub const UNKNOWN_SIZE_8: [u8; 8] = [0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];

/// The 1-byte unknown-size sentinel.
pub const UNKNOWN_SIZE_1: [u8; 1] = [0xFF];
