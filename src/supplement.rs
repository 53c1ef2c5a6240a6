//! The `Void` filler element, inherited by Matroska from the EBML spec.
//!
//! Used to reserve space during Phase H that Phase T back-patches in place:
//! the main seek-head's reservation, and the `Duration`/`SegmentUID`
//! placeholders inside `Info`.

use crate::base::encode_vint_fixed;
use crate::ids;

/// Encode a `Void` element occupying exactly `total_len` bytes, including its
/// own id and size field.
///
/// `total_len` must be at least 2: one byte for the id, one for the size.
/// The payload itself is zero-filled; nothing ever reads it back.
pub fn encode_void(total_len: u64) -> crate::Result<Vec<u8>> {
    debug_assert!(total_len >= 2, "Void element needs at least 2 bytes");
    let mut out = Vec::with_capacity(total_len as usize);
    out.push(ids::VOID as u8);

    if total_len < 10 {
        let payload_len = total_len - 2;
        let size_byte = encode_vint_fixed(payload_len, 1)?;
        out.push(size_byte[7]);
        out.resize(total_len as usize, 0);
    } else {
        let payload_len = total_len - 9;
        let size_bytes = encode_vint_fixed(payload_len, 8)?;
        out.extend_from_slice(&size_bytes);
        out.resize(total_len as usize, 0);
    }
    Ok(out)
}
