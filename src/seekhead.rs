//! Forward index of level-1 elements (Component B).
//!
//! Two instances of this builder exist per muxed file: the *main* seek-head,
//! reserved at the start of the segment payload so it can point forward at
//! elements not yet written, and the *cluster* seek-head, appended after the
//! last cluster once every `Cluster`'s final position is known.

use crate::base::id_size_bytes;
use crate::ebml::{EbmlWriter, Sink};
use crate::error::Error;
use crate::ids;

enum Mode {
    /// Space for `capacity` entries was reserved with a `Void` at
    /// `reservation_pos` (a position within the segment payload).
    Reserved { capacity: usize, reservation_pos: u64 },
    /// No reservation; emitted wherever the cursor happens to be at
    /// `finalize` time.
    Appended,
}

/// Builds a `SeekHead` master, either in a bounded reservation made ahead of
/// time or appended in place once finalized.
pub struct SeekHeadBuilder {
    mode: Mode,
    segment_payload_start: u64,
    entries: Vec<(u64, u64)>,
}

impl SeekHeadBuilder {
    /// Reserve `28 * capacity + 13` bytes at the writer's current position
    /// for up to `capacity` entries. Entries added beyond `capacity` are
    /// rejected by `add_entry`.
    pub fn reserved<S: Sink>(
        writer: &mut EbmlWriter<S>,
        capacity: usize,
        segment_payload_start: u64,
    ) -> crate::Result<Self> {
        let reservation_pos = writer.pos()?;
        writer.put_void(28 * capacity as u64 + 13)?;
        Ok(Self {
            mode: Mode::Reserved {
                capacity,
                reservation_pos,
            },
            segment_payload_start,
            entries: Vec::new(),
        })
    }

    /// No reservation is made; the seek-head is emitted wherever the cursor
    /// happens to be when `finalize` is called.
    pub fn appended(segment_payload_start: u64) -> Self {
        Self {
            mode: Mode::Appended,
            segment_payload_start,
            entries: Vec::new(),
        }
    }

    /// Record `(element_id, absolute_offset - segment_payload_start)`.
    pub fn add_entry(&mut self, id: u64, absolute_offset: u64) -> crate::Result<()> {
        if let Mode::Reserved { capacity, .. } = &self.mode {
            if self.entries.len() >= *capacity {
                return Err(Error::SeekHeadFull { capacity: *capacity });
            }
        }
        self.entries.push((id, absolute_offset - self.segment_payload_start));
        Ok(())
    }

    fn write_seekhead_body<S: Sink>(&self, writer: &mut EbmlWriter<S>) -> crate::Result<()> {
        let token = writer.open_master(ids::SEEK_HEAD)?;
        for &(id, position) in &self.entries {
            let seek_token = writer.open_master(ids::SEEK)?;
            let width = id_size_bytes(id);
            let id_bytes = id.to_be_bytes();
            writer.put_binary(ids::SEEK_ID, &id_bytes[8 - width..])?;
            writer.put_uint(ids::SEEK_POSITION, position)?;
            writer.close_master(seek_token)?;
        }
        writer.close_master(token)
    }

    /// Emit the `SeekHead` master. In reserved mode this seeks back into the
    /// reservation, writes there, pads any leftover bytes with a `Void`,
    /// restores the cursor, and returns the segment-relative offset of the
    /// seek-head. In appended mode it writes in-line and returns the
    /// absolute position.
    pub fn finalize<S: Sink>(&self, writer: &mut EbmlWriter<S>) -> crate::Result<u64> {
        match self.mode {
            Mode::Reserved {
                capacity,
                reservation_pos,
            } => {
                let resume_at = writer.pos()?;
                writer.sink_mut().seek_to(reservation_pos)?;
                self.write_seekhead_body(writer)?;
                let consumed = writer.pos()? - reservation_pos;
                let reserved_total = 28 * capacity as u64 + 13;
                let remaining = reserved_total - consumed;
                match remaining {
                    0 => {}
                    1 => {
                        return Err(Error::ReservationTooSmall {
                            needed: consumed + 1,
                            available: reserved_total,
                        });
                    }
                    n => writer.put_void(n)?,
                }
                writer.sink_mut().seek_to(resume_at)?;
                Ok(reservation_pos - self.segment_payload_start)
            }
            Mode::Appended => {
                let abs_pos = writer.pos()?;
                self.write_seekhead_body(writer)?;
                Ok(abs_pos)
            }
        }
    }
}
