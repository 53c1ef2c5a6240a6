//! Per-keyframe seek index (Component C).
//!
//! Entries are appended only on video keyframes of a single video stream, at
//! the start of a cluster — so entries sharing the same `pts` are always
//! adjacent in the flat storage below; grouping by equal `pts` does not need
//! a sort pass.

use crate::ebml::{EbmlWriter, Sink};
use crate::ids;

/// A single appended cue: `(pts, track_number, cluster_position_in_segment)`.
type CueEntry = (i64, u64, u64);

/// Append-only list of cue entries, finalized into a `Cues` master.
#[derive(Default)]
pub struct CueBuilder {
    entries: Vec<CueEntry>,
}

impl CueBuilder {
    /// A builder with no entries yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `(pts, track_number, cluster_position_in_segment)`.
    pub fn append(&mut self, pts: i64, track_number: u64, cluster_position_in_segment: u64) {
        self.entries.push((pts, track_number, cluster_position_in_segment));
    }

    /// Emit a `Cues` master. Entries are grouped by equal `pts`: each group
    /// becomes one `CuePoint` with `CueTime = pts`, followed by one
    /// `CueTrackPositions` per group member. Returns the absolute position of
    /// the `Cues` element.
    ///
    /// Equal-`pts` groups are collapsed by scanning forward for the run of
    /// entries sharing `pts` and advancing the outer index past the whole
    /// run — not by one, which would revisit the run's last entry.
    pub fn finalize<S: Sink>(&self, writer: &mut EbmlWriter<S>) -> crate::Result<u64> {
        let abs_pos = writer.pos()?;
        let token = writer.open_master(ids::CUES)?;

        let mut i = 0;
        while i < self.entries.len() {
            let pts = self.entries[i].0;
            let mut j = i + 1;
            while j < self.entries.len() && self.entries[j].0 == pts {
                j += 1;
            }

            let cue_point = writer.open_master(ids::CUE_POINT)?;
            writer.put_uint(ids::CUE_TIME, pts as u64)?;
            for &(_, track_number, cluster_position) in &self.entries[i..j] {
                let positions = writer.open_master(ids::CUE_TRACK_POSITIONS)?;
                writer.put_uint(ids::CUE_TRACK, track_number)?;
                writer.put_uint(ids::CUE_CLUSTER_POSITION, cluster_position)?;
                writer.close_master(positions)?;
            }
            writer.close_master(cue_point)?;

            i = j;
        }

        writer.close_master(token)?;
        Ok(abs_pos)
    }
}
