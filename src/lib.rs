#![warn(missing_docs)]
#![doc = include_str!("../README.md")]

/// Error types for this crate.
mod error;
pub use error::*;

/// Element id constants for EBML/Matroska/WebM.
mod ids;

/// base types for EBML elements, ie. `VInt64`.
mod base;

/// The EBML primitive writer: VINT id/size, fixed-width leaf elements, master
/// open/close with seek-based back-patching.
mod ebml;
pub use ebml::{EbmlWriter, MasterToken, Sink};

/// Supplementary elements. Currently just `Void`, used for reservations.
///
/// This element is not from the Matroska specification, but Matroska
/// specifications inherit it from the EBML specification.
mod supplement;

/// Xiph-style size lacing, used only inside codec-private blobs.
mod lacer;

/// Forward index of level-1 elements (`SeekHead`/`Seek`).
mod seekhead;
pub use seekhead::SeekHeadBuilder;

/// Per-keyframe seek index (`Cues`/`CuePoint`/`CueTrackPositions`).
mod cues;
pub use cues::CueBuilder;

/// Per-codec shaping of `CodecPrivate` data.
pub mod codec;

/// Per-stream `TrackEntry` construction.
mod track;
pub use track::{AudioParams, CodecKind, StreamDescriptor, TrackType, VideoGeometry, write_track_entry};

/// The segment orchestrator: header/packet/trailer phases, cluster rollover,
/// MD5-derived segment UID.
mod segment;
pub use segment::{Muxer, MuxerConfig, OutputKind, Packet, PacketFlags};

/// A prelude for common types and traits.
pub mod prelude {
    pub use crate::codec::*;
    pub use crate::ebml::*;
    pub use crate::error::*;
    pub use crate::segment::*;
    pub use crate::track::*;
}
