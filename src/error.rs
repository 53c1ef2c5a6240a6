/// Error types for this crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error, from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A value could not be represented as a VINT in 8 bytes.
    #[error("value {0} does not fit in an 8-byte EBML VINT")]
    InvalidVInt(u64),

    /// The main seek-head's reserved capacity was exceeded.
    #[error("seek-head capacity exceeded: {capacity} entries reserved")]
    SeekHeadFull {
        /// The reserved number of entries.
        capacity: usize,
    },

    /// A back-patched master element's payload is larger than what its Void
    /// reservation can hold.
    #[error("void reservation of {available} bytes cannot hold {needed} bytes")]
    ReservationTooSmall {
        /// Bytes actually needed.
        needed: u64,
        /// Bytes available in the reservation.
        available: u64,
    },

    /// More than 126 tracks were registered; the track-number VINT used in
    /// block headers only reserves a single byte (`0x80 | track_number`).
    #[error("too many tracks: {0} exceeds the 126-track limit")]
    TooManyTracks(usize),

    /// Xiph-style codec-private header splitting failed.
    #[error("invalid Xiph header data for codec-private shaping")]
    XiphHeaderInvalid,

    /// FLAC extradata is shorter than a streaminfo block (34 bytes).
    #[error("FLAC extradata too short: {0} bytes, need at least 34")]
    FlacStreaminfoTooShort(usize),

    /// A non-native audio codec has no WAVEFORMATEX tag to fall back to.
    #[error("unsupported audio codec: no WAV tag available")]
    UnsupportedAudioCodec,

    /// A stream's codec type is not video, audio, or subtitle.
    #[error("unsupported track type: stream has no recognized codec_type")]
    UnsupportedTrackType,

    /// A packet's PTS falls outside the signed 16-bit range relative to the
    /// cluster it would be written into.
    #[error("packet pts {pts} is out of range for cluster timecode {cluster_timecode}")]
    PtsOutOfClusterRange {
        /// The packet's presentation timestamp.
        pts: i64,
        /// The current cluster's timecode.
        cluster_timecode: i64,
    },

    /// `write_packet` reached its block-emission step with no cluster open.
    /// Should be unreachable given the rollover check that precedes it; kept
    /// as a propagated error rather than a panic.
    #[error("no cluster is open to write a block into")]
    ClusterNotOpen,
}

/// Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
