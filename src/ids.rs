//! EBML/Matroska/WebM element id constants.
//!
//! These are hand-declared rather than generated from the official
//! `ebml_matroska.xml` schema (the generator this crate's ancestor used is
//! gone along with the schema file it depended on); only the ids this muxer
//! actually writes are listed. Naming mirrors the Matroska specification's
//! element names in UpperCamelCase, e.g. `EBMLVersion` -> `EBML_VERSION`.

#![allow(missing_docs)]

// --- EBML header ---
pub const EBML: u64 = 0x1A45_DFA3;
pub const EBML_VERSION: u64 = 0x4286;
pub const EBML_READ_VERSION: u64 = 0x42F7;
pub const EBML_MAX_ID_LENGTH: u64 = 0x42F2;
pub const EBML_MAX_SIZE_LENGTH: u64 = 0x42F3;
pub const DOC_TYPE: u64 = 0x4282;
pub const DOC_TYPE_VERSION: u64 = 0x4287;
pub const DOC_TYPE_READ_VERSION: u64 = 0x4285;

// --- Segment / SeekHead ---
pub const SEGMENT: u64 = 0x1853_8067;
pub const SEEK_HEAD: u64 = 0x114D_9B74;
pub const SEEK: u64 = 0x4DBB;
pub const SEEK_ID: u64 = 0x53AB;
pub const SEEK_POSITION: u64 = 0x53AC;

// --- Info ---
pub const INFO: u64 = 0x1549_A966;
pub const TIMESTAMP_SCALE: u64 = 0x2AD7_B1;
pub const DURATION: u64 = 0x4489;
pub const TITLE: u64 = 0x7BA9;
pub const MUXING_APP: u64 = 0x4D80;
pub const WRITING_APP: u64 = 0x5741;
pub const SEGMENT_UID: u64 = 0x73A4;

// --- Tracks ---
pub const TRACKS: u64 = 0x1654_AE6B;
pub const TRACK_ENTRY: u64 = 0xAE;
pub const TRACK_NUMBER: u64 = 0xD7;
pub const TRACK_UID: u64 = 0x73C5;
pub const TRACK_TYPE: u64 = 0x83;
pub const FLAG_LACING: u64 = 0x9C;
pub const LANGUAGE: u64 = 0x22B5_9C;
pub const CODEC_ID: u64 = 0x86;
pub const CODEC_PRIVATE: u64 = 0x63A2;
pub const VIDEO: u64 = 0xE0;
pub const PIXEL_WIDTH: u64 = 0xB0;
pub const PIXEL_HEIGHT: u64 = 0xBA;
pub const DISPLAY_WIDTH: u64 = 0x54B0;
pub const DISPLAY_HEIGHT: u64 = 0x54BA;
pub const AUDIO: u64 = 0xE1;
pub const SAMPLING_FREQUENCY: u64 = 0xB5;
pub const OUTPUT_SAMPLING_FREQUENCY: u64 = 0x78B5;
pub const CHANNELS: u64 = 0x9F;
pub const BIT_DEPTH: u64 = 0x6264;

// --- Cluster ---
pub const CLUSTER: u64 = 0x1F43_B675;
pub const TIMESTAMP: u64 = 0xE7;
pub const SIMPLE_BLOCK: u64 = 0xA3;
pub const BLOCK_GROUP: u64 = 0xA0;
pub const BLOCK: u64 = 0xA1;
pub const BLOCK_DURATION: u64 = 0x9B;

// --- Cues ---
pub const CUES: u64 = 0x1C53_BB6B;
pub const CUE_POINT: u64 = 0xBB;
pub const CUE_TIME: u64 = 0xB3;
pub const CUE_TRACK_POSITIONS: u64 = 0xB7;
pub const CUE_TRACK: u64 = 0xF7;
pub const CUE_CLUSTER_POSITION: u64 = 0xF1;

// --- Supplementary ---
pub const VOID: u64 = 0xEC;
