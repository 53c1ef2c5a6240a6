//! The segment orchestrator (Component F): header, packet, and trailer
//! phases of a single muxed file.
//!
//! `Muxer<S>` drives everything below it: [`crate::ebml`] for primitives,
//! [`crate::seekhead`] for the two forward indexes, [`crate::cues`] for the
//! keyframe index, and [`crate::track`]/[`crate::codec`] for `TrackEntry`
//! construction. Timestamps on [`Packet`] are in milliseconds, matching the
//! default `TimestampScale` of 1,000,000 ns; callers who change
//! `timestamp_scale` are responsible for supplying already-rescaled values.

use md5::{Digest, Md5};

use crate::base::{encode_vint_fixed, vint_size_bytes};
use crate::cues::CueBuilder;
use crate::ebml::{EbmlWriter, Sink};
use crate::error::Error;
use crate::ids;
use crate::seekhead::SeekHeadBuilder;
use crate::track::{StreamDescriptor, TrackType, write_track_entry};

/// Matroska vs. WebM output; differs only in `EBML.DocType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    /// `DocType = "matroska"`.
    Matroska,
    /// `DocType = "webm"`.
    WebM,
}

impl OutputKind {
    fn doc_type(self) -> &'static str {
        match self {
            OutputKind::Matroska => "matroska",
            OutputKind::WebM => "webm",
        }
    }
}

/// Muxer-wide settings fixed for the life of one output file.
#[derive(Debug, Clone)]
pub struct MuxerConfig {
    /// Matroska or WebM `DocType`.
    pub output_kind: OutputKind,
    /// Suppresses `MuxingApp`/`WritingApp`/`SegmentUID` so that muxing the
    /// same input twice produces byte-identical output.
    pub bit_exact: bool,
    /// Number of entries reserved in the main (header) seek-head.
    pub seekhead_capacity: usize,
    /// `TimestampScale` in nanoseconds per tick.
    pub timestamp_scale: u64,
    /// `Title`, omitted when absent.
    pub title: Option<String>,
    /// `MuxingApp`, ignored in bit-exact mode.
    pub muxing_app: String,
    /// `WritingApp`, ignored in bit-exact mode.
    pub writing_app: String,
    /// A cluster rolls over once its payload reaches this many bytes.
    pub cluster_max_bytes: u64,
    /// A cluster rolls over once a packet's `pts_ms` exceeds the cluster's
    /// base timecode by more than this many milliseconds.
    pub cluster_max_duration_ms: i64,
}

impl Default for MuxerConfig {
    fn default() -> Self {
        let app = concat!("mkv-mux/", env!("CARGO_PKG_VERSION"));
        Self {
            output_kind: OutputKind::Matroska,
            bit_exact: false,
            seekhead_capacity: 10,
            timestamp_scale: 1_000_000,
            title: None,
            muxing_app: app.to_string(),
            writing_app: app.to_string(),
            cluster_max_bytes: 5 * 1024 * 1024,
            cluster_max_duration_ms: 5000,
        }
    }
}

/// Whether a packet starts a new, independently decodable unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacketFlags {
    /// Sets `SimpleBlock`'s keyframe bit. Ignored on non-video tracks.
    pub keyframe: bool,
}

/// One coded frame handed to the packet phase.
pub struct Packet {
    /// Which `TrackEntry` this belongs to.
    pub track_number: u64,
    /// The track's type, needed to decide cue eligibility and block shape.
    pub track_type: TrackType,
    /// Presentation timestamp in milliseconds.
    pub pts_ms: i64,
    /// Explicit duration in milliseconds. Only meaningful for subtitle
    /// packets, which are always wrapped in a `BlockGroup` carrying
    /// `BlockDuration`; audio and video packets always emit `SimpleBlock`
    /// and ignore this field.
    pub duration_ms: Option<i64>,
    /// Keyframe/lacing flags.
    pub flags: PacketFlags,
    /// Coded frame bytes.
    pub data: Vec<u8>,
}

struct ClusterState {
    abs_pos: u64,
    token: crate::ebml::MasterToken,
    timecode_ms: i64,
    first_packet_hashed: bool,
}

enum Phase {
    Header,
    Packets,
    Trailer,
}

/// Drives Phase H (header), Phase P (packets), and Phase T (trailer) of one
/// muxed output file.
pub struct Muxer<S: Sink> {
    writer: EbmlWriter<S>,
    config: MuxerConfig,
    segment_payload_start: u64,
    main_seekhead: SeekHeadBuilder,

    info_pos: u64,
    tracks_pos: u64,
    duration_value_pos: u64,
    segment_uid_value_pos: Option<u64>,

    cues: CueBuilder,
    cluster_positions: Vec<u64>,
    current_cluster: Option<ClusterState>,
    md5: Option<Md5>,

    latest_duration_ticks: i64,
    phase: Phase,
}

impl<S: Sink> Muxer<S> {
    /// Write the EBML header, open the `Segment`, and reserve the main
    /// seek-head. Call [`Muxer::write_header`] next with the stream list.
    pub fn new(sink: S, config: MuxerConfig) -> crate::Result<Self> {
        let mut writer = EbmlWriter::new(sink);
        write_ebml_header(&mut writer, &config)?;
        let segment_payload_start = writer.open_segment()?;
        let main_seekhead =
            SeekHeadBuilder::reserved(&mut writer, config.seekhead_capacity, segment_payload_start)?;

        Ok(Self {
            writer,
            config,
            segment_payload_start,
            main_seekhead,
            info_pos: 0,
            tracks_pos: 0,
            duration_value_pos: 0,
            segment_uid_value_pos: None,
            cues: CueBuilder::new(),
            cluster_positions: Vec::new(),
            current_cluster: None,
            md5: None,
            latest_duration_ticks: 0,
            phase: Phase::Header,
        })
    }

    /// Write `Info` and one `TrackEntry` per stream. Rejects more than 126
    /// tracks (the largest `TrackNumber` this muxer's VINT-minimal encoding
    /// assumes stays within common single-byte values) and propagates any
    /// per-track rejection (e.g. a video track with no geometry).
    pub fn write_header(&mut self, streams: &[StreamDescriptor]) -> crate::Result<()> {
        debug_assert!(matches!(self.phase, Phase::Header), "write_header called out of order");
        if streams.len() > 126 {
            return Err(Error::TooManyTracks(streams.len()));
        }

        self.info_pos = self.writer.pos()?;
        let info = self.writer.open_master(ids::INFO)?;
        self.writer.put_uint(ids::TIMESTAMP_SCALE, self.config.timestamp_scale)?;
        if let Some(title) = &self.config.title {
            self.writer.put_string(ids::TITLE, title)?;
        }
        if !self.config.bit_exact {
            self.writer.put_string(ids::MUXING_APP, &self.config.muxing_app)?;
            self.writer.put_string(ids::WRITING_APP, &self.config.writing_app)?;
            self.segment_uid_value_pos =
                Some(self.writer.put_binary_placeholder(ids::SEGMENT_UID, 16)?);
            self.md5 = Some(Md5::new());
        }
        self.duration_value_pos = self.writer.put_float_placeholder(ids::DURATION)?;
        self.writer.close_master(info)?;

        self.tracks_pos = self.writer.pos()?;
        let tracks = self.writer.open_master(ids::TRACKS)?;
        for stream in streams {
            write_track_entry(&mut self.writer, stream)?;
        }
        self.writer.close_master(tracks)?;

        self.phase = Phase::Packets;
        Ok(())
    }

    /// Append one coded frame. Opens a new cluster on the first call, and
    /// whenever the current cluster's size or duration exceeds its
    /// configured limits.
    pub fn write_packet(&mut self, packet: Packet) -> crate::Result<()> {
        debug_assert!(matches!(self.phase, Phase::Packets), "write_packet called out of order");
        let needs_new_cluster = match &self.current_cluster {
            None => true,
            Some(cluster) => {
                let bytes_so_far = self.writer.pos()? - cluster.abs_pos;
                bytes_so_far >= self.config.cluster_max_bytes
                    || packet.pts_ms - cluster.timecode_ms >= self.config.cluster_max_duration_ms
            }
        };
        if needs_new_cluster {
            self.close_current_cluster()?;
            self.open_cluster(packet.pts_ms)?;
        }

        let cluster = self.current_cluster_mut()?;
        let relative_ms = packet.pts_ms - cluster.timecode_ms;
        if !(i16::MIN as i64..=i16::MAX as i64).contains(&relative_ms) {
            return Err(Error::PtsOutOfClusterRange {
                pts: packet.pts_ms,
                cluster_timecode: cluster.timecode_ms,
            });
        }

        if !cluster.first_packet_hashed {
            cluster.first_packet_hashed = true;
            if let Some(md5) = &mut self.md5 {
                let take = packet.data.len().min(200);
                md5.update(&packet.data[..take]);
            }
        }

        self.write_block(&packet, relative_ms as i16)?;

        if packet.track_type == TrackType::Video && packet.flags.keyframe {
            let cluster_position_in_segment = cluster.abs_pos - self.segment_payload_start;
            self.cues
                .append(packet.pts_ms, packet.track_number, cluster_position_in_segment);
        }

        self.latest_duration_ticks = packet.pts_ms + packet.duration_ms.unwrap_or(0);
        Ok(())
    }

    /// The currently open cluster. `write_packet` always closes and reopens
    /// one before reaching here, so this only fails if that invariant is
    /// ever broken — propagated rather than panicked on, per this crate's
    /// no-panic-outside-tests convention.
    fn current_cluster_mut(&mut self) -> crate::Result<&mut ClusterState> {
        self.current_cluster.as_mut().ok_or(Error::ClusterNotOpen)
    }

    fn open_cluster(&mut self, timecode_ms: i64) -> crate::Result<()> {
        let abs_pos = self.writer.pos()?;
        let token = self.writer.open_master(ids::CLUSTER)?;
        self.writer.put_uint(ids::TIMESTAMP, timecode_ms.max(0) as u64)?;
        self.cluster_positions.push(abs_pos);
        self.current_cluster = Some(ClusterState {
            abs_pos,
            token,
            timecode_ms,
            first_packet_hashed: false,
        });
        Ok(())
    }

    fn close_current_cluster(&mut self) -> crate::Result<()> {
        if let Some(cluster) = self.current_cluster.take() {
            self.writer.close_master(cluster.token)?;
        }
        Ok(())
    }

    fn write_block(&mut self, packet: &Packet, relative_ms: i16) -> crate::Result<()> {
        let track_vint = {
            let width = vint_size_bytes(packet.track_number);
            let encoded = encode_vint_fixed(packet.track_number, width)?;
            encoded[8 - width..].to_vec()
        };

        // flags' = 0x80 for a video keyframe, else 0 — this muxer's `PacketFlags`
        // carries nothing beyond the keyframe bit, so "raw flags, high bit
        // cleared for subtitles" collapses to the same zero byte subtitles and
        // non-keyframe audio/video packets already get.
        let flags = if packet.track_type == TrackType::Video && packet.flags.keyframe {
            0x80
        } else {
            0x00
        };

        let mut block_body = Vec::with_capacity(track_vint.len() + 3 + packet.data.len());
        block_body.extend_from_slice(&track_vint);
        block_body.extend_from_slice(&relative_ms.to_be_bytes());
        block_body.push(flags);
        block_body.extend_from_slice(&packet.data);

        match packet.track_type {
            TrackType::Subtitle => {
                let group = self.writer.open_master(ids::BLOCK_GROUP)?;
                self.writer.put_binary(ids::BLOCK, &block_body)?;
                let duration_ms = packet.duration_ms.unwrap_or(0).max(0) as u64;
                self.writer.put_uint(ids::BLOCK_DURATION, duration_ms)?;
                self.writer.close_master(group)
            }
            TrackType::Video | TrackType::Audio => self.writer.put_binary(ids::SIMPLE_BLOCK, &block_body),
        }
    }

    /// Close the final cluster, write `Cues` and the appended cluster
    /// seek-head, back-patch the main seek-head and `Info`'s `Duration`/
    /// `SegmentUID` placeholders, and return the underlying sink.
    pub fn finish(mut self) -> crate::Result<S> {
        self.phase = Phase::Trailer;
        self.close_current_cluster()?;

        let cues_pos = self.cues.finalize(&mut self.writer)?;

        let cluster_seekhead = SeekHeadBuilder::appended(self.segment_payload_start);
        let mut cluster_seekhead = cluster_seekhead;
        for &cluster_pos in &self.cluster_positions {
            cluster_seekhead.add_entry(ids::CLUSTER, cluster_pos)?;
        }
        let cluster_seekhead_pos = cluster_seekhead.finalize(&mut self.writer)?;

        self.main_seekhead.add_entry(ids::INFO, self.info_pos)?;
        self.main_seekhead.add_entry(ids::TRACKS, self.tracks_pos)?;
        self.main_seekhead.add_entry(ids::CUES, cues_pos)?;
        self.main_seekhead.add_entry(ids::SEEK_HEAD, cluster_seekhead_pos)?;
        self.main_seekhead.finalize(&mut self.writer)?;

        self.writer
            .patch_float(self.duration_value_pos, self.latest_duration_ticks as f64)?;

        if let Some(md5) = self.md5.take() {
            let digest = md5.finalize();
            if let Some(value_pos) = self.segment_uid_value_pos {
                self.writer.patch_binary(value_pos, &digest)?;
            }
        }

        Ok(self.writer.into_inner())
    }
}

fn write_ebml_header<S: Sink>(writer: &mut EbmlWriter<S>, config: &MuxerConfig) -> crate::Result<()> {
    let header = writer.open_master(ids::EBML)?;
    writer.put_uint(ids::EBML_VERSION, 1)?;
    writer.put_uint(ids::EBML_READ_VERSION, 1)?;
    writer.put_uint(ids::EBML_MAX_ID_LENGTH, 4)?;
    writer.put_uint(ids::EBML_MAX_SIZE_LENGTH, 8)?;
    writer.put_string(ids::DOC_TYPE, config.output_kind.doc_type())?;
    writer.put_uint(ids::DOC_TYPE_VERSION, 2)?;
    writer.put_uint(ids::DOC_TYPE_READ_VERSION, 2)?;
    writer.close_master(header)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::{CodecKind, VideoGeometry};
    use std::io::Cursor;

    fn video_stream(track_number: u64) -> StreamDescriptor {
        StreamDescriptor {
            track_number,
            track_type: TrackType::Video,
            codec_kind: CodecKind::Native {
                codec_id: "V_MPEG4/ISO/AVC",
            },
            extradata: vec![],
            language: None,
            video: Some(VideoGeometry {
                pixel_width: 640,
                pixel_height: 480,
                sample_aspect_ratio: (0, 0),
            }),
            audio: None,
        }
    }

    #[test]
    fn test_single_keyframe_round_trip_produces_nonempty_output() {
        let sink = Cursor::new(Vec::new());
        let mut muxer = Muxer::new(sink, MuxerConfig::default()).unwrap();
        muxer.write_header(&[video_stream(1)]).unwrap();
        muxer
            .write_packet(Packet {
                track_number: 1,
                track_type: TrackType::Video,
                pts_ms: 0,
                duration_ms: None,
                flags: PacketFlags { keyframe: true },
                data: vec![0xAA; 16],
            })
            .unwrap();
        let sink = muxer.finish().unwrap();
        assert!(!sink.into_inner().is_empty());
    }

    #[test]
    fn test_cluster_rolls_over_past_duration_limit() {
        let sink = Cursor::new(Vec::new());
        let mut config = MuxerConfig::default();
        config.cluster_max_duration_ms = 5000;
        let mut muxer = Muxer::new(sink, config).unwrap();
        muxer.write_header(&[video_stream(1)]).unwrap();

        muxer
            .write_packet(Packet {
                track_number: 1,
                track_type: TrackType::Video,
                pts_ms: 0,
                duration_ms: None,
                flags: PacketFlags { keyframe: true },
                data: vec![1],
            })
            .unwrap();
        muxer
            .write_packet(Packet {
                track_number: 1,
                track_type: TrackType::Video,
                pts_ms: 6000,
                duration_ms: None,
                flags: PacketFlags { keyframe: true },
                data: vec![2],
            })
            .unwrap();

        assert_eq!(muxer.cluster_positions.len(), 2);
        muxer.finish().unwrap();
    }

    #[test]
    fn test_cluster_rolls_over_on_pts_exactly_at_threshold() {
        // Spec's own worked example: 100 pkt/s streams with the default
        // 5000ms threshold put the boundary packet (pts=5000) in the
        // *second* cluster, whose ClusterTimecode is therefore 5000 — not
        // one packet later at pts=5010.
        let sink = Cursor::new(Vec::new());
        let mut muxer = Muxer::new(sink, MuxerConfig::default()).unwrap();
        muxer.write_header(&[video_stream(1)]).unwrap();

        muxer
            .write_packet(Packet {
                track_number: 1,
                track_type: TrackType::Video,
                pts_ms: 0,
                duration_ms: None,
                flags: PacketFlags { keyframe: true },
                data: vec![1],
            })
            .unwrap();
        muxer
            .write_packet(Packet {
                track_number: 1,
                track_type: TrackType::Video,
                pts_ms: 5000,
                duration_ms: None,
                flags: PacketFlags { keyframe: true },
                data: vec![2],
            })
            .unwrap();

        assert_eq!(muxer.cluster_positions.len(), 2);
        assert_eq!(muxer.current_cluster.as_ref().unwrap().timecode_ms, 5000);
    }

    #[test]
    fn test_bit_exact_mode_skips_segment_uid_and_apps() {
        let sink = Cursor::new(Vec::new());
        let mut config = MuxerConfig::default();
        config.bit_exact = true;
        let mut muxer = Muxer::new(sink, config).unwrap();
        assert!(muxer.md5.is_none());
        muxer.write_header(&[video_stream(1)]).unwrap();
        assert!(muxer.segment_uid_value_pos.is_none());
    }

    #[test]
    fn test_subtitle_packet_wraps_in_block_group_with_duration() {
        let sink = Cursor::new(Vec::new());
        let mut muxer = Muxer::new(sink, MuxerConfig::default()).unwrap();
        let subtitle_stream = StreamDescriptor {
            track_number: 1,
            track_type: TrackType::Subtitle,
            codec_kind: CodecKind::Native { codec_id: "S_TEXT/UTF8" },
            extradata: vec![],
            language: Some("eng".to_string()),
            video: None,
            audio: None,
        };
        muxer.write_header(&[subtitle_stream]).unwrap();
        muxer
            .write_packet(Packet {
                track_number: 1,
                track_type: TrackType::Subtitle,
                pts_ms: 0,
                duration_ms: Some(2000),
                flags: PacketFlags::default(),
                data: b"hello".to_vec(),
            })
            .unwrap();
        let sink = muxer.finish().unwrap();
        let buf = sink.into_inner();
        // BlockGroup (0xA0) and BlockDuration (0x9B) must both appear; a bare
        // SimpleBlock (0xA3) must not.
        assert!(buf.contains(&0xA0));
        assert!(buf.windows(2).any(|w| w == [0x9B, 0x82])); // BlockDuration, 2-byte uint (2000)
        assert!(!buf.contains(&0xA3));
    }

    #[test]
    fn test_too_many_tracks_rejected() {
        let sink = Cursor::new(Vec::new());
        let mut muxer = Muxer::new(sink, MuxerConfig::default()).unwrap();
        let streams: Vec<StreamDescriptor> = (1..=127).map(video_stream).collect();
        assert!(matches!(
            muxer.write_header(&streams),
            Err(Error::TooManyTracks(127))
        ));
    }

    #[test]
    fn test_pts_out_of_cluster_range_is_rejected() {
        let sink = Cursor::new(Vec::new());
        let mut config = MuxerConfig::default();
        config.cluster_max_duration_ms = i64::MAX;
        let mut muxer = Muxer::new(sink, config).unwrap();
        muxer.write_header(&[video_stream(1)]).unwrap();
        muxer
            .write_packet(Packet {
                track_number: 1,
                track_type: TrackType::Video,
                pts_ms: 0,
                duration_ms: None,
                flags: PacketFlags { keyframe: true },
                data: vec![1],
            })
            .unwrap();
        let err = muxer
            .write_packet(Packet {
                track_number: 1,
                track_type: TrackType::Video,
                pts_ms: 100_000,
                duration_ms: None,
                flags: PacketFlags { keyframe: false },
                data: vec![2],
            })
            .unwrap_err();
        assert!(matches!(err, Error::PtsOutOfClusterRange { .. }));
    }
}
