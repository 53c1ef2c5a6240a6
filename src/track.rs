//! Per-stream `TrackEntry` construction (Component E).
//!
//! Track numbers and types are assigned at header time and never revisited;
//! the packet phase only ever refers to a stream by the `track_number`
//! handed back here.

use crate::ebml::{EbmlWriter, Sink};
use crate::error::Error;
use crate::ids;

/// The three stream kinds this muxer accepts. Anything else is rejected at
/// header time rather than silently emitted as a type-less `TrackEntry`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackType {
    /// `TrackType = 1`.
    Video,
    /// `TrackType = 2`.
    Audio,
    /// `TrackType = 17`.
    Subtitle,
}

impl TrackType {
    fn matroska_value(self) -> u64 {
        match self {
            TrackType::Video => 1,
            TrackType::Audio => 2,
            TrackType::Subtitle => 17,
        }
    }
}

/// How this stream's `CodecPrivate` should be shaped.
#[derive(Debug, Clone)]
pub enum CodecKind {
    /// Native codec, extradata (if any) carried verbatim as `CodecPrivate`.
    Native { codec_id: &'static str },
    /// FLAC: extradata must be at least a 34-byte streaminfo block.
    Flac,
    /// Vorbis/Theora: extradata is a concatenated 3-packet header blob, split
    /// and Xiph-relaced into `CodecPrivate`.
    Xiph {
        codec_id: &'static str,
        first_packet_len: usize,
    },
    /// AAC: `CodecPrivate` is the raw `AudioSpecificConfig`; `SamplingFrequency`
    /// and `OutputSamplingFrequency` are separately sniffed from it.
    Aac,
    /// Video with no native Matroska codec id: shaped as `V_MS/VFW/FOURCC`.
    NonNativeVideo {
        codec_tag: Option<u32>,
        fourcc: Option<[u8; 4]>,
    },
    /// Audio with no native Matroska codec id: shaped as `A_MS/ACM`.
    NonNativeAudio { codec_tag: Option<u32> },
}

/// Video-only geometry. `DisplayWidth`/`DisplayHeight` are emitted only when
/// `sample_aspect_ratio`'s numerator is non-zero, and then carry the
/// numerator/denominator verbatim rather than a resolved display resolution —
/// a legacy convention this crate preserves for bit-compatibility with
/// existing output rather than "fixing" into `AspectRatioType` math.
#[derive(Debug, Clone, Copy)]
pub struct VideoGeometry {
    /// `PixelWidth`.
    pub pixel_width: u64,
    /// `PixelHeight`.
    pub pixel_height: u64,
    /// Sample aspect ratio `(num, den)`. `DisplayWidth`/`DisplayHeight` are
    /// written from this pair verbatim when `num != 0`; omitted otherwise.
    pub sample_aspect_ratio: (u64, u64),
}

/// Audio-only parameters.
#[derive(Debug, Clone, Copy)]
pub struct AudioParams {
    /// `SamplingFrequency`, may be overridden by AAC sniffing.
    pub sampling_frequency: f64,
    /// `Channels`.
    pub channels: u64,
    /// `BitDepth`, omitted when `None`.
    pub bit_depth: Option<u64>,
}

/// Everything the header phase needs to build one `TrackEntry`.
pub struct StreamDescriptor {
    /// Assigned `TrackNumber`/`TrackUID`. Callers are responsible for
    /// uniqueness across the file.
    pub track_number: u64,
    /// Stream kind.
    pub track_type: TrackType,
    /// How to shape this stream's `CodecPrivate`.
    pub codec_kind: CodecKind,
    /// Extradata/header blob backing `codec_kind`'s shaping, if any.
    pub extradata: Vec<u8>,
    /// `Language`, ISO 639-2, defaults to `"und"` when absent.
    pub language: Option<String>,
    /// Present for video tracks.
    pub video: Option<VideoGeometry>,
    /// Present for audio tracks.
    pub audio: Option<AudioParams>,
}

/// Build and write one `TrackEntry` for `stream`. Returns `Err` if
/// `track_type` wasn't one of the three accepted kinds (defensive, since
/// `TrackType` is already a closed enum), or if `codec_kind` needs data that
/// isn't present in `extradata`.
pub fn write_track_entry<S: Sink>(
    writer: &mut EbmlWriter<S>,
    stream: &StreamDescriptor,
) -> crate::Result<()> {
    let entry = writer.open_master(ids::TRACK_ENTRY)?;

    writer.put_uint(ids::TRACK_NUMBER, stream.track_number)?;
    writer.put_uint(ids::TRACK_UID, stream.track_number)?;
    writer.put_uint(ids::TRACK_TYPE, stream.track_type.matroska_value())?;
    writer.put_uint(ids::FLAG_LACING, 0)?;
    writer.put_string(ids::LANGUAGE, stream.language.as_deref().unwrap_or("und"))?;

    let (codec_id, codec_private) = resolve_codec_private(stream)?;
    writer.put_string(ids::CODEC_ID, codec_id)?;
    if !codec_private.is_empty() {
        writer.put_binary(ids::CODEC_PRIVATE, &codec_private)?;
    }

    let mut sampling_frequency_override = None;
    let mut output_sampling_frequency = None;
    if matches!(stream.codec_kind, CodecKind::Aac) {
        let rates = crate::codec::aac_sample_rate_sniff(&stream.extradata);
        sampling_frequency_override = rates.sampling_frequency.map(|hz| hz as f64);
        output_sampling_frequency = rates.output_sampling_frequency.map(|hz| hz as f64);
    }

    match stream.track_type {
        TrackType::Video => {
            let geometry = stream.video.ok_or(Error::UnsupportedTrackType)?;
            let video = writer.open_master(ids::VIDEO)?;
            writer.put_uint(ids::PIXEL_WIDTH, geometry.pixel_width)?;
            writer.put_uint(ids::PIXEL_HEIGHT, geometry.pixel_height)?;
            let (sar_num, sar_den) = geometry.sample_aspect_ratio;
            if sar_num != 0 {
                writer.put_uint(ids::DISPLAY_WIDTH, sar_num)?;
                writer.put_uint(ids::DISPLAY_HEIGHT, sar_den)?;
            }
            writer.close_master(video)?;
        }
        TrackType::Audio => {
            let audio_params = stream.audio.ok_or(Error::UnsupportedTrackType)?;
            let audio = writer.open_master(ids::AUDIO)?;
            writer.put_float(
                ids::SAMPLING_FREQUENCY,
                sampling_frequency_override.unwrap_or(audio_params.sampling_frequency),
            )?;
            if let Some(output_hz) = output_sampling_frequency {
                writer.put_float(ids::OUTPUT_SAMPLING_FREQUENCY, output_hz)?;
            }
            writer.put_uint(ids::CHANNELS, audio_params.channels)?;
            if let Some(bit_depth) = audio_params.bit_depth {
                writer.put_uint(ids::BIT_DEPTH, bit_depth)?;
            }
            writer.close_master(audio)?;
        }
        TrackType::Subtitle => {}
    }

    writer.close_master(entry)
}

fn resolve_codec_private(stream: &StreamDescriptor) -> crate::Result<(&'static str, Vec<u8>)> {
    match &stream.codec_kind {
        CodecKind::Native { codec_id } => {
            Ok((codec_id, crate::codec::native_codec_private(&stream.extradata)))
        }
        CodecKind::Flac => Ok((
            "A_FLAC",
            crate::codec::flac_codec_private(&stream.extradata)?,
        )),
        CodecKind::Xiph {
            codec_id,
            first_packet_len,
        } => {
            let private = crate::codec::xiph_codec_private(
                &crate::codec::PrefixLengthSplitter,
                &stream.extradata,
                *first_packet_len,
            )?;
            Ok((codec_id, private))
        }
        CodecKind::Aac => Ok(("A_AAC", stream.extradata.clone())),
        CodecKind::NonNativeVideo { codec_tag, fourcc } => {
            let geometry = stream.video.ok_or(Error::UnsupportedTrackType)?;
            let private = crate::codec::non_native_video_codec_private(
                &crate::codec::EmptyTagTable,
                *codec_tag,
                *fourcc,
                geometry.pixel_width as i32,
                geometry.pixel_height as i32,
                24,
            );
            Ok(("V_MS/VFW/FOURCC", private))
        }
        CodecKind::NonNativeAudio { codec_tag } => {
            let audio_params = stream.audio.ok_or(Error::UnsupportedTrackType)?;
            let private = crate::codec::non_native_audio_codec_private(
                &crate::codec::EmptyTagTable,
                *codec_tag,
                audio_params.channels as u16,
                audio_params.sampling_frequency as u32,
                audio_params.bit_depth.unwrap_or(16) as u16,
                stream.extradata.clone(),
            )?;
            Ok(("A_MS/ACM", private))
        }
    }
}
