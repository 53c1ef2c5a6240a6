//! Per-codec shaping of `CodecPrivate` data (Component D).
//!
//! The track writer ([`crate::track`]) dispatches here once per stream to
//! decide the track's `CodecID` and build its `CodecPrivate` payload. The
//! Xiph header splitter, BMP tag table, and WAV tag table are external
//! collaborators per the muxer's own contract (their job is decoding
//! container-specific codec identity into a FourCC/`wFormatTag`, or carving
//! up a concatenated Vorbis/Theora header blob) — they are modeled here as
//! traits with a minimal default implementation, not hard dependencies.

use crate::error::Error;
use crate::lacer::xiph_lace;

/// The fixed MPEG-4 sampling-frequency table addressed by AAC's 4-bit
/// `sampling_frequency_index`. Index 12 (7350 Hz) completes the 13-entry
/// table; indices 13-15 are reserved/escape and rejected by callers.
pub const AAC_SAMPLE_RATES: [u32; 13] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];

/// Result of sniffing an AAC `AudioSpecificConfig`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AacSampleRates {
    /// The core sampling-frequency-index lookup, if the index was in range.
    pub sampling_frequency: Option<u32>,
    /// The SBR extension sampling-frequency-index lookup, present only when
    /// `extradata` is exactly 5 bytes (SBR signaling).
    pub output_sampling_frequency: Option<u32>,
}

/// Decode the 4-bit sample-rate index out of an AAC `AudioSpecificConfig`,
/// and, if `extradata` is exactly 5 bytes (SBR signaling), a second index out
/// of the SBR extension for `OutputSamplingFrequency`.
pub fn aac_sample_rate_sniff(extradata: &[u8]) -> AacSampleRates {
    let mut out = AacSampleRates::default();
    if extradata.len() >= 2 {
        let sri = ((extradata[0] << 1) & 0xE) | (extradata[1] >> 7);
        if (sri as usize) <= 12 {
            out.sampling_frequency = Some(AAC_SAMPLE_RATES[sri as usize]);
        }
    }
    if extradata.len() == 5 {
        let sri = (extradata[4] >> 3) & 0xF;
        if (sri as usize) <= 12 {
            out.output_sampling_frequency = Some(AAC_SAMPLE_RATES[sri as usize]);
        }
    }
    out
}

/// Splits a concatenated Vorbis/Theora header blob into its three packets.
///
/// An external collaborator in the original design; modeled here as a trait
/// so callers can supply a demuxer-specific splitter while a usable default
/// ships for the common case.
pub trait XiphHeaderSplitter {
    /// Split `blob` into three header spans given the byte length of the
    /// first header packet (30 for Vorbis identification headers, 42 for
    /// Theora).
    fn split<'a>(&self, blob: &'a [u8], first_packet_len: usize) -> crate::Result<[&'a [u8]; 3]>;
}

/// Splits a blob laid out as `header0` followed by a two-frame Xiph lace of
/// `header1`/`header2` — the shape most containers already use to carry
/// Vorbis/Theora extradata.
pub struct PrefixLengthSplitter;

impl XiphHeaderSplitter for PrefixLengthSplitter {
    fn split<'a>(&self, blob: &'a [u8], first_packet_len: usize) -> crate::Result<[&'a [u8]; 3]> {
        if blob.len() < first_packet_len {
            return Err(Error::XiphHeaderInvalid);
        }
        let (header0, rest) = blob.split_at(first_packet_len);

        let mut pos = 0;
        let count = *rest.get(pos).ok_or(Error::XiphHeaderInvalid)? as usize + 1;
        if count != 2 {
            return Err(Error::XiphHeaderInvalid);
        }
        pos += 1;

        let mut header1_len = 0usize;
        loop {
            let b = *rest.get(pos).ok_or(Error::XiphHeaderInvalid)?;
            pos += 1;
            header1_len += b as usize;
            if b != 0xFF {
                break;
            }
        }

        let data = rest.get(pos..).ok_or(Error::XiphHeaderInvalid)?;
        if data.len() < header1_len {
            return Err(Error::XiphHeaderInvalid);
        }
        let (header1, header2) = data.split_at(header1_len);
        Ok([header0, header1, header2])
    }
}

/// Build the `CodecPrivate` payload for a Xiph-headered codec (Vorbis,
/// Theora): `0x02`, Xiph-coded lengths of headers 0 and 1, then the raw
/// bytes of all three headers concatenated.
pub fn xiph_codec_private(
    splitter: &impl XiphHeaderSplitter,
    blob: &[u8],
    first_packet_len: usize,
) -> crate::Result<Vec<u8>> {
    let headers = splitter.split(blob, first_packet_len)?;
    Ok(xiph_lace(&headers))
}

/// Build the `CodecPrivate` payload for native FLAC: the extradata verbatim,
/// provided it is at least a 34-byte streaminfo block.
pub fn flac_codec_private(extradata: &[u8]) -> crate::Result<Vec<u8>> {
    if extradata.len() < 34 {
        return Err(Error::FlacStreaminfoTooShort(extradata.len()));
    }
    if extradata.len() == 34 {
        log::debug!("FLAC streaminfo with no comment packet, using streaminfo only");
    }
    Ok(extradata.to_vec())
}

/// `CodecPrivate` for any other native codec carrying extradata verbatim.
pub fn native_codec_private(extradata: &[u8]) -> Vec<u8> {
    extradata.to_vec()
}

/// Looks up a video FourCC for a codec tag, for the non-native video fallback.
pub trait BmpTagTable {
    /// Returns the four-character-code bytes registered for `codec_tag`.
    fn fourcc_for(&self, codec_tag: u32) -> Option<[u8; 4]>;
}

/// Looks up a `wFormatTag` for a codec tag, for the non-native audio fallback.
pub trait WavTagTable {
    /// Returns the `wFormatTag` value registered for `codec_tag`.
    fn format_tag_for(&self, codec_tag: u32) -> Option<u16>;
}

/// A tag table with no entries; used as a harmless default when the caller
/// has no real BMP/WAV tag table to inject.
pub struct EmptyTagTable;

impl BmpTagTable for EmptyTagTable {
    fn fourcc_for(&self, _codec_tag: u32) -> Option<[u8; 4]> {
        None
    }
}

impl WavTagTable for EmptyTagTable {
    fn format_tag_for(&self, _codec_tag: u32) -> Option<u16> {
        None
    }
}

/// A minimal little-endian BITMAPINFOHEADER, as required by `V_MS/VFW/FOURCC`.
pub struct BitmapInfoHeader {
    /// Pixel width.
    pub width: i32,
    /// Pixel height.
    pub height: i32,
    /// Bits per pixel.
    pub bit_count: u16,
    /// Four-character codec identifier.
    pub compression: [u8; 4],
}

impl BitmapInfoHeader {
    /// Serialize to the standard 40-byte little-endian layout.
    pub fn to_bytes(&self) -> [u8; 40] {
        let mut out = [0u8; 40];
        out[0..4].copy_from_slice(&40u32.to_le_bytes()); // biSize
        out[4..8].copy_from_slice(&self.width.to_le_bytes());
        out[8..12].copy_from_slice(&self.height.to_le_bytes());
        out[12..14].copy_from_slice(&1u16.to_le_bytes()); // biPlanes
        out[14..16].copy_from_slice(&self.bit_count.to_le_bytes());
        out[16..20].copy_from_slice(&self.compression);
        out
    }
}

/// A minimal little-endian WAVEFORMATEX, as required by `A_MS/ACM`.
pub struct WaveFormatEx {
    /// `wFormatTag`.
    pub format_tag: u16,
    /// Channel count.
    pub channels: u16,
    /// Sample rate in Hz.
    pub samples_per_sec: u32,
    /// Bits per sample.
    pub bits_per_sample: u16,
    /// Codec-specific extra bytes appended after the fixed 18-byte header.
    pub extra: Vec<u8>,
}

impl WaveFormatEx {
    /// Serialize to the standard little-endian layout, `18 + extra.len()` bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let block_align = ((self.channels as u32 * self.bits_per_sample as u32) / 8).max(1) as u16;
        let avg_bytes_per_sec = self.samples_per_sec * block_align as u32;
        let mut out = Vec::with_capacity(18 + self.extra.len());
        out.extend_from_slice(&self.format_tag.to_le_bytes());
        out.extend_from_slice(&self.channels.to_le_bytes());
        out.extend_from_slice(&self.samples_per_sec.to_le_bytes());
        out.extend_from_slice(&avg_bytes_per_sec.to_le_bytes());
        out.extend_from_slice(&block_align.to_le_bytes());
        out.extend_from_slice(&self.bits_per_sample.to_le_bytes());
        out.extend_from_slice(&(self.extra.len() as u16).to_le_bytes());
        out.extend_from_slice(&self.extra);
        out
    }
}

/// `CodecID = "V_MS/VFW/FOURCC"` and a BITMAPINFOHEADER `CodecPrivate`. If
/// the stream lacks a FourCC, one is looked up in `bmp_tags` by `codec_tag`;
/// a miss logs a warning and falls back to a zeroed compression field rather
/// than failing the header phase, since the spec leaves this path's failure
/// mode unspecified.
pub fn non_native_video_codec_private(
    bmp_tags: &dyn BmpTagTable,
    codec_tag: Option<u32>,
    fourcc: Option<[u8; 4]>,
    width: i32,
    height: i32,
    bit_count: u16,
) -> Vec<u8> {
    let compression = fourcc
        .or_else(|| codec_tag.and_then(|tag| bmp_tags.fourcc_for(tag)))
        .unwrap_or_else(|| {
            log::warn!("non-native video stream has no FourCC and no BMP tag match");
            [0; 4]
        });
    BitmapInfoHeader {
        width,
        height,
        bit_count,
        compression,
    }
    .to_bytes()
    .to_vec()
}

/// `CodecID = "A_MS/ACM"` and a WAVEFORMATEX `CodecPrivate`. Fails if no
/// `wav_tags` entry exists for `codec_tag`.
pub fn non_native_audio_codec_private(
    wav_tags: &dyn WavTagTable,
    codec_tag: Option<u32>,
    channels: u16,
    samples_per_sec: u32,
    bits_per_sample: u16,
    extra: Vec<u8>,
) -> crate::Result<Vec<u8>> {
    let format_tag = codec_tag
        .and_then(|tag| wav_tags.format_tag_for(tag))
        .ok_or_else(|| {
            log::error!("unsupported audio codec: no WAV tag for codec_tag={codec_tag:?}");
            Error::UnsupportedAudioCodec
        })?;
    Ok(WaveFormatEx {
        format_tag,
        channels,
        samples_per_sec,
        bits_per_sample,
        extra,
    }
    .to_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aac_sample_rate_sniff() {
        let extradata = [0x13u8, 0x88, 0x56, 0xE5, 0xA8];
        let rates = aac_sample_rate_sniff(&extradata);
        // sri = ((0x13 << 1) & 0xE) | (0x88 >> 7) = 6 | 1 = 7 -> 22050 Hz
        assert_eq!(rates.sampling_frequency, Some(22050));
        // sri' = (0xA8 >> 3) & 0xF = 5 -> 32000 Hz
        assert_eq!(rates.output_sampling_frequency, Some(32000));
    }

    #[test]
    fn test_aac_sample_rate_sniff_short_extradata_skips_output() {
        let extradata = [0x10u8, 0x08];
        let rates = aac_sample_rate_sniff(&extradata);
        assert!(rates.output_sampling_frequency.is_none());
    }

    #[test]
    fn test_aac_sample_rate_sniff_out_of_range_index_is_skipped() {
        // sri = ((0xFF << 1) & 0xE) | (0xFF >> 7) = 14 | 1 = 15, > 12
        let extradata = [0xFFu8, 0xFF];
        let rates = aac_sample_rate_sniff(&extradata);
        assert_eq!(rates.sampling_frequency, None);
    }

    #[test]
    fn test_xiph_codec_private_splits_and_relaces() {
        let header0 = vec![1u8; 30];
        let header1 = vec![2u8; 10];
        let header2 = vec![3u8; 20];
        // PrefixLengthSplitter expects: header0, then a 2-frame Xiph lace of
        // header1/header2 (count byte = 1, Xiph size of header1, then data).
        let blob = [
            header0.clone(),
            vec![0x01, 0x0A],
            header1.clone(),
            header2.clone(),
        ]
        .concat();

        let out = xiph_codec_private(&PrefixLengthSplitter, &blob, 30).unwrap();
        let expected = xiph_lace(&[&header0, &header1, &header2]);
        assert_eq!(out, expected);
        assert_eq!(out[0], 0x02);
    }

    #[test]
    fn test_xiph_codec_private_rejects_short_blob() {
        let blob = vec![0u8; 5];
        assert!(matches!(
            xiph_codec_private(&PrefixLengthSplitter, &blob, 30),
            Err(Error::XiphHeaderInvalid)
        ));
    }

    #[test]
    fn test_flac_requires_streaminfo_length() {
        let short = vec![0u8; 10];
        assert!(matches!(
            flac_codec_private(&short),
            Err(Error::FlacStreaminfoTooShort(10))
        ));
        let long = vec![0u8; 34];
        assert!(flac_codec_private(&long).is_ok());
    }

    #[test]
    fn test_non_native_audio_fails_without_wav_tag() {
        let result = non_native_audio_codec_private(&EmptyTagTable, Some(1), 2, 44100, 16, vec![]);
        assert!(matches!(result, Err(Error::UnsupportedAudioCodec)));
    }

    #[test]
    fn test_non_native_video_falls_back_to_zeroed_fourcc() {
        let out = non_native_video_codec_private(&EmptyTagTable, None, None, 640, 480, 24);
        assert_eq!(out.len(), 40);
        assert_eq!(&out[16..20], &[0, 0, 0, 0]);
    }
}
