//! Xiph-style size lacing, used only inside `CodecPrivate` blobs for codecs
//! (Vorbis, Theora) that ship multiple header packets concatenated together.
//!
//! Block-level lacing (multiple frames per `SimpleBlock`) is out of scope for
//! this muxer; only the header-splitting use case survives here.
//
// The Xiph lacing uses the same coding of size as found in the Ogg container
// [@?RFC3533]. The lacing size is split into 255-valued bytes — for example,
// 500 is coded 255;245 or [0xFF 0xF5]. A frame with a size multiple of 255 is
// coded with a trailing 0 — for example, 765 is coded 255;255;255;0. The size
// of the last frame is deduced from the size remaining in the blob.

/// Xiph-lace `frames` into a single blob: one byte for `frames.len() - 1`,
/// then the Xiph-coded size of every frame but the last, then the raw bytes
/// of every frame concatenated.
pub fn xiph_lace(frames: &[&[u8]]) -> Vec<u8> {
    if frames.is_empty() {
        return vec![];
    }
    let num_frames = frames.len();
    let mut output = vec![(num_frames - 1) as u8];
    for frame in &frames[..num_frames - 1] {
        let mut size = frame.len();
        while size >= 0xFF {
            output.push(0xFF);
            size -= 0xFF;
        }
        output.push(size as u8);
    }
    for frame in frames {
        output.extend_from_slice(frame);
    }
    output
}
