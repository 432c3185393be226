//! Decoding track URLs into [`DecodedAsset`]s

use std::fs::File;
use std::path::{Path, PathBuf};

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

use super::DecodedAsset;
use crate::types::{StereoBuffer, StereoSample};

/// Errors producing a decoded asset
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("unsupported URL (only local files can be decoded): {0}")]
    UnsupportedUrl(String),

    #[error("failed to open {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("no audio track found")]
    NoAudioTrack,

    #[error("unknown sample rate")]
    UnknownSampleRate,

    #[error("file contains no audio")]
    Empty,
}

/// Turns a track URL into PCM
///
/// Called from the loader thread, never from the audio thread.
pub trait AssetDecoder: Send + 'static {
    fn decode(&self, url: &str) -> Result<DecodedAsset, DecodeError>;
}

/// Decoder for local audio files via symphonia
///
/// Accepts plain paths and `file://` URLs.
#[derive(Debug, Clone, Copy, Default)]
pub struct SymphoniaDecoder;

impl SymphoniaDecoder {
    pub fn new() -> Self {
        Self
    }
}

/// Local path for `url`, or `None` for remote schemes
fn local_path(url: &str) -> Option<&Path> {
    if let Some(path) = url.strip_prefix("file://") {
        return Some(Path::new(path));
    }
    if url.contains("://") {
        return None;
    }
    Some(Path::new(url))
}

/// Fold interleaved samples with `channels` channels into stereo frames
///
/// Mono is duplicated to both sides; extra channels beyond two are dropped.
fn to_stereo(samples: &[f32], channels: usize) -> Vec<StereoSample> {
    match channels {
        0 => Vec::new(),
        1 => samples.iter().map(|&s| StereoSample::mono(s)).collect(),
        n => samples
            .chunks_exact(n)
            .map(|frame| StereoSample::new(frame[0], frame[1]))
            .collect(),
    }
}

impl AssetDecoder for SymphoniaDecoder {
    fn decode(&self, url: &str) -> Result<DecodedAsset, DecodeError> {
        let path = local_path(url).ok_or_else(|| DecodeError::UnsupportedUrl(url.to_string()))?;

        let file = File::open(path).map_err(|e| DecodeError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| DecodeError::UnsupportedFormat(e.to_string()))?;
        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(DecodeError::NoAudioTrack)?;
        let track_id = track.id;
        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or(DecodeError::UnknownSampleRate)?;
        let n_frames = track.codec_params.n_frames;
        let mut channels = track.codec_params.channels.map(|c| c.count());

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| DecodeError::UnsupportedFormat(e.to_string()))?;

        let mut interleaved: Vec<f32> = Vec::new();
        let mut sample_buf: Option<SampleBuffer<f32>> = None;

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    break;
                }
                Err(e) => {
                    log::warn!("Error reading packet from {:?}: {}", path, e);
                    break;
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(e) => {
                    log::warn!("Error decoding packet from {:?}: {}", path, e);
                    continue;
                }
            };

            if sample_buf.is_none() {
                let spec = *decoded.spec();
                channels.get_or_insert(spec.channels.count());
                sample_buf = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
            }

            if let Some(buf) = sample_buf.as_mut() {
                buf.copy_interleaved_ref(decoded);
                interleaved.extend_from_slice(buf.samples());
            }
        }

        let frames = to_stereo(&interleaved, channels.unwrap_or(2));
        if frames.is_empty() {
            return Err(DecodeError::Empty);
        }

        log::info!(
            "Decoded {:?}: {} frames at {} Hz",
            path,
            frames.len(),
            sample_rate
        );

        let reported = n_frames.map(|n| n as f64 / sample_rate as f64);
        Ok(DecodedAsset::new(StereoBuffer::from_vec(frames), sample_rate).with_reported_duration(reported))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &Path, channels: u16, sample_rate: u32, frames: usize) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for i in 0..frames {
            for ch in 0..channels {
                let value = if ch == 0 { 8192 } else { -8192 };
                writer.write_sample(if i % 2 == 0 { value } else { 0i16 }).unwrap();
            }
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_local_path_handling() {
        assert_eq!(local_path("file:///tmp/a.wav"), Some(Path::new("/tmp/a.wav")));
        assert_eq!(local_path("/tmp/a.wav"), Some(Path::new("/tmp/a.wav")));
        assert_eq!(local_path("https://example.com/a.mp3"), None);
    }

    #[test]
    fn test_to_stereo_layouts() {
        let mono = to_stereo(&[0.1, 0.2], 1);
        assert_eq!(mono, vec![StereoSample::mono(0.1), StereoSample::mono(0.2)]);

        let surround = to_stereo(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 3);
        assert_eq!(
            surround,
            vec![StereoSample::new(1.0, 2.0), StereoSample::new(4.0, 5.0)]
        );
    }

    #[test]
    fn test_decode_mono_wav_duplicates_channel() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mono.wav");
        write_wav(&path, 1, 44100, 44100);

        let url = format!("file://{}", path.display());
        let asset = SymphoniaDecoder::new().decode(&url).unwrap();

        assert_eq!(asset.sample_rate(), 44100);
        assert_eq!(asset.len_frames(), 44100);
        let first = asset.frames()[0];
        assert!(first.left > 0.2 && first.left == first.right);
        let reported = asset.reported_duration().unwrap();
        assert!((reported - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_decode_stereo_wav_keeps_channels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        write_wav(&path, 2, 48000, 4800);

        let asset = SymphoniaDecoder::new()
            .decode(path.to_str().unwrap())
            .unwrap();
        assert_eq!(asset.len_frames(), 4800);
        let first = asset.frames()[0];
        assert!(first.left > 0.2);
        assert!(first.right < -0.2);
    }

    #[test]
    fn test_decode_errors() {
        let decoder = SymphoniaDecoder::new();
        assert!(matches!(
            decoder.decode("http://example.com/a.wav"),
            Err(DecodeError::UnsupportedUrl(_))
        ));
        assert!(matches!(
            decoder.decode("/nonexistent/track.wav"),
            Err(DecodeError::Io { .. })
        ));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.wav");
        std::fs::write(&path, b"not audio at all").unwrap();
        assert!(matches!(
            decoder.decode(path.to_str().unwrap()),
            Err(DecodeError::UnsupportedFormat(_))
        ));
    }
}
