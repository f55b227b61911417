//! Audio file loading and decoding

use kadence_analysis::{AnalysisError, AudioSignal, ANALYSIS_SAMPLE_RATE};
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::{MetadataOptions, StandardTagKey};
use symphonia::core::probe::Hint;
use thiserror::Error;

/// Errors that can occur during track loading
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("No audio track found in file")]
    NoAudioTrack,
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Resample error: {0}")]
    Resample(String),
    #[error("File contains no audio samples")]
    Empty,
}

impl From<LoadError> for AnalysisError {
    fn from(err: LoadError) -> Self {
        AnalysisError::DecodeFailure(err.to_string())
    }
}

/// Track metadata
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackMetadata {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub duration_secs: f64,
    /// Sample rate of the file before resampling
    pub sample_rate: u32,
    pub channels: u16,
}

/// A decoded track, downmixed to mono at the analysis sample rate
#[derive(Debug, Clone)]
pub struct LoadedTrack {
    pub signal: AudioSignal,
    pub metadata: TrackMetadata,
}

/// Audio file loader using Symphonia
#[derive(Debug, Clone)]
pub struct TrackLoader {
    target_sample_rate: u32,
}

impl Default for TrackLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackLoader {
    /// Loader resampling to the analysis rate (22.05 kHz)
    pub fn new() -> Self {
        Self::with_sample_rate(ANALYSIS_SAMPLE_RATE)
    }

    pub fn with_sample_rate(target_sample_rate: u32) -> Self {
        Self { target_sample_rate }
    }

    pub fn target_sample_rate(&self) -> u32 {
        self.target_sample_rate
    }

    /// Load, decode, downmix and resample an audio file
    pub fn load(&self, path: &Path) -> Result<LoadedTrack, LoadError> {
        let file = std::fs::File::open(path)?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| LoadError::Decode(e.to_string()))?;

        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(LoadError::NoAudioTrack)?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();
        let source_sample_rate = codec_params
            .sample_rate
            .ok_or_else(|| LoadError::Decode("unknown sample rate".into()))?;
        let channels = codec_params
            .channels
            .map(|c| c.count() as u16)
            .unwrap_or(2);

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| LoadError::Decode(e.to_string()))?;

        let mut metadata = extract_metadata(&mut format, path);
        metadata.sample_rate = source_sample_rate;
        metadata.channels = channels;

        let mut interleaved: Vec<f32> = Vec::new();
        let mut skipped_packets = 0usize;
        loop {
            let packet = match format.next_packet() {
                Ok(p) => p,
                Err(symphonia::core::errors::Error::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Stopping at unreadable packet");
                    break;
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(d) => d,
                Err(_) => {
                    skipped_packets += 1;
                    continue;
                }
            };

            let spec = *decoded.spec();
            let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
            sample_buf.copy_interleaved_ref(decoded);
            interleaved.extend_from_slice(sample_buf.samples());
        }

        if skipped_packets > 0 {
            tracing::warn!(
                path = %path.display(),
                skipped_packets,
                "Skipped undecodable packets"
            );
        }

        let mono = downmix(&interleaved, channels);
        if mono.is_empty() {
            return Err(LoadError::Empty);
        }
        metadata.duration_secs = mono.len() as f64 / source_sample_rate as f64;

        let mono = if source_sample_rate != self.target_sample_rate {
            resample(&mono, source_sample_rate, self.target_sample_rate)?
        } else {
            mono
        };

        tracing::debug!(
            path = %path.display(),
            source_rate = source_sample_rate,
            channels,
            duration = metadata.duration_secs,
            "Decoded track"
        );

        let signal = AudioSignal::new(mono, self.target_sample_rate)
            .map_err(|e| LoadError::Decode(e.to_string()))?;
        Ok(LoadedTrack { signal, metadata })
    }
}

/// Average interleaved channels into one
pub fn downmix(interleaved: &[f32], channels: u16) -> Vec<f32> {
    let channels = channels.max(1) as usize;
    if channels == 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Resample mono audio with a fixed-ratio FFT resampler
pub fn resample(samples: &[f32], source_rate: u32, target_rate: u32) -> Result<Vec<f32>, LoadError> {
    use rubato::{FftFixedInOut, Resampler};

    let mut resampler = FftFixedInOut::<f32>::new(
        source_rate as usize,
        target_rate as usize,
        1024,
        1,
    )
    .map_err(|e| LoadError::Resample(e.to_string()))?;

    let chunk_size = resampler.input_frames_next();
    let expected = samples.len() * target_rate as usize / source_rate as usize;
    let mut output: Vec<f32> = Vec::with_capacity(expected + chunk_size);

    let mut chunks = samples.chunks_exact(chunk_size);
    for chunk in &mut chunks {
        let resampled = resampler
            .process(&[chunk], None)
            .map_err(|e| LoadError::Resample(e.to_string()))?;
        if let Some(data) = resampled.into_iter().next() {
            output.extend(data);
        }
    }

    // Pad the remainder with zeros and keep only its share of the output
    let remainder = chunks.remainder();
    if !remainder.is_empty() {
        let mut padded = remainder.to_vec();
        padded.resize(chunk_size, 0.0);
        let resampled = resampler
            .process(&[padded], None)
            .map_err(|e| LoadError::Resample(e.to_string()))?;
        if let Some(data) = resampled.into_iter().next() {
            let frames = remainder.len() * target_rate as usize / source_rate as usize;
            output.extend(&data[..frames.min(data.len())]);
        }
    }

    Ok(output)
}

/// Title/artist/album from tags, falling back to the file name
fn extract_metadata(format: &mut Box<dyn FormatReader>, path: &Path) -> TrackMetadata {
    let mut metadata = TrackMetadata {
        title: path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("Unknown")
            .to_string(),
        artist: "Unknown".to_string(),
        album: "Unknown".to_string(),
        ..Default::default()
    };

    if let Some(meta) = format.metadata().current() {
        for tag in meta.tags() {
            match tag.std_key {
                Some(StandardTagKey::TrackTitle) => metadata.title = tag.value.to_string(),
                Some(StandardTagKey::Artist) => metadata.artist = tag.value.to_string(),
                Some(StandardTagKey::Album) => metadata.album = tag.value.to_string(),
                _ => {}
            }
        }
    }

    metadata
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::f32::consts::PI;
    use std::io::Write;
    use std::path::PathBuf;

    /// Write a 16-bit PCM WAV file with a sine on every channel
    pub(crate) fn write_wav(path: &Path, freq: f32, sample_rate: u32, channels: u16, secs: f32) {
        let frames = (sample_rate as f32 * secs) as u32;
        let data_len = frames * channels as u32 * 2;
        let mut bytes = Vec::with_capacity(44 + data_len as usize);
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
        bytes.extend_from_slice(b"WAVEfmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&channels.to_le_bytes());
        bytes.extend_from_slice(&sample_rate.to_le_bytes());
        bytes.extend_from_slice(&(sample_rate * channels as u32 * 2).to_le_bytes());
        bytes.extend_from_slice(&(channels * 2).to_le_bytes());
        bytes.extend_from_slice(&16u16.to_le_bytes());
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&data_len.to_le_bytes());
        for i in 0..frames {
            let value = 0.5 * (2.0 * PI * freq * i as f32 / sample_rate as f32).sin();
            let sample = (value * i16::MAX as f32) as i16;
            for _ in 0..channels {
                bytes.extend_from_slice(&sample.to_le_bytes());
            }
        }
        let mut file = std::fs::File::create(path).unwrap();
        file.write_all(&bytes).unwrap();
    }

    pub(crate) fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("kadence-{name}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_downmix() {
        assert_eq!(downmix(&[1.0, 0.0, 0.5, 0.5], 2), vec![0.5, 0.5]);
        assert_eq!(downmix(&[0.1, 0.2], 1), vec![0.1, 0.2]);
        // Trailing partial frame is dropped
        assert_eq!(downmix(&[1.0, 1.0, 1.0], 2), vec![1.0]);
    }

    #[test]
    fn test_resample_length() {
        let samples: Vec<f32> = (0..44100)
            .map(|i| (2.0 * PI * 440.0 * i as f32 / 44100.0).sin())
            .collect();
        let out = resample(&samples, 44100, 22050).unwrap();
        assert!((out.len() as i64 - 22050).abs() < 600, "{}", out.len());
    }

    #[test]
    fn test_load_wav() {
        let dir = temp_dir("loader");
        let path = dir.join("tone.wav");
        write_wav(&path, 440.0, 44100, 2, 1.0);

        let track = TrackLoader::new().load(&path).unwrap();
        assert_eq!(track.signal.sample_rate(), 22050);
        assert!((track.signal.len() as i64 - 22050).abs() < 600);
        assert_eq!(track.metadata.title, "tone");
        assert_eq!(track.metadata.channels, 2);
        assert_eq!(track.metadata.sample_rate, 44100);
        assert!((track.metadata.duration_secs - 1.0).abs() < 0.01);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_missing_file() {
        let err = TrackLoader::new()
            .load(Path::new("/nonexistent/kadence/track.mp3"))
            .unwrap_err();
        assert!(matches!(err, LoadError::Io(_)));
        let analysis_err: AnalysisError = err.into();
        assert!(matches!(analysis_err, AnalysisError::DecodeFailure(_)));
    }

    #[test]
    fn test_not_audio() {
        let dir = temp_dir("not-audio");
        let path = dir.join("notes.wav");
        std::fs::write(&path, b"this is not a wav file").unwrap();
        assert!(TrackLoader::new().load(&path).is_err());
        std::fs::remove_dir_all(&dir).ok();
    }
}
