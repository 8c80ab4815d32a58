//! Audio side of the plugin.
//! Decode (codec) → envelope synthesis (pure, CPU-bound) → encode (codec).
//! `process_file` is blocking and is meant to run on `spawn_blocking`.

pub mod envelope;
pub mod wav;

use std::path::Path;
use std::time::Instant;

use rand::Rng;
use tracing::info;

use crate::config::VolumeEnvelopeConfig;

/// How samples were stored in the source file, so the encoder can write the same format back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleEncoding {
    Int { bits: u16 },
    Float,
}

/// Decoded clip: interleaved samples normalized to [-1.0, 1.0].
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    pub sample_rate: u32,
    pub channels: u16,
    pub encoding: SampleEncoding,
    pub samples: Vec<f32>,
}

impl AudioClip {
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        self.frames() as u64 * 1000 / self.sample_rate as u64
    }

    /// Same format, no samples.
    pub fn empty_like(&self) -> Self {
        Self {
            sample_rate: self.sample_rate,
            channels: self.channels,
            encoding: self.encoding,
            samples: Vec::with_capacity(self.samples.len()),
        }
    }
}

#[derive(Debug)]
pub enum AudioError {
    Io(std::io::Error),
    Wav(hound::Error),
    Unsupported(String),
    Empty,
}

impl std::fmt::Display for AudioError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AudioError::Io(e) => write!(f, "audio IO error: {e}"),
            AudioError::Wav(e) => write!(f, "wav codec error: {e}"),
            AudioError::Unsupported(msg) => write!(f, "unsupported audio: {msg}"),
            AudioError::Empty => write!(f, "audio clip has no samples"),
        }
    }
}

impl std::error::Error for AudioError {}

impl From<std::io::Error> for AudioError {
    fn from(e: std::io::Error) -> Self {
        AudioError::Io(e)
    }
}

impl From<hound::Error> for AudioError {
    fn from(e: hound::Error) -> Self {
        AudioError::Wav(e)
    }
}

/// Decode/encode collaborator. Output is written in the same container as the input.
pub trait AudioCodec: Send + Sync {
    /// Lowercase file extensions (without dot) this codec reads and writes.
    fn extensions(&self) -> &[&str];

    fn decode(&self, path: &Path) -> Result<AudioClip, AudioError>;

    fn encode(&self, clip: &AudioClip, path: &Path) -> Result<(), AudioError>;

    fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| {
                let e = e.to_lowercase();
                self.extensions().iter().any(|x| *x == e)
            })
            .unwrap_or(false)
    }
}

/// Decode `input`, apply a random volume envelope, encode to `output`.
pub fn process_file<R: Rng + ?Sized>(
    codec: &dyn AudioCodec,
    input: &Path,
    output: &Path,
    config: &VolumeEnvelopeConfig,
    rng: &mut R,
) -> Result<(), AudioError> {
    info!(input = %input.display(), "envelope processing started");
    let start = Instant::now();

    let clip = codec.decode(input)?;
    if clip.samples.is_empty() {
        return Err(AudioError::Empty);
    }
    let chunks = envelope::chunk_count(&clip);
    let processed = envelope::synthesize(&clip, config, rng);

    info!(output = %output.display(), chunks, "envelope processing done, exporting");
    codec.encode(&processed, output)?;
    info!(
        duration_ms = clip.duration_ms(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "audio exported"
    );
    Ok(())
}
