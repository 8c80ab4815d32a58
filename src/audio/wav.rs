//! WAV codec backed by `hound`.

use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use super::{AudioClip, AudioCodec, AudioError, SampleEncoding};

pub struct WavCodec;

#[inline]
fn int_scale(bits: u16) -> f32 {
    (1u64 << (bits - 1)) as f32
}

impl AudioCodec for WavCodec {
    fn extensions(&self) -> &[&str] {
        &["wav"]
    }

    fn decode(&self, path: &Path) -> Result<AudioClip, AudioError> {
        let mut reader = WavReader::open(path)?;
        let spec = reader.spec();

        let (encoding, samples) = match spec.sample_format {
            SampleFormat::Float => {
                if spec.bits_per_sample != 32 {
                    return Err(AudioError::Unsupported(format!(
                        "{}-bit float wav",
                        spec.bits_per_sample
                    )));
                }
                let samples = reader.samples::<f32>().collect::<Result<Vec<_>, _>>()?;
                (SampleEncoding::Float, samples)
            }
            SampleFormat::Int => {
                let bits = spec.bits_per_sample;
                let scale = int_scale(bits);
                let samples = match bits {
                    8 => reader
                        .samples::<i8>()
                        .map(|s| s.map(|v| v as f32 / scale))
                        .collect::<Result<Vec<_>, _>>()?,
                    16 => reader
                        .samples::<i16>()
                        .map(|s| s.map(|v| v as f32 / scale))
                        .collect::<Result<Vec<_>, _>>()?,
                    24 | 32 => reader
                        .samples::<i32>()
                        .map(|s| s.map(|v| v as f32 / scale))
                        .collect::<Result<Vec<_>, _>>()?,
                    other => {
                        return Err(AudioError::Unsupported(format!("{other}-bit int wav")));
                    }
                };
                (SampleEncoding::Int { bits }, samples)
            }
        };

        Ok(AudioClip {
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            encoding,
            samples,
        })
    }

    fn encode(&self, clip: &AudioClip, path: &Path) -> Result<(), AudioError> {
        let (bits_per_sample, sample_format) = match clip.encoding {
            SampleEncoding::Float => (32, SampleFormat::Float),
            SampleEncoding::Int { bits } => (bits, SampleFormat::Int),
        };
        let spec = WavSpec {
            channels: clip.channels,
            sample_rate: clip.sample_rate,
            bits_per_sample,
            sample_format,
        };
        let mut writer = WavWriter::create(path, spec)?;

        match clip.encoding {
            SampleEncoding::Float => {
                for &s in &clip.samples {
                    writer.write_sample(s)?;
                }
            }
            SampleEncoding::Int { bits } => {
                let scale = int_scale(bits);
                let max = scale - 1.0;
                for &s in &clip.samples {
                    let v = (s * scale).round().clamp(-scale, max);
                    match bits {
                        8 => writer.write_sample(v as i8)?,
                        16 => writer.write_sample(v as i16)?,
                        _ => writer.write_sample(v as i32)?,
                    }
                }
            }
        }
        writer.finalize()?;
        Ok(())
    }
}
