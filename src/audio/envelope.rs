//! Randomized piecewise-linear volume envelope.
//!
//! The clip is walked in 50 ms chunks. Each chunk gets the volume of the current
//! linear ramp (start → target over a random duration); when a ramp finishes a new
//! target is drawn that differs from the previous one by at least 30 points.
//! Volume is a percentage (100 = original loudness) mapped to gain as
//! `(v - 100) * 0.6` dB, or -120 dB at or below zero.

use rand::Rng;

use super::AudioClip;
use crate::config::VolumeEnvelopeConfig;

pub const CHUNK_MS: u32 = 50;
pub const INITIAL_VOLUME: f64 = 100.0;
pub const MIN_TARGET_DELTA: f64 = 30.0;
/// Redraws allowed before falling back to the farthest bound.
pub const MAX_TARGET_DRAWS: usize = 64;
pub const SILENCE_GAIN_DB: f64 = -120.0;
const DB_PER_VOLUME_POINT: f64 = 0.6;

/// Gain (dB) for a volume percentage.
#[inline]
pub fn gain_db(current_volume: f64) -> f64 {
    if current_volume <= 0.0 {
        SILENCE_GAIN_DB
    } else {
        (current_volume - 100.0) * DB_PER_VOLUME_POINT
    }
}

#[inline]
pub fn db_to_linear(db: f64) -> f64 {
    10f64.powf(db / 20.0)
}

/// Draw a target at least `MIN_TARGET_DELTA` away from `start_volume`.
/// When the configured range cannot satisfy that within `MAX_TARGET_DRAWS`,
/// the bound farthest from `start_volume` is used.
pub fn draw_target<R: Rng + ?Sized>(
    start_volume: f64,
    config: &VolumeEnvelopeConfig,
    rng: &mut R,
) -> f64 {
    for _ in 0..MAX_TARGET_DRAWS {
        let candidate = rng.gen_range(config.min_volume..=config.max_volume) as f64;
        if (candidate - start_volume).abs() >= MIN_TARGET_DELTA {
            return candidate;
        }
    }
    let min = config.min_volume as f64;
    let max = config.max_volume as f64;
    if (start_volume - min).abs() >= (max - start_volume).abs() {
        min
    } else {
        max
    }
}

fn draw_duration<R: Rng + ?Sized>(config: &VolumeEnvelopeConfig, rng: &mut R) -> u32 {
    rng.gen_range(config.min_speed_ms..=config.max_speed_ms)
}

/// Transient ramp state for one synthesis call.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvelopeState {
    pub start_volume: f64,
    pub target_volume: f64,
    pub transition_duration_ms: u32,
    pub elapsed_in_transition_ms: u32,
}

impl EnvelopeState {
    /// First ramp starts at full loudness; its target is drawn without the delta rule.
    pub fn new<R: Rng + ?Sized>(config: &VolumeEnvelopeConfig, rng: &mut R) -> Self {
        let target_volume = rng.gen_range(config.min_volume..=config.max_volume) as f64;
        Self {
            start_volume: INITIAL_VOLUME,
            target_volume,
            transition_duration_ms: draw_duration(config, rng),
            elapsed_in_transition_ms: 0,
        }
    }

    /// Volume for the next chunk, then advance by one chunk.
    pub fn next_volume<R: Rng + ?Sized>(
        &mut self,
        config: &VolumeEnvelopeConfig,
        rng: &mut R,
    ) -> f64 {
        if self.elapsed_in_transition_ms >= self.transition_duration_ms {
            self.start_volume = self.target_volume;
            self.target_volume = draw_target(self.start_volume, config, rng);
            self.transition_duration_ms = draw_duration(config, rng);
            self.elapsed_in_transition_ms = 0;
        }

        let progress = if self.transition_duration_ms == 0 {
            1.0
        } else {
            self.elapsed_in_transition_ms as f64 / self.transition_duration_ms as f64
        };
        let volume = self.start_volume + (self.target_volume - self.start_volume) * progress;

        self.elapsed_in_transition_ms += CHUNK_MS;
        volume
    }
}

/// Frames in one chunk at `sample_rate`, never zero.
#[inline]
pub fn frames_per_chunk(sample_rate: u32) -> usize {
    ((sample_rate as u64 * CHUNK_MS as u64 / 1000) as usize).max(1)
}

/// Number of chunks `clip` is walked in (the last one may be short).
pub fn chunk_count(clip: &AudioClip) -> usize {
    clip.frames().div_ceil(frames_per_chunk(clip.sample_rate))
}

/// Apply a random envelope to `clip`. The output has the same format and length.
pub fn synthesize<R: Rng + ?Sized>(
    clip: &AudioClip,
    config: &VolumeEnvelopeConfig,
    rng: &mut R,
) -> AudioClip {
    let mut out = clip.empty_like();
    let channels = (clip.channels as usize).max(1);
    let chunk_len = frames_per_chunk(clip.sample_rate) * channels;

    let mut state = EnvelopeState::new(config, rng);
    for chunk in clip.samples.chunks(chunk_len) {
        let volume = state.next_volume(config, rng);
        let factor = db_to_linear(gain_db(volume)) as f32;
        out.samples.extend(chunk.iter().map(|s| s * factor));
    }
    out
}
