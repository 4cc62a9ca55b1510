//! Audio frames and device capability traits.

use async_trait::async_trait;

use crate::error::VoiceError;

/// A fixed-duration chunk of PCM samples with a monotonic sequence number.
///
/// Frames are never mutated after creation; both the capture and playback
/// paths share this type.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    samples: Vec<i16>,
    sample_rate: u32,
    seq: u64,
}

impl AudioFrame {
    pub fn new(samples: Vec<i16>, sample_rate: u32, seq: u64) -> Self {
        Self {
            samples,
            sample_rate,
            seq,
        }
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Frame duration derived from sample count and rate.
    pub fn duration(&self) -> std::time::Duration {
        if self.sample_rate == 0 {
            return std::time::Duration::ZERO;
        }
        std::time::Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }

    /// Normalized RMS energy in `[0.0, 1.0]`, used for voice-activity
    /// detection against [`SessionConfig::vad_energy_threshold`].
    ///
    /// [`SessionConfig::vad_energy_threshold`]: crate::config::SessionConfig
    pub fn rms_energy(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sum_squares: f64 = self
            .samples
            .iter()
            .map(|s| {
                let normalized = *s as f64 / i16::MAX as f64;
                normalized * normalized
            })
            .sum();
        (sum_squares / self.samples.len() as f64).sqrt() as f32
    }
}

/// Capture side of the audio device. The orchestrator owns the handle
/// exclusively and pumps frames from it into its control loop.
#[async_trait]
pub trait AudioCapture: Send {
    /// Next captured frame. `None` when the device stream ends.
    async fn next_frame(&mut self) -> Result<Option<AudioFrame>, VoiceError>;
}

/// Playback side of the audio device.
#[async_trait]
pub trait AudioPlayback: Send + Sync {
    /// Queue a frame for playback.
    async fn play(&self, frame: AudioFrame) -> Result<(), VoiceError>;

    /// Stop immediately, dropping any buffered audio. Must be acknowledged
    /// synchronously; barge-in depends on it.
    async fn stop(&self) -> Result<(), VoiceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rms_energy_of_silence_is_zero() {
        let frame = AudioFrame::new(vec![0; 320], 16_000, 0);
        assert!(frame.rms_energy() < 1e-6);
    }

    #[test]
    fn rms_energy_scales_with_amplitude() {
        let quiet = AudioFrame::new(vec![100; 320], 16_000, 0);
        let loud = AudioFrame::new(vec![8_000; 320], 16_000, 1);
        assert!(loud.rms_energy() > quiet.rms_energy());
        assert!(loud.rms_energy() > 0.2);
    }

    #[test]
    fn empty_frame_has_zero_energy_and_duration() {
        let frame = AudioFrame::new(Vec::new(), 16_000, 0);
        assert_eq!(frame.rms_energy(), 0.0);
        assert_eq!(frame.duration(), std::time::Duration::ZERO);
    }

    #[test]
    fn duration_matches_sample_count() {
        // 320 samples at 16kHz is a 20ms frame.
        let frame = AudioFrame::new(vec![0; 320], 16_000, 0);
        assert_eq!(frame.duration(), std::time::Duration::from_millis(20));
    }
}
