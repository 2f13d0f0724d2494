#[cfg(feature = "chime")]
use rodio::Source;
use std::f32::consts::PI;
use std::time::Duration;

pub const TONE_FREQUENCY_HZ: f32 = 800.0;
pub const TONE_DURATION: Duration = Duration::from_millis(300);
pub const START_GAIN: f32 = 0.3;
pub const END_GAIN: f32 = 0.01;

/// Short mono sine blip confirming a new code.
/// Gain decays exponentially from `START_GAIN` to `END_GAIN` over the tone.
pub struct ConfirmationTone {
    frequency: f32,
    sample_rate: u32,
    total_samples: usize,
    num_sample: usize,
}

impl ConfirmationTone {
    pub fn new() -> Self {
        Self::with_sample_rate(44100)
    }

    pub fn with_sample_rate(sample_rate: u32) -> Self {
        let total_samples = (sample_rate as f32 * TONE_DURATION.as_secs_f32()).round() as usize;
        Self {
            frequency: TONE_FREQUENCY_HZ,
            sample_rate,
            total_samples,
            num_sample: 0,
        }
    }

    pub fn len_samples(&self) -> usize {
        self.total_samples
    }

    fn gain_at(&self, t: f32) -> f32 {
        let progress = (t / TONE_DURATION.as_secs_f32()).clamp(0.0, 1.0);
        START_GAIN * (END_GAIN / START_GAIN).powf(progress)
    }
}

impl Default for ConfirmationTone {
    fn default() -> Self {
        Self::new()
    }
}

impl Iterator for ConfirmationTone {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.num_sample >= self.total_samples {
            return None;
        }

        let t = self.num_sample as f32 / self.sample_rate as f32;
        self.num_sample += 1;

        Some((2.0 * PI * self.frequency * t).sin() * self.gain_at(t))
    }
}

#[cfg(feature = "chime")]
impl Source for ConfirmationTone {
    fn current_frame_len(&self) -> Option<usize> {
        Some(self.total_samples - self.num_sample)
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(TONE_DURATION)
    }
}
