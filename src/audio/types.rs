use serde::{Deserialize, Serialize};

use super::errors::EqualizerError;

/// A contiguous frequency range that gets one filter and one gain
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrequencyBand {
    pub low_hz: f64,
    pub high_hz: f64,
}

impl FrequencyBand {
    pub fn new(low_hz: f64, high_hz: f64) -> Self {
        Self { low_hz, high_hz }
    }

    /// Integer center used for slider labels and status messages
    pub fn center_hz(&self) -> u32 {
        ((self.low_hz + self.high_hz) / 2.0).floor().max(0.0) as u32
    }

    pub fn label(&self) -> String {
        format!("{} Hz", self.center_hz())
    }
}

impl From<(f64, f64)> for FrequencyBand {
    fn from((low_hz, high_hz): (f64, f64)) -> Self {
        Self::new(low_hz, high_hz)
    }
}

/// One gain (dB) per band, index-aligned with the filter bank
pub type GainVector = Vec<f32>;

/// Fixed-size chunk of interleaved audio, `frame_count * channel_count` samples
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBlock {
    samples: Vec<f32>,
    frame_count: usize,
    channel_count: u16,
}

impl AudioBlock {
    /// Wrap interleaved samples; the length must be a whole number of frames
    pub fn new(samples: Vec<f32>, channel_count: u16) -> Result<Self, EqualizerError> {
        if channel_count == 0 {
            return Err(EqualizerError::BlockShape(
                "channel count must be at least 1".to_string(),
            ));
        }
        if samples.len() % channel_count as usize != 0 {
            return Err(EqualizerError::BlockShape(format!(
                "{} samples do not divide into {} channels",
                samples.len(),
                channel_count
            )));
        }

        Ok(Self {
            frame_count: samples.len() / channel_count as usize,
            samples,
            channel_count,
        })
    }

    pub fn silent(frame_count: usize, channel_count: u16) -> Self {
        let channel_count = channel_count.max(1);
        Self {
            samples: vec![0.0; frame_count * channel_count as usize],
            frame_count,
            channel_count,
        }
    }

    /// Build a block sample by sample from `(frame, channel)`
    pub fn from_fn<F>(frame_count: usize, channel_count: u16, mut sample_at: F) -> Self
    where
        F: FnMut(usize, u16) -> f32,
    {
        let channel_count = channel_count.max(1);
        let mut samples = Vec::with_capacity(frame_count * channel_count as usize);
        for frame in 0..frame_count {
            for channel in 0..channel_count {
                samples.push(sample_at(frame, channel));
            }
        }
        Self {
            samples,
            frame_count,
            channel_count,
        }
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn samples_mut(&mut self) -> &mut [f32] {
        &mut self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    pub fn sample(&self, frame: usize, channel: u16) -> f32 {
        self.samples[frame * self.channel_count as usize + channel as usize]
    }

    /// Samples of a single channel along the time axis
    pub fn channel(&self, channel: u16) -> impl Iterator<Item = f32> + '_ {
        self.samples
            .iter()
            .skip(channel as usize)
            .step_by(self.channel_count as usize)
            .copied()
    }

    pub fn same_shape(&self, other: &AudioBlock) -> bool {
        self.frame_count == other.frame_count && self.channel_count == other.channel_count
    }

    /// True when every sample is exactly zero
    pub fn is_silent(&self) -> bool {
        self.samples.iter().all(|sample| *sample == 0.0)
    }

    pub fn peak(&self) -> f32 {
        super::effects::peak_level(&self.samples)
    }

    pub fn scale(&mut self, factor: f32) {
        for sample in self.samples.iter_mut() {
            *sample *= factor;
        }
    }

    /// Duration of the block at `sample_rate`
    pub fn duration(&self, sample_rate: u32) -> std::time::Duration {
        if sample_rate == 0 {
            return std::time::Duration::ZERO;
        }
        std::time::Duration::from_secs_f64(self.frame_count as f64 / sample_rate as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_rejects_partial_frames() {
        assert!(AudioBlock::new(vec![0.0; 5], 2).is_err());
        assert!(AudioBlock::new(vec![0.0; 4], 0).is_err());

        let block = AudioBlock::new(vec![0.0; 6], 2).unwrap();
        assert_eq!(block.frame_count(), 3);
        assert_eq!(block.channel_count(), 2);
    }

    #[test]
    fn test_channel_iterates_interleaved_samples() {
        let block = AudioBlock::new(vec![1.0, -1.0, 2.0, -2.0, 3.0, -3.0], 2).unwrap();
        assert_eq!(block.channel(0).collect::<Vec<_>>(), vec![1.0, 2.0, 3.0]);
        assert_eq!(block.channel(1).collect::<Vec<_>>(), vec![-1.0, -2.0, -3.0]);
        assert_eq!(block.sample(1, 1), -2.0);
    }

    #[test]
    fn test_silence_and_peak() {
        let mut block = AudioBlock::silent(16, 2);
        assert!(block.is_silent());
        assert_eq!(block.peak(), 0.0);

        block.samples_mut()[3] = -0.75;
        assert!(!block.is_silent());
        assert_eq!(block.peak(), 0.75);

        block.scale(2.0);
        assert_eq!(block.peak(), 1.5);
    }

    #[test]
    fn test_band_center_label() {
        let band = FrequencyBand::new(880.0, 1200.0);
        assert_eq!(band.center_hz(), 1040);
        assert_eq!(band.label(), "1040 Hz");
        assert_eq!(FrequencyBand::new(20.0, 76.0).center_hz(), 48);
    }
}
