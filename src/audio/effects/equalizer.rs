use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::info;

use super::filter_bank::FilterBank;
use super::peak_level;
use crate::audio::errors::EqualizerError;
use crate::audio::types::AudioBlock;

/// Fan-out equalizer: one band task per filter on a persistent worker pool,
/// joined, summed and peak-normalized.
pub struct BandEqualizer {
    filters: Arc<FilterBank>,
    pool: ThreadPool,
}

impl BandEqualizer {
    pub fn new(filters: Arc<FilterBank>, workers: usize) -> Result<Self, EqualizerError> {
        let workers = workers.max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|index| format!("live-eq-dsp-{}", index))
            .build()
            .map_err(|e| EqualizerError::WorkerPool(e.to_string()))?;

        info!(
            "EQUALIZER: {} bands on {} DSP workers",
            filters.len(),
            workers
        );

        Ok(Self { filters, pool })
    }

    pub fn filter_bank(&self) -> &Arc<FilterBank> {
        &self.filters
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    pub fn equalize(&self, block: &AudioBlock, gains: &[f32]) -> Result<AudioBlock, EqualizerError> {
        equalize(block, gains, &self.filters, &self.pool)
    }
}

impl std::fmt::Debug for BandEqualizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BandEqualizer")
            .field("bands", &self.filters.len())
            .field("workers", &self.pool.current_num_threads())
            .finish()
    }
}

/// Equalize one block: filter every band in parallel against the shared
/// read-only input, wait for all of them, sum, and normalize.
///
/// Any failing band (error or panic) fails the whole call; nothing is
/// partially mixed.
pub fn equalize(
    block: &AudioBlock,
    gains: &[f32],
    filters: &FilterBank,
    pool: &ThreadPool,
) -> Result<AudioBlock, EqualizerError> {
    if gains.len() != filters.len() {
        return Err(EqualizerError::GainCountMismatch {
            gains: gains.len(),
            bands: filters.len(),
        });
    }

    let band_outputs = pool.install(|| {
        filters
            .filters()
            .par_iter()
            .zip(gains.par_iter())
            .map(|(filter, &gain_db)| {
                panic::catch_unwind(AssertUnwindSafe(|| filter.process(gain_db, block)))
                    .unwrap_or_else(|payload| {
                        Err(EqualizerError::BandProcessing {
                            index: filter.index(),
                            reason: panic_message(payload.as_ref()),
                        })
                    })
            })
            .collect::<Result<Vec<_>, _>>()
    })?;

    let mut mixed = mix_bands(block, &band_outputs)?;
    normalize_peak(mixed.samples_mut());
    Ok(mixed)
}

/// Elementwise sum of the band outputs, in band order
pub fn mix_bands(input: &AudioBlock, band_outputs: &[AudioBlock]) -> Result<AudioBlock, EqualizerError> {
    let mut mixed = AudioBlock::silent(input.frame_count(), input.channel_count());

    for band in band_outputs {
        if !band.same_shape(input) {
            return Err(EqualizerError::BlockShape(format!(
                "band output {}x{} does not match input {}x{}",
                band.frame_count(),
                band.channel_count(),
                input.frame_count(),
                input.channel_count()
            )));
        }
        for (sum, sample) in mixed.samples_mut().iter_mut().zip(band.samples()) {
            *sum += *sample;
        }
    }

    Ok(mixed)
}

/// Divide by the block peak when it exceeds 1.0; returns the pre-division peak
pub fn normalize_peak(samples: &mut [f32]) -> f32 {
    let peak = peak_level(samples);
    if peak > 1.0 {
        for sample in samples.iter_mut() {
            *sample /= peak;
        }
    }
    peak
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("band task panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("band task panicked: {}", message)
    } else {
        "band task panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_peak_leaves_quiet_signal_alone() {
        let mut samples = vec![0.5, -0.25, 1.0, -1.0];
        let peak = normalize_peak(&mut samples);
        assert_eq!(peak, 1.0);
        assert_eq!(samples, vec![0.5, -0.25, 1.0, -1.0]);
    }

    #[test]
    fn test_normalize_peak_divides_loud_signal() {
        let mut samples = vec![0.5, -4.0, 2.0];
        let peak = normalize_peak(&mut samples);
        assert_eq!(peak, 4.0);
        assert_eq!(samples, vec![0.125, -1.0, 0.5]);
    }

    #[test]
    fn test_mix_bands_rejects_mismatched_shapes() {
        let input = AudioBlock::silent(8, 2);
        let wrong = AudioBlock::silent(4, 2);
        assert!(mix_bands(&input, &[wrong]).is_err());
    }

    #[test]
    fn test_panic_message_extracts_text() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "band task panicked: boom");
    }
}
