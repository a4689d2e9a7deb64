pub mod equalizer;
pub mod filter;
pub mod filter_bank;

pub use equalizer::{equalize, mix_bands, normalize_peak, BandEqualizer};
pub use filter::{butterworth_bandpass, butterworth_sections, BandFilter, Biquad, FilterCoefficients};
pub use filter_bank::FilterBank;

/// Audio stability constants for denormal protection
const DENORMAL_THRESHOLD: f64 = 1e-30;

/// Flush tiny filter state values to zero so the recursion never runs on denormals
#[inline]
fn flush_denormal(x: f64) -> f64 {
    if x.abs() < DENORMAL_THRESHOLD {
        0.0
    } else {
        x
    }
}

/// Linear amplitude factor for a gain in decibels
#[inline]
pub fn db_to_linear(gain_db: f32) -> f32 {
    10.0_f32.powf(gain_db / 20.0)
}

/// Largest absolute sample value, 0.0 for empty input
#[inline]
pub fn peak_level(samples: &[f32]) -> f32 {
    samples
        .iter()
        .fold(0.0_f32, |peak, sample| peak.max(sample.abs()))
}
