use tracing::info;

use super::filter::BandFilter;
use crate::audio::errors::EqualizerError;
use crate::audio::types::FrequencyBand;

/// Immutable set of bandpass filters, one per configured band, in band order.
///
/// The ordering is the index contract for gain vectors: gain `i` always
/// applies to filter `i`.
#[derive(Debug, Clone)]
pub struct FilterBank {
    sample_rate: u32,
    order: usize,
    filters: Vec<BandFilter>,
}

impl FilterBank {
    /// Design one filter per band. Every band is validated before any filter
    /// is designed, so a bad band never leaves a partial bank behind. A band
    /// whose factored design has a pole on the unit circle fails the build.
    pub fn build(
        sample_rate: u32,
        bands: &[FrequencyBand],
        order: usize,
    ) -> Result<Self, EqualizerError> {
        if sample_rate == 0 {
            return Err(EqualizerError::InvalidSampleRate(sample_rate));
        }
        if order == 0 {
            return Err(EqualizerError::InvalidFilterOrder(order));
        }
        if bands.is_empty() {
            return Err(EqualizerError::NoBands);
        }

        let nyquist = 0.5 * sample_rate as f64;
        let normalized = bands
            .iter()
            .enumerate()
            .map(|(index, band)| normalize_band(index, band, nyquist))
            .collect::<Result<Vec<_>, _>>()?;

        let filters = bands
            .iter()
            .zip(normalized)
            .enumerate()
            .map(|(index, (band, (low, high)))| {
                BandFilter::design(index, *band, order, low, high)
            })
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            "FILTER_BANK: Designed {} bandpass filters (order {}, {} Hz)",
            filters.len(),
            order,
            sample_rate
        );

        Ok(Self {
            sample_rate,
            order,
            filters,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn filters(&self) -> &[BandFilter] {
        &self.filters
    }

    pub fn get(&self, index: usize) -> Option<&BandFilter> {
        self.filters.get(index)
    }

    pub fn bands(&self) -> impl Iterator<Item = &FrequencyBand> + '_ {
        self.filters.iter().map(BandFilter::band)
    }
}

/// Cutoffs relative to Nyquist, rejected unless `0 < low < high < 1`
fn normalize_band(
    index: usize,
    band: &FrequencyBand,
    nyquist: f64,
) -> Result<(f64, f64), EqualizerError> {
    let invalid = |reason: &str| EqualizerError::InvalidBand {
        index,
        low_hz: band.low_hz,
        high_hz: band.high_hz,
        reason: reason.to_string(),
    };

    let low = band.low_hz / nyquist;
    let high = band.high_hz / nyquist;

    if !low.is_finite() || !high.is_finite() {
        return Err(invalid("cutoffs must be finite"));
    }
    if low <= 0.0 || low >= 1.0 {
        return Err(invalid(&format!(
            "normalized low cutoff {:.6} outside (0, 1)",
            low
        )));
    }
    if high <= 0.0 || high >= 1.0 {
        return Err(invalid(&format!(
            "normalized high cutoff {:.6} outside (0, 1)",
            high
        )));
    }
    if low >= high {
        return Err(invalid("low cutoff must be below high cutoff"));
    }

    Ok((low, high))
}
