use std::f64::consts::PI;

use rustfft::num_complex::Complex64;

use super::{db_to_linear, flush_denormal};
use crate::audio::errors::EqualizerError;
use crate::audio::types::{AudioBlock, FrequencyBand};

/// Transfer function `b(z) / a(z)`, with `feedback[0] == 1`
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCoefficients {
    pub feedforward: Vec<f64>,
    pub feedback: Vec<f64>,
}

/// Second-order section `(b0 + b1 z^-1 + b2 z^-2) / (1 + a1 z^-1 + a2 z^-2)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Biquad {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl Biquad {
    /// One direct form II transposed step. `state` is the section's delay line.
    #[inline]
    fn process(&self, x: f64, state: &mut [f64; 2]) -> f64 {
        let y = self.b0 * x + state[0];
        state[0] = flush_denormal(self.b1 * x - self.a1 * y + state[1]);
        state[1] = flush_denormal(self.b2 * x - self.a2 * y);
        y
    }

    /// Both poles strictly inside the unit circle (stability triangle)
    pub fn is_stable(&self) -> bool {
        self.a2.abs() < 1.0 && self.a1.abs() < 1.0 + self.a2
    }

    /// Largest pole radius of the section
    pub fn pole_radius(&self) -> f64 {
        let discriminant = Complex64::new(self.a1 * self.a1 - 4.0 * self.a2, 0.0).sqrt();
        let first = (-self.a1 + discriminant) / 2.0;
        let second = (-self.a1 - discriminant) / 2.0;
        first.norm().max(second.norm())
    }

    fn response(&self, omega: f64) -> Complex64 {
        let z1 = Complex64::from_polar(1.0, -omega);
        let z2 = z1 * z1;
        (self.b0 + z1 * self.b1 + z2 * self.b2) / (1.0 + z1 * self.a1 + z2 * self.a2)
    }
}

/// Digital poles and overall gain of a Butterworth bandpass.
/// Every design has `order` zeros at z = 1 and `order` zeros at z = -1.
struct BandpassDesign {
    poles: Vec<Complex64>,
    gain: f64,
}

/// Analog lowpass prototype poles, lowpass-to-bandpass transform around the
/// prewarped edges, then the bilinear transform at `fs = 2`.
fn design_bandpass(order: usize, low: f64, high: f64) -> BandpassDesign {
    let fs = 2.0;
    let warp = |w: f64| 2.0 * fs * (PI * w / fs).tan();
    let (w_low, w_high) = (warp(low), warp(high));
    let bandwidth = w_high - w_low;
    let center = (w_low * w_high).sqrt();

    let n = order as f64;
    let prototype: Vec<Complex64> = (0..order)
        .map(|k| {
            let m = 2.0 * k as f64 - n + 1.0;
            -Complex64::from_polar(1.0, PI * m / (2.0 * n))
        })
        .collect();

    // Each prototype pole splits into a conjugate-side pair around the center
    let mut analog_poles = Vec::with_capacity(2 * order);
    for sign in [1.0, -1.0] {
        for pole in &prototype {
            let scaled = *pole * (bandwidth / 2.0);
            let offset = (scaled * scaled - center * center).sqrt();
            analog_poles.push(scaled + offset * sign);
        }
    }
    let analog_gain = bandwidth.powi(order as i32);

    let fs2 = 2.0 * fs;
    let poles = analog_poles
        .iter()
        .map(|&pole| (fs2 + pole) / (fs2 - pole))
        .collect();

    let pole_product = analog_poles
        .iter()
        .fold(Complex64::new(1.0, 0.0), |acc, &pole| acc * (fs2 - pole));
    let gain = analog_gain * (Complex64::new(fs2.powi(order as i32), 0.0) / pole_product).re;

    BandpassDesign { poles, gain }
}

/// Digital Butterworth bandpass of the given prototype order, expanded into
/// one `b/a` pair.
///
/// `low` and `high` are cutoffs normalized to Nyquist and must satisfy
/// `0 < low < high < 1`; the filter bank validates this before calling.
/// The result has `2 * order + 1` coefficients on each side. Use
/// [`butterworth_sections`] to run the filter; the expanded polynomial loses
/// precision quickly as the order grows.
pub fn butterworth_bandpass(order: usize, low: f64, high: f64) -> FilterCoefficients {
    let design = design_bandpass(order, low, high);

    // `order` zeros at s = 0 land on z = 1; the zeros at infinity land on z = -1
    let mut zeros = vec![Complex64::new(1.0, 0.0); order];
    zeros.extend(std::iter::repeat(Complex64::new(-1.0, 0.0)).take(order));

    let feedforward = expand_roots(&zeros)
        .into_iter()
        .map(|c| design.gain * c.re)
        .collect();
    let feedback = expand_roots(&design.poles)
        .into_iter()
        .map(|c| c.re)
        .collect();

    FilterCoefficients {
        feedforward,
        feedback,
    }
}

/// The same bandpass as [`butterworth_bandpass`], factored into `order`
/// second-order sections.
///
/// Conjugate pole pairs form one section each and leftover real poles are
/// paired in order. Every section gets one zero at z = 1 and one at z = -1,
/// and the overall gain is spread evenly across the sections.
pub fn butterworth_sections(order: usize, low: f64, high: f64) -> Vec<Biquad> {
    let design = design_bandpass(order, low, high);
    let tolerance = 1e-12;

    let mut denominators: Vec<(f64, f64)> = design
        .poles
        .iter()
        .filter(|pole| pole.im > tolerance)
        .map(|pole| (-2.0 * pole.re, pole.norm_sqr()))
        .collect();

    let mut real_poles: Vec<f64> = design
        .poles
        .iter()
        .filter(|pole| pole.im.abs() <= tolerance)
        .map(|pole| pole.re)
        .collect();
    real_poles.sort_by(|a, b| a.total_cmp(b));
    for pair in real_poles.chunks(2) {
        match *pair {
            [p1, p2] => denominators.push((-(p1 + p2), p1 * p2)),
            [p] => denominators.push((-p, 0.0)),
            _ => {}
        }
    }

    let count = denominators.len().max(1) as f64;
    let section_gain = design.gain.abs().powf(1.0 / count);

    denominators
        .into_iter()
        .enumerate()
        .map(|(i, (a1, a2))| {
            let gain = if i == 0 {
                section_gain * design.gain.signum()
            } else {
                section_gain
            };
            Biquad {
                b0: gain,
                b1: 0.0,
                b2: -gain,
                a1,
                a2,
            }
        })
        .collect()
}

/// Polynomial coefficients (highest power first) of `prod(x - root)`
fn expand_roots(roots: &[Complex64]) -> Vec<Complex64> {
    let mut coefficients = vec![Complex64::new(1.0, 0.0)];
    for root in roots {
        let mut next = vec![Complex64::new(0.0, 0.0); coefficients.len() + 1];
        for (i, c) in coefficients.iter().enumerate() {
            next[i] += *c;
            next[i + 1] -= *c * *root;
        }
        coefficients = next;
    }
    coefficients
}

/// Bandpass filter for one band of the filter bank
#[derive(Debug, Clone)]
pub struct BandFilter {
    index: usize,
    band: FrequencyBand,
    coefficients: FilterCoefficients,
    sections: Vec<Biquad>,
}

impl BandFilter {
    /// Design the filter for `band`, with cutoffs already normalized to Nyquist.
    ///
    /// Fails when the factored design does not have exactly `order` sections
    /// or any section has a pole on or outside the unit circle.
    pub(crate) fn design(
        index: usize,
        band: FrequencyBand,
        order: usize,
        low: f64,
        high: f64,
    ) -> Result<Self, EqualizerError> {
        let sections = butterworth_sections(order, low, high);
        let unstable = |reason: String| EqualizerError::InvalidBand {
            index,
            low_hz: band.low_hz,
            high_hz: band.high_hz,
            reason,
        };

        if sections.len() != order {
            return Err(unstable(format!(
                "design produced {} sections for order {}",
                sections.len(),
                order
            )));
        }
        if let Some(section) = sections
            .iter()
            .find(|s| !s.is_stable() || !s.b0.is_finite())
        {
            return Err(unstable(format!(
                "unstable design, pole radius {}",
                section.pole_radius()
            )));
        }

        Ok(Self {
            index,
            band,
            coefficients: butterworth_bandpass(order, low, high),
            sections,
        })
    }

    /// Position of this filter in the bank (and in the gain vector)
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn band(&self) -> &FrequencyBand {
        &self.band
    }

    pub fn coefficients(&self) -> &FilterCoefficients {
        &self.coefficients
    }

    pub fn sections(&self) -> &[Biquad] {
        &self.sections
    }

    /// Filter every channel of `block` along time and scale by `10^(gain_db/20)`.
    ///
    /// Each call starts from zero filter state; nothing carries over between
    /// blocks, so calls for different bands can run concurrently.
    pub fn process(&self, gain_db: f32, block: &AudioBlock) -> Result<AudioBlock, EqualizerError> {
        if !gain_db.is_finite() {
            return Err(EqualizerError::BandProcessing {
                index: self.index,
                reason: format!("gain {} dB is not finite", gain_db),
            });
        }

        let gain = db_to_linear(gain_db) as f64;
        let channels = block.channel_count() as usize;
        let mut output = vec![0.0_f32; block.samples().len()];

        for channel in 0..channels {
            let filtered = self.filter_channel(block.channel(channel as u16));
            for (frame, value) in filtered.enumerate() {
                let scaled = value * gain;
                if !scaled.is_finite() {
                    return Err(EqualizerError::BandProcessing {
                        index: self.index,
                        reason: format!(
                            "non-finite output at frame {} channel {}",
                            frame, channel
                        ),
                    });
                }
                output[frame * channels + channel] = scaled as f32;
            }
        }

        AudioBlock::new(output, block.channel_count())
    }

    /// Run one channel through the section cascade
    fn filter_channel<'a>(
        &'a self,
        input: impl Iterator<Item = f32> + 'a,
    ) -> impl Iterator<Item = f64> + 'a {
        let mut states = vec![[0.0_f64; 2]; self.sections.len()];

        input.map(move |sample| {
            self.sections
                .iter()
                .zip(states.iter_mut())
                .fold(sample as f64, |x, (section, state)| section.process(x, state))
        })
    }

    /// Magnitude of the frequency response at `frequency_hz`
    pub fn magnitude_at(&self, frequency_hz: f64, sample_rate: u32) -> f64 {
        let omega = 2.0 * PI * frequency_hz / sample_rate as f64;
        self.sections
            .iter()
            .fold(Complex64::new(1.0, 0.0), |acc, section| acc * section.response(omega))
            .norm()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64, tolerance: f64) -> bool {
        (a - b).abs() < tolerance
    }

    #[test]
    fn test_bandpass_coefficients_match_reference_design() {
        // butter(2, [0.1, 0.2], 'bandpass')
        let coefficients = butterworth_bandpass(2, 0.1, 0.2);
        let expected_b = [0.020083365564211232, 0.0, -0.040166731128422464, 0.0, 0.020083365564211232];
        let expected_a = [1.0, -3.212440815469486, 4.167131841756085, -2.5653579121960033, 0.641351538057563];

        assert_eq!(coefficients.feedforward.len(), 5);
        assert_eq!(coefficients.feedback.len(), 5);
        for (actual, expected) in coefficients.feedforward.iter().zip(expected_b) {
            assert!(approx(*actual, expected, 1e-9), "b: {} vs {}", actual, expected);
        }
        for (actual, expected) in coefficients.feedback.iter().zip(expected_a) {
            assert!(approx(*actual, expected, 1e-9), "a: {} vs {}", actual, expected);
        }
    }

    #[test]
    fn test_higher_order_has_more_taps() {
        let coefficients = butterworth_bandpass(4, 0.05, 0.3);
        assert_eq!(coefficients.feedforward.len(), 9);
        assert_eq!(coefficients.feedback.len(), 9);
        assert!(approx(coefficients.feedback[0], 1.0, 1e-12));
    }

    #[test]
    fn test_response_is_unity_at_center_and_rejects_edges() {
        let band = FrequencyBand::new(800.0, 1250.0);
        let filter = BandFilter::design(0, band, 2, 800.0 / 24000.0, 1250.0 / 24000.0).unwrap();

        assert!(approx(filter.magnitude_at(1000.0, 48000), 1.0, 0.01));
        assert!(filter.magnitude_at(8000.0, 48000) < 0.01);
        assert!(filter.magnitude_at(100.0, 48000) < 0.01);
        // -3 dB at the band edges
        assert!(approx(filter.magnitude_at(800.0, 48000), std::f64::consts::FRAC_1_SQRT_2, 0.01));
    }

    #[test]
    fn test_process_scales_by_gain_and_keeps_shape() {
        let filter = BandFilter::design(3, FrequencyBand::new(20.0, 20000.0), 2, 20.0 / 24000.0, 20000.0 / 24000.0).unwrap();
        let block = AudioBlock::from_fn(256, 2, |frame, channel| {
            let phase = 2.0 * std::f32::consts::PI * 1000.0 * frame as f32 / 48000.0;
            if channel == 0 { phase.sin() } else { 0.0 }
        });

        let unity = filter.process(0.0, &block).unwrap();
        let boosted = filter.process(6.0, &block).unwrap();

        assert!(unity.same_shape(&block));
        assert!(unity.channel(1).all(|s| s == 0.0));
        let ratio = boosted.peak() / unity.peak();
        assert!((ratio - db_to_linear(6.0)).abs() < 1e-4);
    }

    #[test]
    fn test_process_rejects_non_finite_gain() {
        let filter = BandFilter::design(7, FrequencyBand::new(100.0, 200.0), 2, 0.01, 0.02).unwrap();
        let err = filter.process(f32::NAN, &AudioBlock::silent(8, 1)).unwrap_err();
        assert!(matches!(err, EqualizerError::BandProcessing { index: 7, .. }));
    }

    #[test]
    fn test_sections_factor_the_expanded_design() {
        let coefficients = butterworth_bandpass(3, 0.1, 0.2);
        let filter = BandFilter::design(0, FrequencyBand::new(2400.0, 4800.0), 3, 0.1, 0.2).unwrap();
        assert_eq!(filter.sections().len(), 3);

        let polynomial = |values: &[f64], omega: f64| {
            values
                .iter()
                .enumerate()
                .fold(Complex64::new(0.0, 0.0), |acc, (k, c)| {
                    acc + Complex64::from_polar(*c, -omega * k as f64)
                })
        };
        for frequency in [500.0, 2400.0, 3400.0, 4800.0, 12000.0] {
            let omega = 2.0 * PI * frequency / 48000.0;
            let expanded = (polynomial(&coefficients.feedforward, omega)
                / polynomial(&coefficients.feedback, omega))
            .norm();
            assert!(
                approx(filter.magnitude_at(frequency, 48000), expanded, 1e-9),
                "{} Hz: {} vs {}",
                frequency,
                filter.magnitude_at(frequency, 48000),
                expanded
            );
        }
    }

    #[test]
    fn test_narrow_low_band_settles_at_high_order() {
        // 20-76 Hz at 192 kHz, order 8: poles sit within 1e-3 of the unit circle
        let (low, high) = (20.0 / 96000.0, 76.0 / 96000.0);
        let filter = BandFilter::design(0, FrequencyBand::new(20.0, 76.0), 8, low, high).unwrap();
        assert!(filter.sections().iter().all(Biquad::is_stable));

        let block = AudioBlock::from_fn(65536, 1, |frame, _| {
            0.5 * (2.0 * std::f32::consts::PI * 48.0 * frame as f32 / 192000.0).sin()
        });
        let output = filter.process(0.0, &block).unwrap();
        let tail = output.samples()[57344..]
            .iter()
            .fold(0.0_f32, |peak, s| peak.max(s.abs()));
        assert!(tail > 0.45 && tail < 0.55, "tail peak {}", tail);
    }

    #[test]
    fn test_stability_triangle() {
        let section = |a1: f64, a2: f64| Biquad {
            b0: 1.0,
            b1: 0.0,
            b2: -1.0,
            a1,
            a2,
        };
        assert!(section(-1.8, 0.81).is_stable());
        assert!(!section(-2.0, 1.0).is_stable());
        assert!(!section(0.0, 1.2).is_stable());
        assert!(!section(-2.1, 0.5).is_stable());
        assert!(approx(section(-1.8, 0.81).pole_radius(), 0.9, 1e-12));
    }
}
