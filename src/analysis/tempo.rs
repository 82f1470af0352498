//! Autocorrelation tempo estimation
//!
//! # Algorithm
//!
//! 1. Derive the frame interval from the envelope's first and last timestamps
//! 2. Map the 60–200 BPM search range to a lag range in frames, capped at
//!    half the envelope length
//! 3. Z-score the flux; a flat envelope yields the 120 BPM / zero-confidence
//!    fallback
//! 4. Normalized autocorrelation `Σ(x[i]-μ)(x[i+lag]-μ) / (n·σ²)` per lag
//! 5. Parabolic interpolation around the best lag
//! 6. Octave correction: prefer the doubled tempo when the half lag keeps
//!    at least 80% of the best correlation and the doubled tempo stays in range
//! 7. Clamp, round to 0.1 BPM

use serde::Serialize;

pub const MIN_BPM: f64 = 60.0;
pub const MAX_BPM: f64 = 200.0;
pub const FALLBACK_BPM: f64 = 120.0;

/// Fraction of the best correlation the half lag must reach to double the tempo
const OCTAVE_RATIO: f64 = 0.8;

const EPSILON: f64 = 1e-10;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TempoEstimate {
    /// Always within `[MIN_BPM, MAX_BPM]`
    pub bpm: f64,
    /// Best normalized autocorrelation, clamped to `[0, 1]`
    pub confidence: f64,
}

impl TempoEstimate {
    pub const FALLBACK: TempoEstimate = TempoEstimate {
        bpm: FALLBACK_BPM,
        confidence: 0.0,
    };

    pub fn beat_interval_ms(&self) -> f64 {
        60000.0 / self.bpm
    }
}

/// Estimate tempo from a spectral flux envelope.
///
/// Degenerate envelopes (too short, constant, or too coarse in time) return
/// [`TempoEstimate::FALLBACK`] rather than an error.
pub fn detect_tempo(flux: &[f32], times_ms: &[f64]) -> TempoEstimate {
    let len = flux.len().min(times_ms.len());
    if len < 2 {
        return TempoEstimate::FALLBACK;
    }

    let frame_interval_ms = (times_ms[len - 1] - times_ms[0]) / (len - 1) as f64;
    if frame_interval_ms.is_nan() || frame_interval_ms <= 0.0 {
        return TempoEstimate::FALLBACK;
    }

    let min_lag = ((60000.0 / (MAX_BPM * frame_interval_ms)).floor() as usize)
        .max(1)
        .min(len / 2);
    let max_lag = ((60000.0 / (MIN_BPM * frame_interval_ms)).ceil() as usize).min(len / 2);
    if min_lag >= max_lag {
        log::debug!("Envelope too short for tempo search ({} frames)", len);
        return TempoEstimate::FALLBACK;
    }

    let Some(normalized) = Normalized::new(&flux[..len]) else {
        log::debug!("Flat flux envelope, using fallback tempo");
        return TempoEstimate::FALLBACK;
    };

    let mut correlations = vec![0.0f64; max_lag + 1];
    let mut best_lag = min_lag;
    let mut best_corr = f64::NEG_INFINITY;
    for lag in min_lag..=max_lag {
        let corr = normalized.autocorrelation(lag);
        correlations[lag] = corr;
        if corr > best_corr {
            best_corr = corr;
            best_lag = lag;
        }
    }

    let refined_lag = parabolic_peak(&correlations, best_lag, min_lag, max_lag);
    let mut bpm = 60000.0 / (refined_lag * frame_interval_ms);

    let half_lag = ((best_lag + 1) / 2).max(1);
    let half_corr = normalized.autocorrelation(half_lag);
    if best_corr > 0.0 && half_corr >= OCTAVE_RATIO * best_corr && bpm * 2.0 <= MAX_BPM {
        log::debug!(
            "Octave correction: lag {} corr {:.3} vs best lag {} corr {:.3}",
            half_lag,
            half_corr,
            best_lag,
            best_corr
        );
        bpm *= 2.0;
    }

    let bpm = (bpm.clamp(MIN_BPM, MAX_BPM) * 10.0).round() / 10.0;
    let confidence = best_corr.clamp(0.0, 1.0);
    log::debug!(
        "Tempo: lags {}..={} at {:.2} ms/frame, best lag {:.2} -> {:.1} BPM (confidence {:.3})",
        min_lag,
        max_lag,
        frame_interval_ms,
        refined_lag,
        bpm,
        confidence
    );

    TempoEstimate { bpm, confidence }
}

/// Mean-removed flux with its variance
struct Normalized {
    centered: Vec<f64>,
    variance: f64,
}

impl Normalized {
    fn new(values: &[f32]) -> Option<Self> {
        let n = values.len() as f64;
        let mean = values.iter().map(|&v| v as f64).sum::<f64>() / n;
        let centered: Vec<f64> = values.iter().map(|&v| v as f64 - mean).collect();
        let variance = centered.iter().map(|d| d * d).sum::<f64>() / n;
        if variance.sqrt() < EPSILON {
            return None;
        }
        Some(Self { centered, variance })
    }

    fn autocorrelation(&self, lag: usize) -> f64 {
        let n = self.centered.len().saturating_sub(lag);
        if n == 0 {
            return 0.0;
        }
        let sum: f64 = self.centered[..n]
            .iter()
            .zip(&self.centered[lag..])
            .map(|(a, b)| a * b)
            .sum();
        sum / (n as f64 * self.variance)
    }
}

/// Sub-frame peak position from the peak and its two neighbors.
/// Peaks on the range boundary are returned unrefined.
fn parabolic_peak(values: &[f64], peak: usize, min: usize, max: usize) -> f64 {
    if peak <= min || peak >= max {
        return peak as f64;
    }
    let (a, b, c) = (values[peak - 1], values[peak], values[peak + 1]);
    let denom = a - 2.0 * b + c;
    if denom.abs() < EPSILON {
        return peak as f64;
    }
    peak as f64 + 0.5 * (a - c) / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    fn times(len: usize, step_ms: f64) -> Vec<f64> {
        (0..len).map(|i| i as f64 * step_ms).collect()
    }

    #[test]
    fn flat_envelope_falls_back() {
        let flux = vec![0.0f32; 15000];
        assert_eq!(detect_tempo(&flux, &times(15000, 11.6)), TempoEstimate::FALLBACK);

        let flux = vec![3.5f32; 2000];
        assert_eq!(detect_tempo(&flux, &times(2000, 11.6)), TempoEstimate::FALLBACK);
    }

    #[test]
    fn short_envelope_falls_back() {
        assert_eq!(detect_tempo(&[1.0], &[0.0]), TempoEstimate::FALLBACK);
        assert_eq!(detect_tempo(&[], &[]), TempoEstimate::FALLBACK);
        // 20 frames at 10 ms cannot hold a 300 ms lag
        let flux: Vec<f32> = (0..20).map(|i| (i % 3) as f32).collect();
        assert_eq!(detect_tempo(&flux, &times(20, 10.0)), TempoEstimate::FALLBACK);
    }

    #[test]
    fn periodic_spikes_give_their_tempo() {
        // 10 ms frames, spike every 50 frames = 500 ms = 120 BPM
        let flux: Vec<f32> = (0..3000).map(|i| if i % 50 == 0 { 1.0 } else { 0.0 }).collect();
        let tempo = detect_tempo(&flux, &times(3000, 10.0));
        assert!((tempo.bpm - 120.0).abs() <= 1.0, "got {}", tempo.bpm);
        assert!(tempo.confidence > 0.5, "confidence {}", tempo.confidence);
    }

    #[test]
    fn octave_correction_prefers_faster_tempo() {
        // Alternating accents make the 1000 ms lag the strongest, but the
        // 500 ms lag keeps well over 80% of its correlation
        let flux: Vec<f32> = (0..3000)
            .map(|i| match i % 100 {
                0 => 1.0,
                50 => 0.7,
                _ => 0.0,
            })
            .collect();
        let tempo = detect_tempo(&flux, &times(3000, 10.0));
        assert!((tempo.bpm - 120.0).abs() <= 2.0, "expected ~120, got {}", tempo.bpm);
    }

    #[test]
    fn no_doubling_without_half_lag_support() {
        // 600 ms period = 100 BPM; doubling to 200 would stay in range,
        // but the half lag (300 ms) carries no correlation here
        let flux: Vec<f32> = (0..3000).map(|i| if i % 60 == 0 { 1.0 } else { 0.0 }).collect();
        let tempo = detect_tempo(&flux, &times(3000, 10.0));
        assert!((tempo.bpm - 100.0).abs() <= 1.0, "got {}", tempo.bpm);
    }

    #[test]
    fn bpm_always_in_range() {
        for period in [7usize, 13, 29, 41, 73, 97, 150, 400] {
            let flux: Vec<f32> = (0..4000)
                .map(|i| if i % period == 0 { 1.0 } else { ((i * 7) % 5) as f32 * 0.01 })
                .collect();
            let tempo = detect_tempo(&flux, &times(4000, 11.61));
            assert!((MIN_BPM..=MAX_BPM).contains(&tempo.bpm), "period {} gave {}", period, tempo.bpm);
            assert!((0.0..=1.0).contains(&tempo.confidence));
        }
    }

    #[test]
    fn bpm_is_rounded_to_tenths() {
        let flux: Vec<f32> = (0..5000).map(|i| if i % 47 == 0 { 1.0 } else { 0.0 }).collect();
        let tempo = detect_tempo(&flux, &times(5000, 11.61));
        assert!(((tempo.bpm * 10.0).round() - tempo.bpm * 10.0).abs() < 1e-6);
    }

    #[test]
    fn parabolic_peak_refines_between_bins() {
        let values = [0.0, 0.5, 1.0, 0.9, 0.0];
        let refined = parabolic_peak(&values, 2, 0, 4);
        assert!(refined > 2.0 && refined < 2.5);
        assert_eq!(parabolic_peak(&values, 4, 0, 4), 4.0);
    }
}
