//! Adaptive-threshold onset picking
//!
//! The threshold at each frame is the mean of a centered 15-frame window
//! plus `threshold` times the envelope's global mean. The local mean stands
//! in for a running median; band thresholds are tuned against it.

use super::result::TimingMark;

const LOCAL_WINDOW: usize = 15;

/// Sensitivity used for broadband flux onsets
pub const FLUX_THRESHOLD: f32 = 0.3;
/// Refractory period used for broadband flux onsets
pub const FLUX_MIN_INTERVAL_MS: f64 = 200.0;

/// Detect onsets in an energy envelope.
///
/// A frame qualifies when it exceeds its adaptive threshold, rises strictly
/// from the previous frame and is not below the next one. Candidates whose
/// rounded time is closer than `min_interval_ms` to the last accepted onset
/// are dropped.
pub fn detect_onsets(
    values: &[f32],
    times_ms: &[f64],
    threshold: f32,
    min_interval_ms: f64,
) -> Vec<TimingMark> {
    let len = values.len().min(times_ms.len());
    if len < 3 {
        return Vec::new();
    }
    let values = &values[..len];
    let adaptive = adaptive_threshold(values, threshold);

    let mut marks: Vec<TimingMark> = Vec::new();

    for i in 1..len - 1 {
        let v = values[i];
        if v > adaptive[i] && v > values[i - 1] && v >= values[i + 1] {
            let time_ms = times_ms[i].round().max(0.0) as u64;
            // spacing is measured between the emitted millisecond times
            let spaced = marks
                .last()
                .map_or(true, |last| time_ms.saturating_sub(last.time_ms) as f64 >= min_interval_ms);
            if spaced {
                marks.push(TimingMark { time_ms, strength: v });
            }
        }
    }

    normalize_strengths(&mut marks);
    marks
}

/// Onsets from a broadband flux envelope with flux-tuned sensitivity.
pub fn detect_flux_onsets(flux: &[f32], times_ms: &[f64], min_interval_ms: f64) -> Vec<TimingMark> {
    detect_onsets(flux, times_ms, FLUX_THRESHOLD, min_interval_ms)
}

fn adaptive_threshold(values: &[f32], sensitivity: f32) -> Vec<f32> {
    let len = values.len();
    let half = LOCAL_WINDOW / 2;
    let global_mean = values.iter().sum::<f32>() / len as f32;

    (0..len)
        .map(|i| {
            let start = i.saturating_sub(half);
            let end = (i + half).min(len - 1);
            let window = &values[start..=end];
            let local_mean = window.iter().sum::<f32>() / window.len() as f32;
            local_mean + sensitivity * global_mean
        })
        .collect()
}

/// Scale strengths so the strongest mark is 1.0. All-zero input is left alone.
pub fn normalize_strengths(marks: &mut [TimingMark]) {
    let max = marks.iter().map(|m| m.strength).fold(0.0f32, f32::max);
    if max <= 0.0 {
        return;
    }
    for mark in marks {
        mark.strength /= max;
    }
}
