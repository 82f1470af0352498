//! Phase-aligned beat grid and bar grouping

use super::result::{LabeledMark, TimingMark};

/// Candidate phase offsets tried per beat interval
const PHASE_CANDIDATES: usize = 16;
/// Onsets farther than this from a beat line do not vote
const ALIGN_TOLERANCE_MS: f64 = 50.0;

pub const BEATS_PER_BAR: usize = 4;

/// Evenly spaced beats at `bpm`, phase-aligned to `onsets`.
///
/// Each beat spans `[start, next start)` and is labeled `"1".."4"` in turn.
/// The grid ends with the last beat that fits entirely within the track.
pub fn generate_beat_grid(bpm: f64, duration_ms: f64, onsets: &[TimingMark]) -> Vec<LabeledMark> {
    if !(bpm.is_finite() && bpm > 0.0 && duration_ms > 0.0) {
        return Vec::new();
    }

    let interval = 60000.0 / bpm;
    let offset = best_offset(interval, onsets);
    let position = |i: usize| offset + i as f64 * interval;

    let mut beats = Vec::new();
    let mut i = 0;
    while position(i + 1) <= duration_ms {
        beats.push(LabeledMark::new(
            ((i % BEATS_PER_BAR) + 1).to_string(),
            position(i).round() as u64,
            position(i + 1).round() as u64,
        ));
        i += 1;
    }

    log::debug!(
        "Beat grid: {} beats at {:.1} ms, offset {:.1} ms",
        beats.len(),
        interval,
        offset
    );
    beats
}

/// Offset in `[0, interval)` whose beat lines collect the most onset strength.
///
/// Each onset within the tolerance of its nearest beat line contributes
/// `strength · (1 − distance / tolerance)`. Ties keep the earliest offset.
pub fn best_offset(interval_ms: f64, onsets: &[TimingMark]) -> f64 {
    if onsets.is_empty() || interval_ms <= 0.0 {
        return 0.0;
    }

    let step = interval_ms / PHASE_CANDIDATES as f64;
    let mut best = 0.0;
    let mut best_score = f64::NEG_INFINITY;

    for candidate in 0..PHASE_CANDIDATES {
        let offset = candidate as f64 * step;
        let score: f64 = onsets
            .iter()
            .filter_map(|onset| {
                let phase = (onset.time_ms as f64 - offset).rem_euclid(interval_ms);
                let distance = phase.min(interval_ms - phase);
                (distance < ALIGN_TOLERANCE_MS)
                    .then(|| onset.strength as f64 * (1.0 - distance / ALIGN_TOLERANCE_MS))
            })
            .sum();
        if score > best_score {
            best_score = score;
            best = offset;
        }
    }
    best
}

/// Group beats into bars starting at every downbeat.
///
/// A bar ends where the next one starts. The last bar is closed at
/// `min(start + 4 beats, duration)`.
pub fn generate_bars(beats: &[LabeledMark], interval_ms: f64, duration_ms: f64) -> Vec<LabeledMark> {
    let starts: Vec<u64> = beats
        .iter()
        .filter(|b| b.label == "1")
        .map(|b| b.start_ms)
        .collect();

    let mut bars = Vec::with_capacity(starts.len());
    for (n, &start) in starts.iter().enumerate() {
        let end = match starts.get(n + 1) {
            Some(&next) => next,
            None => {
                let full = start as f64 + BEATS_PER_BAR as f64 * interval_ms;
                full.min(duration_ms).round() as u64
            }
        };
        if end > start {
            bars.push(LabeledMark::new(format!("Bar {}", n + 1), start, end));
        }
    }
    bars
}
