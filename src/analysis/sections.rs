//! Coarse song structure from long-term flux energy

use super::result::LabeledMark;

/// Width of the smoothing window
const SMOOTHING_MS: f64 = 5000.0;
/// Segments shorter than this are folded into a neighbor
const MIN_SECTION_MS: u64 = 8000;

pub const FULL_SONG: &str = "FULL SONG";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Segment {
    start_ms: u64,
    end_ms: u64,
    high: bool,
}

impl Segment {
    fn len_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }
}

/// Split the track into INTRO / VERSE n / CHORUS n / OUTRO sections.
///
/// Frames are classified against the median of the smoothed flux, runs
/// become segments, and segments shorter than 8 s merge into a neighbor.
/// The sections always tile `[0, duration]`; when nothing distinguishes
/// the song, a single `"FULL SONG"` section is returned.
pub fn detect_sections(flux: &[f32], times_ms: &[f64], duration_ms: f64) -> Vec<LabeledMark> {
    let duration = duration_ms.max(0.0).round() as u64;
    let len = flux.len().min(times_ms.len());
    if len == 0 {
        return full_song(duration);
    }

    let window = smoothing_window(len, duration_ms);
    let smoothed = moving_average(&flux[..len], window);
    let median = median(&smoothed);

    let segments = split_runs(&smoothed, &times_ms[..len], median, duration);
    let segments = coalesce(merge_short(segments));
    log::debug!("Sections: {} segments after merging (median {:.3})", segments.len(), median);

    if segments.len() <= 1 {
        return full_song(duration);
    }
    label(&segments)
}

fn full_song(duration_ms: u64) -> Vec<LabeledMark> {
    vec![LabeledMark::new(FULL_SONG, 0, duration_ms)]
}

/// Frames per ~5 s of audio, at least one
fn smoothing_window(len: usize, duration_ms: f64) -> usize {
    let windows = (duration_ms / SMOOTHING_MS).max(1.0);
    ((len as f64 / windows).floor() as usize).max(1)
}

/// Centered moving average, shrinking at the edges.
fn moving_average(values: &[f32], window: usize) -> Vec<f32> {
    let half = window / 2;
    let mut prefix = Vec::with_capacity(values.len() + 1);
    prefix.push(0.0f64);
    for &v in values {
        let last = prefix[prefix.len() - 1];
        prefix.push(last + v as f64);
    }
    (0..values.len())
        .map(|i| {
            let start = i.saturating_sub(half);
            let end = (i + half).min(values.len() - 1);
            ((prefix[end + 1] - prefix[start]) / (end - start + 1) as f64) as f32
        })
        .collect()
}

/// Upper median of the values
fn median(values: &[f32]) -> f32 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f32::total_cmp);
    sorted[sorted.len() / 2]
}

/// Runs of above/below-median frames as time segments tiling `[0, duration]`.
fn split_runs(smoothed: &[f32], times_ms: &[f64], median: f32, duration: u64) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut start = 0u64;
    let mut high = smoothed[0] > median;

    for i in 1..smoothed.len() {
        let is_high = smoothed[i] > median;
        if is_high != high {
            let boundary = (times_ms[i].round().max(0.0) as u64).clamp(start, duration);
            segments.push(Segment { start_ms: start, end_ms: boundary, high });
            start = boundary;
            high = is_high;
        }
    }
    segments.push(Segment { start_ms: start, end_ms: duration, high });
    segments
}

/// Fold each short segment into the previous one, or into the next one when
/// it leads the track. Merged segments are not re-checked.
fn merge_short(segments: Vec<Segment>) -> Vec<Segment> {
    if segments.len() <= 1 {
        return segments;
    }
    let count = segments.len();
    let mut merged: Vec<Segment> = Vec::with_capacity(count);
    let mut carried_start: Option<u64> = None;

    for (i, mut segment) in segments.into_iter().enumerate() {
        if let Some(start) = carried_start.take() {
            segment.start_ms = start;
        }
        if segment.len_ms() < MIN_SECTION_MS {
            if let Some(prev) = merged.last_mut() {
                prev.end_ms = segment.end_ms;
                continue;
            }
            if i + 1 < count {
                carried_start = Some(segment.start_ms);
                continue;
            }
        }
        merged.push(segment);
    }
    merged
}

/// Join neighbors that ended up in the same energy class.
fn coalesce(segments: Vec<Segment>) -> Vec<Segment> {
    let mut out: Vec<Segment> = Vec::with_capacity(segments.len());
    for segment in segments {
        match out.last_mut() {
            Some(prev) if prev.high == segment.high => prev.end_ms = segment.end_ms,
            _ => out.push(segment),
        }
    }
    out
}

fn label(segments: &[Segment]) -> Vec<LabeledMark> {
    let last = segments.len() - 1;
    let mut verses = 0;
    let mut choruses = 0;

    segments
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let name = if s.high {
                choruses += 1;
                format!("CHORUS {}", choruses)
            } else if i == 0 {
                "INTRO".to_string()
            } else if i == last {
                "OUTRO".to_string()
            } else {
                verses += 1;
                format!("VERSE {}", verses)
            };
            LabeledMark::new(name, s.start_ms, s.end_ms)
        })
        .collect()
}
