//! Summary statistics over the finished tracks

use serde::Serialize;

use super::result::BeatTrack;
use super::tempo::TempoEstimate;

/// Onsets closer than one frame at this rate cannot be resolved
const BASE_FPS: u32 = 20;
const HIGH_FPS: u32 = 50;
const SUB_FRAME_MS: u64 = 1000 / BASE_FPS as u64;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisStats {
    pub bpm: f64,
    pub tempo_confidence: f64,
    /// Timing marks plus labeled marks over all tracks
    pub total_marks: usize,
    pub track_count: usize,
    pub duration_ms: u64,
    /// Smallest positive gap between consecutive onsets of any onset track
    pub min_interval_ms: Option<u64>,
    pub has_sub_frame_events: bool,
    /// Minimum frame rate a sequencer needs to resolve every onset
    pub recommended_fps: u32,
}

pub fn compute_stats(tracks: &[BeatTrack], tempo: &TempoEstimate, duration_ms: u64) -> AnalysisStats {
    let total_marks = tracks.iter().map(|t| t.marks.len()).sum();

    let min_interval_ms = tracks
        .iter()
        .filter_map(BeatTrack::onsets)
        .flat_map(|marks| marks.windows(2).map(|w| w[1].time_ms.saturating_sub(w[0].time_ms)))
        .filter(|&gap| gap > 0)
        .min();

    let has_sub_frame_events = min_interval_ms.is_some_and(|gap| gap < SUB_FRAME_MS);

    AnalysisStats {
        bpm: tempo.bpm,
        tempo_confidence: tempo.confidence,
        total_marks,
        track_count: tracks.len(),
        duration_ms,
        min_interval_ms,
        has_sub_frame_events,
        recommended_fps: if has_sub_frame_events { HIGH_FPS } else { BASE_FPS },
    }
}
