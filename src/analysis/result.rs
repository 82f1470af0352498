//! Tracks, marks and the terminal analysis result

use serde::{Deserialize, Serialize};

use super::stats::AnalysisStats;
use super::tempo::TempoEstimate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackCategory {
    Drums,
    Melodic,
    Structure,
}

/// A discrete onset event
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimingMark {
    pub time_ms: u64,
    /// Normalized to `[0, 1]` within its track
    pub strength: f32,
}

/// A labeled span `[start_ms, end_ms)` used for beats, bars and sections
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabeledMark {
    pub label: String,
    pub start_ms: u64,
    pub end_ms: u64,
}

impl LabeledMark {
    pub fn new(label: impl Into<String>, start_ms: u64, end_ms: u64) -> Self {
        Self {
            label: label.into(),
            start_ms,
            end_ms,
        }
    }
}

/// A track carries exactly one kind of mark.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackMarks {
    Onsets(Vec<TimingMark>),
    Labeled(Vec<LabeledMark>),
}

impl TrackMarks {
    pub fn len(&self) -> usize {
        match self {
            TrackMarks::Onsets(marks) => marks.len(),
            TrackMarks::Labeled(marks) => marks.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BeatTrack {
    pub id: String,
    pub name: String,
    pub category: TrackCategory,
    pub marks: TrackMarks,
}

impl BeatTrack {
    pub fn onsets(&self) -> Option<&[TimingMark]> {
        match &self.marks {
            TrackMarks::Onsets(marks) => Some(marks),
            TrackMarks::Labeled(_) => None,
        }
    }

    pub fn labeled(&self) -> Option<&[LabeledMark]> {
        match &self.marks {
            TrackMarks::Labeled(marks) => Some(marks),
            TrackMarks::Onsets(_) => None,
        }
    }
}

/// Descriptive data about the analyzed song
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SongMetadata {
    pub title: String,
    pub artist: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    pub duration_ms: u64,
    /// Filled in once tempo detection has run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bpm: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub metadata: SongMetadata,
    pub tempo: TempoEstimate,
    pub tracks: Vec<BeatTrack>,
    pub stats: AnalysisStats,
}

impl AnalysisResult {
    pub fn track(&self, id: &str) -> Option<&BeatTrack> {
        self.tracks.iter().find(|t| t.id == id)
    }
}
