//! # LumaBeat
//!
//! Beat, tempo and song-structure analysis for light-show sequencing.
//!
//! Audio is downmixed to mono, cut into overlapping Hann-windowed frames and
//! transformed with a radix-2 FFT. From the spectra the engine derives
//! per-band energy envelopes and a spectral flux envelope, then:
//!
//! - **Onsets**: adaptive-threshold peak picking per frequency band
//! - **Tempo**: autocorrelation of the flux envelope with octave correction
//! - **Structure**: a phase-aligned beat grid, bars of four beats and
//!   energy-based sections
//!
//! ## Quick Start
//!
//! ```no_run
//! use lumabeat::{analyze, AnalysisConfig, NoProgress, SampleBuffer, SongMetadata};
//!
//! let samples: Vec<f32> = vec![0.0; 44100 * 10];
//! let buffer = SampleBuffer::mono(samples, 44100);
//!
//! let result = analyze(buffer, &AnalysisConfig::default(), SongMetadata::default(), &mut NoProgress)?;
//! println!("{:.1} BPM, {} tracks", result.tempo.bpm, result.tracks.len());
//! # Ok::<(), lumabeat::AnalysisError>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! decode → spectrum (band energies, flux) → tempo → onsets → tracks
//! ```
//!
//! Each step is a [`analysis::pipeline::Stage`]; progress is pushed to a
//! [`ProgressSink`] as the steps run.

#![warn(clippy::all)]

pub mod analysis;
pub mod audio;
pub mod config;
pub mod error;
pub mod export;

pub use analysis::pipeline::{analyze, NoProgress, Pipeline, ProgressSink, Step, StepProgress, StepStatus};
pub use analysis::result::{AnalysisResult, BeatTrack, LabeledMark, SongMetadata, TimingMark, TrackCategory, TrackMarks};
pub use analysis::tempo::TempoEstimate;
pub use audio::decode::{AudioSource, FileSource};
pub use audio::framer::SampleBuffer;
pub use config::{AnalysisConfig, FrequencyBand};
pub use error::AnalysisError;
