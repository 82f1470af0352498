//! Stage orchestration
//!
//! The pipeline is an ordered list of [`Stage`] descriptors. Each stage reads
//! what earlier stages left in the [`PipelineContext`] and adds its own output.
//! Status transitions go to a caller-supplied [`ProgressSink`] as they happen.
//! A failing stage is reported as [`StepStatus::Error`] and its error returned;
//! later stages never run.

use serde::Serialize;
use std::fmt;

use super::bands::{compute_band_energies, BandEnvelope};
use super::flux::compute_spectral_flux;
use super::grid::{generate_bars, generate_beat_grid};
use super::onset::{detect_flux_onsets, detect_onsets, FLUX_MIN_INTERVAL_MS};
use super::result::{AnalysisResult, BeatTrack, LabeledMark, SongMetadata, TrackCategory, TrackMarks};
use super::sections::detect_sections;
use super::stats::compute_stats;
use super::tempo::{detect_tempo, TempoEstimate};
use super::Envelope;
use crate::audio::decode::AudioSource;
use crate::audio::framer::{downmix, SampleBuffer};
use crate::config::AnalysisConfig;
use crate::error::AnalysisError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Decode,
    Spectrum,
    Tempo,
    Onsets,
    Tracks,
}

impl Step {
    pub fn label(&self) -> &'static str {
        match self {
            Step::Decode => "decode",
            Step::Spectrum => "spectrum",
            Step::Tempo => "tempo",
            Step::Onsets => "onsets",
            Step::Tracks => "tracks",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Active,
    Done,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StepProgress {
    pub step: Step,
    pub status: StepStatus,
}

/// Receives every status transition, synchronously, in order.
pub trait ProgressSink {
    fn report(&mut self, progress: StepProgress);
}

impl<F: FnMut(StepProgress)> ProgressSink for F {
    fn report(&mut self, progress: StepProgress) {
        self(progress)
    }
}

/// Sink that drops every update
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&mut self, _progress: StepProgress) {}
}

/// Mono audio after the decode stage
#[derive(Debug, Clone)]
pub struct MonoAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl MonoAudio {
    pub fn duration_ms(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64 * 1000.0
    }
}

type DecodeFn<'a> = Box<dyn FnOnce() -> Result<SampleBuffer, AnalysisError> + 'a>;

/// Everything the stages read and write during one run
pub struct PipelineContext<'a> {
    pub config: AnalysisConfig,
    pub metadata: SongMetadata,
    source: Option<DecodeFn<'a>>,
    pub audio: Option<MonoAudio>,
    pub band_energies: Option<Vec<BandEnvelope>>,
    pub flux: Option<Envelope>,
    pub tempo: Option<TempoEstimate>,
    pub onset_tracks: Option<Vec<BeatTrack>>,
    pub structure_tracks: Option<Vec<BeatTrack>>,
}

impl<'a> PipelineContext<'a> {
    pub fn new<S: AudioSource + 'a>(config: AnalysisConfig, source: S, metadata: SongMetadata) -> Self {
        Self {
            config,
            metadata,
            source: Some(Box::new(move || source.decode())),
            audio: None,
            band_energies: None,
            flux: None,
            tempo: None,
            onset_tracks: None,
            structure_tracks: None,
        }
    }

    /// Collect the terminal result once every stage has run.
    pub fn finish(self) -> Result<AnalysisResult, AnalysisError> {
        let tempo = self.tempo.ok_or_else(|| missing(Step::Tracks, "a tempo estimate"))?;
        let mut tracks = self.onset_tracks.ok_or_else(|| missing(Step::Tracks, "onset tracks"))?;
        tracks.extend(
            self.structure_tracks
                .ok_or_else(|| missing(Step::Tracks, "structure tracks"))?,
        );

        let stats = compute_stats(&tracks, &tempo, self.metadata.duration_ms);
        Ok(AnalysisResult {
            metadata: self.metadata,
            tempo,
            tracks,
            stats,
        })
    }
}

pub type StageFn = for<'a> fn(&mut PipelineContext<'a>) -> Result<(), AnalysisError>;

/// A named unit of work in the pipeline
#[derive(Clone, Copy)]
pub struct Stage {
    pub step: Step,
    pub run: StageFn,
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage").field("step", &self.step).finish()
    }
}

/// The fixed stage order: decode, spectrum, tempo, onsets, tracks.
pub const STAGES: [Stage; 5] = [
    Stage { step: Step::Decode, run: decode_stage },
    Stage { step: Step::Spectrum, run: spectrum_stage },
    Stage { step: Step::Tempo, run: tempo_stage },
    Stage { step: Step::Onsets, run: onsets_stage },
    Stage { step: Step::Tracks, run: tracks_stage },
];

#[derive(Debug, Clone)]
pub struct Pipeline {
    config: AnalysisConfig,
    stages: Vec<Stage>,
}

impl Pipeline {
    /// Validates `config` before anything runs.
    pub fn new(config: AnalysisConfig) -> Result<Self, AnalysisError> {
        Self::with_stages(config, STAGES.to_vec())
    }

    pub fn with_stages(config: AnalysisConfig, stages: Vec<Stage>) -> Result<Self, AnalysisError> {
        config.validate()?;
        Ok(Self { config, stages })
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn run<'a, S: AudioSource + 'a>(
        &self,
        source: S,
        metadata: SongMetadata,
        sink: &mut dyn ProgressSink,
    ) -> Result<AnalysisResult, AnalysisError> {
        for stage in &self.stages {
            sink.report(StepProgress { step: stage.step, status: StepStatus::Pending });
        }

        let mut ctx = PipelineContext::new(self.config.clone(), source, metadata);
        for stage in &self.stages {
            log::info!("Stage '{}'...", stage.step);
            sink.report(StepProgress { step: stage.step, status: StepStatus::Active });
            if let Err(err) = (stage.run)(&mut ctx) {
                log::error!("Stage '{}' failed: {}", stage.step, err);
                sink.report(StepProgress { step: stage.step, status: StepStatus::Error });
                return Err(err);
            }
            sink.report(StepProgress { step: stage.step, status: StepStatus::Done });
        }

        let result = ctx.finish()?;
        log::info!(
            "Analysis complete: {} tracks, {} marks, {:.1} BPM",
            result.stats.track_count,
            result.stats.total_marks,
            result.stats.bpm
        );
        Ok(result)
    }
}

/// Run the default pipeline on `source`.
pub fn analyze<S: AudioSource>(
    source: S,
    config: &AnalysisConfig,
    metadata: SongMetadata,
    sink: &mut dyn ProgressSink,
) -> Result<AnalysisResult, AnalysisError> {
    Pipeline::new(config.clone())?.run(source, metadata, sink)
}

fn missing(stage: Step, what: &'static str) -> AnalysisError {
    AnalysisError::MissingStageOutput { stage, missing: what }
}

/// Decode the source and downmix it to mono.
pub fn decode_stage(ctx: &mut PipelineContext<'_>) -> Result<(), AnalysisError> {
    let decode = ctx.source.take().ok_or_else(|| missing(Step::Decode, "an audio source"))?;
    let buffer = decode()?;
    if buffer.sample_rate == 0 {
        return Err(AnalysisError::InvalidInput("sample rate must be non-zero".into()));
    }
    let audio = MonoAudio {
        samples: downmix(&buffer)?,
        sample_rate: buffer.sample_rate,
    };
    ctx.metadata.duration_ms = audio.duration_ms().round() as u64;
    if ctx.metadata.duration_ms == 0 {
        return Err(AnalysisError::InvalidInput(format!(
            "audio is shorter than a millisecond ({} samples)",
            audio.samples.len()
        )));
    }
    log::info!(
        "Audio: {} samples at {} Hz ({:.1}s)",
        audio.samples.len(),
        audio.sample_rate,
        audio.duration_ms() / 1000.0
    );
    ctx.audio = Some(audio);
    Ok(())
}

/// Band energy envelopes and the broadband flux envelope.
pub fn spectrum_stage(ctx: &mut PipelineContext<'_>) -> Result<(), AnalysisError> {
    let audio = ctx.audio.as_ref().ok_or_else(|| missing(Step::Spectrum, "decoded audio"))?;
    let config = &ctx.config;

    let bands = compute_band_energies(&audio.samples, audio.sample_rate, config)?;
    let flux = compute_spectral_flux(&audio.samples, audio.sample_rate, config.frame_size, config.hop_size)?;
    log::debug!("Spectrum: {} frames, {} bands", flux.len(), bands.len());

    ctx.band_energies = Some(bands);
    ctx.flux = Some(flux);
    Ok(())
}

pub fn tempo_stage(ctx: &mut PipelineContext<'_>) -> Result<(), AnalysisError> {
    let flux = ctx.flux.as_ref().ok_or_else(|| missing(Step::Tempo, "a flux envelope"))?;
    let tempo = detect_tempo(&flux.values, &flux.times_ms);
    log::info!("Tempo: {:.1} BPM (confidence {:.2})", tempo.bpm, tempo.confidence);

    ctx.metadata.bpm = Some(tempo.bpm);
    ctx.tempo = Some(tempo);
    Ok(())
}

/// One onset track per band that produced at least one onset.
pub fn onsets_stage(ctx: &mut PipelineContext<'_>) -> Result<(), AnalysisError> {
    let energies = ctx
        .band_energies
        .as_ref()
        .ok_or_else(|| missing(Step::Onsets, "band energies"))?;

    let mut tracks = Vec::new();
    for band in &ctx.config.bands {
        let energy = energies
            .iter()
            .find(|e| e.band_id == band.id)
            .ok_or_else(|| missing(Step::Onsets, "an envelope for every band"))?;
        let marks = detect_onsets(
            &energy.envelope.values,
            &energy.envelope.times_ms,
            band.threshold,
            band.min_interval_ms,
        );
        log::debug!("Band '{}': {} onsets", band.id, marks.len());
        if !marks.is_empty() {
            tracks.push(BeatTrack {
                id: band.id.clone(),
                name: band.name.clone(),
                category: band.category,
                marks: TrackMarks::Onsets(marks),
            });
        }
    }

    ctx.onset_tracks = Some(tracks);
    Ok(())
}

/// Beat grid, bars and sections.
pub fn tracks_stage(ctx: &mut PipelineContext<'_>) -> Result<(), AnalysisError> {
    let tempo = ctx.tempo.ok_or_else(|| missing(Step::Tracks, "a tempo estimate"))?;
    let onset_tracks = ctx.onset_tracks.as_ref().ok_or_else(|| missing(Step::Tracks, "onset tracks"))?;
    let flux = ctx.flux.as_ref().ok_or_else(|| missing(Step::Tracks, "a flux envelope"))?;
    let audio = ctx.audio.as_ref().ok_or_else(|| missing(Step::Tracks, "decoded audio"))?;
    let duration_ms = audio.duration_ms();

    let mut onsets: Vec<_> = onset_tracks
        .iter()
        .filter_map(BeatTrack::onsets)
        .flatten()
        .copied()
        .collect();
    if onsets.is_empty() {
        // no band fired; align the grid to broadband flux onsets instead
        onsets = detect_flux_onsets(&flux.values, &flux.times_ms, FLUX_MIN_INTERVAL_MS);
        log::debug!("Beat alignment: {} flux onsets", onsets.len());
    }

    let beats = generate_beat_grid(tempo.bpm, duration_ms, &onsets);
    let bars = generate_bars(&beats, tempo.beat_interval_ms(), duration_ms);
    let sections = detect_sections(&flux.values, &flux.times_ms, duration_ms);
    log::debug!("Structure: {} beats, {} bars, {} sections", beats.len(), bars.len(), sections.len());

    let mut tracks = Vec::with_capacity(3);
    if !beats.is_empty() {
        tracks.push(structure_track("beats", "Beat Count", beats));
    }
    if !bars.is_empty() {
        tracks.push(structure_track("bars", "Bars", bars));
    }
    tracks.push(structure_track("sections", "Sections", sections));

    ctx.structure_tracks = Some(tracks);
    Ok(())
}

fn structure_track(id: &str, name: &str, marks: Vec<LabeledMark>) -> BeatTrack {
    BeatTrack {
        id: id.into(),
        name: name.into(),
        category: TrackCategory::Structure,
        marks: TrackMarks::Labeled(marks),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::sections::FULL_SONG;

    struct FailingSource;

    impl AudioSource for FailingSource {
        fn decode(self) -> Result<SampleBuffer, AnalysisError> {
            Err(AnalysisError::Decode("corrupt stream".into()))
        }
    }

    fn collect(progress: &mut Vec<StepProgress>) -> impl FnMut(StepProgress) + '_ {
        move |p| progress.push(p)
    }

    #[test]
    fn reports_every_transition_in_order() {
        let buffer = SampleBuffer::mono(vec![0.0; 44100 * 2], 44100);
        let mut progress = Vec::new();
        let result = analyze(
            buffer,
            &AnalysisConfig::default(),
            SongMetadata::default(),
            &mut collect(&mut progress),
        )
        .unwrap();

        assert_eq!(progress.len(), 15);
        assert!(progress[..5].iter().all(|p| p.status == StepStatus::Pending));
        let active_done: Vec<(Step, StepStatus)> =
            progress[5..].iter().map(|p| (p.step, p.status)).collect();
        assert_eq!(
            active_done,
            vec![
                (Step::Decode, StepStatus::Active),
                (Step::Decode, StepStatus::Done),
                (Step::Spectrum, StepStatus::Active),
                (Step::Spectrum, StepStatus::Done),
                (Step::Tempo, StepStatus::Active),
                (Step::Tempo, StepStatus::Done),
                (Step::Onsets, StepStatus::Active),
                (Step::Onsets, StepStatus::Done),
                (Step::Tracks, StepStatus::Active),
                (Step::Tracks, StepStatus::Done),
            ]
        );
        assert_eq!(result.metadata.duration_ms, 2000);
        assert_eq!(result.metadata.bpm, Some(120.0));
    }

    #[test]
    fn failing_stage_is_reported_and_stops_the_run() {
        let mut progress = Vec::new();
        let err = analyze(
            FailingSource,
            &AnalysisConfig::default(),
            SongMetadata::default(),
            &mut collect(&mut progress),
        )
        .unwrap_err();

        assert!(matches!(err, AnalysisError::Decode(_)));
        let last = progress.last().unwrap();
        assert_eq!(*last, StepProgress { step: Step::Decode, status: StepStatus::Error });
        assert!(!progress
            .iter()
            .any(|p| p.step == Step::Spectrum && p.status != StepStatus::Pending));
    }

    #[test]
    fn invalid_config_is_rejected_before_running() {
        let config = AnalysisConfig { frame_size: 1000, ..Default::default() };
        let mut progress = Vec::new();
        let err = analyze(
            SampleBuffer::mono(vec![0.0; 4096], 44100),
            &config,
            SongMetadata::default(),
            &mut collect(&mut progress),
        )
        .unwrap_err();
        assert!(matches!(err, AnalysisError::FrameSizeNotPowerOfTwo(1000)));
        assert!(progress.is_empty());
    }

    #[test]
    fn zero_sample_rate_fails_decode() {
        let err = analyze(
            SampleBuffer::mono(vec![0.0; 4096], 0),
            &AnalysisConfig::default(),
            SongMetadata::default(),
            &mut NoProgress,
        )
        .unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidInput(_)));
    }

    #[test]
    fn empty_audio_is_rejected() {
        for samples in [Vec::new(), vec![0.0; 20]] {
            let mut progress = Vec::new();
            let err = analyze(
                SampleBuffer::mono(samples, 44100),
                &AnalysisConfig::default(),
                SongMetadata::default(),
                &mut collect(&mut progress),
            )
            .unwrap_err();
            assert!(matches!(err, AnalysisError::InvalidInput(_)));
            assert_eq!(
                progress.last(),
                Some(&StepProgress { step: Step::Decode, status: StepStatus::Error })
            );
        }
    }

    #[test]
    fn grid_falls_back_to_flux_onsets_without_bands() {
        // clicks every 500 ms starting at 125 ms, nothing to feed a band track
        let mut samples = vec![0.0f32; 44100 * 8];
        let mut pos = 44100 / 8;
        while pos + 4 < samples.len() {
            samples[pos..pos + 4].fill(0.8);
            pos += 44100 / 2;
        }
        let config = AnalysisConfig { bands: Vec::new(), ..Default::default() };
        let result = analyze(
            SampleBuffer::mono(samples, 44100),
            &config,
            SongMetadata::default(),
            &mut NoProgress,
        )
        .unwrap();

        assert!(result.tracks.iter().all(|t| t.category == TrackCategory::Structure));
        let beats = result.track("beats").unwrap().labeled().unwrap();
        let interval = result.tempo.beat_interval_ms();
        let phase = (beats[0].start_ms as f64 - 125.0).rem_euclid(interval);
        let distance = phase.min(interval - phase);
        assert!(distance <= 45.0, "grid starts at {} ms", beats[0].start_ms);
    }

    #[test]
    fn stages_out_of_order_report_missing_input() {
        let stages = vec![STAGES[0], STAGES[2]];
        let pipeline = Pipeline::with_stages(AnalysisConfig::default(), stages).unwrap();
        let err = pipeline
            .run(SampleBuffer::mono(vec![0.0; 8192], 44100), SongMetadata::default(), &mut NoProgress)
            .unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::MissingStageOutput { stage: Step::Tempo, .. }
        ));
    }

    #[test]
    fn stages_run_individually() {
        let buffer = SampleBuffer::mono(vec![0.0; 44100], 44100);
        let mut ctx = PipelineContext::new(AnalysisConfig::default(), buffer, SongMetadata::default());
        decode_stage(&mut ctx).unwrap();
        assert!(ctx.audio.is_some());
        spectrum_stage(&mut ctx).unwrap();
        assert_eq!(ctx.band_energies.as_ref().map(Vec::len), Some(5));
        tempo_stage(&mut ctx).unwrap();
        assert_eq!(ctx.tempo, Some(TempoEstimate::FALLBACK));
        onsets_stage(&mut ctx).unwrap();
        assert_eq!(ctx.onset_tracks.as_ref().map(Vec::len), Some(0));
        tracks_stage(&mut ctx).unwrap();

        let result = ctx.finish().unwrap();
        let sections = result.track("sections").unwrap().labeled().unwrap();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].label, FULL_SONG);
    }

    #[test]
    fn decode_stage_runs_once() {
        let buffer = SampleBuffer::mono(vec![0.0; 4096], 44100);
        let mut ctx = PipelineContext::new(AnalysisConfig::default(), buffer, SongMetadata::default());
        decode_stage(&mut ctx).unwrap();
        assert!(matches!(
            decode_stage(&mut ctx),
            Err(AnalysisError::MissingStageOutput { stage: Step::Decode, .. })
        ));
    }
}
