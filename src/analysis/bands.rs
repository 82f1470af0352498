//! Per-band RMS energy envelopes

use rayon::prelude::*;
use rustfft::num_complex::Complex;

use super::Envelope;
use crate::audio::framer::Framer;
use crate::audio::spectrum::{hz_to_bin, SpectralEngine};
use crate::config::{AnalysisConfig, FrequencyBand};
use crate::error::AnalysisError;

/// Inclusive bin range `[low, high]`; empty when `low > high`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinRange {
    pub low: usize,
    pub high: usize,
}

impl BinRange {
    /// Map a band's cutoffs to bins, clamped to `[1, frame_size/2]` so DC never counts.
    pub fn for_band(band: &FrequencyBand, frame_size: usize, sample_rate: u32) -> Self {
        let nyquist_bin = frame_size / 2;
        let clamp = |hz: f32| hz_to_bin(hz, frame_size, sample_rate).clamp(1, nyquist_bin.max(1));
        Self {
            low: clamp(band.low_hz),
            high: clamp(band.high_hz),
        }
    }

    pub fn len(&self) -> usize {
        if self.low > self.high {
            0
        } else {
            self.high - self.low + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `sqrt(Σ(re² + im²) / bins)` over the range
    pub fn rms(&self, spectrum: &[Complex<f32>]) -> f32 {
        let bins = self.len();
        if bins == 0 || self.high >= spectrum.len() {
            return 0.0;
        }
        let power: f32 = spectrum[self.low..=self.high].iter().map(|c| c.norm_sqr()).sum();
        (power / bins as f32).sqrt()
    }
}

/// Energy envelope for one configured band
#[derive(Debug, Clone, PartialEq)]
pub struct BandEnvelope {
    pub band_id: String,
    pub envelope: Envelope,
}

/// One envelope per band, aligned frame for frame with the framer's timestamps.
///
/// Frames are transformed in parallel; each worker reuses one scratch buffer
/// and writes its row of a preallocated frame × band matrix.
pub fn compute_band_energies(
    samples: &[f32],
    sample_rate: u32,
    config: &AnalysisConfig,
) -> Result<Vec<BandEnvelope>, AnalysisError> {
    if sample_rate == 0 {
        return Err(AnalysisError::InvalidInput("sample rate must be non-zero".into()));
    }
    let engine = SpectralEngine::new(config.frame_size)?;
    let framer = Framer::new(samples, config.frame_size, config.hop_size, sample_rate);
    let num_frames = framer.len();
    let num_bands = config.bands.len();
    let times_ms = framer.times_ms();

    let ranges: Vec<BinRange> = config
        .bands
        .iter()
        .map(|band| BinRange::for_band(band, config.frame_size, sample_rate))
        .collect();
    for (band, range) in config.bands.iter().zip(&ranges) {
        log::debug!("Band '{}': bins {}..={} ({} bins)", band.id, range.low, range.high, range.len());
    }

    let mut matrix = vec![0.0f32; num_frames * num_bands];
    if num_bands > 0 {
        matrix
            .par_chunks_mut(num_bands)
            .enumerate()
            .try_for_each_init(
                || engine.scratch(),
                |scratch, (f, row)| -> Result<(), AnalysisError> {
                    engine.transform(framer.frame(f), scratch)?;
                    for (energy, range) in row.iter_mut().zip(&ranges) {
                        *energy = range.rms(scratch);
                    }
                    Ok(())
                },
            )?;
    }

    Ok(config
        .bands
        .iter()
        .enumerate()
        .map(|(b, band)| BandEnvelope {
            band_id: band.id.clone(),
            envelope: Envelope {
                values: (0..num_frames).map(|f| matrix[f * num_bands + b]).collect(),
                times_ms: times_ms.clone(),
            },
        })
        .collect())
}
