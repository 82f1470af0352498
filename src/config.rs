//! Analysis configuration and config-file loading

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::analysis::result::TrackCategory;
use crate::error::AnalysisError;

/// Top-level config file layout (`lumabeat.toml`)
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Frame geometry and the frequency bands to track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// FFT frame size in samples, must be a power of two
    #[serde(default = "default_frame_size")]
    pub frame_size: usize,
    /// Samples between the starts of consecutive frames
    #[serde(default = "default_hop_size")]
    pub hop_size: usize,
    #[serde(default = "default_bands")]
    pub bands: Vec<FrequencyBand>,
}

/// A named frequency range watched for onsets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyBand {
    pub id: String,
    pub name: String,
    pub category: TrackCategory,
    pub low_hz: f32,
    pub high_hz: f32,
    /// Onset sensitivity, lower is more sensitive
    pub threshold: f32,
    /// Refractory period between accepted onsets
    pub min_interval_ms: f64,
}

#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub pretty_json: bool,
    /// Duration given to unlabeled onset effects in the xtiming export
    #[serde(default = "default_xtiming_mark_ms")]
    pub xtiming_mark_ms: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            frame_size: default_frame_size(),
            hop_size: default_hop_size(),
            bands: default_bands(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            pretty_json: false,
            xtiming_mark_ms: default_xtiming_mark_ms(),
        }
    }
}

impl AnalysisConfig {
    /// Reject configurations the engine cannot run with.
    ///
    /// Bands reaching past Nyquist are accepted; their bin ranges are clamped
    /// once the sample rate is known.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if !self.frame_size.is_power_of_two() || self.frame_size < 2 {
            return Err(AnalysisError::FrameSizeNotPowerOfTwo(self.frame_size));
        }
        if self.hop_size == 0 {
            return Err(AnalysisError::ZeroHopSize);
        }
        if self.hop_size > self.frame_size {
            return Err(AnalysisError::HopExceedsFrame {
                hop_size: self.hop_size,
                frame_size: self.frame_size,
            });
        }

        let mut seen = HashSet::new();
        for band in &self.bands {
            let finite = band.low_hz.is_finite() && band.high_hz.is_finite();
            if !finite || band.low_hz < 0.0 || band.low_hz >= band.high_hz {
                return Err(AnalysisError::InvalidBandRange {
                    id: band.id.clone(),
                    low_hz: band.low_hz,
                    high_hz: band.high_hz,
                });
            }
            if band.category == TrackCategory::Structure {
                return Err(AnalysisError::StructureBand(band.id.clone()));
            }
            if !seen.insert(band.id.as_str()) {
                return Err(AnalysisError::DuplicateBand(band.id.clone()));
            }
        }
        Ok(())
    }
}

impl FrequencyBand {
    pub fn new(
        id: &str,
        name: &str,
        category: TrackCategory,
        low_hz: f32,
        high_hz: f32,
        threshold: f32,
        min_interval_ms: f64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category,
            low_hz,
            high_hz,
            threshold,
            min_interval_ms,
        }
    }
}

/// The reference instrument bands: kick, snare, hi-hat, bass and mid-range.
pub fn default_bands() -> Vec<FrequencyBand> {
    vec![
        FrequencyBand::new("kick", "Drums — Kick", TrackCategory::Drums, 50.0, 80.0, 0.55, 150.0),
        FrequencyBand::new("snare", "Drums — Snare", TrackCategory::Drums, 1000.0, 3000.0, 0.45, 120.0),
        FrequencyBand::new("hihat", "Drums — Hi-Hat", TrackCategory::Drums, 5000.0, 15000.0, 0.45, 100.0),
        FrequencyBand::new("bass", "Bass", TrackCategory::Melodic, 60.0, 250.0, 0.45, 150.0),
        FrequencyBand::new("midrange", "Melody — Mid", TrackCategory::Melodic, 250.0, 4000.0, 0.45, 120.0),
    ]
}

fn default_frame_size() -> usize { 2048 }
fn default_hop_size() -> usize { 512 }
fn default_xtiming_mark_ms() -> u64 { 50 }

/// Parse a config file. Missing tables fall back to the reference setup.
pub fn load_config(path: &Path) -> Result<Config, AnalysisError> {
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Explicit path first, then `./lumabeat.toml`, then the per-user config files.
pub fn find_config(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from("lumabeat.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("lumabeat").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("lumabeat").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}
