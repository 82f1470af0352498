mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::path::{Path, PathBuf};

use cli::Cli;
use lumabeat::analysis::pipeline::{Pipeline, ProgressSink, StepProgress, StepStatus};
use lumabeat::config::{find_config, load_config, Config};
use lumabeat::export::xtiming;
use lumabeat::{FileSource, SongMetadata};

/// Drives an indicatif bar from pipeline progress.
struct BarSink {
    pb: ProgressBar,
}

impl ProgressSink for BarSink {
    fn report(&mut self, progress: StepProgress) {
        match progress.status {
            StepStatus::Pending => {}
            StepStatus::Active => self.pb.set_message(progress.step.label()),
            StepStatus::Done => self.pb.inc(1),
            StepStatus::Error => self
                .pb
                .abandon_with_message(format!("{} failed", progress.step)),
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    let mut config = match find_config(cli.config.as_deref()) {
        Some(path) => match load_config(&path) {
            Ok(cfg) => {
                log::info!("Loaded config from {}", path.display());
                cfg
            }
            Err(err) => {
                log::warn!("Failed to load config from {}: {}", path.display(), err);
                Config::default()
            }
        },
        None => Config::default(),
    };

    // CLI flags win over the config file
    if let Some(frame_size) = cli.frame_size {
        config.analysis.frame_size = frame_size;
    }
    if let Some(hop_size) = cli.hop_size {
        config.analysis.hop_size = hop_size;
    }
    let pretty = cli.pretty || config.output.pretty_json;

    if !cli.input.exists() {
        anyhow::bail!("Input file not found: {}", cli.input.display());
    }

    let metadata = SongMetadata {
        title: cli.title.clone().unwrap_or_else(|| file_title(&cli.input)),
        artist: cli.artist.clone().unwrap_or_else(|| "Unknown Artist".into()),
        album: cli.album.clone(),
        ..Default::default()
    };

    log::info!("lumabeat - beat and structure analysis");
    log::info!("Input: {}", cli.input.display());
    log::info!(
        "Frames: {} samples, hop {}, {} bands",
        config.analysis.frame_size,
        config.analysis.hop_size,
        config.analysis.bands.len()
    );

    let pipeline = Pipeline::new(config.analysis.clone()).context("Invalid analysis settings")?;

    let pb = if cli.quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(pipeline.stages().len() as u64)
    };
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} steps {msg}")?
            .progress_chars("=>-"),
    );
    let mut sink = BarSink { pb };

    let result = pipeline
        .run(FileSource(cli.input.clone()), metadata, &mut sink)
        .with_context(|| format!("Analysis of {} failed", cli.input.display()))?;
    sink.pb.finish_with_message("Analysis complete");

    let json = if pretty {
        serde_json::to_string_pretty(&result)?
    } else {
        serde_json::to_string(&result)?
    };
    match cli.output {
        Some(ref path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            log::info!("Wrote analysis to {}", path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{}", json)?;
        }
    }

    if let Some(ref target) = cli.xtiming {
        let path = xtiming_path(target, &result.metadata);
        let file = std::fs::File::create(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        let mut writer = std::io::BufWriter::new(file);
        xtiming::write_xtiming(&result.tracks, config.output.xtiming_mark_ms, &mut writer)?;
        writer.flush()?;
        log::info!("Wrote {} timing tracks to {}", result.tracks.len(), path.display());
    }

    Ok(())
}

fn file_title(input: &Path) -> String {
    input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn xtiming_path(target: &Path, metadata: &SongMetadata) -> PathBuf {
    if target.is_dir() {
        target.join(xtiming::export_filename(&metadata.artist, &metadata.title))
    } else {
        target.to_path_buf()
    }
}
