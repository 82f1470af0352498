use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "lumabeat", about = "Beat, tempo and section analysis for light-show timing tracks")]
pub struct Cli {
    /// Input audio file (WAV, MP3, FLAC, OGG, AAC)
    pub input: PathBuf,

    /// Write the analysis JSON here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Also export xLights timing tracks. A directory gets an Artist_Title file name.
    #[arg(long)]
    pub xtiming: Option<PathBuf>,

    /// FFT frame size in samples (power of two)
    #[arg(long)]
    pub frame_size: Option<usize>,

    /// Samples between frame starts
    #[arg(long)]
    pub hop_size: Option<usize>,

    /// Config file (defaults to ./lumabeat.toml or the user config)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Song title (defaults to the input file name)
    #[arg(long)]
    pub title: Option<String>,

    #[arg(long)]
    pub artist: Option<String>,

    #[arg(long)]
    pub album: Option<String>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pub pretty: bool,

    /// Hide the progress bar
    #[arg(short, long)]
    pub quiet: bool,
}
