use clap::Parser;
use std::path::PathBuf;

use crate::analysis::spectrum::SpectrumMethod;
use crate::view::spectrum::{DEFAULT_BAR_COUNT, DEFAULT_WINDOW_SIZE};
use crate::view::waveform::DEFAULT_TARGET_POINTS;

#[derive(Parser, Debug)]
#[command(name = "wavescope", about = "Waveform and spectrum analysis for audio files")]
pub struct Cli {
    /// Input audio file (WAV, MP3, FLAC, OGG, AAC)
    pub input: Option<PathBuf>,

    /// Config file (defaults to wavescope.toml or the user config dir)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Number of waveform plot points
    #[arg(long, default_value_t = DEFAULT_TARGET_POINTS)]
    pub points: usize,

    /// Number of spectrum bars
    #[arg(long, default_value_t = DEFAULT_BAR_COUNT)]
    pub bars: usize,

    /// Spectrum window size in samples (power of two)
    #[arg(long, default_value_t = DEFAULT_WINDOW_SIZE)]
    pub window: usize,

    /// Spectrum algorithm
    #[arg(long, value_enum, default_value_t = SpectrumMethod::Fft)]
    pub method: SpectrumMethod,

    /// Frames per second of the simulated playback
    #[arg(long, default_value_t = 30)]
    pub fps: u32,

    /// Seconds of playback to simulate (0 skips the spectrum view)
    #[arg(long, default_value_t = 2.0)]
    pub play_seconds: f64,

    /// Analyse the window at the playback position instead of the clip start
    #[arg(long)]
    pub track_playback: bool,

    /// Compute the playback-tracking spectrum for the whole clip
    #[arg(long)]
    pub timeline: bool,

    /// Write results as JSON
    #[arg(long)]
    pub json: Option<PathBuf>,

    /// Chart width in columns
    #[arg(long, default_value_t = 64)]
    pub width: usize,

    /// Chart height in rows
    #[arg(long, default_value_t = 12)]
    pub height: usize,
}
