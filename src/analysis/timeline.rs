use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use rustfft::FftPlanner;
use serde::Serialize;

use super::spectrum::{aggregate_bars, direct_dft_magnitudes, fft_magnitudes, SpectrumMethod};
use super::types::FrequencyBar;

/// Spectrum bars for the window starting at one playback position.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineFrame {
    pub time_ms: f64,
    pub bars: Vec<FrequencyBar>,
}

/// Slice of `samples` that starts at `time_secs` into playback. Past the end
/// of the clip the slice is empty, which analyses as silence.
pub fn window_at(samples: &[f32], sample_rate: f64, time_secs: f64) -> &[f32] {
    if !(time_secs.is_finite() && time_secs > 0.0) {
        return samples;
    }
    let start = (time_secs * sample_rate).floor() as usize;
    &samples[start.min(samples.len())..]
}

/// Playback-tracking spectrum: one frame of bars per video-style frame,
/// each analysing the window at that frame's playback position.
pub fn spectrum_timeline(
    samples: &[f32],
    sample_rate: f64,
    fps: u32,
    window_size: usize,
    bar_count: usize,
    method: SpectrumMethod,
) -> Vec<TimelineFrame> {
    if samples.is_empty() || fps == 0 || sample_rate <= 0.0 {
        return Vec::new();
    }

    let duration = samples.len() as f64 / sample_rate;
    let total_frames = (duration * fps as f64).ceil() as usize;

    log::info!(
        "Spectrum timeline: {} frames @ {}fps, window={}, bars={}",
        total_frames, fps, window_size, bar_count
    );

    let pb = ProgressBar::new(total_frames as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} frames")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );

    let frames: Vec<TimelineFrame> = (0..total_frames)
        .into_par_iter()
        .map_init(FftPlanner::<f32>::new, |planner, frame_idx| {
            let time_secs = frame_idx as f64 / fps as f64;
            let window = window_at(samples, sample_rate, time_secs);

            let magnitudes = match method {
                SpectrumMethod::Fft => fft_magnitudes(planner, window, window_size),
                SpectrumMethod::Direct => direct_dft_magnitudes(window, window_size),
            };

            pb.inc(1);
            TimelineFrame {
                time_ms: time_secs * 1000.0,
                bars: aggregate_bars(&magnitudes, bar_count),
            }
        })
        .collect();

    pb.finish_and_clear();
    frames
}
