mod analysis;
mod audio;
mod cli;
mod config;
mod export;
mod render;
mod view;

use anyhow::{Context, Result};
use clap::Parser;
use std::time::{Duration, Instant};

use analysis::spectrum::{SpectrumMethod, MAX_WINDOW_SIZE};
use analysis::FrequencyBar;
use audio::decode::DecodedAudio;
use cli::Cli;
use render::chart;
use view::spectrum::{SpectrumSettings, SpectrumView, DEFAULT_BAR_COUNT, DEFAULT_WINDOW_SIZE};
use view::waveform::{WaveformView, DEFAULT_TARGET_POINTS};

const WAVEFORM_TIMEOUT: Duration = Duration::from_secs(30);
/// Grace period for the response to the final spectrum frame.
const LAST_FRAME_GRACE: Duration = Duration::from_millis(500);

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut cli = Cli::parse();

    let config_path = cli.config.clone().or_else(config::discover_config);
    if let Some(ref path) = config_path {
        match config::load_config(path) {
            Ok(cfg) => {
                log::info!("Loaded config from {}", path.display());
                // Merge: config values apply only when CLI is at its default
                if cli.points == DEFAULT_TARGET_POINTS { cli.points = cfg.analysis.target_points; }
                if cli.bars == DEFAULT_BAR_COUNT { cli.bars = cfg.analysis.bar_count; }
                if cli.window == DEFAULT_WINDOW_SIZE { cli.window = cfg.analysis.window_size; }
                if cli.method == SpectrumMethod::Fft { cli.method = cfg.analysis.method; }
                if cli.fps == 30 { cli.fps = cfg.playback.fps; }
                if cli.play_seconds == 2.0 { cli.play_seconds = cfg.playback.seconds; }
                if !cli.track_playback { cli.track_playback = cfg.playback.track_playback; }
                if cli.width == 64 { cli.width = cfg.render.width; }
                if cli.height == 12 { cli.height = cfg.render.height; }
            }
            Err(err) => log::warn!("{:#}", err),
        }
    }

    let input = cli.input.as_ref().context("Input audio file is required")?;
    if !input.exists() {
        anyhow::bail!("Input file not found: {}", input.display());
    }
    if cli.window == 0 || !cli.window.is_power_of_two() {
        anyhow::bail!("Window size must be a power of two, got {}", cli.window);
    }
    if cli.window > MAX_WINDOW_SIZE {
        anyhow::bail!("Window size {} exceeds the maximum of {}", cli.window, MAX_WINDOW_SIZE);
    }

    log::info!("wavescope - audio waveform and spectrum analysis");
    log::info!("Input: {}", input.display());
    log::info!(
        "Waveform points: {}, bars: {}, window: {} ({:?})",
        cli.points, cli.bars, cli.window, cli.method
    );

    // 1. Decode audio
    let audio = audio::decode::decode_audio(input)?;

    // 2. Waveform: one request per loaded clip
    let mut waveform = WaveformView::mount(cli.points)?;
    waveform.load(&audio)?;
    waveform
        .wait(WAVEFORM_TIMEOUT)
        .context("Waveform analysis did not finish")?;

    println!("Waveform ({} points, {:.2}s)", waveform.points().len(), audio.duration_secs());
    for line in chart::waveform_chart(waveform.points(), cli.width, cli.height) {
        println!("{}", line);
    }

    log_dominant_frequency(&audio, cli.window);

    // 3. Spectrum: per-frame requests during simulated playback
    let settings = SpectrumSettings {
        bar_count: cli.bars,
        window_size: cli.window,
        track_playback: cli.track_playback,
        method: cli.method,
    };
    let spectrum = if cli.play_seconds > 0.0 && cli.fps > 0 {
        simulate_playback(&audio, settings, cli.fps, cli.play_seconds)?
    } else {
        Vec::new()
    };

    if !spectrum.is_empty() {
        println!("Spectrum ({} bars)", spectrum.len());
        for line in chart::spectrum_chart(&spectrum, cli.height) {
            println!("{}", line);
        }
    }

    // 4. Optional full playback-tracking timeline
    let timeline = if cli.timeline {
        Some(analysis::timeline::spectrum_timeline(
            audio.samples(),
            audio.sample_rate as f64,
            cli.fps,
            cli.window,
            cli.bars,
            cli.method,
        ))
    } else {
        None
    };

    if let Some(ref path) = cli.json {
        let report = export::Report {
            source: export::SourceInfo {
                path: input.clone(),
                sample_rate: audio.sample_rate,
                channels: audio.channels,
                samples: audio.samples().len(),
                duration_secs: audio.duration_secs(),
            },
            waveform: waveform.points(),
            spectrum: &spectrum,
            timeline: timeline.as_deref(),
        };
        export::write_report(path, &report)?;
    }

    waveform.unload();
    waveform.terminate();

    log::info!("Done");
    Ok(())
}

fn log_dominant_frequency(audio: &DecodedAudio, window_size: usize) {
    let mut planner = rustfft::FftPlanner::new();
    let magnitudes = analysis::spectrum::fft_magnitudes(&mut planner, audio.samples(), window_size);
    if let Some(bin) = analysis::spectrum::peak_bin(&magnitudes) {
        if magnitudes[bin] > 0.0 {
            let hz = analysis::spectrum::bin_frequency(bin, audio.sample_rate as f64, window_size);
            log::info!("Opening window peaks at bin {} (~{:.0} Hz)", bin, hz);
        }
    }
}

/// Drive the spectrum view at `fps` for up to `seconds` (or the clip length)
/// and return the bars shown on the final frame.
fn simulate_playback(
    audio: &DecodedAudio,
    settings: SpectrumSettings,
    fps: u32,
    seconds: f64,
) -> Result<Vec<FrequencyBar>> {
    let mut view = SpectrumView::mount(settings)?;
    view.load(audio);
    view.play();

    let seconds = seconds.min(audio.duration_secs());
    let total_frames = (seconds * fps as f64).ceil() as usize;
    let frame_time = Duration::from_secs_f64(1.0 / fps as f64);
    log::info!("Simulating playback: {} frames @ {}fps", total_frames, fps);

    let started = Instant::now();
    let mut updates = 0usize;
    for frame in 0..total_frames {
        if !view.is_playing() {
            break;
        }
        let playback_secs = frame as f64 / fps as f64;
        view.tick(playback_secs)?;

        let due = started + frame_time * (frame as u32 + 1);
        if let Some(remaining) = due.checked_duration_since(Instant::now()) {
            std::thread::sleep(remaining);
        }
        if view.poll() {
            updates += 1;
        }
    }

    let deadline = Instant::now() + LAST_FRAME_GRACE;
    while Instant::now() < deadline && !view.is_up_to_date() {
        view.poll();
        std::thread::sleep(Duration::from_millis(5));
    }
    log::info!("Spectrum updated on {} of {} frames", updates, total_frames);

    let bars = view.bars().to_vec();
    view.stop();
    view.unload();
    view.terminate();
    Ok(bars)
}
