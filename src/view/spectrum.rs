use anyhow::{Context, Result};

use super::latest::LatestTracker;
use crate::analysis::spectrum::SpectrumMethod;
use crate::analysis::timeline::window_at;
use crate::analysis::{AnalysisRequest, AnalysisResult, AnalysisWorker, FrequencyBar, RequestId};
use crate::audio::decode::DecodedAudio;

pub const DEFAULT_BAR_COUNT: usize = 32;
pub const DEFAULT_WINDOW_SIZE: usize = 256;

#[derive(Clone, Copy, Debug)]
pub struct SpectrumSettings {
    pub bar_count: usize,
    pub window_size: usize,
    /// Analyse the window at the playback position instead of the clip start.
    pub track_playback: bool,
    pub method: SpectrumMethod,
}

impl Default for SpectrumSettings {
    fn default() -> Self {
        Self {
            bar_count: DEFAULT_BAR_COUNT,
            window_size: DEFAULT_WINDOW_SIZE,
            track_playback: false,
            method: SpectrumMethod::Fft,
        }
    }
}

/// Animated spectrum bars, refreshed once per frame while audio is playing.
pub struct SpectrumView {
    worker: AnalysisWorker,
    settings: SpectrumSettings,
    source: Option<(Vec<f32>, u32)>,
    playing: bool,
    tracker: LatestTracker,
    shown: Option<RequestId>,
    bars: Vec<FrequencyBar>,
}

impl SpectrumView {
    pub fn mount(settings: SpectrumSettings) -> Result<Self> {
        let worker = AnalysisWorker::spawn_with_method("spectrum", settings.method)
            .context("Failed to start spectrum worker")?;
        Ok(Self {
            worker,
            settings,
            source: None,
            playing: false,
            tracker: LatestTracker::default(),
            shown: None,
            bars: Vec::new(),
        })
    }

    pub fn load(&mut self, audio: &DecodedAudio) {
        self.stop();
        self.source = Some((audio.channel_copy(), audio.sample_rate));
    }

    pub fn unload(&mut self) {
        self.stop();
        self.source = None;
    }

    pub fn play(&mut self) {
        self.playing = self.source.is_some();
    }

    pub fn stop(&mut self) {
        self.playing = false;
        self.tracker.reset();
        self.shown = None;
        self.bars.clear();
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Issue the request for one animation frame. Does nothing while stopped.
    pub fn tick(&mut self, playback_secs: f64) -> Result<()> {
        if !self.playing {
            return Ok(());
        }
        let Some((samples, sample_rate)) = self.source.as_ref() else {
            return Ok(());
        };

        let window = if self.settings.track_playback {
            window_at(samples, *sample_rate as f64, playback_secs)
        } else {
            &samples[..]
        };
        // Only the analysed window crosses to the worker.
        let samples = window[..window.len().min(self.settings.window_size)].to_vec();

        let id = self.worker.post(AnalysisRequest::Frequency {
            samples,
            sample_rate: *sample_rate as f64,
            bar_count: self.settings.bar_count,
            window_size: self.settings.window_size,
        })?;
        self.tracker.issued(id);
        Ok(())
    }

    /// Apply the newest response for the latest request. Returns true when the
    /// bars changed.
    pub fn poll(&mut self) -> bool {
        let mut changed = false;
        for response in self.worker.drain() {
            if !self.tracker.accept(response.id) {
                continue;
            }
            self.bars = match response.outcome {
                Ok(AnalysisResult::Frequency(bars)) => bars,
                _ => Vec::new(),
            };
            self.shown = Some(response.id);
            changed = true;
        }
        changed
    }

    /// True once the response to the latest frame request has been applied.
    pub fn is_up_to_date(&self) -> bool {
        self.shown == self.tracker.pending()
    }

    pub fn bars(&self) -> &[FrequencyBar] {
        &self.bars
    }

    pub fn terminate(self) {
        self.worker.terminate();
    }
}
