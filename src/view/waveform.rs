use anyhow::{Context, Result};
use std::time::Duration;

use super::latest::LatestTracker;
use crate::analysis::{
    AmplitudePoint, AnalysisError, AnalysisRequest, AnalysisResult, AnalysisWorker, RequestId,
};
use crate::audio::decode::DecodedAudio;

pub const DEFAULT_TARGET_POINTS: usize = 200;

/// One-shot waveform plot: one amplitude request per loaded clip.
pub struct WaveformView {
    worker: AnalysisWorker,
    target_points: usize,
    tracker: LatestTracker,
    points: Vec<AmplitudePoint>,
}

impl WaveformView {
    /// Mount the view, starting its own worker.
    pub fn mount(target_points: usize) -> Result<Self> {
        let worker = AnalysisWorker::spawn("waveform").context("Failed to start waveform worker")?;
        Ok(Self {
            worker,
            target_points,
            tracker: LatestTracker::default(),
            points: Vec::new(),
        })
    }

    pub fn load(&mut self, audio: &DecodedAudio) -> Result<()> {
        self.points.clear();
        let id = self.worker.post(AnalysisRequest::Amplitude {
            samples: audio.channel_copy(),
            sample_rate: audio.sample_rate as f64,
            target_point_count: self.target_points,
        })?;
        self.tracker.issued(id);
        Ok(())
    }

    pub fn unload(&mut self) {
        self.tracker.reset();
        self.points.clear();
    }

    /// Apply any responses that arrived. Returns true when the plot changed.
    #[allow(dead_code)]
    pub fn poll(&mut self) -> bool {
        let mut changed = false;
        while let Some(response) = self.worker.try_recv() {
            changed |= self.apply(response.id, response.outcome);
        }
        changed
    }

    /// Block until the pending request is answered or `timeout` passes.
    pub fn wait(&mut self, timeout: Duration) -> Result<()> {
        while self.tracker.pending().is_some() {
            let response = self.worker.recv_timeout(timeout)?;
            if self.apply(response.id, response.outcome) {
                break;
            }
        }
        Ok(())
    }

    fn apply(&mut self, id: RequestId, outcome: Result<AnalysisResult, AnalysisError>) -> bool {
        if !self.tracker.accept(id) {
            log::debug!("Dropping stale waveform response {}", id);
            return false;
        }
        self.tracker.reset();
        self.points = match outcome {
            Ok(AnalysisResult::Amplitude(points)) => points,
            Ok(other) => {
                log::warn!("Waveform view got a {} result", other.kind());
                Vec::new()
            }
            Err(_) => Vec::new(),
        };
        true
    }

    pub fn points(&self) -> &[AmplitudePoint] {
        &self.points
    }

    /// Unmount the view, stopping its worker.
    pub fn terminate(self) {
        self.worker.terminate();
    }
}
