//! Background worker that runs analysis requests off the caller's thread.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rustfft::FftPlanner;

use super::amplitude::downsample_amplitude;
use super::error::AnalysisError;
use super::spectrum::{compute_frequency_bars_with, SpectrumMethod, MAX_WINDOW_SIZE};
use super::types::{AnalysisRequest, AnalysisResponse, AnalysisResult, RequestId};

/// Message as it travels to the worker thread.
enum Envelope {
    Typed(RequestId, AnalysisRequest),
    /// Wire-form JSON, decoded inside the worker.
    #[allow(dead_code)]
    Raw(RequestId, String),
}

/// Handle to a single analysis worker thread.
///
/// Requests are served one at a time in the order they were posted, and each
/// produces exactly one [`AnalysisResponse`]. Errors are reported as responses
/// and never stop the worker.
pub struct AnalysisWorker {
    name: String,
    next_id: RequestId,
    request_tx: Option<Sender<Envelope>>,
    response_rx: Receiver<AnalysisResponse>,
    handle: Option<JoinHandle<()>>,
}

impl AnalysisWorker {
    pub fn spawn(name: &str) -> std::io::Result<Self> {
        Self::spawn_with_method(name, SpectrumMethod::default())
    }

    pub fn spawn_with_method(name: &str, method: SpectrumMethod) -> std::io::Result<Self> {
        let (request_tx, request_rx) = mpsc::channel::<Envelope>();
        let (response_tx, response_rx) = mpsc::channel::<AnalysisResponse>();

        let handle = thread::Builder::new()
            .name(format!("analysis-{}", name))
            .spawn(move || run(request_rx, response_tx, method))?;

        log::debug!("Analysis worker '{}' started ({:?})", name, method);

        Ok(Self {
            name: name.to_string(),
            next_id: 1,
            request_tx: Some(request_tx),
            response_rx,
            handle: Some(handle),
        })
    }

    /// Queue a request. Never blocks on the computation.
    pub fn post(&mut self, request: AnalysisRequest) -> Result<RequestId, AnalysisError> {
        let id = self.issue_id();
        self.send(Envelope::Typed(id, request))?;
        Ok(id)
    }

    /// Queue a JSON-encoded request, e.g. one received from outside the process.
    #[allow(dead_code)]
    pub fn post_raw(&mut self, message: impl Into<String>) -> Result<RequestId, AnalysisError> {
        let id = self.issue_id();
        self.send(Envelope::Raw(id, message.into()))?;
        Ok(id)
    }

    pub fn try_recv(&self) -> Option<AnalysisResponse> {
        match self.response_rx.try_recv() {
            Ok(response) => Some(response),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<AnalysisResponse, AnalysisError> {
        match self.response_rx.recv_timeout(timeout) {
            Ok(response) => Ok(response),
            Err(RecvTimeoutError::Timeout) => Err(AnalysisError::Timeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(AnalysisError::WorkerGone),
        }
    }

    /// Drain every response received so far, oldest first.
    pub fn drain(&self) -> Vec<AnalysisResponse> {
        self.response_rx.try_iter().collect()
    }

    /// Stop accepting requests and wait for the worker thread to exit.
    pub fn terminate(mut self) {
        self.shutdown();
    }

    fn issue_id(&mut self) -> RequestId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn send(&self, envelope: Envelope) -> Result<(), AnalysisError> {
        let tx = self.request_tx.as_ref().ok_or(AnalysisError::WorkerGone)?;
        tx.send(envelope).map_err(|_| AnalysisError::WorkerGone)
    }

    fn shutdown(&mut self) {
        // Closing the request channel ends the worker loop.
        drop(self.request_tx.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("Analysis worker '{}' panicked", self.name);
            } else {
                log::debug!("Analysis worker '{}' stopped", self.name);
            }
        }
    }
}

impl Drop for AnalysisWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(requests: Receiver<Envelope>, responses: Sender<AnalysisResponse>, method: SpectrumMethod) {
    // One planner for the worker's lifetime so FFT plans are cached across requests.
    let mut planner = FftPlanner::new();

    for envelope in requests {
        let (id, outcome) = match envelope {
            Envelope::Typed(id, request) => (id, guarded(&mut planner, request, method)),
            Envelope::Raw(id, message) => (
                id,
                decode(&message).and_then(|r| guarded(&mut planner, r, method)),
            ),
        };

        match outcome {
            Ok(ref result) => log::trace!("Request {} produced {} {} items", id, result.len(), result.kind()),
            Err(ref err) => log::warn!("Analysis request {} failed: {}", id, err),
        }

        if responses.send(AnalysisResponse { id, outcome }).is_err() {
            // Caller dropped its receiver; nothing left to report to.
            break;
        }
    }
}

fn decode(message: &str) -> Result<AnalysisRequest, AnalysisError> {
    serde_json::from_str(message).map_err(|e| AnalysisError::Malformed(e.to_string()))
}

/// [`dispatch`], with a panic reported as an error response instead of ending the loop.
fn guarded(
    planner: &mut FftPlanner<f32>,
    request: AnalysisRequest,
    method: SpectrumMethod,
) -> Result<AnalysisResult, AnalysisError> {
    panic::catch_unwind(AssertUnwindSafe(|| dispatch(planner, request, method)))
        .unwrap_or_else(|payload| Err(AnalysisError::Panicked(panic_message(payload.as_ref()))))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Run one request to completion on the current thread.
pub fn dispatch(
    planner: &mut FftPlanner<f32>,
    request: AnalysisRequest,
    method: SpectrumMethod,
) -> Result<AnalysisResult, AnalysisError> {
    log::trace!("Dispatching {} request", request.kind());
    match request {
        AnalysisRequest::Amplitude {
            samples,
            sample_rate,
            target_point_count,
        } => {
            check_sample_rate(sample_rate)?;
            Ok(AnalysisResult::Amplitude(downsample_amplitude(
                &samples,
                sample_rate,
                target_point_count,
            )))
        }
        AnalysisRequest::Frequency {
            samples,
            sample_rate,
            bar_count,
            window_size,
        } => {
            check_sample_rate(sample_rate)?;
            if window_size > MAX_WINDOW_SIZE {
                return Err(AnalysisError::WindowTooLarge(window_size, MAX_WINDOW_SIZE));
            }
            if window_size > 0 && !window_size.is_power_of_two() {
                log::warn!("Window size {} is not a power of two", window_size);
            }
            Ok(AnalysisResult::Frequency(compute_frequency_bars_with(
                planner,
                &samples,
                window_size,
                bar_count,
                method,
            )))
        }
    }
}

fn check_sample_rate(sample_rate: f64) -> Result<(), AnalysisError> {
    if sample_rate.is_finite() && sample_rate > 0.0 {
        Ok(())
    } else {
        Err(AnalysisError::InvalidSampleRate(sample_rate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WAIT: Duration = Duration::from_secs(5);

    fn sine(freq: f32, sample_rate: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate).sin())
            .collect()
    }

    fn frequency(samples: Vec<f32>) -> AnalysisRequest {
        AnalysisRequest::Frequency {
            samples,
            sample_rate: 44_100.0,
            bar_count: 32,
            window_size: 256,
        }
    }

    #[test]
    fn amplitude_round_trip() {
        let mut worker = AnalysisWorker::spawn("test").unwrap();
        let id = worker
            .post(AnalysisRequest::Amplitude {
                samples: vec![0.0; 44_100],
                sample_rate: 44_100.0,
                target_point_count: 200,
            })
            .unwrap();

        let response = worker.recv_timeout(WAIT).unwrap();
        assert_eq!(response.id, id);
        match response.outcome.unwrap() {
            AnalysisResult::Amplitude(points) => assert!(points.len() <= 201),
            other => panic!("unexpected result {:?}", other.kind()),
        }
        worker.terminate();
    }

    #[test]
    fn back_to_back_requests_are_independent() {
        let mut worker = AnalysisWorker::spawn("test").unwrap();
        let tone = sine(1_000.0, 44_100.0, 256);
        let silence = vec![0.0f32; 256];

        let first = worker.post(frequency(tone.clone())).unwrap();
        let second = worker.post(frequency(silence)).unwrap();
        assert!(second > first);

        let a = worker.recv_timeout(WAIT).unwrap();
        let b = worker.recv_timeout(WAIT).unwrap();
        assert_eq!(a.id, first);
        assert_eq!(b.id, second);

        let expected = crate::analysis::spectrum::compute_frequency_bars(&tone, 256, 32);
        assert_eq!(a.outcome.unwrap(), AnalysisResult::Frequency(expected));
        match b.outcome.unwrap() {
            AnalysisResult::Frequency(bars) => assert!(bars.iter().all(|b| b.level == 0.0)),
            other => panic!("unexpected result {:?}", other.kind()),
        }
    }

    #[test]
    fn malformed_message_does_not_kill_worker() {
        let mut worker = AnalysisWorker::spawn("test").unwrap();

        let bad = worker.post_raw(r#"{"kind":"amplitude","targetPointCount":10}"#).unwrap();
        let response = worker.recv_timeout(WAIT).unwrap();
        assert_eq!(response.id, bad);
        assert!(matches!(response.outcome, Err(AnalysisError::Malformed(_))));

        let garbage = worker.post_raw("not json").unwrap();
        let response = worker.recv_timeout(WAIT).unwrap();
        assert_eq!(response.id, garbage);
        assert!(response.outcome.is_err());

        let good = worker
            .post_raw(r#"{"kind":"amplitude","samples":[0.0,0.5,1.0],"sampleRate":3.0,"targetPointCount":2}"#)
            .unwrap();
        let response = worker.recv_timeout(WAIT).unwrap();
        assert_eq!(response.id, good);
        assert_eq!(response.outcome.unwrap().len(), 3);
    }

    #[test]
    fn invalid_sample_rate_is_reported() {
        let mut worker = AnalysisWorker::spawn("test").unwrap();
        worker
            .post(AnalysisRequest::Amplitude {
                samples: vec![0.1, 0.2],
                sample_rate: 0.0,
                target_point_count: 10,
            })
            .unwrap();
        let response = worker.recv_timeout(WAIT).unwrap();
        assert_eq!(response.outcome, Err(AnalysisError::InvalidSampleRate(0.0)));

        worker.post(frequency(vec![0.0; 8])).unwrap();
        assert!(worker.recv_timeout(WAIT).unwrap().outcome.is_ok());
    }

    #[test]
    fn raw_frequency_request_uses_wire_names() {
        let mut worker = AnalysisWorker::spawn("test").unwrap();
        worker
            .post_raw(r#"{"kind":"frequency","samples":[],"sampleRate":8000,"barCount":4,"windowSize":16}"#)
            .unwrap();
        match worker.recv_timeout(WAIT).unwrap().outcome.unwrap() {
            AnalysisResult::Frequency(bars) => {
                assert_eq!(bars.len(), 4);
                assert_eq!(bars[3].band_label, "4");
            }
            other => panic!("unexpected result {:?}", other.kind()),
        }
    }

    #[test]
    fn oversized_window_is_rejected_and_worker_survives() {
        let mut worker = AnalysisWorker::spawn("test").unwrap();
        let huge = worker
            .post_raw(
                r#"{"kind":"frequency","samples":[0.5],"sampleRate":44100,"barCount":32,"windowSize":18446744073709551615}"#,
            )
            .unwrap();
        let response = worker.recv_timeout(WAIT).unwrap();
        assert_eq!(response.id, huge);
        assert!(matches!(response.outcome, Err(AnalysisError::WindowTooLarge(_, MAX_WINDOW_SIZE))));

        let over = worker
            .post(AnalysisRequest::Frequency {
                samples: vec![0.5; 4],
                sample_rate: 44_100.0,
                bar_count: 8,
                window_size: MAX_WINDOW_SIZE + 1,
            })
            .unwrap();
        let response = worker.recv_timeout(WAIT).unwrap();
        assert_eq!(response.id, over);
        assert!(response.outcome.is_err());

        let good = worker.post(frequency(sine(1_000.0, 44_100.0, 256))).unwrap();
        let response = worker.recv_timeout(WAIT).unwrap();
        assert_eq!(response.id, good);
        assert_eq!(response.outcome.unwrap().len(), 32);
    }

    #[test]
    fn negative_counts_give_empty_results() {
        let mut worker = AnalysisWorker::spawn("test").unwrap();
        for message in [
            r#"{"kind":"frequency","samples":[0.5,0.25],"sampleRate":8000,"barCount":-1,"windowSize":16}"#,
            r#"{"kind":"frequency","samples":[0.5,0.25],"sampleRate":8000,"barCount":4,"windowSize":-16}"#,
            r#"{"kind":"amplitude","samples":[0.5,0.25],"sampleRate":8000,"targetPointCount":-2}"#,
        ] {
            let id = worker.post_raw(message).unwrap();
            let response = worker.recv_timeout(WAIT).unwrap();
            assert_eq!(response.id, id);
            assert!(response.outcome.unwrap().is_empty(), "{message}");
        }
    }

    #[test]
    fn shared_planner_gives_repeatable_bars() {
        let mut planner = FftPlanner::new();
        let tone = sine(2_000.0, 44_100.0, 512);

        let first = dispatch(&mut planner, frequency(tone.clone()), SpectrumMethod::Fft).unwrap();
        let second = dispatch(&mut planner, frequency(tone.clone()), SpectrumMethod::Fft).unwrap();
        assert_eq!(first, second);

        let fresh = crate::analysis::spectrum::compute_frequency_bars(&tone, 256, 32);
        assert_eq!(first, AnalysisResult::Frequency(fresh));
    }

    #[test]
    fn panic_payload_is_reported_as_text() {
        let payload = panic::catch_unwind(|| panic!("window {} too big", 8)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "window 8 too big");

        let payload = panic::catch_unwind(|| std::panic::panic_any(42u8)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");

        let mut planner = FftPlanner::new();
        let outcome = guarded(&mut planner, frequency(vec![0.0; 8]), SpectrumMethod::Fft);
        assert!(outcome.unwrap().len() == 32);
    }

    #[test]
    fn terminate_with_requests_in_flight() {
        let mut worker = AnalysisWorker::spawn("busy").unwrap();
        for _ in 0..4 {
            worker.post(frequency(vec![0.25; 256])).unwrap();
        }
        // Unanswered responses are simply dropped with the handle.
        worker.terminate();
    }
}
