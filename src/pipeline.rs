//! Glue between the two timing domains.
//!
//! A worker thread owns the [`Detector`] and answers one request at a time.
//! The thread that drives [`Pipeline::tick`] owns the [`TrackStore`]; the
//! worker never sees it and only hands raw results back over a channel.
//! Every result carries the generation it was requested in, and results from
//! an older generation or arriving while stopped are dropped.

use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, Sender, TryRecvError, bounded, unbounded};
use tracing::{debug, error, info, warn};

use crate::{
    config::PipelineConfig,
    detection::{Detector, Frame, RawDetection, validate_batch},
    error::{DetectorError, PipelineError},
    letterbox::{CoordinateMapper, DisplaySurface},
    track::TrackView,
    track_store::TrackStore,
};

struct Request {
    generation: u64,
    frame: Frame,
}

struct Response {
    generation: u64,
    result: Result<Vec<RawDetection>, DetectorError>,
}

/// What a call to [`Pipeline::poll_detection`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Submitted,
    /// A request is still in flight; this cycle is skipped, not queued.
    Busy,
    /// The pause after the last response has not elapsed yet.
    NotDue,
    /// The capture callback had no frame to offer.
    NoFrame,
    Stopped,
}

/// Events per fixed window, reported once the window closes.
#[derive(Debug, Clone)]
pub struct RateMeter {
    window: Duration,
    window_start: Option<Instant>,
    count: u32,
    rate: u32,
}

impl RateMeter {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            window_start: None,
            count: 0,
            rate: 0,
        }
    }

    pub fn record(&mut self, now: Instant) {
        let start = *self.window_start.get_or_insert(now);
        self.count += 1;
        if now.saturating_duration_since(start) >= self.window {
            self.rate = self.count;
            self.count = 0;
            self.window_start = Some(now);
        }
    }

    pub fn rate(&self) -> u32 {
        self.rate
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.window);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineStats {
    /// Successful detector responses over the last full second.
    pub detector_fps: u32,
    /// Smoothed render tick rate.
    pub render_fps: f64,
    pub tracks: usize,
}

pub struct Pipeline {
    config: PipelineConfig,
    store: TrackStore,
    requests: Option<Sender<Request>>,
    responses: Receiver<Response>,
    worker: Option<JoinHandle<()>>,
    running: bool,
    generation: u64,
    in_flight: bool,
    last_response: Option<Instant>,
    last_tick: Option<Instant>,
    detector_rate: RateMeter,
    render_fps: f64,
}

impl Pipeline {
    /// Validates `config` and spawns the detection worker. The pipeline starts
    /// stopped.
    pub fn new<D: Detector>(config: PipelineConfig, detector: D) -> Result<Self, PipelineError> {
        config.validate()?;

        let (request_tx, request_rx) = bounded::<Request>(1);
        let (response_tx, response_rx) = unbounded::<Response>();

        let worker = thread::Builder::new()
            .name("detector".to_string())
            .spawn(move || run_worker(detector, request_rx, response_tx))?;

        Ok(Self {
            store: TrackStore::new(config.tracker.clone()),
            config,
            requests: Some(request_tx),
            responses: response_rx,
            worker: Some(worker),
            running: false,
            generation: 0,
            in_flight: false,
            last_response: None,
            last_tick: None,
            detector_rate: RateMeter::new(Duration::from_secs(1)),
            render_fps: 0.0,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight
    }

    pub fn start(&mut self) {
        if self.running {
            return;
        }
        info!("pipeline started");
        self.running = true;
        self.generation += 1;
        self.last_response = None;
        self.last_tick = None;
    }

    /// Halts both loops and forgets every track. A request already in flight
    /// is allowed to finish but its result will be discarded.
    pub fn stop(&mut self) {
        if self.running {
            info!("pipeline stopped");
        }
        self.running = false;
        self.generation += 1;
        self.store.clear();
        self.detector_rate.reset();
        self.render_fps = 0.0;
    }

    /// Sends a frame to the detector if one is due. `capture` is only called
    /// when a request will actually be made.
    pub fn poll_detection<F>(&mut self, now: Instant, capture: F) -> Result<PollOutcome, PipelineError>
    where
        F: FnOnce() -> Option<Frame>,
    {
        if !self.running {
            return Ok(PollOutcome::Stopped);
        }
        if self.in_flight {
            return Ok(PollOutcome::Busy);
        }
        if let Some(last) = self.last_response {
            if now.saturating_duration_since(last) < self.config.detect_interval() {
                return Ok(PollOutcome::NotDue);
            }
        }
        let Some(frame) = capture() else {
            return Ok(PollOutcome::NoFrame);
        };

        let requests = self.requests.as_ref().ok_or(PipelineError::WorkerGone)?;
        requests
            .send(Request {
                generation: self.generation,
                frame,
            })
            .map_err(|_| PipelineError::WorkerGone)?;
        self.in_flight = true;

        Ok(PollOutcome::Submitted)
    }

    /// One render tick: apply any finished detection results, advance the
    /// smoothing, drop expired tracks and return what should be drawn.
    pub fn tick(&mut self, now: Instant) -> Vec<TrackView> {
        self.drain_responses(now);

        if !self.running {
            return Vec::new();
        }

        if let Some(last) = self.last_tick {
            let dt = now.saturating_duration_since(last).as_secs_f64();
            if dt > 0.0 {
                let fps = 1.0 / dt;
                self.render_fps = if self.render_fps > 0.0 {
                    self.render_fps * 0.8 + fps * 0.2
                } else {
                    fps
                };
            }
        }
        self.last_tick = Some(now);

        self.store.tick(now);
        self.store.snapshot(now)
    }

    fn drain_responses(&mut self, now: Instant) {
        loop {
            let response = match self.responses.try_recv() {
                Ok(response) => response,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    // Later polls report WorkerGone instead of Busy.
                    if self.requests.take().is_some() {
                        error!("detector worker exited unexpectedly");
                    }
                    self.in_flight = false;
                    break;
                }
            };
            self.in_flight = false;
            self.last_response = Some(now);

            if !self.running || response.generation != self.generation {
                debug!(generation = response.generation, "discarding stale detection result");
                continue;
            }

            match response.result {
                Ok(raw) => {
                    self.detector_rate.record(now);
                    let detections = validate_batch(raw);
                    self.store.apply_detections(&detections, now);
                }
                Err(e) => warn!("detection cycle failed: {e}"),
            }
        }
    }

    pub fn snapshot(&self, now: Instant) -> Vec<TrackView> {
        if !self.running {
            return Vec::new();
        }
        self.store.snapshot(now)
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            detector_fps: self.detector_rate.rate(),
            render_fps: self.render_fps,
            tracks: self.store.len(),
        }
    }

    /// Mapper for the current source extent and display surface.
    pub fn mapper(
        &self,
        source_width: f64,
        source_height: f64,
        surface: &DisplaySurface,
    ) -> Option<CoordinateMapper> {
        CoordinateMapper::new(
            source_width,
            source_height,
            self.config.model_input_size as f64,
            surface,
        )
    }

    /// Stops the pipeline and waits for the worker to exit. Blocks until any
    /// in-flight detection returns.
    pub fn shutdown(&mut self) {
        self.stop();
        self.requests.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("detector worker panicked");
            }
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker<D: Detector>(mut detector: D, requests: Receiver<Request>, responses: Sender<Response>) {
    for request in requests.iter() {
        let result = panic::catch_unwind(AssertUnwindSafe(|| detector.detect(&request.frame)))
            .unwrap_or_else(|payload| Err(DetectorError::Panicked(panic_message(payload.as_ref()))));
        let response = Response {
            generation: request.generation,
            result,
        };
        if responses.send(response).is_err() {
            break;
        }
    }
    debug!("detector worker exiting");
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| message.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
