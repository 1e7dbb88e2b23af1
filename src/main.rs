use std::{
    thread,
    time::{Duration, Instant},
};

use overlay_tracker::{
    DetectorError, DisplaySurface, Frame, LabelMap, Pipeline, PipelineConfig, RawDetection,
    layout_overlay,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const FRAME_WIDTH: u32 = 1280;
const FRAME_HEIGHT: u32 = 720;

/// Stand-in for a remote detector: one object sliding across the frame with
/// some jitter, a round trip of ~100 ms and the odd dropped request.
fn fake_detector() -> impl FnMut(&Frame) -> Result<Vec<RawDetection>, DetectorError> + Send + 'static {
    let mut calls = 0u32;
    move |frame: &Frame| {
        calls += 1;
        thread::sleep(Duration::from_millis(100));
        if calls % 7 == 0 {
            return Err(DetectorError::Transport("connection reset".to_string()));
        }

        let t = calls as f64;
        let x = (t * 25.0) % (frame.width as f64 - 200.0) + (t * 1.7).sin() * 6.0;
        let y = 260.0 + (t * 2.3).cos() * 6.0;
        Ok(vec![RawDetection {
            class_name: Some("hand".to_string()),
            ..RawDetection::new(x, y, x + 180.0, y + 200.0, 0.85, 0.0)
        }])
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => match PipelineConfig::load(&path) {
            Ok(config) => config,
            Err(e) => {
                error!("could not load {path}: {e}");
                return;
            }
        },
        None => PipelineConfig::default(),
    };

    let mut pipeline = match Pipeline::new(config, fake_detector()) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            error!("{e}");
            return;
        }
    };
    let surface = DisplaySurface::new(960.0, 600.0, 2.0);
    let labels = LabelMap::default();

    pipeline.start();
    let started = Instant::now();
    let mut frames = 0u64;
    while started.elapsed() < Duration::from_secs(3) {
        let now = Instant::now();
        if let Err(e) = pipeline.poll_detection(now, || {
            Some(Frame {
                width: FRAME_WIDTH,
                height: FRAME_HEIGHT,
                pixels: Vec::new(),
            })
        }) {
            error!("{e}");
            break;
        }

        let tracks = pipeline.tick(now);
        frames += 1;
        if frames % 30 == 0 {
            let overlay = layout_overlay(
                &tracks,
                &labels,
                FRAME_WIDTH as f64,
                FRAME_HEIGHT as f64,
                &surface,
                |text, font_px| text.chars().count() as f64 * font_px * 0.6,
            );
            for item in overlay.iter().flat_map(|frame| frame.items.iter()) {
                info!(
                    id = item.id,
                    x = item.rect.x,
                    y = item.rect.y,
                    color = %item.color,
                    "{}",
                    item.text
                );
            }
            let stats = pipeline.stats();
            info!(
                detector_fps = stats.detector_fps,
                render_fps = stats.render_fps,
                tracks = stats.tracks,
                "stats"
            );
        }

        thread::sleep(Duration::from_millis(16));
    }

    pipeline.shutdown();
}
