//! objectfilter - run the object filter camera over a synthetic source
//!
//! This tool:
//! 1. Loads the component config (or a built-in demo config)
//! 2. Wires a `stub://` camera and demo vision services as dependencies
//! 3. Streams frames through the filter pipeline
//! 4. Optionally switches the active vision service mid-stream
//!
//! With `--features backend-tract`, `--model` backs one vision service with an ONNX classifier.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use objectfilter::{
    BoundingBox, Command, Dependencies, Detection, FramePurpose, MotionBackend,
    ObjectFilterCamera, ObjectFilterConfig, ScriptedBackend, StreamItem, SyntheticCamera,
    SyntheticConfig, MODEL,
};

const DEMO_CAMERA: &str = "demo-camera";

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Component config file (JSON or TOML). Defaults to a built-in demo config.
    #[arg(long, env = "OBJECTFILTER_CONFIG")]
    config: Option<PathBuf>,
    /// Number of frames to process (0 = until interrupted).
    #[arg(long, default_value_t = 50)]
    frames: u64,
    /// Frames per second for the synthetic source.
    #[arg(long, default_value_t = 10)]
    fps: u32,
    /// Synthetic frame width.
    #[arg(long, default_value_t = 320)]
    width: u32,
    /// Synthetic frame height.
    #[arg(long, default_value_t = 240)]
    height: u32,
    /// Request frames as background data capture instead of interactive display.
    #[arg(long)]
    capture: bool,
    /// Switch to this vision service after `--switch-after` frames.
    #[arg(long, requires = "switch_after")]
    switch_to: Option<String>,
    #[arg(long)]
    switch_after: Option<u64>,
    /// ONNX classifier backing one vision service. Frames must match the model input size.
    #[cfg(feature = "backend-tract")]
    #[arg(long)]
    model: Option<PathBuf>,
    /// Class labels for `--model`, in output order (comma-separated).
    #[cfg(feature = "backend-tract")]
    #[arg(long, value_delimiter = ',', requires = "model")]
    model_labels: Vec<String>,
    /// Vision service the model backs. Defaults to the first configured service.
    #[cfg(feature = "backend-tract")]
    #[arg(long, requires = "model")]
    model_service: Option<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if args.fps == 0 {
        return Err(anyhow!("fps must be >= 1"));
    }

    let config = match &args.config {
        Some(path) => ObjectFilterConfig::from_path(path)?,
        None => demo_config(),
    };

    let source = Arc::new(SyntheticCamera::new(SyntheticConfig {
        url: format!("stub://{}", config.camera),
        width: args.width,
        height: args.height,
        target_fps: args.fps,
        scene_period: 5,
    })?);

    #[cfg(feature = "backend-tract")]
    if let (Some(_), Some(name)) = (&args.model, &args.model_service) {
        if !config.vision_services.contains(name) {
            return Err(anyhow!("--model-service {} is not a configured vision service", name));
        }
    }

    let mut deps = Dependencies::new();
    deps.add_camera(&config.camera, source.clone());
    for (idx, service) in config.vision_services.iter().enumerate() {
        #[cfg(feature = "backend-tract")]
        if let Some(backend) = model_backend(&args, &config, service)? {
            deps.add_vision_service(service, backend);
            continue;
        }
        if service.contains("motion") {
            deps.add_vision_service(service, MotionBackend::new());
        } else {
            deps.add_vision_service(service, demo_backend(idx, args.width, args.height));
        }
    }

    let camera = ObjectFilterCamera::new("objectfilter", &config, &deps)?;
    camera.registry().warm_up()?;

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        ctrlc::set_handler(move || {
            running.store(false, Ordering::SeqCst);
        })
        .map_err(|e| anyhow!("failed to install ctrl-c handler: {}", e))?;
    }

    let purpose = if args.capture {
        FramePurpose::Capture
    } else {
        FramePurpose::Interactive
    };
    log::info!(
        "objectfilter ({}) running: camera={} active={} labels={:?} confidence={:.2} purpose={:?}",
        MODEL,
        config.camera,
        camera.registry().active_name(),
        config.labels,
        config.confidence,
        purpose
    );

    let mut stream = camera.stream()?;
    let frame_interval = Duration::from_millis(1000 / args.fps as u64);
    let mut processed = 0u64;

    while running.load(Ordering::SeqCst) && (args.frames == 0 || processed < args.frames) {
        if let (Some(target), Some(after)) = (&args.switch_to, args.switch_after) {
            if processed == after {
                match camera.do_command(Command::SwitchVisionService(target.clone())) {
                    Ok(reply) => log::info!("{}", reply.message()),
                    Err(e) => log::error!("{}", e),
                }
            }
        }

        match stream.next(purpose) {
            Ok(StreamItem::Frame(filtered)) => {
                log::info!(
                    "frame #{}: service={} accepted={} annotated={}",
                    processed + 1,
                    filtered.detector,
                    filtered.accepted.len(),
                    filtered.annotated
                );
                filtered.frame.release();
            }
            Ok(StreamItem::NoCaptureToStore(release)) => {
                log::debug!("frame #{}: nothing to store", processed + 1);
                release.release();
            }
            Err(e) => {
                log::warn!("frame #{} failed: {}", processed + 1, e);
                if let Some(release) = e.into_release() {
                    release.release();
                }
            }
        }
        processed += 1;

        std::thread::sleep(frame_interval);
    }

    stream.close()?;
    let stats = stream.stats();
    let source_stats = source.stats();
    log::info!(
        "done: processed={} accepted={} annotated={} suppressed={} failures={}",
        stats.frames_processed,
        stats.detections_accepted,
        stats.frames_annotated,
        stats.captures_suppressed,
        stats.failures
    );
    log::info!(
        "source {}: captured={} released={}",
        source_stats.url,
        source_stats.frames_captured,
        source_stats.frames_released
    );
    Ok(())
}

#[cfg(feature = "backend-tract")]
fn model_backend(
    args: &Args,
    config: &ObjectFilterConfig,
    service: &str,
) -> Result<Option<objectfilter::detect::backends::TractBackend>> {
    let Some(path) = &args.model else {
        return Ok(None);
    };
    let target = args
        .model_service
        .as_deref()
        .or_else(|| config.vision_services.first().map(String::as_str));
    if target != Some(service) {
        return Ok(None);
    }
    log::info!("vision service {} backed by ONNX model {}", service, path.display());
    let backend = objectfilter::detect::backends::TractBackend::new(
        path,
        args.width,
        args.height,
        args.model_labels.clone(),
    )?;
    Ok(Some(backend))
}

fn demo_config() -> ObjectFilterConfig {
    ObjectFilterConfig {
        camera: DEMO_CAMERA.to_string(),
        vision_services: vec!["people-detector".to_string(), "motion".to_string()],
        labels: vec!["person".to_string(), "motion".to_string()],
        confidence: 0.5,
        display_boxes: true,
        filter_data: true,
    }
}

/// Scripted stand-in for a remote vision service. Scores drift with `seed` so
/// different services disagree.
fn demo_backend(seed: usize, width: u32, height: u32) -> ScriptedBackend {
    let w = width.saturating_sub(1);
    let h = height.saturating_sub(1);
    let offset = 0.1 * seed as f32;
    let person = |score: f32| {
        Detection::new(
            "person",
            (score - offset).clamp(0.0, 1.0),
            BoundingBox::new(w / 4, h / 4, w / 2, h - h / 8),
        )
    };
    let dog = Detection::new("dog", 0.97, BoundingBox::new(w / 2, h / 2, w - w / 8, h - 1));
    ScriptedBackend::cycling(vec![
        vec![person(0.92), dog.clone()],
        vec![dog],
        vec![person(0.55)],
        Vec::new(),
    ])
}
