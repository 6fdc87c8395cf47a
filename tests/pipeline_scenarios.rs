//! End-to-end scenarios for the object filter camera.
//!
//! These tests drive `ObjectFilterCamera` through its public API with a
//! synthetic camera and scripted vision services, and check that:
//! 1. Only configured labels above the threshold are overlaid
//! 2. Background capture is told to skip empty frames, interactive callers never are
//! 3. Every acquired frame is released exactly once on every path
//! 4. Switching vision services only affects frames that have not yet started detection

use std::sync::atomic::Ordering;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use image::RgbImage;

use objectfilter::{
    BoundingBox, Command, Dependencies, Detection, DetectorBackend, FramePurpose,
    ObjectFilterCamera, ObjectFilterConfig, Overlay, ScriptedBackend, StreamItem,
    SyntheticCamera, SyntheticConfig,
};

fn person() -> Detection {
    Detection::new("person", 0.9, BoundingBox::new(4, 4, 30, 30))
}

fn dog() -> Detection {
    Detection::new("dog", 0.99, BoundingBox::new(10, 10, 40, 40))
}

fn config(threshold: f32, display_boxes: bool, filter_data: bool) -> ObjectFilterConfig {
    ObjectFilterConfig {
        camera: "webcam".to_string(),
        vision_services: vec!["modelA".to_string(), "modelB".to_string()],
        labels: vec!["person".to_string()],
        confidence: threshold,
        display_boxes,
        filter_data,
    }
}

fn source() -> Arc<SyntheticCamera> {
    Arc::new(
        SyntheticCamera::new(SyntheticConfig {
            url: "stub://webcam".to_string(),
            width: 64,
            height: 48,
            target_fps: 10,
            scene_period: 1,
        })
        .expect("synthetic camera"),
    )
}

/// Overlay that records how many boxes each call received.
#[derive(Default)]
struct CountingOverlay {
    box_counts: Mutex<Vec<usize>>,
}

impl Overlay for CountingOverlay {
    fn render(&self, image: &RgbImage, detections: &[Detection]) -> Result<RgbImage> {
        self.box_counts.lock().unwrap().push(detections.len());
        Ok(image.clone())
    }
}

struct Harness {
    camera: ObjectFilterCamera,
    source: Arc<SyntheticCamera>,
    overlay: Arc<CountingOverlay>,
}

fn harness(cfg: ObjectFilterConfig, model_a: ScriptedBackend, model_b: ScriptedBackend) -> Harness {
    let source = source();
    let overlay = Arc::new(CountingOverlay::default());
    let mut deps = Dependencies::new();
    deps.add_camera("webcam", source.clone())
        .add_vision_service("modelA", model_a)
        .add_vision_service("modelB", model_b);
    let camera = ObjectFilterCamera::new("objectfilter", &cfg, &deps)
        .expect("construct camera")
        .with_overlay(overlay.clone());
    Harness {
        camera,
        source,
        overlay,
    }
}

#[test]
fn scenario_a_overlays_only_accepted_person() {
    let h = harness(
        config(0.5, true, false),
        ScriptedBackend::repeating(vec![person(), dog()]),
        ScriptedBackend::repeating(Vec::new()),
    );
    let mut stream = h.camera.stream().unwrap();

    let filtered = stream
        .next(FramePurpose::Interactive)
        .unwrap()
        .into_frame()
        .expect("frame");
    assert_eq!(filtered.accepted, vec![person()]);
    assert!(filtered.annotated);
    assert_eq!(*h.overlay.box_counts.lock().unwrap(), vec![1]);

    filtered.frame.release();
    assert_eq!(h.source.stats().frames_released, 1);
}

#[test]
fn scenario_b_high_threshold_returns_raw_frame() {
    let h = harness(
        config(0.95, true, false),
        ScriptedBackend::repeating(vec![person(), dog()]),
        ScriptedBackend::repeating(Vec::new()),
    );
    let (raw_images, _) = h.camera.images().unwrap();
    let mut stream = h.camera.stream().unwrap();

    let filtered = stream
        .next(FramePurpose::Interactive)
        .unwrap()
        .into_frame()
        .expect("frame");
    assert!(filtered.accepted.is_empty());
    assert!(!filtered.annotated);
    assert_eq!(filtered.frame.image(), &raw_images[0].image);
    assert!(h.overlay.box_counts.lock().unwrap().is_empty());
}

#[test]
fn scenario_c_capture_with_nothing_accepted_is_suppressed() {
    let h = harness(
        config(0.95, true, true),
        ScriptedBackend::repeating(vec![person(), dog()]),
        ScriptedBackend::repeating(Vec::new()),
    );
    let mut stream = h.camera.stream().unwrap();

    match stream.next(FramePurpose::Capture) {
        Ok(StreamItem::NoCaptureToStore(release)) => release.release(),
        Ok(StreamItem::Frame(_)) => panic!("capture should have been suppressed"),
        Err(e) => panic!("suppression must not be an error: {}", e),
    }
    assert_eq!(h.source.stats().frames_released, 1);
    assert_eq!(stream.stats().failures, 0);
    assert_eq!(stream.stats().captures_suppressed, 1);
}

#[test]
fn scenario_d_interactive_never_gets_the_sentinel() {
    let h = harness(
        config(0.95, true, true),
        ScriptedBackend::repeating(vec![person(), dog()]),
        ScriptedBackend::repeating(Vec::new()),
    );
    let mut stream = h.camera.stream().unwrap();

    for _ in 0..3 {
        let item = stream.next(FramePurpose::Interactive).unwrap();
        let filtered = item.into_frame().expect("raw frame for interactive callers");
        assert!(!filtered.annotated);
    }
    assert_eq!(stream.stats().captures_suppressed, 0);
}

/// Blocks its first detection until the test lets it proceed.
struct GatedBackend {
    label: &'static str,
    gate: Option<(mpsc::Sender<()>, mpsc::Receiver<()>)>,
}

impl DetectorBackend for GatedBackend {
    fn detect(&mut self, _image: &RgbImage) -> Result<Vec<Detection>> {
        if let Some((entered, proceed)) = self.gate.take() {
            entered.send(()).unwrap();
            proceed.recv().unwrap();
        }
        Ok(vec![Detection::new(
            self.label,
            0.9,
            BoundingBox::new(0, 0, 8, 8),
        )])
    }
}

#[test]
fn scenario_e_switch_affects_only_later_frames() {
    let (entered_tx, entered_rx) = mpsc::channel();
    let (proceed_tx, proceed_rx) = mpsc::channel();

    let source = source();
    let mut deps = Dependencies::new();
    deps.add_camera("webcam", source.clone())
        .add_vision_service(
            "modelA",
            GatedBackend {
                label: "person",
                gate: Some((entered_tx, proceed_rx)),
            },
        )
        .add_vision_service(
            "modelB",
            GatedBackend {
                label: "person",
                gate: None,
            },
        );
    let camera = ObjectFilterCamera::new("objectfilter", &config(0.5, false, false), &deps)
        .expect("construct camera");
    let mut stream = camera.stream().unwrap();

    let in_flight = std::thread::spawn(move || {
        let item = stream.next(FramePurpose::Interactive);
        (stream, item)
    });

    // The first frame is now inside modelA's detection call.
    entered_rx.recv().unwrap();
    let reply = camera
        .do_command(Command::SwitchVisionService("modelB".to_string()))
        .unwrap();
    assert_eq!(reply.message(), "Vision service changed to: modelB");
    proceed_tx.send(()).unwrap();

    let (mut stream, item) = in_flight.join().unwrap();
    let first = item.unwrap().into_frame().unwrap();
    assert_eq!(first.detector, "modelA");

    let second = stream
        .next(FramePurpose::Interactive)
        .unwrap()
        .into_frame()
        .unwrap();
    assert_eq!(second.detector, "modelB");

    drop(first);
    drop(second);
    assert_eq!(source.stats().frames_released, 2);
}

#[test]
fn failed_switch_keeps_current_service() {
    let h = harness(
        config(0.5, true, false),
        ScriptedBackend::repeating(vec![person()]),
        ScriptedBackend::repeating(Vec::new()),
    );
    let mut stream = h.camera.stream().unwrap();

    let mut request = serde_json::Map::new();
    request.insert("vision-service".to_string(), "modelZ".into());
    assert!(h.camera.do_command_map(&request).is_err());

    let filtered = stream
        .next(FramePurpose::Interactive)
        .unwrap()
        .into_frame()
        .unwrap();
    assert_eq!(filtered.detector, "modelA");
}

#[test]
fn every_acquired_frame_is_released_once() {
    let model_a = ScriptedBackend::new(vec![
        objectfilter::ScriptStep::Detections(vec![person()]),
        objectfilter::ScriptStep::Fail("inference timed out".to_string()),
        objectfilter::ScriptStep::Detections(Vec::new()),
    ]);
    let calls = model_a.call_counter();
    let h = harness(
        config(0.5, true, true),
        model_a,
        ScriptedBackend::repeating(Vec::new()),
    );
    let mut stream = h.camera.stream().unwrap();

    for purpose in [
        FramePurpose::Interactive,
        FramePurpose::Interactive,
        FramePurpose::Capture,
        FramePurpose::Interactive,
    ] {
        match stream.next(purpose) {
            Ok(StreamItem::Frame(filtered)) => filtered.frame.release(),
            Ok(StreamItem::NoCaptureToStore(release)) => release.release(),
            Err(e) => {
                e.into_release().expect("detection failure keeps release").release();
            }
        }
    }

    let stats = h.source.stats();
    assert_eq!(stats.frames_captured, 4);
    assert_eq!(stats.frames_released, 4);
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(stream.stats().failures, 1);
    assert_eq!(stream.stats().captures_suppressed, 1);
}
