//! Object Filter Camera
//!
//! A camera component that wraps another camera and runs object detection on
//! every streamed frame.
//!
//! # Architecture
//!
//! Each frame flows through the same steps:
//!
//! 1. **Pull**: the next frame comes from the wrapped camera with a release obligation.
//! 2. **Detect**: the active vision service is snapshotted once and run on the frame.
//! 3. **Filter**: only configured labels at or above the confidence threshold survive.
//! 4. **Suppress**: background capture is told to skip frames with nothing accepted.
//! 5. **Overlay**: accepted boxes are drawn when display is enabled.
//!
//! The active vision service can be switched at any time through `do_command`;
//! frames already past step 2 finish on the service they started with.
//!
//! # Module Structure
//!
//! - `frame`: Frames, release handles, request purpose
//! - `ingest`: Upstream camera interface and the synthetic `stub://` camera
//! - `detect`: Detections, backends, the filter and the registry
//! - `overlay`: Bounding-box rendering
//! - `pipeline`: `FilterStream`, the per-frame pipeline
//! - `camera`: `ObjectFilterCamera`, the component facade and its commands
//! - `config`: Component configuration

pub mod camera;
pub mod config;
pub mod detect;
pub mod frame;
pub mod ingest;
pub mod overlay;
pub mod pipeline;

pub use camera::{
    CameraError, Command, CommandError, CommandResponse, Dependencies, ObjectFilterCamera, MODEL,
};
pub use config::ObjectFilterConfig;
pub use detect::{
    filter_detections, ActiveDetector, BoundingBox, Detection, DetectorBackend, DetectorRegistry,
    LabelFilter, MotionBackend, RegistryError, ScriptStep, ScriptedBackend,
};
pub use frame::{Frame, FramePurpose, ReleaseHandle};
pub use ingest::{Camera, SyntheticCamera, SyntheticConfig, VideoStream};
pub use overlay::{BoxOverlay, Overlay};
pub use pipeline::{FilterSettings, FilterStream, FilteredFrame, FrameStats, StreamError, StreamItem};
