//! Per-frame filter pipeline.
//!
//! `FilterStream::next` runs one frame through:
//! 1. pull from the upstream stream
//! 2. snapshot the active detector
//! 3. detect
//! 4. filter by label and confidence
//! 5. capture suppression (background capture with nothing accepted)
//! 6. overlay accepted boxes when display is enabled
//! 7. otherwise pass the raw frame through
//!
//! The detector snapshot taken in step 2 is used for the whole call, so a
//! concurrent detector switch only affects later frames. Once a frame has been
//! acquired its `ReleaseHandle` is returned on every path, including errors.

use std::fmt;
use std::sync::Arc;

use crate::config::ObjectFilterConfig;
use crate::detect::{Detection, DetectorRegistry, LabelFilter};
use crate::frame::{Frame, FramePurpose, ReleaseHandle};
use crate::ingest::VideoStream;
use crate::overlay::Overlay;

/// Immutable per-pipeline filter and output policy.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FilterSettings {
    pub filter: LabelFilter,
    /// Draw accepted detections onto emitted frames.
    pub display_boxes: bool,
    /// Tell background capture to skip frames with no accepted detections.
    pub suppress_empty_captures: bool,
}

impl FilterSettings {
    pub fn from_config(config: &ObjectFilterConfig) -> Self {
        Self {
            filter: LabelFilter::new(config.labels.iter().cloned(), config.confidence),
            display_boxes: config.display_boxes,
            suppress_empty_captures: config.filter_data,
        }
    }
}

/// A frame that made it through the pipeline.
#[derive(Debug)]
pub struct FilteredFrame {
    /// Annotated or raw frame; the caller owns its release.
    pub frame: Frame,
    pub accepted: Vec<Detection>,
    pub annotated: bool,
    /// Name of the detector snapshot used for this frame.
    pub detector: String,
}

/// Successful outcome of one pipeline step.
#[derive(Debug)]
pub enum StreamItem {
    Frame(FilteredFrame),
    /// Background capture only: nothing worth storing. Not an error; skip the
    /// frame without retrying. The upstream frame still has to be released.
    NoCaptureToStore(ReleaseHandle),
}

impl StreamItem {
    pub fn into_frame(self) -> Option<FilteredFrame> {
        match self {
            StreamItem::Frame(frame) => Some(frame),
            StreamItem::NoCaptureToStore(_) => None,
        }
    }
}

/// Pipeline failures.
///
/// Failures after a frame was acquired hand its release obligation back.
#[derive(Debug)]
pub enum StreamError {
    /// The upstream source failed; no frame was acquired.
    Source(anyhow::Error),
    /// The active detector failed.
    Detection {
        detector: String,
        source: anyhow::Error,
        release: ReleaseHandle,
    },
    /// Rendering accepted boxes failed.
    Overlay {
        source: anyhow::Error,
        release: ReleaseHandle,
    },
}

impl StreamError {
    /// Take the release obligation, if a frame had been acquired.
    pub fn into_release(self) -> Option<ReleaseHandle> {
        match self {
            StreamError::Source(_) => None,
            StreamError::Detection { release, .. } | StreamError::Overlay { release, .. } => {
                Some(release)
            }
        }
    }

    /// Release the acquired frame (if any) and return the underlying error.
    pub fn release_frame(self) -> anyhow::Error {
        match self {
            StreamError::Source(err) => err,
            StreamError::Detection {
                source, release, ..
            } => {
                release.release();
                source
            }
            StreamError::Overlay { source, release } => {
                release.release();
                source.context("could not overlay bounding boxes")
            }
        }
    }
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::Source(err) => write!(f, "{}", err),
            StreamError::Detection { source, .. } => write!(f, "{}", source),
            StreamError::Overlay { source, .. } => {
                write!(f, "could not overlay bounding boxes: {}", source)
            }
        }
    }
}

impl std::error::Error for StreamError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StreamError::Source(err) | StreamError::Detection { source: err, .. } => err.source(),
            StreamError::Overlay { source, .. } => {
                let inner: &(dyn std::error::Error + 'static) = &**source;
                Some(inner)
            }
        }
    }
}

/// Counters for one stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub frames_processed: u64,
    pub detections_accepted: u64,
    pub frames_annotated: u64,
    pub captures_suppressed: u64,
    pub failures: u64,
}

/// Stream wrapper that filters and annotates every upstream frame.
pub struct FilterStream {
    upstream: Box<dyn VideoStream>,
    registry: Arc<DetectorRegistry>,
    settings: Arc<FilterSettings>,
    overlay: Arc<dyn Overlay>,
    stats: FrameStats,
}

impl FilterStream {
    pub fn new(
        upstream: Box<dyn VideoStream>,
        registry: Arc<DetectorRegistry>,
        settings: Arc<FilterSettings>,
        overlay: Arc<dyn Overlay>,
    ) -> Self {
        Self {
            upstream,
            registry,
            settings,
            overlay,
            stats: FrameStats::default(),
        }
    }

    /// Process the next frame for `purpose`.
    pub fn next(&mut self, purpose: FramePurpose) -> Result<StreamItem, StreamError> {
        let result = self.process(purpose);
        if result.is_err() {
            self.stats.failures += 1;
        }
        result
    }

    fn process(&mut self, purpose: FramePurpose) -> Result<StreamItem, StreamError> {
        let frame = self.upstream.next_frame().map_err(StreamError::Source)?;
        let (image, release) = frame.into_parts();

        let detector = self.registry.active();
        let detections = match detector.detect(&image) {
            Ok(detections) => detections,
            Err(source) => {
                log::debug!("vision service {} failed: {:#}", detector.name(), source);
                return Err(StreamError::Detection {
                    detector: detector.name().to_string(),
                    source,
                    release,
                });
            }
        };

        let accepted = self.settings.filter.apply(&detections);
        self.stats.frames_processed += 1;
        self.stats.detections_accepted += accepted.len() as u64;
        log::debug!(
            "frame {}: vision service {} returned {} detections, {} accepted",
            self.stats.frames_processed,
            detector.name(),
            detections.len(),
            accepted.len()
        );

        if purpose.is_capture() && accepted.is_empty() && self.settings.suppress_empty_captures {
            self.stats.captures_suppressed += 1;
            return Ok(StreamItem::NoCaptureToStore(release));
        }

        if !accepted.is_empty() && self.settings.display_boxes {
            let rendered = match self.overlay.render(&image, &accepted) {
                Ok(rendered) => rendered,
                Err(source) => return Err(StreamError::Overlay { source, release }),
            };
            self.stats.frames_annotated += 1;
            return Ok(StreamItem::Frame(FilteredFrame {
                frame: Frame::new(rendered, release),
                accepted,
                annotated: true,
                detector: detector.name().to_string(),
            }));
        }

        Ok(StreamItem::Frame(FilteredFrame {
            frame: Frame::new(image, release),
            accepted,
            annotated: false,
            detector: detector.name().to_string(),
        }))
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    pub fn registry(&self) -> &Arc<DetectorRegistry> {
        &self.registry
    }

    /// Close the upstream stream.
    pub fn close(&mut self) -> anyhow::Result<()> {
        self.upstream.close()
    }
}
