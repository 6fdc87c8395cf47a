use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use image::RgbImage;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::Detection;

/// One scripted response.
#[derive(Clone, Debug)]
pub enum ScriptStep {
    Detections(Vec<Detection>),
    Fail(String),
}

/// Backend that replays a fixed script of responses, cycling at the end.
///
/// Stands in for a remote vision service in demos and tests.
pub struct ScriptedBackend {
    script: Vec<ScriptStep>,
    cursor: usize,
    calls: Arc<AtomicU64>,
}

impl ScriptedBackend {
    pub fn new(script: Vec<ScriptStep>) -> Self {
        Self {
            script,
            cursor: 0,
            calls: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Return the same detections on every call.
    pub fn repeating(detections: Vec<Detection>) -> Self {
        Self::new(vec![ScriptStep::Detections(detections)])
    }

    /// Cycle through a list of detection sets.
    pub fn cycling(sets: Vec<Vec<Detection>>) -> Self {
        Self::new(sets.into_iter().map(ScriptStep::Detections).collect())
    }

    /// Fail every call with `message`.
    pub fn failing(message: &str) -> Self {
        Self::new(vec![ScriptStep::Fail(message.to_string())])
    }

    /// Shared counter of `detect` calls, readable after the backend is registered.
    pub fn call_counter(&self) -> Arc<AtomicU64> {
        self.calls.clone()
    }
}

impl DetectorBackend for ScriptedBackend {
    fn detect(&mut self, _image: &RgbImage) -> Result<Vec<Detection>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.script.is_empty() {
            return Ok(Vec::new());
        }
        let step = &self.script[self.cursor % self.script.len()];
        self.cursor = self.cursor.wrapping_add(1);
        match step {
            ScriptStep::Detections(dets) => Ok(dets.clone()),
            ScriptStep::Fail(message) => Err(anyhow!("{}", message)),
        }
    }
}
