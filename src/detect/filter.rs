//! Label and confidence filtering.
//!
//! A detection is accepted iff its label is an exact member of the accepted
//! label set AND its score is at least the threshold. Labels are compared
//! byte-for-byte: no case folding, no trimming, no wildcards.
//!
//! An empty accepted label set accepts nothing.

use std::collections::BTreeSet;

use crate::detect::result::Detection;

/// Return the subset of `detections` accepted by `accepted_labels` and `threshold`.
///
/// Pure and deterministic. Accepted detections keep their relative input order.
pub fn filter_detections(
    detections: &[Detection],
    accepted_labels: &BTreeSet<String>,
    threshold: f32,
) -> Vec<Detection> {
    detections
        .iter()
        .filter(|d| accepts(d, accepted_labels, threshold))
        .cloned()
        .collect()
}

fn accepts(detection: &Detection, accepted_labels: &BTreeSet<String>, threshold: f32) -> bool {
    accepted_labels.contains(detection.label()) && detection.score() >= threshold
}

/// Immutable filter configuration for one pipeline instance.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LabelFilter {
    labels: BTreeSet<String>,
    threshold: f32,
}

impl LabelFilter {
    pub fn new<I, S>(labels: I, threshold: f32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            labels: labels.into_iter().map(Into::into).collect(),
            threshold,
        }
    }

    pub fn labels(&self) -> &BTreeSet<String> {
        &self.labels
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn accepts(&self, detection: &Detection) -> bool {
        accepts(detection, &self.labels, self.threshold)
    }

    pub fn apply(&self, detections: &[Detection]) -> Vec<Detection> {
        filter_detections(detections, &self.labels, self.threshold)
    }
}
