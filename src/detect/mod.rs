mod backend;
pub mod backends;
mod filter;
mod registry;
mod result;

pub use backend::DetectorBackend;
pub use backends::{MotionBackend, ScriptStep, ScriptedBackend};
pub use filter::{filter_detections, LabelFilter};
pub use registry::{ActiveDetector, DetectorRegistry, RegistryBuilder, RegistryError, SharedDetector};
pub use result::{BoundingBox, Detection};
