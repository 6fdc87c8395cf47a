//! Object filter camera component.
//!
//! `ObjectFilterCamera` looks like any other camera to its host. Queries are
//! forwarded to the wrapped camera, streams run through the filter pipeline, and
//! `do_command` switches the active vision service at runtime.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use serde_json::{Map, Value};

use crate::config::ObjectFilterConfig;
use crate::detect::{DetectorBackend, DetectorRegistry, RegistryError, SharedDetector};
use crate::ingest::{Camera, CameraProperties, NamedImage, PointCloud, Projector, ResponseMetadata};
use crate::overlay::{BoxOverlay, Overlay};
use crate::pipeline::{FilterSettings, FilterStream};

/// Model triplet this component registers under.
pub const MODEL: &str = "felixreichenbach:camera:objectfilter";

/// Command key selecting a vision service by name.
pub const SWITCH_VISION_SERVICE_KEY: &str = "vision-service";

/// Command key listing registered vision services.
pub const LIST_VISION_SERVICES_KEY: &str = "list-vision-services";

// ----------------------------------------------------------------------------
// Dependencies
// ----------------------------------------------------------------------------

/// Resources the host resolved for this component, keyed by name.
#[derive(Default)]
pub struct Dependencies {
    cameras: HashMap<String, Arc<dyn Camera>>,
    vision_services: HashMap<String, SharedDetector>,
}

impl Dependencies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_camera(&mut self, name: &str, camera: Arc<dyn Camera>) -> &mut Self {
        self.cameras.insert(name.to_string(), camera);
        self
    }

    pub fn add_vision_service<B: DetectorBackend + 'static>(
        &mut self,
        name: &str,
        backend: B,
    ) -> &mut Self {
        self.add_shared_vision_service(name, Arc::new(Mutex::new(backend)))
    }

    pub fn add_shared_vision_service(&mut self, name: &str, backend: SharedDetector) -> &mut Self {
        self.vision_services.insert(name.to_string(), backend);
        self
    }

    pub fn camera(&self, name: &str) -> Result<Arc<dyn Camera>> {
        self.cameras
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow!("camera '{}' missing from dependencies", name))
    }

    pub fn vision_service(&self, name: &str) -> Result<SharedDetector> {
        self.vision_services
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow!("vision service '{}' missing from dependencies", name))
    }
}

// ----------------------------------------------------------------------------
// Commands
// ----------------------------------------------------------------------------

/// Out-of-band commands accepted by the component.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    SwitchVisionService(String),
    ListVisionServices,
}

impl Command {
    /// Parse the loosely typed wire form: a map with exactly one command key.
    pub fn from_map(map: &Map<String, Value>) -> Result<Self, CommandError> {
        let mut entries = map.iter();
        let (Some((key, value)), None) = (entries.next(), entries.next()) else {
            return Err(CommandError::Unsupported(map.keys().cloned().collect()));
        };
        match key.as_str() {
            SWITCH_VISION_SERVICE_KEY => match value {
                Value::String(name) => Ok(Command::SwitchVisionService(name.clone())),
                other => Err(CommandError::InvalidArgument {
                    key: key.clone(),
                    reason: format!("expected a vision service name, got {}", other),
                }),
            },
            LIST_VISION_SERVICES_KEY => Ok(Command::ListVisionServices),
            _ => Err(CommandError::Unsupported(vec![key.clone()])),
        }
    }
}

/// Successful command outcomes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandResponse {
    Switched { name: String },
    VisionServices { active: String, available: Vec<String> },
}

impl CommandResponse {
    /// Human-readable confirmation.
    pub fn message(&self) -> String {
        match self {
            CommandResponse::Switched { name } => format!("Vision service changed to: {}", name),
            CommandResponse::VisionServices { active, available } => format!(
                "Active vision service: {} (available: {})",
                active,
                available.join(", ")
            ),
        }
    }

    /// Wire form: `{"result": <message>}` plus structured fields for listings.
    pub fn into_map(self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("result".to_string(), Value::String(self.message()));
        if let CommandResponse::VisionServices { active, available } = self {
            map.insert("active".to_string(), Value::String(active));
            map.insert(
                "available".to_string(),
                Value::Array(available.into_iter().map(Value::String).collect()),
            );
        }
        map
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandError {
    /// No recognised command key (the offending keys are listed).
    Unsupported(Vec<String>),
    InvalidArgument { key: String, reason: String },
    /// The switch was rejected; the active vision service is unchanged.
    Switch(RegistryError),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Unsupported(keys) if keys.is_empty() => {
                write!(f, "unsupported command: empty command")
            }
            CommandError::Unsupported(keys) => {
                write!(f, "unsupported command: {}", keys.join(", "))
            }
            CommandError::InvalidArgument { key, reason } => {
                write!(f, "invalid argument for '{}': {}", key, reason)
            }
            CommandError::Switch(err) => write!(f, "vision service could not be changed: {}", err),
        }
    }
}

impl std::error::Error for CommandError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CommandError::Switch(err) => Some(err),
            _ => None,
        }
    }
}

/// Operations this component never supports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CameraError {
    Unimplemented(&'static str),
}

impl fmt::Display for CameraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraError::Unimplemented(op) => write!(f, "{} is unimplemented", op),
        }
    }
}

impl std::error::Error for CameraError {}

// ----------------------------------------------------------------------------
// ObjectFilterCamera
// ----------------------------------------------------------------------------

/// Camera that filters and annotates another camera's frames.
pub struct ObjectFilterCamera {
    name: String,
    camera: Arc<dyn Camera>,
    registry: Arc<DetectorRegistry>,
    settings: Arc<FilterSettings>,
    overlay: Arc<dyn Overlay>,
}

impl ObjectFilterCamera {
    /// Build the component from validated config and resolved dependencies.
    ///
    /// Vision services are registered in configuration order; the first starts active.
    pub fn new(name: &str, config: &ObjectFilterConfig, deps: &Dependencies) -> Result<Self> {
        config.validate(name)?;

        let camera = deps.camera(&config.camera)?;

        let mut builder = DetectorRegistry::builder();
        for service in &config.vision_services {
            log::info!("{}: registering vision service {}", name, service);
            builder.register_shared(service, deps.vision_service(service)?)?;
        }
        let registry = builder.build()?;
        log::info!(
            "{}: {} vision services registered, active={}",
            name,
            registry.len(),
            registry.active_name()
        );

        Ok(Self {
            name: name.to_string(),
            camera,
            registry: Arc::new(registry),
            settings: Arc::new(FilterSettings::from_config(config)),
            overlay: Arc::new(BoxOverlay::default()),
        })
    }

    /// Replace the overlay renderer.
    pub fn with_overlay(mut self, overlay: Arc<dyn Overlay>) -> Self {
        self.overlay = overlay;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn registry(&self) -> &Arc<DetectorRegistry> {
        &self.registry
    }

    pub fn settings(&self) -> &FilterSettings {
        &self.settings
    }

    /// Unfiltered images from the source camera.
    pub fn images(&self) -> Result<(Vec<NamedImage>, ResponseMetadata)> {
        self.camera.images()
    }

    /// Source camera properties; point clouds are never supported here.
    pub fn properties(&self) -> Result<CameraProperties> {
        let mut props = self.camera.properties()?;
        props.supports_pcd = false;
        Ok(props)
    }

    pub fn projector(&self) -> Result<Projector> {
        self.camera.projector()
    }

    pub fn next_point_cloud(&self) -> Result<PointCloud, CameraError> {
        Err(CameraError::Unimplemented("next_point_cloud"))
    }

    /// Open a filtered stream over the source camera.
    pub fn stream(&self) -> Result<FilterStream> {
        let upstream = self.camera.stream()?;
        Ok(FilterStream::new(
            upstream,
            self.registry.clone(),
            self.settings.clone(),
            self.overlay.clone(),
        ))
    }

    pub fn do_command(&self, command: Command) -> Result<CommandResponse, CommandError> {
        match command {
            Command::SwitchVisionService(name) => {
                self.registry
                    .set_active(&name)
                    .map_err(CommandError::Switch)?;
                Ok(CommandResponse::Switched { name })
            }
            Command::ListVisionServices => Ok(CommandResponse::VisionServices {
                active: self.registry.active_name(),
                available: self.registry.names(),
            }),
        }
    }

    /// Loosely typed command entry point used by remote callers.
    pub fn do_command_map(
        &self,
        command: &Map<String, Value>,
    ) -> Result<Map<String, Value>, CommandError> {
        let command = Command::from_map(command)?;
        self.do_command(command).map(CommandResponse::into_map)
    }
}
