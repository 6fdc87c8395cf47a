use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;
use std::sync::OnceLock;

const DEFAULT_CONFIDENCE: f32 = 0.0;
const DEFAULT_CONFIG_PATH: &str = "objectfilter";

#[derive(Debug, Deserialize, Default)]
struct ObjectFilterConfigFile {
    camera: Option<String>,
    vision_services: Option<Vec<String>>,
    labels: Option<Vec<String>>,
    confidence: Option<f32>,
    display_boxes: Option<bool>,
    filter_data: Option<bool>,
}

/// Object filter component configuration.
///
/// `labels` defaults to empty, which accepts no detections.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectFilterConfig {
    /// Upstream camera name.
    pub camera: String,
    /// Vision services to register, in order. The first one starts active.
    pub vision_services: Vec<String>,
    /// Labels to keep.
    pub labels: Vec<String>,
    /// Minimum score to keep, in `[0, 1]`.
    pub confidence: f32,
    /// Draw accepted boxes onto streamed frames.
    pub display_boxes: bool,
    /// Skip background captures with no accepted detections.
    pub filter_data: bool,
}

impl ObjectFilterConfig {
    /// Load from `OBJECTFILTER_CONFIG` (JSON or TOML) with env overrides applied.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("OBJECTFILTER_CONFIG").ok();
        let (file_cfg, path) = match config_path.as_deref() {
            Some(path) => (read_config_file(Path::new(path))?, path.to_string()),
            None => (ObjectFilterConfigFile::default(), DEFAULT_CONFIG_PATH.to_string()),
        };
        let mut cfg = Self::from_file(file_cfg);
        cfg.apply_env()?;
        cfg.validate(&path)?;
        Ok(cfg)
    }

    /// Load and validate a config file without env overrides.
    pub fn from_path(path: &Path) -> Result<Self> {
        let cfg = Self::from_file(read_config_file(path)?);
        cfg.validate(&path.display().to_string())?;
        Ok(cfg)
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let file: ObjectFilterConfigFile =
            serde_json::from_str(raw).map_err(|e| anyhow!("invalid JSON config: {}", e))?;
        Ok(Self::from_file(file))
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let file: ObjectFilterConfigFile =
            toml::from_str(raw).map_err(|e| anyhow!("invalid TOML config: {}", e))?;
        Ok(Self::from_file(file))
    }

    fn from_file(file: ObjectFilterConfigFile) -> Self {
        Self {
            camera: file.camera.unwrap_or_default(),
            vision_services: file.vision_services.unwrap_or_default(),
            labels: file.labels.unwrap_or_default(),
            confidence: file.confidence.unwrap_or(DEFAULT_CONFIDENCE),
            display_boxes: file.display_boxes.unwrap_or(false),
            filter_data: file.filter_data.unwrap_or(false),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(camera) = std::env::var("OBJECTFILTER_CAMERA") {
            if !camera.trim().is_empty() {
                self.camera = camera.trim().to_string();
            }
        }
        if let Ok(services) = std::env::var("OBJECTFILTER_VISION_SERVICES") {
            let parsed = split_csv(&services);
            if !parsed.is_empty() {
                self.vision_services = parsed;
            }
        }
        if let Ok(labels) = std::env::var("OBJECTFILTER_LABELS") {
            self.labels = split_csv(&labels);
        }
        if let Ok(confidence) = std::env::var("OBJECTFILTER_CONFIDENCE") {
            self.confidence = confidence
                .trim()
                .parse()
                .map_err(|_| anyhow!("OBJECTFILTER_CONFIDENCE must be a number"))?;
        }
        if let Ok(flag) = std::env::var("OBJECTFILTER_DISPLAY_BOXES") {
            self.display_boxes = parse_bool("OBJECTFILTER_DISPLAY_BOXES", &flag)?;
        }
        if let Ok(flag) = std::env::var("OBJECTFILTER_FILTER_DATA") {
            self.filter_data = parse_bool("OBJECTFILTER_FILTER_DATA", &flag)?;
        }
        Ok(())
    }

    /// Validate the configuration at `path` and return its implicit dependencies:
    /// the vision services followed by the camera.
    pub fn validate(&self, path: &str) -> Result<Vec<String>> {
        if self.camera.is_empty() {
            return Err(field_required(path, "camera"));
        }
        if self.vision_services.is_empty() {
            return Err(field_required(path, "vision_services"));
        }
        validate_resource_name(path, "camera", &self.camera)?;
        for (idx, name) in self.vision_services.iter().enumerate() {
            validate_resource_name(path, "vision_services", name)?;
            if self.vision_services[..idx].contains(name) {
                return Err(anyhow!(
                    "{}: \"vision_services\" lists '{}' more than once",
                    path,
                    name
                ));
            }
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(anyhow!(
                "{}: \"confidence\" must be between 0 and 1, got {}",
                path,
                self.confidence
            ));
        }
        if self.labels.is_empty() {
            log::warn!(
                "{}: no labels configured; every detection will be filtered out",
                path
            );
        }

        let mut deps = self.vision_services.clone();
        deps.push(self.camera.clone());
        Ok(deps)
    }
}

fn field_required(path: &str, field: &str) -> anyhow::Error {
    anyhow!("{}: \"{}\" is required", path, field)
}

/// Resource names are what the host registers components and services under.
pub fn validate_resource_name(path: &str, field: &str, name: &str) -> Result<()> {
    static NAME_RE: OnceLock<regex::Regex> = OnceLock::new();
    let re =
        NAME_RE.get_or_init(|| regex::Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.:-]{0,63}$").unwrap());
    if !re.is_match(name) {
        return Err(anyhow!(
            "{}: \"{}\" entry '{}' is not a valid resource name",
            path,
            field,
            name
        ));
    }
    Ok(())
}

fn read_config_file(path: &Path) -> Result<ObjectFilterConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(anyhow!("{} must be true or false", key)),
    }
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}
