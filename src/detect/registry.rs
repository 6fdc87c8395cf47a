use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use anyhow::{anyhow, Result};
use image::RgbImage;

use crate::detect::result::Detection;

use super::backend::DetectorBackend;

/// Backend handle shared between the registry and every in-flight frame.
///
/// Backends are wrapped in `Mutex` because `DetectorBackend::detect` takes `&mut self`.
pub type SharedDetector = Arc<Mutex<dyn DetectorBackend>>;

/// Registry failures. None of them alter the active detector.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegistryError {
    UnknownDetector { name: String, available: Vec<String> },
    DuplicateDetector(String),
    NoDetectors,
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::UnknownDetector { name, available } => write!(
                f,
                "vision service '{}' is not registered (available: {})",
                name,
                available.join(", ")
            ),
            RegistryError::DuplicateDetector(name) => {
                write!(f, "vision service '{}' registered twice", name)
            }
            RegistryError::NoDetectors => write!(f, "no vision services registered"),
        }
    }
}

impl std::error::Error for RegistryError {}

/// Snapshot of the active detector taken at one instant.
///
/// Holding a snapshot keeps the backend alive and pinned for the rest of a frame,
/// even if the registry is switched to another backend meanwhile.
#[derive(Clone)]
pub struct ActiveDetector {
    name: Arc<str>,
    backend: SharedDetector,
}

impl ActiveDetector {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the pinned backend on a frame.
    pub fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>> {
        let mut guard = self
            .backend
            .lock()
            .map_err(|_| anyhow!("vision service '{}' lock poisoned", self.name))?;
        guard.detect(image)
    }

    /// True when both snapshots point at the same backend instance.
    pub fn same_backend(&self, other: &ActiveDetector) -> bool {
        Arc::ptr_eq(&self.backend, &other.backend)
    }
}

impl fmt::Debug for ActiveDetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveDetector")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Collects backends before the registry goes live.
#[derive(Default)]
pub struct RegistryBuilder {
    backends: HashMap<String, SharedDetector>,
    first: Option<String>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend. The first registered backend becomes active.
    pub fn register<B: DetectorBackend + 'static>(
        &mut self,
        name: &str,
        backend: B,
    ) -> Result<(), RegistryError> {
        self.register_shared(name, Arc::new(Mutex::new(backend)))
    }

    /// Register a backend that is also owned elsewhere (e.g. a shared vision service).
    pub fn register_shared(
        &mut self,
        name: &str,
        backend: SharedDetector,
    ) -> Result<(), RegistryError> {
        if self.backends.contains_key(name) {
            return Err(RegistryError::DuplicateDetector(name.to_string()));
        }
        if self.first.is_none() {
            self.first = Some(name.to_string());
        }
        self.backends.insert(name.to_string(), backend);
        Ok(())
    }

    /// Freeze the set of backends. Fails when nothing was registered.
    pub fn build(self) -> Result<DetectorRegistry, RegistryError> {
        let first = self.first.ok_or(RegistryError::NoDetectors)?;
        let backend = self
            .backends
            .get(&first)
            .cloned()
            .ok_or(RegistryError::NoDetectors)?;
        Ok(DetectorRegistry {
            backends: self.backends,
            active: RwLock::new(ActiveDetector {
                name: first.into(),
                backend,
            }),
        })
    }
}

/// Thread-safe registry of named detector backends with one active entry.
///
/// The set of names is fixed once built; only the active pointer changes, and it
/// always names a registered backend.
pub struct DetectorRegistry {
    backends: HashMap<String, SharedDetector>,
    active: RwLock<ActiveDetector>,
}

impl DetectorRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Current active detector. Either the value before or after a concurrent
    /// `set_active`, never a mix.
    pub fn active(&self) -> ActiveDetector {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn active_name(&self) -> String {
        self.active().name().to_string()
    }

    /// Repoint the active detector. Unknown names leave it unchanged.
    pub fn set_active(&self, name: &str) -> Result<(), RegistryError> {
        let (key, backend) = self
            .backends
            .get_key_value(name)
            .ok_or_else(|| RegistryError::UnknownDetector {
                name: name.to_string(),
                available: self.names(),
            })?;
        let next = ActiveDetector {
            name: key.as_str().into(),
            backend: backend.clone(),
        };
        let mut slot = self.active.write().unwrap_or_else(PoisonError::into_inner);
        let previous = std::mem::replace(&mut *slot, next);
        drop(slot);
        log::info!(
            "active vision service changed from {} to {}",
            previous.name(),
            name
        );
        Ok(())
    }

    /// Get backend by name.
    pub fn get(&self, name: &str) -> Option<SharedDetector> {
        self.backends.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.backends.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.backends.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Run every backend's warm-up hook.
    pub fn warm_up(&self) -> Result<()> {
        for name in self.names() {
            let Some(backend) = self.backends.get(&name) else {
                continue;
            };
            let mut guard = backend
                .lock()
                .map_err(|_| anyhow!("vision service '{}' lock poisoned", name))?;
            guard.warm_up()?;
            log::debug!("vision service {} warmed up", name);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::backends::ScriptedBackend;
    use crate::detect::result::BoundingBox;

    fn labelled(label: &str) -> ScriptedBackend {
        ScriptedBackend::repeating(vec![Detection::new(
            label,
            1.0,
            BoundingBox::new(0, 0, 1, 1),
        )])
    }

    fn registry() -> DetectorRegistry {
        let mut builder = DetectorRegistry::builder();
        builder.register("modelA", labelled("a")).unwrap();
        builder.register("modelB", labelled("b")).unwrap();
        builder.build().unwrap()
    }

    #[test]
    fn first_registered_is_active() {
        let reg = registry();
        assert_eq!(reg.active_name(), "modelA");
        assert_eq!(reg.names(), vec!["modelA", "modelB"]);
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn set_active_switches_backend() {
        let reg = registry();
        reg.set_active("modelB").unwrap();
        let active = reg.active();
        assert_eq!(active.name(), "modelB");
        let dets = active.detect(&RgbImage::new(2, 2)).unwrap();
        assert_eq!(dets[0].label(), "b");
    }

    #[test]
    fn unknown_name_leaves_active_unchanged() {
        let reg = registry();
        let err = reg.set_active("modelC").unwrap_err();
        assert_eq!(
            err,
            RegistryError::UnknownDetector {
                name: "modelC".to_string(),
                available: vec!["modelA".to_string(), "modelB".to_string()],
            }
        );
        assert!(err.to_string().contains("modelC"));
        assert_eq!(reg.active_name(), "modelA");
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut builder = DetectorRegistry::builder();
        builder.register("modelA", labelled("a")).unwrap();
        let err = builder.register("modelA", labelled("z")).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateDetector("modelA".to_string()));

        let reg = builder.build().unwrap();
        let dets = reg.active().detect(&RgbImage::new(2, 2)).unwrap();
        assert_eq!(dets[0].label(), "a");
    }

    #[test]
    fn empty_registry_cannot_be_built() {
        let err = DetectorRegistry::builder().build().err();
        assert_eq!(err, Some(RegistryError::NoDetectors));
    }

    #[test]
    fn snapshot_survives_a_later_switch() {
        let reg = registry();
        let snapshot = reg.active();
        reg.set_active("modelB").unwrap();
        assert_eq!(snapshot.name(), "modelA");
        let dets = snapshot.detect(&RgbImage::new(2, 2)).unwrap();
        assert_eq!(dets[0].label(), "a");
        assert!(!snapshot.same_backend(&reg.active()));
    }

    #[test]
    fn concurrent_switches_never_tear() {
        let reg = Arc::new(registry());
        let writer = {
            let reg = reg.clone();
            std::thread::spawn(move || {
                for i in 0..500 {
                    let name = if i % 2 == 0 { "modelB" } else { "modelA" };
                    reg.set_active(name).unwrap();
                }
            })
        };
        for _ in 0..500 {
            let active = reg.active();
            let expected = reg.get(active.name()).unwrap();
            let pinned = ActiveDetector {
                name: active.name().into(),
                backend: expected,
            };
            assert!(active.same_backend(&pinned));
        }
        writer.join().unwrap();
    }
}
