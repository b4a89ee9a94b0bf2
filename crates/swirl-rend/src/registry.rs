//! Named, priority-ranked renderer backends.
//!
//! Each backend module registers a [`BackendDescriptor`] once at startup. The registry is an
//! ordinary value shared through `Arc`; hosts decide when it is populated instead of relying on
//! static initialization order.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::renderer::{NullRenderer, Renderer};
use crate::vram::VramHandle;

/// Constructs an uninitialized renderer instance.
pub type RendererFactory = Arc<dyn Fn(&VramHandle) -> Box<dyn Renderer> + Send + Sync>;

#[derive(Clone)]
pub struct BackendDescriptor {
    name: String,
    priority: i32,
    factory: RendererFactory,
}

impl BackendDescriptor {
    pub fn new<F>(name: impl Into<String>, priority: i32, factory: F) -> Self
    where
        F: Fn(&VramHandle) -> Box<dyn Renderer> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            priority,
            factory: Arc::new(factory),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn info(&self) -> BackendInfo {
        BackendInfo {
            name: self.name.clone(),
            priority: self.priority,
        }
    }

    pub fn instantiate(&self, vram: &VramHandle) -> Box<dyn Renderer> {
        (self.factory)(vram)
    }
}

impl fmt::Debug for BackendDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendDescriptor")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

/// Identity of the backend a renderer instance was created from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendInfo {
    pub name: String,
    pub priority: i32,
}

#[derive(Debug, Default)]
pub struct BackendRegistry {
    // Kept in registration order; priority ordering is computed on demand with a stable sort.
    entries: RwLock<Vec<BackendDescriptor>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the built-in backends (currently just `none`).
    pub fn with_builtin() -> Self {
        let registry = Self::new();
        register_builtin_backends(&registry);
        registry
    }

    /// Insert `descriptor`, replacing any entry with the same name in place.
    ///
    /// Always succeeds.
    pub fn register(&self, descriptor: BackendDescriptor) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        match entries.iter_mut().find(|d| d.name == descriptor.name) {
            Some(existing) => *existing = descriptor,
            None => entries.push(descriptor),
        }
        true
    }

    pub fn get(&self, name: &str) -> Option<BackendDescriptor> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|d| d.name == name)
            .cloned()
    }

    /// Descriptors by descending priority; equal priorities keep registration order.
    pub fn list_by_priority(&self) -> Vec<BackendDescriptor> {
        let mut list = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        list.sort_by(|a, b| b.priority.cmp(&a.priority));
        list
    }

    pub fn names(&self) -> Vec<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|d| d.name.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub fn register_builtin_backends(registry: &BackendRegistry) {
    registry.register(BackendDescriptor::new(
        NullRenderer::NAME,
        NullRenderer::PRIORITY,
        |_vram| Box::new(NullRenderer::new()),
    ));
}
