//! Backend selection, lazy initialization and fallback.
//!
//! The selector owns every renderer instance. It lives on the render-execution side, so renderers
//! are constructed, initialized, used and dropped on the same thread.
//!
//! State machine of the renderer slot:
//!
//! ```text
//! Empty --create primary (+ fallback), init primary ok--> Ready(primary)
//!   |
//!   +--primary init fails, fallback init ok--> Ready(fallback)
//!   +--otherwise-----------------------------> Empty, Err(fatal)
//! Ready --terminate / switch--> Empty
//! ```

use std::sync::Arc;

use crate::config::BackendChoice;
use crate::error::{RendError, Result};
use crate::registry::{BackendDescriptor, BackendInfo, BackendRegistry};
use crate::renderer::Renderer;
use crate::vram::VramHandle;

/// A renderer instance tagged with the backend it came from.
pub struct ActiveRenderer {
    info: BackendInfo,
    renderer: Box<dyn Renderer>,
}

impl ActiveRenderer {
    pub fn info(&self) -> &BackendInfo {
        &self.info
    }

    pub fn renderer(&mut self) -> &mut dyn Renderer {
        self.renderer.as_mut()
    }
}

enum Slot {
    Empty,
    Ready(ActiveRenderer),
}

/// Result of a successful (re)initialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitOutcome {
    pub backend: BackendInfo,
    /// The primary failed and the fallback took its place.
    pub fell_back: bool,
}

pub struct BackendSelector {
    registry: Arc<BackendRegistry>,
    choice: BackendChoice,
    vram: VramHandle,
    slot: Slot,
}

impl BackendSelector {
    pub fn new(registry: Arc<BackendRegistry>, choice: BackendChoice, vram: VramHandle) -> Self {
        Self {
            registry,
            choice,
            vram,
            slot: Slot::Empty,
        }
    }

    pub fn choice(&self) -> &BackendChoice {
        &self.choice
    }

    fn instantiate(&self, desc: &BackendDescriptor) -> ActiveRenderer {
        ActiveRenderer {
            info: desc.info(),
            renderer: desc.instantiate(&self.vram),
        }
    }

    /// Construct (but do not initialize) the primary and optional fallback.
    fn create(&self) -> Result<(ActiveRenderer, Option<ActiveRenderer>)> {
        if let BackendChoice::Named(name) = &self.choice {
            match self.registry.get(name) {
                Some(desc) => {
                    tracing::info!(backend = %name, "renderer: explicitly configured");
                    return Ok((self.instantiate(&desc), None));
                }
                None => {
                    tracing::warn!(
                        backend = %name,
                        available = ?self.registry.names(),
                        "unknown renderer backend; using auto selection"
                    );
                }
            }
        }

        let mut ranked = self.registry.list_by_priority().into_iter();
        let main = ranked.next().ok_or(RendError::NoBackendRegistered)?;
        let fallback = ranked.next();

        tracing::info!(
            main = main.name(),
            fallback = fallback.as_ref().map_or("<none>", |d| d.name()),
            "renderer (auto)"
        );

        Ok((
            self.instantiate(&main),
            fallback.map(|desc| self.instantiate(&desc)),
        ))
    }

    /// Make sure an initialized renderer is active.
    ///
    /// Returns `Ok(None)` if one already was, `Ok(Some(_))` if this call initialized one. An error
    /// is fatal: no renderer is left in the slot.
    pub fn ensure_initialized(&mut self) -> Result<Option<InitOutcome>> {
        if matches!(self.slot, Slot::Ready(_)) {
            return Ok(None);
        }
        let (mut primary, fallback) = self.create()?;

        if primary.renderer.init() {
            drop(fallback);
            tracing::info!(backend = %primary.info.name, "using renderer");
            let backend = primary.info.clone();
            self.slot = Slot::Ready(primary);
            return Ok(Some(InitOutcome {
                backend,
                fell_back: false,
            }));
        }

        let failed = primary.info.name.clone();
        drop(primary);

        let Some(mut fallback) = fallback else {
            tracing::error!(backend = %failed, "renderer initialization failed");
            return Err(RendError::BackendInitFailed { backend: failed });
        };

        tracing::warn!(
            backend = %failed,
            fallback = %fallback.info.name,
            "renderer did not initialize; falling back"
        );

        if fallback.renderer.init() {
            tracing::info!(backend = %fallback.info.name, "using renderer");
            let backend = fallback.info.clone();
            self.slot = Slot::Ready(fallback);
            Ok(Some(InitOutcome {
                backend,
                fell_back: true,
            }))
        } else {
            tracing::error!(
                backend = %failed,
                fallback = %fallback.info.name,
                "renderer initialization failed"
            );
            Err(RendError::FallbackInitFailed {
                primary: failed,
                fallback: fallback.info.name.clone(),
            })
        }
    }

    pub fn active(&self) -> Option<&BackendInfo> {
        match &self.slot {
            Slot::Ready(active) => Some(&active.info),
            Slot::Empty => None,
        }
    }

    pub fn active_mut(&mut self) -> Option<&mut ActiveRenderer> {
        match &mut self.slot {
            Slot::Ready(active) => Some(active),
            Slot::Empty => None,
        }
    }

    /// Release the active renderer's resources and drop every instance.
    pub fn terminate(&mut self) {
        if let Slot::Ready(mut active) = std::mem::replace(&mut self.slot, Slot::Empty) {
            active.renderer.terminate();
            tracing::info!(backend = %active.info.name, "renderer terminated");
        }
    }

    /// Retire the current renderer; the next [`BackendSelector::ensure_initialized`] constructs
    /// one for `choice`.
    pub fn switch_backend(&mut self, choice: BackendChoice) {
        self.terminate();
        tracing::info!(?choice, "renderer switch requested");
        self.choice = choice;
    }
}

impl Drop for BackendSelector {
    fn drop(&mut self) {
        self.terminate();
    }
}
