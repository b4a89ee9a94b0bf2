//! Producer-to-render mailbox for requests that are not frames.
//!
//! Resize, scale and backend switches are recorded here by the producer and applied by render
//! execution before it next touches a renderer. Render execution publishes the active backend and
//! any fatal error back through the same object.

use std::sync::{Mutex, PoisonError};

use crate::config::BackendChoice;
use crate::error::RendError;
use crate::registry::BackendInfo;

/// Requests accumulated since render execution last looked. Later requests of the same kind
/// replace earlier ones.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct RendererRequests {
    pub switch: Option<BackendChoice>,
    pub resize: Option<(u32, u32)>,
    pub fb_scale: Option<(f32, f32)>,
}

impl RendererRequests {
    pub fn is_empty(&self) -> bool {
        self.switch.is_none() && self.resize.is_none() && self.fb_scale.is_none()
    }
}

#[derive(Debug, Default)]
pub(crate) struct RendererControl {
    requests: Mutex<RendererRequests>,
    fatal: Mutex<Option<RendError>>,
    active: Mutex<Option<BackendInfo>>,
}

impl RendererControl {
    pub fn new() -> Self {
        Self::default()
    }

    fn requests(&self) -> std::sync::MutexGuard<'_, RendererRequests> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn request_switch(&self, choice: BackendChoice) {
        self.requests().switch = Some(choice);
    }

    pub fn request_resize(&self, width: u32, height: u32) {
        self.requests().resize = Some((width, height));
    }

    pub fn request_fb_scale(&self, x: f32, y: f32) {
        self.requests().fb_scale = Some((x, y));
    }

    pub fn take_requests(&self) -> RendererRequests {
        std::mem::take(&mut *self.requests())
    }

    /// Record a fatal error. The first one wins; later errors are usually consequences of it.
    pub fn record_fatal(&self, err: RendError) {
        let mut fatal = self.fatal.lock().unwrap_or_else(PoisonError::into_inner);
        if fatal.is_none() {
            *fatal = Some(err);
        }
    }

    pub fn fatal(&self) -> Option<RendError> {
        self.fatal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_active(&self, info: Option<BackendInfo>) {
        *self.active.lock().unwrap_or_else(PoisonError::into_inner) = info;
    }

    pub fn active(&self) -> Option<BackendInfo> {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
