use thiserror::Error;

pub type Result<T> = std::result::Result<T, RendError>;

/// Errors surfaced by the render-dispatch core.
///
/// Backend failures are handled inside the selector and the render loop. Only the fatal
/// initialization failures and a vanished render loop ever reach the producer; overruns and
/// `process` failures are counted in [`crate::DispatchStats`] instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RendError {
    /// The registry was empty when a renderer had to be created.
    #[error("no renderer backend registered: nothing is able to render frames")]
    NoBackendRegistered,

    /// The only candidate backend failed `init()` (explicitly configured, or auto mode without
    /// a fallback).
    #[error("renderer backend `{backend}` failed to initialize")]
    BackendInitFailed { backend: String },

    /// Both the primary and the fallback backend failed `init()`.
    #[error(
        "renderer backend `{primary}` failed to initialize and fallback `{fallback}` failed too"
    )]
    FallbackInitFailed { primary: String, fallback: String },

    /// The render loop was dropped; no job can be executed anymore.
    #[error("render loop is no longer accepting frames")]
    RenderLoopClosed,

    #[error("invalid renderer configuration: {0}")]
    InvalidConfig(String),
}

impl RendError {
    /// Whether the error leaves the system without a usable renderer.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RendError::NoBackendRegistered
                | RendError::BackendInitFailed { .. }
                | RendError::FallbackInitFailed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_failures_name_the_backends() {
        let err = RendError::FallbackInitFailed {
            primary: "vulkan".into(),
            fallback: "gl41".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("`vulkan`"), "{msg}");
        assert!(msg.contains("`gl41`"), "{msg}");

        let err = RendError::BackendInitFailed {
            backend: "soft".into(),
        };
        assert!(err.to_string().contains("`soft`"));
    }

    #[test]
    fn only_backend_failures_are_fatal() {
        assert!(RendError::NoBackendRegistered.is_fatal());
        assert!(RendError::BackendInitFailed {
            backend: "none".into()
        }
        .is_fatal());
        assert!(!RendError::RenderLoopClosed.is_fatal());
        assert!(!RendError::InvalidConfig("x".into()).is_fatal());
    }
}
