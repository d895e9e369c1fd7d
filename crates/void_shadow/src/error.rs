//! Shadow system errors

use thiserror::Error;

/// Failure reported by a graphics backend while creating a resource
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BackendError {
    #[error("Out of device memory while creating {resource}")]
    OutOfMemory { resource: &'static str },

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Device error: {0}")]
    Device(String),
}

/// Errors surfaced by [`ShadowSystem`](crate::ShadowSystem) lifecycle operations.
///
/// Configuration problems never show up here; they are clamped when the
/// config is built.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ShadowError {
    #[error("Shadow system is already initialized")]
    AlreadyInitialized,

    #[error("Shadow system has been shut down")]
    ShutDown,

    #[error("Shadow system is not initialized")]
    NotInitialized,

    #[error("Backend reports zero frames in flight")]
    NoFramesInFlight,

    #[error("Failed to create {resource} (frame {frame:?}, cascade {cascade:?}): {source}")]
    ResourceCreation {
        resource: &'static str,
        frame: Option<usize>,
        cascade: Option<usize>,
        #[source]
        source: BackendError,
    },
}

impl ShadowError {
    pub(crate) fn resource(
        resource: &'static str,
        frame: Option<usize>,
        cascade: Option<usize>,
        source: BackendError,
    ) -> Self {
        Self::ResourceCreation { resource, frame, cascade, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_error_message() {
        let err = ShadowError::resource(
            "depth texture",
            Some(1),
            Some(2),
            BackendError::OutOfMemory { resource: "depth texture" },
        );
        let msg = err.to_string();
        assert!(msg.contains("depth texture"));
        assert!(msg.contains("Some(1)"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
