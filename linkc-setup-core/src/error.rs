use thiserror::Error;

/// Conditions callers branch on. Everything else travels as plain `anyhow` context.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("operation cancelled by user")]
    Cancelled,

    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("mirror list must contain at least one candidate")]
    EmptyMirrorList,

    #[error("all {attempts} download source(s) failed")]
    AllMirrorsFailed { attempts: usize },

    #[error("package manager '{0}' was not found on PATH")]
    PackageManagerNotFound(&'static str),
}

/// Returns true when the error chain was caused by a user interrupt.
pub fn is_cancelled(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<SetupError>(),
            Some(SetupError::Cancelled)
        )
    })
}
