//! Error reporting for driver calls, compilation and dispatch
//!
//! Every hard failure in the crate is an [`Error`]. The variants carry enough
//! context (operation name, status code, minimum version) for miette to render
//! a useful report at the top of a launch call chain.

use crate::driver::{ApiVersion, CuStatus};
use miette::Diagnostic;
use thiserror::Error;

/// Crate-wide result alias
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Dispatch and driver diagnostic
#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
pub enum Error {
    // === Driver Errors ===
    #[error("`{name}` requires CUDA driver API {minimum} or higher")]
    #[diagnostic(
        code(driver::version_unavailable),
        help("upgrade the CUDA driver, or avoid calling this operation")
    )]
    VersionUnavailable { name: String, minimum: ApiVersion },

    #[error("CUDA driver call `{call}` failed: {} ({})", .status.name(), .status.description())]
    #[diagnostic(code(driver::status))]
    DriverStatus { call: String, status: CuStatus },

    #[error("Invalid CUDA driver version `{input}`")]
    #[diagnostic(
        code(driver::invalid_version),
        help("versions are written as `major.minor`, e.g. `10.2`")
    )]
    InvalidVersion { input: String },

    #[error("Driver argument `{name}` contains an interior NUL byte")]
    #[diagnostic(code(driver::invalid_name))]
    InvalidName { name: String },

    // === Compile Errors ===
    #[error("no method found for `{callable}` matching signature ({signature})")]
    #[diagnostic(
        code(compile::no_method),
        help("register a method for these argument types or convert the arguments")
    )]
    NoMethod { callable: String, signature: String },

    #[error("Compilation of `{callable}` failed: {message}")]
    #[diagnostic(code(compile::failed))]
    CompileFailed { callable: String, message: String },

    // === Configuration Errors ===
    #[error("Failed to read configuration `{path}`: {message}")]
    #[diagnostic(code(config::io))]
    ConfigIo { path: String, message: String },

    #[error("Invalid configuration: {message}")]
    #[diagnostic(code(config::parse))]
    ConfigParse { message: String },
}

impl Error {
    /// Status code carried by a driver failure, if any
    pub fn status(&self) -> Option<CuStatus> {
        match self {
            Error::DriverStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_version_unavailable(&self) -> bool {
        matches!(self, Error::VersionUnavailable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_status_message() {
        let err = Error::DriverStatus {
            call: "cuMemAlloc".to_string(),
            status: CuStatus(2),
        };
        let msg = err.to_string();
        assert!(msg.contains("cuMemAlloc"));
        assert!(msg.contains("CUDA_ERROR_OUT_OF_MEMORY"));
        assert_eq!(err.status(), Some(CuStatus(2)));
    }

    #[test]
    fn test_version_unavailable_message() {
        let err = Error::VersionUnavailable {
            name: "cuLinkCreate".to_string(),
            minimum: ApiVersion::new(5, 5),
        };
        assert_eq!(
            err.to_string(),
            "`cuLinkCreate` requires CUDA driver API 5.5 or higher"
        );
        assert!(err.is_version_unavailable());
        assert_eq!(err.status(), None);
    }
}
