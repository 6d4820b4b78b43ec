//! CUDA driver status codes

use std::fmt;

/// Raw `CUresult` returned by every driver call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CuStatus(pub i32);

impl CuStatus {
    pub const SUCCESS: CuStatus = CuStatus(0);
    pub const INVALID_VALUE: CuStatus = CuStatus(1);
    pub const OUT_OF_MEMORY: CuStatus = CuStatus(2);
    pub const NOT_INITIALIZED: CuStatus = CuStatus(3);
    pub const INVALID_IMAGE: CuStatus = CuStatus(200);
    pub const INVALID_CONTEXT: CuStatus = CuStatus(201);
    pub const INVALID_PTX: CuStatus = CuStatus(218);
    pub const INVALID_HANDLE: CuStatus = CuStatus(400);
    pub const NOT_FOUND: CuStatus = CuStatus(500);
    pub const LAUNCH_OUT_OF_RESOURCES: CuStatus = CuStatus(701);
    pub const NOT_SUPPORTED: CuStatus = CuStatus(801);
    pub const UNKNOWN: CuStatus = CuStatus(999);

    pub fn is_success(self) -> bool {
        self == Self::SUCCESS
    }

    /// Symbolic name of the status as spelled in `cuda.h`
    pub fn name(self) -> String {
        match known(self.0) {
            Some((name, _)) => name.to_string(),
            None => format!("CUDA_ERROR_{}", self.0),
        }
    }

    pub fn description(self) -> &'static str {
        match known(self.0) {
            Some((_, description)) => description,
            None => "unknown error",
        }
    }
}

impl fmt::Display for CuStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.0)
    }
}

fn known(code: i32) -> Option<(&'static str, &'static str)> {
    let entry = match code {
        0 => ("CUDA_SUCCESS", "no error"),
        1 => ("CUDA_ERROR_INVALID_VALUE", "invalid argument"),
        2 => ("CUDA_ERROR_OUT_OF_MEMORY", "out of memory"),
        3 => ("CUDA_ERROR_NOT_INITIALIZED", "driver not initialized"),
        4 => ("CUDA_ERROR_DEINITIALIZED", "driver shutting down"),
        5 => ("CUDA_ERROR_PROFILER_DISABLED", "profiler disabled"),
        100 => ("CUDA_ERROR_NO_DEVICE", "no CUDA-capable device is detected"),
        101 => ("CUDA_ERROR_INVALID_DEVICE", "invalid device ordinal"),
        200 => ("CUDA_ERROR_INVALID_IMAGE", "device kernel image is invalid"),
        201 => ("CUDA_ERROR_INVALID_CONTEXT", "invalid device context"),
        202 => (
            "CUDA_ERROR_CONTEXT_ALREADY_CURRENT",
            "context already current",
        ),
        205 => ("CUDA_ERROR_MAP_FAILED", "mapping of buffer object failed"),
        206 => ("CUDA_ERROR_UNMAP_FAILED", "unmapping of buffer object failed"),
        207 => ("CUDA_ERROR_ARRAY_IS_MAPPED", "array is mapped"),
        208 => ("CUDA_ERROR_ALREADY_MAPPED", "resource already mapped"),
        209 => (
            "CUDA_ERROR_NO_BINARY_FOR_GPU",
            "no kernel image is available for execution on the device",
        ),
        210 => ("CUDA_ERROR_ALREADY_ACQUIRED", "resource already acquired"),
        211 => ("CUDA_ERROR_NOT_MAPPED", "resource not mapped"),
        214 => ("CUDA_ERROR_ECC_UNCORRECTABLE", "uncorrectable ECC error encountered"),
        215 => ("CUDA_ERROR_UNSUPPORTED_LIMIT", "limit is not supported on this architecture"),
        216 => ("CUDA_ERROR_CONTEXT_ALREADY_IN_USE", "exclusive-thread device already in use"),
        217 => ("CUDA_ERROR_PEER_ACCESS_UNSUPPORTED", "peer access is not supported"),
        218 => ("CUDA_ERROR_INVALID_PTX", "a PTX JIT compilation failed"),
        300 => ("CUDA_ERROR_INVALID_SOURCE", "device kernel image is invalid"),
        301 => ("CUDA_ERROR_FILE_NOT_FOUND", "file not found"),
        302 => (
            "CUDA_ERROR_SHARED_OBJECT_SYMBOL_NOT_FOUND",
            "shared object symbol not found",
        ),
        303 => (
            "CUDA_ERROR_SHARED_OBJECT_INIT_FAILED",
            "shared object initialization failed",
        ),
        304 => ("CUDA_ERROR_OPERATING_SYSTEM", "OS call failed"),
        400 => ("CUDA_ERROR_INVALID_HANDLE", "invalid resource handle"),
        500 => ("CUDA_ERROR_NOT_FOUND", "named symbol not found"),
        600 => ("CUDA_ERROR_NOT_READY", "device not ready"),
        700 => ("CUDA_ERROR_ILLEGAL_ADDRESS", "an illegal memory access was encountered"),
        701 => (
            "CUDA_ERROR_LAUNCH_OUT_OF_RESOURCES",
            "too many resources requested for launch",
        ),
        702 => ("CUDA_ERROR_LAUNCH_TIMEOUT", "the launch timed out and was terminated"),
        703 => (
            "CUDA_ERROR_LAUNCH_INCOMPATIBLE_TEXTURING",
            "launch uses incompatible texturing mode",
        ),
        704 => (
            "CUDA_ERROR_PEER_ACCESS_ALREADY_ENABLED",
            "peer access is already enabled",
        ),
        705 => ("CUDA_ERROR_PEER_ACCESS_NOT_ENABLED", "peer access has not been enabled"),
        708 => ("CUDA_ERROR_PRIMARY_CONTEXT_ACTIVE", "primary context is already initialized"),
        709 => ("CUDA_ERROR_CONTEXT_IS_DESTROYED", "context is destroyed"),
        710 => ("CUDA_ERROR_ASSERT", "device-side assert triggered"),
        719 => ("CUDA_ERROR_LAUNCH_FAILED", "unspecified launch failure"),
        801 => ("CUDA_ERROR_NOT_SUPPORTED", "operation not supported"),
        999 => ("CUDA_ERROR_UNKNOWN", "unknown error"),
        _ => return None,
    };
    Some(entry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_status() {
        assert!(CuStatus::SUCCESS.is_success());
        assert_eq!(CuStatus::OUT_OF_MEMORY.name(), "CUDA_ERROR_OUT_OF_MEMORY");
        assert_eq!(CuStatus(218).description(), "a PTX JIT compilation failed");
        assert_eq!(CuStatus::NOT_FOUND.to_string(), "CUDA_ERROR_NOT_FOUND (500)");
    }

    #[test]
    fn test_unknown_status() {
        let status = CuStatus(12345);
        assert!(!status.is_success());
        assert_eq!(status.name(), "CUDA_ERROR_12345");
        assert_eq!(status.description(), "unknown error");
    }
}
