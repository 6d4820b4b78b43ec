//! CUDA driver API access
//!
//! The driver itself is an external collaborator reached through the
//! [`Driver`] trait: one entry point that takes an exported symbol name and a
//! C-compatible argument list and returns a status code. [`Api`] sits on top
//! of it, binding logical names to the right versioned exports and turning
//! non-success codes into errors.
//!
//! Architecture:
//! ```text
//! Api::call("cuCtxDestroy") -> SymbolTable -> "cuCtxDestroy_v2" -> Driver::invoke -> CuStatus
//! ```

pub mod module;
pub mod simulated;
pub mod status;
pub mod symbols;
pub mod version;

pub use module::{CuFunction, CuModule};
pub use simulated::{Invocation, SimulatedDriver};
pub use status::CuStatus;
pub use symbols::{Resolution, SymbolTable};
pub use version::ApiVersion;

use crate::diagnostics::{Error, Result};
use std::ffi::CString;
use std::fmt;
use std::sync::Arc;

/// Opaque driver handle (context, module, function, stream, ...)
pub type RawHandle = u64;

/// Kernel parameter as passed through `kernelParams`
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Bool(bool),
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    /// Raw device address
    Ptr(u64),
    /// Flat value type, passed by its bytes
    Bytes(Vec<u8>),
}

/// C-compatible driver call argument
#[derive(Clone, PartialEq)]
pub enum DriverArg {
    I32(i32),
    U32(u32),
    U64(u64),
    Usize(usize),
    Handle(RawHandle),
    /// NUL-terminated string (`const char*`)
    Str(CString),
    /// Module image (`const void* image`)
    Image(Arc<[u8]>),
    /// Kernel parameter array (`void** kernelParams`)
    Params(Vec<ParamValue>),
    /// Output slot written by the driver (`T*`)
    Out(u64),
}

impl DriverArg {
    /// Build a string argument, rejecting interior NUL bytes
    pub fn str(value: &str) -> Result<Self> {
        CString::new(value)
            .map(DriverArg::Str)
            .map_err(|_| Error::InvalidName {
                name: value.to_string(),
            })
    }

    /// Value written into an output slot
    pub fn out_value(&self) -> Option<u64> {
        match self {
            DriverArg::Out(value) => Some(*value),
            _ => None,
        }
    }
}

impl fmt::Debug for DriverArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverArg::I32(v) => write!(f, "{v}"),
            DriverArg::U32(v) => write!(f, "{v}"),
            DriverArg::U64(v) => write!(f, "{v}"),
            DriverArg::Usize(v) => write!(f, "{v}"),
            DriverArg::Handle(h) => write!(f, "{h:#x}"),
            DriverArg::Str(s) => write!(f, "{s:?}"),
            DriverArg::Image(bytes) => write!(f, "<image: {} bytes>", bytes.len()),
            DriverArg::Params(params) => f.debug_list().entries(params).finish(),
            DriverArg::Out(v) => write!(f, "&{v:#x}"),
        }
    }
}

/// The vendor driver: resolves an exported symbol and calls it
pub trait Driver: Send + Sync {
    fn invoke(&self, symbol: &str, args: &mut [DriverArg]) -> CuStatus;
}

impl<D: Driver + ?Sized> Driver for Arc<D> {
    fn invoke(&self, symbol: &str, args: &mut [DriverArg]) -> CuStatus {
        (**self).invoke(symbol, args)
    }
}

impl<D: Driver + ?Sized> Driver for &D {
    fn invoke(&self, symbol: &str, args: &mut [DriverArg]) -> CuStatus {
        (**self).invoke(symbol, args)
    }
}

/// Status-checked, version-aware view of a driver
pub struct Api<D> {
    driver: D,
    symbols: SymbolTable,
    trace: bool,
}

impl<D: Driver> Api<D> {
    /// Detect the driver version and build the symbol table for it
    pub fn new(driver: D) -> Result<Self> {
        let mut args = [DriverArg::Out(0)];
        let status = driver.invoke("cuDriverGetVersion", &mut args);
        if !status.is_success() {
            return Err(Error::DriverStatus {
                call: "cuDriverGetVersion".to_string(),
                status,
            });
        }
        let raw = args[0].out_value().unwrap_or(0) as i32;
        let version = ApiVersion::from_driver_int(raw);
        tracing::info!("detected CUDA driver API {}", version);
        Ok(Self::with_version(driver, version))
    }

    /// Use a known version instead of asking the driver
    pub fn with_version(driver: D, version: ApiVersion) -> Self {
        Self {
            driver,
            symbols: SymbolTable::for_version(version),
            trace: false,
        }
    }

    /// Log every call with its arguments and status
    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    pub fn version(&self) -> ApiVersion {
        self.symbols.version()
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Export name bound to a logical driver function
    pub fn resolve<'a>(&'a self, name: &'a str) -> Result<&'a str> {
        self.symbols.resolve(name)
    }

    /// Call a logical driver function, failing on any non-success status
    pub fn call(&self, name: &str, args: &mut [DriverArg]) -> Result<()> {
        let symbol = self.symbols.resolve(name)?;
        let status = self.driver.invoke(symbol, args);

        if self.trace {
            tracing::trace!(
                target: "cudajit::api",
                call = name,
                symbol,
                args = ?args,
                %status,
                "driver call"
            );
        }

        if status.is_success() {
            Ok(())
        } else {
            Err(Error::DriverStatus {
                call: name.to_string(),
                status,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_detects_version() {
        let driver = SimulatedDriver::new(ApiVersion::new(9, 2));
        let api = Api::new(&driver).unwrap();
        assert_eq!(api.version(), ApiVersion::new(9, 2));
        assert_eq!(api.resolve("cuMemAlloc").unwrap(), "cuMemAlloc_v2");
    }

    #[test]
    fn test_call_uses_versioned_symbol() {
        let driver = SimulatedDriver::new(ApiVersion::new(4, 0));
        let api = Api::with_version(&driver, ApiVersion::new(4, 0));

        api.call("cuCtxDestroy", &mut [DriverArg::Handle(1)]).unwrap();

        let calls = driver.invocations();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].symbol, "cuCtxDestroy_v2");
    }

    #[test]
    fn test_call_reports_status() {
        let driver = SimulatedDriver::new(ApiVersion::new(10, 2));
        driver.fail_with("cuMemAlloc_v2", CuStatus::OUT_OF_MEMORY);
        let api = Api::with_version(&driver, ApiVersion::new(10, 2));

        let err = api
            .call("cuMemAlloc", &mut [DriverArg::Out(0), DriverArg::Usize(64)])
            .unwrap_err();
        assert_eq!(err.status(), Some(CuStatus::OUT_OF_MEMORY));
    }

    #[test]
    fn test_unavailable_call_never_reaches_driver() {
        let driver = SimulatedDriver::new(ApiVersion::new(3, 2));
        let api = Api::with_version(&driver, ApiVersion::new(3, 2));

        let err = api.call("cuLaunchKernel", &mut []).unwrap_err();
        assert!(err.is_version_unavailable());
        assert!(driver.invocations().is_empty());
    }

    #[derive(Clone, Default)]
    struct Capture(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for Capture {
        type Writer = Capture;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    impl Capture {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    fn traced<F: FnOnce()>(f: F) -> String {
        let capture = Capture::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(capture.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::TRACE)
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        capture.text()
    }

    #[test]
    fn test_trace_records_call_fields() {
        let driver = SimulatedDriver::new(ApiVersion::new(4, 0));
        let api = Api::with_version(&driver, ApiVersion::new(4, 0)).with_trace(true);

        let output = traced(|| {
            api.call("cuCtxDestroy", &mut [DriverArg::Handle(0x20)])
                .unwrap();
        });

        assert!(output.contains("cudajit::api"), "{output}");
        assert!(output.contains("driver call"), "{output}");
        assert!(output.contains("call=\"cuCtxDestroy\""), "{output}");
        assert!(output.contains("symbol=\"cuCtxDestroy_v2\""), "{output}");
        assert!(output.contains("args=[0x20]"), "{output}");
        assert!(output.contains("status=CUDA_SUCCESS (0)"), "{output}");
    }

    #[test]
    fn test_trace_is_off_by_default() {
        let driver = SimulatedDriver::new(ApiVersion::new(4, 0));
        let api = Api::with_version(&driver, ApiVersion::new(4, 0));

        let output = traced(|| {
            api.call("cuCtxDestroy", &mut [DriverArg::Handle(0x20)])
                .unwrap();
        });

        assert!(!output.contains("driver call"), "{output}");
    }

    #[test]
    fn test_driver_arg_debug() {
        assert_eq!(format!("{:?}", DriverArg::Handle(255)), "0xff");
        assert_eq!(
            format!("{:?}", DriverArg::Image(Arc::from(&b"abc"[..]))),
            "<image: 3 bytes>"
        );
        assert!(DriverArg::str("bad\0name").is_err());
    }
}
