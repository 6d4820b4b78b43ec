//! cudajit: JIT kernel dispatch over the CUDA driver API
//!
//! Launching a kernel from host code takes two things this crate provides:
//! - A per-signature cache of compiled kernels, filled lazily through an
//!   injected compiler backend
//! - A driver API view that binds every logical function name to the export
//!   matching the installed driver version, and checks every status code
//!
//! # Architecture
//!
//! ```text
//! launch!(...) -> Launcher -> guess_types -> KernelCache -> Compiler
//!                                                 |
//!                      Api -> SymbolTable -> Driver::invoke -> CuStatus
//! ```
//!
//! # Example
//!
//! ```
//! use cudajit::{Api, ApiVersion, ArgType, KernelArg, LaunchConfig, Launcher, MethodTable,
//!               ScalarKind, SimulatedDriver};
//!
//! let mut methods = MethodTable::new();
//! methods.register(
//!     "fill",
//!     vec![ArgType::RawPtr(ScalarKind::F32), ArgType::Scalar(ScalarKind::F32)],
//!     "fill_f32",
//!     ".visible .entry fill_f32() { ret; }",
//! );
//!
//! let driver = SimulatedDriver::new(ApiVersion::new(10, 2));
//! let launcher = Launcher::new(Api::new(&driver)?, methods);
//!
//! let args = [KernelArg::pointer(ScalarKind::F32, 0x1000), KernelArg::from(1.0f32)];
//! launcher.launch(&LaunchConfig::new_1d(4, 32), "fill", &args)?;
//! # Ok::<(), cudajit::Error>(())
//! ```

pub mod config;
pub mod diagnostics;
pub mod driver;
pub mod kernel;

// Re-exports for convenience
pub use config::Config;
pub use diagnostics::{Error, Result};
pub use driver::{Api, ApiVersion, CuFunction, CuModule, CuStatus, Driver, SimulatedDriver};
pub use kernel::{
    ArgType, KernelArg, KernelCache, KernelSignature, LaunchConfig, Launcher, MethodTable,
    ScalarKind, guess_types,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
