//! Simulated CUDA driver
//!
//! Records every call instead of touching hardware. It binds exports the way a
//! real driver of the configured version would, so calling a superseded or
//! missing symbol fails with `CUDA_ERROR_NOT_FOUND`. Used by the tests and by
//! `cujit launch` for dry runs.

use super::symbols::{Resolution, SymbolTable};
use super::{ApiVersion, CuStatus, Driver, DriverArg, RawHandle};
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// One recorded driver call
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub symbol: String,
    pub args: Vec<DriverArg>,
    pub status: CuStatus,
}

#[derive(Default)]
struct State {
    invocations: Vec<Invocation>,
    failures: FxHashMap<String, CuStatus>,
    modules: FxHashMap<RawHandle, Arc<[u8]>>,
    functions: FxHashSet<RawHandle>,
}

/// In-process stand-in for the vendor driver
pub struct SimulatedDriver {
    version: ApiVersion,
    exports: SymbolTable,
    next_handle: AtomicU64,
    state: Mutex<State>,
}

impl SimulatedDriver {
    pub fn new(version: ApiVersion) -> Self {
        Self {
            version,
            exports: SymbolTable::for_version(version),
            next_handle: AtomicU64::new(0x1000),
            state: Mutex::new(State::default()),
        }
    }

    pub fn version(&self) -> ApiVersion {
        self.version
    }

    /// Make every future call to `symbol` return `status`
    pub fn fail_with(&self, symbol: &str, status: CuStatus) {
        self.state().failures.insert(symbol.to_string(), status);
    }

    /// Undo [`SimulatedDriver::fail_with`]
    pub fn clear_failure(&self, symbol: &str) {
        self.state().failures.remove(symbol);
    }

    /// Every call made so far, in order
    pub fn invocations(&self) -> Vec<Invocation> {
        self.state().invocations.clone()
    }

    /// Number of calls made to one exported symbol
    pub fn count(&self, symbol: &str) -> usize {
        self.state()
            .invocations
            .iter()
            .filter(|call| call.symbol == symbol)
            .count()
    }

    pub fn clear(&self) {
        self.state().invocations.clear();
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // a panicking test thread must not hide the record from the others
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn exports(&self, symbol: &str) -> bool {
        if self.exports.lookup(symbol) != &Resolution::Unmapped {
            // superseded by a suffixed export, or not provided at all
            return false;
        }
        if let Some((logical, _)) = symbol.rsplit_once("_v") {
            if self.exports.contains(logical) {
                return self
                    .exports
                    .resolve(logical)
                    .is_ok_and(|export| export == symbol);
            }
        }
        true
    }

    fn new_handle(&self) -> RawHandle {
        self.next_handle.fetch_add(0x10, Ordering::Relaxed)
    }

    fn execute(&self, state: &mut State, symbol: &str, args: &mut [DriverArg]) -> CuStatus {
        if let Some(status) = state.failures.get(symbol) {
            return *status;
        }
        if !self.exports(symbol) {
            return CuStatus::NOT_FOUND;
        }

        match symbol {
            "cuDriverGetVersion" => match args.first_mut() {
                Some(DriverArg::Out(slot)) => {
                    *slot = self.version.to_driver_int() as u64;
                    CuStatus::SUCCESS
                }
                _ => CuStatus::INVALID_VALUE,
            },
            "cuModuleLoadData" => match args {
                [DriverArg::Out(slot), DriverArg::Image(image)] => {
                    if image.iter().all(|b| *b == 0) {
                        return CuStatus::INVALID_IMAGE;
                    }
                    let handle = self.new_handle();
                    state.modules.insert(handle, Arc::clone(&*image));
                    *slot = handle;
                    CuStatus::SUCCESS
                }
                _ => CuStatus::INVALID_VALUE,
            },
            "cuModuleGetFunction" => match args {
                [DriverArg::Out(slot), DriverArg::Handle(module), DriverArg::Str(name)] => {
                    let Some(image) = state.modules.get(&*module) else {
                        return CuStatus::INVALID_HANDLE;
                    };
                    let name = name.as_bytes();
                    if !image.windows(name.len().max(1)).any(|w| w == name) {
                        return CuStatus::NOT_FOUND;
                    }
                    let handle = self.new_handle();
                    state.functions.insert(handle);
                    *slot = handle;
                    CuStatus::SUCCESS
                }
                _ => CuStatus::INVALID_VALUE,
            },
            "cuModuleUnload" => match args {
                [DriverArg::Handle(module)] => match state.modules.remove(&*module) {
                    Some(_) => CuStatus::SUCCESS,
                    None => CuStatus::INVALID_HANDLE,
                },
                _ => CuStatus::INVALID_VALUE,
            },
            "cuLaunchKernel" => match args.first() {
                Some(DriverArg::Handle(function)) if state.functions.contains(function) => {
                    CuStatus::SUCCESS
                }
                Some(DriverArg::Handle(_)) => CuStatus::INVALID_HANDLE,
                _ => CuStatus::INVALID_VALUE,
            },
            _ => {
                // allocation-style calls hand back a fresh handle
                for arg in args.iter_mut() {
                    if let DriverArg::Out(slot) = arg {
                        *slot = self.new_handle();
                    }
                }
                CuStatus::SUCCESS
            }
        }
    }
}

impl Driver for SimulatedDriver {
    fn invoke(&self, symbol: &str, args: &mut [DriverArg]) -> CuStatus {
        let mut state = self.state();
        let status = self.execute(&mut state, symbol, args);
        state.invocations.push(Invocation {
            symbol: symbol.to_string(),
            args: args.to_vec(),
            status,
        });
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reports_version() {
        let driver = SimulatedDriver::new(ApiVersion::new(10, 2));
        let mut args = [DriverArg::Out(0)];
        assert!(driver.invoke("cuDriverGetVersion", &mut args).is_success());
        assert_eq!(args[0].out_value(), Some(10020));
    }

    #[test]
    fn test_rejects_superseded_export() {
        let driver = SimulatedDriver::new(ApiVersion::new(10, 2));
        let mut args = [DriverArg::Out(0), DriverArg::Usize(16)];
        assert_eq!(driver.invoke("cuMemAlloc", &mut args), CuStatus::NOT_FOUND);
        assert!(driver.invoke("cuMemAlloc_v2", &mut args).is_success());
        assert_ne!(args[0].out_value(), Some(0));
    }

    #[test]
    fn test_rejects_missing_export() {
        let driver = SimulatedDriver::new(ApiVersion::new(3, 0));
        assert_eq!(
            driver.invoke("cuLaunchKernel", &mut [DriverArg::Handle(1)]),
            CuStatus::NOT_FOUND
        );
        assert_eq!(driver.invoke("cuMemAlloc_v2", &mut []), CuStatus::NOT_FOUND);
    }

    #[test]
    fn test_module_and_function_lifecycle() {
        let driver = SimulatedDriver::new(ApiVersion::new(10, 2));
        let image: Arc<[u8]> = Arc::from(&b".entry vadd\0"[..]);

        let mut load = [DriverArg::Out(0), DriverArg::Image(image)];
        assert!(driver.invoke("cuModuleLoadData", &mut load).is_success());
        let module = load[0].out_value().unwrap();

        let mut get = [
            DriverArg::Out(0),
            DriverArg::Handle(module),
            DriverArg::str("missing").unwrap(),
        ];
        assert_eq!(driver.invoke("cuModuleGetFunction", &mut get), CuStatus::NOT_FOUND);

        get[2] = DriverArg::str("vadd").unwrap();
        assert!(driver.invoke("cuModuleGetFunction", &mut get).is_success());
        let function = get[0].out_value().unwrap();

        assert!(
            driver
                .invoke("cuLaunchKernel", &mut [DriverArg::Handle(function)])
                .is_success()
        );
        assert_eq!(
            driver.invoke("cuLaunchKernel", &mut [DriverArg::Handle(7)]),
            CuStatus::INVALID_HANDLE
        );
        assert!(
            driver
                .invoke("cuModuleUnload", &mut [DriverArg::Handle(module)])
                .is_success()
        );
        assert_eq!(driver.count("cuLaunchKernel"), 2);
    }

    #[test]
    fn test_injected_failure() {
        let driver = SimulatedDriver::new(ApiVersion::new(10, 2));
        driver.fail_with("cuCtxSynchronize", CuStatus::UNKNOWN);
        assert_eq!(driver.invoke("cuCtxSynchronize", &mut []), CuStatus::UNKNOWN);
        driver.clear_failure("cuCtxSynchronize");
        assert!(driver.invoke("cuCtxSynchronize", &mut []).is_success());
    }
}
