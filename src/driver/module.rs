//! Device modules and kernel function handles

use super::{Api, Driver, DriverArg, RawHandle};
use crate::diagnostics::Result;
use std::sync::Arc;

/// Module loaded from a PTX or cubin image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CuModule {
    handle: RawHandle,
}

impl CuModule {
    /// Load an image with `cuModuleLoadData`
    pub fn load<D: Driver>(api: &Api<D>, image: &[u8]) -> Result<Self> {
        let mut args = [DriverArg::Out(0), DriverArg::Image(Arc::from(image))];
        api.call("cuModuleLoadData", &mut args)?;
        let handle = args[0].out_value().unwrap_or_default();
        tracing::debug!("loaded module {:#x} ({} bytes)", handle, image.len());
        Ok(Self { handle })
    }

    /// Look up a kernel entry point with `cuModuleGetFunction`
    pub fn function<D: Driver>(&self, api: &Api<D>, name: &str) -> Result<CuFunction> {
        let mut args = [
            DriverArg::Out(0),
            DriverArg::Handle(self.handle),
            DriverArg::str(name)?,
        ];
        api.call("cuModuleGetFunction", &mut args)?;
        Ok(CuFunction {
            handle: args[0].out_value().unwrap_or_default(),
            module: self.handle,
            name: name.to_string(),
        })
    }

    /// Release the module; functions obtained from it become invalid
    pub fn unload<D: Driver>(self, api: &Api<D>) -> Result<()> {
        api.call("cuModuleUnload", &mut [DriverArg::Handle(self.handle)])
    }

    pub fn handle(&self) -> RawHandle {
        self.handle
    }
}

/// Kernel entry point inside a loaded module
///
/// Immutable once built; the dispatcher shares it through the kernel cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CuFunction {
    handle: RawHandle,
    module: RawHandle,
    name: String,
}

impl CuFunction {
    pub fn handle(&self) -> RawHandle {
        self.handle
    }

    pub fn module(&self) -> RawHandle {
        self.module
    }

    /// Entry symbol name
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{ApiVersion, CuStatus, SimulatedDriver};

    #[test]
    fn test_load_and_get_function() {
        let driver = SimulatedDriver::new(ApiVersion::new(10, 2));
        let api = Api::with_version(&driver, ApiVersion::new(10, 2));

        let module = CuModule::load(&api, b".visible .entry scale(\0").unwrap();
        let function = module.function(&api, "scale").unwrap();

        assert_eq!(function.name(), "scale");
        assert_eq!(function.module(), module.handle());
        assert_ne!(function.handle(), module.handle());
        module.unload(&api).unwrap();
    }

    #[test]
    fn test_missing_function() {
        let driver = SimulatedDriver::new(ApiVersion::new(10, 2));
        let api = Api::with_version(&driver, ApiVersion::new(10, 2));

        let module = CuModule::load(&api, b".visible .entry scale(\0").unwrap();
        let err = module.function(&api, "shift").unwrap_err();
        assert_eq!(err.status(), Some(CuStatus::NOT_FOUND));
    }
}
