//! Kernel dispatch
//!
//! [`Launcher`] ties the pieces together:
//!
//! ```text
//! launch(config, callable, args)
//!   -> guess_types -> KernelCache (miss: Compiler -> DumpSink -> CuModule -> CuFunction)
//!   -> cuLaunchKernel(function, grid, block, shmem, stream, concrete args)
//! ```
//!
//! All calls are synchronous. Launching does not wait for the device to
//! finish; synchronization belongs to streams and events.

use super::cache::{KernelCache, KernelSignature};
use super::compile::{CompileRequest, Compiler};
use super::dump::DumpSink;
use super::types::{GuessedTypes, KernelArg, guess_types};
use crate::config::Config;
use crate::diagnostics::Result;
use crate::driver::{Api, CuFunction, CuModule, Driver, DriverArg, RawHandle};
use std::path::PathBuf;
use std::sync::Arc;

/// Launch configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchConfig {
    /// Grid dimensions (blocks)
    pub grid: (u32, u32, u32),

    /// Block dimensions (threads)
    pub block: (u32, u32, u32),

    /// Dynamic shared memory size in bytes
    pub shared_mem: u32,

    /// Stream handle; `0` is the default stream
    pub stream: RawHandle,
}

impl LaunchConfig {
    pub fn new(grid: (u32, u32, u32), block: (u32, u32, u32)) -> Self {
        Self {
            grid,
            block,
            shared_mem: 0,
            stream: 0,
        }
    }

    /// Create a 1D launch configuration
    pub fn new_1d(grid_size: u32, block_size: u32) -> Self {
        Self::new((grid_size, 1, 1), (block_size, 1, 1))
    }

    /// Create a 2D launch configuration
    pub fn new_2d(grid: (u32, u32), block: (u32, u32)) -> Self {
        Self::new((grid.0, grid.1, 1), (block.0, block.1, 1))
    }

    pub fn with_shared_mem(mut self, size: u32) -> Self {
        self.shared_mem = size;
        self
    }

    pub fn with_stream(mut self, stream: RawHandle) -> Self {
        self.stream = stream;
        self
    }
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self::new((1, 1, 1), (256, 1, 1))
    }
}

/// Compiles, caches and launches kernels
pub struct Launcher<D, C> {
    api: Api<D>,
    compiler: C,
    cache: KernelCache,
    dump: Option<DumpSink>,
}

impl<D: Driver, C: Compiler> Launcher<D, C> {
    pub fn new(api: Api<D>, compiler: C) -> Self {
        Self {
            api,
            compiler,
            cache: KernelCache::new(),
            dump: None,
        }
    }

    /// Build the driver view and dump sink from configuration
    pub fn from_config(driver: D, compiler: C, config: &Config) -> Result<Self> {
        let api = match config.driver_version {
            Some(version) => Api::with_version(driver, version),
            None => Api::new(driver)?,
        };
        let launcher = Self::new(api.with_trace(config.trace_api), compiler);
        Ok(match &config.dump_dir {
            Some(dir) => launcher.with_dump_dir(dir.clone()),
            None => launcher,
        })
    }

    /// Write IR and assembly of every compiled kernel to `dir`
    pub fn with_dump_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dump = Some(DumpSink::new(dir));
        self
    }

    pub fn api(&self) -> &Api<D> {
        &self.api
    }

    pub fn compiler(&self) -> &C {
        &self.compiler
    }

    pub fn cache(&self) -> &KernelCache {
        &self.cache
    }

    /// Compile (or fetch) the kernel for `callable` applied to `args`
    pub fn function(&self, callable: &str, args: &[KernelArg]) -> Result<Arc<CuFunction>> {
        let guessed = classify(args);
        self.cached_function(callable, &guessed)
    }

    /// Specialize `callable` on the argument types and launch it
    ///
    /// On a miss the new kernel is stored only once its first launch has
    /// succeeded.
    pub fn launch(&self, config: &LaunchConfig, callable: &str, args: &[KernelArg]) -> Result<()> {
        let guessed = classify(args);
        let signature = KernelSignature::new(callable, guessed.types.clone());

        let (function, hit) = self.cache.get_or_try_insert_with(signature, |signature| {
            let function = self.build(signature, &guessed)?;
            self.call_kernel(config, &function, &guessed, args)?;
            Ok(function)
        })?;

        if hit {
            tracing::debug!("kernel cache hit for {}", callable);
            self.call_kernel(config, &function, &guessed, args)?;
        }
        Ok(())
    }

    /// Launch an already loaded kernel; nothing is compiled or cached
    pub fn launch_function(
        &self,
        config: &LaunchConfig,
        function: &CuFunction,
        args: &[KernelArg],
    ) -> Result<()> {
        let guessed = classify(args);
        self.call_kernel(config, function, &guessed, args)
    }

    fn cached_function(&self, callable: &str, guessed: &GuessedTypes) -> Result<Arc<CuFunction>> {
        let signature = KernelSignature::new(callable, guessed.types.clone());

        let (function, hit) = self
            .cache
            .get_or_try_insert_with(signature, |signature| self.build(signature, guessed))?;

        if hit {
            tracing::debug!("kernel cache hit for {}", callable);
        }
        Ok(function)
    }

    fn build(&self, signature: &KernelSignature, guessed: &GuessedTypes) -> Result<CuFunction> {
        tracing::debug!("kernel cache miss for {}, compiling", signature);

        let request = CompileRequest {
            callable: &signature.callable,
            types: &guessed.types,
            concrete: &guessed.concrete,
            emit_artifacts: self.dump.is_some(),
        };
        let artifact = self.compiler.compile(&request)?;

        if let Some(dump) = &self.dump {
            dump.dump(signature, &artifact);
        }

        let module = CuModule::load(&self.api, &artifact.image)?;
        module.function(&self.api, &artifact.entry)
    }

    fn call_kernel(
        &self,
        config: &LaunchConfig,
        function: &CuFunction,
        guessed: &GuessedTypes,
        args: &[KernelArg],
    ) -> Result<()> {
        let params = guessed
            .filter(args)
            .into_iter()
            .map(KernelArg::to_param)
            .collect();

        let (gx, gy, gz) = config.grid;
        let (bx, by, bz) = config.block;
        let mut call = [
            DriverArg::Handle(function.handle()),
            DriverArg::U32(gx),
            DriverArg::U32(gy),
            DriverArg::U32(gz),
            DriverArg::U32(bx),
            DriverArg::U32(by),
            DriverArg::U32(bz),
            DriverArg::U32(config.shared_mem),
            DriverArg::Handle(config.stream),
            DriverArg::Params(params),
            DriverArg::Handle(0),
        ];
        self.api.call("cuLaunchKernel", &mut call)
    }
}

fn classify(args: &[KernelArg]) -> GuessedTypes {
    let types: Vec<_> = args.iter().map(KernelArg::arg_type).collect();
    guess_types(&types)
}

/// Launch a kernel with call syntax
///
/// ```ignore
/// launch!(launcher, ((4, 1, 1), (32, 1, 1)) vadd(a, b, n))?;
/// launch!(launcher, ((4, 1, 1), (32, 1, 1), 1024) reduce(a, out))?;
/// ```
///
/// Plain numbers convert through `KernelArg::from`.
#[macro_export]
macro_rules! launch {
    ($launcher:expr, ($grid:expr, $block:expr) $kernel:ident ( $($arg:expr),* $(,)? )) => {
        $crate::launch!($launcher, ($grid, $block, 0) $kernel($($arg),*))
    };
    ($launcher:expr, ($grid:expr, $block:expr, $shmem:expr) $kernel:ident ( $($arg:expr),* $(,)? )) => {
        $launcher.launch(
            &$crate::LaunchConfig::new($grid, $block).with_shared_mem($shmem),
            stringify!($kernel),
            &[$($crate::KernelArg::from($arg)),*],
        )
    };
}
