//! cudajit CLI
//!
//! Main entry point for the `cujit` command.

use clap::{Parser, Subcommand};
use cudajit::driver::{Resolution, SymbolTable};
use cudajit::kernel::{ArgType, KernelArg, LaunchConfig, Launcher, MethodTable, ScalarKind};
use cudajit::{ApiVersion, Config, CuStatus, SimulatedDriver, guess_types};
use miette::Result;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "cujit")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "JIT kernel dispatch over the CUDA driver API", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ./cudajit.toml when present)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a logical driver function to its versioned export
    Resolve {
        /// Logical name, e.g. cuCtxDestroy
        #[arg(value_name = "NAME")]
        name: String,

        /// Driver API version (e.g. 10.2)
        #[arg(short = 'd', long)]
        driver_version: Option<ApiVersion>,
    },

    /// List the symbol table for a driver version
    Symbols {
        /// Driver API version (e.g. 10.2)
        #[arg(short = 'd', long)]
        driver_version: Option<ApiVersion>,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Describe a driver status code
    Status {
        #[arg(value_name = "CODE")]
        code: i32,
    },

    /// Dry-run a PTX kernel launch against the simulated driver
    Launch {
        /// PTX file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Entry symbol inside the PTX
        #[arg(short, long)]
        entry: String,

        /// Grid dimensions, e.g. 4 or 4,2,1
        #[arg(long, default_value = "1")]
        grid: Dims,

        /// Block dimensions, e.g. 32 or 16,16
        #[arg(long, default_value = "1")]
        block: Dims,

        /// Dynamic shared memory in bytes
        #[arg(long, default_value = "0")]
        shmem: u32,

        /// Kernel argument, e.g. i32:4, f32:1.5, ptr:f32:0x1000, ghost:Nothing
        #[arg(short, long = "arg", value_name = "ARG")]
        args: Vec<CliArg>,

        /// Number of launches
        #[arg(long, default_value = "1")]
        repeat: usize,

        /// Driver API version of the simulated driver
        #[arg(short = 'd', long)]
        driver_version: Option<ApiVersion>,
    },

    /// Show information about the build
    Info,
}

/// Grid or block dimensions
#[derive(Debug, Clone, Copy)]
struct Dims((u32, u32, u32));

impl std::str::FromStr for Dims {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let parts = s
            .split(',')
            .map(|p| p.trim().parse::<u32>().map_err(|e| format!("`{p}`: {e}")))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        match parts.as_slice() {
            [x] => Ok(Dims((*x, 1, 1))),
            [x, y] => Ok(Dims((*x, *y, 1))),
            [x, y, z] => Ok(Dims((*x, *y, *z))),
            _ => Err(format!("expected 1 to 3 dimensions, got `{s}`")),
        }
    }
}

/// Kernel argument given on the command line
#[derive(Debug, Clone)]
struct CliArg(KernelArg);

impl std::str::FromStr for CliArg {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (kind, value) = s
            .split_once(':')
            .ok_or_else(|| format!("expected KIND:VALUE, got `{s}`"))?;
        let bad = |e: &dyn std::fmt::Display| format!("`{s}`: {e}");

        let arg = match kind {
            "bool" => KernelArg::Bool(value.parse().map_err(|e| bad(&e))?),
            "i32" => KernelArg::Int32(value.parse().map_err(|e| bad(&e))?),
            "i64" => KernelArg::Int64(value.parse().map_err(|e| bad(&e))?),
            "u32" => KernelArg::UInt32(value.parse().map_err(|e| bad(&e))?),
            "u64" => KernelArg::UInt64(value.parse().map_err(|e| bad(&e))?),
            "f32" => KernelArg::Float32(value.parse().map_err(|e| bad(&e))?),
            "f64" => KernelArg::Float64(value.parse().map_err(|e| bad(&e))?),
            "ghost" => KernelArg::ghost(value),
            "ptr" => {
                let (elem, addr) = value
                    .split_once(':')
                    .ok_or_else(|| format!("expected ptr:ELEM:ADDR, got `{s}`"))?;
                let addr = u64::from_str_radix(addr.trim_start_matches("0x"), 16)
                    .map_err(|e| bad(&e))?;
                KernelArg::pointer(parse_scalar(elem).ok_or_else(|| bad(&elem))?, addr)
            }
            _ => return Err(format!("unknown argument kind `{kind}`")),
        };
        Ok(CliArg(arg))
    }
}

fn parse_scalar(name: &str) -> Option<ScalarKind> {
    Some(match name {
        "bool" => ScalarKind::Bool,
        "i32" => ScalarKind::I32,
        "i64" => ScalarKind::I64,
        "u32" => ScalarKind::U32,
        "u64" => ScalarKind::U64,
        "f32" => ScalarKind::F32,
        "f64" => ScalarKind::F64,
        _ => return None,
    })
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if cli.verbose {
        tracing::info!("Verbose mode enabled");
    }

    let config = Config::discover(cli.config.as_deref())?;

    match cli.command {
        Commands::Resolve {
            name,
            driver_version,
        } => resolve(&name, driver_version.or(config.driver_version)),

        Commands::Symbols {
            driver_version,
            json,
        } => symbols(driver_version.or(config.driver_version), json),

        Commands::Status { code } => status(code),

        Commands::Launch {
            input,
            entry,
            grid,
            block,
            shmem,
            args,
            repeat,
            driver_version,
        } => {
            let config = Config {
                driver_version: driver_version.or(config.driver_version),
                ..config
            };
            let launch = LaunchConfig::new(grid.0, block.0).with_shared_mem(shmem);
            let args: Vec<KernelArg> = args.into_iter().map(|a| a.0).collect();
            launch_ptx(&config, &input, &entry, &launch, &args, repeat)
        }

        Commands::Info => info(),
    }
}

fn version_or_latest(version: Option<ApiVersion>) -> ApiVersion {
    version.unwrap_or(ApiVersion::new(10, 2))
}

fn resolve(name: &str, version: Option<ApiVersion>) -> Result<()> {
    let table = SymbolTable::for_version(version_or_latest(version));
    let export = table.resolve(name)?;
    println!("{}", export);
    Ok(())
}

fn symbols(version: Option<ApiVersion>, json: bool) -> Result<()> {
    let table = SymbolTable::for_version(version_or_latest(version));

    if json {
        let entries: indexmap::IndexMap<&str, &Resolution> = table.entries().collect();
        let json = serde_json::to_string_pretty(&entries)
            .map_err(|e| miette::miette!("Failed to serialize symbol table: {}", e))?;
        println!("{}", json);
        return Ok(());
    }

    println!("=== Driver API {} ===", table.version());
    for (name, resolution) in table.entries() {
        match resolution {
            Resolution::Unmapped => println!("  {name}"),
            Resolution::Versioned { export } => println!("  {name} -> {export}"),
            Resolution::Unavailable { minimum } => {
                println!("  {name} (unavailable, requires {minimum})")
            }
        }
    }
    println!("Total: {} symbols", table.len());
    Ok(())
}

fn status(code: i32) -> Result<()> {
    let status = CuStatus(code);
    println!("{}: {}", status, status.description());
    Ok(())
}

fn launch_ptx(
    config: &Config,
    input: &std::path::Path,
    entry: &str,
    launch: &LaunchConfig,
    args: &[KernelArg],
    repeat: usize,
) -> Result<()> {
    tracing::info!("Launching {} from {:?}", entry, input);

    let ptx = std::fs::read_to_string(input)
        .map_err(|e| miette::miette!("Failed to read input file: {}", e))?;

    // register the file as the one method of `entry` for exactly these arguments
    let types: Vec<ArgType> = args.iter().map(KernelArg::arg_type).collect();
    let mut methods = MethodTable::new();
    methods.register(entry, guess_types(&types).concrete_types(), entry, ptx);

    let driver = SimulatedDriver::new(version_or_latest(config.driver_version));
    let launcher = Launcher::from_config(&driver, methods, config)?;

    for _ in 0..repeat {
        launcher.launch(launch, entry, args)?;
    }

    println!("=== Driver calls ===");
    for call in driver.invocations() {
        println!("  {}{:?} = {}", call.symbol, call.args, call.status);
    }
    println!(
        "{} launch(es), {} compilation(s), {} cached kernel(s)",
        repeat,
        launcher.compiler().compilations(),
        launcher.cache().len()
    );
    Ok(())
}

fn info() -> Result<()> {
    println!("cudajit");
    println!("Version: {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Configuration:");
    println!("  - file: {}", cudajit::config::DEFAULT_CONFIG_FILE);
    println!("  - {}", cudajit::config::ENV_DRIVER_VERSION);
    println!("  - {}", cudajit::config::ENV_DUMP_DIR);
    println!("  - {}", cudajit::config::ENV_TRACE);
    println!();
    println!("Driver:");
    println!("  - Simulated (dry runs)");
    Ok(())
}
