//! JIT kernel specialization and dispatch
//!
//! Architecture:
//! ```text
//! KernelArg -> ArgType -> guess_types -> KernelSignature -> KernelCache
//!                                                  (miss) -> Compiler -> DumpSink -> CuModule
//! ```

pub mod cache;
pub mod compile;
pub mod dump;
pub mod launch;
pub mod types;

pub use cache::{KernelCache, KernelSignature};
pub use compile::{Artifact, CompileRequest, Compiler, MethodTable};
pub use dump::DumpSink;
pub use launch::{LaunchConfig, Launcher};
pub use types::{ArgType, GuessedTypes, KernelArg, ScalarKind, guess_types};
