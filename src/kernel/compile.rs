//! Compiler collaborator interface
//!
//! The dispatcher never generates code itself. It hands a callable and its
//! rewritten argument types to a [`Compiler`] and gets back a loadable image
//! plus the name of the entry point inside it.

use super::types::ArgType;
use crate::diagnostics::{Error, Result};
use indexmap::IndexMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// What to compile
#[derive(Debug, Clone, Copy)]
pub struct CompileRequest<'a> {
    /// Callable identity
    pub callable: &'a str,
    /// Rewritten types, one per launch argument
    pub types: &'a [ArgType],
    /// Which of `types` are passed to the device
    pub concrete: &'a [bool],
    /// Ask for IR and assembly text alongside the image
    pub emit_artifacts: bool,
}

impl CompileRequest<'_> {
    /// Types of the parameters the kernel actually receives
    pub fn param_types(&self) -> Vec<&ArgType> {
        self.types
            .iter()
            .zip(self.concrete)
            .filter_map(|(ty, concrete)| concrete.then_some(ty))
            .collect()
    }
}

/// Compiled code ready for `cuModuleLoadData`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// PTX (NUL-terminated) or cubin
    pub image: Vec<u8>,
    /// Entry symbol inside `image`
    pub entry: String,
    /// Intermediate representation, for diagnostics
    pub ir: Option<String>,
    /// Generated assembly, for diagnostics
    pub asm: Option<String>,
}

/// Host compiler backend
pub trait Compiler: Send + Sync {
    /// Fails with [`Error::NoMethod`] when nothing matches the request and
    /// with [`Error::CompileFailed`] when the backend rejects it
    fn compile(&self, request: &CompileRequest<'_>) -> Result<Artifact>;
}

impl<C: Compiler + ?Sized> Compiler for Arc<C> {
    fn compile(&self, request: &CompileRequest<'_>) -> Result<Artifact> {
        (**self).compile(request)
    }
}

impl<C: Compiler + ?Sized> Compiler for &C {
    fn compile(&self, request: &CompileRequest<'_>) -> Result<Artifact> {
        (**self).compile(request)
    }
}

/// Comma-separated rendering of a type list
pub fn signature_string<'a>(types: impl IntoIterator<Item = &'a ArgType>) -> String {
    types
        .into_iter()
        .map(|ty| ty.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Precompiled method
#[derive(Debug, Clone)]
struct Method {
    params: Vec<ArgType>,
    entry: String,
    ptx: String,
}

/// Compiler over a registry of precompiled PTX methods
///
/// Dispatch is an exact match of the concrete parameter types against each
/// registered method of the callable, in registration order.
#[derive(Debug, Default)]
pub struct MethodTable {
    methods: IndexMap<String, Vec<Method>>,
    compilations: AtomicUsize,
}

impl MethodTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register PTX implementing `callable` for the given parameter types
    pub fn register(
        &mut self,
        callable: impl Into<String>,
        params: Vec<ArgType>,
        entry: impl Into<String>,
        ptx: impl Into<String>,
    ) -> &mut Self {
        self.methods.entry(callable.into()).or_default().push(Method {
            params,
            entry: entry.into(),
            ptx: ptx.into(),
        });
        self
    }

    /// Number of successful compilations so far
    pub fn compilations(&self) -> usize {
        self.compilations.load(Ordering::Relaxed)
    }

    pub fn callables(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }
}

impl Compiler for MethodTable {
    fn compile(&self, request: &CompileRequest<'_>) -> Result<Artifact> {
        let params = request.param_types();
        let no_method = || Error::NoMethod {
            callable: request.callable.to_string(),
            signature: signature_string(params.iter().copied()),
        };

        let method = self
            .methods
            .get(request.callable)
            .and_then(|methods| {
                methods.iter().find(|m| {
                    m.params.len() == params.len()
                        && m.params.iter().zip(&params).all(|(a, b)| a == *b)
                })
            })
            .ok_or_else(no_method)?;

        if !method.ptx.contains(method.entry.as_str()) {
            return Err(Error::CompileFailed {
                callable: request.callable.to_string(),
                message: format!("PTX does not define entry `{}`", method.entry),
            });
        }

        let mut image = method.ptx.clone().into_bytes();
        if image.last() != Some(&0) {
            image.push(0);
        }

        self.compilations.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            "compiled {}({}) -> {}",
            request.callable,
            signature_string(params.iter().copied()),
            method.entry
        );

        Ok(Artifact {
            image,
            entry: method.entry.clone(),
            ir: None,
            asm: request.emit_artifacts.then(|| method.ptx.clone()),
        })
    }
}
