//! Compiled-kernel cache
//!
//! One entry per distinct (callable, rewritten argument types) pair, filled
//! lazily on first launch and kept for the lifetime of the cache. There is no
//! eviction: the key space is the set of call sites and type combinations a
//! process actually uses.
//!
//! Entries are inserted under the map's entry lock, so concurrent launches of
//! the same signature compile it once; the others wait and reuse the result.
//! The launcher runs the first launch inside the build, so a kernel whose
//! first launch fails is never stored.

use super::compile::signature_string;
use super::types::ArgType;
use crate::diagnostics::Result;
use crate::driver::CuFunction;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::fmt;
use std::sync::Arc;

/// Cache key of a compiled variant
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KernelSignature {
    pub callable: String,
    pub types: Vec<ArgType>,
}

impl KernelSignature {
    pub fn new(callable: impl Into<String>, types: Vec<ArgType>) -> Self {
        Self {
            callable: callable.into(),
            types,
        }
    }
}

impl fmt::Display for KernelSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.callable, signature_string(&self.types))
    }
}

/// Process-lifetime map from signature to loaded kernel
#[derive(Debug, Default)]
pub struct KernelCache {
    entries: DashMap<KernelSignature, Arc<CuFunction>>,
}

impl KernelCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, signature: &KernelSignature) -> Option<Arc<CuFunction>> {
        self.entries
            .get(signature)
            .map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, signature: &KernelSignature) -> bool {
        self.entries.contains_key(signature)
    }

    /// Return the cached kernel, or build and store it
    ///
    /// The boolean is `true` on a hit. A failing `build` stores nothing.
    /// `build` runs while the entry is locked and must not touch this cache.
    pub fn get_or_try_insert_with<F>(
        &self,
        signature: KernelSignature,
        build: F,
    ) -> Result<(Arc<CuFunction>, bool)>
    where
        F: FnOnce(&KernelSignature) -> Result<CuFunction>,
    {
        match self.entries.entry(signature) {
            Entry::Occupied(entry) => Ok((Arc::clone(entry.get()), true)),
            Entry::Vacant(entry) => {
                let function = Arc::new(build(entry.key())?);
                entry.insert(Arc::clone(&function));
                Ok((function, false))
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Signatures currently cached, in no particular order
    pub fn signatures(&self) -> Vec<KernelSignature> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Error;
    use crate::driver::{Api, ApiVersion, CuModule, SimulatedDriver};
    use crate::kernel::types::ScalarKind;

    fn load(api: &Api<&SimulatedDriver>) -> Result<CuFunction> {
        CuModule::load(api, b".entry k\0")?.function(api, "k")
    }

    #[test]
    fn test_signature_equality() {
        let a = KernelSignature::new("k", vec![ArgType::Scalar(ScalarKind::F32)]);
        let b = KernelSignature::new("k", vec![ArgType::Scalar(ScalarKind::F32)]);
        let c = KernelSignature::new("k", vec![ArgType::Scalar(ScalarKind::F64)]);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.to_string(), "k(f32)");
    }

    #[test]
    fn test_hit_reuses_handle() {
        let driver = SimulatedDriver::new(ApiVersion::new(10, 2));
        let api = Api::with_version(&driver, ApiVersion::new(10, 2));
        let cache = KernelCache::new();
        let sig = KernelSignature::new("k", vec![ArgType::Scalar(ScalarKind::I32)]);

        let (first, hit) = cache.get_or_try_insert_with(sig.clone(), |_| load(&api)).unwrap();
        assert!(!hit);
        let (second, hit) = cache
            .get_or_try_insert_with(sig.clone(), |_| panic!("must not rebuild"))
            .unwrap();
        assert!(hit);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&sig).as_deref(), Some(&*first));
    }

    #[test]
    fn test_failed_build_stores_nothing() {
        let cache = KernelCache::new();
        let sig = KernelSignature::new("k", vec![]);

        let err = cache
            .get_or_try_insert_with(sig.clone(), |sig| {
                Err(Error::NoMethod {
                    callable: sig.callable.clone(),
                    signature: String::new(),
                })
            })
            .unwrap_err();
        assert!(matches!(err, Error::NoMethod { .. }));
        assert!(!cache.contains(&sig));
        assert!(cache.is_empty());
    }
}
