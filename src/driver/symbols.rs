//! Versioned driver API symbol resolution
//!
//! The CUDA driver keeps old entry points exported for ABI compatibility and
//! adds suffixed replacements (`cuMemAlloc_v2`, `cuTexRefSetAddress2D_v3`, ...)
//! when a signature changes. Which export to bind depends on the installed
//! driver version. Some operations do not exist at all below a given version;
//! calling those must fail instead of binding a missing symbol.
//!
//! The [`SymbolTable`] is built once from the detected version and never
//! mutated afterwards.

use super::version::ApiVersion;
use crate::diagnostics::{Error, Result};
use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;
use serde::Serialize;

/// Renames that apply from a driver version onwards: `(logical, suffix)`
type RenameRule = (ApiVersion, &'static [(&'static str, &'static str)]);

const RENAME_RULES: &[RenameRule] = &[
    (
        ApiVersion::new(3, 2),
        &[
            ("cuDeviceTotalMem", "_v2"),
            ("cuCtxCreate", "_v2"),
            ("cuModuleGetGlobal", "_v2"),
            ("cuMemGetInfo", "_v2"),
            ("cuMemAlloc", "_v2"),
            ("cuMemAllocPitch", "_v2"),
            ("cuMemFree", "_v2"),
            ("cuMemGetAddressRange", "_v2"),
            ("cuMemAllocHost", "_v2"),
            ("cuMemHostGetDevicePointer", "_v2"),
            ("cuMemcpyHtoD", "_v2"),
            ("cuMemcpyDtoH", "_v2"),
            ("cuMemcpyDtoD", "_v2"),
            ("cuMemcpyDtoA", "_v2"),
            ("cuMemcpyAtoD", "_v2"),
            ("cuMemcpyHtoA", "_v2"),
            ("cuMemcpyAtoH", "_v2"),
            ("cuMemcpyAtoA", "_v2"),
            ("cuMemcpyHtoAAsync", "_v2"),
            ("cuMemcpyAtoHAsync", "_v2"),
            ("cuMemcpy2D", "_v2"),
            ("cuMemcpy2DUnaligned", "_v2"),
            ("cuMemcpy3D", "_v2"),
            ("cuMemcpyHtoDAsync", "_v2"),
            ("cuMemcpyDtoHAsync", "_v2"),
            ("cuMemcpyDtoDAsync", "_v2"),
            ("cuMemcpy2DAsync", "_v2"),
            ("cuMemcpy3DAsync", "_v2"),
            ("cuMemsetD8", "_v2"),
            ("cuMemsetD16", "_v2"),
            ("cuMemsetD32", "_v2"),
            ("cuMemsetD2D8", "_v2"),
            ("cuMemsetD2D16", "_v2"),
            ("cuMemsetD2D32", "_v2"),
            ("cuArrayCreate", "_v2"),
            ("cuArrayGetDescriptor", "_v2"),
            ("cuArray3DCreate", "_v2"),
            ("cuArray3DGetDescriptor", "_v2"),
            ("cuTexRefSetAddress", "_v2"),
            ("cuTexRefSetAddress2D", "_v2"),
            ("cuTexRefGetAddress", "_v2"),
            ("cuGraphicsResourceGetMappedPointer", "_v2"),
        ],
    ),
    (
        ApiVersion::new(4, 0),
        &[
            ("cuCtxDestroy", "_v2"),
            ("cuCtxPopCurrent", "_v2"),
            ("cuCtxPushCurrent", "_v2"),
            ("cuStreamDestroy", "_v2"),
            ("cuEventDestroy", "_v2"),
        ],
    ),
    (ApiVersion::new(4, 1), &[("cuTexRefSetAddress2D", "_v3")]),
    (
        ApiVersion::new(6, 5),
        &[
            ("cuLinkCreate", "_v2"),
            ("cuLinkAddData", "_v2"),
            ("cuLinkAddFile", "_v2"),
            ("cuMemHostRegister", "_v2"),
            ("cuGraphicsResourceSetMapFlags", "_v2"),
        ],
    ),
];

/// Operations that do not exist below the given driver version
const MINIMUM_VERSIONS: &[(&str, ApiVersion)] = &[
    ("cuCtxGetCurrent", ApiVersion::new(4, 0)),
    ("cuCtxSetCurrent", ApiVersion::new(4, 0)),
    ("cuDeviceCanAccessPeer", ApiVersion::new(4, 0)),
    ("cuCtxEnablePeerAccess", ApiVersion::new(4, 0)),
    ("cuCtxDisablePeerAccess", ApiVersion::new(4, 0)),
    ("cuMemcpyPeer", ApiVersion::new(4, 0)),
    ("cuMemcpyPeerAsync", ApiVersion::new(4, 0)),
    ("cuPointerGetAttribute", ApiVersion::new(4, 0)),
    ("cuMemHostRegister", ApiVersion::new(4, 0)),
    ("cuMemHostUnregister", ApiVersion::new(4, 0)),
    ("cuLaunchKernel", ApiVersion::new(4, 0)),
    ("cuLinkCreate", ApiVersion::new(5, 5)),
    ("cuLinkAddData", ApiVersion::new(5, 5)),
    ("cuLinkAddFile", ApiVersion::new(5, 5)),
    ("cuLinkComplete", ApiVersion::new(5, 5)),
    ("cuLinkDestroy", ApiVersion::new(5, 5)),
    ("cuStreamCreateWithPriority", ApiVersion::new(5, 5)),
    ("cuCtxGetStreamPriorityRange", ApiVersion::new(5, 5)),
    ("cuMemAllocManaged", ApiVersion::new(6, 0)),
    ("cuOccupancyMaxActiveBlocksPerMultiprocessor", ApiVersion::new(6, 5)),
    ("cuOccupancyMaxPotentialBlockSize", ApiVersion::new(6, 5)),
    ("cuDevicePrimaryCtxRetain", ApiVersion::new(7, 0)),
    ("cuDevicePrimaryCtxRelease", ApiVersion::new(7, 0)),
    ("cuDevicePrimaryCtxReset", ApiVersion::new(7, 0)),
    ("cuDevicePrimaryCtxGetState", ApiVersion::new(7, 0)),
    ("cuDevicePrimaryCtxSetFlags", ApiVersion::new(7, 0)),
    ("cuStreamWaitValue32", ApiVersion::new(8, 0)),
    ("cuStreamWriteValue32", ApiVersion::new(8, 0)),
];

/// How a logical driver function name binds for the detected version
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Resolution {
    /// Exported under its logical name
    Unmapped,
    /// Exported under a suffixed name
    Versioned { export: String },
    /// Not provided by this driver version
    Unavailable { minimum: ApiVersion },
}

/// Immutable logical-name to export-name table
#[derive(Debug, Clone)]
pub struct SymbolTable {
    version: ApiVersion,
    entries: IndexMap<String, Resolution, FxBuildHasher>,
}

impl SymbolTable {
    /// Build the table for a detected driver version
    pub fn for_version(version: ApiVersion) -> Self {
        let mut entries: IndexMap<String, Resolution, FxBuildHasher> = IndexMap::default();

        let mut rules: Vec<&RenameRule> = RENAME_RULES.iter().collect();
        rules.sort_by_key(|(threshold, _)| *threshold);

        for (threshold, renames) in rules {
            for (logical, suffix) in renames.iter() {
                if version < *threshold {
                    // keep whatever a lower rule installed
                    entries
                        .entry(logical.to_string())
                        .or_insert(Resolution::Unmapped);
                    continue;
                }
                entries.insert(
                    logical.to_string(),
                    Resolution::Versioned {
                        export: format!("{logical}{suffix}"),
                    },
                );
            }
        }

        for (logical, minimum) in MINIMUM_VERSIONS {
            if version < *minimum {
                entries.insert(
                    logical.to_string(),
                    Resolution::Unavailable { minimum: *minimum },
                );
            } else {
                entries
                    .entry(logical.to_string())
                    .or_insert(Resolution::Unmapped);
            }
        }

        tracing::debug!(
            "built driver symbol table for API {} ({} known symbols)",
            version,
            entries.len()
        );

        Self { version, entries }
    }

    /// Driver version the table was built for
    pub fn version(&self) -> ApiVersion {
        self.version
    }

    /// Look up how `name` binds, without failing on unavailable entries
    pub fn lookup(&self, name: &str) -> &Resolution {
        self.entries.get(name).unwrap_or(&Resolution::Unmapped)
    }

    /// Map a logical name to the export to bind
    pub fn resolve<'a>(&'a self, name: &'a str) -> Result<&'a str> {
        match self.lookup(name) {
            Resolution::Unmapped => Ok(name),
            Resolution::Versioned { export } => Ok(export.as_str()),
            Resolution::Unavailable { minimum } => Err(Error::VersionUnavailable {
                name: name.to_string(),
                minimum: *minimum,
            }),
        }
    }

    /// Every known name with its resolution, in rule order
    pub fn entries(&self) -> impl Iterator<Item = (&str, &Resolution)> {
        self.entries.iter().map(|(name, res)| (name.as_str(), res))
    }

    /// Whether `name` is one of the logical names the table knows about
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
