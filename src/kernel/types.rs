//! Kernel argument types and classification
//!
//! Every launch argument carries an [`ArgType`] descriptor. [`guess_types`]
//! rewrites those descriptors into the types the compiled kernel is
//! specialized on, and decides which arguments are actually passed to the
//! device.

use crate::driver::ParamValue;
use std::fmt;

/// Flat scalar element type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Bool,
    I32,
    I64,
    U32,
    U64,
    F32,
    F64,
}

impl ScalarKind {
    pub fn size(self) -> usize {
        match self {
            ScalarKind::Bool => 1,
            ScalarKind::I32 | ScalarKind::U32 | ScalarKind::F32 => 4,
            ScalarKind::I64 | ScalarKind::U64 | ScalarKind::F64 => 8,
        }
    }

    /// PTX register type
    pub fn ptx(self) -> &'static str {
        match self {
            ScalarKind::Bool => ".pred",
            ScalarKind::I32 => ".s32",
            ScalarKind::I64 => ".s64",
            ScalarKind::U32 => ".u32",
            ScalarKind::U64 => ".u64",
            ScalarKind::F32 => ".f32",
            ScalarKind::F64 => ".f64",
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScalarKind::Bool => "bool",
            ScalarKind::I32 => "i32",
            ScalarKind::I64 => "i64",
            ScalarKind::U32 => "u32",
            ScalarKind::U64 => "u64",
            ScalarKind::F32 => "f32",
            ScalarKind::F64 => "f64",
        };
        f.write_str(name)
    }
}

/// Type descriptor of a launch argument
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArgType {
    Scalar(ScalarKind),
    /// Self-contained value type passed by its bytes
    Struct {
        name: String,
        size: usize,
        mutable: bool,
    },
    /// Zero-size immutable value, never materialized on the device
    Ghost(String),
    /// Function or closure; `size` counts captured state
    Callable { name: String, size: usize },
    /// Typed device pointer
    DevicePtr(ScalarKind),
    /// Device-resident array
    DeviceArray { elem: ScalarKind, ndims: usize },
    /// Raw device address, as passed to the kernel
    RawPtr(ScalarKind),
    /// Host object with no device representation
    Host(String),
}

impl ArgType {
    /// Byte size of a value-semantic type, `None` for anything else
    pub fn size(&self) -> Option<usize> {
        match self {
            ArgType::Scalar(kind) => Some(kind.size()),
            ArgType::Struct { size, .. } | ArgType::Callable { size, .. } => Some(*size),
            ArgType::Ghost(_) => Some(0),
            ArgType::RawPtr(_) => Some(8),
            ArgType::DevicePtr(_) | ArgType::DeviceArray { .. } | ArgType::Host(_) => None,
        }
    }

    /// Zero-size immutable type
    ///
    /// A zero-size mutable struct keeps its identity on the device and stays
    /// concrete. Callables are immutable.
    pub fn is_ghost(&self) -> bool {
        match self {
            ArgType::Struct { mutable: true, .. } => false,
            ty => ty.size() == Some(0),
        }
    }

    /// Flat, self-contained type that can be copied to the device as is
    pub fn is_value(&self) -> bool {
        self.size().is_some()
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, ArgType::Callable { .. })
    }
}

impl fmt::Display for ArgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgType::Scalar(kind) => write!(f, "{kind}"),
            ArgType::Struct { name, .. } => write!(f, "{name}"),
            ArgType::Ghost(name) => write!(f, "{name}"),
            ArgType::Callable { name, .. } => write!(f, "typeof({name})"),
            ArgType::DevicePtr(elem) => write!(f, "DevicePtr<{elem}>"),
            ArgType::DeviceArray { elem, ndims } => write!(f, "DeviceArray<{elem}, {ndims}>"),
            ArgType::RawPtr(elem) => write!(f, "*{elem}"),
            ArgType::Host(name) => write!(f, "{name}"),
        }
    }
}

/// Rewritten argument types and which positions are passed to the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuessedTypes {
    pub types: Vec<ArgType>,
    pub concrete: Vec<bool>,
}

impl GuessedTypes {
    /// Keep only the items at concrete positions
    pub fn filter<'a, T>(&self, items: &'a [T]) -> Vec<&'a T> {
        items
            .iter()
            .zip(&self.concrete)
            .filter_map(|(item, concrete)| concrete.then_some(item))
            .collect()
    }

    /// Rewritten types at concrete positions
    pub fn concrete_types(&self) -> Vec<ArgType> {
        self.filter(&self.types).into_iter().cloned().collect()
    }
}

/// Classify argument types for the low-level call
///
/// Zero-size immutable types and a leading callable are non-concrete; they
/// select the compiled variant but are not passed. Device pointers and arrays
/// become raw pointers over their element type. Anything without a device
/// representation is passed unchanged after a warning.
pub fn guess_types(args: &[ArgType]) -> GuessedTypes {
    let mut types = Vec::with_capacity(args.len());
    let mut concrete = Vec::with_capacity(args.len());

    for (i, ty) in args.iter().enumerate() {
        let is_concrete = if ty.is_ghost() {
            false
        } else {
            !(i == 0 && ty.is_callable())
        };
        concrete.push(is_concrete);

        let rewritten = match ty {
            ArgType::DevicePtr(elem) | ArgType::DeviceArray { elem, .. } => {
                ArgType::RawPtr(*elem)
            }
            ty if ty.is_value() => ty.clone(),
            ty => {
                tracing::warn!("cannot guess type of argument {} ({}), passing as-is", i, ty);
                ty.clone()
            }
        };
        types.push(rewritten);
    }

    GuessedTypes { types, concrete }
}

/// Runtime launch argument
#[derive(Debug, Clone, PartialEq)]
pub enum KernelArg {
    Bool(bool),
    Int32(i32),
    Int64(i64),
    UInt32(u32),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
    Struct {
        name: String,
        bytes: Vec<u8>,
        mutable: bool,
    },
    Ghost(String),
    Callable { name: String, captures: Vec<u8> },
    DevicePtr { elem: ScalarKind, addr: u64 },
    DeviceArray { elem: ScalarKind, addr: u64, dims: Vec<usize> },
    Host { name: String, bytes: Vec<u8> },
}

impl KernelArg {
    pub fn ghost(name: impl Into<String>) -> Self {
        KernelArg::Ghost(name.into())
    }

    /// Function value with no captured state
    pub fn function(name: impl Into<String>) -> Self {
        KernelArg::Callable {
            name: name.into(),
            captures: Vec::new(),
        }
    }

    pub fn pointer(elem: ScalarKind, addr: u64) -> Self {
        KernelArg::DevicePtr { elem, addr }
    }

    pub fn array(elem: ScalarKind, addr: u64, dims: &[usize]) -> Self {
        KernelArg::DeviceArray {
            elem,
            addr,
            dims: dims.to_vec(),
        }
    }

    pub fn arg_type(&self) -> ArgType {
        match self {
            KernelArg::Bool(_) => ArgType::Scalar(ScalarKind::Bool),
            KernelArg::Int32(_) => ArgType::Scalar(ScalarKind::I32),
            KernelArg::Int64(_) => ArgType::Scalar(ScalarKind::I64),
            KernelArg::UInt32(_) => ArgType::Scalar(ScalarKind::U32),
            KernelArg::UInt64(_) => ArgType::Scalar(ScalarKind::U64),
            KernelArg::Float32(_) => ArgType::Scalar(ScalarKind::F32),
            KernelArg::Float64(_) => ArgType::Scalar(ScalarKind::F64),
            KernelArg::Struct {
                name,
                bytes,
                mutable,
            } => ArgType::Struct {
                name: name.clone(),
                size: bytes.len(),
                mutable: *mutable,
            },
            KernelArg::Ghost(name) => ArgType::Ghost(name.clone()),
            KernelArg::Callable { name, captures } => ArgType::Callable {
                name: name.clone(),
                size: captures.len(),
            },
            KernelArg::DevicePtr { elem, .. } => ArgType::DevicePtr(*elem),
            KernelArg::DeviceArray { elem, dims, .. } => ArgType::DeviceArray {
                elem: *elem,
                ndims: dims.len(),
            },
            KernelArg::Host { name, .. } => ArgType::Host(name.clone()),
        }
    }

    /// Value as it lands in `kernelParams`
    pub fn to_param(&self) -> ParamValue {
        match self {
            KernelArg::Bool(v) => ParamValue::Bool(*v),
            KernelArg::Int32(v) => ParamValue::I32(*v),
            KernelArg::Int64(v) => ParamValue::I64(*v),
            KernelArg::UInt32(v) => ParamValue::U32(*v),
            KernelArg::UInt64(v) => ParamValue::U64(*v),
            KernelArg::Float32(v) => ParamValue::F32(*v),
            KernelArg::Float64(v) => ParamValue::F64(*v),
            KernelArg::DevicePtr { addr, .. } | KernelArg::DeviceArray { addr, .. } => {
                ParamValue::Ptr(*addr)
            }
            KernelArg::Struct { bytes, .. }
            | KernelArg::Callable {
                captures: bytes, ..
            }
            | KernelArg::Host { bytes, .. } => ParamValue::Bytes(bytes.clone()),
            KernelArg::Ghost(_) => ParamValue::Bytes(Vec::new()),
        }
    }
}

macro_rules! impl_from_scalar {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for KernelArg {
                fn from(value: $ty) -> Self {
                    KernelArg::$variant(value)
                }
            }
        )*
    };
}

impl_from_scalar! {
    bool => Bool,
    i32 => Int32,
    i64 => Int64,
    u32 => UInt32,
    u64 => UInt64,
    f32 => Float32,
    f64 => Float64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_ghost_is_not_concrete() {
        let guessed = guess_types(&[
            ArgType::Scalar(ScalarKind::F32),
            ArgType::Ghost("Nothing".to_string()),
            ArgType::Struct {
                name: "Empty".to_string(),
                size: 0,
                mutable: false,
            },
        ]);
        assert_eq!(guessed.concrete, vec![true, false, false]);
        assert_eq!(guessed.types[1], ArgType::Ghost("Nothing".to_string()));
    }

    #[test]
    fn test_zero_size_mutable_struct_is_concrete() {
        let counter = ArgType::Struct {
            name: "Counter".to_string(),
            size: 0,
            mutable: true,
        };
        assert!(!counter.is_ghost());

        let guessed = guess_types(&[counter.clone(), ArgType::Scalar(ScalarKind::I32)]);
        assert_eq!(guessed.concrete, vec![true, true]);
        assert_eq!(guessed.types[0], counter);
    }

    #[test]
    fn test_leading_callable_is_not_concrete() {
        let closure = ArgType::Callable {
            name: "saxpy".to_string(),
            size: 4,
        };
        let guessed = guess_types(&[closure.clone(), closure.clone()]);
        assert_eq!(guessed.concrete, vec![false, true]);
        assert_eq!(guessed.types, vec![closure.clone(), closure]);
    }

    #[test]
    fn test_device_pointers_become_raw() {
        let guessed = guess_types(&[
            ArgType::DevicePtr(ScalarKind::F64),
            ArgType::DeviceArray {
                elem: ScalarKind::I32,
                ndims: 2,
            },
        ]);
        assert_eq!(
            guessed.types,
            vec![ArgType::RawPtr(ScalarKind::F64), ArgType::RawPtr(ScalarKind::I32)]
        );
        assert_eq!(guessed.concrete, vec![true, true]);
    }

    #[test]
    fn test_unknown_type_passes_as_is() {
        let host = ArgType::Host("Dict".to_string());
        let guessed = guess_types(&[host.clone()]);
        assert_eq!(guessed.types, vec![host]);
        assert_eq!(guessed.concrete, vec![true]);
    }

    #[test]
    fn test_filter_keeps_concrete_positions() {
        let args = vec![
            KernelArg::function("vadd"),
            KernelArg::pointer(ScalarKind::F32, 0x100),
            KernelArg::ghost("Nothing"),
            KernelArg::from(16i32),
        ];
        let types: Vec<ArgType> = args.iter().map(KernelArg::arg_type).collect();
        let guessed = guess_types(&types);

        let kept = guessed.filter(&args);
        assert_eq!(kept, vec![&args[1], &args[3]]);
        assert_eq!(
            guessed.concrete_types(),
            vec![ArgType::RawPtr(ScalarKind::F32), ArgType::Scalar(ScalarKind::I32)]
        );
    }

    #[test]
    fn test_to_param() {
        assert_eq!(KernelArg::from(1.5f32).to_param(), ParamValue::F32(1.5));
        assert_eq!(
            KernelArg::array(ScalarKind::F32, 0xdead, &[4, 4]).to_param(),
            ParamValue::Ptr(0xdead)
        );
        assert_eq!(
            KernelArg::array(ScalarKind::F32, 0xdead, &[4, 4]).arg_type(),
            ArgType::DeviceArray {
                elem: ScalarKind::F32,
                ndims: 2
            }
        );
    }
}
