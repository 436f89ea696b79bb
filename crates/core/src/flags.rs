//! VM flags
//!
//! - [`FlagCatalog`]: flags the harness knows about, with their declared type
//!   and default value. Clauses naming a flag outside the catalog are format
//!   violations.
//! - [`VmFlags`]: an ordered command line of `-XX:` style flags.
//! - [`FlagSource`]: anything that can report the actual value of a flag.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Declared type of a VM flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlagType {
    /// `true`/`false`
    Boolean,
    /// Signed or unsigned integral flag
    Integer,
    /// `double` flag
    Floating,
    /// Free text (`ccstr`)
    String,
}

impl fmt::Display for FlagType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FlagType::Boolean => "bool",
            FlagType::Integer => "int",
            FlagType::Floating => "double",
            FlagType::String => "ccstr",
        })
    }
}

/// A typed flag value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FlagValue {
    /// Boolean flag value
    Bool(bool),
    /// Integral flag value
    Int(i64),
    /// Floating point flag value
    Float(f64),
    /// Text flag value
    Str(String),
}

impl FlagValue {
    /// Parse `raw` as a value of type `ty`.
    pub fn parse(ty: FlagType, raw: &str) -> Option<FlagValue> {
        let raw = raw.trim();
        match ty {
            FlagType::Boolean => match raw {
                "true" => Some(FlagValue::Bool(true)),
                "false" => Some(FlagValue::Bool(false)),
                _ => None,
            },
            FlagType::Integer => raw.parse::<i64>().ok().map(FlagValue::Int),
            FlagType::Floating => raw.parse::<f64>().ok().map(FlagValue::Float),
            FlagType::String => Some(FlagValue::Str(raw.to_string())),
        }
    }

    /// Type of this value.
    pub fn flag_type(&self) -> FlagType {
        match self {
            FlagValue::Bool(_) => FlagType::Boolean,
            FlagValue::Int(_) => FlagType::Integer,
            FlagValue::Float(_) => FlagType::Floating,
            FlagValue::Str(_) => FlagType::String,
        }
    }

    /// Boolean payload, if any.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FlagValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integral payload, if any.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            FlagValue::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl fmt::Display for FlagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlagValue::Bool(b) => write!(f, "{}", b),
            FlagValue::Int(i) => write!(f, "{}", i),
            FlagValue::Float(x) => write!(f, "{}", x),
            FlagValue::Str(s) => f.write_str(s),
        }
    }
}

/// Source of actual flag values.
pub trait FlagSource {
    /// Actual value of `name`, or `None` if the flag is unknown.
    ///
    /// # Errors
    ///
    /// [`Error::TestRun`] if the flag is known but was set to a value that
    /// does not parse as its declared type.
    fn flag(&self, name: &str) -> Result<Option<FlagValue>>;
}

/// Known flags with declared types and defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlagCatalog {
    flags: BTreeMap<String, FlagValue>,
}

impl FlagCatalog {
    /// An empty catalog.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Catalog of commonly gated compiler and GC flags.
    pub fn standard() -> Self {
        let mut catalog = Self::empty();
        for (name, value) in [
            ("Xint", FlagValue::Bool(false)),
            ("UseCompiler", FlagValue::Bool(true)),
            ("TieredCompilation", FlagValue::Bool(true)),
            ("TieredStopAtLevel", FlagValue::Int(4)),
            ("CompileThreshold", FlagValue::Int(10_000)),
            ("LoopUnrollLimit", FlagValue::Int(60)),
            ("LoopMaxUnroll", FlagValue::Int(16)),
            ("UseSuperWord", FlagValue::Bool(true)),
            ("MaxVectorSize", FlagValue::Int(64)),
            ("AlignVector", FlagValue::Bool(false)),
            ("UseAVX", FlagValue::Int(2)),
            ("UseSSE", FlagValue::Int(4)),
            ("UseCompressedOops", FlagValue::Bool(true)),
            ("UseCompressedClassPointers", FlagValue::Bool(true)),
            ("ObjectAlignmentInBytes", FlagValue::Int(8)),
            ("EliminateAllocations", FlagValue::Bool(true)),
            ("UseTLAB", FlagValue::Bool(true)),
            ("UseG1GC", FlagValue::Bool(true)),
            ("UseParallelGC", FlagValue::Bool(false)),
            ("UseSerialGC", FlagValue::Bool(false)),
            ("StressGCM", FlagValue::Bool(false)),
            ("StressLCM", FlagValue::Bool(false)),
            ("StressIGVN", FlagValue::Bool(false)),
            ("VerifyOops", FlagValue::Bool(false)),
            ("InlineSmallCode", FlagValue::Int(2500)),
            ("CompressedClassSpaceSize", FlagValue::Int(1_073_741_824)),
            ("ProfileTrapsRatio", FlagValue::Float(0.0)),
            ("CompileCommand", FlagValue::Str(String::new())),
            ("ErrorFile", FlagValue::Str(String::new())),
        ] {
            catalog.declare(name, value);
        }
        catalog
    }

    /// Declare (or redeclare) a flag with its default value.
    pub fn declare(&mut self, name: impl Into<String>, default: FlagValue) -> &mut Self {
        self.flags.insert(name.into(), default);
        self
    }

    /// Declared type of `name`.
    pub fn flag_type(&self, name: &str) -> Option<FlagType> {
        self.flags.get(name).map(FlagValue::flag_type)
    }

    /// Default value of `name`.
    pub fn default_value(&self, name: &str) -> Option<&FlagValue> {
        self.flags.get(name)
    }

    /// True if `name` is declared.
    pub fn contains(&self, name: &str) -> bool {
        self.flags.contains_key(name)
    }
}

/// An ordered list of VM command line flags.
///
/// Recognized syntax: `-XX:+Name`, `-XX:-Name`, `-XX:Name=value` and `-Xint`.
/// Anything else is kept verbatim and passed through to the VM.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmFlags {
    args: Vec<String>,
}

impl VmFlags {
    /// Empty flag list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from raw command line strings.
    pub fn from_args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Append flags; later flags override earlier ones.
    pub fn extend<I, S>(&mut self, args: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
    }

    /// Raw command line strings in order.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// True if no flags are set.
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Raw textual value of the last setting of `name`, if any.
    pub fn raw(&self, name: &str) -> Option<String> {
        self.args.iter().rev().find_map(|arg| parse_flag(arg, name))
    }

    /// View of these flags layered over the catalog defaults.
    pub fn resolve<'a>(&'a self, catalog: &'a FlagCatalog) -> ResolvedFlags<'a> {
        ResolvedFlags {
            flags: self,
            catalog,
        }
    }
}

fn parse_flag(arg: &str, name: &str) -> Option<String> {
    if arg == "-Xint" {
        return (name == "Xint").then(|| "true".to_string());
    }
    let body = arg.strip_prefix("-XX:")?;
    if let Some(bool_name) = body.strip_prefix('+') {
        return (bool_name == name).then(|| "true".to_string());
    }
    if let Some(bool_name) = body.strip_prefix('-') {
        return (bool_name == name).then(|| "false".to_string());
    }
    let (key, value) = body.split_once('=')?;
    (key == name).then(|| value.to_string())
}

/// Command line flags layered over catalog defaults.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedFlags<'a> {
    flags: &'a VmFlags,
    catalog: &'a FlagCatalog,
}

impl FlagSource for ResolvedFlags<'_> {
    fn flag(&self, name: &str) -> Result<Option<FlagValue>> {
        let Some(default) = self.catalog.default_value(name) else {
            return Ok(None);
        };
        let Some(raw) = self.flags.raw(name) else {
            return Ok(Some(default.clone()));
        };
        let ty = default.flag_type();
        FlagValue::parse(ty, &raw).map(Some).ok_or_else(|| {
            Error::test_run(format!(
                "flag {} has malformed value '{}' for type {}",
                name, raw, ty
            ))
        })
    }
}
