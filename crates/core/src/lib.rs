//! Core types for jitcheck
//!
//! This crate defines the foundational types shared by every other crate:
//! - ClassDecl / MethodDecl: declarative test classes and their annotations
//! - CompLevel: compilation tiers and pseudo levels
//! - VmFlags / FlagCatalog / FlagSource: VM flags and their declared types
//! - Comparator / Constraint: `=, !=, <, <=, >, >=` constraint strings
//! - Value: values flowing through test bodies
//! - TestInfo / RunInfo: introspection handles for Check and Run bodies
//! - Violation: stacked violation units
//! - protocol: stdout protocol between test VM and driver
//! - Error: error taxonomy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod comparator;
pub mod decl;
pub mod error;
pub mod flags;
pub mod info;
pub mod level;
pub mod protocol;
pub mod value;
pub mod violation;

pub use comparator::{Comparator, Constraint, ConstraintError};
pub use decl::{
    Annotations, Argument, Body, BodyError, Call, CallInfo, CheckAnnotation, CheckAt, ClassDecl,
    ClassRef, CompileControl, IrAnnotation, MethodDecl, Nesting, ParamType, RunAnnotation,
    RunMode, TestAnnotation,
};
pub use error::{Error, Result};
pub use flags::{FlagCatalog, FlagSource, FlagType, FlagValue, ResolvedFlags, VmFlags};
pub use info::{RunInfo, TestContext, TestInfo};
pub use level::CompLevel;
pub use protocol::{RuleEncoding, RuleEntry, RuleStatus, SkipReason};
pub use value::Value;
pub use violation::{Category, IrMatchEvidence, Subject, SubjectKind, Violation, ViolationUnit};
