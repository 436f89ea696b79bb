//! Format validation of whole test classes.

#[path = "../common/mod.rs"]
mod common;

mod class_rules;
mod reports;
