//! In-process test VM runs verified the way the driver verifies them.

#[path = "../common/mod.rs"]
mod common;

mod rules;
mod skipping;
