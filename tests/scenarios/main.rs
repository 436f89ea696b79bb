//! Multi-process runs: the demo binary end to end, and scripted test VMs.

#[path = "../common/mod.rs"]
mod common;

mod demo;
mod scripted;
