// src/plan/mod.rs

//! Plan construction: validating the task set and reducing it to the
//! subgraph reachable from a chosen root (spec.md §4.2).

pub mod builder;

pub use builder::build_plan;
