//! Crate-level scenario tests.

mod doubles;
mod pipeline_tiers;
