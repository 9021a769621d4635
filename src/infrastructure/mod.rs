//! Infrastructure layer: concrete adapters for the domain's ports (spec §4.1, §4.4, SPEC_FULL §1A).

pub mod config;
pub mod database;
pub mod logging;
pub mod vcs;
