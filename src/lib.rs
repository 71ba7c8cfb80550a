//! Keeps a local manifest of installed game mods in sync with a remote mod
//! registry: version resolution, add/remove/upgrade, and discovery of
//! unknown files by fingerprint.

pub mod adapters;
pub mod app;
pub mod domain;
pub mod infra;
