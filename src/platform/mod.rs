// TermSleuth - platform/mod.rs
//
// Platform layer: concrete collaborators behind the traits the core layer
// consumes (storage, document text, spreadsheets) plus config.toml and
// platform directory resolution.

pub mod config;
pub mod document;
pub mod storage;
pub mod tabular;
