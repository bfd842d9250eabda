// TermSleuth - core/mod.rs
//
// Core scan logic: term loading, enumeration, matching, reporting.
// Dependencies: util, and the collaborator traits in platform
// (StorageProvider, DocumentExtractor, TabularIo). Concrete backends are
// injected by the app layer.
// Must NOT depend on: app.

pub mod activity;
pub mod discovery;
pub mod matcher;
pub mod model;
pub mod report;
pub mod session;
pub mod terms;
