// TermSleuth - app/mod.rs
//
// Application layer: scan orchestration and workspace state.
// Dependencies: core layer, platform backends.

pub mod scan;
pub mod state;
