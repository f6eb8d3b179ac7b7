//! Configuration types for the estimation engine.

use crate::logging::VERBOSITY_SILENT;

/// Tunables for a project engine instance.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Log verbosity: 0 silent, 1 changes, 2 checks, 3 debug.
    pub verbosity: u8,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            verbosity: VERBOSITY_SILENT,
        }
    }
}
