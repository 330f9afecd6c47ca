//! Fatal engine and usage errors.
//!
//! These abort a run and surface to the caller of `Framework::run` or of a
//! registration function. Test outcomes (assertion failures, panics) never
//! travel through this type.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("run: a run is already in progress")]
    AlreadyRunning,

    #[error(
        "describe: cannot register top-level suite '{suite}' while a run is active; \
         use the `describe` of the enclosing describe scope instead"
    )]
    RegisterWhileRunning { suite: String },

    #[error("run: test '{test}' already ran")]
    AlreadyRan { test: String },

    #[error("describe: incomplete execution of '{describe}', test '{test}' is still pending")]
    IncompleteExecution { describe: String, test: String },

    #[error("test: no unique identity available for '{test}' after {attempts} salts")]
    IdentityExhausted { test: String, attempts: u32 },

    #[error("snapshot store: {0:#}")]
    Snapshot(anyhow::Error),
}
