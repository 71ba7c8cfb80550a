pub mod batch;
mod fingerprint_matcher;
mod sync_engine;

pub use batch::{BatchOutcome, BatchReport, run_batch};
pub use fingerprint_matcher::{FingerprintMatcher, guess_name};
pub use sync_engine::{EngineOptions, SyncEngine};
