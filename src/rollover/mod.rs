//! Rollover handling: wait for compression, name the archive, upload it in
//! the background and then let retention run.
//!
//! ```text
//!  rotation policy ──► RolloverCoordinator::rollover(event)
//!                            │ (returns a ticket immediately)
//!                            ▼
//!                  BackgroundExecutor worker
//!                            │
//!     AwaitingCompression ──►├── Cancelled ──► Abandoned
//!                            ├── Stalled ───► Failed
//!            Naming ────────►│
//!         Uploading ────────►├── ok ────────► Done
//!                            └── exhausted ─► Failed
//!                            │
//!                  RetentionTrigger::clean(now)
//! ```

pub mod compression;
pub mod coordinator;
pub mod event;
pub mod executor;

pub use compression::{CompressionHandle, CompressionWaiter, WaitError, WaitOutcome};
pub use coordinator::{
    RetentionTrigger, RolloverCoordinator, RolloverOutcome, RolloverState, RolloverTicket,
};
pub use event::{CompressionMode, RolloverEvent};
pub use executor::BackgroundExecutor;
