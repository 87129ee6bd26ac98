//! Transfer Engine
//!
//! Moves money between accounts as one atomic unit, and in or out of the
//! ledger through an optional payment provider.
//!
//! # State Machine
//!
//! ```text
//! INITIATED → VALIDATED → DEBITED → CREDITED → COMMITTED
//!      ↓           ↓          ↓         ↓
//!    FAILED ←── FAILED ←─ ROLLED_BACK ←─┘
//! ```
//!
//! # Safety Invariants
//!
//! 1. **Ordered Locking**: both account mutexes are taken in ascending id order
//! 2. **Single Commit Record**: debit, credit and completed status become durable
//!    together in one `FundsMoved` journal record
//! 3. **Rollback Before Unlock**: a failed commit restores both balances before
//!    the locks are released
//! 4. **No Lock Across Provider Calls**: external calls run unlocked; outcomes are
//!    applied after re-checking the entry is still pending

pub mod engine;
mod locks;
pub mod provider;
pub mod state;
pub mod types;


// Re-exports for convenience
pub use engine::{EngineConfig, TransferEngine};
pub use provider::{PaymentProvider, SandboxProvider};
pub use state::TransferState;
pub use types::{ExternalRequest, OpResult, TransferRequest};
