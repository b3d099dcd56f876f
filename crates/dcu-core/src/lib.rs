//! # DeCleanup Network Core
//!
//! Building blocks shared by every DeCleanup Network contract:
//! - `Address`, `Amount`, `Timestamp` - identifiers and 18-decimal amounts
//! - `BlockClock` - block time source, manually driven in tests
//! - `DcuError` - structured failures, classified by `ErrorKind`
//! - `AccessControl` - owner and role capability checks
//! - `ReentrancyGuard` - whole-contract lock for token-moving calls
//! - `EventLog` - append-only event sink read by indexers
//! - `TokenLedger` - the token surface contracts depend on
//!
//! ## Execution model
//!
//! ```text
//!   caller ──► contract entry point
//!                 │ 1. checks   (auth, input, state)     ── fail: nothing changed
//!                 │ 2. effects  (internal balances)
//!                 │ 3. interactions (token call)         ── fail: effects restored
//!                 ▼
//!              events appended
//! ```

pub mod access;
pub mod clock;
pub mod error;
pub mod events;
pub mod guard;
pub mod token;
pub mod types;

pub use access::*;
pub use clock::*;
pub use error::*;
pub use events::*;
pub use guard::*;
pub use token::*;
pub use types::*;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::access::{AccessControl, Authority, Role};
    pub use crate::clock::{BlockClock, ManualClock, SharedClock, SystemClock};
    pub use crate::error::{DcuError, ErrorKind, Result};
    pub use crate::events::{Event, EventLog, EventRecord, SharedEventLog};
    pub use crate::guard::ReentrancyGuard;
    pub use crate::token::{DcuToken, SharedToken, TokenLedger};
    pub use crate::types::*;
}
