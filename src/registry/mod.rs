//! Agent registry.
//!
//! Owns the set of configured agents and decides which of them are
//! usable. Each cycle fetches every descriptor concurrently (bounded pool),
//! validates identity, and atomically swaps in the new active set.
//!
//! ```text
//! configured endpoints ──► ConnectivityChecker (retry + backoff)
//!                                 │
//!                                 ▼
//!                       identity validation
//!                                 │
//!                                 ▼
//!              RwLock<Arc<ActiveSet>> swap ──► change callback
//! ```

mod checker;
mod descriptor;
mod identity;
mod monitor;
mod store;

pub use checker::{CheckOutcome, ConnectivityChecker, RetryPolicy, Sleeper, TokioSleeper};
pub use descriptor::{DescriptorFetcher, HttpDescriptorClient, parse_descriptor};
pub use identity::{IdentityMatch, identity_match, normalize, validate_identity};
pub use store::{
    AgentRegistry, ChangeCallback, EntryState, MAX_CHECK_WORKERS, RegistryChange, RegistryEntry,
    RegistrySettings,
};
