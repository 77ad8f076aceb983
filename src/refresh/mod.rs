//! Background refresh machinery.
//!
//! ```text
//!  render loop (owns)                 tokio runtime
//! ┌───────────────────┐  try_spawn  ┌──────────────────┐
//! │ RefreshDriver     │ ──────────► │ fetch worker     │
//! │  ├ RefreshPolicy  │             │  (one per source │
//! │  └ FetchSupervisor│             │   at a time)     │
//! └───────────────────┘             └──────────────────┘
//!          │ read / settle                 │ publish
//!          ▼                               ▼
//!       ┌─────────────────────────────────────┐
//!       │ SharedStore: SourceId → (snapshot,  │
//!       │                         FetchState) │
//!       └─────────────────────────────────────┘
//! ```
//!
//! The render loop never awaits anything.  It asks the policy whether a
//! refresh is due, hands fetches to the supervisor, and pulls whatever the
//! store holds when it draws.  Workers only ever write to the store.

mod driver;
mod policy;
mod store;
mod supervisor;

pub use driver::RefreshDriver;
pub use policy::RefreshPolicy;
pub use store::{FetchState, Settled, SharedStore};
pub use supervisor::FetchSupervisor;

// ---------------------------------------------------------------------------
// Test support
// ---------------------------------------------------------------------------
