//! Keeping one market view in sync.
//!
//! - [`state`] - the pure reducer: inputs in, effects out
//! - [`view`] - [`MarketView`], the task that feeds the reducer from the
//!   stream and the snapshot loader and carries out its effects

pub mod state;
pub mod view;

pub use state::{Effect, Input, SyncState};
pub use view::{MarketView, ViewStatus};
