//! Translation of dashboard filters into indexer queries and of indexer
//! hits back into dashboard rows.

pub mod normalize;
pub mod pagination;
pub mod query;
pub mod time_range;

pub use normalize::{Profile, normalize};
pub use pagination::{reconcile_total, resolve};
pub use query::{SearchBody, synthesize, syscheck_events};
