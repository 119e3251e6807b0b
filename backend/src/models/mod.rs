pub mod events;
pub mod filters;
