// Acquisition settings: defaults, JSON loading and saving.

pub mod store;
pub mod types;
