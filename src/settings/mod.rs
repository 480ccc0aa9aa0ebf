// Bridge configuration and its persistence.

pub mod store;
pub mod types;
