pub mod memory;
pub mod postgres;
pub mod store;

mod record;
