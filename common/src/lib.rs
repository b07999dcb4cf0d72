pub mod cursor;
pub mod memo;
pub mod node;
pub mod payment;
pub mod store;
