pub mod inventory;
pub mod sync;
