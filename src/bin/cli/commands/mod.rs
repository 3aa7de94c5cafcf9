pub mod attachment;
pub mod categories;
pub mod config;
pub mod items;
pub mod migrate;
pub mod sync;
