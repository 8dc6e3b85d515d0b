pub mod common;
pub mod delete;
pub mod export;
pub mod list;
pub mod reports;
pub mod restore;
pub mod sync;
pub mod write;
