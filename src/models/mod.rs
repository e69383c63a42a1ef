//! Data models for the directory cache.
//!
//! Field names match the JSON the web client keeps in local storage, so records
//! written by either side round-trip unchanged.

mod category;
mod entity;
mod group;
mod page;
mod post;
mod promotion;
mod report;
pub mod timestamp;

pub use category::*;
pub use entity::*;
pub use group::*;
pub use page::*;
pub use post::*;
pub use promotion::*;
pub use report::*;
