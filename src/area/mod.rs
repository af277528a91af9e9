//! Area model
//!
//! This module holds the data types of the division tree:
//!
//! - `AreaLevel`: the five administrative depths
//! - `AreaId`: bit-packed identifiers that encode a node's position
//! - `AreaRecord`: one persisted node
//! - `ChildPage`: a page still to be visited, with its inherited context

mod id;
mod level;
mod record;

pub use id::AreaId;
pub use level::AreaLevel;
pub use record::{AreaRecord, ChildPage, ParentNode};
