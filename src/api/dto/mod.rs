//! Data Transfer Objects for REST request/response serialization.
//!
//! All monetary amounts are plain JSON integers in minor currency units;
//! identifiers cross the boundary as strings (UUIDs or opaque creator
//! ids).

pub mod batch_dto;
pub mod common_dto;
pub mod creator_dto;
pub mod event_dto;

pub use batch_dto::*;
pub use common_dto::*;
pub use creator_dto::*;
pub use event_dto::*;
