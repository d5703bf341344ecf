//! Data types shared by the taskboard stores.
//!
//! Nothing here holds locks or spawns work; see `taskboard-core` for that.

mod domain;
pub use domain::*;
