//! # quire-core
//!
//! Core types, traits, and abstractions for the quire note index.
//!
//! This crate provides the data model shared by the analysis layer
//! (`quire-search`) and the persistence layer (`quire-db`): notes, tags,
//! associations, search requests and result pages, plus the error type and
//! repository traits every backend implements.

pub mod cursor;
pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod traits;
pub mod uuid_utils;
pub mod validation;

// Re-export commonly used types at crate root
pub use cursor::PageCursor;
pub use error::{Error, Result};
pub use models::*;
pub use traits::*;
pub use uuid_utils::{micros_to_datetime, new_v7};
pub use validation::{
    normalize_tag_key, validate_body, validate_color, validate_description, validate_icon,
    validate_tag_name, validate_title,
};
