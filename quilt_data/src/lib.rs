//! Shared data model for Quilt content packs.

pub mod defs;
pub mod validate;

pub use defs::*;
pub use validate::{ValidationError, patch_context, validate_config_field, validate_pack, validate_patch};
