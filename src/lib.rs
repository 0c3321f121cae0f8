//! Aseprite file parsing
//!
//! Layers are flattened, blend modes are applied, and all frames are packed
//! onto a single texture atlas. Invisible and reference layers are ignored.
//! Tilemap layers and external files are not supported.
//!
//! Based of specification from this webpage: https://github.com/aseprite/aseprite/blob/main/docs/ase-file-specs.md
pub mod error;

mod atlas;
mod blend;
mod composite;
mod parser;
mod types;
mod utils;

pub use types::*;
