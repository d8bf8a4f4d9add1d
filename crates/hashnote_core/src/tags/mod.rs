//! Tag extraction and display-color generation.
//!
//! # Responsibility
//! - Derive the canonical tag set from note markup.
//! - Generate pastel colors that stay visually distinct.

pub mod color;
pub mod extract;

pub use color::{color_distance, random_pastel_color, unique_color, COLOR_SIMILARITY_THRESHOLD};
pub use extract::{extract, extract_note_tags, is_valid_tag_name};
