//! Utility functions and helpers.
//!
//! - [`paths`]: Path normalization, ignore-segment matching, tilde expansion

/// Path manipulation and resolution utilities
pub mod paths;

pub use paths::{
    expand_tilde, has_ignored_segment, make_absolute, normalize_lexically, resolve_dir,
    source_key, to_forward_slashes,
};
