//! Utility functions

pub mod glob;
pub mod hash;
pub mod path;

pub use glob::matches_glob;
pub use hash::{hash_name, hash_text, id_or_hash};
pub use path::{find_dump_files, sanitize_filename};
