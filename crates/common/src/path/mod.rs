pub mod key;

pub use key::{is_directory_marker, relative_path_for_key, KeyError};
