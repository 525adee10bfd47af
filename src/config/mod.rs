//! Configuration resolution.
//!
//! Options are looked up by name in a pluggable settings store each time
//! they are read, with a static table of defaults behind it.

pub mod options;
pub mod settings;

pub use options::*;
pub use settings::*;
