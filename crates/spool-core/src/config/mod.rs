//! Configuration for spool
//!
//! - Generic YAML loading/saving
//! - Standard config paths
//! - [`EngineConfig`], the settings the engine and output stream start from
//!
//! ```ignore
//! use spool_core::config::{default_config_path, load_config, EngineConfig};
//!
//! let config: EngineConfig = load_config(&default_config_path());
//! ```

mod engine;
mod io;
mod paths;

pub use engine::*;
pub use io::*;
pub use paths::*;
