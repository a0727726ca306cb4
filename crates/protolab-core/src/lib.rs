pub mod config;
pub mod error;
pub mod io;
pub mod paths;
pub mod port;
pub mod project;
pub mod registry;
pub mod types;

pub use error::{ProtolabError, Result};
