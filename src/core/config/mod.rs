mod batch;
mod config;
mod source;

pub use batch::Batch;
pub use config::Config;
pub use source::{Source, UnsupportedConfigFormat};
