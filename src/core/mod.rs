#![allow(clippy::module_inception)]

pub mod app_context;
pub mod config;
pub mod data_loader;
pub mod error;

pub use app_context::AppContext;
pub use error::{Error, Result};
