pub mod admin;
pub mod aggregations;
pub mod config;
pub mod error;
pub mod query;
pub mod script;
pub mod segment;
pub mod value;

pub use config::Config;
pub use error::{Error, Result};
