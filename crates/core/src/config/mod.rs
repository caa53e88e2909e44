//! Configuration loading and schema definitions
//!
//! A TOML file supplies defaults for everything the CI host would normally
//! provide: task inputs, build variables and service endpoints. Values from
//! the host environment take precedence over the file.

mod loader;
mod schema;

pub use loader::Config;
pub use schema::*;
