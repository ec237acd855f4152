//! Configuration loading, parsing, and validation.

pub mod loader;
pub mod schema;

pub use loader::{discover, load, resolve};
pub use schema::{AuthConfig, EnvironmentConfig, PackageConfig, PayloadConfig, Settings, SherpaConfig};
