//! TOML config file loading and creation.

mod loader;
mod template;


pub use loader::{default_config_path, load_default, load_from_path, load_or_create};
