//! Configuration loaded from `.portwarden.toml`.

pub mod settings;

pub use settings::Settings;
