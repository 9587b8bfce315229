pub mod backup;
pub mod cli;
pub mod config;
pub mod crypto;
pub mod deadline;
pub mod errors;
pub mod vault;
