//! One module per subcommand.

pub mod completions;
pub mod decrypt;
pub mod encrypt;
pub mod restore;
