//! CLI subcommand implementations.

pub mod catalog;
pub mod edit;
pub mod log;
pub mod new;
pub mod rm;
pub mod start;
pub mod status;
pub mod stop;
pub mod usage;
pub mod util;
pub mod watch;
