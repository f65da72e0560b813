//! One module per subcommand. Each `cmd_*` writes its user-facing output to
//! the given writer.

pub mod cache;
pub mod init;
pub mod release;
pub mod review;
pub mod start;
