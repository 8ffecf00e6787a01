//! Command trait definition for CLI commands.
//!
//! All asmpolish subcommands implement [`Command`]; dispatch across the
//! variants goes through `enum_dispatch`.

use anyhow::Result;
use enum_dispatch::enum_dispatch;

/// Trait implemented by all asmpolish CLI commands.
#[enum_dispatch]
pub trait Command {
    #[allow(clippy::missing_errors_doc)]
    fn execute(&self) -> Result<()>;
}
