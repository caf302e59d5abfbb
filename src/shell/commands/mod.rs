use anyhow::Result;

pub mod cat;
pub mod cd;
pub mod find;
pub mod ls;
pub mod output;
pub mod tree;

use super::ShellState;

/// A command the shell can run against the open archive
pub trait Command {
    fn name(&self) -> &str;

    /// One-line usage shown by `help`
    fn usage(&self) -> &str;

    fn execute(&self, state: &mut ShellState, args: &[String]) -> Result<()>;
}
