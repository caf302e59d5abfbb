use anyhow::{Result, anyhow};

use super::output::print_line;
use super::{Command, ShellState};

pub struct FindCommand;

impl Command for FindCommand {
    fn name(&self) -> &str {
        "find"
    }

    fn usage(&self) -> &str {
        "find PATTERN     - List files below here matching a regular expression"
    }

    fn execute(&self, state: &mut ShellState, args: &[String]) -> Result<()> {
        let pattern = args.first().ok_or_else(|| anyhow!("Usage: find PATTERN"))?;
        for path in state.current_node().find(pattern)? {
            print_line!("{path}");
        }
        Ok(())
    }
}
