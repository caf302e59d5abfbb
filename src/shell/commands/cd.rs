use anyhow::Result;

use super::{Command, ShellState};

pub struct CdCommand;

impl Command for CdCommand {
    fn name(&self) -> &str {
        "cd"
    }

    fn usage(&self) -> &str {
        "cd [PATH]        - Change directory (no PATH returns to the root)"
    }

    fn execute(&self, state: &mut ShellState, args: &[String]) -> Result<()> {
        let target = args.first().map(String::as_str).unwrap_or("/");
        let node = state.resolve_dir(target)?;
        state.set_current_node(node);
        Ok(())
    }
}
