use anyhow::{Context, Result};

use super::output::print_block;
use super::{Command, ShellState};

/// Depth used when `tree` gets no argument
pub const DEFAULT_DEPTH: usize = 3;

pub struct TreeCommand;

impl Command for TreeCommand {
    fn name(&self) -> &str {
        "tree"
    }

    fn usage(&self) -> &str {
        "tree [DEPTH]     - Show the tree below the current directory"
    }

    fn execute(&self, state: &mut ShellState, args: &[String]) -> Result<()> {
        let depth = match args.first() {
            Some(arg) => arg
                .parse::<usize>()
                .with_context(|| format!("invalid depth: {arg}"))?,
            None => DEFAULT_DEPTH,
        };

        let node = state.current_node();
        println!("{}", node.path());
        let tree = node.render_tree(depth)?;
        print_block!(tree);
        Ok(())
    }
}
