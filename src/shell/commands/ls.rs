use anyhow::Result;
use colored::*;
use humansize::{BINARY, format_size};

use super::output::print_line;
use super::{Command, ShellState};

pub struct LsCommand;

impl Command for LsCommand {
    fn name(&self) -> &str {
        "ls"
    }

    fn usage(&self) -> &str {
        "ls [-l] [PATH]   - List directory contents (PATH may use * and ?)"
    }

    fn execute(&self, state: &mut ShellState, args: &[String]) -> Result<()> {
        let mut long_format = false;
        let mut path_arg: Option<&str> = None;

        for arg in args {
            if arg == "-l" {
                long_format = true;
            } else if !arg.starts_with('-') {
                path_arg = Some(arg.as_str());
                break;
            }
        }

        // A wildcard in the last segment filters the listing of its parent
        let (dir, filter) = match path_arg {
            Some(path) if path.contains(['*', '?']) => {
                let (parent, pattern) = match path.rfind('/') {
                    Some(pos) => (&path[..pos + 1], &path[pos + 1..]),
                    None => ("", path),
                };
                (state.resolve_dir(parent)?, Some(pattern))
            }
            Some(path) => (state.resolve_dir(path)?, None),
            None => (state.current_node().clone(), None),
        };

        if long_format {
            print_line!("{:<40} {:>12}", "NAME", "SIZE");
            print_line!("{}", "-".repeat(53));
        }

        for name in dir.children()? {
            if !filter.is_none_or(|pattern| matches_pattern(&name, pattern)) {
                continue;
            }
            let is_dir = dir.is_dir(&name)?;
            match (is_dir, long_format) {
                (true, true) => print_line!("{:<40} {:>12}", format!("{name}/").blue().bold(), "-"),
                (true, false) => print_line!("{}/", name.blue().bold()),
                (false, true) => {
                    let size = dir.leaf_size(&name)?.unwrap_or(0);
                    print_line!("{:<40} {:>12}", name, format_size(size, BINARY));
                }
                (false, false) => print_line!("{name}"),
            }
        }
        Ok(())
    }
}

/// Match a name against a shell wildcard (`*` and `?`)
pub fn matches_pattern(name: &str, pattern: &str) -> bool {
    let name: Vec<char> = name.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    matches_from(&name, &pattern)
}

fn matches_from(name: &[char], pattern: &[char]) -> bool {
    match (pattern.first(), name.first()) {
        (None, None) => true,
        (None, Some(_)) => false,
        (Some('*'), _) => {
            matches_from(name, &pattern[1..])
                || (!name.is_empty() && matches_from(&name[1..], pattern))
        }
        (Some('?'), Some(_)) => matches_from(&name[1..], &pattern[1..]),
        (Some(p), Some(n)) if p == n => matches_from(&name[1..], &pattern[1..]),
        _ => false,
    }
}
