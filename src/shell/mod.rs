pub mod commands;
pub mod completion;

use anyhow::{Context, Result, anyhow};
use std::collections::HashMap;
use std::ops::ControlFlow;
use std::rc::Rc;

use crate::archive::ArchiveHandle;
use crate::netcdf::ArrayTable;
use crate::vfs::{VirtualNode, VirtualPath};
use commands::Command;
pub use completion::{CompletionCache, ShellCompleter};

/// Interactive browsing state: the open archive and the current directory
pub struct ShellState {
    archive: ArchiveHandle,
    current: VirtualNode,
    completion_cache: CompletionCache,
    commands: HashMap<String, Rc<dyn Command>>,
}

impl ShellState {
    pub fn new(archive: ArchiveHandle) -> Self {
        let current = archive.root();
        let completion_cache = CompletionCache::new(archive.root());

        let mut state = ShellState {
            archive,
            current,
            completion_cache,
            commands: HashMap::new(),
        };

        state.register_command(Rc::new(commands::ls::LsCommand));
        state.register_command(Rc::new(commands::cd::CdCommand));
        state.register_command(Rc::new(commands::cat::CatCommand));
        state.register_command(Rc::new(commands::tree::TreeCommand));
        state.register_command(Rc::new(commands::find::FindCommand));

        state
    }

    fn register_command(&mut self, command: Rc<dyn Command>) {
        self.commands.insert(command.name().to_string(), command);
    }

    /// Run one command line. `Break` means the user asked to leave.
    pub fn execute(&mut self, line: &str) -> Result<ControlFlow<()>> {
        let parts = Self::parse_command_line(line.trim())?;
        let Some((cmd_name, args)) = parts.split_first() else {
            return Ok(ControlFlow::Continue(()));
        };

        match cmd_name.as_str() {
            "exit" | "quit" => return Ok(ControlFlow::Break(())),
            "help" => self.print_help(),
            "pwd" => println!("{}", self.current_path()),
            _ => {
                let command = self
                    .commands
                    .get(cmd_name)
                    .cloned()
                    .ok_or_else(|| anyhow!("Unknown command: {cmd_name}"))?;
                command.execute(self, args)?;
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    pub fn archive(&self) -> &ArchiveHandle {
        &self.archive
    }

    pub fn current_node(&self) -> &VirtualNode {
        &self.current
    }

    pub fn set_current_node(&mut self, node: VirtualNode) {
        self.completion_cache.set_current_path(node.path());
        self.current = node;
    }

    pub fn current_path(&self) -> VirtualPath {
        self.current.path()
    }

    pub fn completion_cache(&self) -> &CompletionCache {
        &self.completion_cache
    }

    /// Absolute position of `path` taken relative to the current directory
    pub fn target_path(&self, path: &str) -> VirtualPath {
        self.current_path().join(path)
    }

    /// Directory named by `path`, relative to the current directory
    pub fn resolve_dir(&self, path: &str) -> Result<VirtualNode> {
        let target = self.target_path(path);
        if target.is_empty() {
            return Ok(self.archive.root());
        }
        self.archive
            .root()
            .node(&target.key())
            .with_context(|| format!("cannot access {target}"))
    }

    /// Decoded leaf named by `path`, relative to the current directory
    pub fn resolve_table(&self, path: &str) -> Result<Rc<ArrayTable>> {
        let target = self.target_path(path);
        self.archive
            .root()
            .table(&target.key())
            .with_context(|| format!("cannot read {target}"))
    }

    fn print_help(&self) {
        println!("Available commands:");
        let mut usages: Vec<&str> = self.commands.values().map(|c| c.usage()).collect();
        usages.sort_unstable();
        for usage in usages {
            println!("  {usage}");
        }
        println!("  pwd              - Print working directory");
        println!("  help             - Show this help");
        println!("  exit/quit        - Exit the shell");
    }

    pub fn prompt(&self) -> String {
        format!("vgosdb:{} $ ", self.current_path())
    }

    /// Split a command line into words, honouring single and double quotes
    /// and backslash escapes
    pub fn parse_command_line(line: &str) -> Result<Vec<String>> {
        let mut args = Vec::new();
        let mut current_arg = String::new();
        let mut in_single_quote = false;
        let mut in_double_quote = false;
        let mut escape_next = false;

        for ch in line.chars() {
            if escape_next {
                current_arg.push(ch);
                escape_next = false;
                continue;
            }

            match ch {
                '\\' if !in_single_quote => escape_next = true,
                '\'' if !in_double_quote => in_single_quote = !in_single_quote,
                '"' if !in_single_quote => in_double_quote = !in_double_quote,
                ' ' | '\t' if !in_single_quote && !in_double_quote => {
                    if !current_arg.is_empty() {
                        args.push(std::mem::take(&mut current_arg));
                    }
                }
                _ => current_arg.push(ch),
            }
        }

        if !current_arg.is_empty() {
            args.push(current_arg);
        }

        if in_single_quote {
            return Err(anyhow!("Unclosed single quote"));
        }
        if in_double_quote {
            return Err(anyhow!("Unclosed double quote"));
        }

        Ok(args)
    }
}
