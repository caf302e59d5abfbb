use rustyline::Context;
use rustyline::completion::{Completer, Pair};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::vfs::{VirtualNode, VirtualPath};

/// A completion candidate
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletionEntry {
    pub name: String,
    pub is_dir: bool,
}

/// Child listings per directory, filled lazily as the user tabs around.
///
/// The member index never changes after open, so entries are never
/// invalidated.
#[derive(Clone)]
pub struct CompletionCache {
    entries: Rc<RefCell<HashMap<String, Vec<CompletionEntry>>>>,
    commands: Vec<String>,
    current_path: Rc<RefCell<VirtualPath>>,
    root: VirtualNode,
}

impl CompletionCache {
    pub fn new(root: VirtualNode) -> Self {
        CompletionCache {
            entries: Rc::new(RefCell::new(HashMap::new())),
            commands: ["ls", "cd", "cat", "tree", "find", "pwd", "help", "exit"]
                .into_iter()
                .map(String::from)
                .collect(),
            current_path: Rc::new(RefCell::new(VirtualPath::root())),
            root,
        }
    }

    pub fn set_current_path(&self, path: VirtualPath) {
        *self.current_path.borrow_mut() = path;
    }

    pub fn current_path(&self) -> VirtualPath {
        self.current_path.borrow().clone()
    }

    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    /// Children of the directory at `path`, listed on first request.
    /// Paths that are not directories have no entries.
    pub fn entries(&self, path: &VirtualPath) -> Vec<CompletionEntry> {
        let key = path.key();
        if let Some(cached) = self.entries.borrow().get(&key) {
            return cached.clone();
        }

        let entries = self.list(&key).unwrap_or_default();
        self.entries.borrow_mut().insert(key, entries.clone());
        entries
    }

    fn list(&self, key: &str) -> crate::Result<Vec<CompletionEntry>> {
        let dir = if key.is_empty() {
            self.root.clone()
        } else {
            self.root.node(key)?
        };
        dir.children()?
            .into_iter()
            .map(|name| {
                let is_dir = dir.is_dir(&name)?;
                Ok(CompletionEntry { name, is_dir })
            })
            .collect()
    }
}

/// Tab completion for command names and archive paths
pub struct ShellCompleter {
    cache: CompletionCache,
}

impl ShellCompleter {
    pub fn new(cache: CompletionCache) -> Self {
        ShellCompleter { cache }
    }

    fn complete_command(&self, word: &str) -> Vec<Pair> {
        self.cache
            .commands()
            .iter()
            .filter(|cmd| cmd.starts_with(word))
            .map(|cmd| Pair {
                display: cmd.clone(),
                replacement: cmd.clone(),
            })
            .collect()
    }

    /// Candidates for a partially typed path; `cd` only offers directories
    pub fn complete_path(&self, path: &str, command: &str) -> Vec<Pair> {
        let (dir_part, file_prefix) = match path.rfind('/') {
            Some(slash) => path.split_at(slash + 1),
            None => ("", path),
        };

        let dir = self.cache.current_path().join(dir_part);
        self.cache
            .entries(&dir)
            .into_iter()
            .filter(|entry| entry.name.starts_with(file_prefix))
            .filter(|entry| command != "cd" || entry.is_dir)
            .map(|entry| {
                let suffix = if entry.is_dir { "/" } else { "" };
                Pair {
                    replacement: format!("{dir_part}{}{suffix}", entry.name),
                    display: format!("{}{suffix}", entry.name),
                }
            })
            .collect()
    }
}

impl Completer for ShellCompleter {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let line = &line[..pos];
        let words: Vec<&str> = line.split_whitespace().collect();
        let Some(command) = words.first() else {
            return Ok((0, Vec::new()));
        };

        if words.len() == 1 && !line.ends_with(char::is_whitespace) {
            let start = line.len() - command.len();
            return Ok((start, self.complete_command(command)));
        }

        let word = if line.ends_with(char::is_whitespace) {
            ""
        } else {
            words.last().copied().unwrap_or("")
        };
        Ok((pos - word.len(), self.complete_path(word, command)))
    }
}

impl rustyline::Helper for ShellCompleter {}
impl rustyline::highlight::Highlighter for ShellCompleter {}
impl rustyline::hint::Hinter for ShellCompleter {
    type Hint = String;
}
impl rustyline::validate::Validator for ShellCompleter {}
