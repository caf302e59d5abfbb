use regex::Regex;

use crate::archive::MemberIndex;

/// Outcome of looking up a child name under a prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A directory; carries the child's prefix (ending in `/`)
    Directory(String),
    /// A leaf; carries the full member path
    Leaf(String),
    NotFound,
}

/// Resolves child names and searches against a member index
pub struct PathResolver<'a> {
    index: &'a MemberIndex,
}

impl<'a> PathResolver<'a> {
    pub fn new(index: &'a MemberIndex) -> Self {
        PathResolver { index }
    }

    /// Classify `name` under `prefix`.
    ///
    /// A path that is both a leaf and the parent of other members resolves
    /// to the directory.
    pub fn resolve(&self, prefix: &str, name: &str) -> Resolution {
        let name = name.trim_matches('/');
        if name.is_empty() {
            return Resolution::NotFound;
        }

        let full_path = format!("{prefix}{name}");
        if self.index.is_directory(&full_path) {
            Resolution::Directory(format!("{full_path}/"))
        } else if self.index.is_leaf(&full_path) {
            Resolution::Leaf(full_path)
        } else {
            Resolution::NotFound
        }
    }

    /// Paths below `prefix`, relative to it, whose remainder matches `pattern`
    pub fn find(&self, prefix: &str, pattern: &Regex) -> Vec<String> {
        // Index iteration is already sorted and keys are unique
        self.index
            .under(prefix)
            .map(|member| &member.path[prefix.len()..])
            .filter(|relative| pattern.is_match(relative))
            .map(String::from)
            .collect()
    }
}

/// Pattern matching every leaf with the given extension
pub fn leaf_pattern(extension: &str) -> Regex {
    // An escaped literal followed by an anchor always compiles
    Regex::new(&format!("{}$", regex::escape(extension)))
        .expect("escaped extension is a valid regex")
}
