use humansize::{BINARY, format_size};
use log::debug;
use regex::Regex;
use std::collections::BTreeSet;
use std::rc::{Rc, Weak};

use crate::archive::handle::ArchiveState;
use crate::error::{Error, Result};
use crate::netcdf::ArrayTable;

use super::VirtualPath;
use super::resolver::{PathResolver, Resolution, leaf_pattern};

/// Result of indexing a node by a child name
#[derive(Debug, Clone)]
pub enum Entry {
    /// A subdirectory
    Node(VirtualNode),
    /// A decoded leaf file
    Table(Rc<ArrayTable>),
}

impl Entry {
    pub fn is_node(&self) -> bool {
        matches!(self, Entry::Node(_))
    }

    pub fn as_node(&self) -> Option<&VirtualNode> {
        match self {
            Entry::Node(node) => Some(node),
            Entry::Table(_) => None,
        }
    }

    pub fn as_table(&self) -> Option<&Rc<ArrayTable>> {
        match self {
            Entry::Table(table) => Some(table),
            Entry::Node(_) => None,
        }
    }

    pub fn into_node(self) -> Option<VirtualNode> {
        match self {
            Entry::Node(node) => Some(node),
            Entry::Table(_) => None,
        }
    }

    pub fn into_table(self) -> Option<Rc<ArrayTable>> {
        match self {
            Entry::Table(table) => Some(table),
            Entry::Node(_) => None,
        }
    }
}

/// A directory position inside an opened archive.
///
/// A node is just a prefix plus a weak reference to the archive it came
/// from. Nodes are cheap to clone and two nodes with the same prefix in the
/// same archive are interchangeable.
#[derive(Debug, Clone)]
pub struct VirtualNode {
    archive: Weak<ArchiveState>,
    /// Member path prefix, empty or ending in `/`
    prefix: String,
    /// Length of the archive's stripped root prefix
    root_len: usize,
}

impl PartialEq for VirtualNode {
    fn eq(&self, other: &Self) -> bool {
        Weak::ptr_eq(&self.archive, &other.archive) && self.prefix == other.prefix
    }
}

impl Eq for VirtualNode {}

impl VirtualNode {
    pub(crate) fn new(archive: Weak<ArchiveState>, prefix: String, root_len: usize) -> Self {
        VirtualNode {
            archive,
            prefix,
            root_len,
        }
    }

    fn state(&self) -> Result<Rc<ArchiveState>> {
        let state = self.archive.upgrade().ok_or(Error::Closed)?;
        if state.is_closed() {
            return Err(Error::Closed);
        }
        Ok(state)
    }

    fn child(&self, prefix: String) -> VirtualNode {
        VirtualNode::new(self.archive.clone(), prefix, self.root_len)
    }

    /// Full member prefix, including any stripped root directory
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Position relative to the archive root
    pub fn path(&self) -> VirtualPath {
        VirtualPath::parse(&self.prefix[self.root_len..])
    }

    pub fn is_root(&self) -> bool {
        self.prefix.len() == self.root_len
    }

    /// The enclosing directory; `None` at the root
    pub fn parent(&self) -> Option<VirtualNode> {
        if self.is_root() {
            return None;
        }
        let trimmed = self.prefix.trim_end_matches('/');
        let prefix = match trimmed.rsplit_once('/') {
            Some((parent, _)) => format!("{parent}/"),
            None => String::new(),
        };
        Some(self.child(prefix))
    }

    /// Look up a child by name.
    ///
    /// Directories yield a new node; leaves are extracted and decoded on
    /// first access and served from the cache afterwards. `name` may span
    /// several segments (`"Apriori/Antenna.nc"`).
    pub fn index(&self, name: &str) -> Result<Entry> {
        let state = self.state()?;
        match PathResolver::new(state.index()).resolve(&self.prefix, name) {
            Resolution::Directory(prefix) => Ok(Entry::Node(self.child(prefix))),
            Resolution::Leaf(path) => state.table(&path).map(Entry::Table),
            Resolution::NotFound => Err(self.not_found(name)),
        }
    }

    /// Look up a subdirectory; a leaf is an error and is not decoded
    pub fn node(&self, name: &str) -> Result<VirtualNode> {
        let state = self.state()?;
        match PathResolver::new(state.index()).resolve(&self.prefix, name) {
            Resolution::Directory(prefix) => Ok(self.child(prefix)),
            Resolution::Leaf(path) => Err(Error::NotADirectory(path)),
            Resolution::NotFound => Err(self.not_found(name)),
        }
    }

    /// Look up and decode a leaf
    pub fn table(&self, name: &str) -> Result<Rc<ArrayTable>> {
        let state = self.state()?;
        match PathResolver::new(state.index()).resolve(&self.prefix, name) {
            Resolution::Directory(prefix) => Err(Error::IsADirectory(prefix)),
            Resolution::Leaf(path) => state.table(&path),
            Resolution::NotFound => Err(self.not_found(name)),
        }
    }

    fn not_found(&self, name: &str) -> Error {
        Error::PathNotFound {
            requested: name.to_string(),
            context: self.prefix.clone(),
        }
    }

    /// Names of the immediate children
    pub fn children(&self) -> Result<BTreeSet<String>> {
        Ok(self.state()?.index().children_of(&self.prefix))
    }

    /// Whether a child name denotes a subdirectory
    pub fn is_dir(&self, name: &str) -> Result<bool> {
        let state = self.state()?;
        let resolution = PathResolver::new(state.index()).resolve(&self.prefix, name);
        Ok(matches!(resolution, Resolution::Directory(_)))
    }

    /// Size in bytes of a child leaf, if `name` is one
    pub fn leaf_size(&self, name: &str) -> Result<Option<u64>> {
        let state = self.state()?;
        let full_path = format!("{}{}", self.prefix, name.trim_matches('/'));
        Ok(state.index().get(&full_path).map(|m| m.size))
    }

    /// Every leaf below this node, as sorted relative paths
    pub fn list_leaves(&self) -> Result<Vec<String>> {
        let state = self.state()?;
        let pattern = leaf_pattern(&state.options().extension);
        Ok(PathResolver::new(state.index()).find(&self.prefix, &pattern))
    }

    /// Relative paths below this node matching a regular expression
    pub fn find(&self, pattern: &str) -> Result<Vec<String>> {
        let pattern = Regex::new(pattern)?;
        self.find_regex(&pattern)
    }

    pub fn find_regex(&self, pattern: &Regex) -> Result<Vec<String>> {
        let state = self.state()?;
        Ok(PathResolver::new(state.index()).find(&self.prefix, pattern))
    }

    /// Render the tree below this node.
    ///
    /// Children are listed in name order; leaves show their size.
    /// Directories are expanded while the depth is at most `max_depth`, so 0
    /// lists only the immediate children. Nothing is decoded.
    pub fn render_tree(&self, max_depth: usize) -> Result<String> {
        let state = self.state()?;
        let mut lines = Vec::new();
        self.render_into(&state, max_depth, 0, "", &mut lines)?;
        let mut out = lines.join("\n");
        if !out.is_empty() {
            out.push('\n');
        }
        Ok(out)
    }

    fn render_into(
        &self,
        state: &ArchiveState,
        max_depth: usize,
        depth: usize,
        indent: &str,
        lines: &mut Vec<String>,
    ) -> Result<()> {
        if depth > max_depth {
            return Ok(());
        }
        if state.is_closed() {
            return Err(Error::Closed);
        }

        let resolver = PathResolver::new(state.index());
        let children = state.index().children_of(&self.prefix);
        let count = children.len();

        for (i, name) in children.iter().enumerate() {
            let last = i + 1 == count;
            let connector = if last { "└── " } else { "├── " };
            let full_path = format!("{}{}", self.prefix, name);

            match state.index().get(&full_path) {
                Some(member) => lines.push(format!(
                    "{indent}{connector}{name} ({})",
                    format_size(member.size, BINARY)
                )),
                None => lines.push(format!("{indent}{connector}{name}")),
            }

            if let Resolution::Directory(prefix) = resolver.resolve(&self.prefix, name) {
                let extension = if last { "    " } else { "│   " };
                let child_indent = format!("{indent}{extension}");
                let child = self.child(prefix);
                // A broken subtree must not hide the rest of the listing
                let rendered = child.render_into(state, max_depth, depth + 1, &child_indent, lines);
                if let Err(err) = rendered {
                    debug!("skipping subtree {full_path}: {err}");
                }
            }
        }
        Ok(())
    }
}
