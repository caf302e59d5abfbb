/// Extension of the array files inside a vgosDB session
pub const DEFAULT_EXTENSION: &str = ".nc";

/// Options controlling how an archive is indexed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderOptions {
    /// Only members whose path ends with this suffix are visible
    pub extension: String,
    /// Hide a single top-level directory shared by every member
    pub strip_single_root: bool,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        ReaderOptions {
            extension: DEFAULT_EXTENSION.to_string(),
            strip_single_root: true,
        }
    }
}

impl ReaderOptions {
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn strip_single_root(mut self, strip: bool) -> Self {
        self.strip_single_root = strip;
        self
    }

    /// Check whether a member path is an indexed leaf
    pub fn matches(&self, path: &str) -> bool {
        path.ends_with(&self.extension)
    }
}
