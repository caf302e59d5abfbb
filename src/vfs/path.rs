use std::fmt;

/// A path inside the archive, relative to its (stripped) root
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VirtualPath {
    /// Path segments (e.g., ["Apriori", "Antenna.nc"])
    segments: Vec<String>,
}

impl VirtualPath {
    /// Parse a path string; a leading `/` is accepted and ignored
    pub fn parse(path: &str) -> Self {
        VirtualPath::root().join(path)
    }

    pub fn root() -> Self {
        VirtualPath::default()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Check if this path is empty (root)
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            None
        } else {
            let mut segments = self.segments.clone();
            segments.pop();
            Some(VirtualPath { segments })
        }
    }

    /// Get the last segment (filename)
    pub fn filename(&self) -> Option<&str> {
        self.segments.last().map(|s| s.as_str())
    }

    /// Join this path with another, resolving `.` and `..`.
    ///
    /// An absolute `other` starts over from the root; `..` at the root stays
    /// at the root.
    pub fn join(&self, other: &str) -> Self {
        let mut segments = if other.starts_with('/') {
            Vec::new()
        } else {
            self.segments.clone()
        };

        for segment in other.split('/') {
            if segment.is_empty() || segment == "." {
                continue;
            } else if segment == ".." {
                segments.pop();
            } else {
                segments.push(segment.to_string());
            }
        }

        VirtualPath { segments }
    }

    /// Lookup key understood by `VirtualNode::index`
    pub fn key(&self) -> String {
        self.segments.join("/")
    }
}

impl fmt::Display for VirtualPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.segments.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let path = VirtualPath::parse("/Apriori/Antenna.nc");
        assert_eq!(path.segments(), &["Apriori", "Antenna.nc"]);
        assert_eq!(VirtualPath::parse("Apriori/./Antenna.nc"), path);
    }

    #[test]
    fn test_parent() {
        let path = VirtualPath::parse("Apriori/Antenna.nc");
        assert_eq!(path.parent().unwrap().segments(), &["Apriori"]);
        assert!(VirtualPath::root().parent().is_none());
    }

    #[test]
    fn test_join() {
        let path = VirtualPath::parse("/Observables");
        let joined = path.join("../Scan/TimeUTC.nc");
        assert_eq!(joined.segments(), &["Scan", "TimeUTC.nc"]);
        assert_eq!(joined.filename(), Some("TimeUTC.nc"));
    }

    #[test]
    fn test_join_absolute_and_above_root() {
        let path = VirtualPath::parse("/Observables");
        assert_eq!(path.join("/Apriori").segments(), &["Apriori"]);
        assert!(path.join("../../..").is_empty());
    }

    #[test]
    fn test_display() {
        assert_eq!(VirtualPath::root().to_string(), "/");
        assert_eq!(VirtualPath::parse("a/b.nc").to_string(), "/a/b.nc");
        assert_eq!(VirtualPath::parse("a/b.nc").key(), "a/b.nc");
    }
}
