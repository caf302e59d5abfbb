use log::debug;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

use crate::config::ReaderOptions;

/// A leaf file inside the archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    /// Normalized path (`/`-separated, no leading slash)
    pub path: String,
    /// Size of the member's contents in bytes
    pub size: u64,
    /// Position of the contents within the decompressed tar stream
    pub offset: u64,
}

impl Member {
    pub fn new(path: impl Into<String>, size: u64, offset: u64) -> Self {
        Member {
            path: normalize_path(&path.into()),
            size,
            offset,
        }
    }
}

/// Strip `./` and `/` prefixes that tar writers commonly leave on names
pub fn normalize_path(path: &str) -> String {
    let mut path = path;
    loop {
        if let Some(rest) = path.strip_prefix("./") {
            path = rest;
        } else if let Some(rest) = path.strip_prefix('/') {
            path = rest;
        } else {
            break;
        }
    }
    path.to_string()
}

/// Ordered map from member path to member metadata.
///
/// Keys are kept sorted so every path under a prefix forms one contiguous
/// range; prefix queries walk that range instead of the whole index.
#[derive(Debug, Clone, Default)]
pub struct MemberIndex {
    members: BTreeMap<String, Member>,
}

impl MemberIndex {
    /// Build the index from table-of-contents entries.
    ///
    /// Entries not matching the configured extension are dropped. When the
    /// archive lists the same path twice the last entry wins, as it would on
    /// extraction.
    pub fn build(entries: impl IntoIterator<Item = Member>, options: &ReaderOptions) -> Self {
        let mut members = BTreeMap::new();
        for member in entries {
            if member.path.is_empty() || !options.matches(&member.path) {
                continue;
            }
            if let Some(previous) = members.insert(member.path.clone(), member) {
                debug!("duplicate archive member {}, keeping the later copy", previous.path);
            }
        }
        MemberIndex { members }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<&Member> {
        self.members.get(path)
    }

    /// All member paths in sorted order
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.members.keys().map(String::as_str)
    }

    /// Members whose path starts with `prefix`, in sorted order
    pub fn under<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a Member> + 'a {
        self.members
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(move |(path, _)| path.starts_with(prefix))
            .map(|(_, member)| member)
    }

    /// Immediate child names below `prefix`
    pub fn children_of(&self, prefix: &str) -> BTreeSet<String> {
        self.under(prefix)
            .filter_map(|member| {
                let rest = &member.path[prefix.len()..];
                let child = rest.split('/').next().unwrap_or(rest);
                (!child.is_empty()).then(|| child.to_string())
            })
            .collect()
    }

    /// True if some member lives below `full_path/`
    pub fn is_directory(&self, full_path: &str) -> bool {
        let dir = format!("{full_path}/");
        self.under(&dir).next().is_some()
    }

    /// True if `full_path` is exactly a member
    pub fn is_leaf(&self, full_path: &str) -> bool {
        self.members.contains_key(full_path)
    }

    /// The single top-level directory shared by every member, if any.
    ///
    /// Returns `segment/` when all members sit below the same first segment,
    /// and an empty string when any member is at top level or several
    /// top-level segments exist.
    pub fn root_prefix(&self) -> String {
        let mut shared: Option<&str> = None;
        for path in self.members.keys() {
            let Some((segment, _)) = path.split_once('/') else {
                return String::new();
            };
            match shared {
                None => shared = Some(segment),
                Some(s) if s == segment => {}
                Some(_) => return String::new(),
            }
        }
        shared.map(|s| format!("{s}/")).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(paths: &[&str]) -> MemberIndex {
        MemberIndex::build(
            paths.iter().map(|p| Member::new(*p, 10, 0)),
            &ReaderOptions::default(),
        )
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("./Sess/Head.nc"), "Sess/Head.nc");
        assert_eq!(normalize_path("/Sess/Head.nc"), "Sess/Head.nc");
        assert_eq!(normalize_path("././/a.nc"), "a.nc");
        assert_eq!(normalize_path("a/./b.nc"), "a/./b.nc");
    }

    #[test]
    fn test_build_filters_extension() {
        let idx = index(&["S/Head.nc", "S/History/log.hist", "S/wrapper"]);
        assert_eq!(idx.len(), 1);
        assert!(idx.is_leaf("S/Head.nc"));
    }

    #[test]
    fn test_duplicates_last_wins() {
        let idx = MemberIndex::build(
            vec![Member::new("a/x.nc", 1, 512), Member::new("a/x.nc", 2, 2048)],
            &ReaderOptions::default(),
        );
        assert_eq!(idx.len(), 1);
        assert_eq!(idx.get("a/x.nc").unwrap().offset, 2048);
    }

    #[test]
    fn test_children_of() {
        let idx = index(&[
            "S/Apriori/Antenna.nc",
            "S/Apriori/Clock.nc",
            "S/Scan/Time.nc",
            "S/Head.nc",
        ]);
        let root: Vec<_> = idx.children_of("S/").into_iter().collect();
        assert_eq!(root, vec!["Apriori", "Head.nc", "Scan"]);
        let apriori: Vec<_> = idx.children_of("S/Apriori/").into_iter().collect();
        assert_eq!(apriori, vec!["Antenna.nc", "Clock.nc"]);
        assert!(idx.children_of("S/Missing/").is_empty());
    }

    #[test]
    fn test_children_of_does_not_match_sibling_prefix() {
        let idx = index(&["S/Scan/a.nc", "S/ScanX/b.nc"]);
        let children: Vec<_> = idx.children_of("S/Scan/").into_iter().collect();
        assert_eq!(children, vec!["a.nc"]);
    }

    #[test]
    fn test_directory_and_leaf() {
        let idx = index(&["a/x.nc", "a.nc"]);
        assert!(idx.is_directory("a"));
        assert!(!idx.is_directory("a.nc"));
        assert!(idx.is_leaf("a.nc"));
        assert!(!idx.is_leaf("a"));
        assert!(!idx.is_directory("a/x"));
    }

    #[test]
    fn test_root_prefix_single_directory() {
        let idx = index(&["Sess/Apriori/Antenna.nc", "Sess/Scan/Time.nc"]);
        assert_eq!(idx.root_prefix(), "Sess/");
    }

    #[test]
    fn test_root_prefix_multiple_directories() {
        let idx = index(&["A/x.nc", "B/y.nc"]);
        assert_eq!(idx.root_prefix(), "");
    }

    #[test]
    fn test_root_prefix_top_level_leaf() {
        let idx = index(&["Sess/x.nc", "Head.nc"]);
        assert_eq!(idx.root_prefix(), "");
    }

    #[test]
    fn test_root_prefix_empty() {
        assert_eq!(index(&[]).root_prefix(), "");
    }
}
