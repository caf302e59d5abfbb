use bytes::Bytes;
use log::{debug, info};
use regex::Regex;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use std::rc::Rc;
use std::sync::LazyLock;

use crate::cache::DecodeCache;
use crate::config::ReaderOptions;
use crate::error::{Error, Result};
use crate::netcdf::{ArrayTable, Decoder, NetcdfDecoder};
use crate::vfs::{Entry, VirtualNode};

use super::tar::TarGzReader;
use super::{ArchiveReader, MemberIndex};

/// Short uppercase runs in member paths; IVS station and source codes
/// usually look like this, but so do plenty of other tokens.
static STATION_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("[A-Z]{2,8}").expect("station pattern is valid"));

/// State shared between a handle and the nodes derived from it
pub(crate) struct ArchiveState {
    name: String,
    options: ReaderOptions,
    index: MemberIndex,
    root_prefix: String,
    reader: RefCell<Option<Box<dyn ArchiveReader>>>,
    cache: DecodeCache,
    decoder: Box<dyn Decoder>,
}

impl ArchiveState {
    pub(crate) fn index(&self) -> &MemberIndex {
        &self.index
    }

    pub(crate) fn options(&self) -> &ReaderOptions {
        &self.options
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.reader.borrow().is_none()
    }

    fn read_member(&self, path: &str) -> Result<Bytes> {
        let member = self.index.get(path).ok_or_else(|| Error::PathNotFound {
            requested: path.to_string(),
            context: String::new(),
        })?;
        let mut reader = self.reader.borrow_mut();
        let reader = reader.as_mut().ok_or(Error::Closed)?;
        reader.extract(member).map_err(|source| Error::Io {
            path: path.to_string(),
            source,
        })
    }

    /// Decoded table for a leaf, extracting and decoding it on first use
    pub(crate) fn table(&self, path: &str) -> Result<Rc<ArrayTable>> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        self.cache
            .get_or_decode(path, |p| self.read_member(p), self.decoder.as_ref())
    }

    fn close(&self) {
        if self.reader.borrow_mut().take().is_some() {
            info!("closed archive {}", self.name);
        }
        self.cache.clear();
    }
}

/// An opened vgosDB session archive.
///
/// The handle owns the archive stream, the member index and the decode
/// cache. [`VirtualNode`]s obtained from it hold only a weak reference:
/// once the handle is closed or dropped every node fails with
/// [`Error::Closed`]. Dropping the handle closes it, so a handle bound in a
/// scope is released on every exit path.
///
/// A handle is single-threaded; it is neither `Send` nor `Sync`.
pub struct ArchiveHandle {
    state: Rc<ArchiveState>,
}

impl ArchiveHandle {
    /// Open a `.tgz` archive with the default options and netCDF decoder
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, ReaderOptions::default(), Box::new(NetcdfDecoder))
    }

    pub fn open_with(
        path: impl AsRef<Path>,
        options: ReaderOptions,
        decoder: Box<dyn Decoder>,
    ) -> Result<Self> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let file = File::open(path).map_err(|source| Error::ArchiveFormat {
            path: display.clone(),
            source,
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or(display);
        Self::from_reader(name, BufReader::new(file), options, decoder)
    }

    /// Open an archive from any seekable byte source
    pub fn from_reader<R>(
        name: impl Into<String>,
        reader: R,
        options: ReaderOptions,
        decoder: Box<dyn Decoder>,
    ) -> Result<Self>
    where
        R: Read + Seek + 'static,
    {
        let name = name.into();
        let mut reader = TarGzReader::new(reader);
        let index = reader
            .build_index(&options)
            .map_err(|source| Error::ArchiveFormat {
                path: name.clone(),
                source,
            })?;

        let root_prefix = if options.strip_single_root {
            index.root_prefix()
        } else {
            String::new()
        };
        if !root_prefix.is_empty() {
            debug!("stripping common root directory {root_prefix}");
        }
        info!("opened archive {name}: {} members", index.len());

        let state = ArchiveState {
            name,
            options,
            index,
            root_prefix,
            reader: RefCell::new(Some(Box::new(reader))),
            cache: DecodeCache::new(),
            decoder,
        };
        Ok(ArchiveHandle {
            state: Rc::new(state),
        })
    }

    /// Release the archive stream and drop all decoded tables.
    /// Calling this more than once is harmless.
    pub fn close(&self) {
        self.state.close();
    }

    pub fn is_closed(&self) -> bool {
        self.state.is_closed()
    }

    /// The navigation root, with any common top-level directory stripped
    pub fn root(&self) -> VirtualNode {
        VirtualNode::new(
            Rc::downgrade(&self.state),
            self.state.root_prefix.clone(),
            self.state.root_prefix.len(),
        )
    }

    /// Shorthand for `root().index(name)`
    pub fn index(&self, name: &str) -> Result<Entry> {
        self.root().index(name)
    }

    /// File name of the archive
    pub fn name(&self) -> &str {
        &self.state.name
    }

    /// The stripped top-level directory (`""` if none)
    pub fn root_prefix(&self) -> &str {
        &self.state.root_prefix
    }

    pub fn options(&self) -> &ReaderOptions {
        &self.state.options
    }

    /// Number of indexed leaf files
    pub fn member_count(&self) -> usize {
        self.state.index.len()
    }

    /// Number of tables currently held in the decode cache
    pub fn cached_tables(&self) -> usize {
        self.state.cache.len()
    }

    /// Number of leaf decodes performed since open
    pub fn decode_count(&self) -> usize {
        self.state.cache.decode_count()
    }

    /// All leaf paths relative to the root, sorted
    pub fn list_leaves(&self) -> Result<Vec<String>> {
        self.root().list_leaves()
    }

    /// Leaf paths relative to the root matching a regular expression
    pub fn find(&self, pattern: &str) -> Result<Vec<String>> {
        self.root().find(pattern)
    }

    /// Guess station codes from member paths.
    ///
    /// This is a heuristic: every run of 2 to 8 uppercase letters in a path
    /// segment is reported, which catches station names such as `KOKEE` or
    /// `WETTZELL` but also unrelated tokens. Treat the result as a hint.
    pub fn stations(&self) -> Vec<String> {
        let root = self.root_prefix();
        let mut stations = BTreeSet::new();
        for path in self.state.index.paths() {
            let clean = path.strip_prefix(root).unwrap_or(path);
            for part in clean.split('/') {
                for code in STATION_CODE.find_iter(part) {
                    stations.insert(code.as_str().to_string());
                }
            }
        }
        stations.into_iter().collect()
    }

    pub fn summary(&self) -> ArchiveSummary {
        let root = self.root_prefix();
        let mut categories = BTreeMap::new();
        for path in self.state.index.paths() {
            let clean = path.strip_prefix(root).unwrap_or(path);
            let category = match clean.split_once('/') {
                Some((dir, _)) => dir,
                None => "root",
            };
            *categories.entry(category.to_string()).or_insert(0) += 1;
        }
        ArchiveSummary {
            name: self.state.name.clone(),
            file_count: self.state.index.len(),
            stations: self.stations(),
            categories,
        }
    }

    /// Directory tree below the root, with a title line
    pub fn render_tree(&self, max_depth: usize) -> Result<String> {
        let tree = self.root().render_tree(max_depth)?;
        Ok(format!(
            "VgosDB Archive: {}\n{}\n{}",
            self.state.name,
            "=".repeat(40),
            tree
        ))
    }
}

impl Drop for ArchiveHandle {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for ArchiveHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveHandle")
            .field("name", &self.state.name)
            .field("root_prefix", &self.state.root_prefix)
            .field("members", &self.state.index.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Overview of an archive's contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub name: String,
    pub file_count: usize,
    /// Heuristic station codes, see [`ArchiveHandle::stations`]
    pub stations: Vec<String>,
    /// Leaf count per top-level directory; top-level leaves count as `root`
    pub categories: BTreeMap<String, usize>,
}

impl fmt::Display for ArchiveSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "VgosDB Archive Summary: {}", self.name)?;
        writeln!(f, "{}", "=".repeat(50))?;
        writeln!(f, "NetCDF files: {}", self.file_count)?;
        if self.stations.is_empty() {
            writeln!(f, "Potential stations: None detected")?;
        } else {
            writeln!(f, "Potential stations: {}", self.stations.join(", "))?;
        }
        if !self.categories.is_empty() {
            writeln!(f)?;
            writeln!(f, "File categories:")?;
            for (category, count) in &self.categories {
                writeln!(f, "  {category}: {count} files")?;
            }
        }
        Ok(())
    }
}
