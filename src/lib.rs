//! Read-only, path-addressable access to vgosDB session archives.
//!
//! A session archive is a gzip-compressed tar file holding one netCDF file per
//! variable group. [`ArchiveHandle`] indexes the members once at open time and
//! hands out [`VirtualNode`]s that navigate the archive like a directory tree,
//! decoding each leaf lazily and at most once.
//!
//! ```no_run
//! use vgosdb::ArchiveHandle;
//!
//! # fn main() -> vgosdb::Result<()> {
//! let archive = ArchiveHandle::open("20250520-p2025140.tgz")?;
//! let antenna = archive.root().node("Apriori")?.table("Antenna.nc")?;
//! for variable in &antenna.variables {
//!     println!("{} {:?}", variable.name, variable.shape);
//! }
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod archive;
pub mod cache;
pub mod config;
pub mod error;
pub mod netcdf;
pub mod shell;
pub mod ui;
pub mod vfs;

pub use archive::{ArchiveHandle, ArchiveSummary};
pub use config::ReaderOptions;
pub use error::{Error, Result};
pub use netcdf::{
    ArrayData, ArrayTable, Attribute, DecodeError, Decoder, Dimension, NetcdfDecoder, Variable,
};
pub use vfs::{Entry, VirtualNode, VirtualPath};
