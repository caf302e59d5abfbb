pub mod handle;
pub mod index;
pub mod tar;

use bytes::Bytes;
use std::io;

use crate::config::ReaderOptions;

pub use handle::{ArchiveHandle, ArchiveSummary};
pub use index::{Member, MemberIndex};

/// Access to the members of an opened archive stream
pub trait ArchiveReader {
    /// Build an index of the archive contents.
    /// This reads the table of contents without keeping member bytes in memory.
    fn build_index(&mut self, options: &ReaderOptions) -> io::Result<MemberIndex>;

    /// Extract the bytes of a single indexed member
    fn extract(&mut self, member: &Member) -> io::Result<Bytes>;
}
