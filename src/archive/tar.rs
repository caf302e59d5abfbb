use bytes::Bytes;
use flate2::read::MultiGzDecoder;
use log::debug;
use std::io::{self, BufReader, Read, Seek, SeekFrom};

use crate::config::ReaderOptions;

use super::{ArchiveReader, Member, MemberIndex};

/// Reader for gzip-compressed tar archives.
///
/// Gzip streams are not seekable, so extraction rewinds the underlying file
/// and decompresses forward to the member's recorded offset.
pub struct TarGzReader<R> {
    inner: R,
}

impl<R: Read + Seek> TarGzReader<R> {
    pub fn new(inner: R) -> Self {
        TarGzReader { inner }
    }

    /// Restart decompression from the beginning of the archive
    fn rewind(&mut self) -> io::Result<MultiGzDecoder<BufReader<&mut R>>> {
        self.inner.seek(SeekFrom::Start(0))?;
        Ok(MultiGzDecoder::new(BufReader::new(&mut self.inner)))
    }
}

impl<R: Read + Seek> ArchiveReader for TarGzReader<R> {
    fn build_index(&mut self, options: &ReaderOptions) -> io::Result<MemberIndex> {
        let decoder = self.rewind()?;
        let mut archive = tar::Archive::new(decoder);

        let mut members = Vec::new();
        let mut seen = 0usize;
        for entry in archive.entries()? {
            let entry = entry?;
            seen += 1;

            if !entry.header().entry_type().is_file() {
                continue;
            }

            let path = entry.path()?.to_string_lossy().into_owned();
            let size = entry.header().size()?;
            members.push(Member::new(path, size, entry.raw_file_position()));
        }

        let index = MemberIndex::build(members, options);
        debug!(
            "indexed {} of {} tar entries matching {}",
            index.len(),
            seen,
            options.extension
        );
        Ok(index)
    }

    fn extract(&mut self, member: &Member) -> io::Result<Bytes> {
        let mut decoder = self.rewind()?;
        skip_exact(&mut decoder, member.offset)?;

        let mut buffer = Vec::with_capacity(usize::try_from(member.size).unwrap_or(0));
        decoder.take(member.size).read_to_end(&mut buffer)?;
        if (buffer.len() as u64) < member.size {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "archive ended after {} of {} bytes of {}",
                    buffer.len(),
                    member.size,
                    member.path
                ),
            ));
        }
        Ok(Bytes::from(buffer))
    }
}

/// Skip exactly n bytes from a reader.
/// Read-and-discard, since the decompressed stream cannot seek.
fn skip_exact<R: Read>(r: &mut R, n: u64) -> io::Result<()> {
    let skipped = io::copy(&mut r.take(n), &mut io::sink())?;
    if skipped < n {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("EOF while skipping tar payload ({skipped} of {n} bytes)"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::{Cursor, Write};

    fn tar_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut tar = tar::Builder::new(Vec::new());
        for (path, content) in files {
            let mut header = tar::Header::new_gnu();
            header.set_path(path).unwrap();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            tar.append(&header, *content).unwrap();
        }
        tar.into_inner().unwrap()
    }

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn targz(files: &[(&str, &[u8])]) -> Vec<u8> {
        gzip(&tar_bytes(files))
    }

    #[test]
    fn test_skip_exact() {
        let mut data: &[u8] = b"0123456789";
        skip_exact(&mut data, 4).unwrap();
        assert_eq!(data, b"456789");

        let mut short: &[u8] = b"abc";
        let err = skip_exact(&mut short, 10).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_index_and_extract() {
        let data = targz(&[
            ("S/Head.nc", b"head bytes".as_slice()),
            ("S/notes.txt", b"ignored".as_slice()),
            ("S/Scan/Time.nc", b"time bytes, a little longer".as_slice()),
        ]);
        let mut reader = TarGzReader::new(Cursor::new(data));
        let index = reader.build_index(&ReaderOptions::default()).unwrap();

        assert_eq!(index.len(), 2);
        let member = index.get("S/Scan/Time.nc").unwrap().clone();
        assert_eq!(member.size, 27);
        assert_eq!(
            reader.extract(&member).unwrap(),
            Bytes::from_static(b"time bytes, a little longer")
        );

        // Extraction rewinds, so members can be read in any order
        let head = index.get("S/Head.nc").unwrap().clone();
        assert_eq!(reader.extract(&head).unwrap(), Bytes::from_static(b"head bytes"));
    }

    #[test]
    fn test_multi_member_gzip() {
        let tar = tar_bytes(&[
            ("Sess/A/x.nc", b"first".as_slice()),
            ("Sess/B/y.nc", b"second".as_slice()),
        ]);
        // Split between the first member's data block and the second header
        let mut data = gzip(&tar[..1024]);
        data.extend(gzip(&tar[1024..]));

        let mut reader = TarGzReader::new(Cursor::new(data));
        let index = reader.build_index(&ReaderOptions::default()).unwrap();
        assert_eq!(index.len(), 2);

        let second = index.get("Sess/B/y.nc").unwrap().clone();
        assert_eq!(reader.extract(&second).unwrap(), Bytes::from_static(b"second"));
    }

    #[test]
    fn test_not_gzip() {
        let mut reader = TarGzReader::new(Cursor::new(b"plain text, not an archive".to_vec()));
        assert!(reader.build_index(&ReaderOptions::default()).is_err());
    }

    #[test]
    fn test_extract_past_end() {
        let data = targz(&[("a.nc", b"abc".as_slice())]);
        let mut reader = TarGzReader::new(Cursor::new(data));
        let bogus = Member::new("b.nc", 16, 1 << 20);
        let err = reader.extract(&bogus).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
