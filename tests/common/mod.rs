//! Fixture builders shared by the integration tests: a minimal netCDF
//! classic writer and an in-memory gzip-tar builder.

#![allow(dead_code)]

use flate2::Compression;
use flate2::write::GzEncoder;
use std::cell::Cell;
use std::io::Cursor;
use std::rc::Rc;

use vgosdb::{
    ArchiveHandle, ArrayData, ArrayTable, Attribute, DecodeError, NetcdfDecoder, ReaderOptions,
};

/// Values of one netCDF variable or attribute
#[derive(Debug, Clone)]
pub enum Values {
    Byte(Vec<i8>),
    Char(Vec<u8>),
    Short(Vec<i16>),
    Int(Vec<i32>),
    Float(Vec<f32>),
    Double(Vec<f64>),
}

impl Values {
    pub fn text(s: &str) -> Self {
        Values::Char(s.as_bytes().to_vec())
    }

    /// Fixed-width, NUL-padded strings, as a `[N, width]` char array
    pub fn strings(items: &[&str], width: usize) -> Self {
        let mut bytes = Vec::with_capacity(items.len() * width);
        for item in items {
            let mut padded = item.as_bytes().to_vec();
            padded.resize(width, 0);
            bytes.extend_from_slice(&padded);
        }
        Values::Char(bytes)
    }

    fn code(&self) -> u32 {
        match self {
            Values::Byte(_) => 1,
            Values::Char(_) => 2,
            Values::Short(_) => 3,
            Values::Int(_) => 4,
            Values::Float(_) => 5,
            Values::Double(_) => 6,
        }
    }

    fn elem_size(&self) -> usize {
        match self {
            Values::Byte(_) | Values::Char(_) => 1,
            Values::Short(_) => 2,
            Values::Int(_) | Values::Float(_) => 4,
            Values::Double(_) => 8,
        }
    }

    fn len(&self) -> usize {
        match self {
            Values::Byte(v) => v.len(),
            Values::Char(v) => v.len(),
            Values::Short(v) => v.len(),
            Values::Int(v) => v.len(),
            Values::Float(v) => v.len(),
            Values::Double(v) => v.len(),
        }
    }

    fn to_be_bytes(&self) -> Vec<u8> {
        match self {
            Values::Byte(v) => v.iter().map(|&x| x as u8).collect(),
            Values::Char(v) => v.clone(),
            Values::Short(v) => v.iter().flat_map(|x| x.to_be_bytes()).collect(),
            Values::Int(v) => v.iter().flat_map(|x| x.to_be_bytes()).collect(),
            Values::Float(v) => v.iter().flat_map(|x| x.to_be_bytes()).collect(),
            Values::Double(v) => v.iter().flat_map(|x| x.to_be_bytes()).collect(),
        }
    }
}

fn pad4(buf: &mut Vec<u8>) {
    while buf.len() % 4 != 0 {
        buf.push(0);
    }
}

fn round_up_4(n: usize) -> usize {
    n.div_ceil(4) * 4
}

struct Var {
    name: String,
    dim_ids: Vec<usize>,
    attrs: Vec<(String, Values)>,
    values: Values,
}

/// Writer for netCDF classic (CDF-1) and 64-bit offset (CDF-2) files.
///
/// A dimension of length 0 is the record dimension; `records(n)` sets how
/// many records the record variables hold.
pub struct NcFile {
    offset64: bool,
    numrecs: usize,
    dims: Vec<(String, usize)>,
    attrs: Vec<(String, Values)>,
    vars: Vec<Var>,
}

impl NcFile {
    pub fn new() -> Self {
        NcFile {
            offset64: false,
            numrecs: 0,
            dims: Vec::new(),
            attrs: Vec::new(),
            vars: Vec::new(),
        }
    }

    pub fn offset64(mut self) -> Self {
        self.offset64 = true;
        self
    }

    pub fn records(mut self, n: usize) -> Self {
        self.numrecs = n;
        self
    }

    pub fn dim(mut self, name: &str, len: usize) -> Self {
        self.dims.push((name.to_string(), len));
        self
    }

    pub fn attr(mut self, name: &str, value: Values) -> Self {
        self.attrs.push((name.to_string(), value));
        self
    }

    pub fn var(mut self, name: &str, dims: &[&str], values: Values) -> Self {
        let dim_ids = dims
            .iter()
            .map(|d| {
                self.dims
                    .iter()
                    .position(|(n, _)| n == d)
                    .unwrap_or_else(|| panic!("unknown dimension {d}"))
            })
            .collect();
        self.vars.push(Var {
            name: name.to_string(),
            dim_ids,
            attrs: Vec::new(),
            values,
        });
        self
    }

    /// Attach an attribute to the most recently added variable
    pub fn var_attr(mut self, name: &str, value: Values) -> Self {
        let var = self.vars.last_mut().expect("var_attr needs a variable");
        var.attrs.push((name.to_string(), value));
        self
    }

    fn is_record(&self, var: &Var) -> bool {
        var.dim_ids.first().is_some_and(|&id| self.dims[id].1 == 0)
    }

    /// Bytes per record for record variables, whole size otherwise
    fn slab_size(&self, var: &Var) -> usize {
        if self.is_record(var) {
            var.values.len() * var.values.elem_size() / self.numrecs.max(1)
        } else {
            var.values.len() * var.values.elem_size()
        }
    }

    fn put_u32(buf: &mut Vec<u8>, v: usize) {
        buf.extend_from_slice(&(v as u32).to_be_bytes());
    }

    fn put_name(buf: &mut Vec<u8>, name: &str) {
        Self::put_u32(buf, name.len());
        buf.extend_from_slice(name.as_bytes());
        pad4(buf);
    }

    fn put_attrs(buf: &mut Vec<u8>, attrs: &[(String, Values)]) {
        if attrs.is_empty() {
            buf.extend_from_slice(&[0; 8]);
            return;
        }
        Self::put_u32(buf, 0x0C);
        Self::put_u32(buf, attrs.len());
        for (name, value) in attrs {
            Self::put_name(buf, name);
            Self::put_u32(buf, value.code() as usize);
            Self::put_u32(buf, value.len());
            buf.extend_from_slice(&value.to_be_bytes());
            pad4(buf);
        }
    }

    fn header(&self, begins: &[usize]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(if self.offset64 { b"CDF\x02" } else { b"CDF\x01" });
        Self::put_u32(&mut buf, self.numrecs);

        if self.dims.is_empty() {
            buf.extend_from_slice(&[0; 8]);
        } else {
            Self::put_u32(&mut buf, 0x0A);
            Self::put_u32(&mut buf, self.dims.len());
            for (name, len) in &self.dims {
                Self::put_name(&mut buf, name);
                Self::put_u32(&mut buf, *len);
            }
        }

        Self::put_attrs(&mut buf, &self.attrs);

        if self.vars.is_empty() {
            buf.extend_from_slice(&[0; 8]);
        } else {
            Self::put_u32(&mut buf, 0x0B);
            Self::put_u32(&mut buf, self.vars.len());
            for (var, &begin) in self.vars.iter().zip(begins) {
                Self::put_name(&mut buf, &var.name);
                Self::put_u32(&mut buf, var.dim_ids.len());
                for &id in &var.dim_ids {
                    Self::put_u32(&mut buf, id);
                }
                Self::put_attrs(&mut buf, &var.attrs);
                Self::put_u32(&mut buf, var.values.code() as usize);
                Self::put_u32(&mut buf, round_up_4(self.slab_size(var)));
                if self.offset64 {
                    buf.extend_from_slice(&(begin as u64).to_be_bytes());
                } else {
                    Self::put_u32(&mut buf, begin);
                }
            }
        }
        buf
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        // Offsets do not change the header length, so measure it first
        let header_len = self.header(&vec![0; self.vars.len()]).len();

        let record_count = self.vars.iter().filter(|v| self.is_record(v)).count();
        let pad_records = record_count > 1;

        let mut begins = vec![0; self.vars.len()];
        let mut offset = header_len;
        for (i, var) in self.vars.iter().enumerate() {
            if !self.is_record(var) {
                begins[i] = offset;
                offset += round_up_4(self.slab_size(var));
            }
        }
        for (i, var) in self.vars.iter().enumerate() {
            if self.is_record(var) {
                begins[i] = offset;
                let slab = self.slab_size(var);
                offset += if pad_records { round_up_4(slab) } else { slab };
            }
        }

        let mut buf = self.header(&begins);
        for var in self.vars.iter().filter(|v| !self.is_record(v)) {
            buf.extend_from_slice(&var.values.to_be_bytes());
            pad4(&mut buf);
        }
        for r in 0..self.numrecs {
            for var in self.vars.iter().filter(|v| self.is_record(v)) {
                let slab = self.slab_size(var);
                let bytes = var.values.to_be_bytes();
                buf.extend_from_slice(&bytes[r * slab..(r + 1) * slab]);
                if pad_records {
                    pad4(&mut buf);
                }
            }
        }
        buf
    }
}

/// Build a gzip-compressed tar archive holding the given files
pub fn targz(files: &[(&str, &[u8])]) -> Vec<u8> {
    targz_with_dirs(&[], files)
}

/// Like [`targz`], with explicit directory entries written first
pub fn targz_with_dirs(dirs: &[&str], files: &[(&str, &[u8])]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);

    for dir in dirs {
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Directory);
        header.set_size(0);
        header.set_mode(0o755);
        header.set_cksum();
        builder.append_data(&mut header, dir, std::io::empty()).unwrap();
    }
    for (path, data) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, path, *data).unwrap();
    }

    builder.into_inner().unwrap().finish().unwrap()
}

/// Open an in-memory archive with the netCDF decoder
pub fn open(bytes: Vec<u8>) -> ArchiveHandle {
    ArchiveHandle::from_reader(
        "session.tgz",
        Cursor::new(bytes),
        ReaderOptions::default(),
        Box::new(NetcdfDecoder),
    )
    .unwrap()
}

/// Open an in-memory archive with a decoder that wraps the raw member bytes
/// in a table and counts its calls
pub fn open_counting(bytes: Vec<u8>, options: ReaderOptions) -> (ArchiveHandle, Rc<Cell<usize>>) {
    let calls = Rc::new(Cell::new(0));
    let counter = Rc::clone(&calls);
    let decoder = move |raw: &[u8]| -> Result<ArrayTable, DecodeError> {
        counter.set(counter.get() + 1);
        if raw.starts_with(b"corrupt") {
            return Err(DecodeError::BadMagic);
        }
        Ok(raw_table(raw))
    };
    let archive =
        ArchiveHandle::from_reader("session.tgz", Cursor::new(bytes), options, Box::new(decoder))
            .unwrap();
    (archive, calls)
}

/// The table the counting decoder produces for `raw`
pub fn raw_table(raw: &[u8]) -> ArrayTable {
    ArrayTable {
        attributes: vec![Attribute {
            name: "raw".to_string(),
            value: ArrayData::Char(raw.to_vec()),
        }],
        ..ArrayTable::default()
    }
}
