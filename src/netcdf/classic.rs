//! Parser for the netCDF classic file formats.
//!
//! All three variants share one layout: a header listing dimensions, global
//! attributes and variables, followed by the data section. Non-record
//! variables are stored contiguously at their `begin` offset; record
//! variables are interleaved, one slab per record, `recsize` bytes apart.
//! Everything is big-endian.

use super::{ArrayData, ArrayTable, Attribute, DecodeError, Dimension, Variable};

const HDF5_MAGIC: &[u8] = b"\x89HDF\r\n\x1a\n";

const NC_DIMENSION: u32 = 0x0A;
const NC_VARIABLE: u32 = 0x0B;
const NC_ATTRIBUTE: u32 = 0x0C;

type Result<T> = std::result::Result<T, DecodeError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Version {
    /// CDF-1: 32-bit offsets and counts
    Classic,
    /// CDF-2: 64-bit offsets
    Offset64,
    /// CDF-5: 64-bit offsets and counts, extended types
    Data64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NcType {
    Byte,
    Char,
    Short,
    Int,
    Float,
    Double,
    UByte,
    UShort,
    UInt,
    Int64,
    UInt64,
}

impl NcType {
    fn from_code(code: u32, version: Version) -> Result<Self> {
        let ty = match code {
            1 => NcType::Byte,
            2 => NcType::Char,
            3 => NcType::Short,
            4 => NcType::Int,
            5 => NcType::Float,
            6 => NcType::Double,
            7 => NcType::UByte,
            8 => NcType::UShort,
            9 => NcType::UInt,
            10 => NcType::Int64,
            11 => NcType::UInt64,
            _ => return Err(DecodeError::InvalidType(code)),
        };
        if code > 6 && version != Version::Data64 {
            return Err(DecodeError::InvalidType(code));
        }
        Ok(ty)
    }

    fn size(self) -> usize {
        match self {
            NcType::Byte | NcType::Char | NcType::UByte => 1,
            NcType::Short | NcType::UShort => 2,
            NcType::Int | NcType::Float | NcType::UInt => 4,
            NcType::Double | NcType::Int64 | NcType::UInt64 => 8,
        }
    }
}

macro_rules! be_values {
    ($raw:expr, $ty:ty) => {{
        const N: usize = std::mem::size_of::<$ty>();
        $raw.chunks_exact(N)
            .map(|chunk| {
                let mut buf = [0u8; N];
                buf.copy_from_slice(chunk);
                <$ty>::from_be_bytes(buf)
            })
            .collect::<Vec<$ty>>()
    }};
}

fn decode_values(ty: NcType, raw: &[u8]) -> ArrayData {
    match ty {
        NcType::Byte => ArrayData::Byte(raw.iter().map(|&b| b as i8).collect()),
        NcType::Char => ArrayData::Char(raw.to_vec()),
        NcType::Short => ArrayData::Short(be_values!(raw, i16)),
        NcType::Int => ArrayData::Int(be_values!(raw, i32)),
        NcType::Float => ArrayData::Float(be_values!(raw, f32)),
        NcType::Double => ArrayData::Double(be_values!(raw, f64)),
        NcType::UByte => ArrayData::UByte(raw.to_vec()),
        NcType::UShort => ArrayData::UShort(be_values!(raw, u16)),
        NcType::UInt => ArrayData::UInt(be_values!(raw, u32)),
        NcType::Int64 => ArrayData::Int64(be_values!(raw, i64)),
        NcType::UInt64 => ArrayData::UInt64(be_values!(raw, u64)),
    }
}

/// Round up to the next 4-byte boundary
fn round_up_4(n: usize) -> usize {
    n.div_ceil(4) * 4
}

fn to_usize(value: u64, what: &str) -> Result<usize> {
    usize::try_from(value).map_err(|_| DecodeError::Malformed(format!("{what} too large: {value}")))
}

fn slice(bytes: &[u8], start: usize, len: usize) -> Result<&[u8]> {
    start
        .checked_add(len)
        .filter(|&end| end <= bytes.len())
        .map(|end| &bytes[start..end])
        .ok_or(DecodeError::Truncated {
            offset: start,
            needed: len,
        })
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
    version: Version,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.bytes.len())
            .ok_or(DecodeError::Truncated {
                offset: self.pos,
                needed: n,
            })?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u32(&mut self) -> Result<u32> {
        let raw = self.take(4)?;
        Ok(u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    fn u64(&mut self) -> Result<u64> {
        let raw = self.take(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(raw);
        Ok(u64::from_be_bytes(buf))
    }

    /// NON_NEG: element counts and lengths, 64-bit only in CDF-5
    fn non_neg(&mut self) -> Result<usize> {
        let value = match self.version {
            Version::Data64 => self.u64()?,
            _ => u64::from(self.u32()?),
        };
        to_usize(value, "count")
    }

    /// OFFSET: data section positions, 32-bit only in CDF-1
    fn offset(&mut self) -> Result<usize> {
        let value = match self.version {
            Version::Classic => u64::from(self.u32()?),
            _ => self.u64()?,
        };
        to_usize(value, "offset")
    }

    fn skip_padding(&mut self, len: usize) -> Result<()> {
        self.take(round_up_4(len) - len).map(|_| ())
    }

    fn name(&mut self) -> Result<String> {
        let len = self.non_neg()?;
        let raw = self.take(len)?;
        let name = String::from_utf8_lossy(raw).into_owned();
        self.skip_padding(len)?;
        Ok(name)
    }

    fn nc_type(&mut self) -> Result<NcType> {
        let code = self.u32()?;
        NcType::from_code(code, self.version)
    }

    /// Read a list header, returning the element count (0 when ABSENT)
    fn list_header(&mut self, expected_tag: u32) -> Result<usize> {
        let tag = self.u32()?;
        let count = self.non_neg()?;
        match tag {
            0 if count == 0 => Ok(0),
            0 => Err(DecodeError::Malformed(format!(
                "absent list with {count} elements"
            ))),
            t if t == expected_tag => Ok(count),
            t => Err(DecodeError::Malformed(format!(
                "expected list tag {expected_tag:#x}, found {t:#x}"
            ))),
        }
    }

    fn attributes(&mut self) -> Result<Vec<Attribute>> {
        let count = self.list_header(NC_ATTRIBUTE)?;
        let mut attributes = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            let name = self.name()?;
            let ty = self.nc_type()?;
            let nelems = self.non_neg()?;
            let len = nelems
                .checked_mul(ty.size())
                .ok_or_else(|| DecodeError::Malformed(format!("attribute {name} too large")))?;
            let raw = self.take(len)?;
            self.skip_padding(len)?;
            attributes.push(Attribute {
                name,
                value: decode_values(ty, raw),
            });
        }
        Ok(attributes)
    }
}

struct VariableHeader {
    name: String,
    dim_ids: Vec<usize>,
    attributes: Vec<Attribute>,
    ty: NcType,
    begin: usize,
}

pub(crate) fn parse(bytes: &[u8]) -> Result<ArrayTable> {
    if bytes.starts_with(HDF5_MAGIC) {
        return Err(DecodeError::Unsupported("netCDF-4/HDF5".to_string()));
    }
    if bytes.len() < 4 || &bytes[..3] != b"CDF" {
        return Err(DecodeError::BadMagic);
    }
    let version = match bytes[3] {
        1 => Version::Classic,
        2 => Version::Offset64,
        5 => Version::Data64,
        v => return Err(DecodeError::Unsupported(format!("CDF version {v}"))),
    };

    let mut reader = Reader {
        bytes,
        pos: 4,
        version,
    };

    // STREAMING (all bits set) means the record count must be inferred
    let numrecs = match version {
        Version::Data64 => {
            let raw = reader.u64()?;
            (raw != u64::MAX).then_some(raw)
        }
        _ => {
            let raw = reader.u32()?;
            (raw != u32::MAX).then_some(u64::from(raw))
        }
    };

    let dim_count = reader.list_header(NC_DIMENSION)?;
    let mut dims: Vec<(String, usize)> = Vec::with_capacity(dim_count.min(1024));
    for _ in 0..dim_count {
        let name = reader.name()?;
        let len = reader.non_neg()?;
        dims.push((name, len));
    }

    let global_attributes = reader.attributes()?;

    let var_count = reader.list_header(NC_VARIABLE)?;
    let mut headers = Vec::with_capacity(var_count.min(1024));
    for _ in 0..var_count {
        let name = reader.name()?;
        let ndims = reader.non_neg()?;
        let mut dim_ids = Vec::with_capacity(ndims.min(64));
        for _ in 0..ndims {
            let id = reader.non_neg()?;
            if id >= dims.len() {
                return Err(DecodeError::InvalidDimension(id));
            }
            dim_ids.push(id);
        }
        let attributes = reader.attributes()?;
        let ty = reader.nc_type()?;
        // vsize is unreliable for large variables; sizes are recomputed below
        let _vsize = reader.non_neg()?;
        let begin = reader.offset()?;
        headers.push(VariableHeader {
            name,
            dim_ids,
            attributes,
            ty,
            begin,
        });
    }

    let is_record = |header: &VariableHeader| {
        header
            .dim_ids
            .first()
            .is_some_and(|&id| dims[id].1 == 0)
    };

    // Bytes of one record (or the whole variable, for non-record variables)
    let slab_size = |header: &VariableHeader| -> Result<usize> {
        let skip = usize::from(is_record(header));
        header.dim_ids[skip..]
            .iter()
            .try_fold(header.ty.size(), |acc, &id| acc.checked_mul(dims[id].1))
            .ok_or_else(|| DecodeError::Malformed(format!("variable {} too large", header.name)))
    };

    let record_vars: Vec<&VariableHeader> = headers.iter().filter(|&h| is_record(h)).collect();
    let recsize = if record_vars.len() == 1 {
        // A lone record variable is not padded between records
        slab_size(record_vars[0])?
    } else {
        record_vars
            .iter()
            .map(|&h| slab_size(h).map(round_up_4))
            .sum::<Result<usize>>()?
    };

    let numrecs = match numrecs {
        Some(n) => to_usize(n, "record count")?,
        None => {
            let first = record_vars.iter().map(|h| h.begin).min().unwrap_or(bytes.len());
            if recsize == 0 {
                0
            } else {
                bytes.len().saturating_sub(first) / recsize
            }
        }
    };

    let mut variables = Vec::with_capacity(headers.len());
    for header in &headers {
        let slab = slab_size(header)?;
        let record = is_record(header);
        let raw = if record {
            // The last record must lie inside the data before anything is allocated
            if numrecs > 0 && slab > 0 {
                let last = (numrecs - 1)
                    .checked_mul(recsize)
                    .and_then(|o| o.checked_add(header.begin))
                    .ok_or_else(|| DecodeError::Malformed("record offset overflow".to_string()))?;
                slice(bytes, last, slab)?;
            }
            let records = if slab == 0 { 0 } else { numrecs };
            let mut raw = Vec::with_capacity(slab * records);
            for r in 0..records {
                let start = r
                    .checked_mul(recsize)
                    .and_then(|o| o.checked_add(header.begin))
                    .ok_or_else(|| DecodeError::Malformed("record offset overflow".to_string()))?;
                raw.extend_from_slice(slice(bytes, start, slab)?);
            }
            raw
        } else {
            slice(bytes, header.begin, slab)?.to_vec()
        };

        let shape = header
            .dim_ids
            .iter()
            .enumerate()
            .map(|(i, &id)| if i == 0 && record { numrecs } else { dims[id].1 })
            .collect();

        variables.push(Variable {
            name: header.name.clone(),
            dimensions: header.dim_ids.iter().map(|&id| dims[id].0.clone()).collect(),
            shape,
            attributes: header.attributes.clone(),
            data: decode_values(header.ty, &raw),
        });
    }

    let dimensions = dims
        .into_iter()
        .map(|(name, len)| Dimension {
            name,
            len: if len == 0 { numrecs } else { len },
            unlimited: len == 0,
        })
        .collect();

    Ok(ArrayTable {
        dimensions,
        attributes: global_attributes,
        variables,
    })
}
