//! In-memory array tables and the decoder seam.
//!
//! The archive layer never looks inside an [`ArrayTable`]; it only caches and
//! returns it. Decoding is delegated to a [`Decoder`], by default the
//! [`NetcdfDecoder`] for the netCDF classic formats.

mod classic;

use thiserror::Error;

/// Failure to decode a member's bytes
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("not a netCDF file (bad magic)")]
    BadMagic,

    #[error("unsupported format: {0}")]
    Unsupported(String),

    #[error("unexpected end of data at offset {offset} (needed {needed} bytes)")]
    Truncated { offset: usize, needed: usize },

    #[error("invalid nc_type {0}")]
    InvalidType(u32),

    #[error("invalid dimension id {0}")]
    InvalidDimension(usize),

    #[error("malformed header: {0}")]
    Malformed(String),
}

/// Turns the raw bytes of one member into an [`ArrayTable`]
pub trait Decoder {
    fn decode(&self, bytes: &[u8]) -> Result<ArrayTable, DecodeError>;
}

impl<F> Decoder for F
where
    F: Fn(&[u8]) -> Result<ArrayTable, DecodeError>,
{
    fn decode(&self, bytes: &[u8]) -> Result<ArrayTable, DecodeError> {
        self(bytes)
    }
}

/// Decoder for netCDF classic (CDF-1), 64-bit offset (CDF-2) and
/// 64-bit data (CDF-5) files
#[derive(Debug, Default, Clone, Copy)]
pub struct NetcdfDecoder;

impl Decoder for NetcdfDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<ArrayTable, DecodeError> {
        classic::parse(bytes)
    }
}

/// Typed, flattened (row-major) values of a variable or attribute
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    Byte(Vec<i8>),
    Char(Vec<u8>),
    Short(Vec<i16>),
    Int(Vec<i32>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    UByte(Vec<u8>),
    UShort(Vec<u16>),
    UInt(Vec<u32>),
    Int64(Vec<i64>),
    UInt64(Vec<u64>),
}

impl ArrayData {
    pub fn len(&self) -> usize {
        match self {
            ArrayData::Byte(v) => v.len(),
            ArrayData::Char(v) => v.len(),
            ArrayData::Short(v) => v.len(),
            ArrayData::Int(v) => v.len(),
            ArrayData::Float(v) => v.len(),
            ArrayData::Double(v) => v.len(),
            ArrayData::UByte(v) => v.len(),
            ArrayData::UShort(v) => v.len(),
            ArrayData::UInt(v) => v.len(),
            ArrayData::Int64(v) => v.len(),
            ArrayData::UInt64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// netCDF name of the element type
    pub fn type_name(&self) -> &'static str {
        match self {
            ArrayData::Byte(_) => "byte",
            ArrayData::Char(_) => "char",
            ArrayData::Short(_) => "short",
            ArrayData::Int(_) => "int",
            ArrayData::Float(_) => "float",
            ArrayData::Double(_) => "double",
            ArrayData::UByte(_) => "ubyte",
            ArrayData::UShort(_) => "ushort",
            ArrayData::UInt(_) => "uint",
            ArrayData::Int64(_) => "int64",
            ArrayData::UInt64(_) => "uint64",
        }
    }

    /// Numeric values widened to f64; `None` for character data
    pub fn to_f64(&self) -> Option<Vec<f64>> {
        let values = match self {
            ArrayData::Char(_) => return None,
            ArrayData::Byte(v) => v.iter().map(|&x| f64::from(x)).collect(),
            ArrayData::Short(v) => v.iter().map(|&x| f64::from(x)).collect(),
            ArrayData::Int(v) => v.iter().map(|&x| f64::from(x)).collect(),
            ArrayData::Float(v) => v.iter().map(|&x| f64::from(x)).collect(),
            ArrayData::Double(v) => v.clone(),
            ArrayData::UByte(v) => v.iter().map(|&x| f64::from(x)).collect(),
            ArrayData::UShort(v) => v.iter().map(|&x| f64::from(x)).collect(),
            ArrayData::UInt(v) => v.iter().map(|&x| f64::from(x)).collect(),
            ArrayData::Int64(v) => v.iter().map(|&x| x as f64).collect(),
            ArrayData::UInt64(v) => v.iter().map(|&x| x as f64).collect(),
        };
        Some(values)
    }

    /// Character data as text, trailing NUL padding removed
    pub fn as_text(&self) -> Option<String> {
        match self {
            ArrayData::Char(bytes) => Some(trim_padding(bytes)),
            _ => None,
        }
    }
}

fn trim_padding(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches(['\0', ' '])
        .to_string()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub value: ArrayData,
}

impl Attribute {
    pub fn as_text(&self) -> Option<String> {
        self.value.as_text()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dimension {
    pub name: String,
    pub len: usize,
    pub unlimited: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    /// Dimension names, outermost first
    pub dimensions: Vec<String>,
    pub shape: Vec<usize>,
    pub attributes: Vec<Attribute>,
    pub data: ArrayData,
}

impl Variable {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Units attribute (vgosDB writes `Units`, CF writes `units`)
    pub fn units(&self) -> Option<String> {
        self.attribute("Units")
            .or_else(|| self.attribute("units"))
            .and_then(Attribute::as_text)
    }

    pub fn fill_value(&self) -> Option<f64> {
        self.attribute("_FillValue")
            .and_then(|a| a.value.to_f64())
            .and_then(|v| v.first().copied())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn to_f64(&self) -> Option<Vec<f64>> {
        self.data.to_f64()
    }

    /// Split a character array along its last axis into strings.
    ///
    /// A `[N, 8]` char variable yields `N` strings; a scalar or 1-D char
    /// variable yields one.
    pub fn strings(&self) -> Option<Vec<String>> {
        let ArrayData::Char(bytes) = &self.data else {
            return None;
        };
        if self.shape.len() < 2 {
            return Some(vec![trim_padding(bytes)]);
        }
        let width = self.shape.last().copied().unwrap_or(0);
        let count: usize = self.shape[..self.shape.len() - 1].iter().product();
        // Rows follow the shape; data shorter than the shape gives empty strings
        let strings = (0..count)
            .map(|i| {
                let start = i.saturating_mul(width).min(bytes.len());
                let end = start.saturating_add(width).min(bytes.len());
                trim_padding(&bytes[start..end])
            })
            .collect();
        Some(strings)
    }

    /// Values of the `index`-th slice along the first axis
    pub fn row(&self, index: usize) -> Option<Vec<f64>> {
        let values = self.to_f64()?;
        let rows = *self.shape.first()?;
        if rows == 0 || index >= rows {
            return None;
        }
        let width = values.len() / rows;
        Some(values[index * width..(index + 1) * width].to_vec())
    }
}

/// Decoded contents of one array file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArrayTable {
    pub dimensions: Vec<Dimension>,
    pub attributes: Vec<Attribute>,
    pub variables: Vec<Variable>,
}

impl ArrayTable {
    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name == name)
    }

    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.variables.iter().map(|v| v.name.as_str())
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn dimension(&self, name: &str) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn char_variable(shape: Vec<usize>, bytes: &[u8]) -> Variable {
        Variable {
            name: "Source".to_string(),
            dimensions: Vec::new(),
            shape,
            attributes: Vec::new(),
            data: ArrayData::Char(bytes.to_vec()),
        }
    }

    #[test]
    fn test_strings_split_last_axis() {
        let var = char_variable(vec![2, 6], b"0059\0\03C27  ");
        assert_eq!(var.strings().unwrap(), vec!["0059", "3C27"]);
    }

    #[test]
    fn test_strings_follow_shape() {
        // Extra data beyond the shape does not add rows
        let var = char_variable(vec![2, 4], b"0059\0\0\0\03C27 ");
        assert_eq!(var.strings().unwrap().len(), 2);

        let short = char_variable(vec![3, 4], b"KOKEWETT");
        assert_eq!(short.strings().unwrap(), vec!["KOKE", "WETT", ""]);
    }

    #[test]
    fn test_strings_one_dimensional() {
        let var = char_variable(vec![8], b"KOKEE\0\0\0");
        assert_eq!(var.strings().unwrap(), vec!["KOKEE"]);
    }

    #[test]
    fn test_strings_zero_width() {
        let var = char_variable(vec![3, 0], b"");
        assert_eq!(var.strings().unwrap(), vec!["", "", ""]);
    }

    #[test]
    fn test_numeric_widening() {
        assert_eq!(
            ArrayData::Short(vec![-1, 2]).to_f64(),
            Some(vec![-1.0, 2.0])
        );
        assert_eq!(ArrayData::Char(b"ab".to_vec()).to_f64(), None);
    }

    #[test]
    fn test_units_and_fill_value() {
        let var = Variable {
            name: "GroupDelaySig".to_string(),
            dimensions: vec!["NumObs".to_string()],
            shape: vec![1],
            attributes: vec![
                Attribute {
                    name: "Units".to_string(),
                    value: ArrayData::Char(b"second".to_vec()),
                },
                Attribute {
                    name: "_FillValue".to_string(),
                    value: ArrayData::Double(vec![-999.0]),
                },
            ],
            data: ArrayData::Double(vec![1e-11]),
        };
        assert_eq!(var.units().as_deref(), Some("second"));
        assert_eq!(var.fill_value(), Some(-999.0));
    }

    #[test]
    fn test_row() {
        let var = Variable {
            name: "PolarMotion".to_string(),
            dimensions: Vec::new(),
            shape: vec![2, 3],
            attributes: Vec::new(),
            data: ArrayData::Double(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]),
        };
        assert_eq!(var.row(1), Some(vec![4.0, 5.0, 6.0]));
        assert_eq!(var.row(2), None);
    }

    #[test]
    fn test_closure_decoder() {
        let decoder = |bytes: &[u8]| -> Result<ArrayTable, DecodeError> {
            if bytes.is_empty() {
                Err(DecodeError::BadMagic)
            } else {
                Ok(ArrayTable::default())
            }
        };
        assert!(decoder.decode(b"x").is_ok());
        assert_eq!(decoder.decode(b""), Err(DecodeError::BadMagic));
    }
}
