use crate::error::{ConvertError, Result};
use std::fmt;

const FILE: &str = "dbf";
const HEADER_LEN: usize = 32;
const DESCRIPTOR_LEN: usize = 32;
const HEADER_TERMINATOR: u8 = 0x0D;

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: char,
    pub length: usize,
    pub decimals: usize,
}

/// Ordered field list shared by every record of a dataset.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldSchema {
    fields: Vec<FieldDescriptor>,
}

impl FieldSchema {
    pub fn new(fields: Vec<FieldDescriptor>) -> Self {
        FieldSchema { fields }
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields = names
            .into_iter()
            .map(|name| FieldDescriptor {
                name: name.into(),
                kind: 'C',
                length: 0,
                decimals: 0,
            })
            .collect();
        FieldSchema { fields }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A decoded attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Integer(i64),
    Float(f64),
    Text(String),
    Boolean(bool),
    Null,
    Date { year: i32, month: u32, day: u32 },
    /// Memo fields, unknown field types and unparseable dates
    Other(String),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Integer(v) => write!(f, "{}", v),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Text(v) | FieldValue::Other(v) => f.write_str(v),
            FieldValue::Boolean(v) => write!(f, "{}", v),
            FieldValue::Null => f.write_str("null"),
            FieldValue::Date { year, month, day } => {
                write!(f, "{:04}-{:02}-{:02}", year, month, day)
            }
        }
    }
}

/// The attribute table, held in memory.
pub struct DbfTable {
    schema: FieldSchema,
    record_count: usize,
    header_len: usize,
    record_len: usize,
    data: Vec<u8>,
}

impl DbfTable {
    pub fn parse(data: Vec<u8>) -> Result<Self> {
        if data.len() < HEADER_LEN {
            return Err(header_error(format!(
                "expected at least {} bytes, found {}",
                HEADER_LEN,
                data.len()
            )));
        }
        let record_count = u32::from_le_bytes([data[4], data[5], data[6], data[7]]) as usize;
        let header_len = u16::from_le_bytes([data[8], data[9]]) as usize;
        let record_len = u16::from_le_bytes([data[10], data[11]]) as usize;
        if header_len < HEADER_LEN + 1 || header_len > data.len() {
            return Err(header_error(format!(
                "header length {} out of range for {} bytes",
                header_len,
                data.len()
            )));
        }

        let mut fields = Vec::new();
        let mut offset = HEADER_LEN;
        while offset < header_len && data[offset] != HEADER_TERMINATOR {
            if offset + DESCRIPTOR_LEN > header_len {
                return Err(header_error(format!(
                    "field descriptor at byte {} overruns header",
                    offset
                )));
            }
            fields.push(parse_descriptor(&data[offset..offset + DESCRIPTOR_LEN]));
            offset += DESCRIPTOR_LEN;
        }

        // deletion flag + every field
        let needed: usize = 1 + fields.iter().map(|f| f.length).sum::<usize>();
        if record_len < needed {
            return Err(header_error(format!(
                "record length {} shorter than its {} fields ({} bytes)",
                record_len,
                fields.len(),
                needed
            )));
        }

        Ok(DbfTable {
            schema: FieldSchema::new(fields),
            record_count,
            header_len,
            record_len,
            data,
        })
    }

    pub fn schema(&self) -> &FieldSchema {
        &self.schema
    }

    pub fn record_count(&self) -> usize {
        self.record_count
    }

    // deleted rows are decoded too, keeping rows aligned with the shapes
    pub fn record(&self, index: usize) -> Result<Vec<FieldValue>> {
        let start = self.header_len + index * self.record_len;
        let end = start + self.record_len;
        let row = self
            .data
            .get(start..end)
            .ok_or_else(|| ConvertError::TruncatedRecord {
                file: FILE,
                index,
                message: format!(
                    "row spans bytes {}..{} but file has {}",
                    start,
                    end,
                    self.data.len()
                ),
            })?;

        let mut values = Vec::with_capacity(self.schema.len());
        let mut offset = 1;
        for field in self.schema.fields() {
            values.push(decode_value(field, &row[offset..offset + field.length]));
            offset += field.length;
        }
        Ok(values)
    }
}

fn header_error(message: String) -> ConvertError {
    ConvertError::MalformedHeader {
        file: FILE,
        message,
    }
}

fn parse_descriptor(raw: &[u8]) -> FieldDescriptor {
    let name_end = raw[..11].iter().position(|&b| b == 0).unwrap_or(11);
    FieldDescriptor {
        name: String::from_utf8_lossy(&raw[..name_end]).trim().to_string(),
        kind: raw[11] as char,
        length: raw[16] as usize,
        decimals: raw[17] as usize,
    }
}

fn trimmed_text(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .trim_matches(|c: char| c == '\0' || c.is_whitespace())
        .to_string()
}

fn decode_value(field: &FieldDescriptor, raw: &[u8]) -> FieldValue {
    match field.kind.to_ascii_uppercase() {
        'C' => FieldValue::Text(trimmed_text(raw)),
        'N' if field.decimals == 0 => decode_integer(raw),
        'N' | 'F' => decode_float(raw),
        'L' => match raw.iter().copied().find(|b| !b.is_ascii_whitespace()) {
            Some(b'T' | b't' | b'Y' | b'y') => FieldValue::Boolean(true),
            Some(b'F' | b'f' | b'N' | b'n') => FieldValue::Boolean(false),
            _ => FieldValue::Null,
        },
        'D' => decode_date(raw),
        _ => FieldValue::Other(trimmed_text(raw)),
    }
}

fn number_text(raw: &[u8]) -> Option<String> {
    // blank and overflow ('*'-filled) cells are null
    let text = trimmed_text(raw).replace('*', "");
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn decode_float(raw: &[u8]) -> FieldValue {
    number_text(raw)
        .and_then(|text| text.parse::<f64>().ok())
        .map(FieldValue::Float)
        .unwrap_or(FieldValue::Null)
}

fn decode_integer(raw: &[u8]) -> FieldValue {
    let text = match number_text(raw) {
        Some(text) => text,
        None => return FieldValue::Null,
    };
    match text.parse::<i64>() {
        Ok(v) => FieldValue::Integer(v),
        // wider than i64 or written with a fraction
        Err(_) => text
            .parse::<f64>()
            .map(FieldValue::Float)
            .unwrap_or(FieldValue::Null),
    }
}

fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        2 if (year % 4 == 0 && year % 100 != 0) || year % 400 == 0 => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

fn decode_date(raw: &[u8]) -> FieldValue {
    let text = trimmed_text(raw);
    if text.is_empty() || text.bytes().all(|b| b == b'0') {
        return FieldValue::Null;
    }
    let parsed = if text.len() == 8 && text.bytes().all(|b| b.is_ascii_digit()) {
        let year = text[0..4].parse::<i32>().ok();
        let month = text[4..6].parse::<u32>().ok().filter(|m| (1..=12).contains(m));
        let day = text[6..8].parse::<u32>().ok();
        match (year, month, day) {
            (Some(year), Some(month), Some(day))
                if day >= 1 && day <= days_in_month(year, month) =>
            {
                Some(FieldValue::Date { year, month, day })
            }
            _ => None,
        }
    } else {
        None
    };
    parsed.unwrap_or(FieldValue::Other(text))
}
