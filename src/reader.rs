use crate::dbf::{DbfTable, FieldSchema, FieldValue};
use crate::error::{ConvertError, Result};
use geo::Coord;
use log::debug;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

const FILE: &str = "shp";
const FILE_CODE: i32 = 9994;
const HEADER_LEN: usize = 100;
const RECORD_HEADER_LEN: usize = 8;
// tag + bbox + numParts + numPoints
const MULTIPART_FIXED_LEN: usize = 4 + 32 + 4 + 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeType {
    Point,
    Polyline,
    Polygon,
    // null shapes, multipoints, Z/M variants and unknown tags
    Unsupported(i32),
}

impl ShapeType {
    pub fn from_tag(tag: i32) -> Self {
        match tag {
            1 => ShapeType::Point,
            3 => ShapeType::Polyline,
            5 => ShapeType::Polygon,
            other => ShapeType::Unsupported(other),
        }
    }
}

// Geometry in source units; part offsets are handed over verbatim
#[derive(Debug, Clone, PartialEq)]
pub struct RawShapeRecord {
    pub index: usize,
    pub shape_type: ShapeType,
    pub points: Vec<Coord<f64>>,
    // start offsets into `points`, empty for points
    pub parts: Vec<usize>,
    pub attributes: Vec<FieldValue>,
}

/// Single-pass reader pairing a `.shp` geometry stream with its `.dbf` table.
pub struct ShapeReader {
    shp: Vec<u8>,
    end: usize,
    offset: usize,
    index: usize,
    dbf: DbfTable,
}

impl ShapeReader {
    /// Opens a container by its `.shp` path or shared base name.
    pub fn open(path: &Path) -> Result<Self> {
        let shp_path = sibling(path, "shp");
        let dbf_path = sibling(path, "dbf");
        debug!(
            "Reading {} and {}",
            shp_path.display(),
            dbf_path.display()
        );
        let shp = fs::read(&shp_path).map_err(|e| ConvertError::io(&shp_path, e))?;
        let dbf = fs::read(&dbf_path).map_err(|e| ConvertError::io(&dbf_path, e))?;
        Self::from_bytes(shp, dbf)
    }

    pub fn new<S: Read, D: Read>(mut shp: S, mut dbf: D) -> Result<Self> {
        let mut shp_bytes = Vec::new();
        shp.read_to_end(&mut shp_bytes)
            .map_err(|e| ConvertError::io("<shp stream>", e))?;
        let mut dbf_bytes = Vec::new();
        dbf.read_to_end(&mut dbf_bytes)
            .map_err(|e| ConvertError::io("<dbf stream>", e))?;
        Self::from_bytes(shp_bytes, dbf_bytes)
    }

    pub fn from_bytes(shp: Vec<u8>, dbf: Vec<u8>) -> Result<Self> {
        let end = parse_header(&shp)?;
        let dbf = DbfTable::parse(dbf)?;

        let shapes = count_records(&shp[..end])?;
        if shapes != dbf.record_count() {
            return Err(ConvertError::RecordCountMismatch {
                shapes,
                attributes: dbf.record_count(),
            });
        }
        debug!(
            "Container holds {} records with {} fields",
            shapes,
            dbf.schema().len()
        );

        Ok(ShapeReader {
            shp,
            end,
            offset: HEADER_LEN,
            index: 0,
            dbf,
        })
    }

    pub fn schema(&self) -> &FieldSchema {
        self.dbf.schema()
    }

    pub fn record_count(&self) -> usize {
        self.dbf.record_count()
    }

    fn read_record(&mut self) -> Result<RawShapeRecord> {
        let index = self.index;
        let header = &self.shp[self.offset..self.offset + RECORD_HEADER_LEN];
        let content_len = be_i32(header, 4) as usize * 2;
        let start = self.offset + RECORD_HEADER_LEN;
        let content = &self.shp[start..start + content_len];

        let (shape_type, points, parts) = decode_shape(index, content)?;
        let attributes = self.dbf.record(index)?;

        self.offset = start + content_len;
        self.index += 1;

        Ok(RawShapeRecord {
            index,
            shape_type,
            points,
            parts,
            attributes,
        })
    }
}

impl Iterator for ShapeReader {
    type Item = Result<RawShapeRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.end {
            return None;
        }
        let item = self.read_record();
        if item.is_err() {
            // fatal: stop after reporting once
            self.offset = self.end;
        }
        Some(item)
    }
}

fn sibling(path: &Path, extension: &str) -> PathBuf {
    let mut out = path.to_path_buf();
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("shp") => {
            // keep the case convention of the input (FOO.SHP -> FOO.DBF)
            let ext = if ext.chars().all(|c| c.is_ascii_uppercase()) {
                extension.to_ascii_uppercase()
            } else {
                extension.to_string()
            };
            out.set_extension(ext);
        }
        _ => {
            let mut name = out.into_os_string();
            name.push(".");
            name.push(extension);
            out = PathBuf::from(name);
        }
    }
    out
}

/// Validates the file header and returns the end of record data.
fn parse_header(shp: &[u8]) -> Result<usize> {
    if shp.len() < HEADER_LEN {
        return Err(ConvertError::MalformedHeader {
            file: FILE,
            message: format!("expected {} bytes, found {}", HEADER_LEN, shp.len()),
        });
    }
    let code = be_i32(shp, 0);
    if code != FILE_CODE {
        return Err(ConvertError::MalformedHeader {
            file: FILE,
            message: format!("file code {} is not {}", code, FILE_CODE),
        });
    }
    let declared = be_i32(shp, 24).max(0) as usize * 2;
    Ok(if declared >= HEADER_LEN {
        declared.min(shp.len())
    } else {
        shp.len()
    })
}

/// Walks the record headers so count mismatches surface before any record.
fn count_records(shp: &[u8]) -> Result<usize> {
    let mut offset = HEADER_LEN;
    let mut count = 0;
    while offset < shp.len() {
        if offset + RECORD_HEADER_LEN > shp.len() {
            return Err(truncated(
                count,
                format!("record header at byte {} runs past end of file", offset),
            ));
        }
        let content_len = be_i32(shp, offset + 4);
        if content_len < 2 {
            return Err(truncated(
                count,
                format!("content length {} words is too short", content_len),
            ));
        }
        let next = offset + RECORD_HEADER_LEN + content_len as usize * 2;
        if next > shp.len() {
            return Err(truncated(
                count,
                format!(
                    "content ends at byte {} but file has {}",
                    next,
                    shp.len()
                ),
            ));
        }
        offset = next;
        count += 1;
    }
    Ok(count)
}

fn decode_shape(
    index: usize,
    content: &[u8],
) -> Result<(ShapeType, Vec<Coord<f64>>, Vec<usize>)> {
    let shape_type = ShapeType::from_tag(le_i32(content, 0));
    match shape_type {
        ShapeType::Point => {
            if content.len() < 20 {
                return Err(truncated(
                    index,
                    format!("point needs 20 bytes, found {}", content.len()),
                ));
            }
            let point = Coord {
                x: le_f64(content, 4),
                y: le_f64(content, 12),
            };
            Ok((shape_type, vec![point], Vec::new()))
        }
        ShapeType::Polyline | ShapeType::Polygon => {
            let (points, parts) = decode_multipart(index, content)?;
            Ok((shape_type, points, parts))
        }
        ShapeType::Unsupported(_) => Ok((shape_type, Vec::new(), Vec::new())),
    }
}

fn decode_multipart(index: usize, content: &[u8]) -> Result<(Vec<Coord<f64>>, Vec<usize>)> {
    if content.len() < MULTIPART_FIXED_LEN {
        return Err(truncated(
            index,
            format!(
                "multi-part shape needs {} bytes, found {}",
                MULTIPART_FIXED_LEN,
                content.len()
            ),
        ));
    }
    let num_parts = le_i32(content, 36);
    let num_points = le_i32(content, 40);
    if num_parts < 0 || num_points < 0 {
        return Err(truncated(
            index,
            format!("negative counts ({} parts, {} points)", num_parts, num_points),
        ));
    }
    let (num_parts, num_points) = (num_parts as usize, num_points as usize);
    let points_at = MULTIPART_FIXED_LEN + num_parts * 4;
    let needed = points_at + num_points * 16;
    if content.len() < needed {
        return Err(truncated(
            index,
            format!(
                "{} parts and {} points need {} bytes, found {}",
                num_parts,
                num_points,
                needed,
                content.len()
            ),
        ));
    }

    let raw_parts: Vec<i32> = (0..num_parts)
        .map(|i| le_i32(content, MULTIPART_FIXED_LEN + i * 4))
        .collect();
    let in_range = raw_parts
        .iter()
        .all(|&p| p >= 0 && p as usize <= num_points);
    let ordered = raw_parts.windows(2).all(|w| w[0] <= w[1]);
    if !in_range || !ordered {
        return Err(ConvertError::MalformedParts {
            index,
            parts: raw_parts,
            points: num_points,
        });
    }

    let points = (0..num_points)
        .map(|i| {
            let at = points_at + i * 16;
            Coord {
                x: le_f64(content, at),
                y: le_f64(content, at + 8),
            }
        })
        .collect();
    let parts = raw_parts.into_iter().map(|p| p as usize).collect();
    Ok((points, parts))
}

fn truncated(index: usize, message: String) -> ConvertError {
    ConvertError::TruncatedRecord {
        file: FILE,
        index,
        message,
    }
}

fn be_i32(buf: &[u8], at: usize) -> i32 {
    i32::from_be_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

fn le_i32(buf: &[u8], at: usize) -> i32 {
    i32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

fn le_f64(buf: &[u8], at: usize) -> f64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[at..at + 8]);
    f64::from_le_bytes(bytes)
}
