//! Builds small `.shp`/`.dbf` pairs on disk for the integration tests.

use std::fs;
use std::path::{Path, PathBuf};

pub enum Shape {
    Point(f64, f64),
    /// tag, part offsets, points
    Multi(i32, Vec<i32>, Vec<(f64, f64)>),
    /// Content with only a type tag, padded to `extra` bytes
    Other(i32, usize),
}

pub struct Field {
    pub name: &'static str,
    pub kind: u8,
    pub length: usize,
    pub decimals: usize,
}

pub fn field(name: &'static str, kind: u8, length: usize, decimals: usize) -> Field {
    Field {
        name,
        kind,
        length,
        decimals,
    }
}

fn shape_content(shape: &Shape) -> Vec<u8> {
    match shape {
        Shape::Point(x, y) => {
            let mut c = 1i32.to_le_bytes().to_vec();
            c.extend_from_slice(&x.to_le_bytes());
            c.extend_from_slice(&y.to_le_bytes());
            c
        }
        Shape::Multi(tag, parts, points) => {
            let mut c = tag.to_le_bytes().to_vec();
            c.extend_from_slice(&[0u8; 32]);
            c.extend_from_slice(&(parts.len() as i32).to_le_bytes());
            c.extend_from_slice(&(points.len() as i32).to_le_bytes());
            for p in parts {
                c.extend_from_slice(&p.to_le_bytes());
            }
            for (x, y) in points {
                c.extend_from_slice(&x.to_le_bytes());
                c.extend_from_slice(&y.to_le_bytes());
            }
            c
        }
        Shape::Other(tag, extra) => {
            let mut c = tag.to_le_bytes().to_vec();
            c.resize(4 + extra, 0);
            c
        }
    }
}

pub fn shp_bytes(shapes: &[Shape]) -> Vec<u8> {
    let mut body = Vec::new();
    for (i, shape) in shapes.iter().enumerate() {
        let content = shape_content(shape);
        body.extend_from_slice(&(i as i32 + 1).to_be_bytes());
        body.extend_from_slice(&((content.len() / 2) as i32).to_be_bytes());
        body.extend_from_slice(&content);
    }
    let mut out = vec![0u8; 100];
    out[0..4].copy_from_slice(&9994i32.to_be_bytes());
    out[24..28].copy_from_slice(&(((100 + body.len()) / 2) as i32).to_be_bytes());
    out[28..32].copy_from_slice(&1000i32.to_le_bytes());
    out.extend_from_slice(&body);
    out
}

pub fn dbf_bytes(fields: &[Field], rows: &[Vec<&str>]) -> Vec<u8> {
    let header_len = 32 + fields.len() * 32 + 1;
    let record_len = 1 + fields.iter().map(|f| f.length).sum::<usize>();
    let mut out = vec![0u8; 32];
    out[0] = 0x03;
    out[4..8].copy_from_slice(&(rows.len() as u32).to_le_bytes());
    out[8..10].copy_from_slice(&(header_len as u16).to_le_bytes());
    out[10..12].copy_from_slice(&(record_len as u16).to_le_bytes());
    for f in fields {
        let mut desc = [0u8; 32];
        desc[..f.name.len()].copy_from_slice(f.name.as_bytes());
        desc[11] = f.kind;
        desc[16] = f.length as u8;
        desc[17] = f.decimals as u8;
        out.extend_from_slice(&desc);
    }
    out.push(0x0D);
    for row in rows {
        out.push(b' ');
        for (f, value) in fields.iter().zip(row) {
            let mut cell = value.as_bytes().to_vec();
            cell.resize(f.length, b' ');
            out.extend_from_slice(&cell);
        }
    }
    out.push(0x1A);
    out
}

/// Writes `<dir>/<name>.shp` and `<dir>/<name>.dbf`, returning the `.shp` path.
pub fn write_dataset(
    dir: &Path,
    name: &str,
    shapes: &[Shape],
    fields: &[Field],
    rows: &[Vec<&str>],
) -> PathBuf {
    let shp = dir.join(format!("{}.shp", name));
    fs::write(&shp, shp_bytes(shapes)).unwrap();
    fs::write(dir.join(format!("{}.dbf", name)), dbf_bytes(fields, rows)).unwrap();
    shp
}
