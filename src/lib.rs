use log::{info, warn};
use std::fmt;
use std::path::{Path, PathBuf};

pub mod assembler;
pub mod dbf;
pub mod error;
pub mod output;
pub mod reader;
pub mod reproject;

pub use assembler::{assemble, Feature, FeatureCollection, Geometry};
pub use dbf::{FieldSchema, FieldValue};
pub use error::{ConvertError, Result};
pub use output::OutputFormat;
pub use reader::{RawShapeRecord, ShapeReader, ShapeType};
pub use reproject::{Coordinate, ProjReprojector, Reproject};

// Recoverable problems; they are logged and counted but never stop a dataset
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    SkippedShape {
        index: usize,
        tag: i32,
    },
    // vertex emitted in source units
    Untransformed {
        index: usize,
        x: f64,
        y: f64,
        reason: String,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::SkippedShape { index, tag } => {
                write!(f, "Unsupported shape type {} at record {}", tag, index)
            }
            Diagnostic::Untransformed {
                index,
                x,
                y,
                reason,
            } => write!(
                f,
                "Could not transform coordinate ({}, {}) in record {}: {}",
                x, y, index, reason
            ),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Conversion {
    pub collection: FeatureCollection,
    pub diagnostics: Vec<Diagnostic>,
}

impl Conversion {
    pub fn skipped(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| matches!(d, Diagnostic::SkippedShape { .. }))
            .count()
    }

    pub fn untransformed(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| matches!(d, Diagnostic::Untransformed { .. }))
            .count()
    }
}

#[derive(Debug, Clone)]
pub struct ConvertOptions {
    pub source_crs: String,
    pub target_crs: String,
    pub output_dir: PathBuf,
    pub format: OutputFormat,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        ConvertOptions {
            source_crs: reproject::DEFAULT_SOURCE_CRS.to_string(),
            target_crs: reproject::DEFAULT_TARGET_CRS.to_string(),
            output_dir: PathBuf::from("output"),
            format: OutputFormat::GeoJson,
        }
    }
}

/// Converts the container at `path` (`.shp` path or base name). Either the
/// whole dataset converts, possibly with diagnostics, or nothing is produced.
pub fn convert_dataset<R: Reproject + ?Sized>(path: &Path, reprojector: &R) -> Result<Conversion> {
    info!("Converting {}", path.display());
    let reader = ShapeReader::open(path)?;
    let conversion = convert_records(reader, reprojector)?;
    info!(
        "Converted {} features from {} ({} skipped, {} untransformed coordinates)",
        conversion.collection.len(),
        path.display(),
        conversion.skipped(),
        conversion.untransformed()
    );
    Ok(conversion)
}

pub fn convert_records<R: Reproject + ?Sized>(
    reader: ShapeReader,
    reprojector: &R,
) -> Result<Conversion> {
    let schema = reader.schema().clone();
    let mut conversion = Conversion::default();

    for record in reader {
        let record = record?;
        if let ShapeType::Unsupported(tag) = record.shape_type {
            let diagnostic = Diagnostic::SkippedShape {
                index: record.index,
                tag,
            };
            warn!("{}", diagnostic);
            conversion.diagnostics.push(diagnostic);
            continue;
        }

        let first_new = conversion.diagnostics.len();
        if let Some(feature) = assemble(record, &schema, reprojector, &mut conversion.diagnostics)
        {
            conversion.collection.features.push(feature);
        }
        for diagnostic in &conversion.diagnostics[first_new..] {
            warn!("{}", diagnostic);
        }
    }

    Ok(conversion)
}

// Returns the written paths in input order; the first fatal error stops the batch
pub fn process_files(files: &[PathBuf], options: &ConvertOptions) -> Result<Vec<PathBuf>> {
    info!("=== Converting {} datasets ===", files.len());
    options.format.check(files.len())?;
    std::fs::create_dir_all(&options.output_dir)
        .map_err(|e| ConvertError::io(&options.output_dir, e))?;

    let mut written = Vec::with_capacity(files.len());
    for (file_index, file) in files.iter().enumerate() {
        info!(
            "Processing dataset {}/{}: {}",
            file_index + 1,
            files.len(),
            file.display()
        );
        // PROJ handles are not shared between datasets
        let reprojector = ProjReprojector::new(&options.source_crs, &options.target_crs)?;
        let conversion = convert_dataset(file, &reprojector)?;
        let path = output::write_collection(
            &conversion.collection,
            file,
            file_index,
            &options.output_dir,
            &options.format,
        )?;
        info!("Wrote {}", path.display());
        written.push(path);
    }

    info!("=== Conversion complete ===");
    Ok(written)
}
