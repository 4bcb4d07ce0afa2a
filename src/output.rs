use crate::assembler::FeatureCollection;
use crate::error::{ConvertError, Result};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq)]
pub enum OutputFormat {
    // pretty-printed .geojson
    GeoJson,
    // .ts module exporting the collection; one constant name per input file,
    // or derived from the file stem when the list is empty
    TypeScript { constants: Vec<String> },
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::GeoJson => "geojson",
            OutputFormat::TypeScript { .. } => "ts",
        }
    }

    // Rejects a constant list that does not line up with the inputs
    pub fn check(&self, datasets: usize) -> Result<()> {
        match self {
            OutputFormat::TypeScript { constants }
                if !constants.is_empty() && constants.len() != datasets =>
            {
                Err(ConvertError::InvalidOption {
                    option: "ts-const".to_string(),
                    message: format!(
                        "{} constant names given for {} datasets",
                        constants.len(),
                        datasets
                    ),
                })
            }
            _ => Ok(()),
        }
    }
}

/// Name of the exported constant for the `index`-th dataset.
pub fn constant_name(format: &OutputFormat, index: usize, source: &Path) -> Option<String> {
    match format {
        OutputFormat::GeoJson => None,
        OutputFormat::TypeScript { constants } => Some(
            constants
                .get(index)
                .cloned()
                .unwrap_or_else(|| constant_from_stem(source)),
        ),
    }
}

// MBTA_NODE.shp -> MBTA_NODE, trains-arc.shp -> TRAINS_ARC
fn constant_from_stem(source: &Path) -> String {
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown");
    let mut name: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    name
}

pub fn render(
    collection: &FeatureCollection,
    source: &Path,
    constant: Option<&str>,
) -> serde_json::Result<String> {
    let json = serde_json::to_string_pretty(&collection.to_geojson())?;
    Ok(match constant {
        None => format!("{}\n", json),
        Some(constant) => {
            let name = source
                .file_name()
                .and_then(|s| s.to_str())
                .unwrap_or("unknown");
            format!(
                "// Auto-generated from {}\nexport const {}: GeoJSON.FeatureCollection = {};\n",
                name, constant, json
            )
        }
    })
}

/// Writes the `index`-th dataset of a batch as `<output_dir>/<stem>.<ext>`.
pub fn write_collection(
    collection: &FeatureCollection,
    source: &Path,
    index: usize,
    output_dir: &Path,
    format: &OutputFormat,
) -> Result<PathBuf> {
    let file_stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown");
    let output_path = output_dir.join(format!("{}.{}", file_stem, format.extension()));

    let constant = constant_name(format, index, source);
    let text = render(collection, source, constant.as_deref()).map_err(|e| {
        ConvertError::Write {
            path: output_path.clone(),
            source: Box::new(e),
        }
    })?;
    fs::write(&output_path, text).map_err(|e| ConvertError::Write {
        path: output_path.clone(),
        source: Box::new(e),
    })?;
    Ok(output_path)
}
