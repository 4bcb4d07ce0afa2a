use crate::error::{ConvertError, Result};
use log::debug;
use proj::Proj;

// NAD83 / Massachusetts Mainland, metres
pub const DEFAULT_SOURCE_CRS: &str = "EPSG:26986";
pub const DEFAULT_TARGET_CRS: &str = "EPSG:4326";

// Err carries the reason the transform gave up on a pair
pub type TransformResult = std::result::Result<(f64, f64), String>;

// Planar (x, y) in, (longitude, latitude) out. No mutable state between calls.
pub trait Reproject {
    fn transform(&self, x: f64, y: f64) -> TransformResult;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub lon: f64,
    pub lat: f64,
}

impl Coordinate {
    pub fn new(lon: f64, lat: f64) -> Self {
        Coordinate { lon, lat }
    }

    pub fn to_position(self) -> Vec<f64> {
        vec![self.lon, self.lat]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reprojected {
    pub coordinate: Coordinate,
    // Some(reason) when `coordinate` is the untouched input pair
    pub failure: Option<String>,
}

/// Reprojects one pair, passing it through untouched when the transform fails
/// or produces a non-finite result.
pub fn reproject<R: Reproject + ?Sized>(transform: &R, x: f64, y: f64) -> Reprojected {
    let failure = match transform.transform(x, y) {
        Ok((lon, lat)) if lon.is_finite() && lat.is_finite() => {
            return Reprojected {
                coordinate: Coordinate::new(lon, lat),
                failure: None,
            }
        }
        Ok((lon, lat)) => format!("non-finite result ({}, {})", lon, lat),
        Err(reason) => reason,
    };
    Reprojected {
        coordinate: Coordinate::new(x, y),
        failure: Some(failure),
    }
}

pub struct ProjReprojector {
    proj: Proj,
}

impl ProjReprojector {
    pub fn new(from: &str, to: &str) -> Result<Self> {
        // new_known_crs normalises axis order to easting/longitude first
        let proj = Proj::new_known_crs(from, to, None).map_err(|e| ConvertError::Projection {
            from: from.to_string(),
            to: to.to_string(),
            message: e.to_string(),
        })?;
        debug!("Created transformation {} -> {}", from, to);
        Ok(ProjReprojector { proj })
    }

    pub fn massachusetts_mainland() -> Result<Self> {
        Self::new(DEFAULT_SOURCE_CRS, DEFAULT_TARGET_CRS)
    }
}

impl Reproject for ProjReprojector {
    fn transform(&self, x: f64, y: f64) -> TransformResult {
        self.proj.convert((x, y)).map_err(|e| e.to_string())
    }
}
