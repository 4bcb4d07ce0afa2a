use crate::dbf::{FieldSchema, FieldValue};
use crate::reader::{RawShapeRecord, ShapeType};
use crate::reproject::{reproject, Coordinate, Reproject};
use crate::Diagnostic;
use geo::Coord;
use geojson::{JsonObject, Value as GeoJsonValue};
use serde_json::{Number, Value};

/// Output geometry, one inner sequence per source part.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(Coordinate),
    MultiLineString(Vec<Vec<Coordinate>>),
    Polygon(Vec<Vec<Coordinate>>),
}

impl Geometry {
    pub fn type_name(&self) -> &'static str {
        match self {
            Geometry::Point(_) => "Point",
            Geometry::MultiLineString(_) => "MultiLineString",
            Geometry::Polygon(_) => "Polygon",
        }
    }

    pub fn part_count(&self) -> usize {
        match self {
            Geometry::Point(_) => 0,
            Geometry::MultiLineString(parts) | Geometry::Polygon(parts) => parts.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub geometry: Geometry,
    /// Keys follow the field schema order
    pub properties: JsonObject,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn to_geojson(&self) -> geojson::FeatureCollection {
        geojson::FeatureCollection {
            bbox: None,
            features: self.features.iter().map(geojson::Feature::from).collect(),
            foreign_members: None,
        }
    }
}

impl From<&Geometry> for geojson::Geometry {
    fn from(geometry: &Geometry) -> Self {
        let rings = |parts: &Vec<Vec<Coordinate>>| -> Vec<Vec<Vec<f64>>> {
            parts
                .iter()
                .map(|part| part.iter().map(|c| c.to_position()).collect())
                .collect()
        };
        let value = match geometry {
            Geometry::Point(c) => GeoJsonValue::Point(c.to_position()),
            Geometry::MultiLineString(parts) => GeoJsonValue::MultiLineString(rings(parts)),
            Geometry::Polygon(parts) => GeoJsonValue::Polygon(rings(parts)),
        };
        geojson::Geometry::new(value)
    }
}

impl From<&Feature> for geojson::Feature {
    fn from(feature: &Feature) -> Self {
        geojson::Feature {
            bbox: None,
            geometry: Some(geojson::Geometry::from(&feature.geometry)),
            id: None,
            properties: Some(feature.properties.clone()),
            foreign_members: None,
        }
    }
}

/// Builds the feature for one record, or `None` for unsupported shape types.
/// Vertices the transform rejects are kept as-is and pushed onto `diagnostics`.
pub fn assemble<R: Reproject + ?Sized>(
    record: RawShapeRecord,
    schema: &FieldSchema,
    reprojector: &R,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<Feature> {
    let mut project = |c: &Coord<f64>| {
        let out = reproject(reprojector, c.x, c.y);
        if let Some(reason) = out.failure {
            diagnostics.push(Diagnostic::Untransformed {
                index: record.index,
                x: c.x,
                y: c.y,
                reason,
            });
        }
        out.coordinate
    };

    let geometry = match record.shape_type {
        ShapeType::Point => {
            // empty point records fall back to the origin
            let first = record.points.first().copied().unwrap_or(Coord { x: 0.0, y: 0.0 });
            Geometry::Point(project(&first))
        }
        ShapeType::Polyline => Geometry::MultiLineString(
            split_parts(&record.points, &record.parts)
                .map(|part| part.iter().map(&mut project).collect::<Vec<_>>())
                .collect(),
        ),
        ShapeType::Polygon => Geometry::Polygon(
            split_parts(&record.points, &record.parts)
                .map(|part| part.iter().map(&mut project).collect::<Vec<_>>())
                .collect(),
        ),
        ShapeType::Unsupported(_) => return None,
    };

    Some(Feature {
        geometry,
        properties: properties(schema, record.attributes),
    })
}

// last part runs to the end
pub fn split_parts<'a>(
    points: &'a [Coord<f64>],
    parts: &'a [usize],
) -> impl Iterator<Item = &'a [Coord<f64>]> + 'a {
    parts.iter().enumerate().map(move |(i, &start)| {
        let end = parts
            .get(i + 1)
            .copied()
            .unwrap_or(points.len())
            .min(points.len());
        &points[start.min(end)..end]
    })
}

fn properties(schema: &FieldSchema, attributes: Vec<FieldValue>) -> JsonObject {
    let mut out = JsonObject::new();
    let mut values = attributes.into_iter();
    for name in schema.names() {
        let value = values.next().map(coerce_value).unwrap_or(Value::Null);
        out.insert(name.to_string(), value);
    }
    out
}

// no JSON counterpart -> text form
pub fn coerce_value(value: FieldValue) -> Value {
    match value {
        FieldValue::Integer(v) => Value::Number(v.into()),
        FieldValue::Float(v) => match Number::from_f64(v) {
            Some(n) => Value::Number(n),
            None => Value::String(v.to_string()),
        },
        FieldValue::Text(v) => Value::String(v),
        FieldValue::Boolean(v) => Value::Bool(v),
        FieldValue::Null => Value::Null,
        other @ (FieldValue::Date { .. } | FieldValue::Other(_)) => {
            Value::String(other.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reproject::TransformResult;

    // shifts every vertex so untouched ones stand out
    struct Offset;

    impl Reproject for Offset {
        fn transform(&self, x: f64, y: f64) -> TransformResult {
            Ok((x + 100.0, y + 10.0))
        }
    }

    struct RejectNegative;

    impl Reproject for RejectNegative {
        fn transform(&self, x: f64, y: f64) -> TransformResult {
            if x < 0.0 {
                Err("negative easting".to_string())
            } else {
                Ok((x, y))
            }
        }
    }

    fn c(lon: f64, lat: f64) -> Coordinate {
        Coordinate::new(lon, lat)
    }

    fn record(shape_type: ShapeType, points: &[(f64, f64)], parts: &[usize]) -> RawShapeRecord {
        RawShapeRecord {
            index: 0,
            shape_type,
            points: points.iter().map(|&(x, y)| Coord { x, y }).collect(),
            parts: parts.to_vec(),
            attributes: Vec::new(),
        }
    }

    #[test]
    fn test_two_part_polyline() {
        let rec = record(
            ShapeType::Polyline,
            &[(0.0, 0.0), (1.0, 0.0), (2.0, 2.0), (3.0, 2.0)],
            &[0, 2],
        );
        let mut diagnostics = Vec::new();
        let feature = assemble(rec, &FieldSchema::default(), &Offset, &mut diagnostics).unwrap();
        assert_eq!(
            feature.geometry,
            Geometry::MultiLineString(vec![
                vec![c(100.0, 10.0), c(101.0, 10.0)],
                vec![c(102.0, 12.0), c(103.0, 12.0)],
            ])
        );
        assert_eq!(feature.geometry.part_count(), 2);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_polygon_rings_keep_order_and_winding() {
        let outer = [(0.0, 0.0), (0.0, 4.0), (4.0, 4.0), (4.0, 0.0), (0.0, 0.0)];
        let hole = [(1.0, 1.0), (2.0, 1.0), (2.0, 2.0), (1.0, 1.0)];
        let points: Vec<(f64, f64)> = outer.iter().chain(hole.iter()).copied().collect();
        let rec = record(ShapeType::Polygon, &points, &[0, 5]);
        let feature = assemble(rec, &FieldSchema::default(), &Offset, &mut Vec::new()).unwrap();
        match feature.geometry {
            Geometry::Polygon(rings) => {
                assert_eq!(rings.len(), 2);
                assert_eq!(rings[0].len(), 5);
                assert_eq!(rings[1].len(), 4);
                assert_eq!(rings[0][1], c(100.0, 14.0));
                assert_eq!(rings[1][1], c(102.0, 11.0));
            }
            other => panic!("expected polygon, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_point_uses_origin() {
        let rec = record(ShapeType::Point, &[], &[]);
        let feature = assemble(rec, &FieldSchema::default(), &Offset, &mut Vec::new()).unwrap();
        assert_eq!(feature.geometry, Geometry::Point(c(100.0, 10.0)));
    }

    #[test]
    fn test_unsupported_is_not_assembled() {
        let rec = record(ShapeType::Unsupported(8), &[(1.0, 1.0)], &[]);
        assert!(assemble(rec, &FieldSchema::default(), &Offset, &mut Vec::new()).is_none());
    }

    #[test]
    fn test_untransformed_vertices_are_reported() {
        let rec = record(
            ShapeType::Polyline,
            &[(1.0, 1.0), (-5.0, 2.0), (3.0, 3.0)],
            &[0],
        );
        let mut diagnostics = Vec::new();
        let feature =
            assemble(rec, &FieldSchema::default(), &RejectNegative, &mut diagnostics).unwrap();
        assert_eq!(
            feature.geometry,
            Geometry::MultiLineString(vec![vec![c(1.0, 1.0), c(-5.0, 2.0), c(3.0, 3.0)]])
        );
        assert_eq!(
            diagnostics,
            vec![Diagnostic::Untransformed {
                index: 0,
                x: -5.0,
                y: 2.0,
                reason: "negative easting".to_string(),
            }]
        );
    }

    #[test]
    fn test_split_parts_clamps_bad_offsets() {
        let points: Vec<Coord<f64>> = (0..3).map(|i| Coord { x: i as f64, y: 0.0 }).collect();
        let parts: Vec<usize> = split_parts(&points, &[0, 2, 7]).map(|p| p.len()).collect();
        assert_eq!(parts, vec![2, 1, 0]);
    }

    #[test]
    fn test_properties_follow_schema_order() {
        let schema = FieldSchema::from_names(["ZETA", "ALPHA", "MID"]);
        let mut rec = record(ShapeType::Point, &[(0.0, 0.0)], &[]);
        rec.attributes = vec![
            FieldValue::Text("z".to_string()),
            FieldValue::Integer(1),
            FieldValue::Boolean(false),
        ];
        let feature = assemble(rec, &schema, &Offset, &mut Vec::new()).unwrap();
        let keys: Vec<&str> = feature.properties.keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["ZETA", "ALPHA", "MID"]);
    }

    #[test]
    fn test_coerce_value_yields_primitives() {
        assert_eq!(coerce_value(FieldValue::Integer(7)), serde_json::json!(7));
        assert_eq!(coerce_value(FieldValue::Float(2.5)), serde_json::json!(2.5));
        assert_eq!(coerce_value(FieldValue::Null), Value::Null);
        assert_eq!(coerce_value(FieldValue::Boolean(true)), Value::Bool(true));
        assert_eq!(
            coerce_value(FieldValue::Date {
                year: 1897,
                month: 9,
                day: 1
            }),
            Value::String("1897-09-01".to_string())
        );
        assert_eq!(
            coerce_value(FieldValue::Other("blob".to_string())),
            Value::String("blob".to_string())
        );
        assert_eq!(
            coerce_value(FieldValue::Float(f64::NAN)),
            Value::String("NaN".to_string())
        );
    }

    #[test]
    fn test_geojson_conversion() {
        let feature = Feature {
            geometry: Geometry::MultiLineString(vec![vec![c(1.0, 2.0), c(3.0, 4.0)]]),
            properties: JsonObject::new(),
        };
        let collection = FeatureCollection {
            features: vec![feature],
        };
        let json = serde_json::to_value(collection.to_geojson()).unwrap();
        assert_eq!(json["type"], "FeatureCollection");
        assert_eq!(json["features"][0]["type"], "Feature");
        assert_eq!(json["features"][0]["geometry"]["type"], "MultiLineString");
        assert_eq!(
            json["features"][0]["geometry"]["coordinates"],
            serde_json::json!([[[1.0, 2.0], [3.0, 4.0]]])
        );
    }
}
