//! Annotation data model and validation.
//!
//! [`AnnotationRecord`] is the loose wire shape clients send and the store
//! writes to disk. [`Annotation`] is the validated form, with the
//! shape-specific payload decoded into a [`Shape`] according to its tag.
//! Conversion between the two is the only place validation happens, so a
//! record read back from disk goes through exactly the same checks as one
//! submitted by a client.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::CoreError;
use crate::identity::validate_identity;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Tag for axis-aligned rectangles.
pub const SHAPE_RECT: &str = "rect";

/// Tag for polygons.
pub const SHAPE_POLYGON: &str = "polygon";

/// Minimum number of vertices in a polygon.
pub const MIN_POLYGON_POINTS: usize = 3;

// ---------------------------------------------------------------------------
// Wire shape
// ---------------------------------------------------------------------------

/// One annotation as it travels over the wire and sits on disk.
///
/// Every field is defaulted so that missing fields surface as validation
/// errors from [`Annotation::try_from`] rather than as opaque decode errors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnnotationRecord {
    #[serde(default)]
    pub image_name: String,
    #[serde(default)]
    pub class: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub shape: String,
    #[serde(default)]
    pub data: Value,
}

// ---------------------------------------------------------------------------
// Shapes
// ---------------------------------------------------------------------------

/// Axis-aligned rectangle in image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

/// A polygon vertex.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Shape-specific payload of an annotation, decoded via its tag.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Rect(Rect),
    Polygon(Vec<Point>),
    /// A tag this service has no schema for. The tag and payload are kept
    /// verbatim so nothing a client saved is lost.
    Unknown { tag: String, data: Value },
}

impl Shape {
    /// Decode `data` according to `tag`.
    pub fn decode(tag: &str, data: Value) -> Result<Self, CoreError> {
        match tag {
            SHAPE_RECT => {
                let rect: Rect = serde_json::from_value(data).map_err(|e| {
                    CoreError::Validation(format!(
                        "shape 'rect' requires integer x, y, width, height: {e}"
                    ))
                })?;
                if rect.width < 0 || rect.height < 0 {
                    return Err(CoreError::Validation(format!(
                        "rect width and height must be non-negative, got {}x{}",
                        rect.width, rect.height
                    )));
                }
                Ok(Self::Rect(rect))
            }
            SHAPE_POLYGON => {
                let points: Vec<Point> = serde_json::from_value(data).map_err(|e| {
                    CoreError::Validation(format!(
                        "shape 'polygon' requires an array of {{x, y}} points: {e}"
                    ))
                })?;
                if points.len() < MIN_POLYGON_POINTS {
                    return Err(CoreError::Validation(format!(
                        "polygon needs at least {MIN_POLYGON_POINTS} points, got {}",
                        points.len()
                    )));
                }
                if points.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
                    return Err(CoreError::Validation(
                        "polygon points must be finite numbers".to_string(),
                    ));
                }
                Ok(Self::Polygon(points))
            }
            "" => Err(CoreError::Validation("shape is required".to_string())),
            other => Ok(Self::Unknown {
                tag: other.to_string(),
                data,
            }),
        }
    }

    /// The wire tag for this shape.
    pub fn tag(&self) -> &str {
        match self {
            Self::Rect(_) => SHAPE_RECT,
            Self::Polygon(_) => SHAPE_POLYGON,
            Self::Unknown { tag, .. } => tag,
        }
    }

    fn into_data(self) -> Value {
        match self {
            Self::Rect(r) => json!({
                "x": r.x,
                "y": r.y,
                "width": r.width,
                "height": r.height,
            }),
            Self::Polygon(points) => Value::Array(
                points
                    .into_iter()
                    .map(|p| json!({ "x": p.x, "y": p.y }))
                    .collect(),
            ),
            Self::Unknown { data, .. } => data,
        }
    }
}

// ---------------------------------------------------------------------------
// Validated annotation
// ---------------------------------------------------------------------------

/// A validated annotation. Immutable once persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "AnnotationRecord", into = "AnnotationRecord")]
pub struct Annotation {
    pub image_name: String,
    pub class: String,
    pub description: Option<String>,
    pub shape: Shape,
}

impl TryFrom<AnnotationRecord> for Annotation {
    type Error = CoreError;

    fn try_from(record: AnnotationRecord) -> Result<Self, Self::Error> {
        validate_identity(&record.image_name)?;

        if record.class.trim().is_empty() {
            return Err(CoreError::Validation("class is required".to_string()));
        }

        let shape = Shape::decode(record.shape.trim(), record.data)?;

        let description = record.description.filter(|d| !d.is_empty());

        Ok(Self {
            image_name: record.image_name,
            class: record.class,
            description,
            shape,
        })
    }
}

impl From<Annotation> for AnnotationRecord {
    fn from(annotation: Annotation) -> Self {
        let shape = annotation.shape.tag().to_string();
        Self {
            image_name: annotation.image_name,
            class: annotation.class,
            description: Some(annotation.description.unwrap_or_default()),
            shape,
            data: annotation.shape.into_data(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
