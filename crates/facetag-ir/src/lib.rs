//! Shared data model for the facetag face-annotation system.
//!
//! This crate defines the plain data that flows between the STEP front end, the
//! fingerprint store and the document session:
//!
//! - [`FaceDescriptor`]: the geometric description of one face, enough to
//!   recompute its fingerprint.
//! - [`FaceMetadata`]: the user annotations attached to one face.
//! - [`fingerprint`]: the content hash that identifies a face across reloads.
//! - [`codec`]: the text-safe payload format used for storage and embedding.
//!
//! Nothing in here touches the filesystem or a database.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub mod codec;
pub mod fingerprint;

pub use codec::{CodecError, EmbeddedFace, EmbeddedMetadata};
pub use fingerprint::{Fingerprint, FingerprintHasher, DEFAULT_PRECISION};

/// Positional index of a face within the currently loaded document.
///
/// Only meaningful for one load; use a [`Fingerprint`] for identity across loads.
pub type FaceIndex = usize;

/// Live metadata of a document, keyed by current face index.
pub type MetadataMap = BTreeMap<FaceIndex, FaceMetadata>;

/// 3D vector with f64 components (conventionally millimeters).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    /// X component.
    pub x: f64,
    /// Y component.
    pub y: f64,
    /// Z component.
    pub z: f64,
}

impl Vec3 {
    /// Create a new Vec3.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Components as an array, in x, y, z order.
    pub fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

/// Underlying surface of a face together with its defining parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SurfaceDescriptor {
    /// Infinite plane through `origin` with unit `normal`.
    Plane {
        /// A point on the plane.
        origin: Vec3,
        /// Unit normal.
        normal: Vec3,
    },
    /// Cylinder around the line through `origin` along `axis`.
    Cylinder {
        /// A point on the axis.
        origin: Vec3,
        /// Unit axis direction.
        axis: Vec3,
        /// Radius.
        radius: f64,
    },
    /// Cone whose cross-section through `origin` has `radius`.
    Cone {
        /// Center of the reference circle.
        origin: Vec3,
        /// Unit axis direction.
        axis: Vec3,
        /// Radius at `origin`.
        radius: f64,
        /// Half-angle in radians.
        semi_angle: f64,
    },
    /// Sphere.
    Sphere {
        /// Center point.
        center: Vec3,
        /// Radius.
        radius: f64,
    },
    /// Torus around `axis` through `center`.
    Torus {
        /// Center point.
        center: Vec3,
        /// Unit axis direction.
        axis: Vec3,
        /// Distance from the axis to the tube center.
        major_radius: f64,
        /// Tube radius.
        minor_radius: f64,
    },
    /// A surface type the fingerprint scheme does not cover (B-splines, offsets, ...).
    Unsupported {
        /// STEP entity type of the surface.
        type_name: String,
    },
}

impl SurfaceDescriptor {
    /// Short lowercase name of the surface type.
    pub fn kind_name(&self) -> &str {
        match self {
            SurfaceDescriptor::Plane { .. } => "plane",
            SurfaceDescriptor::Cylinder { .. } => "cylinder",
            SurfaceDescriptor::Cone { .. } => "cone",
            SurfaceDescriptor::Sphere { .. } => "sphere",
            SurfaceDescriptor::Torus { .. } => "torus",
            SurfaceDescriptor::Unsupported { .. } => "unsupported",
        }
    }

    /// Radius of a cylindrical surface, `None` for every other type.
    pub fn cylinder_radius(&self) -> Option<f64> {
        match self {
            SurfaceDescriptor::Cylinder { radius, .. } => Some(*radius),
            _ => None,
        }
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    /// Minimum corner.
    pub min: Vec3,
    /// Maximum corner.
    pub max: Vec3,
}

impl Bounds {
    /// Smallest box containing every point, or `None` for an empty iterator.
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bounds = Bounds {
            min: first,
            max: first,
        };
        for p in iter {
            bounds.min.x = bounds.min.x.min(p.x);
            bounds.min.y = bounds.min.y.min(p.y);
            bounds.min.z = bounds.min.z.min(p.z);
            bounds.max.x = bounds.max.x.max(p.x);
            bounds.max.y = bounds.max.y.max(p.y);
            bounds.max.z = bounds.max.z.max(p.z);
        }
        Some(bounds)
    }
}

/// Geometric description of one face, as produced by the loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceDescriptor {
    /// Entity id of the face in the source file. Not part of the fingerprint.
    pub entity_id: u64,
    /// Face name from the source file, if it carried a non-empty one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Underlying surface.
    pub surface: SurfaceDescriptor,
    /// Extent of the face boundary, when it has vertices.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<Bounds>,
}

/// Errors from parsing attribute names and values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// Color string is not `#RRGGBB`.
    #[error("invalid color '{0}': expected #RRGGBB")]
    InvalidColor(String),

    /// Attribute name outside the supported vocabulary.
    #[error("unknown attribute '{0}'")]
    UnknownAttribute(String),
}

/// An sRGB color, written as `#RRGGBB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
}

impl Color {
    /// Create a color from channels.
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl FromStr for Color {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValueError::InvalidColor(s.to_string());
        let hex = s.trim().strip_prefix('#').ok_or_else(invalid)?;
        if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
        Ok(Color::new(channel(0)?, channel(2)?, channel(4)?))
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl TryFrom<String> for Color {
    type Error = ValueError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}

/// Thread callout for a hole or shaft face.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreadSpec {
    /// Thread standard, e.g. `M (ISO Metric)`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Nominal size, e.g. `M6`.
    pub size: String,
    /// Pitch, e.g. `1.0` or `20 TPI`.
    pub pitch: String,
    /// Fit class, e.g. `6g / 6H (ISO Medium)`.
    pub class: String,
}

/// Tolerance callout for a face.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToleranceSpec {
    /// Tolerance kind, e.g. `Position` or `H7 (Hole)`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Value, e.g. `+/- 0.005`.
    pub value: String,
    /// Datum reference, possibly empty.
    pub datum: String,
}

/// The kinds of annotation a face can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKind {
    /// Display color.
    Color,
    /// Thread callout.
    Thread,
    /// Tolerance callout.
    Tolerance,
}

impl AttributeKind {
    /// Vocabulary name of this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            AttributeKind::Color => "color",
            AttributeKind::Thread => "thread",
            AttributeKind::Tolerance => "tolerance",
        }
    }
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttributeKind {
    type Err = ValueError;

    /// Accepts the top-level names and their dotted sub-fields
    /// (`thread.size`, `tolerance.datum`, ...), which resolve to the owning kind.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        let (head, tail) = match name.split_once('.') {
            Some((head, tail)) => (head, Some(tail)),
            None => (name.as_str(), None),
        };
        match (head, tail) {
            ("color", None) => Ok(AttributeKind::Color),
            ("thread", None | Some("type" | "size" | "pitch" | "class")) => {
                Ok(AttributeKind::Thread)
            }
            ("tolerance", _) => Ok(AttributeKind::Tolerance),
            _ => Err(ValueError::UnknownAttribute(s.to_string())),
        }
    }
}

/// One annotation value, tagged by kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attribute {
    /// Display color.
    Color(Color),
    /// Thread callout.
    Thread(ThreadSpec),
    /// Tolerance callout.
    Tolerance(ToleranceSpec),
}

impl Attribute {
    /// The kind of this attribute.
    pub fn kind(&self) -> AttributeKind {
        match self {
            Attribute::Color(_) => AttributeKind::Color,
            Attribute::Thread(_) => AttributeKind::Thread,
            Attribute::Tolerance(_) => AttributeKind::Tolerance,
        }
    }
}

/// Annotations attached to one face. At most one attribute per kind.
///
/// An empty record is equivalent to no record: callers must delete rather
/// than store it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceMetadata {
    /// Display color.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
    /// Thread callout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread: Option<ThreadSpec>,
    /// Tolerance callout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tolerance: Option<ToleranceSpec>,
}

impl FaceMetadata {
    /// True when no attribute is present.
    pub fn is_empty(&self) -> bool {
        self.color.is_none() && self.thread.is_none() && self.tolerance.is_none()
    }

    /// Set an attribute, replacing any previous value of the same kind.
    pub fn set(&mut self, attribute: Attribute) {
        match attribute {
            Attribute::Color(c) => self.color = Some(c),
            Attribute::Thread(t) => self.thread = Some(t),
            Attribute::Tolerance(t) => self.tolerance = Some(t),
        }
    }

    /// Remove the attribute of `kind`. Returns whether one was present.
    pub fn remove(&mut self, kind: AttributeKind) -> bool {
        match kind {
            AttributeKind::Color => self.color.take().is_some(),
            AttributeKind::Thread => self.thread.take().is_some(),
            AttributeKind::Tolerance => self.tolerance.take().is_some(),
        }
    }

    /// Value of the attribute of `kind`, if present.
    pub fn get(&self, kind: AttributeKind) -> Option<Attribute> {
        match kind {
            AttributeKind::Color => self.color.map(Attribute::Color),
            AttributeKind::Thread => self.thread.clone().map(Attribute::Thread),
            AttributeKind::Tolerance => self.tolerance.clone().map(Attribute::Tolerance),
        }
    }

    /// Present attributes in kind order.
    pub fn attributes(&self) -> Vec<Attribute> {
        [
            AttributeKind::Color,
            AttributeKind::Thread,
            AttributeKind::Tolerance,
        ]
        .into_iter()
        .filter_map(|kind| self.get(kind))
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_parse_and_display() {
        let c: Color = "#ff0000".parse().unwrap();
        assert_eq!(c, Color::new(255, 0, 0));
        assert_eq!(c.to_string(), "#FF0000");
        assert!("ff0000".parse::<Color>().is_err());
        assert!("#ff00".parse::<Color>().is_err());
        assert!("#gg0000".parse::<Color>().is_err());
    }

    #[test]
    fn test_attribute_kind_vocabulary() {
        assert_eq!("color".parse::<AttributeKind>().unwrap(), AttributeKind::Color);
        assert_eq!("thread.size".parse::<AttributeKind>().unwrap(), AttributeKind::Thread);
        assert_eq!(
            "tolerance.datum".parse::<AttributeKind>().unwrap(),
            AttributeKind::Tolerance
        );
        assert!("thread.depth".parse::<AttributeKind>().is_err());
        assert!("material".parse::<AttributeKind>().is_err());
    }

    #[test]
    fn test_remove_last_attribute_leaves_empty_record() {
        let mut meta = FaceMetadata::default();
        meta.set(Attribute::Color(Color::new(1, 2, 3)));
        assert!(!meta.is_empty());
        assert!(meta.remove(AttributeKind::Color));
        assert!(meta.is_empty());
        assert!(!meta.remove(AttributeKind::Color));
    }

    #[test]
    fn test_metadata_json_shape() {
        let mut meta = FaceMetadata::default();
        meta.set(Attribute::Color("#00FF00".parse().unwrap()));
        meta.set(Attribute::Thread(ThreadSpec {
            kind: "M (ISO Metric)".into(),
            size: "M6".into(),
            pitch: "1.0".into(),
            class: String::new(),
        }));
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["color"], "#00FF00");
        assert_eq!(json["thread"]["type"], "M (ISO Metric)");
        assert!(json.get("tolerance").is_none());
    }

    #[test]
    fn test_bounds_from_points() {
        let b = Bounds::from_points([
            Vec3::new(1.0, -2.0, 0.0),
            Vec3::new(-1.0, 4.0, 3.0),
        ])
        .unwrap();
        assert_eq!(b.min, Vec3::new(-1.0, -2.0, 0.0));
        assert_eq!(b.max, Vec3::new(1.0, 4.0, 3.0));
        assert!(Bounds::from_points(std::iter::empty()).is_none());
    }
}
