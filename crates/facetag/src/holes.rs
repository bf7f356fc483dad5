//! Grouping of cylindrical faces by diameter.

use std::collections::BTreeMap;

use facetag_ir::{FaceDescriptor, FaceIndex};
use serde::Serialize;

/// Decimal places diameters are rounded to before grouping.
pub const DIAMETER_DECIMALS: i32 = 4;

/// Cylindrical faces sharing one diameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HoleGroup {
    /// Diameter, rounded to [`DIAMETER_DECIMALS`] places.
    pub diameter: f64,
    /// Face indices, ascending.
    pub faces: Vec<FaceIndex>,
    /// Number of faces.
    pub count: usize,
}

/// Group every cylindrical face by diameter, smallest first.
///
/// All cylinders are reported; telling bores from bosses would need the
/// face orientation relative to the solid.
pub fn group_holes<'a>(faces: impl IntoIterator<Item = &'a FaceDescriptor>) -> Vec<HoleGroup> {
    let scale = 10f64.powi(DIAMETER_DECIMALS);
    let mut groups: BTreeMap<i64, Vec<FaceIndex>> = BTreeMap::new();

    for (index, face) in faces.into_iter().enumerate() {
        let Some(radius) = face.surface.cylinder_radius() else {
            continue;
        };
        let key = (radius * 2.0 * scale).round() as i64;
        groups.entry(key).or_default().push(index);
    }

    groups
        .into_iter()
        .map(|(key, faces)| HoleGroup {
            diameter: key as f64 / scale,
            count: faces.len(),
            faces,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use facetag_ir::{SurfaceDescriptor, Vec3};

    fn cylinder(radius: f64) -> FaceDescriptor {
        FaceDescriptor {
            entity_id: 0,
            label: None,
            surface: SurfaceDescriptor::Cylinder {
                origin: Vec3::new(0.0, 0.0, 0.0),
                axis: Vec3::new(0.0, 0.0, 1.0),
                radius,
            },
            bounds: None,
        }
    }

    fn plane() -> FaceDescriptor {
        FaceDescriptor {
            entity_id: 0,
            label: None,
            surface: SurfaceDescriptor::Plane {
                origin: Vec3::new(0.0, 0.0, 0.0),
                normal: Vec3::new(0.0, 0.0, 1.0),
            },
            bounds: None,
        }
    }

    #[test]
    fn test_groups_sorted_by_diameter() {
        let faces = vec![
            plane(),
            cylinder(5.0),
            cylinder(1.5),
            cylinder(5.00001),
            plane(),
        ];
        let groups = group_holes(&faces);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].diameter, 3.0);
        assert_eq!(groups[0].faces, vec![2]);
        assert_eq!(groups[1].diameter, 10.0);
        assert_eq!(groups[1].faces, vec![1, 3]);
        assert_eq!(groups[1].count, 2);
    }

    #[test]
    fn test_no_cylinders() {
        assert!(group_holes(&[plane(), plane()]).is_empty());
    }
}
