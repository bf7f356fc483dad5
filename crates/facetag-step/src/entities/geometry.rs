//! Fundamental geometry entities: points, directions, and placements.

use super::EntityArgs;
use crate::error::StepError;
use crate::parser::StepFile;
use nalgebra::{Unit, Vector3};

/// A point in model space.
pub type Point3 = nalgebra::Point3<f64>;
/// A free vector.
pub type Vec3 = Vector3<f64>;
/// A unit direction.
pub type Dir3 = Unit<Vector3<f64>>;

/// Convert a point to the shared IR vector type.
pub fn to_ir(p: &Point3) -> facetag_ir::Vec3 {
    facetag_ir::Vec3::new(p.x, p.y, p.z)
}

/// Convert a direction to the shared IR vector type.
pub fn dir_to_ir(d: &Dir3) -> facetag_ir::Vec3 {
    let v = d.as_ref();
    facetag_ir::Vec3::new(v.x, v.y, v.z)
}

/// Parse a CARTESIAN_POINT entity.
///
/// STEP syntax: `CARTESIAN_POINT(name, (x, y, z))`
pub fn parse_cartesian_point(file: &StepFile, id: u64) -> Result<Point3, StepError> {
    let entity = file.require(id)?;

    match entity.type_name.as_str() {
        "CARTESIAN_POINT" => {
            let coords = entity.real_list(1)?;
            match coords.as_slice() {
                [x, y, z, ..] => Ok(Point3::new(*x, *y, *z)),
                // 2D points appear in parameter-space curves.
                [x, y] => Ok(Point3::new(*x, *y, 0.0)),
                _ => Err(StepError::parser(
                    Some(id),
                    format!("CARTESIAN_POINT needs 3 coordinates, got {}", coords.len()),
                )),
            }
        }
        other => Err(StepError::type_mismatch("CARTESIAN_POINT", other)),
    }
}

/// Parse a DIRECTION entity.
///
/// STEP syntax: `DIRECTION(name, (x, y, z))`
pub fn parse_direction(file: &StepFile, id: u64) -> Result<Dir3, StepError> {
    let entity = file.require(id)?;

    match entity.type_name.as_str() {
        "DIRECTION" => {
            let coords = entity.real_list(1)?;
            if coords.len() < 3 {
                return Err(StepError::parser(
                    Some(id),
                    format!("DIRECTION needs 3 components, got {}", coords.len()),
                ));
            }
            let v = Vec3::new(coords[0], coords[1], coords[2]);
            if v.norm() < 1e-15 {
                return Err(StepError::InvalidGeometry("zero-length direction".into()));
            }
            Ok(Dir3::new_normalize(v))
        }
        other => Err(StepError::type_mismatch("DIRECTION", other)),
    }
}

/// Axis placement data (origin + optional directions).
#[derive(Debug, Clone)]
pub struct AxisPlacement {
    /// Location point.
    pub location: Point3,
    /// Z-axis direction (normal).
    pub axis: Option<Dir3>,
}

impl AxisPlacement {
    /// Get the Z-axis direction, defaulting to +Z if not specified.
    pub fn z_axis(&self) -> Dir3 {
        self.axis.unwrap_or_else(|| Dir3::new_normalize(Vec3::z()))
    }
}

/// Parse an AXIS1_PLACEMENT or AXIS2_PLACEMENT_3D entity.
///
/// STEP syntax: `AXIS1_PLACEMENT(name, location, axis)` and
/// `AXIS2_PLACEMENT_3D(name, location, axis, ref_direction)`. The reference
/// direction only fixes the surface parameterization, not its shape, so it is
/// not read.
pub fn parse_any_axis_placement(file: &StepFile, id: u64) -> Result<AxisPlacement, StepError> {
    let entity = file.require(id)?;

    match entity.type_name.as_str() {
        "AXIS1_PLACEMENT" | "AXIS2_PLACEMENT_3D" => {
            let loc_id = entity.entity_ref(1)?;
            let location = parse_cartesian_point(file, loc_id)?;

            let axis = entity
                .opt_entity_ref(2)
                .map(|axis_id| parse_direction(file, axis_id))
                .transpose()?;

            Ok(AxisPlacement { location, axis })
        }
        other => Err(StepError::type_mismatch("AXIS_PLACEMENT", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn parse_step(input: &str) -> StepFile {
        Parser::parse(input.as_bytes()).unwrap()
    }

    #[test]
    fn test_parse_cartesian_point() {
        let input = r#"
ISO-10303-21;
HEADER;
ENDSEC;
DATA;
#1 = CARTESIAN_POINT('origin', (1.0, 2.0, 3.0));
ENDSEC;
END-ISO-10303-21;
"#;
        let file = parse_step(input);
        let p = parse_cartesian_point(&file, 1).unwrap();
        assert!((p.x - 1.0).abs() < 1e-10);
        assert!((p.y - 2.0).abs() < 1e-10);
        assert!((p.z - 3.0).abs() < 1e-10);
    }

    #[test]
    fn test_parse_direction_normalizes() {
        let input = r#"
ISO-10303-21;
HEADER;
ENDSEC;
DATA;
#1 = DIRECTION('z', (0.0, 0.0, 2.0));
#2 = DIRECTION('zero', (0.0, 0.0, 0.0));
ENDSEC;
END-ISO-10303-21;
"#;
        let file = parse_step(input);
        let d = parse_direction(&file, 1).unwrap();
        assert!((d.as_ref().z - 1.0).abs() < 1e-10);
        assert!(matches!(
            parse_direction(&file, 2),
            Err(StepError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn test_parse_axis2_placement_3d() {
        let input = r#"
ISO-10303-21;
HEADER;
ENDSEC;
DATA;
#1 = CARTESIAN_POINT('', (0.0, 0.0, 5.0));
#2 = DIRECTION('', (0.0, 1.0, 0.0));
#3 = DIRECTION('', (1.0, 0.0, 0.0));
#4 = AXIS2_PLACEMENT_3D('', #1, #2, #3);
#5 = AXIS2_PLACEMENT_3D('', #1, $, $);
ENDSEC;
END-ISO-10303-21;
"#;
        let file = parse_step(input);
        let placement = parse_any_axis_placement(&file, 4).unwrap();
        assert!((placement.location.z - 5.0).abs() < 1e-10);
        assert!((placement.z_axis().as_ref().y - 1.0).abs() < 1e-10);

        let defaulted = parse_any_axis_placement(&file, 5).unwrap();
        assert!((defaulted.z_axis().as_ref().z - 1.0).abs() < 1e-10);
    }
}
