//! Surface entities: planes, cylinders, cones, spheres, tori.
//!
//! Surfaces are read into [`SurfaceDescriptor`]s, the parameter sets the
//! fingerprint is computed from. Any other surface type becomes
//! [`SurfaceDescriptor::Unsupported`].

use super::{dir_to_ir, parse_any_axis_placement, to_ir, EntityArgs};
use crate::error::StepError;
use crate::parser::StepFile;
use facetag_ir::SurfaceDescriptor;
use tracing::debug;

/// Parse a PLANE entity.
///
/// STEP syntax: `PLANE(name, position)`
pub fn parse_plane(file: &StepFile, id: u64) -> Result<SurfaceDescriptor, StepError> {
    let entity = file.require(id)?;
    let placement = parse_any_axis_placement(file, entity.entity_ref(1)?)?;
    Ok(SurfaceDescriptor::Plane {
        origin: to_ir(&placement.location),
        normal: dir_to_ir(&placement.z_axis()),
    })
}

/// Parse a CYLINDRICAL_SURFACE entity.
///
/// STEP syntax: `CYLINDRICAL_SURFACE(name, position, radius)`
pub fn parse_cylindrical_surface(file: &StepFile, id: u64) -> Result<SurfaceDescriptor, StepError> {
    let entity = file.require(id)?;
    let placement = parse_any_axis_placement(file, entity.entity_ref(1)?)?;
    let radius = entity.real(2)?;
    Ok(SurfaceDescriptor::Cylinder {
        origin: to_ir(&placement.location),
        axis: dir_to_ir(&placement.z_axis()),
        radius,
    })
}

/// Parse a CONICAL_SURFACE entity.
///
/// STEP syntax: `CONICAL_SURFACE(name, position, radius, semi_angle)`
pub fn parse_conical_surface(file: &StepFile, id: u64) -> Result<SurfaceDescriptor, StepError> {
    let entity = file.require(id)?;
    let placement = parse_any_axis_placement(file, entity.entity_ref(1)?)?;
    let radius = entity.real(2)?;
    let semi_angle = entity.real(3)?;
    Ok(SurfaceDescriptor::Cone {
        origin: to_ir(&placement.location),
        axis: dir_to_ir(&placement.z_axis()),
        radius,
        semi_angle,
    })
}

/// Parse a SPHERICAL_SURFACE entity.
///
/// STEP syntax: `SPHERICAL_SURFACE(name, position, radius)`
pub fn parse_spherical_surface(file: &StepFile, id: u64) -> Result<SurfaceDescriptor, StepError> {
    let entity = file.require(id)?;
    let placement = parse_any_axis_placement(file, entity.entity_ref(1)?)?;
    let radius = entity.real(2)?;
    Ok(SurfaceDescriptor::Sphere {
        center: to_ir(&placement.location),
        radius,
    })
}

/// Parse a TOROIDAL_SURFACE entity.
///
/// STEP syntax: `TOROIDAL_SURFACE(name, position, major_radius, minor_radius)`
pub fn parse_toroidal_surface(file: &StepFile, id: u64) -> Result<SurfaceDescriptor, StepError> {
    let entity = file.require(id)?;
    let placement = parse_any_axis_placement(file, entity.entity_ref(1)?)?;
    let major_radius = entity.real(2)?;
    let minor_radius = entity.real(3)?;
    Ok(SurfaceDescriptor::Torus {
        center: to_ir(&placement.location),
        axis: dir_to_ir(&placement.z_axis()),
        major_radius,
        minor_radius,
    })
}

/// Parse any surface entity a face may reference.
///
/// Unsupported types and degenerate placements yield
/// [`SurfaceDescriptor::Unsupported`]; broken references are errors.
pub fn parse_surface(file: &StepFile, id: u64) -> Result<SurfaceDescriptor, StepError> {
    let entity = file.require(id)?;

    let parsed = match entity.type_name.as_str() {
        _ if entity.complex => return Ok(unsupported(&entity.type_name)),
        "PLANE" => parse_plane(file, id),
        "CYLINDRICAL_SURFACE" => parse_cylindrical_surface(file, id),
        "CONICAL_SURFACE" => parse_conical_surface(file, id),
        "SPHERICAL_SURFACE" => parse_spherical_surface(file, id),
        "TOROIDAL_SURFACE" => parse_toroidal_surface(file, id),
        other => return Ok(unsupported(other)),
    };

    match parsed {
        Err(StepError::InvalidGeometry(reason)) => {
            debug!(surface = id, %reason, "degenerate surface, fingerprint will be unknown");
            Ok(unsupported(&entity.type_name))
        }
        other => other,
    }
}

fn unsupported(type_name: &str) -> SurfaceDescriptor {
    SurfaceDescriptor::Unsupported {
        type_name: type_name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    const SURFACES: &str = r#"
ISO-10303-21;
HEADER;
ENDSEC;
DATA;
#1 = CARTESIAN_POINT('', (0.0, 0.0, 0.0));
#2 = DIRECTION('', (0.0, 0.0, 1.0));
#3 = DIRECTION('', (1.0, 0.0, 0.0));
#4 = AXIS2_PLACEMENT_3D('', #1, #2, #3);
#5 = PLANE('', #4);
#6 = CYLINDRICAL_SURFACE('', #4, 5.0);
#7 = CONICAL_SURFACE('', #4, 2.0, 0.5);
#8 = SPHERICAL_SURFACE('', #4, 3.0);
#9 = TOROIDAL_SURFACE('', #4, 10.0, 1.0);
#10 = ( BOUNDED_SURFACE() B_SPLINE_SURFACE(1,1,((#1,#1),(#1,#1)),.UNSPECIFIED.,.F.,.F.,.F.) SURFACE() );
#11 = DIRECTION('', (0.0, 0.0, 0.0));
#12 = AXIS2_PLACEMENT_3D('', #1, #11, $);
#13 = CYLINDRICAL_SURFACE('', #12, 5.0);
#14 = CYLINDRICAL_SURFACE('', #99, 5.0);
ENDSEC;
END-ISO-10303-21;
"#;

    #[test]
    fn test_parse_supported_surfaces() {
        let file = Parser::parse(SURFACES.as_bytes()).unwrap();
        assert_eq!(parse_surface(&file, 5).unwrap().kind_name(), "plane");
        let cyl = parse_surface(&file, 6).unwrap();
        assert_eq!(cyl.cylinder_radius(), Some(5.0));
        assert_eq!(parse_surface(&file, 7).unwrap().kind_name(), "cone");
        assert_eq!(parse_surface(&file, 8).unwrap().kind_name(), "sphere");
        assert_eq!(parse_surface(&file, 9).unwrap().kind_name(), "torus");
    }

    #[test]
    fn test_unsupported_and_degenerate_surfaces() {
        let file = Parser::parse(SURFACES.as_bytes()).unwrap();
        assert_eq!(
            parse_surface(&file, 10).unwrap(),
            SurfaceDescriptor::Unsupported {
                type_name: "BOUNDED_SURFACE".into()
            }
        );
        assert_eq!(parse_surface(&file, 13).unwrap().kind_name(), "unsupported");
    }

    #[test]
    fn test_broken_reference_is_error() {
        let file = Parser::parse(SURFACES.as_bytes()).unwrap();
        assert!(matches!(
            parse_surface(&file, 14),
            Err(StepError::MissingEntity(99))
        ));
    }
}
