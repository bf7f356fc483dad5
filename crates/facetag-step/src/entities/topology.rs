//! Topology entities: vertex, edge, loop, face and shell.

use super::{parse_cartesian_point, EntityArgs, Point3};
use crate::error::StepError;
use crate::parser::StepFile;

/// Parsed FACE_BOUND / FACE_OUTER_BOUND entity.
#[derive(Debug, Clone)]
pub struct StepFaceBound {
    /// The loop entity ID.
    pub loop_id: u64,
    /// Whether this is an outer bound.
    pub is_outer: bool,
}

/// Parsed ADVANCED_FACE / FACE_SURFACE entity.
#[derive(Debug, Clone)]
pub struct StepFace {
    /// The entity ID.
    pub id: u64,
    /// Face name, `None` when empty.
    pub name: Option<String>,
    /// Face bounds (outer and inner loops).
    pub bounds: Vec<StepFaceBound>,
    /// Surface geometry entity ID.
    pub surface_id: u64,
}

/// Parse a VERTEX_POINT entity.
pub fn parse_vertex_point(file: &StepFile, id: u64) -> Result<Point3, StepError> {
    let entity = file.require(id)?;

    match entity.type_name.as_str() {
        "VERTEX_POINT" => parse_cartesian_point(file, entity.entity_ref(1)?),
        other => Err(StepError::type_mismatch("VERTEX_POINT", other)),
    }
}

/// Start and end vertex IDs of an EDGE_CURVE.
pub fn parse_edge_curve_vertices(file: &StepFile, id: u64) -> Result<(u64, u64), StepError> {
    let entity = file.require(id)?;

    match entity.type_name.as_str() {
        "EDGE_CURVE" => Ok((entity.entity_ref(1)?, entity.entity_ref(2)?)),
        other => Err(StepError::type_mismatch("EDGE_CURVE", other)),
    }
}

/// Parse an ORIENTED_EDGE entity, returning the underlying edge ID.
///
/// ORIENTED_EDGE has form: (name, *, *, edge_element, orientation)
pub fn parse_oriented_edge(file: &StepFile, id: u64) -> Result<u64, StepError> {
    let entity = file.require(id)?;

    match entity.type_name.as_str() {
        "ORIENTED_EDGE" => entity.entity_ref(3),
        other => Err(StepError::type_mismatch("ORIENTED_EDGE", other)),
    }
}

/// All vertex positions on a loop, in loop order. Shared vertices repeat.
pub fn parse_loop_points(file: &StepFile, id: u64) -> Result<Vec<Point3>, StepError> {
    let entity = file.require(id)?;

    match entity.type_name.as_str() {
        "EDGE_LOOP" => {
            let mut points = Vec::new();
            for oe_id in entity.entity_ref_list(1)? {
                let edge_id = parse_oriented_edge(file, oe_id)?;
                let (start, end) = parse_edge_curve_vertices(file, edge_id)?;
                points.push(parse_vertex_point(file, start)?);
                points.push(parse_vertex_point(file, end)?);
            }
            Ok(points)
        }
        "VERTEX_LOOP" => Ok(vec![parse_vertex_point(file, entity.entity_ref(1)?)?]),
        "POLY_LOOP" => entity
            .entity_ref_list(1)?
            .into_iter()
            .map(|p| parse_cartesian_point(file, p))
            .collect(),
        other => Err(StepError::type_mismatch("LOOP", other)),
    }
}

/// Parse a FACE_BOUND or FACE_OUTER_BOUND entity.
pub fn parse_face_bound(file: &StepFile, id: u64) -> Result<StepFaceBound, StepError> {
    let entity = file.require(id)?;

    match entity.type_name.as_str() {
        "FACE_BOUND" | "FACE_OUTER_BOUND" => Ok(StepFaceBound {
            loop_id: entity.entity_ref(1)?,
            is_outer: entity.type_name == "FACE_OUTER_BOUND",
        }),
        other => Err(StepError::type_mismatch("FACE_BOUND", other)),
    }
}

/// Parse an ADVANCED_FACE or FACE_SURFACE entity.
pub fn parse_face(file: &StepFile, id: u64) -> Result<StepFace, StepError> {
    let entity = file.require(id)?;

    match entity.type_name.as_str() {
        "ADVANCED_FACE" | "FACE_SURFACE" => {
            let bound_ids = entity.entity_ref_list(1)?;
            let surface_id = entity.entity_ref(2)?;
            let name = entity
                .opt_string(0)
                .filter(|n| !n.trim().is_empty())
                .map(str::to_string);

            let bounds = bound_ids
                .into_iter()
                .map(|bid| parse_face_bound(file, bid))
                .collect::<Result<Vec<_>, _>>()?;

            Ok(StepFace {
                id,
                name,
                bounds,
                surface_id,
            })
        }
        other => Err(StepError::type_mismatch("ADVANCED_FACE", other)),
    }
}

/// The face a shell entry stands for: an ORIENTED_FACE is replaced by its
/// `face_element`, anything else is taken as is.
pub fn face_element(file: &StepFile, id: u64) -> Result<u64, StepError> {
    let entity = file.require(id)?;
    match entity.type_name.as_str() {
        "ORIENTED_FACE" => entity.entity_ref(2),
        _ => Ok(id),
    }
}

/// Face entity IDs in a stable order: shells by ID, faces in shell order,
/// then any face not referenced by a shell, by ID. Each face appears once.
pub fn ordered_face_ids(file: &StepFile) -> Result<Vec<u64>, StepError> {
    let mut ordered = Vec::new();
    let mut seen = std::collections::HashSet::new();

    let mut shells = file.entities_of_type("CLOSED_SHELL");
    shells.extend(file.entities_of_type("OPEN_SHELL"));
    shells.sort_by_key(|s| s.id);
    for shell in shells {
        for entry in shell.entity_ref_list(1)? {
            let face_id = face_element(file, entry)?;
            if seen.insert(face_id) {
                ordered.push(face_id);
            }
        }
    }

    let mut loose = file.entities_of_type("ADVANCED_FACE");
    loose.extend(file.entities_of_type("FACE_SURFACE"));
    loose.sort_by_key(|f| f.id);
    for face in loose {
        if seen.insert(face.id) {
            ordered.push(face.id);
        }
    }

    Ok(ordered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    const SQUARE: &str = r#"
ISO-10303-21;
HEADER;
ENDSEC;
DATA;
#1 = CARTESIAN_POINT('', (0.0, 0.0, 0.0));
#2 = CARTESIAN_POINT('', (4.0, 0.0, 0.0));
#3 = CARTESIAN_POINT('', (4.0, 3.0, 0.0));
#4 = VERTEX_POINT('', #1);
#5 = VERTEX_POINT('', #2);
#6 = VERTEX_POINT('', #3);
#7 = EDGE_CURVE('', #4, #5, #100, .T.);
#8 = EDGE_CURVE('', #5, #6, #100, .T.);
#9 = EDGE_CURVE('', #6, #4, #100, .T.);
#10 = ORIENTED_EDGE('', *, *, #7, .T.);
#11 = ORIENTED_EDGE('', *, *, #8, .T.);
#12 = ORIENTED_EDGE('', *, *, #9, .F.);
#13 = EDGE_LOOP('', (#10, #11, #12));
#14 = FACE_OUTER_BOUND('', #13, .T.);
#15 = ADVANCED_FACE('top', (#14), #50, .T.);
#16 = ADVANCED_FACE('', (#14), #50, .F.);
#17 = CLOSED_SHELL('', (#16));
ENDSEC;
END-ISO-10303-21;
"#;

    #[test]
    fn test_parse_face() {
        let file = Parser::parse(SQUARE.as_bytes()).unwrap();
        let face = parse_face(&file, 15).unwrap();
        assert_eq!(face.surface_id, 50);
        assert_eq!(face.name.as_deref(), Some("top"));
        assert_eq!(face.bounds.len(), 1);
        assert!(face.bounds[0].is_outer);
        assert!(parse_face(&file, 16).unwrap().name.is_none());
    }

    #[test]
    fn test_loop_points() {
        let file = Parser::parse(SQUARE.as_bytes()).unwrap();
        let points = parse_loop_points(&file, 13).unwrap();
        assert_eq!(points.len(), 6);
        assert!(points.iter().any(|p| (p.y - 3.0).abs() < 1e-12));
    }

    #[test]
    fn test_ordered_face_ids_prefers_shell_order() {
        let file = Parser::parse(SQUARE.as_bytes()).unwrap();
        assert_eq!(ordered_face_ids(&file).unwrap(), vec![16, 15]);
    }

    #[test]
    fn test_oriented_face_resolves_to_its_face() {
        let text = SQUARE
            .replace("CLOSED_SHELL('', (#16))", "CLOSED_SHELL('', (#18, #15))")
            .replace("ENDSEC;\nEND-ISO", "#18 = ORIENTED_FACE('', *, #16, .F.);\nENDSEC;\nEND-ISO");
        let file = Parser::parse(text.as_bytes()).unwrap();
        assert_eq!(face_element(&file, 18).unwrap(), 16);
        assert_eq!(face_element(&file, 15).unwrap(), 15);
        assert_eq!(ordered_face_ids(&file).unwrap(), vec![16, 15]);
    }
}
