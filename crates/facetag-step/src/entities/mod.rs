//! Entity readers for the parts of an AP203/AP214 model a face depends on:
//! points and placements, analytic surfaces, and the face/loop/shell
//! topology that orders them.

pub mod geometry;
pub mod surfaces;
pub mod topology;

pub use geometry::*;
pub use surfaces::*;
pub use topology::*;

use crate::error::StepError;
use crate::parser::{StepEntity, StepValue};

/// Typed access to the positional arguments of an entity instance.
///
/// Every accessor reports the entity id, type and argument position on
/// failure so a broken reference can be found in the file.
pub trait EntityArgs {
    /// Argument `idx` converted by `get`, or an error naming `expected`.
    fn arg<'a, T>(
        &'a self,
        idx: usize,
        expected: &str,
        get: impl FnOnce(&'a StepValue) -> Option<T>,
    ) -> Result<T, StepError>;

    /// String argument; `None` for `$`, `*` or a non-string.
    fn opt_string(&self, idx: usize) -> Option<&str>;

    /// Reference argument; `None` for `$`.
    fn opt_entity_ref(&self, idx: usize) -> Option<u64>;

    /// Real (or integer) argument.
    fn real(&self, idx: usize) -> Result<f64, StepError> {
        self.arg(idx, "real", StepValue::as_real)
    }

    /// `#id` argument.
    fn entity_ref(&self, idx: usize) -> Result<u64, StepError> {
        self.arg(idx, "entity ref", StepValue::as_entity_ref)
    }

    /// List of reals, e.g. point coordinates.
    fn real_list(&self, idx: usize) -> Result<Vec<f64>, StepError> {
        self.arg(idx, "list of reals", |v| {
            v.as_list()?.iter().map(StepValue::as_real).collect()
        })
    }

    /// List of references, e.g. the faces of a shell.
    fn entity_ref_list(&self, idx: usize) -> Result<Vec<u64>, StepError> {
        self.arg(idx, "list of entity refs", |v| {
            v.as_list()?.iter().map(StepValue::as_entity_ref).collect()
        })
    }
}

impl EntityArgs for StepEntity {
    fn arg<'a, T>(
        &'a self,
        idx: usize,
        expected: &str,
        get: impl FnOnce(&'a StepValue) -> Option<T>,
    ) -> Result<T, StepError> {
        self.args.get(idx).and_then(get).ok_or_else(|| {
            StepError::parser(
                Some(self.id),
                format!("{} arg {idx}: expected {expected}", self.type_name),
            )
        })
    }

    fn opt_string(&self, idx: usize) -> Option<&str> {
        self.args.get(idx).and_then(StepValue::as_string)
    }

    fn opt_entity_ref(&self, idx: usize) -> Option<u64> {
        self.args.get(idx).and_then(StepValue::as_entity_ref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    #[test]
    fn test_arg_errors_name_the_entity() {
        let file = Parser::parse(b"ISO-10303-21;\nDATA;\n#7=CARTESIAN_POINT('p',(1.,2,$));\nENDSEC;\nEND-ISO-10303-21;\n").unwrap();
        let point = file.require(7).unwrap();

        assert_eq!(point.opt_string(0), Some("p"));
        assert_eq!(point.opt_entity_ref(0), None);
        let err = point.real_list(1).unwrap_err().to_string();
        assert!(err.contains("CARTESIAN_POINT arg 1"), "{err}");
        assert!(point.entity_ref(1).is_err());
    }
}
