//! Geometry fingerprints: stable face identity derived from shape data.
//!
//! A fingerprint is the SHA-256 of a canonical text rendering of a
//! [`FaceDescriptor`]. The rendering drops everything that is not geometry
//! (entity id, label, face order) and normalizes what a re-export may perturb:
//!
//! - reals are rounded to a fixed number of decimals, `-0` becomes `0`;
//! - axis and normal directions are unit length with the first non-zero
//!   component positive, so a flipped axis hashes the same;
//! - cylinder and torus axes are located by the point closest to the world
//!   origin, planes by their signed offset along the normal.

use crate::{Bounds, FaceDescriptor, SurfaceDescriptor, Vec3};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fmt::Write as _;

/// Decimal places kept when hashing, unless configured otherwise.
pub const DEFAULT_PRECISION: u32 = 4;

const MAX_PRECISION: u32 = 12;

/// Hex-encoded SHA-256 identifying a face's geometry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Length of the hex form.
    pub const HEX_LEN: usize = 64;

    /// Accept a previously rendered fingerprint. Returns `None` unless the
    /// input is exactly 64 hex digits.
    pub fn from_hex(s: &str) -> Option<Self> {
        if s.len() == Self::HEX_LEN && s.bytes().all(|b| b.is_ascii_hexdigit()) {
            Some(Fingerprint(s.to_ascii_lowercase()))
        } else {
            None
        }
    }

    /// Hex form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Computes fingerprints at a fixed numeric precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FingerprintHasher {
    precision: u32,
}

impl Default for FingerprintHasher {
    fn default() -> Self {
        Self::new(DEFAULT_PRECISION)
    }
}

impl FingerprintHasher {
    /// Hasher that keeps `precision` decimal places (capped at 12).
    pub fn new(precision: u32) -> Self {
        Self {
            precision: precision.min(MAX_PRECISION),
        }
    }

    /// Decimal places kept.
    pub fn precision(&self) -> u32 {
        self.precision
    }

    /// Fingerprint of `face`, or `None` ("unknown") when the surface type is
    /// unsupported or the descriptor is degenerate.
    pub fn fingerprint(&self, face: &FaceDescriptor) -> Option<Fingerprint> {
        let canonical = self.canonical_form(face)?;
        let digest = Sha256::digest(canonical.as_bytes());
        Some(Fingerprint(hex::encode(digest)))
    }

    /// The text that gets hashed. Exposed for diagnostics.
    pub fn canonical_form(&self, face: &FaceDescriptor) -> Option<String> {
        let mut canon = Canon::new(self.precision);
        match &face.surface {
            SurfaceDescriptor::Plane { origin, normal } => {
                let n = canonical_direction(*normal, self.precision)?;
                canon.tag("plane");
                canon.vec(n)?;
                canon.real(dot(n, *origin))?;
            }
            SurfaceDescriptor::Cylinder {
                origin,
                axis,
                radius,
            } => {
                let a = canonical_direction(*axis, self.precision)?;
                canon.tag("cylinder");
                canon.vec(a)?;
                canon.vec(closest_to_origin(*origin, a))?;
                canon.real(radius.abs())?;
            }
            SurfaceDescriptor::Cone {
                origin,
                axis,
                radius,
                semi_angle,
            } => {
                // The axis direction decides which way the cone opens, so it
                // is normalized but never flipped.
                let a = unit(*axis)?;
                canon.tag("cone");
                canon.vec(a)?;
                canon.vec(*origin)?;
                canon.real(radius.abs())?;
                canon.real(semi_angle.abs())?;
            }
            SurfaceDescriptor::Sphere { center, radius } => {
                canon.tag("sphere");
                canon.vec(*center)?;
                canon.real(radius.abs())?;
            }
            SurfaceDescriptor::Torus {
                center,
                axis,
                major_radius,
                minor_radius,
            } => {
                let a = canonical_direction(*axis, self.precision)?;
                canon.tag("torus");
                canon.vec(a)?;
                canon.vec(*center)?;
                canon.real(major_radius.abs())?;
                canon.real(minor_radius.abs())?;
            }
            SurfaceDescriptor::Unsupported { .. } => return None,
        }
        if let Some(Bounds { min, max }) = face.bounds {
            canon.tag("bounds");
            canon.vec(min)?;
            canon.vec(max)?;
        }
        Some(canon.finish())
    }
}

/// Fingerprint at [`DEFAULT_PRECISION`].
pub fn fingerprint(face: &FaceDescriptor) -> Option<Fingerprint> {
    FingerprintHasher::default().fingerprint(face)
}

struct Canon {
    buf: String,
    precision: u32,
}

impl Canon {
    fn new(precision: u32) -> Self {
        Self {
            buf: String::with_capacity(128),
            precision,
        }
    }

    fn tag(&mut self, name: &str) {
        self.buf.push_str(name);
        self.buf.push('|');
    }

    fn real(&mut self, value: f64) -> Option<()> {
        let rounded = round_to(value, self.precision)?;
        write!(self.buf, "{:.*};", self.precision as usize, rounded).ok()
    }

    fn vec(&mut self, v: Vec3) -> Option<()> {
        self.real(v.x)?;
        self.real(v.y)?;
        self.real(v.z)
    }

    fn finish(self) -> String {
        self.buf
    }
}

fn round_to(value: f64, precision: u32) -> Option<f64> {
    if !value.is_finite() {
        return None;
    }
    let scale = 10f64.powi(precision as i32);
    let rounded = (value * scale).round() / scale;
    // Collapses -0.0 as well.
    Some(if rounded == 0.0 { 0.0 } else { rounded })
}

fn dot(a: Vec3, b: Vec3) -> f64 {
    a.x * b.x + a.y * b.y + a.z * b.z
}

fn unit(v: Vec3) -> Option<Vec3> {
    let len = dot(v, v).sqrt();
    if !len.is_finite() || len < 1e-12 {
        return None;
    }
    Some(Vec3::new(v.x / len, v.y / len, v.z / len))
}

/// Unit direction whose first component that survives rounding is positive.
fn canonical_direction(v: Vec3, precision: u32) -> Option<Vec3> {
    let u = unit(v)?;
    for c in u.to_array() {
        let r = round_to(c, precision)?;
        if r > 0.0 {
            return Some(u);
        }
        if r < 0.0 {
            return Some(Vec3::new(-u.x, -u.y, -u.z));
        }
    }
    Some(u)
}

fn closest_to_origin(point: Vec3, unit_axis: Vec3) -> Vec3 {
    let t = dot(point, unit_axis);
    Vec3::new(
        point.x - t * unit_axis.x,
        point.y - t * unit_axis.y,
        point.z - t * unit_axis.z,
    )
}
