use std::ops::{ Add, Sub, Neg, Mul };

use crate::feq;
use crate::consts::DEGENERATE_LENGTH;

/// A homogeneous 3D coordinate.
///
/// Points carry `w == 1.0` and vectors carry `w == 0.0`, so a translation in a
/// `Matrix4D` moves points but leaves directions, tangents and normals alone.
/// Equality is approximate (see `feq`).
#[derive(Debug, Default, Copy, Clone, PartialOrd)]
pub struct Tuple4D {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64
}

impl PartialEq for Tuple4D {
    fn eq(&self, other: &Tuple4D) -> bool {
        feq(self.x, other.x) &&
            feq(self.y, other.y) &&
            feq(self.z, other.z) &&
            feq(self.w, other.w)
    }
}

impl Tuple4D {
    pub fn point(x: f64, y: f64, z: f64) -> Tuple4D {
        Tuple4D { x, y, z, w: 1.0 }
    }

    pub fn vector(x: f64, y: f64, z: f64) -> Tuple4D {
        Tuple4D { x, y, z, w: 0.0 }
    }

    /// Builds a point from a `[x, y, z]` triple (configuration files use these).
    pub fn point_from(xyz: [f64; 3]) -> Tuple4D {
        Tuple4D::point(xyz[0], xyz[1], xyz[2])
    }

    /// Builds a vector from a `[x, y, z]` triple.
    pub fn vector_from(xyz: [f64; 3]) -> Tuple4D {
        Tuple4D::vector(xyz[0], xyz[1], xyz[2])
    }

    pub fn xyz(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    pub fn is_point(&self) -> bool {
        self.w == 1.0
    }

    pub fn is_vector(&self) -> bool {
        self.w == 0.0
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Length of the spatial part. `w` is ignored so points and vectors agree.
    pub fn magnitude(&self) -> f64 {
        self.dot(self).sqrt()
    }

    /// Scales a vector to unit length.
    ///
    /// The caller guarantees a non-degenerate vector; see `try_normalize` for
    /// the guarded variant.
    pub fn normalize(&self) -> Tuple4D {
        let inv = 1.0 / self.magnitude();
        Tuple4D::vector(self.x * inv, self.y * inv, self.z * inv)
    }

    /// Scales a vector to unit length, or returns `None` when it is too short
    /// (or not finite) to have a direction.
    pub fn try_normalize(&self) -> Option<Tuple4D> {
        let mag = self.magnitude();
        if !mag.is_finite() || mag < DEGENERATE_LENGTH {
            return None;
        }

        Some(Tuple4D::vector(self.x / mag, self.y / mag, self.z / mag))
    }

    /// Spatial dot product (`w` does not participate).
    pub fn dot(&self, other: &Tuple4D) -> f64 {
        self.x * other.x
            + self.y * other.y
            + self.z * other.z
    }

    pub fn cross(&self, other: &Tuple4D) -> Tuple4D {
        Tuple4D {
            x: self.y * other.z - self.z * other.y,
            y: self.z * other.x - self.x * other.z,
            z: self.x * other.y - self.y * other.x,
            w: 0.0
        }
    }

    /// Reflects a direction about a unit normal: `d - 2 (n . d) n`.
    pub fn reflect(&self, normal: &Tuple4D) -> Tuple4D {
        *self - (*normal * 2.0 * self.dot(normal))
    }
}

impl Add for Tuple4D {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            x: self.x + other.x,
            y: self.y + other.y,
            z: self.z + other.z,
            w: self.w + other.w
        }
    }
}

impl Sub for Tuple4D {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self {
            x: self.x - other.x,
            y: self.y - other.y,
            z: self.z - other.z,
            w: self.w - other.w
        }
    }
}

impl Neg for Tuple4D {
    type Output = Self;

    /// Negates the spatial part; a negated vector is still a vector.
    fn neg(self) -> Self {
        Self { x: -self.x, y: -self.y, z: -self.z, w: self.w }
    }
}

impl Mul<f64> for Tuple4D {
    type Output = Self;

    fn mul(self, other: f64) -> Self {
        Self {
            x: self.x * other,
            y: self.y * other,
            z: self.z * other,
            w: self.w * other
        }
    }
}

impl Mul<Tuple4D> for f64 {
    type Output = Tuple4D;

    fn mul(self, other: Tuple4D) -> Tuple4D {
        other * self
    }
}

/* Tests */

#[test]
fn point_minus_point_is_vector() {
    let p1 = Tuple4D::point(3.0, 2.0, 1.0);
    let p2 = Tuple4D::point(5.0, 6.0, 7.0);

    let v = p1 - p2;
    assert!(v.is_vector());
    assert_eq!(v, Tuple4D::vector(-2.0, -4.0, -6.0));
}

#[test]
fn point_plus_vector_is_point() {
    let p = Tuple4D::point(0.0, 2.0, 0.0) + Tuple4D::vector(0.0, -1.5, 0.0) * 1.0;
    assert!(p.is_point());
    assert_eq!(p, Tuple4D::point(0.0, 0.5, 0.0));
}

#[test]
fn negating_vector_keeps_it_a_vector() {
    let v = -Tuple4D::vector(1.0, -2.0, 3.0);
    assert!(v.is_vector());
    assert_eq!(v, Tuple4D::vector(-1.0, 2.0, -3.0));
}

#[test]
fn magnitude_ignores_w() {
    let p = Tuple4D::point(1.0, 2.0, 2.0);
    assert_eq!(p.magnitude(), 3.0);
}

#[test]
fn normalize_nonaxial() {
    let v = Tuple4D::vector(1.0, 2.0, 3.0);
    let e = Tuple4D::vector(
        1.0 / f64::sqrt(14.0),
        2.0 / f64::sqrt(14.0),
        3.0 / f64::sqrt(14.0)
    );

    assert_eq!(v.normalize(), e);
    approx::assert_abs_diff_eq!(v.normalize().magnitude(), 1.0, epsilon = 1e-12);
}

#[test]
fn try_normalize_rejects_degenerate_vectors() {
    assert!(Tuple4D::vector(0.0, 0.0, 0.0).try_normalize().is_none());
    assert!(Tuple4D::vector(1e-14, 0.0, 0.0).try_normalize().is_none());
    assert!(Tuple4D::vector(f64::NAN, 0.0, 1.0).try_normalize().is_none());
    assert!(Tuple4D::vector(f64::INFINITY, 0.0, 1.0).try_normalize().is_none());
    assert_eq!(
        Tuple4D::vector(0.0, 4.0, 0.0).try_normalize(),
        Some(Tuple4D::vector(0.0, 1.0, 0.0))
    );
}

#[test]
fn cross_follows_right_hand_rule() {
    let x = Tuple4D::vector(1.0, 0.0, 0.0);
    let y = Tuple4D::vector(0.0, 1.0, 0.0);

    assert_eq!(x.cross(&y), Tuple4D::vector(0.0, 0.0, 1.0));
    assert_eq!(y.cross(&x), Tuple4D::vector(0.0, 0.0, -1.0));
}

#[test]
fn reflect_at_45_degrees() {
    let v = Tuple4D::vector(1.0, -1.0, 0.0);
    let n = Tuple4D::vector(0.0, 1.0, 0.0);

    assert_eq!(v.reflect(&n), Tuple4D::vector(1.0, 1.0, 0.0));
}

#[test]
fn reflect_off_slanted_surface() {
    let v = Tuple4D::vector(0.0, -1.0, 0.0);
    let n = Tuple4D::vector(2.0f64.sqrt() / 2.0, 2.0f64.sqrt() / 2.0, 0.0);

    assert_eq!(v.reflect(&n), Tuple4D::vector(1.0, 0.0, 0.0));
}
