use std::ops::Mul;

use log::debug;

use crate::error::{ KernelError, Result };
use crate::matrix::Matrix4D;
use crate::tuple::Tuple4D;
use crate::ray::Ray;

/// An invertible affine transform with its inverse computed once.
///
/// Used for object-to-world and parent-to-world placements. Shapes intersect
/// in their own frame, so every traced ray goes through `inverse()`; caching
/// it keeps the cofactor expansion out of the hot loop.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Transform {
    matrix: Matrix4D,
    inverse: Matrix4D,
}

impl Default for Transform {
    fn default() -> Transform {
        Transform::identity()
    }
}

impl Transform {
    pub fn identity() -> Transform {
        Transform { matrix: Matrix4D::identity(), inverse: Matrix4D::identity() }
    }

    /// Wraps a matrix, failing with `InvalidConfiguration` if it is singular
    /// or contains non-finite entries.
    pub fn new(matrix: Matrix4D) -> Result<Transform> {
        if !matrix.is_finite() {
            return Err(KernelError::InvalidConfiguration(
                "transform matrix has non-finite entries".to_string()
            ));
        }

        let inverse = matrix.inverse().ok_or_else(|| KernelError::InvalidConfiguration(
            "transform matrix is not invertible".to_string()
        ))?;

        Ok(Transform { matrix, inverse })
    }

    pub fn matrix(&self) -> &Matrix4D {
        &self.matrix
    }

    /// The inverse transform, swapping the cached matrices.
    pub fn inverse(&self) -> Transform {
        Transform { matrix: self.inverse, inverse: self.matrix }
    }

    pub fn apply_point(&self, p: Tuple4D) -> Tuple4D {
        self.matrix * p
    }

    pub fn apply_vector(&self, v: Tuple4D) -> Tuple4D {
        self.matrix * Tuple4D { w: 0.0, ..v }
    }

    /// Transforms a surface normal with the inverse transpose. The result is
    /// not renormalized.
    pub fn apply_normal(&self, n: Tuple4D) -> Tuple4D {
        let mut out = self.inverse.transposition() * Tuple4D { w: 0.0, ..n };
        out.w = 0.0;
        out
    }

    /// Transforms a ray. The direction is not renormalized, so ray parameters
    /// (`t`, `tmin`, `tmax`) mean the same thing in both frames.
    pub fn apply_ray(&self, ray: &Ray) -> Ray {
        ray.transform(&self.matrix)
    }
}

/// Composition: `(a * b)` applies `b` first.
impl Mul<Transform> for Transform {
    type Output = Transform;

    fn mul(self, other: Transform) -> Transform {
        Transform {
            matrix: self.matrix * other.matrix,
            inverse: other.inverse * self.inverse,
        }
    }
}

/// A transform kept in its persisted text form alongside the parsed value.
///
/// The text is what gets stored and shown for editing; the parsed
/// `Transform` is what the kernel reads. Both are replaced together, so a
/// read never re-parses and a failed edit leaves the previous value intact.
#[derive(Clone, Debug)]
pub struct TransformParameter {
    text: String,
    cached: Transform,
}

impl Default for TransformParameter {
    fn default() -> TransformParameter {
        TransformParameter::from_transform(Transform::identity())
    }
}

impl TransformParameter {
    pub fn from_text(text: &str) -> Result<TransformParameter> {
        let matrix: Matrix4D = text.parse()?;
        let cached = Transform::new(matrix)
            .map_err(|e| KernelError::ParseError(e.to_string()))?;

        Ok(TransformParameter { text: text.to_string(), cached })
    }

    pub fn from_transform(transform: Transform) -> TransformParameter {
        TransformParameter { text: transform.matrix().to_string(), cached: transform }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn transform(&self) -> &Transform {
        &self.cached
    }

    /// Replaces the value from user-edited text.
    pub fn set_text(&mut self, text: &str) -> Result<()> {
        *self = TransformParameter::from_text(text)?;
        debug!("transform parameter set to {}", self.text);
        Ok(())
    }

    /// Replaces the value from a computed transform, regenerating the text.
    pub fn set_transform(&mut self, transform: Transform) {
        *self = TransformParameter::from_transform(transform);
    }
}

/* Tests */

#[test]
fn inverse_is_cached_and_consistent() {
    let m = Matrix4D::translation(1.0, 2.0, 3.0) * Matrix4D::rotation_x(0.4);
    let t = Transform::new(m).unwrap();
    let p = Tuple4D::point(-1.0, 0.5, 2.0);

    assert_eq!(t.inverse().apply_point(t.apply_point(p)), p);
    assert_eq!(t.inverse().inverse(), t);
}

#[test]
fn singular_matrix_is_rejected() {
    let err = Transform::new(Matrix4D::scaling(0.0, 1.0, 1.0));
    assert!(matches!(err, Err(KernelError::InvalidConfiguration(_))));
}

#[test]
fn vectors_ignore_translation() {
    let t = Transform::new(Matrix4D::translation(5.0, 5.0, 5.0)).unwrap();
    let v = Tuple4D::vector(0.0, 1.0, 0.0);

    assert_eq!(t.apply_vector(v), v);
}

#[test]
fn normals_stay_perpendicular_under_scaling() {
    let t = Transform::new(Matrix4D::scaling(1.0, 0.5, 1.0)).unwrap();
    let tangent = Tuple4D::vector(1.0, 1.0, 0.0);
    let normal = Tuple4D::vector(1.0, -1.0, 0.0);

    let tangent_w = t.apply_vector(tangent);
    let normal_w = t.apply_normal(normal);
    approx::assert_abs_diff_eq!(tangent_w.dot(&normal_w), 0.0, epsilon = 1e-12);
}

#[test]
fn composition_applies_right_operand_first() {
    let a = Transform::new(Matrix4D::translation(1.0, 0.0, 0.0)).unwrap();
    let b = Transform::new(Matrix4D::scaling(2.0, 2.0, 2.0)).unwrap();
    let p = Tuple4D::point(1.0, 1.0, 1.0);

    assert_eq!((a * b).apply_point(p), Tuple4D::point(3.0, 2.0, 2.0));
    assert_eq!((a * b).inverse().apply_point(Tuple4D::point(3.0, 2.0, 2.0)), p);
}

#[test]
fn parameter_caches_parsed_text() {
    let text = "[ 1.0, 0.0, 0.0, 2.0 ] [ 0.0, 1.0, 0.0, 0.0 ] \
                [ 0.0, 0.0, 1.0, 0.0 ] [ 0.0, 0.0, 0.0, 1.0 ]";
    let param = TransformParameter::from_text(text).unwrap();

    assert_eq!(param.text(), text);
    assert_eq!(
        param.transform().apply_point(Tuple4D::point(0.0, 0.0, 0.0)),
        Tuple4D::point(2.0, 0.0, 0.0)
    );
}

#[test]
fn failed_edit_keeps_previous_value() {
    let mut param = TransformParameter::default();
    let before = param.text().to_string();

    assert!(param.set_text("[ 1.0, 2.0 ]").is_err());
    assert!(param.set_text("[ 0, 0, 0, 0 ] [ 0, 0, 0, 0 ] [ 0, 0, 0, 0 ] [ 0, 0, 0, 0 ]").is_err());
    assert_eq!(param.text(), before);
    assert_eq!(*param.transform(), Transform::identity());
}
