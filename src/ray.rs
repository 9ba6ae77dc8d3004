use crate::error::{ KernelError, Result };
use crate::tuple::Tuple4D;
use crate::matrix::Matrix4D;

/// A ray with a parametric validity interval.
///
/// The direction is stored as given and never renormalized by the ray
/// itself. Transforming a ray into a scaled frame therefore keeps `t`
/// meaningful: `position(t)` names the same physical point before and after.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Ray {
    pub origin: Tuple4D,
    pub direction: Tuple4D,
    pub tmin: f64,
    pub tmax: f64,
}

impl Default for Ray {
    fn default() -> Ray {
        Ray::new(Tuple4D::point(0.0, 0.0, 0.0), Tuple4D::vector(0.0, 0.0, 1.0))
    }
}

impl Ray {
    /// Creates a ray valid over `[0, +inf]`.
    ///
    /// `origin` is forced to be a point and `direction` a vector.
    pub fn new(origin: Tuple4D, direction: Tuple4D) -> Ray {
        Ray::with_range(origin, direction, 0.0, f64::INFINITY)
    }

    pub fn with_range(mut origin: Tuple4D, mut direction: Tuple4D, tmin: f64, tmax: f64)
        -> Ray {
        origin.w = 1.0;
        direction.w = 0.0;

        Ray { origin, direction, tmin, tmax }
    }

    pub fn position(&self, t: f64) -> Tuple4D {
        self.origin + (t * self.direction)
    }

    /// Transforms origin and direction, keeping the interval.
    pub fn transform(&self, m: &Matrix4D) -> Ray {
        Ray {
            origin: *m * self.origin,
            direction: *m * self.direction,
            tmin: self.tmin,
            tmax: self.tmax,
        }
    }

    /// Checks the ray can be traced: finite origin, finite non-zero direction
    /// and an ordered, non-NaN interval.
    pub fn validate(&self) -> Result<()> {
        if !self.origin.is_finite() {
            return Err(KernelError::InvalidInput("ray origin is not finite".to_string()));
        }

        if !self.direction.is_finite() {
            return Err(KernelError::InvalidInput("ray direction is not finite".to_string()));
        }

        if self.direction.try_normalize().is_none() {
            return Err(KernelError::InvalidInput("ray direction has zero length".to_string()));
        }

        if self.tmin.is_nan() || self.tmax.is_nan() || self.tmin > self.tmax {
            return Err(KernelError::InvalidInput(format!(
                "ray interval [{}, {}] is empty", self.tmin, self.tmax
            )));
        }

        Ok(())
    }
}

/* Tests */

#[test]
fn ray_position() {
    let r = Ray::new(
        Tuple4D::point(2.0, 3.0, 4.0),
        Tuple4D::vector(1.0, 0.0, 0.0)
    );

    assert_eq!(r.position(0.0), Tuple4D::point(2.0, 3.0, 4.0));
    assert_eq!(r.position(-1.0), Tuple4D::point(1.0, 3.0, 4.0));
    assert_eq!(r.position(2.5), Tuple4D::point(4.5, 3.0, 4.0));
}

#[test]
fn scaling_keeps_parameter_meaning() {
    let r = Ray::with_range(
        Tuple4D::point(1.0, 2.0, 3.0),
        Tuple4D::vector(0.0, 1.0, 0.0),
        0.5, 10.0
    );
    let m = Matrix4D::scaling(2.0, 3.0, 4.0);
    let t = r.transform(&m);

    assert_eq!(t.origin, Tuple4D::point(2.0, 6.0, 12.0));
    assert_eq!(t.direction, Tuple4D::vector(0.0, 3.0, 0.0));
    assert_eq!((t.tmin, t.tmax), (0.5, 10.0));
    assert_eq!(t.position(2.0), m * r.position(2.0));
}

#[test]
fn constructor_fixes_w_components() {
    let r = Ray::new(Tuple4D::vector(1.0, 1.0, 1.0), Tuple4D::point(0.0, 0.0, 1.0));
    assert!(r.origin.is_point());
    assert!(r.direction.is_vector());
}

#[test]
fn zero_direction_is_invalid() {
    let r = Ray::new(Tuple4D::point(0.0, 0.0, 0.0), Tuple4D::vector(0.0, 0.0, 0.0));
    assert!(matches!(r.validate(), Err(KernelError::InvalidInput(_))));
}

#[test]
fn non_finite_ray_is_invalid() {
    let r = Ray::new(Tuple4D::point(0.0, f64::NAN, 0.0), Tuple4D::vector(0.0, 1.0, 0.0));
    assert!(r.validate().is_err());

    let r = Ray::new(Tuple4D::point(0.0, 0.0, 0.0), Tuple4D::vector(f64::INFINITY, 1.0, 0.0));
    assert!(r.validate().is_err());
}

#[test]
fn inverted_interval_is_invalid() {
    let r = Ray::with_range(
        Tuple4D::point(0.0, 0.0, 0.0),
        Tuple4D::vector(0.0, 1.0, 0.0),
        2.0, 1.0
    );
    assert!(r.validate().is_err());
    assert!(Ray::default().validate().is_ok());
}
