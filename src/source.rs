use crate::bounds::Aabb;
use crate::error::{ KernelError, Result };
use crate::random::RandomStream;
use crate::ray::Ray;
use crate::tuple::Tuple4D;

/// Collimated sunlight aimed at a target box.
///
/// Rays start on a rectangle perpendicular to the sun, placed upstream of the
/// target and just large enough that its shadow covers the whole box. Origins
/// are uniform over that rectangle; directions all point away from the sun.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SunSource {
    sun: Tuple4D,
    a: Tuple4D,
    b: Tuple4D,
    a_range: (f64, f64),
    b_range: (f64, f64),
    height: f64,
}

impl SunSource {
    /// `sun` is the world direction towards the sun.
    pub fn new(sun: &Tuple4D, target: &Aabb) -> Result<SunSource> {
        let sun = sun.try_normalize().ok_or_else(|| KernelError::InvalidInput(
            format!("sun direction {:?} cannot be normalized", sun.xyz())
        ))?;

        let helper = if sun.y.abs() < 0.9 {
            Tuple4D::vector(0.0, 1.0, 0.0)
        } else {
            Tuple4D::vector(1.0, 0.0, 0.0)
        };

        let a = helper.cross(&sun).normalize();
        let b = sun.cross(&a);

        let mut a_range = (f64::INFINITY, f64::NEG_INFINITY);
        let mut b_range = (f64::INFINITY, f64::NEG_INFINITY);
        let mut height = f64::NEG_INFINITY;

        for corner in target.corners().iter() {
            let p = Tuple4D::vector(corner.x, corner.y, corner.z);
            let (pa, pb, ps) = (p.dot(&a), p.dot(&b), p.dot(&sun));

            a_range = (a_range.0.min(pa), a_range.1.max(pa));
            b_range = (b_range.0.min(pb), b_range.1.max(pb));
            height = height.max(ps);
        }

        // Start a little upstream of the box so no ray begins inside it.
        let margin = 1.0 + target.diagonal().magnitude();

        Ok(SunSource { sun, a, b, a_range, b_range, height: height + margin })
    }

    /// Unit vector towards the sun.
    pub fn sun(&self) -> Tuple4D {
        self.sun
    }

    /// Area of the emitting rectangle.
    pub fn area(&self) -> f64 {
        (self.a_range.1 - self.a_range.0) * (self.b_range.1 - self.b_range.0)
    }

    /// Draws one sun ray.
    pub fn generate(&self, rng: &mut RandomStream) -> Ray {
        let u = rng.uniform_range(self.a_range.0, self.a_range.1);
        let v = rng.uniform_range(self.b_range.0, self.b_range.1);

        let offset = self.sun * self.height + self.a * u + self.b * v;
        let origin = Tuple4D::point(offset.x, offset.y, offset.z);

        Ray::new(origin, -self.sun)
    }
}

/* Tests */

#[test]
fn zenith_sun_covers_box_from_above() {
    let target = Aabb::new(Tuple4D::point(-0.5, 0.0, -0.5), Tuple4D::point(0.5, 0.5, 0.5));
    let source = SunSource::new(&Tuple4D::vector(0.0, 2.0, 0.0), &target).unwrap();
    let mut rng = RandomStream::new(4);

    approx::assert_abs_diff_eq!(source.area(), 1.0, epsilon = 1e-12);

    for _ in 0..500 {
        let ray = source.generate(&mut rng);

        assert_eq!(ray.direction, Tuple4D::vector(0.0, -1.0, 0.0));
        assert!(ray.origin.y > target.max.y);
        assert!(ray.origin.x.abs() <= 0.5 && ray.origin.z.abs() <= 0.5);
    }
}

#[test]
fn oblique_rays_cross_the_box_shadow() {
    let target = Aabb::new(Tuple4D::point(-1.0, -1.0, -1.0), Tuple4D::point(1.0, 1.0, 1.0));
    let sun = Tuple4D::vector(1.0, 1.0, 0.0).normalize();
    let source = SunSource::new(&sun, &target).unwrap();
    let mut rng = RandomStream::new(8);

    for _ in 0..200 {
        let ray = source.generate(&mut rng);

        // Origin is upstream of every corner.
        for corner in target.corners().iter() {
            assert!((ray.origin - *corner).dot(&sun) > 0.0);
        }

        // The ray passes through the plane y = 0 inside the projected box.
        let t = -ray.origin.y / ray.direction.y;
        let p = ray.position(t);
        assert!(p.z.abs() <= 1.0 + 1e-9);
    }
}

#[test]
fn degenerate_sun_is_rejected() {
    let target = Aabb::new(Tuple4D::point(0.0, 0.0, 0.0), Tuple4D::point(1.0, 1.0, 1.0));
    assert!(SunSource::new(&Tuple4D::vector(0.0, 0.0, 0.0), &target).is_err());
}
