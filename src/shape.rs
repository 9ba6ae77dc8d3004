use std::f64::consts::PI;

use crate::consts::{ INTERSECTION_TOLERANCE, DEGENERATE_LENGTH };
use crate::error::{ KernelError, Result };
use crate::tuple::Tuple4D;
use crate::ray::Ray;
use crate::bounds::Aabb;
use crate::quadratic::solve_quadratic;
use crate::geometry::{ DifferentialGeometry, SurfaceDerivatives };
use crate::parameters::ParameterList;

/// A ray/surface hit in the shape's own frame.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Hit {
    pub t: f64,
    pub point: Tuple4D,

    /// Present when the caller asked for full geometry.
    pub dg: Option<DifferentialGeometry>,
}

/// A rectangular patch cut from a sphere.
///
/// The sphere has its centre at `(0, radius, 0)`, so the patch is the lower
/// cap: its vertex touches the local origin and its corners rise to `ymax`.
/// Seen from above, the patch covers `|x| <= widthX / 2`, `|z| <= widthZ / 2`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SphericalRectangle {
    pub radius: f64,
    pub width_x: f64,
    pub width_z: f64,
}

impl SphericalRectangle {
    pub const TYPE_NAME: &'static str = "ShapeSphericalRectangle";

    pub fn new(radius: f64, width_x: f64, width_z: f64) -> Result<SphericalRectangle> {
        if !(radius > 0.0 && width_x > 0.0 && width_z > 0.0)
            || !(radius.is_finite() && width_x.is_finite() && width_z.is_finite()) {
            return Err(KernelError::InvalidConfiguration(format!(
                "spherical rectangle needs positive finite sizes, got radius {} widths {} x {}",
                radius, width_x, width_z
            )));
        }

        let half_diagonal2 = (width_x / 2.0).powi(2) + (width_z / 2.0).powi(2);
        if radius * radius <= half_diagonal2 {
            return Err(KernelError::InvalidConfiguration(format!(
                "spherical rectangle {} x {} does not fit on a sphere of radius {}",
                width_x, width_z, radius
            )));
        }

        Ok(SphericalRectangle { radius, width_x, width_z })
    }

    pub fn from_parameters(params: &ParameterList) -> Result<SphericalRectangle> {
        SphericalRectangle::new(
            params.real("radius", 0.75)?,
            params.real("widthX", 1.0)?,
            params.real("widthZ", 1.0)?,
        )
    }

    /// Height of the patch corners.
    pub fn ymax(&self) -> f64 {
        let (hx, hz) = (self.width_x / 2.0, self.width_z / 2.0);
        self.radius - (self.radius * self.radius - hx * hx - hz * hz).sqrt()
    }

    pub fn bounding_box(&self) -> Aabb {
        let (hx, hz) = (self.width_x / 2.0, self.width_z / 2.0);
        Aabb::new(Tuple4D::point(-hx, 0.0, -hz), Tuple4D::point(hx, self.ymax(), hz))
    }

    /// Surface point for parametric coordinates in `[0, 1]^2`.
    pub fn point_at(&self, u: f64, v: f64) -> Tuple4D {
        let x = (u - 0.5) * self.width_x;
        let z = (v - 0.5) * self.width_z;
        let y = self.radius - (self.radius * self.radius - x * x - z * z).sqrt();

        Tuple4D::point(x, y, z)
    }

    fn find_root(&self, ray: &Ray) -> Option<(f64, Tuple4D)> {
        let (o, d) = (&ray.origin, &ray.direction);

        // x^2 + y^2 + z^2 - 2 y R = 0
        let a = d.dot(d);
        let b = 2.0 * (o.dot(d) - d.y * self.radius);
        let c = o.dot(o) - 2.0 * o.y * self.radius;

        let roots = solve_quadratic(a, b, c)?;
        let (hx, hz, ymax) = (self.width_x / 2.0, self.width_z / 2.0, self.ymax());

        select_root(ray, roots, |p| {
            p.x >= -hx && p.x <= hx
                && p.z >= -hz && p.z <= hz
                && p.y >= 0.0 && p.y <= ymax
        })
    }

    fn geometry(&self, point: Tuple4D, direction: &Tuple4D) -> DifferentialGeometry {
        let (wx, wz) = (self.width_x, self.width_z);
        let u = point.x / wx + 0.5;
        let v = point.z / wz + 0.5;

        let x = (u - 0.5) * wx;
        let z = (v - 0.5) * wz;
        let aux = self.radius * self.radius - x * x - z * z;
        let root = aux.sqrt();
        let root3 = aux * root;

        let derivatives = SurfaceDerivatives {
            dpdu: Tuple4D::vector(wx, x * wx / root, 0.0),
            dpdv: Tuple4D::vector(0.0, z * wz / root, wz),
            d2pduu: Tuple4D::vector(0.0, wx * wx / root + x * x * wx * wx / root3, 0.0),
            d2pduv: Tuple4D::vector(0.0, x * z * wx * wz / root3, 0.0),
            d2pdvv: Tuple4D::vector(0.0, wz * wz / root + z * z * wz * wz / root3, 0.0),
        };

        derivatives.build(point, u, v, direction)
    }
}

/// A hyperbolic reflector (one sheet of a hyperboloid of revolution).
///
/// Vertex at the local origin, axis along `+y`. With `c` half the distance
/// between the foci, `a = c - focusLength` and `b^2 = c^2 - a^2`, the surface
/// is `b^2 y^2 + 2 a b^2 y - a^2 (x^2 + z^2) = 0`, clipped to `y >= 0` and
/// to the reflector diameter. Parametrised by `u = r / rmax` and
/// `v = phi / 2pi` around the axis.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Hyperboloid {
    pub focus_length: f64,
    pub distance_two_focus: f64,
    pub max_diameter: f64,
}

impl Hyperboloid {
    pub const TYPE_NAME: &'static str = "ShapeHyperboloid";

    pub fn new(focus_length: f64, distance_two_focus: f64, max_diameter: f64)
        -> Result<Hyperboloid> {
        let finite = focus_length.is_finite()
            && distance_two_focus.is_finite()
            && max_diameter.is_finite();

        if !finite || !(focus_length > 0.0) || !(focus_length < distance_two_focus / 2.0) {
            return Err(KernelError::InvalidConfiguration(format!(
                "hyperboloid focus length {} must lie strictly between 0 and half the focal distance {}",
                focus_length, distance_two_focus
            )));
        }

        if !(max_diameter > 0.0) {
            return Err(KernelError::InvalidConfiguration(format!(
                "hyperboloid diameter must be positive, got {}", max_diameter
            )));
        }

        Ok(Hyperboloid { focus_length, distance_two_focus, max_diameter })
    }

    pub fn from_parameters(params: &ParameterList) -> Result<Hyperboloid> {
        Hyperboloid::new(
            params.real("focusLength", 1.0)?,
            params.real("distanceTwoFocus", 5.0)?,
            params.real("reflectorMaxDiameter", 2.0)?,
        )
    }

    fn a(&self) -> f64 {
        self.distance_two_focus / 2.0 - self.focus_length
    }

    fn b2(&self) -> f64 {
        let c = self.distance_two_focus / 2.0;
        let a = self.a();
        c * c - a * a
    }

    fn rmax(&self) -> f64 {
        self.max_diameter / 2.0
    }

    /// Surface height at distance `r` from the axis.
    fn height(&self, r: f64) -> f64 {
        self.a() * ((1.0 + r * r / self.b2()).sqrt() - 1.0)
    }

    pub fn ymax(&self) -> f64 {
        self.height(self.rmax())
    }

    pub fn bounding_box(&self) -> Aabb {
        let r = self.rmax();
        Aabb::new(Tuple4D::point(-r, 0.0, -r), Tuple4D::point(r, self.ymax(), r))
    }

    pub fn point_at(&self, u: f64, v: f64) -> Tuple4D {
        let r = u * self.rmax();
        let (sin_phi, cos_phi) = (2.0 * PI * v).sin_cos();

        Tuple4D::point(r * cos_phi, self.height(r), r * sin_phi)
    }

    fn find_root(&self, ray: &Ray) -> Option<(f64, Tuple4D)> {
        let (o, d) = (&ray.origin, &ray.direction);
        let (a, b2) = (self.a(), self.b2());
        let a2 = a * a;

        let qa = b2 * d.y * d.y - a2 * (d.x * d.x + d.z * d.z);
        let qb = 2.0 * (b2 * o.y * d.y + a * b2 * d.y - a2 * (o.x * d.x + o.z * d.z));
        let qc = b2 * o.y * o.y + 2.0 * a * b2 * o.y - a2 * (o.x * o.x + o.z * o.z);

        let roots = solve_quadratic(qa, qb, qc)?;
        let rmax2 = self.rmax() * self.rmax();

        select_root(ray, roots, |p| p.y >= 0.0 && p.x * p.x + p.z * p.z <= rmax2)
    }

    fn geometry(&self, point: Tuple4D, direction: &Tuple4D) -> DifferentialGeometry {
        let (a, b2, rmax) = (self.a(), self.b2(), self.rmax());

        let mut phi = point.z.atan2(point.x);
        if phi < 0.0 {
            phi += 2.0 * PI;
        }

        let r_hit = (point.x * point.x + point.z * point.z).sqrt();
        let u = r_hit / rmax;
        let v = phi / (2.0 * PI);

        // The tangent frame collapses on the axis; evaluate just beside it.
        let r = r_hit.max(rmax * DEGENERATE_LENGTH.sqrt());
        let (sin_phi, cos_phi) = phi.sin_cos();
        let s = 1.0 + r * r / b2;
        let slope = a * r / (b2 * s.sqrt());
        let curvature = (a / b2) / (s * s.sqrt());

        let derivatives = SurfaceDerivatives {
            dpdu: Tuple4D::vector(rmax * cos_phi, rmax * slope, rmax * sin_phi),
            dpdv: Tuple4D::vector(-2.0 * PI * r * sin_phi, 0.0, 2.0 * PI * r * cos_phi),
            d2pduu: Tuple4D::vector(0.0, rmax * rmax * curvature, 0.0),
            d2pduv: Tuple4D::vector(-2.0 * PI * rmax * sin_phi, 0.0, 2.0 * PI * rmax * cos_phi),
            d2pdvv: Tuple4D::vector(
                -4.0 * PI * PI * r * cos_phi,
                0.0,
                -4.0 * PI * PI * r * sin_phi
            ),
        };

        derivatives.build(point, u, v, direction)
    }
}

/// Picks the first admissible root of a quadric.
///
/// Roots behind `tmin + INTERSECTION_TOLERANCE` are skipped so a ray leaving
/// a surface does not hit it again at its own origin; the first root beyond
/// `tmax` ends the search. A root that fails `inside` (the patch clip) hands
/// over to the next one.
fn select_root<F>(ray: &Ray, (t0, t1): (f64, f64), inside: F) -> Option<(f64, Tuple4D)>
    where F: Fn(&Tuple4D) -> bool {
    if t0 > ray.tmax || t1 < ray.tmin {
        return None;
    }

    for t in [t0, t1] {
        if t > ray.tmax {
            return None;
        }

        if t - ray.tmin < INTERSECTION_TOLERANCE {
            continue;
        }

        let p = ray.position(t);
        if inside(&p) {
            return Some((t, p));
        }
    }

    None
}

/// The closed set of analytic surfaces the kernel can trace.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Shape {
    SphericalRectangle(SphericalRectangle),
    Hyperboloid(Hyperboloid),
}

impl Shape {
    pub fn type_name(&self) -> &'static str {
        match self {
            Shape::SphericalRectangle(_) => SphericalRectangle::TYPE_NAME,
            Shape::Hyperboloid(_) => Hyperboloid::TYPE_NAME,
        }
    }

    /// Local-frame bounding box.
    pub fn bounding_box(&self) -> Aabb {
        match self {
            Shape::SphericalRectangle(s) => s.bounding_box(),
            Shape::Hyperboloid(s) => s.bounding_box(),
        }
    }

    /// Intersects a local-frame ray, computing full differential geometry.
    ///
    /// The ray is trusted: `intersect::intersect_world` validates it.
    pub fn intersect(&self, ray: &Ray) -> Option<Hit> {
        let (t, point) = self.find_root(ray)?;

        let dg = match self {
            Shape::SphericalRectangle(s) => s.geometry(point, &ray.direction),
            Shape::Hyperboloid(s) => s.geometry(point, &ray.direction),
        };

        Some(Hit { t, point, dg: Some(dg) })
    }

    /// Visibility-only variant of `intersect`.
    pub fn intersect_bool(&self, ray: &Ray) -> bool {
        self.find_root(ray).is_some()
    }

    fn find_root(&self, ray: &Ray) -> Option<(f64, Tuple4D)> {
        match self {
            Shape::SphericalRectangle(s) => s.find_root(ray),
            Shape::Hyperboloid(s) => s.find_root(ray),
        }
    }
}

impl From<SphericalRectangle> for Shape {
    fn from(s: SphericalRectangle) -> Shape {
        Shape::SphericalRectangle(s)
    }
}

impl From<Hyperboloid> for Shape {
    fn from(s: Hyperboloid) -> Shape {
        Shape::Hyperboloid(s)
    }
}

/* Tests */

#[cfg(test)]
fn default_patch() -> Shape {
    SphericalRectangle::new(0.75, 1.0, 1.0).unwrap().into()
}

#[cfg(test)]
fn down_from(x: f64, z: f64) -> Ray {
    Ray::new(Tuple4D::point(x, 2.0, z), Tuple4D::vector(0.0, -1.0, 0.0))
}

#[test]
fn patch_height_cap() {
    let s = SphericalRectangle::new(0.75, 1.0, 1.0).unwrap();
    approx::assert_abs_diff_eq!(s.ymax(), 0.5, epsilon = 1e-12);
}

#[test]
fn central_ray_hits_patch_vertex() {
    // The near side of the sphere (y = 1.5) is above the cap and clipped;
    // the second root lands on the vertex.
    let hit = default_patch().intersect(&down_from(0.0, 0.0)).unwrap();

    approx::assert_abs_diff_eq!(hit.t, 2.0, epsilon = 1e-12);
    assert_eq!(hit.point, Tuple4D::point(0.0, 0.0, 0.0));

    let dg = hit.dg.unwrap();
    assert_eq!((dg.u, dg.v), (0.5, 0.5));
    assert_eq!(dg.normal, Tuple4D::vector(0.0, -1.0, 0.0));
    assert!(!dg.front_side);
}

#[test]
fn diverging_ray_misses() {
    let d = Tuple4D::vector(1.0, 1.0, 1.0).normalize();
    let ray = Ray::new(Tuple4D::point(2.0, 2.0, 2.0), d);

    assert!(default_patch().intersect(&ray).is_none());
    assert!(!default_patch().intersect_bool(&ray));
}

#[test]
fn hits_near_corner_rise_toward_cap() {
    let s = SphericalRectangle::new(0.75, 1.0, 1.0).unwrap();
    let hit = Shape::from(s).intersect(&down_from(0.45, 0.45)).unwrap();
    let expected_y = 0.75 - (0.75f64 * 0.75 - 2.0 * 0.45 * 0.45).sqrt();

    approx::assert_abs_diff_eq!(hit.point.y, expected_y, epsilon = 1e-12);
    assert!(hit.point.y < s.ymax() && hit.point.y > 0.3);

    let corner = Shape::from(s).intersect(&down_from(0.4999999, 0.4999999)).unwrap();
    approx::assert_abs_diff_eq!(corner.point.y, s.ymax(), epsilon = 1e-6);
}

#[test]
fn rays_outside_rectangle_miss() {
    assert!(default_patch().intersect(&down_from(0.6, 0.0)).is_none());
    assert!(default_patch().intersect(&down_from(0.0, -0.51)).is_none());
}

#[test]
fn hit_respects_interval() {
    let mut ray = down_from(0.0, 0.0);
    ray.tmax = 1.9;
    assert!(default_patch().intersect(&ray).is_none());

    ray.tmax = 2.1;
    assert!(default_patch().intersect_bool(&ray));
}

#[test]
fn origin_on_surface_is_not_hit_again() {
    let up = Ray::new(Tuple4D::point(0.0, 0.0, 0.0), Tuple4D::vector(0.0, 1.0, 0.0));
    let down = Ray::new(Tuple4D::point(0.0, 0.0, 0.0), Tuple4D::vector(0.0, -1.0, 0.0));

    assert!(default_patch().intersect(&up).is_none());
    assert!(default_patch().intersect(&down).is_none());
}

#[test]
fn ray_from_below_hits_front_side() {
    let ray = Ray::new(Tuple4D::point(0.1, -1.0, 0.2), Tuple4D::vector(0.0, 1.0, 0.0));
    let dg = default_patch().intersect(&ray).unwrap().dg.unwrap();

    assert!(dg.front_side);
    assert!(dg.oriented_normal().y < 0.0);
}

#[test]
fn patch_bounding_box_contains_hits() {
    let shape = default_patch();
    let bounds = shape.bounding_box();

    for &(x, z) in &[(0.0, 0.0), (0.3, -0.2), (-0.49, 0.49), (0.25, 0.45)] {
        let hit = shape.intersect(&down_from(x, z)).unwrap();
        assert!(bounds.contains(&hit.point, 1e-9));
    }
}

#[test]
fn patch_derivatives_match_finite_differences() {
    let s = SphericalRectangle::new(2.0, 1.5, 1.0).unwrap();
    let (u, v, h) = (0.8, 0.3, 1e-6);

    let p = s.point_at(u, v);
    let ray = Ray::new(Tuple4D::point(p.x, 5.0, p.z), Tuple4D::vector(0.0, -1.0, 0.0));
    let dg = Shape::from(s).intersect(&ray).unwrap().dg.unwrap();

    let dpdu = (s.point_at(u + h, v) - s.point_at(u - h, v)) * (0.5 / h);
    let dpdv = (s.point_at(u, v + h) - s.point_at(u, v - h)) * (0.5 / h);

    approx::assert_abs_diff_eq!(dg.u, u, epsilon = 1e-9);
    approx::assert_abs_diff_eq!(dg.v, v, epsilon = 1e-9);
    approx::assert_abs_diff_eq!(dg.dpdu.y, dpdu.y, epsilon = 1e-6);
    approx::assert_abs_diff_eq!(dg.dpdv.y, dpdv.y, epsilon = 1e-6);
}

#[test]
fn patch_normal_derivatives_are_spherical() {
    // On a sphere the outward normal changes like the position over R.
    let s = SphericalRectangle::new(2.0, 1.5, 1.0).unwrap();
    let ray = Ray::new(Tuple4D::point(0.5, 5.0, -0.3), Tuple4D::vector(0.0, -1.0, 0.0));
    let dg = Shape::from(s).intersect(&ray).unwrap().dg.unwrap();

    assert_eq!(dg.dndu, dg.dpdu * 0.5);
    assert_eq!(dg.dndv, dg.dpdv * 0.5);
}

#[test]
fn impossible_patches_are_rejected() {
    assert!(SphericalRectangle::new(0.5, 1.0, 1.0).is_err());
    assert!(SphericalRectangle::new(0.75, -1.0, 1.0).is_err());
    assert!(SphericalRectangle::new(f64::NAN, 1.0, 1.0).is_err());
    assert!(SphericalRectangle::from_parameters(&ParameterList::new()).is_ok());
}

#[cfg(test)]
fn default_hyperboloid() -> Hyperboloid {
    // c = 2.5, a = 1.5, b^2 = 4
    Hyperboloid::new(1.0, 5.0, 2.0).unwrap()
}

#[test]
fn axial_ray_hits_hyperboloid_vertex() {
    let shape = Shape::from(default_hyperboloid());
    let ray = Ray::new(Tuple4D::point(0.0, 5.0, 0.0), Tuple4D::vector(0.0, -1.0, 0.0));
    let hit = shape.intersect(&ray).unwrap();

    // The lower sheet (y = -3, t = 8) is clipped.
    approx::assert_abs_diff_eq!(hit.t, 5.0, epsilon = 1e-9);
    assert_eq!(hit.point, Tuple4D::point(0.0, 0.0, 0.0));

    let dg = hit.dg.unwrap();
    assert_eq!(dg.normal, Tuple4D::vector(0.0, -1.0, 0.0));
    assert!(!dg.front_side);
}

#[test]
fn off_axis_hyperboloid_hit() {
    let shape = Shape::from(default_hyperboloid());
    let ray = Ray::new(Tuple4D::point(0.3, 5.0, 0.4), Tuple4D::vector(0.0, -1.0, 0.0));
    let hit = shape.intersect(&ray).unwrap();

    approx::assert_abs_diff_eq!(hit.point.y, 1.5 * (1.0625f64.sqrt() - 1.0), epsilon = 1e-9);
    assert!(shape.bounding_box().contains(&hit.point, 1e-9));

    let wide = Ray::new(Tuple4D::point(1.2, 5.0, 0.0), Tuple4D::vector(0.0, -1.0, 0.0));
    assert!(!shape.intersect_bool(&wide));
}

#[test]
fn hyperboloid_derivatives_match_finite_differences() {
    let s = default_hyperboloid();
    let (u, v, h) = (0.6, 0.2, 1e-6);

    let p = s.point_at(u, v);
    let ray = Ray::new(Tuple4D::point(p.x, 5.0, p.z), Tuple4D::vector(0.0, -1.0, 0.0));
    let dg = Shape::from(s).intersect(&ray).unwrap().dg.unwrap();

    let dpdu = (s.point_at(u + h, v) - s.point_at(u - h, v)) * (0.5 / h);
    let dpdv = (s.point_at(u, v + h) - s.point_at(u, v - h)) * (0.5 / h);

    approx::assert_abs_diff_eq!(dg.u, u, epsilon = 1e-9);
    approx::assert_abs_diff_eq!(dg.v, v, epsilon = 1e-9);
    for (analytic, numeric) in [(dg.dpdu, dpdu), (dg.dpdv, dpdv)] {
        approx::assert_abs_diff_eq!(analytic.x, numeric.x, epsilon = 1e-5);
        approx::assert_abs_diff_eq!(analytic.y, numeric.y, epsilon = 1e-5);
        approx::assert_abs_diff_eq!(analytic.z, numeric.z, epsilon = 1e-5);
    }
}

#[test]
fn hyperboloid_normal_derivative_matches_finite_difference() {
    let s = default_hyperboloid();
    let (u, v, h) = (0.5, 0.1, 1e-5);
    let down = |u: f64, v: f64| {
        let p = s.point_at(u, v);
        Ray::new(Tuple4D::point(p.x, 5.0, p.z), Tuple4D::vector(0.0, -1.0, 0.0))
    };
    let normal = |u: f64, v: f64| Shape::from(s).intersect(&down(u, v)).unwrap().dg.unwrap().normal;

    let dg = Shape::from(s).intersect(&down(u, v)).unwrap().dg.unwrap();
    let dndu = (normal(u + h, v) - normal(u - h, v)) * (0.5 / h);
    let dndv = (normal(u, v + h) - normal(u, v - h)) * (0.5 / h);

    for (analytic, numeric) in [(dg.dndu, dndu), (dg.dndv, dndv)] {
        approx::assert_abs_diff_eq!(analytic.x, numeric.x, epsilon = 1e-4);
        approx::assert_abs_diff_eq!(analytic.y, numeric.y, epsilon = 1e-4);
        approx::assert_abs_diff_eq!(analytic.z, numeric.z, epsilon = 1e-4);
    }
}

#[test]
fn invalid_hyperboloids_are_rejected() {
    assert!(Hyperboloid::new(3.0, 5.0, 2.0).is_err());
    assert!(Hyperboloid::new(0.0, 5.0, 2.0).is_err());
    assert!(Hyperboloid::new(1.0, 5.0, 0.0).is_err());
    assert_eq!(Shape::from(default_hyperboloid()).type_name(), "ShapeHyperboloid");
}
