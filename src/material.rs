use std::f64::consts::TAU;

use log::warn;
use serde::{ Serialize, Deserialize };

use crate::consts::SLOPE_ERROR_SCALE;
use crate::error::{ KernelError, Result };
use crate::geometry::DifferentialGeometry;
use crate::matrix::Matrix4D;
use crate::property_table::PropertyTable;
use crate::random::RandomStream;
use crate::ray::Ray;
use crate::tuple::Tuple4D;

/// How micro-facet normals spread around the surface normal.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Distribution {
    /// Uniform in a cone of half-angle sigma.
    Circular,

    /// Independent normal slope errors with standard deviation sigma.
    #[default]
    Gaussian,
}

/// Reflective behaviour of one face of a surface.
///
/// A side without a table reflects nothing.
#[derive(Clone, Debug, PartialEq)]
pub struct Side {
    pub enabled: bool,
    reflectivity: Option<PropertyTable>,
}

impl Default for Side {
    fn default() -> Side {
        Side { enabled: true, reflectivity: None }
    }
}

impl Side {
    pub fn reflectivity(&self) -> Option<&PropertyTable> {
        self.reflectivity.as_ref()
    }

    /// Reflectivity at incidence angle `angle`.
    pub fn reflectivity_at(&self, angle: f64) -> f64 {
        self.reflectivity.as_ref().map_or(0.0, |table| table.lookup(angle))
    }
}

/// A specular reflector with angle-dependent reflectivity and slope error.
#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    front: Side,
    back: Side,

    /// Slope error in milliradians.
    sigma_slope: f64,
    distribution: Distribution,
}

impl Default for Material {
    fn default() -> Material {
        Material {
            front: Side::default(),
            back: Side::default(),
            sigma_slope: 2.0,
            distribution: Distribution::Gaussian,
        }
    }
}

impl Material {
    pub fn front(&self) -> &Side {
        &self.front
    }

    pub fn back(&self) -> &Side {
        &self.back
    }

    pub fn sigma_slope(&self) -> f64 {
        self.sigma_slope
    }

    pub fn distribution(&self) -> Distribution {
        self.distribution
    }

    pub fn set_front_enabled(&mut self, enabled: bool) {
        self.front.enabled = enabled;
    }

    pub fn set_back_enabled(&mut self, enabled: bool) {
        self.back.enabled = enabled;
    }

    /// Replaces the front reflectivity table.
    ///
    /// An invalid table leaves the front side opaque and returns the error.
    pub fn set_front_table(&mut self, points: &[(f64, f64)]) -> Result<()> {
        Material::set_table(&mut self.front, "front", points)
    }

    /// Replaces the back reflectivity table; see `set_front_table`.
    pub fn set_back_table(&mut self, points: &[(f64, f64)]) -> Result<()> {
        Material::set_table(&mut self.back, "back", points)
    }

    fn set_table(side: &mut Side, name: &str, points: &[(f64, f64)]) -> Result<()> {
        match PropertyTable::new(points) {
            Ok(table) => {
                side.reflectivity = Some(table);
                Ok(())
            },
            Err(e) => {
                warn!("{} reflectivity table rejected, side is opaque: {}", name, e);
                side.reflectivity = None;
                Err(e)
            }
        }
    }

    /// Sets the slope error, in milliradians.
    pub fn set_sigma_slope(&mut self, sigma_slope: f64) -> Result<()> {
        if !sigma_slope.is_finite() || sigma_slope < 0.0 {
            return Err(KernelError::InvalidConfiguration(format!(
                "slope error must be a non-negative number of milliradians, got {}", sigma_slope
            )));
        }

        self.sigma_slope = sigma_slope;
        Ok(())
    }

    pub fn set_distribution(&mut self, distribution: Distribution) {
        self.distribution = distribution;
    }

    /// Decides the fate of a ray hitting this material.
    ///
    /// Returns the reflected ray, or `None` when the ray is absorbed: either
    /// the side it hit is disabled, or a uniform draw falls at or above the
    /// side's reflectivity for the incidence angle. Reflection is specular
    /// about the surface normal perturbed by the slope error.
    pub fn scatter(&self, incident: &Ray, dg: &DifferentialGeometry, rng: &mut RandomStream)
        -> Option<Ray> {
        let side = if dg.front_side { &self.front } else { &self.back };
        if !side.enabled {
            return None;
        }

        let normal = dg.oriented_normal();
        let direction = incident.direction.try_normalize()?;

        let cos_incidence = (-direction).dot(&normal).clamp(-1.0, 1.0);
        let reflectivity = side.reflectivity_at(cos_incidence.acos());

        if rng.uniform() >= reflectivity {
            return None;
        }

        let facet = self.facet_normal(normal, dg, rng);
        let reflected = direction.reflect(&facet).try_normalize()?;

        Some(Ray::new(dg.point, reflected))
    }

    /// Samples a micro-facet normal around `normal`.
    ///
    /// The perturbation is drawn in the frame `(s, r, t)` with `r` the normal
    /// and `s`, `t` the normalized surface tangents, then mapped back.
    fn facet_normal(&self, normal: Tuple4D, dg: &DifferentialGeometry, rng: &mut RandomStream)
        -> Tuple4D {
        let sigma = self.sigma_slope * SLOPE_ERROR_SCALE;
        if sigma <= 0.0 {
            return normal;
        }

        let error = match self.distribution {
            Distribution::Circular => {
                let phi = TAU * rng.uniform();
                let theta = sigma * rng.uniform();

                Tuple4D::vector(theta.sin() * phi.sin(), theta.cos(), theta.sin() * phi.cos())
            },
            Distribution::Gaussian => {
                let x = sigma * rng.standard_normal();
                let z = sigma * rng.standard_normal();

                Tuple4D::vector(x, 1.0, z)
            },
        };

        let (s, t) = match (dg.dpdu.try_normalize(), dg.dpdv.try_normalize()) {
            (Some(s), Some(t)) => (s, t),
            _ => return normal,
        };

        (Matrix4D::from_columns(s, normal, t) * error)
            .try_normalize()
            .unwrap_or(normal)
    }
}

/* Tests */

#[cfg(test)]
use crate::geometry::SurfaceDerivatives;

/// A flat facet at the origin whose geometric normal is +y.
#[cfg(test)]
fn flat_hit(direction: &Tuple4D) -> DifferentialGeometry {
    let zero = Tuple4D::vector(0.0, 0.0, 0.0);
    SurfaceDerivatives {
        dpdu: Tuple4D::vector(0.0, 0.0, 1.0),
        dpdv: Tuple4D::vector(1.0, 0.0, 0.0),
        d2pduu: zero,
        d2pduv: zero,
        d2pdvv: zero,
    }.build(Tuple4D::point(0.0, 0.0, 0.0), 0.5, 0.5, direction)
}

#[cfg(test)]
fn mirror(reflectivity: f64, sigma_slope: f64) -> Material {
    let mut m = Material::default();
    m.set_front_table(&[(0.0, reflectivity), (std::f64::consts::FRAC_PI_2, reflectivity)]).unwrap();
    m.set_back_table(&[(0.0, reflectivity), (std::f64::consts::FRAC_PI_2, reflectivity)]).unwrap();
    m.set_sigma_slope(sigma_slope).unwrap();
    m
}

#[test]
fn perfect_mirror_obeys_law_of_reflection() {
    let d = Tuple4D::vector(1.0, -1.0, 0.5).normalize();
    let incident = Ray::new(Tuple4D::point(-1.0, 1.0, -0.5), d);
    let dg = flat_hit(&d);
    let mut rng = RandomStream::new(1);

    let out = mirror(1.0, 0.0).scatter(&incident, &dg, &mut rng).unwrap();
    let n = dg.oriented_normal();

    assert_eq!(out.origin, dg.point);
    approx::assert_abs_diff_eq!(out.direction.magnitude(), 1.0, epsilon = 1e-9);
    approx::assert_abs_diff_eq!(out.direction.dot(&n), -d.dot(&n), epsilon = 1e-12);
    assert_eq!(out.direction, Tuple4D::vector(1.0, 1.0, 0.5).normalize());
}

#[test]
fn back_side_reflects_about_flipped_normal() {
    let d = Tuple4D::vector(0.0, 1.0, 0.0);
    let incident = Ray::new(Tuple4D::point(0.0, -1.0, 0.0), d);
    let dg = flat_hit(&d);
    assert!(!dg.front_side);

    let out = mirror(1.0, 0.0).scatter(&incident, &dg, &mut RandomStream::new(1)).unwrap();
    assert_eq!(out.direction, Tuple4D::vector(0.0, -1.0, 0.0));
}

#[test]
fn disabled_sides_absorb() {
    let down = Tuple4D::vector(0.0, -1.0, 0.0);
    let up = Tuple4D::vector(0.0, 1.0, 0.0);
    let mut rng = RandomStream::new(5);

    let mut m = mirror(1.0, 0.0);
    m.set_front_enabled(false);
    assert!(m.scatter(&Ray::new(Tuple4D::point(0.0, 1.0, 0.0), down), &flat_hit(&down), &mut rng).is_none());
    assert!(m.scatter(&Ray::new(Tuple4D::point(0.0, -1.0, 0.0), up), &flat_hit(&up), &mut rng).is_some());

    let mut m = mirror(1.0, 0.0);
    m.set_back_enabled(false);
    assert!(m.scatter(&Ray::new(Tuple4D::point(0.0, 1.0, 0.0), down), &flat_hit(&down), &mut rng).is_some());
    assert!(m.scatter(&Ray::new(Tuple4D::point(0.0, -1.0, 0.0), up), &flat_hit(&up), &mut rng).is_none());
}

#[test]
fn absorption_rate_matches_reflectivity() {
    let rho = 0.7;
    let n = 10000;
    let d = Tuple4D::vector(0.3, -1.0, 0.0).normalize();
    let incident = Ray::new(Tuple4D::point(-0.3, 1.0, 0.0), d);
    let dg = flat_hit(&d);
    let m = mirror(rho, 2.0);
    let mut rng = RandomStream::new(2024);

    let reflected = (0..n).filter(|_| m.scatter(&incident, &dg, &mut rng).is_some()).count();
    let fraction = reflected as f64 / n as f64;
    let standard_error = (rho * (1.0 - rho) / n as f64).sqrt();

    assert!((fraction - rho).abs() < 3.0 * standard_error);
}

#[test]
fn reflectivity_depends_on_incidence_angle() {
    // Falls linearly from 1 at normal incidence to 0 at grazing; 60 degrees
    // off the normal leaves a third.
    let mut m = Material::default();
    m.set_front_table(&[(0.0, 1.0), (std::f64::consts::FRAC_PI_2, 0.0)]).unwrap();
    m.set_back_table(&[(0.0, 1.0), (std::f64::consts::FRAC_PI_2, 0.0)]).unwrap();

    let d = Tuple4D::vector(3.0f64.sqrt(), 1.0, 0.0).normalize();
    let dg = flat_hit(&d);
    let incident = Ray::new(Tuple4D::point(-1.0, -1.0, 0.0), d);
    let mut rng = RandomStream::new(11);

    let n = 10000;
    let reflected = (0..n).filter(|_| m.scatter(&incident, &dg, &mut rng).is_some()).count();
    approx::assert_abs_diff_eq!(reflected as f64 / n as f64, 1.0 / 3.0, epsilon = 0.02);
}

#[test]
fn circular_slope_error_stays_in_cone() {
    let mut m = mirror(1.0, 2.0);
    m.set_distribution(Distribution::Circular);

    let d = Tuple4D::vector(0.0, -1.0, 0.0);
    let dg = flat_hit(&d);
    let incident = Ray::new(Tuple4D::point(0.0, 1.0, 0.0), d);
    let ideal = Tuple4D::vector(0.0, 1.0, 0.0);
    let mut rng = RandomStream::new(9);
    let mut spread = 0.0f64;

    for _ in 0..2000 {
        let out = m.scatter(&incident, &dg, &mut rng).unwrap();
        let deviation = out.direction.dot(&ideal).clamp(-1.0, 1.0).acos();

        // Tilting the normal by theta turns the reflection by 2 theta.
        assert!(deviation <= 2.0 * 0.002 + 1e-6);
        spread = spread.max(deviation);
    }

    assert!(spread > 0.002);
}

#[test]
fn gaussian_slope_error_spreads_reflections() {
    let m = mirror(1.0, 2.0);
    let d = Tuple4D::vector(0.0, -1.0, 0.0);
    let dg = flat_hit(&d);
    let incident = Ray::new(Tuple4D::point(0.0, 1.0, 0.0), d);
    let mut rng = RandomStream::new(13);

    let n = 5000;
    let xs: Vec<f64> = (0..n)
        .map(|_| m.scatter(&incident, &dg, &mut rng).unwrap().direction.x)
        .collect();
    let rms = (xs.iter().map(|x| x * x).sum::<f64>() / n as f64).sqrt();

    // Reflection doubles the facet tilt, so the spread is about 2 sigma.
    approx::assert_relative_eq!(rms, 2.0 * 0.002, max_relative = 0.1);
}

#[test]
fn invalid_table_makes_side_opaque() {
    let mut m = mirror(1.0, 0.0);
    let result = m.set_front_table(&[(0.0, 1.0)]);

    assert!(matches!(result, Err(KernelError::InvalidConfiguration(_))));
    assert!(m.front().reflectivity().is_none());

    let d = Tuple4D::vector(0.0, 1.0, 0.0);
    let hit = flat_hit(&-d);
    let ray = Ray::new(Tuple4D::point(0.0, 1.0, 0.0), -d);
    assert!(m.scatter(&ray, &hit, &mut RandomStream::new(1)).is_none());
}

#[test]
fn default_material_is_opaque_until_configured() {
    let m = Material::default();
    let d = Tuple4D::vector(0.0, -1.0, 0.0);

    assert_eq!(m.sigma_slope(), 2.0);
    assert_eq!(m.distribution(), Distribution::Gaussian);
    assert!(m.front().enabled && m.back().enabled);
    assert!(m.scatter(&Ray::new(Tuple4D::point(0.0, 1.0, 0.0), d), &flat_hit(&d), &mut RandomStream::new(1)).is_none());
}

#[test]
fn negative_slope_error_is_rejected() {
    let mut m = Material::default();
    assert!(m.set_sigma_slope(-1.0).is_err());
    assert!(m.set_sigma_slope(f64::NAN).is_err());
    assert_eq!(m.sigma_slope(), 2.0);
}
