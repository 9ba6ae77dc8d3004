use crate::consts::DEGENERATE_LENGTH;
use crate::tuple::Tuple4D;
use crate::transform::Transform;

/// Local surface description at a ray hit.
///
/// `dpdu` and `dpdv` are the (unnormalized) parametric tangents;
/// `normal` is `normalize(dpdu x dpdv)`, the geometric normal. It is *not*
/// flipped toward the ray: `front_side` records which side the ray came from
/// instead, and consumers (materials) orient the normal from that flag.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DifferentialGeometry {
    pub point: Tuple4D,
    pub dpdu: Tuple4D,
    pub dpdv: Tuple4D,
    pub dndu: Tuple4D,
    pub dndv: Tuple4D,
    pub normal: Tuple4D,
    pub u: f64,
    pub v: f64,
    pub front_side: bool,
}

impl DifferentialGeometry {
    /// The normal facing the side the ray arrived on.
    pub fn oriented_normal(&self) -> Tuple4D {
        if self.front_side { self.normal } else { -self.normal }
    }

    /// Moves the geometry into another frame (typically object to world).
    ///
    /// Points and tangents use the transform directly, normals and their
    /// derivatives the inverse transpose. `front_side` is frame independent.
    pub fn transformed(&self, transform: &Transform) -> DifferentialGeometry {
        let normal = transform.apply_normal(self.normal)
            .try_normalize()
            .unwrap_or(self.normal);

        DifferentialGeometry {
            point: transform.apply_point(self.point),
            dpdu: transform.apply_vector(self.dpdu),
            dpdv: transform.apply_vector(self.dpdv),
            dndu: transform.apply_normal(self.dndu),
            dndv: transform.apply_normal(self.dndv),
            normal,
            ..*self
        }
    }
}

/// First and second parametric derivatives of a surface at one point.
///
/// Shapes fill this in from their closed-form parametrisation; `build`
/// turns it into a `DifferentialGeometry`.
#[derive(Copy, Clone, Debug)]
pub struct SurfaceDerivatives {
    pub dpdu: Tuple4D,
    pub dpdv: Tuple4D,
    pub d2pduu: Tuple4D,
    pub d2pduv: Tuple4D,
    pub d2pdvv: Tuple4D,
}

impl SurfaceDerivatives {
    /// Geometric normal `normalize(dpdu x dpdv)`, if the tangents span a plane.
    pub fn normal(&self) -> Option<Tuple4D> {
        self.dpdu.cross(&self.dpdv).try_normalize()
    }

    /// Normal derivatives `(dndu, dndv)` from the Weingarten equations.
    ///
    /// With first fundamental form `E, F, G` and second fundamental form
    /// `e, f, g` (second derivatives projected on the normal):
    ///
    /// ```text
    /// dndu = ((fF - eG) dpdu + (eF - fE) dpdv) / (EG - F^2)
    /// dndv = ((gF - fG) dpdu + (fF - gE) dpdv) / (EG - F^2)
    /// ```
    ///
    /// Degenerate tangents (`EG - F^2 ~ 0`) give zero derivatives.
    pub fn normal_derivatives(&self) -> (Tuple4D, Tuple4D) {
        let zero = Tuple4D::vector(0.0, 0.0, 0.0);
        let n = match self.normal() {
            Some(n) => n,
            None => return (zero, zero),
        };

        let big_e = self.dpdu.dot(&self.dpdu);
        let big_f = self.dpdu.dot(&self.dpdv);
        let big_g = self.dpdv.dot(&self.dpdv);

        let e = n.dot(&self.d2pduu);
        let f = n.dot(&self.d2pduv);
        let g = n.dot(&self.d2pdvv);

        let det = big_e * big_g - big_f * big_f;
        if det.abs() < DEGENERATE_LENGTH {
            return (zero, zero);
        }

        let inv = 1.0 / det;
        let dndu = self.dpdu * ((f * big_f - e * big_g) * inv)
            + self.dpdv * ((e * big_f - f * big_e) * inv);
        let dndv = self.dpdu * ((g * big_f - f * big_g) * inv)
            + self.dpdv * ((f * big_f - g * big_e) * inv);

        (dndu, dndv)
    }

    /// Assembles the full hit description.
    ///
    /// The hit is on the front side unless the ray travels along the
    /// geometric normal (`dot(normal, direction) > 0`).
    pub fn build(&self, point: Tuple4D, u: f64, v: f64, direction: &Tuple4D)
        -> DifferentialGeometry {
        let normal = self.normal().unwrap_or_else(|| Tuple4D::vector(0.0, 1.0, 0.0));
        let (dndu, dndv) = self.normal_derivatives();

        DifferentialGeometry {
            point,
            dpdu: self.dpdu,
            dpdv: self.dpdv,
            dndu,
            dndv,
            normal,
            u,
            v,
            front_side: normal.dot(direction) <= 0.0,
        }
    }
}

/* Tests */

#[cfg(test)]
fn sphere_derivatives(radius: f64, theta: f64, phi: f64) -> SurfaceDerivatives {
    // Sphere p = r (sin t cos p, sin t sin p, cos t) with u = theta, v = phi,
    // so dpdu x dpdv points outward.
    let (st, ct) = theta.sin_cos();
    let (sp, cp) = phi.sin_cos();

    SurfaceDerivatives {
        dpdu: Tuple4D::vector(radius * ct * cp, radius * ct * sp, -radius * st),
        dpdv: Tuple4D::vector(-radius * st * sp, radius * st * cp, 0.0),
        d2pduu: Tuple4D::vector(-radius * st * cp, -radius * st * sp, -radius * ct),
        d2pduv: Tuple4D::vector(-radius * ct * sp, radius * ct * cp, 0.0),
        d2pdvv: Tuple4D::vector(-radius * st * cp, -radius * st * sp, 0.0),
    }
}

#[test]
fn sphere_shape_operator_is_isotropic() {
    // On a sphere of radius r, dn/du = dp/du / r for the outward unit normal.
    let r = 2.0;
    let d = sphere_derivatives(r, 1.0, 0.3);
    let n = d.normal().unwrap();
    let p = Tuple4D::vector(1.0f64.sin() * 0.3f64.cos(), 1.0f64.sin() * 0.3f64.sin(), 1.0f64.cos());

    approx::assert_abs_diff_eq!(n.dot(&p), 1.0, epsilon = 1e-12);

    let (dndu, dndv) = d.normal_derivatives();
    assert_eq!(dndu, d.dpdu * (1.0 / r));
    assert_eq!(dndv, d.dpdv * (1.0 / r));
}

#[test]
fn plane_has_zero_normal_derivatives() {
    let zero = Tuple4D::vector(0.0, 0.0, 0.0);
    let d = SurfaceDerivatives {
        dpdu: Tuple4D::vector(2.0, 0.0, 0.0),
        dpdv: Tuple4D::vector(0.0, 0.0, 3.0),
        d2pduu: zero,
        d2pduv: zero,
        d2pdvv: zero,
    };

    let (dndu, dndv) = d.normal_derivatives();
    assert_eq!(dndu, zero);
    assert_eq!(dndv, zero);
    assert_eq!(d.normal(), Some(Tuple4D::vector(0.0, -1.0, 0.0)));
}

#[test]
fn degenerate_tangents_do_not_divide_by_zero() {
    let d = SurfaceDerivatives {
        dpdu: Tuple4D::vector(1.0, 0.0, 0.0),
        dpdv: Tuple4D::vector(2.0, 0.0, 0.0),
        d2pduu: Tuple4D::vector(0.0, 1.0, 0.0),
        d2pduv: Tuple4D::vector(0.0, 1.0, 0.0),
        d2pdvv: Tuple4D::vector(0.0, 1.0, 0.0),
    };

    let (dndu, dndv) = d.normal_derivatives();
    assert!(dndu.is_finite() && dndv.is_finite());
}

#[test]
fn front_side_opposes_ray_direction() {
    let zero = Tuple4D::vector(0.0, 0.0, 0.0);
    let d = SurfaceDerivatives {
        dpdu: Tuple4D::vector(1.0, 0.0, 0.0),
        dpdv: Tuple4D::vector(0.0, 0.0, 1.0),
        d2pduu: zero,
        d2pduv: zero,
        d2pdvv: zero,
    };
    // Geometric normal is -y.
    let p = Tuple4D::point(0.0, 0.0, 0.0);

    let from_below = d.build(p, 0.5, 0.5, &Tuple4D::vector(0.0, 1.0, 0.0));
    assert!(from_below.front_side);
    assert_eq!(from_below.oriented_normal(), Tuple4D::vector(0.0, -1.0, 0.0));

    let from_above = d.build(p, 0.5, 0.5, &Tuple4D::vector(0.0, -1.0, 0.0));
    assert!(!from_above.front_side);
    assert_eq!(from_above.oriented_normal(), Tuple4D::vector(0.0, 1.0, 0.0));
}

#[test]
fn transformed_geometry_rotates_normal() {
    use crate::matrix::Matrix4D;

    let zero = Tuple4D::vector(0.0, 0.0, 0.0);
    let d = SurfaceDerivatives {
        dpdu: Tuple4D::vector(1.0, 0.0, 0.0),
        dpdv: Tuple4D::vector(0.0, 0.0, 1.0),
        d2pduu: zero,
        d2pduv: zero,
        d2pdvv: zero,
    };
    let dg = d.build(Tuple4D::point(0.0, 0.0, 0.0), 0.5, 0.5, &Tuple4D::vector(0.0, -1.0, 0.0));

    let t = Transform::new(
        Matrix4D::translation(0.0, 0.0, 4.0) * Matrix4D::rotation_x(std::f64::consts::FRAC_PI_2)
    ).unwrap();
    let w = dg.transformed(&t);

    assert_eq!(w.point, Tuple4D::point(0.0, 0.0, 4.0));
    assert_eq!(w.normal, Tuple4D::vector(0.0, 0.0, -1.0));
    assert_eq!(w.front_side, dg.front_side);
    approx::assert_abs_diff_eq!(w.normal.dot(&w.dpdu), 0.0, epsilon = 1e-12);
}
