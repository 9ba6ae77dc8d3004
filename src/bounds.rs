use crate::tuple::Tuple4D;
use crate::transform::Transform;

/// An axis-aligned bounding box.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Aabb {
    pub min: Tuple4D,
    pub max: Tuple4D,
}

impl Aabb {
    /// Creates a box from two opposite corners, in any order.
    pub fn new(a: Tuple4D, b: Tuple4D) -> Aabb {
        Aabb {
            min: Tuple4D::point(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)),
            max: Tuple4D::point(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)),
        }
    }

    /// Inclusive containment test, padded by `tolerance` on every side.
    pub fn contains(&self, p: &Tuple4D, tolerance: f64) -> bool {
        p.x >= self.min.x - tolerance && p.x <= self.max.x + tolerance
            && p.y >= self.min.y - tolerance && p.y <= self.max.y + tolerance
            && p.z >= self.min.z - tolerance && p.z <= self.max.z + tolerance
    }

    pub fn diagonal(&self) -> Tuple4D {
        self.max - self.min
    }

    pub fn corners(&self) -> [Tuple4D; 8] {
        let (lo, hi) = (self.min, self.max);
        [
            Tuple4D::point(lo.x, lo.y, lo.z),
            Tuple4D::point(hi.x, lo.y, lo.z),
            Tuple4D::point(lo.x, hi.y, lo.z),
            Tuple4D::point(hi.x, hi.y, lo.z),
            Tuple4D::point(lo.x, lo.y, hi.z),
            Tuple4D::point(hi.x, lo.y, hi.z),
            Tuple4D::point(lo.x, hi.y, hi.z),
            Tuple4D::point(hi.x, hi.y, hi.z),
        ]
    }

    /// The box enclosing this box after `transform` (e.g. object to world).
    pub fn transformed(&self, transform: &Transform) -> Aabb {
        let corners = self.corners();
        let first = transform.apply_point(corners[0]);

        corners.iter().skip(1).fold(Aabb::new(first, first), |acc, c| {
            let p = transform.apply_point(*c);
            Aabb::new(
                Tuple4D::point(acc.min.x.min(p.x), acc.min.y.min(p.y), acc.min.z.min(p.z)),
                Tuple4D::point(acc.max.x.max(p.x), acc.max.y.max(p.y), acc.max.z.max(p.z)),
            )
        })
    }
}

/* Tests */

#[test]
fn corners_in_any_order() {
    let b = Aabb::new(Tuple4D::point(1.0, -1.0, 2.0), Tuple4D::point(-1.0, 1.0, 0.0));

    assert_eq!(b.min, Tuple4D::point(-1.0, -1.0, 0.0));
    assert_eq!(b.max, Tuple4D::point(1.0, 1.0, 2.0));
}

#[test]
fn containment_is_inclusive() {
    let b = Aabb::new(Tuple4D::point(0.0, 0.0, 0.0), Tuple4D::point(1.0, 1.0, 1.0));

    assert!(b.contains(&Tuple4D::point(1.0, 0.0, 0.5), 0.0));
    assert!(!b.contains(&Tuple4D::point(1.01, 0.0, 0.5), 0.0));
    assert!(b.contains(&Tuple4D::point(1.01, 0.0, 0.5), 0.02));
}

#[test]
fn rotated_box_grows() {
    use crate::matrix::Matrix4D;

    let b = Aabb::new(Tuple4D::point(-1.0, 0.0, -1.0), Tuple4D::point(1.0, 0.0, 1.0));
    let quarter = Transform::new(Matrix4D::rotation_z(std::f64::consts::FRAC_PI_2)).unwrap();
    let r = b.transformed(&quarter);

    assert_eq!(r.min, Tuple4D::point(0.0, -1.0, -1.0));
    assert_eq!(r.max, Tuple4D::point(0.0, 1.0, 1.0));
}
