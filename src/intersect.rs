use crate::error::Result;
use crate::ray::Ray;
use crate::shape::{ Shape, Hit };
use crate::transform::Transform;

/// Intersects a world-space ray with a shape placed by `object_to_world`.
///
/// This is where rays are validated; an unusable ray fails with
/// `InvalidInput` before any shape sees it. The ray is moved into the
/// shape's frame with the cached inverse, intersected there, and the hit
/// (point and differential geometry) is moved back to world space. Since the
/// direction is not renormalized, `t` is the same in both frames.
pub fn intersect_world(shape: &Shape, object_to_world: &Transform, ray: &Ray)
    -> Result<Option<Hit>> {
    ray.validate()?;

    let local_ray = object_to_world.inverse().apply_ray(ray);

    Ok(shape.intersect(&local_ray).map(|hit| Hit {
        t: hit.t,
        point: object_to_world.apply_point(hit.point),
        dg: hit.dg.map(|dg| dg.transformed(object_to_world)),
    }))
}

/// Visibility-only variant of `intersect_world`.
pub fn intersect_world_bool(shape: &Shape, object_to_world: &Transform, ray: &Ray)
    -> Result<bool> {
    ray.validate()?;

    let local_ray = object_to_world.inverse().apply_ray(ray);
    Ok(shape.intersect_bool(&local_ray))
}

/* Tests */

#[cfg(test)]
use crate::tuple::Tuple4D;
#[cfg(test)]
use crate::matrix::Matrix4D;
#[cfg(test)]
use crate::shape::SphericalRectangle;

#[cfg(test)]
fn patch() -> Shape {
    SphericalRectangle::new(0.75, 1.0, 1.0).unwrap().into()
}

#[test]
fn identity_placement_matches_local_intersection() {
    let ray = Ray::new(Tuple4D::point(0.2, 2.0, 0.1), Tuple4D::vector(0.0, -1.0, 0.0));
    let local = patch().intersect(&ray);
    let world = intersect_world(&patch(), &Transform::identity(), &ray).unwrap();

    assert_eq!(local, world);
}

#[test]
fn translated_patch_moves_hit() {
    let placement = Transform::new(Matrix4D::translation(10.0, 0.0, -3.0)).unwrap();
    let ray = Ray::new(Tuple4D::point(10.0, 2.0, -3.0), Tuple4D::vector(0.0, -1.0, 0.0));
    let hit = intersect_world(&patch(), &placement, &ray).unwrap().unwrap();

    assert_eq!(hit.point, Tuple4D::point(10.0, 0.0, -3.0));
    approx::assert_abs_diff_eq!(hit.t, 2.0, epsilon = 1e-12);
    assert!(intersect_world_bool(&patch(), &placement, &ray).unwrap());

    let miss = Ray::new(Tuple4D::point(0.0, 2.0, 0.0), Tuple4D::vector(0.0, -1.0, 0.0));
    assert!(intersect_world(&patch(), &placement, &miss).unwrap().is_none());
}

#[test]
fn rotated_patch_rotates_normal() {
    // A quarter turn about x maps local y onto world z.
    let placement = Transform::new(Matrix4D::rotation_x(std::f64::consts::FRAC_PI_2)).unwrap();
    let ray = Ray::new(Tuple4D::point(0.0, 0.0, 2.0), Tuple4D::vector(0.0, 0.0, -1.0));
    let hit = intersect_world(&patch(), &placement, &ray).unwrap().unwrap();
    let dg = hit.dg.unwrap();

    assert_eq!(hit.point, Tuple4D::point(0.0, 0.0, 0.0));
    assert_eq!(dg.normal, Tuple4D::vector(0.0, 0.0, -1.0));
    assert!(!dg.front_side);
}

#[test]
fn scaled_placement_keeps_ray_parameter() {
    let placement = Transform::new(Matrix4D::scaling(2.0, 2.0, 2.0)).unwrap();
    let ray = Ray::new(Tuple4D::point(0.0, 4.0, 0.0), Tuple4D::vector(0.0, -1.0, 0.0));
    let hit = intersect_world(&patch(), &placement, &ray).unwrap().unwrap();

    approx::assert_abs_diff_eq!(hit.t, 4.0, epsilon = 1e-12);
    assert_eq!(ray.position(hit.t), hit.point);
}

#[test]
fn invalid_ray_is_rejected_at_boundary() {
    use crate::error::KernelError;

    let ray = Ray::new(Tuple4D::point(0.0, 2.0, 0.0), Tuple4D::vector(0.0, 0.0, 0.0));
    let result = intersect_world(&patch(), &Transform::identity(), &ray);
    assert!(matches!(result, Err(KernelError::InvalidInput(_))));

    let ray = Ray::new(Tuple4D::point(0.0, 2.0, 0.0), Tuple4D::vector(f64::NAN, -1.0, 0.0));
    assert!(intersect_world_bool(&patch(), &Transform::identity(), &ray).is_err());
}
