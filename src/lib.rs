//! Monte-Carlo ray tracing kernel for concentrated-solar optics.
//!
//! Sun rays are generated over a scene, intersected with curved reflector
//! surfaces, and either absorbed or reflected with a randomised micro-facet
//! normal. Trackers re-orient their elements towards the sun between batches.

pub mod consts;
pub mod error;

pub mod tuple;
pub mod matrix;
pub mod transform;
pub mod ray;
pub mod quadratic;
pub mod bounds;

pub mod geometry;
pub mod shape;
pub mod intersect;

pub mod property_table;
pub mod material;
pub mod random;

pub mod tracker;
pub mod parameters;
pub mod registry;

pub mod source;
pub mod parallel;
pub mod scene;

use consts::FEQ_EPSILON;

pub fn feq(left: f64, right: f64) -> bool {
    (left - right).abs() < FEQ_EPSILON
}
