use std::str::FromStr;

use log::debug;

use crate::consts::{ TRACKER_PARALLEL_EPSILON, MATRIX_SNAP_EPSILON };
use crate::error::{ KernelError, Result };
use crate::matrix::Matrix4D;
use crate::parameters::ParameterList;
use crate::transform::{ Transform, TransformParameter };
use crate::tuple::Tuple4D;

/// Frame a heliostat's aiming point is given in.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AimingPointType {
    /// World coordinates.
    Absolute,

    /// Coordinates in the tracker's parent frame.
    Relative,
}

impl FromStr for AimingPointType {
    type Err = KernelError;

    fn from_str(s: &str) -> Result<AimingPointType> {
        match s {
            "Absolute" => Ok(AimingPointType::Absolute),
            "Relative" => Ok(AimingPointType::Relative),
            _ => Err(KernelError::InvalidConfiguration(format!(
                "unknown aiming point type `{}` (expected Absolute or Relative)", s
            ))),
        }
    }
}

/// Which element axis a heliostat keeps in a fixed plane while turning.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RotationType {
    /// Element x stays perpendicular to parent y.
    YX,
    /// Element z stays perpendicular to parent y.
    YZ,
    /// Element z stays perpendicular to parent x.
    XZ,
    /// Element x stays perpendicular to parent z.
    ZX,
}

impl FromStr for RotationType {
    type Err = KernelError;

    fn from_str(s: &str) -> Result<RotationType> {
        match s {
            "YX" => Ok(RotationType::YX),
            "YZ" => Ok(RotationType::YZ),
            "XZ" => Ok(RotationType::XZ),
            "ZX" => Ok(RotationType::ZX),
            _ => Err(KernelError::InvalidConfiguration(format!(
                "unknown rotation type `{}` (expected YX, YZ, XZ or ZX)", s
            ))),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum TrackerKind {
    /// Points the element's y axis at the sun.
    ParabolicDish,

    /// Turns the element's y axis onto the bisector of the sun and the
    /// aiming point, so sunlight reflects onto the target.
    Heliostat {
        aiming_point: Tuple4D,
        aiming_type: AimingPointType,
        rotation: RotationType,
    },
}

/// A sun-tracking group node.
///
/// Holds the node transformation (element frame to parent frame) both as
/// persisted text and as a parsed, cached transform.
#[derive(Clone, Debug)]
pub struct Tracker {
    kind: TrackerKind,
    node_transformation: TransformParameter,
}

impl Tracker {
    pub const PARABOLIC_DISH: &'static str = "TrackerParabolicDish";
    pub const HELIOSTAT: &'static str = "TrackerHeliostat";

    pub fn new(kind: TrackerKind) -> Tracker {
        Tracker { kind, node_transformation: TransformParameter::default() }
    }

    pub fn parabolic_dish() -> Tracker {
        Tracker::new(TrackerKind::ParabolicDish)
    }

    pub fn heliostat(aiming_point: Tuple4D, aiming_type: AimingPointType, rotation: RotationType)
        -> Tracker {
        Tracker::new(TrackerKind::Heliostat {
            aiming_point: Tuple4D::point(aiming_point.x, aiming_point.y, aiming_point.z),
            aiming_type,
            rotation,
        })
    }

    pub fn heliostat_from_parameters(params: &ParameterList) -> Result<Tracker> {
        let aiming_point = Tuple4D::point_from(params.vector("aimingPoint", [0.0, 0.0, 0.0])?);
        let aiming_type = params.text("typeOfAimingPoint", "Absolute")?.parse()?;
        let rotation = params.text("typeOfRotation", "YX")?.parse()?;

        if !aiming_point.is_finite() {
            return Err(KernelError::InvalidConfiguration(
                "heliostat aiming point is not finite".to_string()
            ));
        }

        Ok(Tracker::heliostat(aiming_point, aiming_type, rotation))
    }

    pub fn kind(&self) -> &TrackerKind {
        &self.kind
    }

    pub fn type_name(&self) -> &'static str {
        match self.kind {
            TrackerKind::ParabolicDish => Tracker::PARABOLIC_DISH,
            TrackerKind::Heliostat { .. } => Tracker::HELIOSTAT,
        }
    }

    /// The current node transformation (element frame to parent frame).
    pub fn transform(&self) -> &Transform {
        self.node_transformation.transform()
    }

    /// The persisted form of the node transformation.
    pub fn transformation_text(&self) -> &str {
        self.node_transformation.text()
    }

    /// Replaces the node transformation from edited text. On a parse error
    /// the previous value stays.
    pub fn set_transformation_text(&mut self, text: &str) -> Result<()> {
        self.node_transformation.set_text(text)
    }

    /// Re-orients the element for a new sun position.
    ///
    /// `sun` is the world direction towards the sun, `parent_to_world` places
    /// the tracker's parent. The node transformation is recomputed and
    /// stored; the returned transform is the element's full object-to-world
    /// placement (`parent_to_world * node`).
    ///
    /// When no rotation is defined (sun along the reference axis, or a
    /// degenerate heliostat bisector) the node transformation is the
    /// identity.
    pub fn update_orientation(&mut self, sun: &Tuple4D, parent_to_world: &Transform)
        -> Result<Transform> {
        if !sun.is_finite() || sun.try_normalize().is_none() {
            return Err(KernelError::InvalidInput(format!(
                "sun direction {:?} cannot be normalized", sun.xyz()
            )));
        }

        let to_parent = parent_to_world.inverse();
        let local_sun = to_parent.apply_vector(*sun)
            .try_normalize()
            .ok_or_else(|| KernelError::InvalidInput(
                "sun direction vanishes in the parent frame".to_string()
            ))?;

        let orientation = match self.kind {
            TrackerKind::ParabolicDish => dish_orientation(&local_sun),
            TrackerKind::Heliostat { aiming_point, aiming_type, rotation } => {
                let target = match aiming_type {
                    AimingPointType::Absolute => to_parent.apply_point(aiming_point),
                    AimingPointType::Relative => aiming_point,
                };

                heliostat_orientation(&local_sun, &target, rotation)
            }
        };

        let matrix = orientation
            .unwrap_or_else(Matrix4D::identity)
            .snap_to_zero(MATRIX_SNAP_EPSILON);
        let node = Transform::new(matrix)?;

        self.node_transformation.set_transform(node);
        debug!("{} orientation for sun {:?}: {}", self.type_name(), sun.xyz(), self.transformation_text());

        Ok(*parent_to_world * node)
    }
}

/// Rotation taking the element's y axis onto `sun`, with columns
/// `(t, sun, p)`, or `None` when the sun lies along the y axis.
fn dish_orientation(sun: &Tuple4D) -> Option<Matrix4D> {
    let axis = Tuple4D::vector(0.0, 1.0, 0.0);

    if (1.0 - sun.dot(&axis)).abs() < TRACKER_PARALLEL_EPSILON {
        return None;
    }

    let t = sun.cross(&axis).try_normalize()?;
    let p = t.cross(sun).try_normalize()?;

    Some(Matrix4D::from_columns(t, *sun, p))
}

/// Rotation taking the element's y axis onto the mirror normal that reflects
/// `sun` towards `target` (both in the parent frame, element at the origin).
fn heliostat_orientation(sun: &Tuple4D, target: &Tuple4D, rotation: RotationType)
    -> Option<Matrix4D> {
    let to_target = Tuple4D::vector(target.x, target.y, target.z).try_normalize()?;
    let n = (*sun + to_target).try_normalize()?;

    let x_axis = Tuple4D::vector(1.0, 0.0, 0.0);
    let y_axis = Tuple4D::vector(0.0, 1.0, 0.0);
    let z_axis = Tuple4D::vector(0.0, 0.0, 1.0);

    let (t, p) = match rotation {
        RotationType::YX => {
            let t = n.cross(&y_axis).try_normalize()?;
            (t, t.cross(&n))
        },
        RotationType::YZ => {
            let p = y_axis.cross(&n).try_normalize()?;
            (n.cross(&p), p)
        },
        RotationType::XZ => {
            let p = x_axis.cross(&n).try_normalize()?;
            (n.cross(&p), p)
        },
        RotationType::ZX => {
            let t = n.cross(&z_axis).try_normalize()?;
            (t, t.cross(&n))
        },
    };

    Some(Matrix4D::from_columns(t, n, p))
}

/* Tests */

#[cfg(test)]
fn y_axis() -> Tuple4D {
    Tuple4D::vector(0.0, 1.0, 0.0)
}

#[test]
fn dish_facing_zenith_sun_keeps_identity() {
    let mut dish = Tracker::parabolic_dish();
    let t = dish.update_orientation(&y_axis(), &Transform::identity()).unwrap();

    assert!(t.matrix().is_identity());
    assert!(dish.transform().matrix().is_identity());
    assert_eq!(dish.transformation_text(), Matrix4D::identity().to_string());
}

#[test]
fn dish_facing_nadir_sun_keeps_identity() {
    let mut dish = Tracker::parabolic_dish();
    let t = dish.update_orientation(&Tuple4D::vector(0.0, -1.0, 0.0), &Transform::identity()).unwrap();

    assert!(t.matrix().is_identity());
}

#[test]
fn dish_axis_follows_sun() {
    let mut dish = Tracker::parabolic_dish();

    for sun in [
        Tuple4D::vector(0.0, 0.0, 1.0),
        Tuple4D::vector(0.6, 0.8, 0.0),
        Tuple4D::vector(-0.3, 0.5, 0.4).normalize(),
    ] {
        let t = dish.update_orientation(&sun, &Transform::identity()).unwrap();
        let m = t.matrix();

        assert_eq!(t.apply_vector(y_axis()), sun);
        approx::assert_abs_diff_eq!(m.determinant(), 1.0, epsilon = 1e-9);

        let x = t.apply_vector(Tuple4D::vector(1.0, 0.0, 0.0));
        let z = t.apply_vector(Tuple4D::vector(0.0, 0.0, 1.0));
        approx::assert_abs_diff_eq!(x.dot(&sun), 0.0, epsilon = 1e-12);
        approx::assert_abs_diff_eq!(z.dot(&sun), 0.0, epsilon = 1e-12);
        approx::assert_abs_diff_eq!(x.dot(&z), 0.0, epsilon = 1e-12);
    }
}

#[test]
fn dish_horizon_sun_has_clean_text() {
    let mut dish = Tracker::parabolic_dish();
    dish.update_orientation(&Tuple4D::vector(0.0, 0.0, 1.0), &Transform::identity()).unwrap();

    assert_eq!(
        dish.transformation_text(),
        "[ -1.0, 0.0, 0.0, 0.0 ] [ 0.0, 0.0, 1.0, 0.0 ] [ 0.0, 1.0, 0.0, 0.0 ] [ 0.0, 0.0, 0.0, 1.0 ]"
    );
}

#[test]
fn dish_works_in_parent_frame() {
    use std::f64::consts::FRAC_PI_2;

    // The parent's y axis points along world -x.
    let parent = Transform::new(
        Matrix4D::translation(3.0, 0.0, 1.0) * Matrix4D::rotation_z(FRAC_PI_2)
    ).unwrap();
    let mut dish = Tracker::parabolic_dish();

    let sun = Tuple4D::vector(-1.0, 0.0, 0.0);
    let t = dish.update_orientation(&sun, &parent).unwrap();
    assert!(dish.transform().matrix().is_identity());
    assert_eq!(t, parent);

    let sun = Tuple4D::vector(-0.6, 0.0, 0.8);
    let t = dish.update_orientation(&sun, &parent).unwrap();
    assert_eq!(t.apply_vector(y_axis()), sun);
}

#[test]
fn invalid_sun_is_rejected() {
    let mut dish = Tracker::parabolic_dish();

    assert!(dish.update_orientation(&Tuple4D::vector(0.0, 0.0, 0.0), &Transform::identity()).is_err());
    assert!(dish.update_orientation(&Tuple4D::vector(f64::NAN, 1.0, 0.0), &Transform::identity()).is_err());
}

#[test]
fn edited_transformation_text() {
    let mut dish = Tracker::parabolic_dish();
    let text = "[ 1.0, 0.0, 0.0, 0.0 ] [ 0.0, 1.0, 0.0, 2.5 ] [ 0.0, 0.0, 1.0, 0.0 ] [ 0.0, 0.0, 0.0, 1.0 ]";

    dish.set_transformation_text(text).unwrap();
    assert_eq!(dish.transformation_text(), text);
    assert_eq!(dish.transform().apply_point(Tuple4D::point(0.0, 0.0, 0.0)), Tuple4D::point(0.0, 2.5, 0.0));

    assert!(matches!(dish.set_transformation_text("[ 1.0, x ]"), Err(KernelError::ParseError(_))));
    assert_eq!(dish.transformation_text(), text);
}

#[test]
fn heliostat_reflects_sun_onto_target() {
    let sun = Tuple4D::vector(0.2, 0.9, -0.3).normalize();
    let target = Tuple4D::point(-20.0, 30.0, 10.0);

    for rotation in [RotationType::YX, RotationType::YZ, RotationType::XZ, RotationType::ZX] {
        let mut h = Tracker::heliostat(target, AimingPointType::Relative, rotation);
        let t = h.update_orientation(&sun, &Transform::identity()).unwrap();

        let n = t.apply_vector(y_axis());
        let reflected = (-sun).reflect(&n);
        let to_target = (target - Tuple4D::point(0.0, 0.0, 0.0)).normalize();
        assert_eq!(reflected, to_target);
        approx::assert_abs_diff_eq!(t.matrix().determinant(), 1.0, epsilon = 1e-9);

        let x = t.apply_vector(Tuple4D::vector(1.0, 0.0, 0.0));
        let z = t.apply_vector(Tuple4D::vector(0.0, 0.0, 1.0));
        match rotation {
            RotationType::YX => approx::assert_abs_diff_eq!(x.y, 0.0, epsilon = 1e-12),
            RotationType::YZ => approx::assert_abs_diff_eq!(z.y, 0.0, epsilon = 1e-12),
            RotationType::XZ => approx::assert_abs_diff_eq!(z.x, 0.0, epsilon = 1e-12),
            RotationType::ZX => approx::assert_abs_diff_eq!(x.z, 0.0, epsilon = 1e-12),
        }
    }
}

#[test]
fn absolute_and_relative_aiming_agree() {
    let parent = Transform::new(Matrix4D::translation(0.0, 0.0, -5.0)).unwrap();
    let sun = Tuple4D::vector(0.0, 1.0, 0.0);

    let mut absolute = Tracker::heliostat(
        Tuple4D::point(10.0, 0.0, -5.0), AimingPointType::Absolute, RotationType::YX
    );
    let mut relative = Tracker::heliostat(
        Tuple4D::point(10.0, 0.0, 0.0), AimingPointType::Relative, RotationType::YX
    );

    let a = absolute.update_orientation(&sun, &parent).unwrap();
    let r = relative.update_orientation(&sun, &parent).unwrap();
    assert_eq!(a, r);

    // Zenith sun, horizontal target along +x: the mirror tilts 45 degrees.
    let n = a.apply_vector(y_axis());
    assert_eq!(n, Tuple4D::vector(1.0, 1.0, 0.0).normalize());
}

#[test]
fn heliostat_aimed_at_itself_keeps_identity() {
    let mut h = Tracker::heliostat(Tuple4D::point(0.0, 0.0, 0.0), AimingPointType::Relative, RotationType::YX);
    let t = h.update_orientation(&Tuple4D::vector(0.3, 0.8, 0.1), &Transform::identity()).unwrap();

    assert!(t.matrix().is_identity());
}

#[test]
fn heliostat_parameters() {
    use crate::parameters::ParameterValue;

    let params = ParameterList::new()
        .with("aimingPoint", ParameterValue::Vector([0.0, 20.0, 5.0]))
        .with("typeOfAimingPoint", ParameterValue::Text("Relative".to_string()))
        .with("typeOfRotation", ParameterValue::Text("ZX".to_string()));
    let h = Tracker::heliostat_from_parameters(&params).unwrap();

    assert_eq!(h.type_name(), "TrackerHeliostat");
    assert_eq!(*h.kind(), TrackerKind::Heliostat {
        aiming_point: Tuple4D::point(0.0, 20.0, 5.0),
        aiming_type: AimingPointType::Relative,
        rotation: RotationType::ZX,
    });

    let bad = ParameterList::new().with("typeOfRotation", ParameterValue::Text("QQ".to_string()));
    assert!(matches!(Tracker::heliostat_from_parameters(&bad), Err(KernelError::InvalidConfiguration(_))));
}
