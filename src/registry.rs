use std::collections::BTreeMap;
use std::fmt;

use log::debug;

use crate::error::{ KernelError, Result };
use crate::parameters::ParameterList;
use crate::shape::{ Shape, SphericalRectangle, Hyperboloid };
use crate::tracker::Tracker;

pub type ShapeFactory = fn(&ParameterList) -> Result<Shape>;
pub type TrackerFactory = fn(&ParameterList) -> Result<Tracker>;

/// Named constructors for shapes and trackers.
///
/// Built once at start-up and passed to whatever loads scenes.
#[derive(Clone, Default)]
pub struct Registry {
    shapes: BTreeMap<String, ShapeFactory>,
    trackers: BTreeMap<String, TrackerFactory>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("shapes", &self.shapes.keys().collect::<Vec<_>>())
            .field("trackers", &self.trackers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Registry {
        Registry::default()
    }

    /// A registry knowing every built-in shape and tracker.
    pub fn with_builtins() -> Registry {
        let mut registry = Registry::new();

        registry.register_shape(SphericalRectangle::TYPE_NAME,
            |p| SphericalRectangle::from_parameters(p).map(Shape::from));
        registry.register_shape(Hyperboloid::TYPE_NAME,
            |p| Hyperboloid::from_parameters(p).map(Shape::from));

        registry.register_tracker(Tracker::PARABOLIC_DISH, |_| Ok(Tracker::parabolic_dish()));
        registry.register_tracker(Tracker::HELIOSTAT, Tracker::heliostat_from_parameters);

        registry
    }

    pub fn register_shape(&mut self, name: &str, factory: ShapeFactory) {
        self.shapes.insert(name.to_string(), factory);
    }

    pub fn register_tracker(&mut self, name: &str, factory: TrackerFactory) {
        self.trackers.insert(name.to_string(), factory);
    }

    pub fn shape_names(&self) -> impl Iterator<Item = &str> {
        self.shapes.keys().map(|k| k.as_str())
    }

    pub fn tracker_names(&self) -> impl Iterator<Item = &str> {
        self.trackers.keys().map(|k| k.as_str())
    }

    pub fn create_shape(&self, name: &str, params: &ParameterList) -> Result<Shape> {
        let factory = self.shapes.get(name).ok_or_else(|| KernelError::InvalidConfiguration(
            format!("unknown shape type `{}` (known: {})", name, self.shape_names().collect::<Vec<_>>().join(", "))
        ))?;

        debug!("creating shape {}", name);
        factory(params)
    }

    pub fn create_tracker(&self, name: &str, params: &ParameterList) -> Result<Tracker> {
        let factory = self.trackers.get(name).ok_or_else(|| KernelError::InvalidConfiguration(
            format!("unknown tracker type `{}` (known: {})", name, self.tracker_names().collect::<Vec<_>>().join(", "))
        ))?;

        debug!("creating tracker {}", name);
        factory(params)
    }
}

/* Tests */

#[test]
fn builtins_are_registered() {
    let registry = Registry::with_builtins();

    assert_eq!(
        registry.shape_names().collect::<Vec<_>>(),
        vec!["ShapeHyperboloid", "ShapeSphericalRectangle"]
    );
    assert_eq!(
        registry.tracker_names().collect::<Vec<_>>(),
        vec!["TrackerHeliostat", "TrackerParabolicDish"]
    );
}

#[test]
fn shapes_by_name_use_defaults() {
    let registry = Registry::with_builtins();
    let shape = registry.create_shape("ShapeSphericalRectangle", &ParameterList::new()).unwrap();

    assert_eq!(shape, Shape::SphericalRectangle(SphericalRectangle::new(0.75, 1.0, 1.0).unwrap()));
    assert_eq!(shape.type_name(), "ShapeSphericalRectangle");
}

#[test]
fn parameters_reach_the_shape() {
    use crate::parameters::ParameterValue;

    let registry = Registry::with_builtins();
    let params = ParameterList::new()
        .with("radius", ParameterValue::Real(3.0))
        .with("widthX", ParameterValue::Real(2.0));

    match registry.create_shape("ShapeSphericalRectangle", &params).unwrap() {
        Shape::SphericalRectangle(s) => assert_eq!((s.radius, s.width_x, s.width_z), (3.0, 2.0, 1.0)),
        other => panic!("unexpected shape {:?}", other),
    }

    let bad = ParameterList::new().with("radius", ParameterValue::Real(0.1));
    assert!(registry.create_shape("ShapeSphericalRectangle", &bad).is_err());
}

#[test]
fn unknown_names_are_configuration_errors() {
    let registry = Registry::with_builtins();

    assert!(matches!(
        registry.create_shape("ShapeTorus", &ParameterList::new()),
        Err(KernelError::InvalidConfiguration(_))
    ));
    assert!(matches!(
        registry.create_tracker("TrackerOneAxis", &ParameterList::new()),
        Err(KernelError::InvalidConfiguration(_))
    ));
    assert!(Registry::new().create_tracker("TrackerParabolicDish", &ParameterList::new()).is_err());
}

#[test]
fn trackers_by_name() {
    let registry = Registry::with_builtins();
    let dish = registry.create_tracker("TrackerParabolicDish", &ParameterList::new()).unwrap();
    let heliostat = registry.create_tracker("TrackerHeliostat", &ParameterList::new()).unwrap();

    assert_eq!(dish.type_name(), "TrackerParabolicDish");
    assert_eq!(heliostat.type_name(), "TrackerHeliostat");
}

#[test]
fn unknown_name_errors_list_the_known_types() {
    let registry = Registry::with_builtins();

    match registry.create_shape("ShapeTorus", &ParameterList::new()) {
        Err(e) => assert!(e.to_string().contains("ShapeHyperboloid, ShapeSphericalRectangle")),
        Ok(shape) => panic!("unexpected shape {:?}", shape),
    }
    match registry.create_tracker("TrackerOneAxis", &ParameterList::new()) {
        Err(e) => assert!(e.to_string().contains("TrackerHeliostat, TrackerParabolicDish")),
        Ok(tracker) => panic!("unexpected tracker {:?}", tracker),
    }
}
