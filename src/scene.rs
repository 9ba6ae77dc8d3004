use std::fs;
use std::path::Path;

use log::{ debug, info, warn };
use serde::{ Serialize, Deserialize };
use serde_json::{ Map, Value };

use crate::bounds::Aabb;
use crate::error::{ KernelError, Result };
use crate::material::{ Distribution, Material };
use crate::parallel::{ BatchReport, Element, Snapshot };
use crate::parameters::ParameterList;
use crate::registry::Registry;
use crate::shape::Shape;
use crate::tracker::Tracker;
use crate::transform::{ Transform, TransformParameter };
use crate::tuple::Tuple4D;

/// A loaded simulation: elements mounted under an optional tracker.
///
/// Every element's `local` transform places it in the tracker's frame; the
/// tracker in turn sits in the parent frame given by `parent`.
#[derive(Clone, Debug)]
pub struct Scene {
    pub sun: Tuple4D,
    pub parent: Transform,
    pub tracker: Option<Tracker>,
    pub elements: Vec<SceneElement>,
    pub rays: Option<usize>,
    pub seed: Option<u64>,
}

#[derive(Clone, Debug)]
pub struct SceneElement {
    pub name: String,
    pub shape: Shape,
    pub material: Material,
    pub local: Transform,
}

impl Scene {
    pub fn load<P: AsRef<Path>>(path: P, registry: &Registry) -> Result<Scene> {
        let text = fs::read_to_string(path.as_ref())?;
        info!("loading scene {}", path.as_ref().display());

        Scene::from_json(&text, registry)
    }

    pub fn from_json(text: &str, registry: &Registry) -> Result<Scene> {
        let scene_json: SceneJson = serde_json::from_str(text)?;
        scene_json.into_scene(registry)
    }

    /// Orients the tracker for `sun` and places every element in the world.
    pub fn step(&mut self, sun: &Tuple4D) -> Result<Snapshot> {
        let mount = match self.tracker.as_mut() {
            Some(tracker) => tracker.update_orientation(sun, &self.parent)?,
            None => self.parent,
        };
        self.sun = *sun;

        let elements = self.elements.iter().map(|e| Element {
            name: e.name.clone(),
            shape: e.shape,
            material: e.material.clone(),
            object_to_world: mount * e.local,
        }).collect();

        Ok(Snapshot { elements })
    }
}

/// World-space box around every element of `snapshot`.
pub fn world_bounds(snapshot: &Snapshot) -> Option<Aabb> {
    snapshot.elements.iter()
        .map(|e| e.shape.bounding_box().transformed(&e.object_to_world))
        .reduce(|acc, b| Aabb::new(
            Tuple4D::point(acc.min.x.min(b.min.x), acc.min.y.min(b.min.y), acc.min.z.min(b.min.z)),
            Tuple4D::point(acc.max.x.max(b.max.x), acc.max.y.max(b.max.y), acc.max.z.max(b.max.z)),
        ))
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct SceneJson {
    sun: [f64; 3],

    #[serde(default)]
    parent_transform: Option<String>,

    #[serde(default)]
    tracker: Option<TypedJson>,

    elements: Vec<ElementJson>,

    #[serde(default)]
    rays: Option<usize>,

    #[serde(default)]
    seed: Option<u64>,
}

/// A registry type name with its free-form parameters.
#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct TypedJson {
    #[serde(rename = "type")]
    ty: String,

    #[serde(default)]
    parameters: Map<String, Value>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ElementJson {
    name: String,
    shape: TypedJson,

    #[serde(default)]
    material: MaterialJson,

    #[serde(default)]
    transform: Option<String>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct MaterialJson {
    #[serde(default = "enabled")]
    front_enabled: bool,

    #[serde(default = "enabled")]
    back_enabled: bool,

    /// `[angle, reflectivity]` pairs.
    #[serde(default)]
    front_reflectivity: Option<Vec<(f64, f64)>>,

    #[serde(default)]
    back_reflectivity: Option<Vec<(f64, f64)>>,

    #[serde(default)]
    sigma_slope: Option<f64>,

    #[serde(default)]
    distribution: Distribution,
}

fn enabled() -> bool {
    true
}

impl Default for MaterialJson {
    fn default() -> MaterialJson {
        MaterialJson {
            front_enabled: true,
            back_enabled: true,
            front_reflectivity: None,
            back_reflectivity: None,
            sigma_slope: None,
            distribution: Distribution::default(),
        }
    }
}

impl MaterialJson {
    fn into_material(self, element: &str) -> Result<Material> {
        let mut material = Material::default();

        material.set_front_enabled(self.front_enabled);
        material.set_back_enabled(self.back_enabled);
        material.set_distribution(self.distribution);

        if let Some(sigma) = self.sigma_slope {
            material.set_sigma_slope(sigma)?;
        }

        // A rejected table leaves that side opaque; the scene still loads.
        if let Some(points) = self.front_reflectivity {
            if material.set_front_table(&points).is_err() {
                warn!("element `{}`: front side will absorb every ray", element);
            }
        }
        if let Some(points) = self.back_reflectivity {
            if material.set_back_table(&points).is_err() {
                warn!("element `{}`: back side will absorb every ray", element);
            }
        }

        Ok(material)
    }
}

fn parse_transform(text: Option<&str>) -> Result<Transform> {
    match text {
        Some(text) => Ok(*TransformParameter::from_text(text)?.transform()),
        None => Ok(Transform::identity()),
    }
}

impl SceneJson {
    fn into_scene(self, registry: &Registry) -> Result<Scene> {
        let sun = Tuple4D::vector_from(self.sun);
        if !sun.is_finite() || sun.try_normalize().is_none() {
            return Err(KernelError::InvalidConfiguration(format!(
                "sun direction {:?} cannot be normalized", self.sun
            )));
        }

        let parent = parse_transform(self.parent_transform.as_deref())?;

        let tracker = match self.tracker {
            Some(t) => Some(registry.create_tracker(&t.ty, &ParameterList::from_json(&t.parameters)?)?),
            None => None,
        };

        if self.elements.is_empty() {
            return Err(KernelError::InvalidConfiguration(
                "a scene needs at least one element".to_string()
            ));
        }

        let elements = self.elements.into_iter().map(|e| {
            let params = ParameterList::from_json(&e.shape.parameters)?;
            let shape = registry.create_shape(&e.shape.ty, &params)?;
            let local = parse_transform(e.transform.as_deref())?;
            let material = e.material.into_material(&e.name)?;

            debug!("element `{}`: {}", e.name, shape.type_name());
            Ok(SceneElement { name: e.name, shape, material, local })
        }).collect::<Result<Vec<_>>>()?;

        Ok(Scene { sun, parent, tracker, elements, rays: self.rays, seed: self.seed })
    }
}

/// One reflected ray as written to the output file.
#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct RayRecord {
    pub index: usize,
    pub origin: [f64; 3],
    pub direction: [f64; 3],
}

/// Writes the reflected rays of `report` as a JSON array.
pub fn save_rays<P: AsRef<Path>>(path: P, report: &BatchReport) -> Result<()> {
    let records: Vec<RayRecord> = report.reflected.iter().map(|(index, ray)| RayRecord {
        index: *index,
        origin: ray.origin.xyz(),
        direction: ray.direction.xyz(),
    }).collect();

    fs::write(path, serde_json::to_string_pretty(&records)?)?;
    Ok(())
}

/* Tests */

#[cfg(test)]
const DISH_SCENE: &str = r#"{
    "sun": [0.0, 1.0, 0.0],
    "tracker": { "type": "TrackerParabolicDish" },
    "elements": [{
        "name": "mirror",
        "shape": { "type": "ShapeSphericalRectangle", "parameters": { "radius": 10.0 } },
        "material": {
            "frontReflectivity": [[0.0, 0.9], [1.5708, 0.9]],
            "backReflectivity": [[0.0, 0.9], [1.5708, 0.9]],
            "sigmaSlope": 1.5,
            "distribution": "Circular"
        }
    }],
    "rays": 5000,
    "seed": 42
}"#;

#[test]
fn scene_loads_through_the_registry() {
    let scene = Scene::from_json(DISH_SCENE, &Registry::with_builtins()).unwrap();

    assert_eq!(scene.elements.len(), 1);
    assert_eq!(scene.elements[0].shape.type_name(), "ShapeSphericalRectangle");
    assert_eq!(scene.elements[0].material.sigma_slope(), 1.5);
    assert_eq!(scene.elements[0].material.distribution(), Distribution::Circular);
    assert_eq!(scene.tracker.as_ref().map(|t| t.type_name()), Some("TrackerParabolicDish"));
    assert_eq!((scene.rays, scene.seed), (Some(5000), Some(42)));
}

#[test]
fn zenith_step_keeps_the_dish_level() {
    let mut scene = Scene::from_json(DISH_SCENE, &Registry::with_builtins()).unwrap();
    let snapshot = scene.step(&Tuple4D::vector(0.0, 1.0, 0.0)).unwrap();

    assert!(snapshot.elements[0].object_to_world.matrix().is_identity());

    let bounds = world_bounds(&snapshot).unwrap();
    approx::assert_abs_diff_eq!(bounds.max.x, 0.5, epsilon = 1e-12);
    approx::assert_abs_diff_eq!(bounds.min.y, 0.0, epsilon = 1e-12);
}

#[test]
fn tilted_sun_rotates_every_element() {
    let mut scene = Scene::from_json(DISH_SCENE, &Registry::with_builtins()).unwrap();
    let sun = Tuple4D::vector(1.0, 1.0, 0.0).normalize();
    let snapshot = scene.step(&sun).unwrap();

    let axis = snapshot.elements[0].object_to_world.apply_vector(Tuple4D::vector(0.0, 1.0, 0.0));
    approx::assert_abs_diff_eq!(axis.x, sun.x, epsilon = 1e-9);
    approx::assert_abs_diff_eq!(axis.y, sun.y, epsilon = 1e-9);
    assert_eq!(scene.sun, sun);
}

#[test]
fn element_transforms_compose_under_the_tracker() {
    let text = r#"{
        "sun": [0.0, 1.0, 0.0],
        "parentTransform": "[ 1.0, 0.0, 0.0, 5.0 ] [ 0.0, 1.0, 0.0, 0.0 ] [ 0.0, 0.0, 1.0, 0.0 ] [ 0.0, 0.0, 0.0, 1.0 ]",
        "elements": [{
            "name": "raised",
            "shape": { "type": "ShapeSphericalRectangle" },
            "transform": "[ 1.0, 0.0, 0.0, 0.0 ] [ 0.0, 1.0, 0.0, 2.0 ] [ 0.0, 0.0, 1.0, 0.0 ] [ 0.0, 0.0, 0.0, 1.0 ]"
        }]
    }"#;

    let mut scene = Scene::from_json(text, &Registry::with_builtins()).unwrap();
    let snapshot = scene.step(&Tuple4D::vector(0.0, 1.0, 0.0)).unwrap();
    let origin = snapshot.elements[0].object_to_world.apply_point(Tuple4D::point(0.0, 0.0, 0.0));

    assert_eq!(origin, Tuple4D::point(5.0, 2.0, 0.0));
}

#[test]
fn bad_tables_leave_the_scene_usable() {
    let text = r#"{
        "sun": [0.0, 1.0, 0.0],
        "elements": [{
            "name": "broken",
            "shape": { "type": "ShapeSphericalRectangle" },
            "material": {
                "frontReflectivity": [[0.3, 0.5], [0.3, 0.7]],
                "backReflectivity": [[0.2, 0.5]]
            }
        }, {
            "name": "unsorted",
            "shape": { "type": "ShapeSphericalRectangle" },
            "material": { "frontReflectivity": [[0.2, 0.4], [0.1, 0.6]] }
        }]
    }"#;

    let scene = Scene::from_json(text, &Registry::with_builtins()).unwrap();
    assert!(scene.elements[0].material.front().reflectivity().is_none());
    assert!(scene.elements[0].material.back().reflectivity().is_none());

    let sorted = scene.elements[1].material.front().reflectivity().unwrap();
    assert_eq!(sorted.points(), vec![(0.1, 0.6), (0.2, 0.4)]);
}

#[test]
fn configuration_errors() {
    let registry = Registry::with_builtins();

    let unknown_shape = r#"{ "sun": [0, 1, 0], "elements": [{ "name": "x", "shape": { "type": "ShapeTorus" } }] }"#;
    assert!(matches!(
        Scene::from_json(unknown_shape, &registry),
        Err(KernelError::InvalidConfiguration(_))
    ));

    let wrong_type = r#"{ "sun": [0, 1, 0], "elements": [{ "name": "x",
        "shape": { "type": "ShapeSphericalRectangle", "parameters": { "radius": "big" } } }] }"#;
    assert!(matches!(
        Scene::from_json(wrong_type, &registry),
        Err(KernelError::InvalidConfiguration(_))
    ));

    let no_sun = r#"{ "sun": [0, 0, 0], "elements": [{ "name": "x", "shape": { "type": "ShapeHyperboloid" } }] }"#;
    assert!(Scene::from_json(no_sun, &registry).is_err());

    let empty = r#"{ "sun": [0, 1, 0], "elements": [] }"#;
    assert!(Scene::from_json(empty, &registry).is_err());

    assert!(matches!(Scene::from_json("{", &registry), Err(KernelError::Json(_))));

    let bad_text = r#"{ "sun": [0, 1, 0], "parentTransform": "not a matrix",
        "elements": [{ "name": "x", "shape": { "type": "ShapeHyperboloid" } }] }"#;
    assert!(matches!(Scene::from_json(bad_text, &registry), Err(KernelError::ParseError(_))));
}
