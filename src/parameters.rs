use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::{ KernelError, Result };

/// A single named parameter value.
#[derive(Clone, Debug, PartialEq)]
pub enum ParameterValue {
    Real(f64),
    Flag(bool),
    Text(String),
    Vector([f64; 3]),
}

impl ParameterValue {
    fn kind(&self) -> &'static str {
        match self {
            ParameterValue::Real(_) => "number",
            ParameterValue::Flag(_) => "flag",
            ParameterValue::Text(_) => "text",
            ParameterValue::Vector(_) => "vector",
        }
    }
}

/// Typed key/value store that shapes and trackers are configured from.
///
/// Accessors take a default for absent keys and fail with
/// `InvalidConfiguration` when a key is present with the wrong type, so a
/// typo in a value never silently falls back to the default.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParameterList {
    values: BTreeMap<String, ParameterValue>,
}

impl ParameterList {
    pub fn new() -> ParameterList {
        ParameterList { values: BTreeMap::new() }
    }

    /// Builder-style insert.
    pub fn with(mut self, name: &str, value: ParameterValue) -> ParameterList {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: &str, value: ParameterValue) {
        self.values.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.values.get(name)
    }

    pub fn real(&self, name: &str, default: f64) -> Result<f64> {
        match self.get(name) {
            None => Ok(default),
            Some(ParameterValue::Real(x)) => Ok(*x),
            Some(other) => Err(wrong_type(name, "number", other)),
        }
    }

    pub fn text(&self, name: &str, default: &str) -> Result<String> {
        match self.get(name) {
            None => Ok(default.to_string()),
            Some(ParameterValue::Text(s)) => Ok(s.clone()),
            Some(other) => Err(wrong_type(name, "text", other)),
        }
    }

    pub fn vector(&self, name: &str, default: [f64; 3]) -> Result<[f64; 3]> {
        match self.get(name) {
            None => Ok(default),
            Some(ParameterValue::Vector(v)) => Ok(*v),
            Some(other) => Err(wrong_type(name, "vector", other)),
        }
    }

    /// Converts a JSON object into a parameter list.
    ///
    /// Numbers become `Real`, booleans `Flag`, strings `Text` and arrays of
    /// three numbers `Vector`. Anything else is rejected.
    pub fn from_json(object: &serde_json::Map<String, Value>) -> Result<ParameterList> {
        let mut list = ParameterList::new();

        for (name, value) in object {
            let converted = match value {
                Value::Number(n) => n.as_f64().map(ParameterValue::Real),
                Value::Bool(b) => Some(ParameterValue::Flag(*b)),
                Value::String(s) => Some(ParameterValue::Text(s.clone())),
                Value::Array(items) if items.len() == 3 => {
                    let xyz: Vec<f64> = items.iter().filter_map(|v| v.as_f64()).collect();
                    if xyz.len() == 3 {
                        Some(ParameterValue::Vector([xyz[0], xyz[1], xyz[2]]))
                    } else {
                        None
                    }
                },
                _ => None,
            };

            match converted {
                Some(v) => list.set(name, v),
                None => return Err(KernelError::InvalidConfiguration(format!(
                    "parameter `{}` has unsupported value {}", name, value
                ))),
            }
        }

        Ok(list)
    }
}

fn wrong_type(name: &str, expected: &str, found: &ParameterValue) -> KernelError {
    KernelError::InvalidConfiguration(format!(
        "parameter `{}` must be a {}, found a {}", name, expected, found.kind()
    ))
}

/* Tests */

#[test]
fn absent_keys_use_defaults() {
    let list = ParameterList::new();

    assert_eq!(list.real("radius", 0.75).unwrap(), 0.75);
    assert_eq!(list.text("typeOfRotation", "YX").unwrap(), "YX");
}

#[test]
fn wrong_type_is_a_configuration_error() {
    let list = ParameterList::new()
        .with("radius", ParameterValue::Text("big".to_string()));

    assert!(matches!(list.real("radius", 0.75), Err(KernelError::InvalidConfiguration(_))));
}

#[test]
fn json_object_converts() {
    let json: Value = serde_json::from_str(r#"{
        "radius": 2,
        "widthX": 0.5,
        "aimingPoint": [0, 10, 0.5],
        "typeOfAimingPoint": "Absolute",
        "enabled": false
    }"#).unwrap();
    let list = ParameterList::from_json(json.as_object().unwrap()).unwrap();

    assert_eq!(list.real("radius", 0.0).unwrap(), 2.0);
    assert_eq!(list.real("widthX", 0.0).unwrap(), 0.5);
    assert_eq!(list.vector("aimingPoint", [0.0; 3]).unwrap(), [0.0, 10.0, 0.5]);
    assert_eq!(list.text("typeOfAimingPoint", "").unwrap(), "Absolute");
    assert_eq!(list.get("enabled"), Some(&ParameterValue::Flag(false)));
}

#[test]
fn json_rejects_nested_objects() {
    let json: Value = serde_json::from_str(r#"{ "radius": { "value": 1 } }"#).unwrap();
    assert!(ParameterList::from_json(json.as_object().unwrap()).is_err());

    let json: Value = serde_json::from_str(r#"{ "aimingPoint": [1, "a", 2] }"#).unwrap();
    assert!(ParameterList::from_json(json.as_object().unwrap()).is_err());
}
