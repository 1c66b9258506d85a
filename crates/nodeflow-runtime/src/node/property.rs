//! Editable node properties described as data.

use std::any::{Any, type_name};
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as Json;
use thiserror::Error;

use super::Node;

/// JSON shape a property accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum PropertyKind {
    /// `true` or `false`.
    Bool,
    /// A whole number.
    Integer,
    /// Any number.
    Float,
    /// A string.
    String,
    /// Arbitrary JSON, including `null`.
    Json,
}

impl PropertyKind {
    /// Returns whether `value` has the shape of this kind.
    pub fn accepts(self, value: &Json) -> bool {
        match self {
            Self::Bool => value.is_boolean(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Float => value.is_number(),
            Self::String => value.is_string(),
            Self::Json => true,
        }
    }
}

/// Validation rule attached to a property.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    /// Numeric value must lie within `[min, max]`.
    Range {
        /// Inclusive lower bound.
        min: f64,
        /// Inclusive upper bound.
        max: f64,
    },
    /// String may span several lines; an editor hint only.
    Multiline,
}

impl Constraint {
    /// A range with only a lower bound.
    pub fn at_least(min: f64) -> Self {
        Self::Range {
            min,
            max: f64::INFINITY,
        }
    }

    fn check(&self, name: &str, value: &Json) -> Result<(), PropertyError> {
        match self {
            Self::Range { min, max } => match value.as_f64() {
                Some(number) if number < *min || number > *max => Err(PropertyError::OutOfRange {
                    name: name.to_owned(),
                    value: number,
                    min: *min,
                    max: *max,
                }),
                _ => Ok(()),
            },
            Self::Multiline => Ok(()),
        }
    }
}

/// Errors raised while reading or writing a property.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PropertyError {
    /// The node type has no property with this name.
    #[error("unknown property '{0}'")]
    Unknown(String),

    /// The value has the wrong JSON shape.
    #[error("property '{name}' expects a {expected} value")]
    InvalidKind {
        /// Property name.
        name: String,
        /// Accepted kind.
        expected: PropertyKind,
    },

    /// The value violates a range constraint.
    #[error("property '{name}' value {value} is outside [{min}, {max}]")]
    OutOfRange {
        /// Property name.
        name: String,
        /// Rejected value.
        value: f64,
        /// Inclusive lower bound.
        min: f64,
        /// Inclusive upper bound.
        max: f64,
    },

    /// The value could not be applied to the node.
    #[error("property '{name}' rejected value: {message}")]
    Invalid {
        /// Property name.
        name: String,
        /// Reason.
        message: String,
    },
}

type Getter = Arc<dyn Fn(&dyn Any) -> Option<Json> + Send + Sync>;
type Setter = Arc<dyn Fn(&mut dyn Any, Json) -> Result<(), String> + Send + Sync>;

/// Metadata, accessor and mutator of one editable node property.
///
/// Descriptors are pure data: reading the list has no effect on the node.
/// Setting through a descriptor validates kind and constraints first and
/// leaves the node unchanged on rejection.
#[derive(Clone, derive_more::Debug)]
pub struct PropertyDescriptor {
    name: &'static str,
    kind: PropertyKind,
    description: Option<&'static str>,
    constraints: Vec<Constraint>,
    #[debug(skip)]
    getter: Getter,
    #[debug(skip)]
    setter: Setter,
}

impl PropertyDescriptor {
    /// Describes a property of node type `N` stored as `T`.
    pub fn new<N, T>(
        name: &'static str,
        kind: PropertyKind,
        get: impl Fn(&N) -> T + Send + Sync + 'static,
        set: impl Fn(&mut N, T) + Send + Sync + 'static,
    ) -> Self
    where
        N: Node,
        T: Serialize + DeserializeOwned,
    {
        let getter: Getter = Arc::new(move |node: &dyn Any| {
            let node = node.downcast_ref::<N>()?;
            serde_json::to_value(get(node)).ok()
        });

        let setter: Setter = Arc::new(move |node: &mut dyn Any, value: Json| {
            let node = node
                .downcast_mut::<N>()
                .ok_or_else(|| format!("descriptor belongs to {}", type_name::<N>()))?;
            let value = serde_json::from_value::<T>(value).map_err(|e| e.to_string())?;
            set(node, value);
            Ok(())
        });

        Self {
            name,
            kind,
            description: None,
            constraints: Vec::new(),
            getter,
            setter,
        }
    }

    /// Attaches a human-readable description.
    pub fn with_description(mut self, description: &'static str) -> Self {
        self.description = Some(description);
        self
    }

    /// Adds a validation constraint.
    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Returns the property name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the accepted kind.
    pub fn kind(&self) -> PropertyKind {
        self.kind
    }

    /// Returns the description, if any.
    pub fn description(&self) -> Option<&'static str> {
        self.description
    }

    /// Returns the attached constraints.
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Reads the property from `node`.
    pub fn get(&self, node: &dyn Any) -> Option<Json> {
        (self.getter)(node)
    }

    /// Validates `value` and writes it to `node`.
    pub fn set(&self, node: &mut dyn Any, value: Json) -> Result<(), PropertyError> {
        if !self.kind.accepts(&value) {
            return Err(PropertyError::InvalidKind {
                name: self.name.to_owned(),
                expected: self.kind,
            });
        }

        for constraint in &self.constraints {
            constraint.check(self.name, &value)?;
        }

        (self.setter)(node, value).map_err(|message| PropertyError::Invalid {
            name: self.name.to_owned(),
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::error::NodeResult;
    use crate::node::ExecContext;
    use crate::port::NodePorts;

    #[derive(Default)]
    struct Repeat {
        times: i64,
        label: String,
    }

    #[async_trait]
    impl Node for Repeat {
        fn type_name(&self) -> &'static str {
            "repeat"
        }

        fn ports(&self) -> NodePorts {
            NodePorts::new()
        }

        fn properties(&self) -> Vec<PropertyDescriptor> {
            vec![
                PropertyDescriptor::new(
                    "times",
                    PropertyKind::Integer,
                    |n: &Self| n.times,
                    |n: &mut Self, v: i64| n.times = v,
                )
                .with_constraint(Constraint::Range {
                    min: 0.0,
                    max: 10.0,
                }),
                PropertyDescriptor::new(
                    "label",
                    PropertyKind::String,
                    |n: &Self| n.label.clone(),
                    |n: &mut Self, v: String| n.label = v,
                )
                .with_constraint(Constraint::Multiline),
            ]
        }

        async fn execute(&mut self, _ctx: &mut ExecContext) -> NodeResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_get_and_set_round_trip() {
        let mut node = Repeat::default();
        let [times, label] = <[_; 2]>::try_from(node.properties()).unwrap();

        times.set(&mut node, json!(4)).unwrap();
        label.set(&mut node, json!("a\nb")).unwrap();

        assert_eq!(node.times, 4);
        assert_eq!(times.get(&node), Some(json!(4)));
        assert_eq!(label.get(&node), Some(json!("a\nb")));
    }

    #[test]
    fn test_set_rejects_without_mutation() {
        let mut node = Repeat {
            times: 2,
            ..Default::default()
        };
        let times = node.properties().remove(0);

        let err = times.set(&mut node, json!(11)).unwrap_err();
        assert!(matches!(err, PropertyError::OutOfRange { .. }));

        let err = times.set(&mut node, json!("three")).unwrap_err();
        assert!(matches!(err, PropertyError::InvalidKind { .. }));

        assert_eq!(node.times, 2);
    }

    #[test]
    fn test_kind_acceptance() {
        assert!(PropertyKind::Float.accepts(&json!(1)));
        assert!(!PropertyKind::Integer.accepts(&json!(1.5)));
        assert!(PropertyKind::Json.accepts(&json!(null)));
    }
}
