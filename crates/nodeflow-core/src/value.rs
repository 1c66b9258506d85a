//! Dynamically typed port values.

use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::error::ValueError;

/// Runtime tag identifying the Rust type carried by a port or value.
///
/// Two tags are equal iff they describe the same Rust type. The name is
/// informational and is what persisted documents record.
#[derive(Clone, Copy)]
pub struct ValueType {
    id: TypeId,
    name: &'static str,
}

impl ValueType {
    /// Returns the tag of `T`.
    #[inline]
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    /// Returns the tag of the dynamic sink type.
    ///
    /// A port declared with this type accepts any value unchanged, and a
    /// port producing it may feed any sink, checked at publish time.
    #[inline]
    pub fn dynamic() -> Self {
        Self::of::<Value>()
    }

    /// Returns whether this is the dynamic sink type.
    #[inline]
    pub fn is_dynamic(&self) -> bool {
        self.id == TypeId::of::<Value>()
    }

    /// Returns the underlying [`TypeId`].
    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.id
    }

    /// Returns the Rust type name.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for ValueType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ValueType {}

impl Hash for ValueType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

type DebugFn = fn(&(dyn Any + Send + Sync), &mut fmt::Formatter<'_>) -> fmt::Result;

/// An immutable, cheaply clonable value flowing between ports.
///
/// The payload is shared behind an [`Arc`], so fanning a value out to many
/// consumers never copies it.
#[derive(Clone)]
pub struct Value {
    ty: ValueType,
    inner: Arc<dyn Any + Send + Sync>,
    debug: DebugFn,
}

fn debug_as<T: Any + fmt::Debug>(
    value: &(dyn Any + Send + Sync),
    f: &mut fmt::Formatter<'_>,
) -> fmt::Result {
    match value.downcast_ref::<T>() {
        Some(value) => fmt::Debug::fmt(value, f),
        None => f.write_str("<unknown>"),
    }
}

impl Value {
    /// Wraps a value.
    pub fn new<T: Any + fmt::Debug + Send + Sync>(value: T) -> Self {
        Self {
            ty: ValueType::of::<T>(),
            inner: Arc::new(value),
            debug: debug_as::<T>,
        }
    }

    /// Returns the type tag of the wrapped value.
    #[inline]
    pub fn value_type(&self) -> ValueType {
        self.ty
    }

    /// Returns whether the wrapped value is a `T`.
    #[inline]
    pub fn is<T: Any>(&self) -> bool {
        self.inner.is::<T>()
    }

    /// Borrows the wrapped value as a `T`.
    #[inline]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// Clones the wrapped value out as a `T`.
    pub fn get<T: Any + Clone>(&self) -> Result<T, ValueError> {
        self.downcast_ref::<T>()
            .cloned()
            .ok_or(ValueError::TypeMismatch {
                expected: type_name::<T>(),
                found: self.ty.name(),
            })
    }

    /// Builds a value from JSON, picking the narrowest native type.
    ///
    /// Integers become `i64` (or `u64` when out of range), other numbers
    /// `f64`, strings `String`, booleans `bool`, `null` the unit type, and
    /// arrays or objects stay as [`serde_json::Value`].
    pub fn from_json(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;

        match json {
            Json::Null => Self::new(()),
            Json::Bool(flag) => Self::new(flag),
            Json::Number(number) => {
                if let Some(int) = number.as_i64() {
                    Self::new(int)
                } else if let Some(uint) = number.as_u64() {
                    Self::new(uint)
                } else {
                    Self::new(number.as_f64().unwrap_or(f64::NAN))
                }
            }
            Json::String(text) => Self::new(text),
            other => Self::new(other),
        }
    }

    /// Renders the value as JSON when it holds a JSON-representable type.
    pub fn to_json(&self) -> Option<serde_json::Value> {
        use serde_json::Value as Json;

        if self.is::<()>() {
            return Some(Json::Null);
        }
        if let Some(json) = self.downcast_ref::<Json>() {
            return Some(json.clone());
        }
        if let Some(text) = self.downcast_ref::<String>() {
            return Some(Json::String(text.clone()));
        }
        if let Some(flag) = self.downcast_ref::<bool>() {
            return Some(Json::Bool(*flag));
        }

        macro_rules! number {
            ($($ty:ty),*) => {
                $(if let Some(number) = self.downcast_ref::<$ty>() {
                    return Some(serde_json::json!(*number));
                })*
            };
        }
        number!(i8, i16, i32, i64, u8, u16, u32, u64, f32, f64);

        None
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        (self.debug)(&*self.inner, f)
    }
}

macro_rules! impl_from_native {
    ($($ty:ty),* $(,)?) => {
        $(impl From<$ty> for Value {
            fn from(value: $ty) -> Self {
                Value::new(value)
            }
        })*
    };
}

impl_from_native!(
    (),
    bool,
    i8,
    i16,
    i32,
    i64,
    u8,
    u16,
    u32,
    u64,
    f32,
    f64,
    String,
    serde_json::Value,
);

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::new(value.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_value_type_equality_ignores_name() {
        assert_eq!(ValueType::of::<i64>(), ValueType::of::<i64>());
        assert_ne!(ValueType::of::<i64>(), ValueType::of::<f64>());
        assert!(ValueType::dynamic().is_dynamic());
        assert!(!ValueType::of::<String>().is_dynamic());
    }

    #[test]
    fn test_get_reports_type_mismatch() {
        let value = Value::from(42_i64);
        assert_eq!(value.get::<i64>(), Ok(42));

        let err = value.get::<String>().unwrap_err();
        assert_eq!(
            err,
            ValueError::TypeMismatch {
                expected: type_name::<String>(),
                found: "i64",
            }
        );
    }

    #[test]
    fn test_from_json_picks_native_types() {
        assert!(Value::from_json(json!(3)).is::<i64>());
        assert!(Value::from_json(json!(3.5)).is::<f64>());
        assert!(Value::from_json(json!(true)).is::<bool>());
        assert!(Value::from_json(json!("x")).is::<String>());
        assert!(Value::from_json(json!(null)).is::<()>());
        assert!(Value::from_json(json!([1, 2])).is::<serde_json::Value>());
    }

    #[test]
    fn test_to_json_for_native_types() {
        assert_eq!(Value::from(7_i32).to_json(), Some(json!(7)));
        assert_eq!(Value::from("hi").to_json(), Some(json!("hi")));

        #[derive(Debug)]
        struct Opaque;
        assert_eq!(Value::new(Opaque).to_json(), None);
    }

    #[test]
    fn test_debug_shows_payload() {
        assert_eq!(format!("{:?}", Value::from(1.5_f64)), "1.5");
    }
}
