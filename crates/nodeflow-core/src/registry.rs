//! Process-wide table of value conversions.

use std::any::{Any, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use crate::error::{ValueError, ValueResult};
use crate::value::{Value, ValueType};

/// Tracing target for conversion registry operations.
const TRACING_TARGET: &str = "nodeflow_core::registry";

/// A monomorphic conversion from one value type to another.
pub type Converter = Arc<dyn Fn(&Value) -> ValueResult<Value> + Send + Sync>;

/// How a value travels across a link, resolved once at connect time.
#[derive(Clone)]
pub enum Conversion {
    /// Source and sink types are equal.
    Identity,
    /// The sink is the dynamic type and accepts anything.
    Assign,
    /// A registered converter is applied to each value.
    Convert(Converter),
    /// The source is dynamic; the concrete type is checked on publish.
    Checked {
        /// Declared type of the sink.
        target: ValueType,
        /// Registry consulted when the concrete type differs.
        registry: Arc<TypeRegistry>,
    },
}

impl Conversion {
    /// Carries a value across the link.
    pub fn apply(&self, value: Value) -> ValueResult<Value> {
        match self {
            Self::Identity | Self::Assign => Ok(value),
            Self::Convert(convert) => convert(&value),
            Self::Checked { target, registry } => {
                let found = value.value_type();
                if found == *target {
                    return Ok(value);
                }
                match registry.converter(found, *target) {
                    Some(convert) => convert(&value),
                    None => Err(ValueError::TypeMismatch {
                        expected: target.name(),
                        found: found.name(),
                    }),
                }
            }
        }
    }
}

impl fmt::Debug for Conversion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identity => f.write_str("Identity"),
            Self::Assign => f.write_str("Assign"),
            Self::Convert(_) => f.write_str("Convert"),
            Self::Checked { target, .. } => f.debug_tuple("Checked").field(target).finish(),
        }
    }
}

/// Registry of converters keyed by `(source, target)` type pair.
///
/// Lookups take a shared lock, so any number of graphs may resolve links
/// concurrently while a registration is rare and brief.
#[derive(Default)]
pub struct TypeRegistry {
    converters: RwLock<HashMap<(ValueType, ValueType), Converter>>,
}

impl TypeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry preloaded with numeric widening and to-string
    /// conversions.
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        register_defaults(&registry);
        registry
    }

    /// Returns the shared process-wide registry.
    pub fn global() -> Arc<Self> {
        static GLOBAL: OnceLock<Arc<TypeRegistry>> = OnceLock::new();
        GLOBAL
            .get_or_init(|| Arc::new(Self::with_defaults()))
            .clone()
    }

    /// Registers an infallible conversion from `A` to `B`.
    ///
    /// A later registration for the same pair replaces the earlier one.
    pub fn register<A, B, F>(&self, convert: F)
    where
        A: Any,
        B: Any + fmt::Debug + Send + Sync,
        F: Fn(&A) -> B + Send + Sync + 'static,
    {
        let converter: Converter = Arc::new(move |value: &Value| {
            let source = value
                .downcast_ref::<A>()
                .ok_or(ValueError::TypeMismatch {
                    expected: type_name::<A>(),
                    found: value.value_type().name(),
                })?;
            Ok(Value::new(convert(source)))
        });
        self.register_converter(ValueType::of::<A>(), ValueType::of::<B>(), converter);
    }

    /// Registers a type-erased converter for an explicit type pair.
    pub fn register_converter(&self, source: ValueType, target: ValueType, converter: Converter) {
        tracing::trace!(
            target: TRACING_TARGET,
            source = %source,
            target_type = %target,
            "Registering converter"
        );

        self.converters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((source, target), converter);
    }

    /// Returns whether a value of `source` may flow into a `target` sink.
    pub fn can_convert(&self, source: ValueType, target: ValueType) -> bool {
        source == target
            || target.is_dynamic()
            || source.is_dynamic()
            || self.converter(source, target).is_some()
    }

    /// Returns the registered converter for a type pair.
    pub fn converter(&self, source: ValueType, target: ValueType) -> Option<Converter> {
        self.converters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(source, target))
            .cloned()
    }

    /// Resolves the conversion a link between the two types would use.
    ///
    /// Resolution order is identity, then the dynamic sink, then a
    /// registered converter. Returns `None` for incompatible types.
    pub fn resolve(self: &Arc<Self>, source: ValueType, target: ValueType) -> Option<Conversion> {
        if source == target {
            return Some(Conversion::Identity);
        }
        if target.is_dynamic() {
            return Some(Conversion::Assign);
        }
        if let Some(converter) = self.converter(source, target) {
            return Some(Conversion::Convert(converter));
        }
        if source.is_dynamic() {
            return Some(Conversion::Checked {
                target,
                registry: Arc::clone(self),
            });
        }
        None
    }

    /// Returns the number of registered converters.
    pub fn len(&self) -> usize {
        self.converters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns whether no converter is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("converters", &self.len())
            .finish()
    }
}

fn register_defaults(registry: &TypeRegistry) {
    macro_rules! widen {
        ($from:ty => $($to:ty),+) => {
            $(registry.register::<$from, $to, _>(|value: &$from| *value as $to);)+
        };
    }

    macro_rules! stringify_all {
        ($($from:ty),+) => {
            $(registry.register::<$from, String, _>(|value: &$from| value.to_string());)+
        };
    }

    widen!(i8 => i16, i32, i64, f32, f64);
    widen!(i16 => i32, i64, f32, f64);
    widen!(i32 => i64, f64);
    widen!(i64 => f64);
    widen!(u8 => u16, u32, u64, i16, i32, i64, f32, f64);
    widen!(u16 => u32, u64, i32, i64, f32, f64);
    widen!(u32 => u64, i64, f64);
    widen!(u64 => f64);
    widen!(f32 => f64);

    stringify_all!(bool, i8, i16, i32, i64, u8, u16, u32, u64, f32, f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_widen_integers_to_floats() {
        let registry = Arc::new(TypeRegistry::with_defaults());
        let conversion = registry
            .resolve(ValueType::of::<i64>(), ValueType::of::<f64>())
            .unwrap();

        let converted = conversion.apply(Value::from(42_i64)).unwrap();
        assert_eq!(converted.get::<f64>(), Ok(42.0));
    }

    #[test]
    fn test_resolution_order() {
        let registry = Arc::new(TypeRegistry::new());
        let int = ValueType::of::<i64>();
        let text = ValueType::of::<String>();

        assert!(matches!(registry.resolve(int, int), Some(Conversion::Identity)));
        assert!(matches!(
            registry.resolve(int, ValueType::dynamic()),
            Some(Conversion::Assign)
        ));
        assert!(registry.resolve(int, text).is_none());
        assert!(!registry.can_convert(int, text));

        registry.register::<i64, String, _>(|value| format!("#{value}"));
        assert!(registry.can_convert(int, text));
        let converted = registry
            .resolve(int, text)
            .unwrap()
            .apply(Value::from(5_i64))
            .unwrap();
        assert_eq!(converted.get::<String>(), Ok("#5".to_owned()));
    }

    #[test]
    fn test_unrelated_types_are_rejected() {
        let registry = TypeRegistry::global();
        assert!(!registry.can_convert(ValueType::of::<String>(), ValueType::of::<i64>()));
        assert!(!registry.can_convert(ValueType::of::<f64>(), ValueType::of::<i64>()));
    }

    #[test]
    fn test_checked_conversion_from_dynamic_source() {
        let registry = Arc::new(TypeRegistry::with_defaults());
        let conversion = registry
            .resolve(ValueType::dynamic(), ValueType::of::<f64>())
            .unwrap();

        assert_eq!(conversion.apply(Value::from(1.5_f64)).unwrap().get::<f64>(), Ok(1.5));
        assert_eq!(conversion.apply(Value::from(2_i64)).unwrap().get::<f64>(), Ok(2.0));
        assert!(matches!(
            conversion.apply(Value::from("x")),
            Err(ValueError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_converter_rejects_wrong_input_type() {
        let registry = TypeRegistry::with_defaults();
        let convert = registry
            .converter(ValueType::of::<i32>(), ValueType::of::<i64>())
            .unwrap();
        assert!(convert(&Value::from(true)).is_err());
    }
}
