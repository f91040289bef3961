//! The base trait for reflectively serializable objects, built on top of
//! the class registry's field table.

use std::any::Any;

use crate::error::Error;
use crate::registry;
use crate::variant::Variant;

/// Implemented by every type that has been registered with
/// [`registry::register_class`]. The default `serialize`/`deserialize`
/// provided methods drive themselves entirely off the registered field
/// table, so a concrete type only needs to expose its registered name and
/// an `Any` view of itself.
pub trait ReflectObject: Any {
    /// The name this type was registered under.
    fn class_name(&self) -> &str;

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Builds an `Object` variant from every registered field.
    fn serialize(&self) -> Result<Variant, Error> {
        let meta = registry::CLASSES.find_by_name(self.class_name())?;
        let instance = self.as_any();
        let fields = meta
            .fields
            .values()
            .map(|field| (field.name.clone(), (field.serialize)(instance)));
        Ok(Variant::object(fields))
    }

    /// Populates every registered field from `value`. Both unknown keys in
    /// `value` and registered fields missing from `value` are rejected;
    /// every declared field is required.
    fn deserialize(&mut self, value: Variant) -> Result<(), Error> {
        let meta = registry::CLASSES.find_by_name(self.class_name())?;
        let keys = value.keys()?;

        for key in &keys {
            if !meta.fields.contains_key(key) {
                return Err(Error::Reflection(format!(
                    "unknown field '{key}' for class {}",
                    self.class_name()
                )));
            }
        }
        for name in meta.fields.keys() {
            if !keys.contains(name) {
                return Err(Error::Reflection(format!(
                    "missing required field '{name}' for class {}",
                    self.class_name()
                )));
            }
        }

        let instance = self.as_any_mut();
        for (name, field) in &meta.fields {
            let handle = value.field(name)?;
            let field_value = handle.borrow().clone();
            (field.deserialize)(instance, field_value)?;
        }
        Ok(())
    }
}

/// Builds a fresh `T` by default-constructing it and deserializing `value`
/// into it. Kept as a free function rather than a blanket `VariantGet`
/// impl over `T: ReflectObject + Default`, since that would conflict with
/// the generic `Vec<T>`/`HashMap<K, V>` impls under the compiler's
/// coherence rules; concrete generated types delegate to this from their
/// own non-blanket `VariantGet` impl.
pub fn object_from_variant<T: ReflectObject + Default>(value: &Variant) -> Result<T, Error> {
    let mut instance = T::default();
    instance.deserialize(value.clone())?;
    Ok(instance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{FieldDecl, FactoryFn};
    use crate::signature::{TypeDescriptor, TypeKind};
    use crate::variant::VariantGet;

    #[derive(Default, Clone)]
    struct Point {
        x: i32,
        y: i32,
    }

    impl ReflectObject for Point {
        fn class_name(&self) -> &str {
            "Point"
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    fn register_point() {
        let fields = vec![
            FieldDecl {
                name: "x".to_string(),
                descriptor: TypeDescriptor::immutable(TypeKind::I32),
                serialize: Box::new(|instance| {
                    Variant::I32(instance.downcast_ref::<Point>().unwrap().x)
                }),
                deserialize: Box::new(|instance, value| {
                    instance.downcast_mut::<Point>().unwrap().x = value.get::<i32>()?;
                    Ok(())
                }),
            },
            FieldDecl {
                name: "y".to_string(),
                descriptor: TypeDescriptor::immutable(TypeKind::I32),
                serialize: Box::new(|instance| {
                    Variant::I32(instance.downcast_ref::<Point>().unwrap().y)
                }),
                deserialize: Box::new(|instance, value| {
                    instance.downcast_mut::<Point>().unwrap().y = value.get::<i32>()?;
                    Ok(())
                }),
            },
        ];
        let factory: FactoryFn = Box::new(|| Box::new(Point::default()));
        let _ = registry::CLASSES.register("Point", fields, vec![], factory);
    }

    #[test]
    fn round_trips_fields_through_serialize_deserialize() {
        register_point();
        let point = Point { x: 3, y: 4 };
        let value = point.serialize().unwrap();

        let mut back = Point::default();
        back.deserialize(value).unwrap();
        assert_eq!(back.x, 3);
        assert_eq!(back.y, 4);
    }

    #[test]
    fn missing_field_is_reflection_error() {
        register_point();
        let value = Variant::object(vec![("x".to_string(), Variant::I32(1))]);
        let mut point = Point::default();
        assert!(matches!(
            point.deserialize(value),
            Err(Error::Reflection(_))
        ));
    }

    #[test]
    fn unknown_field_is_reflection_error() {
        register_point();
        let value = Variant::object(vec![
            ("x".to_string(), Variant::I32(1)),
            ("y".to_string(), Variant::I32(2)),
            ("z".to_string(), Variant::I32(3)),
        ]);
        let mut point = Point::default();
        assert!(matches!(
            point.deserialize(value),
            Err(Error::Reflection(_))
        ));
    }
}
