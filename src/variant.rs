//! The value tree that crosses every reflective boundary: field values,
//! method arguments and method return values are all `Variant`s.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use derive_more::From;

use crate::error::Error;

/// A shared, mutably-borrowable slot inside a container `Variant`.
pub type Handle = Rc<RefCell<Variant>>;

fn handle(value: Variant) -> Handle {
    Rc::new(RefCell::new(value))
}

/// The uniform tagged value that crosses field, argument and return
/// boundaries.
#[derive(Debug, Clone, From)]
pub enum Variant {
    Void,
    #[from]
    I8(i8),
    #[from]
    I16(i16),
    #[from]
    I32(i32),
    #[from]
    I64(i64),
    #[from]
    U8(u8),
    #[from]
    U16(u16),
    #[from]
    U32(u32),
    #[from]
    U64(u64),
    #[from]
    F32(f32),
    #[from]
    F64(f64),
    #[from]
    Bool(bool),
    #[from]
    String(String),
    Array(Vec<Handle>),
    Map(HashMap<Variant, Handle>),
    Object(HashMap<String, Handle>),
}

impl From<&str> for Variant {
    fn from(value: &str) -> Self {
        Variant::String(value.to_string())
    }
}

impl Variant {
    pub fn array(items: impl IntoIterator<Item = Variant>) -> Self {
        Variant::Array(items.into_iter().map(handle).collect())
    }

    pub fn object(fields: impl IntoIterator<Item = (String, Variant)>) -> Self {
        Variant::Object(
            fields
                .into_iter()
                .map(|(k, v)| (k, handle(v)))
                .collect(),
        )
    }

    pub fn map(entries: impl IntoIterator<Item = (Variant, Variant)>) -> Self {
        Variant::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k, handle(v)))
                .collect(),
        )
    }

    pub(crate) fn type_name(&self) -> &'static str {
        match self {
            Variant::Void => "void",
            Variant::I8(_) => "i8",
            Variant::I16(_) => "i16",
            Variant::I32(_) => "i32",
            Variant::I64(_) => "i64",
            Variant::U8(_) => "u8",
            Variant::U16(_) => "u16",
            Variant::U32(_) => "u32",
            Variant::U64(_) => "u64",
            Variant::F32(_) => "f32",
            Variant::F64(_) => "f64",
            Variant::Bool(_) => "bool",
            Variant::String(_) => "string",
            Variant::Array(_) => "array",
            Variant::Map(_) => "map",
            Variant::Object(_) => "object",
        }
    }

    /// Strict typed access: the tag must match exactly, no widening or
    /// narrowing.
    pub fn get<T: VariantGet>(&self) -> Result<T, Error> {
        T::variant_get(self)
    }

    pub fn len(&self) -> Result<usize, Error> {
        match self {
            Variant::Array(items) => Ok(items.len()),
            Variant::Map(entries) => Ok(entries.len()),
            other => Err(Error::Type(format!(
                "{} has no length",
                other.type_name()
            ))),
        }
    }

    pub fn index(&self, index: i64) -> Result<Handle, Error> {
        match self {
            Variant::Array(items) => {
                if index < 0 || index as usize >= items.len() {
                    Err(Error::Index(index))
                } else {
                    Ok(items[index as usize].clone())
                }
            }
            other => Err(Error::Type(format!("{} is not an array", other.type_name()))),
        }
    }

    pub fn field(&self, name: &str) -> Result<Handle, Error> {
        match self {
            Variant::Object(fields) => fields
                .get(name)
                .cloned()
                .ok_or_else(|| Error::Name(name.to_string())),
            other => Err(Error::Type(format!("{} is not an object", other.type_name()))),
        }
    }

    /// Inserts a `Void` default when `name` is missing, then returns the
    /// handle for in-place mutation.
    pub fn field_mut(&mut self, name: &str) -> Result<Handle, Error> {
        match self {
            Variant::Object(fields) => Ok(fields
                .entry(name.to_string())
                .or_insert_with(|| handle(Variant::Void))
                .clone()),
            other => Err(Error::Type(format!("{} is not an object", other.type_name()))),
        }
    }

    pub fn keys(&self) -> Result<Vec<String>, Error> {
        match self {
            Variant::Object(fields) => Ok(fields.keys().cloned().collect()),
            other => Err(Error::Type(format!("{} is not an object", other.type_name()))),
        }
    }

    pub fn to_display_string(&self) -> String {
        match self {
            Variant::Void => "void".to_string(),
            Variant::I8(v) => format!("i8({v})"),
            Variant::I16(v) => format!("i16({v})"),
            Variant::I32(v) => format!("i32({v})"),
            Variant::I64(v) => format!("i64({v})"),
            Variant::U8(v) => format!("u8({v})"),
            Variant::U16(v) => format!("u16({v})"),
            Variant::U32(v) => format!("u32({v})"),
            Variant::U64(v) => format!("u64({v})"),
            Variant::F32(v) => format!("f32({v})"),
            Variant::F64(v) => format!("f64({v})"),
            Variant::Bool(v) => format!("bool({v})"),
            Variant::String(v) => format!("{v:?}"),
            Variant::Array(items) => {
                let inner: Vec<String> = items
                    .iter()
                    .map(|h| h.borrow().to_display_string())
                    .collect();
                format!("[{}]", inner.join(", "))
            }
            Variant::Map(entries) => {
                let inner: Vec<String> = entries
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k.to_display_string(), v.borrow().to_display_string()))
                    .collect();
                format!("{{{}}}", inner.join(", "))
            }
            Variant::Object(fields) => {
                let mut names: Vec<&String> = fields.keys().collect();
                names.sort();
                let inner: Vec<String> = names
                    .iter()
                    .map(|name| format!("{}: {}", name, fields[*name].borrow().to_display_string()))
                    .collect();
                format!("<{}>", inner.join(", "))
            }
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display_string())
    }
}

impl PartialEq for Variant {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Variant::Void, Variant::Void) => true,
            (Variant::I8(a), Variant::I8(b)) => a == b,
            (Variant::I16(a), Variant::I16(b)) => a == b,
            (Variant::I32(a), Variant::I32(b)) => a == b,
            (Variant::I64(a), Variant::I64(b)) => a == b,
            (Variant::U8(a), Variant::U8(b)) => a == b,
            (Variant::U16(a), Variant::U16(b)) => a == b,
            (Variant::U32(a), Variant::U32(b)) => a == b,
            (Variant::U64(a), Variant::U64(b)) => a == b,
            (Variant::F32(a), Variant::F32(b)) => a.to_bits() == b.to_bits(),
            (Variant::F64(a), Variant::F64(b)) => a.to_bits() == b.to_bits(),
            (Variant::Bool(a), Variant::Bool(b)) => a == b,
            (Variant::String(a), Variant::String(b)) => a == b,
            (Variant::Array(a), Variant::Array(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b.iter())
                        .all(|(x, y)| *x.borrow() == *y.borrow())
            }
            (Variant::Map(a), Variant::Map(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).is_some_and(|w| *v.borrow() == *w.borrow()))
            }
            (Variant::Object(a), Variant::Object(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).is_some_and(|w| *v.borrow() == *w.borrow()))
            }
            _ => false,
        }
    }
}

impl Eq for Variant {}

impl Hash for Variant {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Variant::Void => {}
            Variant::I8(v) => v.hash(state),
            Variant::I16(v) => v.hash(state),
            Variant::I32(v) => v.hash(state),
            Variant::I64(v) => v.hash(state),
            Variant::U8(v) => v.hash(state),
            Variant::U16(v) => v.hash(state),
            Variant::U32(v) => v.hash(state),
            Variant::U64(v) => v.hash(state),
            Variant::F32(v) => v.to_bits().hash(state),
            Variant::F64(v) => v.to_bits().hash(state),
            Variant::Bool(v) => v.hash(state),
            Variant::String(v) => v.hash(state),
            Variant::Array(items) => {
                for item in items {
                    item.borrow().hash(state);
                }
            }
            Variant::Map(entries) => {
                let mut hashes: Vec<u64> = entries
                    .iter()
                    .map(|(k, v)| {
                        let mut hasher = std::collections::hash_map::DefaultHasher::new();
                        k.hash(&mut hasher);
                        v.borrow().hash(&mut hasher);
                        hasher.finish()
                    })
                    .collect();
                hashes.sort_unstable();
                hashes.hash(state);
            }
            Variant::Object(fields) => {
                let mut hashes: Vec<u64> = fields
                    .iter()
                    .map(|(k, v)| {
                        let mut hasher = std::collections::hash_map::DefaultHasher::new();
                        k.hash(&mut hasher);
                        v.borrow().hash(&mut hasher);
                        hasher.finish()
                    })
                    .collect();
                hashes.sort_unstable();
                hashes.hash(state);
            }
        }
    }
}

/// Strict typed extraction from a `Variant`. Every impl must fail with
/// `Error::Type` on a tag mismatch rather than attempt a coercion.
pub trait VariantGet: Sized {
    fn variant_get(value: &Variant) -> Result<Self, Error>;
}

macro_rules! impl_variant_get_primitive {
    ($ty:ty, $variant:ident) => {
        impl VariantGet for $ty {
            fn variant_get(value: &Variant) -> Result<Self, Error> {
                match value {
                    Variant::$variant(v) => Ok(*v),
                    other => Err(Error::Type(format!(
                        "expected {}, found {}",
                        stringify!($variant),
                        other.type_name()
                    ))),
                }
            }
        }
    };
}

impl_variant_get_primitive!(i8, I8);
impl_variant_get_primitive!(i16, I16);
impl_variant_get_primitive!(i32, I32);
impl_variant_get_primitive!(i64, I64);
impl_variant_get_primitive!(u8, U8);
impl_variant_get_primitive!(u16, U16);
impl_variant_get_primitive!(u32, U32);
impl_variant_get_primitive!(u64, U64);
impl_variant_get_primitive!(f32, F32);
impl_variant_get_primitive!(f64, F64);
impl_variant_get_primitive!(bool, Bool);

impl VariantGet for () {
    fn variant_get(value: &Variant) -> Result<Self, Error> {
        match value {
            Variant::Void => Ok(()),
            other => Err(Error::Type(format!("expected void, found {}", other.type_name()))),
        }
    }
}

impl VariantGet for String {
    fn variant_get(value: &Variant) -> Result<Self, Error> {
        match value {
            Variant::String(v) => Ok(v.clone()),
            other => Err(Error::Type(format!("expected string, found {}", other.type_name()))),
        }
    }
}

impl<T: VariantGet> VariantGet for Vec<T> {
    fn variant_get(value: &Variant) -> Result<Self, Error> {
        match value {
            Variant::Array(items) => items.iter().map(|h| T::variant_get(&h.borrow())).collect(),
            other => Err(Error::Type(format!("expected array, found {}", other.type_name()))),
        }
    }
}

impl<K, V> VariantGet for HashMap<K, V>
where
    K: VariantGet + Eq + Hash,
    V: VariantGet,
{
    fn variant_get(value: &Variant) -> Result<Self, Error> {
        match value {
            Variant::Map(entries) => entries
                .iter()
                .map(|(k, v)| {
                    let key = K::variant_get(k)?;
                    let value = V::variant_get(&v.borrow())?;
                    Ok((key, value))
                })
                .collect(),
            other => Err(Error::Type(format!("expected map, found {}", other.type_name()))),
        }
    }
}

/// Converts a native value into a `Variant`, the inverse of [`VariantGet`].
pub trait IntoVariant {
    fn into_variant(self) -> Variant;
}

impl IntoVariant for () {
    fn into_variant(self) -> Variant {
        Variant::Void
    }
}

macro_rules! impl_into_variant_primitive {
    ($ty:ty, $variant:ident) => {
        impl IntoVariant for $ty {
            fn into_variant(self) -> Variant {
                Variant::$variant(self)
            }
        }
    };
}

impl_into_variant_primitive!(i8, I8);
impl_into_variant_primitive!(i16, I16);
impl_into_variant_primitive!(i32, I32);
impl_into_variant_primitive!(i64, I64);
impl_into_variant_primitive!(u8, U8);
impl_into_variant_primitive!(u16, U16);
impl_into_variant_primitive!(u32, U32);
impl_into_variant_primitive!(u64, U64);
impl_into_variant_primitive!(f32, F32);
impl_into_variant_primitive!(f64, F64);
impl_into_variant_primitive!(bool, Bool);

impl IntoVariant for String {
    fn into_variant(self) -> Variant {
        Variant::String(self)
    }
}

impl<T: IntoVariant> IntoVariant for Vec<T> {
    fn into_variant(self) -> Variant {
        Variant::array(self.into_iter().map(IntoVariant::into_variant))
    }
}

impl<K, V> IntoVariant for HashMap<K, V>
where
    K: Into<Variant>,
    V: IntoVariant,
{
    fn into_variant(self) -> Variant {
        Variant::map(self.into_iter().map(|(k, v)| (k.into(), v.into_variant())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_get_rejects_mismatched_tag() {
        let value = Variant::I32(42);
        assert!(value.get::<i64>().is_err());
        assert_eq!(value.get::<i32>().unwrap(), 42);
    }

    #[test]
    fn array_index_out_of_range_is_index_error() {
        let array = Variant::array(vec![Variant::I32(1), Variant::I32(2)]);
        assert!(matches!(array.index(5), Err(Error::Index(5))));
        assert!(matches!(array.index(-1), Err(Error::Index(-1))));
    }

    #[test]
    fn object_field_read_miss_is_name_error() {
        let object = Variant::object(vec![("x".to_string(), Variant::I32(1))]);
        assert!(matches!(object.field("y"), Err(Error::Name(_))));
    }

    #[test]
    fn object_field_mut_inserts_default() {
        let mut object = Variant::object(Vec::<(String, Variant)>::new());
        let handle = object.field_mut("y").unwrap();
        assert_eq!(*handle.borrow(), Variant::Void);
        assert!(object.field("y").is_ok());
    }

    #[test]
    fn structural_equality_ignores_allocation_identity() {
        let a = Variant::array(vec![Variant::I32(1), Variant::I32(2)]);
        let b = Variant::array(vec![Variant::I32(1), Variant::I32(2)]);
        assert_eq!(a, b);
    }

    #[test]
    fn variant_can_be_used_as_map_key() {
        let mut map = HashMap::new();
        map.insert(Variant::String("a".to_string()), 1u8);
        assert_eq!(map.get(&Variant::String("a".to_string())), Some(&1));
    }

    #[test]
    fn vec_round_trips_through_variant() {
        let native = vec![1i32, 2, 3];
        let value = native.clone().into_variant();
        let back: Vec<i32> = value.get().unwrap();
        assert_eq!(native, back);
    }
}
