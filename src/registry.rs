//! The process-wide class registry: field metadata, method metadata, and
//! the factory used to construct fresh instances by registered name.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::error::Error;
use crate::signature::{method_signature, TypeDescriptor};
use crate::variant::Variant;

/// Reads one field out of `&dyn Any` into a `Variant`.
pub type FieldSerializeFn = Box<dyn Fn(&dyn Any) -> Variant + Send + Sync>;
/// Writes one field on `&mut dyn Any` from a `Variant`.
pub type FieldDeserializeFn = Box<dyn Fn(&mut dyn Any, Variant) -> Result<(), Error> + Send + Sync>;
/// Invokes one method on `&mut dyn Any`, given the packed argument array;
/// mutable arguments are back-patched into `argv` in place.
pub type MethodInvokeFn =
    Box<dyn Fn(&mut dyn Any, &mut Variant) -> Result<Variant, Error> + Send + Sync>;
/// Builds a fresh, default-valued instance of the registered class.
pub type FactoryFn = Box<dyn Fn() -> Box<dyn Any + Send + Sync> + Send + Sync>;

pub struct FieldMeta {
    pub name: String,
    pub descriptor: TypeDescriptor,
    pub serialize: FieldSerializeFn,
    pub deserialize: FieldDeserializeFn,
}

pub struct MethodMeta {
    pub name: String,
    pub signature: String,
    pub args: Vec<TypeDescriptor>,
    pub result: TypeDescriptor,
    pub invoke: MethodInvokeFn,
}

/// One registered class: its declared name, field table, method table and
/// instance factory.
pub struct ClassMeta {
    pub name: String,
    pub fields: HashMap<String, FieldMeta>,
    pub methods: HashMap<String, MethodMeta>,
    pub factory: FactoryFn,
}

impl ClassMeta {
    pub fn signature(&self) -> String {
        format!("<{}>", self.name)
    }
}

/// A single field declaration passed to [`register_class`].
pub struct FieldDecl {
    pub name: String,
    pub descriptor: TypeDescriptor,
    pub serialize: FieldSerializeFn,
    pub deserialize: FieldDeserializeFn,
}

/// A single method declaration passed to [`register_class`].
pub struct MethodDecl {
    pub name: String,
    pub args: Vec<TypeDescriptor>,
    pub result: TypeDescriptor,
    pub invoke: MethodInvokeFn,
}

struct ClassRegistryInner {
    classes: HashMap<String, Arc<ClassMeta>>,
}

pub struct ClassRegistry {
    inner: Mutex<ClassRegistryInner>,
}

impl ClassRegistry {
    fn new() -> Self {
        ClassRegistry {
            inner: Mutex::new(ClassRegistryInner {
                classes: HashMap::new(),
            }),
        }
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(name)))]
    pub fn register(
        &self,
        name: &str,
        fields: Vec<FieldDecl>,
        methods: Vec<MethodDecl>,
        factory: FactoryFn,
    ) -> Result<Arc<ClassMeta>, Error> {
        let signature = format!("<{name}>");
        let mut inner = self.inner.lock();
        if inner.classes.contains_key(&signature) {
            return Err(Error::ClassDuplicated(name.to_string()));
        }

        let mut field_table = HashMap::with_capacity(fields.len());
        for field in fields {
            field_table.insert(
                field.name.clone(),
                FieldMeta {
                    name: field.name,
                    descriptor: field.descriptor,
                    serialize: field.serialize,
                    deserialize: field.deserialize,
                },
            );
        }

        let mut method_table = HashMap::with_capacity(methods.len());
        for method in methods {
            let signature = method_signature(&method.name, &method.args, &method.result);
            method_table.insert(
                signature.clone(),
                MethodMeta {
                    name: method.name,
                    signature,
                    args: method.args,
                    result: method.result,
                    invoke: method.invoke,
                },
            );
        }

        let meta = Arc::new(ClassMeta {
            name: name.to_string(),
            fields: field_table,
            methods: method_table,
            factory,
        });
        inner.classes.insert(signature, meta.clone());
        Ok(meta)
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(signature)))]
    pub fn find(&self, signature: &str) -> Result<Arc<ClassMeta>, Error> {
        self.inner
            .lock()
            .classes
            .get(signature)
            .cloned()
            .ok_or_else(|| Error::ClassNotFound(signature.to_string()))
    }

    pub fn find_by_name(&self, name: &str) -> Result<Arc<ClassMeta>, Error> {
        self.find(&format!("<{name}>"))
    }
}

pub static CLASSES: Lazy<ClassRegistry> = Lazy::new(ClassRegistry::new);

pub fn register_class(
    name: &str,
    fields: Vec<FieldDecl>,
    methods: Vec<MethodDecl>,
    factory: FactoryFn,
) -> Result<Arc<ClassMeta>, Error> {
    CLASSES.register(name, fields, methods, factory)
}

pub fn find_class(signature: &str) -> Result<Arc<ClassMeta>, Error> {
    CLASSES.find(signature)
}
