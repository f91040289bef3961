//! Reflection-driven serialization and method-dispatch runtime.
//!
//! A declared type's fields and methods are registered once, by name, with
//! the process-wide [`registry`]. From then on, field values travel as a
//! uniform [`variant::Variant`] tree, methods are looked up and invoked by
//! their structural [`signature`], and a pluggable [`codec`] converts
//! between a `Variant` tree and bytes for the wire. [`call_site`] and
//! [`proxy`] connect a client-side mirror to a registered object, whether
//! local or (through a custom `CallSite`) remote.

pub mod buffer;
pub mod call_site;
pub mod codec;
pub mod dispatch;
pub mod error;
pub mod object;
pub mod proxy;
pub mod registry;
pub mod signature;
pub mod variant;

pub use error::{Error, Result};
pub use object::ReflectObject;
pub use signature::{TypeDescriptor, TypeKind};
pub use variant::{IntoVariant, Variant, VariantGet};
