//! The method dispatcher: unpacks a packed argument `Variant` into typed
//! natives, invokes the native method, and back-patches mutable arguments.

use std::marker::PhantomData;

use crate::error::Error;
use crate::object::{object_from_variant, ReflectObject};
use crate::variant::{IntoVariant, Variant, VariantGet};

/// One argument position's extraction and write-back policy.
///
/// `extract` reads the native value out of the packed `argv[i]`.
/// `write_back`, when it returns `Ok(Some(_))`, replaces `argv[i]` after the
/// call regardless of whether the native method actually mutated its
/// argument; the policy is keyed on the *declared* argument kind, not on
/// observed mutation. The declared `TypeDescriptor` for each position lives
/// in the class's registered `MethodMeta`, not here.
///
/// `write_back` returns `Result` rather than a bare `Option` because
/// re-serializing a mutated value can itself fail (an object's field
/// serializer can error); that failure must propagate to the caller, not
/// be swallowed into a no-op write-back.
pub trait ArgSlot {
    type Native;

    fn extract(value: &Variant) -> Result<Self::Native, Error>;
    fn write_back(_native: &Self::Native) -> Result<Option<Variant>, Error> {
        Ok(None)
    }
}

/// An immutable primitive, string, array or map argument.
pub struct Imm<T>(PhantomData<T>);

impl<T: VariantGet> ArgSlot for Imm<T> {
    type Native = T;

    fn extract(value: &Variant) -> Result<Self::Native, Error> {
        T::variant_get(value)
    }
}

/// A mutable-reference primitive, array or map argument: the native value
/// is re-serialized back into `argv` after the call unconditionally.
pub struct Mut<T>(PhantomData<T>);

impl<T: VariantGet + IntoVariant + Clone> ArgSlot for Mut<T> {
    type Native = T;

    fn extract(value: &Variant) -> Result<Self::Native, Error> {
        T::variant_get(value)
    }

    fn write_back(native: &Self::Native) -> Result<Option<Variant>, Error> {
        Ok(Some(native.clone().into_variant()))
    }
}

/// A value-typed (by-value, non-reference) registered object argument.
pub struct ImmObject<T>(PhantomData<T>);

impl<T: ReflectObject + Default + Clone> ArgSlot for ImmObject<T> {
    type Native = T;

    fn extract(value: &Variant) -> Result<Self::Native, Error> {
        object_from_variant(value)
    }
}

/// A mutable-reference registered object argument: re-serialized back into
/// `argv` after the call unconditionally.
pub struct MutObject<T>(PhantomData<T>);

impl<T: ReflectObject + Default + Clone> ArgSlot for MutObject<T> {
    type Native = T;

    fn extract(value: &Variant) -> Result<Self::Native, Error> {
        object_from_variant(value)
    }

    fn write_back(native: &Self::Native) -> Result<Option<Variant>, Error> {
        native.serialize().map(Some)
    }
}

fn argv_as_array(argv: &Variant, expected: usize) -> Result<(), Error> {
    let len = argv.len().map_err(|_| {
        Error::Argument(format!(
            "expected an argument array of length {expected}, found {}",
            argv.type_name()
        ))
    })?;
    if len != expected {
        return Err(Error::Argument(format!(
            "expected {expected} arguments, found {len}"
        )));
    }
    Ok(())
}

fn patch(argv: &mut Variant, index: i64, replacement: Option<Variant>) -> Result<(), Error> {
    if let Some(replacement) = replacement {
        let handle = argv.index(index)?;
        *handle.borrow_mut() = replacement;
    }
    Ok(())
}

pub fn invoke_0<R>(
    call: impl FnOnce() -> R,
    argv: &mut Variant,
) -> Result<Variant, Error>
where
    R: IntoVariant,
{
    argv_as_array(argv, 0)?;
    Ok(call().into_variant())
}

pub fn invoke_1<A0, R>(
    call: impl FnOnce(&mut A0::Native) -> R,
    argv: &mut Variant,
) -> Result<Variant, Error>
where
    A0: ArgSlot,
    R: IntoVariant,
{
    argv_as_array(argv, 1)?;
    let mut a0 = A0::extract(&argv.index(0)?.borrow())?;
    let result = call(&mut a0).into_variant();
    patch(argv, 0, A0::write_back(&a0)?)?;
    Ok(result)
}

pub fn invoke_2<A0, A1, R>(
    call: impl FnOnce(&mut A0::Native, &mut A1::Native) -> R,
    argv: &mut Variant,
) -> Result<Variant, Error>
where
    A0: ArgSlot,
    A1: ArgSlot,
    R: IntoVariant,
{
    argv_as_array(argv, 2)?;
    let mut a0 = A0::extract(&argv.index(0)?.borrow())?;
    let mut a1 = A1::extract(&argv.index(1)?.borrow())?;
    let result = call(&mut a0, &mut a1).into_variant();
    patch(argv, 0, A0::write_back(&a0)?)?;
    patch(argv, 1, A1::write_back(&a1)?)?;
    Ok(result)
}

pub fn invoke_3<A0, A1, A2, R>(
    call: impl FnOnce(&mut A0::Native, &mut A1::Native, &mut A2::Native) -> R,
    argv: &mut Variant,
) -> Result<Variant, Error>
where
    A0: ArgSlot,
    A1: ArgSlot,
    A2: ArgSlot,
    R: IntoVariant,
{
    argv_as_array(argv, 3)?;
    let mut a0 = A0::extract(&argv.index(0)?.borrow())?;
    let mut a1 = A1::extract(&argv.index(1)?.borrow())?;
    let mut a2 = A2::extract(&argv.index(2)?.borrow())?;
    let result = call(&mut a0, &mut a1, &mut a2).into_variant();
    patch(argv, 0, A0::write_back(&a0)?)?;
    patch(argv, 1, A1::write_back(&a1)?)?;
    patch(argv, 2, A2::write_back(&a2)?)?;
    Ok(result)
}

pub fn invoke_4<A0, A1, A2, A3, R>(
    call: impl FnOnce(&mut A0::Native, &mut A1::Native, &mut A2::Native, &mut A3::Native) -> R,
    argv: &mut Variant,
) -> Result<Variant, Error>
where
    A0: ArgSlot,
    A1: ArgSlot,
    A2: ArgSlot,
    A3: ArgSlot,
    R: IntoVariant,
{
    argv_as_array(argv, 4)?;
    let mut a0 = A0::extract(&argv.index(0)?.borrow())?;
    let mut a1 = A1::extract(&argv.index(1)?.borrow())?;
    let mut a2 = A2::extract(&argv.index(2)?.borrow())?;
    let mut a3 = A3::extract(&argv.index(3)?.borrow())?;
    let result = call(&mut a0, &mut a1, &mut a2, &mut a3).into_variant();
    patch(argv, 0, A0::write_back(&a0)?)?;
    patch(argv, 1, A1::write_back(&a1)?)?;
    patch(argv, 2, A2::write_back(&a2)?)?;
    patch(argv, 3, A3::write_back(&a3)?)?;
    Ok(result)
}
