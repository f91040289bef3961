//! Type descriptors and the structural signature grammar used to key
//! classes and methods in the registry.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// The shape of a value, independent of whether it is held by value or by
/// mutable reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeKind {
    Void,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Bool,
    String,
    Array(Box<TypeDescriptor>),
    Map(Box<TypeDescriptor>, Box<TypeDescriptor>),
    Object(String),
}

/// A `TypeKind` plus the mutability flag carried by the trailing `&` token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeDescriptor {
    kind: TypeKind,
    mutable: bool,
}

impl TypeDescriptor {
    pub fn new(kind: TypeKind, mutable: bool) -> Self {
        if mutable {
            assert!(
                kind != TypeKind::Void,
                "void cannot be declared as a mutable reference"
            );
        }
        TypeDescriptor { kind, mutable }
    }

    pub fn immutable(kind: TypeKind) -> Self {
        TypeDescriptor::new(kind, false)
    }

    pub fn mutable(kind: TypeKind) -> Self {
        TypeDescriptor::new(kind, true)
    }

    pub fn kind(&self) -> &TypeKind {
        &self.kind
    }

    pub fn is_mutable(&self) -> bool {
        self.mutable
    }

    /// Emits the compact signature token for this descriptor.
    pub fn to_signature(&self) -> String {
        let mut out = String::new();
        write_kind(&self.kind, &mut out);
        if self.mutable {
            out.push('&');
        }
        out
    }
}

fn write_kind(kind: &TypeKind, out: &mut String) {
    match kind {
        TypeKind::Void => out.push('v'),
        TypeKind::I8 => out.push('b'),
        TypeKind::I16 => out.push('h'),
        TypeKind::I32 => out.push('i'),
        TypeKind::I64 => out.push('q'),
        TypeKind::U8 => out.push('B'),
        TypeKind::U16 => out.push('H'),
        TypeKind::U32 => out.push('I'),
        TypeKind::U64 => out.push('Q'),
        TypeKind::F32 => out.push('f'),
        TypeKind::F64 => out.push('d'),
        TypeKind::Bool => out.push('?'),
        TypeKind::String => out.push('s'),
        TypeKind::Array(elem) => {
            out.push('[');
            write_kind(&elem.kind, out);
            out.push(']');
        }
        TypeKind::Map(key, value) => {
            out.push('{');
            write_kind(&key.kind, out);
            out.push(':');
            write_kind(&value.kind, out);
            out.push('}');
        }
        TypeKind::Object(name) => {
            out.push('<');
            out.push_str(name);
            out.push('>');
        }
    }
}

/// Builds the dispatch key `name(sig0 sig1 ...)sigret`.
pub fn method_signature(name: &str, args: &[TypeDescriptor], ret: &TypeDescriptor) -> String {
    let mut out = String::new();
    out.push_str(name);
    out.push('(');
    for arg in args {
        let _ = write!(out, "{}", arg.to_signature());
    }
    out.push(')');
    out.push_str(&ret.to_signature());
    out
}

/// Recursive-descent parser over the signature grammar.
pub fn parse(signature: &str) -> Result<TypeDescriptor, Error> {
    let mut chars = signature.chars().peekable();
    let descriptor = parse_descriptor(&mut chars)?;
    if chars.next().is_some() {
        return Err(Error::Value(format!(
            "trailing characters after signature: {signature}"
        )));
    }
    Ok(descriptor)
}

fn parse_descriptor(
    chars: &mut std::iter::Peekable<std::str::Chars>,
) -> Result<TypeDescriptor, Error> {
    let kind = parse_kind(chars)?;
    let mutable = matches!(chars.peek(), Some('&'));
    if mutable {
        chars.next();
    }
    Ok(TypeDescriptor::new(kind, mutable))
}

fn parse_kind(chars: &mut std::iter::Peekable<std::str::Chars>) -> Result<TypeKind, Error> {
    let c = chars
        .next()
        .ok_or_else(|| Error::Value("unexpected end of signature".to_string()))?;
    let kind = match c {
        'v' => TypeKind::Void,
        'b' => TypeKind::I8,
        'h' => TypeKind::I16,
        'i' => TypeKind::I32,
        'q' => TypeKind::I64,
        'B' => TypeKind::U8,
        'H' => TypeKind::U16,
        'I' => TypeKind::U32,
        'Q' => TypeKind::U64,
        'f' => TypeKind::F32,
        'd' => TypeKind::F64,
        '?' => TypeKind::Bool,
        's' => TypeKind::String,
        '[' => {
            let elem = parse_descriptor(chars)?;
            expect(chars, ']')?;
            TypeKind::Array(Box::new(elem))
        }
        '{' => {
            let key = parse_descriptor(chars)?;
            expect(chars, ':')?;
            let value = parse_descriptor(chars)?;
            expect(chars, '}')?;
            TypeKind::Map(Box::new(key), Box::new(value))
        }
        '<' => {
            let mut name = String::new();
            loop {
                match chars.next() {
                    Some('>') => break,
                    Some(ch) => name.push(ch),
                    None => {
                        return Err(Error::Value("unterminated object signature".to_string()))
                    }
                }
            }
            TypeKind::Object(name)
        }
        other => return Err(Error::Value(format!("unexpected signature token: {other}"))),
    };
    Ok(kind)
}

fn expect(chars: &mut std::iter::Peekable<std::str::Chars>, expected: char) -> Result<(), Error> {
    match chars.next() {
        Some(c) if c == expected => Ok(()),
        Some(c) => Err(Error::Value(format!(
            "expected '{expected}', found '{c}'"
        ))),
        None => Err(Error::Value(format!(
            "expected '{expected}', found end of signature"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_primitives() {
        for (kind, token) in [
            (TypeKind::Void, "v"),
            (TypeKind::I8, "b"),
            (TypeKind::U64, "Q"),
            (TypeKind::F64, "d"),
            (TypeKind::Bool, "?"),
            (TypeKind::String, "s"),
        ] {
            let descriptor = TypeDescriptor::immutable(kind.clone());
            assert_eq!(descriptor.to_signature(), token);
            assert_eq!(parse(token).unwrap(), descriptor);
        }
    }

    #[test]
    fn round_trips_containers() {
        let array = TypeDescriptor::immutable(TypeKind::Array(Box::new(
            TypeDescriptor::immutable(TypeKind::I32),
        )));
        assert_eq!(array.to_signature(), "[i]");
        assert_eq!(parse("[i]").unwrap(), array);

        let map = TypeDescriptor::immutable(TypeKind::Map(
            Box::new(TypeDescriptor::immutable(TypeKind::String)),
            Box::new(TypeDescriptor::immutable(TypeKind::I32)),
        ));
        assert_eq!(map.to_signature(), "{s:i}");
        assert_eq!(parse("{s:i}").unwrap(), map);

        let object = TypeDescriptor::immutable(TypeKind::Object("Point".to_string()));
        assert_eq!(object.to_signature(), "<Point>");
        assert_eq!(parse("<Point>").unwrap(), object);
    }

    #[test]
    fn mutable_flag_round_trips() {
        let descriptor = TypeDescriptor::mutable(TypeKind::Array(Box::new(
            TypeDescriptor::immutable(TypeKind::I32),
        )));
        assert_eq!(descriptor.to_signature(), "[i]&");
        assert_eq!(parse("[i]&").unwrap(), descriptor);
    }

    #[test]
    fn method_signature_has_no_spaces() {
        let args = vec![
            TypeDescriptor::immutable(TypeKind::I32),
            TypeDescriptor::mutable(TypeKind::Array(Box::new(TypeDescriptor::immutable(
                TypeKind::I32,
            )))),
        ];
        let ret = TypeDescriptor::immutable(TypeKind::Void);
        let sig = method_signature("push", &args, &ret);
        assert_eq!(sig, "push(i[i]&)v");
    }

    #[test]
    fn rejects_trailing_garbage() {
        assert!(parse("ii").is_err());
    }

    #[test]
    #[should_panic]
    fn void_cannot_be_mutable() {
        TypeDescriptor::mutable(TypeKind::Void);
    }

    #[test]
    fn descriptor_round_trips_through_serde_json() {
        let descriptor = TypeDescriptor::mutable(TypeKind::Array(Box::new(
            TypeDescriptor::immutable(TypeKind::Object("Point".to_string())),
        )));
        let json = serde_json::to_string(&descriptor).unwrap();
        let back: TypeDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(descriptor, back);
    }
}
