//! Pluggable byte codecs and the MessagePack-compatible default codec.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::buffer::ByteBuffer;
use crate::error::Error;
use crate::variant::Variant;

/// Converts a `Variant` tree to and from a byte sequence.
pub trait Codec: Send + Sync {
    fn name(&self) -> &str;
    fn parse(&self, bytes: &[u8]) -> Result<Variant, Error>;
    fn assemble(&self, value: &Variant) -> Result<Vec<u8>, Error>;
}

struct CodecRegistryInner {
    codecs: HashMap<String, Arc<dyn Codec>>,
    default: Option<String>,
}

/// Process-wide `name -> Codec` map plus a designated default entry.
pub struct CodecRegistry {
    inner: Mutex<CodecRegistryInner>,
}

impl CodecRegistry {
    fn new() -> Self {
        CodecRegistry {
            inner: Mutex::new(CodecRegistryInner {
                codecs: HashMap::new(),
                default: None,
            }),
        }
    }

    pub fn register(&self, codec: Arc<dyn Codec>, make_default: bool) -> Result<(), Error> {
        let mut inner = self.inner.lock();
        let name = codec.name().to_string();
        if inner.codecs.contains_key(&name) {
            return Err(Error::BackendDuplicated(name));
        }
        inner.codecs.insert(name.clone(), codec);
        if make_default || inner.default.is_none() {
            inner.default = Some(name);
        }
        Ok(())
    }

    pub fn find(&self, name: &str) -> Result<Arc<dyn Codec>, Error> {
        self.inner
            .lock()
            .codecs
            .get(name)
            .cloned()
            .ok_or_else(|| Error::BackendNotFound(name.to_string()))
    }

    pub fn default_codec(&self) -> Result<Arc<dyn Codec>, Error> {
        let inner = self.inner.lock();
        let name = inner
            .default
            .as_ref()
            .ok_or_else(|| Error::BackendNotFound("default".to_string()))?;
        inner
            .codecs
            .get(name)
            .cloned()
            .ok_or_else(|| Error::BackendNotFound(name.clone()))
    }
}

pub static CODECS: Lazy<CodecRegistry> = Lazy::new(|| {
    let registry = CodecRegistry::new();
    registry
        .register(Arc::new(MessagePackCodec), true)
        .expect("registering the built-in messagepack codec cannot fail");
    registry
});

mod prefix {
    pub const NIL: u8 = 0xc0;
    pub const FALSE: u8 = 0xc2;
    pub const TRUE: u8 = 0xc3;
    pub const F32: u8 = 0xca;
    pub const F64: u8 = 0xcb;
    pub const U8: u8 = 0xcc;
    pub const U16: u8 = 0xcd;
    pub const U32: u8 = 0xce;
    pub const U64: u8 = 0xcf;
    pub const I8: u8 = 0xd0;
    pub const I16: u8 = 0xd1;
    pub const I32: u8 = 0xd2;
    pub const I64: u8 = 0xd3;
    pub const STR8: u8 = 0xd9;
    pub const STR16: u8 = 0xda;
    pub const STR32: u8 = 0xdb;
    pub const ARRAY16: u8 = 0xdc;
    pub const ARRAY32: u8 = 0xdd;
    pub const MAP16: u8 = 0xde;
    pub const MAP32: u8 = 0xdf;

    pub const FIXMAP_MIN: u8 = 0x80;
    pub const FIXMAP_MAX: u8 = 0x8f;
    pub const FIXARRAY_MIN: u8 = 0x90;
    pub const FIXARRAY_MAX: u8 = 0x9f;
    pub const FIXSTR_MIN: u8 = 0xa0;
    pub const FIXSTR_MAX: u8 = 0xbf;
    pub const POSITIVE_FIXINT_MAX: u8 = 0x7f;
    pub const NEGATIVE_FIXINT_MIN: u8 = 0xe0;
}

/// The default wire codec: a MessagePack-compatible byte format.
pub struct MessagePackCodec;

impl Codec for MessagePackCodec {
    fn name(&self) -> &str {
        "messagepack"
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    fn parse(&self, bytes: &[u8]) -> Result<Variant, Error> {
        let mut buffer = ByteBuffer::from_vec(bytes.to_vec());
        let value = parse_value(&mut buffer)?;
        Ok(value)
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    fn assemble(&self, value: &Variant) -> Result<Vec<u8>, Error> {
        let mut buffer = ByteBuffer::new();
        assemble_value(value, &mut buffer)?;
        Ok(buffer.into_vec())
    }
}

fn parse_value(buffer: &mut ByteBuffer) -> Result<Variant, Error> {
    let tag = buffer.consume_u8()?;
    match tag {
        0x00..=prefix::POSITIVE_FIXINT_MAX => Ok(Variant::I8(tag as i8)),
        prefix::NEGATIVE_FIXINT_MIN..=0xff => Ok(Variant::I8(tag as i8)),
        prefix::FIXMAP_MIN..=prefix::FIXMAP_MAX => {
            parse_object(buffer, (tag - prefix::FIXMAP_MIN) as usize)
        }
        prefix::FIXARRAY_MIN..=prefix::FIXARRAY_MAX => {
            parse_array(buffer, (tag - prefix::FIXARRAY_MIN) as usize)
        }
        prefix::FIXSTR_MIN..=prefix::FIXSTR_MAX => {
            parse_str(buffer, (tag - prefix::FIXSTR_MIN) as usize)
        }
        prefix::NIL => Ok(Variant::Void),
        prefix::FALSE => Ok(Variant::Bool(false)),
        prefix::TRUE => Ok(Variant::Bool(true)),
        prefix::F32 => Ok(Variant::F32(f32::from_be_bytes(buffer.consume_be::<4>()?))),
        prefix::F64 => Ok(Variant::F64(f64::from_be_bytes(buffer.consume_be::<8>()?))),
        prefix::U8 => Ok(Variant::U8(buffer.consume_u8()?)),
        prefix::U16 => Ok(Variant::U16(u16::from_be_bytes(buffer.consume_be::<2>()?))),
        prefix::U32 => Ok(Variant::U32(u32::from_be_bytes(buffer.consume_be::<4>()?))),
        prefix::U64 => Ok(Variant::U64(u64::from_be_bytes(buffer.consume_be::<8>()?))),
        prefix::I8 => Ok(Variant::I8(buffer.consume_u8()? as i8)),
        prefix::I16 => Ok(Variant::I16(i16::from_be_bytes(buffer.consume_be::<2>()?))),
        prefix::I32 => Ok(Variant::I32(i32::from_be_bytes(buffer.consume_be::<4>()?))),
        prefix::I64 => Ok(Variant::I64(i64::from_be_bytes(buffer.consume_be::<8>()?))),
        prefix::STR8 => {
            let len = buffer.consume_u8()? as usize;
            parse_str(buffer, len)
        }
        prefix::STR16 => {
            let len = u16::from_be_bytes(buffer.consume_be::<2>()?) as usize;
            parse_str(buffer, len)
        }
        prefix::STR32 => {
            let len = u32::from_be_bytes(buffer.consume_be::<4>()?) as usize;
            parse_str(buffer, len)
        }
        prefix::ARRAY16 => {
            let len = u16::from_be_bytes(buffer.consume_be::<2>()?) as usize;
            parse_array(buffer, len)
        }
        prefix::ARRAY32 => {
            let len = u32::from_be_bytes(buffer.consume_be::<4>()?) as usize;
            parse_array(buffer, len)
        }
        prefix::MAP16 => {
            let len = u16::from_be_bytes(buffer.consume_be::<2>()?) as usize;
            parse_object(buffer, len)
        }
        prefix::MAP32 => {
            let len = u32::from_be_bytes(buffer.consume_be::<4>()?) as usize;
            parse_object(buffer, len)
        }
        other => Err(Error::Deserializer(format!(
            "unsupported or reserved leading byte 0x{other:02x}"
        ))),
    }
}

fn parse_str(buffer: &mut ByteBuffer, len: usize) -> Result<Variant, Error> {
    let bytes = buffer.consume(len)?;
    let s = std::str::from_utf8(bytes)
        .map_err(|e| Error::Deserializer(format!("invalid utf-8 string: {e}")))?;
    Ok(Variant::String(s.to_string()))
}

fn parse_array(buffer: &mut ByteBuffer, len: usize) -> Result<Variant, Error> {
    let mut items = Vec::with_capacity(len);
    for _ in 0..len {
        items.push(parse_value(buffer)?);
    }
    Ok(Variant::array(items))
}

/// A wire fixmap/map16/map32 carries no tag distinguishing a `Variant::Map`
/// from a `Variant::Object` — both assemble to the same string-keyed map
/// family (see `assemble_value`'s `Object` arm and `assemble_map`). Parsing
/// always reconstructs an `Object`, matching the original backend's
/// `doParse`, which only ever builds a struct for this wire shape; a
/// `Variant::Map` does not round-trip back to a `Map` through this codec.
fn parse_object(buffer: &mut ByteBuffer, len: usize) -> Result<Variant, Error> {
    let mut fields = Vec::with_capacity(len);
    for _ in 0..len {
        let key = parse_value(buffer)?;
        let name = match key {
            Variant::String(s) => s,
            other => {
                return Err(Error::Deserializer(format!(
                    "map keys must be strings on the wire, found {}",
                    other.type_name()
                )))
            }
        };
        let value = parse_value(buffer)?;
        fields.push((name, value));
    }
    Ok(Variant::object(fields))
}

fn assemble_value(value: &Variant, buffer: &mut ByteBuffer) -> Result<(), Error> {
    match value {
        Variant::Void => buffer.append_u8(prefix::NIL),
        Variant::Bool(false) => buffer.append_u8(prefix::FALSE),
        Variant::Bool(true) => buffer.append_u8(prefix::TRUE),
        Variant::I8(v) => assemble_i8(*v, buffer),
        Variant::I16(v) => {
            buffer.append_u8(prefix::I16);
            buffer.append_be(v.to_be_bytes());
        }
        Variant::I32(v) => {
            buffer.append_u8(prefix::I32);
            buffer.append_be(v.to_be_bytes());
        }
        Variant::I64(v) => {
            buffer.append_u8(prefix::I64);
            buffer.append_be(v.to_be_bytes());
        }
        Variant::U8(v) => {
            buffer.append_u8(prefix::U8);
            buffer.append_u8(*v);
        }
        Variant::U16(v) => {
            buffer.append_u8(prefix::U16);
            buffer.append_be(v.to_be_bytes());
        }
        Variant::U32(v) => {
            buffer.append_u8(prefix::U32);
            buffer.append_be(v.to_be_bytes());
        }
        Variant::U64(v) => {
            buffer.append_u8(prefix::U64);
            buffer.append_be(v.to_be_bytes());
        }
        Variant::F32(v) => {
            buffer.append_u8(prefix::F32);
            buffer.append_be(v.to_be_bytes());
        }
        Variant::F64(v) => {
            buffer.append_u8(prefix::F64);
            buffer.append_be(v.to_be_bytes());
        }
        Variant::String(s) => assemble_str(s, buffer)?,
        Variant::Array(items) => assemble_array(items, buffer)?,
        Variant::Map(entries) => assemble_map(entries.iter().map(|(k, v)| (k, v)), buffer)?,
        Variant::Object(fields) => {
            let mut names: Vec<&String> = fields.keys().collect();
            names.sort();
            assemble_len_prefixed_map(names.len(), buffer)?;
            for name in names {
                assemble_str(name, buffer)?;
                assemble_value(&fields[name].borrow(), buffer)?;
            }
        }
    }
    Ok(())
}

fn assemble_i8(v: i8, buffer: &mut ByteBuffer) {
    if (-32..=127).contains(&v) {
        buffer.append_u8(v as u8);
    } else {
        buffer.append_u8(prefix::I8);
        buffer.append_u8(v as u8);
    }
}

fn assemble_str(s: &str, buffer: &mut ByteBuffer) -> Result<(), Error> {
    let bytes = s.as_bytes();
    let len = bytes.len();
    if len <= 31 {
        buffer.append_u8(prefix::FIXSTR_MIN + len as u8);
    } else if len <= u8::MAX as usize {
        buffer.append_u8(prefix::STR8);
        buffer.append_u8(len as u8);
    } else if len <= u16::MAX as usize {
        buffer.append_u8(prefix::STR16);
        buffer.append_be((len as u16).to_be_bytes());
    } else if len <= u32::MAX as usize {
        buffer.append_u8(prefix::STR32);
        buffer.append_be((len as u32).to_be_bytes());
    } else {
        return Err(Error::Serializer(format!("string too long: {len} bytes")));
    }
    buffer.append(bytes);
    Ok(())
}

fn assemble_array(items: &[crate::variant::Handle], buffer: &mut ByteBuffer) -> Result<(), Error> {
    let len = items.len();
    if len <= 15 {
        buffer.append_u8(prefix::FIXARRAY_MIN + len as u8);
    } else if len <= u16::MAX as usize {
        buffer.append_u8(prefix::ARRAY16);
        buffer.append_be((len as u16).to_be_bytes());
    } else if len <= u32::MAX as usize {
        buffer.append_u8(prefix::ARRAY32);
        buffer.append_be((len as u32).to_be_bytes());
    } else {
        return Err(Error::Serializer(format!("array too long: {len} items")));
    }
    for item in items {
        assemble_value(&item.borrow(), buffer)?;
    }
    Ok(())
}

fn assemble_map<'a>(
    entries: impl ExactSizeIterator<Item = (&'a Variant, &'a crate::variant::Handle)>,
    buffer: &mut ByteBuffer,
) -> Result<(), Error> {
    assemble_len_prefixed_map(entries.len(), buffer)?;
    for (key, value) in entries {
        match key {
            Variant::String(s) => assemble_str(s, buffer)?,
            other => {
                return Err(Error::Serializer(format!(
                    "map keys must be strings on the wire, found {}",
                    other.type_name()
                )))
            }
        }
        assemble_value(&value.borrow(), buffer)?;
    }
    Ok(())
}

fn assemble_len_prefixed_map(len: usize, buffer: &mut ByteBuffer) -> Result<(), Error> {
    if len <= 15 {
        buffer.append_u8(prefix::FIXMAP_MIN + len as u8);
    } else if len <= u16::MAX as usize {
        buffer.append_u8(prefix::MAP16);
        buffer.append_be((len as u16).to_be_bytes());
    } else if len <= u32::MAX as usize {
        buffer.append_u8(prefix::MAP32);
        buffer.append_be((len as u32).to_be_bytes());
    } else {
        return Err(Error::Serializer(format!("map too large: {len} entries")));
    }
    Ok(())
}
