//! The reflective method/argument registry that lets a caller set/get typed parameters
//! on an element without per-element glue.
//!
//! The source text this framework is modelled on lays argument descriptors out as
//! offset-arithmetic over a flat byte buffer. Design Notes §9 of the component spec
//! calls that unsafe to port directly and suggests a typed value model that only drops
//! to the flat layout at the ABI boundary; [`ArgValue`] is that typed model, and
//! [`encode`]/[`decode`] are the boundary functions a caller exchanging raw buffers with
//! `invoke_method` would use.

use std::collections::HashMap;
use std::sync::Arc;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Error, Result};

/// The scalar and aggregate types an argument entry may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgType {
    /// An unsigned 8-bit integer.
    Uint8,
    /// An unsigned 16-bit integer.
    Uint16,
    /// An unsigned 32-bit integer.
    Uint32,
    /// An unsigned 64-bit integer.
    Uint64,
    /// A signed 8-bit integer.
    Int8,
    /// An IEEE-754 single-precision float.
    Float,
    /// A nested descriptor.
    Struct,
    /// A homogeneous run of nested descriptors.
    Array,
}

impl ArgType {
    /// The encoded width in bytes for scalar types; `None` for `Struct`/`Array`, whose
    /// size is the sum of their nested entries.
    pub fn scalar_width(self) -> Option<usize> {
        match self {
            ArgType::Uint8 | ArgType::Int8 => Some(1),
            ArgType::Uint16 => Some(2),
            ArgType::Uint32 | ArgType::Float => Some(4),
            ArgType::Uint64 => Some(8),
            ArgType::Struct | ArgType::Array => None,
        }
    }
}

/// One entry in an [`ArgDescriptor`]: a name, a type tag, and, for `Struct`/`Array`, the
/// nested descriptor it expands to.
#[derive(Debug, Clone)]
pub struct ArgEntry {
    /// The entry's name, as referenced by [`ArgValue::Struct`] fields.
    pub name: String,
    /// The entry's type tag.
    pub ty: ArgType,
    /// For `Array`, how many repetitions of `nested` follow.
    pub count: usize,
    /// The nested descriptor for `Struct`/`Array` entries; `None` for scalars.
    pub nested: Option<Arc<ArgDescriptor>>,
}

impl ArgEntry {
    /// A scalar entry of the given type.
    pub fn scalar(name: impl Into<String>, ty: ArgType) -> Self {
        assert!(ty.scalar_width().is_some(), "scalar() requires a scalar ArgType");
        ArgEntry { name: name.into(), ty, count: 1, nested: None }
    }

    /// A nested-struct entry.
    pub fn structure(name: impl Into<String>, nested: ArgDescriptor) -> Self {
        ArgEntry { name: name.into(), ty: ArgType::Struct, count: 1, nested: Some(Arc::new(nested)) }
    }

    /// A homogeneous array of `count` repetitions of `nested`.
    pub fn array(name: impl Into<String>, count: usize, nested: ArgDescriptor) -> Self {
        ArgEntry { name: name.into(), ty: ArgType::Array, count, nested: Some(Arc::new(nested)) }
    }

    /// The flat byte size this entry occupies, including repetitions.
    fn encoded_size(&self) -> usize {
        match self.ty.scalar_width() {
            Some(width) => width,
            None => {
                let nested = self.nested.as_ref().expect("Struct/Array entry without a nested descriptor");
                nested.encoded_size() * self.count
            }
        }
    }
}

/// A schema describing how a flat byte buffer is laid out: an ordered list of entries.
///
/// Descriptors are reference-copied (`Arc`-cloned) into the element that registers a
/// method against them, so the caller's original descriptor may be dropped or reused
/// freely afterwards.
#[derive(Debug, Clone, Default)]
pub struct ArgDescriptor {
    entries: Vec<ArgEntry>,
}

impl ArgDescriptor {
    /// An empty descriptor.
    pub fn new() -> Self {
        ArgDescriptor { entries: Vec::new() }
    }

    /// Appends an entry, returning `self` for chained construction.
    pub fn with(mut self, entry: ArgEntry) -> Self {
        self.entries.push(entry);
        self
    }

    /// The descriptor's entries, in declared order.
    pub fn entries(&self) -> &[ArgEntry] {
        &self.entries
    }

    /// The flat byte size a buffer conforming to this descriptor must have.
    pub fn encoded_size(&self) -> usize {
        self.entries.iter().map(ArgEntry::encoded_size).sum()
    }
}

/// A typed value conforming to an [`ArgDescriptor`], used in place of raw offset
/// arithmetic on a buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    /// A `Uint8` value.
    Uint8(u8),
    /// A `Uint16` value.
    Uint16(u16),
    /// A `Uint32` value.
    Uint32(u32),
    /// A `Uint64` value.
    Uint64(u64),
    /// An `Int8` value.
    Int8(i8),
    /// A `Float` value.
    Float(f32),
    /// A `Struct` value: named fields matching the nested descriptor's entries.
    Struct(Vec<(String, ArgValue)>),
    /// An `Array` value: a homogeneous run of nested values.
    Array(Vec<ArgValue>),
}

/// Encodes `values` (one per entry of `descriptor`, in order) into the flat byte layout
/// `descriptor` describes.
///
/// # Errors
/// Returns [`Error::InvalidArgument`] if `values` does not have exactly one value per
/// entry, or if a value's shape does not match its entry's type.
pub fn encode(descriptor: &ArgDescriptor, values: &[ArgValue]) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(descriptor.encoded_size());
    encode_entries(descriptor.entries(), values, &mut buf)?;
    Ok(buf)
}

fn encode_entries(entries: &[ArgEntry], values: &[ArgValue], buf: &mut Vec<u8>) -> Result<()> {
    if entries.len() != values.len() {
        return Err(Error::invalid_argument(format!(
            "expected {} values, got {}",
            entries.len(),
            values.len()
        )));
    }
    for (entry, value) in entries.iter().zip(values) {
        encode_one(entry, value, buf)?;
    }
    Ok(())
}

fn encode_one(entry: &ArgEntry, value: &ArgValue, buf: &mut Vec<u8>) -> Result<()> {
    match (entry.ty, value) {
        (ArgType::Uint8, ArgValue::Uint8(v)) => buf.write_u8(*v).expect("Vec<u8> write cannot fail"),
        (ArgType::Uint16, ArgValue::Uint16(v)) => buf.write_u16::<LittleEndian>(*v).expect("Vec<u8> write cannot fail"),
        (ArgType::Uint32, ArgValue::Uint32(v)) => buf.write_u32::<LittleEndian>(*v).expect("Vec<u8> write cannot fail"),
        (ArgType::Uint64, ArgValue::Uint64(v)) => buf.write_u64::<LittleEndian>(*v).expect("Vec<u8> write cannot fail"),
        (ArgType::Int8, ArgValue::Int8(v)) => buf.write_i8(*v).expect("Vec<u8> write cannot fail"),
        (ArgType::Float, ArgValue::Float(v)) => buf.write_f32::<LittleEndian>(*v).expect("Vec<u8> write cannot fail"),
        (ArgType::Struct, _) => {
            let nested = entry.nested.as_ref().expect("Struct entry without nested descriptor");
            encode_against_entries(nested.entries(), value, buf)?;
        }
        (ArgType::Array, ArgValue::Array(items)) => {
            let nested = entry.nested.as_ref().expect("Array entry without nested descriptor");
            if items.len() != entry.count {
                return Err(Error::invalid_argument(format!(
                    "array entry '{}' expected {} items, got {}",
                    entry.name,
                    entry.count,
                    items.len()
                )));
            }
            for item in items {
                encode_against_entries(nested.entries(), item, buf)?;
            }
        }
        _ => return Err(Error::invalid_argument(format!("value shape does not match entry '{}'", entry.name))),
    }
    Ok(())
}

/// Encodes a single value (scalar, or `Struct` with fields matched by name) against a
/// list of entries, used both for `Struct` entries and for each item of an `Array`.
fn encode_against_entries(entries: &[ArgEntry], value: &ArgValue, buf: &mut Vec<u8>) -> Result<()> {
    match value {
        ArgValue::Struct(fields) => {
            let ordered: Vec<ArgValue> = entries
                .iter()
                .map(|entry| {
                    fields
                        .iter()
                        .find(|(name, _)| name == &entry.name)
                        .map(|(_, v)| v.clone())
                        .ok_or_else(|| Error::invalid_argument(format!("missing struct field '{}'", entry.name)))
                })
                .collect::<Result<_>>()?;
            encode_entries(entries, &ordered, buf)
        }
        other if entries.len() == 1 => encode_one(&entries[0], other, buf),
        _ => Err(Error::invalid_argument("value shape does not match nested descriptor")),
    }
}

/// Decodes a flat byte buffer conforming to `descriptor` back into typed values, one per
/// entry, in order.
///
/// # Errors
/// Returns [`Error::InvalidArgument`] if `buffer` is shorter than `descriptor` requires.
pub fn decode(descriptor: &ArgDescriptor, buffer: &[u8]) -> Result<Vec<ArgValue>> {
    let mut cursor = buffer;
    let values = decode_entries(descriptor.entries(), &mut cursor)?;
    Ok(values)
}

fn decode_entries(entries: &[ArgEntry], cursor: &mut &[u8]) -> Result<Vec<ArgValue>> {
    entries.iter().map(|entry| decode_one(entry, cursor)).collect()
}

fn decode_one(entry: &ArgEntry, cursor: &mut &[u8]) -> Result<ArgValue> {
    let too_short = || Error::invalid_argument(format!("buffer too short for entry '{}'", entry.name));
    match entry.ty {
        ArgType::Uint8 => Ok(ArgValue::Uint8(cursor.read_u8().map_err(|_| too_short())?)),
        ArgType::Uint16 => Ok(ArgValue::Uint16(cursor.read_u16::<LittleEndian>().map_err(|_| too_short())?)),
        ArgType::Uint32 => Ok(ArgValue::Uint32(cursor.read_u32::<LittleEndian>().map_err(|_| too_short())?)),
        ArgType::Uint64 => Ok(ArgValue::Uint64(cursor.read_u64::<LittleEndian>().map_err(|_| too_short())?)),
        ArgType::Int8 => Ok(ArgValue::Int8(cursor.read_i8().map_err(|_| too_short())?)),
        ArgType::Float => Ok(ArgValue::Float(cursor.read_f32::<LittleEndian>().map_err(|_| too_short())?)),
        ArgType::Struct => {
            let nested = entry.nested.as_ref().expect("Struct entry without nested descriptor");
            decode_against_entries(nested.entries(), cursor)
        }
        ArgType::Array => {
            let nested = entry.nested.as_ref().expect("Array entry without nested descriptor");
            let mut items = Vec::with_capacity(entry.count);
            for _ in 0..entry.count {
                items.push(decode_against_entries(nested.entries(), cursor)?);
            }
            Ok(ArgValue::Array(items))
        }
    }
}

/// Inverse of [`encode_against_entries`]: a single scalar if `entries` has exactly one
/// entry, otherwise a `Struct` with fields named after `entries`.
fn decode_against_entries(entries: &[ArgEntry], cursor: &mut &[u8]) -> Result<ArgValue> {
    if entries.len() == 1 {
        return decode_one(&entries[0], cursor);
    }
    let values = decode_entries(entries, cursor)?;
    let fields = entries.iter().map(|e| e.name.clone()).zip(values).collect();
    Ok(ArgValue::Struct(fields))
}

/// A method function: given the descriptor it was registered with and a flat buffer,
/// reads or writes the element's parameters.
pub type MethodFn = Arc<dyn Fn(&ArgDescriptor, &[u8]) -> Result<Vec<u8>> + Send + Sync>;

struct MethodEntry {
    descriptor: Arc<ArgDescriptor>,
    invoke: MethodFn,
}

/// Per-element registry of named methods, each bound to an [`ArgDescriptor`] and a
/// [`MethodFn`].
#[derive(Default)]
pub struct MethodRegistry {
    methods: HashMap<String, MethodEntry>,
}

impl MethodRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        MethodRegistry { methods: HashMap::new() }
    }

    /// Registers `name` against `descriptor` and `invoke`, replacing any prior binding.
    pub fn register(&mut self, name: impl Into<String>, descriptor: ArgDescriptor, invoke: MethodFn) {
        self.methods.insert(name.into(), MethodEntry { descriptor: Arc::new(descriptor), invoke });
    }

    /// Looks up `name` and invokes it with `buffer`, returning whatever bytes the
    /// method function produces (empty for a pure setter).
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] if no method is registered under `name`.
    pub fn invoke(&self, name: &str, buffer: &[u8]) -> Result<Vec<u8>> {
        let entry = self.methods.get(name).ok_or_else(|| Error::not_found(format!("method '{name}'")))?;
        (entry.invoke)(&entry.descriptor, buffer)
    }

    /// The descriptor a method was registered with, if any.
    pub fn descriptor(&self, name: &str) -> Option<Arc<ArgDescriptor>> {
        self.methods.get(name).map(|entry| entry.descriptor.clone())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn scalar_round_trips_bit_exactly() {
        let descriptor = ArgDescriptor::new().with(ArgEntry::scalar("gain", ArgType::Uint32));
        let encoded = encode(&descriptor, &[ArgValue::Uint32(441000)]).unwrap();
        let decoded = decode(&descriptor, &encoded).unwrap();
        assert_eq!(decoded, vec![ArgValue::Uint32(441000)]);
    }

    #[test]
    fn nested_struct_round_trips() {
        let inner = ArgDescriptor::new()
            .with(ArgEntry::scalar("rate", ArgType::Uint32))
            .with(ArgEntry::scalar("channels", ArgType::Uint8));
        let outer = ArgDescriptor::new()
            .with(ArgEntry::structure("a", inner.clone()))
            .with(ArgEntry::structure("b", inner))
            .with(ArgEntry::scalar("volume", ArgType::Float));

        let a = ArgValue::Struct(vec![
            ("rate".to_string(), ArgValue::Uint32(48000)),
            ("channels".to_string(), ArgValue::Uint8(2)),
        ]);
        let b = ArgValue::Struct(vec![
            ("rate".to_string(), ArgValue::Uint32(44100)),
            ("channels".to_string(), ArgValue::Uint8(1)),
        ]);
        let values = vec![a, b, ArgValue::Float(0.8)];

        let encoded = encode(&outer, &values).unwrap();
        assert_eq!(encoded.len(), outer.encoded_size());
        let decoded = decode(&outer, &encoded).unwrap();
        assert_eq!(decoded, values);
    }

    #[test]
    fn registry_set_then_get_round_trips() {
        let descriptor = ArgDescriptor::new().with(ArgEntry::scalar("volume", ArgType::Uint8));
        let state = Arc::new(Mutex::new(0u8));

        let mut registry = MethodRegistry::new();
        let set_state = state.clone();
        registry.register(
            "set_args",
            descriptor.clone(),
            Arc::new(move |d, buf| {
                if let ArgValue::Uint8(v) = decode(d, buf)?.remove(0) {
                    *set_state.lock().unwrap() = v;
                }
                Ok(Vec::new())
            }),
        );
        let get_state = state.clone();
        registry.register(
            "get_args",
            descriptor.clone(),
            Arc::new(move |d, _buf| encode(d, &[ArgValue::Uint8(*get_state.lock().unwrap())])),
        );

        let set_buf = encode(&descriptor, &[ArgValue::Uint8(77)]).unwrap();
        registry.invoke("set_args", &set_buf).unwrap();
        let get_buf = registry.invoke("get_args", &[]).unwrap();
        assert_eq!(get_buf, set_buf);
    }

    #[test]
    fn missing_method_is_not_found() {
        let registry = MethodRegistry::new();
        let err = registry.invoke("absent", &[]).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn short_buffer_is_invalid_argument() {
        let descriptor = ArgDescriptor::new().with(ArgEntry::scalar("x", ArgType::Uint32));
        let err = decode(&descriptor, &[0u8, 1]).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }
}
