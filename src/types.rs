//! Core document types: identifiers, values, fields, and documents.

use crate::codec::{BinaryCodec, CodecError, CodecResult};
use crate::error::SchemaError;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::io::{Read, Write};

/// Document identifier within a store, assigned incrementally from 0.
///
/// A single store holds at most 2^31 documents.
pub type DocId = u32;

/// Dense index of a field within a schema, in declaration order.
pub type FieldId = u32;

/// Wire tag for text values.
const TEXT_TAG: u32 = 0;
/// Wire tag for u32 values.
const U32_TAG: u32 = 1;

/// A field's payload.
///
/// The tag space on disk is fixed to these two variants; adding one is a
/// breaking wire change.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Value {
    /// UTF-8 text.
    Text(String),
    /// Unsigned 32-bit integer.
    U32(u32),
}

impl Value {
    /// The text payload, if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            Value::U32(_) => None,
        }
    }

    /// The numeric payload, if this is a u32 value.
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Value::Text(_) => None,
            Value::U32(value) => Some(*value),
        }
    }
}

/// A (field id, value) pair contained in a document.
///
/// Equality, ordering, and hashing are by id only: two fields with the same
/// id are the same field.
#[derive(Debug, Clone)]
pub struct Field {
    id: FieldId,
    value: Value,
}

impl Field {
    /// Create a field from an id and a value.
    pub fn new(id: FieldId, value: Value) -> Field {
        Field { id, value }
    }

    /// Create a text field.
    pub fn text(id: FieldId, text: impl Into<String>) -> Field {
        Field::new(id, Value::Text(text.into()))
    }

    /// Create a u32 field.
    pub fn u32(id: FieldId, value: u32) -> Field {
        Field::new(id, Value::U32(value))
    }

    /// The field id.
    pub fn id(&self) -> FieldId {
        self.id
    }

    /// The field value.
    pub fn value(&self) -> &Value {
        &self.value
    }
}

impl PartialEq for Field {
    fn eq(&self, other: &Field) -> bool {
        self.id == other.id
    }
}

impl Eq for Field {}

impl PartialOrd for Field {
    fn partial_cmp(&self, other: &Field) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Field {
    fn cmp(&self, other: &Field) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}

impl Hash for Field {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl BinaryCodec for Field {
    fn encode<W: Write>(&self, writer: &mut W) -> CodecResult<u64> {
        match &self.value {
            Value::Text(text) => {
                let mut written = TEXT_TAG.encode(writer)?;
                written += self.id.encode(writer)?;
                written += text.encode(writer)?;
                Ok(written)
            }
            Value::U32(value) => {
                let mut written = U32_TAG.encode(writer)?;
                written += self.id.encode(writer)?;
                written += value.encode(writer)?;
                Ok(written)
            }
        }
    }

    fn decode<R: Read>(reader: &mut R) -> CodecResult<Field> {
        let tag = u32::decode(reader)?;
        let id = FieldId::decode(reader)?;
        let value = match tag {
            TEXT_TAG => Value::Text(String::decode(reader)?),
            U32_TAG => Value::U32(u32::decode(reader)?),
            other => return Err(CodecError::decode(format!("invalid field tag {other}"))),
        };
        Ok(Field { id, value })
    }
}

/// An unordered multiset of fields; the unit of storage and retrieval.
///
/// The same field id may appear any number of times. Sorting by id is
/// memoized: a sorted document stays sorted until the next mutation.
#[derive(Debug, Clone, Default)]
pub struct Document {
    fields: Vec<Field>,
    is_sorted: bool,
}

impl Document {
    /// Create an empty document.
    pub fn new() -> Document {
        Document::default()
    }

    /// Create a document from already collected fields.
    pub fn from_fields(fields: Vec<Field>) -> Document {
        Document {
            fields,
            is_sorted: false,
        }
    }

    /// Number of fields, counting repetitions.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the document has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Append a text field.
    pub fn add_text(&mut self, id: FieldId, text: impl Into<String>) {
        self.add(Field::text(id, text));
    }

    /// Append a u32 field.
    pub fn add_u32(&mut self, id: FieldId, value: u32) {
        self.add(Field::u32(id, value));
    }

    /// Append a field.
    pub fn add(&mut self, field: Field) {
        self.fields.push(field);
        self.is_sorted = false;
    }

    /// The fields in insertion order.
    pub fn get_fields(&self) -> &[Field] {
        &self.fields
    }

    /// Stable-sort the fields by ascending id. No-op if already sorted.
    pub fn sort_by_id(&mut self) {
        if !self.is_sorted {
            self.fields.sort_by_key(Field::id);
            self.is_sorted = true;
        }
    }

    /// The fields grouped by ascending id.
    ///
    /// Sorts the document first (memoized), then returns one `(id, run)`
    /// pair per distinct id, runs in value insertion order.
    pub fn get_sorted_fields(&mut self) -> Vec<(FieldId, &[Field])> {
        self.sort_by_id();
        let mut groups = Vec::new();
        let mut rest: &[Field] = &self.fields;
        while let Some(first) = rest.first() {
            let id = first.id();
            let run = rest.iter().take_while(|field| field.id() == id).count();
            let (group, tail) = rest.split_at(run);
            groups.push((id, group));
            rest = tail;
        }
        groups
    }

    /// The first field with the given id, in insertion order.
    pub fn get_first_by_id(&self, id: FieldId) -> Option<&Field> {
        self.fields.iter().find(|field| field.id() == id)
    }

    /// All fields with the given id, in insertion order.
    pub fn get_all_by_id(&self, id: FieldId) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(move |field| field.id() == id)
    }

    fn sorted_pairs(&self) -> Vec<(FieldId, &Value)> {
        let mut pairs: Vec<(FieldId, &Value)> = self
            .fields
            .iter()
            .map(|field| (field.id(), field.value()))
            .collect();
        pairs.sort();
        pairs
    }
}

impl PartialEq for Document {
    /// Two documents are equal iff their (id, value) multisets are equal.
    fn eq(&self, other: &Document) -> bool {
        self.sorted_pairs() == other.sorted_pairs()
    }
}

impl Eq for Document {}

/// JSON projection of a document against a schema.
///
/// Maps each field name to the in-order sequence of its values; names are
/// emitted in ascending order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamedDocument(pub BTreeMap<String, Vec<Value>>);

impl NamedDocument {
    /// Render as a JSON object of value arrays.
    pub fn to_json(&self) -> serde_json::Value {
        let mut object = serde_json::Map::new();
        for (name, values) in &self.0 {
            let array = values
                .iter()
                .map(|value| match value {
                    Value::Text(text) => serde_json::Value::String(text.clone()),
                    Value::U32(number) => serde_json::Value::from(*number),
                })
                .collect();
            object.insert(name.clone(), serde_json::Value::Array(array));
        }
        serde_json::Value::Object(object)
    }

    /// Parse the JSON object form.
    ///
    /// Only JSON strings and numbers are accepted as values; any other
    /// scalar kind fails with [`SchemaError::UnsupportedValueKind`].
    pub fn from_json(json: &serde_json::Value) -> Result<NamedDocument, SchemaError> {
        let object = json
            .as_object()
            .ok_or_else(|| SchemaError::InvalidJsonValue("expected a json object".to_string()))?;
        let mut fields_by_name = BTreeMap::new();
        for (name, entry) in object {
            let array = entry.as_array().ok_or_else(|| {
                SchemaError::InvalidJsonValue(format!("field {name}: expected an array of values"))
            })?;
            let mut values = Vec::with_capacity(array.len());
            for scalar in array {
                values.push(json_scalar_to_value(name, scalar)?);
            }
            fields_by_name.insert(name.clone(), values);
        }
        Ok(NamedDocument(fields_by_name))
    }
}

fn json_scalar_to_value(field: &str, scalar: &serde_json::Value) -> Result<Value, SchemaError> {
    match scalar {
        serde_json::Value::String(text) => Ok(Value::Text(text.clone())),
        serde_json::Value::Number(number) => number
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .map(Value::U32)
            .ok_or_else(|| {
                SchemaError::InvalidJsonValue(format!("field {field}: number {number} out of range"))
            }),
        _ => Err(SchemaError::UnsupportedValueKind(field.to_string())),
    }
}
