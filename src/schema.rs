//! Schema: typed field declarations, name resolution, and JSON conversion.
//!
//! Fields must be declared up front: whether a field is indexed, tokenized,
//! fast, or stored is fixed when the schema is built and cannot change
//! afterwards. The schema doubles as the JSON codec for documents, going
//! through the named-field projection.

use crate::error::SchemaError;
use crate::options::{NumericOptions, TextOptions};
use crate::types::{Document, Field, FieldId, NamedDocument, Value};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// The type of a declared field, wrapping its options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "field", content = "options", rename_all = "lowercase")]
pub enum FieldType {
    /// A text field.
    Text(TextOptions),
    /// A numeric field.
    Numeric(NumericOptions),
}

impl FieldType {
    /// Whether this is a text field.
    pub fn is_text(&self) -> bool {
        matches!(self, FieldType::Text(_))
    }

    /// Whether this is a numeric field.
    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldType::Numeric(_))
    }
}

/// A field declaration: a name plus typed options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldEntry {
    name: String,
    #[serde(rename = "type")]
    field_type: FieldType,
}

impl FieldEntry {
    /// Declare a text field.
    pub fn text(name: impl Into<String>, options: TextOptions) -> FieldEntry {
        FieldEntry {
            name: name.into(),
            field_type: FieldType::Text(options),
        }
    }

    /// Declare a numeric field.
    pub fn numeric(name: impl Into<String>, options: NumericOptions) -> FieldEntry {
        FieldEntry {
            name: name.into(),
            field_type: FieldType::Numeric(options),
        }
    }

    /// The field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The field type and options.
    pub fn field_type(&self) -> &FieldType {
        &self.field_type
    }

    /// Whether the field participates in the inverted index.
    pub fn is_indexed(&self) -> bool {
        match &self.field_type {
            FieldType::Text(options) => options.indexing().is_indexed(),
            FieldType::Numeric(_) => false,
        }
    }

    /// Whether the field is a fast numeric field.
    pub fn is_numeric_fast(&self) -> bool {
        match &self.field_type {
            FieldType::Text(_) => false,
            FieldType::Numeric(options) => options.is_fast(),
        }
    }

    /// Whether values of the field are kept in the document store.
    pub fn is_stored(&self) -> bool {
        match &self.field_type {
            FieldType::Text(options) => options.is_stored(),
            FieldType::Numeric(options) => options.is_stored(),
        }
    }
}

/// An immutable, ordered collection of field declarations.
///
/// A field's id is its position in declaration order; names are unique.
/// Build once through [`SchemaBuilder`], then share by cloning.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    entries: Vec<FieldEntry>,
    names: HashMap<String, FieldId>,
}

impl Schema {
    /// Start building a schema.
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// The entry declared under the given id.
    pub fn get_field_entry(&self, id: FieldId) -> Option<&FieldEntry> {
        self.entries.get(id as usize)
    }

    /// The name declared under the given id.
    pub fn get_field_name(&self, id: FieldId) -> Option<&str> {
        self.get_field_entry(id).map(FieldEntry::name)
    }

    /// Resolve a field name to its id.
    pub fn get_field_id(&self, name: &str) -> Result<FieldId, SchemaError> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| SchemaError::UnknownField(name.to_string()))
    }

    /// The field entries in declaration order.
    pub fn fields(&self) -> &[FieldEntry] {
        &self.entries
    }

    /// Render the schema as JSON, fields in declaration order.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({ "fields": self.entries })
    }

    /// Parse a schema from its JSON form.
    pub fn from_json(json: &serde_json::Value) -> Result<Schema, SchemaError> {
        let fields = json
            .get("fields")
            .ok_or_else(|| SchemaError::MissingJsonKey("fields".to_string()))?;
        let fields = fields
            .as_array()
            .ok_or_else(|| SchemaError::InvalidJsonValue("fields must be an array".to_string()))?;

        let mut builder = Schema::builder();
        for field_json in fields {
            let entry: FieldEntry = serde_json::from_value(field_json.clone())
                .map_err(|e| SchemaError::InvalidJsonValue(e.to_string()))?;
            if builder.names.contains_key(entry.name()) {
                return Err(SchemaError::InvalidJsonValue(format!(
                    "duplicate field name: {}",
                    entry.name()
                )));
            }
            builder.add_field(entry);
        }
        Ok(builder.build())
    }

    /// Project a document onto its named form: each declared name mapped to
    /// the in-order values of that field, sorted by field id.
    pub fn to_named_doc(&self, doc: &mut Document) -> Result<NamedDocument, SchemaError> {
        let mut fields_by_name = BTreeMap::new();
        for (id, run) in doc.get_sorted_fields() {
            let name = self
                .get_field_name(id)
                .ok_or_else(|| SchemaError::UnknownField(format!("field id {id}")))?;
            let values: Vec<Value> = run.iter().map(|field| field.value().clone()).collect();
            fields_by_name.insert(name.to_string(), values);
        }
        Ok(NamedDocument(fields_by_name))
    }

    /// Rebuild a document from its named form, resolving names to ids.
    ///
    /// The resulting document is sorted by field id.
    pub fn from_named_doc(&self, named: &NamedDocument) -> Result<Document, SchemaError> {
        let mut doc = Document::new();
        for (name, values) in &named.0 {
            let id = self.get_field_id(name)?;
            for value in values {
                doc.add(Field::new(id, value.clone()));
            }
        }
        doc.sort_by_id();
        Ok(doc)
    }

    /// Render a document as JSON through its named projection.
    pub fn doc_to_json(&self, doc: &mut Document) -> Result<serde_json::Value, SchemaError> {
        Ok(self.to_named_doc(doc)?.to_json())
    }

    /// Parse a document from its JSON form.
    pub fn doc_from_json(&self, json: &serde_json::Value) -> Result<Document, SchemaError> {
        self.from_named_doc(&NamedDocument::from_json(json)?)
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

/// Builder assigning each added field the next id in sequence.
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    entries: Vec<FieldEntry>,
    names: HashMap<String, FieldId>,
}

impl SchemaBuilder {
    /// Create an empty builder.
    pub fn new() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// Declare a text field and return its id.
    pub fn add_text_field(&mut self, name: impl Into<String>, options: TextOptions) -> FieldId {
        self.add_field(FieldEntry::text(name, options))
    }

    /// Declare a numeric field and return its id.
    pub fn add_numeric_field(
        &mut self,
        name: impl Into<String>,
        options: NumericOptions,
    ) -> FieldId {
        self.add_field(FieldEntry::numeric(name, options))
    }

    /// Declare a field from an entry and return its id.
    ///
    /// # Panics
    /// Panics if the name was already declared.
    pub fn add_field(&mut self, entry: FieldEntry) -> FieldId {
        let id = self.entries.len() as FieldId;
        assert!(
            !self.names.contains_key(entry.name()),
            "duplicate field name: {}",
            entry.name()
        );
        self.names.insert(entry.name().to_string(), id);
        self.entries.push(entry);
        id
    }

    /// Finish building; the schema is immutable from here on.
    pub fn build(self) -> Schema {
        Schema {
            entries: self.entries,
            names: self.names,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{FAST, NUMERIC, STORED, STRING, TEXT};

    fn three_field_schema() -> Schema {
        let mut builder = Schema::builder();
        builder.add_numeric_field("count", FAST.set_stored(true));
        builder.add_text_field("title", TEXT);
        builder.add_text_field("author", TEXT);
        builder.build()
    }

    #[test]
    fn test_builder_assigns_dense_ids() {
        let mut builder = Schema::builder();
        assert_eq!(builder.add_text_field("body", STRING), 0);
        assert_eq!(builder.add_text_field("title", STRING), 1);
        assert_eq!(builder.add_numeric_field("count", NUMERIC), 2);
        let schema = builder.build();

        assert_eq!(schema.get_field_id("body").unwrap(), 0);
        assert_eq!(schema.get_field_id("count").unwrap(), 2);
        assert_eq!(schema.get_field_name(1), Some("title"));
        assert_eq!(schema.fields().len(), 3);
    }

    #[test]
    fn test_unknown_field() {
        let schema = three_field_schema();
        assert!(matches!(
            schema.get_field_id("missing"),
            Err(SchemaError::UnknownField(name)) if name == "missing"
        ));
        assert!(schema.get_field_entry(17).is_none());
    }

    #[test]
    #[should_panic(expected = "duplicate field name")]
    fn test_duplicate_name_panics() {
        let mut builder = Schema::builder();
        builder.add_text_field("twice", STRING);
        builder.add_text_field("twice", TEXT);
    }

    #[test]
    fn test_entry_predicates() {
        let schema = three_field_schema();
        assert!(!schema.get_field_entry(0).unwrap().is_indexed());
        assert!(schema.get_field_entry(0).unwrap().is_numeric_fast());
        assert!(schema.get_field_entry(0).unwrap().is_stored());
        assert!(schema.get_field_entry(1).unwrap().is_indexed());
        assert!(!schema.get_field_entry(1).unwrap().is_numeric_fast());
    }

    #[test]
    fn test_schema_json_shape() {
        let schema = three_field_schema();
        let expected = serde_json::json!({
            "fields": [
                {
                    "name": "count",
                    "type": {
                        "field": "numeric",
                        "options": { "indexed": false, "fast": true, "stored": true }
                    }
                },
                {
                    "name": "title",
                    "type": {
                        "field": "text",
                        "options": {
                            "indexing": "tokenized_with_freq_and_position",
                            "stored": false
                        }
                    }
                },
                {
                    "name": "author",
                    "type": {
                        "field": "text",
                        "options": {
                            "indexing": "tokenized_with_freq_and_position",
                            "stored": false
                        }
                    }
                }
            ]
        });
        assert_eq!(schema.to_json(), expected);

        // key order inside the rendered text follows declaration order
        let text = schema.to_json().to_string();
        assert!(text.contains(r#""options":{"indexed":false,"fast":true,"stored":true}"#));
        assert!(
            text.find(r#""name":"count""#).unwrap() < text.find(r#""name":"title""#).unwrap()
        );
    }

    #[test]
    fn test_schema_json_roundtrip() {
        let schema = three_field_schema();
        let parsed = Schema::from_json(&schema.to_json()).unwrap();
        assert_eq!(parsed, schema);
    }

    #[test]
    fn test_schema_from_json_missing_fields_key() {
        assert!(matches!(
            Schema::from_json(&serde_json::json!({})).unwrap_err(),
            SchemaError::MissingJsonKey(key) if key == "fields"
        ));
    }

    #[test]
    fn test_schema_from_json_rejects_duplicates() {
        let json = serde_json::json!({
            "fields": [
                { "name": "a", "type": { "field": "numeric",
                    "options": { "indexed": false, "fast": false, "stored": false } } },
                { "name": "a", "type": { "field": "numeric",
                    "options": { "indexed": false, "fast": false, "stored": false } } }
            ]
        });
        assert!(matches!(
            Schema::from_json(&json).unwrap_err(),
            SchemaError::InvalidJsonValue(_)
        ));
    }

    #[test]
    fn test_named_doc_roundtrip() {
        let schema = three_field_schema();
        let mut doc = Document::new();
        doc.add_text(1, "a title");
        doc.add_u32(0, 4);
        doc.add_text(2, "someone");
        doc.add_u32(0, 5);

        let named = schema.to_named_doc(&mut doc).unwrap();
        let rebuilt = schema.from_named_doc(&named).unwrap();
        assert_eq!(rebuilt, doc);
    }

    #[test]
    fn test_doc_json_names_ascending() {
        let schema = three_field_schema();
        let mut doc = Document::new();
        doc.add_text(1, "a title");
        doc.add_u32(0, 4);

        let json = schema.doc_to_json(&mut doc).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "count": [4], "title": ["a title"] })
        );
        let parsed = schema.doc_from_json(&json).unwrap();
        assert_eq!(parsed, doc);
    }

    #[test]
    fn test_doc_from_json_unknown_name() {
        let schema = three_field_schema();
        let json = serde_json::json!({ "subtitle": ["nope"] });
        assert!(matches!(
            schema.doc_from_json(&json).unwrap_err(),
            SchemaError::UnknownField(name) if name == "subtitle"
        ));
    }

    #[test]
    fn test_doc_to_named_rejects_undeclared_id() {
        let schema = three_field_schema();
        let mut doc = Document::new();
        doc.add_text(9, "out of range");
        assert!(matches!(
            schema.to_named_doc(&mut doc).unwrap_err(),
            SchemaError::UnknownField(_)
        ));
    }
}
