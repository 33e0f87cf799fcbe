use serde::{Serialize, Deserialize};

/// Internal document number inside the native index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocId(pub u32);

impl DocId {
    pub fn new(id: u32) -> Self {
        DocId(id)
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

impl From<u32> for DocId {
    fn from(id: u32) -> Self {
        DocId(id)
    }
}

/// Native field type tag, recorded in field info for query-time resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FieldType {
    Term,     // Exact, not analyzed
    Text,     // Analyzed
    Long,
    Double,
    Stored,   // Stored only, never indexed
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Term(String),
    Text { text: String, analyzer: String },
    Long(i64),
    Double(f64),
    Stored(Vec<u8>),
}

impl FieldValue {
    pub fn field_type(&self) -> FieldType {
        match self {
            FieldValue::Term(_) => FieldType::Term,
            FieldValue::Text { .. } => FieldType::Text,
            FieldValue::Long(_) => FieldType::Long,
            FieldValue::Double(_) => FieldType::Double,
            FieldValue::Stored(_) => FieldType::Stored,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub value: FieldValue,
    pub stored: bool,
    pub indexed: bool,
}

impl Field {
    pub fn term(name: impl Into<String>, value: impl Into<String>) -> Self {
        Field { name: name.into(), value: FieldValue::Term(value.into()), stored: false, indexed: true }
    }

    pub fn text(name: impl Into<String>, text: impl Into<String>, analyzer: impl Into<String>) -> Self {
        Field {
            name: name.into(),
            value: FieldValue::Text { text: text.into(), analyzer: analyzer.into() },
            stored: false,
            indexed: true,
        }
    }

    pub fn long(name: impl Into<String>, value: i64) -> Self {
        Field { name: name.into(), value: FieldValue::Long(value), stored: false, indexed: true }
    }

    pub fn double(name: impl Into<String>, value: f64) -> Self {
        Field { name: name.into(), value: FieldValue::Double(value), stored: false, indexed: true }
    }

    pub fn stored(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Field { name: name.into(), value: FieldValue::Stored(bytes), stored: true, indexed: false }
    }

    pub fn field_type(&self) -> FieldType {
        self.value.field_type()
    }
}

/// Index-ready document: an ordered list of native fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub fields: Vec<Field>,
}

impl Document {
    pub fn new() -> Self {
        Document { fields: Vec::new() }
    }

    pub fn add_field(&mut self, field: Field) {
        self.fields.push(field);
    }

    pub fn get_field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn fields_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Field> + 'a {
        self.fields.iter().filter(move |f| f.name == name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
