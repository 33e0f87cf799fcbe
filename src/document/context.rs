use crate::core::types::Document;
use crate::fields::field::IndexableJsonField;
use crate::schema::field_info::FieldInfoCollection;

/// Accumulates the output of one document build.
pub struct BuildContext {
    pub content_type: String,
    pub document: Document,
    pub field_infos: FieldInfoCollection,
}

impl BuildContext {
    pub fn new(content_type: impl Into<String>) -> Self {
        BuildContext {
            content_type: content_type.into(),
            document: Document::new(),
            field_infos: FieldInfoCollection::new(),
        }
    }

    pub fn add(&mut self, projected: IndexableJsonField) {
        for info in projected.field_infos() {
            self.field_infos.add(info);
        }
        for field in projected.fields {
            self.document.add_field(field);
        }
    }
}
