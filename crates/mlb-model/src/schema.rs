use mlb_tensor::Dtype;

/// Feature kinds a model schema can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureType {
    /// Declared by the model but not consumed; marshaled as a placeholder.
    Invalid,
    MultiArray,
    String,
    I64,
    F64,
    Dict,
    Image,
}

/// Key kind for dictionary features.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DictKeyKind {
    /// Arbitrary string keys.
    String,
    /// Keys must be the canonical decimal form of a non-negative 32-bit
    /// integer.
    I64,
}

/// One named field of a model's input or output schema.
///
/// Declared by the model and read-only to the marshaling core.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaEntry {
    pub feature_type: FeatureType,
    /// Element kind, required for multiarray fields.
    pub dtype: Option<Dtype>,
    /// Key kind, required for dict fields.
    pub key: Option<DictKeyKind>,
    pub optional: bool,
}

impl SchemaEntry {
    pub fn new(feature_type: FeatureType) -> SchemaEntry {
        SchemaEntry {
            feature_type,
            dtype: None,
            key: None,
            optional: false,
        }
    }

    pub fn multiarray(dtype: Dtype) -> SchemaEntry {
        SchemaEntry {
            dtype: Some(dtype),
            ..SchemaEntry::new(FeatureType::MultiArray)
        }
    }

    pub fn dict(key: DictKeyKind) -> SchemaEntry {
        SchemaEntry {
            key: Some(key),
            ..SchemaEntry::new(FeatureType::Dict)
        }
    }

    /// Marks the field optional.
    pub fn optional(mut self) -> SchemaEntry {
        self.optional = true;
        self
    }
}

/// An ordered, named feature schema.
///
/// Field order is the model's declaration order and drives the order of
/// encode and decode steps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    fields: Vec<(String, SchemaEntry)>,
}

impl Schema {
    pub fn new() -> Schema {
        Schema { fields: Vec::new() }
    }

    /// Appends a field in declaration order.
    pub fn push(&mut self, name: impl Into<String>, entry: SchemaEntry) {
        self.fields.push((name.into(), entry));
    }

    /// Looks up a field by name.
    pub fn get(&self, name: &str) -> Option<&SchemaEntry> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, e)| e)
    }

    /// Iterates fields in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SchemaEntry)> {
        self.fields.iter().map(|(n, e)| (n.as_str(), e))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
