//! Declarative collection definitions: the desired state the reconciler converges to.
//!
//! A [`CollectionSpec`] bundles a document validator with an ordered set of
//! [`IndexSpec`]s. Specs are static configuration, defined once in
//! [`catalog`] and never mutated at runtime; the reconciler renders them to
//! DDL and applies them idempotently.

use crate::error::ReconcileError;

pub mod catalog;
pub mod render;

pub use catalog::collections;

/// JSON types a document field may take. A field declares a union of these
/// (e.g. string-or-null). `Date` documents are carried as RFC 3339 strings,
/// so it checks as a JSON string at the validator layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Number,
    Bool,
    Date,
    Object,
    Array,
    Null,
}

impl FieldType {
    /// The `jsonb_typeof` name this type checks against.
    pub fn jsonb_name(self) -> &'static str {
        match self {
            Self::String | Self::Date => "string",
            Self::Number => "number",
            Self::Bool => "boolean",
            Self::Object => "object",
            Self::Array => "array",
            Self::Null => "null",
        }
    }
}

/// Constraints on a single document field. An empty schema (no types, no
/// bounds) accepts anything — used for free-form values like `meta`.
#[derive(Debug, Clone, Default)]
pub struct FieldSchema {
    /// Accepted type union. Empty means unconstrained.
    pub types: Vec<FieldType>,
    /// Minimum string length, applied only when the value is a string.
    pub min_len: Option<u32>,
    /// Maximum string length, applied only when the value is a string.
    pub max_len: Option<u32>,
    /// Allowed string values (enumeration).
    pub allowed: Vec<&'static str>,
    /// Require the string value to already be lowercase.
    pub lowercase: bool,
    /// Per-element schema when the value is an array.
    pub items: Option<Box<FieldSchema>>,
    /// Nested property schemas when the value is an object.
    pub properties: Vec<(&'static str, FieldSchema)>,
    /// Required nested property names.
    pub required: Vec<&'static str>,
}

impl FieldSchema {
    pub fn of(t: FieldType) -> Self {
        Self {
            types: vec![t],
            ..Self::default()
        }
    }

    pub fn string() -> Self {
        Self::of(FieldType::String)
    }

    pub fn date() -> Self {
        Self::of(FieldType::Date)
    }

    pub fn boolean() -> Self {
        Self::of(FieldType::Bool)
    }

    pub fn number() -> Self {
        Self::of(FieldType::Number)
    }

    /// An unconstrained value (any shape, arbitrarily nested).
    pub fn any() -> Self {
        Self::default()
    }

    /// Extends the type union, e.g. `FieldSchema::string().or(FieldType::Number)`.
    pub fn or(mut self, t: FieldType) -> Self {
        self.types.push(t);
        self
    }

    /// Shorthand for the common string-or-null / date-or-null unions.
    pub fn or_null(self) -> Self {
        self.or(FieldType::Null)
    }

    pub fn min_len(mut self, n: u32) -> Self {
        self.min_len = Some(n);
        self
    }

    pub fn max_len(mut self, n: u32) -> Self {
        self.max_len = Some(n);
        self
    }

    pub fn len(self, min: u32, max: u32) -> Self {
        self.min_len(min).max_len(max)
    }

    pub fn one_of(mut self, values: &[&'static str]) -> Self {
        self.allowed = values.to_vec();
        self
    }

    pub fn lowercase(mut self) -> Self {
        self.lowercase = true;
        self
    }

    pub fn array_of(item: FieldSchema) -> Self {
        let mut s = Self::of(FieldType::Array);
        s.items = Some(Box::new(item));
        s
    }

    pub fn object(properties: Vec<(&'static str, FieldSchema)>, required: &[&'static str]) -> Self {
        let mut s = Self::of(FieldType::Object);
        s.properties = properties;
        s.required = required.to_vec();
        s
    }
}

/// A document validator: required top-level fields, per-field schemas, and
/// whether unknown top-level fields are rejected.
#[derive(Debug, Clone)]
pub struct Validator {
    pub required: Vec<&'static str>,
    pub properties: Vec<(&'static str, FieldSchema)>,
    pub reject_unknown: bool,
}

/// Which documents the validator checks.
///
/// `Moderate` checks only new writes; rows that predate the validator are
/// never retroactively checked (the constraint is added `NOT VALID`).
/// `Strict` additionally validates every existing row when applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationLevel {
    Moderate,
    Strict,
}

/// What happens to a write that violates the validator. `Error` rejects the
/// write; `Warn` installs the check function for inspection but no constraint,
/// leaving enforcement advisory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationAction {
    Warn,
    Error,
}

/// Sort direction or index kind for one key of an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    Asc,
    Desc,
    Text,
}

/// One desired index. The target collection is named explicitly; the
/// reconciler refuses an index whose declared target differs from the
/// collection being ensured.
#[derive(Debug, Clone)]
pub struct IndexSpec {
    pub collection: &'static str,
    pub name: &'static str,
    /// Ordered keys: field path to direction or kind.
    pub keys: Vec<(&'static str, IndexKind)>,
    pub unique: bool,
    /// Per-field relevance weights (text indexes only).
    pub weights: Vec<(&'static str, u32)>,
    /// Text-search language (text indexes only); defaults to "english".
    pub language: Option<&'static str>,
}

impl IndexSpec {
    pub fn btree(
        collection: &'static str,
        name: &'static str,
        keys: &[(&'static str, IndexKind)],
    ) -> Self {
        Self {
            collection,
            name,
            keys: keys.to_vec(),
            unique: false,
            weights: Vec::new(),
            language: None,
        }
    }

    pub fn text(
        collection: &'static str,
        name: &'static str,
        weights: &[(&'static str, u32)],
        language: &'static str,
    ) -> Self {
        Self {
            collection,
            name,
            keys: weights.iter().map(|(f, _)| (*f, IndexKind::Text)).collect(),
            unique: false,
            weights: weights.to_vec(),
            language: Some(language),
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Rejects an index declared under the wrong collection. No fallback:
    /// the declared target is the only source of truth.
    pub fn check_target(&self, ensuring: &str) -> Result<(), ReconcileError> {
        if self.collection == ensuring {
            Ok(())
        } else {
            Err(ReconcileError::IndexTargetMismatch {
                index: self.name.to_string(),
                declared: self.collection.to_string(),
                ensuring: ensuring.to_string(),
            })
        }
    }

    pub fn is_text(&self) -> bool {
        self.keys.iter().any(|(_, k)| *k == IndexKind::Text)
    }
}

/// The desired state of one collection: validator, enforcement mode, indexes.
#[derive(Debug, Clone)]
pub struct CollectionSpec {
    pub name: &'static str,
    pub validator: Validator,
    pub level: ValidationLevel,
    pub action: ValidationAction,
    pub indexes: Vec<IndexSpec>,
}
