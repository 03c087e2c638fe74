//! Renders declarative specs into PostgreSQL DDL.
//!
//! A validator becomes a boolean SQL function over the `doc` jsonb column;
//! the reconciler attaches it through a named CHECK constraint. Updating a
//! validator is therefore a `CREATE OR REPLACE FUNCTION` — an in-place change
//! that never rewrites or revalidates stored rows. Indexes become btree
//! expression indexes or, for text search, a GIN index over a weighted
//! tsvector expression.

use crate::domain::schema::{FieldSchema, IndexKind, IndexSpec, Validator};
use crate::error::ReconcileError;

/// tsvector supports exactly four weight labels.
const WEIGHT_LABELS: [char; 4] = ['A', 'B', 'C', 'D'];

/// Name of the check function backing a collection's validator.
pub fn check_function_name(collection: &str) -> String {
    format!("{collection}_doc_check")
}

/// Name of the CHECK constraint attached to a collection.
pub fn check_constraint_name(collection: &str) -> String {
    format!("{collection}_doc_valid")
}

/// Renders the `CREATE OR REPLACE FUNCTION` statement for a validator.
pub fn render_check_function(collection: &str, validator: &Validator) -> String {
    format!(
        "CREATE OR REPLACE FUNCTION {}(doc jsonb) RETURNS boolean\n\
         LANGUAGE sql IMMUTABLE AS $fn$\n\
         SELECT {}\n\
         $fn$",
        check_function_name(collection),
        render_validator_expr(validator),
    )
}

/// Renders the boolean expression a document must satisfy.
fn render_validator_expr(validator: &Validator) -> String {
    let mut parts = vec!["jsonb_typeof(doc) = 'object'".to_string()];

    for field in &validator.required {
        parts.push(format!("doc ? '{field}'"));
    }

    for (field, schema) in &validator.properties {
        let check = render_field(&format!("doc->'{field}'"), schema, 0);
        if check != "true" {
            // Absent optional fields pass; present fields must conform.
            parts.push(format!("(NOT doc ? '{field}' OR {check})"));
        }
    }

    if validator.reject_unknown {
        let known = validator
            .properties
            .iter()
            .map(|(name, _)| format!("'{name}'"))
            .collect::<Vec<_>>()
            .join(", ");
        parts.push(format!("doc - ARRAY[{known}]::text[] = '{{}}'::jsonb"));
    }

    parts.join("\n  AND ")
}

/// Renders the check for a single value expression. `depth` disambiguates
/// the aliases of nested array-element subqueries.
fn render_field(value: &str, schema: &FieldSchema, depth: usize) -> String {
    let mut parts: Vec<String> = Vec::new();

    if !schema.types.is_empty() {
        let mut names: Vec<&str> = schema.types.iter().map(|t| t.jsonb_name()).collect();
        names.dedup();
        if names.len() == 1 {
            parts.push(format!("jsonb_typeof({value}) = '{}'", names[0]));
        } else {
            let list = names
                .iter()
                .map(|n| format!("'{n}'"))
                .collect::<Vec<_>>()
                .join(", ");
            parts.push(format!("jsonb_typeof({value}) IN ({list})"));
        }
    }

    // Length, enumeration, and casing checks apply only to string values;
    // a null arm of a type union must not trip them.
    if let Some(min) = schema.min_len {
        parts.push(format!(
            "(jsonb_typeof({value}) <> 'string' OR char_length({value} #>> '{{}}') >= {min})"
        ));
    }
    if let Some(max) = schema.max_len {
        parts.push(format!(
            "(jsonb_typeof({value}) <> 'string' OR char_length({value} #>> '{{}}') <= {max})"
        ));
    }
    if !schema.allowed.is_empty() {
        let list = schema
            .allowed
            .iter()
            .map(|v| format!("'{v}'"))
            .collect::<Vec<_>>()
            .join(", ");
        parts.push(format!("({value} #>> '{{}}') IN ({list})"));
    }
    if schema.lowercase {
        parts.push(format!(
            "(jsonb_typeof({value}) <> 'string' OR ({value} #>> '{{}}') = lower({value} #>> '{{}}'))"
        ));
    }

    if let Some(item) = &schema.items {
        let alias = format!("_e{depth}");
        let item_check = render_field(&format!("{alias}.item"), item, depth + 1);
        parts.push(format!(
            "(jsonb_typeof({value}) <> 'array' OR NOT EXISTS (\
             SELECT 1 FROM jsonb_array_elements({value}) AS {alias}(item) \
             WHERE NOT ({item_check})))"
        ));
    }

    if !schema.properties.is_empty() || !schema.required.is_empty() {
        let mut nested: Vec<String> = Vec::new();
        for field in &schema.required {
            nested.push(format!("{value} ? '{field}'"));
        }
        for (field, prop) in &schema.properties {
            let check = render_field(&format!("{value}->'{field}'"), prop, depth);
            if check != "true" {
                nested.push(format!("(NOT {value} ? '{field}' OR {check})"));
            }
        }
        parts.push(format!(
            "(jsonb_typeof({value}) <> 'object' OR ({}))",
            nested.join(" AND ")
        ));
    }

    if parts.is_empty() {
        "true".to_string()
    } else if parts.len() == 1 {
        parts.remove(0)
    } else {
        format!("({})", parts.join(" AND "))
    }
}

/// Renders the `CREATE INDEX` statement for an index spec.
pub fn render_index(spec: &IndexSpec) -> Result<String, ReconcileError> {
    if spec.keys.is_empty() {
        return Err(ReconcileError::EmptyIndexKeys {
            index: spec.name.to_string(),
        });
    }

    if spec.is_text() {
        let vector = text_vector_expr(spec)?;
        return Ok(format!(
            "CREATE INDEX {} ON {} USING GIN (({vector}))",
            spec.name, spec.collection
        ));
    }

    let keys = spec
        .keys
        .iter()
        .map(|(field, kind)| {
            let direction = match kind {
                IndexKind::Asc | IndexKind::Text => "ASC",
                IndexKind::Desc => "DESC",
            };
            format!("(doc->>'{field}') {direction}")
        })
        .collect::<Vec<_>>()
        .join(", ");

    let unique = if spec.unique { "UNIQUE " } else { "" };
    Ok(format!(
        "CREATE {unique}INDEX {} ON {} ({keys})",
        spec.name, spec.collection
    ))
}

/// The weighted tsvector expression backing a text index. Also used by
/// callers that query the index, since Postgres matches expression indexes
/// textually.
///
/// Weight labels are assigned A..D by descending declared weight, so the
/// highest-weighted field ranks first in relevance.
pub fn text_vector_expr(spec: &IndexSpec) -> Result<String, ReconcileError> {
    if spec.weights.len() > WEIGHT_LABELS.len() {
        return Err(ReconcileError::TextIndexWeights {
            index: spec.name.to_string(),
            detail: format!(
                "{} weighted fields declared but tsvector supports at most {}",
                spec.weights.len(),
                WEIGHT_LABELS.len()
            ),
        });
    }
    for (field, _) in &spec.weights {
        if !spec.keys.iter().any(|(k, _)| k == field) {
            return Err(ReconcileError::TextIndexWeights {
                index: spec.name.to_string(),
                detail: format!("weight declared for '{field}' which is not an index key"),
            });
        }
    }
    for (field, kind) in &spec.keys {
        if *kind == IndexKind::Text && !spec.weights.iter().any(|(w, _)| w == field) {
            return Err(ReconcileError::TextIndexWeights {
                index: spec.name.to_string(),
                detail: format!("text key '{field}' has no declared weight"),
            });
        }
    }

    let language = spec.language.unwrap_or("english");
    let mut ranked: Vec<(&str, u32)> = spec.weights.clone();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));

    let terms = ranked
        .iter()
        .zip(WEIGHT_LABELS.iter())
        .map(|((field, _), label)| {
            format!(
                "setweight(to_tsvector('{language}', coalesce(doc->>'{field}', '')), '{label}')"
            )
        })
        .collect::<Vec<_>>()
        .join(" || ");

    Ok(terms)
}
