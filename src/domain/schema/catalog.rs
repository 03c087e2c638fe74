//! The fixed collection catalog for the task-management database.
//!
//! This is versioned configuration, not runtime input: two collections, their
//! validators, and their indexes, exactly as the application expects them.

use super::{
    CollectionSpec, FieldSchema, FieldType, IndexKind, IndexSpec, ValidationAction,
    ValidationLevel, Validator,
};

/// Task lifecycle states accepted by the `status` field.
pub const TASK_STATUSES: &[&str] = &["todo", "in_progress", "done", "archived"];

/// Bookkeeping tables owned by the reconciler itself; never treated as
/// collections by listings or seeding.
pub const INTERNAL_TABLES: &[&str] = &["schema_registry", "_sqlx_migrations"];

/// All collection definitions, in reconciliation order (`users` before
/// `tasks`, since seeded tasks reference the seeded user).
pub fn collections() -> Vec<CollectionSpec> {
    vec![users(), tasks()]
}

pub fn users() -> CollectionSpec {
    let validator = Validator {
        required: vec!["email", "passwordHash", "createdAt"],
        properties: vec![
            ("email", FieldSchema::string().len(5, 320).lowercase()),
            ("passwordHash", FieldSchema::string().min_len(20)),
            ("displayName", FieldSchema::string().or_null()),
            ("roles", FieldSchema::array_of(FieldSchema::string())),
            ("createdAt", FieldSchema::date()),
            ("updatedAt", FieldSchema::date().or_null()),
            ("lastLoginAt", FieldSchema::date().or_null()),
            ("isActive", FieldSchema::boolean()),
            ("meta", FieldSchema::any()),
        ],
        reject_unknown: true,
    };

    CollectionSpec {
        name: "users",
        validator,
        level: ValidationLevel::Moderate,
        action: ValidationAction::Error,
        indexes: vec![
            IndexSpec::btree("users", "users_email_unique", &[("email", IndexKind::Asc)])
                .unique(),
            IndexSpec::btree("users", "users_is_active", &[("isActive", IndexKind::Asc)]),
            IndexSpec::btree(
                "users",
                "users_created_at_desc",
                &[("createdAt", IndexKind::Desc)],
            ),
        ],
    }
}

pub fn tasks() -> CollectionSpec {
    let checklist_item = FieldSchema::object(
        vec![
            ("text", FieldSchema::string().len(1, 1000)),
            ("done", FieldSchema::boolean()),
            ("doneAt", FieldSchema::date().or_null()),
        ],
        &["text", "done"],
    );

    let validator = Validator {
        required: vec!["title", "status", "ownerId", "createdAt"],
        properties: vec![
            ("title", FieldSchema::string().len(1, 300)),
            ("description", FieldSchema::string().max_len(5000).or_null()),
            ("status", FieldSchema::string().one_of(TASK_STATUSES)),
            (
                "priority",
                FieldSchema::string().or(FieldType::Number).or_null(),
            ),
            ("dueDate", FieldSchema::date().or_null()),
            ("ownerId", FieldSchema::string()),
            ("tags", FieldSchema::array_of(FieldSchema::string())),
            ("createdAt", FieldSchema::date()),
            ("updatedAt", FieldSchema::date().or_null()),
            ("completedAt", FieldSchema::date().or_null()),
            ("isDeleted", FieldSchema::boolean()),
            ("checklist", FieldSchema::array_of(checklist_item)),
        ],
        reject_unknown: true,
    };

    CollectionSpec {
        name: "tasks",
        validator,
        level: ValidationLevel::Moderate,
        action: ValidationAction::Error,
        indexes: vec![
            IndexSpec::btree(
                "tasks",
                "tasks_owner_status",
                &[
                    ("ownerId", IndexKind::Asc),
                    ("status", IndexKind::Asc),
                    ("isDeleted", IndexKind::Asc),
                    ("createdAt", IndexKind::Desc),
                ],
            ),
            IndexSpec::btree("tasks", "tasks_due_date", &[("dueDate", IndexKind::Asc)]),
            IndexSpec::text(
                "tasks",
                "tasks_text_search",
                &[("title", 10), ("description", 5), ("tags", 2)],
                "english",
            ),
            IndexSpec::btree("tasks", "tasks_is_deleted", &[("isDeleted", IndexKind::Asc)]),
            IndexSpec::btree(
                "tasks",
                "tasks_status_created",
                &[("status", IndexKind::Asc), ("createdAt", IndexKind::Desc)],
            ),
        ],
    }
}
