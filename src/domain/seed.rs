//! Literal demo fixtures, inserted only when a collection is empty.
//!
//! These are versioned fixture data, not generated content: one admin user
//! and two tasks that reference it. The owner identity is minted once per
//! batch so every seeded task points at the seeded user.

use chrono::{Duration, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

/// One document ready for insertion: row id plus jsonb body.
pub struct SeedDocument {
    pub id: Uuid,
    pub doc: Value,
}

/// The full demo data set for one run. `owner_id` is both the seeded user's
/// row id and the `ownerId` carried by every seeded task.
pub struct SeedBatch {
    pub owner_id: Uuid,
    pub users: Vec<SeedDocument>,
    pub tasks: Vec<SeedDocument>,
}

/// Builds the demo batch. Timestamps are taken once so the documents within
/// a batch are internally consistent.
pub fn demo_batch() -> SeedBatch {
    let owner_id = Uuid::new_v4();
    let now = Utc::now();
    let created_at = now.to_rfc3339();

    let user = SeedDocument {
        id: owner_id,
        doc: json!({
            "email": "demo@taskdb.local",
            "passwordHash": "$argon2id$v=19$seed-demo-hash-placeholder",
            "displayName": "Demo User",
            "roles": ["admin"],
            "createdAt": created_at,
            "isActive": true,
            "meta": { "seeded": true }
        }),
    };

    let board_task = SeedDocument {
        id: Uuid::new_v4(),
        doc: json!({
            "title": "Set up the project board",
            "description": "Create the initial columns and invite the rest of the team.",
            "status": "todo",
            "priority": "high",
            "dueDate": (now + Duration::days(7)).to_rfc3339(),
            "ownerId": owner_id.to_string(),
            "tags": ["setup", "admin"],
            "createdAt": created_at,
            "isDeleted": false,
            "checklist": [
                { "text": "Create the board columns", "done": true, "doneAt": created_at },
                { "text": "Invite the team", "done": false }
            ]
        }),
    };

    let onboarding_task = SeedDocument {
        id: Uuid::new_v4(),
        doc: json!({
            "title": "Write the onboarding checklist",
            "description": "Document the first-week steps for new teammates.",
            "status": "in_progress",
            "priority": 2,
            "ownerId": owner_id.to_string(),
            "tags": ["docs"],
            "createdAt": created_at,
            "isDeleted": false,
            "checklist": [
                { "text": "Outline the sections", "done": false }
            ]
        }),
    };

    SeedBatch {
        owner_id,
        users: vec![user],
        tasks: vec![board_task, onboarding_task],
    }
}
