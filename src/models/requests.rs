//! Request bodies for the plan API
//!
//! Create and update bodies are free-form JSON objects filtered through a
//! per-resource field allow-list.

use serde_json::{Map, Value};

use crate::db::Row;
use crate::error::{AppError, Result};

// == Resource ==
/// A table the API exposes, with the columns clients may write.
#[derive(Debug, Clone, Copy)]
pub struct Resource {
    /// Backing table name, also the cache key prefix
    pub table: &'static str,
    /// Human label used in error messages
    pub label: &'static str,
    /// Writable columns
    pub fields: &'static [&'static str],
    /// Columns a create body must carry
    pub required: Option<Required>,
    /// Error when an update body has no writable column
    pub empty_update: &'static str,
    /// Columns filled in on create when the body leaves them out
    pub defaults: &'static [(&'static str, ColumnDefault)],
}

#[derive(Debug, Clone, Copy)]
pub struct Required {
    pub columns: &'static [&'static str],
    pub message: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnDefault {
    EmptyList,
    False,
}

impl ColumnDefault {
    fn value(self) -> Value {
        match self {
            ColumnDefault::EmptyList => Value::Array(Vec::new()),
            ColumnDefault::False => Value::Bool(false),
        }
    }
}

const NO_VALID_FIELDS: &str = "No valid fields to update";

pub const USERS: Resource = Resource {
    table: "users",
    label: "User",
    fields: &["username", "email"],
    required: Some(Required {
        columns: &["username", "email"],
        message: "Username and email are required",
    }),
    empty_update: "At least one field (username or email) is required",
    defaults: &[],
};

pub const PROJECTS: Resource = Resource {
    table: "projects",
    label: "Project",
    fields: &[
        "name",
        "description",
        "charter",
        "goals",
        "phases",
        "milestones",
        "risk_management_plan",
    ],
    required: Some(Required {
        columns: &["name"],
        message: "Project name is required",
    }),
    empty_update: NO_VALID_FIELDS,
    defaults: &[
        ("phases", ColumnDefault::EmptyList),
        ("milestones", ColumnDefault::EmptyList),
    ],
};

pub const STAKEHOLDERS: Resource = Resource {
    table: "stakeholders",
    label: "Stakeholder",
    fields: &[
        "name",
        "role",
        "department",
        "contact_info",
        "information_needs",
        "preferred_channels",
        "preferred_formats",
        "communication_frequency",
        "escalation_path",
        "decision_authority",
        "timezone",
        "availability",
    ],
    required: Some(Required {
        columns: &["name"],
        message: "Stakeholder name is required",
    }),
    empty_update: NO_VALID_FIELDS,
    defaults: &[
        ("information_needs", ColumnDefault::EmptyList),
        ("preferred_channels", ColumnDefault::EmptyList),
        ("preferred_formats", ColumnDefault::EmptyList),
    ],
};

/// One plan per project, keyed by `project_id`.
pub const COMMUNICATION_PLANS: Resource = Resource {
    table: "communication_plans",
    label: "Communication plan",
    fields: &[
        "company_guidelines",
        "available_technologies",
        "documentation_standards",
        "compliance_requirements",
        "information_types",
        "confidentiality_requirements",
        "language_considerations",
        "cultural_considerations",
        "communication_budget",
        "budget_breakdown",
        "feedback_mechanisms",
        "update_procedures",
        "effectiveness_metrics",
    ],
    required: None,
    empty_update: NO_VALID_FIELDS,
    defaults: &[
        ("available_technologies", ColumnDefault::EmptyList),
        ("information_types", ColumnDefault::EmptyList),
    ],
};

/// Who tells whom what, when, how and why; rows of a plan's matrix.
pub const MATRIX_ENTRIES: Resource = Resource {
    table: "communication_matrix",
    label: "Matrix entry",
    fields: &[
        "who_sender",
        "who_receiver",
        "what_content",
        "when_frequency",
        "when_timing",
        "how_channel",
        "how_format",
        "why_purpose",
        "priority",
        "confirmation_required",
    ],
    required: None,
    empty_update: NO_VALID_FIELDS,
    defaults: &[("confirmation_required", ColumnDefault::False)],
};

// == Bulk Bodies ==
/// Shape of a bulk create body: `{ "<field>": [ {...}, ... ] }`.
#[derive(Debug, Clone, Copy)]
pub struct BulkBody {
    pub field: &'static str,
    /// Error when the array is absent, not an array, or empty
    pub missing: &'static str,
    /// Error when any item fails the resource's create checks
    pub invalid: &'static str,
}

pub const STAKEHOLDERS_BULK: BulkBody = BulkBody {
    field: "stakeholders",
    missing: "Stakeholders array is required and cannot be empty",
    invalid: "All stakeholders must have a name",
};

pub const MATRIX_BULK: BulkBody = BulkBody {
    field: "entries",
    missing: "Entries array is required and cannot be empty",
    invalid: "All entries must be objects",
};

/// Falsy JSON (`null`, `""`, `false`) counts as absent.
fn is_present(value: &Value) -> bool {
    !matches!(value, Value::Null | Value::Bool(false)) && value.as_str() != Some("")
}

impl Resource {
    /// Builds the row to insert: required columns must be present, unknown
    /// fields are dropped, defaults fill the gaps.
    pub fn create_row(&self, body: &Map<String, Value>) -> Result<Row> {
        if let Some(required) = self.required {
            let complete = required
                .columns
                .iter()
                .all(|column| body.get(*column).is_some_and(is_present));
            if !complete {
                return Err(AppError::InvalidRequest(required.message.to_string()));
            }
        }

        let mut row = self.allowed(body);
        for (column, default) in self.defaults {
            row.entry(*column).or_insert_with(|| default.value());
        }
        Ok(row)
    }

    /// Builds every row of a bulk body. Nothing is returned unless all items
    /// pass, so a bad item never leads to a partial insert.
    pub fn create_rows(&self, body: &Map<String, Value>, bulk: BulkBody) -> Result<Vec<Row>> {
        let items = match body.get(bulk.field) {
            Some(Value::Array(items)) if !items.is_empty() => items,
            _ => return Err(AppError::InvalidRequest(bulk.missing.to_string())),
        };

        items
            .iter()
            .map(|item| {
                item.as_object()
                    .and_then(|item| self.create_row(item).ok())
                    .ok_or_else(|| AppError::InvalidRequest(bulk.invalid.to_string()))
            })
            .collect()
    }

    /// Builds the partial update: only allow-listed fields present in the body.
    pub fn update_row(&self, body: &Map<String, Value>) -> Result<Row> {
        let row = self.allowed(body);
        if row.is_empty() {
            return Err(AppError::InvalidRequest(self.empty_update.to_string()));
        }
        Ok(row)
    }

    pub fn not_found(&self) -> AppError {
        AppError::NotFound(format!("{} not found", self.label))
    }

    fn allowed(&self, body: &Map<String, Value>) -> Row {
        self.fields
            .iter()
            .filter_map(|field| body.get(*field).map(|v| (field.to_string(), v.clone())))
            .collect()
    }
}
