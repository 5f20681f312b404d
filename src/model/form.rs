// Typed form payloads: submitted field values plus the reserved audit sections

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::ids::{EmployeeId, InstanceStageId};
use super::instance::StageAction;

/// A single submitted field value.
///
/// Shapes the engine does not interpret (lists, objects, null) are kept
/// verbatim in `Other` so they survive a round trip through storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Integer(i64),
    Number(f64),
    Text(String),
    Other(serde_json::Value),
}

impl FieldValue {
    /// Best-effort typing of a raw `key=value` argument.
    pub fn infer(raw: &str) -> Self {
        let trimmed = raw.trim();
        if let Ok(value) = trimmed.parse::<i64>() {
            return FieldValue::Integer(value);
        }
        if let Ok(value) = trimmed.parse::<f64>() {
            if value.is_finite() {
                return FieldValue::Number(value);
            }
        }
        match trimmed {
            "true" => FieldValue::Bool(true),
            "false" => FieldValue::Bool(false),
            _ => FieldValue::Text(raw.to_string()),
        }
    }

    /// Interprets the value as an employee reference (integer or numeric text).
    pub fn as_employee_id(&self) -> Option<EmployeeId> {
        match self {
            FieldValue::Integer(id) => Some(EmployeeId::new(*id)),
            FieldValue::Text(text) => text.trim().parse().ok(),
            FieldValue::Number(n) if n.fract() == 0.0 => Some(EmployeeId::new(*n as i64)),
            _ => None,
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Text(text) => text.trim().is_empty(),
            FieldValue::Other(value) => value.is_null(),
            _ => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<EmployeeId> for FieldValue {
    fn from(value: EmployeeId) -> Self {
        FieldValue::Integer(value.get())
    }
}

/// Field id to value. Used for both request submissions and stage responses.
pub type FieldResponses = BTreeMap<String, FieldValue>;

/// Point-in-time snapshot of who submitted a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestorSnapshot {
    pub employee_id: EmployeeId,
    pub name: String,
    pub department: Option<String>,
    pub position: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

/// One audit line per `complete_stage` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproverEntry {
    pub employee_id: EmployeeId,
    pub name: String,
    pub position: Option<String>,
    pub department: Option<String>,
    pub stage_id: InstanceStageId,
    pub action: StageAction,
    pub acted_at: DateTime<Utc>,
}

/// The request-level document: submitted fields plus the reserved
/// `requestor` and `approvers` sections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormResponses {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requestor: Option<RequestorSnapshot>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub approvers: Vec<ApproverEntry>,
    #[serde(flatten)]
    pub fields: FieldResponses,
}

impl FormResponses {
    pub const RESERVED_KEYS: [&'static str; 2] = ["requestor", "approvers"];

    /// Builds the document from a raw submission. Reserved keys in the
    /// submission are dropped; the engine owns those sections.
    pub fn from_submission(mut fields: FieldResponses, requestor: RequestorSnapshot) -> Self {
        for key in Self::RESERVED_KEYS {
            fields.remove(key);
        }
        Self {
            requestor: Some(requestor),
            approvers: Vec::new(),
            fields,
        }
    }

    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }
}
