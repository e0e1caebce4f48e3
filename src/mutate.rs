//! Mutation engine: create, update, and delete over the nested document.
//!
//! Every operation works on an already-loaded [`IssueDocument`] and leaves
//! persistence to the caller (the store's read-modify-write cycle), so the
//! logic here stays pure and directly testable. Validation and conflict
//! checks run before anything is touched; a failed operation never
//! partially applies.

use serde_json::Value;

use crate::models::{
    ensure_default_containers, FindingTemplate, IssueDocument, ScalarOrList, SemTemplate,
};

/// Category applied when a create payload supplies none.
const DEFAULT_CATEGORY: &str = "Configuration Changes";

/// Typed mutation failure. The boundary adapter maps each variant to its
/// HTTP status (400 / 409 / 404).
#[derive(Debug)]
pub enum MutationError {
    Validation(String),
    Conflict(String),
    NotFound(String),
}

impl std::fmt::Display for MutationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MutationError::Validation(msg) => write!(f, "{}", msg),
            MutationError::Conflict(msg) => write!(f, "{}", msg),
            MutationError::NotFound(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for MutationError {}

/// Incoming issue fields, shared by create and update.
///
/// Every field is optional and arrives as raw JSON so that loosely typed
/// clients (numbers for strings, numeric strings for scores, scalars for
/// lists) coerce the way the settings UI expects. An explicit `null` is
/// treated the same as an absent field.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct IssuePayload {
    #[serde(default)]
    pub sem_header: Option<Value>,
    #[serde(default)]
    pub sem_category: Option<Value>,
    #[serde(default)]
    pub severity_score: Option<Value>,
    #[serde(default)]
    pub sem_long_description: Option<Value>,
    #[serde(default)]
    pub sem_recommendations: Option<Value>,
    #[serde(default)]
    pub sem_resolution_instruction: Option<Value>,
}

/// Create a new issue and append it to the first sub-section, creating
/// placeholder containers when the document has none.
///
/// Fails with `Validation` when the payload carries no usable title and
/// with `Conflict` when any template anywhere in the document already uses
/// the header. Uniqueness is global, not scoped to the insertion target.
pub fn create(doc: &mut IssueDocument, payload: &IssuePayload) -> Result<SemTemplate, MutationError> {
    let header = payload
        .sem_header
        .as_ref()
        .map(coerce_string)
        .unwrap_or_default()
        .trim()
        .to_string();
    if header.is_empty() {
        return Err(MutationError::Validation("title required".to_string()));
    }

    ensure_default_containers(doc);

    if doc.contains_header(&header) {
        return Err(MutationError::Conflict(format!(
            "an issue titled \"{}\" already exists",
            header
        )));
    }

    let category = payload
        .sem_category
        .as_ref()
        .map(coerce_string)
        .filter(|c| !c.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());

    let template = SemTemplate {
        sem_header: header,
        sem_category: category,
        severity_score: Some(coerce_number(payload.severity_score.as_ref())),
        sem_long_description: payload
            .sem_long_description
            .as_ref()
            .map(coerce_string)
            .unwrap_or_default(),
        sem_recommendations: ScalarOrList::List(coerce_string_array(
            payload.sem_recommendations.as_ref(),
        )),
        sem_resolution_instruction: ScalarOrList::List(coerce_instruction_list(
            payload.sem_resolution_instruction.as_ref(),
        )),
    };

    doc.sections[0].sub_sections[0]
        .finding_templates
        .push(FindingTemplate {
            sem_template: template.clone(),
        });

    Ok(template)
}

/// Patch the first template whose header equals `id`.
///
/// Only fields present (non-null) in the patch are applied, each coerced
/// to its declared type. List fields are replaced wholesale. The header
/// itself may change, which changes the record's identity for every later
/// lookup; callers must track the new id.
pub fn update(
    doc: &mut IssueDocument,
    id: &str,
    patch: &IssuePayload,
) -> Result<SemTemplate, MutationError> {
    let template = doc
        .sections
        .iter_mut()
        .flat_map(|s| s.sub_sections.iter_mut())
        .flat_map(|ss| ss.finding_templates.iter_mut())
        .map(|ft| &mut ft.sem_template)
        .find(|t| t.sem_header == id)
        .ok_or_else(|| MutationError::NotFound(format!("no issue titled \"{}\"", id)))?;

    if let Some(v) = &patch.sem_header {
        template.sem_header = coerce_string(v);
    }
    if let Some(v) = &patch.sem_category {
        template.sem_category = coerce_string(v);
    }
    if let Some(v) = &patch.severity_score {
        template.severity_score = Some(coerce_number(Some(v)));
    }
    if let Some(v) = &patch.sem_long_description {
        template.sem_long_description = coerce_string(v);
    }
    if let Some(Value::Array(items)) = &patch.sem_recommendations {
        template.sem_recommendations =
            ScalarOrList::List(items.iter().map(coerce_string).collect());
    }
    if let Some(v) = &patch.sem_resolution_instruction {
        template.sem_resolution_instruction =
            ScalarOrList::List(coerce_instruction_list(Some(v)));
    }

    Ok(template.clone())
}

/// Remove the issue with this header and prune the containers it leaves
/// empty behind: sub-sections with no templates first, then sections with
/// no sub-sections.
///
/// Scans sub-sections in document order and filters every matching
/// template out of the first sub-section that contains one (uniqueness
/// means at most one match, but the filter pass keeps the operation total
/// on documents that predate the invariant).
pub fn delete(doc: &mut IssueDocument, id: &str) -> Result<String, MutationError> {
    let mut removed = false;
    'scan: for section in &mut doc.sections {
        for sub in &mut section.sub_sections {
            if sub
                .finding_templates
                .iter()
                .any(|ft| ft.sem_template.sem_header == id)
            {
                sub.finding_templates
                    .retain(|ft| ft.sem_template.sem_header != id);
                removed = true;
                break 'scan;
            }
        }
    }
    if !removed {
        return Err(MutationError::NotFound(format!("no issue titled \"{}\"", id)));
    }

    prune_empty_containers(doc);
    Ok(id.to_string())
}

/// Drop sub-sections with no templates, then sections with no
/// sub-sections. The cascade order matters: a section is only empty after
/// its drained sub-sections are gone.
pub fn prune_empty_containers(doc: &mut IssueDocument) {
    for section in &mut doc.sections {
        section
            .sub_sections
            .retain(|ss| !ss.finding_templates.is_empty());
    }
    doc.sections.retain(|s| !s.sub_sections.is_empty());
}

// ============ Coercion helpers ============

/// Loose string coercion: strings pass through, everything else renders
/// via its JSON representation.
fn coerce_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Loose numeric coercion: numbers pass through, numeric strings parse,
/// everything else (including absence) is 0.
fn coerce_number(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Arrays coerce element-wise; anything else yields an empty list.
fn coerce_string_array(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().map(coerce_string).collect(),
        _ => Vec::new(),
    }
}

/// Resolution instructions normalize to a list: arrays element-wise, a
/// scalar wrapped as a one-element list, absence as empty.
fn coerce_instruction_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().map(coerce_string).collect(),
        Some(other) => vec![coerce_string(other)],
        None => Vec::new(),
    }
}
