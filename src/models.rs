//! Core data models for the issue document and its flat display shape.
//!
//! The persisted document is a nested, section-oriented structure:
//! sections → sub-sections → finding templates → one [`SemTemplate`] each.
//! The wrapper levels carry titles only; the `SemTemplate` is the actual
//! issue record, and its `sem_header` doubles as the record's identity
//! across the entire document.

use serde::{Deserialize, Serialize};

/// Placeholder title for a section created implicitly on first insert.
pub const DEFAULT_SECTION_TITLE: &str = "Default Section";
/// Placeholder title for a sub-section created implicitly on first insert.
pub const DEFAULT_SUBSECTION_TITLE: &str = "Default Subsection";

/// Root of the persisted issue document. Singleton per store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IssueDocument {
    #[serde(default)]
    pub sections: Vec<Section>,
}

/// A top-level grouping of sub-sections. Order is display order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub sub_sections: Vec<SubSection>,
}

/// A grouping of finding templates within a section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubSection {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub finding_templates: Vec<FindingTemplate>,
}

/// Thin structural wrapper around one [`SemTemplate`]. Carries no fields
/// of its own; preserved so persisted documents keep their nesting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FindingTemplate {
    pub sem_template: SemTemplate,
}

/// The issue record itself.
///
/// `sem_header` is both the human-readable title and the unique identifier
/// across the whole document. `sem_category` is stored verbatim; display
/// canonicalization happens only in the flattening projection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemTemplate {
    pub sem_header: String,
    #[serde(default)]
    pub sem_category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity_score: Option<f64>,
    #[serde(default)]
    pub sem_long_description: String,
    #[serde(default)]
    pub sem_recommendations: ScalarOrList,
    #[serde(default)]
    pub sem_resolution_instruction: ScalarOrList,
}

/// A field that legacy documents may persist as either a single string or
/// a list of strings.
///
/// New writes always produce the `List` variant; `Scalar` exists so older
/// persisted documents deserialize and round-trip unchanged. Interpretation
/// of the scalar shape (splitting, wrapping) happens in the flattening
/// projection and the mutation engine, never downstream of them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarOrList {
    Scalar(String),
    List(Vec<String>),
}

impl Default for ScalarOrList {
    fn default() -> Self {
        ScalarOrList::List(Vec::new())
    }
}

impl ScalarOrList {
    /// Iterate the contained strings in order; a scalar yields one item.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let items: Vec<&str> = match self {
            ScalarOrList::Scalar(s) => vec![s.as_str()],
            ScalarOrList::List(items) => items.iter().map(|s| s.as_str()).collect(),
        };
        items.into_iter()
    }
}

impl IssueDocument {
    /// Iterate every issue record in document traversal order
    /// (section order, then sub-section order, then template order).
    pub fn templates(&self) -> impl Iterator<Item = &SemTemplate> {
        self.sections
            .iter()
            .flat_map(|s| s.sub_sections.iter())
            .flat_map(|ss| ss.finding_templates.iter())
            .map(|ft| &ft.sem_template)
    }

    /// True when any template in the document carries this header.
    pub fn contains_header(&self, header: &str) -> bool {
        self.templates().any(|t| t.sem_header == header)
    }
}

/// Idempotently guarantee the document has at least one section and that
/// section at least one sub-section, creating placeholder containers only
/// when absent. Returns the first sub-section, which is where new issues
/// are inserted.
///
/// Insertion always targets the first container rather than letting the
/// caller pick a destination; this is the whole default-target policy, so
/// alternate placement strategies can replace this one function.
pub fn ensure_default_containers(doc: &mut IssueDocument) -> &mut SubSection {
    if doc.sections.is_empty() {
        doc.sections.push(Section {
            title: DEFAULT_SECTION_TITLE.to_string(),
            sub_sections: Vec::new(),
        });
    }
    let section = &mut doc.sections[0];
    if section.sub_sections.is_empty() {
        section.sub_sections.push(SubSection {
            title: DEFAULT_SUBSECTION_TITLE.to_string(),
            finding_templates: Vec::new(),
        });
    }
    &mut section.sub_sections[0]
}

/// Flat, display-ready issue produced by the flattening projection.
#[derive(Debug, Clone, Serialize)]
pub struct DisplayIssue {
    pub id: String,
    pub name: String,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendations: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(rename = "severityScore", skip_serializing_if = "Option::is_none")]
    pub severity_score: Option<f64>,
}

/// Severity bucket derived from a [0, 1] score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Moderate,
    Important,
    Critical,
}

impl Severity {
    /// Bucket a score: ≤ 0.6 Moderate, 0.61–0.89 Important, ≥ 0.9 Critical.
    pub fn from_score(score: f64) -> Self {
        if score >= 0.9 {
            Severity::Critical
        } else if score > 0.6 {
            Severity::Important
        } else {
            Severity::Moderate
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Severity::Moderate => "Moderate",
            Severity::Important => "Important",
            Severity::Critical => "Critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
