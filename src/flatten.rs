//! Flattening projection: nested issue document → flat display list.
//!
//! Pure and deterministic. Traversal follows document order (section, then
//! sub-section, then template order) with first-occurrence-wins
//! de-duplication by `sem_header`. All normalization here is a display
//! concern; the stored document is never mutated by this module.

use std::collections::HashSet;

use crate::models::{DisplayIssue, IssueDocument, ScalarOrList, SemTemplate};

/// Canonical category labels, matched by case-insensitive substring.
const CATEGORY_RULES: &[(&str, &str)] = &[
    ("software", "Software Updates"),
    ("config", "Configuration Changes"),
    ("network", "Network Exposures"),
    ("control", "Security Controls"),
    ("email", "Email Threats"),
];

/// Fallback label when no category rule matches.
const CATEGORY_OTHER: &str = "Other";

/// Project the nested document into the flat list the issue browser
/// consumes. Order matches document traversal order; a header seen twice
/// keeps only its first occurrence.
pub fn flatten(doc: &IssueDocument) -> Vec<DisplayIssue> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut issues = Vec::new();
    for template in doc.templates() {
        if !seen.insert(template.sem_header.as_str()) {
            continue;
        }
        issues.push(display_issue(template));
    }
    issues
}

fn display_issue(t: &SemTemplate) -> DisplayIssue {
    DisplayIssue {
        id: t.sem_header.clone(),
        name: t.sem_header.clone(),
        category: canonical_category(&t.sem_category),
        description: if t.sem_long_description.is_empty() {
            None
        } else {
            Some(t.sem_long_description.clone())
        },
        recommendations: normalize_recommendations(&t.sem_recommendations),
        reference: extract_reference(&t.sem_resolution_instruction),
        severity_score: t.severity_score,
    }
}

/// Best-effort canonicalization of a stored category into the fixed label
/// set. Substring matching is case-insensitive, so exact label matches
/// (any casing) land on the same rule. Anything unmatched, including an
/// empty category, becomes "Other".
pub fn canonical_category(raw: &str) -> String {
    let lower = raw.trim().to_lowercase();
    if !lower.is_empty() {
        for (needle, label) in CATEGORY_RULES {
            if lower.contains(needle) {
                return (*label).to_string();
            }
        }
    }
    CATEGORY_OTHER.to_string()
}

/// Normalize stored recommendations for display.
///
/// A list is trimmed element-wise with empties dropped. A legacy scalar is
/// split on newlines and bullet markers; when splitting yields nothing the
/// original string is kept as a one-element sequence. An empty result is
/// reported as absent.
fn normalize_recommendations(recs: &ScalarOrList) -> Option<Vec<String>> {
    match recs {
        ScalarOrList::List(items) => {
            let cleaned: Vec<String> = items
                .iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if cleaned.is_empty() {
                None
            } else {
                Some(cleaned)
            }
        }
        ScalarOrList::Scalar(text) => {
            let pieces = split_recommendation_text(text);
            if !pieces.is_empty() {
                Some(pieces)
            } else if text.trim().is_empty() {
                None
            } else {
                Some(vec![text.clone()])
            }
        }
    }
}

/// Split a legacy single-string recommendation on newlines and bullet
/// markers (`•` and `- `), trimming and dropping empty fragments.
fn split_recommendation_text(text: &str) -> Vec<String> {
    let mut pieces = Vec::new();
    for line in text.split('\n') {
        for bullet in line.split('\u{2022}') {
            for piece in bullet.split("- ") {
                let piece = piece.trim();
                if !piece.is_empty() {
                    pieces.push(piece.to_string());
                }
            }
        }
    }
    pieces
}

/// Scan the resolution instruction in order and return the first element
/// that normalizes to a valid http(s) URL, if any.
fn extract_reference(instruction: &ScalarOrList) -> Option<String> {
    instruction.iter().find_map(normalize_url)
}

/// Normalize a candidate reference into an http(s) URL.
///
/// Already-prefixed `http://`/`https://` values are accepted as-is; a bare
/// domain-like string (hostname plus optional path) gets `https://`
/// prefixed; anything else is rejected.
pub fn normalize_url(raw: &str) -> Option<String> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if s.starts_with("http://") || s.starts_with("https://") {
        return Some(s.to_string());
    }
    if looks_like_host_path(s) {
        return Some(format!("https://{}", s));
    }
    None
}

/// Loose hostname-plus-optional-path check for bare references like
/// `learn.microsoft.com/entra/identity`.
fn looks_like_host_path(s: &str) -> bool {
    if s.contains(char::is_whitespace) {
        return false;
    }
    let host = s.split('/').next().unwrap_or_default();
    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() < 2 {
        return false;
    }
    let tld = labels[labels.len() - 1];
    if tld.len() < 2 || !tld.chars().all(|c| c.is_ascii_alphabetic()) {
        return false;
    }
    labels
        .iter()
        .all(|label| !label.is_empty() && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FindingTemplate, Section, SubSection};

    fn template(header: &str) -> SemTemplate {
        SemTemplate {
            sem_header: header.to_string(),
            sem_category: String::new(),
            severity_score: None,
            sem_long_description: String::new(),
            sem_recommendations: ScalarOrList::default(),
            sem_resolution_instruction: ScalarOrList::default(),
        }
    }

    fn doc_with(headers: &[&str]) -> IssueDocument {
        IssueDocument {
            sections: vec![Section {
                title: "S".to_string(),
                sub_sections: vec![SubSection {
                    title: "SS".to_string(),
                    finding_templates: headers
                        .iter()
                        .map(|h| FindingTemplate {
                            sem_template: template(h),
                        })
                        .collect(),
                }],
            }],
        }
    }

    #[test]
    fn test_flatten_preserves_document_order() {
        let issues = flatten(&doc_with(&["c", "a", "b"]));
        let ids: Vec<&str> = issues.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_flatten_dedups_first_occurrence_wins() {
        let mut doc = doc_with(&["a", "b"]);
        // Same header again in a later section
        doc.sections.push(Section {
            title: "S2".to_string(),
            sub_sections: vec![SubSection {
                title: "SS2".to_string(),
                finding_templates: vec![FindingTemplate {
                    sem_template: SemTemplate {
                        sem_long_description: "later copy".to_string(),
                        ..template("a")
                    },
                }],
            }],
        });
        let issues = flatten(&doc);
        assert_eq!(issues.len(), 2);
        assert!(issues[0].description.is_none(), "first occurrence wins");
    }

    #[test]
    fn test_category_substring_rules() {
        assert_eq!(canonical_category("Misconfigured thing"), "Configuration Changes");
        assert_eq!(canonical_category("NETWORK exposure"), "Network Exposures");
        assert_eq!(canonical_category("software updates"), "Software Updates");
        assert_eq!(canonical_category("Access Control"), "Security Controls");
        assert_eq!(canonical_category("Email Threats"), "Email Threats");
    }

    #[test]
    fn test_category_unmatched_or_empty_is_other() {
        assert_eq!(canonical_category(""), "Other");
        assert_eq!(canonical_category("   "), "Other");
        assert_eq!(canonical_category("physical security"), "Other");
    }

    #[test]
    fn test_recommendations_list_trimmed_and_filtered() {
        let recs = ScalarOrList::List(vec![
            "  apply patch  ".to_string(),
            "".to_string(),
            "   ".to_string(),
            "reboot".to_string(),
        ]);
        assert_eq!(
            normalize_recommendations(&recs),
            Some(vec!["apply patch".to_string(), "reboot".to_string()])
        );
    }

    #[test]
    fn test_recommendations_empty_list_absent() {
        let recs = ScalarOrList::List(vec!["  ".to_string()]);
        assert_eq!(normalize_recommendations(&recs), None);
    }

    #[test]
    fn test_recommendations_scalar_split_on_bullets_and_newlines() {
        let recs = ScalarOrList::Scalar(
            "• Block legacy protocols\n• Monitor sign-in logs\n- Review exceptions".to_string(),
        );
        assert_eq!(
            normalize_recommendations(&recs),
            Some(vec![
                "Block legacy protocols".to_string(),
                "Monitor sign-in logs".to_string(),
                "Review exceptions".to_string(),
            ])
        );
    }

    #[test]
    fn test_recommendations_scalar_fallback_single_entry() {
        let recs = ScalarOrList::Scalar("Apply the vendor patch".to_string());
        assert_eq!(
            normalize_recommendations(&recs),
            Some(vec!["Apply the vendor patch".to_string()])
        );
    }

    #[test]
    fn test_normalize_url_accepts_prefixed() {
        assert_eq!(
            normalize_url("https://example.com/a?b=1"),
            Some("https://example.com/a?b=1".to_string())
        );
        assert_eq!(
            normalize_url("http://example.com"),
            Some("http://example.com".to_string())
        );
    }

    #[test]
    fn test_normalize_url_prefixes_bare_domain() {
        assert_eq!(
            normalize_url("learn.microsoft.com/entra/identity"),
            Some("https://learn.microsoft.com/entra/identity".to_string())
        );
    }

    #[test]
    fn test_normalize_url_rejects_plain_text() {
        assert_eq!(normalize_url("See the setup guide"), None);
        assert_eq!(normalize_url("not a url"), None);
        assert_eq!(normalize_url("e.g."), None);
        assert_eq!(normalize_url(""), None);
    }

    #[test]
    fn test_reference_takes_first_valid_url() {
        let instr = ScalarOrList::List(vec![
            "Open the admin console".to_string(),
            "docs.example.com/fix".to_string(),
            "https://example.com/second".to_string(),
        ]);
        assert_eq!(
            extract_reference(&instr),
            Some("https://docs.example.com/fix".to_string())
        );
    }

    #[test]
    fn test_reference_absent_when_nothing_normalizes() {
        let instr = ScalarOrList::List(vec!["step one".to_string(), "step two".to_string()]);
        assert_eq!(extract_reference(&instr), None);
    }

    #[test]
    fn test_reference_scalar_coerced_to_sequence() {
        let instr = ScalarOrList::Scalar("portal.azure.com".to_string());
        assert_eq!(
            extract_reference(&instr),
            Some("https://portal.azure.com".to_string())
        );
    }

    #[test]
    fn test_display_issue_description_absent_when_empty() {
        let issues = flatten(&doc_with(&["a"]));
        assert!(issues[0].description.is_none());
        assert!(issues[0].recommendations.is_none());
        assert!(issues[0].reference.is_none());
        assert!(issues[0].severity_score.is_none());
        assert_eq!(issues[0].category, "Other");
    }
}
