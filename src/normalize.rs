//! Shape normalization for the untrusted vendor snapshot.
//!
//! Every field the synthesis pipeline reads out of a snapshot goes through
//! one of the helpers here. Fields may arrive as native lists, delimited
//! strings, scalars of the wrong type, or not at all; the helpers fold all of
//! those into canonical owned values and never fail. The only shape the
//! pipeline rejects is a non-object top-level snapshot, and that check
//! belongs to the caller, not this module.

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::trust::TrustCriterion;

/// Organization and system facts lifted out of the snapshot. Absent fields
/// resolve to empty strings so narrative interpolation never renders a
/// "null".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrganizationProfile {
    pub name: String,
    pub description: String,
    pub industry: String,
    pub hosting: String,
    pub components: Vec<String>,
}

impl OrganizationProfile {
    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
            && self.description.is_empty()
            && self.industry.is_empty()
            && self.hosting.is_empty()
            && self.components.is_empty()
    }
}

/// A supporting artifact referenced by the snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactEntry {
    pub name: String,
    pub kind: String,
    pub reference: String,
}

/// Coerce a list-like value into trimmed, non-empty, deduplicated strings in
/// first-seen order. Accepts a native array (string and numeric elements), a
/// comma- or newline-delimited string, a bare scalar, or nothing.
pub fn string_list(value: Option<&Value>) -> Vec<String> {
    let raw: Vec<String> = match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().filter_map(scalar_text).collect(),
        Some(Value::String(text)) => text
            .split(|c| c == ',' || c == '\n')
            .map(str::to_string)
            .collect(),
        Some(other) => scalar_text(other).into_iter().collect(),
    };
    raw.into_iter()
        .map(|entry| entry.trim().to_string())
        .filter(|entry| !entry.is_empty())
        .unique()
        .collect()
}

/// Render a scalar as text; objects and arrays are dropped rather than
/// serialized into the report.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

/// A single string field: trimmed text for scalars, empty string otherwise.
pub fn optional_string(value: Option<&Value>) -> String {
    value
        .and_then(scalar_text)
        .map(|text| text.trim().to_string())
        .unwrap_or_default()
}

/// Walk a nested object path, returning `None` as soon as a hop is missing
/// or not an object.
pub fn nested<'a>(map: &'a Map<String, Value>, path: &[&str]) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    let mut current = map.get(*first)?;
    for key in rest {
        current = current.as_object()?.get(*key)?;
    }
    Some(current)
}

/// Resolve the trust-services selection. Accepts a flat list or a nested
/// `{selected: [...]}` object; labels fold to the fixed vocabulary and
/// unknown ones drop silently. An empty or invalid selection falls back to
/// the default trio.
pub fn trust_selection(snapshot: &Map<String, Value>) -> Vec<TrustCriterion> {
    let raw = match snapshot.get("trust_services") {
        Some(Value::Object(object)) => object.get("selected"),
        other => other,
    };
    let selection: Vec<TrustCriterion> = string_list(raw)
        .iter()
        .filter_map(|label| TrustCriterion::parse(label))
        .unique()
        .collect();
    if selection.is_empty() {
        TrustCriterion::default_selection()
    } else {
        selection
    }
}

/// Lift the company/system profile. Prefers nested `company` / `system`
/// objects, falls back to the flat key variants older snapshots used.
pub fn organization_profile(snapshot: &Map<String, Value>) -> OrganizationProfile {
    let name = first_non_empty(&[
        optional_string(nested(snapshot, &["company", "name"])),
        optional_string(snapshot.get("company_name")),
        optional_string(snapshot.get("organization")),
    ]);
    let description = first_non_empty(&[
        optional_string(nested(snapshot, &["company", "description"])),
        optional_string(nested(snapshot, &["system", "description"])),
        optional_string(snapshot.get("description")),
    ]);
    let industry = first_non_empty(&[
        optional_string(nested(snapshot, &["company", "industry"])),
        optional_string(snapshot.get("industry")),
    ]);
    let hosting = first_non_empty(&[
        optional_string(nested(snapshot, &["system", "hosting"])),
        optional_string(snapshot.get("hosting")),
    ]);
    let components = {
        let nested_components = string_list(nested(snapshot, &["system", "components"]));
        if nested_components.is_empty() {
            string_list(snapshot.get("components"))
        } else {
            nested_components
        }
    };
    OrganizationProfile {
        name,
        description,
        industry,
        hosting,
        components,
    }
}

fn first_non_empty(candidates: &[String]) -> String {
    candidates
        .iter()
        .find(|candidate| !candidate.is_empty())
        .cloned()
        .unwrap_or_default()
}

/// Normalize the supporting-artifact list. Entries may be bare strings or
/// objects with loosely named fields.
pub fn artifacts(snapshot: &Map<String, Value>) -> Vec<ArtifactEntry> {
    let Some(value) = snapshot.get("artifacts") else {
        return Vec::new();
    };
    match value {
        Value::Array(items) => items.iter().filter_map(artifact_entry).collect(),
        Value::String(_) => string_list(Some(value))
            .into_iter()
            .map(|name| ArtifactEntry {
                name,
                kind: "document".to_string(),
                reference: String::new(),
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn artifact_entry(value: &Value) -> Option<ArtifactEntry> {
    match value {
        Value::String(text) => {
            let name = text.trim().to_string();
            if name.is_empty() {
                return None;
            }
            Some(ArtifactEntry {
                name,
                kind: "document".to_string(),
                reference: String::new(),
            })
        }
        Value::Object(object) => {
            let name = first_non_empty(&[
                optional_string(object.get("name")),
                optional_string(object.get("title")),
            ]);
            if name.is_empty() {
                return None;
            }
            let kind = first_non_empty(&[
                optional_string(object.get("kind")),
                optional_string(object.get("type")),
                "document".to_string(),
            ]);
            let reference = first_non_empty(&[
                optional_string(object.get("reference")),
                optional_string(object.get("url")),
                optional_string(object.get("href")),
            ]);
            Some(ArtifactEntry {
                name,
                kind,
                reference,
            })
        }
        _ => None,
    }
}

/// Storage and backup descriptors scattered across the snapshot: the
/// `storage` and `backup` keys plus every evidence entry, flattened into one
/// list for capability matching.
pub fn storage_descriptors(snapshot: &Map<String, Value>) -> Vec<String> {
    let mut descriptors = string_list(snapshot.get("storage"));
    descriptors.extend(string_list(snapshot.get("backup")));
    if let Some(Value::Object(evidence)) = snapshot.get("evidence") {
        for value in evidence.values() {
            descriptors.extend(string_list(Some(value)));
        }
    } else {
        descriptors.extend(string_list(snapshot.get("evidence")));
    }
    descriptors.into_iter().unique().collect()
}
