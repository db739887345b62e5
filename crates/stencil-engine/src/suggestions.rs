//! Fuzzy matching and context-aware suggestions for template errors
//!
//! Uses Levenshtein distance to point at the key or function the author
//! most likely meant.

use serde_json::Value as JsonValue;

use crate::ast::FieldPath;

/// Maximum Levenshtein distance to consider for suggestions
const MAX_SUGGESTION_DISTANCE: usize = 3;

/// Keys listed in full when nothing is close enough
const MAX_LISTED_KEYS: usize = 10;

/// Suggestion result with confidence scoring
#[derive(Debug, Clone, PartialEq)]
pub struct Suggestion {
    /// The suggested correction
    pub text: String,
    /// Levenshtein distance (lower = better match)
    pub distance: usize,
}

/// Find closest matches from a list of candidates
///
/// Exact matches are skipped; case-only differences rank first.
pub fn find_closest_matches(input: &str, candidates: &[&str], max_results: usize) -> Vec<Suggestion> {
    let mut suggestions: Vec<Suggestion> = candidates
        .iter()
        .filter(|&&candidate| candidate != input)
        .filter_map(|&candidate| {
            let distance = if candidate.eq_ignore_ascii_case(input) {
                0
            } else {
                strsim::levenshtein(input, candidate)
            };
            (distance <= MAX_SUGGESTION_DISTANCE).then(|| Suggestion {
                text: candidate.to_string(),
                distance,
            })
        })
        .collect();

    suggestions.sort_by(|a, b| a.distance.cmp(&b.distance).then_with(|| a.text.cmp(&b.text)));
    suggestions.truncate(max_results);
    suggestions
}

/// Suggest corrections for an unknown function
pub fn suggest_unknown_function(name: &str, available: &[&str]) -> Option<String> {
    let matches = find_closest_matches(name, available, 3);

    if matches.is_empty() {
        Some(format!("Available functions: {}", available.join(", ")))
    } else {
        let names: Vec<String> = matches.iter().map(|s| format!("`{}`", s.text)).collect();
        Some(format!("Did you mean {}?", names.join(" or ")))
    }
}

/// Suggest a fix for a field path that does not resolve against `root`
///
/// Walks the path to the first missing segment and proposes siblings.
pub fn suggest_missing_field(root: &JsonValue, path: &FieldPath) -> Option<String> {
    let mut current = root;
    let mut resolved = FieldPath {
        rooted: path.rooted,
        segments: Vec::new(),
        span: path.span,
    };

    for segment in &path.segments {
        let next = match current {
            JsonValue::Object(map) => map.get(segment),
            JsonValue::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        };

        if let Some(next) = next {
            resolved.segments.push(segment.clone());
            current = next;
            continue;
        }

        let parent = resolved.to_string();
        return Some(match current {
            JsonValue::Object(map) => {
                let available: Vec<&str> = map.keys().map(String::as_str).collect();
                let matches = find_closest_matches(segment, &available, 3);
                if !matches.is_empty() {
                    let options: Vec<String> = matches
                        .iter()
                        .map(|m| format!("`{}`", join_field(&parent, &m.text)))
                        .collect();
                    format!("Key `{}` not found. Did you mean {}?", segment, options.join(" or "))
                } else if available.is_empty() {
                    format!(
                        "`{}` is empty. Set `{}` in values or use `default` to supply a fallback.",
                        parent,
                        segment
                    )
                } else {
                    let mut listed: Vec<&str> = available.into_iter().take(MAX_LISTED_KEYS).collect();
                    if map.len() > MAX_LISTED_KEYS {
                        listed.push("…");
                    }
                    format!(
                        "Key `{}` not found in `{}`. Available keys: {}. Use `default` to supply a fallback.",
                        segment,
                        parent,
                        listed.join(", ")
                    )
                }
            }
            JsonValue::Null => format!("`{}` is null, so it has no field `{}`", parent, segment),
            other => format!(
                "`{}` is {}, so it has no field `{}`",
                parent,
                describe(other),
                segment
            ),
        });
    }

    None
}

fn join_field(parent: &str, key: &str) -> String {
    if parent == "." {
        format!(".{}", key)
    } else {
        format!("{}.{}", parent, key)
    }
}

fn describe(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "a list",
        JsonValue::Object(_) => "a mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Span;
    use serde_json::json;

    fn path(segments: &[&str]) -> FieldPath {
        FieldPath {
            rooted: false,
            segments: segments.iter().map(|s| s.to_string()).collect(),
            span: Span::default(),
        }
    }

    fn context() -> JsonValue {
        json!({
            "Values": {
                "image": {"repository": "registry/backend", "tag": "v1.2.0"},
                "replicaCount": 3
            },
            "Release": {"Name": "backend", "Namespace": "prod"}
        })
    }

    #[test]
    fn test_find_closest_matches() {
        let matches = find_closest_matches("toYml", &["toYaml", "toJson", "trim"], 3);
        assert_eq!(matches[0].text, "toYaml");
        assert_eq!(matches[0].distance, 1);
    }

    #[test]
    fn test_case_difference_ranks_first() {
        let matches = find_closest_matches("values", &["Values", "Release"], 3);
        assert_eq!(matches[0].text, "Values");
        assert_eq!(matches[0].distance, 0);
    }

    #[test]
    fn test_suggest_unknown_function() {
        let hint = suggest_unknown_function("nident", &["indent", "nindent", "quote"]).unwrap();
        assert_eq!(hint, "Did you mean `nindent` or `indent`?");

        let hint = suggest_unknown_function("zzzzzz", &["quote"]).unwrap();
        assert_eq!(hint, "Available functions: quote");
    }

    #[test]
    fn test_suggest_typo_in_values() {
        let hint = suggest_missing_field(&context(), &path(&["Values", "imag", "tag"])).unwrap();
        assert_eq!(hint, "Key `imag` not found. Did you mean `.Values.image`?");
    }

    #[test]
    fn test_suggest_lowercase_values() {
        let hint = suggest_missing_field(&context(), &path(&["values", "image"])).unwrap();
        assert_eq!(hint, "Key `values` not found. Did you mean `.Values`?");
    }

    #[test]
    fn test_suggest_lists_available_keys() {
        let hint = suggest_missing_field(&context(), &path(&["Values", "namespace", "name"])).unwrap();
        assert!(hint.contains("Available keys: image, replicaCount"));
    }

    #[test]
    fn test_suggest_field_on_scalar() {
        let hint = suggest_missing_field(&context(), &path(&["Values", "replicaCount", "max"])).unwrap();
        assert_eq!(hint, "`.Values.replicaCount` is a number, so it has no field `max`");
    }

    #[test]
    fn test_no_suggestion_for_resolvable_path() {
        assert!(suggest_missing_field(&context(), &path(&["Values", "image"])).is_none());
    }
}
