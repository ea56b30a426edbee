use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value as JsonValue};

use crate::fences::fenced_ranges;

fn inline_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)(?:^|\s)#([A-Za-z][\w/-]*)").expect("valid tag pattern"))
}

/// Inline `#tag` markers outside fenced code blocks, lowercased and
/// deduplicated preserving first-seen order.
pub(crate) fn extract_inline_tags(body: &str) -> Vec<String> {
    let fences = fenced_ranges(body);
    let mut tags = Vec::new();

    for capture in inline_tag_re().captures_iter(body) {
        let matched = capture.get(1).expect("tag capture group");
        if in_fenced_range(&fences, matched.start()) {
            continue;
        }

        let Some(tag) = normalize_tag(matched.as_str()) else {
            continue;
        };
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }

    tags
}

/// Tags declared in frontmatter under `tags`, either as a list or a scalar,
/// normalized the same way as inline tags.
pub(crate) fn frontmatter_tags(metadata: &Map<String, JsonValue>) -> Vec<String> {
    let mut tags = Vec::new();
    let mut push = |raw: &str| {
        if let Some(tag) = normalize_tag(raw) {
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }
    };

    match metadata.get("tags") {
        Some(JsonValue::Array(items)) => {
            for item in items {
                if let Some(raw) = item.as_str() {
                    push(raw);
                }
            }
        }
        Some(JsonValue::String(raw)) => push(raw),
        _ => {}
    }

    tags
}

/// Lowercase and validate a raw tag. A leading `#` is tolerated; anything
/// that does not fit `[a-z0-9][a-z0-9/_-]*` after folding is dropped.
pub fn normalize_tag(raw: &str) -> Option<String> {
    let tag = raw.trim().trim_start_matches('#').to_lowercase();
    if tag.is_empty() {
        return None;
    }

    let mut chars = tag.chars();
    let first = chars.next()?;
    if !first.is_ascii_alphanumeric() {
        return None;
    }
    if chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '_' | '-')) {
        Some(tag)
    } else {
        None
    }
}

fn in_fenced_range(ranges: &[(usize, usize)], position: usize) -> bool {
    ranges
        .iter()
        .any(|(start, end)| position >= *start && position < *end)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{extract_inline_tags, frontmatter_tags, normalize_tag};

    #[test]
    fn collects_and_folds_inline_tags() {
        let body = "intro #Topic then #topic and #other/sub plus #with_underscore";
        assert_eq!(
            extract_inline_tags(body),
            vec!["topic", "other/sub", "with_underscore"]
        );
    }

    #[test]
    fn tag_requires_leading_whitespace_or_line_start() {
        let body = "#lead mid#notatag\n#second";
        assert_eq!(extract_inline_tags(body), vec!["lead", "second"]);
    }

    #[test]
    fn tags_inside_fenced_code_blocks_are_ignored() {
        let body = "#outside\n```\n#inside\n```\ntail #after";
        assert_eq!(extract_inline_tags(body), vec!["outside", "after"]);
    }

    #[test]
    fn frontmatter_tags_accept_list_and_scalar() {
        let list = json!({"tags": ["Alpha", "#beta", "Alpha"]});
        let map = list.as_object().expect("object").clone();
        assert_eq!(frontmatter_tags(&map), vec!["alpha", "beta"]);

        let scalar = json!({"tags": "Solo"});
        let map = scalar.as_object().expect("object").clone();
        assert_eq!(frontmatter_tags(&map), vec!["solo"]);
    }

    #[test]
    fn invalid_tags_are_dropped() {
        assert_eq!(normalize_tag("  "), None);
        assert_eq!(normalize_tag("-leading-dash"), None);
        assert_eq!(normalize_tag("has space"), None);
        assert_eq!(normalize_tag("#Valid/Sub"), Some("valid/sub".to_string()));
    }
}
