use std::sync::OnceLock;

use regex::Regex;

fn wikilink_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[\[([^\[\]]+)\]\]").expect("valid wikilink pattern"))
}

/// Wikilink targets from `[[Target]]` and `[[Target|Alias]]` forms.
///
/// Embeds (`![[...]]`) are skipped, `#heading` / `^block` suffixes are
/// stripped, folder prefixes reduce to the final path segment, and targets
/// are deduplicated preserving first-seen order.
pub(crate) fn extract_wikilinks(body: &str) -> Vec<String> {
    let mut links = Vec::new();

    for capture in wikilink_re().captures_iter(body) {
        let whole = capture.get(0).expect("whole match");
        if whole.start() > 0 && body.as_bytes()[whole.start() - 1] == b'!' {
            continue;
        }

        let raw = capture.get(1).expect("target capture").as_str();
        let Some(target) = clean_target(raw) else {
            continue;
        };
        if !links.contains(&target) {
            links.push(target);
        }
    }

    links
}

fn clean_target(raw: &str) -> Option<String> {
    // Alias comes after `|`; only the target side is kept.
    let target = raw.split('|').next().unwrap_or(raw);

    // Strip heading and block anchors.
    let split_at = match (target.find('#'), target.find('^')) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    };
    let target = match split_at {
        Some(index) => &target[..index],
        None => target,
    };

    // A folder path links to the note named by its final segment.
    let target = target.rsplit('/').next().unwrap_or(target).trim();

    if target.is_empty() {
        None
    } else {
        Some(target.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::extract_wikilinks;

    #[test]
    fn extracts_plain_and_aliased_links_once() {
        let body = "see [[B]] and [[B|bee]] and [[C|other name]]";
        assert_eq!(extract_wikilinks(body), vec!["B", "C"]);
    }

    #[test]
    fn strips_heading_and_block_anchors() {
        let body = "[[Note#Section]] [[Other^block-id]] [[Mixed#a^b]]";
        assert_eq!(extract_wikilinks(body), vec!["Note", "Other", "Mixed"]);
    }

    #[test]
    fn folder_paths_keep_final_segment() {
        let body = "[[projects/2024/Roadmap]] [[archive/Old Note|old]]";
        assert_eq!(extract_wikilinks(body), vec!["Roadmap", "Old Note"]);
    }

    #[test]
    fn embeds_are_ignored() {
        let body = "![[Image.png]] and a real [[Link]] and ![[Other|alias]]";
        assert_eq!(extract_wikilinks(body), vec!["Link"]);
    }

    #[test]
    fn empty_or_anchor_only_targets_are_skipped() {
        let body = "[[]] [[#heading-only]] [[  ]] [[Real]]";
        assert_eq!(extract_wikilinks(body), vec!["Real"]);
    }

    #[test]
    fn order_is_first_seen() {
        let body = "[[Z]] then [[A]] then [[Z]] again";
        assert_eq!(extract_wikilinks(body), vec!["Z", "A"]);
    }
}
