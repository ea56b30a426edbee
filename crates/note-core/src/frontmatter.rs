use serde_json::{Map, Value as JsonValue};
use serde_yaml::Value as YamlValue;

/// Split a note source into its YAML frontmatter (if any) and the body.
///
/// Frontmatter is delimited by `---` lines at the very top of the file. The
/// returned body is the byte-exact remainder after the closing delimiter
/// line, which is what the content hash is computed over.
pub fn split_frontmatter(source: &str) -> (Option<String>, &str) {
    let trimmed = source.trim_start_matches(['\u{FEFF}', '\u{200B}']);
    let offset = source.len() - trimmed.len();

    let Some(first_end) = trimmed.find('\n') else {
        return (None, source);
    };
    if !is_delimiter(&trimmed[..first_end]) {
        return (None, source);
    }

    let mut cursor = first_end + 1;
    while cursor <= trimmed.len() {
        let line_end = trimmed[cursor..]
            .find('\n')
            .map(|i| cursor + i)
            .unwrap_or(trimmed.len());
        if is_delimiter(&trimmed[cursor..line_end]) {
            let yaml = trimmed[first_end + 1..cursor].to_string();
            let body_start = offset + usize::min(line_end + 1, trimmed.len());
            return (Some(yaml), &source[body_start..]);
        }
        if line_end == trimmed.len() {
            break;
        }
        cursor = line_end + 1;
    }

    // No closing delimiter: the whole file is body.
    (None, source)
}

fn is_delimiter(line: &str) -> bool {
    line.trim() == "---"
}

/// Parse a frontmatter YAML block into a JSON object map.
///
/// Non-mapping frontmatter (a bare scalar or list) yields an empty map;
/// invalid YAML is an error so sync can count the note as failed.
pub fn parse_frontmatter(yaml_source: &str) -> Result<Map<String, JsonValue>, String> {
    if yaml_source.trim().is_empty() {
        return Ok(Map::new());
    }

    let parsed: YamlValue = serde_yaml::from_str(yaml_source).map_err(|e| e.to_string())?;
    match parsed {
        YamlValue::Mapping(_) => match yaml_to_json(parsed) {
            JsonValue::Object(map) => Ok(map),
            _ => Ok(Map::new()),
        },
        YamlValue::Null => Ok(Map::new()),
        _ => Ok(Map::new()),
    }
}

fn yaml_to_json(value: YamlValue) -> JsonValue {
    match value {
        YamlValue::Null => JsonValue::Null,
        YamlValue::Bool(flag) => JsonValue::Bool(flag),
        YamlValue::String(text) => JsonValue::String(text),
        YamlValue::Number(number) => number
            .as_i64()
            .map(JsonValue::from)
            .or_else(|| number.as_u64().map(JsonValue::from))
            .or_else(|| {
                number
                    .as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map(JsonValue::Number)
            })
            .unwrap_or(JsonValue::Null),
        YamlValue::Sequence(items) => items.into_iter().map(yaml_to_json).collect(),
        YamlValue::Mapping(entries) => {
            let mut object = Map::new();
            for (key, entry) in entries {
                object.insert(render_key(&key), yaml_to_json(entry));
            }
            JsonValue::Object(object)
        }
        YamlValue::Tagged(tagged) => yaml_to_json((*tagged).value),
    }
}

/// Frontmatter keys are almost always strings; non-string keys (numbers,
/// booleans) are rendered back through YAML so nothing is silently lost.
fn render_key(key: &YamlValue) -> String {
    match key {
        YamlValue::String(text) => text.clone(),
        other => serde_yaml::to_string(other)
            .map(|rendered| rendered.trim().to_string())
            .unwrap_or_default(),
    }
}
