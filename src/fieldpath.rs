//! Dotted field paths over JSON data (`soci.0.nome`).
//!
//! A final `-` segment (`soci.-`) appends to a list.
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One user edit of the merged data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Edit {
    Set { path: String, value: Value },
    Unset { path: String },
}

impl Edit {
    pub fn path(&self) -> &str {
        match self {
            Self::Set { path, .. } | Self::Unset { path } => path,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(usize),
    /// End of a list; only valid as the last segment of a `set`.
    Append,
}

/// Segment text that appends to a list.
const APPEND_SEGMENT: &str = "-";

fn parse_path(path: &str) -> Result<Vec<Segment>> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("empty field path"));
    }
    trimmed
        .split('.')
        .map(|part| {
            let part = part.trim();
            if part.is_empty() {
                return Err(anyhow!("empty segment in field path {path:?}"));
            }
            if part == APPEND_SEGMENT {
                return Ok(Segment::Append);
            }
            Ok(match part.parse::<usize>() {
                Ok(index) => Segment::Index(index),
                Err(_) => Segment::Key(part.to_string()),
            })
        })
        .collect()
}

/// Parse a `--set PATH=VALUE` argument.
///
/// Values that look like JSON structures (`[..]`, `{..}`, `"..."`, `true`,
/// `false`, `null`) are parsed as JSON; everything else, numbers included,
/// is kept as a string so codes like `01234567890` survive intact.
pub fn parse_set_arg(raw: &str) -> Result<Edit> {
    let (path, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("expected PATH=VALUE, got {raw:?}"))?;
    parse_path(path)?;
    let text = value.trim();
    let looks_like_json = text.starts_with('[')
        || text.starts_with('{')
        || text.starts_with('"')
        || matches!(text, "true" | "false" | "null");
    let value = if looks_like_json {
        serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
    } else {
        Value::String(text.to_string())
    };
    Ok(Edit::Set {
        path: path.trim().to_string(),
        value,
    })
}

/// Parse an `--unset PATH` argument.
pub fn parse_unset_arg(raw: &str) -> Result<Edit> {
    parse_path(raw)?;
    Ok(Edit::Unset {
        path: raw.trim().to_string(),
    })
}

/// Rewrite a `set` at the end of a list as an append.
///
/// `soci.2` on a two-item list becomes `soci.-`, so replaying the edit after a
/// merge that grew the list adds the person instead of replacing one.
pub fn as_append(fields: &Map<String, Value>, edit: Edit) -> Edit {
    let Edit::Set { path, value } = edit else {
        return edit;
    };
    let trimmed = path.trim();
    let Some((parent, last)) = trimmed.rsplit_once('.') else {
        return Edit::Set { path, value };
    };
    let appends = match (last.parse::<usize>(), lookup(fields, parent)) {
        (Ok(index), Some(Value::Array(items))) => index == items.len(),
        _ => false,
    };
    if appends {
        Edit::Set {
            path: format!("{parent}.{APPEND_SEGMENT}"),
            value,
        }
    } else {
        Edit::Set { path, value }
    }
}

/// Look up a value by dotted path.
pub fn lookup<'a>(fields: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let segments = parse_path(path).ok()?;
    let (first, rest) = segments.split_first()?;
    let mut current = match first {
        Segment::Key(key) => fields.get(key)?,
        Segment::Index(index) => fields.get(&index.to_string())?,
        Segment::Append => return None,
    };
    for segment in rest {
        current = match (segment, current) {
            (Segment::Key(key), Value::Object(map)) => map.get(key)?,
            (Segment::Index(index), Value::Array(items)) => items.get(*index)?,
            (Segment::Index(index), Value::Object(map)) => map.get(&index.to_string())?,
            _ => return None,
        };
    }
    Some(current)
}

/// Text of a value at `path`, empty when missing or blank.
pub fn lookup_text(fields: &Map<String, Value>, path: &str) -> String {
    lookup(fields, path).map(value_text).unwrap_or_default()
}

/// Render a scalar value as trimmed text; lists join their scalar items.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.trim().to_string(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => if *flag { "sì" } else { "no" }.to_string(),
        Value::Array(items) => items
            .iter()
            .map(value_text)
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(_) => String::new(),
    }
}

/// True for null, blank strings, and containers holding only blank values.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        Value::Array(items) => items.iter().all(is_blank),
        Value::Object(map) => map.values().all(is_blank),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Apply one edit in place.
pub fn apply_edit(fields: &mut Map<String, Value>, edit: &Edit) -> Result<()> {
    let segments = parse_path(edit.path())?;
    let Some((last, parents)) = segments.split_last() else {
        return Err(anyhow!("empty field path"));
    };

    let mut current = fields_slot(fields, parents, edit)?;
    match edit {
        Edit::Set { value, .. } => {
            match (last, &mut current) {
                (Segment::Key(key), Slot::Object(map)) => {
                    map.insert(key.clone(), value.clone());
                }
                (Segment::Index(index), Slot::Array(items)) => {
                    if *index < items.len() {
                        items[*index] = value.clone();
                    } else if *index == items.len() {
                        items.push(value.clone());
                    } else {
                        return Err(anyhow!(
                            "index {index} out of range in {:?} (list has {} items)",
                            edit.path(),
                            items.len()
                        ));
                    }
                }
                (Segment::Index(index), Slot::Object(map)) => {
                    map.insert(index.to_string(), value.clone());
                }
                (Segment::Append, Slot::Array(items)) => items.push(value.clone()),
                (Segment::Append, Slot::Object(_)) => {
                    return Err(anyhow!("{:?}: `-` appends only to a list", edit.path()));
                }
                (Segment::Key(key), Slot::Array(_)) => {
                    return Err(anyhow!("{:?}: {key:?} is not a list index", edit.path()));
                }
            }
            Ok(())
        }
        Edit::Unset { .. } => {
            let removed = match (last, &mut current) {
                (Segment::Key(key), Slot::Object(map)) => map.remove(key).is_some(),
                (Segment::Index(index), Slot::Object(map)) => {
                    map.remove(&index.to_string()).is_some()
                }
                (Segment::Index(index), Slot::Array(items)) => {
                    if *index < items.len() {
                        items.remove(*index);
                        true
                    } else {
                        false
                    }
                }
                (Segment::Key(_), Slot::Array(_)) | (Segment::Append, _) => false,
            };
            if removed {
                Ok(())
            } else {
                Err(anyhow!("nothing to unset at {:?}", edit.path()))
            }
        }
    }
}

enum Slot<'a> {
    Object(&'a mut Map<String, Value>),
    Array(&'a mut Vec<Value>),
}

/// Walk to the container addressed by `parents`, creating objects for
/// missing keys when setting.
fn fields_slot<'a>(
    fields: &'a mut Map<String, Value>,
    parents: &[Segment],
    edit: &Edit,
) -> Result<Slot<'a>> {
    let create = matches!(edit, Edit::Set { .. });
    let mut slot = Slot::Object(fields);
    for segment in parents {
        let next: &'a mut Value = match (segment, slot) {
            (Segment::Key(key), Slot::Object(map)) => {
                if !map.contains_key(key) {
                    if !create {
                        return Err(anyhow!("nothing to unset at {:?}", edit.path()));
                    }
                    map.insert(key.clone(), Value::Object(Map::new()));
                }
                map.get_mut(key)
                    .ok_or_else(|| anyhow!("missing {key:?} in {:?}", edit.path()))?
            }
            (Segment::Index(index), Slot::Object(map)) => {
                let key = index.to_string();
                map.get_mut(&key)
                    .ok_or_else(|| anyhow!("missing {key:?} in {:?}", edit.path()))?
            }
            (Segment::Index(index), Slot::Array(items)) => {
                let len = items.len();
                items.get_mut(*index).ok_or_else(|| {
                    anyhow!(
                        "index {index} out of range in {:?} (list has {len} items)",
                        edit.path()
                    )
                })?
            }
            (Segment::Key(key), Slot::Array(_)) => {
                return Err(anyhow!("{:?}: {key:?} is not a list index", edit.path()));
            }
            (Segment::Append, _) => {
                return Err(anyhow!("{:?}: `-` must be the last segment", edit.path()));
            }
        };
        slot = match next {
            Value::Object(map) => Slot::Object(map),
            Value::Array(items) => Slot::Array(items),
            _ => {
                return Err(anyhow!(
                    "{:?} passes through a value that is not an object or list",
                    edit.path()
                ))
            }
        };
    }
    Ok(slot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("object expected"),
        }
    }

    #[test]
    fn set_arg_keeps_numbers_as_text_and_parses_structures() {
        assert_eq!(
            parse_set_arg("partita_iva=01234567890").unwrap(),
            Edit::Set {
                path: "partita_iva".to_string(),
                value: json!("01234567890")
            }
        );
        assert_eq!(
            parse_set_arg("capitale_sociale=10000").unwrap(),
            Edit::Set {
                path: "capitale_sociale".to_string(),
                value: json!("10000")
            }
        );
        assert_eq!(
            parse_set_arg("assemblea.totalitaria=false").unwrap(),
            Edit::Set {
                path: "assemblea.totalitaria".to_string(),
                value: json!(false)
            }
        );
        assert_eq!(
            parse_set_arg("assemblea.presenti=[\"Rossi\",\"Bianchi\"]").unwrap(),
            Edit::Set {
                path: "assemblea.presenti".to_string(),
                value: json!(["Rossi", "Bianchi"])
            }
        );
        assert!(parse_set_arg("senza-uguale").is_err());
        assert!(parse_set_arg("a..b=1").is_err());
    }

    #[test]
    fn lookup_walks_objects_and_lists() {
        let data = fields(json!({"soci": [{"nome": "Rossi"}], "assemblea": {"data": "30/04/2026"}}));
        assert_eq!(lookup_text(&data, "soci.0.nome"), "Rossi");
        assert_eq!(lookup_text(&data, "assemblea.data"), "30/04/2026");
        assert!(lookup(&data, "soci.1.nome").is_none());
        assert!(lookup(&data, "assemblea.data.giorno").is_none());
    }

    #[test]
    fn set_creates_intermediate_objects_and_appends_to_lists() {
        let mut data = fields(json!({"soci": [{"nome": "Rossi"}]}));
        apply_edit(&mut data, &parse_set_arg("delibera.compenso=12000").unwrap()).unwrap();
        apply_edit(&mut data, &parse_set_arg("soci.1={\"nome\":\"Bianchi\"}").unwrap()).unwrap();
        apply_edit(&mut data, &parse_set_arg("soci.0.quota_percentuale=60").unwrap()).unwrap();
        assert_eq!(data["delibera"]["compenso"], "12000");
        assert_eq!(data["soci"][1]["nome"], "Bianchi");
        assert_eq!(data["soci"][0]["quota_percentuale"], "60");

        let err = apply_edit(&mut data, &parse_set_arg("soci.5.nome=X").unwrap()).unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn set_through_scalar_is_rejected() {
        let mut data = fields(json!({"denominazione": "Alfa"}));
        assert!(apply_edit(&mut data, &parse_set_arg("denominazione.x=1").unwrap()).is_err());
    }

    #[test]
    fn unset_removes_keys_and_list_items() {
        let mut data = fields(json!({"pec": "a@b.it", "soci": [{"nome": "A"}, {"nome": "B"}]}));
        apply_edit(&mut data, &parse_unset_arg("pec").unwrap()).unwrap();
        apply_edit(&mut data, &parse_unset_arg("soci.0").unwrap()).unwrap();
        assert!(!data.contains_key("pec"));
        assert_eq!(data["soci"], json!([{"nome": "B"}]));
        assert!(apply_edit(&mut data, &parse_unset_arg("pec").unwrap()).is_err());
        assert!(apply_edit(&mut data, &parse_unset_arg("nessuno.campo").unwrap()).is_err());
    }

    #[test]
    fn blank_detection_recurses() {
        assert!(is_blank(&json!({"a": "", "b": [" "]})));
        assert!(!is_blank(&json!({"a": "", "b": ["x"]})));
        assert!(!is_blank(&json!(false)));
    }

    #[test]
    fn value_text_formats_scalars_and_lists() {
        assert_eq!(value_text(&json!(true)), "sì");
        assert_eq!(value_text(&json!(12.5)), "12.5");
        assert_eq!(value_text(&json!(["Rossi", "", "Bianchi"])), "Rossi, Bianchi");
    }

    #[test]
    fn append_segment_adds_to_the_end() {
        let mut data = fields(json!({"soci": [{"nome": "Rossi"}]}));
        apply_edit(&mut data, &parse_set_arg("soci.-={\"nome\":\"Verdi\"}").unwrap()).unwrap();
        assert_eq!(data["soci"][1]["nome"], "Verdi");
        assert!(lookup(&data, "soci.-").is_none());
        assert!(apply_edit(&mut data, &parse_set_arg("soci.-.nome=X").unwrap()).is_err());
        assert!(apply_edit(&mut data, &parse_set_arg("delibera.-=X").unwrap()).is_err());
        assert!(apply_edit(&mut data, &parse_unset_arg("soci.-").unwrap()).is_err());
    }

    #[test]
    fn set_at_list_end_is_stored_as_append() {
        let data = fields(json!({"soci": [{"nome": "Rossi"}, {"nome": "Bianchi"}]}));
        let append = as_append(&data, parse_set_arg("soci.2={\"nome\":\"Verdi\"}").unwrap());
        assert_eq!(append.path(), "soci.-");
        let replace = as_append(&data, parse_set_arg("soci.1.nome=Neri").unwrap());
        assert_eq!(replace.path(), "soci.1.nome");
        let replace = as_append(&data, parse_set_arg("soci.0={}").unwrap());
        assert_eq!(replace.path(), "soci.0");
    }
}
