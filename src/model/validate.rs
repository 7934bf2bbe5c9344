//! Path-aware structural validation of raw page JSON.
//!
//! Runs before typed conversion so that errors name the exact field
//! (`$.items[3].actions[0].command`) instead of serde's flattened message.

use super::Command;
use crate::error::SchemaError;
use serde_json::{Map, Value as JsonValue};

type Obj = Map<String, JsonValue>;

const PAGE_TYPES: &[&str] = &["list", "detail", "form"];
const ACTION_TYPES: &[&str] = &["copy", "open", "exit", "reload", "run", "push"];
const INPUT_TYPES: &[&str] = &["textfield", "textarea", "checkbox", "dropdown"];
const PREVIEW_TYPES: &[&str] = &["static", "dynamic"];
const ON_SUCCESS: &[&str] = &["reload", "copy", "open", "exit", "push"];

fn object<'a>(v: &'a JsonValue, path: &str) -> Result<&'a Obj, SchemaError> {
    v.as_object()
        .ok_or_else(|| SchemaError::new(path, format!("expected object, got {}", kind_of(v))))
}

fn kind_of(v: &JsonValue) -> &'static str {
    match v {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

fn tag<'a>(o: &'a Obj, path: &str, allowed: &[&str]) -> Result<&'a str, SchemaError> {
    let p = format!("{path}.type");
    let t = match o.get("type") {
        Some(JsonValue::String(s)) => s.as_str(),
        Some(other) => {
            return Err(SchemaError::new(
                p,
                format!("expected string, got {}", kind_of(other)),
            ))
        }
        None => return Err(SchemaError::new(p, "missing required field")),
    };
    if !allowed.contains(&t) {
        return Err(SchemaError::new(
            p,
            format!("unknown type '{t}' (expected one of: {})", allowed.join(", ")),
        ));
    }
    Ok(t)
}

fn req_str(o: &Obj, key: &str, path: &str) -> Result<(), SchemaError> {
    match o.get(key) {
        Some(JsonValue::String(_)) => Ok(()),
        Some(other) => Err(SchemaError::new(
            format!("{path}.{key}"),
            format!("expected string, got {}", kind_of(other)),
        )),
        None => Err(SchemaError::new(
            format!("{path}.{key}"),
            "missing required field",
        )),
    }
}

fn opt_str(o: &Obj, key: &str, path: &str) -> Result<(), SchemaError> {
    match o.get(key) {
        None | Some(JsonValue::String(_)) => Ok(()),
        Some(other) => Err(SchemaError::new(
            format!("{path}.{key}"),
            format!("expected string, got {}", kind_of(other)),
        )),
    }
}

fn opt_bool(o: &Obj, key: &str, path: &str) -> Result<(), SchemaError> {
    match o.get(key) {
        None | Some(JsonValue::Bool(_)) => Ok(()),
        Some(other) => Err(SchemaError::new(
            format!("{path}.{key}"),
            format!("expected boolean, got {}", kind_of(other)),
        )),
    }
}

fn opt_array<'a>(o: &'a Obj, key: &str, path: &str) -> Result<&'a [JsonValue], SchemaError> {
    match o.get(key) {
        None => Ok(&[]),
        Some(JsonValue::Array(a)) => Ok(a.as_slice()),
        Some(other) => Err(SchemaError::new(
            format!("{path}.{key}"),
            format!("expected array, got {}", kind_of(other)),
        )),
    }
}

fn opt_str_array(o: &Obj, key: &str, path: &str) -> Result<(), SchemaError> {
    for (i, v) in opt_array(o, key, path)?.iter().enumerate() {
        if !v.is_string() {
            return Err(SchemaError::new(
                format!("{path}.{key}[{i}]"),
                format!("expected string, got {}", kind_of(v)),
            ));
        }
    }
    Ok(())
}

fn actions(o: &Obj, key: &str, path: &str) -> Result<(), SchemaError> {
    for (i, a) in opt_array(o, key, path)?.iter().enumerate() {
        validate_action(a, &format!("{path}.{key}[{i}]"))?;
    }
    Ok(())
}

pub fn validate_page(v: &JsonValue, path: &str) -> Result<(), SchemaError> {
    let o = object(v, path)?;
    opt_str(o, "title", path)?;
    match tag(o, path, PAGE_TYPES)? {
        "list" => {
            opt_bool(o, "showPreview", path)?;
            if let Some(ev) = o.get("emptyView") {
                let p = format!("{path}.emptyView");
                let evo = object(ev, &p)?;
                req_str(evo, "text", &p)?;
                actions(evo, "actions", &p)?;
            }
            for (i, item) in opt_array(o, "items", path)?.iter().enumerate() {
                validate_list_item(item, &format!("{path}.items[{i}]"))?;
            }
        }
        "detail" => {
            let p = format!("{path}.preview");
            let preview = o
                .get("preview")
                .ok_or_else(|| SchemaError::new(&p, "missing required field"))?;
            validate_preview(preview, &p)?;
            actions(o, "actions", path)?;
        }
        _ => {
            let p = format!("{path}.submitAction");
            let submit = o
                .get("submitAction")
                .ok_or_else(|| SchemaError::new(&p, "missing required field"))?;
            validate_action(submit, &p)?;
        }
    }
    Ok(())
}

fn validate_list_item(v: &JsonValue, path: &str) -> Result<(), SchemaError> {
    let o = object(v, path)?;
    req_str(o, "title", path)?;
    opt_str(o, "id", path)?;
    opt_str(o, "subtitle", path)?;
    opt_str_array(o, "accessories", path)?;
    if let Some(p) = o.get("preview") {
        validate_preview(p, &format!("{path}.preview"))?;
    }
    actions(o, "actions", path)
}

pub fn validate_preview(v: &JsonValue, path: &str) -> Result<(), SchemaError> {
    let o = object(v, path)?;
    opt_str(o, "language", path)?;
    match tag(o, path, PREVIEW_TYPES)? {
        "static" => req_str(o, "text", path),
        _ => validate_command_field(o, path),
    }
}

fn validate_command_field(o: &Obj, path: &str) -> Result<(), SchemaError> {
    let p = format!("{path}.command");
    let raw = o
        .get("command")
        .ok_or_else(|| SchemaError::new(&p, "missing required field"))?;
    validate_command(raw, &p)
}

pub fn validate_command(v: &JsonValue, path: &str) -> Result<(), SchemaError> {
    match v {
        JsonValue::String(_) => {}
        JsonValue::Array(items) => {
            for (i, a) in items.iter().enumerate() {
                if !a.is_string() {
                    return Err(SchemaError::new(
                        format!("{path}[{i}]"),
                        format!("expected string, got {}", kind_of(a)),
                    ));
                }
            }
        }
        JsonValue::Object(o) => {
            opt_str_array(o, "args", path)?;
            opt_str(o, "input", path)?;
            opt_str(o, "dir", path)?;
        }
        other => {
            return Err(SchemaError::new(
                path,
                format!(
                    "expected string, array or object, got {}",
                    kind_of(other)
                ),
            ))
        }
    }
    // Normalization must succeed up front so no un-runnable command reaches the engine.
    let cmd: Command =
        serde_json::from_value(v.clone()).map_err(|e| SchemaError::new(path, e.to_string()))?;
    cmd.normalize_at(path).map(|_| ())
}

pub fn validate_action(v: &JsonValue, path: &str) -> Result<(), SchemaError> {
    let o = object(v, path)?;
    opt_str(o, "title", path)?;
    opt_str(o, "key", path)?;
    let t = tag(o, path, ACTION_TYPES)?;
    if !matches!(t, "exit" | "reload") {
        let mut seen = std::collections::HashSet::new();
        for (i, input) in opt_array(o, "inputs", path)?.iter().enumerate() {
            let p = format!("{path}.inputs[{i}]");
            validate_input(input, &p)?;
            let name = input.get("name").and_then(|n| n.as_str()).unwrap_or_default();
            if !seen.insert(name.to_string()) {
                return Err(SchemaError::new(
                    format!("{p}.name"),
                    format!("duplicate input name '{name}'"),
                ));
            }
        }
    }
    match t {
        "copy" => req_str(o, "text", path),
        "open" => req_str(o, "target", path),
        "push" => req_str(o, "page", path),
        "run" => {
            validate_command_field(o, path)?;
            opt_bool(o, "confirm", path)?;
            match o.get("onSuccess") {
                None => Ok(()),
                Some(JsonValue::String(s)) if ON_SUCCESS.contains(&s.as_str()) => Ok(()),
                Some(other) => Err(SchemaError::new(
                    format!("{path}.onSuccess"),
                    format!(
                        "unknown value {other} (expected one of: {})",
                        ON_SUCCESS.join(", ")
                    ),
                )),
            }
        }
        _ => Ok(()),
    }
}

pub fn validate_input(v: &JsonValue, path: &str) -> Result<(), SchemaError> {
    let o = object(v, path)?;
    req_str(o, "name", path)?;
    req_str(o, "title", path)?;
    match tag(o, path, INPUT_TYPES)? {
        "textfield" => {
            opt_str(o, "placeholder", path)?;
            opt_str(o, "default", path)?;
            opt_bool(o, "secure", path)
        }
        "textarea" => {
            opt_str(o, "placeholder", path)?;
            opt_str(o, "default", path)
        }
        "checkbox" => {
            opt_bool(o, "default", path)?;
            opt_str(o, "label", path)?;
            opt_str(o, "trueSubstitution", path)?;
            opt_str(o, "falseSubstitution", path)
        }
        _ => {
            opt_str(o, "default", path)?;
            let p = format!("{path}.items");
            if !o.contains_key("items") {
                return Err(SchemaError::new(p, "missing required field"));
            }
            for (i, item) in opt_array(o, "items", path)?.iter().enumerate() {
                let ip = format!("{p}[{i}]");
                let io = object(item, &ip)?;
                req_str(io, "title", &ip)?;
                req_str(io, "value", &ip)?;
            }
            Ok(())
        }
    }
}
