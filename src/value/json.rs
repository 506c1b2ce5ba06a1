//! Conversion between [`Value`] and JSON, driven by a [`Type`].
//!
//! This is the persisted form of resource state and the form in which
//! configuration is read from the workspace file.

use serde_json::Value as Json;
use std::collections::BTreeMap;

use crate::diag::{Diagnostic, DiagnosticClass, Diagnostics};
use crate::path::Path;

use super::{Known, Number, Type, Value};

fn decode_error(path: &Path, expected: &Type, json: &Json) -> Diagnostics {
    let found = match json {
        Json::Null => "null",
        Json::Bool(_) => "bool",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    };
    Diagnostic::error(
        DiagnosticClass::Configuration,
        "Invalid Value",
        format!("Expected a value of type {expected} at {path}, found {found}."),
    )
    .at(path)
    .into()
}

/// Decodes `json` as a value of `ty`.
///
/// JSON `null` decodes to a null value. Object attributes missing from the
/// JSON decode to null; unexpected attributes are rejected.
///
/// # Errors
///
/// Returns diagnostics if the JSON does not match the type.
pub fn from_json(ty: &Type, json: &Json, path: &Path) -> Result<Value, Diagnostics> {
    if json.is_null() {
        return Ok(Value::null(ty.clone()));
    }

    let base = match ty.base() {
        Type::Bool => match json {
            Json::Bool(b) => Value::bool(*b),
            Json::String(s) if s == "true" || s == "false" => Value::bool(s == "true"),
            _ => return Err(decode_error(path, ty, json)),
        },
        Type::Number => {
            let text = match json {
                Json::Number(n) => n.to_string(),
                Json::String(s) => s.clone(),
                _ => return Err(decode_error(path, ty, json)),
            };
            let number: Number = text.parse().map_err(|_| decode_error(path, ty, json))?;
            Value::number(number)
        }
        Type::String => match json {
            Json::String(s) => Value::string(s.clone()),
            Json::Number(n) => Value::string(n.to_string()),
            Json::Bool(b) => Value::string(b.to_string()),
            _ => return Err(decode_error(path, ty, json)),
        },
        Type::List(elem) | Type::Set(elem) => {
            let Json::Array(items) = json else {
                return Err(decode_error(path, ty, json));
            };
            let is_set = matches!(ty.base(), Type::Set(_));
            let mut elements = Vec::with_capacity(items.len());
            let mut diags = Diagnostics::new();
            for (i, item) in items.iter().enumerate() {
                match from_json(&elem, item, &path.at_list_index(i)) {
                    Ok(v) => elements.push(v),
                    Err(d) => diags.append(d),
                }
            }
            if diags.has_error() {
                return Err(diags);
            }
            let built = if is_set {
                Value::set(*elem, elements)
            } else {
                Value::list(*elem, elements)
            };
            built.map_err(|d| Diagnostics::from(d.at(path)))?
        }
        Type::Map(elem) => {
            let Json::Object(items) = json else {
                return Err(decode_error(path, ty, json));
            };
            let mut entries = BTreeMap::new();
            let mut diags = Diagnostics::new();
            for (key, item) in items {
                match from_json(&elem, item, &path.at_map_key(key.clone())) {
                    Ok(v) => {
                        entries.insert(key.clone(), v);
                    }
                    Err(d) => diags.append(d),
                }
            }
            if diags.has_error() {
                return Err(diags);
            }
            Value::map(*elem, entries).map_err(|d| Diagnostics::from(d.at(path)))?
        }
        Type::Object(attr_types) => {
            let Json::Object(items) = json else {
                return Err(decode_error(path, ty, json));
            };
            let mut diags = Diagnostics::new();
            for key in items.keys() {
                if !attr_types.contains_key(key) {
                    diags.push(
                        Diagnostic::error(
                            DiagnosticClass::Configuration,
                            "Unsupported Argument",
                            format!("An argument named {key:?} is not expected here."),
                        )
                        .at(&path.at_name(key.clone())),
                    );
                }
            }
            let mut attrs = BTreeMap::new();
            for (name, attr_ty) in &attr_types {
                let child_path = path.at_name(name.clone());
                let item = items.get(name).unwrap_or(&Json::Null);
                match from_json(attr_ty, item, &child_path) {
                    Ok(v) => {
                        attrs.insert(name.clone(), v);
                    }
                    Err(d) => diags.append(d),
                }
            }
            if diags.has_error() {
                return Err(diags);
            }
            Value::object(attr_types, attrs).map_err(|d| Diagnostics::from(d.at(path)))?
        }
        Type::Dynamic => Value::dynamic(infer(json)),
        Type::Custom(_) => unreachable_custom(path)?,
    };

    ty.value_from_base(base, path)
}

// `Type::base` strips every custom layer, so this arm only exists for
// exhaustiveness.
fn unreachable_custom(path: &Path) -> Result<Value, Diagnostics> {
    Err(Diagnostic::error(
        DiagnosticClass::SchemaDefinition,
        "Invalid Custom Type",
        format!("The custom type at {path} has a custom base type."),
    )
    .at(path)
    .into())
}

/// Infers a value from untyped JSON.
///
/// Arrays become lists of dynamic values and objects become objects with
/// inferred attribute types.
#[must_use]
pub fn infer(json: &Json) -> Value {
    match json {
        Json::Null => Value::null(Type::Dynamic),
        Json::Bool(b) => Value::bool(*b),
        Json::Number(n) => n
            .to_string()
            .parse::<Number>()
            .map_or_else(|_| Value::string(n.to_string()), Value::number),
        Json::String(s) => Value::string(s.clone()),
        Json::Array(items) => {
            let elements = items.iter().map(|i| Value::dynamic(infer(i))).collect();
            Value::list(Type::Dynamic, elements).unwrap_or_else(|_| Value::null(Type::Dynamic))
        }
        Json::Object(items) => {
            Value::object_from(items.iter().map(|(k, v)| (k.clone(), infer(v))))
                .unwrap_or_else(|_| Value::null(Type::Dynamic))
        }
    }
}

fn number_to_json(number: &Number) -> Json {
    if let Some(i) = number.as_i64() {
        return Json::from(i);
    }
    if let Some(u) = number.as_u64() {
        return Json::from(u);
    }
    let f = number.as_f64();
    match serde_json::Number::from_f64(f) {
        Some(n) if Number::from_f64(f).as_ref() == Some(number) => Json::Number(n),
        // Not representable as f64 without loss.
        _ => Json::String(number.to_string()),
    }
}

/// Encodes `value` as JSON.
///
/// # Errors
///
/// Returns a diagnostic if the value is or contains an unknown, which has no
/// persisted representation.
pub fn to_json(value: &Value, path: &Path) -> Result<Json, Diagnostic> {
    if value.is_null() {
        return Ok(Json::Null);
    }
    let Some(known) = value.known() else {
        return Err(Diagnostic::error(
            DiagnosticClass::LifecycleState,
            "Unknown Value In State",
            format!("The value at {path} is unknown and cannot be persisted."),
        )
        .at(path));
    };

    Ok(match known {
        Known::Bool(b) => Json::Bool(*b),
        Known::Number(n) => number_to_json(n),
        Known::String(s) => Json::String(s.clone()),
        Known::List(elems) | Known::Set(elems) => Json::Array(
            elems
                .iter()
                .enumerate()
                .map(|(i, e)| to_json(e, &path.at_list_index(i)))
                .collect::<Result<_, _>>()?,
        ),
        Known::Map(entries) => Json::Object(
            entries
                .iter()
                .map(|(k, v)| Ok((k.clone(), to_json(v, &path.at_map_key(k.clone()))?)))
                .collect::<Result<_, Diagnostic>>()?,
        ),
        Known::Object(attrs) => Json::Object(
            attrs
                .iter()
                .map(|(k, v)| Ok((k.clone(), to_json(v, &path.at_name(k.clone()))?)))
                .collect::<Result<_, Diagnostic>>()?,
        ),
        Known::Dynamic(inner) => to_json(inner, path)?,
    })
}
