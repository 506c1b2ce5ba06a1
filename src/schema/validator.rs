//! Configuration validators attached to attributes, blocks and nested objects.

use regex::Regex;
use std::fmt;

use crate::diag::{Diagnostic, Diagnostics};
use crate::path::Path;
use crate::value::{Number, Value};

/// Input to a [`Validator`].
#[derive(Debug, Clone, Copy)]
pub struct ValidateRequest<'a> {
    /// Location of the value being validated.
    pub path: &'a Path,
    /// The configured value, in base form.
    pub config_value: &'a Value,
    /// The whole resource configuration.
    pub config: &'a Value,
}

/// Output of a [`Validator`].
#[derive(Debug, Default)]
pub struct ValidateResponse {
    /// Problems found.
    pub diagnostics: Diagnostics,
}

/// Checks a configured value. Never sees unknown values.
pub trait Validator: Send + Sync + fmt::Debug {
    /// Human-readable description used in logs and schema output.
    fn description(&self) -> String;

    /// Runs the check.
    fn validate(&self, req: &ValidateRequest<'_>, resp: &mut ValidateResponse);
}

fn skip(value: &Value) -> bool {
    value.is_null() || value.is_unknown()
}

/// String length bounds, counted in characters.
#[derive(Debug, Clone)]
pub struct StringLength {
    min: usize,
    max: Option<usize>,
}

/// Requires a string of at least `min` characters.
#[must_use]
pub const fn string_length_at_least(min: usize) -> StringLength {
    StringLength { min, max: None }
}

/// Requires a string of `min..=max` characters.
#[must_use]
pub const fn string_length_between(min: usize, max: usize) -> StringLength {
    StringLength {
        min,
        max: Some(max),
    }
}

impl Validator for StringLength {
    fn description(&self) -> String {
        match self.max {
            Some(max) => format!("string length must be between {} and {max}", self.min),
            None => format!("string length must be at least {}", self.min),
        }
    }

    fn validate(&self, req: &ValidateRequest<'_>, resp: &mut ValidateResponse) {
        if skip(req.config_value) {
            return;
        }
        let Some(s) = req.config_value.as_str() else {
            return;
        };
        let len = s.chars().count();
        if len < self.min || self.max.is_some_and(|max| len > max) {
            resp.diagnostics.push(Diagnostic::invalid_configuration(
                req.path,
                "Invalid Attribute Value Length",
                format!("Attribute {} {}, got: {len}", req.path, self.description()),
            ));
        }
    }
}

/// Requires a string from a fixed list.
#[derive(Debug, Clone)]
pub struct OneOf {
    allowed: Vec<String>,
}

/// Requires the string to be one of `allowed`.
#[must_use]
pub fn string_one_of<I, S>(allowed: I) -> OneOf
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    OneOf {
        allowed: allowed.into_iter().map(Into::into).collect(),
    }
}

impl Validator for OneOf {
    fn description(&self) -> String {
        format!("value must be one of: {:?}", self.allowed)
    }

    fn validate(&self, req: &ValidateRequest<'_>, resp: &mut ValidateResponse) {
        if skip(req.config_value) {
            return;
        }
        if let Some(s) = req.config_value.as_str()
            && !self.allowed.iter().any(|a| a == s)
        {
            resp.diagnostics.push(Diagnostic::invalid_configuration(
                req.path,
                "Invalid Attribute Value Match",
                format!("Attribute {} {}, got: {s:?}", req.path, self.description()),
            ));
        }
    }
}

/// Requires a string to match a regular expression.
#[derive(Debug, Clone)]
pub struct Matches {
    regex: Regex,
    message: String,
}

/// Requires the string to match `regex`; `message` explains the rule.
#[must_use]
pub fn string_matches(regex: Regex, message: impl Into<String>) -> Matches {
    Matches {
        regex,
        message: message.into(),
    }
}

impl Validator for Matches {
    fn description(&self) -> String {
        if self.message.is_empty() {
            format!("value must match regular expression '{}'", self.regex)
        } else {
            self.message.clone()
        }
    }

    fn validate(&self, req: &ValidateRequest<'_>, resp: &mut ValidateResponse) {
        if skip(req.config_value) {
            return;
        }
        if let Some(s) = req.config_value.as_str()
            && !self.regex.is_match(s)
        {
            resp.diagnostics.push(Diagnostic::invalid_configuration(
                req.path,
                "Invalid Attribute Value Match",
                format!("Attribute {} {}, got: {s:?}", req.path, self.description()),
            ));
        }
    }
}

/// Numeric bounds, inclusive.
#[derive(Debug, Clone)]
pub struct NumberRange {
    min: Option<Number>,
    max: Option<Number>,
}

/// Requires a number of at least `min`.
#[must_use]
pub fn number_at_least(min: impl Into<Number>) -> NumberRange {
    NumberRange {
        min: Some(min.into()),
        max: None,
    }
}

/// Requires a number of at most `max`.
#[must_use]
pub fn number_at_most(max: impl Into<Number>) -> NumberRange {
    NumberRange {
        min: None,
        max: Some(max.into()),
    }
}

/// Requires a number in `min..=max`.
#[must_use]
pub fn number_between(min: impl Into<Number>, max: impl Into<Number>) -> NumberRange {
    NumberRange {
        min: Some(min.into()),
        max: Some(max.into()),
    }
}

impl Validator for NumberRange {
    fn description(&self) -> String {
        match (&self.min, &self.max) {
            (Some(min), Some(max)) => format!("value must be between {min} and {max}"),
            (Some(min), None) => format!("value must be at least {min}"),
            (None, Some(max)) => format!("value must be at most {max}"),
            (None, None) => "any number".to_string(),
        }
    }

    fn validate(&self, req: &ValidateRequest<'_>, resp: &mut ValidateResponse) {
        if skip(req.config_value) {
            return;
        }
        let Some(n) = req.config_value.as_number() else {
            return;
        };
        let below = self.min.as_ref().is_some_and(|min| n < min);
        let above = self.max.as_ref().is_some_and(|max| n > max);
        if below || above {
            resp.diagnostics.push(Diagnostic::invalid_configuration(
                req.path,
                "Invalid Attribute Value",
                format!("Attribute {} {}, got: {n}", req.path, self.description()),
            ));
        }
    }
}

/// Element count bounds for lists, sets and maps.
#[derive(Debug, Clone)]
pub struct SizeRange {
    min: usize,
    max: Option<usize>,
}

/// Requires at least `min` elements.
#[must_use]
pub const fn size_at_least(min: usize) -> SizeRange {
    SizeRange { min, max: None }
}

/// Requires `min..=max` elements.
#[must_use]
pub const fn size_between(min: usize, max: usize) -> SizeRange {
    SizeRange {
        min,
        max: Some(max),
    }
}

impl Validator for SizeRange {
    fn description(&self) -> String {
        match self.max {
            Some(max) => format!("must contain between {} and {max} elements", self.min),
            None => format!("must contain at least {} elements", self.min),
        }
    }

    fn validate(&self, req: &ValidateRequest<'_>, resp: &mut ValidateResponse) {
        if skip(req.config_value) {
            return;
        }
        let len = req
            .config_value
            .elements()
            .map(<[Value]>::len)
            .or_else(|| req.config_value.entries().map(std::collections::BTreeMap::len));
        let Some(len) = len else {
            return;
        };
        if len < self.min || self.max.is_some_and(|max| len > max) {
            resp.diagnostics.push(Diagnostic::invalid_configuration(
                req.path,
                "Invalid Attribute Value",
                format!("Attribute {} {}, got: {len}", req.path, self.description()),
            ));
        }
    }
}

/// Rejects configurations that set this value together with other paths.
#[derive(Debug, Clone)]
pub struct ConflictsWith {
    others: Vec<Path>,
}

/// Rejects configurations that also set any of `others`.
#[must_use]
pub fn conflicts_with(others: impl IntoIterator<Item = Path>) -> ConflictsWith {
    ConflictsWith {
        others: others.into_iter().collect(),
    }
}

impl Validator for ConflictsWith {
    fn description(&self) -> String {
        let others: Vec<String> = self.others.iter().map(ToString::to_string).collect();
        format!("Ensure that if an attribute is set, these are not set: [{}]", others.join(", "))
    }

    fn validate(&self, req: &ValidateRequest<'_>, resp: &mut ValidateResponse) {
        if skip(req.config_value) {
            return;
        }
        for other in &self.others {
            if other == req.path {
                continue;
            }
            if req.config.at_path(other).is_some_and(|v| !v.is_null()) {
                resp.diagnostics.push(Diagnostic::invalid_configuration(
                    req.path,
                    "Invalid Attribute Combination",
                    format!("Attribute {other} cannot be specified when {} is specified", req.path),
                ));
            }
        }
    }
}

/// Validator backed by a closure.
pub struct FnValidator<F> {
    description: String,
    check: F,
}

/// Wraps `check` as a validator.
pub fn validator_fn<F>(description: impl Into<String>, check: F) -> FnValidator<F>
where
    F: Fn(&ValidateRequest<'_>, &mut ValidateResponse) + Send + Sync,
{
    FnValidator {
        description: description.into(),
        check,
    }
}

impl<F> fmt::Debug for FnValidator<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnValidator")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

impl<F> Validator for FnValidator<F>
where
    F: Fn(&ValidateRequest<'_>, &mut ValidateResponse) + Send + Sync,
{
    fn description(&self) -> String {
        self.description.clone()
    }

    fn validate(&self, req: &ValidateRequest<'_>, resp: &mut ValidateResponse) {
        (self.check)(req, resp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(validator: &dyn Validator, value: &Value) -> Diagnostics {
        let path = Path::root("attr");
        let config = Value::object_from([("attr", value.clone())]).expect("object");
        let mut resp = ValidateResponse::default();
        validator.validate(
            &ValidateRequest {
                path: &path,
                config_value: value,
                config: &config,
            },
            &mut resp,
        );
        resp.diagnostics
    }

    #[test]
    fn test_string_length() {
        let v = string_length_between(2, 4);
        assert!(!run(&v, &Value::string("abc")).has_error());
        assert!(run(&v, &Value::string("a")).has_error());
        assert!(run(&v, &Value::string("abcde")).has_error());
        assert!(!run(&v, &Value::null(crate::value::Type::String)).has_error());
    }

    #[test]
    fn test_one_of_and_regex() {
        let v = string_one_of(["a", "b"]);
        assert!(!run(&v, &Value::string("a")).has_error());
        assert!(run(&v, &Value::string("c")).has_error());

        let v = string_matches(Regex::new("^[0-7]{3,4}$").expect("regex"), "");
        assert!(!run(&v, &Value::string("0644")).has_error());
        assert!(run(&v, &Value::string("0999")).has_error());
    }

    #[test]
    fn test_number_range() {
        let v = number_between(1, 10);
        assert!(!run(&v, &Value::number(10)).has_error());
        assert!(run(&v, &Value::number(11)).has_error());
        assert!(run(&v, &Value::number(0)).has_error());

        let v = number_at_most(5);
        assert!(!run(&v, &Value::number(-3)).has_error());
        assert!(run(&v, &Value::number(6)).has_error());
        assert_eq!(v.description(), "value must be at most 5");
    }

    #[test]
    fn test_conflicts_with() {
        let path = Path::root("a");
        let config = Value::object_from([("a", Value::string("x")), ("b", Value::string("y"))])
            .expect("object");
        let mut resp = ValidateResponse::default();
        conflicts_with([Path::root("b")]).validate(
            &ValidateRequest {
                path: &path,
                config_value: &Value::string("x"),
                config: &config,
            },
            &mut resp,
        );
        assert_eq!(resp.diagnostics.error_count(), 1);
    }
}
