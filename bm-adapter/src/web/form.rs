//! Declarative validation of webhook form fields.
//!
//! Each endpoint declares its fields as a `&[FieldRule]`; [`validate_form`]
//! checks all of them and reports every violation at once.

use std::collections::HashMap;
use std::fmt;

/// What a single field must satisfy.
///
/// Emptiness is judged on the trimmed value; string fields keep the raw value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    /// Present and not empty.
    Required,
    /// Present, parses as an integer, and is not zero.
    RequiredInt,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub name: &'static str,
    pub constraint: Constraint,
}

impl FieldRule {
    pub const fn required(name: &'static str) -> Self {
        Self {
            name,
            constraint: Constraint::Required,
        }
    }

    pub const fn required_int(name: &'static str) -> Self {
        Self {
            name,
            constraint: Constraint::RequiredInt,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: &'static str,
    pub reason: &'static str,
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "field '{}' {}", self.field, self.reason)
    }
}

/// One or more webhook fields failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub violations: Vec<FieldViolation>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.violations.iter().map(|v| v.to_string()).collect();
        f.write_str(&parts.join(", "))
    }
}

impl std::error::Error for ValidationError {}

impl ValidationError {
    pub fn fields(&self) -> Vec<&'static str> {
        self.violations.iter().map(|v| v.field).collect()
    }
}

/// Form values that passed validation.
#[derive(Debug)]
pub struct ValidForm<'a> {
    strings: HashMap<&'static str, &'a str>,
    ints: HashMap<&'static str, i64>,
}

impl<'a> ValidForm<'a> {
    /// Raw value of a validated string field, empty if it was not declared.
    pub fn str(&self, name: &str) -> &'a str {
        self.strings.get(name).copied().unwrap_or_default()
    }

    /// Parsed value of a validated integer field, zero if it was not declared.
    pub fn int(&self, name: &str) -> i64 {
        self.ints.get(name).copied().unwrap_or_default()
    }
}

/// Merge query string fields with a urlencoded body, body values winning.
///
/// The body is read only when `content_type` is absent or
/// `application/x-www-form-urlencoded`; other bodies are ignored.
pub fn merge_fields(
    query: Option<&str>,
    content_type: Option<&str>,
    body: &[u8],
) -> HashMap<String, String> {
    let mut fields: HashMap<String, String> = query
        .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default();

    let is_form = content_type.map_or(true, |ct| {
        ct.split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .eq_ignore_ascii_case("application/x-www-form-urlencoded")
    });

    if is_form && !body.is_empty() {
        fields.extend(url::form_urlencoded::parse(body).into_owned());
    }

    fields
}

/// Check `form` against `rules`.
pub fn validate_form<'a>(
    form: &'a HashMap<String, String>,
    rules: &[FieldRule],
) -> Result<ValidForm<'a>, ValidationError> {
    let mut valid = ValidForm {
        strings: HashMap::new(),
        ints: HashMap::new(),
    };
    let mut violations = Vec::new();

    for rule in rules {
        let raw = form.get(rule.name).map(String::as_str).unwrap_or_default();
        let value = raw.trim();

        if value.is_empty() {
            violations.push(FieldViolation {
                field: rule.name,
                reason: "is required",
            });
            continue;
        }

        match rule.constraint {
            Constraint::Required => {
                valid.strings.insert(rule.name, raw);
            }
            Constraint::RequiredInt => match value.parse::<i64>() {
                Ok(0) => violations.push(FieldViolation {
                    field: rule.name,
                    reason: "is required",
                }),
                Ok(n) => {
                    valid.ints.insert(rule.name, n);
                }
                Err(_) => violations.push(FieldViolation {
                    field: rule.name,
                    reason: "must be an integer",
                }),
            },
        }
    }

    if violations.is_empty() {
        Ok(valid)
    } else {
        Err(ValidationError { violations })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RULES: &[FieldRule] = &[FieldRule::required("id"), FieldRule::required_int("status")];

    fn form(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_valid_form() {
        let values = form(&[("id", " abc123 "), ("status", "8"), ("extra", "x")]);
        let valid = validate_form(&values, RULES).unwrap();

        assert_eq!(valid.str("id"), " abc123 ");
        assert_eq!(valid.int("status"), 8);
    }

    #[test]
    fn test_string_keeps_surrounding_whitespace() {
        let rules = &[FieldRule::required("text")];
        let values = form(&[("text", "  Hello\n")]);
        assert_eq!(validate_form(&values, rules).unwrap().str("text"), "  Hello\n");
    }

    #[test]
    fn test_merge_body_overrides_query() {
        let fields = merge_fields(
            Some("id=abc123&status=2"),
            Some("application/x-www-form-urlencoded; charset=utf-8"),
            b"status=8",
        );
        assert_eq!(fields["id"], "abc123");
        assert_eq!(fields["status"], "8");
    }

    #[test]
    fn test_merge_query_only_and_missing_content_type() {
        let fields = merge_fields(Some("text=Hello+there&to=8080"), None, b"");
        assert_eq!(fields["text"], "Hello there");
        assert_eq!(fields.len(), 2);

        let fields = merge_fields(None, None, b"from=%2B15551234567");
        assert_eq!(fields["from"], "+15551234567");
    }

    #[test]
    fn test_merge_ignores_non_form_body() {
        let fields = merge_fields(Some("id=abc"), Some("application/json"), b"{\"status\":8}");
        assert_eq!(fields.len(), 1);
        assert_eq!(fields["id"], "abc");
    }

    #[test]
    fn test_reports_every_violation() {
        let values = form(&[("status", "eight")]);
        let err = validate_form(&values, RULES).unwrap_err();

        assert_eq!(err.fields(), vec!["id", "status"]);
        assert_eq!(
            err.to_string(),
            "field 'id' is required, field 'status' must be an integer"
        );
    }

    #[test]
    fn test_empty_and_blank_are_missing() {
        let values = form(&[("id", ""), ("status", "   ")]);
        let err = validate_form(&values, RULES).unwrap_err();
        assert_eq!(err.fields(), vec!["id", "status"]);
    }

    #[test]
    fn test_zero_int_is_missing() {
        let values = form(&[("id", "abc"), ("status", "0")]);
        let err = validate_form(&values, RULES).unwrap_err();
        assert_eq!(err.to_string(), "field 'status' is required");
    }

    #[test]
    fn test_negative_int_passes_validation() {
        let values = form(&[("id", "abc"), ("status", "-3")]);
        assert_eq!(validate_form(&values, RULES).unwrap().int("status"), -3);
    }
}
