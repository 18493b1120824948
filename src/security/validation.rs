//! Input validation and injection detection.
//!
//! Every externally-supplied value passes through here before it reaches a
//! store or an LLM prompt. Validation rejects null bytes unconditionally and
//! blocks SQL, Cypher, script, and command-injection patterns, surfacing
//! [`crate::Error::InjectionDetected`] so the attempt can be audited.

use crate::{Error, Result};
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Category of a detected injection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectionKind {
    /// SQL injection (quote-breakouts, stacked statements).
    Sql,
    /// Cypher injection (`MATCH ... DELETE` and friends).
    Cypher,
    /// Script injection (`<script>` tags).
    Script,
    /// Shell command substitution.
    Command,
}

impl InjectionKind {
    /// Returns the kind as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Sql => "sql",
            Self::Cypher => "cypher",
            Self::Script => "script",
            Self::Command => "command",
        }
    }
}

static INJECTION_PATTERNS: LazyLock<Vec<(InjectionKind, Regex)>> = LazyLock::new(|| {
    let table: &[(InjectionKind, &str)] = &[
        // Stacked statements and destructive SQL keywords.
        (
            InjectionKind::Sql,
            r"(?i)(;|^|\s)\s*(drop|truncate|alter)\s+(table|database|index)",
        ),
        (
            InjectionKind::Sql,
            r"(?i)(;|^|\s)\s*(delete|insert|update)\s+(from|into|\w+\s+set)\b",
        ),
        // Quote breakout with tautology: ' OR '1'='1
        (InjectionKind::Sql, r"(?i)'\s*(or|and)\s*'?[\w]*'?\s*="),
        // Trailing comment after a quote.
        (InjectionKind::Sql, r"'.*--"),
        // Cypher destructive clause.
        (
            InjectionKind::Cypher,
            r"(?i)\bmatch\s*\([^)]*\)\s*(detach\s+)?delete\b",
        ),
        (InjectionKind::Cypher, r"(?i)\bdetach\s+delete\b"),
        // Script tags.
        (InjectionKind::Script, r"(?i)<\s*script\b"),
        (InjectionKind::Script, r"(?i)\bjavascript\s*:"),
        // Shell command substitution.
        (InjectionKind::Command, r"\$\([^)]*\)"),
        (InjectionKind::Command, r"`[^`]*`"),
    ];
    table
        .iter()
        .filter_map(|(kind, pattern)| Regex::new(pattern).ok().map(|re| (*kind, re)))
        .collect()
});

static ENTITY_ID_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,128}$").ok());

/// Scans a string for injection patterns.
#[must_use]
pub fn detect_injection(input: &str) -> Option<InjectionKind> {
    INJECTION_PATTERNS
        .iter()
        .find(|(_, re)| re.is_match(input))
        .map(|(kind, _)| *kind)
}

/// Whether a string is a well-formed entity ID (`^[A-Za-z0-9_-]{1,128}$`).
#[must_use]
pub fn is_valid_entity_id(id: &str) -> bool {
    ENTITY_ID_PATTERN
        .as_ref()
        .is_some_and(|re| re.is_match(id))
}

/// Whether a string is safe to bind as a traversal parameter.
///
/// Free of null bytes and of every injection pattern. This gates values
/// bound into parameterised traversals; raw query strings are never built
/// from user input in the first place.
#[must_use]
pub fn is_safe_cypher_input(input: &str) -> bool {
    !input.contains('\0') && detect_injection(input).is_none()
}

/// HTML-entity-escapes a string for safe re-display.
#[must_use]
pub fn sanitize_string(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// Expected primitive type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// A JSON string.
    Text,
    /// A JSON integer.
    Integer,
    /// A JSON number.
    Float,
    /// A JSON boolean.
    Boolean,
}

/// Validation schema for a single field.
#[derive(Debug, Clone)]
pub struct FieldSchema {
    /// Whether the field must be present.
    pub required: bool,
    /// Expected type.
    pub field_type: FieldType,
    /// Minimum numeric value.
    pub min: Option<f64>,
    /// Maximum numeric value.
    pub max: Option<f64>,
    /// Minimum string length (characters).
    pub min_length: Option<usize>,
    /// Maximum string length (characters).
    pub max_length: Option<usize>,
    /// Regex the string must match.
    pub pattern: Option<Regex>,
    /// Whether to HTML-escape the value after validation.
    pub sanitize: bool,
}

impl FieldSchema {
    /// A required text field.
    #[must_use]
    pub const fn text() -> Self {
        Self {
            required: true,
            field_type: FieldType::Text,
            min: None,
            max: None,
            min_length: None,
            max_length: None,
            pattern: None,
            sanitize: false,
        }
    }

    /// A required integer field.
    #[must_use]
    pub const fn integer() -> Self {
        Self {
            required: true,
            field_type: FieldType::Integer,
            min: None,
            max: None,
            min_length: None,
            max_length: None,
            pattern: None,
            sanitize: false,
        }
    }

    /// A required float field.
    #[must_use]
    pub const fn float() -> Self {
        Self {
            required: true,
            field_type: FieldType::Float,
            min: None,
            max: None,
            min_length: None,
            max_length: None,
            pattern: None,
            sanitize: false,
        }
    }

    /// A required boolean field.
    #[must_use]
    pub const fn boolean() -> Self {
        Self {
            required: true,
            field_type: FieldType::Boolean,
            min: None,
            max: None,
            min_length: None,
            max_length: None,
            pattern: None,
            sanitize: false,
        }
    }

    /// Marks the field optional.
    #[must_use]
    pub const fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Sets a numeric range.
    #[must_use]
    pub const fn range(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    /// Sets string length bounds.
    #[must_use]
    pub const fn length(mut self, min: usize, max: usize) -> Self {
        self.min_length = Some(min);
        self.max_length = Some(max);
        self
    }

    /// Sets a regex pattern the value must match.
    #[must_use]
    pub fn matching(mut self, pattern: &str) -> Self {
        self.pattern = Regex::new(pattern).ok();
        self
    }

    /// Enables HTML-escaping of the validated value.
    #[must_use]
    pub const fn sanitized(mut self) -> Self {
        self.sanitize = true;
        self
    }
}

/// Validates a map of values against per-field schemas.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    fields: Vec<(String, FieldSchema)>,
}

impl Validator {
    /// Creates an empty validator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field schema.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, schema: FieldSchema) -> Self {
        self.fields.push((name.into(), schema));
        self
    }

    /// Validates the input, returning a sanitized copy.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] naming the offending field, or
    /// [`Error::InjectionDetected`] when a string field carries an injection
    /// pattern.
    pub fn validate(&self, input: &HashMap<String, Value>) -> Result<HashMap<String, Value>> {
        let mut output = HashMap::new();
        for (name, schema) in &self.fields {
            let Some(value) = input.get(name) else {
                if schema.required {
                    return Err(Error::Validation {
                        field: name.clone(),
                        message: "required field is missing".to_string(),
                    });
                }
                continue;
            };
            output.insert(name.clone(), Self::validate_field(name, schema, value)?);
        }
        Ok(output)
    }

    fn validate_field(name: &str, schema: &FieldSchema, value: &Value) -> Result<Value> {
        match schema.field_type {
            FieldType::Text => Self::validate_text(name, schema, value),
            FieldType::Integer | FieldType::Float => Self::validate_number(name, schema, value),
            FieldType::Boolean => value.as_bool().map(Value::Bool).ok_or_else(|| {
                Error::Validation {
                    field: name.to_string(),
                    message: "expected a boolean".to_string(),
                }
            }),
        }
    }

    fn validate_text(name: &str, schema: &FieldSchema, value: &Value) -> Result<Value> {
        let text = value.as_str().ok_or_else(|| Error::Validation {
            field: name.to_string(),
            message: "expected a string".to_string(),
        })?;
        // Null bytes are rejected regardless of any other schema validity.
        if text.contains('\0') {
            return Err(Error::Validation {
                field: name.to_string(),
                message: "null byte in input".to_string(),
            });
        }
        if let Some(kind) = detect_injection(text) {
            tracing::warn!(field = name, kind = kind.as_str(), "injection blocked");
            return Err(Error::InjectionDetected {
                field: name.to_string(),
            });
        }
        let chars = text.chars().count();
        if let Some(min) = schema.min_length {
            if chars < min {
                return Err(Error::Validation {
                    field: name.to_string(),
                    message: format!("shorter than minimum length {min}"),
                });
            }
        }
        if let Some(max) = schema.max_length {
            if chars > max {
                return Err(Error::Validation {
                    field: name.to_string(),
                    message: format!("longer than maximum length {max}"),
                });
            }
        }
        if let Some(pattern) = &schema.pattern {
            if !pattern.is_match(text) {
                return Err(Error::Validation {
                    field: name.to_string(),
                    message: format!("does not match pattern {}", pattern.as_str()),
                });
            }
        }
        if schema.sanitize {
            Ok(Value::String(sanitize_string(text)))
        } else {
            Ok(value.clone())
        }
    }

    fn validate_number(name: &str, schema: &FieldSchema, value: &Value) -> Result<Value> {
        let number = value.as_f64().ok_or_else(|| Error::Validation {
            field: name.to_string(),
            message: "expected a number".to_string(),
        })?;
        if schema.field_type == FieldType::Integer && number.fract() != 0.0 {
            return Err(Error::Validation {
                field: name.to_string(),
                message: "expected an integer".to_string(),
            });
        }
        if let Some(min) = schema.min {
            if number < min {
                return Err(Error::Validation {
                    field: name.to_string(),
                    message: format!("below minimum {min}"),
                });
            }
        }
        if let Some(max) = schema.max {
            if number > max {
                return Err(Error::Validation {
                    field: name.to_string(),
                    message: format!("above maximum {max}"),
                });
            }
        }
        Ok(value.clone())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("'; DROP TABLE users; --", InjectionKind::Sql; "stacked drop")]
    #[test_case("' OR '1'='1", InjectionKind::Sql; "tautology")]
    #[test_case("<script>alert(1)</script>", InjectionKind::Script; "script tag")]
    #[test_case("MATCH (n) DELETE n", InjectionKind::Cypher; "cypher delete")]
    #[test_case("$(whoami)", InjectionKind::Command; "dollar substitution")]
    #[test_case("`ls -la`", InjectionKind::Command; "backtick substitution")]
    fn test_injection_literals(input: &str, expected: InjectionKind) {
        assert_eq!(detect_injection(input), Some(expected));
    }

    #[test_case("Who developed GPT-4?")]
    #[test_case("transformer architectures for protein folding")]
    #[test_case("attention is all you need")]
    fn test_benign_inputs_pass(input: &str) {
        assert_eq!(detect_injection(input), None);
        assert!(is_safe_cypher_input(input));
    }

    #[test]
    fn test_entity_id_pattern() {
        assert!(is_valid_entity_id("ent_abc-123"));
        assert!(is_valid_entity_id("A"));
        assert!(!is_valid_entity_id(""));
        assert!(!is_valid_entity_id("has space"));
        assert!(!is_valid_entity_id(&"x".repeat(129)));
        assert!(!is_valid_entity_id("semi;colon"));
    }

    #[test]
    fn test_sanitize_string() {
        assert_eq!(
            sanitize_string("<b>\"hi\" & 'bye'</b>"),
            "&lt;b&gt;&quot;hi&quot; &amp; &#x27;bye&#x27;&lt;/b&gt;"
        );
    }

    #[test]
    fn test_null_byte_rejected_despite_valid_schema() {
        let validator = Validator::new().field("q", FieldSchema::text());
        let mut input = HashMap::new();
        input.insert("q".to_string(), Value::String("ok\0bad".to_string()));
        let err = validator.validate(&input).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
        assert!(err.to_string().contains("null byte"));
    }

    #[test]
    fn test_required_and_optional_fields() {
        let validator = Validator::new()
            .field("q", FieldSchema::text())
            .field("limit", FieldSchema::integer().optional().range(1.0, 100.0));

        let mut input = HashMap::new();
        input.insert("q".to_string(), Value::String("hello".to_string()));
        let output = validator.validate(&input).unwrap();
        assert_eq!(output.len(), 1);

        let empty = HashMap::new();
        assert!(validator.validate(&empty).is_err());
    }

    #[test]
    fn test_numeric_bounds() {
        let validator = Validator::new().field("limit", FieldSchema::integer().range(1.0, 10.0));
        let mut input = HashMap::new();
        input.insert("limit".to_string(), Value::from(50));
        assert!(validator.validate(&input).is_err());
        input.insert("limit".to_string(), Value::from(5));
        assert!(validator.validate(&input).is_ok());
        input.insert("limit".to_string(), Value::from(2.5));
        assert!(validator.validate(&input).is_err());
    }

    #[test]
    fn test_length_and_pattern() {
        let validator = Validator::new().field(
            "id",
            FieldSchema::text().length(1, 128).matching("^[A-Za-z0-9_-]+$"),
        );
        let mut input = HashMap::new();
        input.insert("id".to_string(), Value::String("ent_1".to_string()));
        assert!(validator.validate(&input).is_ok());
        input.insert("id".to_string(), Value::String("bad id!".to_string()));
        assert!(validator.validate(&input).is_err());
    }

    #[test]
    fn test_sanitize_applied() {
        let validator = Validator::new().field("name", FieldSchema::text().sanitized());
        let mut input = HashMap::new();
        input.insert("name".to_string(), Value::String("<i>x</i>".to_string()));
        let output = validator.validate(&input).unwrap();
        assert_eq!(
            output.get("name").and_then(Value::as_str),
            Some("&lt;i&gt;x&lt;/i&gt;")
        );
    }
}
