use serde_json::Value;

use crate::models::{CandidateRecord, Constraint, Predicate};

/// Serialize a candidate into the document shape constraints address
///
/// Field names follow the wire format (`skills`, `experience`, `isOnline`,
/// `attributes.<key>`), so stored constraint sets resolve unchanged.
pub fn candidate_document(candidate: &CandidateRecord) -> Value {
    serde_json::to_value(candidate).unwrap_or_default()
}

/// Walk a dotted path through a candidate document
///
/// Returns `None` when any segment is missing or the value is null.
pub fn resolve_field<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = document;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    match current {
        Value::Null => None,
        value => Some(value),
    }
}

/// Evaluate one constraint against one candidate
#[inline]
pub fn evaluate(candidate: &CandidateRecord, constraint: &Constraint) -> bool {
    evaluate_document(&candidate_document(candidate), constraint)
}

/// Evaluate one constraint against an already serialized candidate
///
/// Unresolved fields fail regardless of operator. Never errors.
pub fn evaluate_document(document: &Value, constraint: &Constraint) -> bool {
    let Some(field) = resolve_field(document, &constraint.field) else {
        return false;
    };

    match &constraint.predicate {
        Predicate::Equals(expected) => strict_equals(field, expected),
        Predicate::Contains(needle) => match field {
            Value::Array(items) => items.iter().any(|item| strict_equals(item, needle)),
            Value::String(text) => match needle {
                Value::String(needle) => text.to_lowercase().contains(&needle.to_lowercase()),
                _ => false,
            },
            _ => false,
        },
        Predicate::GreaterThan(bound) => compare_numeric(field, bound, |a, b| a > b),
        Predicate::LessThan(bound) => compare_numeric(field, bound, |a, b| a < b),
        Predicate::In(items) => items.iter().any(|item| strict_equals(field, item)),
        Predicate::NotIn(items) => !items.iter().any(|item| strict_equals(field, item)),
        Predicate::Unsupported(operator) => {
            tracing::debug!("Unsupported operator '{}' on field {}", operator, constraint.field);
            false
        }
    }
}

/// Type-strict equality; numbers compare by value regardless of integer/float encoding
fn strict_equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => left == right,
    }
}

fn compare_numeric(field: &Value, bound: &Value, op: impl Fn(f64, f64) -> bool) -> bool {
    match (coerce_number(field), coerce_number(bound)) {
        (Some(a), Some(b)) => op(a, b),
        _ => false,
    }
}

/// Numeric coercion with `Number()` semantics; `None` stands for NaN
fn coerce_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => parse_numeric_text(s)?,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Null => 0.0,
        // arrays coerce through their joined text form
        Value::Array(items) => match items.as_slice() {
            [] => 0.0,
            [Value::Null] => 0.0,
            [Value::Bool(_)] | [Value::Object(_)] => return None,
            [single] => coerce_number(single)?,
            _ => return None,
        },
        Value::Object(_) => return None,
    };
    (!number.is_nan()).then_some(number)
}

/// Parse numeric text: decimal, `0x`/`0o`/`0b` radix literals, `Infinity`
fn parse_numeric_text(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Some(0.0);
    }

    match trimmed {
        "Infinity" | "+Infinity" => return Some(f64::INFINITY),
        "-Infinity" => return Some(f64::NEG_INFINITY),
        _ => {}
    }

    let radix = match trimmed.get(..2) {
        Some("0x") | Some("0X") => Some(16),
        Some("0o") | Some("0O") => Some(8),
        Some("0b") | Some("0B") => Some(2),
        _ => None,
    };
    if let Some(radix) = radix {
        let digits = &trimmed[2..];
        if digits.is_empty() {
            return None;
        }
        return digits.chars().try_fold(0.0_f64, |acc, c| {
            c.to_digit(radix).map(|d| acc * f64::from(radix) + f64::from(d))
        });
    }

    // f64::from_str also takes "inf", "nan" and friends; only exponents may carry letters
    if trimmed
        .chars()
        .any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E')
    {
        return None;
    }
    trimmed.parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Availability;
    use serde_json::json;

    fn candidate() -> CandidateRecord {
        let mut attributes = serde_json::Map::new();
        attributes.insert("languages".into(), json!(["English", "German"]));
        attributes.insert("salary".into(), json!({ "expected": "85000" }));

        CandidateRecord {
            id: "cand-1".into(),
            display_name: Some("Ada".into()),
            skills: vec!["Rust".into(), "TypeScript".into()],
            experience: 4,
            location: "Remote - Europe".into(),
            availability: Availability::Available,
            is_online: true,
            attributes,
        }
    }

    fn check(field: &str, predicate: Predicate) -> bool {
        evaluate(&candidate(), &Constraint::new(field, predicate))
    }

    #[test]
    fn test_equals_is_strict() {
        assert!(check("availability", Predicate::Equals(json!("available"))));
        assert!(check("isOnline", Predicate::Equals(json!(true))));
        assert!(check("experience", Predicate::Equals(json!(4.0))));
        assert!(!check("experience", Predicate::Equals(json!("4"))));
    }

    #[test]
    fn test_contains_list_and_text() {
        assert!(check("skills", Predicate::Contains(json!("Rust"))));
        // list membership is exact
        assert!(!check("skills", Predicate::Contains(json!("rust"))));
        // text is case-insensitive substring
        assert!(check("location", Predicate::Contains(json!("remote"))));
        assert!(!check("experience", Predicate::Contains(json!("4"))));
    }

    #[test]
    fn test_numeric_comparisons_coerce() {
        assert!(check("experience", Predicate::GreaterThan(json!(1))));
        assert!(check("experience", Predicate::GreaterThan(json!("3"))));
        assert!(check("experience", Predicate::LessThan(json!(10))));
        assert!(!check("experience", Predicate::GreaterThan(json!("many"))));
        assert!(!check("skills", Predicate::GreaterThan(json!(0))));
        assert!(check("attributes.salary.expected", Predicate::LessThan(json!(90000))));
    }

    #[test]
    fn test_in_and_not_in() {
        assert!(check("availability", Predicate::In(vec![json!("available"), json!("busy")])));
        assert!(!check("availability", Predicate::NotIn(vec![json!("available")])));
        assert!(check("location", Predicate::NotIn(vec![json!("Berlin")])));
    }

    #[test]
    fn test_unresolved_field_fails_every_operator() {
        assert!(!check("missing", Predicate::NotIn(vec![json!("x")])));
        assert!(!check("attributes.languages.spoken", Predicate::Equals(json!("x"))));
        assert!(!check("skills.first", Predicate::Contains(json!("Rust"))));
    }

    #[test]
    fn test_nested_paths() {
        assert!(check("attributes.languages", Predicate::Contains(json!("German"))));
        assert!(check("attributes.languages.0", Predicate::Equals(json!("English"))));
        assert!(check("skills.1", Predicate::Equals(json!("TypeScript"))));
    }

    #[test]
    fn test_unsupported_operator_fails() {
        assert!(!check("skills", Predicate::Unsupported("regex".into())));
    }

    #[test]
    fn test_numeric_text_follows_number_rules() {
        assert_eq!(parse_numeric_text(" 42 "), Some(42.0));
        assert_eq!(parse_numeric_text(""), Some(0.0));
        assert_eq!(parse_numeric_text("1e3"), Some(1000.0));
        assert_eq!(parse_numeric_text("0x1A"), Some(26.0));
        assert_eq!(parse_numeric_text("0o17"), Some(15.0));
        assert_eq!(parse_numeric_text("0b101"), Some(5.0));
        assert_eq!(parse_numeric_text("0x"), None);
        assert_eq!(parse_numeric_text("-0x1A"), None);
        assert_eq!(parse_numeric_text("0x1G"), None);
        assert_eq!(parse_numeric_text("Infinity"), Some(f64::INFINITY));
        assert_eq!(parse_numeric_text("-Infinity"), Some(f64::NEG_INFINITY));
        for text in ["inf", "+inf", "infinity", "INFINITY", "nan", "NaN"] {
            assert_eq!(parse_numeric_text(text), None, "{text}");
        }
    }

    #[test]
    fn test_single_element_arrays_coerce_as_text() {
        assert_eq!(coerce_number(&json!(["5"])), Some(5.0));
        assert_eq!(coerce_number(&json!([7])), Some(7.0));
        assert_eq!(coerce_number(&json!([])), Some(0.0));
        assert_eq!(coerce_number(&json!([null])), Some(0.0));
        assert_eq!(coerce_number(&json!([[" 3 "]])), Some(3.0));
        assert_eq!(coerce_number(&json!([true])), None);
        assert_eq!(coerce_number(&json!([[false]])), None);
        assert_eq!(coerce_number(&json!([{}])), None);
        assert_eq!(coerce_number(&json!([1, 2])), None);
        // bare booleans still count as 0/1
        assert_eq!(coerce_number(&json!(true)), Some(1.0));
    }

    #[test]
    fn test_hex_bound_compares_numerically() {
        assert!(check("experience", Predicate::LessThan(json!("0x1A"))));
        assert!(!check("experience", Predicate::GreaterThan(json!("inf"))));
        assert!(check("experience", Predicate::LessThan(json!("Infinity"))));
    }
}
