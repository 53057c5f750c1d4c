//! Turns a raw model reply into a validated `ParseResult`.
//!
//! Cleanups run in order and stop at the first candidate that decodes as
//! a JSON object: trim, strip a leading code fence, slice to the outer
//! braces, then repair trailing commas once. The decoded object is then
//! checked field by field; the first failing field is reported.

use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use serde_json::{Map, Value};

use crate::error::ExtractionError;
use crate::quotes::PricingUnit;

use super::types::{CabinCategory, ParseResult, ParsedQuote};

type Object = Map<String, Value>;

/// Field name reported when no cleanup step yields a JSON object.
pub const ROOT_FIELD: &str = "$";

/// Strict `YYYY-MM-DD`: ten characters, zero-padded month and day.
pub fn parse_iso_date(value: &str) -> Option<NaiveDate> {
    let bytes = value.as_bytes();
    let shaped = bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        });
    if !shaped {
        return None;
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

pub fn parse_reply(reply: &str) -> Result<ParseResult, ExtractionError> {
    let object = decode_reply(reply)?;
    validate(&object)
}

fn decode_reply(reply: &str) -> Result<Object, ExtractionError> {
    let trimmed = reply.trim();
    if trimmed.is_empty() {
        return Err(ExtractionError::Empty);
    }
    if let Some(object) = decode(trimmed) {
        return Ok(object);
    }

    let unfenced = strip_fence(trimmed).unwrap_or(trimmed);
    if let Some(object) = decode(unfenced) {
        return Ok(object);
    }

    let sliced = slice_braces(unfenced).unwrap_or(unfenced);
    if let Some(object) = decode(sliced) {
        return Ok(object);
    }

    let repaired = repair_trailing_commas(sliced);
    decode(&repaired).ok_or_else(|| violation(ROOT_FIELD))
}

fn decode(candidate: &str) -> Option<Object> {
    serde_json::from_str::<Object>(candidate).ok()
}

/// Removes an opening ``` fence (with or without a language tag) and the
/// matching closing fence. Returns `None` if the reply is not fenced.
fn strip_fence(s: &str) -> Option<&str> {
    let rest = s.strip_prefix("```")?;
    let body = match rest.find('\n') {
        Some(newline) if !rest[..newline].contains('{') => &rest[newline + 1..],
        _ => rest,
    };
    let body = body.trim_end();
    Some(body.strip_suffix("```").unwrap_or(body).trim())
}

fn slice_braces(s: &str) -> Option<&str> {
    let start = s.find('{')?;
    let end = s.rfind('}')?;
    (start < end).then(|| &s[start..=end])
}

fn repair_trailing_commas(s: &str) -> String {
    static TRAILING_COMMA: OnceLock<Option<Regex>> = OnceLock::new();
    match TRAILING_COMMA.get_or_init(|| Regex::new(r",\s*([}\]])").ok()) {
        Some(re) => re.replace_all(s, "$1").into_owned(),
        None => s.replace(",}", "}").replace(",]", "]"),
    }
}

fn violation(field: impl Into<String>) -> ExtractionError {
    ExtractionError::SchemaViolation {
        field: field.into(),
    }
}

fn required_str(object: &Object, key: &str, field: &str) -> Result<String, ExtractionError> {
    match object.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(violation(field)),
    }
}

/// Missing and null map to the empty string; any other non-string fails.
fn optional_str(object: &Object, key: &str, field: &str) -> Result<String, ExtractionError> {
    match object.get(key) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.trim().to_string()),
        Some(_) => Err(violation(field)),
    }
}

fn positive_number(value: Option<&Value>) -> Option<f64> {
    let n = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    (n.is_finite() && n > 0.0).then_some(n)
}

fn positive_integer(value: Option<&Value>) -> Option<u32> {
    let n = positive_number(value)?;
    if n.fract() != 0.0 || n > f64::from(u32::MAX) {
        return None;
    }
    Some(n as u32)
}

fn validate(object: &Object) -> Result<ParseResult, ExtractionError> {
    let sailing_code = required_str(object, "sailing_code", "sailing_code")?;
    let ship_name = required_str(object, "ship_name", "ship_name")?;
    let nights = positive_integer(object.get("nights")).ok_or_else(|| violation("nights"))?;

    let departure_date = optional_str(object, "departure_date", "departure_date")?;
    if !departure_date.is_empty() && parse_iso_date(&departure_date).is_none() {
        return Err(violation("departure_date"));
    }

    let route = optional_str(object, "route", "route")?;

    let items = match object.get("quotes") {
        Some(Value::Array(items)) if !items.is_empty() => items,
        _ => return Err(violation("quotes")),
    };

    let quotes = items
        .iter()
        .enumerate()
        .map(|(index, item)| validate_quote(index, item))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ParseResult {
        sailing_code,
        ship_name,
        departure_date,
        nights,
        route,
        quotes,
    })
}

fn validate_quote(index: usize, item: &Value) -> Result<ParsedQuote, ExtractionError> {
    let field = |name: &str| format!("quotes[{}].{}", index, name);

    let Value::Object(item) = item else {
        return Err(violation(format!("quotes[{}]", index)));
    };

    let cabin_type_name = required_str(item, "cabin_type_name", &field("cabin_type_name"))?;

    let price = positive_number(item.get("price")).ok_or_else(|| violation(field("price")))?;

    let currency = optional_str(item, "currency", &field("currency"))?;
    if currency.chars().count() != 3 {
        return Err(violation(field("currency")));
    }

    let pricing_unit = optional_str(item, "pricing_unit", &field("pricing_unit"))?
        .parse::<PricingUnit>()
        .map_err(|_| violation(field("pricing_unit")))?;

    let category_label = optional_str(item, "cabin_category", &field("cabin_category"))?;
    let cabin_category = if category_label.is_empty() {
        None
    } else {
        Some(
            CabinCategory::from_label(&category_label)
                .ok_or_else(|| violation(field("cabin_category")))?,
        )
    };

    Ok(ParsedQuote {
        cabin_type_name,
        cabin_category,
        price,
        currency: currency.to_uppercase(),
        pricing_unit,
        promotion: optional_str(item, "promotion", &field("promotion"))?,
        conditions: optional_str(item, "conditions", &field("conditions"))?,
        notes: optional_str(item, "notes", &field("notes"))?,
    })
}
