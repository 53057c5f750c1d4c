//! Prompt rendering for quote extraction.

use crate::quotes::PricingUnit;

use super::types::CabinCategory;

/// Identifier recorded on each job so replies can be traced to the
/// prompt revision that produced them.
pub const PROMPT_ID: &str = "quote-extract-v1";

const DOCUMENT_OPEN: &str = "<<<DOCUMENT";
const DOCUMENT_CLOSE: &str = "DOCUMENT>>>";

/// Renders the extraction prompt. The document text is embedded verbatim
/// between the document delimiters.
pub fn render(text: &str) -> String {
    let units = PricingUnit::ALL
        .iter()
        .map(|u| format!("\"{}\"", u.as_str()))
        .collect::<Vec<_>>()
        .join(" | ");
    let categories = CabinCategory::ALL
        .iter()
        .map(|c| format!("\"{}\"", c.label()))
        .collect::<Vec<_>>()
        .join(" | ");

    format!(
        r#"You extract cruise price quotes from supplier documents.

Read the document between {open} and {close} and return exactly one JSON object with this schema:

{{
  "sailing_code": string (required, non-empty),
  "ship_name": string (required, non-empty),
  "departure_date": string ("YYYY-MM-DD", or "" if unknown),
  "nights": integer (required, > 0),
  "route": string,
  "quotes": [                                   (required, at least one item)
    {{
      "cabin_type_name": string (required, non-empty),
      "cabin_category": {categories} | "",
      "price": number (required, > 0),
      "currency": string (three-letter ISO 4217 code, e.g. "CNY"),
      "pricing_unit": {units},
      "promotion": string,
      "conditions": string,
      "notes": string
    }}
  ]
}}

Rules:
- Output JSON only. No markdown, no code fences, no commentary.
- Use one quotes item per cabin type and price found in the document.
- Copy cabin type names as written in the document.

{open}
{text}
{close}
"#,
        open = DOCUMENT_OPEN,
        close = DOCUMENT_CLOSE,
        categories = categories,
        units = units,
        text = text,
    )
}
