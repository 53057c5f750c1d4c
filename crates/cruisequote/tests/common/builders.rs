//! Builders for test inputs: office documents and model replies.

#![allow(dead_code)]

use std::io::{Cursor, Write};

use serde_json::{json, Value};
use zip::write::SimpleFileOptions;

/// Builds a minimal `.docx` container whose body holds one paragraph per
/// entry, each as a single run.
pub fn docx_bytes(paragraphs: &[&str]) -> Vec<u8> {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t xml:space=\"preserve\">{}</w:t></w:r></w:p>", escape(p)))
        .collect();
    let document = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
        body
    );

    let mut buffer = Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut buffer);
        let options = SimpleFileOptions::default();
        zip.start_file("[Content_Types].xml", options).unwrap();
        zip.write_all(b"<?xml version=\"1.0\"?><Types/>").unwrap();
        zip.start_file("word/document.xml", options).unwrap();
        zip.write_all(document.as_bytes()).unwrap();
        zip.finish().unwrap();
    }
    buffer.into_inner()
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// The S1 paragraph: one sailing, one balcony price.
pub const S1_PARAGRAPH: &str =
    "QN20260515 Quantum of the Seas 5 nights Tokyo–Osaka Balcony 4200 CNY per person";

/// Builder for model replies in the extraction contract's JSON shape.
pub struct ReplyBuilder {
    sailing_code: String,
    ship_name: String,
    departure_date: String,
    nights: u32,
    route: String,
    quotes: Vec<Value>,
}

impl ReplyBuilder {
    /// The S1 sailing with no quotes yet.
    pub fn s1_sailing() -> Self {
        Self {
            sailing_code: "QN20260515".to_string(),
            ship_name: "Quantum of the Seas".to_string(),
            departure_date: "2026-05-15".to_string(),
            nights: 5,
            route: "Tokyo–Osaka".to_string(),
            quotes: Vec::new(),
        }
    }

    pub fn sailing(mut self, code: &str, ship: &str, departure: &str, nights: u32) -> Self {
        self.sailing_code = code.to_string();
        self.ship_name = ship.to_string();
        self.departure_date = departure.to_string();
        self.nights = nights;
        self
    }

    /// Adds a per-person CNY quote.
    pub fn quote(mut self, cabin: &str, category: &str, price: f64) -> Self {
        self.quotes.push(json!({
            "cabin_type_name": cabin,
            "cabin_category": category,
            "price": price,
            "currency": "CNY",
            "pricing_unit": "PER_PERSON",
            "promotion": "",
            "conditions": "",
            "notes": ""
        }));
        self
    }

    pub fn value(&self) -> Value {
        json!({
            "sailing_code": self.sailing_code,
            "ship_name": self.ship_name,
            "departure_date": self.departure_date,
            "nights": self.nights,
            "route": self.route,
            "quotes": self.quotes,
        })
    }

    pub fn build(&self) -> String {
        self.value().to_string()
    }

    /// Pretty JSON with a trailing comma before the final brace, inside a
    /// ```json fence.
    pub fn build_fenced_with_trailing_comma(&self) -> String {
        let pretty = serde_json::to_string_pretty(&self.value()).unwrap();
        let body = pretty.trim_end().strip_suffix('}').unwrap().trim_end();
        format!("```json\n{},\n}}\n```", body)
    }
}

/// The S1 reply: one balcony quote at 4200 CNY per person.
pub fn s1_reply() -> ReplyBuilder {
    ReplyBuilder::s1_sailing().quote("Balcony", "阳台", 4200.0)
}
