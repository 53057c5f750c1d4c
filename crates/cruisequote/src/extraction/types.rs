use std::fmt;

use serde::{Deserialize, Serialize};

use crate::quotes::PricingUnit;

/// Cabin category as the extraction model labels it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CabinCategory {
    #[serde(rename = "内舱")]
    Inside,
    #[serde(rename = "海景")]
    OceanView,
    #[serde(rename = "阳台")]
    Balcony,
    #[serde(rename = "套房")]
    Suite,
}

impl CabinCategory {
    pub const ALL: [CabinCategory; 4] = [
        CabinCategory::Inside,
        CabinCategory::OceanView,
        CabinCategory::Balcony,
        CabinCategory::Suite,
    ];

    /// The label used in prompts, model replies and catalog category names.
    pub fn label(&self) -> &'static str {
        match self {
            CabinCategory::Inside => "内舱",
            CabinCategory::OceanView => "海景",
            CabinCategory::Balcony => "阳台",
            CabinCategory::Suite => "套房",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.label() == label)
    }
}

impl fmt::Display for CabinCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One validated price line from the model reply.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedQuote {
    pub cabin_type_name: String,
    pub cabin_category: Option<CabinCategory>,
    pub price: f64,
    pub currency: String,
    pub pricing_unit: PricingUnit,
    pub promotion: String,
    pub conditions: String,
    pub notes: String,
}

/// The validated model reply for one document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParseResult {
    pub sailing_code: String,
    pub ship_name: String,
    /// Empty or `YYYY-MM-DD`.
    pub departure_date: String,
    pub nights: u32,
    pub route: String,
    /// Never empty.
    pub quotes: Vec<ParsedQuote>,
}
