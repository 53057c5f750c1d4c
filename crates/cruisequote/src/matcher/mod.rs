//! Binds parsed sailing and cabin descriptors to catalog ids.
//!
//! Exact lookups are tried first; fuzzy matches go through
//! [`similarity::similarity`] over [`similarity::normalize`]d names and are
//! accepted only above fixed thresholds.

pub mod similarity;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;

use crate::catalog::{
    CabinType, CatalogReader, Page, Sailing, Ship, ShipFilter, SHIP_STATUS_ACTIVE,
};
use crate::db::DatabaseError;
use crate::extraction::CabinCategory;

use similarity::{normalize, similarity};

/// Minimum similarity for a fuzzy ship match.
pub const SHIP_ACCEPT: f64 = 0.7;
/// Minimum score (after category bonus) for a fuzzy cabin-type match.
pub const CABIN_ACCEPT: f64 = 0.6;
/// Added to a cabin-type score when the requested category matches.
pub const CATEGORY_BONUS: f64 = 0.2;
/// A sailing departs "on" the requested date if within this many days.
pub const DATE_TOLERANCE_DAYS: i64 = 1;
/// Ships considered by the fuzzy ship search.
pub const SHIP_PAGE_SIZE: u32 = 100;

const CODE_MISMATCH_PENALTY: f64 = 0.3;
const CODE_DIFFERS_PENALTY: f64 = 0.2;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MatchResult {
    pub sailing: Option<Sailing>,
    pub confidence: f64,
    pub issues: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CabinMatch {
    pub cabin_type_id: i64,
    pub score: f64,
}

/// A requested cabin-type name with the best score any candidate reached.
#[derive(Debug, Clone, PartialEq)]
pub struct UnmatchedCabin {
    pub name: String,
    pub best_score: f64,
}

#[derive(Debug, Clone, Default)]
pub struct CabinTypeMatches {
    pub matched: HashMap<String, CabinMatch>,
    pub unmatched: Vec<UnmatchedCabin>,
}

pub struct CatalogMatcher {
    catalog: Arc<dyn CatalogReader>,
}

impl CatalogMatcher {
    pub fn new(catalog: Arc<dyn CatalogReader>) -> Self {
        Self { catalog }
    }

    /// Resolves a sailing from its code, falling back to the ship's
    /// sailings around `departure`.
    pub fn match_sailing(
        &self,
        code: &str,
        ship_name: &str,
        departure: NaiveDate,
        nights: u32,
    ) -> Result<MatchResult, DatabaseError> {
        let mut result = MatchResult {
            confidence: 1.0,
            ..Default::default()
        };

        if let Some(sailing) = self.catalog.get_sailing_by_code(code)? {
            if departs_on(&sailing, departure, nights) {
                result.sailing = Some(sailing);
                return Ok(result);
            }
            result.issues.push(format!(
                "sailing code {} found but departs {} for {} nights (requested {} for {} nights)",
                code, sailing.departure_date, sailing.nights, departure, nights
            ));
            result.confidence -= CODE_MISMATCH_PENALTY;
        }

        let Some((ship, _)) = self.match_ship(ship_name)? else {
            result.issues.push(format!("unknown ship: {}", ship_name));
            result.confidence = 0.0;
            return Ok(result);
        };

        let candidate = self
            .catalog
            .list_sailings_by_ship(ship.id)?
            .into_iter()
            .find(|s| departs_on(s, departure, nights));

        match candidate {
            Some(sailing) => {
                if sailing.sailing_code != code {
                    result.issues.push(format!(
                        "sailing code differs: requested {}, matched {}",
                        code, sailing.sailing_code
                    ));
                    result.confidence -= CODE_DIFFERS_PENALTY;
                }
                result.confidence = result.confidence.clamp(0.0, 1.0);
                result.sailing = Some(sailing);
            }
            None => {
                result.issues.push(format!(
                    "no sailing of {} departs within {} day of {} for {} nights",
                    ship.name, DATE_TOLERANCE_DAYS, departure, nights
                ));
                result.confidence = 0.0;
            }
        }

        Ok(result)
    }

    /// Finds an active ship by name: case-insensitive exact match first,
    /// then the most similar name scoring at least [`SHIP_ACCEPT`].
    pub fn match_ship(&self, name: &str) -> Result<Option<(Ship, f64)>, DatabaseError> {
        let filter = ShipFilter {
            cruise_line_id: None,
            status: Some(SHIP_STATUS_ACTIVE.to_string()),
        };
        let ships = self.catalog.list_ships(Page::first(SHIP_PAGE_SIZE), &filter)?;

        let wanted = name.trim().to_lowercase();
        if let Some(ship) = ships.iter().find(|s| s.name.trim().to_lowercase() == wanted) {
            return Ok(Some((ship.clone(), 1.0)));
        }

        let query = normalize(name);
        let best = best_by_score(ships, |s| similarity(&normalize(&s.name), &query));

        Ok(best.filter(|(_, score)| *score >= SHIP_ACCEPT))
    }

    /// Resolves each requested cabin-type name against the ship's enabled
    /// cabin types. `categories` gives the requested category per name.
    pub fn match_cabin_types(
        &self,
        ship_id: i64,
        names: &[String],
        categories: &HashMap<String, CabinCategory>,
    ) -> Result<CabinTypeMatches, DatabaseError> {
        let candidates = self.catalog.list_cabin_types_by_ship(ship_id)?;
        let mut matches = CabinTypeMatches::default();

        for name in names {
            if matches.matched.contains_key(name) {
                continue;
            }
            match score_cabin(&candidates, name, categories.get(name).copied()) {
                Some((cabin, score)) if score >= CABIN_ACCEPT => {
                    matches.matched.insert(
                        name.clone(),
                        CabinMatch {
                            cabin_type_id: cabin.id,
                            score,
                        },
                    );
                }
                best => matches.unmatched.push(UnmatchedCabin {
                    name: name.clone(),
                    best_score: best.map(|(_, score)| score).unwrap_or(0.0),
                }),
            }
        }

        Ok(matches)
    }
}

fn departs_on(sailing: &Sailing, departure: NaiveDate, nights: u32) -> bool {
    sailing.nights == nights
        && (sailing.departure_date - departure).num_days().abs() <= DATE_TOLERANCE_DAYS
}

fn score_cabin(
    candidates: &[CabinType],
    name: &str,
    category: Option<CabinCategory>,
) -> Option<(CabinType, f64)> {
    let wanted = name.trim().to_lowercase();
    if let Some(cabin) = candidates.iter().find(|c| c.name.trim().to_lowercase() == wanted) {
        return Some((cabin.clone(), 1.0));
    }

    let query = normalize(name);
    best_by_score(candidates.iter().cloned(), |c| {
        let score = similarity(&normalize(&c.name), &query);
        let same_category = matches!(
            (category, c.category.as_deref()),
            (Some(requested), Some(actual)) if requested.label() == actual
        );
        if same_category {
            (score + CATEGORY_BONUS).min(1.0)
        } else {
            score
        }
    })
}

/// Highest-scoring item; the earliest wins ties.
fn best_by_score<T>(
    items: impl IntoIterator<Item = T>,
    score: impl Fn(&T) -> f64,
) -> Option<(T, f64)> {
    let mut best: Option<(T, f64)> = None;
    for item in items {
        let s = score(&item);
        if best.as_ref().map_or(true, |(_, b)| s > *b) {
            best = Some((item, s));
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SqliteCatalog;
    use crate::db::{catalog_repo, Database};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    struct Fixture {
        matcher: CatalogMatcher,
        ship: i64,
        sailing: i64,
        balcony: i64,
        suite: i64,
    }

    fn fixture() -> Fixture {
        let db = Database::open_in_memory().unwrap();
        let ship = catalog_repo::insert_ship(&db, None, "Quantum of the Seas", "active").unwrap();
        catalog_repo::insert_ship(&db, None, "Spectrum of the Seas", "active").unwrap();
        catalog_repo::insert_ship(&db, None, "Ovation of the Seas", "retired").unwrap();
        let sailing =
            catalog_repo::insert_sailing(&db, ship, "QN20260515", date(2026, 5, 15), 5, "Tokyo–Osaka")
                .unwrap();
        catalog_repo::insert_sailing(&db, ship, "QN20260601", date(2026, 6, 1), 7, "").unwrap();

        let balcony_cat = catalog_repo::ensure_cabin_category(&db, "阳台").unwrap();
        let suite_cat = catalog_repo::ensure_cabin_category(&db, "套房").unwrap();
        let balcony =
            catalog_repo::insert_cabin_type(&db, ship, Some(balcony_cat), "Balcony", true).unwrap();
        let suite =
            catalog_repo::insert_cabin_type(&db, ship, Some(suite_cat), "Grand Suite", true).unwrap();
        catalog_repo::insert_cabin_type(&db, ship, Some(suite_cat), "Royal Loft Suite", false)
            .unwrap();

        Fixture {
            matcher: CatalogMatcher::new(Arc::new(SqliteCatalog::new(db))),
            ship,
            sailing,
            balcony,
            suite,
        }
    }

    #[test]
    fn test_exact_code_within_tolerance() {
        let fx = fixture();
        for day in [14, 15, 16] {
            let result = fx
                .matcher
                .match_sailing("QN20260515", "whatever", date(2026, 5, day), 5)
                .unwrap();
            assert_eq!(result.sailing.unwrap().id, fx.sailing);
            assert_eq!(result.confidence, 1.0);
            assert!(result.issues.is_empty());
        }
    }

    #[test]
    fn test_code_found_but_nights_differ_falls_through() {
        let fx = fixture();
        let result = fx
            .matcher
            .match_sailing("QN20260515", "Quantum of the Seas", date(2026, 5, 15), 6)
            .unwrap();
        assert!(result.sailing.is_none());
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.issues.len(), 2);
    }

    #[test]
    fn test_date_outside_tolerance_rejected() {
        let fx = fixture();
        let result = fx
            .matcher
            .match_sailing("QN20260515", "Quantum of the Seas", date(2026, 5, 17), 5)
            .unwrap();
        assert!(result.sailing.is_none());
    }

    #[test]
    fn test_ship_fallback_with_different_code() {
        let fx = fixture();
        let result = fx
            .matcher
            .match_sailing("QOTS-0515", "quantum of the  seas", date(2026, 5, 16), 5)
            .unwrap();
        assert_eq!(result.sailing.unwrap().id, fx.sailing);
        assert!((result.confidence - 0.8).abs() < 1e-9);
        assert_eq!(result.issues.len(), 1);
    }

    #[test]
    fn test_unknown_ship() {
        let fx = fixture();
        let result = fx
            .matcher
            .match_sailing("NOPE20990101", "Unknown", date(2099, 1, 1), 5)
            .unwrap();
        assert!(result.sailing.is_none());
        assert_eq!(result.confidence, 0.0);
        assert!(result.issues[0].contains("unknown ship"));
    }

    #[test]
    fn test_match_ship_exact_fuzzy_and_status() {
        let fx = fixture();
        let (ship, score) = fx.matcher.match_ship("QUANTUM OF THE SEAS").unwrap().unwrap();
        assert_eq!(ship.id, fx.ship);
        assert_eq!(score, 1.0);

        let (ship, score) = fx.matcher.match_ship("Quantum of Seas").unwrap().unwrap();
        assert_eq!(ship.id, fx.ship);
        assert!(score >= SHIP_ACCEPT);

        // retired ships are not candidates
        assert!(fx.matcher.match_ship("Ovation of the Seas").unwrap().is_none());
        assert!(fx.matcher.match_ship("Zephyr").unwrap().is_none());
    }

    #[test]
    fn test_match_cabin_types() {
        let fx = fixture();
        let names = vec![
            "balcony".to_string(),
            "Grand Suit".to_string(),
            "Zephyr Ultra Suite".to_string(),
            "Royal Loft Suite".to_string(),
        ];
        let mut categories = HashMap::new();
        categories.insert("Zephyr Ultra Suite".to_string(), CabinCategory::Suite);

        let matches = fx.matcher.match_cabin_types(fx.ship, &names, &categories).unwrap();

        assert_eq!(matches.matched["balcony"].cabin_type_id, fx.balcony);
        assert_eq!(matches.matched["balcony"].score, 1.0);
        assert_eq!(matches.matched["Grand Suit"].cabin_type_id, fx.suite);
        assert_eq!(matches.unmatched.len(), 2);
        let zephyr = &matches.unmatched[0];
        assert_eq!(zephyr.name, "Zephyr Ultra Suite");
        assert!(zephyr.best_score < CABIN_ACCEPT);
    }

    #[test]
    fn test_category_bonus_is_capped() {
        let candidates = vec![CabinType {
            id: 1,
            ship_id: 1,
            name: "Grand Suite".to_string(),
            category: Some("套房".to_string()),
        }];
        let (_, with_bonus) =
            score_cabin(&candidates, "Grand Suites", Some(CabinCategory::Suite)).unwrap();
        let (_, without) =
            score_cabin(&candidates, "Grand Suites", Some(CabinCategory::Inside)).unwrap();
        assert!((with_bonus - (without + CATEGORY_BONUS).min(1.0)).abs() < 1e-9);
        assert!(with_bonus <= 1.0);
    }
}
