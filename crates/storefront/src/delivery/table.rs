//! Region/town delivery fee table.

use std::collections::BTreeMap;
use std::path::Path;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tradepost_core::TableFee;

use super::DeliveryError;

/// Fee entry for a single town.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TownFee {
    pub town: String,
    pub delivery_fee: TableFee,
}

/// A region and its towns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub name: String,
    pub towns: Vec<TownFee>,
}

/// A search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TownMatch {
    pub region: String,
    pub town: String,
    pub fee: TableFee,
}

/// Lookup table of `{region -> [{town, delivery_fee}]}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryTable {
    regions: Vec<Region>,
}

/// Fee in the builtin table.
#[derive(Clone, Copy)]
enum Fee {
    Free,
    Cedis(i64),
}

const BUILTIN: &[(&str, &[(&str, Fee)])] = &[
    (
        "Greater Accra",
        &[
            ("Accra", Fee::Free),
            ("Tema", Fee::Cedis(20)),
            ("Madina", Fee::Cedis(15)),
            ("Kasoa", Fee::Cedis(25)),
            ("Dodowa", Fee::Cedis(30)),
        ],
    ),
    (
        "Ashanti",
        &[
            ("Kumasi", Fee::Cedis(40)),
            ("Obuasi", Fee::Cedis(50)),
            ("Ejisu", Fee::Cedis(45)),
        ],
    ),
    (
        "Central",
        &[
            ("Cape Coast", Fee::Cedis(40)),
            ("Winneba", Fee::Cedis(35)),
            ("Mankessim", Fee::Cedis(40)),
        ],
    ),
    (
        "Eastern",
        &[
            ("Koforidua", Fee::Cedis(35)),
            ("Nkawkaw", Fee::Cedis(45)),
            ("Aburi", Fee::Cedis(30)),
        ],
    ),
    (
        "Western",
        &[("Takoradi", Fee::Cedis(50)), ("Tarkwa", Fee::Cedis(55))],
    ),
    ("Western North", &[("Sefwi Wiawso", Fee::Cedis(70))]),
    (
        "Volta",
        &[("Ho", Fee::Cedis(45)), ("Hohoe", Fee::Cedis(55)), ("Keta", Fee::Cedis(50))],
    ),
    ("Oti", &[("Dambai", Fee::Cedis(75))]),
    (
        "Bono",
        &[("Sunyani", Fee::Cedis(55)), ("Berekum", Fee::Cedis(60))],
    ),
    ("Bono East", &[("Techiman", Fee::Cedis(55))]),
    ("Ahafo", &[("Goaso", Fee::Cedis(65))]),
    ("Northern", &[("Tamale", Fee::Cedis(70)), ("Yendi", Fee::Cedis(80))]),
    ("Savannah", &[("Damongo", Fee::Cedis(85))]),
    ("North East", &[("Nalerigu", Fee::Cedis(90))]),
    ("Upper East", &[("Bolgatanga", Fee::Cedis(85)), ("Navrongo", Fee::Cedis(90))]),
    ("Upper West", &[("Wa", Fee::Cedis(90))]),
];

impl DeliveryTable {
    /// The table shipped with the storefront.
    #[must_use]
    pub fn builtin() -> Self {
        let regions = BUILTIN
            .iter()
            .map(|(region, towns)| Region {
                name: (*region).to_string(),
                towns: towns
                    .iter()
                    .map(|(town, fee)| TownFee {
                        town: (*town).to_string(),
                        delivery_fee: match fee {
                            Fee::Free => TableFee::Free,
                            Fee::Cedis(amount) => TableFee::Amount(Decimal::from(*amount)),
                        },
                    })
                    .collect(),
            })
            .collect();

        Self { regions }
    }

    /// Parse a table from JSON of the shape `{"Region": [{"town", "delivery_fee"}]}`.
    ///
    /// Regions are ordered by name.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::InvalidTable` if the JSON does not match.
    pub fn from_json(json: &str) -> Result<Self, DeliveryError> {
        let parsed: BTreeMap<String, Vec<TownFee>> =
            serde_json::from_str(json).map_err(|e| DeliveryError::InvalidTable(e.to_string()))?;

        Ok(Self {
            regions: parsed
                .into_iter()
                .map(|(name, towns)| Region { name, towns })
                .collect(),
        })
    }

    /// Load a JSON table from disk.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::InvalidTable` if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, DeliveryError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| DeliveryError::InvalidTable(format!("{}: {e}", path.display())))?;
        Self::from_json(&json)
    }

    #[must_use]
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Find a region by name, ignoring ASCII case.
    #[must_use]
    pub fn region(&self, name: &str) -> Option<&Region> {
        self.regions
            .iter()
            .find(|r| r.name.eq_ignore_ascii_case(name.trim()))
    }

    /// Find a town within a region, ignoring ASCII case.
    #[must_use]
    pub fn town(&self, region: &str, town: &str) -> Option<(&Region, &TownFee)> {
        let region = self.region(region)?;
        let entry = region
            .towns
            .iter()
            .find(|t| t.town.eq_ignore_ascii_case(town.trim()))?;
        Some((region, entry))
    }

    /// Towns whose own name or parent region contains `query`, case-insensitively.
    ///
    /// A blank query matches nothing.
    #[must_use]
    pub fn search(&self, query: &str) -> Vec<TownMatch> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }

        self.regions
            .iter()
            .flat_map(|region| {
                let region_matches = region.name.to_lowercase().contains(&needle);
                let needle = needle.clone();
                region
                    .towns
                    .iter()
                    .filter(move |t| region_matches || t.town.to_lowercase().contains(&needle))
                    .map(move |t| TownMatch {
                        region: region.name.clone(),
                        town: t.town.clone(),
                        fee: t.delivery_fee,
                    })
            })
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_accra_is_free() {
        let table = DeliveryTable::builtin();
        let (_, accra) = table.town("greater accra", "ACCRA").unwrap();
        assert_eq!(accra.delivery_fee, TableFee::Free);
    }

    #[test]
    fn test_search_by_town() {
        let table = DeliveryTable::builtin();
        let hits = table.search("kuma");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].town, "Kumasi");
        assert_eq!(hits[0].region, "Ashanti");
    }

    #[test]
    fn test_search_by_region_returns_all_towns() {
        let table = DeliveryTable::builtin();
        let hits = table.search("upper");
        let towns: Vec<_> = hits.iter().map(|h| h.town.as_str()).collect();
        assert_eq!(towns, vec!["Bolgatanga", "Navrongo", "Wa"]);
    }

    #[test]
    fn test_blank_search_matches_nothing() {
        assert!(DeliveryTable::builtin().search("   ").is_empty());
    }

    #[test]
    fn test_from_json_coerces_numeric_strings() {
        let table = DeliveryTable::from_json(
            r#"{"Volta": [{"town": "Ho", "delivery_fee": "45"}, {"town": "Aflao", "delivery_fee": "Free delivery"}]}"#,
        )
        .unwrap();

        let (_, ho) = table.town("Volta", "Ho").unwrap();
        assert_eq!(ho.delivery_fee, TableFee::Amount(Decimal::from(45)));
        let (_, aflao) = table.town("Volta", "Aflao").unwrap();
        assert_eq!(aflao.delivery_fee, TableFee::Free);
    }

    #[test]
    fn test_from_json_rejects_bad_fee() {
        let err = DeliveryTable::from_json(r#"{"Volta": [{"town": "Ho", "delivery_fee": "soon"}]}"#)
            .unwrap_err();
        assert!(matches!(err, DeliveryError::InvalidTable(_)));
    }
}
