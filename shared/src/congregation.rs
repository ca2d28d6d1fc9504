//! Congregation data as delivered by the API, plus the derived fields the
//! maps need.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::boundary::{WHOLE_WORLD_WKT, merge_boundary_wkts};
use crate::enclosure::{EnclosureIndex, Roles};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Territory {
    #[serde(default)]
    pub id: String,
    pub number: String,
    #[serde(default)]
    pub addresses: String,
    #[serde(default)]
    pub region: String,
    /// Geographic WKT.
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loaned: Option<bool>,
    /// Months since the territory was last covered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staleness: Option<f64>,
    #[serde(default)]
    pub meta: BTreeMap<String, serde_json::Value>,
    /// Id of the region containing this territory; derived.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enclosing_region: Option<String>,
    /// Id of the minimap viewport containing this territory; derived.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enclosing_minimap_viewport: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Region {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub location: String,
    #[serde(default = "default_true")]
    pub sub_region: bool,
    #[serde(default)]
    pub card_minimap_viewport: bool,
}

impl Region {
    pub fn roles(&self) -> Roles {
        Roles {
            region: self.sub_region,
            viewport: self.card_minimap_viewport,
        }
    }
}

/// A congregation boundary fragment or a legacy minimap viewport.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Boundary {
    pub id: String,
    pub location: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Congregation {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub territories: Vec<Territory>,
    #[serde(default)]
    pub regions: Vec<Region>,
    #[serde(default)]
    pub card_minimap_viewports: Vec<Boundary>,
    #[serde(default)]
    pub congregation_boundaries: Vec<Boundary>,
    /// Merged boundary WKT; derived.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl Congregation {
    /// Parse an API response and compute the derived fields.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        let mut congregation: Congregation = serde_json::from_str(json)?;
        congregation.enrich();
        Ok(congregation)
    }

    /// Sort territories and regions, resolve every territory's enclosing
    /// region and minimap viewport, and merge the boundary fragments.
    pub fn enrich(&mut self) {
        self.territories
            .sort_by(|a, b| natural_cmp(&a.number, &b.number));
        self.regions
            .sort_by_cached_key(|r| r.name.to_lowercase());

        let index = EnclosureIndex::from_wkt(
            self.regions
                .iter()
                .map(|r| (r.id.as_str(), r.location.as_str(), r.roles()))
                .chain(
                    self.card_minimap_viewports
                        .iter()
                        .map(|v| (v.id.as_str(), v.location.as_str(), Roles::VIEWPORT)),
                ),
        );
        for territory in &mut self.territories {
            let enclosing = index.resolve_wkt(&territory.id, &territory.location);
            territory.enclosing_region = enclosing.region_id;
            territory.enclosing_minimap_viewport = enclosing.viewport_id;
        }

        let fragments = self
            .congregation_boundaries
            .iter()
            .map(|b| b.location.as_str())
            .collect::<Vec<_>>();
        self.location = Some(merge_boundary_wkts(&fragments));
        debug!(
            congregation = %self.id,
            territories = self.territories.len(),
            candidates = index.len(),
            "enriched congregation"
        );
    }

    /// The congregation area; the whole world when no boundary exists.
    pub fn location(&self) -> &str {
        self.location.as_deref().unwrap_or(WHOLE_WORLD_WKT)
    }

    pub fn territory_by_id(&self, id: &str) -> Option<&Territory> {
        self.territories.iter().find(|t| t.id == id)
    }

    pub fn region_by_id(&self, id: &str) -> Option<&Region> {
        self.regions.iter().find(|r| r.id == id)
    }

    fn viewport_location(&self, id: &str) -> Option<&str> {
        self.region_by_id(id)
            .map(|r| r.location.as_str())
            .or_else(|| {
                self.card_minimap_viewports
                    .iter()
                    .find(|v| v.id == id)
                    .map(|v| v.location.as_str())
            })
    }

    /// Area the territory's minimap shows: its enclosing viewport, else the
    /// whole congregation.
    pub fn minimap_viewport_location(&self, territory: &Territory) -> &str {
        territory
            .enclosing_minimap_viewport
            .as_deref()
            .and_then(|id| self.viewport_location(id))
            .unwrap_or_else(|| self.location())
    }

    pub fn enclosing_region_location(&self, territory: &Territory) -> Option<&str> {
        territory
            .enclosing_region
            .as_deref()
            .and_then(|id| self.region_by_id(id))
            .map(|r| r.location.as_str())
    }
}

/// Order strings so embedded numbers compare by value: "2" < "10" < "10a".
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = Chunks(a);
    let mut right = Chunks(b);
    loop {
        match (left.next(), right.next()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ord = match (is_number(x), is_number(y)) {
                    (true, true) => {
                        let x = x.trim_start_matches('0');
                        let y = y.trim_start_matches('0');
                        x.len().cmp(&y.len()).then_with(|| x.cmp(y))
                    }
                    _ => x.cmp(y),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

fn is_number(chunk: &str) -> bool {
    chunk.starts_with(|c: char| c.is_ascii_digit())
}

/// Alternating runs of digits and non-digits.
struct Chunks<'a>(&'a str);

impl<'a> Iterator for Chunks<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let first = self.0.chars().next()?;
        let digits = first.is_ascii_digit();
        let end = self
            .0
            .find(|c: char| c.is_ascii_digit() != digits)
            .unwrap_or(self.0.len());
        let (chunk, rest) = self.0.split_at(end);
        self.0 = rest;
        Some(chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const JSON: &str = r#"{
        "id": "cong1",
        "name": "Example",
        "territories": [
            {"id": "t10", "number": "10", "location": "MULTIPOLYGON(((24.5 60.5,24.6 60.5,24.6 60.6,24.5 60.5)))", "loaned": true, "staleness": 4},
            {"id": "t2", "number": "2", "location": "MULTIPOLYGON(((24.1 60.1,24.2 60.1,24.2 60.2,24.1 60.1)))"},
            {"id": "tA", "number": "A1", "location": "broken"}
        ],
        "regions": [
            {"id": "r2", "name": "south", "location": "MULTIPOLYGON(((24 60,25 60,25 61,24 61,24 60)))", "cardMinimapViewport": true},
            {"id": "r1", "name": "North", "location": "MULTIPOLYGON(((24.4 60.4,24.9 60.4,24.9 60.9,24.4 60.9,24.4 60.4)))"}
        ],
        "cardMinimapViewports": [],
        "congregationBoundaries": [
            {"id": "b1", "location": "MULTIPOLYGON(((24 60,25 60,25 61,24 61,24 60)))"}
        ]
    }"#;

    #[test]
    fn natural_order() {
        let mut numbers = vec!["10", "2", "1b", "1a", "A1", "001", "B"];
        numbers.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(numbers, ["001", "1a", "1b", "2", "10", "A1", "B"]);
    }

    #[test]
    fn enrich_sorts_and_resolves() {
        let c = Congregation::from_json(JSON).unwrap();
        let numbers = c.territories.iter().map(|t| t.number.as_str()).collect::<Vec<_>>();
        assert_eq!(numbers, ["2", "10", "A1"]);
        let regions = c.regions.iter().map(|r| r.id.as_str()).collect::<Vec<_>>();
        assert_eq!(regions, ["r1", "r2"]);

        // r1 sorts first, r2 contains everything and comes last.
        let t10 = c.territory_by_id("t10").unwrap();
        assert_eq!(t10.enclosing_region.as_deref(), Some("r2"));
        assert_eq!(t10.enclosing_minimap_viewport.as_deref(), Some("r2"));
        assert_eq!(t10.staleness, Some(4.0));

        let broken = c.territory_by_id("tA").unwrap();
        assert_eq!(broken.enclosing_region, None);
        assert_eq!(c.minimap_viewport_location(broken), c.location());
    }

    #[test]
    fn location_merges_boundaries() {
        let c = Congregation::from_json(JSON).unwrap();
        assert_eq!(c.location(), "MULTIPOLYGON(((24 60,25 60,25 61,24 61,24 60)))");
        let empty = Congregation::from_json(r#"{"id": "c"}"#).unwrap();
        assert_eq!(empty.location(), WHOLE_WORLD_WKT);
    }

    #[test]
    fn legacy_viewports_carry_only_the_viewport_role() {
        let mut c = Congregation {
            id: "c".into(),
            territories: vec![Territory {
                id: "t".into(),
                number: "1".into(),
                location: "POLYGON((1 1,2 1,2 2,1 2,1 1))".into(),
                ..Territory::default()
            }],
            card_minimap_viewports: vec![Boundary {
                id: "v".into(),
                location: "POLYGON((0 0,10 0,10 10,0 10,0 0))".into(),
            }],
            ..Congregation::default()
        };
        c.enrich();
        let t = &c.territories[0];
        assert_eq!(t.enclosing_region, None);
        assert_eq!(t.enclosing_minimap_viewport.as_deref(), Some("v"));
        assert_eq!(c.minimap_viewport_location(t), "POLYGON((0 0,10 0,10 10,0 10,0 0))");
        assert_eq!(c.enclosing_region_location(t), None);
    }

    #[test]
    fn region_flags_default() {
        let r: Region = serde_json::from_str(r#"{"id": "r", "location": "POINT(0 0)"}"#).unwrap();
        assert!(r.sub_region);
        assert!(!r.card_minimap_viewport);
        assert_eq!(r.roles(), Roles::REGION);
    }

    #[test]
    fn lookups_miss_gracefully() {
        let c = Congregation::from_json(JSON).unwrap();
        assert!(c.territory_by_id("missing").is_none());
        assert_eq!(c.region_by_id("r1").map(|r| r.name.as_str()), Some("North"));
    }
}
