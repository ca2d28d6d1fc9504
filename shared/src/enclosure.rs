use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::geometry::Geometry;
use crate::wkt::read_geometry;

/// Which kinds of enclosure a candidate polygon can provide.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roles {
    pub region: bool,
    pub viewport: bool,
}

impl Roles {
    pub const REGION: Roles = Roles {
        region: true,
        viewport: false,
    };
    pub const VIEWPORT: Roles = Roles {
        region: false,
        viewport: true,
    };
    pub const BOTH: Roles = Roles {
        region: true,
        viewport: true,
    };

    pub fn is_none(&self) -> bool {
        !self.region && !self.viewport
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub id: String,
    pub geometry: Geometry,
    pub roles: Roles,
}

/// Ids of the polygons enclosing a territory. Absent means "none", which is
/// a normal state with its own fallback at every consumer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enclosing {
    pub region_id: Option<String>,
    pub viewport_id: Option<String>,
}

/// Find the region and minimap viewport containing `territory`'s interior
/// point.
///
/// Candidates are visited in list order and the last containing candidate
/// of each role wins, regardless of area or nesting.
pub fn resolve_enclosing(territory: &Geometry, candidates: &[Candidate]) -> Enclosing {
    let mut result = Enclosing::default();
    let Some(point) = territory.interior_point() else {
        return result;
    };
    for candidate in candidates {
        if candidate.roles.is_none() || !candidate.geometry.intersects_coordinate(point.0) {
            continue;
        }
        if candidate.roles.region {
            result.region_id = Some(candidate.id.clone());
        }
        if candidate.roles.viewport {
            result.viewport_id = Some(candidate.id.clone());
        }
    }
    result
}

/// Candidates parsed once for resolving a whole congregation.
#[derive(Debug, Clone, Default)]
pub struct EnclosureIndex {
    candidates: Vec<Candidate>,
}

impl EnclosureIndex {
    /// Build from `(id, wkt, roles)`; candidates whose WKT does not parse
    /// are left out so the others still resolve.
    pub fn from_wkt<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str, Roles)>,
    {
        let candidates = entries
            .into_iter()
            .filter(|(_, _, roles)| !roles.is_none())
            .filter_map(|(id, wkt, roles)| match read_geometry(wkt) {
                Ok(geometry) => Some(Candidate {
                    id: id.to_string(),
                    geometry,
                    roles,
                }),
                Err(e) => {
                    warn!(candidate = id, error = %e, "skipping enclosure candidate");
                    None
                }
            })
            .collect();
        Self { candidates }
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn resolve(&self, territory: &Geometry) -> Enclosing {
        resolve_enclosing(territory, &self.candidates)
    }

    /// Resolve a territory given as WKT; malformed territories enclose nothing.
    pub fn resolve_wkt(&self, territory_id: &str, wkt: &str) -> Enclosing {
        match read_geometry(wkt) {
            Ok(geometry) => {
                let enclosing = self.resolve(&geometry);
                debug!(territory = territory_id, ?enclosing, "resolved enclosure");
                enclosing
            }
            Err(e) => {
                warn!(territory = territory_id, error = %e, "cannot resolve enclosure");
                Enclosing::default()
            }
        }
    }
}
