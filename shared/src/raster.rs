//! Background tile layers the user can choose between.

use serde::{Deserialize, Serialize};

use crate::tile_grid::{TileCoord, TileGrid};

const OSM_ATTRIBUTION: &str = "&#169; <a href=\"https://www.openstreetmap.org/copyright\" target=\"_blank\">OpenStreetMap</a> contributors.";

/// How tile images are fetched for a raster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RasterSource {
    /// `{z}/{x}/{y}` URL template, optionally with an `{a-c}` style
    /// subdomain range.
    Xyz {
        url: String,
        tile_size: u32,
        /// Image pixels per CSS pixel of the tile grid.
        tile_pixel_ratio: f64,
    },
    /// The public OpenStreetMap tile servers.
    Osm,
    /// Tiled WMS GetMap requests in EPSG:3857.
    TileWms {
        url: String,
        layers: String,
        tiled: bool,
    },
}

const OSM_URL: &str = "https://{a-c}.tile.openstreetmap.org/{z}/{x}/{y}.png";
const WMS_TILE_SIZE: u32 = 256;
const MAX_ZOOM: u8 = 19;

impl RasterSource {
    pub fn tile_grid(&self) -> TileGrid {
        match self {
            RasterSource::Xyz { tile_size, .. } => TileGrid::new(*tile_size, MAX_ZOOM),
            RasterSource::Osm => TileGrid::new(256, MAX_ZOOM),
            RasterSource::TileWms { .. } => TileGrid::new(WMS_TILE_SIZE, MAX_ZOOM),
        }
    }

    pub fn tile_url(&self, tile: TileCoord) -> String {
        match self {
            RasterSource::Xyz { url, .. } => expand_template(url, tile),
            RasterSource::Osm => expand_template(OSM_URL, tile),
            RasterSource::TileWms { url, layers, tiled } => {
                let extent = self.tile_grid().tile_extent(tile);
                let separator = if url.contains('?') { '&' } else { '?' };
                format!(
                    "{url}{separator}SERVICE=WMS&VERSION=1.3.0&REQUEST=GetMap&FORMAT=image%2Fpng\
                     &TRANSPARENT=true&LAYERS={layers}&TILED={tiled}&WIDTH={size}&HEIGHT={size}\
                     &CRS=EPSG%3A3857&STYLES=&BBOX={},{},{},{}",
                    extent.min_x,
                    extent.min_y,
                    extent.max_x,
                    extent.max_y,
                    layers = layers.replace(':', "%3A"),
                    size = WMS_TILE_SIZE,
                )
            }
        }
    }
}

/// Fill a `{z}/{x}/{y}` template. An `{a-c}` range picks a subdomain
/// deterministically so a tile always comes from the same host.
pub fn expand_template(template: &str, tile: TileCoord) -> String {
    let mut url = template
        .replace("{z}", &tile.z.to_string())
        .replace("{x}", &tile.x.to_string())
        .replace("{y}", &tile.y.to_string());
    if let Some((start, end, hosts)) = subdomain_range(&url) {
        let index = ((u64::from(tile.x) << tile.z) + u64::from(tile.y)) % hosts.len() as u64;
        url.replace_range(start..end, &hosts[index as usize].to_string());
    }
    url
}

/// Byte range of a `{a-c}` placeholder and the characters it expands to.
fn subdomain_range(url: &str) -> Option<(usize, usize, Vec<char>)> {
    let start = url.find('{')?;
    let end = start + url[start..].find('}')? + 1;
    let inner = url[start + 1..end - 1].as_bytes();
    if inner.len() != 3 || inner[1] != b'-' || inner[0] > inner[2] {
        return None;
    }
    let hosts = (inner[0]..=inner[2]).map(char::from).collect();
    Some((start, end, hosts))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapRaster {
    pub id: String,
    pub name: String,
    pub source: RasterSource,
    /// HTML shown in the map's attribution line.
    pub attribution: String,
}

/// The selectable rasters in display order; the first is the default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterRegistry {
    rasters: Vec<MapRaster>,
}

impl Default for RasterRegistry {
    fn default() -> Self {
        Self::new(vec![
            MapRaster {
                id: "osmhd".into(),
                name: "World - OpenStreetMap".into(),
                source: RasterSource::Xyz {
                    url: "https://{a-c}.osm.rrze.fau.de/osmhd/{z}/{x}/{y}.png".into(),
                    tile_size: 256,
                    tile_pixel_ratio: 2.0,
                },
                attribution: OSM_ATTRIBUTION.into(),
            },
            MapRaster {
                id: "osm".into(),
                name: "World - OpenStreetMap (backup server, low DPI)".into(),
                source: RasterSource::Osm,
                attribution: OSM_ATTRIBUTION.into(),
            },
            MapRaster {
                id: "mmlTaustakartta".into(),
                name: "Finland - Maanmittauslaitoksen taustakarttasarja".into(),
                source: RasterSource::Xyz {
                    url: "https://tiles.kartat.kapsi.fi/taustakartta/{z}/{x}/{y}.jpg".into(),
                    tile_size: 128,
                    tile_pixel_ratio: 2.0,
                },
                attribution: "&copy; Maanmittauslaitos".into(),
            },
            MapRaster {
                id: "vantaaKaupunkikartta".into(),
                name: "Finland - Vantaan kaupunkikartta".into(),
                source: RasterSource::TileWms {
                    url: "https://gis.vantaa.fi/geoserver/wms".into(),
                    layers: "taustakartta:kaupunkikartta".into(),
                    tiled: true,
                },
                attribution: "&copy; Vantaan kaupunki".into(),
            },
        ])
    }
}

impl RasterRegistry {
    pub fn new(rasters: Vec<MapRaster>) -> Self {
        Self { rasters }
    }

    /// Add a raster, replacing one with the same id.
    pub fn with(mut self, raster: MapRaster) -> Self {
        match self.rasters.iter_mut().find(|r| r.id == raster.id) {
            Some(existing) => *existing = raster,
            None => self.rasters.push(raster),
        }
        self
    }

    pub fn all(&self) -> &[MapRaster] {
        &self.rasters
    }

    pub fn find(&self, id: &str) -> Option<&MapRaster> {
        self.rasters.iter().find(|r| r.id == id)
    }

    /// The raster with `id`, else the default one. `None` only for an empty
    /// registry.
    pub fn find_or_default(&self, id: Option<&str>) -> Option<&MapRaster> {
        id.and_then(|id| self.find(id)).or_else(|| self.rasters.first())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TILE: TileCoord = TileCoord { z: 3, x: 5, y: 2 };

    #[test]
    fn registry_order_and_lookup() {
        let registry = RasterRegistry::default();
        let ids = registry.all().iter().map(|r| r.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, ["osmhd", "osm", "mmlTaustakartta", "vantaaKaupunkikartta"]);
        assert_eq!(registry.find("osm").map(|r| r.name.as_str()), Some("World - OpenStreetMap (backup server, low DPI)"));
        assert_eq!(registry.find("nope"), None);
        assert_eq!(registry.find_or_default(Some("nope")).map(|r| r.id.as_str()), Some("osmhd"));
        assert_eq!(registry.find_or_default(None).map(|r| r.id.as_str()), Some("osmhd"));
        assert_eq!(RasterRegistry::new(vec![]).find_or_default(None), None);
    }

    #[test]
    fn registry_is_extensible() {
        let custom = MapRaster {
            id: "local".into(),
            name: "Local".into(),
            source: RasterSource::Xyz {
                url: "http://localhost/{z}/{x}/{y}.png".into(),
                tile_size: 256,
                tile_pixel_ratio: 1.0,
            },
            attribution: String::new(),
        };
        let registry = RasterRegistry::default().with(custom.clone());
        assert_eq!(registry.all().len(), 5);
        assert_eq!(registry.find("local"), Some(&custom));
    }

    #[test]
    fn xyz_template_with_subdomains() {
        // (5 << 3) + 2 = 42, 42 % 3 = 0
        assert_eq!(
            expand_template("https://{a-c}.osm.rrze.fau.de/osmhd/{z}/{x}/{y}.png", TILE),
            "https://a.osm.rrze.fau.de/osmhd/3/5/2.png"
        );
        let next = TileCoord { y: 3, ..TILE };
        assert_eq!(
            expand_template("https://{a-c}.example/{z}/{x}/{y}", next),
            "https://b.example/3/5/3"
        );
        assert_eq!(
            expand_template("https://tiles.kartat.kapsi.fi/taustakartta/{z}/{x}/{y}.jpg", TILE),
            "https://tiles.kartat.kapsi.fi/taustakartta/3/5/2.jpg"
        );
    }

    #[test]
    fn wms_request_carries_tile_bbox() {
        let registry = RasterRegistry::default();
        let wms = &registry.find("vantaaKaupunkikartta").unwrap().source;
        let url = wms.tile_url(TileCoord { z: 0, x: 0, y: 0 });
        assert!(url.starts_with("https://gis.vantaa.fi/geoserver/wms?SERVICE=WMS&"));
        assert!(url.contains("LAYERS=taustakartta%3Akaupunkikartta"));
        assert!(url.contains("TILED=true"));
        assert!(url.contains("WIDTH=256&HEIGHT=256"));
        assert!(url.ends_with("BBOX=-20037508.342789244,-20037508.342789244,20037508.342789244,20037508.342789244"));
    }

    #[test]
    fn grids_follow_tile_size() {
        let registry = RasterRegistry::default();
        let mml = &registry.find("mmlTaustakartta").unwrap().source;
        assert_eq!(mml.tile_grid().tile_size, 128);
    }
}
