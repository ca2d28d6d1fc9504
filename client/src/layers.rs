//! Vector layers of each map kind, built from WKT once per mount.

use territorybro_shared::style::{Fill, LayerStyle, Stroke};
use territorybro_shared::{
    Congregation, Extent, Geometry, MapConfig, MapKind, SpatialGrid, Territory, read_geometries,
};

/// Labels on the neighborhood map are larger than the card default.
const NEIGHBORHOOD_LABEL_FONT: &str = "bold 180% sans-serif";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerRole {
    Region,
    Congregation,
    Territory,
    /// Fit target of the minimap; never drawn.
    Viewport,
    Marker,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub id: Option<String>,
    pub geometry: Geometry,
    pub label: Option<String>,
    /// Per-feature overrides of the layer style.
    pub stroke: Option<Stroke>,
    pub fill: Option<Fill>,
}

impl Feature {
    fn new(geometry: Geometry) -> Self {
        Self {
            id: None,
            geometry,
            label: None,
            stroke: None,
            fill: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorLayer {
    pub role: LayerRole,
    pub style: LayerStyle,
    pub features: Vec<Feature>,
}

impl VectorLayer {
    pub fn new(role: LayerRole, style: LayerStyle) -> Self {
        Self {
            role,
            style,
            features: Vec::new(),
        }
    }

    /// A layer with one feature per geometry of `wkt`; empty when the WKT is
    /// missing or does not parse.
    pub fn from_wkt(role: LayerRole, style: LayerStyle, wkt: Option<&str>) -> Self {
        let mut layer = Self::new(role, style);
        layer.features = read_geometries(wkt).into_iter().map(Feature::new).collect();
        layer
    }

    fn with_label(mut self, label: Option<&str>) -> Self {
        for feature in &mut self.features {
            feature.label = label.map(str::to_string);
        }
        self
    }

    pub fn is_visible(&self) -> bool {
        self.role != LayerRole::Viewport
    }

    pub fn extent(&self) -> Extent {
        let mut extent = Extent::EMPTY;
        for feature in &self.features {
            extent.extend(&feature.geometry.extent());
        }
        extent
    }
}

/// Layers of one surface in draw order, bottom first.
#[derive(Debug, Clone, PartialEq)]
pub struct MapLayers {
    pub kind: MapKind,
    pub layers: Vec<VectorLayer>,
}

impl MapLayers {
    /// A single territory, fitted closely.
    pub fn territory(config: &MapConfig, location: Option<&str>) -> Self {
        Self {
            kind: MapKind::Territory,
            layers: vec![territory_outline(config, location)],
        }
    }

    /// A territory with its number as a large label.
    pub fn neighborhood(config: &MapConfig, number: Option<&str>, location: Option<&str>) -> Self {
        let mut style = config.styles.territory.clone();
        if let Some(text) = style.text.as_mut() {
            text.font = NEIGHBORHOOD_LABEL_FONT.to_string();
        }
        let layer = VectorLayer::from_wkt(LayerRole::Territory, style, location).with_label(number);
        Self {
            kind: MapKind::Neighborhood,
            layers: vec![layer],
        }
    }

    /// A region outline with its territories labeled by number.
    pub fn region(config: &MapConfig, location: Option<&str>, territories: &[Territory]) -> Self {
        let region = VectorLayer::from_wkt(LayerRole::Region, config.styles.region.clone(), location);
        let style = LayerStyle {
            fill: None,
            ..config.styles.territory.clone()
        };
        let mut layer = VectorLayer::new(LayerRole::Territory, style);
        for territory in territories {
            for geometry in read_geometries(Some(territory.location.as_str())) {
                layer.features.push(Feature {
                    label: Some(territory.number.clone()),
                    ..Feature::new(geometry)
                });
            }
        }
        Self {
            kind: MapKind::Region,
            layers: vec![region, layer],
        }
    }

    /// The congregation outline with every territory styled by loan status.
    pub fn territory_list(
        config: &MapConfig,
        congregation: &Congregation,
        territories: &[Territory],
    ) -> Self {
        let outline = VectorLayer::from_wkt(
            LayerRole::Congregation,
            config.styles.congregation.clone(),
            Some(congregation.location()),
        );
        let mut layers = Self {
            kind: MapKind::TerritoryList,
            layers: vec![
                outline,
                VectorLayer::new(LayerRole::Territory, config.styles.territory.clone()),
            ],
        };
        layers.set_territories(config, territories);
        layers
    }

    /// Where a territory lies within its surroundings: enclosing region
    /// shaded, congregation outlined, the territory as a dot.
    pub fn minimap(config: &MapConfig, congregation: &Congregation, territory: &Territory) -> Self {
        let styles = &config.styles;
        let region = VectorLayer::from_wkt(
            LayerRole::Region,
            styles.minimap_region.clone(),
            congregation.enclosing_region_location(territory),
        );
        let outline = VectorLayer::from_wkt(
            LayerRole::Congregation,
            styles.minimap_congregation.clone(),
            Some(congregation.location()),
        );
        let mut marker = VectorLayer::new(LayerRole::Marker, styles.minimap_territory.clone());
        marker.features = read_geometries(Some(territory.location.as_str()))
            .iter()
            .filter_map(Geometry::interior_point)
            .map(|p| Feature::new(Geometry::Point(p)))
            .collect();
        let viewport = VectorLayer::from_wkt(
            LayerRole::Viewport,
            LayerStyle::default(),
            Some(congregation.minimap_viewport_location(territory)),
        );
        Self {
            kind: MapKind::MiniMap,
            layers: vec![region, outline, marker, viewport],
        }
    }

    pub fn layer(&self, role: LayerRole) -> Option<&VectorLayer> {
        self.layers.iter().find(|l| l.role == role)
    }

    fn layer_mut(&mut self, role: LayerRole) -> Option<&mut VectorLayer> {
        self.layers.iter_mut().find(|l| l.role == role)
    }

    /// Replace the territories of the list map.
    pub fn set_territories(&mut self, config: &MapConfig, territories: &[Territory]) {
        let styles = &config.styles;
        let Some(layer) = self.layer_mut(LayerRole::Territory) else {
            return;
        };
        layer.features = territories
            .iter()
            .flat_map(|territory| {
                read_geometries(Some(territory.location.as_str()))
                    .into_iter()
                    .map(move |geometry| Feature {
                        id: Some(territory.id.clone()),
                        geometry,
                        label: Some(territory.number.clone()),
                        stroke: Some(styles.loanable_stroke(territory.loaned)),
                        fill: Some(styles.loanable_fill(territory.loaned, territory.staleness)),
                    })
            })
            .collect();
    }

    /// Candidate extents for a fit, tried in order until one is non-empty.
    pub fn fit_extents(&self) -> Vec<Extent> {
        fit_chain(self.kind)
            .iter()
            .filter_map(|role| self.layer(*role))
            .map(VectorLayer::extent)
            .collect()
    }

    /// Hit-test index over the identified territory features.
    pub fn pick_grid(&self) -> SpatialGrid {
        let Some(layer) = self.layer(LayerRole::Territory) else {
            return SpatialGrid::default();
        };
        SpatialGrid::build(
            layer
                .features
                .iter()
                .filter_map(|f| Some((f.id.clone()?, f.geometry.clone()))),
        )
    }
}

fn territory_outline(config: &MapConfig, location: Option<&str>) -> VectorLayer {
    let style = LayerStyle {
        text: None,
        ..config.styles.territory.clone()
    };
    VectorLayer::from_wkt(LayerRole::Territory, style, location)
}

/// Which layers a map kind fits to, in fallback order.
pub fn fit_chain(kind: MapKind) -> &'static [LayerRole] {
    match kind {
        MapKind::Territory | MapKind::Neighborhood => &[LayerRole::Territory],
        MapKind::Region => &[LayerRole::Region],
        MapKind::TerritoryList => &[LayerRole::Territory, LayerRole::Congregation],
        MapKind::MiniMap => &[LayerRole::Viewport],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use territorybro_shared::{Boundary, Region};

    const SQUARE: &str = "MULTIPOLYGON(((24.9 60.1,25.0 60.1,25.0 60.2,24.9 60.2,24.9 60.1)))";
    const INNER: &str = "POLYGON((24.94 60.14,24.96 60.14,24.96 60.16,24.94 60.16,24.94 60.14))";

    fn territory(id: &str, number: &str, location: &str) -> Territory {
        Territory {
            id: id.to_string(),
            number: number.to_string(),
            location: location.to_string(),
            ..Territory::default()
        }
    }

    fn congregation() -> Congregation {
        let mut congregation = Congregation {
            id: "c1".into(),
            territories: vec![territory("t1", "1", INNER)],
            regions: vec![Region {
                id: "r1".into(),
                name: "North".into(),
                location: SQUARE.into(),
                sub_region: true,
                card_minimap_viewport: false,
            }],
            congregation_boundaries: vec![Boundary {
                id: "b1".into(),
                location: SQUARE.into(),
            }],
            ..Congregation::default()
        };
        congregation.enrich();
        congregation
    }

    #[test]
    fn test_fit_chain_per_kind() {
        assert_eq!(fit_chain(MapKind::Neighborhood), [LayerRole::Territory]);
        assert_eq!(fit_chain(MapKind::Region), [LayerRole::Region]);
        assert_eq!(
            fit_chain(MapKind::TerritoryList),
            [LayerRole::Territory, LayerRole::Congregation]
        );
        assert_eq!(fit_chain(MapKind::MiniMap), [LayerRole::Viewport]);
    }

    #[test]
    fn test_missing_location_gives_an_empty_layer() {
        let layers = MapLayers::territory(&MapConfig::default(), None);
        assert_eq!(layers.fit_extents(), [Extent::EMPTY]);
        let layers = MapLayers::territory(&MapConfig::default(), Some("POLYGON(("));
        assert!(layers.layers[0].features.is_empty());
    }

    #[test]
    fn test_neighborhood_labels_the_territory() {
        let layers = MapLayers::neighborhood(&MapConfig::default(), Some("42"), Some(INNER));
        let layer = layers.layer(LayerRole::Territory).unwrap();
        assert_eq!(layer.features[0].label.as_deref(), Some("42"));
        assert_eq!(layer.style.text.as_ref().unwrap().font, NEIGHBORHOOD_LABEL_FONT);
    }

    #[test]
    fn test_region_map_fits_the_region() {
        let territories = vec![territory("", "7", INNER)];
        let layers = MapLayers::region(&MapConfig::default(), Some(SQUARE), &territories);
        let region_extent = layers.layer(LayerRole::Region).unwrap().extent();
        assert_eq!(layers.fit_extents(), [region_extent]);
        let labels = &layers.layer(LayerRole::Territory).unwrap().features;
        assert_eq!(labels[0].label.as_deref(), Some("7"));
    }

    #[test]
    fn test_list_map_falls_back_to_the_congregation() {
        let config = MapConfig::default();
        let congregation = congregation();
        let layers = MapLayers::territory_list(&config, &congregation, &[]);
        let extents = layers.fit_extents();
        assert!(extents[0].is_empty());
        assert!(!extents[1].is_empty());
    }

    #[test]
    fn test_list_map_styles_and_picks_territories() {
        let config = MapConfig::default();
        let congregation = congregation();
        let mut loaned = territory("t9", "9", INNER);
        loaned.loaned = Some(true);
        loaned.staleness = Some(1.0);
        let mut layers = MapLayers::territory_list(&config, &congregation, &[]);
        layers.set_territories(&config, &[loaned]);

        let feature = &layers.layer(LayerRole::Territory).unwrap().features[0];
        assert_eq!(feature.id.as_deref(), Some("t9"));
        assert_eq!(feature.stroke, Some(config.styles.loanable_stroke(Some(true))));

        let grid = layers.pick_grid();
        assert_eq!(grid.len(), 1);
        let center = feature.geometry.extent().center().unwrap();
        assert_eq!(grid.pick_unique(center), Some("t9"));
    }

    #[test]
    fn test_minimap_marks_the_territory_and_fits_the_viewport() {
        let config = MapConfig::default();
        let congregation = congregation();
        let territory = &congregation.territories[0];
        let layers = MapLayers::minimap(&config, &congregation, territory);

        let marker = layers.layer(LayerRole::Marker).unwrap();
        assert_eq!(marker.features.len(), 1);
        assert!(matches!(marker.features[0].geometry, Geometry::Point(_)));
        assert!(!layers.layer(LayerRole::Region).unwrap().features.is_empty());

        // No viewport encloses the territory, so the congregation is shown.
        let outline = layers.layer(LayerRole::Congregation).unwrap().extent();
        assert_eq!(layers.fit_extents(), [outline]);
        assert!(!layers.layer(LayerRole::Viewport).unwrap().is_visible());
    }
}
