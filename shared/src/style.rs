//! Immutable drawing styles, built once and shared by every surface.

use serde::{Deserialize, Serialize};

use crate::config::{LABEL_FONT, STALE_MEDIUM_MONTHS, STALE_RECENT_MONTHS};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f64,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: f64) -> Self {
        Self { r, g, b, a }
    }

    pub fn css(&self) -> String {
        format!("rgba({},{},{},{})", self.r, self.g, self.b, self.a)
    }

    pub fn is_transparent(&self) -> bool {
        self.a <= 0.0
    }
}

pub const BLACK: Rgba = Rgba::new(0, 0, 0, 1.0);
pub const WHITE: Rgba = Rgba::new(255, 255, 255, 1.0);
pub const TRANSPARENT: Rgba = Rgba::new(0, 0, 0, 0.0);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub color: Rgba,
    pub width: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub color: Rgba,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextStyle {
    pub font: String,
    pub fill: Fill,
    /// Halo drawn under the glyphs.
    pub stroke: Stroke,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CircleStyle {
    pub radius: f64,
    pub fill: Fill,
    pub stroke: Stroke,
}

/// Style of one vector layer; absent parts are not drawn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerStyle {
    pub stroke: Option<Stroke>,
    pub fill: Option<Fill>,
    pub text: Option<TextStyle>,
    pub point: Option<CircleStyle>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleRegistry {
    pub territory: LayerStyle,
    pub congregation: LayerStyle,
    pub region: LayerStyle,
    pub minimap_congregation: LayerStyle,
    pub minimap_region: LayerStyle,
    pub minimap_territory: LayerStyle,
    pub geolocation: LayerStyle,
}

impl Default for StyleRegistry {
    fn default() -> Self {
        let territory_stroke = Stroke {
            color: Rgba::new(255, 0, 0, 0.6),
            width: 2.0,
        };
        let outline = Stroke {
            color: Rgba::new(0, 0, 0, 0.6),
            width: 4.0,
        };
        Self {
            territory: LayerStyle {
                stroke: Some(territory_stroke),
                fill: Some(Fill {
                    color: Rgba::new(255, 0, 0, 0.1),
                }),
                text: Some(TextStyle {
                    font: LABEL_FONT.to_string(),
                    fill: Fill { color: BLACK },
                    stroke: Stroke {
                        color: WHITE,
                        width: 3.0,
                    },
                }),
                point: None,
            },
            congregation: LayerStyle {
                stroke: Some(outline),
                ..LayerStyle::default()
            },
            region: LayerStyle {
                stroke: Some(outline),
                ..LayerStyle::default()
            },
            minimap_congregation: LayerStyle {
                stroke: Some(Stroke {
                    color: BLACK,
                    width: 1.0,
                }),
                ..LayerStyle::default()
            },
            minimap_region: LayerStyle {
                fill: Some(Fill {
                    color: Rgba::new(0, 0, 0, 0.3),
                }),
                ..LayerStyle::default()
            },
            minimap_territory: LayerStyle {
                point: Some(CircleStyle {
                    radius: 3.5,
                    fill: Fill { color: BLACK },
                    stroke: Stroke {
                        color: WHITE,
                        width: 1.0,
                    },
                }),
                ..LayerStyle::default()
            },
            geolocation: LayerStyle {
                point: Some(CircleStyle {
                    radius: 6.0,
                    fill: Fill {
                        color: Rgba::new(0x33, 0x99, 0xCC, 1.0),
                    },
                    stroke: Stroke {
                        color: WHITE,
                        width: 2.0,
                    },
                }),
                ..LayerStyle::default()
            },
        }
    }
}

impl StyleRegistry {
    /// Territory outline on the list map: red when loaned, blue when not,
    /// the plain territory stroke when loan status is unknown.
    pub fn loanable_stroke(&self, loaned: Option<bool>) -> Stroke {
        let base = self.territory.stroke.unwrap_or(Stroke {
            color: Rgba::new(255, 0, 0, 0.6),
            width: 2.0,
        });
        match loaned {
            Some(true) => Stroke {
                color: Rgba::new(255, 0, 0, 0.6),
                ..base
            },
            Some(false) => Stroke {
                color: Rgba::new(0, 0, 255, 0.6),
                ..base
            },
            None => base,
        }
    }

    /// Territory fill on the list map, by loan status and months since the
    /// territory was last covered. Unknown staleness counts as stale.
    pub fn loanable_fill(&self, loaned: Option<bool>, staleness: Option<f64>) -> Fill {
        let Some(loaned) = loaned else {
            return Fill { color: TRANSPARENT };
        };
        let color = match staleness {
            Some(s) if s < STALE_RECENT_MONTHS => Rgba::new(150, 150, 150, 0.2),
            Some(s) if s < STALE_MEDIUM_MONTHS => {
                if loaned {
                    Rgba::new(255, 150, 0, 0.2)
                } else {
                    Rgba::new(0, 200, 255, 0.2)
                }
            }
            _ if loaned => Rgba::new(255, 0, 0, 0.2),
            _ => Rgba::new(0, 0, 255, 0.2),
        };
        Fill { color }
    }
}
