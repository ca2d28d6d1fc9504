use std::f64::consts::TAU;

use geo::LineString;
use territorybro_shared::style::{CircleStyle, LayerStyle, Rgba, Stroke, TextStyle};
use territorybro_shared::{Extent, Geometry, View, scale_factor};
use web_sys::{CanvasRenderingContext2d, CanvasWindingRule};

use crate::geolocation::Fix;
use crate::layers::{Feature, MapLayers};
use crate::tiles::DrawableTile;

const ACCURACY_FILL: Rgba = Rgba::new(255, 255, 255, 0.4);
const ACCURACY_STROKE: Stroke = Stroke {
    color: Rgba::new(0x33, 0x99, 0xCC, 1.0),
    width: 1.25,
};

/// Everything one repaint needs.
pub struct Frame<'a> {
    pub view: &'a View,
    /// Backing store pixels per CSS pixel.
    pub pixel_ratio: f64,
    pub tiles: &'a [DrawableTile],
    pub layers: &'a MapLayers,
    pub location: Option<Fix>,
    pub location_style: &'a LayerStyle,
}

pub fn draw_frame(ctx: &CanvasRenderingContext2d, frame: &Frame<'_>) {
    let view = frame.view;
    let [w, h] = view.size;
    let pr = frame.pixel_ratio;
    let _ = ctx.set_transform(1.0, 0.0, 0.0, 1.0, 0.0, 0.0);
    ctx.clear_rect(0.0, 0.0, w * pr, h * pr);
    let _ = ctx.set_transform(pr, 0.0, 0.0, pr, 0.0, 0.0);

    draw_tiles(ctx, view, frame.tiles);

    let visible = view.calculate_extent();
    for layer in frame.layers.layers.iter().filter(|l| l.is_visible()) {
        for feature in &layer.features {
            if !feature.geometry.extent().intersects(&visible) {
                continue;
            }
            draw_feature(ctx, view, &layer.style, feature);
        }
    }
    // Labels on top of every outline.
    for layer in frame.layers.layers.iter().filter(|l| l.is_visible()) {
        let Some(text) = layer.style.text.as_ref() else {
            continue;
        };
        for feature in &layer.features {
            draw_label(ctx, view, text, feature);
        }
    }

    if let Some(fix) = frame.location {
        draw_location(ctx, view, fix, frame.location_style);
    }
}

/// Offset and size of a tile relative to the view center, before rotation,
/// snapped outward to whole pixels so neighbors leave no seams.
fn tile_rect(view: &View, extent: &Extent) -> [f64; 4] {
    let s = &view.state;
    let left = ((extent.min_x - s.center[0]) / s.resolution).floor();
    let top = ((s.center[1] - extent.max_y) / s.resolution).floor();
    let right = ((extent.max_x - s.center[0]) / s.resolution).ceil();
    let bottom = ((s.center[1] - extent.min_y) / s.resolution).ceil();
    [left, top, right - left, bottom - top]
}

fn draw_tiles(ctx: &CanvasRenderingContext2d, view: &View, tiles: &[DrawableTile]) {
    if tiles.is_empty() {
        return;
    }
    ctx.save();
    let _ = ctx.translate(view.size[0] / 2.0, view.size[1] / 2.0);
    let _ = ctx.rotate(view.state.rotation);
    for tile in tiles {
        let [x, y, w, h] = tile_rect(view, &tile.extent);
        let _ = ctx.draw_image_with_html_image_element_and_dw_and_dh(&tile.image, x, y, w, h);
    }
    ctx.restore();
}

fn trace_ring(ctx: &CanvasRenderingContext2d, view: &View, ring: &LineString<f64>) {
    let mut points = ring.coords().map(|c| view.pixel_from_coordinate(*c));
    let Some([x, y]) = points.next() else {
        return;
    };
    ctx.move_to(x, y);
    for [x, y] in points {
        ctx.line_to(x, y);
    }
    ctx.close_path();
}

fn draw_feature(ctx: &CanvasRenderingContext2d, view: &View, style: &LayerStyle, feature: &Feature) {
    match &feature.geometry {
        Geometry::Point(point) => {
            if let Some(circle) = style.point.as_ref() {
                draw_circle(ctx, view.pixel_from_coordinate(point.0), circle);
            }
        }
        geometry => {
            ctx.begin_path();
            for polygon in geometry.polygons() {
                trace_ring(ctx, view, polygon.exterior());
                for interior in polygon.interiors() {
                    trace_ring(ctx, view, interior);
                }
            }
            if let Some(fill) = feature.fill.or(style.fill)
                && !fill.color.is_transparent()
            {
                ctx.set_fill_style_str(&fill.color.css());
                ctx.fill_with_canvas_winding_rule(CanvasWindingRule::Evenodd);
            }
            if let Some(stroke) = feature.stroke.or(style.stroke) {
                apply_stroke(ctx, &stroke);
                ctx.stroke();
            }
        }
    }
}

fn apply_stroke(ctx: &CanvasRenderingContext2d, stroke: &Stroke) {
    ctx.set_stroke_style_str(&stroke.color.css());
    ctx.set_line_width(stroke.width);
    ctx.set_line_join("round");
    ctx.set_line_cap("round");
}

fn draw_circle(ctx: &CanvasRenderingContext2d, [x, y]: [f64; 2], circle: &CircleStyle) {
    ctx.begin_path();
    let _ = ctx.arc(x, y, circle.radius, 0.0, TAU);
    ctx.set_fill_style_str(&circle.fill.color.css());
    ctx.fill();
    if circle.stroke.width > 0.0 {
        apply_stroke(ctx, &circle.stroke);
        ctx.stroke();
    }
}

fn draw_label(ctx: &CanvasRenderingContext2d, view: &View, text: &TextStyle, feature: &Feature) {
    let Some(label) = feature.label.as_deref().filter(|l| !l.is_empty()) else {
        return;
    };
    let Some(anchor) = feature.geometry.interior_point() else {
        return;
    };
    let [x, y] = view.pixel_from_coordinate(anchor.0);
    if x < 0.0 || y < 0.0 || x > view.size[0] || y > view.size[1] {
        return;
    }
    let scale = scale_factor(label, &feature.geometry.extent(), view.state.resolution);

    ctx.save();
    let _ = ctx.translate(x, y);
    let _ = ctx.scale(scale, scale);
    ctx.set_font(&text.font);
    ctx.set_text_align("center");
    ctx.set_text_baseline("middle");
    if text.stroke.width > 0.0 {
        apply_stroke(ctx, &text.stroke);
        let _ = ctx.stroke_text(label, 0.0, 0.0);
    }
    ctx.set_fill_style_str(&text.fill.color.css());
    let _ = ctx.fill_text(label, 0.0, 0.0);
    ctx.restore();
}

fn draw_location(ctx: &CanvasRenderingContext2d, view: &View, fix: Fix, style: &LayerStyle) {
    let center = view.pixel_from_coordinate(fix.position);
    let radius = fix.accuracy / view.state.resolution;
    if radius > 1.0 {
        ctx.begin_path();
        let _ = ctx.arc(center[0], center[1], radius, 0.0, TAU);
        ctx.set_fill_style_str(&ACCURACY_FILL.css());
        ctx.fill();
        apply_stroke(ctx, &ACCURACY_STROKE);
        ctx.stroke();
    }
    if let Some(circle) = style.point.as_ref() {
        draw_circle(ctx, center, circle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use territorybro_shared::{ViewConstraints, ViewState};

    fn view(center: [f64; 2], resolution: f64) -> View {
        View {
            state: ViewState {
                center,
                resolution,
                rotation: 0.0,
            },
            constraints: ViewConstraints::default(),
            size: [100.0, 100.0],
        }
    }

    #[test]
    fn test_tile_rect_relative_to_center() {
        let v = view([0.0, 0.0], 1.0);
        assert_eq!(
            tile_rect(&v, &Extent::new(0.0, 0.0, 10.0, 10.0)),
            [0.0, -10.0, 10.0, 10.0]
        );
    }

    #[test]
    fn test_tile_rect_snaps_outward() {
        let v = view([0.5, 0.0], 2.0);
        // Left edge at -0.25 px, right edge at 4.75 px.
        assert_eq!(
            tile_rect(&v, &Extent::new(0.0, 0.0, 10.0, 10.0)),
            [-1.0, -5.0, 6.0, 5.0]
        );
    }
}
