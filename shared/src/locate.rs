use geo::Coord;

use crate::config::LOCATE_CONTAINMENT_BUFFER;
use crate::extent::Extent;

/// Extent to zoom out to so the user's `position` becomes visible.
///
/// `None` when the position is already clearly inside `visible`. Otherwise
/// the visible extent grows to include the position plus a margin of half
/// its smaller dimension, so the marker does not sit on the edge.
pub fn extent_including(visible: &Extent, position: Coord<f64>) -> Option<Extent> {
    let near = Extent::from_coord(position).buffer(LOCATE_CONTAINMENT_BUFFER);
    if visible.contains_extent(&near) {
        return None;
    }
    let mut extent = *visible;
    extent.extend_coord(position);
    let dimension = extent.width().min(extent.height());
    extent.extend(&Extent::from_coord(position).buffer(dimension * 0.5));
    Some(extent)
}
