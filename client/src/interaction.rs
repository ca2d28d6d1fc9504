//! Pointer, wheel and click handling rules of the interactive maps, kept
//! free of DOM types so they can be tested natively.

use territorybro_shared::config::{WHEEL_DELTA_PER_STEP, WHEEL_ZOOM_STEP};

/// A press that moves less than this is still a click.
pub const CLICK_TOLERANCE_PX: f64 = 5.0;
pub const DOUBLE_CLICK_ZOOM: f64 = 1.0;

const LINE_HEIGHT_PX: f64 = 40.0;
const PAGE_HEIGHT_PX: f64 = 300.0;

/// Modifier state of an input event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub alt: bool,
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
}

impl Modifiers {
    /// Only the platform modifier is held: Cmd on macOS, Ctrl elsewhere.
    pub fn platform_only(&self, mac: bool) -> bool {
        let platform = if mac { self.meta } else { self.ctrl };
        platform && !self.alt && !self.shift
    }
}

pub fn is_mac(user_agent: &str) -> bool {
    user_agent.to_ascii_lowercase().contains("macintosh")
}

/// Touch drags pan only with two fingers or the platform modifier, so one
/// finger keeps scrolling the page. Mouse and pen always pan.
pub fn drag_pan_allowed(pointer_type: &str, pointer_count: usize, modifier_only: bool) -> bool {
    if pointer_type == "touch" {
        return pointer_count == 2 || modifier_only;
    }
    true
}

/// Zoom levels for a wheel event; positive zooms in.
pub fn wheel_zoom_delta(delta_y: f64, delta_mode: u32) -> f64 {
    let pixels = match delta_mode {
        1 => delta_y * LINE_HEIGHT_PX,
        2 => delta_y * PAGE_HEIGHT_PX,
        _ => delta_y,
    };
    (-pixels / WHEEL_DELTA_PER_STEP * WHEEL_ZOOM_STEP).clamp(-WHEEL_ZOOM_STEP, WHEEL_ZOOM_STEP)
}

/// View change requested by a pointer move.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Gesture {
    /// Screen-space pan in CSS pixels.
    pub pan: [f64; 2],
    /// Resolution divisor and the pixel it is anchored at.
    pub zoom: Option<(f64, [f64; 2])>,
}

impl Gesture {
    pub fn is_none(&self) -> bool {
        self.pan == [0.0, 0.0] && self.zoom.is_none()
    }
}

/// Active pointers of one surface.
#[derive(Debug, Default)]
pub struct PointerTracker {
    pointers: Vec<(i32, [f64; 2])>,
    press: Option<[f64; 2]>,
    dragged: bool,
}

impl PointerTracker {
    pub fn count(&self) -> usize {
        self.pointers.len()
    }

    pub fn down(&mut self, id: i32, pos: [f64; 2]) {
        self.pointers.retain(|(p, _)| *p != id);
        self.pointers.push((id, pos));
        if self.pointers.len() == 1 {
            self.press = Some(pos);
            self.dragged = false;
        } else {
            // A second finger is never a click.
            self.dragged = true;
        }
    }

    /// Track a move; `pan_allowed` gates what the move may do to the view.
    pub fn moved(&mut self, id: i32, pos: [f64; 2], pan_allowed: bool) -> Gesture {
        let before = (centroid(&self.pointers), spread(&self.pointers));
        let Some(slot) = self.pointers.iter_mut().find(|(p, _)| *p == id) else {
            return Gesture::default();
        };
        slot.1 = pos;
        if let Some(press) = self.press
            && distance(press, pos) > CLICK_TOLERANCE_PX
        {
            self.dragged = true;
        }
        if !pan_allowed {
            return Gesture::default();
        }
        let (Some(c0), s0) = before else {
            return Gesture::default();
        };
        let Some(c1) = centroid(&self.pointers) else {
            return Gesture::default();
        };
        let zoom = match (s0, spread(&self.pointers)) {
            (Some(s0), Some(s1)) if s0 > 0.0 && s1 > 0.0 => Some((s1 / s0, c1)),
            _ => None,
        };
        Gesture {
            pan: [c1[0] - c0[0], c1[1] - c0[1]],
            zoom,
        }
    }

    /// Release a pointer; returns the click position when the press ended
    /// where it started.
    pub fn up(&mut self, id: i32, pos: [f64; 2]) -> Option<[f64; 2]> {
        let known = self.pointers.iter().any(|(p, _)| *p == id);
        self.pointers.retain(|(p, _)| *p != id);
        if !known || !self.pointers.is_empty() {
            return None;
        }
        let press = self.press.take()?;
        let click = !self.dragged && distance(press, pos) <= CLICK_TOLERANCE_PX;
        click.then_some(pos)
    }

    pub fn cancel(&mut self, id: i32) {
        self.pointers.retain(|(p, _)| *p != id);
        if self.pointers.is_empty() {
            self.press = None;
        }
    }
}

fn centroid(pointers: &[(i32, [f64; 2])]) -> Option<[f64; 2]> {
    if pointers.is_empty() {
        return None;
    }
    let n = pointers.len() as f64;
    let (x, y) = pointers
        .iter()
        .fold((0.0, 0.0), |(x, y), (_, p)| (x + p[0], y + p[1]));
    Some([x / n, y / n])
}

/// Distance between the first two pointers, for pinch zoom.
fn spread(pointers: &[(i32, [f64; 2])]) -> Option<f64> {
    match pointers {
        [(_, a), (_, b), ..] => Some(distance(*a, *b)),
        _ => None,
    }
}

fn distance(a: [f64; 2], b: [f64; 2]) -> f64 {
    (a[0] - b[0]).hypot(a[1] - b[1])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_modifier() {
        let ctrl = Modifiers {
            ctrl: true,
            ..Modifiers::default()
        };
        let meta = Modifiers {
            meta: true,
            ..Modifiers::default()
        };
        assert!(ctrl.platform_only(false));
        assert!(!ctrl.platform_only(true));
        assert!(meta.platform_only(true));
        let ctrl_shift = Modifiers {
            shift: true,
            ..ctrl
        };
        assert!(!ctrl_shift.platform_only(false));
        assert!(is_mac("Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7)"));
        assert!(!is_mac("Mozilla/5.0 (X11; Linux x86_64)"));
    }

    #[test]
    fn test_touch_needs_two_fingers_or_modifier() {
        assert!(!drag_pan_allowed("touch", 1, false));
        assert!(drag_pan_allowed("touch", 2, false));
        assert!(drag_pan_allowed("touch", 1, true));
        assert!(drag_pan_allowed("mouse", 1, false));
        assert!(drag_pan_allowed("pen", 1, false));
    }

    #[test]
    fn test_wheel_zoom_direction_and_cap() {
        assert_eq!(wheel_zoom_delta(-100.0, 0), 1.0);
        assert_eq!(wheel_zoom_delta(50.0, 0), -0.5);
        assert_eq!(wheel_zoom_delta(3.0, 1), -1.0);
        assert_eq!(wheel_zoom_delta(-1.0, 2), 1.0);
    }

    #[test]
    fn test_small_press_is_a_click() {
        let mut tracker = PointerTracker::default();
        tracker.down(1, [10.0, 10.0]);
        tracker.moved(1, [12.0, 11.0], true);
        assert_eq!(tracker.up(1, [12.0, 11.0]), Some([12.0, 11.0]));
    }

    #[test]
    fn test_drag_is_not_a_click() {
        let mut tracker = PointerTracker::default();
        tracker.down(1, [10.0, 10.0]);
        let gesture = tracker.moved(1, [30.0, 10.0], true);
        assert_eq!(gesture.pan, [20.0, 0.0]);
        assert_eq!(gesture.zoom, None);
        // Back at the start, but it was a drag.
        tracker.moved(1, [10.0, 10.0], true);
        assert_eq!(tracker.up(1, [10.0, 10.0]), None);
    }

    #[test]
    fn test_blocked_pan_still_tracks() {
        let mut tracker = PointerTracker::default();
        tracker.down(1, [0.0, 0.0]);
        assert!(tracker.moved(1, [50.0, 0.0], false).is_none());
        assert_eq!(tracker.count(), 1);
        assert_eq!(tracker.up(1, [50.0, 0.0]), None);
    }

    #[test]
    fn test_pinch_zooms_around_the_centroid() {
        let mut tracker = PointerTracker::default();
        tracker.down(1, [0.0, 0.0]);
        tracker.down(2, [100.0, 0.0]);
        let gesture = tracker.moved(2, [200.0, 0.0], true);
        assert_eq!(gesture.pan, [50.0, 0.0]);
        assert_eq!(gesture.zoom, Some((2.0, [100.0, 0.0])));
        assert_eq!(tracker.up(2, [200.0, 0.0]), None);
        assert_eq!(tracker.up(1, [0.0, 0.0]), None);
        assert_eq!(tracker.count(), 0);
    }
}
