use crate::config::{LABEL_CHAR_WIDTH_PX, MIN_LABEL_SCALE};
use crate::extent::Extent;

/// Scale for a territory label so it roughly fits its shape on screen.
///
/// Labels shrink with the shape but never grow past their natural size, and
/// never vanish entirely. Width is favored over height since labels are
/// laid out horizontally.
pub fn scale_factor(text: &str, extent: &Extent, resolution: f64) -> f64 {
    let chars = text.chars().count();
    if chars == 0 || extent.is_empty() || !(resolution > 0.0) {
        return 1.0;
    }
    let geometry_width = extent.width() / resolution;
    let geometry_height = extent.height() / resolution;
    let label_width = LABEL_CHAR_WIDTH_PX * chars as f64;
    let scale = geometry_width.max(geometry_height * 0.5) / label_width;
    scale.clamp(MIN_LABEL_SCALE, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn large_shapes_keep_natural_size() {
        let extent = Extent::new(0.0, 0.0, 10_000.0, 10_000.0);
        assert_eq!(scale_factor("123", &extent, 1.0), 1.0);
    }

    #[test]
    fn narrow_shapes_shrink_the_label() {
        // 22 px wide on screen, label needs 4 * 11 = 44 px.
        let extent = Extent::new(0.0, 0.0, 88.0, 20.0);
        assert!((scale_factor("A123", &extent, 4.0) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn height_counts_half() {
        let extent = Extent::new(0.0, 0.0, 10.0, 44.0);
        // max(10, 22) / 44
        assert!((scale_factor("A123", &extent, 1.0) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn tiny_shapes_hit_the_floor() {
        let extent = Extent::new(0.0, 0.0, 0.001, 0.001);
        assert_eq!(scale_factor("Long label", &extent, 10.0), MIN_LABEL_SCALE);
    }

    #[test]
    fn degenerate_inputs_leave_labels_unscaled() {
        let extent = Extent::new(0.0, 0.0, 1.0, 1.0);
        assert_eq!(scale_factor("", &extent, 1.0), 1.0);
        assert_eq!(scale_factor("12", &Extent::EMPTY, 1.0), 1.0);
        assert_eq!(scale_factor("12", &extent, 0.0), 1.0);
        assert_eq!(scale_factor("12", &extent, f64::NAN), 1.0);
    }

    proptest! {
        #[test]
        fn never_above_one_and_non_increasing_in_length(
            w in 0.0f64..1.0e5,
            h in 0.0f64..1.0e5,
            resolution in 0.01f64..1.0e3,
            len in 1usize..40,
        ) {
            let extent = Extent::new(0.0, 0.0, w, h);
            let shorter = scale_factor(&"8".repeat(len), &extent, resolution);
            let longer = scale_factor(&"8".repeat(len + 1), &extent, resolution);
            prop_assert!(shorter <= 1.0);
            prop_assert!(longer <= 1.0);
            prop_assert!(longer <= shorter);
            prop_assert!(longer >= MIN_LABEL_SCALE);
        }
    }
}
