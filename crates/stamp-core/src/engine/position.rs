//! Overlay placement on a target canvas.

use crate::types::WatermarkPosition;

/// Top-left pixel offset of an overlay on a target.
///
/// `Custom` returns `custom` unchanged when it is set; without coordinates it
/// behaves like `BottomRight`, as do `Tile` and unknown anchors. Offsets are
/// never clamped: negative or out-of-canvas values clip during compositing.
pub fn compute_position(
    target: (u32, u32),
    overlay: (u32, u32),
    position: WatermarkPosition,
    margin: u32,
    custom: Option<(i32, i32)>,
) -> (i64, i64) {
    if position == WatermarkPosition::Custom {
        if let Some((x, y)) = custom {
            return (i64::from(x), i64::from(y));
        }
    }

    let (fx, fy) = position.anchor().unwrap_or((1.0, 1.0));

    (
        axis_offset(target.0, overlay.0, fx, margin),
        axis_offset(target.1, overlay.1, fy, margin),
    )
}

fn axis_offset(target: u32, overlay: u32, factor: f32, margin: u32) -> i64 {
    let free = i64::from(target) - i64::from(overlay);
    let margin = i64::from(margin);
    if factor == 0.0 {
        margin
    } else if factor == 0.5 {
        free.div_euclid(2)
    } else {
        free - margin
    }
}
