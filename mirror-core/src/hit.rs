//! Resolving a pointer position to one touch zone.

use crate::compose::{Composition, ZoneEntry};
use crate::item::{Item, TouchZone, Transform};

/// Half the 9 mm minimum touch target, in pixels at 96 dpi.
pub const HALF_MIN_TOUCH_PX: f32 = 96.0 * 9.0 / (2.0 * 25.4);

/// Fraction of the viewport used when it exceeds the 9 mm target.
pub const MIN_TOUCH_FRACTION: f32 = 0.02;

/// Extra reach added around every zone, in logical units.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TouchMargin {
    /// Added left and right.
    pub col: f32,
    /// Added above and below.
    pub row: f32,
}

impl TouchMargin {
    /// The same margin in both dimensions.
    #[must_use]
    pub const fn uniform(margin: f32) -> Self {
        Self {
            col: margin,
            row: margin,
        }
    }
}

/// Margin for a viewport of `width` x `height` pixels drawn at `scale_x`
/// pixels per logical unit.
///
/// Each side gets the larger of half the 9 mm target and 2% of the
/// viewport in that dimension.
#[must_use]
pub fn min_touch_margin(width: f32, height: f32, scale_x: f32) -> TouchMargin {
    let scale = if scale_x > 0.0 { scale_x } else { 1.0 };
    TouchMargin {
        col: HALF_MIN_TOUCH_PX.max(width * MIN_TOUCH_FRACTION) / scale,
        row: HALF_MIN_TOUCH_PX.max(height * MIN_TOUCH_FRACTION) / scale,
    }
}

/// Axis-aligned bounds in logical units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoneBounds {
    /// Left edge.
    pub left: f32,
    /// Top edge.
    pub top: f32,
    /// Right edge.
    pub right: f32,
    /// Bottom edge.
    pub bottom: f32,
}

impl ZoneBounds {
    /// Bounds of `zone` under `transform`. Negative sizes extend left/up.
    #[must_use]
    pub fn of(zone: &TouchZone, transform: Transform) -> Self {
        let x_offset = zone.x_offset * transform.scale;
        let y_offset = zone.y_offset * transform.scale;
        let x_size = zone.x_size * transform.scale;
        let y_size = zone.y_size * transform.scale;

        let (left, top) = if zone.centered {
            (
                transform.x + x_offset - x_size.abs() / 2.0,
                transform.y + y_offset - y_size.abs() / 2.0,
            )
        } else {
            (
                transform.x + x_offset + x_size.min(0.0),
                transform.y + y_offset + y_size.min(0.0),
            )
        };
        Self {
            left,
            top,
            right: left + x_size.abs(),
            bottom: top + y_size.abs(),
        }
    }

    /// Bounds of a composed zone item.
    #[must_use]
    pub fn of_item(item: &Item) -> Option<Self> {
        item.as_touch_zone()
            .map(|zone| Self::of(zone, item.transform_or_identity()))
    }

    /// Width.
    #[must_use]
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    /// Height.
    #[must_use]
    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    /// Grow every side by `margin`.
    #[must_use]
    pub fn expand(self, margin: TouchMargin) -> Self {
        Self {
            left: self.left - margin.col,
            top: self.top - margin.row,
            right: self.right + margin.col,
            bottom: self.bottom + margin.row,
        }
    }

    /// True if the point lies inside or on the edge.
    #[must_use]
    pub fn contains_point(&self, x: f32, y: f32) -> bool {
        x >= self.left && x <= self.right && y >= self.top && y <= self.bottom
    }

    /// True if `other` lies entirely inside.
    #[must_use]
    pub fn contains(&self, other: &Self) -> bool {
        self.left <= other.left
            && self.top <= other.top
            && self.right >= other.right
            && self.bottom >= other.bottom
    }
}

struct Candidate<'a> {
    entry: &'a ZoneEntry,
    z: u32,
    bounds: ZoneBounds,
    expanded: ZoneBounds,
    col_min: f32,
    row_min: f32,
}

/// Pick the zone under (`x`, `y`).
///
/// Invisible and disabled zones are ignored. Among the zones whose expanded
/// bounds contain the point, a higher index wins; on equal index a zone
/// that fully contains the other wins; otherwise the zone the point sits
/// deeper inside wins, measured in the dimension where the two zones
/// overlap least. Ties go to the later zone.
#[must_use]
pub fn find_zone_at(composition: &Composition, x: f32, y: f32, margin: TouchMargin) -> Option<&ZoneEntry> {
    let mut current: Option<Candidate<'_>> = None;

    for entry in composition.zones_in_order() {
        let item = &entry.item;
        let Some(zone) = item.as_touch_zone() else {
            continue;
        };
        if !item.visible || zone.filter.is_disabled() {
            continue;
        }
        let bounds = ZoneBounds::of(zone, item.transform_or_identity());
        let expanded = bounds.expand(margin);
        if !expanded.contains_point(x, y) {
            continue;
        }
        let candidate = Candidate {
            entry,
            z: item.index.unwrap_or(0),
            bounds,
            expanded,
            col_min: (x - expanded.left).min(expanded.right - x),
            row_min: (y - expanded.top).min(expanded.bottom - y),
        };

        current = Some(match current {
            None => candidate,
            Some(best) => {
                if newcomer_wins(&best, &candidate) {
                    candidate
                } else {
                    best
                }
            }
        });
    }

    current.map(|winner| winner.entry)
}

fn newcomer_wins(current: &Candidate<'_>, newcomer: &Candidate<'_>) -> bool {
    if current.z != newcomer.z {
        return newcomer.z > current.z;
    }
    if newcomer.bounds.contains(&current.bounds) {
        return true;
    }
    if current.bounds.contains(&newcomer.bounds) {
        return false;
    }

    let col_overlap = newcomer.expanded.right.min(current.expanded.right)
        - newcomer.expanded.left.max(current.expanded.left);
    let row_overlap = newcomer.expanded.bottom.min(current.expanded.bottom)
        - newcomer.expanded.top.max(current.expanded.top);

    #[allow(clippy::float_cmp)] // exact equality selects the tie-break path
    let compare_col = if col_overlap == row_overlap {
        current.col_min.min(newcomer.col_min) < current.row_min.min(newcomer.row_min)
    } else {
        col_overlap < row_overlap
    };

    if compare_col {
        current.col_min <= newcomer.col_min
    } else {
        current.row_min <= newcomer.row_min
    }
}

/// Zone-relative (col, row) of a point, in the zone's own units.
///
/// Rounded and clamped to `0..=size`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // clamped to 0..=size first
pub fn touch_location(item: &Item, x: f32, y: f32) -> (u32, u32) {
    let Some(zone) = item.as_touch_zone() else {
        return (0, 0);
    };
    let bounds = ZoneBounds::of(zone, item.transform_or_identity());
    let locate = |offset: f32, extent: f32, size: f32| -> u32 {
        let size = size.abs();
        let relative = if extent > 0.0 { offset / extent * size } else { 0.0 };
        relative.round().clamp(0.0, size.floor()) as u32
    };
    (
        locate(x - bounds.left, bounds.width(), zone.x_size),
        locate(y - bounds.top, bounds.height(), zone.y_size),
    )
}
