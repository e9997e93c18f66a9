//! Drawing items - the primitives a remote drawing is built from.
//!
//! Items arrive already decoded. Each carries the transform that was in
//! effect for its owning drawing when it was added, and after composition
//! an absolute transform and clip region.

use serde::{Deserialize, Serialize};
use std::ops::BitOr;

/// Affine map (translate, uniform scale) from drawing-local units to the
/// parent coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// X translation.
    pub x: f32,
    /// Y translation.
    pub y: f32,
    /// Uniform scale factor.
    pub scale: f32,
}

impl Transform {
    /// The identity transform (0, 0, 1).
    pub const IDENTITY: Self = Self {
        x: 0.0,
        y: 0.0,
        scale: 1.0,
    };

    /// Create a transform.
    #[must_use]
    pub const fn new(x: f32, y: f32, scale: f32) -> Self {
        Self { x, y, scale }
    }

    /// Map this transform into `parent`'s coordinate space.
    #[must_use]
    pub fn compose(self, parent: Self) -> Self {
        Self {
            x: self.x * parent.scale + parent.x,
            y: self.y * parent.scale + parent.y,
            scale: self.scale * parent.scale,
        }
    }

    /// Move the origin by (`x`, `y`) local units and multiply the scale.
    #[must_use]
    pub fn push_zero(self, x: f32, y: f32, scale: f32) -> Self {
        Self {
            x: self.x + x * self.scale,
            y: self.y + y * self.scale,
            scale: self.scale * scale,
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Rectangle bounding where a composed item may render.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClipRegion {
    /// Left edge.
    pub x: f32,
    /// Top edge.
    pub y: f32,
    /// Width.
    pub width: f32,
    /// Height.
    pub height: f32,
}

impl ClipRegion {
    /// Create a clip region.
    #[must_use]
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Bitmask of pointer phases a touch zone reacts to.
///
/// `TOUCH` is the empty mask and means "activate on first contact".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TouchFilter(u16);

impl TouchFilter {
    /// Activate on first contact.
    pub const TOUCH: Self = Self(0);
    /// Pointer pressed inside the zone.
    pub const DOWN: Self = Self(1);
    /// Pointer moved while pressed.
    pub const DRAG: Self = Self(2);
    /// Pointer released inside the zone.
    pub const UP: Self = Self(4);
    /// Short press and release.
    pub const CLICK: Self = Self(8);
    /// Long press.
    pub const PRESS: Self = Self(16);
    /// Pointer entered the zone while pressed.
    pub const ENTRY: Self = Self(32);
    /// Pointer left the zone while pressed.
    pub const EXIT: Self = Self(64);
    /// Local preview on down, send on up.
    pub const DOWN_UP: Self = Self(256);
    /// Zone is inert.
    pub const TOUCH_DISABLED: Self = Self(512);

    /// Build a filter from raw bits.
    #[must_use]
    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    /// Raw bits.
    #[must_use]
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// True for the plain `TOUCH` filter.
    #[must_use]
    pub const fn is_touch(self) -> bool {
        self.0 == 0
    }

    /// True when the zone ignores all pointer input.
    #[must_use]
    pub const fn is_disabled(self) -> bool {
        self.0 & Self::TOUCH_DISABLED.0 != 0
    }

    /// True when every bit of `other` is set. Never true for `TOUCH`.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }
}

impl BitOr for TouchFilter {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Text alignment for labels and values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    /// Left aligned.
    #[default]
    Left,
    /// Centered.
    Center,
    /// Right aligned.
    Right,
}

/// A pointer-reactive region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TouchZone {
    /// Command sent when the zone activates. Primary key within a drawing.
    pub cmd: String,
    /// Pointer phases the zone reacts to.
    #[serde(default)]
    pub filter: TouchFilter,
    /// Left (or center) offset.
    #[serde(default)]
    pub x_offset: f32,
    /// Top (or center) offset.
    #[serde(default)]
    pub y_offset: f32,
    /// Width. Negative sizes extend left.
    #[serde(default = "one")]
    pub x_size: f32,
    /// Height. Negative sizes extend up.
    #[serde(default = "one")]
    pub y_size: f32,
    /// Offsets name the zone center instead of its corner.
    #[serde(default)]
    pub centered: bool,
}

impl TouchZone {
    /// Create a `TOUCH` zone anchored at its corner.
    #[must_use]
    pub fn new(cmd: impl Into<String>, x_offset: f32, y_offset: f32, x_size: f32, y_size: f32) -> Self {
        Self {
            cmd: cmd.into(),
            filter: TouchFilter::TOUCH,
            x_offset,
            y_offset,
            x_size,
            y_size,
            centered: false,
        }
    }

    /// Set the filter.
    #[must_use]
    pub fn with_filter(mut self, filter: TouchFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Set whether offsets name the center.
    #[must_use]
    pub fn with_centered(mut self, centered: bool) -> Self {
        self.centered = centered;
        self
    }
}

/// Reference to a child drawing embedded in its parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertDrawing {
    /// Name of the child drawing.
    pub drawing_name: String,
    /// Shift of the child content, in child units.
    #[serde(default)]
    pub x_offset: f32,
    /// Shift of the child content, in child units.
    #[serde(default)]
    pub y_offset: f32,
}

impl InsertDrawing {
    /// Reference `drawing_name` with no offset.
    #[must_use]
    pub fn new(drawing_name: impl Into<String>) -> Self {
        Self {
            drawing_name: drawing_name.into(),
            x_offset: 0.0,
            y_offset: 0.0,
        }
    }

    /// Set the content offset.
    #[must_use]
    pub fn with_offset(mut self, x_offset: f32, y_offset: f32) -> Self {
        self.x_offset = x_offset;
        self.y_offset = y_offset;
        self
    }
}

/// Text-entry prompt shown instead of sending when a zone activates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TouchActionInput {
    /// Command of the zone this prompt belongs to.
    pub cmd: String,
    /// Prompt text.
    #[serde(default)]
    pub prompt: String,
    /// Index of the item holding the initial text.
    #[serde(default)]
    pub text_idx: Option<u32>,
    /// Font size of the prompt.
    #[serde(default)]
    pub font_size: f32,
    /// Text color.
    #[serde(default)]
    pub color: u8,
    /// Background color.
    #[serde(default)]
    pub background_color: u8,
}

/// The primitive an [`Item`] carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ItemKind {
    /// Axis-aligned rectangle.
    Rectangle {
        /// Left offset.
        #[serde(default)]
        x_offset: f32,
        /// Top offset.
        #[serde(default)]
        y_offset: f32,
        /// Width.
        #[serde(default = "one")]
        x_size: f32,
        /// Height.
        #[serde(default = "one")]
        y_size: f32,
        /// Fill instead of outline.
        #[serde(default)]
        filled: bool,
        /// Rounded corners.
        #[serde(default)]
        rounded: bool,
        /// Color index.
        #[serde(default)]
        color: u8,
    },

    /// Straight line from the offset by the size vector.
    Line {
        /// Start x.
        #[serde(default)]
        x_offset: f32,
        /// Start y.
        #[serde(default)]
        y_offset: f32,
        /// Delta x.
        #[serde(default = "one")]
        x_size: f32,
        /// Delta y.
        #[serde(default = "one")]
        y_size: f32,
        /// Color index.
        #[serde(default)]
        color: u8,
    },

    /// Circle centered at the offset.
    Circle {
        /// Center x.
        #[serde(default)]
        x_offset: f32,
        /// Center y.
        #[serde(default)]
        y_offset: f32,
        /// Radius.
        #[serde(default = "one")]
        radius: f32,
        /// Fill instead of outline.
        #[serde(default)]
        filled: bool,
        /// Color index.
        #[serde(default)]
        color: u8,
    },

    /// Circular arc or sector.
    Arc {
        /// Center x.
        #[serde(default)]
        x_offset: f32,
        /// Center y.
        #[serde(default)]
        y_offset: f32,
        /// Radius.
        #[serde(default = "one")]
        radius: f32,
        /// Start angle in degrees.
        #[serde(default)]
        start: f32,
        /// Sweep in degrees.
        #[serde(default = "ninety")]
        angle: f32,
        /// Fill as a sector.
        #[serde(default)]
        filled: bool,
        /// Color index.
        #[serde(default)]
        color: u8,
    },

    /// Static text, optionally with a formatted number.
    Label {
        /// Anchor x.
        #[serde(default)]
        x_offset: f32,
        /// Anchor y.
        #[serde(default)]
        y_offset: f32,
        /// Text.
        #[serde(default)]
        text: String,
        /// Font size, 0 for the default.
        #[serde(default)]
        font_size: f32,
        /// Bold.
        #[serde(default)]
        bold: bool,
        /// Italic.
        #[serde(default)]
        italic: bool,
        /// Underline.
        #[serde(default)]
        underline: bool,
        /// Alignment about the anchor.
        #[serde(default)]
        align: Align,
        /// Number appended to the text.
        #[serde(default)]
        value: Option<f32>,
        /// Units appended after the number.
        #[serde(default)]
        units: Option<String>,
        /// Decimals for the number. Negative values round left of the point.
        #[serde(default)]
        decimals: Option<i32>,
        /// Color index.
        #[serde(default)]
        color: u8,
    },

    /// Integer value mapped linearly onto a display range.
    Value {
        /// Anchor x.
        #[serde(default)]
        x_offset: f32,
        /// Anchor y.
        #[serde(default)]
        y_offset: f32,
        /// Text before the value.
        #[serde(default)]
        text: String,
        /// Font size, 0 for the default.
        #[serde(default)]
        font_size: f32,
        /// Bold.
        #[serde(default)]
        bold: bool,
        /// Italic.
        #[serde(default)]
        italic: bool,
        /// Underline.
        #[serde(default)]
        underline: bool,
        /// Alignment about the anchor.
        #[serde(default)]
        align: Align,
        /// Raw integer value.
        #[serde(default)]
        int_value: i64,
        /// Raw value mapped to `display_min`.
        #[serde(default)]
        min: i64,
        /// Raw value mapped to `display_max`.
        #[serde(default = "one_i64")]
        max: i64,
        /// Displayed value at `min`.
        #[serde(default)]
        display_min: f32,
        /// Displayed value at `max`.
        #[serde(default = "one")]
        display_max: f32,
        /// Decimals shown. Negative values round left of the point.
        #[serde(default = "two")]
        decimals: i32,
        /// Units appended after the value.
        #[serde(default)]
        units: String,
        /// Color index.
        #[serde(default)]
        color: u8,
    },

    /// Pointer-reactive region.
    TouchZone(TouchZone),

    /// Embedded child drawing.
    InsertDrawing(InsertDrawing),

    /// Holds an index slot and its transform. Never rendered.
    IndexMarker,

    /// Hide the item at this item's index, or the zone for `cmd`.
    Hide {
        /// Zone command.
        #[serde(default)]
        cmd: Option<String>,
    },

    /// Unhide the item at this item's index, or the zone for `cmd`.
    Unhide {
        /// Zone command.
        #[serde(default)]
        cmd: Option<String>,
    },

    /// Erase the item at this item's index, or the zone for `cmd`.
    Erase {
        /// Zone command.
        #[serde(default)]
        cmd: Option<String>,
    },

    /// Push the working transform and move the origin.
    PushZero {
        /// Origin shift x.
        #[serde(default)]
        x: f32,
        /// Origin shift y.
        #[serde(default)]
        y: f32,
        /// Scale multiplier.
        #[serde(default = "one")]
        scale: f32,
    },

    /// Pop the working transform.
    PopZero,

    /// Override items applied locally when the zone for `cmd` activates.
    TouchAction {
        /// Zone command.
        cmd: String,
        /// Items applied as an update.
        #[serde(default)]
        actions: Vec<Item>,
    },

    /// Prompt for text when the zone for its `cmd` activates.
    TouchActionInput(TouchActionInput),
}

impl ItemKind {
    /// Short name for logging.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Rectangle { .. } => "rectangle",
            Self::Line { .. } => "line",
            Self::Circle { .. } => "circle",
            Self::Arc { .. } => "arc",
            Self::Label { .. } => "label",
            Self::Value { .. } => "value",
            Self::TouchZone(_) => "touch_zone",
            Self::InsertDrawing(_) => "insert_drawing",
            Self::IndexMarker => "index_marker",
            Self::Hide { .. } => "hide",
            Self::Unhide { .. } => "unhide",
            Self::Erase { .. } => "erase",
            Self::PushZero { .. } => "push_zero",
            Self::PopZero => "pop_zero",
            Self::TouchAction { .. } => "touch_action",
            Self::TouchActionInput(_) => "touch_action_input",
        }
    }

    /// Mutable access to the offsets of kinds that are positioned by them.
    pub fn offsets_mut(&mut self) -> Option<(&mut f32, &mut f32)> {
        match self {
            Self::Rectangle {
                x_offset, y_offset, ..
            }
            | Self::Line {
                x_offset, y_offset, ..
            }
            | Self::Circle {
                x_offset, y_offset, ..
            }
            | Self::Arc {
                x_offset, y_offset, ..
            }
            | Self::Label {
                x_offset, y_offset, ..
            }
            | Self::Value {
                x_offset, y_offset, ..
            } => Some((x_offset, y_offset)),
            Self::TouchZone(zone) => Some((&mut zone.x_offset, &mut zone.y_offset)),
            Self::InsertDrawing(insert) => Some((&mut insert.x_offset, &mut insert.y_offset)),
            _ => None,
        }
    }
}

/// One renderable or control primitive belonging to a drawing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// What the item is.
    pub kind: ItemKind,
    /// Index slot. Values below 1 mean "unindexed".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
    /// Whether the item is drawn.
    #[serde(default = "visible_by_default")]
    pub visible: bool,
    /// Captured transform, or the absolute transform after composition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<Transform>,
    /// Clip region, set by composition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clip: Option<ClipRegion>,
}

impl Item {
    /// Create a visible, unindexed item.
    #[must_use]
    pub fn new(kind: ItemKind) -> Self {
        Self {
            kind,
            index: None,
            visible: true,
            transform: None,
            clip: None,
        }
    }

    /// Outline rectangle at the given corner and size.
    #[must_use]
    pub fn rectangle(x_offset: f32, y_offset: f32, x_size: f32, y_size: f32) -> Self {
        Self::new(ItemKind::Rectangle {
            x_offset,
            y_offset,
            x_size,
            y_size,
            filled: false,
            rounded: false,
            color: 0,
        })
    }

    /// Left aligned label.
    #[must_use]
    pub fn label(x_offset: f32, y_offset: f32, text: impl Into<String>) -> Self {
        Self::new(ItemKind::Label {
            x_offset,
            y_offset,
            text: text.into(),
            font_size: 0.0,
            bold: false,
            italic: false,
            underline: false,
            align: Align::Left,
            value: None,
            units: None,
            decimals: None,
            color: 0,
        })
    }

    /// Touch zone item.
    #[must_use]
    pub fn touch_zone(zone: TouchZone) -> Self {
        Self::new(ItemKind::TouchZone(zone))
    }

    /// Embedded child drawing item.
    #[must_use]
    pub fn insert_drawing(insert: InsertDrawing) -> Self {
        Self::new(ItemKind::InsertDrawing(insert))
    }

    /// Set the index slot.
    #[must_use]
    pub fn with_index(mut self, index: u32) -> Self {
        self.index = Some(index);
        self
    }

    /// Set visibility.
    #[must_use]
    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    /// Return a copy with `transform`.
    #[must_use]
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = Some(transform);
        self
    }

    /// Return a copy with `clip`.
    #[must_use]
    pub fn with_clip(mut self, clip: ClipRegion) -> Self {
        self.clip = Some(clip);
        self
    }

    /// The index if it is a valid slot (1 or more).
    #[must_use]
    pub fn valid_index(&self) -> Option<u32> {
        self.index.filter(|idx| *idx >= 1)
    }

    /// Captured transform, identity if none was captured.
    #[must_use]
    pub fn transform_or_identity(&self) -> Transform {
        self.transform.unwrap_or_default()
    }

    /// The zone if this is a touch zone.
    #[must_use]
    pub fn as_touch_zone(&self) -> Option<&TouchZone> {
        match &self.kind {
            ItemKind::TouchZone(zone) => Some(zone),
            _ => None,
        }
    }

    /// Mutable zone if this is a touch zone.
    pub fn as_touch_zone_mut(&mut self) -> Option<&mut TouchZone> {
        match &mut self.kind {
            ItemKind::TouchZone(zone) => Some(zone),
            _ => None,
        }
    }

    /// The reference if this embeds a child drawing.
    #[must_use]
    pub fn as_insert_drawing(&self) -> Option<&InsertDrawing> {
        match &self.kind {
            ItemKind::InsertDrawing(insert) => Some(insert),
            _ => None,
        }
    }

    /// True for kinds that reach the render list.
    #[must_use]
    pub const fn is_renderable(&self) -> bool {
        matches!(
            self.kind,
            ItemKind::Rectangle { .. }
                | ItemKind::Line { .. }
                | ItemKind::Circle { .. }
                | ItemKind::Arc { .. }
                | ItemKind::Label { .. }
                | ItemKind::Value { .. }
                | ItemKind::TouchZone(_)
                | ItemKind::IndexMarker
        )
    }
}

/// Normalize an angle in degrees to (-360, 360), keeping its sign.
#[must_use]
pub fn normalize_degrees(angle: f32) -> f32 {
    angle % 360.0
}

const fn visible_by_default() -> bool {
    true
}

const fn one() -> f32 {
    1.0
}

const fn one_i64() -> i64 {
    1
}

const fn ninety() -> f32 {
    90.0
}

const fn two() -> i32 {
    2
}
