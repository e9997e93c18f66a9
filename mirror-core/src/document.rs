//! Decoded documents exchanged with the remote device.
//!
//! The wire decoder is external; these types are what it produces. The
//! HTTP transport carries them as JSON.

use serde::{Deserialize, Serialize};

use crate::item::Item;

/// Logical width/height used when a document does not give one.
pub const DEFAULT_DRAWING_SIZE: u32 = 50;

/// Largest logical width or height.
pub const MAX_DRAWING_SIZE: u32 = 255;

/// Drawing payload of a `start` or `update` response.
///
/// Every header field is optional; what a missing field means depends on
/// whether the document starts or updates a drawing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DrawingDocument {
    /// Drawing name. Empty means "the drawing that was requested".
    #[serde(default)]
    pub name: String,
    /// Logical width.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<i64>,
    /// Logical height.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<i64>,
    /// Background color index.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<i64>,
    /// Refresh interval in ms. 0 disables periodic refresh.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh: Option<u64>,
    /// Version token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Items in document order.
    #[serde(default)]
    pub items: Vec<Item>,
}

impl DrawingDocument {
    /// Create an empty document for `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the logical size.
    #[must_use]
    pub fn with_size(mut self, width: i64, height: i64) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    /// Set the background color.
    #[must_use]
    pub fn with_color(mut self, color: i64) -> Self {
        self.color = Some(color);
        self
    }

    /// Set the refresh interval.
    #[must_use]
    pub fn with_refresh(mut self, refresh_ms: u64) -> Self {
        self.refresh = Some(refresh_ms);
        self
    }

    /// Set the version token.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Append an item.
    #[must_use]
    pub fn with_item(mut self, item: Item) -> Self {
        self.items.push(item);
        self
    }
}

/// Error reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceErrorKind {
    /// The requested drawing does not exist.
    DrawingNotFound,
    /// Anything else.
    Other,
}

/// A decoded response to one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Response {
    /// Answer to the startup menu request.
    Menu {
        /// Main drawing name. Empty keeps the requested one.
        #[serde(default)]
        drawing_name: String,
        /// Identifier used as the prefix of touch commands.
        #[serde(default)]
        identifier: String,
        /// Version the device currently holds for the drawing.
        #[serde(default)]
        version: Option<String>,
    },
    /// Full replacement of a drawing.
    Start(DrawingDocument),
    /// Incremental change to a drawing.
    Update(DrawingDocument),
    /// Nothing to apply (empty command).
    Empty,
    /// The device reported an error.
    Error {
        /// What went wrong.
        kind: DeviceErrorKind,
        /// Human readable message.
        #[serde(default)]
        message: String,
    },
}

/// Normalized header and items of a stored drawing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawingData {
    /// Drawing name.
    pub name: String,
    /// Logical width, 1..=255.
    pub width: u32,
    /// Logical height, 1..=255.
    pub height: u32,
    /// Background color index.
    pub color: u8,
    /// Refresh interval in ms.
    pub refresh: u64,
    /// Version token, "" for none.
    pub version: String,
    /// Items of the last full document.
    #[serde(default)]
    pub items: Vec<Item>,
}

impl DrawingData {
    /// Build normalized data from a `start` document.
    ///
    /// Sizes default to 50 and are clamped to 1..=255, out-of-range colors
    /// become 0, a blank version becomes "".
    #[must_use]
    pub fn from_document(name: impl Into<String>, doc: &DrawingDocument) -> Self {
        Self {
            name: name.into(),
            width: clamp_size(doc.width),
            height: clamp_size(doc.height),
            color: clamp_color(doc.color),
            refresh: doc.refresh.unwrap_or(0),
            version: normalize_version(doc.version.as_deref()),
            items: doc.items.clone(),
        }
    }

    /// Logical width and height for geometry.
    #[must_use]
    #[allow(clippy::cast_precision_loss)] // sizes are at most 255
    pub fn logical_size(&self) -> (f32, f32) {
        (self.width as f32, self.height as f32)
    }

    /// Re-apply the range rules to already stored data.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.width = clamp_size(Some(i64::from(self.width)));
        self.height = clamp_size(Some(i64::from(self.height)));
        self.version = normalize_version(Some(&self.version));
        self
    }
}

/// A partial change to a drawing header. `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawingPatch {
    /// New width.
    #[serde(default)]
    pub width: Option<u32>,
    /// New height.
    #[serde(default)]
    pub height: Option<u32>,
    /// New background color.
    #[serde(default)]
    pub color: Option<u8>,
    /// New refresh interval.
    #[serde(default)]
    pub refresh: Option<u64>,
    /// New version token.
    #[serde(default)]
    pub version: Option<String>,
}

impl DrawingPatch {
    /// Patch that changes nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True if applying it would change nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Clamp a logical size, treating missing and zero as the default.
#[must_use]
pub fn clamp_size(size: Option<i64>) -> u32 {
    match size {
        None | Some(0) => DEFAULT_DRAWING_SIZE,
        Some(v) => u32::try_from(v.clamp(1, i64::from(MAX_DRAWING_SIZE)))
            .unwrap_or(DEFAULT_DRAWING_SIZE),
    }
}

/// Colors outside 0..=255 become 0.
#[must_use]
pub fn clamp_color(color: Option<i64>) -> u8 {
    color.and_then(|c| u8::try_from(c).ok()).unwrap_or(0)
}

/// Blank or missing versions become "".
#[must_use]
pub fn normalize_version(version: Option<&str>) -> String {
    match version {
        Some(v) if !v.trim().is_empty() => v.to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_size() {
        assert_eq!(clamp_size(None), 50);
        assert_eq!(clamp_size(Some(0)), 50);
        assert_eq!(clamp_size(Some(-4)), 1);
        assert_eq!(clamp_size(Some(300)), 255);
        assert_eq!(clamp_size(Some(100)), 100);
    }

    #[test]
    fn test_clamp_color() {
        assert_eq!(clamp_color(Some(12)), 12);
        assert_eq!(clamp_color(Some(256)), 0);
        assert_eq!(clamp_color(Some(-1)), 0);
        assert_eq!(clamp_color(None), 0);
    }

    #[test]
    fn test_normalize_version() {
        assert_eq!(normalize_version(Some("  ")), "");
        assert_eq!(normalize_version(None), "");
        assert_eq!(normalize_version(Some("v3")), "v3");
    }

    #[test]
    fn test_from_document_defaults() {
        let doc = DrawingDocument::new("main");
        let data = DrawingData::from_document("main", &doc);
        assert_eq!(data.width, 50);
        assert_eq!(data.height, 50);
        assert_eq!(data.color, 0);
        assert_eq!(data.refresh, 0);
        assert_eq!(data.version, "");
    }

    #[test]
    fn test_response_json_shape() {
        let response = Response::Start(DrawingDocument::new("main").with_size(100, 80));
        let json = serde_json::to_string(&response).expect("serialize");
        assert!(json.contains("\"type\":\"start\""));
        let back: Response = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, response);
    }

    #[test]
    fn test_error_response_parses() {
        let json = r#"{"type":"error","data":{"kind":"drawing_not_found","message":"gone"}}"#;
        let response: Response = serde_json::from_str(json).expect("deserialize");
        assert_eq!(
            response,
            Response::Error {
                kind: DeviceErrorKind::DrawingNotFound,
                message: "gone".to_string()
            }
        );
    }

    #[test]
    fn test_empty_patch() {
        assert!(DrawingPatch::new().is_empty());
        let patch = DrawingPatch {
            refresh: Some(100),
            ..DrawingPatch::default()
        };
        assert!(!patch.is_empty());
    }
}
