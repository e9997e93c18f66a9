//! Per-drawing state.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::document::DrawingData;
use crate::item::{Item, Transform, TouchActionInput};

/// Lifecycle of a drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrawingState {
    /// Referenced but no response has arrived yet.
    #[default]
    Placeholder,
    /// A start or update response has been applied.
    Loaded,
}

/// A named canvas and the collections it owns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Drawing {
    pub(crate) name: String,
    pub(crate) data: Option<DrawingData>,
    pub(crate) parent: Option<String>,
    pub(crate) state: DrawingState,
    pub(crate) saved_transform: Transform,
    pub(crate) unindexed: Vec<Item>,
    pub(crate) indexed: BTreeMap<u32, Item>,
    /// Kept in first-registration order; replacing a zone keeps its slot.
    pub(crate) touch_zones: Vec<Item>,
    pub(crate) touch_actions: HashMap<String, Vec<Item>>,
    pub(crate) text_prompts: HashMap<String, TouchActionInput>,
}

impl Drawing {
    /// Create an empty placeholder.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Drawing name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Header and last full document, if any arrived.
    #[must_use]
    pub fn data(&self) -> Option<&DrawingData> {
        self.data.as_ref()
    }

    /// Name of the drawing that inserted this one.
    #[must_use]
    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> DrawingState {
        self.state
    }

    /// True once a response has been applied.
    #[must_use]
    pub fn has_response(&self) -> bool {
        self.state == DrawingState::Loaded
    }

    /// Transform in effect at the end of the last applied response.
    #[must_use]
    pub const fn saved_transform(&self) -> Transform {
        self.saved_transform
    }

    /// Unindexed items in append order.
    #[must_use]
    pub fn unindexed(&self) -> &[Item] {
        &self.unindexed
    }

    /// Indexed items by index.
    #[must_use]
    pub const fn indexed(&self) -> &BTreeMap<u32, Item> {
        &self.indexed
    }

    /// Touch zones in registration order.
    #[must_use]
    pub fn touch_zones(&self) -> &[Item] {
        &self.touch_zones
    }

    /// Zone registered for `cmd`.
    #[must_use]
    pub fn touch_zone(&self, cmd: &str) -> Option<&Item> {
        self.touch_zones
            .iter()
            .find(|item| item.as_touch_zone().is_some_and(|zone| zone.cmd == cmd))
    }

    pub(crate) fn touch_zone_mut(&mut self, cmd: &str) -> Option<&mut Item> {
        self.touch_zones
            .iter_mut()
            .find(|item| item.as_touch_zone().is_some_and(|zone| zone.cmd == cmd))
    }

    /// Touch-action overrides by command.
    #[must_use]
    pub const fn touch_actions(&self) -> &HashMap<String, Vec<Item>> {
        &self.touch_actions
    }

    /// Overrides for `cmd`, empty if none.
    #[must_use]
    pub fn touch_actions_for(&self, cmd: &str) -> &[Item] {
        self.touch_actions.get(cmd).map_or(&[][..], Vec::as_slice)
    }

    /// Text prompt for `cmd`.
    #[must_use]
    pub fn text_prompt(&self, cmd: &str) -> Option<&TouchActionInput> {
        self.text_prompts.get(cmd)
    }

    /// Names of drawings referenced by InsertDrawing items, in order, once each.
    #[must_use]
    pub fn inserted_drawings(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for insert in self.unindexed.iter().filter_map(Item::as_insert_drawing) {
            if !names.contains(&insert.drawing_name) {
                names.push(insert.drawing_name.clone());
            }
        }
        names
    }

    /// Drop every item, zone, override and prompt.
    pub(crate) fn clear_items(&mut self) {
        self.unindexed.clear();
        self.indexed.clear();
        self.touch_zones.clear();
        self.touch_actions.clear();
        self.text_prompts.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{InsertDrawing, TouchZone};

    #[test]
    fn test_new_is_placeholder() {
        let drawing = Drawing::new("child");
        assert_eq!(drawing.name(), "child");
        assert!(!drawing.has_response());
        assert!(drawing.data().is_none());
        assert_eq!(drawing.saved_transform(), Transform::IDENTITY);
    }

    #[test]
    fn test_inserted_drawings_deduplicates() {
        let mut drawing = Drawing::new("main");
        drawing
            .unindexed
            .push(Item::insert_drawing(InsertDrawing::new("a")));
        drawing.unindexed.push(Item::rectangle(0.0, 0.0, 1.0, 1.0));
        drawing
            .unindexed
            .push(Item::insert_drawing(InsertDrawing::new("b")));
        drawing
            .unindexed
            .push(Item::insert_drawing(InsertDrawing::new("a")));
        assert_eq!(drawing.inserted_drawings(), vec!["a", "b"]);
    }

    #[test]
    fn test_touch_zone_lookup() {
        let mut drawing = Drawing::new("main");
        drawing
            .touch_zones
            .push(Item::touch_zone(TouchZone::new("go", 0.0, 0.0, 5.0, 5.0)));
        assert!(drawing.touch_zone("go").is_some());
        assert!(drawing.touch_zone("stop").is_none());
        assert!(drawing.touch_actions_for("go").is_empty());
    }
}
