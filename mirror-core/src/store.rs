//! Owned storage for every drawing in the tree.
//!
//! [`DrawingStore`] is the single owner of per-drawing state. It is passed
//! explicitly to the update pipeline, composition and the sync engine, and
//! does no I/O. Mutators on an unknown name create an empty placeholder so
//! that out-of-order nested content never fails.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::document::{DrawingData, DrawingPatch};
use crate::drawing::{Drawing, DrawingState};
use crate::item::{Item, TouchActionInput, Transform};

/// Copy of the parts of a drawing a touch-action preview may change.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemSnapshot {
    unindexed: Vec<Item>,
    indexed: BTreeMap<u32, Item>,
    transform: Transform,
}

impl ItemSnapshot {
    /// Saved transform at snapshot time.
    #[must_use]
    pub const fn transform(&self) -> Transform {
        self.transform
    }

    /// Number of indexed items at snapshot time.
    #[must_use]
    pub fn indexed_len(&self) -> usize {
        self.indexed.len()
    }
}

/// Every drawing keyed by name, plus the ordered list of known names.
///
/// The first registered name is the main drawing.
///
/// # Example
///
/// ```
/// use mirror_core::store::DrawingStore;
/// use mirror_core::Item;
///
/// let mut store = DrawingStore::with_main("main");
/// store.add_item("main", Item::rectangle(0.0, 0.0, 10.0, 10.0));
/// assert_eq!(store.get("main").map(|d| d.unindexed().len()), Some(1));
/// ```
#[derive(Debug, Clone, Default)]
pub struct DrawingStore {
    drawings: HashMap<String, Drawing>,
    order: Vec<String>,
}

impl DrawingStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store whose main drawing is `main`.
    #[must_use]
    pub fn with_main(main: &str) -> Self {
        let mut store = Self::new();
        store.set_main(main);
        store
    }

    /// Name of the main (root) drawing.
    #[must_use]
    pub fn main_name(&self) -> Option<&str> {
        self.order.first().map(String::as_str)
    }

    /// True if `name` is the main drawing.
    #[must_use]
    pub fn is_main(&self, name: &str) -> bool {
        self.main_name() == Some(name)
    }

    /// Register `name` as the main drawing, creating it if needed.
    pub fn set_main(&mut self, name: &str) {
        self.create_or_get(name);
        self.order.retain(|n| n != name);
        self.order.insert(0, name.to_string());
    }

    /// Drop everything and start over with `main` as the only drawing.
    pub fn reset(&mut self, main: &str) {
        self.drawings.clear();
        self.order.clear();
        self.set_main(main);
    }

    /// Known drawing names, main first.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.order
    }

    /// Number of known drawings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// True if no drawing is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// True if `name` is known.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.drawings.contains_key(name)
    }

    /// Get a drawing by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Drawing> {
        self.drawings.get(name)
    }

    /// Get a drawing, creating an empty placeholder if it is unknown.
    pub fn create_or_get(&mut self, name: &str) -> &mut Drawing {
        if !self.drawings.contains_key(name) {
            tracing::debug!("Creating placeholder drawing {name}");
            self.order.push(name.to_string());
        }
        self.drawings
            .entry(name.to_string())
            .or_insert_with(|| Drawing::new(name))
    }

    /// Replace the drawing header and mark the response as received.
    ///
    /// Sizes are clamped to 1..=255 and a blank version becomes "".
    pub fn set_full_data(&mut self, name: &str, data: DrawingData) {
        let drawing = self.create_or_get(name);
        drawing.data = Some(data.normalized());
        drawing.state = DrawingState::Loaded;
    }

    /// Stored header and last full document.
    #[must_use]
    pub fn get_drawing_data(&self, name: &str) -> Option<&DrawingData> {
        self.drawings.get(name).and_then(Drawing::data)
    }

    /// Merge the fields present in `patch`, preserving the others.
    ///
    /// Returns false if the drawing has no data to patch.
    pub fn apply_partial(&mut self, name: &str, patch: &DrawingPatch) -> bool {
        let Some(data) = self.create_or_get(name).data.as_mut() else {
            tracing::warn!("Cannot patch drawing {name}: no data received yet");
            return false;
        };
        if let Some(width) = patch.width {
            data.width = width;
        }
        if let Some(height) = patch.height {
            data.height = height;
        }
        if let Some(color) = patch.color {
            data.color = color;
        }
        if let Some(refresh) = patch.refresh {
            data.refresh = refresh;
        }
        if let Some(version) = &patch.version {
            data.version.clone_from(version);
        }
        let normalized = data.clone().normalized();
        *data = normalized;
        true
    }

    /// Add a renderable item, indexed if it carries a valid index.
    pub fn add_item(&mut self, name: &str, item: Item) {
        let drawing = self.create_or_get(name);
        match item.valid_index() {
            Some(idx) => {
                if drawing.indexed.insert(idx, item).is_some() {
                    tracing::debug!("Replaced indexed item {idx} in {name}");
                }
            }
            None => drawing.unindexed.push(item),
        }
    }

    /// Insert or replace the touch zone for the item's command.
    ///
    /// A replacement inherits the existing zone's transform and visibility
    /// and keeps its registration slot. Returns false for non-zones and
    /// blank commands.
    pub fn upsert_touch_zone(&mut self, name: &str, mut item: Item) -> bool {
        let Some(cmd) = item.as_touch_zone().map(|zone| zone.cmd.clone()) else {
            return false;
        };
        if cmd.trim().is_empty() {
            tracing::warn!("Ignoring touch zone with empty cmd in drawing {name}");
            return false;
        }
        let drawing = self.create_or_get(name);
        if let Some(existing) = drawing.touch_zone_mut(&cmd) {
            item.transform = existing.transform;
            item.visible = existing.visible;
            *existing = item;
        } else {
            if item.transform.is_none() {
                item.transform = Some(drawing.saved_transform);
            }
            drawing.touch_zones.push(item);
        }
        true
    }

    /// Append override items for `cmd`. The zone must already exist.
    pub fn append_touch_action(&mut self, name: &str, cmd: &str, items: &[Item]) -> bool {
        let drawing = self.create_or_get(name);
        if drawing.touch_zone(cmd).is_none() {
            tracing::warn!(
                "Touch action for cmd {cmd} in drawing {name} has no touch zone; it must follow its zone"
            );
            return false;
        }
        drawing
            .touch_actions
            .entry(cmd.to_string())
            .or_default()
            .extend(items.iter().cloned());
        true
    }

    /// Add the override items for `cmd` that `name` does not already hold.
    pub fn merge_touch_actions(&mut self, name: &str, cmd: &str, items: &[Item]) {
        let list = self
            .create_or_get(name)
            .touch_actions
            .entry(cmd.to_string())
            .or_default();
        for item in items {
            if !list.contains(item) {
                list.push(item.clone());
            }
        }
    }

    /// Store the text prompt for `cmd` and force its zone to `TOUCH`.
    ///
    /// The zone must exist; a `TOUCH_DISABLED` zone stays disabled.
    pub fn set_text_prompt(&mut self, name: &str, input: TouchActionInput) -> bool {
        let drawing = self.create_or_get(name);
        let Some(zone) = drawing
            .touch_zone_mut(&input.cmd)
            .and_then(Item::as_touch_zone_mut)
        else {
            tracing::warn!(
                "Touch action input for cmd {} in drawing {name} has no touch zone",
                input.cmd
            );
            return false;
        };
        if !zone.filter.is_touch() && !zone.filter.is_disabled() {
            tracing::debug!("Forcing zone {} to TOUCH for text input", zone.cmd);
            zone.filter = crate::item::TouchFilter::TOUCH;
        }
        drawing.text_prompts.insert(input.cmd.clone(), input);
        true
    }

    /// Transform saved at the end of the last applied response.
    #[must_use]
    pub fn saved_transform(&self, name: &str) -> Transform {
        self.drawings
            .get(name)
            .map_or(Transform::IDENTITY, Drawing::saved_transform)
    }

    /// Save the working transform for `name`.
    pub fn set_saved_transform(&mut self, name: &str, transform: Transform) {
        self.create_or_get(name).saved_transform = transform;
    }

    /// Record that `parent` inserted `name`.
    pub fn set_parent(&mut self, name: &str, parent: &str) {
        self.create_or_get(name).parent = Some(parent.to_string());
    }

    /// Drawings whose parent is `name`, in registration order.
    #[must_use]
    pub fn children_of(&self, name: &str) -> Vec<String> {
        self.order
            .iter()
            .filter(|child| {
                self.drawings
                    .get(child.as_str())
                    .and_then(Drawing::parent)
                    .is_some_and(|parent| parent == name)
            })
            .cloned()
            .collect()
    }

    /// Remove `name` and every drawing whose parent chain leads to it.
    ///
    /// The main drawing is never removed. Returns the removed names so the
    /// caller can purge caches and queued requests.
    pub fn remove_drawing(&mut self, name: &str) -> Vec<String> {
        if self.is_main(name) {
            tracing::warn!("Refusing to remove main drawing {name}");
            return Vec::new();
        }
        if !self.contains(name) {
            return Vec::new();
        }
        let mut removed = vec![name.to_string()];
        removed.extend(self.descendants(name));
        self.forget(&removed);
        removed
    }

    /// Remove every descendant of `name`, keeping `name` itself.
    pub fn remove_children(&mut self, name: &str) -> Vec<String> {
        let removed = self.descendants(name);
        self.forget(&removed);
        removed
    }

    fn descendants(&self, name: &str) -> Vec<String> {
        let mut seen: HashSet<String> = HashSet::from([name.to_string()]);
        let mut found = Vec::new();
        let mut pending = vec![name.to_string()];
        while let Some(current) = pending.pop() {
            for child in self.children_of(&current) {
                if seen.insert(child.clone()) {
                    found.push(child.clone());
                    pending.push(child);
                }
            }
        }
        found
    }

    fn forget(&mut self, names: &[String]) {
        for name in names {
            tracing::debug!("Removing drawing {name}");
            self.drawings.remove(name);
        }
        self.order.retain(|n| !names.contains(n));
    }

    /// Remove the indexed item at `idx`.
    pub fn erase_indexed(&mut self, name: &str, idx: u32) -> bool {
        let erased = self.create_or_get(name).indexed.remove(&idx).is_some();
        if !erased {
            tracing::warn!("Erase: no item with idx {idx} in drawing {name}");
        }
        erased
    }

    /// Show or hide the indexed item at `idx`.
    pub fn set_indexed_visible(&mut self, name: &str, idx: u32, visible: bool) -> bool {
        match self.create_or_get(name).indexed.get_mut(&idx) {
            Some(item) => {
                item.visible = visible;
                true
            }
            None => {
                tracing::warn!("No item with idx {idx} in drawing {name} to show or hide");
                false
            }
        }
    }

    /// Remove the zone, overrides and text prompt for `cmd`.
    pub fn erase_by_cmd(&mut self, name: &str, cmd: &str) -> bool {
        let drawing = self.create_or_get(name);
        let before = drawing.touch_zones.len();
        drawing
            .touch_zones
            .retain(|item| item.as_touch_zone().map(|zone| zone.cmd.as_str()) != Some(cmd));
        let zone_removed = drawing.touch_zones.len() != before;
        let actions_removed = drawing.touch_actions.remove(cmd).is_some();
        let prompt_removed = drawing.text_prompts.remove(cmd).is_some();
        zone_removed || actions_removed || prompt_removed
    }

    /// Show or hide the zone for `cmd`.
    pub fn set_zone_visible(&mut self, name: &str, cmd: &str, visible: bool) -> bool {
        match self.create_or_get(name).touch_zone_mut(cmd) {
            Some(zone) => {
                zone.visible = visible;
                true
            }
            None => false,
        }
    }

    /// Drop all collections of `name` ahead of a full replacement.
    pub fn clear_items(&mut self, name: &str) {
        self.create_or_get(name).clear_items();
    }

    /// Copy the items and transform a preview may change.
    #[must_use]
    pub fn snapshot(&self, name: &str) -> Option<ItemSnapshot> {
        self.drawings.get(name).map(|drawing| ItemSnapshot {
            unindexed: drawing.unindexed.clone(),
            indexed: drawing.indexed.clone(),
            transform: drawing.saved_transform,
        })
    }

    /// Put back a snapshot taken with [`Self::snapshot`].
    pub fn restore(&mut self, name: &str, snapshot: ItemSnapshot) {
        let drawing = self.create_or_get(name);
        drawing.unindexed = snapshot.unindexed;
        drawing.indexed = snapshot.indexed;
        drawing.saved_transform = snapshot.transform;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{InsertDrawing, TouchFilter, TouchZone};

    fn data(name: &str, width: u32) -> DrawingData {
        DrawingData {
            name: name.to_string(),
            width,
            height: 40,
            color: 3,
            refresh: 500,
            version: "v1".to_string(),
            items: Vec::new(),
        }
    }

    fn zone(cmd: &str) -> Item {
        Item::touch_zone(TouchZone::new(cmd, 0.0, 0.0, 10.0, 10.0))
    }

    #[test]
    fn test_with_main_registers_first() {
        let mut store = DrawingStore::with_main("main");
        store.create_or_get("child");
        assert_eq!(store.main_name(), Some("main"));
        assert_eq!(store.names(), ["main".to_string(), "child".to_string()]);
    }

    #[test]
    fn test_set_full_data_round_trip() {
        let mut store = DrawingStore::with_main("main");
        let d = data("main", 100);
        store.set_full_data("main", d.clone());
        assert_eq!(store.get_drawing_data("main"), Some(&d));
        assert!(store.get("main").expect("exists").has_response());
    }

    #[test]
    fn test_set_full_data_clamps() {
        let mut store = DrawingStore::new();
        let mut d = data("main", 400);
        d.version = "   ".to_string();
        store.set_full_data("main", d);
        let stored = store.get_drawing_data("main").expect("data");
        assert_eq!(stored.width, 255);
        assert_eq!(stored.version, "");
    }

    #[test]
    fn test_empty_patch_is_noop() {
        let mut store = DrawingStore::with_main("main");
        store.set_full_data("main", data("main", 100));
        let before = store.get_drawing_data("main").cloned();
        assert!(store.apply_partial("main", &DrawingPatch::new()));
        assert!(store.apply_partial("main", &DrawingPatch::new()));
        assert_eq!(store.get_drawing_data("main").cloned(), before);
    }

    #[test]
    fn test_apply_partial_merges_fields() {
        let mut store = DrawingStore::with_main("main");
        store.set_full_data("main", data("main", 100));
        let patch = DrawingPatch {
            refresh: Some(0),
            version: Some("v2".to_string()),
            ..DrawingPatch::default()
        };
        assert!(store.apply_partial("main", &patch));
        let stored = store.get_drawing_data("main").expect("data");
        assert_eq!(stored.refresh, 0);
        assert_eq!(stored.version, "v2");
        assert_eq!(stored.width, 100);
        assert_eq!(stored.color, 3);
    }

    #[test]
    fn test_apply_partial_without_data_fails() {
        let mut store = DrawingStore::new();
        assert!(!store.apply_partial("ghost", &DrawingPatch::new()));
        // The placeholder was still created.
        assert!(store.contains("ghost"));
    }

    #[test]
    fn test_add_item_routes_by_index() {
        let mut store = DrawingStore::with_main("main");
        store.add_item("main", Item::rectangle(0.0, 0.0, 1.0, 1.0));
        store.add_item("main", Item::rectangle(0.0, 0.0, 1.0, 1.0).with_index(0));
        store.add_item("main", Item::rectangle(0.0, 0.0, 2.0, 2.0).with_index(4));
        store.add_item("main", Item::rectangle(0.0, 0.0, 3.0, 3.0).with_index(4));
        let drawing = store.get("main").expect("exists");
        assert_eq!(drawing.unindexed().len(), 2);
        assert_eq!(drawing.indexed().len(), 1);
        assert_eq!(
            drawing.indexed()[&4],
            Item::rectangle(0.0, 0.0, 3.0, 3.0).with_index(4)
        );
    }

    #[test]
    fn test_unknown_name_auto_creates() {
        let mut store = DrawingStore::with_main("main");
        store.add_item("late", Item::rectangle(0.0, 0.0, 1.0, 1.0));
        assert!(store.contains("late"));
        assert!(!store.get("late").expect("exists").has_response());
    }

    #[test]
    fn test_upsert_touch_zone_inherits_transform_and_visibility() {
        let mut store = DrawingStore::with_main("main");
        let first = zone("go")
            .with_transform(Transform::new(5.0, 5.0, 2.0))
            .with_visible(false);
        assert!(store.upsert_touch_zone("main", first));
        store.upsert_touch_zone("main", zone("other"));

        let replacement = Item::touch_zone(
            TouchZone::new("go", 1.0, 1.0, 3.0, 3.0).with_filter(TouchFilter::DRAG),
        )
        .with_transform(Transform::IDENTITY);
        assert!(store.upsert_touch_zone("main", replacement));

        let drawing = store.get("main").expect("exists");
        assert_eq!(drawing.touch_zones().len(), 2);
        let go = &drawing.touch_zones()[0];
        assert_eq!(go.transform, Some(Transform::new(5.0, 5.0, 2.0)));
        assert!(!go.visible);
        assert_eq!(
            go.as_touch_zone().map(|z| z.filter),
            Some(TouchFilter::DRAG)
        );
    }

    #[test]
    fn test_upsert_rejects_blank_cmd() {
        let mut store = DrawingStore::with_main("main");
        assert!(!store.upsert_touch_zone("main", zone("  ")));
        assert!(store.get("main").expect("exists").touch_zones().is_empty());
    }

    #[test]
    fn test_append_touch_action_concatenates() {
        let mut store = DrawingStore::with_main("main");
        assert!(!store.append_touch_action("main", "go", &[Item::label(0.0, 0.0, "a")]));
        store.upsert_touch_zone("main", zone("go"));
        assert!(store.append_touch_action("main", "go", &[Item::label(0.0, 0.0, "a")]));
        assert!(store.append_touch_action("main", "go", &[Item::label(0.0, 0.0, "b")]));
        let drawing = store.get("main").expect("exists");
        assert_eq!(drawing.touch_actions_for("go").len(), 2);
    }

    #[test]
    fn test_merge_touch_actions_is_idempotent() {
        let mut store = DrawingStore::with_main("main");
        let items = [Item::label(0.0, 0.0, "a")];
        store.merge_touch_actions("main", "go", &items);
        store.merge_touch_actions("main", "go", &items);
        assert_eq!(store.get("main").expect("exists").touch_actions_for("go").len(), 1);
    }

    #[test]
    fn test_text_prompt_forces_touch_filter() {
        let mut store = DrawingStore::with_main("main");
        store.upsert_touch_zone(
            "main",
            Item::touch_zone(TouchZone::new("edit", 0.0, 0.0, 5.0, 5.0).with_filter(TouchFilter::DRAG)),
        );
        store.upsert_touch_zone(
            "main",
            Item::touch_zone(
                TouchZone::new("off", 0.0, 0.0, 5.0, 5.0).with_filter(TouchFilter::TOUCH_DISABLED),
            ),
        );
        let input = |cmd: &str| TouchActionInput {
            cmd: cmd.to_string(),
            prompt: "Name?".to_string(),
            text_idx: None,
            font_size: 0.0,
            color: 0,
            background_color: 0,
        };
        assert!(store.set_text_prompt("main", input("edit")));
        assert!(store.set_text_prompt("main", input("off")));
        assert!(!store.set_text_prompt("main", input("missing")));

        let drawing = store.get("main").expect("exists");
        let filter = |cmd: &str| {
            drawing
                .touch_zone(cmd)
                .and_then(Item::as_touch_zone)
                .map(|z| z.filter)
        };
        assert_eq!(filter("edit"), Some(TouchFilter::TOUCH));
        assert_eq!(filter("off"), Some(TouchFilter::TOUCH_DISABLED));
        assert!(drawing.text_prompt("edit").is_some());
    }

    #[test]
    fn test_remove_drawing_recurses() {
        let mut store = DrawingStore::with_main("main");
        store.set_parent("a", "main");
        store.set_parent("b", "a");
        store.set_parent("c", "b");
        store.set_parent("sibling", "main");

        let removed = store.remove_drawing("a");
        assert_eq!(removed.len(), 3);
        assert!(!store.contains("a"));
        assert!(!store.contains("b"));
        assert!(!store.contains("c"));
        assert!(store.contains("sibling"));
        assert_eq!(store.names(), ["main".to_string(), "sibling".to_string()]);
    }

    #[test]
    fn test_main_is_never_removed() {
        let mut store = DrawingStore::with_main("main");
        assert!(store.remove_drawing("main").is_empty());
        assert!(store.contains("main"));
    }

    #[test]
    fn test_remove_children_keeps_self() {
        let mut store = DrawingStore::with_main("main");
        store.set_parent("a", "main");
        store.set_parent("b", "a");
        let removed = store.remove_children("main");
        assert_eq!(removed.len(), 2);
        assert!(store.contains("main"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_erase_and_visibility_by_cmd() {
        let mut store = DrawingStore::with_main("main");
        store.upsert_touch_zone("main", zone("go"));
        store.append_touch_action("main", "go", &[Item::label(0.0, 0.0, "a")]);
        assert!(store.set_zone_visible("main", "go", false));
        assert!(!store.get("main").expect("exists").touch_zones()[0].visible);
        assert!(store.erase_by_cmd("main", "go"));
        let drawing = store.get("main").expect("exists");
        assert!(drawing.touch_zones().is_empty());
        assert!(drawing.touch_actions_for("go").is_empty());
        assert!(!store.set_zone_visible("main", "go", true));
    }

    #[test]
    fn test_inserted_drawing_items_stay_unindexed() {
        let mut store = DrawingStore::with_main("main");
        store.add_item("main", Item::insert_drawing(InsertDrawing::new("child")));
        assert_eq!(
            store.get("main").expect("exists").inserted_drawings(),
            vec!["child"]
        );
    }

    #[test]
    fn test_snapshot_and_restore() {
        let mut store = DrawingStore::with_main("main");
        store.add_item("main", Item::rectangle(0.0, 0.0, 1.0, 1.0).with_index(1));
        store.set_saved_transform("main", Transform::new(1.0, 2.0, 1.0));
        let snapshot = store.snapshot("main").expect("snapshot");

        store.add_item("main", Item::rectangle(0.0, 0.0, 1.0, 1.0).with_index(2));
        store.add_item("main", Item::label(0.0, 0.0, "temp"));
        store.set_saved_transform("main", Transform::IDENTITY);

        store.restore("main", snapshot);
        let drawing = store.get("main").expect("exists");
        assert_eq!(drawing.indexed().len(), 1);
        assert!(drawing.unindexed().is_empty());
        assert_eq!(drawing.saved_transform(), Transform::new(1.0, 2.0, 1.0));
    }
}
