//! Flattening the drawing tree into one render list.
//!
//! ```text
//!   main (InsertDrawing root, identity, clip = main size)
//!    ├── items ............ appended in discovery order
//!    ├── InsertDrawing a ── visit(a) ── a's background, items, zones, indexed
//!    │                       └── InsertDrawing b ── visit(b)
//!    └── indexed items .... merged by number after children
//! ```
//!
//! Each pass starts with a fresh processed set, so every drawing is visited
//! at most once and cycles terminate.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::document::DrawingData;
use crate::item::{ClipRegion, Item, ItemKind, Transform};
use crate::store::DrawingStore;

/// A touch zone in the merged table.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneEntry {
    /// Zone with its absolute transform and clip.
    pub item: Item,
    /// Drawing that registered the zone first.
    pub drawing: String,
    /// Registration order across the pass.
    pub order: usize,
}

impl ZoneEntry {
    /// Command of the zone.
    #[must_use]
    pub fn cmd(&self) -> &str {
        self.item.as_touch_zone().map_or("", |zone| zone.cmd.as_str())
    }
}

/// Result of one composition pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Composition {
    /// Root drawing name.
    pub root: String,
    /// Root logical width and height.
    pub size: (f32, f32),
    /// Root background color.
    pub background: u8,
    /// Unindexed items in discovery order.
    pub items: Vec<Item>,
    /// Indexed items by number.
    pub indexed: BTreeMap<u32, Item>,
    /// Touch zones by command.
    pub touch_zones: BTreeMap<String, ZoneEntry>,
    /// Touch-action overrides of the root drawing, including merged ones.
    pub touch_actions: HashMap<String, Vec<Item>>,
    indexed_owner: HashMap<u32, String>,
}

impl Composition {
    fn empty(root: &str) -> Self {
        Self {
            root: root.to_string(),
            ..Self::default()
        }
    }

    /// True if nothing was composed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.indexed.is_empty() && self.touch_zones.is_empty()
    }

    /// Zones in registration order.
    #[must_use]
    pub fn zones_in_order(&self) -> Vec<&ZoneEntry> {
        let mut zones: Vec<&ZoneEntry> = self.touch_zones.values().collect();
        zones.sort_by_key(|entry| entry.order);
        zones
    }

    /// Drawing that owns the indexed item at `idx`.
    #[must_use]
    pub fn indexed_owner(&self, idx: u32) -> Option<&str> {
        self.indexed_owner.get(&idx).map(String::as_str)
    }

    /// Items in paint order: unindexed, indexed ascending, then zones.
    pub fn render_order(&self) -> impl Iterator<Item = &Item> {
        let zones = self.zones_in_order().into_iter().map(|entry| &entry.item);
        self.items.iter().chain(self.indexed.values()).chain(zones)
    }
}

/// Compose `root` and everything it inserts.
///
/// Overrides declared by nested drawings are merged into their parent's
/// table in the store, so the store is borrowed mutably.
pub fn compose(store: &mut DrawingStore, root: &str) -> Composition {
    let Some(data) = store.get_drawing_data(root) else {
        tracing::debug!("Nothing to compose: {root} has no data");
        return Composition::empty(root);
    };
    let (width, height) = data.logical_size();
    let mut out = Composition {
        root: root.to_string(),
        size: (width, height),
        background: data.color,
        ..Composition::default()
    };

    let clip = ClipRegion::new(0.0, 0.0, width, height);
    let mut processed: HashSet<String> = HashSet::from([root.to_string()]);
    let node = Node {
        name: root,
        parent: None,
        x_offset: 0.0,
        y_offset: 0.0,
    };
    visit(store, &node, Transform::IDENTITY, clip, &mut processed, &mut out);

    if let Some(drawing) = store.get(root) {
        out.touch_actions.clone_from(drawing.touch_actions());
    }
    tracing::debug!(
        "Composed {root}: {} items, {} indexed, {} zones",
        out.items.len(),
        out.indexed.len(),
        out.touch_zones.len()
    );
    out
}

struct Node<'a> {
    name: &'a str,
    parent: Option<&'a str>,
    x_offset: f32,
    y_offset: f32,
}

fn visit(
    store: &mut DrawingStore,
    node: &Node<'_>,
    parent_transform: Transform,
    clip: ClipRegion,
    processed: &mut HashSet<String>,
    out: &mut Composition,
) {
    let name = node.name;
    let Some(drawing) = store.get(name).filter(|d| d.has_response()) else {
        tracing::debug!("Skipping {name}: no response yet");
        return;
    };
    let Some(data) = drawing.data() else {
        return;
    };

    let (width, _) = data.logical_size();
    let scale = parent_transform.scale * width / clip.width;
    let transform = Transform::new(
        parent_transform.x - node.x_offset * scale,
        parent_transform.y - node.y_offset * scale,
        scale,
    );

    if node.parent.is_some() {
        let footprint = Transform::new(parent_transform.x, parent_transform.y, scale);
        out.items.push(background(data, footprint, clip));
    }

    for zone in drawing.touch_zones() {
        merge_zone(out, name, zone, transform, clip);
    }

    let actions: Vec<(String, Vec<Item>)> = drawing
        .touch_actions()
        .iter()
        .map(|(cmd, items)| (cmd.clone(), items.clone()))
        .collect();
    let unindexed = drawing.unindexed().to_vec();
    let indexed: Vec<(u32, Item)> = drawing
        .indexed()
        .iter()
        .map(|(idx, item)| (*idx, item.clone()))
        .collect();

    if let Some(parent) = node.parent {
        for (cmd, items) in &actions {
            store.merge_touch_actions(parent, cmd, items);
        }
    }

    for item in unindexed {
        if let Some(insert) = item.as_insert_drawing() {
            let target = insert.drawing_name.as_str();
            if !processed.insert(target.to_string()) {
                tracing::debug!("Skipping {target} in {name}: already composed this pass");
                continue;
            }
            let child = Node {
                name: target,
                parent: Some(name),
                x_offset: insert.x_offset,
                y_offset: insert.y_offset,
            };
            let child_parent = item.transform_or_identity().compose(transform);
            visit(store, &child, child_parent, clip, processed, out);
        } else if item.is_renderable() {
            let absolute = item.transform_or_identity().compose(transform);
            out.items.push(item.with_transform(absolute).with_clip(clip));
        }
    }

    for (idx, item) in indexed {
        let absolute = item.transform_or_identity().compose(transform);
        match out.indexed.entry(idx) {
            Entry::Occupied(mut slot) => {
                let owner = out.indexed_owner.get(&idx).map_or("", String::as_str);
                if owner != name {
                    tracing::warn!(
                        "Index {idx} used by both {owner} and {name}; keeping the first position"
                    );
                }
                let kept = slot.get().clone();
                let mut merged = item;
                merged.transform = kept.transform;
                merged.clip = kept.clip;
                slot.insert(merged);
            }
            Entry::Vacant(slot) => {
                slot.insert(item.with_transform(absolute).with_clip(clip));
                out.indexed_owner.insert(idx, name.to_string());
            }
        }
    }
}

/// Filled rectangle covering an inserted drawing in its background color.
/// Insert offsets move the content only, so `footprint` carries no offset.
fn background(data: &DrawingData, transform: Transform, clip: ClipRegion) -> Item {
    let (width, height) = data.logical_size();
    Item::new(ItemKind::Rectangle {
        x_offset: 0.0,
        y_offset: 0.0,
        x_size: width,
        y_size: height,
        filled: true,
        rounded: false,
        color: data.color,
    })
    .with_transform(transform)
    .with_clip(clip)
}

fn merge_zone(out: &mut Composition, name: &str, zone: &Item, transform: Transform, clip: ClipRegion) {
    let Some(cmd) = zone.as_touch_zone().map(|z| z.cmd.clone()) else {
        return;
    };
    let order = out.touch_zones.len();
    match out.touch_zones.entry(cmd.clone()) {
        Entry::Occupied(mut slot) => {
            let entry = slot.get_mut();
            if entry.drawing != name {
                tracing::warn!(
                    "Touch zone {cmd} registered by both {} and {name}; keeping the first position",
                    entry.drawing
                );
            }
            let mut merged = zone.clone();
            merged.transform = entry.item.transform;
            merged.clip = entry.item.clip;
            entry.item = merged;
        }
        Entry::Vacant(slot) => {
            let absolute = zone.transform_or_identity().compose(transform);
            slot.insert(ZoneEntry {
                item: zone.clone().with_transform(absolute).with_clip(clip),
                drawing: name.to_string(),
                order,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apply::{apply_response, ApplyContext};
    use crate::document::{DrawingDocument, Response};
    use crate::item::{InsertDrawing, TouchZone};

    fn load(store: &mut DrawingStore, doc: DrawingDocument) {
        let name = doc.name.clone();
        apply_response(store, &Response::Start(doc), &ApplyContext::new(name)).expect("start");
    }

    #[test]
    fn test_compose_unknown_root_is_empty() {
        let mut store = DrawingStore::new();
        assert!(compose(&mut store, "main").is_empty());
    }

    #[test]
    fn test_nested_scale_and_offset() {
        let mut store = DrawingStore::with_main("A");
        load(
            &mut store,
            DrawingDocument::new("A")
                .with_size(100, 100)
                .with_item(Item::insert_drawing(InsertDrawing::new("B").with_offset(10.0, 10.0))),
        );
        load(
            &mut store,
            DrawingDocument::new("B")
                .with_size(50, 50)
                .with_item(Item::rectangle(0.0, 0.0, 5.0, 5.0)),
        );

        let composition = compose(&mut store, "A");
        assert_eq!(composition.items.len(), 2, "background then rectangle");
        let t = composition.items[1].transform.expect("transform");
        assert!((t.scale - 0.5).abs() < f32::EPSILON);
        assert!((t.x + 5.0).abs() < f32::EPSILON);
        assert!((t.y + 5.0).abs() < f32::EPSILON);
        assert_eq!(
            composition.items[1].clip,
            Some(ClipRegion::new(0.0, 0.0, 100.0, 100.0))
        );
    }

    #[test]
    fn test_missing_child_is_omitted() {
        let mut store = DrawingStore::with_main("A");
        load(
            &mut store,
            DrawingDocument::new("A")
                .with_item(Item::rectangle(0.0, 0.0, 1.0, 1.0))
                .with_item(Item::insert_drawing(InsertDrawing::new("B")))
                .with_item(Item::rectangle(1.0, 1.0, 1.0, 1.0)),
        );
        let composition = compose(&mut store, "A");
        assert_eq!(composition.items.len(), 2);
    }

    #[test]
    fn test_order_is_depth_first() {
        let mut store = DrawingStore::with_main("A");
        load(
            &mut store,
            DrawingDocument::new("A")
                .with_item(Item::label(0.0, 0.0, "a1"))
                .with_item(Item::insert_drawing(InsertDrawing::new("B")))
                .with_item(Item::label(0.0, 0.0, "a2")),
        );
        load(
            &mut store,
            DrawingDocument::new("B").with_item(Item::label(0.0, 0.0, "b1")),
        );
        let texts: Vec<String> = compose(&mut store, "A")
            .items
            .iter()
            .filter_map(Item::display_text)
            .collect();
        assert_eq!(texts, vec!["a1", "b1", "a2"]);
    }

    #[test]
    fn test_duplicate_insert_composed_once() {
        let mut store = DrawingStore::with_main("A");
        load(
            &mut store,
            DrawingDocument::new("A")
                .with_item(Item::insert_drawing(InsertDrawing::new("B")))
                .with_item(Item::insert_drawing(InsertDrawing::new("B"))),
        );
        load(
            &mut store,
            DrawingDocument::new("B").with_item(Item::label(0.0, 0.0, "b")),
        );
        // One background and one label
        assert_eq!(compose(&mut store, "A").items.len(), 2);
    }

    #[test]
    fn test_zone_collision_first_writer_keeps_geometry() {
        let mut store = DrawingStore::with_main("A");
        load(
            &mut store,
            DrawingDocument::new("A")
                .with_size(100, 100)
                .with_item(Item::touch_zone(TouchZone::new("go", 1.0, 1.0, 5.0, 5.0)))
                .with_item(Item::insert_drawing(InsertDrawing::new("B").with_offset(20.0, 0.0))),
        );
        load(
            &mut store,
            DrawingDocument::new("B")
                .with_size(100, 100)
                .with_item(Item::touch_zone(TouchZone::new("go", 9.0, 9.0, 2.0, 2.0))),
        );
        let composition = compose(&mut store, "A");
        let entry = &composition.touch_zones["go"];
        assert_eq!(entry.drawing, "A");
        assert_eq!(entry.item.transform, Some(Transform::IDENTITY));
        assert_eq!(
            entry.item.as_touch_zone().map(|z| z.x_offset),
            Some(9.0)
        );
    }

    #[test]
    fn test_indexed_collision_keeps_first_transform() {
        let mut store = DrawingStore::with_main("A");
        load(
            &mut store,
            DrawingDocument::new("A")
                .with_size(100, 100)
                .with_item(Item::insert_drawing(InsertDrawing::new("B").with_offset(10.0, 0.0)))
                .with_item(Item::label(0.0, 0.0, "from A").with_index(1)),
        );
        load(
            &mut store,
            DrawingDocument::new("B")
                .with_size(100, 100)
                .with_item(Item::label(0.0, 0.0, "from B").with_index(1)),
        );
        let composition = compose(&mut store, "A");
        let item = &composition.indexed[&1];
        assert_eq!(item.display_text().as_deref(), Some("from A"));
        assert_eq!(item.transform, Some(Transform::new(-10.0, 0.0, 1.0)));
        assert_eq!(composition.indexed_owner(1), Some("B"));
    }

    #[test]
    fn test_child_touch_actions_merge_into_parent() {
        let mut store = DrawingStore::with_main("A");
        load(
            &mut store,
            DrawingDocument::new("A").with_item(Item::insert_drawing(InsertDrawing::new("B"))),
        );
        load(
            &mut store,
            DrawingDocument::new("B")
                .with_item(Item::touch_zone(TouchZone::new("go", 0.0, 0.0, 5.0, 5.0)))
                .with_item(Item::new(crate::item::ItemKind::TouchAction {
                    cmd: "go".to_string(),
                    actions: vec![Item::label(0.0, 0.0, "pressed")],
                })),
        );
        let first = compose(&mut store, "A");
        assert_eq!(first.touch_actions.get("go").map(Vec::len), Some(1));
        let second = compose(&mut store, "A");
        assert_eq!(second.touch_actions.get("go").map(Vec::len), Some(1));
    }

    #[test]
    fn test_render_order_puts_zones_last() {
        let mut store = DrawingStore::with_main("A");
        load(
            &mut store,
            DrawingDocument::new("A")
                .with_item(Item::touch_zone(TouchZone::new("go", 0.0, 0.0, 5.0, 5.0)))
                .with_item(Item::label(0.0, 0.0, "two").with_index(2))
                .with_item(Item::label(0.0, 0.0, "one").with_index(1))
                .with_item(Item::label(0.0, 0.0, "plain")),
        );
        let composition = compose(&mut store, "A");
        let order: Vec<&str> = composition
            .render_order()
            .map(|item| item.kind.type_name())
            .collect();
        assert_eq!(order, vec!["label", "label", "label", "touch_zone"]);
        let labels: Vec<String> = composition.render_order().filter_map(Item::display_text).collect();
        assert_eq!(labels, vec!["plain", "one", "two"]);
    }
}
