//! Optimistic touch-action preview.
//!
//! When a zone activates, its declared override items are applied to the
//! owning drawing right away, before the device has answered. A backup of
//! the drawing is kept so the preview can be discarded when the real
//! response arrives or the gesture ends. Previews never stack: a new one
//! restores the previous backup first.

use std::collections::HashMap;

use mirror_core::{apply_update_items, substitute_sentinels, DrawingStore, ItemSnapshot};

/// Pre-preview snapshots, one per drawing.
#[derive(Debug, Clone, Default)]
pub struct PreviewBackups {
    backups: HashMap<String, ItemSnapshot>,
}

impl PreviewBackups {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True if `drawing` is showing a preview.
    #[must_use]
    pub fn has_backup(&self, drawing: &str) -> bool {
        self.backups.contains_key(drawing)
    }

    /// Number of drawings showing a preview.
    #[must_use]
    pub fn len(&self) -> usize {
        self.backups.len()
    }

    /// True if no preview is showing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.backups.is_empty()
    }

    /// Put `drawing` back to its pre-preview state. Returns false if there
    /// was no backup.
    pub fn restore(&mut self, store: &mut DrawingStore, drawing: &str) -> bool {
        let Some(snapshot) = self.backups.remove(drawing) else {
            return false;
        };
        tracing::debug!(
            "Restoring {drawing} from preview backup ({} indexed items)",
            snapshot.indexed_len()
        );
        store.restore(drawing, snapshot);
        true
    }

    /// Restore every drawing. Returns the restored names, sorted.
    pub fn restore_all(&mut self, store: &mut DrawingStore) -> Vec<String> {
        let mut names: Vec<String> = self.backups.keys().cloned().collect();
        names.sort();
        for name in &names {
            self.restore(store, name);
        }
        names
    }

    /// Forget the backup of a drawing that no longer exists.
    pub fn discard(&mut self, drawing: &str) {
        self.backups.remove(drawing);
    }

    /// Show the touch actions of `cmd` in `drawing`, with the sentinels
    /// resolved to (`col`, `row`).
    ///
    /// Returns the child drawings the preview inserts that still need
    /// fetching, or `None`, leaving the restored drawing untouched, when the
    /// zone declares no actions.
    pub fn run(&mut self, store: &mut DrawingStore, drawing: &str, cmd: &str, col: u32, row: u32) -> Option<Vec<String>> {
        self.restore(store, drawing);

        let actions = match store.get(drawing) {
            Some(d) if !d.touch_actions_for(cmd).is_empty() => d.touch_actions_for(cmd).to_vec(),
            _ => return None,
        };
        let snapshot = store.snapshot(drawing)?;
        self.backups.insert(drawing.to_string(), snapshot);

        let items = substitute_sentinels(&actions, col, row);
        tracing::debug!("Previewing {} touch action(s) for {cmd} in {drawing}", items.len());
        let children = apply_update_items(store, drawing, &items);
        if !children.is_empty() {
            tracing::debug!("Preview for {cmd} inserts {} unloaded drawing(s)", children.len());
        }
        Some(children)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirror_core::{
        apply_response, ApplyContext, DrawingDocument, InsertDrawing, Item, ItemKind, Response,
        TouchZone, TOUCHED_COL,
    };

    fn store_with_actions() -> DrawingStore {
        let mut store = DrawingStore::with_main("main");
        let doc = DrawingDocument::new("main")
            .with_item(Item::label(0.0, 0.0, "off").with_index(1))
            .with_item(Item::touch_zone(TouchZone::new("led", 0.0, 0.0, 10.0, 10.0)))
            .with_item(Item::new(ItemKind::TouchAction {
                cmd: "led".to_string(),
                actions: vec![
                    Item::label(0.0, 0.0, "on").with_index(1),
                    Item::rectangle(TOUCHED_COL, 0.0, 1.0, 1.0).with_index(2),
                ],
            }));
        apply_response(&mut store, &Response::Start(doc), &ApplyContext::new("main")).expect("start");
        store
    }

    fn label_at(store: &DrawingStore, idx: u32) -> Option<String> {
        store
            .get("main")
            .and_then(|d| d.indexed().get(&idx))
            .and_then(Item::display_text)
    }

    #[test]
    fn test_run_and_restore() {
        let mut store = store_with_actions();
        let before = store.snapshot("main");
        let mut previews = PreviewBackups::new();

        let children = previews.run(&mut store, "main", "led", 3, 0).expect("actions");
        assert!(children.is_empty());
        assert!(previews.has_backup("main"));
        assert_eq!(label_at(&store, 1).as_deref(), Some("on"));

        assert!(previews.restore(&mut store, "main"));
        assert_eq!(store.snapshot("main"), before);
        assert!(!previews.restore(&mut store, "main"));
    }

    #[test]
    fn test_previews_do_not_stack() {
        let mut store = store_with_actions();
        let before = store.snapshot("main");
        let mut previews = PreviewBackups::new();

        previews.run(&mut store, "main", "led", 1, 0);
        previews.run(&mut store, "main", "led", 2, 0);
        assert_eq!(previews.len(), 1);

        previews.restore_all(&mut store);
        assert_eq!(store.snapshot("main"), before);
        assert!(previews.is_empty());
    }

    #[test]
    fn test_no_actions_is_a_no_op() {
        let mut store = store_with_actions();
        let before = store.snapshot("main");
        let mut previews = PreviewBackups::new();
        assert!(previews.run(&mut store, "main", "missing", 0, 0).is_none());
        assert!(previews.is_empty());
        assert_eq!(store.snapshot("main"), before);
    }

    #[test]
    fn test_preview_reports_inserted_drawings() {
        let mut store = DrawingStore::with_main("main");
        let doc = DrawingDocument::new("main").with_item(Item::new(ItemKind::TouchAction {
            cmd: "open".to_string(),
            actions: vec![Item::insert_drawing(InsertDrawing::new("popup"))],
        }));
        apply_response(&mut store, &Response::Start(doc), &ApplyContext::new("main")).expect("start");
        let mut previews = PreviewBackups::new();

        let children = previews.run(&mut store, "main", "open", 0, 0).expect("actions");
        assert_eq!(children, vec!["popup".to_string()]);
    }
}
