//! Touch activation helpers: command strings, sentinel substitution and
//! text prompts.

use serde::{Deserialize, Serialize};

use crate::drawing::Drawing;
use crate::item::{Item, TouchActionInput, TouchFilter};

/// Offset value replaced by the touched column.
pub const TOUCHED_COL: f32 = 65534.0;

/// Offset value replaced by the touched row.
pub const TOUCHED_ROW: f32 = 65532.0;

/// Identifier used until the device announces its own.
pub const DEFAULT_IDENTIFIER: &str = "pfodWeb";

/// Build the command sent when a zone activates.
///
/// `{identifier~cmd`col`row`type}`, with `~text` before the closing brace
/// when a text prompt was answered.
///
/// ```
/// use mirror_core::touch::activation_command;
/// use mirror_core::TouchFilter;
///
/// let cmd = activation_command("pfodWeb", "led", 3, 4, TouchFilter::DOWN, None);
/// assert_eq!(cmd, "{pfodWeb~led`3`4`1}");
/// ```
#[must_use]
pub fn activation_command(
    identifier: &str,
    cmd: &str,
    col: u32,
    row: u32,
    touch_type: TouchFilter,
    text: Option<&str>,
) -> String {
    let identifier = if identifier.is_empty() {
        DEFAULT_IDENTIFIER
    } else {
        identifier
    };
    let touch_type = touch_type.bits();
    match text {
        Some(text) => format!("{{{identifier}~{cmd}`{col}`{row}`{touch_type}~{text}}}"),
        None => format!("{{{identifier}~{cmd}`{col}`{row}`{touch_type}}}"),
    }
}

/// Copy `items` with the col/row sentinels in their offsets replaced.
#[must_use]
#[allow(clippy::cast_precision_loss)] // touch locations are small
pub fn substitute_sentinels(items: &[Item], col: u32, row: u32) -> Vec<Item> {
    let col = col as f32;
    let row = row as f32;
    items
        .iter()
        .cloned()
        .map(|mut item| {
            if let Some((x, y)) = item.kind.offsets_mut() {
                *x = resolve_sentinel(*x, col, row);
                *y = resolve_sentinel(*y, col, row);
            }
            item
        })
        .collect()
}

#[allow(clippy::float_cmp)] // sentinels are exact integers
fn resolve_sentinel(value: f32, col: f32, row: f32) -> f32 {
    if value == TOUCHED_COL {
        col
    } else if value == TOUCHED_ROW {
        row
    } else {
        value
    }
}

/// A text prompt the host UI should show.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptRequest {
    /// Drawing owning the zone.
    pub drawing: String,
    /// Zone command.
    pub cmd: String,
    /// Prompt text.
    pub prompt: String,
    /// Text the entry starts with.
    pub initial_text: String,
    /// Font size, 0 for the default.
    pub font_size: f32,
    /// Text color.
    pub color: u8,
    /// Background color.
    pub background_color: u8,
    /// Touched column.
    pub col: u32,
    /// Touched row.
    pub row: u32,
    /// Pointer phase that activated the zone.
    pub touch_type: TouchFilter,
}

impl PromptRequest {
    /// Build the prompt for `input` in `drawing`.
    ///
    /// The initial text is the display text of the label or value at
    /// `text_idx`, or empty.
    #[must_use]
    pub fn new(drawing: &Drawing, input: &TouchActionInput, col: u32, row: u32, touch_type: TouchFilter) -> Self {
        let initial_text = input
            .text_idx
            .and_then(|idx| drawing.indexed().get(&idx))
            .and_then(Item::display_text)
            .unwrap_or_default();
        Self {
            drawing: drawing.name().to_string(),
            cmd: input.cmd.clone(),
            prompt: input.prompt.clone(),
            initial_text,
            font_size: input.font_size,
            color: input.color,
            background_color: input.background_color,
            col,
            row,
            touch_type,
        }
    }

    /// Command to send once the user enters `text`.
    #[must_use]
    pub fn command(&self, identifier: &str, text: &str) -> String {
        activation_command(identifier, &self.cmd, self.col, self.row, self.touch_type, Some(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::ItemKind;
    use crate::store::DrawingStore;

    #[test]
    fn test_activation_command_format() {
        assert_eq!(
            activation_command("dev", "slider", 12, 0, TouchFilter::DRAG, None),
            "{dev~slider`12`0`2}"
        );
        assert_eq!(
            activation_command("", "name", 0, 0, TouchFilter::TOUCH, Some("bob")),
            "{pfodWeb~name`0`0`0~bob}"
        );
    }

    #[test]
    fn test_substitute_sentinels() {
        let items = vec![
            Item::rectangle(TOUCHED_COL, TOUCHED_ROW, 1.0, 1.0),
            Item::label(TOUCHED_ROW, TOUCHED_COL, "swap"),
            Item::rectangle(3.0, 4.0, 1.0, 1.0),
        ];
        let out = substitute_sentinels(&items, 7, 9);
        let offsets: Vec<(f32, f32)> = out
            .into_iter()
            .map(|mut item| {
                item.kind
                    .offsets_mut()
                    .map(|(x, y)| (*x, *y))
                    .expect("positioned")
            })
            .collect();
        assert_eq!(offsets, vec![(7.0, 9.0), (9.0, 7.0), (3.0, 4.0)]);
    }

    #[test]
    fn test_sentinels_left_alone_on_controls() {
        let items = vec![Item::new(ItemKind::PopZero)];
        assert_eq!(substitute_sentinels(&items, 1, 1), items);
    }

    #[test]
    fn test_prompt_initial_text_from_label() {
        let mut store = DrawingStore::with_main("main");
        store.add_item("main", Item::label(0.0, 0.0, "Alice").with_index(3));
        let input = TouchActionInput {
            cmd: "name".to_string(),
            prompt: "Your name".to_string(),
            text_idx: Some(3),
            font_size: 12.0,
            color: 1,
            background_color: 15,
        };
        let drawing = store.get("main").expect("main");
        let request = PromptRequest::new(drawing, &input, 1, 2, TouchFilter::TOUCH);
        assert_eq!(request.initial_text, "Alice");
        assert_eq!(request.command("dev", "Bob"), "{dev~name`1`2`0~Bob}");

        let missing = TouchActionInput {
            text_idx: Some(8),
            ..input
        };
        assert_eq!(PromptRequest::new(drawing, &missing, 0, 0, TouchFilter::TOUCH).initial_text, "");
    }
}
