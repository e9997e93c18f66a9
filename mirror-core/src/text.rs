//! Display text for labels and values.

use crate::item::{Item, ItemKind};

/// Default number of decimals for a label's value.
const DEFAULT_DECIMALS: i32 = 2;

/// Format `value` rounded to `decimals` places.
///
/// Zero or negative `decimals` round to the left of the point, never
/// dropping every significant digit.
#[must_use]
#[allow(clippy::cast_possible_truncation)] // display values are far below i64::MAX
pub fn format_decimals(value: f64, decimals: i32) -> String {
    let negative = value < 0.0;
    let magnitude = value.abs();

    let digits = if decimals > 0 {
        let places = usize::try_from(decimals).unwrap_or(0);
        format!("{magnitude:.places$}")
    } else {
        let mut whole = magnitude.floor() as i64;
        if magnitude.fract() != 0.0 {
            whole = (magnitude + 0.5).floor() as i64;
        }
        if decimals == 0 {
            whole.to_string()
        } else {
            let mut divider: i64 = 1;
            let mut steps = 0;
            while steps < -decimals && divider < whole {
                divider *= 10;
                steps += 1;
            }
            if divider > whole {
                divider /= 10;
            }
            let divider = divider.max(1);
            let mut rounded = (whole / divider) * divider;
            if rounded != whole {
                rounded = ((whole + divider / 2) / divider) * divider;
            }
            rounded.to_string()
        }
    };

    if negative {
        format!("-{digits}")
    } else {
        digits
    }
}

impl Item {
    /// Text a label or value shows, `None` for other kinds.
    #[must_use]
    pub fn display_text(&self) -> Option<String> {
        match &self.kind {
            ItemKind::Label {
                text,
                value,
                units,
                decimals,
                ..
            } => Some(match value {
                Some(value) => format!(
                    "{text}{}{}",
                    format_decimals(f64::from(*value), decimals.unwrap_or(DEFAULT_DECIMALS)),
                    units.as_deref().unwrap_or_default()
                ),
                None => text.clone(),
            }),
            ItemKind::Value {
                text,
                int_value,
                min,
                max,
                display_min,
                display_max,
                decimals,
                units,
                ..
            } => {
                let scaled = scale_value(*int_value, *min, *max, *display_min, *display_max);
                Some(format!("{text}{}{units}", format_decimals(scaled, *decimals)))
            }
            _ => None,
        }
    }
}

/// Map a raw integer onto its display range. A zero range counts as 1.
#[allow(clippy::cast_precision_loss)] // raw device values fit comfortably in f64
fn scale_value(int_value: i64, min: i64, max: i64, display_min: f32, display_max: f32) -> f64 {
    let mut range = (max - min) as f64;
    if range == 0.0 {
        range = 1.0;
    }
    let span = f64::from(display_max) - f64::from(display_min);
    (int_value - min) as f64 * span / range + f64::from(display_min)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::Align;

    #[test]
    fn test_positive_decimals() {
        assert_eq!(format_decimals(1.23456, 2), "1.23");
        assert_eq!(format_decimals(-2.5, 1), "-2.5");
    }

    #[test]
    fn test_zero_decimals_rounds() {
        assert_eq!(format_decimals(2.4, 0), "2");
        assert_eq!(format_decimals(2.5, 0), "3");
        assert_eq!(format_decimals(7.0, 0), "7");
    }

    #[test]
    fn test_negative_decimals_round_left_of_point() {
        assert_eq!(format_decimals(1234.0, -2), "1200");
        assert_eq!(format_decimals(1250.0, -2), "1300");
        // Never strips every digit.
        assert_eq!(format_decimals(45.0, -3), "50");
    }

    #[test]
    fn test_negative_decimals_with_zero() {
        assert_eq!(format_decimals(0.0, -2), "0");
    }

    #[test]
    fn test_label_display_text() {
        let plain = Item::label(0.0, 0.0, "Temp");
        assert_eq!(plain.display_text().as_deref(), Some("Temp"));

        let with_value = Item::new(ItemKind::Label {
            x_offset: 0.0,
            y_offset: 0.0,
            text: "Temp ".to_string(),
            font_size: 0.0,
            bold: false,
            italic: false,
            underline: false,
            align: Align::Left,
            value: Some(21.456),
            units: Some("C".to_string()),
            decimals: None,
            color: 0,
        });
        assert_eq!(with_value.display_text().as_deref(), Some("Temp 21.46C"));
    }

    #[test]
    fn test_value_display_text() {
        let item = Item::new(ItemKind::Value {
            x_offset: 0.0,
            y_offset: 0.0,
            text: "Level ".to_string(),
            font_size: 0.0,
            bold: false,
            italic: false,
            underline: false,
            align: Align::Left,
            int_value: 512,
            min: 0,
            max: 1024,
            display_min: 0.0,
            display_max: 100.0,
            decimals: 1,
            units: "%".to_string(),
            color: 0,
        });
        assert_eq!(item.display_text().as_deref(), Some("Level 50.0%"));
    }

    #[test]
    fn test_value_zero_range() {
        let scaled = scale_value(5, 3, 3, 0.0, 1.0);
        assert!((scaled - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_non_text_has_no_display_text() {
        assert!(Item::rectangle(0.0, 0.0, 1.0, 1.0).display_text().is_none());
    }
}
