/// Drop-point → insertion index, independent of any rendering library.
use serde::{Deserialize, Serialize};

/// Vertical extent of a rendered card, in the same coordinate space as the
/// pointer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemBounds {
    pub id: String,
    pub top: f64,
    pub height: f64,
}

impl ItemBounds {
    pub fn new(id: impl Into<String>, top: f64, height: f64) -> Self {
        Self {
            id: id.into(),
            top,
            height,
        }
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height.max(0.0)
    }
}

/// Slot a card dropped at `pointer_y` should take among `bounds`.
///
/// Cards whose bottom edge is at or above the pointer count as "before" the
/// drop; a pointer anywhere over a card inserts before that card. The result
/// is in `[0, bounds.len()]`. Bounds may arrive in any order.
pub fn insertion_index(pointer_y: f64, bounds: &[ItemBounds]) -> usize {
    if pointer_y.is_nan() {
        return bounds.len();
    }
    bounds.iter().filter(|b| b.bottom() <= pointer_y).count()
}

/// Same as [`insertion_index`] but ignores the card being dragged, so the
/// result indexes the list with that card removed.
pub fn insertion_index_excluding(pointer_y: f64, bounds: &[ItemBounds], dragged_id: &str) -> usize {
    if pointer_y.is_nan() {
        return bounds.iter().filter(|b| b.id != dragged_id).count();
    }
    bounds
        .iter()
        .filter(|b| b.id != dragged_id && b.bottom() <= pointer_y)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column() -> Vec<ItemBounds> {
        vec![
            ItemBounds::new("A", 0.0, 40.0),
            ItemBounds::new("B", 50.0, 40.0),
            ItemBounds::new("C", 100.0, 40.0),
        ]
    }

    #[test]
    fn test_pointer_above_everything() {
        assert_eq!(insertion_index(-10.0, &column()), 0);
    }

    #[test]
    fn test_pointer_over_item_inserts_before_it() {
        let bounds = column();
        assert_eq!(insertion_index(10.0, &bounds), 0);
        assert_eq!(insertion_index(85.0, &bounds), 1);
        assert_eq!(insertion_index(100.0, &bounds), 2);
    }

    #[test]
    fn test_pointer_in_gap_and_below() {
        let bounds = column();
        assert_eq!(insertion_index(45.0, &bounds), 1);
        assert_eq!(insertion_index(40.0, &bounds), 1);
        assert_eq!(insertion_index(500.0, &bounds), 3);
    }

    #[test]
    fn test_empty_column() {
        assert_eq!(insertion_index(123.0, &[]), 0);
    }

    #[test]
    fn test_unsorted_bounds() {
        let mut bounds = column();
        bounds.reverse();
        assert_eq!(insertion_index(95.0, &bounds), 2);
    }

    #[test]
    fn test_excluding_dragged_card() {
        let bounds = column();
        // Pointer below C with A excluded: only B and C sit above it.
        assert_eq!(insertion_index_excluding(200.0, &bounds, "A"), 2);
        // Pointer over B with A excluded: nothing before B remains.
        assert_eq!(insertion_index_excluding(60.0, &bounds, "A"), 0);
    }

    #[test]
    fn test_nan_pointer_appends() {
        assert_eq!(insertion_index(f64::NAN, &column()), 3);
        assert_eq!(insertion_index_excluding(f64::NAN, &column(), "B"), 2);
    }
}
