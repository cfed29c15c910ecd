use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A pipeline column. Boards order their stages by `ordinal` ascending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stage {
    pub key: String,
    pub label: String,
    pub ordinal: i64,
    /// Terminal "won" outcome (e.g. `ganho` on the leads board).
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_won: bool,
    /// Terminal "lost" outcome (e.g. `perdido` on the leads board).
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_lost: bool,
}

impl Stage {
    pub fn new(key: impl Into<String>, label: impl Into<String>, ordinal: i64) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            ordinal,
            is_won: false,
            is_lost: false,
        }
    }

    pub fn won(mut self) -> Self {
        self.is_won = true;
        self
    }

    pub fn lost(mut self) -> Self {
        self.is_lost = true;
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.is_won || self.is_lost
    }
}

/// A draggable record (lead or ticket).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    #[serde(default)]
    pub stage: String,
    #[serde(default)]
    pub position: i64,
    /// Display name shown on the card and in notifications.
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_cents: Option<i64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

impl Item {
    pub fn new(id: impl Into<String>, stage: impl Into<String>, position: i64) -> Self {
        Self {
            id: id.into(),
            stage: stage.into(),
            position,
            title: String::new(),
            value_cents: None,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_value_cents(mut self, value_cents: i64) -> Self {
        self.value_cents = Some(value_cents);
        self
    }

    /// Name used in user-facing messages; falls back to the id for untitled cards.
    pub fn display_name(&self) -> &str {
        if self.title.trim().is_empty() {
            &self.id
        } else {
            &self.title
        }
    }
}

/// Per-column header info: card count and summed deal value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageSummary {
    pub key: String,
    pub label: String,
    pub item_count: usize,
    pub total_value_cents: i64,
}

/// The two boards the console ships with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoardKind {
    #[default]
    Leads,
    Tickets,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_falls_back_to_id() {
        let item = Item::new("L1", "novo", 0);
        assert_eq!(item.display_name(), "L1");

        let item = item.with_title("Acme Ltda");
        assert_eq!(item.display_name(), "Acme Ltda");
    }

    #[test]
    fn test_item_deserializes_with_missing_optional_fields() {
        let item: Item = serde_json::from_str(r#"{"id":"T1","stage":"open"}"#).unwrap();
        assert_eq!(item.id, "T1");
        assert_eq!(item.position, 0);
        assert!(item.value_cents.is_none());
        assert!(item.attributes.is_empty());
    }

    #[test]
    fn test_stage_flags_skipped_when_false() {
        let json = serde_json::to_string(&Stage::new("novo", "Novo", 0)).unwrap();
        assert!(!json.contains("isWon"));

        let json = serde_json::to_string(&Stage::new("ganho", "Ganho", 5).won()).unwrap();
        assert!(json.contains("\"isWon\":true"));
    }

    #[test]
    fn test_board_kind_lowercase() {
        let kind: BoardKind = serde_json::from_str("\"tickets\"").unwrap();
        assert_eq!(kind, BoardKind::Tickets);
    }
}
