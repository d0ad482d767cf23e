/**
 * Deck List and Card Summaries
 *
 * Summary shapes returned by the list/card fetchers and held in the
 * optimistic cache. Serialized camelCase to match the server's JSON.
 */
use serde::{Deserialize, Serialize};

/// A deck as it appears in one of the list views
///
/// The same summary shape is used for "my lists", "all lists" and
/// "available personal decks".
///
/// # Fields
/// * `id` - Deck identifier
/// * `title` - Display title
/// * `icon` - Optional icon chosen when the deck was added to "my lists"
/// * `is_owned` - True when the deck belongs exclusively to the current user.
///   A non-owned (public/shared) deck removed from "my lists" goes back to
///   "all lists"; an owned one does not.
/// * `card_count` - Number of cards in the deck
///
/// # Example
/// ```rust
/// use decksync::shared::deck::ListSummary;
///
/// let summary = ListSummary::new("deck-1", "Spanish verbs");
/// assert!(!summary.is_owned);
/// assert!(summary.icon.is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ListSummary {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default)]
    pub is_owned: bool,
    #[serde(default)]
    pub card_count: u32,
}

impl ListSummary {
    /// Create a non-owned summary with no icon and no cards
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            icon: None,
            is_owned: false,
            card_count: 0,
        }
    }

    /// Summary carrying only what an optimistic add knows about a deck
    pub fn placeholder(id: impl Into<String>, icon: Option<String>) -> Self {
        Self {
            icon,
            ..Self::new(id, String::new())
        }
    }

    /// Mark the deck as exclusively owned by the current user
    pub fn owned(mut self) -> Self {
        self.is_owned = true;
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }
}

/// A card inside a deck
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CardSummary {
    pub id: String,
    pub deck_id: String,
    #[serde(default)]
    pub front: String,
    #[serde(default)]
    pub back: String,
}

impl CardSummary {
    pub fn new(
        id: impl Into<String>,
        deck_id: impl Into<String>,
        front: impl Into<String>,
        back: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            deck_id: deck_id.into(),
            front: front.into(),
            back: back.into(),
        }
    }
}
