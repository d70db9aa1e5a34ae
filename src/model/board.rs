use chrono::{DateTime, NaiveDate, Utc};
use indexmap::IndexMap;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::new_id;

pub type BoardId = String;
pub type ColumnId = String;
pub type CardId = String;

pub const LEGACY_BOARD_ID: &str = "board-main";
pub const LEGACY_BOARD_TITLE: &str = "Main Board";
pub const DEFAULT_BOARD_TITLE: &str = "Work Board";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct KanbanDocument {
    pub boards: IndexMap<BoardId, Board>,
    #[serde(default)]
    pub active_board_id: Option<BoardId>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    pub id: BoardId,
    pub title: String,
    #[serde(default)]
    pub columns: IndexMap<ColumnId, Vec<Card>>,
    #[serde(default)]
    pub column_order: Vec<ColumnId>,
    #[serde(default)]
    pub column_titles: IndexMap<ColumnId, String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: CardId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, with = "super::optional_date")]
    pub due_date: Option<NaiveDate>,
    /// User-facing label such as `TASK-42`.
    #[serde(default)]
    pub card_id: String,
    /// Filename inside the images folder.
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub todos: Vec<Todo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Tag {
    pub text: String,
    pub color: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Todo {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => Err(format!("unknown priority: {}", other)),
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        };
        f.write_str(label)
    }
}

/// Field-wise update for a card. `None` leaves a field untouched; the
/// nested options on nullable fields distinguish "clear" from "keep".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CardPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<Tag>>,
    pub assigned_to: Option<Option<String>>,
    pub priority: Option<Priority>,
    pub due_date: Option<Option<NaiveDate>>,
    pub card_id: Option<String>,
    pub image: Option<Option<String>>,
    pub todos: Option<Vec<Todo>>,
}

impl CardPatch {
    pub fn is_empty(&self) -> bool {
        *self == CardPatch::default()
    }

    fn apply(&self, card: &mut Card) {
        if let Some(t) = &self.title {
            card.title = t.clone();
        }
        if let Some(d) = &self.description {
            card.description = d.clone();
        }
        if let Some(tags) = &self.tags {
            card.tags = tags.clone();
        }
        if let Some(a) = &self.assigned_to {
            card.assigned_to = a.clone();
        }
        if let Some(p) = self.priority {
            card.priority = p;
        }
        if let Some(d) = self.due_date {
            card.due_date = d;
        }
        if let Some(c) = &self.card_id {
            card.card_id = c.clone();
        }
        if let Some(i) = &self.image {
            card.image = i.clone();
        }
        if let Some(todos) = &self.todos {
            card.todos = todos.clone();
        }
    }
}

impl Card {
    pub fn new(title: impl Into<String>) -> Self {
        let label: u32 = rand::thread_rng().gen_range(0..1000);
        Card {
            id: new_id("card"),
            title: title.into(),
            description: String::new(),
            tags: Vec::new(),
            assigned_to: None,
            priority: Priority::Medium,
            due_date: None,
            card_id: format!("TASK-{}", label),
            image: None,
            todos: Vec::new(),
            created_at: Some(Utc::now()),
        }
    }

    /// Tags are unique by text; returns false for a duplicate.
    pub fn add_tag(&mut self, text: &str, color: &str) -> bool {
        let text = text.trim();
        if text.is_empty() || self.tags.iter().any(|t| t.text == text) {
            return false;
        }
        self.tags.push(Tag {
            text: text.to_string(),
            color: color.to_string(),
        });
        true
    }

    pub fn remove_tag(&mut self, text: &str) -> bool {
        let before = self.tags.len();
        self.tags.retain(|t| t.text != text);
        self.tags.len() != before
    }

    pub fn add_todo(&mut self, text: &str) -> Option<String> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let id = new_id("todo");
        self.todos.push(Todo {
            id: id.clone(),
            text: text.to_string(),
            completed: false,
        });
        Some(id)
    }

    pub fn toggle_todo(&mut self, todo_id: &str) -> bool {
        match self.todos.iter_mut().find(|t| t.id == todo_id) {
            Some(todo) => {
                todo.completed = !todo.completed;
                true
            }
            None => false,
        }
    }

    pub fn remove_todo(&mut self, todo_id: &str) -> bool {
        let before = self.todos.len();
        self.todos.retain(|t| t.id != todo_id);
        self.todos.len() != before
    }

    /// `(completed, total)` for the checklist.
    pub fn progress(&self) -> (usize, usize) {
        let done = self.todos.iter().filter(|t| t.completed).count();
        (done, self.todos.len())
    }
}

/// Turns a column title into its id: lowercase, whitespace runs become `-`.
pub fn column_slug(title: &str) -> String {
    title
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

fn default_column_title(id: &str) -> Option<&'static str> {
    match id {
        "todo" => Some("To Do"),
        "in-progress" => Some("In Progress"),
        "review" => Some("In Review"),
        "done" => Some("Done"),
        _ => None,
    }
}

impl Board {
    pub fn with_columns(id: impl Into<String>, title: impl Into<String>, columns: &[(&str, &str)]) -> Self {
        let mut board = Board {
            id: id.into(),
            title: title.into(),
            columns: IndexMap::new(),
            column_order: Vec::new(),
            column_titles: IndexMap::new(),
        };
        for (col_id, col_title) in columns {
            board.columns.insert(col_id.to_string(), Vec::new());
            board.column_order.push(col_id.to_string());
            board.column_titles.insert(col_id.to_string(), col_title.to_string());
        }
        board
    }

    /// Re-establishes the ordering invariant after loading: every ordered id
    /// has a bucket, and buckets missing from the order are appended to it.
    pub fn repair(&mut self) {
        for id in &self.column_order {
            if !self.columns.contains_key(id) {
                self.columns.insert(id.clone(), Vec::new());
            }
        }
        let missing: Vec<ColumnId> = self
            .columns
            .keys()
            .filter(|k| !self.column_order.contains(*k))
            .cloned()
            .collect();
        self.column_order.extend(missing);
    }

    /// Columns in display order.
    pub fn ordered_columns(&self) -> impl Iterator<Item = (&ColumnId, &[Card])> {
        self.column_order
            .iter()
            .filter_map(|id| self.columns.get_key_value(id).map(|(k, v)| (k, v.as_slice())))
    }

    pub fn column_title(&self, id: &str) -> String {
        if let Some(title) = self.column_titles.get(id) {
            return title.clone();
        }
        if let Some(title) = default_column_title(id) {
            return title.to_string();
        }
        id.split('-')
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn card_count(&self) -> usize {
        self.columns.values().map(Vec::len).sum()
    }

    pub fn find_card(&self, card_id: &str) -> Option<(&ColumnId, &Card)> {
        self.columns
            .iter()
            .find_map(|(col, cards)| cards.iter().find(|c| c.id == card_id).map(|c| (col, c)))
    }

    pub fn find_card_mut(&mut self, card_id: &str) -> Option<&mut Card> {
        self.columns
            .values_mut()
            .find_map(|cards| cards.iter_mut().find(|c| c.id == card_id))
    }

    pub fn add_card(&mut self, column_id: &str, card: Card) -> bool {
        match self.columns.get_mut(column_id) {
            Some(cards) => {
                cards.push(card);
                true
            }
            None => false,
        }
    }

    /// Removes the card from whichever column holds it and appends it to
    /// `target`. Moving within the same column sends the card to the end.
    pub fn move_card(&mut self, card_id: &str, target: &str) -> bool {
        if !self.columns.contains_key(target) {
            return false;
        }
        let card = match self.take_card(card_id) {
            Some(card) => card,
            None => return false,
        };
        if let Some(cards) = self.columns.get_mut(target) {
            cards.push(card);
        }
        true
    }

    pub fn edit_card(&mut self, card_id: &str, patch: &CardPatch) -> bool {
        match self.find_card_mut(card_id) {
            Some(card) => {
                patch.apply(card);
                true
            }
            None => false,
        }
    }

    /// Removes the card and hands it back so the caller can release its image.
    pub fn delete_card(&mut self, card_id: &str) -> Option<Card> {
        self.take_card(card_id)
    }

    fn take_card(&mut self, card_id: &str) -> Option<Card> {
        for cards in self.columns.values_mut() {
            if let Some(idx) = cards.iter().position(|c| c.id == card_id) {
                return Some(cards.remove(idx));
            }
        }
        None
    }

    /// Adds an empty column whose id is the slug of `title`. Returns `None`
    /// for a blank title or when the slug is already taken.
    pub fn add_column(&mut self, title: &str) -> Option<ColumnId> {
        let id = column_slug(title);
        if id.is_empty() || self.columns.contains_key(&id) {
            return None;
        }
        self.columns.insert(id.clone(), Vec::new());
        self.column_order.push(id.clone());
        self.column_titles.insert(id.clone(), title.trim().to_string());
        Some(id)
    }

    /// Drops the column together with its cards, which are returned.
    pub fn delete_column(&mut self, id: &str) -> Option<Vec<Card>> {
        let cards = self.columns.shift_remove(id)?;
        self.column_titles.shift_remove(id);
        self.column_order.retain(|c| c != id);
        Some(cards)
    }

    pub fn rename_column(&mut self, id: &str, title: &str) -> bool {
        let title = title.trim();
        if title.is_empty() || !self.columns.contains_key(id) {
            return false;
        }
        self.column_titles.insert(id.to_string(), title.to_string());
        true
    }

    /// Moves `dragged` to the index `target` held before the move.
    pub fn reorder_column(&mut self, dragged: &str, target: &str) -> bool {
        if dragged == target {
            return false;
        }
        let from = self.column_order.iter().position(|c| c == dragged);
        let to = self.column_order.iter().position(|c| c == target);
        let (from, to) = match (from, to) {
            (Some(f), Some(t)) => (f, t),
            _ => return false,
        };
        let id = self.column_order.remove(from);
        self.column_order.insert(to, id);
        true
    }

    pub fn image_names(&self) -> impl Iterator<Item = &str> {
        self.columns
            .values()
            .flatten()
            .filter_map(|c| c.image.as_deref())
    }
}

impl KanbanDocument {
    /// A document holding only the default board.
    pub fn with_default_board() -> Self {
        let mut doc = KanbanDocument::default();
        doc.create_default_board();
        doc
    }

    pub fn create_default_board(&mut self) -> BoardId {
        let id = new_id("board");
        let board = Board::with_columns(
            id.clone(),
            DEFAULT_BOARD_TITLE,
            &[
                ("todo", "To Do"),
                ("in-progress", "In Progress"),
                ("review", "Review"),
                ("done", "Done"),
            ],
        );
        self.boards.insert(id.clone(), board);
        if self.active_board_id.is_none() {
            self.active_board_id = Some(id.clone());
        }
        id
    }

    /// Adds a board with the three starter columns and makes it active.
    pub fn create_board(&mut self, title: &str) -> Option<BoardId> {
        let title = title.trim();
        if title.is_empty() {
            return None;
        }
        let id = new_id("board");
        let board = Board::with_columns(
            id.clone(),
            title,
            &[("todo", "To Do"), ("in-progress", "In Progress"), ("done", "Done")],
        );
        self.boards.insert(id.clone(), board);
        self.active_board_id = Some(id.clone());
        Some(id)
    }

    pub fn rename_board(&mut self, id: &str, title: &str) -> bool {
        let title = title.trim();
        match self.boards.get_mut(id) {
            Some(board) if !title.is_empty() => {
                board.title = title.to_string();
                true
            }
            _ => false,
        }
    }

    /// Refuses to remove the last board. The active board falls back to the
    /// first remaining one when it was the one deleted.
    pub fn delete_board(&mut self, id: &str) -> Option<Board> {
        if self.boards.len() <= 1 {
            return None;
        }
        let removed = self.boards.shift_remove(id)?;
        if self.active_board_id.as_deref() == Some(id) {
            self.active_board_id = self.boards.keys().next().cloned();
        }
        Some(removed)
    }

    pub fn set_active(&mut self, id: &str) -> bool {
        if !self.boards.contains_key(id) {
            return false;
        }
        self.active_board_id = Some(id.to_string());
        true
    }

    /// Points a missing or dangling active id at the first board.
    pub fn resolve_active(&mut self) {
        let valid = self
            .active_board_id
            .as_ref()
            .is_some_and(|id| self.boards.contains_key(id));
        if !valid {
            self.active_board_id = self.boards.keys().next().cloned();
        }
    }

    pub fn active_board(&self) -> Option<&Board> {
        self.active_board_id
            .as_ref()
            .and_then(|id| self.boards.get(id))
    }

    pub fn active_board_mut(&mut self) -> Option<&mut Board> {
        let id = self.active_board_id.clone()?;
        self.boards.get_mut(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn card(id: &str) -> Card {
        let mut c = Card::new(id);
        c.id = id.to_string();
        c
    }

    fn sample_board() -> Board {
        let mut board = Board::with_columns(
            "b1",
            "Sample",
            &[("todo", "To Do"), ("doing", "Doing"), ("done", "Done")],
        );
        board.add_card("todo", card("c1"));
        board.add_card("todo", card("c2"));
        board.add_card("doing", card("c3"));
        board
    }

    fn columns_holding(board: &Board, card_id: &str) -> Vec<String> {
        board
            .columns
            .iter()
            .filter(|(_, cards)| cards.iter().any(|c| c.id == card_id))
            .map(|(id, _)| id.clone())
            .collect()
    }

    #[test]
    fn move_card_lands_in_exactly_one_column() {
        let mut board = sample_board();
        let before = board.card_count();
        assert!(board.move_card("c1", "done"));
        assert_eq!(columns_holding(&board, "c1"), vec!["done".to_string()]);
        assert_eq!(board.card_count(), before);
        assert_eq!(board.columns["done"].last().map(|c| c.id.as_str()), Some("c1"));
    }

    #[test]
    fn move_card_appends_after_existing_cards() {
        let mut board = sample_board();
        board.move_card("c1", "doing");
        let ids: Vec<_> = board.columns["doing"].iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c3", "c1"]);
    }

    #[test]
    fn move_card_unknown_ids_are_noops() {
        let mut board = sample_board();
        let snapshot = board.clone();
        assert!(!board.move_card("missing", "done"));
        assert!(!board.move_card("c1", "nowhere"));
        assert_eq!(board, snapshot);
    }

    #[test]
    fn edit_card_merges_patch() {
        let mut board = sample_board();
        let patch = CardPatch {
            title: Some("Renamed".into()),
            priority: Some(Priority::High),
            due_date: Some(NaiveDate::from_ymd_opt(2025, 3, 1)),
            ..CardPatch::default()
        };
        assert!(board.edit_card("c3", &patch));
        let (_, c3) = board.find_card("c3").unwrap();
        assert_eq!(c3.title, "Renamed");
        assert_eq!(c3.priority, Priority::High);
        assert_eq!(c3.due_date, NaiveDate::from_ymd_opt(2025, 3, 1));
        assert!(!board.edit_card("zzz", &patch));
    }

    #[test]
    fn delete_card_returns_removed_card() {
        let mut board = sample_board();
        board.edit_card(
            "c2",
            &CardPatch {
                image: Some(Some("card-c2.png".into())),
                ..CardPatch::default()
            },
        );
        let removed = board.delete_card("c2").unwrap();
        assert_eq!(removed.image.as_deref(), Some("card-c2.png"));
        assert!(board.find_card("c2").is_none());
        assert!(board.delete_card("c2").is_none());
    }

    #[test]
    fn add_column_slugs_title() {
        let mut board = sample_board();
        let id = board.add_column("In Review").unwrap();
        assert_eq!(id, "in-review");
        assert_eq!(board.column_order.last().map(String::as_str), Some("in-review"));
        assert_eq!(board.columns["in-review"], Vec::<Card>::new());
        assert_eq!(board.column_title("in-review"), "In Review");
    }

    #[test]
    fn add_column_refuses_slug_collision() {
        let mut board = sample_board();
        board.add_card("done", card("c9"));
        assert_eq!(board.add_column("DONE"), None);
        assert_eq!(board.columns["done"].len(), 1);
        assert_eq!(board.add_column("   "), None);
    }

    #[test]
    fn delete_column_clears_all_three_places() {
        let mut board = sample_board();
        let cards = board.delete_column("todo").unwrap();
        assert_eq!(cards.len(), 2);
        assert!(!board.columns.contains_key("todo"));
        assert!(!board.column_titles.contains_key("todo"));
        assert_eq!(board.column_order, vec!["doing", "done"]);
        assert!(board.delete_column("todo").is_none());
    }

    #[test]
    fn reorder_column_is_a_permutation() {
        let mut board = sample_board();
        board.add_column("Archive");
        let original = board.column_order.clone();
        assert!(board.reorder_column("archive", "doing"));
        assert_eq!(board.column_order, vec!["todo", "archive", "doing", "done"]);

        let mut sorted = board.column_order.clone();
        sorted.sort();
        let mut expected = original;
        expected.sort();
        assert_eq!(sorted, expected);
    }

    #[test]
    fn reorder_column_forward_uses_target_index() {
        let mut board = sample_board();
        assert!(board.reorder_column("todo", "done"));
        assert_eq!(board.column_order, vec!["doing", "done", "todo"]);
        assert!(!board.reorder_column("todo", "todo"));
        assert!(!board.reorder_column("todo", "ghost"));
    }

    #[test]
    fn column_title_falls_back_to_defaults_then_slug() {
        let mut board = sample_board();
        board.column_titles.clear();
        assert_eq!(board.column_title("todo"), "To Do");
        assert_eq!(board.column_title("review"), "In Review");
        assert_eq!(board.column_title("needs-design"), "Needs Design");
    }

    #[test]
    fn repair_restores_order_invariant() {
        let mut board = sample_board();
        board.column_order.push("ghost".into());
        board.columns.insert("stray".into(), vec![card("s1")]);
        board.repair();
        assert!(board.columns.contains_key("ghost"));
        assert!(board.column_order.contains(&"stray".to_string()));
        for id in &board.column_order {
            assert!(board.columns.contains_key(id));
        }
    }

    #[test]
    fn card_tags_and_todos() {
        let mut c = Card::new("Checklist");
        assert!(c.add_tag("bug", "#f00"));
        assert!(!c.add_tag("bug", "#0f0"));
        let todo = c.add_todo("write tests").unwrap();
        c.add_todo("ship");
        assert!(c.toggle_todo(&todo));
        assert_eq!(c.progress(), (1, 2));
        assert!(c.remove_todo(&todo));
        assert!(c.remove_tag("bug"));
        assert_eq!(c.progress(), (0, 1));
        assert!(c.card_id.starts_with("TASK-"));
    }

    #[test]
    fn delete_board_keeps_at_least_one() {
        let mut doc = KanbanDocument::with_default_board();
        let first = doc.active_board_id.clone().unwrap();
        assert!(doc.delete_board(&first).is_none());

        let second = doc.create_board("Side project").unwrap();
        assert_eq!(doc.active_board_id.as_deref(), Some(second.as_str()));
        assert!(doc.delete_board(&second).is_some());
        assert_eq!(doc.active_board_id.as_deref(), Some(first.as_str()));
    }

    #[test]
    fn resolve_active_picks_first_board() {
        let mut doc = KanbanDocument::with_default_board();
        doc.active_board_id = Some("gone".into());
        doc.resolve_active();
        assert_eq!(doc.active_board_id.as_ref(), doc.boards.keys().next());
        assert!(doc.create_board("  ").is_none());
        assert!(!doc.rename_board("gone", "x"));
    }

    #[test]
    fn due_date_reads_empty_string_as_none() {
        let json = r#"{"id":"1","title":"t","dueDate":""}"#;
        let c: Card = serde_json::from_str(json).unwrap();
        assert_eq!(c.due_date, None);
        assert_eq!(c.priority, Priority::Medium);

        let json = r#"{"id":"1","title":"t","dueDate":"2024-12-31"}"#;
        let c: Card = serde_json::from_str(json).unwrap();
        assert_eq!(c.due_date, NaiveDate::from_ymd_opt(2024, 12, 31));
    }
}
