pub mod board;
pub mod canvas;
pub mod notes;

use chrono::Utc;
use rand::Rng;

pub use board::{Board, BoardId, Card, CardId, CardPatch, ColumnId, KanbanDocument, Priority, Tag, Todo};
pub use canvas::{
    marquee_select, CanvasDocument, Connection, ConnectionStyle, DragGesture, Node, NodeId,
    NodePatch, NodeStyle, Point, Project, Section, SectionPatch, Shape, StylePatch, Viewport,
};
pub use notes::{Category, CategoryId, CategoryNode, CategoryTree, FileAttachment, Note, NotePatch, NotesDocument};

/// Timestamp-derived id: `<prefix>-<unix millis>-<0..10000>`.
///
/// The random suffix keeps ids distinct when several entities are created
/// within the same millisecond (paste, duplicate, default sections).
pub fn new_id(prefix: &str) -> String {
    let millis = Utc::now().timestamp_millis();
    let salt: u32 = rand::thread_rng().gen_range(0..10_000);
    format!("{}-{}-{}", prefix, millis, salt)
}

/// `dueDate` is written as `YYYY-MM-DD`; an empty string means no date.
pub(crate) mod optional_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d";

    pub fn serialize<S>(date: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match date {
            Some(d) => serializer.serialize_str(&d.format(FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(s) => NaiveDate::parse_from_str(s, FORMAT)
                .map(Some)
                .map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_carry_prefix_and_differ() {
        let a = new_id("node");
        let b = new_id("node");
        assert!(a.starts_with("node-"));
        assert_eq!(a.split('-').count(), 3);
        // Same millisecond is likely; the salt makes a clash improbable but
        // not impossible, so only check the shape of the second id.
        assert!(b.starts_with("node-"));
    }
}
