//! Versioned loading, export and import of the kanban document.
//!
//! Version history:
//! - 0: a single board stored at the top level (`columns`, `columnOrder`,
//!   `columnTitles`), no `version` key.
//! - 1: `{ boards, activeBoardId }`, no `version` key.
//! - 2: version 1 plus an explicit `"version": 2`.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::document::{Decoded, Document};
use super::{atomic_write, Result, StoreError};
use crate::model::board::{LEGACY_BOARD_ID, LEGACY_BOARD_TITLE};
use crate::model::{Board, Card, ColumnId, KanbanDocument};

pub const KANBAN_VERSION: u32 = 2;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    version: Option<u32>,
    boards: Option<IgnoredAny>,
    columns: Option<IgnoredAny>,
    column_order: Option<IgnoredAny>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SingleBoard {
    #[serde(default)]
    columns: IndexMap<ColumnId, Vec<Card>>,
    column_order: Option<Vec<ColumnId>>,
    #[serde(default)]
    column_titles: IndexMap<ColumnId, String>,
}

#[derive(Serialize)]
struct Versioned<'a> {
    version: u32,
    #[serde(flatten)]
    doc: &'a KanbanDocument,
}

fn migrate_single_board(legacy: SingleBoard) -> KanbanDocument {
    let column_order = legacy
        .column_order
        .unwrap_or_else(|| legacy.columns.keys().cloned().collect());
    let board = Board {
        id: LEGACY_BOARD_ID.to_string(),
        title: LEGACY_BOARD_TITLE.to_string(),
        columns: legacy.columns,
        column_order,
        column_titles: legacy.column_titles,
    };
    let mut boards = IndexMap::new();
    boards.insert(board.id.clone(), board);
    KanbanDocument {
        boards,
        active_board_id: Some(LEGACY_BOARD_ID.to_string()),
    }
}

fn normalize(doc: &mut KanbanDocument) {
    for board in doc.boards.values_mut() {
        board.repair();
    }
    doc.resolve_active();
}

impl Document for KanbanDocument {
    const NAME: &'static str = "kanban";

    fn fresh() -> Self {
        KanbanDocument::with_default_board()
    }

    fn decode(text: &str) -> Result<Decoded<Self>> {
        let envelope: Envelope = match serde_json::from_str::<Option<Envelope>>(text)? {
            Some(p) => p,
            None => {
                return Ok(Decoded {
                    doc: Self::fresh(),
                    upgraded: true,
                })
            }
        };
        let has_single_board = envelope.columns.is_some() || envelope.column_order.is_some();

        let (mut doc, upgraded) = match envelope.version {
            Some(KANBAN_VERSION) => (serde_json::from_str::<KanbanDocument>(text)?, false),
            Some(found) if found > KANBAN_VERSION => {
                return Err(StoreError::UnsupportedVersion {
                    found,
                    supported: KANBAN_VERSION,
                })
            }
            Some(1) | None if envelope.boards.is_some() => {
                info!("tagging multi-board kanban document with version {}", KANBAN_VERSION);
                (serde_json::from_str::<KanbanDocument>(text)?, true)
            }
            Some(0) | None if has_single_board => {
                info!("migrating single-board kanban document into {}", LEGACY_BOARD_ID);
                let legacy: SingleBoard = serde_json::from_str(text)?;
                (migrate_single_board(legacy), true)
            }
            _ => (Self::fresh(), true),
        };

        let mut upgraded = upgraded;
        if doc.boards.is_empty() {
            doc.create_default_board();
            upgraded = true;
        }
        normalize(&mut doc);
        Ok(Decoded { doc, upgraded })
    }

    fn encode(&self) -> Result<String> {
        let versioned = Versioned {
            version: KANBAN_VERSION,
            doc: self,
        };
        Ok(serde_json::to_string_pretty(&versioned)?)
    }
}

/// Writes the whole kanban document to `path` as pretty JSON.
pub fn export_kanban(doc: &KanbanDocument, path: &Path) -> Result<()> {
    let text = doc.encode()?;
    atomic_write(path, text.as_bytes()).map_err(|source| StoreError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), boards = doc.boards.len(), "exported kanban document");
    Ok(())
}

pub fn import_kanban(path: &Path) -> Result<KanbanDocument> {
    let text = fs::read_to_string(path).map_err(|source| StoreError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let doc = parse_import(&text)?;
    info!(path = %path.display(), boards = doc.boards.len(), "imported kanban document");
    Ok(doc)
}

/// Parses an exported document. The file must carry a non-empty `boards`
/// map; anything else is rejected rather than replacing the current data.
pub fn parse_import(text: &str) -> Result<KanbanDocument> {
    #[derive(Deserialize)]
    struct ImportEnvelope {
        version: Option<u32>,
        boards: Option<IndexMap<String, IgnoredAny>>,
    }

    let envelope: ImportEnvelope =
        serde_json::from_str(text).map_err(|e| StoreError::InvalidImport(e.to_string()))?;
    if let Some(found) = envelope.version.filter(|v| *v > KANBAN_VERSION) {
        return Err(StoreError::UnsupportedVersion {
            found,
            supported: KANBAN_VERSION,
        });
    }
    match envelope.boards {
        Some(boards) if !boards.is_empty() => {}
        Some(_) => return Err(StoreError::InvalidImport("file contains no boards".into())),
        None => return Err(StoreError::InvalidImport("missing `boards` key".into())),
    }
    let mut doc: KanbanDocument =
        serde_json::from_str(text).map_err(|e| StoreError::InvalidImport(e.to_string()))?;
    normalize(&mut doc);
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn legacy_single_board_is_wrapped() {
        let decoded =
            KanbanDocument::decode(r#"{"columns":{"todo":[],"doing":[],"done":[]}}"#).unwrap();
        assert!(decoded.upgraded);
        let doc = decoded.doc;
        assert_eq!(doc.active_board_id.as_deref(), Some("board-main"));
        let board = &doc.boards["board-main"];
        assert_eq!(board.title, "Main Board");
        assert_eq!(board.column_order, vec!["todo", "doing", "done"]);
        assert!(board.column_titles.is_empty());
    }

    #[test]
    fn legacy_column_order_wins_over_key_order() {
        let text = r#"{
            "columns": {"done": [], "todo": [{"id": "1", "title": "Old card"}]},
            "columnOrder": ["todo", "done"],
            "columnTitles": {"todo": "Backlog"}
        }"#;
        let doc = KanbanDocument::decode(text).unwrap().doc;
        let board = &doc.boards["board-main"];
        assert_eq!(board.column_order, vec!["todo", "done"]);
        assert_eq!(board.column_title("todo"), "Backlog");
        assert_eq!(board.columns["todo"][0].title, "Old card");
    }

    #[test]
    fn untagged_multi_board_is_upgraded() {
        let text = r#"{"boards":{"b1":{"id":"b1","title":"One","columns":{"a":[]},"columnOrder":["a"],"columnTitles":{}}}}"#;
        let decoded = KanbanDocument::decode(text).unwrap();
        assert!(decoded.upgraded);
        assert_eq!(decoded.doc.active_board_id.as_deref(), Some("b1"));
    }

    #[test]
    fn current_version_is_not_rewritten() {
        let doc = KanbanDocument::with_default_board();
        let text = doc.encode().unwrap();
        assert!(text.contains("\"version\": 2"));
        let decoded = KanbanDocument::decode(&text).unwrap();
        assert!(!decoded.upgraded);
        assert_eq!(decoded.doc, doc);
    }

    #[test]
    fn newer_version_is_refused() {
        let err = KanbanDocument::decode(r#"{"version": 9, "boards": {}}"#).unwrap_err();
        assert!(matches!(err, StoreError::UnsupportedVersion { found: 9, .. }));
    }

    #[test]
    fn empty_object_starts_fresh() {
        let decoded = KanbanDocument::decode("{}").unwrap();
        assert!(decoded.upgraded);
        assert_eq!(decoded.doc.boards.len(), 1);
        let board = decoded.doc.active_board().unwrap();
        assert_eq!(board.column_order, vec!["todo", "in-progress", "review", "done"]);
    }

    #[test]
    fn import_requires_boards() {
        assert!(matches!(
            parse_import(r#"{"activeBoardId": null}"#),
            Err(StoreError::InvalidImport(_))
        ));
        assert!(matches!(
            parse_import(r#"{"boards": {}}"#),
            Err(StoreError::InvalidImport(_))
        ));
        assert!(matches!(parse_import("not json"), Err(StoreError::InvalidImport(_))));
    }
}
