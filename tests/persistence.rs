use std::fs;

use chrono::NaiveDate;
use deskboard::model::{Card, KanbanDocument, NotesDocument, Priority};
use deskboard::storage::{DataDir, DocumentStore, StoreError};
use deskboard::KanbanStore;
use pretty_assertions::assert_eq;
use serde_json::Value;
use tempfile::TempDir;

fn data_dir() -> (TempDir, DataDir) {
    let dir = TempDir::new().unwrap();
    let data = DataDir::new(dir.path().join("data"));
    (dir, data)
}

#[test]
fn first_open_writes_default_board() {
    let (_dir, data) = data_dir();
    let store = KanbanStore::open(&data).unwrap();
    let board = store.active_board().unwrap();
    assert_eq!(board.column_order, vec!["todo", "in-progress", "review", "done"]);

    let on_disk: Value = serde_json::from_str(&fs::read_to_string(data.kanban_path()).unwrap()).unwrap();
    assert_eq!(on_disk["version"], 2);
    assert_eq!(on_disk["activeBoardId"], Value::String(board.id.clone()));
    assert!(data.images_dir().is_dir());
}

#[test]
fn legacy_single_board_file_is_migrated_and_rewritten() {
    let (_dir, data) = data_dir();
    data.ensure().unwrap();
    fs::write(
        data.kanban_path(),
        r#"{"columns": {"todo": [], "doing": [], "done": []}}"#,
    )
    .unwrap();

    let store = KanbanStore::open(&data).unwrap();
    let board = store.active_board().unwrap();
    assert_eq!(board.id, "board-main");
    assert_eq!(board.title, "Main Board");
    assert_eq!(board.column_order, vec!["todo", "doing", "done"]);
    assert_eq!(store.document().active_board_id.as_deref(), Some("board-main"));

    let on_disk: Value = serde_json::from_str(&fs::read_to_string(data.kanban_path()).unwrap()).unwrap();
    assert_eq!(on_disk["version"], 2);
    assert!(on_disk["boards"]["board-main"].is_object());
}

#[test]
fn newer_document_versions_are_refused() {
    let (_dir, data) = data_dir();
    data.ensure().unwrap();
    fs::write(data.kanban_path(), r#"{"version": 99, "boards": {}}"#).unwrap();
    let err = DocumentStore::<KanbanDocument>::open(data.kanban_path()).unwrap_err();
    assert!(matches!(err, StoreError::UnsupportedVersion { found: 99, .. }));
}

#[test]
fn export_then_import_reproduces_boards() {
    let (dir, data) = data_dir();
    let mut store = KanbanStore::open(&data).unwrap();
    let mut report = Card::new("Write report");
    report.priority = Priority::High;
    report.due_date = NaiveDate::from_ymd_opt(2026, 3, 14);
    report.assigned_to = Some("sam".into());
    report.card_id = "TASK-7".into();
    report.image = Some("card-report-1700000000000.png".into());
    assert!(report.add_tag("finance", "#10b981"));
    assert!(report.add_tag("urgent", "#ef4444"));
    let outline = report.add_todo("Outline").unwrap();
    report.add_todo("Draft").unwrap();
    assert!(report.toggle_todo(&outline));
    let card_id = store.add_card("todo", report).unwrap().unwrap();
    store.add_column("Blocked").unwrap().unwrap();
    let second = store.create_board("Personal").unwrap().unwrap();
    store.add_card("todo", Card::new("Groceries")).unwrap().unwrap();
    let before = store.document().clone();

    let file = dir.path().join("export.json");
    store.export(&file).unwrap();

    // Scramble the live data, then restore from the export.
    store.delete_board(&second).unwrap().unwrap();
    store.delete_card(&card_id).unwrap().unwrap();
    assert_ne!(store.document(), &before);

    assert_eq!(store.import(&file).unwrap(), 2);
    assert_eq!(store.document(), &before);
    let (_, card) = before
        .boards
        .values()
        .find_map(|b| b.find_card(&card_id))
        .unwrap();
    let restored = store
        .document()
        .boards
        .values()
        .find_map(|b| b.find_card(&card_id))
        .map(|(_, c)| c)
        .unwrap();
    assert_eq!(restored, card);
    assert_eq!(restored.tags.len(), 2);
    assert_eq!(
        restored.todos.iter().map(|t| t.completed).collect::<Vec<_>>(),
        vec![true, false]
    );

    let reopened = KanbanStore::open(&data).unwrap();
    assert_eq!(reopened.document(), &before);
}

#[test]
fn move_card_keeps_card_count() {
    let (_dir, data) = data_dir();
    let mut store = KanbanStore::open(&data).unwrap();
    let ids: Vec<String> = ["a", "b", "c"]
        .iter()
        .map(|t| store.add_card("todo", Card::new(*t)).unwrap().unwrap())
        .collect();
    let total = store.active_board().unwrap().card_count();

    assert!(store.move_card(&ids[1], "done").unwrap());
    let board = store.active_board().unwrap();
    assert_eq!(board.card_count(), total);
    let holders: Vec<&str> = board
        .ordered_columns()
        .filter(|(_, cards)| cards.iter().any(|c| c.id == ids[1]))
        .map(|(col, _)| col.as_str())
        .collect();
    assert_eq!(holders, vec!["done"]);
}

#[test]
fn category_delete_cascades_to_notes_and_files() {
    let (dir, data) = data_dir();
    data.ensure().unwrap();
    let mut notes = DocumentStore::<NotesDocument>::open(data.notes_path()).unwrap();

    let child = notes
        .try_update(|doc| doc.add_category(Some("work-projects"), "Q3", "📁"))
        .unwrap()
        .unwrap();
    notes.try_update(|doc| doc.add_note(&child)).unwrap().unwrap();
    notes.try_update(|doc| doc.add_note("work-projects")).unwrap().unwrap();
    let attachment = dir.path().join("agenda.txt");
    fs::write(&attachment, "hello").unwrap();
    let file = deskboard::model::FileAttachment::from_path(&attachment).unwrap();
    assert!(notes
        .update(|doc| doc.add_files(&child, vec![file]))
        .unwrap());

    let removed = notes.update(|doc| doc.delete_category("work")).unwrap();
    assert_eq!(removed.len(), 4);

    let reopened = DocumentStore::<NotesDocument>::open(data.notes_path()).unwrap();
    let doc = reopened.get();
    for id in ["work", "work-projects", "work-meetings", child.as_str()] {
        assert!(!doc.categories.contains(id), "{} should be gone", id);
        assert!(doc.notes(id).is_empty());
        assert!(doc.files(id).is_empty());
    }
    assert!(doc.categories.contains("personal-diary"));
}
