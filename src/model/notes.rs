use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::new_id;

pub type CategoryId = String;

/// On-disk shape of a category: a nested tree.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub children: Vec<Category>,
}

/// In-memory category: children are referenced by id into the arena.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryNode {
    pub id: CategoryId,
    pub name: String,
    pub icon: String,
    pub parent: Option<CategoryId>,
    pub children: Vec<CategoryId>,
}

/// Category tree stored as a flat arena keyed by id. Serializes to and from
/// the nested `Category` list.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Category>", into = "Vec<Category>")]
pub struct CategoryTree {
    nodes: IndexMap<CategoryId, CategoryNode>,
    roots: Vec<CategoryId>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotePatch {
    pub title: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileAttachment {
    pub id: String,
    pub name: String,
    pub size: u64,
    #[serde(rename = "type", default)]
    pub mime_type: String,
    /// Data URI: `data:<mime>;base64,<payload>`.
    pub base64: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct NotesDocument {
    #[serde(default)]
    pub categories: CategoryTree,
    #[serde(default)]
    pub notes: IndexMap<CategoryId, Vec<Note>>,
    #[serde(default)]
    pub files: IndexMap<CategoryId, Vec<FileAttachment>>,
}

impl From<Vec<Category>> for CategoryTree {
    fn from(categories: Vec<Category>) -> Self {
        fn insert(tree: &mut CategoryTree, cat: Category, parent: Option<&str>) {
            // First occurrence wins if a document repeats an id.
            if tree.nodes.contains_key(&cat.id) {
                warn!(
                    category = %cat.id,
                    dropped_children = cat.children.len(),
                    "duplicate category id; keeping the first"
                );
                return;
            }
            let id = cat.id.clone();
            tree.nodes.insert(
                id.clone(),
                CategoryNode {
                    id: id.clone(),
                    name: cat.name,
                    icon: cat.icon,
                    parent: parent.map(str::to_string),
                    children: Vec::new(),
                },
            );
            let parent_node = match parent {
                Some(p) => tree.nodes.get_mut(p),
                None => None,
            };
            match parent_node {
                Some(node) => node.children.push(id.clone()),
                None => tree.roots.push(id.clone()),
            }
            for child in cat.children {
                insert(tree, child, Some(id.as_str()));
            }
        }

        let mut tree = CategoryTree::default();
        for cat in categories {
            insert(&mut tree, cat, None);
        }
        tree
    }
}

impl From<CategoryTree> for Vec<Category> {
    fn from(tree: CategoryTree) -> Self {
        tree.to_nested()
    }
}

impl CategoryTree {
    pub fn get(&self, id: &str) -> Option<&CategoryNode> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn roots(&self) -> &[CategoryId] {
        &self.roots
    }

    pub fn to_nested(&self) -> Vec<Category> {
        fn build(tree: &CategoryTree, id: &str) -> Option<Category> {
            let node = tree.nodes.get(id)?;
            Some(Category {
                id: node.id.clone(),
                name: node.name.clone(),
                icon: node.icon.clone(),
                children: node.children.iter().filter_map(|c| build(tree, c)).collect(),
            })
        }
        self.roots.iter().filter_map(|id| build(self, id)).collect()
    }

    /// Appends a category under `parent`, or at the root when `parent` is
    /// `None`. Unknown parents and duplicate ids are rejected.
    pub fn add(&mut self, parent: Option<&str>, id: CategoryId, name: &str, icon: &str) -> bool {
        if self.nodes.contains_key(&id) {
            return false;
        }
        match parent {
            Some(p) => match self.nodes.get_mut(p) {
                Some(node) => node.children.push(id.clone()),
                None => return false,
            },
            None => self.roots.push(id.clone()),
        }
        self.nodes.insert(
            id.clone(),
            CategoryNode {
                id,
                name: name.to_string(),
                icon: icon.to_string(),
                parent: parent.map(str::to_string),
                children: Vec::new(),
            },
        );
        true
    }

    pub fn rename(&mut self, id: &str, name: &str) -> bool {
        let name = name.trim();
        match self.nodes.get_mut(id) {
            Some(node) if !name.is_empty() => {
                node.name = name.to_string();
                true
            }
            _ => false,
        }
    }

    /// All transitive descendants of `id`, depth-first, excluding `id`.
    pub fn descendants(&self, id: &str) -> Vec<CategoryId> {
        let mut out = Vec::new();
        let mut stack: Vec<&CategoryId> = match self.nodes.get(id) {
            Some(node) => node.children.iter().rev().collect(),
            None => return out,
        };
        while let Some(next) = stack.pop() {
            out.push(next.clone());
            if let Some(node) = self.nodes.get(next) {
                stack.extend(node.children.iter().rev());
            }
        }
        out
    }

    /// Removes `id` and its whole subtree. Returns every removed id, `id`
    /// first; empty when `id` is unknown.
    pub fn remove(&mut self, id: &str) -> Vec<CategoryId> {
        let parent = match self.nodes.get(id) {
            Some(node) => node.parent.clone(),
            None => return Vec::new(),
        };
        let mut removed = vec![id.to_string()];
        removed.extend(self.descendants(id));
        let parent_node = match &parent {
            Some(p) => self.nodes.get_mut(p),
            None => None,
        };
        match parent_node {
            Some(node) => node.children.retain(|c| c != id),
            None => self.roots.retain(|c| c != id),
        }
        for gone in &removed {
            self.nodes.shift_remove(gone);
        }
        removed
    }

    /// Depth-first walk in display order, yielding `(depth, node)`.
    pub fn walk(&self) -> Vec<(usize, &CategoryNode)> {
        fn collect<'a>(
            tree: &'a CategoryTree,
            ids: &'a [CategoryId],
            depth: usize,
            out: &mut Vec<(usize, &'a CategoryNode)>,
        ) {
            for id in ids {
                if let Some(node) = tree.nodes.get(id) {
                    out.push((depth, node));
                    collect(tree, &node.children, depth + 1, out);
                }
            }
        }
        let mut out = Vec::new();
        collect(self, &self.roots, 0, &mut out);
        out
    }
}

impl FileAttachment {
    pub fn from_bytes(name: &str, bytes: &[u8]) -> Self {
        let mime = mime_for_name(name);
        FileAttachment {
            id: new_id("file"),
            name: name.to_string(),
            size: bytes.len() as u64,
            mime_type: mime.to_string(),
            base64: format!("data:{};base64,{}", mime, STANDARD.encode(bytes)),
            created_at: Utc::now(),
        }
    }

    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("attachment");
        Ok(FileAttachment::from_bytes(name, &bytes))
    }

    /// Raw payload with any `data:…;base64,` prefix removed.
    pub fn payload(&self) -> &str {
        strip_data_uri(&self.base64)
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}

pub(crate) fn strip_data_uri(data: &str) -> &str {
    if data.starts_with("data:") {
        if let Some(idx) = data.find(";base64,") {
            return &data[idx + ";base64,".len()..];
        }
    }
    data
}

/// MIME type guessed from the file extension.
pub fn mime_for_name(name: &str) -> &'static str {
    let ext = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "txt" | "md" => "text/plain",
        "json" => "application/json",
        "zip" => "application/zip",
        _ => "application/octet-stream",
    }
}

impl NotesDocument {
    /// Starter tree used when no notes document exists yet.
    pub fn with_default_categories() -> Self {
        let mut doc = NotesDocument::default();
        let tree = &mut doc.categories;
        tree.add(None, "personal".into(), "Personal", "👤");
        tree.add(Some("personal"), "personal-diary".into(), "Diary", "📔");
        tree.add(Some("personal"), "personal-ideas".into(), "Ideas", "💡");
        tree.add(None, "work".into(), "Work", "💼");
        tree.add(Some("work"), "work-projects".into(), "Projects", "📊");
        tree.add(Some("work"), "work-meetings".into(), "Meetings", "🤝");
        doc
    }

    pub fn add_category(&mut self, parent: Option<&str>, name: &str, icon: &str) -> Option<CategoryId> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let id = new_id("cat");
        self.categories
            .add(parent, id.clone(), name, icon)
            .then_some(id)
    }

    /// Cascading delete: the subtree plus every note and file keyed by a
    /// removed category.
    pub fn delete_category(&mut self, id: &str) -> Vec<CategoryId> {
        let removed = self.categories.remove(id);
        for gone in &removed {
            self.notes.shift_remove(gone);
            self.files.shift_remove(gone);
        }
        removed
    }

    pub fn notes(&self, category: &str) -> &[Note] {
        self.notes.get(category).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn files(&self, category: &str) -> &[FileAttachment] {
        self.files.get(category).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn find_note(&self, category: &str, note_id: &str) -> Option<&Note> {
        self.notes(category).iter().find(|n| n.id == note_id)
    }

    pub fn add_note(&mut self, category: &str) -> Option<String> {
        if !self.categories.contains(category) {
            return None;
        }
        let now = Utc::now();
        let note = Note {
            id: new_id("note"),
            title: "New Note".into(),
            content: String::new(),
            created_at: now,
            updated_at: now,
        };
        let id = note.id.clone();
        self.notes.entry(category.to_string()).or_default().push(note);
        Some(id)
    }

    pub fn update_note(&mut self, category: &str, note_id: &str, patch: &NotePatch) -> bool {
        let note = match self
            .notes
            .get_mut(category)
            .and_then(|notes| notes.iter_mut().find(|n| n.id == note_id))
        {
            Some(note) => note,
            None => return false,
        };
        if let Some(t) = &patch.title {
            note.title = t.clone();
        }
        if let Some(c) = &patch.content {
            note.content = c.clone();
        }
        note.updated_at = Utc::now();
        true
    }

    pub fn delete_note(&mut self, category: &str, note_id: &str) -> Option<Note> {
        let notes = self.notes.get_mut(category)?;
        let idx = notes.iter().position(|n| n.id == note_id)?;
        Some(notes.remove(idx))
    }

    pub fn add_files(&mut self, category: &str, files: Vec<FileAttachment>) -> bool {
        if !self.categories.contains(category) || files.is_empty() {
            return false;
        }
        self.files.entry(category.to_string()).or_default().extend(files);
        true
    }

    pub fn delete_file(&mut self, category: &str, file_id: &str) -> Option<FileAttachment> {
        let files = self.files.get_mut(category)?;
        let idx = files.iter().position(|f| f.id == file_id)?;
        Some(files.remove(idx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tree_doc() -> NotesDocument {
        let mut doc = NotesDocument::default();
        let t = &mut doc.categories;
        t.add(None, "a".into(), "A", "");
        t.add(Some("a"), "a1".into(), "A1", "");
        t.add(Some("a1"), "a1x".into(), "A1x", "");
        t.add(Some("a"), "a2".into(), "A2", "");
        t.add(None, "b".into(), "B", "");
        doc
    }

    #[test]
    fn add_category_under_parent_and_root() {
        let mut doc = tree_doc();
        let child = doc.add_category(Some("b"), "Inbox", "📥").unwrap();
        assert_eq!(doc.categories.get("b").unwrap().children, vec![child.clone()]);
        assert_eq!(doc.categories.get(&child).unwrap().parent.as_deref(), Some("b"));

        let root = doc.add_category(None, "Top", "").unwrap();
        assert_eq!(doc.categories.roots().last(), Some(&root));
        assert_eq!(doc.add_category(Some("nope"), "Lost", ""), None);
    }

    #[test]
    fn delete_category_cascades_to_subtree_notes_and_files() {
        let mut doc = tree_doc();
        doc.add_note("a1x").unwrap();
        doc.add_note("a").unwrap();
        doc.add_note("b").unwrap();
        doc.add_files("a2", vec![FileAttachment::from_bytes("x.txt", b"hi")]);

        let mut removed = doc.delete_category("a");
        removed.sort();
        assert_eq!(removed, vec!["a", "a1", "a1x", "a2"]);
        for id in ["a", "a1", "a1x", "a2"] {
            assert!(!doc.categories.contains(id));
            assert!(doc.notes(id).is_empty());
            assert!(doc.files(id).is_empty());
        }
        assert_eq!(doc.categories.roots(), &["b".to_string()]);
        assert_eq!(doc.notes("b").len(), 1);
    }

    #[test]
    fn delete_nested_category_unlinks_from_parent() {
        let mut doc = tree_doc();
        let removed = doc.delete_category("a1");
        assert_eq!(removed, vec!["a1", "a1x"]);
        assert_eq!(doc.categories.get("a").unwrap().children, vec!["a2".to_string()]);
        assert!(doc.delete_category("a1").is_empty());
    }

    #[test]
    fn walk_is_depth_first_in_display_order() {
        let doc = tree_doc();
        let order: Vec<_> = doc
            .categories
            .walk()
            .into_iter()
            .map(|(d, n)| (d, n.id.as_str()))
            .collect();
        assert_eq!(order, vec![(0, "a"), (1, "a1"), (2, "a1x"), (1, "a2"), (0, "b")]);
    }

    #[test]
    fn tree_serializes_as_nested_categories() {
        let doc = tree_doc();
        let json = serde_json::to_value(&doc.categories).unwrap();
        assert_eq!(json[0]["id"], "a");
        assert_eq!(json[0]["children"][0]["children"][0]["id"], "a1x");
        let back: CategoryTree = serde_json::from_value(json).unwrap();
        assert_eq!(back, doc.categories);
    }

    #[test]
    fn note_crud_bumps_updated_at() {
        let mut doc = tree_doc();
        let id = doc.add_note("b").unwrap();
        let created = doc.find_note("b", &id).unwrap().updated_at;
        assert!(doc.update_note(
            "b",
            &id,
            &NotePatch {
                content: Some("<p>hello</p>".into()),
                ..NotePatch::default()
            }
        ));
        let note = doc.find_note("b", &id).unwrap();
        assert_eq!(note.content, "<p>hello</p>");
        assert!(note.updated_at >= created);
        assert!(!doc.update_note("a", &id, &NotePatch::default()));
        assert!(doc.delete_note("b", &id).is_some());
        assert!(doc.add_note("ghost").is_none());
    }

    #[test]
    fn attachments_carry_data_uri() {
        let file = FileAttachment::from_bytes("photo.JPG", &[1, 2, 3]);
        assert_eq!(file.mime_type, "image/jpeg");
        assert!(file.is_image());
        assert_eq!(file.size, 3);
        assert!(file.base64.starts_with("data:image/jpeg;base64,"));
        assert_eq!(file.payload(), "AQID");
    }

    #[test]
    fn default_categories_are_two_level() {
        let doc = NotesDocument::with_default_categories();
        assert_eq!(doc.categories.roots(), &["personal".to_string(), "work".to_string()]);
        assert_eq!(doc.categories.len(), 6);
    }

    #[test]
    fn duplicate_category_id_keeps_the_first_subtree() {
        let tree: CategoryTree = serde_json::from_str(
            r#"[
                {"id": "a", "name": "A", "children": [{"id": "x", "name": "X"}]},
                {"id": "a", "name": "Again", "children": [{"id": "y", "name": "Y"}]}
            ]"#,
        )
        .unwrap();
        assert_eq!(tree.get("a").unwrap().name, "A");
        assert!(tree.contains("x"));
        assert!(!tree.contains("y"));
        assert_eq!(tree.roots(), &["a".to_string()]);
    }

    #[test]
    fn notes_and_files_keep_insertion_order() {
        let mut doc = tree_doc();
        doc.add_note("b").unwrap();
        doc.add_note("a1x").unwrap();
        doc.add_note("a").unwrap();
        doc.add_files("a2", vec![FileAttachment::from_bytes("x.txt", b"hi")]);
        doc.add_files("b", vec![FileAttachment::from_bytes("y.txt", b"yo")]);

        let text = serde_json::to_string(&doc).unwrap();
        let mut back: NotesDocument = serde_json::from_str(&text).unwrap();
        assert_eq!(back.notes.keys().map(String::as_str).collect::<Vec<_>>(), vec!["b", "a1x", "a"]);
        assert_eq!(back.files.keys().map(String::as_str).collect::<Vec<_>>(), vec!["a2", "b"]);
        assert_eq!(serde_json::to_string(&back).unwrap(), text);

        back.delete_category("a1");
        assert_eq!(back.notes.keys().map(String::as_str).collect::<Vec<_>>(), vec!["b", "a"]);
    }
}
