use crate::cli::{BoardCmd, CanvasCmd, CardCmd, ColumnCmd, NotesCmd, SectionCmd};
use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use deskboard::model::{
    marquee_select, Board, CanvasDocument, Card, CardPatch, DragGesture, FileAttachment, NodePatch,
    NotePatch, NotesDocument, Point, Priority, Project, SectionPatch, Shape, StylePatch, Viewport,
};
use deskboard::storage::{open_attachment, DataDir, DocumentStore};
use deskboard::{AppConfig, KanbanStore};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Resolved locations for one invocation.
pub struct Session {
    data: DataDir,
    config: AppConfig,
}

impl Session {
    pub fn new(config: AppConfig, data_dir: Option<PathBuf>) -> Result<Self> {
        let data = config.resolve_data_dir(data_dir)?;
        tracing::debug!(root = %data.root().display(), "using data directory");
        Ok(Session { data, config })
    }

    fn kanban(&self) -> Result<KanbanStore> {
        KanbanStore::open(&self.data)
            .with_context(|| format!("opening boards in {}", self.data.root().display()))
    }

    fn notes(&self) -> Result<DocumentStore<NotesDocument>> {
        self.data.ensure()?;
        DocumentStore::open(self.data.notes_path()).context("opening notes")
    }

    fn canvas(&self) -> Result<DocumentStore<CanvasDocument>> {
        self.data.ensure()?;
        DocumentStore::open(self.data.canvas_path()).context("opening canvas projects")
    }
}

pub fn board(session: &Session, cmd: BoardCmd) -> Result<()> {
    let mut store = session.kanban()?;
    match cmd {
        BoardCmd::List => {
            let doc = store.document();
            for board in doc.boards.values() {
                let marker = if doc.active_board_id.as_deref() == Some(board.id.as_str()) {
                    "*"
                } else {
                    " "
                };
                println!("{} {}: {} ({} cards)", marker, board.id, board.title, board.card_count());
            }
        }
        BoardCmd::Show => {
            let board = store.active_board().ok_or_else(|| anyhow!("no active board"))?;
            print_board(board);
        }
        BoardCmd::Create { title } => {
            let id = store
                .create_board(&title)?
                .ok_or_else(|| anyhow!("board title cannot be empty"))?;
            println!("Created board {}", id);
        }
        BoardCmd::Rename { title, id } => {
            let id = match id {
                Some(id) => id,
                None => active_board_id(&store)?,
            };
            if !store.rename_board(&id, &title)? {
                bail!("board {} not found", id);
            }
            println!("Renamed board {}", id);
        }
        BoardCmd::Delete { id } => {
            if !store.document().boards.contains_key(&id) {
                bail!("board {} not found", id);
            }
            let removed = store
                .delete_board(&id)?
                .ok_or_else(|| anyhow!("cannot delete the last board"))?;
            println!("Deleted board {} ({} cards)", removed.id, removed.card_count());
        }
        BoardCmd::Use { id } => {
            if !store.set_active(&id)? {
                bail!("board {} not found", id);
            }
            println!("Active board is now {}", id);
        }
    }
    Ok(())
}

pub fn column(session: &Session, cmd: ColumnCmd) -> Result<()> {
    let mut store = session.kanban()?;
    match cmd {
        ColumnCmd::Add { title } => {
            let id = store
                .add_column(&title)?
                .ok_or_else(|| anyhow!("a column matching {:?} already exists or the title is empty", title))?;
            println!("Added column {}", id);
        }
        ColumnCmd::Delete { id } => {
            let cards = store
                .delete_column(&id)?
                .ok_or_else(|| anyhow!("column {} not found", id))?;
            println!("Deleted column {} and {} cards", id, cards.len());
        }
        ColumnCmd::Rename { id, title } => {
            if !store.rename_column(&id, &title)? {
                bail!("column {} not found", id);
            }
            println!("Renamed column {}", id);
        }
        ColumnCmd::Move { id, target } => {
            if !store.reorder_column(&id, &target)? {
                bail!("cannot move column {} to {}", id, target);
            }
            println!("Moved column {}", id);
        }
    }
    Ok(())
}

pub fn card(session: &Session, cmd: CardCmd) -> Result<()> {
    let mut store = session.kanban()?;
    match cmd {
        CardCmd::Add {
            title,
            column,
            description,
            priority,
            due,
            assign,
        } => {
            let column_id = match column {
                Some(c) => c,
                None => store
                    .active_board()
                    .and_then(|b| b.column_order.first().cloned())
                    .ok_or_else(|| anyhow!("board has no columns"))?,
            };
            let mut card = Card::new(title);
            card.description = description.unwrap_or_default();
            card.assigned_to = assign;
            if let Some(p) = priority {
                card.priority = parse_priority(&p)?;
            }
            card.due_date = parse_due(due.as_deref())?;
            let id = store
                .add_card(&column_id, card)?
                .ok_or_else(|| anyhow!("column {} not found", column_id))?;
            println!("Added card {} to {}", id, column_id);
        }
        CardCmd::Show { id } => {
            let board = store.active_board().ok_or_else(|| anyhow!("no active board"))?;
            let (column, card) = board
                .find_card(&id)
                .ok_or_else(|| anyhow!("card {} not found", id))?;
            println!("{} [{}]", card.card_id, board.column_title(column));
            print_card(card);
            if let Some(image) = &card.image {
                let path = store.images().dir().join(image);
                println!("    image: {}", path.display());
            }
        }
        CardCmd::Edit {
            id,
            title,
            description,
            priority,
            due,
            clear_due,
            assign,
            unassign,
            label,
        } => {
            let mut patch = CardPatch {
                title,
                description,
                card_id: label,
                ..CardPatch::default()
            };
            if let Some(p) = priority {
                patch.priority = Some(parse_priority(&p)?);
            }
            if clear_due {
                patch.due_date = Some(None);
            } else if due.is_some() {
                patch.due_date = Some(parse_due(due.as_deref())?);
            }
            if unassign {
                patch.assigned_to = Some(None);
            } else if let Some(who) = assign {
                patch.assigned_to = Some(Some(who));
            }
            if patch.is_empty() {
                bail!("nothing to change");
            }
            if !store.edit_card(&id, &patch)? {
                bail!("card {} not found", id);
            }
            println!("Updated card {}", id);
        }
        CardCmd::Move { id, column } => {
            if !store.move_card(&id, &column)? {
                bail!("cannot move card {} to {}", id, column);
            }
            println!("Moved card {} to {}", id, column);
        }
        CardCmd::Delete { id } => {
            store
                .delete_card(&id)?
                .ok_or_else(|| anyhow!("card {} not found", id))?;
            println!("Deleted card {}", id);
        }
        CardCmd::Tag { id, text, color } => {
            let added = store
                .with_card(&id, |c| c.add_tag(&text, &color).then_some(()))?
                .is_some();
            if !added {
                bail!("card {} not found or already tagged {:?}", id, text);
            }
            println!("Tagged card {} with {}", id, text);
        }
        CardCmd::Untag { id, text } => {
            let removed = store
                .with_card(&id, |c| c.remove_tag(&text).then_some(()))?
                .is_some();
            if !removed {
                bail!("card {} has no tag {:?}", id, text);
            }
            println!("Removed tag {} from card {}", text, id);
        }
        CardCmd::Todo { id, text } => {
            let todo = store
                .with_card(&id, |c| c.add_todo(&text))?
                .ok_or_else(|| anyhow!("card {} not found or empty item", id))?;
            println!("Added todo {} to card {}", todo, id);
        }
        CardCmd::Check { id, todo_id } => {
            let (done, total) = store
                .with_card(&id, |c| c.toggle_todo(&todo_id).then(|| c.progress()))?
                .ok_or_else(|| anyhow!("todo {} not found on card {}", todo_id, id))?;
            println!("Card {}: {}/{} done", id, done, total);
        }
        CardCmd::Image { id, path } => {
            let name = store
                .set_card_image(&id, &path)
                .with_context(|| format!("attaching {}", path.display()))?
                .ok_or_else(|| anyhow!("card {} not found", id))?;
            println!("Attached image {} to card {}", name, id);
        }
        CardCmd::ClearImage { id } => {
            if !store.clear_card_image(&id)? {
                bail!("card {} has no image", id);
            }
            println!("Removed image from card {}", id);
        }
    }
    Ok(())
}

pub fn notes(session: &Session, cmd: NotesCmd) -> Result<()> {
    let mut store = session.notes()?;
    match cmd {
        NotesCmd::Tree => {
            let doc = store.get();
            for (depth, node) in doc.categories.walk() {
                println!(
                    "{}{} {} ({}) [{} notes, {} files]",
                    "  ".repeat(depth),
                    node.icon,
                    node.name,
                    node.id,
                    doc.notes(&node.id).len(),
                    doc.files(&node.id).len()
                );
            }
        }
        NotesCmd::AddCategory { name, parent, icon } => {
            let id = store
                .try_update(|doc| doc.add_category(parent.as_deref(), &name, &icon))?
                .ok_or_else(|| anyhow!("parent category not found or empty name"))?;
            println!("Added category {}", id);
        }
        NotesCmd::DeleteCategory { id } => {
            let removed = store.try_update(|doc| {
                let removed = doc.delete_category(&id);
                (!removed.is_empty()).then_some(removed)
            })?;
            let removed = removed.ok_or_else(|| anyhow!("category {} not found", id))?;
            println!("Deleted {} categories", removed.len());
        }
        NotesCmd::List { category } => {
            let doc = store.get();
            if !doc.categories.contains(&category) {
                bail!("category {} not found", category);
            }
            for note in doc.notes(&category) {
                println!(
                    "  - {}: {} (updated {})",
                    note.id,
                    note.title,
                    note.updated_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
        NotesCmd::Add {
            category,
            title,
            content,
        } => {
            let patch = NotePatch { title, content };
            let id = store
                .try_update(|doc| {
                    let id = doc.add_note(&category)?;
                    if patch.title.is_some() || patch.content.is_some() {
                        doc.update_note(&category, &id, &patch);
                    }
                    Some(id)
                })?
                .ok_or_else(|| anyhow!("category {} not found", category))?;
            println!("Added note {}", id);
        }
        NotesCmd::Edit {
            category,
            note,
            title,
            content,
        } => {
            let patch = NotePatch { title, content };
            if patch.title.is_none() && patch.content.is_none() {
                bail!("nothing to change");
            }
            let updated = store
                .try_update(|doc| doc.update_note(&category, &note, &patch).then_some(()))?
                .is_some();
            if !updated {
                bail!("note {} not found in {}", note, category);
            }
            println!("Updated note {}", note);
        }
        NotesCmd::Delete { category, note } => {
            store
                .try_update(|doc| doc.delete_note(&category, &note))?
                .ok_or_else(|| anyhow!("note {} not found in {}", note, category))?;
            println!("Deleted note {}", note);
        }
        NotesCmd::Attach { category, paths } => {
            let files = paths
                .iter()
                .map(|p| FileAttachment::from_path(p).with_context(|| format!("reading {}", p.display())))
                .collect::<Result<Vec<_>>>()?;
            let count = files.len();
            let added = store
                .try_update(|doc| doc.add_files(&category, files).then_some(()))?
                .is_some();
            if !added {
                bail!("category {} not found", category);
            }
            println!("Attached {} files to {}", count, category);
        }
        NotesCmd::Files { category } => {
            for file in store.get().files(&category) {
                println!("  - {}: {} ({}, {} bytes)", file.id, file.name, file.mime_type, file.size);
            }
        }
        NotesCmd::Detach { category, file } => {
            let removed = store
                .try_update(|doc| doc.delete_file(&category, &file))?
                .ok_or_else(|| anyhow!("file {} not found in {}", file, category))?;
            println!("Removed {}", removed.name);
        }
        NotesCmd::Open { category, file } => {
            let attachment = store
                .get()
                .files(&category)
                .iter()
                .find(|f| f.id == file || f.name == file)
                .ok_or_else(|| anyhow!("file {} not found in {}", file, category))?;
            let path = open_attachment(attachment, &session.config.temp_root())?;
            println!("Opened {}", path.display());
        }
    }
    Ok(())
}

pub fn canvas(session: &Session, cmd: CanvasCmd) -> Result<()> {
    let mut store = session.canvas()?;
    match cmd {
        CanvasCmd::Projects => {
            let doc = store.get();
            if doc.projects.is_empty() {
                println!("(no projects)");
            }
            for project in &doc.projects {
                let marker = if doc.active_project_id.as_deref() == Some(project.id.as_str()) {
                    "*"
                } else {
                    " "
                };
                println!(
                    "{} {}: {} ({} nodes, {} connections)",
                    marker,
                    project.id,
                    project.name,
                    project.nodes.len(),
                    project.connections.len()
                );
            }
        }
        CanvasCmd::CreateProject { name } => {
            let id = store
                .try_update(|doc| doc.create_project(&name))?
                .ok_or_else(|| anyhow!("project name cannot be empty"))?;
            println!("Created project {}", id);
        }
        CanvasCmd::UseProject { id } => {
            if store.try_update(|doc| doc.set_active(&id).then_some(()))?.is_none() {
                bail!("project {} not found", id);
            }
            println!("Active project is now {}", id);
        }
        CanvasCmd::RenameProject { id, name } => {
            if store
                .try_update(|doc| doc.rename_project(&id, &name).then_some(()))?
                .is_none()
            {
                bail!("project {} not found", id);
            }
            println!("Renamed project {}", id);
        }
        CanvasCmd::DeleteProject { id } => {
            store
                .try_update(|doc| doc.delete_project(&id))?
                .ok_or_else(|| anyhow!("project {} not found", id))?;
            println!("Deleted project {}", id);
        }
        CanvasCmd::Show => {
            let project = store
                .get()
                .active_project()
                .ok_or_else(|| anyhow!("no active project"))?;
            print_project(project);
        }
        CanvasCmd::AddNode { shape, x, y, title } => {
            let shape: Shape = shape.parse().map_err(|e: String| anyhow!(e))?;
            let id = with_project(&mut store, |p| {
                let id = p.add_node(shape, x, y)?;
                if let (Some(title), Some(node)) = (title, p.node_mut(&id)) {
                    node.title = title;
                }
                Some(id)
            })?;
            println!("Added node {}", id);
        }
        CanvasCmd::Delete { ids } => {
            let ids: HashSet<String> = ids.into_iter().collect();
            let count = with_project(&mut store, |p| match p.delete_nodes(&ids) {
                0 => None,
                n => Some(n),
            })?;
            println!("Deleted {} nodes", count);
        }
        CanvasCmd::Move { ids, dx, dy, zoom } => {
            let selection: HashSet<String> = ids.into_iter().collect();
            let mut viewport = Viewport::default();
            viewport.zoom_by(zoom - viewport.zoom);
            let moved = with_project(&mut store, |p| {
                let gesture = DragGesture::begin(p, &selection, Point::default());
                if gesture.is_empty() {
                    return None;
                }
                gesture.update(p, Point::new(dx, dy), &viewport);
                Some(gesture.len())
            })?;
            println!("Moved {} nodes", moved);
        }
        CanvasCmd::Duplicate { ids } => {
            let ids: HashSet<String> = ids.into_iter().collect();
            let created = with_project(&mut store, |p| {
                let created = p.duplicate(&ids);
                (!created.is_empty()).then_some(created)
            })?;
            println!("Created {}", created.join(", "));
        }
        CanvasCmd::Connect { from, to, label } => {
            let id = with_project(&mut store, |p| {
                let id = p.connect(&from, &to)?;
                if let Some(label) = &label {
                    p.set_connection_label(&id, label);
                }
                Some(id)
            })?;
            println!("Connected {} -> {} ({})", from, to, id);
        }
        CanvasCmd::Disconnect { id } => {
            with_project(&mut store, |p| p.delete_connection(&id).then_some(()))?;
            println!("Removed connection {}", id);
        }
        CanvasCmd::Label { id, text } => {
            with_project(&mut store, |p| p.set_connection_label(&id, &text).then_some(()))?;
            println!("Labelled connection {}", id);
        }
        CanvasCmd::Edit {
            ids,
            title,
            description,
            width,
            height,
            locked,
            visible,
        } => {
            let ids: HashSet<String> = ids.into_iter().collect();
            let patch = NodePatch {
                title,
                description,
                width,
                height,
                locked,
                visible,
                ..NodePatch::default()
            };
            let count = with_project(&mut store, |p| match p.update_nodes(&ids, &patch) {
                0 => None,
                n => Some(n),
            })?;
            println!("Updated {} nodes", count);
        }
        CanvasCmd::Style {
            ids,
            fill,
            stroke,
            stroke_width,
            text_color,
            font_size,
            opacity,
        } => {
            let ids: HashSet<String> = ids.into_iter().collect();
            let patch = StylePatch {
                fill_color: fill,
                stroke_color: stroke,
                stroke_width,
                text_color,
                font_size,
                opacity,
            };
            let count = with_project(&mut store, |p| match p.update_style(&ids, &patch) {
                0 => None,
                n => Some(n),
            })?;
            println!("Restyled {} nodes", count);
        }
        CanvasCmd::Select {
            x1,
            y1,
            x2,
            y2,
            zoom,
            pan_x,
            pan_y,
        } => {
            let project = store
                .get()
                .active_project()
                .ok_or_else(|| anyhow!("no active project"))?;
            let mut viewport = Viewport {
                pan: Point::new(pan_x, pan_y),
                ..Viewport::default()
            };
            viewport.zoom_by(zoom - viewport.zoom);
            let selected = marquee_select(&project.nodes, Point::new(x1, y1), Point::new(x2, y2), &viewport);
            for node in project.nodes.iter().filter(|n| selected.contains(&n.id)) {
                println!("{}", node.id);
            }
        }
        CanvasCmd::Section { action } => section(&mut store, action)?,
    }
    Ok(())
}

fn section(store: &mut DocumentStore<CanvasDocument>, cmd: SectionCmd) -> Result<()> {
    match cmd {
        SectionCmd::Toggle { node } => {
            let on = with_project(store, |p| {
                p.toggle_section_mode(&node).then(|| p.node(&node).map(|n| n.has_sections))?
            })?;
            println!("Sections {} on {}", if on { "enabled" } else { "disabled" }, node);
        }
        SectionCmd::Add { node } => {
            let id = with_project(store, |p| p.add_section(&node))?;
            println!("Added section {}", id);
        }
        SectionCmd::Remove { node, section } => {
            with_project(store, |p| p.remove_section(&node, &section).then_some(()))?;
            println!("Removed section {}", section);
        }
        SectionCmd::Up { node, section } => {
            with_project(store, |p| p.move_section_up(&node, &section).then_some(()))?;
            println!("Moved section {} up", section);
        }
        SectionCmd::Down { node, section } => {
            with_project(store, |p| p.move_section_down(&node, &section).then_some(()))?;
            println!("Moved section {} down", section);
        }
        SectionCmd::Edit {
            node,
            section,
            title,
            content,
            height,
        } => {
            let patch = SectionPatch {
                title,
                content,
                height,
                ..SectionPatch::default()
            };
            with_project(store, |p| p.update_section(&node, &section, &patch).then_some(()))?;
            println!("Updated section {}", section);
        }
    }
    Ok(())
}

pub fn export(session: &Session, path: &Path) -> Result<()> {
    let store = session.kanban()?;
    store
        .export(path)
        .with_context(|| format!("exporting to {}", path.display()))?;
    println!(
        "Exported {} boards to {}",
        store.document().boards.len(),
        path.display()
    );
    Ok(())
}

pub fn import(session: &Session, path: &Path) -> Result<()> {
    let mut store = session.kanban()?;
    let count = store
        .import(path)
        .with_context(|| format!("importing {}", path.display()))?;
    println!("Imported {} boards", count);
    Ok(())
}

/// Runs `f` on the active project, failing when there is none or `f` changes
/// nothing.
fn with_project<R>(
    store: &mut DocumentStore<CanvasDocument>,
    f: impl FnOnce(&mut Project) -> Option<R>,
) -> Result<R> {
    if store.get().active_project().is_none() {
        bail!("no active project; create one with `deskboard canvas create-project`");
    }
    store
        .try_update(|doc| doc.active_project_mut().and_then(f))?
        .ok_or_else(|| anyhow!("nothing changed (unknown id?)"))
}

fn active_board_id(store: &KanbanStore) -> Result<String> {
    store
        .document()
        .active_board_id
        .clone()
        .ok_or_else(|| anyhow!("no active board"))
}

fn parse_priority(input: &str) -> Result<Priority> {
    input.parse().map_err(|e: String| anyhow!(e))
}

fn parse_due(input: Option<&str>) -> Result<Option<NaiveDate>> {
    let raw = match input {
        Some(r) => r.trim(),
        None => return Ok(None),
    };
    if raw.is_empty() {
        return Ok(None);
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| anyhow!("invalid date format (use YYYY-MM-DD): {}", raw))?;
    Ok(Some(date))
}

fn print_board(board: &Board) {
    println!("Board: {} ({})", board.title, board.id);
    for (id, cards) in board.ordered_columns() {
        println!("{} [{}]", board.column_title(id), id);
        if cards.is_empty() {
            println!("  (empty)");
        }
        for card in cards {
            print_card(card);
        }
        println!();
    }
}

fn print_card(card: &Card) {
    println!("  - {}: {} [{}]", card.id, card.title, card.priority);
    if !card.description.is_empty() {
        println!("    {}", card.description);
    }
    if !card.tags.is_empty() {
        let tags: Vec<&str> = card.tags.iter().map(|t| t.text.as_str()).collect();
        println!("    tags: {}", tags.join(", "));
    }
    if let Some(who) = &card.assigned_to {
        println!("    assigned: {}", who);
    }
    if let Some(due) = card.due_date {
        println!("    due: {}", due.format("%Y-%m-%d"));
    }
    if !card.todos.is_empty() {
        let (done, total) = card.progress();
        println!("    todos: {}/{}", done, total);
        for todo in &card.todos {
            println!("      [{}] {} ({})", if todo.completed { "x" } else { " " }, todo.text, todo.id);
        }
    }
}

fn print_project(project: &Project) {
    println!("Project: {} ({})", project.name, project.id);
    for node in &project.nodes {
        println!(
            "  {} {:?} \"{}\" at ({:.0}, {:.0}) {:.0}x{:.0}",
            node.id,
            node.shape,
            node.title,
            node.x,
            node.y,
            node.width,
            node.total_height()
        );
        for section in &node.sections {
            println!("    | {} {} ({})", section.id, section.title, section.height);
        }
    }
    for conn in &project.connections {
        let label = if conn.label.is_empty() {
            String::new()
        } else {
            format!(" \"{}\"", conn.label)
        };
        println!("  {} {} -> {}{}", conn.id, conn.from, conn.to, label);
    }
}
