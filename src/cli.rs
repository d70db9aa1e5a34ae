use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Coordinates, sizes and zoom must be finite; `inf` and `NaN` parse as
/// `f64` but cannot be stored.
fn finite_f64(raw: &str) -> Result<f64, String> {
    let value: f64 = raw.parse().map_err(|e| format!("{}: {}", raw, e))?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(format!("{} is not a finite number", raw))
    }
}

#[derive(Parser, Debug)]
#[command(name = "deskboard", version, about = "Kanban boards, notes and diagrams stored as local JSON")]
pub struct Cli {
    /// Data directory (overrides DESKBOARD_DATA_DIR and the config file)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Manage boards
    Board {
        #[command(subcommand)]
        action: BoardCmd,
    },
    /// Manage columns of the active board
    Column {
        #[command(subcommand)]
        action: ColumnCmd,
    },
    /// Manage cards on the active board
    Card {
        #[command(subcommand)]
        action: CardCmd,
    },
    /// Categories, notes and attachments
    Notes {
        #[command(subcommand)]
        action: NotesCmd,
    },
    /// Diagram projects
    Canvas {
        #[command(subcommand)]
        action: CanvasCmd,
    },
    /// Write all boards to a JSON file
    Export {
        path: PathBuf,
    },
    /// Replace all boards with the contents of an exported JSON file
    Import {
        path: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
pub enum BoardCmd {
    /// List boards
    List,
    /// Print the active board
    Show,
    /// Create a board and make it active
    Create { title: String },
    /// Rename a board (defaults to the active one)
    Rename {
        title: String,
        #[arg(long)]
        id: Option<String>,
    },
    /// Delete a board (the last board cannot be deleted)
    Delete { id: String },
    /// Make a board active
    Use { id: String },
}

#[derive(Subcommand, Debug)]
pub enum ColumnCmd {
    /// Add a column; its id is derived from the title
    Add { title: String },
    /// Delete a column and all of its cards
    Delete { id: String },
    /// Change a column's display title
    Rename { id: String, title: String },
    /// Move a column to the position of another column
    Move {
        id: String,
        /// Column whose position it takes
        target: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum CardCmd {
    /// Add a card
    Add {
        title: String,
        /// Column id (defaults to the first column)
        #[arg(long)]
        column: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// low, medium or high
        #[arg(long)]
        priority: Option<String>,
        /// Due date as YYYY-MM-DD
        #[arg(long)]
        due: Option<String>,
        #[arg(long)]
        assign: Option<String>,
    },
    /// Print a card
    Show { id: String },
    /// Edit card fields
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        priority: Option<String>,
        #[arg(long)]
        due: Option<String>,
        #[arg(long)]
        clear_due: bool,
        #[arg(long)]
        assign: Option<String>,
        #[arg(long)]
        unassign: bool,
        /// User-facing label, e.g. TASK-12
        #[arg(long)]
        label: Option<String>,
    },
    /// Move a card to the end of another column
    Move { id: String, column: String },
    /// Delete a card and its image
    Delete { id: String },
    /// Add a tag
    Tag {
        id: String,
        text: String,
        #[arg(long, default_value = "#3b82f6")]
        color: String,
    },
    /// Remove a tag
    Untag { id: String, text: String },
    /// Add a checklist item
    Todo { id: String, text: String },
    /// Toggle a checklist item
    Check { id: String, todo_id: String },
    /// Attach an image file to a card
    Image { id: String, path: PathBuf },
    /// Remove a card's image
    ClearImage { id: String },
}

#[derive(Subcommand, Debug)]
pub enum NotesCmd {
    /// Print the category tree
    Tree,
    /// Add a category
    AddCategory {
        name: String,
        #[arg(long)]
        parent: Option<String>,
        #[arg(long, default_value = "📁")]
        icon: String,
    },
    /// Delete a category, its subcategories, notes and files
    DeleteCategory { id: String },
    /// List notes in a category
    List { category: String },
    /// Add a note to a category
    Add {
        category: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        content: Option<String>,
    },
    /// Edit a note
    Edit {
        category: String,
        note: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        content: Option<String>,
    },
    /// Delete a note
    Delete { category: String, note: String },
    /// Attach files to a category
    Attach {
        category: String,
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// List attached files
    Files { category: String },
    /// Remove an attached file
    Detach { category: String, file: String },
    /// Open an attached file with the system default application
    Open { category: String, file: String },
}

#[derive(Subcommand, Debug)]
pub enum CanvasCmd {
    /// List projects
    Projects,
    /// Create a project and make it active
    CreateProject { name: String },
    /// Make a project active
    UseProject { id: String },
    /// Rename a project
    RenameProject { id: String, name: String },
    /// Delete a project
    DeleteProject { id: String },
    /// Print nodes and connections of the active project
    Show,
    /// Add a node
    AddNode {
        /// rectangle, rounded, diamond, circle, ellipse, hexagon, parallelogram or cylinder
        shape: String,
        #[arg(value_parser = finite_f64)]
        x: f64,
        #[arg(value_parser = finite_f64)]
        y: f64,
        #[arg(long)]
        title: Option<String>,
    },
    /// Delete nodes and their connections
    Delete {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Drag nodes by a screen-space offset
    Move {
        #[arg(required = true)]
        ids: Vec<String>,
        #[arg(long, value_parser = finite_f64, allow_hyphen_values = true, default_value_t = 0.0)]
        dx: f64,
        #[arg(long, value_parser = finite_f64, allow_hyphen_values = true, default_value_t = 0.0)]
        dy: f64,
        /// Zoom percentage the offset was measured at
        #[arg(long, value_parser = finite_f64, default_value_t = 100.0)]
        zoom: f64,
    },
    /// Duplicate nodes with an offset
    Duplicate {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Connect two nodes
    Connect {
        from: String,
        to: String,
        #[arg(long)]
        label: Option<String>,
    },
    /// Remove a connection
    Disconnect { id: String },
    /// Set a connection's label
    Label { id: String, text: String },
    /// Edit node fields
    Edit {
        #[arg(required = true)]
        ids: Vec<String>,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, value_parser = finite_f64)]
        width: Option<f64>,
        #[arg(long, value_parser = finite_f64)]
        height: Option<f64>,
        #[arg(long)]
        locked: Option<bool>,
        #[arg(long)]
        visible: Option<bool>,
    },
    /// Restyle nodes
    Style {
        #[arg(required = true)]
        ids: Vec<String>,
        #[arg(long)]
        fill: Option<String>,
        #[arg(long)]
        stroke: Option<String>,
        #[arg(long, value_parser = finite_f64)]
        stroke_width: Option<f64>,
        #[arg(long)]
        text_color: Option<String>,
        #[arg(long, value_parser = finite_f64)]
        font_size: Option<f64>,
        #[arg(long, value_parser = finite_f64)]
        opacity: Option<f64>,
    },
    /// List nodes intersecting a screen rectangle
    Select {
        #[arg(value_parser = finite_f64, allow_hyphen_values = true)]
        x1: f64,
        #[arg(value_parser = finite_f64, allow_hyphen_values = true)]
        y1: f64,
        #[arg(value_parser = finite_f64, allow_hyphen_values = true)]
        x2: f64,
        #[arg(value_parser = finite_f64, allow_hyphen_values = true)]
        y2: f64,
        #[arg(long, value_parser = finite_f64, default_value_t = 100.0)]
        zoom: f64,
        #[arg(long, value_parser = finite_f64, allow_hyphen_values = true, default_value_t = 0.0)]
        pan_x: f64,
        #[arg(long, value_parser = finite_f64, allow_hyphen_values = true, default_value_t = 0.0)]
        pan_y: f64,
    },
    /// Manage the stacked sections of a node
    Section {
        #[command(subcommand)]
        action: SectionCmd,
    },
}

#[derive(Subcommand, Debug)]
pub enum SectionCmd {
    /// Turn section mode on or off
    Toggle { node: String },
    /// Append a section
    Add { node: String },
    /// Remove a section
    Remove { node: String, section: String },
    /// Move a section one slot up
    Up { node: String, section: String },
    /// Move a section one slot down
    Down { node: String, section: String },
    /// Edit a section
    Edit {
        node: String,
        section: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        content: Option<String>,
        #[arg(long, value_parser = finite_f64)]
        height: Option<f64>,
    },
}
