use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::new_id;

pub type NodeId = String;
pub type ProjectId = String;

const PASTE_OFFSET: f64 = 30.0;
const DUPLICATE_OFFSET: f64 = 40.0;
const MIN_HEADER_HEIGHT: f64 = 36.0;
const DEFAULT_SECTION_HEIGHT: f64 = 32.0;
const MIN_ZOOM: f64 = 25.0;
const MAX_ZOOM: f64 = 200.0;

/// serde_json writes NaN and infinities as `null`, which the `f64` fields
/// then refuse on load, so such values never enter a document.
fn all_finite(values: &[Option<f64>]) -> bool {
    values.iter().flatten().all(|v| v.is_finite())
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct CanvasDocument {
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub active_project_id: Option<ProjectId>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub connections: Vec<Connection>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    Rectangle,
    Rounded,
    Diamond,
    Circle,
    Ellipse,
    Hexagon,
    Parallelogram,
    Cylinder,
}

impl std::str::FromStr for Shape {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let shape = match s.to_ascii_lowercase().as_str() {
            "rectangle" => Shape::Rectangle,
            "rounded" => Shape::Rounded,
            "diamond" => Shape::Diamond,
            "circle" => Shape::Circle,
            "ellipse" => Shape::Ellipse,
            "hexagon" => Shape::Hexagon,
            "parallelogram" => Shape::Parallelogram,
            "cylinder" => Shape::Cylinder,
            other => return Err(format!("unknown shape: {}", other)),
        };
        Ok(shape)
    }
}

impl Shape {
    /// Width and height a freshly placed node gets.
    pub fn default_size(self) -> (f64, f64) {
        match self {
            Shape::Circle => (120.0, 120.0),
            _ => (200.0, 120.0),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,
    pub shape: Shape,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub style: NodeStyle,
    #[serde(default)]
    pub sections: Vec<Section>,
    #[serde(default)]
    pub has_sections: bool,
    #[serde(default)]
    pub locked: bool,
    #[serde(default = "visible_by_default")]
    pub visible: bool,
}

fn visible_by_default() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeStyle {
    pub fill_color: String,
    pub stroke_color: String,
    pub stroke_width: f64,
    pub corner_radius: f64,
    pub opacity: f64,
    pub text_color: String,
    pub font_size: f64,
    pub font_weight: String,
    pub text_align: String,
}

impl Default for NodeStyle {
    fn default() -> Self {
        NodeStyle {
            fill_color: "#1a252b".into(),
            stroke_color: "#13a4ec".into(),
            stroke_width: 2.0,
            corner_radius: 8.0,
            opacity: 1.0,
            text_color: "#ffffff".into(),
            font_size: 14.0,
            font_weight: "normal".into(),
            text_align: "center".into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub bg_color: String,
    #[serde(default)]
    pub text_color: String,
    #[serde(default = "default_section_height")]
    pub height: f64,
}

fn default_section_height() -> f64 {
    DEFAULT_SECTION_HEIGHT
}

impl Section {
    pub fn new() -> Self {
        Section {
            id: new_id("sec"),
            title: "Section".into(),
            content: String::new(),
            bg_color: "#283339".into(),
            text_color: "#ffffff".into(),
            height: DEFAULT_SECTION_HEIGHT,
        }
    }
}

impl Default for Section {
    fn default() -> Self {
        Section::new()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Connection {
    pub id: String,
    pub from: NodeId,
    pub to: NodeId,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub style: ConnectionStyle,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ConnectionStyle {
    pub color: String,
    pub width: f64,
    pub dashed: bool,
}

impl Default for ConnectionStyle {
    fn default() -> Self {
        ConnectionStyle {
            color: "#13a4ec".into(),
            width: 2.0,
            dashed: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodePatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub shape: Option<Shape>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub locked: Option<bool>,
    pub visible: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StylePatch {
    pub fill_color: Option<String>,
    pub stroke_color: Option<String>,
    pub stroke_width: Option<f64>,
    pub text_color: Option<String>,
    pub font_size: Option<f64>,
    pub opacity: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SectionPatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub bg_color: Option<String>,
    pub text_color: Option<String>,
    pub height: Option<f64>,
}

impl NodePatch {
    pub fn is_finite(&self) -> bool {
        all_finite(&[self.x, self.y, self.width, self.height])
    }
}

impl StylePatch {
    pub fn is_finite(&self) -> bool {
        all_finite(&[self.stroke_width, self.font_size, self.opacity])
    }
}

impl SectionPatch {
    pub fn is_finite(&self) -> bool {
        all_finite(&[self.height])
    }
}

impl Node {
    pub fn new(shape: Shape, x: f64, y: f64) -> Self {
        let (width, height) = shape.default_size();
        Node {
            id: new_id("node"),
            shape,
            x,
            y,
            width,
            height,
            title: "New Item".into(),
            description: String::new(),
            style: NodeStyle::default(),
            sections: Vec::new(),
            has_sections: false,
            locked: false,
            visible: true,
        }
    }

    /// Rendered height: in section mode the header keeps at least
    /// `MIN_HEADER_HEIGHT` above the stacked sections.
    pub fn total_height(&self) -> f64 {
        if !self.has_sections || self.sections.is_empty() {
            return self.height;
        }
        let sections: f64 = self.sections.iter().map(|s| s.height).sum();
        let header = (self.height - sections).max(MIN_HEADER_HEIGHT);
        header + sections
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.total_height() / 2.0)
    }

    /// Copy with fresh node and section ids, placed at `(x, y)`.
    fn cloned_at(&self, x: f64, y: f64) -> Node {
        let mut node = self.clone();
        node.id = new_id("node");
        node.x = x;
        node.y = y;
        for section in &mut node.sections {
            section.id = new_id("sec");
        }
        node
    }

    fn apply(&mut self, patch: &NodePatch) {
        if let Some(t) = &patch.title {
            self.title = t.clone();
        }
        if let Some(d) = &patch.description {
            self.description = d.clone();
        }
        if let Some(s) = patch.shape {
            self.shape = s;
        }
        if let Some(x) = patch.x {
            self.x = x;
        }
        if let Some(y) = patch.y {
            self.y = y;
        }
        if let Some(w) = patch.width {
            self.width = w;
        }
        if let Some(h) = patch.height {
            self.height = h;
        }
        if let Some(l) = patch.locked {
            self.locked = l;
        }
        if let Some(v) = patch.visible {
            self.visible = v;
        }
    }

    fn apply_style(&mut self, patch: &StylePatch) {
        let style = &mut self.style;
        if let Some(c) = &patch.fill_color {
            style.fill_color = c.clone();
        }
        if let Some(c) = &patch.stroke_color {
            style.stroke_color = c.clone();
        }
        if let Some(w) = patch.stroke_width {
            style.stroke_width = w;
        }
        if let Some(c) = &patch.text_color {
            style.text_color = c.clone();
        }
        if let Some(f) = patch.font_size {
            style.font_size = f;
        }
        if let Some(o) = patch.opacity {
            style.opacity = o.clamp(0.0, 1.0);
        }
    }

    fn section_index(&self, section_id: &str) -> Option<usize> {
        self.sections.iter().position(|s| s.id == section_id)
    }
}

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        Project {
            id: new_id("project"),
            name: name.into(),
            nodes: Vec::new(),
            connections: Vec::new(),
        }
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    /// Places a node of the shape's default size. Non-finite coordinates
    /// are refused.
    pub fn add_node(&mut self, shape: Shape, x: f64, y: f64) -> Option<NodeId> {
        if !Point::new(x, y).is_finite() {
            return None;
        }
        let node = Node::new(shape, x, y);
        let id = node.id.clone();
        self.nodes.push(node);
        Some(id)
    }

    /// Removes the nodes and every connection touching one of them.
    pub fn delete_nodes(&mut self, ids: &HashSet<NodeId>) -> usize {
        let before = self.nodes.len();
        self.nodes.retain(|n| !ids.contains(&n.id));
        self.connections
            .retain(|c| !ids.contains(&c.from) && !ids.contains(&c.to));
        before - self.nodes.len()
    }

    /// Adds a directed edge. Self-loops and unknown endpoints are refused.
    pub fn connect(&mut self, from: &str, to: &str) -> Option<String> {
        if from == to || self.node(from).is_none() || self.node(to).is_none() {
            return None;
        }
        let id = new_id("conn");
        self.connections.push(Connection {
            id: id.clone(),
            from: from.to_string(),
            to: to.to_string(),
            label: String::new(),
            style: ConnectionStyle::default(),
        });
        Some(id)
    }

    pub fn delete_connection(&mut self, id: &str) -> bool {
        let before = self.connections.len();
        self.connections.retain(|c| c.id != id);
        self.connections.len() != before
    }

    pub fn set_connection_label(&mut self, id: &str, label: &str) -> bool {
        match self.connections.iter_mut().find(|c| c.id == id) {
            Some(conn) => {
                conn.label = label.to_string();
                true
            }
            None => false,
        }
    }

    pub fn select_all(&self) -> HashSet<NodeId> {
        self.nodes.iter().map(|n| n.id.clone()).collect()
    }

    /// Snapshot of the selected nodes, in canvas order.
    pub fn copy(&self, ids: &HashSet<NodeId>) -> Vec<Node> {
        self.nodes
            .iter()
            .filter(|n| ids.contains(&n.id))
            .cloned()
            .collect()
    }

    /// Inserts clones of `clipboard` with fresh ids, either at `at` or offset
    /// from their original position. Returns the new ids as the selection.
    pub fn paste(&mut self, clipboard: &[Node], at: Option<Point>) -> Vec<NodeId> {
        if at.is_some_and(|p| !p.is_finite()) {
            return Vec::new();
        }
        let pasted: Vec<Node> = clipboard
            .iter()
            .map(|n| match at {
                Some(p) => n.cloned_at(p.x, p.y),
                None => n.cloned_at(n.x + PASTE_OFFSET, n.y + PASTE_OFFSET),
            })
            .collect();
        let ids = pasted.iter().map(|n| n.id.clone()).collect();
        self.nodes.extend(pasted);
        ids
    }

    pub fn duplicate(&mut self, ids: &HashSet<NodeId>) -> Vec<NodeId> {
        let copies: Vec<Node> = self
            .nodes
            .iter()
            .filter(|n| ids.contains(&n.id))
            .map(|n| n.cloned_at(n.x + DUPLICATE_OFFSET, n.y + DUPLICATE_OFFSET))
            .collect();
        let new_ids = copies.iter().map(|n| n.id.clone()).collect();
        self.nodes.extend(copies);
        new_ids
    }

    /// Returns how many nodes changed; a patch carrying a non-finite number
    /// changes none.
    pub fn update_nodes(&mut self, ids: &HashSet<NodeId>, patch: &NodePatch) -> usize {
        if !patch.is_finite() {
            return 0;
        }
        let mut touched = 0;
        for node in self.nodes.iter_mut().filter(|n| ids.contains(&n.id)) {
            node.apply(patch);
            touched += 1;
        }
        touched
    }

    pub fn update_style(&mut self, ids: &HashSet<NodeId>, patch: &StylePatch) -> usize {
        if !patch.is_finite() {
            return 0;
        }
        let mut touched = 0;
        for node in self.nodes.iter_mut().filter(|n| ids.contains(&n.id)) {
            node.apply_style(patch);
            touched += 1;
        }
        touched
    }

    /// Flips section mode; turning it on seeds two sections when the node has
    /// none.
    pub fn toggle_section_mode(&mut self, node_id: &str) -> bool {
        let node = match self.node_mut(node_id) {
            Some(node) => node,
            None => return false,
        };
        node.has_sections = !node.has_sections;
        if node.has_sections && node.sections.is_empty() {
            node.sections = vec![Section::new(), Section::new()];
        }
        true
    }

    pub fn add_section(&mut self, node_id: &str) -> Option<String> {
        let node = self.node_mut(node_id)?;
        let section = Section::new();
        let id = section.id.clone();
        node.sections.push(section);
        node.has_sections = true;
        Some(id)
    }

    pub fn remove_section(&mut self, node_id: &str, section_id: &str) -> bool {
        let node = match self.node_mut(node_id) {
            Some(node) => node,
            None => return false,
        };
        let before = node.sections.len();
        node.sections.retain(|s| s.id != section_id);
        node.has_sections = !node.sections.is_empty();
        node.sections.len() != before
    }

    pub fn update_section(&mut self, node_id: &str, section_id: &str, patch: &SectionPatch) -> bool {
        if !patch.is_finite() {
            return false;
        }
        let section = match self
            .node_mut(node_id)
            .and_then(|n| n.sections.iter_mut().find(|s| s.id == section_id))
        {
            Some(s) => s,
            None => return false,
        };
        if let Some(t) = &patch.title {
            section.title = t.clone();
        }
        if let Some(c) = &patch.content {
            section.content = c.clone();
        }
        if let Some(c) = &patch.bg_color {
            section.bg_color = c.clone();
        }
        if let Some(c) = &patch.text_color {
            section.text_color = c.clone();
        }
        if let Some(h) = patch.height {
            section.height = h;
        }
        true
    }

    /// Swaps the section with its upper neighbour.
    pub fn move_section_up(&mut self, node_id: &str, section_id: &str) -> bool {
        let node = match self.node_mut(node_id) {
            Some(node) => node,
            None => return false,
        };
        match node.section_index(section_id) {
            Some(idx) if idx > 0 => {
                node.sections.swap(idx - 1, idx);
                true
            }
            _ => false,
        }
    }

    /// Swaps the section with its lower neighbour.
    pub fn move_section_down(&mut self, node_id: &str, section_id: &str) -> bool {
        let node = match self.node_mut(node_id) {
            Some(node) => node,
            None => return false,
        };
        match node.section_index(section_id) {
            Some(idx) if idx + 1 < node.sections.len() => {
                node.sections.swap(idx, idx + 1);
                true
            }
            _ => false,
        }
    }

    /// Anchor point for connections drawn to or from the node.
    pub fn node_center(&self, id: &str) -> Option<Point> {
        self.node(id).map(Node::center)
    }
}

/// Zoom (percent) and pan offset mapping canvas space to screen space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub zoom: f64,
    pub pan: Point,
}

impl Default for Viewport {
    fn default() -> Self {
        Viewport {
            zoom: 100.0,
            pan: Point::default(),
        }
    }
}

impl Viewport {
    pub fn scale(&self) -> f64 {
        self.zoom / 100.0
    }

    pub fn zoom_by(&mut self, delta: f64) {
        if !delta.is_finite() {
            return;
        }
        self.zoom = (self.zoom + delta).clamp(MIN_ZOOM, MAX_ZOOM);
    }

    pub fn to_canvas(&self, screen: Point) -> Point {
        let s = self.scale();
        Point::new((screen.x - self.pan.x) / s, (screen.y - self.pan.y) / s)
    }

    pub fn to_screen(&self, canvas: Point) -> Point {
        let s = self.scale();
        Point::new(canvas.x * s + self.pan.x, canvas.y * s + self.pan.y)
    }
}

/// Nodes whose screen-space box intersects the rectangle spanned by `start`
/// and `end`. Edges are exclusive, so a rectangle that only touches a node's
/// border does not select it.
pub fn marquee_select(nodes: &[Node], start: Point, end: Point, viewport: &Viewport) -> HashSet<NodeId> {
    let min_x = start.x.min(end.x);
    let max_x = start.x.max(end.x);
    let min_y = start.y.min(end.y);
    let max_y = start.y.max(end.y);
    let scale = viewport.scale();

    nodes
        .iter()
        .filter(|node| {
            let top_left = viewport.to_screen(Point::new(node.x, node.y));
            let right = top_left.x + node.width * scale;
            let bottom = top_left.y + node.height * scale;
            top_left.x < max_x && right > min_x && top_left.y < max_y && bottom > min_y
        })
        .map(|node| node.id.clone())
        .collect()
}

/// Selection after pressing on a node. With `additive` (shift held) the node
/// is toggled in the current selection; otherwise it becomes the only one.
pub fn press_selection(current: &HashSet<NodeId>, node_id: &str, additive: bool) -> HashSet<NodeId> {
    if !additive {
        return HashSet::from([node_id.to_string()]);
    }
    let mut next = current.clone();
    if !next.remove(node_id) {
        next.insert(node_id.to_string());
    }
    next
}

/// A pointer drag over a selection. Positions are always recomputed from the
/// snapshot taken at `begin`, never from the previous frame.
#[derive(Debug, Clone)]
pub struct DragGesture {
    start: Point,
    originals: HashMap<NodeId, Point>,
}

impl DragGesture {
    pub fn begin(project: &Project, selection: &HashSet<NodeId>, pointer: Point) -> Self {
        let originals = project
            .nodes
            .iter()
            .filter(|n| selection.contains(&n.id))
            .map(|n| (n.id.clone(), Point::new(n.x, n.y)))
            .collect();
        DragGesture {
            start: pointer,
            originals,
        }
    }

    /// Moves the dragged nodes to follow `pointer`. A degenerate viewport
    /// (zero, negative or non-finite zoom), or a move that would leave any
    /// coordinate non-finite, leaves the nodes in place.
    pub fn update(&self, project: &mut Project, pointer: Point, viewport: &Viewport) {
        let scale = viewport.scale();
        if !(scale.is_finite() && scale > 0.0) {
            return;
        }
        let dx = (pointer.x - self.start.x) / scale;
        let dy = (pointer.y - self.start.y) / scale;
        let fits = self
            .originals
            .values()
            .all(|origin| Point::new(origin.x + dx, origin.y + dy).is_finite());
        if !fits {
            return;
        }
        for node in &mut project.nodes {
            if let Some(origin) = self.originals.get(&node.id) {
                node.x = origin.x + dx;
                node.y = origin.y + dy;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.originals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.originals.is_empty()
    }
}

impl CanvasDocument {
    pub fn create_project(&mut self, name: &str) -> Option<ProjectId> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let project = Project::new(name);
        let id = project.id.clone();
        self.projects.push(project);
        self.active_project_id = Some(id.clone());
        Some(id)
    }

    pub fn rename_project(&mut self, id: &str, name: &str) -> bool {
        let name = name.trim();
        match self.projects.iter_mut().find(|p| p.id == id) {
            Some(p) if !name.is_empty() => {
                p.name = name.to_string();
                true
            }
            _ => false,
        }
    }

    pub fn delete_project(&mut self, id: &str) -> Option<Project> {
        let idx = self.projects.iter().position(|p| p.id == id)?;
        let removed = self.projects.remove(idx);
        if self.active_project_id.as_deref() == Some(id) {
            self.active_project_id = self.projects.first().map(|p| p.id.clone());
        }
        Some(removed)
    }

    pub fn set_active(&mut self, id: &str) -> bool {
        if !self.projects.iter().any(|p| p.id == id) {
            return false;
        }
        self.active_project_id = Some(id.to_string());
        true
    }

    pub fn resolve_active(&mut self) {
        let valid = self
            .active_project_id
            .as_ref()
            .is_some_and(|id| self.projects.iter().any(|p| &p.id == id));
        if !valid {
            self.active_project_id = self.projects.first().map(|p| p.id.clone());
        }
    }

    pub fn active_project(&self) -> Option<&Project> {
        let id = self.active_project_id.as_deref()?;
        self.projects.iter().find(|p| p.id == id)
    }

    pub fn active_project_mut(&mut self) -> Option<&mut Project> {
        let id = self.active_project_id.clone()?;
        self.projects.iter_mut().find(|p| p.id == id)
    }
}
