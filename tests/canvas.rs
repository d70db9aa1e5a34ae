use std::collections::HashSet;

use deskboard::model::{marquee_select, CanvasDocument, DragGesture, NodePatch, Point, Shape, Viewport};
use deskboard::storage::{DataDir, DocumentStore};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn open_canvas() -> (TempDir, DataDir, DocumentStore<CanvasDocument>) {
    let dir = TempDir::new().unwrap();
    let data = DataDir::new(dir.path());
    data.ensure().unwrap();
    let store = DocumentStore::open(data.canvas_path()).unwrap();
    (dir, data, store)
}

#[test]
fn deleting_a_node_prunes_its_connections_on_disk() {
    let (_dir, data, mut store) = open_canvas();
    store.try_update(|doc| doc.create_project("Flow")).unwrap().unwrap();
    let (n1, n2, n3) = store
        .update(|doc| {
            let p = doc.active_project_mut().unwrap();
            let n1 = p.add_node(Shape::Rectangle, 0.0, 0.0).unwrap();
            let n2 = p.add_node(Shape::Circle, 300.0, 0.0).unwrap();
            let n3 = p.add_node(Shape::Diamond, 0.0, 300.0).unwrap();
            p.connect(&n1, &n2).unwrap();
            p.connect(&n3, &n1).unwrap();
            p.connect(&n2, &n3).unwrap();
            (n1, n2, n3)
        })
        .unwrap();

    let removed = store
        .update(|doc| {
            let ids = HashSet::from([n1.clone()]);
            doc.active_project_mut().unwrap().delete_nodes(&ids)
        })
        .unwrap();
    assert_eq!(removed, 1);

    let reopened = DocumentStore::<CanvasDocument>::open(data.canvas_path()).unwrap();
    let project = reopened.get().active_project().unwrap();
    assert_eq!(project.nodes.len(), 2);
    let edges: Vec<(&str, &str)> = project
        .connections
        .iter()
        .map(|c| (c.from.as_str(), c.to.as_str()))
        .collect();
    assert_eq!(edges, vec![(n2.as_str(), n3.as_str())]);
}

#[test]
fn marquee_and_drag_at_half_zoom() {
    let (_dir, _data, mut store) = open_canvas();
    store.try_update(|doc| doc.create_project("Zoomed")).unwrap().unwrap();
    let viewport = Viewport {
        zoom: 50.0,
        pan: Point::new(10.0, 10.0),
    };

    let (near, far) = store
        .update(|doc| {
            let p = doc.active_project_mut().unwrap();
            (
                p.add_node(Shape::Rectangle, 0.0, 0.0).unwrap(),
                p.add_node(Shape::Rectangle, 1000.0, 1000.0).unwrap(),
            )
        })
        .unwrap();

    // The near node spans screen (10,10)-(110,70) at 50% zoom.
    let project = store.get().active_project().unwrap();
    let hit = marquee_select(&project.nodes, Point::new(0.0, 0.0), Point::new(50.0, 50.0), &viewport);
    assert_eq!(hit, HashSet::from([near.clone()]));
    let miss = marquee_select(&project.nodes, Point::new(110.0, 70.0), Point::new(200.0, 200.0), &viewport);
    assert!(miss.is_empty());

    store
        .update(|doc| {
            let p = doc.active_project_mut().unwrap();
            let selection = HashSet::from([near.clone(), far.clone()]);
            let drag = DragGesture::begin(p, &selection, Point::new(100.0, 100.0));
            drag.update(p, Point::new(110.0, 100.0), &viewport);
            drag.update(p, Point::new(120.0, 90.0), &viewport);
        })
        .unwrap();

    let project = store.get().active_project().unwrap();
    let near_node = project.node(&near).unwrap();
    let far_node = project.node(&far).unwrap();
    assert_eq!((near_node.x, near_node.y), (40.0, -20.0));
    assert_eq!((far_node.x, far_node.y), (1040.0, 980.0));
}

#[test]
fn rejected_infinite_width_keeps_document_loadable() {
    let (_dir, data, mut store) = open_canvas();
    store.try_update(|doc| doc.create_project("Sizes")).unwrap().unwrap();
    let node = store
        .try_update(|doc| doc.active_project_mut()?.add_node(Shape::Rectangle, 0.0, 0.0))
        .unwrap()
        .unwrap();

    let patch = NodePatch {
        width: Some(f64::INFINITY),
        ..NodePatch::default()
    };
    let touched = store
        .update(|doc| {
            let ids = HashSet::from([node.clone()]);
            doc.active_project_mut().unwrap().update_nodes(&ids, &patch)
        })
        .unwrap();
    assert_eq!(touched, 0);

    let reopened = DocumentStore::<CanvasDocument>::open(data.canvas_path()).unwrap();
    let width = reopened.get().active_project().unwrap().node(&node).unwrap().width;
    assert_eq!(width, Shape::Rectangle.default_size().0);
}
