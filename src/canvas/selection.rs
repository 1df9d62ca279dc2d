// src/canvas/selection.rs

use std::collections::BTreeSet;

use super::graph::CanvasNode;

/// Axis-aligned selection rectangle in canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    /// Normalises negative sizes so dragging up/left works like down/right.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        let (x0, x1) = ordered(self.x, self.x + self.width);
        let (y0, y1) = ordered(self.y, self.y + self.height);
        x >= x0 && x <= x1 && y >= y0 && y <= y1
    }
}

fn ordered(a: f64, b: f64) -> (f64, f64) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SelectionManager {
    selected: BTreeSet<String>,
}

impl SelectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the selection with a single node.
    pub fn select(&mut self, id: &str) {
        self.selected.clear();
        self.selected.insert(id.to_string());
    }

    pub fn add(&mut self, id: &str) {
        self.selected.insert(id.to_string());
    }

    pub fn toggle(&mut self, id: &str) {
        if !self.selected.remove(id) {
            self.selected.insert(id.to_string());
        }
    }

    pub fn deselect(&mut self, id: &str) {
        self.selected.remove(id);
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    pub fn select_all(&mut self, nodes: &[CanvasNode]) {
        self.selected = nodes.iter().map(|n| n.id.clone()).collect();
    }

    pub fn select_in_rect(&mut self, nodes: &[CanvasNode], rect: Rect) {
        self.selected = nodes
            .iter()
            .filter(|n| rect.contains(n.position.x, n.position.y))
            .map(|n| n.id.clone())
            .collect();
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selected.contains(id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.selected.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }
}
