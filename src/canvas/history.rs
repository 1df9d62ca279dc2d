// src/canvas/history.rs

use std::collections::VecDeque;

use super::graph::{CanvasEdge, CanvasNode};

pub const MAX_HISTORY: usize = 50;

#[derive(Debug, Clone, PartialEq)]
pub struct HistorySnapshot {
    pub nodes: Vec<CanvasNode>,
    pub edges: Vec<CanvasEdge>,
}

/// Undo/redo stack of canvas snapshots.
///
/// `current` points at the snapshot the editor is showing. Pushing after an
/// undo drops the redo tail; once the stack is full the oldest snapshot goes.
#[derive(Debug, Clone)]
pub struct CanvasHistory {
    entries: VecDeque<HistorySnapshot>,
    current: Option<usize>,
    capacity: usize,
}

impl Default for CanvasHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl CanvasHistory {
    pub fn new() -> Self {
        Self::with_capacity(MAX_HISTORY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        CanvasHistory {
            entries: VecDeque::with_capacity(capacity),
            current: None,
            capacity: capacity.max(1),
        }
    }

    pub fn initialize(&mut self, nodes: &[CanvasNode], edges: &[CanvasEdge]) {
        self.entries.clear();
        self.entries.push_back(HistorySnapshot {
            nodes: nodes.to_vec(),
            edges: edges.to_vec(),
        });
        self.current = Some(0);
    }

    pub fn push_state(&mut self, nodes: &[CanvasNode], edges: &[CanvasEdge]) {
        match self.current {
            Some(idx) => self.entries.truncate(idx + 1),
            None => self.entries.clear(),
        }

        self.entries.push_back(HistorySnapshot {
            nodes: nodes.to_vec(),
            edges: edges.to_vec(),
        });
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
        self.current = Some(self.entries.len() - 1);
    }

    pub fn undo(&mut self) -> Option<HistorySnapshot> {
        let idx = self.current.filter(|&i| i > 0)? - 1;
        self.current = Some(idx);
        self.entries.get(idx).cloned()
    }

    pub fn redo(&mut self) -> Option<HistorySnapshot> {
        let idx = self.current? + 1;
        let snapshot = self.entries.get(idx).cloned()?;
        self.current = Some(idx);
        Some(snapshot)
    }

    pub fn can_undo(&self) -> bool {
        matches!(self.current, Some(i) if i > 0)
    }

    pub fn can_redo(&self) -> bool {
        matches!(self.current, Some(i) if i + 1 < self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
