// src/canvas/mod.rs
//
// In-memory canvas editor state: graph model, undo/redo history and node
// selection. Nothing here performs I/O.

pub mod graph;
pub mod history;
pub mod selection;

pub use graph::{CanvasEdge, CanvasGraph, CanvasNode, GraphError, Position, Viewport};
pub use history::{CanvasHistory, HistorySnapshot, MAX_HISTORY};
pub use selection::{Rect, SelectionManager};
