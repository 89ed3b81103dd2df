//! Board state: grouped view, drop resolution, drag session and the
//! optimistic reorder engine.

pub mod drag;
pub mod engine;
pub mod resolver;
pub mod view;

pub use drag::DragSession;
pub use engine::{Board, BoardError, BoardEvent, ReorderPlan, plan_reorder};
pub use resolver::{DragEnd, DropTarget, ReorderIntent, resolve};
pub use view::GroupedView;
