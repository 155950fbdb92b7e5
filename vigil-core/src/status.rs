//! Idle status panel
//!
//! Kernel idle hook that keeps two status lines on screen: the number of
//! tasks and the number of queries served. A line is redrawn only when
//! its value changed, so idle passes are cheap and never block.

use core::fmt::Write;

use heapless::String;

use crate::endpoint::QueryCounter;
use crate::scheduler::{IdleHook, IdleInfo};
use crate::traits::TextRenderer;

/// Position of the task count line
pub const TASKS_POS: (u16, u16) = (50, 100);

/// Position of the query count line
pub const QUERIES_POS: (u16, u16) = (50, 50);

/// Idle-time status panel
pub struct StatusPanel<'q, R> {
    renderer: R,
    queries: &'q QueryCounter,
    shown_tasks: Option<usize>,
    shown_queries: Option<u32>,
    redraws: u32,
}

impl<'q, R: TextRenderer> StatusPanel<'q, R> {
    /// Create a panel that has drawn nothing yet
    pub fn new(renderer: R, queries: &'q QueryCounter) -> Self {
        Self {
            renderer,
            queries,
            shown_tasks: None,
            shown_queries: None,
            redraws: 0,
        }
    }

    /// Number of lines drawn so far
    pub fn redraws(&self) -> u32 {
        self.redraws
    }

    /// Redraw whatever changed
    pub fn refresh(&mut self, task_count: usize) {
        if self.shown_tasks != Some(task_count) {
            self.shown_tasks = Some(task_count);
            let mut line: String<20> = String::new();
            let _ = write!(line, "Tasks: {}", task_count);
            self.draw(&line, TASKS_POS);
        }

        let queries = self.queries.count();
        if self.shown_queries != Some(queries) {
            self.shown_queries = Some(queries);
            let mut line: String<24> = String::new();
            let _ = write!(line, "Queries: {}", queries);
            self.draw(&line, QUERIES_POS);
        }
    }

    fn draw(&mut self, text: &str, (x, y): (u16, u16)) {
        self.renderer.draw_text(text, x, y, true);
        self.redraws = self.redraws.wrapping_add(1);
    }
}

impl<R: TextRenderer> IdleHook for StatusPanel<'_, R> {
    fn on_idle(&mut self, info: &IdleInfo) {
        self.refresh(info.task_count);
    }
}
