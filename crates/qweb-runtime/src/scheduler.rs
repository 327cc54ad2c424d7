//! The microtask queue.
//!
//! Single-threaded cooperative scheduling: state updates enqueue a render
//! task per widget, and [`crate::App::flush`] drains the queue in order. A
//! widget appears at most once per flush; re-renders scheduled while
//! flushing run in the same drain.

use crate::widget::WidgetId;
use std::collections::VecDeque;

/// A queued microtask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    /// Re-render a widget against its current state.
    Render(WidgetId),
}

/// FIFO microtask queue.
#[derive(Debug, Default)]
pub struct Scheduler {
    queue: VecDeque<Task>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a task. Callers coalesce per-widget scheduling through the
    /// widget's `render_scheduled` flag.
    pub fn schedule(&mut self, task: Task) {
        log::trace!("scheduling {:?} ({} queued)", task, self.queue.len() + 1);
        self.queue.push_back(task);
    }

    /// Pop the next task.
    pub fn next_task(&mut self) -> Option<Task> {
        let task = self.queue.pop_front();
        if let Some(task) = task {
            log::debug!("running {:?} ({} left)", task, self.queue.len());
        }
        task
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }
}
