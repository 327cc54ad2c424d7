//! The widget environment.
//!
//! Shared by every widget of an application: the QWeb instance templates
//! render through, the factory registry `t-widget` resolves against, and
//! the id generator.

use crate::qweb::QWeb;
use crate::widget::Widget;
use indexmap::IndexMap;
use smol_str::SmolStr;
use std::cell::Cell;

/// Constructor for a widget registered under a `t-widget` name.
pub type WidgetFactory = Box<dyn Fn() -> Box<dyn Widget>>;

/// The application environment.
pub struct Env {
    /// The template engine.
    pub qweb: QWeb,
    factories: IndexMap<SmolStr, WidgetFactory>,
    next_id: Cell<u64>,
}

impl Env {
    /// Create an environment around a QWeb instance.
    pub fn new(qweb: QWeb) -> Self {
        Self {
            qweb,
            factories: IndexMap::new(),
            next_id: Cell::new(0),
        }
    }

    /// Register a widget factory for `t-widget` resolution.
    pub fn register_widget<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Box<dyn Widget> + 'static,
    {
        self.factories.insert(SmolStr::new(name), Box::new(factory));
    }

    /// Instantiate a registered widget.
    pub fn make_widget(&self, name: &str) -> Option<Box<dyn Widget>> {
        self.factories.get(name).map(|factory| factory())
    }

    /// Monotonically increasing id source.
    pub fn next_id(&self) -> u64 {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_generator() {
        let env = Env::new(QWeb::new());
        assert_eq!(env.next_id(), 1);
        assert_eq!(env.next_id(), 2);
    }
}
