//! QWeb rendering engine and widget runtime.
//!
//! The [`QWeb`] instance registers and renders templates; the [`App`]
//! drives widgets: asynchronous mount protocol (modelled as an explicit
//! microtask queue), coalesced state updates, parent/child composition
//! through `t-widget`, refs, and lifecycle-hook ordering guarantees.

pub mod env;
pub mod error;
pub mod exec;
pub mod qweb;
pub mod scheduler;
pub mod value;
pub mod widget;

pub use env::{Env, WidgetFactory};
pub use error::{LifecycleError, RegisterError, RenderError, RuntimeError};
pub use exec::{
    HandlerDesc, HandlerHost, HandlerKind, PermissiveHost, RenderExtra, RenderOptions, WidgetDesc,
};
pub use qweb::{QWeb, Template};
pub use scheduler::{Scheduler, Task};
pub use value::Value;
pub use widget::{App, HookResult, Widget, WidgetCtx, WidgetId, WidgetRef};
