//! The widget runtime.
//!
//! Widgets are arena-backed: an [`App`] owns the document, the environment
//! and every widget slot; a [`WidgetId`] is an index into the arena, and a
//! child holds a non-owning back-reference to its parent. User code
//! implements [`Widget`] for behavior; the runtime drives the lifecycle
//! (create → willStart → render → mount → update → destroy), patches
//! vnode trees into the document, resolves `t-widget` placeholders into
//! child widgets, and binds `t-ref` targets after each patch.

use crate::env::Env;
use crate::error::{LifecycleError, RuntimeError};
use crate::exec::{self, HandlerDesc, HandlerHost, HandlerKind, RenderExtra, WidgetDesc};
use crate::scheduler::{Scheduler, Task};
use crate::value::Value;
use indexmap::IndexMap;
use qweb_dom::patch::{self as vdom, Modules};
use qweb_dom::{Document, NodeId, VElement, VNode};
use smol_str::SmolStr;
use std::collections::HashMap;

/// Index of a widget in the application arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WidgetId(pub u32);

impl WidgetId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// A `t-ref` binding: a document node, or the child widget instance when
/// the node also carried `t-widget`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetRef {
    Node(NodeId),
    Widget(WidgetId),
}

/// Result type for user lifecycle hooks.
pub type HookResult = Result<(), LifecycleError>;

/// User-implemented widget behavior.
///
/// The runtime owns the state; hooks reach it (and the rest of the
/// application) through [`WidgetCtx`].
pub trait Widget: 'static {
    /// Template rendered for this widget.
    fn template(&self) -> &str;

    /// Widget name used in diagnostics.
    fn name(&self) -> &str {
        self.template()
    }

    /// Initial state, owned by the runtime afterwards.
    fn initial_state(&self) -> Value {
        Value::Null
    }

    /// Awaited before the first render; no DOM exists yet.
    fn will_start(&mut self, _ctx: &mut WidgetCtx<'_>) -> HookResult {
        Ok(())
    }

    /// Called once the widget's subtree is in the document, children first.
    fn mounted(&mut self, _ctx: &mut WidgetCtx<'_>) -> HookResult {
        Ok(())
    }

    /// Called before re-rendering a mounted widget.
    fn will_patch(&mut self, _ctx: &mut WidgetCtx<'_>) -> HookResult {
        Ok(())
    }

    /// Called after a re-render patched the document.
    fn patched(&mut self, _ctx: &mut WidgetCtx<'_>) -> HookResult {
        Ok(())
    }

    /// Called before a mounted widget is detached.
    fn will_unmount(&mut self, _ctx: &mut WidgetCtx<'_>) -> HookResult {
        Ok(())
    }

    /// Whether a named `t-on-*` handler resolves on this widget.
    fn has_handler(&self, _name: &str) -> bool {
        false
    }

    /// Invoke a named handler; `args` are the render-time evaluated
    /// arguments of a call-form handler.
    fn handle_event(&mut self, _name: &str, _args: &[Value], _ctx: &mut WidgetCtx<'_>) -> HookResult {
        Ok(())
    }
}

/// Handle passed to hooks and event handlers: the widget's view of the
/// application.
pub struct WidgetCtx<'a> {
    pub app: &'a mut App,
    pub id: WidgetId,
}

impl WidgetCtx<'_> {
    /// The widget's current state.
    pub fn state(&self) -> &Value {
        self.app.state(self.id).expect("widget state")
    }

    /// Merge a patch into the state and schedule a render on the next
    /// microtask.
    pub fn update_state(&mut self, patch: Value) {
        self.app.update_state(self.id, patch);
    }

    /// The shared environment.
    pub fn env(&self) -> &Env {
        &self.app.env
    }

    /// The widget's root node, if rendered.
    pub fn el(&self) -> Option<NodeId> {
        self.app.el(self.id)
    }

    /// A `t-ref` binding by name.
    pub fn get_ref(&self, name: &str) -> Option<WidgetRef> {
        self.app.widget_ref(self.id, name)
    }
}

struct WidgetSlot {
    /// Taken out while a hook runs on this widget.
    spec: Option<Box<dyn Widget>>,
    name: SmolStr,
    template: SmolStr,
    state: Value,
    parent: Option<WidgetId>,
    children: Vec<WidgetId>,
    vnode: Option<VNode>,
    el: Option<NodeId>,
    refs: IndexMap<SmolStr, WidgetRef>,
    /// Handler descriptors of the latest render, addressed by listener
    /// tokens.
    handlers: Vec<HandlerDesc>,
    started: bool,
    is_mounted: bool,
    is_destroyed: bool,
    render_scheduled: bool,
}

/// The widget application: document, environment, widget arena and the
/// microtask queue.
pub struct App {
    pub doc: Document,
    pub env: Env,
    slots: Vec<WidgetSlot>,
    scheduler: Scheduler,
}

impl App {
    pub fn new(env: Env) -> Self {
        Self {
            doc: Document::new(),
            env,
            slots: Vec::new(),
            scheduler: Scheduler::new(),
        }
    }

    /// Create a root-level widget in the constructing state.
    pub fn create_widget(&mut self, spec: Box<dyn Widget>) -> WidgetId {
        self.create_slot(spec, None)
    }

    /// Create a widget owned by `parent`.
    pub fn create_child(&mut self, parent: WidgetId, spec: Box<dyn Widget>) -> WidgetId {
        let id = self.create_slot(spec, Some(parent));
        if let Some(slot) = self.slots.get_mut(parent.index()) {
            slot.children.push(id);
        }
        id
    }

    fn create_slot(&mut self, spec: Box<dyn Widget>, parent: Option<WidgetId>) -> WidgetId {
        let id = WidgetId(self.slots.len() as u32);
        self.slots.push(WidgetSlot {
            name: SmolStr::new(spec.name()),
            template: SmolStr::new(spec.template()),
            state: spec.initial_state(),
            spec: Some(spec),
            parent,
            children: Vec::new(),
            vnode: None,
            el: None,
            refs: IndexMap::new(),
            handlers: Vec::new(),
            started: false,
            is_mounted: false,
            is_destroyed: false,
            render_scheduled: false,
        });
        id
    }

    // accessors

    pub fn state(&self, id: WidgetId) -> Option<&Value> {
        self.slots.get(id.index()).map(|s| &s.state)
    }

    pub fn el(&self, id: WidgetId) -> Option<NodeId> {
        self.slots.get(id.index()).and_then(|s| s.el)
    }

    pub fn is_mounted(&self, id: WidgetId) -> bool {
        self.slots.get(id.index()).map(|s| s.is_mounted).unwrap_or(false)
    }

    pub fn is_destroyed(&self, id: WidgetId) -> bool {
        self.slots.get(id.index()).map(|s| s.is_destroyed).unwrap_or(true)
    }

    pub fn parent(&self, id: WidgetId) -> Option<WidgetId> {
        self.slots.get(id.index()).and_then(|s| s.parent)
    }

    pub fn children(&self, id: WidgetId) -> &[WidgetId] {
        self.slots
            .get(id.index())
            .map(|s| s.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn widget_ref(&self, id: WidgetId, name: &str) -> Option<WidgetRef> {
        self.slots
            .get(id.index())
            .and_then(|s| s.refs.get(name))
            .copied()
    }

    /// Serialized HTML of a widget's subtree, for assertions and tooling.
    pub fn html(&self, id: WidgetId) -> Option<String> {
        self.el(id).map(|el| self.doc.outer_html(el))
    }

    // lifecycle operations

    /// Mount a widget under `target`: willStart → render → create DOM →
    /// insert; `mounted` fires only when `target` is in the document.
    pub fn mount(&mut self, id: WidgetId, target: NodeId) -> Result<(), RuntimeError> {
        if self.is_destroyed(id) {
            return Err(RuntimeError::Destroyed);
        }
        self.start_widget(id)?;
        if self.is_destroyed(id) {
            // destroyed during willStart: the mount becomes a no-op
            return Ok(());
        }

        let (mut vnode, descs) = self.render_widget(id)?;
        let names = self.widget_names();
        let mut modules = RuntimeModules {
            effects: Vec::new(),
            names: &names,
            descs: &descs,
        };
        let elm = vdom::create_element(&mut self.doc, &mut vnode, &mut modules);
        let effects = modules.effects;

        let slot = &mut self.slots[id.index()];
        slot.el = Some(elm);
        slot.vnode = Some(vnode);

        // children run willStart and render while the tree is still
        // detached; nothing is in the document yet
        self.process_effects(id, effects, &descs)?;

        // a root-level placeholder was replaced by its child's root
        let elm = self.slots[id.index()]
            .vnode
            .as_ref()
            .and_then(|v| v.elm())
            .unwrap_or(elm);
        self.slots[id.index()].el = Some(elm);

        self.doc.append_child(target, elm);
        let mut modules = RuntimeModules {
            effects: Vec::new(),
            names: &names,
            descs: &descs,
        };
        if let Some(vnode) = self.slots[id.index()].vnode.as_mut() {
            vdom::flush_inserts(&mut self.doc, vnode, &mut modules);
        }
        let effects = modules.effects;
        self.process_effects(id, effects, &descs)?;

        if self.doc.in_document(target) {
            self.call_mounted(id)?;
        }
        Ok(())
    }

    /// Fire deferred `mounted` hooks after the widget's subtree entered the
    /// document through external DOM manipulation.
    pub fn notify_inserted(&mut self, id: WidgetId) -> Result<(), RuntimeError> {
        match self.el(id) {
            Some(el) if self.doc.in_document(el) => self.call_mounted(id),
            _ => Ok(()),
        }
    }

    /// Merge a patch into the widget state. Rendering is scheduled on the
    /// microtask queue and coalesced per widget; before the first render
    /// this only merges.
    pub fn update_state(&mut self, id: WidgetId, patch: Value) {
        let Some(slot) = self.slots.get_mut(id.index()) else {
            return;
        };
        if slot.is_destroyed {
            return;
        }
        slot.state.merge(patch);
        if slot.el.is_none() || slot.render_scheduled {
            return;
        }
        slot.render_scheduled = true;
        self.scheduler.schedule(Task::Render(id));
    }

    /// Drain the microtask queue, running the coalesced renders.
    pub fn flush(&mut self) -> Result<(), RuntimeError> {
        while let Some(Task::Render(id)) = self.scheduler.next_task() {
            let Some(slot) = self.slots.get_mut(id.index()) else {
                continue;
            };
            slot.render_scheduled = false;
            // a pending render of a destroyed widget is a no-op
            if slot.is_destroyed {
                continue;
            }
            self.rerender(id)?;
        }
        Ok(())
    }

    /// Destroy a widget: willUnmount, children first, detach, clear refs.
    /// Idempotent.
    pub fn destroy(&mut self, id: WidgetId) {
        let Some(slot) = self.slots.get(id.index()) else {
            return;
        };
        if slot.is_destroyed {
            return;
        }
        if slot.is_mounted {
            if let Err(e) = self.run_hook(id, "willUnmount", |spec, ctx| spec.will_unmount(ctx)) {
                log::warn!("ignoring error during destroy: {}", e);
            }
        }
        let children = self.slots[id.index()].children.clone();
        for child in children {
            self.destroy(child);
        }
        let slot = &mut self.slots[id.index()];
        if let Some(el) = slot.el.take() {
            self.doc.detach(el);
        }
        slot.refs.clear();
        slot.vnode = None;
        slot.handlers.clear();
        slot.is_mounted = false;
        slot.is_destroyed = true;
        slot.render_scheduled = false;
    }

    /// Dispatch an event on a document node: listeners run up the ancestor
    /// chain until a `.stop` modifier ends propagation.
    pub fn dispatch(&mut self, node: NodeId, event: &str) -> Result<(), RuntimeError> {
        let mut current = Some(node);
        while let Some(cur) = current {
            let tokens = self.doc.listeners_for(cur, event);
            let mut stopped = false;
            for token in tokens {
                let widget = WidgetId((token >> 32) as u32);
                let index = (token & 0xffff_ffff) as usize;
                let Some(desc) = self
                    .slots
                    .get(widget.index())
                    .and_then(|s| s.handlers.get(index))
                    .cloned()
                else {
                    continue;
                };
                if desc.modifiers.iter().any(|m| m == "stop") {
                    stopped = true;
                }
                match desc.kind {
                    HandlerKind::Named { name, args } => {
                        self.run_hook(widget, "handler", |spec, ctx| {
                            spec.handle_event(&name, &args, ctx)
                        })?;
                    }
                    HandlerKind::Eval { expr } => {
                        let context = self.render_context(widget);
                        let template = self
                            .slots
                            .get(widget.index())
                            .map(|s| s.template.to_string())
                            .unwrap_or_default();
                        exec::eval_expr(&template, &expr, &[], &context)
                            .map_err(RuntimeError::Render)?;
                    }
                }
            }
            if stopped {
                break;
            }
            current = self.doc.parent(cur);
        }
        Ok(())
    }

    // internals

    fn start_widget(&mut self, id: WidgetId) -> Result<(), RuntimeError> {
        let Some(slot) = self.slots.get_mut(id.index()) else {
            return Ok(());
        };
        if slot.started {
            return Ok(());
        }
        slot.started = true;
        self.run_hook(id, "willStart", |spec, ctx| spec.will_start(ctx))
    }

    fn render_context(&self, id: WidgetId) -> Value {
        let state = self
            .slots
            .get(id.index())
            .map(|s| s.state.clone())
            .unwrap_or_default();
        Value::map([("state", state)])
    }

    /// Render the widget's template into a fresh vnode tree, storing the
    /// handler descriptors for dispatch.
    fn render_widget(&mut self, id: WidgetId) -> Result<(VNode, Vec<WidgetDesc>), RuntimeError> {
        let context = self.render_context(id);
        let slot = &self.slots[id.index()];
        let spec_host = slot.spec.as_deref().map(SpecHost);
        let permissive = exec::PermissiveHost;
        // the spec may be out for a running hook; resolve permissively then
        let host: &dyn HandlerHost = match &spec_host {
            Some(host) => host,
            None => &permissive,
        };
        let mut extra = RenderExtra::new(Some(host));
        extra.token_base = (id.0 as u64) << 32;
        let vnode = self
            .env
            .qweb
            .render(&slot.template, &context, &mut extra)
            .map_err(RuntimeError::Render)?;
        let RenderExtra {
            handlers, widgets, ..
        } = extra;
        self.slots[id.index()].handlers = handlers;
        Ok((vnode, widgets))
    }

    /// Re-render a mounted widget and patch the delta into the document.
    fn rerender(&mut self, id: WidgetId) -> Result<(), RuntimeError> {
        let Some(slot) = self.slots.get(id.index()) else {
            return Ok(());
        };
        if slot.is_destroyed || slot.vnode.is_none() {
            return Ok(());
        }
        self.run_hook(id, "willPatch", |spec, ctx| spec.will_patch(ctx))?;

        let (mut new_vnode, descs) = self.render_widget(id)?;
        let old_vnode = self.slots[id.index()].vnode.take().expect("vnode");
        let names = self.widget_names();
        let mut modules = RuntimeModules {
            effects: Vec::new(),
            names: &names,
            descs: &descs,
        };
        vdom::patch(&mut self.doc, &old_vnode, &mut new_vnode, &mut modules);
        let effects = modules.effects;

        let slot = &mut self.slots[id.index()];
        slot.el = new_vnode.elm();
        slot.vnode = Some(new_vnode);

        let new_children = self.process_effects(id, effects, &descs)?;
        if self.is_mounted(id) {
            for child in new_children {
                if let Some(el) = self.el(child) {
                    if self.doc.in_document(el) {
                        self.call_mounted(child)?;
                    }
                }
            }
        }
        self.run_hook(id, "patched", |spec, ctx| spec.patched(ctx))
    }

    /// Resolve the deferred patch effects: mount/update/replace/destroy
    /// child widgets and bind refs. Returns the freshly mounted children.
    fn process_effects(
        &mut self,
        owner: WidgetId,
        effects: Vec<Effect>,
        descs: &[WidgetDesc],
    ) -> Result<Vec<WidgetId>, RuntimeError> {
        let mut mounted_at: HashMap<usize, WidgetId> = HashMap::new();
        let mut new_children = Vec::new();
        for effect in effects {
            match effect {
                Effect::MountWidget { desc, node } => {
                    let child = self.mount_child(owner, &descs[desc].name, node)?;
                    mounted_at.insert(desc, child);
                    new_children.push(child);
                    self.stamp_widget(owner, node, child);
                }
                Effect::ReplaceWidget { old, desc, node } => {
                    let child = self.mount_child(owner, &descs[desc].name, node)?;
                    mounted_at.insert(desc, child);
                    new_children.push(child);
                    self.stamp_widget(owner, node, child);
                    self.destroy(old);
                }
                Effect::UpdateWidget { id } => {
                    self.rerender(id)?;
                }
                Effect::DestroyWidget { id } => {
                    self.destroy(id);
                }
                Effect::BindRef { name, target } => {
                    let resolved = match target {
                        RefSource::Node(node) => Some(WidgetRef::Node(node)),
                        RefSource::Widget(id) => Some(WidgetRef::Widget(id)),
                        RefSource::WidgetAt { desc } => {
                            mounted_at.get(&desc).map(|&id| WidgetRef::Widget(id))
                        }
                    };
                    if let (Some(resolved), Some(slot)) =
                        (resolved, self.slots.get_mut(owner.index()))
                    {
                        slot.refs.insert(name, resolved);
                    }
                }
                Effect::TransitionEnter { node, name } => {
                    // enter classes are applied and handed to the external
                    // timing collaborator; completion here is immediate
                    let classes = format!("{}-enter {}-enter-active", name, name);
                    self.doc.set_attribute(node, "data-transition", classes);
                    self.doc.remove_attribute(node, "data-transition");
                }
            }
        }
        Ok(new_children)
    }

    /// Instantiate and render a child widget, replacing the placeholder
    /// node with the child's root.
    fn mount_child(
        &mut self,
        parent: WidgetId,
        name: &str,
        placeholder: NodeId,
    ) -> Result<WidgetId, RuntimeError> {
        let spec = self
            .env
            .make_widget(name)
            .ok_or_else(|| RuntimeError::UnknownWidget {
                name: name.to_string(),
            })?;
        let child = self.create_child(parent, spec);
        self.start_widget(child)?;

        let (mut vnode, descs) = self.render_widget(child)?;
        let names = self.widget_names();
        let mut modules = RuntimeModules {
            effects: Vec::new(),
            names: &names,
            descs: &descs,
        };
        let elm = vdom::create_element(&mut self.doc, &mut vnode, &mut modules);
        self.doc.replace_child(placeholder, elm);
        vdom::flush_inserts(&mut self.doc, &mut vnode, &mut modules);
        let effects = modules.effects;

        let slot = &mut self.slots[child.index()];
        slot.el = Some(elm);
        slot.vnode = Some(vnode);

        self.process_effects(child, effects, &descs)?;
        Ok(child)
    }

    /// Point the owner's stored placeholder vnode at the mounted child so
    /// later patches reuse the instance.
    fn stamp_widget(&mut self, owner: WidgetId, placeholder: NodeId, child: WidgetId) {
        let child_el = self.el(child);
        if let Some(vnode) = self.slots[owner.index()].vnode.as_mut() {
            if let Some(el) = find_by_elm(vnode, placeholder) {
                el.data.widget_id = Some(child.0 as u64);
                el.elm = child_el;
            }
        }
    }

    /// Children first, then the widget itself; the children list is
    /// snapshotted before iterating so a child mounted from inside a
    /// `mounted` hook drives its own lifecycle.
    fn call_mounted(&mut self, id: WidgetId) -> Result<(), RuntimeError> {
        let Some(slot) = self.slots.get(id.index()) else {
            return Ok(());
        };
        if slot.is_destroyed || slot.is_mounted {
            return Ok(());
        }
        let snapshot = slot.children.clone();
        for child in snapshot {
            self.call_mounted(child)?;
        }
        if let Some(slot) = self.slots.get_mut(id.index()) {
            slot.is_mounted = true;
        }
        self.run_hook(id, "mounted", |spec, ctx| spec.mounted(ctx))
    }

    /// Run a user hook with the spec temporarily taken out of the arena.
    fn run_hook<F>(&mut self, id: WidgetId, hook: &'static str, f: F) -> Result<(), RuntimeError>
    where
        F: FnOnce(&mut dyn Widget, &mut WidgetCtx<'_>) -> HookResult,
    {
        let Some(slot) = self.slots.get_mut(id.index()) else {
            return Ok(());
        };
        let Some(mut spec) = slot.spec.take() else {
            return Ok(());
        };
        let name = slot.name.clone();
        let result = f(spec.as_mut(), &mut WidgetCtx { app: self, id });
        if let Some(slot) = self.slots.get_mut(id.index()) {
            slot.spec = Some(spec);
        }
        result.map_err(|e| RuntimeError::Lifecycle(e.in_hook(&name, hook)))
    }

    fn widget_names(&self) -> HashMap<u64, SmolStr> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| !slot.is_destroyed)
            .map(|(i, slot)| (i as u64, slot.name.clone()))
            .collect()
    }
}

/// Adapts a widget to the render-time handler resolution trait.
struct SpecHost<'a>(&'a dyn Widget);

impl HandlerHost for SpecHost<'_> {
    fn has_handler(&self, name: &str) -> bool {
        self.0.has_handler(name)
    }
}

fn find_by_elm(vnode: &mut VNode, elm: NodeId) -> Option<&mut VElement> {
    match vnode {
        VNode::Element(el) => {
            if el.elm == Some(elm) {
                return Some(el);
            }
            el.children
                .iter_mut()
                .find_map(|child| find_by_elm(child, elm))
        }
        _ => None,
    }
}

/// Deferred actions recorded by the patch module hooks and resolved after
/// the patch committed.
enum Effect {
    /// A fresh `t-widget` placeholder: mount the described child at the
    /// node.
    MountWidget { desc: usize, node: NodeId },
    /// A placeholder whose widget name changed: destroy the old instance
    /// and mount the new one.
    ReplaceWidget {
        old: WidgetId,
        desc: usize,
        node: NodeId,
    },
    /// A placeholder matching its existing widget: re-render it.
    UpdateWidget { id: WidgetId },
    /// The node owning this widget left the tree.
    DestroyWidget { id: WidgetId },
    /// A `t-ref` to bind on the owner.
    BindRef { name: SmolStr, target: RefSource },
    /// A `t-transition` node entered the document.
    TransitionEnter { node: NodeId, name: SmolStr },
}

enum RefSource {
    Node(NodeId),
    Widget(WidgetId),
    WidgetAt { desc: usize },
}

/// Patch module hooks of the widget runtime: they only record effects; the
/// arena is not touched while the patcher runs.
struct RuntimeModules<'a> {
    effects: Vec<Effect>,
    /// Live widget names, to detect placeholder identity changes.
    names: &'a HashMap<u64, SmolStr>,
    /// Widget descriptors of the render being patched in.
    descs: &'a [WidgetDesc],
}

impl Modules for RuntimeModules<'_> {
    fn create(&mut self, _doc: &mut Document, el: &mut VElement) {
        let Some(elm) = el.elm else { return };
        if let Some(desc) = el.data.widget {
            self.effects.push(Effect::MountWidget {
                desc: desc as usize,
                node: elm,
            });
            if let Some(name) = &el.data.ref_name {
                self.effects.push(Effect::BindRef {
                    name: name.clone(),
                    target: RefSource::WidgetAt {
                        desc: desc as usize,
                    },
                });
            }
        } else if let Some(name) = &el.data.ref_name {
            self.effects.push(Effect::BindRef {
                name: name.clone(),
                target: RefSource::Node(elm),
            });
        }
    }

    fn insert(&mut self, _doc: &mut Document, el: &mut VElement) {
        if let (Some(name), Some(elm)) = (&el.data.transition, el.elm) {
            self.effects.push(Effect::TransitionEnter {
                node: elm,
                name: name.clone(),
            });
        }
    }

    fn prepatch(&mut self, _doc: &mut Document, _old: &VElement, new: &mut VElement) {
        let Some(elm) = new.elm else { return };
        if let Some(desc) = new.data.widget {
            let desc = desc as usize;
            let desc_name = self.descs.get(desc).map(|d| &d.name);
            match new.data.widget_id {
                // fingerprint match: same widget behind the placeholder
                Some(id) if self.names.get(&id) == desc_name => {
                    self.effects.push(Effect::UpdateWidget {
                        id: WidgetId(id as u32),
                    });
                    if let Some(name) = &new.data.ref_name {
                        self.effects.push(Effect::BindRef {
                            name: name.clone(),
                            target: RefSource::Widget(WidgetId(id as u32)),
                        });
                    }
                }
                Some(id) => {
                    new.data.widget_id = None;
                    self.effects.push(Effect::ReplaceWidget {
                        old: WidgetId(id as u32),
                        desc,
                        node: elm,
                    });
                }
                None => {
                    self.effects.push(Effect::MountWidget { desc, node: elm });
                }
            }
        } else if let Some(name) = &new.data.ref_name {
            self.effects.push(Effect::BindRef {
                name: name.clone(),
                target: RefSource::Node(elm),
            });
        }
    }

    fn destroy(&mut self, _doc: &mut Document, el: &VElement) {
        if let Some(id) = el.data.widget_id {
            self.effects.push(Effect::DestroyWidget {
                id: WidgetId(id as u32),
            });
        }
    }
}
