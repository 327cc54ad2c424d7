//! VNode patcher.
//!
//! Reconciles a previous vnode tree with a freshly rendered one and applies
//! the delta to the document. Element nodes match on `(sel, key)`, text and
//! comment nodes on kind; a mismatch removes the old node and inserts the
//! new one. Sibling lists where every node carries a key diff with the
//! two-pointer walk plus a key map for moves; otherwise reconciliation is
//! index-aligned and performs no moves.

use crate::dom::{Document, NodeId};
use crate::{is_bool_attr, VElement, VNode, VNodeData};
use rustc_hash::FxHashMap;
use smol_str::SmolStr;

/// Hooks invoked by the patcher at defined lifecycle points.
///
/// `create` fires once a node exists (before insertion), `insert` once the
/// patched subtree is attached to the live document, `prepatch`/`update`/
/// `postpatch` around the reconciliation of a matched element, `destroy`
/// bottom-up for every removed element, and `remove` for the directly
/// removed node; returning `false` keeps it in the document so an external
/// collaborator can detach it later.
pub trait Modules {
    fn create(&mut self, _doc: &mut Document, _el: &mut VElement) {}
    fn insert(&mut self, _doc: &mut Document, _el: &mut VElement) {}
    fn prepatch(&mut self, _doc: &mut Document, _old: &VElement, _new: &mut VElement) {}
    fn update(&mut self, _doc: &mut Document, _old: &VElement, _new: &mut VElement) {}
    fn postpatch(&mut self, _doc: &mut Document, _old: &VElement, _new: &mut VElement) {}
    fn remove(&mut self, _doc: &mut Document, _el: &VElement) -> bool {
        true
    }
    fn destroy(&mut self, _doc: &mut Document, _el: &VElement) {}
}

/// Module set with no behavior, for plain rendering and tests.
#[derive(Debug, Default)]
pub struct NoopModules;

impl Modules for NoopModules {}

/// Whether two vnodes represent the same node (fingerprint match).
pub fn same_vnode(a: &VNode, b: &VNode) -> bool {
    match (a, b) {
        (VNode::Element(a), VNode::Element(b)) => a.sel == b.sel && a.data.key == b.data.key,
        (VNode::Text(_), VNode::Text(_)) => true,
        (VNode::Comment(_), VNode::Comment(_)) => true,
        _ => false,
    }
}

/// Create the document subtree for a vnode, populating `elm` throughout.
/// The subtree is detached; the caller inserts it.
pub fn create_element(doc: &mut Document, vnode: &mut VNode, modules: &mut dyn Modules) -> NodeId {
    match vnode {
        VNode::Text(t) => {
            let elm = doc.create_text(t.text.clone());
            t.elm = Some(elm);
            elm
        }
        VNode::Comment(c) => {
            let elm = doc.create_comment(c.text.clone());
            c.elm = Some(elm);
            elm
        }
        VNode::Element(el) => {
            let elm = doc.create_element(el.sel.clone());
            el.elm = Some(elm);
            apply_data(doc, elm, None, &el.data);
            el.fresh = true;
            modules.create(doc, el);
            for child in el.children.iter_mut() {
                let child_elm = create_element(doc, child, modules);
                doc.append_child(elm, child_elm);
            }
            elm
        }
    }
}

/// Create a vnode's subtree and append it under `target`. Insert hooks fire
/// when `target` is in the document.
pub fn mount(doc: &mut Document, target: NodeId, vnode: &mut VNode, modules: &mut dyn Modules) {
    let elm = create_element(doc, vnode, modules);
    doc.append_child(target, elm);
    flush_inserts(doc, vnode, modules);
}

/// Patch `new` against `old`, mutating the document. On a fingerprint
/// mismatch the old subtree is removed and the new one inserted in place.
pub fn patch(doc: &mut Document, old: &VNode, new: &mut VNode, modules: &mut dyn Modules) {
    if same_vnode(old, new) {
        patch_vnode(doc, old, new, modules);
    } else {
        log::debug!("fingerprint mismatch at patch root; replacing the subtree");
        let new_elm = create_element(doc, new, modules);
        if let Some(old_elm) = old.elm() {
            if let Some(parent) = doc.parent(old_elm) {
                doc.insert_before(parent, new_elm, Some(old_elm));
            }
            remove_vnode(doc, old, modules);
        }
    }
    flush_inserts(doc, new, modules);
}

/// Invoke deferred `insert` hooks for freshly created elements that are now
/// attached to the document. Runtimes mounting into a detached target call
/// this again after attaching it.
pub fn flush_inserts(doc: &mut Document, vnode: &mut VNode, modules: &mut dyn Modules) {
    if let VNode::Element(el) = vnode {
        if el.fresh {
            let attached = el.elm.map(|e| doc.in_document(e)).unwrap_or(false);
            if attached {
                el.fresh = false;
                modules.insert(doc, el);
            }
        }
        for child in el.children.iter_mut() {
            flush_inserts(doc, child, modules);
        }
    }
}

fn patch_vnode(doc: &mut Document, old: &VNode, new: &mut VNode, modules: &mut dyn Modules) {
    match (old, new) {
        (VNode::Text(old_t), VNode::Text(new_t)) => {
            new_t.elm = old_t.elm;
            if old_t.text != new_t.text {
                if let Some(elm) = new_t.elm {
                    doc.set_text(elm, new_t.text.clone());
                }
            }
        }
        (VNode::Comment(old_c), VNode::Comment(new_c)) => {
            new_c.elm = old_c.elm;
            if old_c.text != new_c.text {
                if let Some(elm) = new_c.elm {
                    doc.set_text(elm, new_c.text.clone());
                }
            }
        }
        (VNode::Element(old_el), VNode::Element(new_el)) => {
            new_el.elm = old_el.elm;
            // widget instances ride along with the node they own
            if new_el.data.widget_id.is_none() {
                new_el.data.widget_id = old_el.data.widget_id;
            }
            modules.prepatch(doc, old_el, new_el);
            if let Some(elm) = new_el.elm {
                apply_data(doc, elm, Some(&old_el.data), &new_el.data);
            }
            modules.update(doc, old_el, new_el);
            if let Some(elm) = new_el.elm {
                update_children(doc, elm, &old_el.children, &mut new_el.children, modules);
            }
            modules.postpatch(doc, old_el, new_el);
        }
        _ => unreachable!("patch_vnode called on mismatched vnodes"),
    }
}

/// Apply attrs, class, style, boolean props and listeners, diffing against
/// the previous data when present.
fn apply_data(doc: &mut Document, elm: NodeId, old: Option<&VNodeData>, new: &VNodeData) {
    let empty = VNodeData::default();
    let old = old.unwrap_or(&empty);

    for (name, value) in &new.attrs {
        if old.attrs.get(name) != Some(value) {
            doc.set_attribute(elm, name.clone(), value.clone());
            if is_bool_attr(name) {
                doc.set_prop(elm, name.clone(), true);
            }
        }
    }
    for name in old.attrs.keys() {
        if !new.attrs.contains_key(name) {
            doc.remove_attribute(elm, name);
            if is_bool_attr(name) {
                doc.set_prop(elm, name.clone(), false);
            }
        }
    }

    if old.class != new.class {
        if new.class.is_empty() {
            doc.remove_attribute(elm, "class");
        } else {
            let joined = new.class.iter().map(|c| c.as_str()).collect::<Vec<_>>().join(" ");
            doc.set_attribute(elm, "class", joined);
        }
    }

    if old.style != new.style {
        if new.style.is_empty() {
            doc.remove_attribute(elm, "style");
        } else {
            let joined = new
                .style
                .iter()
                .map(|(k, v)| format!("{}: {}", k, v))
                .collect::<Vec<_>>()
                .join("; ");
            doc.set_attribute(elm, "style", joined);
        }
    }

    if old.on != new.on {
        doc.set_listeners(elm, new.on.clone());
    }
}

/// Remove a vnode's subtree from the document: destroy hooks fire bottom-up
/// over every element, then the remove hook decides whether to detach now.
fn remove_vnode(doc: &mut Document, vnode: &VNode, modules: &mut dyn Modules) {
    destroy_recursive(doc, vnode, modules);
    let detach_now = match vnode {
        VNode::Element(el) => modules.remove(doc, el),
        _ => true,
    };
    if detach_now {
        if let Some(elm) = vnode.elm() {
            doc.detach(elm);
        }
    }
}

fn destroy_recursive(doc: &mut Document, vnode: &VNode, modules: &mut dyn Modules) {
    if let VNode::Element(el) = vnode {
        for child in &el.children {
            destroy_recursive(doc, child, modules);
        }
        modules.destroy(doc, el);
    }
}

fn all_keyed(children: &[VNode]) -> bool {
    children
        .iter()
        .all(|c| matches!(c, VNode::Element(el) if el.data.key.is_some()))
}

fn update_children(
    doc: &mut Document,
    parent: NodeId,
    old_ch: &[VNode],
    new_ch: &mut [VNode],
    modules: &mut dyn Modules,
) {
    if old_ch.is_empty() {
        for child in new_ch.iter_mut() {
            let elm = create_element(doc, child, modules);
            doc.append_child(parent, elm);
        }
        return;
    }
    if new_ch.is_empty() {
        for child in old_ch {
            remove_vnode(doc, child, modules);
        }
        return;
    }

    if all_keyed(old_ch) && all_keyed(new_ch) {
        update_keyed_children(doc, parent, old_ch, new_ch, modules);
    } else {
        let some_keyed =
            old_ch.iter().chain(new_ch.iter()).any(|c| c.key().is_some());
        if some_keyed {
            log::warn!("children list is only partially keyed; falling back to index-aligned reconciliation");
        }
        update_indexed_children(doc, parent, old_ch, new_ch, modules);
    }
}

/// Index-aligned reconciliation: no moves, nodes pair up by position.
fn update_indexed_children(
    doc: &mut Document,
    parent: NodeId,
    old_ch: &[VNode],
    new_ch: &mut [VNode],
    modules: &mut dyn Modules,
) {
    log::trace!(
        "index-aligned diff: {} -> {} children",
        old_ch.len(),
        new_ch.len()
    );
    let common = old_ch.len().min(new_ch.len());
    for i in 0..common {
        let old = &old_ch[i];
        let new = &mut new_ch[i];
        if same_vnode(old, new) {
            patch_vnode(doc, old, new, modules);
        } else {
            let new_elm = create_element(doc, new, modules);
            doc.insert_before(parent, new_elm, old.elm());
            remove_vnode(doc, old, modules);
        }
    }
    for child in new_ch.iter_mut().skip(common) {
        let elm = create_element(doc, child, modules);
        doc.append_child(parent, elm);
    }
    for child in old_ch.iter().skip(common) {
        remove_vnode(doc, child, modules);
    }
}

/// Keyed reconciliation: head/tail two-pointer walk with a key map fallback
/// for moves. Document nodes are reused whenever keys match, so node
/// identity is preserved across permutations.
fn update_keyed_children(
    doc: &mut Document,
    parent: NodeId,
    old_ch: &[VNode],
    new_ch: &mut [VNode],
    modules: &mut dyn Modules,
) {
    log::trace!("keyed diff: {} -> {} children", old_ch.len(), new_ch.len());
    let mut old_start: i64 = 0;
    let mut old_end: i64 = old_ch.len() as i64 - 1;
    let mut new_start: i64 = 0;
    let mut new_end: i64 = new_ch.len() as i64 - 1;
    let mut taken = vec![false; old_ch.len()];
    let mut key_map: Option<FxHashMap<SmolStr, usize>> = None;

    while old_start <= old_end && new_start <= new_end {
        if taken[old_start as usize] {
            old_start += 1;
            continue;
        }
        if taken[old_end as usize] {
            old_end -= 1;
            continue;
        }
        let (os, oe, ns, ne) = (
            old_start as usize,
            old_end as usize,
            new_start as usize,
            new_end as usize,
        );
        if same_vnode(&old_ch[os], &new_ch[ns]) {
            patch_vnode(doc, &old_ch[os], &mut new_ch[ns], modules);
            old_start += 1;
            new_start += 1;
        } else if same_vnode(&old_ch[oe], &new_ch[ne]) {
            patch_vnode(doc, &old_ch[oe], &mut new_ch[ne], modules);
            old_end -= 1;
            new_end -= 1;
        } else if same_vnode(&old_ch[os], &new_ch[ne]) {
            // old head moved right: place it after the current old tail
            patch_vnode(doc, &old_ch[os], &mut new_ch[ne], modules);
            if let Some(elm) = new_ch[ne].elm() {
                let anchor = old_ch[oe].elm().and_then(|e| doc.next_sibling(e));
                doc.insert_before(parent, elm, anchor);
            }
            old_start += 1;
            new_end -= 1;
        } else if same_vnode(&old_ch[oe], &new_ch[ns]) {
            // old tail moved left: place it before the current old head
            patch_vnode(doc, &old_ch[oe], &mut new_ch[ns], modules);
            if let Some(elm) = new_ch[ns].elm() {
                doc.insert_before(parent, elm, old_ch[os].elm());
            }
            old_end -= 1;
            new_start += 1;
        } else {
            let map = key_map.get_or_insert_with(|| {
                let mut m = FxHashMap::default();
                for (i, child) in old_ch.iter().enumerate().take(oe + 1).skip(os) {
                    if let Some(key) = child.key() {
                        m.insert(key.clone(), i);
                    }
                }
                m
            });
            let anchor = old_ch[os].elm();
            let new_child = &mut new_ch[ns];
            let old_idx = new_child.key().and_then(|k| map.get(k)).copied();
            match old_idx {
                Some(i) if !taken[i] && same_vnode(&old_ch[i], new_child) => {
                    patch_vnode(doc, &old_ch[i], new_child, modules);
                    taken[i] = true;
                    if let Some(elm) = new_child.elm() {
                        doc.insert_before(parent, elm, anchor);
                    }
                }
                _ => {
                    let elm = create_element(doc, new_child, modules);
                    doc.insert_before(parent, elm, anchor);
                }
            }
            new_start += 1;
        }
    }

    if old_start > old_end {
        // remaining new nodes insert before the first already-placed tail node
        let anchor = new_ch
            .get((new_end + 1) as usize)
            .and_then(|n| n.elm());
        for i in new_start..=new_end {
            let elm = create_element(doc, &mut new_ch[i as usize], modules);
            doc.insert_before(parent, elm, anchor);
        }
    } else if new_start > new_end {
        for i in old_start..=old_end {
            if !taken[i as usize] {
                remove_vnode(doc, &old_ch[i as usize], modules);
            }
        }
    }
}
