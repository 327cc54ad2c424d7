//! The render-program executor.
//!
//! Runs a compiled [`Program`] against an evaluation context and a scope
//! chain, building the VNode tree a render returns. `t-on-*` handlers and
//! `t-widget` placeholders do not execute here: they append descriptors to
//! the channels in [`RenderExtra`], and the vnode data references them by
//! index.

use crate::error::RenderError;
use crate::qweb::QWeb;
use crate::value::Value;
use qweb_compiler::{
    BinOp, Expr, ExprId, FmtPart, HandlerSpec, Instr, Literal, Program, UnaryOp,
};
use qweb_dom::{Document, Listener, NodeId, VComment, VElement, VNode, VNodeData, VText};
use smol_str::SmolStr;

/// Resolves named `t-on-*` handlers at render time. For widget renders the
/// widget itself is the host; a missing name rejects the render.
pub trait HandlerHost {
    fn has_handler(&self, name: &str) -> bool;
}

/// A host accepting every handler name, for contexts that only inspect the
/// produced tree (the CLI, plain-render tests).
#[derive(Debug, Default)]
pub struct PermissiveHost;

impl HandlerHost for PermissiveHost {
    fn has_handler(&self, _name: &str) -> bool {
        true
    }
}

/// A handler descriptor appended by `t-on-*` during render; vnode listeners
/// reference it through their token.
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerDesc {
    pub kind: HandlerKind,
    pub modifiers: Vec<SmolStr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HandlerKind {
    /// A context method with render-time evaluated arguments.
    Named { name: SmolStr, args: Vec<Value> },
    /// An expression evaluated when the event fires.
    Eval { expr: Expr },
}

/// A child-widget descriptor appended by `t-widget`.
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetDesc {
    pub name: SmolStr,
}

/// Options controlling a render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    /// Dev mode: the debugging directives `t-debug` and `t-log` emit
    /// through the log facade. Off, they compile as usual but stay silent.
    pub dev: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self { dev: true }
    }
}

/// Auxiliary channels threaded through a render.
pub struct RenderExtra<'h> {
    /// Handler descriptors appended by `t-on-*`.
    pub handlers: Vec<HandlerDesc>,
    /// Widget descriptors appended by `t-widget`.
    pub widgets: Vec<WidgetDesc>,
    /// Resolver for named handlers; absent means any named handler is a
    /// render error.
    pub host: Option<&'h dyn HandlerHost>,
    /// High bits for listener tokens, so dispatch can find the owning
    /// widget.
    pub token_base: u64,
    /// Render options; [`crate::QWeb::render`] stamps the instance's
    /// configured options here.
    pub options: RenderOptions,
}

impl<'h> RenderExtra<'h> {
    pub fn new(host: Option<&'h dyn HandlerHost>) -> Self {
        Self {
            handlers: Vec::new(),
            widgets: Vec::new(),
            host,
            token_base: 0,
            options: RenderOptions::default(),
        }
    }
}

impl Default for RenderExtra<'_> {
    fn default() -> Self {
        Self::new(None)
    }
}

/// Execute a registered template, returning its single root vnode.
pub fn execute(
    qweb: &QWeb,
    name: &str,
    context: &Value,
    extra: &mut RenderExtra<'_>,
) -> Result<VNode, RenderError> {
    let template = qweb
        .template(name)
        .ok_or_else(|| RenderError::TemplateNotFound {
            template: name.to_string(),
        })?;
    let mut executor = Executor {
        qweb,
        extra,
        frames: Vec::new(),
        roots: Vec::new(),
        scope: Vec::new(),
        pending_key: None,
        debug_logged: false,
        call_depth: 0,
    };
    executor.exec_program(name, &template.program, context)?;
    debug_assert!(executor.frames.is_empty(), "unbalanced element frames");

    let mut roots = executor.roots;
    if roots.len() > 1 {
        // surrounding whitespace does not count as a root
        roots.retain(|n| !matches!(n, VNode::Text(t) if t.text.trim().is_empty()));
    }
    match roots.len() {
        1 => Ok(roots.pop().unwrap()),
        0 => Err(RenderError::NoRoot {
            template: name.to_string(),
        }),
        _ => Err(RenderError::MultipleRoots {
            template: name.to_string(),
        }),
    }
}

struct Executor<'a, 'h> {
    qweb: &'a QWeb,
    extra: &'a mut RenderExtra<'h>,
    /// Elements under construction, innermost last.
    frames: Vec<VElement>,
    /// Completed root-level vnodes.
    roots: Vec<VNode>,
    /// Flat scope chain; lookups walk it back to front.
    scope: Vec<(SmolStr, Value)>,
    /// Key produced by a loop iteration or a frameless `t-key`, applied to
    /// the next opened element.
    pending_key: Option<SmolStr>,
    debug_logged: bool,
    call_depth: u32,
}

const MAX_CALL_DEPTH: u32 = 100;

impl Executor<'_, '_> {
    fn exec_program(
        &mut self,
        template: &str,
        program: &Program,
        context: &Value,
    ) -> Result<(), RenderError> {
        self.exec_range(template, program, &program.instrs, 0, program.instrs.len(), context)
    }

    fn exec_block(
        &mut self,
        template: &str,
        program: &Program,
        block: u32,
        context: &Value,
    ) -> Result<(), RenderError> {
        let instrs = &program.blocks[block as usize];
        self.exec_range(template, program, instrs, 0, instrs.len(), context)
    }

    /// Execute the block captured by a `t-set` body or `t-call` pre-block,
    /// collecting its output as a fragment instead of emitting it.
    fn capture_block(
        &mut self,
        template: &str,
        program: &Program,
        block: u32,
        context: &Value,
    ) -> Result<Vec<VNode>, RenderError> {
        let saved_frames = std::mem::take(&mut self.frames);
        let saved_roots = std::mem::take(&mut self.roots);
        let result = self.exec_block(template, program, block, context);
        let captured = std::mem::take(&mut self.roots);
        self.frames = saved_frames;
        self.roots = saved_roots;
        result?;
        Ok(captured)
    }

    #[allow(clippy::too_many_arguments)]
    fn exec_range(
        &mut self,
        template: &str,
        program: &Program,
        instrs: &[Instr],
        start: usize,
        end: usize,
        context: &Value,
    ) -> Result<(), RenderError> {
        let mut ip = start;
        while ip < end {
            match &instrs[ip] {
                Instr::OpenElement { tag } => {
                    let mut data = VNodeData::default();
                    if let Some(key) = self.pending_key.take() {
                        data.key = Some(key);
                    }
                    self.frames.push(VElement {
                        sel: tag.clone(),
                        data,
                        children: Vec::new(),
                        elm: None,
                        fresh: false,
                    });
                }
                Instr::CloseElement => {
                    let el = self.frames.pop().expect("close without open");
                    self.push_child(VNode::Element(el));
                }
                Instr::StaticAttr { name, value } => {
                    if let Some(frame) = self.frames.last_mut() {
                        set_attr_value(&mut frame.data, name, value.clone());
                    }
                }
                Instr::DynAttr { name, expr } => {
                    let value = self.eval(template, program, *expr, context)?;
                    if !value.suppresses_attr() {
                        let text = match value {
                            Value::Bool(true) => String::new(),
                            other => other.to_display(),
                        };
                        if let Some(frame) = self.frames.last_mut() {
                            set_attr_value(&mut frame.data, name, text);
                        }
                    }
                }
                Instr::SpreadAttrs { expr } => {
                    let value = self.eval(template, program, *expr, context)?;
                    let pairs: Vec<(String, Value)> = match value {
                        Value::List(items) if items.len() == 2 => {
                            vec![(items[0].to_display(), items[1].clone())]
                        }
                        Value::Map(map) => map.into_iter().collect(),
                        Value::Null => Vec::new(),
                        other => {
                            return Err(RenderError::Eval {
                                template: template.to_string(),
                                detail: format!(
                                    "t-att expects a [name, value] pair or a mapping, got {}",
                                    other.to_display()
                                ),
                            })
                        }
                    };
                    if let Some(frame) = self.frames.last_mut() {
                        for (name, value) in pairs {
                            if !value.suppresses_attr() {
                                set_attr_value(
                                    &mut frame.data,
                                    &SmolStr::new(name),
                                    value.to_display(),
                                );
                            }
                        }
                    }
                }
                Instr::FmtAttr { name, parts } => {
                    let mut text = String::new();
                    for part in parts {
                        match part {
                            FmtPart::Lit(lit) => text.push_str(lit),
                            FmtPart::Expr(expr) => {
                                text.push_str(&self.eval(template, program, *expr, context)?.to_display())
                            }
                        }
                    }
                    if let Some(frame) = self.frames.last_mut() {
                        set_attr_value(&mut frame.data, name, text);
                    }
                }
                Instr::NodeKey { expr } => {
                    let key = SmolStr::new(self.eval(template, program, *expr, context)?.to_display());
                    match self.frames.last_mut() {
                        Some(frame) => frame.data.key = Some(key),
                        None => self.pending_key = Some(key),
                    }
                }
                Instr::NodeRef { expr } => {
                    let name = SmolStr::new(self.eval(template, program, *expr, context)?.to_display());
                    if let Some(frame) = self.frames.last_mut() {
                        frame.data.ref_name = Some(name);
                    }
                }
                Instr::Listener {
                    event,
                    modifiers,
                    handler,
                } => {
                    let desc = self.resolve_handler(template, program, handler, modifiers, context)?;
                    let index = self.extra.handlers.len();
                    self.extra.handlers.push(desc);
                    if let Some(frame) = self.frames.last_mut() {
                        frame.data.on.push(Listener {
                            event: event.clone(),
                            token: self.extra.token_base | index as u64,
                        });
                    }
                }
                Instr::Transition { name } => {
                    if let Some(frame) = self.frames.last_mut() {
                        frame.data.transition = Some(name.clone());
                    }
                }
                Instr::Widget { expr } => {
                    let name = SmolStr::new(self.eval(template, program, *expr, context)?.to_display());
                    let index = self.extra.widgets.len();
                    self.extra.widgets.push(WidgetDesc { name });
                    if let Some(frame) = self.frames.last_mut() {
                        frame.data.widget = Some(index as u32);
                    }
                }
                Instr::Text { text } => {
                    self.push_child(VNode::Text(VText {
                        text: text.clone(),
                        elm: None,
                    }));
                }
                Instr::Esc { expr, body_end } => {
                    let value = self.eval(template, program, *expr, context)?;
                    match value {
                        Value::Fragment(nodes) => {
                            self.push_child(VNode::fragment(nodes));
                            ip = *body_end;
                            continue;
                        }
                        // not set: fall through into the default body
                        Value::Null => {}
                        value => {
                            // zero and the empty string are set values and
                            // still render
                            self.push_child(VNode::Text(VText {
                                text: value.to_display(),
                                elm: None,
                            }));
                            ip = *body_end;
                            continue;
                        }
                    }
                }
                Instr::Raw { expr } => {
                    let value = self.eval(template, program, *expr, context)?;
                    match value {
                        Value::Fragment(nodes) => {
                            self.push_child(VNode::fragment(nodes));
                        }
                        Value::Null => {}
                        other => {
                            let nodes = html_to_vnodes(&other.to_display());
                            self.push_child(VNode::fragment(nodes));
                        }
                    }
                }
                Instr::Set { name, value, body } => {
                    let bound = if let Some(expr) = value {
                        self.eval(template, program, *expr, context)?
                    } else if let Some(block) = body {
                        Value::Fragment(self.capture_block(template, program, block.0, context)?)
                    } else {
                        Value::Str(String::new())
                    };
                    self.scope.push((name.clone(), bound));
                }
                Instr::JumpIfFalsy { expr, target } => {
                    if !self.eval(template, program, *expr, context)?.is_truthy() {
                        ip = *target;
                        continue;
                    }
                }
                Instr::Jump { target } => {
                    ip = *target;
                    continue;
                }
                Instr::EnterLoop {
                    expr,
                    alias,
                    key,
                    end,
                } => {
                    let iterable = self.eval(template, program, *expr, context)?;
                    let items: Vec<(Value, Value)> = match iterable {
                        Value::List(items) => {
                            items.into_iter().map(|v| (v.clone(), v)).collect()
                        }
                        Value::Map(map) => map
                            .into_iter()
                            .map(|(k, v)| (Value::Str(k), v))
                            .collect(),
                        Value::Int(n) if n >= 0 => {
                            (0..n).map(|i| (Value::Int(i), Value::Int(i))).collect()
                        }
                        _ => {
                            return Err(RenderError::InvalidLoop {
                                template: template.to_string(),
                            })
                        }
                    };
                    let len = items.len();
                    for (i, (alias_value, value)) in items.into_iter().enumerate() {
                        let marker = self.scope.len();
                        self.scope.push((alias.clone(), alias_value));
                        self.scope
                            .push((loop_var(alias, "index"), Value::Int(i as i64)));
                        self.scope.push((loop_var(alias, "value"), value));
                        self.scope
                            .push((loop_var(alias, "first"), Value::Bool(i == 0)));
                        self.scope
                            .push((loop_var(alias, "last"), Value::Bool(i + 1 == len)));
                        let parity = if i % 2 == 0 { "even" } else { "odd" };
                        self.scope
                            .push((loop_var(alias, "parity"), Value::Str(parity.to_string())));
                        if let Some(key_expr) = key {
                            let key = self.eval(template, program, *key_expr, context)?;
                            self.pending_key = Some(SmolStr::new(key.to_display()));
                        }
                        self.exec_range(template, program, instrs, ip + 1, *end, context)?;
                        self.scope.truncate(marker);
                    }
                    self.pending_key = None;
                    ip = *end + 1;
                    continue;
                }
                Instr::ExitLoop => {
                    // loop boundary; EnterLoop drives the iterations
                }
                Instr::CallTemplate { name, body } => {
                    self.exec_call(template, program, name, *body, context)?;
                }
                Instr::Debug => {
                    if self.extra.options.dev && !self.debug_logged {
                        self.debug_logged = true;
                        log::info!(
                            "t-debug: compiled program for template '{}':\n{}",
                            template,
                            program.dump()
                        );
                    }
                }
                Instr::Log { expr } => {
                    if self.extra.options.dev {
                        let value = self.eval(template, program, *expr, context)?;
                        log::info!("t-log ({}): {}", template, value.to_display());
                    }
                }
            }
            ip += 1;
        }
        Ok(())
    }

    fn exec_call(
        &mut self,
        template: &str,
        program: &Program,
        name: &SmolStr,
        body: Option<qweb_compiler::BlockId>,
        context: &Value,
    ) -> Result<(), RenderError> {
        if self.call_depth >= MAX_CALL_DEPTH {
            return Err(RenderError::Eval {
                template: template.to_string(),
                detail: format!("t-call recursion limit reached calling '{}'", name),
            });
        }
        let callee = self
            .qweb
            .template(name)
            .ok_or_else(|| RenderError::TemplateNotFound {
                template: name.to_string(),
            })?;

        // the body runs in the caller's context; its bindings and rendered
        // fragment seed the callee
        let marker = self.scope.len();
        let fragment = match body {
            Some(block) => self.capture_block(template, program, block.0, context)?,
            None => Vec::new(),
        };
        let mut callee_context = context.clone();
        if self.scope.len() > marker {
            let bindings = Value::Map(
                self.scope[marker..]
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.clone()))
                    .collect(),
            );
            callee_context.merge(bindings);
        }
        self.scope.truncate(marker);

        // the callee starts from a fresh scope holding only the body
        // fragment under "0"; its output is collected separately and lands
        // in the caller as a fragment vnode, hoisted on push
        let saved_scope = std::mem::take(&mut self.scope);
        let saved_frames = std::mem::take(&mut self.frames);
        let saved_roots = std::mem::take(&mut self.roots);
        self.scope
            .push((SmolStr::new("0"), Value::Fragment(fragment)));
        self.call_depth += 1;
        let result = self.exec_program(name, &callee.program, &callee_context);
        self.call_depth -= 1;
        let rendered = std::mem::take(&mut self.roots);
        self.scope = saved_scope;
        self.frames = saved_frames;
        self.roots = saved_roots;
        result?;
        self.push_child(VNode::fragment(rendered));
        Ok(())
    }

    fn resolve_handler(
        &mut self,
        template: &str,
        program: &Program,
        handler: &HandlerSpec,
        modifiers: &[SmolStr],
        context: &Value,
    ) -> Result<HandlerDesc, RenderError> {
        let kind = match handler {
            HandlerSpec::Named { name, args } => {
                let resolved = self
                    .extra
                    .host
                    .map(|host| host.has_handler(name))
                    .unwrap_or(false);
                if !resolved {
                    return Err(RenderError::MissingHandler {
                        handler: name.to_string(),
                        template: template.to_string(),
                    });
                }
                let args = args
                    .iter()
                    .map(|a| self.eval(template, program, *a, context))
                    .collect::<Result<Vec<_>, _>>()?;
                HandlerKind::Named {
                    name: name.clone(),
                    args,
                }
            }
            HandlerSpec::Eval(expr) => HandlerKind::Eval {
                expr: program.exprs[expr.0 as usize].clone(),
            },
        };
        Ok(HandlerDesc {
            kind,
            modifiers: modifiers.to_vec(),
        })
    }

    /// Append a completed vnode to the open frame (or the root list),
    /// hoisting fragment children in place.
    fn push_child(&mut self, node: VNode) {
        let target = match self.frames.last_mut() {
            Some(frame) => &mut frame.children,
            None => &mut self.roots,
        };
        if node.is_fragment() {
            if let VNode::Element(el) = node {
                target.extend(el.children);
            }
        } else {
            target.push(node);
        }
    }

    fn eval(
        &self,
        template: &str,
        program: &Program,
        expr: ExprId,
        context: &Value,
    ) -> Result<Value, RenderError> {
        eval_expr(template, &program.exprs[expr.0 as usize], &self.scope, context)
    }
}

/// Evaluate an expression against a scope chain and a context. Also used by
/// event dispatch for expression handlers, with an empty scope.
pub fn eval_expr(
    _template: &str,
    expr: &Expr,
    scope: &[(SmolStr, Value)],
    context: &Value,
) -> Result<Value, RenderError> {
    Ok(match expr {
            Expr::Lit(lit) => match lit {
                Literal::Null => Value::Null,
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Int(i) => Value::Int(*i),
                Literal::Float(f) => Value::Float(*f),
                Literal::Str(s) => Value::Str(s.clone()),
            },
            Expr::Ctx(name) => context.member(name),
            Expr::Scope(name) => scope
                .iter()
                .rev()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.clone())
                .unwrap_or_default(),
            Expr::Member(base, name) => eval_expr(_template, base, scope, context)?.member(name),
            Expr::Index(base, index) => {
                let base = eval_expr(_template, base, scope, context)?;
                let index = eval_expr(_template, index, scope, context)?;
                base.index(&index)
            }
            Expr::Unary(op, operand) => {
                let value = eval_expr(_template, operand, scope, context)?;
                match op {
                    UnaryOp::Not => Value::Bool(!value.is_truthy()),
                    UnaryOp::Neg => value.arith(&Value::Int(-1), |a, b| a * b),
                }
            }
            Expr::Binary(op, left, right) => {
                let left_value = eval_expr(_template, left, scope, context)?;
                match op {
                    BinOp::And => {
                        if left_value.is_truthy() {
                            eval_expr(_template, right, scope, context)?
                        } else {
                            left_value
                        }
                    }
                    BinOp::Or => {
                        if left_value.is_truthy() {
                            left_value
                        } else {
                            eval_expr(_template, right, scope, context)?
                        }
                    }
                    op => {
                        let right_value = eval_expr(_template, right, scope, context)?;
                        match op {
                            BinOp::Eq => Value::Bool(left_value.loose_eq(&right_value)),
                            BinOp::Ne => Value::Bool(!left_value.loose_eq(&right_value)),
                            BinOp::Lt => compare(&left_value, &right_value, |o| o.is_lt()),
                            BinOp::Gt => compare(&left_value, &right_value, |o| o.is_gt()),
                            BinOp::Le => compare(&left_value, &right_value, |o| o.is_le()),
                            BinOp::Ge => compare(&left_value, &right_value, |o| o.is_ge()),
                            BinOp::Add => left_value.add(&right_value),
                            BinOp::Sub => left_value.arith(&right_value, |a, b| a - b),
                            BinOp::Mul => left_value.arith(&right_value, |a, b| a * b),
                            BinOp::Div => left_value.arith(&right_value, |a, b| a / b),
                            BinOp::Mod => left_value.arith(&right_value, |a, b| a % b),
                            BinOp::And | BinOp::Or => unreachable!(),
                        }
                    }
                }
            }
            Expr::Ternary(cond, then, otherwise) => {
                if eval_expr(_template, cond, scope, context)?.is_truthy() {
                    eval_expr(_template, then, scope, context)?
                } else {
                    eval_expr(_template, otherwise, scope, context)?
                }
            }
            Expr::Array(items) => Value::List(
                items
                    .iter()
                    .map(|e| eval_expr(_template, e, scope, context))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            Expr::Object(entries) => {
                let mut map = indexmap::IndexMap::new();
                for (key, value) in entries {
                    map.insert(key.to_string(), eval_expr(_template, value, scope, context)?);
                }
                Value::Map(map)
            }
        })
    }

fn compare(left: &Value, right: &Value, check: fn(std::cmp::Ordering) -> bool) -> Value {
    Value::Bool(left.compare(right).map(check).unwrap_or(false))
}

fn loop_var(alias: &SmolStr, suffix: &str) -> SmolStr {
    SmolStr::new(format!("{}_{}", alias, suffix))
}

fn set_attr_value(data: &mut VNodeData, name: &SmolStr, value: String) {
    match name.as_str() {
        "class" => data.add_classes(&value),
        "style" => data.add_styles(&value),
        _ => {
            data.attrs.insert(name.clone(), value);
        }
    }
}

/// Parse raw HTML into vnodes through a scratch document, the `t-raw`
/// fragment path.
fn html_to_vnodes(html: &str) -> Vec<VNode> {
    let mut doc = Document::new();
    let roots = doc.parse_fragment(html);
    roots.iter().map(|&id| dom_to_vnode(&doc, id)).collect()
}

fn dom_to_vnode(doc: &Document, id: NodeId) -> VNode {
    if let Some(tag) = doc.tag(id) {
        let mut data = VNodeData::default();
        for (name, value) in doc.attributes(id) {
            set_attr_value(&mut data, &SmolStr::new(name), value.to_string());
        }
        let children = doc
            .children(id)
            .iter()
            .map(|&child| dom_to_vnode(doc, child))
            .collect();
        VNode::Element(VElement {
            sel: SmolStr::new(tag),
            data,
            children,
            elm: None,
            fresh: false,
        })
    } else if doc.is_comment(id) {
        VNode::Comment(VComment {
            text: doc.text(id).unwrap_or_default().to_string(),
            elm: None,
        })
    } else {
        VNode::Text(VText {
            text: doc.text(id).unwrap_or_default().to_string(),
            elm: None,
        })
    }
}
