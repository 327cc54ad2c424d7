//! The compilation pass.
//!
//! A single recursive traversal over the parse tree. Each element's
//! directive attributes are validated against the registry, sorted by
//! priority and dispatched in order: structural directives (`t-foreach`,
//! the `t-if` chain, `t-call`, `t-set`) wrap or consume the emission,
//! node-level directives annotate the open element, and ordinary
//! attributes emit static attr instructions. Sibling `t-elif`/`t-else`
//! branches attach to the preceding `t-if` through the context's join-point
//! stack.

use crate::context::{CompilationContext, IfChain};
use crate::directives::{dispatch_key, family_argument, DirectiveRegistry};
use crate::error::{CompileError, CompileErrorCode, CompileResult};
use crate::expr::HandlerExpr;
use crate::ir::{HandlerSpec, Instr, Program};
use qweb_template::{Attr, ElementNode, TemplateNode, TextNode};
use smol_str::SmolStr;

/// Compile a parsed template into a render program.
pub fn compile(
    name: &str,
    root: &ElementNode,
    registry: &DirectiveRegistry,
) -> CompileResult<Program> {
    let mut ctx = CompilationContext::new(name);
    let nodes = [TemplateNode::Element(root.clone())];
    compile_siblings(&mut ctx, registry, &nodes)?;
    Ok(ctx.finish())
}

/// Which conditional branch an element starts or continues.
enum Branch {
    If,
    Elif,
    Else,
    None,
}

fn branch_of(el: &ElementNode) -> Branch {
    // a co-located t-foreach runs outside the condition, so the chain logic
    // does not apply: the condition compiles inside the loop body instead
    if el.has_directive("foreach") {
        return Branch::None;
    }
    if el.has_directive("if") {
        Branch::If
    } else if el.has_directive("elif") {
        Branch::Elif
    } else if el.has_directive("else") {
        Branch::Else
    } else {
        Branch::None
    }
}

fn compile_siblings(
    ctx: &mut CompilationContext,
    registry: &DirectiveRegistry,
    nodes: &[TemplateNode],
) -> CompileResult<()> {
    ctx.if_stack.push(None);
    let result = compile_sibling_list(ctx, registry, nodes);
    if result.is_ok() {
        close_chain(ctx);
    }
    ctx.if_stack.pop();
    result
}

fn compile_sibling_list(
    ctx: &mut CompilationContext,
    registry: &DirectiveRegistry,
    nodes: &[TemplateNode],
) -> CompileResult<()> {
    for node in nodes {
        match node {
            TemplateNode::Comment(_) => {
                // comments produce no output and keep an open chain alive
            }
            TemplateNode::Text(text) => {
                // whitespace between branches keeps the chain open
                if !text.content.trim().is_empty() {
                    close_chain(ctx);
                }
                emit_text(ctx, text);
            }
            TemplateNode::Element(el) => {
                validate_directives(registry, el)?;
                match branch_of(el) {
                    Branch::If => {
                        close_chain(ctx);
                        let attr = el.directive("if").unwrap();
                        let cond = ctx.parse_expr(&attr.value, attr.span)?;
                        let false_jump = ctx.emit(Instr::JumpIfFalsy {
                            expr: cond,
                            target: 0,
                        });
                        compile_element(ctx, registry, el, &["if"])?;
                        let end_jump = ctx.emit(Instr::Jump { target: 0 });
                        *ctx.if_stack.last_mut().unwrap() = Some(IfChain {
                            pending: Some(false_jump),
                            end_jumps: vec![end_jump],
                            closed: false,
                        });
                    }
                    Branch::Elif => {
                        let attr = el.directive("elif").unwrap();
                        let pending = open_branch(ctx, attr)?;
                        let here = ctx.here();
                        ctx.patch_jump(pending, here);
                        let cond = ctx.parse_expr(&attr.value, attr.span)?;
                        let false_jump = ctx.emit(Instr::JumpIfFalsy {
                            expr: cond,
                            target: 0,
                        });
                        compile_element(ctx, registry, el, &["elif"])?;
                        let end_jump = ctx.emit(Instr::Jump { target: 0 });
                        let chain = ctx.if_stack.last_mut().unwrap().as_mut().unwrap();
                        chain.pending = Some(false_jump);
                        chain.end_jumps.push(end_jump);
                    }
                    Branch::Else => {
                        let attr = el.directive("else").unwrap();
                        let pending = open_branch(ctx, attr)?;
                        let here = ctx.here();
                        ctx.patch_jump(pending, here);
                        compile_element(ctx, registry, el, &["else"])?;
                        let chain = ctx.if_stack.last_mut().unwrap().as_mut().unwrap();
                        chain.pending = None;
                        chain.closed = true;
                    }
                    Branch::None => {
                        close_chain(ctx);
                        compile_element(ctx, registry, el, &[])?;
                    }
                }
            }
        }
    }
    Ok(())
}

/// Take the pending falsy-jump of the open chain for the next branch, or
/// reject a dangling `t-elif`/`t-else`.
fn open_branch(ctx: &mut CompilationContext, attr: &Attr) -> CompileResult<usize> {
    let chain = ctx.if_stack.last_mut().unwrap();
    match chain {
        Some(chain) if !chain.closed => Ok(chain.pending.take().expect("branch without pending jump")),
        _ => Err(CompileError::new(
            format!("'{}' must directly follow a t-if branch", attr.name),
            attr.span,
            CompileErrorCode::MisplacedBranch,
        )),
    }
}

/// Patch every jump of the open chain to the current address.
fn close_chain(ctx: &mut CompilationContext) {
    if let Some(chain) = ctx.if_stack.last_mut().and_then(Option::take) {
        let here = ctx.here();
        if let Some(pending) = chain.pending {
            ctx.patch_jump(pending, here);
        }
        for jump in chain.end_jumps {
            ctx.patch_jump(jump, here);
        }
    }
}

fn validate_directives(registry: &DirectiveRegistry, el: &ElementNode) -> CompileResult<()> {
    for attr in el.directives() {
        let name = attr.directive_name().unwrap_or_default();
        if registry.resolve(name).is_none() {
            return Err(CompileError::unknown_directive(name, attr.span));
        }
    }
    Ok(())
}

/// Compile one element: sort its directives, run the structural prefix,
/// then emit the node itself.
fn compile_element(
    ctx: &mut CompilationContext,
    registry: &DirectiveRegistry,
    el: &ElementNode,
    exclude: &[&str],
) -> CompileResult<()> {
    let mut dirs: Vec<&Attr> = el
        .directives()
        .filter(|a| !exclude.contains(&a.directive_name().unwrap_or_default()))
        .collect();
    let priority = |attr: &Attr| {
        registry
            .priority(attr.directive_name().unwrap_or_default())
            .unwrap_or(u8::MAX)
    };
    dirs.sort_by_key(|a| priority(a));
    apply_directives(ctx, registry, el, &dirs)
}

/// Dispatch the structural directives in priority order; the first
/// non-structural directive hands over to node emission.
fn apply_directives(
    ctx: &mut CompilationContext,
    registry: &DirectiveRegistry,
    el: &ElementNode,
    dirs: &[&Attr],
) -> CompileResult<()> {
    let Some((first, rest)) = dirs.split_first() else {
        return emit_element(ctx, registry, el, &[]);
    };
    let name = first.directive_name().unwrap_or_default();
    match dispatch_key(name) {
        // t-name is consumed during bundle registration
        "name" => apply_directives(ctx, registry, el, rest),
        "debug" => {
            ctx.emit(Instr::Debug);
            apply_directives(ctx, registry, el, rest)
        }
        "log" => {
            let expr = ctx.parse_expr(&first.value, first.span)?;
            ctx.emit(Instr::Log { expr });
            apply_directives(ctx, registry, el, rest)
        }
        "foreach" => compile_foreach(ctx, registry, el, first, rest),
        // a condition below a co-located t-foreach evaluates per iteration
        "if" => {
            let cond = ctx.parse_expr(&first.value, first.span)?;
            let false_jump = ctx.emit(Instr::JumpIfFalsy {
                expr: cond,
                target: 0,
            });
            let result = apply_directives(ctx, registry, el, rest);
            let here = ctx.here();
            ctx.patch_jump(false_jump, here);
            result
        }
        "elif" | "else" => Err(CompileError::new(
            format!("'{}' cannot combine with t-foreach", first.name),
            first.span,
            CompileErrorCode::MisplacedBranch,
        )),
        "as" | "key" | "value" if consumed_by_parent(name, el) => {
            apply_directives(ctx, registry, el, rest)
        }
        "call" => compile_call(ctx, registry, el, first),
        "set" => compile_set(ctx, registry, el, first),
        _ => emit_element(ctx, registry, el, dirs),
    }
}

fn lower_handler(ctx: &mut CompilationContext, handler: HandlerExpr) -> HandlerSpec {
    match handler {
        HandlerExpr::Named { name, args } => HandlerSpec::Named {
            name,
            args: args.into_iter().map(|a| ctx.add_expr(a)).collect(),
        },
        HandlerExpr::Eval(expr) => HandlerSpec::Eval(ctx.add_expr(expr)),
    }
}

/// `t-as`, co-located `t-key` and `t-value` are arguments to `t-foreach`
/// and `t-set` rather than directives of their own.
fn consumed_by_parent(name: &str, el: &ElementNode) -> bool {
    match name {
        "as" => el.has_directive("foreach"),
        "key" => el.has_directive("foreach"),
        "value" => el.has_directive("set"),
        _ => false,
    }
}

fn compile_foreach(
    ctx: &mut CompilationContext,
    registry: &DirectiveRegistry,
    el: &ElementNode,
    attr: &Attr,
    rest: &[&Attr],
) -> CompileResult<()> {
    let alias_attr = el.directive("as").ok_or_else(|| {
        CompileError::new(
            "t-foreach requires a t-as alias",
            attr.span,
            CompileErrorCode::MissingLoopAlias,
        )
    })?;
    let alias = SmolStr::new(alias_attr.value.trim());

    // the iterable is evaluated outside the loop scope
    let expr = ctx.parse_expr(&attr.value, attr.span)?;

    let marker = ctx.enter_scope();
    ctx.declare(alias.clone());
    for suffix in ["index", "value", "first", "last", "parity"] {
        ctx.declare(SmolStr::new(format!("{}_{}", alias, suffix)));
    }
    let key = el
        .directive("key")
        .map(|a| ctx.parse_expr(&a.value, a.span))
        .transpose()?;

    if key.is_none() && !loop_content_keyed(el) {
        ctx.warn_missing_key();
    }

    let enter = ctx.emit(Instr::EnterLoop {
        expr,
        alias,
        key,
        end: 0,
    });
    ctx.in_loop += 1;
    let remaining: Vec<&Attr> = rest
        .iter()
        .filter(|a| !matches!(a.directive_name(), Some("as") | Some("key")))
        .copied()
        .collect();
    let result = apply_directives(ctx, registry, el, &remaining);
    ctx.in_loop -= 1;
    let end = ctx.emit(Instr::ExitLoop);
    ctx.patch_jump(enter, end);
    ctx.exit_scope(marker);
    result
}

/// Whether the repeated content carries keys: either the repeated element
/// itself, or, for a transparent `<t>`, each of its element children.
fn loop_content_keyed(el: &ElementNode) -> bool {
    if !el.is_transparent() {
        return el.has_directive("key");
    }
    el.children.iter().all(|child| match child {
        TemplateNode::Element(child) => child.has_directive("key"),
        _ => true,
    })
}

fn compile_call(
    ctx: &mut CompilationContext,
    registry: &DirectiveRegistry,
    el: &ElementNode,
    attr: &Attr,
) -> CompileResult<()> {
    if !el.is_transparent() {
        return Err(CompileError::invalid_tag(&el.tag, el.span));
    }
    let body = if has_content(&el.children) {
        let marker = ctx.enter_scope();
        ctx.push_buffer();
        let result = compile_siblings(ctx, registry, &el.children);
        let block = ctx.pop_block();
        ctx.exit_scope(marker);
        result?;
        Some(block)
    } else {
        None
    };
    ctx.emit(Instr::CallTemplate {
        name: SmolStr::new(attr.value.trim()),
        body,
    });
    Ok(())
}

fn compile_set(
    ctx: &mut CompilationContext,
    registry: &DirectiveRegistry,
    el: &ElementNode,
    attr: &Attr,
) -> CompileResult<()> {
    let name = SmolStr::new(attr.value.trim());
    // t-value takes priority over the element body
    let value = el
        .directive("value")
        .map(|a| ctx.parse_expr(&a.value, a.span))
        .transpose()?;
    let body = if value.is_none() && has_content(&el.children) {
        ctx.push_buffer();
        let result = compile_siblings(ctx, registry, &el.children);
        let block = ctx.pop_block();
        result?;
        Some(block)
    } else {
        None
    };
    ctx.emit(Instr::Set { name: name.clone(), value, body });
    ctx.declare(name);
    Ok(())
}

fn has_content(children: &[TemplateNode]) -> bool {
    children.iter().any(|c| match c {
        TemplateNode::Text(t) => !t.content.trim().is_empty(),
        TemplateNode::Element(_) => true,
        TemplateNode::Comment(_) => false,
    })
}

/// Emit the element node itself: open the frame, write static attributes,
/// apply node-level directives, then content and children.
fn emit_element(
    ctx: &mut CompilationContext,
    registry: &DirectiveRegistry,
    el: &ElementNode,
    dirs: &[&Attr],
) -> CompileResult<()> {
    let is_widget = dirs
        .iter()
        .any(|a| a.directive_name() == Some("widget"));
    let emits_node = !el.is_transparent() || is_widget;

    if emits_node {
        let tag: SmolStr = if el.is_transparent() {
            // widget placeholders on <t> get a neutral tag; the child's
            // root replaces the node anyway
            SmolStr::new("div")
        } else {
            el.tag.clone()
        };
        ctx.emit(Instr::OpenElement { tag });
        for attr in el.statics() {
            ctx.emit(Instr::StaticAttr {
                name: attr.name.clone(),
                value: attr.value.clone(),
            });
        }
    }

    let mut content: Option<(&Attr, bool)> = None;
    for &attr in dirs {
        let name = attr.directive_name().unwrap_or_default();
        match dispatch_key(name) {
            "esc" => content = Some((attr, true)),
            "raw" => content = Some((attr, false)),
            "att" => {
                let expr = ctx.parse_expr(&attr.value, attr.span)?;
                if emits_node {
                    ctx.emit(Instr::SpreadAttrs { expr });
                }
            }
            "att-" => {
                let (_, arg) = family_argument(name).unwrap();
                let expr = ctx.parse_expr(&attr.value, attr.span)?;
                if emits_node {
                    ctx.emit(Instr::DynAttr {
                        name: SmolStr::new(arg),
                        expr,
                    });
                }
            }
            "attf-" => {
                let (_, arg) = family_argument(name).unwrap();
                let parts = ctx.parse_interpolation(&attr.value, attr.span)?;
                if emits_node {
                    ctx.emit(Instr::FmtAttr {
                        name: SmolStr::new(arg),
                        parts,
                    });
                }
            }
            "on" => return Err(CompileError::missing_event_name(attr.span)),
            "on-" => {
                let (_, arg) = family_argument(name).unwrap();
                let mut pieces = arg.split('.');
                let event = pieces.next().unwrap_or_default();
                if event.is_empty() {
                    return Err(CompileError::missing_event_name(attr.span));
                }
                let modifiers: Vec<SmolStr> = pieces.map(SmolStr::new).collect();
                let handler = ctx.parse_handler(&attr.value, attr.span)?;
                let handler = lower_handler(ctx, handler);
                if emits_node {
                    ctx.emit(Instr::Listener {
                        event: SmolStr::new(event),
                        modifiers,
                        handler,
                    });
                }
            }
            "ref" => {
                let expr = ctx.parse_expr(&attr.value, attr.span)?;
                if emits_node {
                    ctx.emit(Instr::NodeRef { expr });
                }
            }
            "widget" => {
                let expr = ctx.parse_expr(&attr.value, attr.span)?;
                ctx.emit(Instr::Widget { expr });
            }
            "transition" => {
                if emits_node {
                    ctx.emit(Instr::Transition {
                        name: SmolStr::new(attr.value.trim()),
                    });
                }
            }
            "key" => {
                let expr = ctx.parse_expr(&attr.value, attr.span)?;
                ctx.emit(Instr::NodeKey { expr });
            }
            // structural directives were consumed upstream
            _ => {}
        }
    }

    match content {
        Some((attr, escaping)) if escaping => {
            let was_escaping = ctx.escaping;
            ctx.escaping = true;
            let expr = ctx.parse_expr(&attr.value, attr.span)?;
            let esc = ctx.emit(Instr::Esc { expr, body_end: 0 });
            // the element body is the default when the value is not set
            compile_siblings(ctx, registry, &el.children)?;
            let end = ctx.here();
            ctx.patch_jump(esc, end);
            ctx.escaping = was_escaping;
        }
        Some((attr, _)) => {
            let expr = ctx.parse_expr(&attr.value, attr.span)?;
            ctx.emit(Instr::Raw { expr });
        }
        None if is_widget => {
            // placeholder nodes own no children; the widget's own template
            // renders under its root
        }
        None => {
            let was_pre = ctx.in_pre_tag;
            if el.tag == "pre" {
                ctx.in_pre_tag = true;
            }
            // bindings introduced inside the subtree stay inside it
            let marker = ctx.enter_scope();
            let result = compile_siblings(ctx, registry, &el.children);
            ctx.exit_scope(marker);
            ctx.in_pre_tag = was_pre;
            result?;
        }
    }

    if emits_node {
        ctx.emit(Instr::CloseElement);
    }
    Ok(())
}

/// Emit a text node with the whitespace rule: verbatim inside `<pre>`,
/// dropped when whitespace-only with a newline, collapsed otherwise.
fn emit_text(ctx: &mut CompilationContext, text: &TextNode) {
    if ctx.in_pre_tag {
        if !text.content.is_empty() {
            ctx.emit(Instr::Text {
                text: text.content.clone(),
            });
        }
        return;
    }
    let content = &text.content;
    if content.is_empty() {
        return;
    }
    if content.trim().is_empty() {
        if content.contains('\n') {
            return;
        }
        ctx.emit(Instr::Text {
            text: " ".to_string(),
        });
        return;
    }
    ctx.emit(Instr::Text {
        text: collapse_whitespace(content),
    });
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_ws = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !in_ws {
                out.push(' ');
                in_ws = true;
            }
        } else {
            out.push(c);
            in_ws = false;
        }
    }
    out
}
