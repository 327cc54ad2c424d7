//! The compiled render program.
//!
//! A template compiles to a flat list of instructions plus side tables for
//! expressions and nested blocks (`t-set` bodies, `t-call` pre-blocks).
//! Conditionals compile to forward jumps patched at their join points;
//! loops to an enter/exit pair delimiting the body range. The executor runs
//! the program against an evaluation context and a scope chain and builds a
//! VNode tree.

use crate::expr::Expr;
use smol_str::SmolStr;
use std::fmt;

/// Index of an expression in [`Program::exprs`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExprId(pub u32);

/// Index of a nested block in [`Program::blocks`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BlockId(pub u32);

/// An instruction address within one instruction list.
pub type Addr = usize;

/// A compiled template.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Program {
    /// Top-level instruction list.
    pub instrs: Vec<Instr>,
    /// Nested instruction blocks referenced by [`BlockId`].
    pub blocks: Vec<Vec<Instr>>,
    /// Expression table referenced by [`ExprId`].
    pub exprs: Vec<Expr>,
}

/// A single render instruction.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Instr {
    /// Open an element frame.
    OpenElement { tag: SmolStr },
    /// Close the current element frame and append it to its parent.
    CloseElement,
    /// Static attribute on the open element.
    StaticAttr { name: SmolStr, value: String },
    /// `t-att-<name>`: dynamic attribute, suppressed when falsy.
    DynAttr { name: SmolStr, expr: ExprId },
    /// `t-att`: a `[name, value]` pair or a name→value mapping.
    SpreadAttrs { expr: ExprId },
    /// `t-attf-<name>`: interpolated attribute.
    FmtAttr { name: SmolStr, parts: Vec<FmtPart> },
    /// `t-key`: diffing key for the open element (or, inside a loop with no
    /// open frame, for the next element of the iteration).
    NodeKey { expr: ExprId },
    /// `t-ref`: bind the node under the evaluated name after patch.
    NodeRef { expr: ExprId },
    /// `t-on-<event>`: register an event listener.
    Listener {
        event: SmolStr,
        modifiers: Vec<SmolStr>,
        handler: HandlerSpec,
    },
    /// `t-transition`: annotate the open element with transition hooks.
    Transition { name: SmolStr },
    /// `t-widget`: mark the open element as a child-widget placeholder.
    Widget { expr: ExprId },
    /// Literal text child.
    Text { text: String },
    /// `t-esc`: emit the value as text when set, otherwise fall through to
    /// the default body ending at `body_end`.
    Esc { expr: ExprId, body_end: Addr },
    /// `t-raw`: emit the value as parsed HTML fragments.
    Raw { expr: ExprId },
    /// `t-set`: bind a name in the current scope.
    Set {
        name: SmolStr,
        value: Option<ExprId>,
        body: Option<BlockId>,
    },
    /// Jump to `target` when the expression is falsy.
    JumpIfFalsy { expr: ExprId, target: Addr },
    /// Unconditional jump.
    Jump { target: Addr },
    /// `t-foreach`: run the body range `(self, end)` once per item with the
    /// loop variables in scope, then continue at `end + 1`.
    EnterLoop {
        expr: ExprId,
        alias: SmolStr,
        key: Option<ExprId>,
        end: Addr,
    },
    /// Loop body delimiter; matches the innermost [`Instr::EnterLoop`].
    ExitLoop,
    /// `t-call`: render another template inline, executing the pre-block in
    /// a shared scope first.
    CallTemplate { name: SmolStr, body: Option<BlockId> },
    /// `t-debug`: log the compiled program once per render.
    Debug,
    /// `t-log`: log the evaluated expression.
    Log { expr: ExprId },
}

/// A segment of a `t-attf-*` value.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FmtPart {
    Lit(String),
    Expr(ExprId),
}

/// A compiled `t-on-*` handler.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum HandlerSpec {
    /// A method name resolved against the rendering context, with
    /// render-time evaluated arguments.
    Named { name: SmolStr, args: Vec<ExprId> },
    /// A plain expression evaluated when the event fires.
    Eval(ExprId),
}

impl Program {
    /// Dump the instruction listing, the form `t-debug` logs.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        dump_instrs(&mut out, &self.instrs, 0);
        for (i, block) in self.blocks.iter().enumerate() {
            out.push_str(&format!("block {}:\n", i));
            dump_instrs(&mut out, block, 1);
        }
        out
    }
}

fn dump_instrs(out: &mut String, instrs: &[Instr], indent: usize) {
    for (addr, instr) in instrs.iter().enumerate() {
        out.push_str(&"  ".repeat(indent));
        out.push_str(&format!("{:04} {}\n", addr, instr));
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instr::OpenElement { tag } => write!(f, "open <{}>", tag),
            Instr::CloseElement => write!(f, "close"),
            Instr::StaticAttr { name, value } => write!(f, "attr {}={:?}", name, value),
            Instr::DynAttr { name, expr } => write!(f, "att {} e{}", name, expr.0),
            Instr::SpreadAttrs { expr } => write!(f, "att-spread e{}", expr.0),
            Instr::FmtAttr { name, parts } => write!(f, "attf {} ({} parts)", name, parts.len()),
            Instr::NodeKey { expr } => write!(f, "key e{}", expr.0),
            Instr::NodeRef { expr } => write!(f, "ref e{}", expr.0),
            Instr::Listener { event, .. } => write!(f, "on {}", event),
            Instr::Transition { name } => write!(f, "transition {}", name),
            Instr::Widget { expr } => write!(f, "widget e{}", expr.0),
            Instr::Text { text } => write!(f, "text {:?}", text),
            Instr::Esc { expr, body_end } => write!(f, "esc e{} else..{}", expr.0, body_end),
            Instr::Raw { expr } => write!(f, "raw e{}", expr.0),
            Instr::Set { name, value, body } => write!(
                f,
                "set {} value={:?} body={:?}",
                name,
                value.map(|e| e.0),
                body.map(|b| b.0)
            ),
            Instr::JumpIfFalsy { expr, target } => write!(f, "jf e{} -> {}", expr.0, target),
            Instr::Jump { target } => write!(f, "jmp -> {}", target),
            Instr::EnterLoop { alias, end, .. } => write!(f, "loop {} ..{}", alias, end),
            Instr::ExitLoop => write!(f, "endloop"),
            Instr::CallTemplate { name, body } => {
                write!(f, "call {} body={:?}", name, body.map(|b| b.0))
            }
            Instr::Debug => write!(f, "debug"),
            Instr::Log { expr } => write!(f, "log e{}", expr.0),
        }
    }
}
