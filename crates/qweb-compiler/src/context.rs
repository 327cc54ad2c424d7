//! Compilation context.
//!
//! Mutable scratch state threaded through directive dispatch: the
//! instruction buffer being emitted into, scope variables with enter/exit
//! markers, the loop/pre-tag/escaping flags, a counter for generated
//! temporaries, and the stack of open `t-if` chains awaiting their join
//! points.

use crate::error::{CompileError, CompileResult};
use crate::expr::{self, Expr, HandlerExpr, InterpPart};
use crate::ir::{Addr, BlockId, ExprId, FmtPart, Instr, Program};
use qweb_template::Span;
use smol_str::SmolStr;

/// An in-progress `t-if`/`t-elif`/`t-else` chain among one sibling list.
#[derive(Debug)]
pub struct IfChain {
    /// Address of the falsy-jump of the current branch, patched when the
    /// next branch (or the chain end) is reached. `None` once a `t-else`
    /// consumed it.
    pub pending: Option<Addr>,
    /// Jumps emitted at the end of each taken branch, all patched to the
    /// join point when the chain closes.
    pub end_jumps: Vec<Addr>,
    /// Whether a `t-else` closed the chain for further branches.
    pub closed: bool,
}

/// Scratch state for one template compilation.
pub struct CompilationContext {
    /// Template name, surfaced in error messages and warnings.
    pub template: SmolStr,
    /// Stack of instruction buffers; the top receives emissions. Nested
    /// blocks (`t-set`/`t-call` bodies) push a fresh buffer.
    buffers: Vec<Vec<Instr>>,
    /// Finished nested blocks.
    blocks: Vec<Vec<Instr>>,
    /// Expression table.
    exprs: Vec<Expr>,
    /// Declared scope variable names, innermost last.
    vars: Vec<SmolStr>,
    /// Open `t-if` chains, one per sibling list being compiled.
    pub if_stack: Vec<Option<IfChain>>,
    /// Loop nesting depth.
    pub in_loop: u32,
    /// Inside a `<pre>` subtree: text is preserved verbatim.
    pub in_pre_tag: bool,
    /// Compiling escaped (`t-esc`) rather than raw content.
    pub escaping: bool,
    /// Counter for generated temporaries.
    next_id: u32,
    /// The missing-`t-key` warning fires once per compilation.
    key_warned: bool,
}

impl CompilationContext {
    /// Create a context for compiling `template`.
    pub fn new(template: impl Into<SmolStr>) -> Self {
        Self {
            template: template.into(),
            buffers: vec![Vec::new()],
            blocks: Vec::new(),
            exprs: Vec::new(),
            vars: Vec::new(),
            if_stack: Vec::new(),
            in_loop: 0,
            in_pre_tag: false,
            escaping: false,
            next_id: 0,
            key_warned: false,
        }
    }

    /// Append an instruction, returning its address.
    pub fn emit(&mut self, instr: Instr) -> Addr {
        let buffer = self.buffers.last_mut().expect("no open buffer");
        buffer.push(instr);
        buffer.len() - 1
    }

    /// The address the next instruction will get.
    pub fn here(&self) -> Addr {
        self.buffers.last().map(|b| b.len()).unwrap_or(0)
    }

    /// Patch a previously emitted jump to land on `target`.
    pub fn patch_jump(&mut self, addr: Addr, target: Addr) {
        let buffer = self.buffers.last_mut().expect("no open buffer");
        match &mut buffer[addr] {
            Instr::Jump { target: t } | Instr::JumpIfFalsy { target: t, .. } => *t = target,
            Instr::Esc { body_end, .. } => *body_end = target,
            Instr::EnterLoop { end, .. } => *end = target,
            other => unreachable!("patching non-jump instruction {:?}", other),
        }
    }

    /// Open a fresh buffer for a nested block.
    pub fn push_buffer(&mut self) {
        self.buffers.push(Vec::new());
    }

    /// Close the top buffer and store it as a block.
    pub fn pop_block(&mut self) -> BlockId {
        let buffer = self.buffers.pop().expect("no open buffer");
        self.blocks.push(buffer);
        BlockId(self.blocks.len() as u32 - 1)
    }

    /// Intern an already-parsed expression.
    pub fn add_expr(&mut self, expr: Expr) -> ExprId {
        self.exprs.push(expr);
        ExprId(self.exprs.len() as u32 - 1)
    }

    /// Parse and intern a template expression, wrapping syntax errors with
    /// the template name.
    pub fn parse_expr(&mut self, source: &str, span: Span) -> CompileResult<ExprId> {
        let expr = {
            let vars = &self.vars;
            expr::parse_expression(source, &|name| vars.iter().any(|v| v == name))
        }
        .map_err(|e| CompileError::invalid_expression(&self.template, &e.to_string(), span))?;
        Ok(self.add_expr(expr))
    }

    /// Parse a `t-on-*` handler expression.
    pub fn parse_handler(&mut self, source: &str, span: Span) -> CompileResult<HandlerExpr> {
        let vars = &self.vars;
        expr::parse_handler(source, &|name| vars.iter().any(|v| v == name))
            .map_err(|e| CompileError::invalid_expression(&self.template, &e.to_string(), span))
    }

    /// Parse a `t-attf-*` interpolated value into format parts.
    pub fn parse_interpolation(&mut self, source: &str, span: Span) -> CompileResult<Vec<FmtPart>> {
        let parts = {
            let vars = &self.vars;
            expr::parse_interpolation(source, &|name| vars.iter().any(|v| v == name))
        }
        .map_err(|e| CompileError::invalid_expression(&self.template, &e.to_string(), span))?;
        Ok(parts
            .into_iter()
            .map(|part| match part {
                InterpPart::Lit(lit) => FmtPart::Lit(lit),
                InterpPart::Expr(expr) => FmtPart::Expr(self.add_expr(expr)),
            })
            .collect())
    }

    /// Enter a new scope, returning a marker for [`Self::exit_scope`].
    pub fn enter_scope(&mut self) -> usize {
        self.vars.len()
    }

    /// Exit a scope, removing variables declared since the marker.
    pub fn exit_scope(&mut self, marker: usize) {
        self.vars.truncate(marker);
    }

    /// Declare a scope variable. Redeclaring an existing name rebinds it.
    pub fn declare(&mut self, name: impl Into<SmolStr>) {
        let name = name.into();
        if !self.vars.contains(&name) {
            self.vars.push(name);
        }
    }

    /// Whether a name is bound in the compilation scope.
    pub fn is_declared(&self, name: &str) -> bool {
        self.vars.iter().any(|v| v == name)
    }

    /// Generate a unique identifier with the given prefix.
    pub fn unique_id(&mut self, prefix: &str) -> SmolStr {
        self.next_id += 1;
        SmolStr::new(format!("{}{}", prefix, self.next_id))
    }

    /// Warn once per compilation about loop children without `t-key`.
    pub fn warn_missing_key(&mut self) {
        if !self.key_warned {
            self.key_warned = true;
            log::warn!(
                "template '{}': elements repeated by t-foreach have no t-key; \
                 reconciliation will not track moves",
                self.template
            );
        }
    }

    /// Materialize the compiled program.
    pub fn finish(mut self) -> Program {
        debug_assert_eq!(self.buffers.len(), 1, "unbalanced block buffers");
        Program {
            instrs: self.buffers.pop().unwrap_or_default(),
            blocks: self.blocks,
            exprs: self.exprs,
        }
    }
}
