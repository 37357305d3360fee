//! # Abstract Syntax Tree (AST)
//!
//! A program is a flat, insertion-ordered `Vec<Statement>` (spec §9: "a
//! vector/array of statements is equivalent and cache-friendlier" than the
//! linked list the original source used; the only real requirement is
//! stable sequential iteration).
//!
//! Statement kinds are a tagged union rather than an inheritance hierarchy —
//! the linker's per-kind emission logic is exhaustive pattern matching, not
//! virtual dispatch.

use crate::error::Span;
use crate::isa::{Mode, Op};
use crate::symbols::SymbolTable;

/// One parsed unit of source. Carries enough provenance (file/line,
/// attached comments) for the listing printer and diagnostics; `pc_range`
/// starts empty and is filled in by the linker's first pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub kind: StatementKind,
    pub file: String,
    pub line: usize,
    pub span: Span,
    /// One or more blank lines separated this statement from the previous one.
    pub leading_blank_line: bool,
    /// Comment lines immediately preceding this statement.
    pub block_comment: Vec<String>,
    /// A `//` comment on the same line, trailing the statement.
    pub trailing_comment: Option<String>,
    /// `(pc_start, pc_end)`, assigned during the linker's layout pass.
    pub pc_range: Option<(u16, u16)>,
}

impl Statement {
    pub fn new(kind: StatementKind, file: impl Into<String>, line: usize, span: Span) -> Self {
        Statement {
            kind,
            file: file.into(),
            line,
            span,
            leading_blank_line: false,
            block_comment: Vec::new(),
            trailing_comment: None,
            pc_range: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamSize {
    Word,
    Byte,
}

impl ParamSize {
    pub fn bytes(self) -> u16 {
        match self {
            ParamSize::Word => 2,
            ParamSize::Byte => 1,
        }
    }
}

/// A function or test parameter. `offset` is fp-relative and unassigned
/// (`None`) until the linker processes the enclosing `Function` statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub size: ParamSize,
    pub offset: Option<i32>,
}

impl Param {
    pub fn new(name: impl Into<String>, size: ParamSize) -> Self {
        Param {
            name: name.into(),
            size,
            offset: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    Label(String),
    Equate(String, Expression),
    Org(Expression),
    DefineByte(Vec<Expression>),
    DefineWord(Vec<Expression>),
    DefineSpace(Expression),
    Include(String),
    /// A function declaration opens a scope; `var` and local labels/equates
    /// inside it belong to it until the next global label/function/test.
    Function { name: String, params: Vec<Param> },
    /// A local inside the currently open function.
    Var { name: String, size: ParamSize },
    /// Like `Function` but with no parameters and no automatic prologue.
    Test { name: String },
    Instruction { mnemonic: Op, operands: Vec<Operand> },
}

/// An instruction operand: its addressing mode (mutable — the linker
/// promotes `Absolute`/`Indirect` to `Relative`/`RelativeIndirect` when the
/// expression is fp-relative, and overrides jump operand modes) plus the
/// expression computing its value.
#[derive(Debug, Clone, PartialEq)]
pub struct Operand {
    pub mode: Mode,
    pub expr: Expression,
}

impl Operand {
    pub fn new(mode: Mode, expr: Expression) -> Self {
        Operand { mode, expr }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Or,
    Xor,
    Mul,
    Div,
    Mod,
    Shl,
    Shr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    IntLiteral { value: i32, text: String },
    CharLiteral { value: u8, text: String },
    BytesLiteral { bytes: Vec<u8>, text: String },
    Ident { name: String, active_global: Option<String> },
    Unary { op: UnaryOp, child: Box<Expression> },
    Binary { op: BinaryOp, left: Box<Expression>, right: Box<Expression> },
}

/// Result of evaluating an expression against the symbol table:
/// `(intValue, bytesValue, resolved)`. Unresolved expressions still return a
/// best-effort `intValue` of 0 so callers that only need a patch size don't
/// have to special-case it.
pub struct EvalResult {
    pub int_value: i64,
    pub bytes_value: Option<Vec<u8>>,
    pub resolved: bool,
}

/// Qualifies a bare identifier reference against an enclosing global scope:
/// `.loop` (a local label/equate, dot already part of the name) concatenates
/// directly; `x` (a plain name — a function parameter or local) gets a
/// separator inserted, matching how `Linker::do_function` registers them as
/// `"{function}.{param}"`.
fn qualify_reference(active_global: &str, name: &str) -> String {
    if name.starts_with('.') {
        format!("{active_global}{name}")
    } else {
        format!("{active_global}.{name}")
    }
}

impl Expression {
    pub fn evaluate(&self, symbols: &SymbolTable) -> EvalResult {
        match self {
            Expression::IntLiteral { value, .. } => EvalResult {
                int_value: *value as i64,
                bytes_value: None,
                resolved: true,
            },
            Expression::CharLiteral { value, .. } => EvalResult {
                int_value: *value as i64,
                bytes_value: None,
                resolved: true,
            },
            Expression::BytesLiteral { bytes, .. } => EvalResult {
                int_value: bytes.first().copied().unwrap_or(0) as i64,
                bytes_value: Some(bytes.clone()),
                resolved: true,
            },
            Expression::Ident { name, active_global } => {
                let qualified = active_global
                    .as_ref()
                    .map(|g| qualify_reference(g, name))
                    .and_then(|qualified| symbols.lookup(&qualified).map(|_| qualified));
                let symbol = qualified
                    .as_deref()
                    .and_then(|q| symbols.lookup(q))
                    .or_else(|| symbols.lookup(name));
                match symbol {
                    Some(sym) if sym.defined => EvalResult {
                        int_value: sym.value as i64,
                        bytes_value: None,
                        resolved: true,
                    },
                    _ => EvalResult {
                        int_value: 0,
                        bytes_value: None,
                        resolved: false,
                    },
                }
            }
            Expression::Unary { op, child } => {
                let inner = child.evaluate(symbols);
                let value = match op {
                    UnaryOp::Neg => -inner.int_value,
                    UnaryOp::Pos => inner.int_value,
                };
                EvalResult {
                    int_value: value,
                    bytes_value: None,
                    resolved: inner.resolved,
                }
            }
            Expression::Binary { op, left, right } => {
                let l = left.evaluate(symbols);
                let r = right.evaluate(symbols);
                let value = match op {
                    BinaryOp::Add => l.int_value.wrapping_add(r.int_value),
                    BinaryOp::Sub => l.int_value.wrapping_sub(r.int_value),
                    BinaryOp::Or => l.int_value | r.int_value,
                    BinaryOp::Xor => l.int_value ^ r.int_value,
                    BinaryOp::Mul => l.int_value.wrapping_mul(r.int_value),
                    BinaryOp::Div => {
                        if r.int_value == 0 {
                            0
                        } else {
                            l.int_value / r.int_value
                        }
                    }
                    BinaryOp::Mod => {
                        if r.int_value == 0 {
                            0
                        } else {
                            l.int_value % r.int_value
                        }
                    }
                    BinaryOp::Shl => l.int_value << (r.int_value & 0xF),
                    BinaryOp::Shr => l.int_value >> (r.int_value & 0xF),
                };
                EvalResult {
                    int_value: value,
                    bytes_value: None,
                    resolved: l.resolved && r.resolved,
                }
            }
        }
    }

    /// Whether this expression transitively references an fp-relative
    /// symbol — used by the linker's frame-pointer promotion step (spec §4.5).
    pub fn references_frame_pointer(&self, symbols: &SymbolTable) -> bool {
        match self {
            Expression::IntLiteral { .. }
            | Expression::CharLiteral { .. }
            | Expression::BytesLiteral { .. } => false,
            Expression::Ident { name, active_global } => {
                let qualified = active_global.as_ref().map(|g| qualify_reference(g, name));
                let symbol = qualified
                    .as_deref()
                    .and_then(|q| symbols.lookup(q))
                    .or_else(|| symbols.lookup(name));
                symbol.map(|s| s.frame_pointer_relative).unwrap_or(false)
            }
            Expression::Unary { child, .. } => child.references_frame_pointer(symbols),
            Expression::Binary { left, right, .. } => {
                left.references_frame_pointer(symbols) || right.references_frame_pointer(symbols)
            }
        }
    }
}
