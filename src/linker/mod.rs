//! # Linker
//!
//! Two-pass code generator: pass 1 walks the statement list in order,
//! assigning each a PC range and emitting bytes (or patches) into a 64 KiB
//! image; pass 2 resolves patches left over from forward references.
//!
//! Grounded on `original_source/asm/linker.go`'s `Link()`/`resolveWordOperand`
//! for the byte-level emission rules (in particular the `OffsetByte`
//! `value - pc + 1` arithmetic and the function prologue's offset-assignment
//! order), generalized from its linked-list statement walk to this crate's
//! `Vec<Statement>`.

#[cfg(test)]
mod tests;

use std::collections::HashSet;

use crate::error::{AsmError, ErrorKind, Span};
use crate::isa::{self, Mode, Op};
use crate::parser::ast::{Expression, Operand, Param, ParamSize, Statement, StatementKind};
use crate::symbols::SymbolTable;

/// One `{pc, file, line}` row per emitted instruction, so a trapped PC can be
/// mapped back to source coordinates (spec.md §4.5, used by the test runner).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugEntry {
    pub pc: u16,
    pub file: String,
    pub line: usize,
}

/// An unresolved expression recorded during pass 1, to be retried in pass 2.
struct Patch {
    expr: Expression,
    mode: Mode,
    pc: u16,
    span: Span,
}

/// A discovered `test Name():` entry point (`original_source/test/discovery.go`'s
/// `TestInfo`, minus the `Function` field — here the global symbol name and
/// the test name are always the same).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestEntry {
    pub name: String,
    pub address: u16,
    pub file: String,
    pub line: usize,
}

pub struct LinkResult {
    pub code: Vec<u8>,
    pub symbols: SymbolTable,
    pub debug_info: Vec<DebugEntry>,
    /// Every `test Name():` block, in source order (spec.md §5: "the test
    /// runner executes tests in source order").
    pub tests: Vec<TestEntry>,
    /// A global label literally named `test_setup`/`test_teardown`, run
    /// before/after each test if present (`original_source/test/discovery.go`).
    pub setup_fn: Option<String>,
    pub teardown_fn: Option<String>,
    pub errors: Vec<AsmError>,
}

#[must_use]
pub fn link(statements: &[Statement]) -> LinkResult {
    let mut linker = Linker::new();
    linker.run(statements);
    LinkResult {
        code: linker.code(),
        symbols: linker.symbols,
        debug_info: linker.debug_info,
        tests: linker.tests,
        setup_fn: linker.setup_fn,
        teardown_fn: linker.teardown_fn,
        errors: linker.errors,
    }
}

struct Linker {
    symbols: SymbolTable,
    code: Vec<u8>,
    pc: u32,
    patches: Vec<Patch>,
    debug_info: Vec<DebugEntry>,
    errors: Vec<AsmError>,
    /// Most recently defined global name, used to qualify local labels,
    /// equates and `var`s exactly the way the parser stamps `active_global`
    /// on expression identifiers.
    current_global: Option<String>,
    /// Whether the statement currently being emitted is inside a `Function`
    /// scope (as opposed to a `Test` scope or no scope at all) — governs the
    /// `ret` -> `rst` upgrade and the explicit-`sav`-is-an-error check.
    in_function: bool,
    /// Indices of `Var` statements already folded into a `Function`'s
    /// lookahead, so the main walk skips them without re-registering.
    handled_vars: HashSet<usize>,
    tests: Vec<TestEntry>,
    setup_fn: Option<String>,
    teardown_fn: Option<String>,
}

impl Linker {
    fn new() -> Self {
        Linker {
            symbols: SymbolTable::new(),
            code: vec![0u8; 65536],
            pc: 0,
            patches: Vec::new(),
            debug_info: Vec::new(),
            errors: Vec::new(),
            current_global: None,
            in_function: false,
            handled_vars: HashSet::new(),
            tests: Vec::new(),
            setup_fn: None,
            teardown_fn: None,
        }
    }

    /// Final image: everything written up to (but not including) `pc`. The
    /// original Go linker's `Code()` returns `code[0:pc+1]`, one byte past
    /// the last thing actually written; that off-by-one is not preserved.
    fn code(&self) -> Vec<u8> {
        self.code[0..self.pc as usize].to_vec()
    }

    fn run(&mut self, statements: &[Statement]) {
        for idx in 0..statements.len() {
            self.emit_statement(statements, idx);
        }
        self.resolve_patches();
    }

    fn qualify(&self, name: &str) -> Result<String, AsmError> {
        if let Some(local) = name.strip_prefix('.') {
            match &self.current_global {
                Some(g) => Ok(format!("{g}.{local}")),
                None => Err(AsmError::no_active_global(Span::unknown())),
            }
        } else {
            Ok(name.to_string())
        }
    }

    /// Register `qualified` as defined with `value`, failing if it is
    /// already defined (spec.md §3: "a name cannot be redefined").
    fn define(&mut self, qualified: &str, value: i32, file: &str, line: usize, span: Span) -> Result<(), AsmError> {
        if let Some(existing) = self.symbols.lookup(qualified) {
            if existing.defined {
                return Err(AsmError::duplicate_label(qualified, span, &existing.file, existing.line));
            }
        }
        self.symbols.add(file, line, qualified);
        self.symbols.define(qualified, value, span)
    }

    fn define_frame_pointer(
        &mut self,
        qualified: &str,
        offset: i32,
        file: &str,
        line: usize,
        span: Span,
    ) -> Result<(), AsmError> {
        if let Some(existing) = self.symbols.lookup(qualified) {
            if existing.defined {
                return Err(AsmError::duplicate_label(qualified, span, &existing.file, existing.line));
            }
        }
        self.symbols.add_frame_pointer(file, line, qualified, offset);
        Ok(())
    }

    fn emit_statement(&mut self, statements: &[Statement], idx: usize) {
        let stmt = &statements[idx];
        let file = stmt.file.clone();
        let line = stmt.line;
        let span = stmt.span;

        let result = match &stmt.kind {
            StatementKind::Label(name) => self.do_label(name, &file, line, span),
            StatementKind::Equate(name, expr) => self.do_equate(name, expr, &file, line, span),
            StatementKind::Org(expr) => self.do_org(expr, span),
            StatementKind::DefineByte(exprs) => self.do_define_byte(exprs, span),
            StatementKind::DefineWord(exprs) => self.do_define_word(exprs, span),
            StatementKind::DefineSpace(expr) => self.do_define_space(expr, span),
            StatementKind::Include(_) => Ok(()),
            StatementKind::Function { name, params } => self.do_function(statements, idx, name, params, &file, line, span),
            StatementKind::Var { name, .. } => {
                if self.handled_vars.contains(&idx) {
                    Ok(())
                } else {
                    Err(AsmError::var_outside_function(name, span))
                }
            }
            StatementKind::Test { name } => self.do_test(name, &file, line, span),
            StatementKind::Instruction { mnemonic, operands } => {
                self.do_instruction(*mnemonic, operands, &file, line, span)
            }
        };

        if let Err(err) = result {
            self.errors.push(err);
        }
    }

    fn do_label(&mut self, name: &str, file: &str, line: usize, span: Span) -> Result<(), AsmError> {
        let qualified = self.qualify(name)?;
        self.define(&qualified, self.pc as i32, file, line, span)?;
        if !name.starts_with('.') {
            self.current_global = Some(name.to_string());
            self.in_function = false;
            match name {
                "test_setup" => self.setup_fn = Some(name.to_string()),
                "test_teardown" => self.teardown_fn = Some(name.to_string()),
                _ => {}
            }
        }
        Ok(())
    }

    fn do_equate(&mut self, name: &str, expr: &Expression, file: &str, line: usize, span: Span) -> Result<(), AsmError> {
        let eval = expr.evaluate(&self.symbols);
        if !eval.resolved {
            return Err(AsmError::must_resolve_immediately("equate", span));
        }
        let qualified = self.qualify(name)?;
        self.define(&qualified, eval.int_value as i32, file, line, span)?;
        if !name.starts_with('.') {
            self.current_global = Some(name.to_string());
            self.in_function = false;
        }
        Ok(())
    }

    fn do_org(&mut self, expr: &Expression, span: Span) -> Result<(), AsmError> {
        let eval = expr.evaluate(&self.symbols);
        if !eval.resolved {
            return Err(AsmError::must_resolve_immediately("org", span));
        }
        if eval.int_value < self.pc as i64 {
            return Err(AsmError::org_moves_backward(self.pc, eval.int_value, span));
        }
        self.pc = eval.int_value as u32;
        Ok(())
    }

    fn do_define_byte(&mut self, exprs: &[Expression], span: Span) -> Result<(), AsmError> {
        for expr in exprs {
            let eval = expr.evaluate(&self.symbols);
            if !eval.resolved {
                self.add_patch(expr.clone(), Mode::ImmediateByte, span);
                self.write_byte(0)?;
                continue;
            }
            if let Some(bytes) = &eval.bytes_value {
                for b in bytes {
                    self.write_byte(*b)?;
                }
            } else {
                self.write_byte((eval.int_value & 0xFF) as u8)?;
            }
        }
        Ok(())
    }

    fn do_define_word(&mut self, exprs: &[Expression], span: Span) -> Result<(), AsmError> {
        for expr in exprs {
            let eval = expr.evaluate(&self.symbols);
            if eval.bytes_value.is_some() {
                return Err(AsmError::bytes_literal_not_allowed("dw", span));
            }
            if !eval.resolved {
                self.add_patch(expr.clone(), Mode::Immediate, span);
                self.write_word(0)?;
                continue;
            }
            self.write_word(eval.int_value as u16)?;
        }
        Ok(())
    }

    fn do_define_space(&mut self, expr: &Expression, span: Span) -> Result<(), AsmError> {
        let eval = expr.evaluate(&self.symbols);
        if !eval.resolved {
            return Err(AsmError::must_resolve_immediately("ds", span));
        }
        if eval.int_value < 0 {
            return Err(AsmError::invalid_space_count(eval.int_value, span));
        }
        for _ in 0..eval.int_value {
            self.write_byte(0)?;
        }
        Ok(())
    }

    fn do_test(&mut self, name: &str, file: &str, line: usize, span: Span) -> Result<(), AsmError> {
        self.define(name, self.pc as i32, file, line, span)?;
        self.current_global = Some(name.to_string());
        self.in_function = false;
        self.tests.push(TestEntry {
            name: name.to_string(),
            address: self.pc as u16,
            file: file.to_string(),
            line,
        });
        Ok(())
    }

    /// Assigns parameter/local frame offsets and emits the automatic `sav`
    /// prologue. Locals are collected by scanning ahead for `Var` statements
    /// until the next scope boundary (`Function`/`Test`/global `Label`),
    /// since this source models them as separate statements rather than
    /// embedding them on the `Function` node the way the original does.
    fn do_function(
        &mut self,
        statements: &[Statement],
        idx: usize,
        name: &str,
        params: &[Param],
        file: &str,
        line: usize,
        span: Span,
    ) -> Result<(), AsmError> {
        self.define(name, self.pc as i32, file, line, span)?;
        self.current_global = Some(name.to_string());
        self.in_function = true;

        // Parameters: ascending from +4, deepest (first-declared) parameter
        // farthest from fp, so offsets are assigned walking the declaration
        // list in reverse (original_source/asm/linker.go's doFunction).
        let mut offset = 4i32;
        for param in params.iter().rev() {
            if offset > 127 {
                return Err(AsmError::frame_offset_out_of_range(&param.name, offset, span));
            }
            let qualified = format!("{name}.{}", param.name);
            self.define_frame_pointer(&qualified, offset, file, line, span)?;
            offset += param.size.bytes() as i32;
        }

        // Locals: descending from -size(first local), in declaration order.
        let mut local_names: Vec<(String, ParamSize)> = Vec::new();
        let mut j = idx + 1;
        while j < statements.len() {
            match &statements[j].kind {
                StatementKind::Var { name: local_name, size } => {
                    local_names.push((local_name.clone(), *size));
                    self.handled_vars.insert(j);
                    j += 1;
                }
                other if is_scope_boundary(other) => break,
                _ => j += 1,
            }
        }

        let mut local_offset = 0i32;
        for (local_name, size) in &local_names {
            local_offset -= size.bytes() as i32;
            if local_offset < -128 {
                return Err(AsmError::frame_offset_out_of_range(local_name, local_offset, span));
            }
            let qualified = format!("{name}.{local_name}");
            self.define_frame_pointer(&qualified, local_offset, file, line, span)?;
        }

        let local_size = (-local_offset) as u8;
        let opcode = isa::encode(Op::Sav, Mode::ImmediateByte, Mode::Implied, span)?;
        self.write_byte(opcode)?;
        self.write_byte(local_size)?;
        Ok(())
    }

    fn do_instruction(&mut self, mnemonic: Op, operands: &[Operand], file: &str, line: usize, span: Span) -> Result<(), AsmError> {
        self.debug_info.push(DebugEntry { pc: self.pc as u16, file: file.to_string(), line });

        let mut operands: Vec<Operand> = operands.to_vec();

        // Frame-pointer promotion, before any mode overrides below.
        for operand in operands.iter_mut() {
            if matches!(operand.mode, Mode::Absolute | Mode::Indirect) && operand.expr.references_frame_pointer(&self.symbols) {
                operand.mode = match operand.mode {
                    Mode::Absolute => Mode::Relative,
                    Mode::Indirect => Mode::RelativeIndirect,
                    other => other,
                };
            }
        }

        match mnemonic {
            Op::Ret if self.in_function => {
                let op = isa::encode(Op::Rst, Mode::Implied, Mode::Implied, span)?;
                return self.write_byte(op);
            }
            Op::Sav if self.in_function => {
                return Err(AsmError::new(
                    ErrorKind::ExplicitSavInFunction,
                    "explicit 'sav' is not allowed inside a function body",
                    span,
                ));
            }
            Op::Jmp | Op::Jsr => {
                if let Some(op0) = operands.get_mut(0) {
                    op0.mode = Mode::Immediate;
                }
            }
            Op::Jeq | Op::Jne | Op::Jge | Op::Jlt | Op::Jcc | Op::Jcs => {
                if let Some(op0) = operands.get_mut(0) {
                    op0.mode = Mode::OffsetByte;
                }
            }
            Op::Pop | Op::Sav => {
                if let Some(op0) = operands.get_mut(0) {
                    if op0.mode == Mode::Immediate {
                        op0.mode = Mode::ImmediateByte;
                    }
                }
            }
            _ => {}
        }

        let m1 = operands.first().map(|o| o.mode).unwrap_or(Mode::Implied);
        let m2 = operands.get(1).map(|o| o.mode).unwrap_or(Mode::Implied);
        let opcode = isa::encode(mnemonic, m1, m2, span)?;
        self.write_byte(opcode)?;

        for operand in &operands {
            self.resolve_operand(operand.mode, &operand.expr, span)?;
        }
        Ok(())
    }

    fn resolve_operand(&mut self, mode: Mode, expr: &Expression, span: Span) -> Result<(), AsmError> {
        let nbytes = mode.operand_bytes();
        if nbytes == 0 {
            return Ok(());
        }
        if self.pc + nbytes as u32 > self.code.len() as u32 {
            return Err(AsmError::code_overflow(span));
        }
        let eval = expr.evaluate(&self.symbols);
        if eval.resolved {
            let addr = self.pc as u16;
            self.poke_operand_value(addr, mode, eval.int_value, span)?;
            self.pc += nbytes as u32;
            Ok(())
        } else {
            self.add_patch(expr.clone(), mode, span);
            if nbytes == 1 {
                self.write_byte(0)
            } else {
                self.write_word(0)
            }
        }
    }

    fn add_patch(&mut self, expr: Expression, mode: Mode, span: Span) {
        self.patches.push(Patch { expr, mode, pc: self.pc as u16, span });
    }

    fn resolve_patches(&mut self) {
        let patches = std::mem::take(&mut self.patches);
        for patch in patches {
            let eval = patch.expr.evaluate(&self.symbols);
            if !eval.resolved {
                self.errors.push(AsmError::unresolved_expression(patch.span));
                continue;
            }
            if let Err(err) = self.poke_operand_value(patch.pc, patch.mode, eval.int_value, patch.span) {
                self.errors.push(err);
            }
        }
    }

    /// Writes a resolved operand's bytes at `addr` without moving `pc` —
    /// `addr` is the reference point for `OffsetByte`'s
    /// `value - addr + 1` arithmetic (spec.md §4.5, §9), which is the PC of
    /// the operand's own first byte in both the immediate-resolution path
    /// (pass 1) and the patch-resolution path (pass 2).
    fn poke_operand_value(&mut self, addr: u16, mode: Mode, value: i64, span: Span) -> Result<(), AsmError> {
        match mode {
            Mode::Immediate | Mode::Absolute | Mode::Indirect => self.poke_word(addr, value as u16),
            Mode::OffsetByte => {
                let rel = value - addr as i64 + 1;
                if !(-128..=127).contains(&rel) {
                    return Err(AsmError::offset_out_of_range(rel, span));
                }
                self.poke_byte(addr, rel as i8 as u8)
            }
            Mode::ImmediateByte | Mode::Relative | Mode::RelativeIndirect => self.poke_byte(addr, (value & 0xFF) as u8),
            Mode::Implied => Ok(()),
        }
    }

    fn poke_byte(&mut self, addr: u16, value: u8) -> Result<(), AsmError> {
        if addr as usize >= self.code.len() {
            return Err(AsmError::code_overflow(Span::unknown()));
        }
        self.code[addr as usize] = value;
        Ok(())
    }

    fn poke_word(&mut self, addr: u16, value: u16) -> Result<(), AsmError> {
        let [lo, hi] = value.to_le_bytes();
        self.poke_byte(addr, lo)?;
        self.poke_byte(addr.wrapping_add(1), hi)
    }

    fn write_byte(&mut self, value: u8) -> Result<(), AsmError> {
        if self.pc >= self.code.len() as u32 {
            return Err(AsmError::code_overflow(Span::unknown()));
        }
        self.poke_byte(self.pc as u16, value)?;
        self.pc += 1;
        Ok(())
    }

    fn write_word(&mut self, value: u16) -> Result<(), AsmError> {
        let [lo, hi] = value.to_le_bytes();
        self.write_byte(lo)?;
        self.write_byte(hi)
    }
}

fn is_scope_boundary(kind: &StatementKind) -> bool {
    match kind {
        StatementKind::Function { .. } | StatementKind::Test { .. } => true,
        StatementKind::Label(name) => !name.starts_with('.'),
        _ => false,
    }
}
