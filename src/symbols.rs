//! # Symbol table
//!
//! Insertion-ordered `Vec<(String, Symbol)>` with linear lookup, matching
//! the teacher's `first_pass/symbol_table.rs` choice of a flat vector over a
//! `HashMap`: toolchain programs have at most a few hundred symbols, so a
//! linear scan is simpler and fast enough.

use crate::error::{AsmError, Span};

/// `{name, file, line, value, defined, framePointerRelative}` (spec §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub file: String,
    pub line: usize,
    pub value: i32,
    pub defined: bool,
    pub frame_pointer_relative: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    entries: Vec<(String, Symbol)>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable::default()
    }

    fn find_mut(&mut self, name: &str) -> Option<&mut Symbol> {
        self.entries.iter_mut().find(|(n, _)| n == name).map(|(_, s)| s)
    }

    /// Register a symbol as seen but undefined. Callers must check for
    /// redefinition themselves (the linker does, before calling this).
    pub fn add(&mut self, file: impl Into<String>, line: usize, name: impl Into<String>) {
        let name = name.into();
        self.entries.push((
            name.clone(),
            Symbol {
                name,
                file: file.into(),
                line,
                value: 0,
                defined: false,
                frame_pointer_relative: false,
            },
        ));
    }

    /// Mark a symbol defined with an integer value.
    pub fn define(&mut self, name: &str, int_value: i32, span: Span) -> Result<(), AsmError> {
        match self.find_mut(name) {
            Some(sym) => {
                sym.value = int_value;
                sym.defined = true;
                sym.frame_pointer_relative = false;
                Ok(())
            }
            None => Err(AsmError::undefined_label(name, span)),
        }
    }

    /// Define a symbol as frame-pointer-relative with a signed byte offset.
    pub fn add_frame_pointer(
        &mut self,
        file: impl Into<String>,
        line: usize,
        name: impl Into<String>,
        offset: i32,
    ) {
        let name = name.into();
        let file = file.into();
        match self.find_mut(&name) {
            Some(sym) => {
                sym.value = offset;
                sym.defined = true;
                sym.frame_pointer_relative = true;
                sym.file = file;
                sym.line = line;
            }
            None => self.entries.push((
                name.clone(),
                Symbol {
                    name,
                    file,
                    line,
                    value: offset,
                    defined: true,
                    frame_pointer_relative: true,
                },
            )),
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, s)| s)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.entries.iter().map(|(_, s)| s)
    }
}
