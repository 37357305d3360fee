//! `mpu fmt` — canonical re-emission of a source file's statement list.
//! Only lexes and parses; formatting a program that doesn't yet link (e.g.
//! has an undefined forward reference while being edited) should still work.
//!
//! Deliberately uses the non-expanding `tokenize`, not `tokenize_with_includes`:
//! a formatter must reproduce only the file it was given, with `include`
//! directives left verbatim rather than inlining the included file's body.

use std::fs;
use std::path::PathBuf;

use mpu_asm::error::AsmError;
use mpu_asm::lexer::tokenize;
use mpu_asm::parser::parse;

use crate::error::{CliError, Result};
use crate::formatter;

pub fn run(input: &PathBuf) -> Result<()> {
    let source = fs::read_to_string(input)?;
    let lexed = tokenize(&source);
    report(&lexed.errors);

    let parsed = parse(&lexed.tokens);
    report(&parsed.errors);

    if !lexed.errors.is_empty() || !parsed.errors.is_empty() {
        return Err(CliError::assemble(input, lexed.errors.len() + parsed.errors.len()));
    }

    print!("{}", formatter::render(&parsed.statements));
    Ok(())
}

fn report(errors: &[AsmError]) {
    for err in errors {
        eprintln!("{err}");
    }
}
