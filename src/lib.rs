//! # mpu-asm
//!
//! Toolchain core for a toy 16-bit virtual computer ("MPU"): instruction set
//! and binary encoding, a two-pass assembler/linker, and an interpreter with
//! memory-mapped I/O and an assertion-based test mode.
//!
//! ## Pipeline
//!
//! 1. **Lexer** (`lexer`) - tokenizes source, resolving `include` through a
//!    host-supplied [`lexer::SourceLoader`].
//! 2. **Parser** (`parser`) - recursive-descent parse into an
//!    insertion-ordered statement list.
//! 3. **Linker** (`linker`) - two-pass code generation into a 64 KiB image,
//!    producing a symbol table, debug info, and discovered test entries.
//! 4. **Machine** (`machine`) - fetch-decode-execute interpreter over the
//!    linked image.
//!
//! ## Example
//!
//! ```rust,no_run
//! use mpu_asm::{lexer::tokenize, parser::parse, linker::link, machine::Machine};
//!
//! let source = std::fs::read_to_string("program.mpu").unwrap();
//! let lexed = tokenize(&source);
//! let parsed = parse(&lexed.tokens);
//! let linked = link(&parsed.statements);
//!
//! if linked.errors.is_empty() {
//!     let mut machine = Machine::new(&linked.code, 1);
//!     machine.run().unwrap();
//! }
//! ```

pub mod error;
pub mod isa;
pub mod lexer;
pub mod linker;
pub mod machine;
pub mod parser;
pub mod symbols;
