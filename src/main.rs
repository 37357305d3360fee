use std::env;
use std::fs;

use mpu_asm::lexer::tokenize;
use mpu_asm::linker::link;
use mpu_asm::parser::parse;

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: mpu-asm <file.mpu>");
        std::process::exit(1);
    }

    let source = fs::read_to_string(&args[1]).unwrap_or_else(|err| {
        eprintln!("Failed to read file: {}", err);
        std::process::exit(1);
    });

    let lexed = tokenize(&source);
    for err in &lexed.errors {
        eprintln!("{}", err);
    }

    let parsed = parse(&lexed.tokens);
    for err in &parsed.errors {
        eprintln!("{}", err);
    }

    let linked = link(&parsed.statements);
    for err in &linked.errors {
        eprintln!("{}", err);
    }

    if !linked.errors.is_empty() || !lexed.errors.is_empty() || !parsed.errors.is_empty() {
        std::process::exit(1);
    }

    println!("assembled {} bytes, {} symbols, {} tests", linked.code.len(), linked.symbols.len(), linked.tests.len());
    for symbol in linked.symbols.iter() {
        println!("{:#06x} {}", symbol.value, symbol.name);
    }
}
