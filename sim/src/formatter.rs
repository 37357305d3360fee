//! Canonical source re-emission: fixed indentation, lowercased mnemonics
//! (the lexer already only accepts lowercase ones, so this is really just
//! "structure", not case-folding), one statement per line. Walks the same
//! `Vec<Statement>` the linker consumes.

use std::fmt::Write as _;

use mpu_asm::isa::Mode;
use mpu_asm::parser::ast::{BinaryOp, Expression, Operand, Param, ParamSize, Statement, StatementKind, UnaryOp};

pub fn render(statements: &[Statement]) -> String {
    let mut out = String::new();
    for stmt in statements {
        if stmt.leading_blank_line {
            out.push('\n');
        }
        for comment in &stmt.block_comment {
            let _ = writeln!(out, "// {comment}");
        }
        let line = render_statement(&stmt.kind);
        let _ = write!(out, "{line}");
        if let Some(trailing) = &stmt.trailing_comment {
            let _ = write!(out, "  // {trailing}");
        }
        out.push('\n');
    }
    out
}

fn render_statement(kind: &StatementKind) -> String {
    match kind {
        StatementKind::Label(name) => format!("{name}:"),
        StatementKind::Equate(name, expr) => format!("{name} = {}", render_expr(expr)),
        StatementKind::Org(expr) => format!("org {}", render_expr(expr)),
        StatementKind::DefineByte(exprs) => format!("db {}", render_expr_list(exprs)),
        StatementKind::DefineWord(exprs) => format!("dw {}", render_expr_list(exprs)),
        StatementKind::DefineSpace(expr) => format!("ds {}", render_expr(expr)),
        StatementKind::Include(path) => format!("include \"{path}\""),
        StatementKind::Function { name, params } => {
            format!("{name}({}):", render_params(params))
        }
        StatementKind::Var { name, size } => format!("  var {name} {}", render_size(*size)),
        StatementKind::Test { name } => format!("test {name}():"),
        StatementKind::Instruction { mnemonic, operands } => {
            if operands.is_empty() {
                format!("  {mnemonic}")
            } else {
                let rendered: Vec<String> = operands.iter().map(render_operand).collect();
                format!("  {mnemonic} {}", rendered.join(", "))
            }
        }
    }
}

fn render_params(params: &[Param]) -> String {
    params
        .iter()
        .map(|p| format!("{} {}", p.name, render_size(p.size)))
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_size(size: ParamSize) -> &'static str {
    match size {
        ParamSize::Word => "word",
        ParamSize::Byte => "byte",
    }
}

fn render_expr_list(exprs: &[Expression]) -> String {
    exprs.iter().map(render_expr).collect::<Vec<_>>().join(", ")
}

fn render_operand(operand: &Operand) -> String {
    match operand.mode {
        Mode::Immediate => format!("#{}", render_expr(&operand.expr)),
        Mode::Indirect => format!("*{}", render_expr(&operand.expr)),
        Mode::Relative => render_fp_bracket(&operand.expr),
        Mode::RelativeIndirect => format!("*{}", render_fp_bracket(&operand.expr)),
        Mode::Absolute | Mode::ImmediateByte | Mode::OffsetByte => render_expr(&operand.expr),
    }
}

fn render_fp_bracket(expr: &Expression) -> String {
    match expr {
        Expression::Unary { op: UnaryOp::Neg, child } => format!("[fp-{}]", render_expr(child)),
        _ => format!("[fp+{}]", render_expr(expr)),
    }
}

fn render_expr(expr: &Expression) -> String {
    match expr {
        Expression::IntLiteral { text, .. } => text.clone(),
        Expression::CharLiteral { text, .. } => text.clone(),
        Expression::BytesLiteral { text, .. } => text.clone(),
        Expression::Ident { name, .. } => name.clone(),
        Expression::Unary { op, child } => {
            let sign = match op {
                UnaryOp::Neg => "-",
                UnaryOp::Pos => "+",
            };
            format!("{sign}{}", render_expr(child))
        }
        Expression::Binary { op, left, right } => {
            format!("{} {} {}", render_expr(left), binop_symbol(*op), render_expr(right))
        }
    }
}

fn binop_symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Or => "|",
        BinaryOp::Xor => "^",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::Mod => "%",
        BinaryOp::Shl => "<<",
        BinaryOp::Shr => ">>",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mpu_asm::lexer::tokenize;
    use mpu_asm::parser::parse;

    fn statements(source: &str) -> Vec<Statement> {
        let lexed = tokenize(source);
        assert!(lexed.errors.is_empty(), "{:?}", lexed.errors);
        let parsed = parse(&lexed.tokens);
        assert!(parsed.errors.is_empty(), "{:?}", parsed.errors);
        parsed.statements
    }

    #[test]
    fn label_and_instruction_get_canonical_indentation() {
        let out = render(&statements("main:\nhlt\n"));
        assert_eq!(out, "main:\n  hlt\n");
    }

    #[test]
    fn immediate_and_indirect_operands_round_trip() {
        let out = render(&statements("a: dw 1\nadd a, #2\ncpy *a, a\n"));
        assert!(out.contains("add a, #2"));
        assert!(out.contains("cpy *a, a"));
    }

    #[test]
    fn frame_relative_operand_round_trips_its_sign() {
        let out = render(&statements("f(n word):\n add n, [fp-2]\n ret\n"));
        assert!(out.contains("[fp-2]"));
    }

    #[test]
    fn trailing_comment_is_preserved() {
        let out = render(&statements("hlt // done\n"));
        assert!(out.contains("// done"));
    }
}
