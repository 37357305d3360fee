#[cfg(test)]
mod tests {
    use crate::error::ErrorKind;
    use crate::isa::{Mode, Op};
    use crate::lexer::tokenize;
    use crate::parser::ast::{BinaryOp, Expression, StatementKind};
    use crate::parser::{parse, ParseResult};

    fn parse_ok(input: &str) -> ParseResult {
        let lexed = tokenize(input);
        assert!(lexed.errors.is_empty(), "Lexer errors: {:?}", lexed.errors);
        let parsed = parse(&lexed.tokens);
        assert!(parsed.errors.is_empty(), "Parser errors: {:?}", parsed.errors);
        parsed
    }

    fn parse_errors(input: &str) -> Vec<ErrorKind> {
        let lexed = tokenize(input);
        let parsed = parse(&lexed.tokens);
        parsed.errors.into_iter().map(|e| e.kind).collect()
    }

    #[test]
    fn global_equate() {
        let result = parse_ok("number = 5\n");
        assert_eq!(result.statements.len(), 1);
        match &result.statements[0].kind {
            StatementKind::Equate(name, Expression::IntLiteral { value, .. }) => {
                assert_eq!(name, "number");
                assert_eq!(*value, 5);
            }
            other => panic!("unexpected statement: {other:?}"),
        }
    }

    #[test]
    fn global_label() {
        let result = parse_ok("start:\n");
        assert_eq!(result.statements[0].kind, StatementKind::Label("start".into()));
    }

    #[test]
    fn local_label_keeps_leading_dot() {
        let result = parse_ok("main:\n.loop:\n");
        assert_eq!(result.statements[1].kind, StatementKind::Label(".loop".into()));
    }

    #[test]
    fn org_directive() {
        let result = parse_ok("org 0x100\n");
        match &result.statements[0].kind {
            StatementKind::Org(Expression::IntLiteral { value, .. }) => assert_eq!(*value, 0x100),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn dw_with_multiple_values() {
        let result = parse_ok("dw 1, 2, 3\n");
        match &result.statements[0].kind {
            StatementKind::DefineWord(exprs) => assert_eq!(exprs.len(), 3),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn db_accepts_string_literal() {
        let result = parse_ok("db \"hi\"\n");
        match &result.statements[0].kind {
            StatementKind::DefineByte(exprs) => {
                assert_eq!(exprs.len(), 1);
                match &exprs[0] {
                    Expression::BytesLiteral { bytes, .. } => assert_eq!(bytes, b"hi"),
                    other => panic!("unexpected: {other:?}"),
                }
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn include_statement() {
        let result = parse_ok("include \"lib.mpu\"\n");
        assert_eq!(result.statements[0].kind, StatementKind::Include("lib.mpu".into()));
    }

    #[test]
    fn function_declaration_with_params() {
        let result = parse_ok("add(r word, x word, y word):\n");
        match &result.statements[0].kind {
            StatementKind::Function { name, params } => {
                assert_eq!(name, "add");
                assert_eq!(params.len(), 3);
                assert_eq!(params[0].name, "r");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_declaration_has_no_params() {
        let result = parse_ok("test Eq():\n");
        assert_eq!(result.statements[0].kind, StatementKind::Test { name: "Eq".into() });
    }

    #[test]
    fn var_declaration_inside_function() {
        let result = parse_ok("f():\n var c word\n");
        match &result.statements[1].kind {
            StatementKind::Var { name, .. } => assert_eq!(name, "c"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn instruction_with_immediate_and_absolute_operands() {
        let result = parse_ok("add r, #5\n");
        match &result.statements[0].kind {
            StatementKind::Instruction { mnemonic, operands } => {
                assert_eq!(*mnemonic, Op::Add);
                assert_eq!(operands[0].mode, Mode::Absolute);
                assert_eq!(operands[1].mode, Mode::Immediate);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn fp_relative_operand() {
        let result = parse_ok("cpy r, [fp+4]\n");
        match &result.statements[0].kind {
            StatementKind::Instruction { operands, .. } => {
                assert_eq!(operands[1].mode, Mode::Relative);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn fp_relative_negative_offset_is_negated() {
        let result = parse_ok("cpy r, [fp-4]\n");
        match &result.statements[0].kind {
            StatementKind::Instruction { operands, .. } => {
                assert!(matches!(operands[1].expr, Expression::Unary { .. }));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn indirect_and_relative_indirect_operands() {
        let result = parse_ok("cpy r, *ptr\ncpy r, *[fp+4]\n");
        match &result.statements[0].kind {
            StatementKind::Instruction { operands, .. } => assert_eq!(operands[1].mode, Mode::Indirect),
            other => panic!("unexpected: {other:?}"),
        }
        match &result.statements[1].kind {
            StatementKind::Instruction { operands, .. } => {
                assert_eq!(operands[1].mode, Mode::RelativeIndirect)
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn expression_precedence() {
        let result = parse_ok("x = 1 + 2 * 3\n");
        match &result.statements[0].kind {
            StatementKind::Equate(_, Expression::Binary { op: BinaryOp::Add, right, .. }) => {
                assert!(matches!(**right, Expression::Binary { op: BinaryOp::Mul, .. }));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn parenthesized_expression() {
        let result = parse_ok("x = (1 + 2) * 3\n");
        match &result.statements[0].kind {
            StatementKind::Equate(_, Expression::Binary { op: BinaryOp::Mul, left, .. }) => {
                assert!(matches!(**left, Expression::Binary { op: BinaryOp::Add, .. }));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn block_comment_attaches_to_next_statement() {
        let result = parse_ok("// header\nstart:\n");
        assert_eq!(result.statements[0].block_comment, vec![" header".to_string()]);
    }

    #[test]
    fn trailing_comment_attaches_to_statement() {
        let result = parse_ok("start: // entry point\n");
        assert_eq!(
            result.statements[0].trailing_comment,
            Some(" entry point".to_string())
        );
    }

    #[test]
    fn blank_line_flag_set_after_gap() {
        let result = parse_ok("a:\n\nb:\n");
        assert!(!result.statements[0].leading_blank_line);
        assert!(result.statements[1].leading_blank_line);
    }

    #[test]
    fn unexpected_identifier_usage_errors_and_recovers() {
        let errors = parse_errors("foo bar\nhlt\n");
        assert!(!errors.is_empty());
    }

    #[test]
    fn missing_fp_inside_brackets_errors() {
        let errors = parse_errors("cpy r, [x+4]\n");
        assert_eq!(errors, vec![ErrorKind::ExpectedOperand]);
    }

    #[test]
    fn local_label_reference_in_operand() {
        let result = parse_ok("main:\n.loop:\njmp .loop\n");
        match &result.statements[2].kind {
            StatementKind::Instruction { operands, .. } => match &operands[0].expr {
                Expression::Ident { name, active_global } => {
                    assert_eq!(name, ".loop");
                    assert_eq!(active_global.as_deref(), Some("main"));
                }
                other => panic!("unexpected: {other:?}"),
            },
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn org_rejects_extra_operand() {
        let errors = parse_errors("org 0x100, 0x200\n");
        assert_eq!(errors, vec![ErrorKind::UnexpectedToken]);
    }

    struct MapLoader {
        files: std::collections::HashMap<String, String>,
    }

    impl crate::lexer::SourceLoader for MapLoader {
        fn resolve(&self, _including_file: &str, path: &str) -> String {
            path.to_string()
        }

        fn load(&mut self, canonical_path: &str) -> std::io::Result<String> {
            self.files
                .get(canonical_path)
                .cloned()
                .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "missing"))
        }
    }

    #[test]
    fn included_file_parses_as_its_own_statements() {
        let mut loader = MapLoader {
            files: [("lib.mpu".to_string(), "double:\nret\n".to_string())].into(),
        };
        let lexed = crate::lexer::tokenize_with_includes("main.mpu", "include \"lib.mpu\"\njsr double\n", &mut loader);
        assert!(lexed.errors.is_empty(), "lexer errors: {:?}", lexed.errors);

        let parsed = parse(&lexed.tokens);
        assert!(parsed.errors.is_empty(), "parser errors: {:?}", parsed.errors);

        assert_eq!(parsed.statements[0].kind, StatementKind::Include("lib.mpu".into()));
        assert_eq!(parsed.statements[1].kind, StatementKind::Label("double".into()));
        match &parsed.statements[3].kind {
            StatementKind::Instruction { operands, .. } => match &operands[0].expr {
                Expression::Ident { name, .. } => assert_eq!(name, "double"),
                other => panic!("unexpected: {other:?}"),
            },
            other => panic!("unexpected: {other:?}"),
        }
    }
}
