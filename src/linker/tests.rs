#[cfg(test)]
mod tests {
    use crate::error::ErrorKind;
    use crate::lexer::tokenize;
    use crate::linker::{link, LinkResult};
    use crate::parser::parse;

    fn link_ok(input: &str) -> LinkResult {
        let lexed = tokenize(input);
        assert!(lexed.errors.is_empty(), "lexer errors: {:?}", lexed.errors);
        let parsed = parse(&lexed.tokens);
        assert!(parsed.errors.is_empty(), "parser errors: {:?}", parsed.errors);
        let linked = link(&parsed.statements);
        assert!(linked.errors.is_empty(), "linker errors: {:?}", linked.errors);
        linked
    }

    #[test]
    fn minimal_equate_emits_no_bytes() {
        let linked = link_ok("number = 5\n");
        assert!(linked.code.is_empty());
        let sym = linked.symbols.lookup("number").unwrap();
        assert_eq!(sym.value, 5);
        assert!(sym.defined);
    }

    #[test]
    fn org_and_data() {
        let linked = link_ok("org 0x100\na: dw 0xBEEF\n");
        assert_eq!(&linked.code[0x100..0x102], &[0xEF, 0xBE]);
        assert_eq!(linked.symbols.lookup("a").unwrap().value, 0x100);
    }

    #[test]
    fn forward_reference_jump_resolves_in_pass_two() {
        let linked = link_ok("org 0x200\nstart: jmp loop\nloop: hlt\n");
        // jmp opcode (Immediate absolute-jump override) at 0x200, operand at 0x201..0x203.
        assert_eq!(linked.code[0x200], 0xE4);
        let target = u16::from_le_bytes([linked.code[0x201], linked.code[0x202]]);
        assert_eq!(target, 0x203);
        assert_eq!(linked.code[0x203], 0x00); // hlt
    }

    #[test]
    fn relative_jump_offset_byte_formula() {
        // jeq's operand byte sits at pc+1 (right after the opcode); the
        // encoded value is end - (addr_of_offset_byte) + 1.
        let linked = link_ok("org 0x100\nstart: cmp a, #5\n jeq end\n hlt\na: dw 5\nend: hlt\n");
        let jeq_pc = linked
            .debug_info
            .iter()
            .find(|e| e.line == 3)
            .map(|e| e.pc)
            .expect("jeq debug entry");
        let offset_addr = jeq_pc + 1;
        let end_pc = linked.symbols.lookup("end").unwrap().value as u16;
        let expected = (end_pc as i32 - offset_addr as i32 + 1) as i8;
        assert_eq!(linked.code[offset_addr as usize] as i8, expected);
    }

    #[test]
    fn duplicate_label_is_an_error() {
        let lexed = tokenize("a: hlt\na: hlt\n");
        let parsed = parse(&lexed.tokens);
        let linked = link(&parsed.statements);
        assert_eq!(linked.errors.len(), 1);
        assert_eq!(linked.errors[0].kind, ErrorKind::DuplicateLabel);
    }

    #[test]
    fn function_prologue_assigns_frame_offsets_in_reverse_declaration_order() {
        let linked = link_ok("add(r word, x word, y word):\n cpy r, x\n add r, y\n ret\n");
        // Reverse declaration order: y, x, r ascending from +4 (grounded on
        // original_source/asm/linker.go's doFunction).
        assert_eq!(linked.symbols.lookup("add.y").unwrap().value, 4);
        assert_eq!(linked.symbols.lookup("add.x").unwrap().value, 6);
        assert_eq!(linked.symbols.lookup("add.r").unwrap().value, 8);
        for name in ["add.y", "add.x", "add.r"] {
            assert!(linked.symbols.lookup(name).unwrap().frame_pointer_relative);
        }
    }

    #[test]
    fn function_prologue_emits_sav_and_upgrades_trailing_ret() {
        let linked = link_ok("f():\n var c word\n ret\n");
        // sav opcode + literal local size (2, one word local).
        let sav_opcode = crate::isa::encode(crate::isa::Op::Sav, crate::isa::Mode::ImmediateByte, crate::isa::Mode::Implied, crate::error::Span::unknown()).unwrap();
        assert_eq!(linked.code[0], sav_opcode);
        assert_eq!(linked.code[1], 2);
        let rst_opcode = crate::isa::encode(crate::isa::Op::Rst, crate::isa::Mode::Implied, crate::isa::Mode::Implied, crate::error::Span::unknown()).unwrap();
        assert_eq!(*linked.code.last().unwrap(), rst_opcode);
    }

    #[test]
    fn local_offsets_descend_from_negative_one_in_declaration_order() {
        let linked = link_ok("f():\n var a word\n var b byte\n ret\n");
        assert_eq!(linked.symbols.lookup("f.a").unwrap().value, -2);
        assert_eq!(linked.symbols.lookup("f.b").unwrap().value, -3);
    }

    #[test]
    fn var_outside_function_is_an_error() {
        let lexed = tokenize("var c word\n");
        let parsed = parse(&lexed.tokens);
        let linked = link(&parsed.statements);
        assert_eq!(linked.errors.len(), 1);
        assert_eq!(linked.errors[0].kind, ErrorKind::VarOutsideFunction);
    }

    #[test]
    fn test_declaration_has_no_prologue() {
        let linked = link_ok("test Eq():\n sea\n cmp #5, #5\n ret\n");
        // First byte is the `sea` opcode (implied), not a `sav`.
        let sea_opcode = crate::isa::encode(crate::isa::Op::Sea, crate::isa::Mode::Implied, crate::isa::Mode::Implied, crate::error::Span::unknown()).unwrap();
        assert_eq!(linked.code[0], sea_opcode);
    }

    #[test]
    fn explicit_sav_inside_function_is_an_error() {
        let lexed = tokenize("f():\n sav #4\n ret\n");
        let parsed = parse(&lexed.tokens);
        let linked = link(&parsed.statements);
        assert!(linked.errors.iter().any(|e| e.kind == ErrorKind::ExplicitSavInFunction));
    }

    #[test]
    fn pop_immediate_reinterpreted_as_immediate_byte() {
        let linked = link_ok("psh #1\npop #1\n");
        let pop_opcode = crate::isa::encode(crate::isa::Op::Pop, crate::isa::Mode::ImmediateByte, crate::isa::Mode::Implied, crate::error::Span::unknown()).unwrap();
        // psh #1 is 3 bytes (opcode + word); pop follows at index 3.
        assert_eq!(linked.code[3], pop_opcode);
    }

    #[test]
    fn frame_pointer_promotion_overrides_absolute_to_relative() {
        let linked = link_ok("add(x word):\n cpy x, #1\n ret\n");
        let cpy_abs_imm = crate::isa::encode(crate::isa::Op::Cpy, crate::isa::Mode::Absolute, crate::isa::Mode::Immediate, crate::error::Span::unknown()).unwrap();
        let cpy_rel_imm = crate::isa::encode(crate::isa::Op::Cpy, crate::isa::Mode::Relative, crate::isa::Mode::Immediate, crate::error::Span::unknown()).unwrap();
        assert_ne!(linked.code[0], cpy_abs_imm);
        assert_eq!(linked.code[0], cpy_rel_imm);
    }

    #[test]
    fn dw_rejects_string_literal() {
        let lexed = tokenize("dw \"hi\"\n");
        let parsed = parse(&lexed.tokens);
        let linked = link(&parsed.statements);
        assert_eq!(linked.errors.len(), 1);
        assert_eq!(linked.errors[0].kind, ErrorKind::BytesLiteralNotAllowed);
    }

    #[test]
    fn org_cannot_move_backward() {
        let lexed = tokenize("org 0x100\ndw 1\norg 0x100\n");
        let parsed = parse(&lexed.tokens);
        let linked = link(&parsed.statements);
        assert_eq!(linked.errors.len(), 1);
        assert_eq!(linked.errors[0].kind, ErrorKind::OrgMovesBackward);
    }

    #[test]
    fn ds_emits_zero_bytes() {
        let linked = link_ok("org 0x10\nds 4\n");
        assert_eq!(&linked.code[0x10..0x14], &[0, 0, 0, 0]);
    }
}
