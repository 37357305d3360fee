//! Side-by-side source-line / emitted-byte listing, built from the linker's
//! `debug_info` table (one `{pc, file, line}` row per emitted instruction).

use std::collections::HashMap;
use std::fmt::Write as _;

use mpu_asm::linker::LinkResult;

/// Renders `linked` as a listing: for each source line that produced code,
/// the line number, the bytes emitted at that PC, and the source text.
pub fn render(source: &str, linked: &LinkResult) -> String {
    let lines: Vec<&str> = source.lines().collect();
    let mut by_line: HashMap<usize, Vec<u16>> = HashMap::new();
    for entry in &linked.debug_info {
        by_line.entry(entry.line).or_default().push(entry.pc);
    }

    let mut out = String::new();
    for (idx, text) in lines.iter().enumerate() {
        let line_no = idx + 1;
        let bytes_col = match by_line.get(&line_no) {
            Some(pcs) => {
                let mut pcs = pcs.clone();
                pcs.sort_unstable();
                let start = pcs[0];
                let end = byte_end(&linked.code, start);
                format_bytes(&linked.code, start, end)
            }
            None => String::new(),
        };
        let _ = writeln!(out, "{line_no:>5}  {bytes_col:<18} {text}");
    }
    out
}

fn byte_end(code: &[u8], start: u16) -> u16 {
    // No per-instruction length is recorded directly; show up to 4 bytes or
    // to the end of the image, whichever is shorter. Good enough for a
    // human-facing listing, which only needs "what landed near this line."
    let max = (start as usize + 4).min(code.len()).min(u16::MAX as usize);
    max as u16
}

fn format_bytes(code: &[u8], start: u16, end: u16) -> String {
    code[start as usize..end as usize]
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use mpu_asm::lexer::tokenize;
    use mpu_asm::linker::link;
    use mpu_asm::parser::parse;

    #[test]
    fn lines_with_code_show_their_emitted_bytes() {
        let source = "org 0x100\nhlt\n";
        let lexed = tokenize(source);
        let parsed = parse(&lexed.tokens);
        let linked = link(&parsed.statements);
        let out = render(source, &linked);
        let hlt_line = out.lines().nth(1).unwrap();
        assert!(hlt_line.contains("00"), "expected an emitted hlt byte: {hlt_line}");
    }

    #[test]
    fn a_blank_source_line_has_no_byte_column() {
        let source = "org 0x100\n\nhlt\n";
        let lexed = tokenize(source);
        let parsed = parse(&lexed.tokens);
        let linked = link(&parsed.statements);
        let out = render(source, &linked);
        let blank_line = out.lines().nth(1).unwrap();
        assert!(!blank_line.contains("00"), "blank line should have no emitted bytes: {blank_line}");
    }
}
