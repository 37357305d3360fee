//! # Parser
//!
//! Recursive-descent parser turning a flat token stream into an
//! insertion-ordered `Vec<Statement>`. At each statement boundary it
//! consumes runs of end-of-line and comment tokens, accumulating block
//! comments for the next statement and attaching a same-line trailing
//! comment to the previous one.

pub mod ast;

#[cfg(test)]
mod tests;

use std::rc::Rc;

use crate::error::{AsmError, ErrorKind, Span};
use crate::isa::Mode;
use crate::lexer::token::{Token, TokenKind};
use ast::{BinaryOp, Expression, Operand, Param, ParamSize, Statement, StatementKind, UnaryOp};

pub struct ParseResult {
    pub statements: Vec<Statement>,
    pub errors: Vec<AsmError>,
}

#[must_use]
pub fn parse(tokens: &[Token]) -> ParseResult {
    let mut parser = Parser::new(tokens);
    parser.run();
    ParseResult {
        statements: parser.statements,
        errors: parser.errors,
    }
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    active_global: Option<String>,
    statements: Vec<Statement>,
    errors: Vec<AsmError>,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Parser {
            tokens,
            pos: 0,
            active_global: None,
            statements: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_at(&self, offset: usize) -> &Token {
        let idx = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[idx]
    }

    fn advance(&mut self) -> &Token {
        let tok = &self.tokens[self.pos.min(self.tokens.len() - 1)];
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn is_eof(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn current_file(&self) -> Rc<str> {
        self.peek().file.clone()
    }

    fn recover_to_newline(&mut self) {
        while !matches!(self.peek().kind, TokenKind::Newline | TokenKind::Eof) {
            self.advance();
        }
    }

    fn run(&mut self) {
        let mut block_comment: Vec<String> = Vec::new();
        let mut leading_blank = false;
        let mut consecutive_newlines = 0u32;

        loop {
            match &self.peek().kind {
                TokenKind::Newline => {
                    consecutive_newlines += 1;
                    if consecutive_newlines >= 2 {
                        leading_blank = true;
                    }
                    self.advance();
                    continue;
                }
                TokenKind::Comment(text) => {
                    block_comment.push(text.clone());
                    self.advance();
                    consecutive_newlines = 0;
                    continue;
                }
                TokenKind::Eof => break,
                _ => {}
            }

            let file = self.current_file();
            let line = self.peek().span.line;
            let start_span = self.peek().span;

            match self.parse_statement() {
                Ok(kind) => {
                    let mut stmt = Statement::new(kind, file.to_string(), line, start_span);
                    stmt.leading_blank_line = leading_blank;
                    stmt.block_comment = std::mem::take(&mut block_comment);
                    if let TokenKind::Comment(text) = &self.peek().kind {
                        stmt.trailing_comment = Some(text.clone());
                        self.advance();
                    }
                    self.statements.push(stmt);
                }
                Err(err) => {
                    self.errors.push(err);
                    block_comment.clear();
                    self.recover_to_newline();
                }
            }

            leading_blank = false;
            consecutive_newlines = 0;

            match self.peek().kind {
                TokenKind::Newline => {
                    self.advance();
                }
                TokenKind::Eof => break,
                _ => {
                    // Trailing garbage on the line; record and recover.
                    self.errors.push(AsmError::new(
                        ErrorKind::UnexpectedToken,
                        "unexpected token after statement",
                        self.peek().span,
                    ));
                    self.recover_to_newline();
                }
            }
        }
    }

    fn parse_statement(&mut self) -> Result<StatementKind, AsmError> {
        match self.peek().kind.clone() {
            TokenKind::Dot => self.parse_local(),
            TokenKind::KwInclude => self.parse_include(),
            TokenKind::KwVar => self.parse_var(),
            TokenKind::KwTest => self.parse_test(),
            TokenKind::KwOrg => self.parse_directive_single(StatementKind::Org, "org"),
            TokenKind::KwDw => self.parse_directive_list(true),
            TokenKind::KwDb => self.parse_directive_list(false),
            TokenKind::KwDs => self.parse_ds(),
            TokenKind::Mnemonic(op) => self.parse_instruction(op),
            TokenKind::Ident(name) => self.parse_ident_led(name),
            _ => {
                let span = self.peek().span;
                self.advance();
                Err(AsmError::new(ErrorKind::UnexpectedToken, "unexpected token at start of statement", span))
            }
        }
    }

    fn parse_local(&mut self) -> Result<StatementKind, AsmError> {
        let dot_span = self.peek().span;
        self.advance(); // '.'
        let name = self.expect_ident("expected an identifier after '.'")?;
        let qualified = format!(".{name}");
        match self.peek().kind.clone() {
            TokenKind::Equals => {
                self.advance();
                let expr = self.parse_expr()?;
                Ok(StatementKind::Equate(qualified, expr))
            }
            TokenKind::Colon => {
                self.advance();
                Ok(StatementKind::Label(qualified))
            }
            _ => Err(AsmError::new(
                ErrorKind::ExpectedColonOrEquals,
                "expected '=' or ':' after local identifier",
                dot_span,
            )),
        }
    }

    fn parse_ident_led(&mut self, name: String) -> Result<StatementKind, AsmError> {
        let ident_span = self.peek().span;
        match self.peek_at(1).kind.clone() {
            TokenKind::Equals => {
                self.advance(); // ident
                self.advance(); // '='
                let expr = self.parse_expr()?;
                self.active_global = Some(name.clone());
                Ok(StatementKind::Equate(name, expr))
            }
            TokenKind::Colon => {
                self.advance();
                self.advance();
                self.active_global = Some(name.clone());
                Ok(StatementKind::Label(name))
            }
            TokenKind::LParen => {
                self.advance(); // ident
                let params = self.parse_param_list()?;
                self.expect(TokenKind::Colon, ErrorKind::ExpectedColonOrEquals, "expected ':' after function parameter list")?;
                self.active_global = Some(name.clone());
                Ok(StatementKind::Function { name, params })
            }
            _ => {
                self.advance();
                Err(AsmError::new(
                    ErrorKind::ExpectedColonOrEquals,
                    format!("expected '=', ':' or '(' after identifier '{name}'"),
                    ident_span,
                ))
            }
        }
    }

    fn parse_param_list(&mut self) -> Result<Vec<Param>, AsmError> {
        self.expect(TokenKind::LParen, ErrorKind::UnexpectedToken, "expected '(' to open parameter list")?;
        let mut params = Vec::new();
        if self.peek().kind != TokenKind::RParen {
            loop {
                let pname = self.expect_ident("expected a parameter name")?;
                let size = self.parse_param_size()?;
                params.push(Param::new(pname, size));
                if self.peek().kind == TokenKind::Comma {
                    self.advance();
                    continue;
                }
                break;
            }
        }
        self.expect(TokenKind::RParen, ErrorKind::UnexpectedToken, "expected ')' to close parameter list")?;
        Ok(params)
    }

    fn parse_param_size(&mut self) -> Result<ParamSize, AsmError> {
        match self.peek().kind {
            TokenKind::KwWord => {
                self.advance();
                Ok(ParamSize::Word)
            }
            TokenKind::KwByte => {
                self.advance();
                Ok(ParamSize::Byte)
            }
            _ => {
                let span = self.peek().span;
                Err(AsmError::new(ErrorKind::ExpectedParamKind, "expected 'word' or 'byte'", span))
            }
        }
    }

    fn parse_include(&mut self) -> Result<StatementKind, AsmError> {
        let span = self.peek().span;
        self.advance();
        match self.peek().kind.clone() {
            TokenKind::StringLit(path) => {
                self.advance();
                Ok(StatementKind::Include(path))
            }
            _ => Err(AsmError::new(ErrorKind::ExpectedString, "expected a quoted path after 'include'", span)),
        }
    }

    fn parse_var(&mut self) -> Result<StatementKind, AsmError> {
        self.advance(); // 'var'
        let name = self.expect_ident("expected a variable name after 'var'")?;
        let size = self.parse_param_size()?;
        Ok(StatementKind::Var { name, size })
    }

    fn parse_test(&mut self) -> Result<StatementKind, AsmError> {
        self.advance(); // 'test'
        let name = self.expect_ident("expected a test name after 'test'")?;
        self.expect(TokenKind::LParen, ErrorKind::UnexpectedToken, "expected '(' after test name")?;
        self.expect(TokenKind::RParen, ErrorKind::UnexpectedToken, "tests take no parameters")?;
        self.expect(TokenKind::Colon, ErrorKind::ExpectedColonOrEquals, "expected ':' after test declaration")?;
        self.active_global = Some(name.clone());
        Ok(StatementKind::Test { name })
    }

    fn parse_directive_single(
        &mut self,
        build: fn(Expression) -> StatementKind,
        keyword: &str,
    ) -> Result<StatementKind, AsmError> {
        self.advance(); // keyword
        let expr = self.parse_expr()?;
        if self.peek().kind == TokenKind::Comma {
            let span = self.peek().span;
            return Err(AsmError::new(
                ErrorKind::UnexpectedToken,
                format!("'{keyword}' takes a single expression"),
                span,
            ));
        }
        Ok(build(expr))
    }

    fn parse_ds(&mut self) -> Result<StatementKind, AsmError> {
        self.parse_directive_single(StatementKind::DefineSpace, "ds")
    }

    fn parse_directive_list(&mut self, is_word: bool) -> Result<StatementKind, AsmError> {
        self.advance(); // keyword
        let mut exprs = vec![self.parse_expr()?];
        while self.peek().kind == TokenKind::Comma {
            self.advance();
            exprs.push(self.parse_expr()?);
        }
        Ok(if is_word {
            StatementKind::DefineWord(exprs)
        } else {
            StatementKind::DefineByte(exprs)
        })
    }

    fn parse_instruction(&mut self, op: crate::isa::Op) -> Result<StatementKind, AsmError> {
        self.advance(); // mnemonic
        let mut operands = Vec::new();
        if !matches!(self.peek().kind, TokenKind::Newline | TokenKind::Eof | TokenKind::Comment(_)) {
            operands.push(self.parse_operand()?);
            while self.peek().kind == TokenKind::Comma {
                self.advance();
                operands.push(self.parse_operand()?);
            }
        }
        Ok(StatementKind::Instruction { mnemonic: op, operands })
    }

    fn parse_operand(&mut self) -> Result<Operand, AsmError> {
        match self.peek().kind.clone() {
            TokenKind::Hash => {
                self.advance();
                let expr = self.parse_expr()?;
                Ok(Operand::new(Mode::Immediate, expr))
            }
            TokenKind::Star => {
                self.advance();
                if self.peek().kind == TokenKind::LBracket {
                    let offset = self.parse_fp_bracket()?;
                    Ok(Operand::new(Mode::RelativeIndirect, offset))
                } else {
                    let expr = self.parse_expr()?;
                    Ok(Operand::new(Mode::Indirect, expr))
                }
            }
            TokenKind::LBracket => {
                let offset = self.parse_fp_bracket()?;
                Ok(Operand::new(Mode::Relative, offset))
            }
            _ => {
                let expr = self.parse_expr()?;
                Ok(Operand::new(Mode::Absolute, expr))
            }
        }
    }

    fn parse_fp_bracket(&mut self) -> Result<Expression, AsmError> {
        let span = self.peek().span;
        self.advance(); // '['
        self.expect(TokenKind::KwFp, ErrorKind::ExpectedOperand, "expected 'fp' inside '[...]'")?;
        let negate = match self.peek().kind {
            TokenKind::Plus => {
                self.advance();
                false
            }
            TokenKind::Minus => {
                self.advance();
                true
            }
            _ => {
                return Err(AsmError::new(ErrorKind::ExpectedOperand, "expected '+' or '-' after 'fp'", span));
            }
        };
        let inner = self.parse_expr()?;
        self.expect(TokenKind::RBracket, ErrorKind::ExpectedOperand, "expected ']' to close fp-relative operand")?;
        Ok(if negate {
            Expression::Unary { op: UnaryOp::Neg, child: Box::new(inner) }
        } else {
            inner
        })
    }

    fn parse_expr(&mut self) -> Result<Expression, AsmError> {
        let mut lhs = self.parse_mul()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                TokenKind::Pipe => BinaryOp::Or,
                TokenKind::Caret => BinaryOp::Xor,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_mul()?;
            lhs = Expression::Binary { op, left: Box::new(lhs), right: Box::new(rhs) };
        }
        Ok(lhs)
    }

    fn parse_mul(&mut self) -> Result<Expression, AsmError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                TokenKind::LShift => BinaryOp::Shl,
                TokenKind::RShift => BinaryOp::Shr,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = Expression::Binary { op, left: Box::new(lhs), right: Box::new(rhs) };
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expression, AsmError> {
        match self.peek().kind {
            TokenKind::Plus => {
                self.advance();
                let child = self.parse_primary()?;
                Ok(Expression::Unary { op: UnaryOp::Pos, child: Box::new(child) })
            }
            TokenKind::Minus => {
                self.advance();
                let child = self.parse_primary()?;
                Ok(Expression::Unary { op: UnaryOp::Neg, child: Box::new(child) })
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<Expression, AsmError> {
        let span = self.peek().span;
        match self.peek().kind.clone() {
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RParen, ErrorKind::UnexpectedToken, "expected ')'")?;
                Ok(inner)
            }
            TokenKind::Ident(name) => {
                self.advance();
                Ok(Expression::Ident { name, active_global: self.active_global.clone() })
            }
            TokenKind::Dot => {
                self.advance();
                let name = self.expect_ident("expected an identifier after '.'")?;
                Ok(Expression::Ident { name: format!(".{name}"), active_global: self.active_global.clone() })
            }
            TokenKind::NumLit(v) => {
                self.advance();
                Ok(Expression::IntLiteral { value: v, text: v.to_string() })
            }
            TokenKind::CharLit(b) => {
                self.advance();
                Ok(Expression::CharLiteral { value: b, text: (b as char).to_string() })
            }
            TokenKind::StringLit(s) => {
                self.advance();
                Ok(Expression::BytesLiteral { bytes: s.clone().into_bytes(), text: s })
            }
            _ => {
                self.advance();
                Err(AsmError::new(ErrorKind::ExpectedOperand, "expected an expression", span))
            }
        }
    }

    fn expect_ident(&mut self, message: &str) -> Result<String, AsmError> {
        match self.peek().kind.clone() {
            TokenKind::Ident(name) => {
                self.advance();
                Ok(name)
            }
            _ => {
                let span = self.peek().span;
                Err(AsmError::new(ErrorKind::ExpectedIdent, message, span))
            }
        }
    }

    fn expect(&mut self, kind: TokenKind, err: ErrorKind, message: &str) -> Result<(), AsmError> {
        if self.peek().kind == kind {
            self.advance();
            Ok(())
        } else {
            let span = self.peek().span;
            Err(AsmError::new(err, message, span))
        }
    }
}
