//! Recursive-descent parser from the token stream to the surface AST.

use crate::ast::*;
use crate::error::ParseError;
use crate::lexer::{Tok, Token};

pub struct Grammar {
    toks: Vec<Token>,
    pos: usize,
}

fn err_at(line: u32, what: impl Into<String>) -> ParseError {
    ParseError::NotSupported {
        line,
        what: what.into(),
    }
}

impl Grammar {
    pub fn new(toks: Vec<Token>) -> Self {
        Grammar { toks, pos: 0 }
    }

    fn cur(&self) -> &Token {
        &self.toks[self.pos]
    }

    fn cur_line(&self) -> u32 {
        self.cur().line
    }

    fn advance(&mut self) -> Token {
        let t = self.toks[self.pos].clone();
        if self.pos + 1 < self.toks.len() {
            self.pos += 1;
        }
        t
    }

    fn check(&self, tok: &Tok) -> bool {
        &self.cur().tok == tok
    }

    fn eat(&mut self, tok: &Tok) -> Result<Token, ParseError> {
        if self.check(tok) {
            Ok(self.advance())
        } else {
            Err(err_at(
                self.cur_line(),
                format!("expected {:?}, found {:?}", tok, self.cur().tok),
            ))
        }
    }

    fn eat_ident(&mut self) -> Result<String, ParseError> {
        match &self.cur().tok {
            Tok::Ident(s) => {
                let s = s.clone();
                self.advance();
                Ok(s)
            }
            other => Err(err_at(self.cur_line(), format!("expected identifier, found {:?}", other))),
        }
    }

    pub fn parse_module(&mut self) -> Result<Module, ParseError> {
        let mut functions = Vec::new();
        self.skip_newlines();
        while !self.check(&Tok::EndMarker) {
            functions.push(self.parse_funcdef()?);
            self.skip_newlines();
        }
        Ok(Module { functions })
    }

    fn skip_newlines(&mut self) {
        while self.check(&Tok::Newline) {
            self.advance();
        }
    }

    fn parse_funcdef(&mut self) -> Result<FunctionDef, ParseError> {
        let line = self.cur_line();
        self.eat(&Tok::Def)?;
        let name = self.eat_ident()?;
        self.eat(&Tok::LParen)?;
        let mut params = Vec::new();
        if !self.check(&Tok::RParen) {
            params.push(self.eat_ident()?);
            while self.check(&Tok::Comma) {
                self.advance();
                if self.check(&Tok::RParen) {
                    break;
                }
                params.push(self.eat_ident()?);
            }
        }
        self.eat(&Tok::RParen)?;
        self.eat(&Tok::Colon)?;
        let body = self.parse_block()?;
        Ok(FunctionDef { name, params, body, line })
    }

    fn parse_block(&mut self) -> Result<Vec<Spanned<Stmt>>, ParseError> {
        self.eat(&Tok::Newline)?;
        self.eat(&Tok::Indent)?;
        let mut stmts = Vec::new();
        loop {
            while self.check(&Tok::Newline) {
                self.advance();
            }
            if self.check(&Tok::Dedent) || self.check(&Tok::EndMarker) {
                break;
            }
            stmts.push(self.parse_stmt()?);
        }
        if self.check(&Tok::Dedent) {
            self.advance();
        }
        Ok(stmts)
    }

    fn parse_stmt(&mut self) -> Result<Spanned<Stmt>, ParseError> {
        let line = self.cur_line();
        match &self.cur().tok {
            Tok::Def => {
                let f = self.parse_funcdef()?;
                Ok(Spanned::new(Stmt::FunctionDef(f), line, 1))
            }
            Tok::Return => {
                self.advance();
                let value = self.parse_testlist()?;
                self.eat_stmt_end()?;
                Ok(Spanned::new(Stmt::Return(value), line, 1))
            }
            Tok::If => self.parse_if(),
            Tok::While => {
                self.advance();
                let test = self.parse_test()?;
                self.eat(&Tok::Colon)?;
                let body = self.parse_block()?;
                Ok(Spanned::new(Stmt::While { test, body }, line, 1))
            }
            _ => self.parse_assign_or_expr_stmt(),
        }
    }

    fn eat_stmt_end(&mut self) -> Result<(), ParseError> {
        if self.check(&Tok::Newline) {
            self.advance();
        } else if !self.check(&Tok::EndMarker) && !self.check(&Tok::Dedent) {
            return Err(err_at(self.cur_line(), "expected end of statement"));
        }
        Ok(())
    }

    fn parse_if(&mut self) -> Result<Spanned<Stmt>, ParseError> {
        let line = self.cur_line();
        self.eat(&Tok::If)?;
        let test = self.parse_test()?;
        self.eat(&Tok::Colon)?;
        let body = self.parse_block()?;
        let orelse = if self.check(&Tok::Elif) {
            // Desugar `elif` into a nested `if` inside the `else` branch.
            vec![self.parse_if_as_elif()?]
        } else if self.check(&Tok::Else) {
            self.advance();
            self.eat(&Tok::Colon)?;
            self.parse_block()?
        } else {
            Vec::new()
        };
        Ok(Spanned::new(Stmt::If { test, body, orelse }, line, 1))
    }

    fn parse_if_as_elif(&mut self) -> Result<Spanned<Stmt>, ParseError> {
        let line = self.cur_line();
        self.eat(&Tok::Elif)?;
        let test = self.parse_test()?;
        self.eat(&Tok::Colon)?;
        let body = self.parse_block()?;
        let orelse = if self.check(&Tok::Elif) {
            vec![self.parse_if_as_elif()?]
        } else if self.check(&Tok::Else) {
            self.advance();
            self.eat(&Tok::Colon)?;
            self.parse_block()?
        } else {
            Vec::new()
        };
        Ok(Spanned::new(Stmt::If { test, body, orelse }, line, 1))
    }

    fn parse_assign_or_expr_stmt(&mut self) -> Result<Spanned<Stmt>, ParseError> {
        let line = self.cur_line();
        let first = self.parse_testlist()?;
        if self.check(&Tok::Assign) {
            let mut targets = vec![self.expr_to_target(first)?];
            self.advance();
            let mut value = self.parse_testlist()?;
            while self.check(&Tok::Assign) {
                targets.push(self.expr_to_target(value)?);
                self.advance();
                value = self.parse_testlist()?;
            }
            self.eat_stmt_end()?;
            Ok(Spanned::new(Stmt::Assign { targets, value }, line, 1))
        } else {
            self.eat_stmt_end()?;
            Ok(Spanned::new(Stmt::Expr(first), line, 1))
        }
    }

    fn expr_to_target(&self, e: Spanned<Expr>) -> Result<Spanned<AssignTarget>, ParseError> {
        match e.node {
            Expr::Name(n) => Ok(Spanned::new(AssignTarget::Name(n), e.line, e.column)),
            Expr::Tuple(elts) => {
                let mut targets = Vec::new();
                for el in elts {
                    targets.push(self.expr_to_target(el)?);
                }
                Ok(Spanned::new(AssignTarget::Tuple(targets), e.line, e.column))
            }
            _ => Err(err_at(e.line, "unsupported assignment target")),
        }
    }

    // -- Expressions ----------------------------------------------------

    fn parse_testlist(&mut self) -> Result<Spanned<Expr>, ParseError> {
        let line = self.cur_line();
        let first = self.parse_test()?;
        if self.check(&Tok::Comma) {
            let mut elts = vec![first];
            while self.check(&Tok::Comma) {
                self.advance();
                if self.at_expr_boundary() {
                    break;
                }
                elts.push(self.parse_test()?);
            }
            Ok(Spanned::new(Expr::Tuple(elts), line, 1))
        } else {
            Ok(first)
        }
    }

    fn at_expr_boundary(&self) -> bool {
        matches!(
            self.cur().tok,
            Tok::Newline | Tok::EndMarker | Tok::RParen | Tok::RBracket | Tok::Colon | Tok::Assign
        )
    }

    fn parse_test(&mut self) -> Result<Spanned<Expr>, ParseError> {
        self.parse_compare()
    }

    fn parse_compare(&mut self) -> Result<Spanned<Expr>, ParseError> {
        let left = self.parse_bitor()?;
        let op = match &self.cur().tok {
            Tok::EqEq => CmpOp::Eq,
            Tok::NotEq => CmpOp::Ne,
            Tok::Lt => CmpOp::Lt,
            Tok::Gt => CmpOp::Gt,
            Tok::LtE => CmpOp::Le,
            Tok::GtE => CmpOp::Ge,
            Tok::Is => CmpOp::Is,
            Tok::IsNot => CmpOp::IsNot,
            Tok::In => CmpOp::In,
            _ => return Ok(left),
        };
        let line = self.cur_line();
        self.advance();
        let right = self.parse_bitor()?;
        if matches!(
            self.cur().tok,
            Tok::EqEq | Tok::NotEq | Tok::Lt | Tok::Gt | Tok::LtE | Tok::GtE | Tok::Is | Tok::IsNot | Tok::In
        ) {
            return Err(ParseError::MultipleComparators { line });
        }
        Ok(Spanned::new(
            Expr::Compare {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            line,
            1,
        ))
    }

    fn parse_bitor(&mut self) -> Result<Spanned<Expr>, ParseError> {
        let mut left = self.parse_bitxor()?;
        while self.check(&Tok::Pipe) {
            let line = self.cur_line();
            self.advance();
            let right = self.parse_bitxor()?;
            left = Spanned::new(
                Expr::BinOp {
                    op: BinOp::BitOr,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                line,
                1,
            );
        }
        Ok(left)
    }

    fn parse_bitxor(&mut self) -> Result<Spanned<Expr>, ParseError> {
        let mut left = self.parse_bitand()?;
        while self.check(&Tok::Caret) {
            let line = self.cur_line();
            self.advance();
            let right = self.parse_bitand()?;
            left = Spanned::new(
                Expr::BinOp {
                    op: BinOp::BitXor,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                line,
                1,
            );
        }
        Ok(left)
    }

    fn parse_bitand(&mut self) -> Result<Spanned<Expr>, ParseError> {
        let mut left = self.parse_shift()?;
        while self.check(&Tok::Amp) {
            let line = self.cur_line();
            self.advance();
            let right = self.parse_shift()?;
            left = Spanned::new(
                Expr::BinOp {
                    op: BinOp::BitAnd,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                line,
                1,
            );
        }
        Ok(left)
    }

    fn parse_shift(&mut self) -> Result<Spanned<Expr>, ParseError> {
        let mut left = self.parse_add()?;
        loop {
            let op = match self.cur().tok {
                Tok::LShift => BinOp::LShift,
                Tok::RShift => BinOp::RShift,
                _ => break,
            };
            let line = self.cur_line();
            self.advance();
            let right = self.parse_add()?;
            left = Spanned::new(
                Expr::BinOp {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                line,
                1,
            );
        }
        Ok(left)
    }

    fn parse_add(&mut self) -> Result<Spanned<Expr>, ParseError> {
        let mut left = self.parse_mul()?;
        loop {
            let op = match self.cur().tok {
                Tok::Plus => BinOp::Add,
                Tok::Minus => BinOp::Sub,
                _ => break,
            };
            let line = self.cur_line();
            self.advance();
            let right = self.parse_mul()?;
            left = Spanned::new(
                Expr::BinOp {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                line,
                1,
            );
        }
        Ok(left)
    }

    fn parse_mul(&mut self) -> Result<Spanned<Expr>, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.cur().tok {
                Tok::Star => BinOp::Mul,
                Tok::Slash => BinOp::TrueDiv,
                Tok::SlashSlash => BinOp::FloorDiv,
                Tok::Percent => BinOp::Mod,
                Tok::At => BinOp::MatMul,
                _ => break,
            };
            let line = self.cur_line();
            self.advance();
            let right = self.parse_unary()?;
            left = Spanned::new(
                Expr::BinOp {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                line,
                1,
            );
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Spanned<Expr>, ParseError> {
        let line = self.cur_line();
        let op = match self.cur().tok {
            Tok::Plus => Some(UnaryOp::Pos),
            Tok::Minus => Some(UnaryOp::Neg),
            Tok::Tilde => Some(UnaryOp::Invert),
            Tok::Not => Some(UnaryOp::Not),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(Spanned::new(
                Expr::UnaryOp {
                    op,
                    operand: Box::new(operand),
                },
                line,
                1,
            ));
        }
        self.parse_power()
    }

    fn parse_power(&mut self) -> Result<Spanned<Expr>, ParseError> {
        let base = self.parse_postfix()?;
        if self.check(&Tok::StarStar) {
            let line = self.cur_line();
            self.advance();
            let exp = self.parse_unary()?;
            return Ok(Spanned::new(
                Expr::BinOp {
                    op: BinOp::Pow,
                    left: Box::new(base),
                    right: Box::new(exp),
                },
                line,
                1,
            ));
        }
        Ok(base)
    }

    fn parse_postfix(&mut self) -> Result<Spanned<Expr>, ParseError> {
        let mut e = self.parse_atom()?;
        loop {
            match self.cur().tok {
                Tok::LParen => {
                    let line = self.cur_line();
                    self.advance();
                    let mut args = Vec::new();
                    if !self.check(&Tok::RParen) {
                        args.push(self.parse_test()?);
                        while self.check(&Tok::Comma) {
                            self.advance();
                            if self.check(&Tok::RParen) {
                                break;
                            }
                            args.push(self.parse_test()?);
                        }
                    }
                    self.eat(&Tok::RParen)?;
                    e = Spanned::new(
                        Expr::Call {
                            func: Box::new(e),
                            args,
                        },
                        line,
                        1,
                    );
                }
                Tok::LBracket => {
                    let line = self.cur_line();
                    self.advance();
                    let index = self.parse_test()?;
                    self.eat(&Tok::RBracket)?;
                    e = Spanned::new(
                        Expr::Subscript {
                            value: Box::new(e),
                            index: Box::new(index),
                        },
                        line,
                        1,
                    );
                }
                Tok::Dot => {
                    let line = self.cur_line();
                    self.advance();
                    let attr = self.eat_ident()?;
                    e = Spanned::new(
                        Expr::Attribute {
                            value: Box::new(e),
                            attr,
                        },
                        line,
                        1,
                    );
                }
                _ => break,
            }
        }
        Ok(e)
    }

    fn parse_atom(&mut self) -> Result<Spanned<Expr>, ParseError> {
        let line = self.cur_line();
        match self.cur().tok.clone() {
            Tok::Ident(name) => {
                self.advance();
                Ok(Spanned::new(Expr::Name(name), line, 1))
            }
            Tok::Int(v) => {
                self.advance();
                Ok(Spanned::new(Expr::Literal(Literal::Int(v)), line, 1))
            }
            Tok::Float(v) => {
                self.advance();
                Ok(Spanned::new(Expr::Literal(Literal::Float(v)), line, 1))
            }
            Tok::Str(s) => {
                self.advance();
                Ok(Spanned::new(Expr::Literal(Literal::Str(s)), line, 1))
            }
            Tok::True_ => {
                self.advance();
                Ok(Spanned::new(Expr::Literal(Literal::Bool(true)), line, 1))
            }
            Tok::False_ => {
                self.advance();
                Ok(Spanned::new(Expr::Literal(Literal::Bool(false)), line, 1))
            }
            Tok::None_ => {
                self.advance();
                Ok(Spanned::new(Expr::Literal(Literal::None_), line, 1))
            }
            Tok::LParen => {
                self.advance();
                if self.check(&Tok::RParen) {
                    self.advance();
                    return Ok(Spanned::new(Expr::Tuple(Vec::new()), line, 1));
                }
                let first = self.parse_test()?;
                if self.check(&Tok::Comma) {
                    let mut elts = vec![first];
                    while self.check(&Tok::Comma) {
                        self.advance();
                        if self.check(&Tok::RParen) {
                            break;
                        }
                        elts.push(self.parse_test()?);
                    }
                    self.eat(&Tok::RParen)?;
                    Ok(Spanned::new(Expr::Tuple(elts), line, 1))
                } else {
                    self.eat(&Tok::RParen)?;
                    Ok(first)
                }
            }
            other => Err(err_at(line, format!("unsupported expression start {:?}", other))),
        }
    }
}

pub fn parse_module(src: &str) -> Result<Module, ParseError> {
    let toks = crate::lexer::tokenize(src)?;
    Grammar::new(toks).parse_module()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_straight_line_function() {
        let m = parse_module("def f(x, y):\n    return x + y\n").unwrap();
        assert_eq!(m.functions.len(), 1);
        assert_eq!(m.functions[0].params, vec!["x", "y"]);
        assert!(matches!(m.functions[0].body[0].node, Stmt::Return(_)));
    }

    #[test]
    fn parses_if_elif_else() {
        let src = "def f(x):\n    if x > 0:\n        return 1\n    elif x < 0:\n        return -1\n    else:\n        return 0\n";
        let m = parse_module(src).unwrap();
        match &m.functions[0].body[0].node {
            Stmt::If { orelse, .. } => {
                assert_eq!(orelse.len(), 1);
                assert!(matches!(orelse[0].node, Stmt::If { .. }));
            }
            other => panic!("expected if, got {:?}", other),
        }
    }

    #[test]
    fn parses_tuple_destructure() {
        let m = parse_module("def f(p):\n    a, b = p\n    return a - b\n").unwrap();
        match &m.functions[0].body[0].node {
            Stmt::Assign { targets, .. } => {
                assert_eq!(targets.len(), 1);
                assert!(matches!(targets[0].node, AssignTarget::Tuple(_)));
            }
            other => panic!("expected assign, got {:?}", other),
        }
    }

    #[test]
    fn rejects_chained_comparisons() {
        let err = parse_module("def f(x):\n    return 0 < x < 1\n").unwrap_err();
        assert!(matches!(err, ParseError::MultipleComparators { .. }));
    }

    #[test]
    fn parses_while_loop() {
        let src = "def f(n):\n    s = 0\n    i = 0\n    while i < n:\n        s = s + i\n        i = i + 1\n    return s\n";
        let m = parse_module(src).unwrap();
        assert!(matches!(m.functions[0].body[2].node, Stmt::While { .. }));
    }

    #[test]
    fn parses_nested_function() {
        let src = "def outer(x):\n    def inner(y):\n        return x + y\n    return inner\n";
        let m = parse_module(src).unwrap();
        assert!(matches!(m.functions[0].body[0].node, Stmt::FunctionDef(_)));
    }
}
