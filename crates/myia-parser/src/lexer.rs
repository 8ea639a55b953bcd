//! Indentation-sensitive tokenizer for the surface language.
//!
//! Supplemental front end: the distilled spec assumes an AST already
//! exists. Blocks are Python-style: introduced by `:` then a newline and one
//! more indent level, closed by the first line that dedents back out.

use crate::error::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    Def,
    Return,
    If,
    Elif,
    Else,
    While,
    True_,
    False_,
    None_,
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),

    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    SlashSlash,
    Percent,
    At,
    LShift,
    RShift,
    Amp,
    Pipe,
    Caret,
    Tilde,

    EqEq,
    NotEq,
    Lt,
    Gt,
    LtE,
    GtE,
    Is,
    IsNot,
    In,
    Not,

    Assign,
    Comma,
    Colon,
    Dot,
    LParen,
    RParen,
    LBracket,
    RBracket,

    Newline,
    Indent,
    Dedent,
    EndMarker,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub tok: Tok,
    pub line: u32,
    pub column: u32,
}

struct Lexer<'a> {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    col: u32,
    src: &'a str,
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_cont(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Lexer {
            chars: src.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
            src,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn err(&self, what: impl Into<String>) -> ParseError {
        ParseError::NotSupported {
            line: self.line,
            what: what.into(),
        }
    }
}

/// Tokenize `src` into a flat stream including synthetic `Indent`/`Dedent`/
/// `Newline` markers, ending in `EndMarker`.
pub fn tokenize(src: &str) -> Result<Vec<Token>, ParseError> {
    let mut out = Vec::new();
    let mut indents: Vec<usize> = vec![0];
    let mut at_line_start = true;
    let mut paren_depth: i32 = 0;

    let mut lx = Lexer::new(src);

    loop {
        if at_line_start && paren_depth == 0 {
            // Measure indentation of this logical line; skip blank/comment-only lines.
            let line_start_line = lx.line;
            let mut indent = 0usize;
            loop {
                match lx.peek() {
                    Some(' ') => {
                        indent += 1;
                        lx.bump();
                    }
                    Some('\t') => {
                        indent += 8;
                        lx.bump();
                    }
                    _ => break,
                }
            }
            match lx.peek() {
                None => {
                    while indents.len() > 1 {
                        indents.pop();
                        out.push(Token {
                            tok: Tok::Dedent,
                            line: lx.line,
                            column: 1,
                        });
                    }
                    out.push(Token {
                        tok: Tok::EndMarker,
                        line: lx.line,
                        column: 1,
                    });
                    return Ok(out);
                }
                Some('\n') => {
                    lx.bump();
                    continue;
                }
                Some('#') => {
                    while let Some(c) = lx.peek() {
                        if c == '\n' {
                            break;
                        }
                        lx.bump();
                    }
                    continue;
                }
                _ => {}
            }
            let current = *indents.last().unwrap();
            if indent > current {
                indents.push(indent);
                out.push(Token {
                    tok: Tok::Indent,
                    line: line_start_line,
                    column: 1,
                });
            } else {
                while indent < *indents.last().unwrap() {
                    indents.pop();
                    out.push(Token {
                        tok: Tok::Dedent,
                        line: line_start_line,
                        column: 1,
                    });
                }
                if indent != *indents.last().unwrap() {
                    return Err(lx.err("inconsistent indentation"));
                }
            }
            at_line_start = false;
        }

        let Some(c) = lx.peek() else {
            while indents.len() > 1 {
                indents.pop();
                out.push(Token {
                    tok: Tok::Dedent,
                    line: lx.line,
                    column: 1,
                });
            }
            out.push(Token {
                tok: Tok::EndMarker,
                line: lx.line,
                column: 1,
            });
            return Ok(out);
        };

        let (line, col) = (lx.line, lx.col);

        if c == '\n' {
            lx.bump();
            if paren_depth == 0 {
                out.push(Token {
                    tok: Tok::Newline,
                    line,
                    column: col,
                });
                at_line_start = true;
            }
            continue;
        }
        if c == ' ' || c == '\t' {
            lx.bump();
            continue;
        }
        if c == '#' {
            while let Some(c) = lx.peek() {
                if c == '\n' {
                    break;
                }
                lx.bump();
            }
            continue;
        }
        if is_ident_start(c) {
            let mut s = String::new();
            while let Some(c) = lx.peek() {
                if is_ident_cont(c) {
                    s.push(c);
                    lx.bump();
                } else {
                    break;
                }
            }
            let tok = match s.as_str() {
                "def" => Tok::Def,
                "return" => Tok::Return,
                "if" => Tok::If,
                "elif" => Tok::Elif,
                "else" => Tok::Else,
                "while" => Tok::While,
                "True" => Tok::True_,
                "False" => Tok::False_,
                "None" => Tok::None_,
                "is" => {
                    if lx.peek() == Some(' ') {
                        let save = lx.pos;
                        let save_line = lx.line;
                        let save_col = lx.col;
                        lx.bump();
                        while lx.peek() == Some(' ') {
                            lx.bump();
                        }
                        if lx.peek() == Some('n') && lx.peek_at(1) == Some('o') && lx.peek_at(2) == Some('t') {
                            let next_after = lx.peek_at(3);
                            if next_after.map(|c| !is_ident_cont(c)).unwrap_or(true) {
                                lx.bump();
                                lx.bump();
                                lx.bump();
                                Tok::IsNot
                            } else {
                                lx.pos = save;
                                lx.line = save_line;
                                lx.col = save_col;
                                Tok::Is
                            }
                        } else {
                            lx.pos = save;
                            lx.line = save_line;
                            lx.col = save_col;
                            Tok::Is
                        }
                    } else {
                        Tok::Is
                    }
                }
                "in" => Tok::In,
                "not" => Tok::Not,
                _ => Tok::Ident(s),
            };
            out.push(Token { tok, line, column: col });
            continue;
        }
        if c.is_ascii_digit() {
            let mut s = String::new();
            let mut is_float = false;
            while let Some(c) = lx.peek() {
                if c.is_ascii_digit() {
                    s.push(c);
                    lx.bump();
                } else if c == '.' && !is_float {
                    is_float = true;
                    s.push(c);
                    lx.bump();
                } else {
                    break;
                }
            }
            let tok = if is_float {
                Tok::Float(s.parse().map_err(|_| lx.err("bad float literal"))?)
            } else {
                Tok::Int(s.parse().map_err(|_| lx.err("bad int literal"))?)
            };
            out.push(Token { tok, line, column: col });
            continue;
        }
        if c == '"' || c == '\'' {
            let quote = c;
            lx.bump();
            let mut s = String::new();
            loop {
                match lx.bump() {
                    Some(c) if c == quote => break,
                    Some(c) => s.push(c),
                    None => return Err(lx.err("unterminated string literal")),
                }
            }
            out.push(Token {
                tok: Tok::Str(s),
                line,
                column: col,
            });
            continue;
        }

        macro_rules! two {
            ($first:expr, $second:expr, $two_tok:expr, $one_tok:expr) => {{
                lx.bump();
                if lx.peek() == Some($second) {
                    lx.bump();
                    $two_tok
                } else {
                    $one_tok
                }
            }};
        }

        let tok = match c {
            '(' => {
                lx.bump();
                paren_depth += 1;
                Tok::LParen
            }
            ')' => {
                lx.bump();
                paren_depth -= 1;
                Tok::RParen
            }
            '[' => {
                lx.bump();
                paren_depth += 1;
                Tok::LBracket
            }
            ']' => {
                lx.bump();
                paren_depth -= 1;
                Tok::RBracket
            }
            ',' => {
                lx.bump();
                Tok::Comma
            }
            ':' => {
                lx.bump();
                Tok::Colon
            }
            '.' => {
                lx.bump();
                Tok::Dot
            }
            '~' => {
                lx.bump();
                Tok::Tilde
            }
            '+' => {
                lx.bump();
                Tok::Plus
            }
            '-' => {
                lx.bump();
                Tok::Minus
            }
            '%' => {
                lx.bump();
                Tok::Percent
            }
            '@' => {
                lx.bump();
                Tok::At
            }
            '^' => {
                lx.bump();
                Tok::Caret
            }
            '&' => {
                lx.bump();
                Tok::Amp
            }
            '|' => {
                lx.bump();
                Tok::Pipe
            }
            '*' => two!('*', '*', Tok::StarStar, Tok::Star),
            '/' => two!('/', '/', Tok::SlashSlash, Tok::Slash),
            '=' => two!('=', '=', Tok::EqEq, Tok::Assign),
            '!' => {
                lx.bump();
                if lx.peek() == Some('=') {
                    lx.bump();
                    Tok::NotEq
                } else {
                    return Err(lx.err("'!' not supported outside '!='"));
                }
            }
            '<' => {
                lx.bump();
                match lx.peek() {
                    Some('=') => {
                        lx.bump();
                        Tok::LtE
                    }
                    Some('<') => {
                        lx.bump();
                        Tok::LShift
                    }
                    _ => Tok::Lt,
                }
            }
            '>' => {
                lx.bump();
                match lx.peek() {
                    Some('=') => {
                        lx.bump();
                        Tok::GtE
                    }
                    Some('>') => {
                        lx.bump();
                        Tok::RShift
                    }
                    _ => Tok::Gt,
                }
            }
            other => return Err(lx.err(format!("unexpected character '{other}'"))),
        };
        out.push(Token { tok, line, column: col });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_straight_line_function() {
        let src = "def f(x, y):\n    return x + y\n";
        let toks = tokenize(src).unwrap();
        let kinds: Vec<&Tok> = toks.iter().map(|t| &t.tok).collect();
        assert_eq!(
            kinds,
            vec![
                &Tok::Def,
                &Tok::Ident("f".into()),
                &Tok::LParen,
                &Tok::Ident("x".into()),
                &Tok::Comma,
                &Tok::Ident("y".into()),
                &Tok::RParen,
                &Tok::Colon,
                &Tok::Newline,
                &Tok::Indent,
                &Tok::Return,
                &Tok::Ident("x".into()),
                &Tok::Plus,
                &Tok::Ident("y".into()),
                &Tok::Newline,
                &Tok::Dedent,
                &Tok::EndMarker,
            ]
        );
    }

    #[test]
    fn tokenizes_is_not() {
        let toks = tokenize("x is not None\n").unwrap();
        assert!(toks.iter().any(|t| t.tok == Tok::IsNot));
    }

    #[test]
    fn tracks_nested_dedent() {
        let src = "def f(x):\n    if x:\n        return 1\n    return 2\n";
        let toks = tokenize(src).unwrap();
        let dedents = toks.iter().filter(|t| t.tok == Tok::Dedent).count();
        assert_eq!(dedents, 2);
    }

    #[test]
    fn rejects_unexpected_character() {
        let err = tokenize("def f():\n    return $\n").unwrap_err();
        assert!(matches!(err, ParseError::NotSupported { .. }));
    }
}
