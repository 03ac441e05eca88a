//! Recursive-descent parser producing the template tree.

use std::fmt;

use super::funcs;
use super::lexer::{Token, TokenKind};

/// One node of a parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Node {
    Text(String),
    /// `{{pipeline}}`: prints the result unless it declares a variable.
    Action(Pipeline),
    If {
        pipe: Pipeline,
        then: Vec<Node>,
        otherwise: Vec<Node>,
    },
    Range {
        pipe: Pipeline,
        body: Vec<Node>,
        otherwise: Vec<Node>,
    },
    With {
        pipe: Pipeline,
        body: Vec<Node>,
        otherwise: Vec<Node>,
    },
    Break,
    Continue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Pipeline {
    pub(crate) line: usize,
    /// Source text of the pipeline, for error messages.
    pub(crate) text: String,
    /// Variables declared (`:=`) or assigned (`=`) by this pipeline.
    pub(crate) decl: Vec<String>,
    pub(crate) is_assign: bool,
    pub(crate) cmds: Vec<Command>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Command {
    pub(crate) args: Vec<Operand>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Operand {
    Dot,
    Field(Vec<String>),
    Variable(String, Vec<String>),
    Func(String),
    Str(String),
    Int(i64),
    Bool(bool),
    Nil,
    /// Parenthesised pipeline, optionally followed by `.Field` segments.
    Pipe(Box<Pipeline>, Vec<String>),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dot => f.write_str("."),
            Self::Field(chain) => write_chain(f, chain),
            Self::Variable(name, chain) => {
                f.write_str(name)?;
                write_chain(f, chain)
            },
            Self::Func(name) => f.write_str(name),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Nil => f.write_str("nil"),
            Self::Pipe(pipe, chain) => {
                write!(f, "({})", pipe.text)?;
                write_chain(f, chain)
            },
        }
    }
}

fn write_chain(f: &mut fmt::Formatter<'_>, chain: &[String]) -> fmt::Result {
    chain.iter().try_for_each(|name| write!(f, ".{name}"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ParseError {
    pub(crate) line: usize,
    pub(crate) message: String,
}

type ParseResult<T> = Result<T, ParseError>;

/// How a list of nodes ended.
enum Terminator {
    Eof(usize),
    End(usize),
    Else(usize),
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    If,
    Range,
    With,
}

impl BlockKind {
    fn keyword(self) -> &'static str {
        match self {
            Self::If => "if",
            Self::Range => "range",
            Self::With => "with",
        }
    }
}

/// Where a pipeline stops.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Closer {
    Delim,
    Paren,
}

/// Parse a token stream into a node list.
pub(crate) fn parse(src: &str, tokens: Vec<Token>) -> ParseResult<Vec<Node>> {
    let mut parser = Parser {
        src,
        tokens,
        pos: 0,
        vars: vec!["$".to_string()],
        range_depth: 0,
    };
    let (nodes, terminator) = parser.parse_list()?;
    match terminator {
        Terminator::Eof(_) => Ok(nodes),
        Terminator::End(line) => Err(ParseError {
            line,
            message: "unexpected {{end}}".to_string(),
        }),
        Terminator::Else(line) => Err(ParseError {
            line,
            message: "unexpected {{else}}".to_string(),
        }),
    }
}

struct Parser<'a> {
    src: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    /// Variables in scope, innermost last.
    vars: Vec<String>,
    range_depth: usize,
}

impl Parser<'_> {
    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    fn peek_at(&self, ahead: usize) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.pos.saturating_add(ahead).min(last)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.pos = self.pos.saturating_add(1);
        }
        token
    }

    fn error<T>(line: usize, message: impl Into<String>) -> ParseResult<T> {
        Err(ParseError {
            line,
            message: message.into(),
        })
    }

    fn keyword_ahead(&self) -> Option<&str> {
        match &self.peek().kind {
            TokenKind::Ident(word) => Some(word.as_str()),
            _ => None,
        }
    }

    fn expect_right_delim(&mut self, context: &str) -> ParseResult<()> {
        let token = self.advance();
        if token.kind == TokenKind::RightDelim {
            Ok(())
        } else {
            Self::error(token.line, format!("unexpected {} in {context}", describe(&token.kind)))
        }
    }

    fn parse_list(&mut self) -> ParseResult<(Vec<Node>, Terminator)> {
        let mut nodes = Vec::new();
        loop {
            let token = self.advance();
            match token.kind {
                TokenKind::Text(text) => nodes.push(Node::Text(text)),
                TokenKind::Eof => return Ok((nodes, Terminator::Eof(token.line))),
                TokenKind::LeftDelim => {
                    let keyword = self.keyword_ahead().map(ToOwned::to_owned);
                    match keyword.as_deref() {
                        Some("end") => {
                            self.advance();
                            self.expect_right_delim("end")?;
                            return Ok((nodes, Terminator::End(token.line)));
                        },
                        Some("else") => {
                            self.advance();
                            return Ok((nodes, Terminator::Else(token.line)));
                        },
                        Some("if") => {
                            self.advance();
                            nodes.push(self.parse_block(BlockKind::If)?);
                        },
                        Some("range") => {
                            self.advance();
                            nodes.push(self.parse_block(BlockKind::Range)?);
                        },
                        Some("with") => {
                            self.advance();
                            nodes.push(self.parse_block(BlockKind::With)?);
                        },
                        Some(word @ ("break" | "continue")) => {
                            let node = if word == "break" {
                                Node::Break
                            } else {
                                Node::Continue
                            };
                            if self.range_depth == 0 {
                                return Self::error(
                                    token.line,
                                    format!("{{{{{word}}}}} outside {{{{range}}}}"),
                                );
                            }
                            self.advance();
                            self.expect_right_delim(word)?;
                            nodes.push(node);
                        },
                        _ => {
                            let pipe = self.parse_pipeline("command", false, Closer::Delim)?;
                            nodes.push(Node::Action(pipe));
                        },
                    }
                },
                other => {
                    return Self::error(token.line, format!("unexpected {}", describe(&other)));
                },
            }
        }
    }

    /// Parse `if`/`range`/`with` after its keyword, through the matching
    /// `{{end}}`. `else if` and `else with` chains share that single `end`.
    fn parse_block(&mut self, kind: BlockKind) -> ParseResult<Node> {
        let scope = self.vars.len();
        let keyword = kind.keyword();
        let pipe = self.parse_pipeline(keyword, kind == BlockKind::Range, Closer::Delim)?;

        if kind == BlockKind::Range {
            self.range_depth = self.range_depth.saturating_add(1);
        }
        let listed = self.parse_list();
        if kind == BlockKind::Range {
            self.range_depth = self.range_depth.saturating_sub(1);
        }
        let (body, terminator) = listed?;

        let otherwise = match terminator {
            Terminator::End(_) => Vec::new(),
            Terminator::Eof(eof_line) => {
                return Self::error(eof_line, format!("unexpected EOF in {{{{{keyword}}}}}"));
            },
            Terminator::Else(_) => {
                let chained = self.keyword_ahead().map(ToOwned::to_owned);
                match chained.as_deref() {
                    Some(next @ ("if" | "with")) if next == keyword => {
                        self.advance();
                        vec![self.parse_block(kind)?]
                    },
                    _ => {
                        self.expect_right_delim("else")?;
                        let (alt, alt_end) = self.parse_list()?;
                        match alt_end {
                            Terminator::End(_) => alt,
                            Terminator::Else(l) => {
                                return Self::error(l, "expected end; found {{else}}");
                            },
                            Terminator::Eof(l) => {
                                let message = format!("unexpected EOF in {{{{{keyword}}}}}");
                                return Self::error(l, message);
                            },
                        }
                    },
                }
            },
        };
        self.vars.truncate(scope);

        Ok(match kind {
            BlockKind::If => Node::If {
                pipe,
                then: body,
                otherwise,
            },
            BlockKind::Range => Node::Range {
                pipe,
                body,
                otherwise,
            },
            BlockKind::With => Node::With {
                pipe,
                body,
                otherwise,
            },
        })
    }

    fn parse_pipeline(
        &mut self,
        context: &str,
        range_decl: bool,
        closer: Closer,
    ) -> ParseResult<Pipeline> {
        let first = self.peek().clone();
        let (decl, is_assign) = self.parse_declaration(range_decl)?;

        let mut cmds = Vec::new();
        let end = loop {
            cmds.push(self.parse_command(context)?);
            let token = self.advance();
            match (&token.kind, closer) {
                (TokenKind::Pipe, _) => {},
                (TokenKind::RightDelim, Closer::Delim) | (TokenKind::RightParen, Closer::Paren) => {
                    break token;
                },
                (other, _) => {
                    return Self::error(
                        token.line,
                        format!("unexpected {} in {context}", describe(other)),
                    );
                },
            }
        };

        if !is_assign {
            self.vars.extend(decl.iter().cloned());
        }

        let text = self
            .src
            .get(first.offset..end.offset)
            .unwrap_or_default()
            .trim()
            .to_string();

        Ok(Pipeline {
            line: first.line,
            text,
            decl,
            is_assign,
            cmds,
        })
    }

    /// Recognise `$x :=`, `$x =` and (for `range`) `$i, $e :=`.
    fn parse_declaration(&mut self, range_decl: bool) -> ParseResult<(Vec<String>, bool)> {
        let TokenKind::Variable(name, chain) = &self.peek().kind else {
            return Ok((Vec::new(), false));
        };
        if !chain.is_empty() {
            return Ok((Vec::new(), false));
        }
        let name = name.clone();
        let line = self.peek().line;

        match &self.peek_at(1).kind {
            TokenKind::Declare => {
                self.advance();
                self.advance();
                Ok((vec![name], false))
            },
            TokenKind::Assign => {
                if !self.vars.contains(&name) {
                    return Self::error(line, format!("undefined variable {name:?}"));
                }
                self.advance();
                self.advance();
                Ok((vec![name], true))
            },
            TokenKind::Comma if range_decl => {
                let TokenKind::Variable(second, second_chain) = &self.peek_at(2).kind else {
                    return Self::error(line, "expected variable after comma in range");
                };
                if !second_chain.is_empty() || self.peek_at(3).kind != TokenKind::Declare {
                    return Self::error(line, "range can only initialize variables");
                }
                let second = second.clone();
                for _ in 0..4 {
                    self.advance();
                }
                Ok((vec![name, second], false))
            },
            _ => Ok((Vec::new(), false)),
        }
    }

    fn parse_command(&mut self, context: &str) -> ParseResult<Command> {
        let mut args = Vec::new();
        loop {
            match &self.peek().kind {
                TokenKind::Pipe | TokenKind::RightDelim | TokenKind::RightParen => break,
                _ => args.push(self.parse_operand()?),
            }
        }
        if args.is_empty() {
            return Self::error(self.peek().line, format!("missing value for {context}"));
        }
        Ok(Command { args })
    }

    fn parse_operand(&mut self) -> ParseResult<Operand> {
        let token = self.advance();
        let operand = match token.kind {
            TokenKind::Dot => Operand::Dot,
            TokenKind::Field(chain) => Operand::Field(chain),
            TokenKind::Variable(name, chain) => {
                if !self.vars.contains(&name) {
                    return Self::error(token.line, format!("undefined variable {name:?}"));
                }
                Operand::Variable(name, chain)
            },
            TokenKind::Str(s) => Operand::Str(s),
            TokenKind::Int(n) => Operand::Int(n),
            TokenKind::Ident(word) => match word.as_str() {
                "true" => Operand::Bool(true),
                "false" => Operand::Bool(false),
                "nil" => Operand::Nil,
                "if" | "else" | "end" | "range" | "with" | "break" | "continue" => {
                    return Self::error(token.line, format!("unexpected keyword {word:?}"));
                },
                name if funcs::is_builtin(name) => Operand::Func(name.to_string()),
                _ => {
                    return Self::error(token.line, format!("function {word:?} not defined"));
                },
            },
            TokenKind::LeftParen => {
                let inner = self.parse_pipeline("parenthesized pipeline", false, Closer::Paren)?;
                let mut chain = Vec::new();
                while let TokenKind::Field(more) = &self.peek().kind {
                    if self.peek().spaced {
                        break;
                    }
                    chain.extend(more.iter().cloned());
                    self.advance();
                }
                Operand::Pipe(Box::new(inner), chain)
            },
            other => {
                let message = format!("unexpected {} in operand", describe(&other));
                return Self::error(token.line, message);
            },
        };
        Ok(operand)
    }
}

fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Text(_) => "text".to_string(),
        TokenKind::LeftDelim => "\"{{\"".to_string(),
        TokenKind::RightDelim => "\"}}\"".to_string(),
        TokenKind::Dot => "\".\"".to_string(),
        TokenKind::Field(chain) => format!("<.{}>", chain.join(".")),
        TokenKind::Variable(name, _) => format!("<{name}>"),
        TokenKind::Ident(word) => format!("<{word}>"),
        TokenKind::Str(s) => format!("{s:?}"),
        TokenKind::Int(n) => format!("<{n}>"),
        TokenKind::Pipe => "\"|\"".to_string(),
        TokenKind::LeftParen => "\"(\"".to_string(),
        TokenKind::RightParen => "\")\"".to_string(),
        TokenKind::Declare => "\":=\"".to_string(),
        TokenKind::Assign => "\"=\"".to_string(),
        TokenKind::Comma => "\",\"".to_string(),
        TokenKind::Eof => "EOF".to_string(),
    }
}
