//! Tokenizer for template source.
//!
//! Text outside `{{ }}` becomes a single [`TokenKind::Text`]; comments are
//! dropped here, and trim markers (`{{- ` / ` -}}`) are applied to the
//! neighbouring text before the parser ever sees it.

// Byte offsets only move forward within `src`, so they never overflow.
#![allow(clippy::arithmetic_side_effects)]

const LEFT_DELIM: &str = "{{";
const RIGHT_DELIM: &str = "}}";
const LEFT_TRIM: &str = "{{- ";
const RIGHT_TRIM: &str = "-}}";
const COMMENT_OPEN: &str = "/*";
const COMMENT_CLOSE: &str = "*/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TokenKind {
    Text(String),
    LeftDelim,
    RightDelim,
    Dot,
    /// `.A.B.C`
    Field(Vec<String>),
    /// `$name.A.B`; the name keeps its `$`.
    Variable(String, Vec<String>),
    Ident(String),
    Str(String),
    Int(i64),
    Pipe,
    LeftParen,
    RightParen,
    Declare,
    Assign,
    Comma,
    Eof,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Token {
    pub(crate) kind: TokenKind,
    pub(crate) line: usize,
    /// Byte offset of the token in the source.
    pub(crate) offset: usize,
    /// Whether whitespace separates this token from the previous one.
    pub(crate) spaced: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LexError {
    pub(crate) line: usize,
    pub(crate) message: String,
}

fn is_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

fn is_ident_start(c: char) -> bool {
    c == '_' || c.is_alphabetic()
}

fn is_ident_char(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}

/// Split template source into tokens, ending with [`TokenKind::Eof`].
pub(crate) fn lex(src: &str) -> Result<Vec<Token>, LexError> {
    Lexer {
        src,
        pos: 0,
        tokens: Vec::new(),
        trim_next_text: false,
    }
    .run()
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    tokens: Vec<Token>,
    trim_next_text: bool,
}

impl<'a> Lexer<'a> {
    fn run(mut self) -> Result<Vec<Token>, LexError> {
        loop {
            let start = self.pos;
            let delim = self.src[start..].find(LEFT_DELIM).map(|i| start + i);
            let text_end = delim.unwrap_or(self.src.len());

            let mut text = &self.src[start..text_end];
            if std::mem::take(&mut self.trim_next_text) {
                text = text.trim_start_matches(is_space);
            }
            let left_trim = delim.is_some_and(|d| self.has_left_trim(d));
            if left_trim {
                text = text.trim_end_matches(is_space);
            }
            if !text.is_empty() {
                self.push_at(TokenKind::Text(text.to_string()), start, true);
            }

            let Some(delim) = delim else {
                self.push_at(TokenKind::Eof, self.src.len(), true);
                return Ok(self.tokens);
            };

            self.pos = delim + if left_trim { LEFT_TRIM.len() } else { LEFT_DELIM.len() };
            if self.rest().starts_with(COMMENT_OPEN) {
                self.lex_comment()?;
                continue;
            }
            self.push_at(TokenKind::LeftDelim, self.pos, true);
            self.lex_action()?;
        }
    }

    /// `{{- ` must be followed by whitespace, otherwise `{{-3}}` is a number.
    fn has_left_trim(&self, delim: usize) -> bool {
        let after = &self.src[delim + LEFT_DELIM.len()..];
        let mut chars = after.chars();
        chars.next() == Some('-') && chars.next().is_some_and(is_space)
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn line_at(&self, offset: usize) -> usize {
        self.src[..offset].matches('\n').count() + 1
    }

    fn error(&self, message: impl Into<String>) -> LexError {
        LexError {
            line: self.line_at(self.pos),
            message: message.into(),
        }
    }

    fn push_at(&mut self, kind: TokenKind, offset: usize, spaced: bool) {
        let line = self.line_at(offset);
        self.tokens.push(Token {
            kind,
            line,
            offset,
            spaced,
        });
    }

    fn lex_comment(&mut self) -> Result<(), LexError> {
        let Some(close) = self.rest().find(COMMENT_CLOSE) else {
            return Err(self.error("unclosed comment"));
        };
        self.pos += close + COMMENT_CLOSE.len();

        let rest = self.rest();
        let trimmed = rest.trim_start_matches(is_space);
        if trimmed.len() < rest.len() && trimmed.starts_with(RIGHT_TRIM) {
            self.pos += rest.len() - trimmed.len() + RIGHT_TRIM.len();
            self.trim_next_text = true;
            Ok(())
        } else if rest.starts_with(RIGHT_DELIM) {
            self.pos += RIGHT_DELIM.len();
            Ok(())
        } else {
            Err(self.error("comment ends before closing delimiter"))
        }
    }

    fn lex_action(&mut self) -> Result<(), LexError> {
        let mut spaced = true;
        loop {
            let rest = self.rest();
            let trimmed = rest.trim_start_matches(is_space);
            if trimmed.len() < rest.len() {
                spaced = true;
                self.pos += rest.len() - trimmed.len();
            }

            let rest = self.rest();
            if spaced && rest.starts_with(RIGHT_TRIM) {
                self.push_at(TokenKind::RightDelim, self.pos, true);
                self.pos += RIGHT_TRIM.len();
                self.trim_next_text = true;
                return Ok(());
            }
            if rest.starts_with(RIGHT_DELIM) {
                self.push_at(TokenKind::RightDelim, self.pos, spaced);
                self.pos += RIGHT_DELIM.len();
                return Ok(());
            }

            let Some(c) = rest.chars().next() else {
                return Err(self.error("unclosed action"));
            };
            let offset = self.pos;
            let kind = match c {
                '|' => self.single(TokenKind::Pipe),
                '(' => self.single(TokenKind::LeftParen),
                ')' => self.single(TokenKind::RightParen),
                ',' => self.single(TokenKind::Comma),
                '=' => self.single(TokenKind::Assign),
                ':' => {
                    if !rest.starts_with(":=") {
                        return Err(self.error("expected :="));
                    }
                    self.pos += 2;
                    TokenKind::Declare
                },
                '"' => self.lex_quoted()?,
                '`' => self.lex_raw()?,
                '.' => {
                    let chain = self.lex_chain();
                    if chain.is_empty() {
                        self.pos += 1;
                        TokenKind::Dot
                    } else {
                        TokenKind::Field(chain)
                    }
                },
                '$' => {
                    self.pos += 1;
                    let name = format!("${}", self.take_ident());
                    TokenKind::Variable(name, self.lex_chain())
                },
                '-' | '+' | '0'..='9' => self.lex_number()?,
                c if is_ident_start(c) => TokenKind::Ident(self.take_ident()),
                c => return Err(self.error(format!("unexpected {c:?} in action"))),
            };
            self.push_at(kind, offset, spaced);
            spaced = false;
        }
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.pos += 1;
        kind
    }

    fn take_ident(&mut self) -> String {
        let rest = self.rest();
        let len = rest
            .char_indices()
            .find(|(_, c)| !is_ident_char(*c))
            .map_or(rest.len(), |(i, _)| i);
        let ident = rest[..len].to_string();
        self.pos += len;
        ident
    }

    /// Consume `.Name` segments for as long as they follow each other.
    fn lex_chain(&mut self) -> Vec<String> {
        let mut chain = Vec::new();
        loop {
            let mut chars = self.rest().chars();
            if chars.next() != Some('.') || !chars.next().is_some_and(is_ident_start) {
                return chain;
            }
            self.pos += 1;
            chain.push(self.take_ident());
        }
    }

    fn lex_number(&mut self) -> Result<TokenKind, LexError> {
        let rest = self.rest();
        let sign_len = usize::from(rest.starts_with(|c| c == '-' || c == '+'));
        let digits = rest[sign_len..]
            .char_indices()
            .find(|(_, c)| !c.is_ascii_digit())
            .map_or(rest.len() - sign_len, |(i, _)| i);
        let end = sign_len + digits;
        let literal = &rest[..end];

        if digits == 0 || rest[end..].starts_with(|c: char| is_ident_char(c) || c == '.') {
            return Err(self.error(format!("bad number syntax: {literal:?}")));
        }
        let value = literal
            .parse::<i64>()
            .map_err(|_| self.error(format!("number out of range: {literal}")))?;
        self.pos += end;
        Ok(TokenKind::Int(value))
    }

    fn lex_quoted(&mut self) -> Result<TokenKind, LexError> {
        let mut value = String::new();
        let mut chars = self.rest().char_indices().skip(1);
        while let Some((i, c)) = chars.next() {
            match c {
                '"' => {
                    self.pos += i + 1;
                    return Ok(TokenKind::Str(value));
                },
                '\n' => break,
                '\\' => {
                    let escaped = match chars.next().map(|(_, e)| e) {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('0') => '\0',
                        Some(e @ ('\\' | '"' | '\'')) => e,
                        Some(e) => {
                            return Err(self.error(format!("unknown escape sequence: \\{e}")));
                        },
                        None => break,
                    };
                    value.push(escaped);
                },
                c => value.push(c),
            }
        }
        Err(self.error("unterminated quoted string"))
    }

    fn lex_raw(&mut self) -> Result<TokenKind, LexError> {
        let body = &self.rest()[1..];
        let Some(close) = body.find('`') else {
            return Err(self.error("unterminated raw quoted string"));
        };
        let value = body[..close].to_string();
        self.pos += close + 2;
        Ok(TokenKind::Str(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        lex(src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    fn field(names: &[&str]) -> TokenKind {
        TokenKind::Field(names.iter().map(ToString::to_string).collect())
    }

    #[test]
    fn plain_text_only() {
        assert_eq!(
            kinds("hello"),
            vec![TokenKind::Text("hello".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn field_chain_and_range() {
        assert_eq!(
            kinds("{{.SavedSearch.Name}}: {{range .Events}}x{{end}}"),
            vec![
                TokenKind::LeftDelim,
                field(&["SavedSearch", "Name"]),
                TokenKind::RightDelim,
                TokenKind::Text(": ".into()),
                TokenKind::LeftDelim,
                TokenKind::Ident("range".into()),
                field(&["Events"]),
                TokenKind::RightDelim,
                TokenKind::Text("x".into()),
                TokenKind::LeftDelim,
                TokenKind::Ident("end".into()),
                TokenKind::RightDelim,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn variables_literals_and_punctuation() {
        assert_eq!(
            kinds(r#"{{$e := index .Events 0 | printf "%s\n" `raw`}}"#),
            vec![
                TokenKind::LeftDelim,
                TokenKind::Variable("$e".into(), vec![]),
                TokenKind::Declare,
                TokenKind::Ident("index".into()),
                field(&["Events"]),
                TokenKind::Int(0),
                TokenKind::Pipe,
                TokenKind::Ident("printf".into()),
                TokenKind::Str("%s\n".into()),
                TokenKind::Str("raw".into()),
                TokenKind::RightDelim,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn variable_with_chain_and_root() {
        assert_eq!(
            kinds("{{$.SavedSearch.ID}}{{$}}"),
            vec![
                TokenKind::LeftDelim,
                TokenKind::Variable("$".into(), vec!["SavedSearch".into(), "ID".into()]),
                TokenKind::RightDelim,
                TokenKind::LeftDelim,
                TokenKind::Variable("$".into(), vec![]),
                TokenKind::RightDelim,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn trim_markers_strip_surrounding_whitespace() {
        assert_eq!(
            kinds("a  \n {{- .X -}} \n b"),
            vec![
                TokenKind::Text("a".into()),
                TokenKind::LeftDelim,
                field(&["X"]),
                TokenKind::RightDelim,
                TokenKind::Text("b".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn negative_number_is_not_a_trim_marker() {
        assert_eq!(
            kinds("{{-3}}"),
            vec![
                TokenKind::LeftDelim,
                TokenKind::Int(-3),
                TokenKind::RightDelim,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn comments_are_dropped() {
        assert_eq!(
            kinds("a {{- /* note */ -}} b{{/* x */}}"),
            vec![
                TokenKind::Text("a".into()),
                TokenKind::Text("b".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn tracks_lines() {
        let tokens = lex("one\ntwo {{.X}}").unwrap();
        let field_token = tokens
            .iter()
            .find(|t| matches!(t.kind, TokenKind::Field(_)))
            .unwrap();
        assert_eq!(field_token.line, 2);
    }

    #[test]
    fn spacing_is_recorded() {
        let tokens = lex("{{(.A).B (.C) .D}}").unwrap();
        let spaced: Vec<bool> = tokens.iter().map(|t| t.spaced).collect();
        // LeftDelim ( .A ) .B ( .C ) .D RightDelim Eof
        assert_eq!(
            spaced,
            vec![true, true, false, false, false, true, false, false, true, false, true]
        );
    }

    #[test]
    fn errors() {
        assert_eq!(lex("{{.X").unwrap_err().message, "unclosed action");
        assert_eq!(lex("{{/* x").unwrap_err().message, "unclosed comment");
        assert_eq!(
            lex("{{/* x */ .Y}}").unwrap_err().message,
            "comment ends before closing delimiter"
        );
        assert_eq!(
            lex(r#"{{"abc}}"#).unwrap_err().message,
            "unterminated quoted string"
        );
        assert_eq!(
            lex("{{3x}}").unwrap_err().message,
            "bad number syntax: \"3\""
        );
        assert_eq!(
            lex("{{ # }}").unwrap_err().message,
            "unexpected '#' in action"
        );
    }
}
