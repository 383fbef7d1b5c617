//! Formula lexer. Positions are character offsets into the expression text.

use crate::ptg::ErrorCode;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Lexeme {
    Number(f64),
    String(String),
    Error(String),
    Ident(String),
    QuotedIdent(String),
    Whitespace(usize),
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    Semicolon,
    Colon,
    Bang,
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Amp,
    Percent,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    At,
    Hash,
    Other(char),
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub(crate) lexeme: Lexeme,
    pub(crate) start: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LexError {
    pub(crate) message: String,
    pub(crate) position: usize,
    pub(crate) ch: Option<char>,
}

struct Lexer {
    chars: Vec<char>,
    idx: usize,
    tokens: Vec<Token>,
}

pub(crate) fn lex(src: &str) -> Result<Vec<Token>, LexError> {
    Lexer {
        chars: src.chars().collect(),
        idx: 0,
        tokens: Vec::new(),
    }
    .lex()
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || matches!(c, '_' | '\\' | '$')
}

fn is_ident_cont(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '\\' | '$' | '.')
}

impl Lexer {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.idx).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.idx + offset).copied()
    }

    fn push(&mut self, lexeme: Lexeme, start: usize) {
        self.tokens.push(Token { lexeme, start });
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let start = self.idx;
        while self.peek().is_some_and(&pred) {
            self.idx += 1;
        }
        self.chars[start..self.idx].iter().collect()
    }

    fn lex(mut self) -> Result<Vec<Token>, LexError> {
        while let Some(ch) = self.peek() {
            let start = self.idx;
            match ch {
                ' ' | '\t' | '\r' | '\n' => {
                    let raw = self.take_while(|c| matches!(c, ' ' | '\t' | '\r' | '\n'));
                    self.push(Lexeme::Whitespace(raw.chars().count()), start);
                }
                '"' => {
                    let value = self.quoted('"')?;
                    self.push(Lexeme::String(value), start);
                }
                '\'' => {
                    let value = self.quoted('\'')?;
                    self.push(Lexeme::QuotedIdent(value), start);
                }
                '#' => {
                    let literal = self.error_literal();
                    match literal {
                        Some(literal) => self.push(Lexeme::Error(literal), start),
                        None => {
                            self.idx += 1;
                            self.push(Lexeme::Hash, start);
                        }
                    }
                }
                '0'..='9' | '.'
                    if ch != '.' || self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) =>
                {
                    let number = self.number()?;
                    self.push(Lexeme::Number(number), start);
                }
                c if is_ident_start(c) => {
                    let ident = match self.r1c1_len() {
                        Some(len) => {
                            self.idx += len;
                            self.chars[start..self.idx].iter().collect()
                        }
                        None => self.take_while(is_ident_cont),
                    };
                    self.push(Lexeme::Ident(ident), start);
                }
                _ => {
                    self.idx += 1;
                    let lexeme = match ch {
                        '(' => Lexeme::LParen,
                        ')' => Lexeme::RParen,
                        '{' => Lexeme::LBrace,
                        '}' => Lexeme::RBrace,
                        ',' => Lexeme::Comma,
                        ';' => Lexeme::Semicolon,
                        ':' => Lexeme::Colon,
                        '!' => Lexeme::Bang,
                        '+' => Lexeme::Plus,
                        '-' => Lexeme::Minus,
                        '*' => Lexeme::Star,
                        '/' => Lexeme::Slash,
                        '^' => Lexeme::Caret,
                        '&' => Lexeme::Amp,
                        '%' => Lexeme::Percent,
                        '@' => Lexeme::At,
                        '=' => Lexeme::Eq,
                        '<' => match self.peek() {
                            Some('=') => {
                                self.idx += 1;
                                Lexeme::Le
                            }
                            Some('>') => {
                                self.idx += 1;
                                Lexeme::Ne
                            }
                            _ => Lexeme::Lt,
                        },
                        '>' => {
                            if self.peek() == Some('=') {
                                self.idx += 1;
                                Lexeme::Ge
                            } else {
                                Lexeme::Gt
                            }
                        }
                        other => Lexeme::Other(other),
                    };
                    self.push(lexeme, start);
                }
            }
        }
        let end = self.idx;
        self.push(Lexeme::Eof, end);
        Ok(self.tokens)
    }

    /// Quoted text with doubled-quote escapes. The opening quote is at `self.idx`.
    fn quoted(&mut self, quote: char) -> Result<String, LexError> {
        let start = self.idx;
        self.idx += 1;
        let mut value = String::new();
        loop {
            match self.peek() {
                Some(c) if c == quote => {
                    self.idx += 1;
                    if self.peek() == Some(quote) {
                        self.idx += 1;
                        value.push(quote);
                        continue;
                    }
                    return Ok(value);
                }
                Some(c) => {
                    self.idx += 1;
                    value.push(c);
                }
                None => {
                    return Err(LexError {
                        message: if quote == '"' {
                            "unterminated string literal".to_string()
                        } else {
                            "unterminated quoted sheet name".to_string()
                        },
                        position: start,
                        ch: Some(quote),
                    })
                }
            }
        }
    }

    fn error_literal(&mut self) -> Option<String> {
        const LITERALS: [ErrorCode; 7] = [
            ErrorCode::Null,
            ErrorCode::Div0,
            ErrorCode::Value,
            ErrorCode::Ref,
            ErrorCode::Name,
            ErrorCode::Num,
            ErrorCode::NA,
        ];
        for code in LITERALS {
            let literal = code.literal();
            let len = literal.chars().count();
            let Some(candidate) = self.chars.get(self.idx..self.idx + len) else {
                continue;
            };
            let candidate: String = candidate.iter().collect();
            if candidate.eq_ignore_ascii_case(literal) {
                self.idx += len;
                return Some(candidate);
            }
        }
        None
    }

    fn number(&mut self) -> Result<f64, LexError> {
        let start = self.idx;
        let mut raw = self.take_while(|c| c.is_ascii_digit());
        if self.peek() == Some('.') {
            self.idx += 1;
            raw.push('.');
            raw.push_str(&self.take_while(|c| c.is_ascii_digit()));
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let sign = matches!(self.peek_at(1), Some('+' | '-'));
            let digit_at = if sign { 2 } else { 1 };
            if self.peek_at(digit_at).is_some_and(|c| c.is_ascii_digit()) {
                raw.push('e');
                if sign {
                    raw.extend(self.peek_at(1));
                }
                self.idx += digit_at;
                raw.push_str(&self.take_while(|c| c.is_ascii_digit()));
            }
        }
        raw.parse::<f64>().map_err(|_| LexError {
            message: format!("invalid number `{raw}`"),
            position: start,
            ch: self.chars.get(start).copied(),
        })
    }

    /// Length of a bracketed R1C1 reference (`R[1]C[-2]`, `RC[3]`) at the cursor.
    ///
    /// Unbracketed forms (`R2C3`) lex as ordinary identifiers.
    fn r1c1_len(&self) -> Option<usize> {
        let rest = &self.chars[self.idx..];
        let mut i = 0usize;
        let mut bracketed = false;

        if !matches!(rest.first(), Some('R' | 'r')) {
            return None;
        }
        i += 1;
        let part = |i: &mut usize, bracketed: &mut bool| -> Option<()> {
            if rest.get(*i) == Some(&'[') {
                *i += 1;
                if rest.get(*i) == Some(&'-') {
                    *i += 1;
                }
                let digits = rest[*i..].iter().take_while(|c| c.is_ascii_digit()).count();
                if digits == 0 {
                    return None;
                }
                *i += digits;
                if rest.get(*i) != Some(&']') {
                    return None;
                }
                *i += 1;
                *bracketed = true;
            } else {
                *i += rest[*i..].iter().take_while(|c| c.is_ascii_digit()).count();
            }
            Some(())
        };
        part(&mut i, &mut bracketed)?;
        if !matches!(rest.get(i), Some('C' | 'c')) {
            return None;
        }
        i += 1;
        part(&mut i, &mut bracketed)?;

        if !bracketed || rest.get(i).is_some_and(|&c| is_ident_cont(c) || c == '(') {
            return None;
        }
        Some(i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lexemes(src: &str) -> Vec<Lexeme> {
        lex(src).unwrap().into_iter().map(|t| t.lexeme).collect()
    }

    #[test]
    fn lexes_operators_and_operands() {
        assert_eq!(
            lexemes("A1+1.5e2<>\"a\"\"b\""),
            vec![
                Lexeme::Ident("A1".to_string()),
                Lexeme::Plus,
                Lexeme::Number(150.0),
                Lexeme::Ne,
                Lexeme::String("a\"b".to_string()),
                Lexeme::Eof,
            ]
        );
    }

    #[test]
    fn lexes_sheet_prefixes_errors_and_whitespace() {
        assert_eq!(
            lexemes("'My Sheet'!$A$1  #n/a"),
            vec![
                Lexeme::QuotedIdent("My Sheet".to_string()),
                Lexeme::Bang,
                Lexeme::Ident("$A$1".to_string()),
                Lexeme::Whitespace(2),
                Lexeme::Error("#n/a".to_string()),
                Lexeme::Eof,
            ]
        );
    }

    #[test]
    fn lexes_bracketed_r1c1() {
        assert_eq!(
            lexemes("R[1]C[-1]*RC"),
            vec![
                Lexeme::Ident("R[1]C[-1]".to_string()),
                Lexeme::Star,
                Lexeme::Ident("RC".to_string()),
                Lexeme::Eof,
            ]
        );
    }

    #[test]
    fn unknown_characters_become_other() {
        assert_eq!(
            lexemes("1~2"),
            vec![
                Lexeme::Number(1.0),
                Lexeme::Other('~'),
                Lexeme::Number(2.0),
                Lexeme::Eof,
            ]
        );
    }

    #[test]
    fn unterminated_string_reports_start() {
        let err = lex("1&\"abc").unwrap_err();
        assert_eq!(err.position, 2);
        assert_eq!(err.ch, Some('"'));
    }
}
