use std::fmt;

use super::ParseError;

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Token {
    Ident(String),
    Int(i64),
    Double(f64),
    Str(String),
    True,
    False,
    Null,
    Dot,
    LBracket,
    RBracket,
    LParen,
    RParen,
    /// `@{`, opens a nested binding
    OpenBinding,
    /// `}`, closes the innermost binding
    CloseBrace,
    Question,
    Colon,
    Bang,
    EqEq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    AndAnd,
    OrOr,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Token::*;
        match self {
            Ident(name) => write!(f, "identifier '{name}'"),
            Int(i) => write!(f, "number {i}"),
            Double(d) => write!(f, "number {d}"),
            Str(s) => write!(f, "string '{s}'"),
            True => f.write_str("'true'"),
            False => f.write_str("'false'"),
            Null => f.write_str("'null'"),
            Dot => f.write_str("'.'"),
            LBracket => f.write_str("'['"),
            RBracket => f.write_str("']'"),
            LParen => f.write_str("'('"),
            RParen => f.write_str("')'"),
            OpenBinding => f.write_str("'@{'"),
            CloseBrace => f.write_str("'}'"),
            Question => f.write_str("'?'"),
            Colon => f.write_str("':'"),
            Bang => f.write_str("'!'"),
            EqEq => f.write_str("'=='"),
            NotEq => f.write_str("'!='"),
            Lt => f.write_str("'<'"),
            LtEq => f.write_str("'<='"),
            Gt => f.write_str("'>'"),
            GtEq => f.write_str("'>='"),
            AndAnd => f.write_str("'&&'"),
            OrOr => f.write_str("'||'"),
            Plus => f.write_str("'+'"),
            Minus => f.write_str("'-'"),
            Star => f.write_str("'*'"),
            Slash => f.write_str("'/'"),
            Percent => f.write_str("'%'"),
        }
    }
}

/// On-demand tokenizer over the text of a binding
///
/// The lexer starts right after an opening `@{` and is driven by the parser, which stops
/// pulling tokens once the matching `}` is found. Offsets are byte offsets into the full
/// template string.
pub(crate) struct Lexer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str, pos: usize) -> Self {
        Self { src, pos }
    }

    pub fn offset(&self) -> usize {
        self.pos
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn skip_whitespace(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.src.len() - trimmed.len();
    }

    /// Return the next token and its starting offset, or `None` at the end of input
    pub fn next_token(&mut self) -> Result<Option<(Token, usize)>, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        let rest = self.rest();
        let Some(c) = rest.chars().next() else {
            return Ok(None);
        };

        // two character operators first
        let two = rest.get(..2).unwrap_or("");
        let double = match two {
            "@{" => Some(Token::OpenBinding),
            "==" => Some(Token::EqEq),
            "!=" => Some(Token::NotEq),
            "<=" => Some(Token::LtEq),
            ">=" => Some(Token::GtEq),
            "&&" => Some(Token::AndAnd),
            "||" => Some(Token::OrOr),
            _ => None,
        };
        if let Some(token) = double {
            self.pos += 2;
            return Ok(Some((token, start)));
        }

        let single = match c {
            '.' => Some(Token::Dot),
            '[' => Some(Token::LBracket),
            ']' => Some(Token::RBracket),
            '(' => Some(Token::LParen),
            ')' => Some(Token::RParen),
            '}' => Some(Token::CloseBrace),
            '?' => Some(Token::Question),
            ':' => Some(Token::Colon),
            '!' => Some(Token::Bang),
            '<' => Some(Token::Lt),
            '>' => Some(Token::Gt),
            '+' => Some(Token::Plus),
            '-' => Some(Token::Minus),
            '*' => Some(Token::Star),
            '/' => Some(Token::Slash),
            '%' => Some(Token::Percent),
            _ => None,
        };
        if let Some(token) = single {
            self.pos += 1;
            return Ok(Some((token, start)));
        }

        if c == '\'' {
            return self.string(start).map(Some);
        }
        if c.is_ascii_digit() {
            return self.number(start).map(Some);
        }
        if c.is_ascii_alphabetic() || c == '_' {
            let len = rest
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(rest.len());
            self.pos += len;
            let token = match &rest[..len] {
                "true" => Token::True,
                "false" => Token::False,
                "null" => Token::Null,
                ident => Token::Ident(ident.to_owned()),
            };
            return Ok(Some((token, start)));
        }

        // collect the whole run of symbol characters for a useful message
        let len = rest
            .find(|c: char| c.is_alphanumeric() || c.is_whitespace() || c == '\'')
            .unwrap_or(rest.len())
            .max(c.len_utf8());
        Err(ParseError::UnknownOperator {
            operator: rest[..len].to_owned(),
            offset: start,
        })
    }

    fn string(&mut self, start: usize) -> Result<(Token, usize), ParseError> {
        let mut value = String::new();
        let mut chars = self.src[start + 1..].char_indices();
        while let Some((i, c)) = chars.next() {
            match c {
                '\\' => match chars.next() {
                    Some((_, '\'')) => value.push('\''),
                    Some((_, '\\')) => value.push('\\'),
                    Some((_, 'n')) => value.push('\n'),
                    Some((_, other)) => {
                        value.push('\\');
                        value.push(other);
                    }
                    None => break,
                },
                '\'' => {
                    self.pos = start + 1 + i + 1;
                    return Ok((Token::Str(value), start));
                }
                c => value.push(c),
            }
        }
        Err(ParseError::UnterminatedString { offset: start })
    }

    fn number(&mut self, start: usize) -> Result<(Token, usize), ParseError> {
        let rest = self.rest();
        let mut len = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());

        // a fraction needs digits after the dot, otherwise the dot is an accessor
        let is_fraction = rest[len..].starts_with('.')
            && rest[len + 1..].starts_with(|c: char| c.is_ascii_digit());
        if is_fraction {
            len += 1 + rest[len + 1..]
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(rest.len() - len - 1);
        }

        let text = &rest[..len];
        self.pos += len;
        let token = if is_fraction {
            text.parse::<f64>().map(Token::Double).ok()
        } else {
            text.parse::<i64>().map(Token::Int).ok()
        };
        token
            .map(|t| (t, start))
            .ok_or_else(|| ParseError::InvalidNumber {
                text: text.to_owned(),
                offset: start,
            })
    }
}
