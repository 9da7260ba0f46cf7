use std::collections::VecDeque;
use std::iter::Peekable;
use std::str::Chars;

use thiserror::Error;

pub mod token;

pub use self::token::Token;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LexError {
    #[error("invalid indents")]
    InvalidIndents,
    #[error("tabs are not allowed in indentation")]
    TabIndentation,
    #[error("unknown escape sequence '\\{escape}'")]
    BadEscape { escape: char },
    #[error("unterminated string constant")]
    UnterminatedString,
    #[error("number constant '{literal}' does not fit into 32 bits")]
    NumberOverflow { literal: String },
    #[error("Lexer expects token {expected}, found {found}")]
    UnexpectedToken { expected: String, found: Token },
}

pub type LexResult<T> = Result<T, LexError>;

static EOF: Token = Token::Eof;

/// Tokenizer with a one-token lookahead window.
///
/// The whole input is consumed on construction; a physical line usually
/// expands into several tokens (indentation markers, the line body, a
/// trailing `Newline`), so the unread tokens sit in a FIFO buffer drained by
/// [`advance`](Lexer::advance). The buffer always ends with `Eof`.
pub struct Lexer {
    tokens: VecDeque<Token>,
    indent: usize,
}

impl Lexer {
    pub fn new(input: &str) -> LexResult<Self> {
        let mut lexer = Self {
            tokens: VecDeque::new(),
            indent: 0,
        };
        lexer.read_tokens(input)?;
        Ok(lexer)
    }

    /// The token at the head of the buffer; stable until the next `advance`.
    pub fn current(&self) -> &Token {
        self.tokens.front().unwrap_or(&EOF)
    }

    /// Pops the head token and returns the new head. Once only `Eof`
    /// remains, further calls keep returning it.
    pub fn advance(&mut self) -> &Token {
        if self.tokens.len() > 1 {
            self.tokens.pop_front();
        }
        self.current()
    }

    /// Returns the current token if it matches `expected` exactly,
    /// payload included.
    pub fn expect(&self, expected: &Token) -> LexResult<&Token> {
        let current = self.current();
        if current == expected {
            Ok(current)
        } else {
            Err(Self::unexpected(&expected.to_string(), current))
        }
    }

    pub fn expect_number(&self) -> LexResult<i32> {
        match self.current() {
            Token::Number(value) => Ok(*value),
            other => Err(Self::unexpected("Number", other)),
        }
    }

    pub fn expect_id(&self) -> LexResult<&str> {
        match self.current() {
            Token::Id(name) => Ok(name),
            other => Err(Self::unexpected("Id", other)),
        }
    }

    pub fn expect_string(&self) -> LexResult<&str> {
        match self.current() {
            Token::String(value) => Ok(value),
            other => Err(Self::unexpected("String", other)),
        }
    }

    pub fn expect_char(&self) -> LexResult<char> {
        match self.current() {
            Token::Char(symbol) => Ok(*symbol),
            other => Err(Self::unexpected("Char", other)),
        }
    }

    pub fn expect_next(&mut self, expected: &Token) -> LexResult<&Token> {
        self.advance();
        self.expect(expected)
    }

    pub fn expect_next_number(&mut self) -> LexResult<i32> {
        self.advance();
        self.expect_number()
    }

    pub fn expect_next_id(&mut self) -> LexResult<&str> {
        self.advance();
        self.expect_id()
    }

    pub fn expect_next_string(&mut self) -> LexResult<&str> {
        self.advance();
        self.expect_string()
    }

    pub fn expect_next_char(&mut self) -> LexResult<char> {
        self.advance();
        self.expect_char()
    }

    fn unexpected(expected: &str, found: &Token) -> LexError {
        LexError::UnexpectedToken {
            expected: expected.to_string(),
            found: found.clone(),
        }
    }

    fn read_tokens(&mut self, input: &str) -> LexResult<()> {
        for line in input.lines() {
            if Self::is_blank_line(line) {
                continue;
            }
            let body = line.trim_start_matches(' ');
            if Self::tab_gates_content(body) {
                return Err(LexError::TabIndentation);
            }
            let leading = line.len() - body.len();
            if leading % 2 != 0 {
                return Err(LexError::InvalidIndents);
            }
            self.set_indent(leading / 2);
            self.read_line_body(body)?;
            self.tokens.push_back(Token::Newline);
        }
        self.set_indent(0);
        self.tokens.push_back(Token::Eof);
        Ok(())
    }

    /// True when a tab sits where indentation is measured and the line
    /// still has code for that indentation to gate. Whitespace-only and
    /// comment-only remainders are left to the ordinary body scan, which
    /// skips tabs like any other whitespace.
    fn tab_gates_content(body: &str) -> bool {
        if !body.starts_with('\t') {
            return false;
        }
        let rest = body.trim_start_matches([' ', '\t']);
        !rest.is_empty() && !rest.starts_with('#')
    }

    /// Lines that are empty, whitespace-only, or comment-only produce no
    /// tokens and leave the indentation depth untouched.
    fn is_blank_line(line: &str) -> bool {
        match line.find(|c| c != ' ') {
            None => true,
            Some(pos) => line[pos..].starts_with('#'),
        }
    }

    fn set_indent(&mut self, level: usize) {
        while self.indent < level {
            self.indent += 1;
            self.tokens.push_back(Token::Indent);
        }
        while self.indent > level {
            self.indent -= 1;
            self.tokens.push_back(Token::Dedent);
        }
    }

    fn read_line_body(&mut self, body: &str) -> LexResult<()> {
        let mut chars = body.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '#' => break,
                c if c.is_ascii_whitespace() => {}
                '=' | '<' | '>' | '!' => {
                    if chars.peek() == Some(&'=') {
                        chars.next();
                        self.tokens.push_back(match c {
                            '=' => Token::Eq,
                            '!' => Token::NotEq,
                            '<' => Token::LessOrEq,
                            _ => Token::GreaterOrEq,
                        });
                    } else {
                        self.tokens.push_back(Token::Char(c));
                    }
                }
                ':' | '(' | ')' | '.' | ',' | ';' | '{' | '}' | '[' | ']' | '@' | '%' | '$'
                | '^' | '&' | '?' | '+' | '-' | '*' | '/' => {
                    self.tokens.push_back(Token::Char(c));
                }
                '"' | '\'' => {
                    let token = Self::read_string(c, &mut chars)?;
                    self.tokens.push_back(token);
                }
                c if c.is_ascii_digit() => {
                    let token = Self::read_number(c, &mut chars)?;
                    self.tokens.push_back(token);
                }
                c if c.is_ascii_alphabetic() || c == '_' => {
                    let token = Self::read_word(c, &mut chars);
                    self.tokens.push_back(token);
                }
                // Characters outside the recognized set are skipped.
                _ => {}
            }
        }
        Ok(())
    }

    fn read_string(quote: char, chars: &mut Peekable<Chars<'_>>) -> LexResult<Token> {
        let mut value = String::new();
        loop {
            let c = chars.next().ok_or(LexError::UnterminatedString)?;
            if c == quote {
                return Ok(Token::String(value));
            }
            if c == '\\' {
                let escape = chars.next().ok_or(LexError::UnterminatedString)?;
                value.push(match escape {
                    '"' => '"',
                    '\'' => '\'',
                    '\\' => '\\',
                    'n' => '\n',
                    'r' => '\r',
                    't' => '\t',
                    other => return Err(LexError::BadEscape { escape: other }),
                });
            } else {
                value.push(c);
            }
        }
    }

    fn read_number(first: char, chars: &mut Peekable<Chars<'_>>) -> LexResult<Token> {
        let mut literal = String::from(first);
        while let Some(&c) = chars.peek() {
            if !c.is_ascii_digit() {
                break;
            }
            literal.push(c);
            chars.next();
        }
        match literal.parse::<i32>() {
            Ok(value) => Ok(Token::Number(value)),
            Err(_) => Err(LexError::NumberOverflow { literal }),
        }
    }

    fn read_word(first: char, chars: &mut Peekable<Chars<'_>>) -> Token {
        let mut word = String::from(first);
        while let Some(&c) = chars.peek() {
            if !c.is_ascii_alphanumeric() && c != '_' {
                break;
            }
            word.push(c);
            chars.next();
        }
        match word.as_str() {
            "class" => Token::Class,
            "return" => Token::Return,
            "if" => Token::If,
            "else" => Token::Else,
            "def" => Token::Def,
            "print" => Token::Print,
            "and" => Token::And,
            "or" => Token::Or,
            "not" => Token::Not,
            "None" => Token::None,
            "True" => Token::True,
            "False" => Token::False,
            _ => Token::Id(word),
        }
    }
}

pub fn tokenize(input: &str) -> LexResult<Vec<Token>> {
    Ok(Vec::from(Lexer::new(input)?.tokens))
}
