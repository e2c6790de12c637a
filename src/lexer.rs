use crate::{
    ast::{Literal, Location, Token, TokenKind},
    error::{Error, Result},
};

pub struct Lexer {
    source: String,
    input: Vec<char>,
    position: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer {
            source: input.to_string(),
            input: input.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
        }
    }

    /// The expression text being tokenized.
    pub fn source(&self) -> &str {
        &self.source
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_char(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn location(&self) -> Location {
        Location::new(self.line, self.column)
    }

    fn advance(&mut self) {
        if self.current_char() == Some('\n') {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        self.position += 1;
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current_char() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn error(&self, location: Location, message: impl Into<String>) -> Error {
        Error::syntax(location, message, &self.source)
    }

    fn is_identifier_start(ch: char) -> bool {
        ch.is_alphabetic() || ch == '_'
    }

    /// Reads `segment(.segment)*`; a dot is only taken when another segment follows it.
    fn read_identifier(&mut self) -> String {
        let mut result = String::new();
        while let Some(ch) = self.current_char() {
            if ch.is_alphanumeric() || ch == '_' {
                result.push(ch);
                self.advance();
            } else if ch == '.' && self.peek_char(1).is_some_and(Self::is_identifier_start) {
                result.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        result
    }

    /// True when the next non-whitespace character is `(`.
    fn followed_by_paren(&self) -> bool {
        self.input[self.position..]
            .iter()
            .find(|c| !c.is_whitespace())
            .is_some_and(|c| *c == '(')
    }

    fn read_string(&mut self, start: Location) -> Result<Token> {
        let mut content = String::new();
        self.advance(); // Consume opening quote

        while let Some(ch) = self.current_char() {
            self.advance();
            if ch == '\'' {
                let raw = format!("'{content}'");
                return Ok(Token::new(
                    TokenKind::String,
                    Some(Literal::String(content)),
                    raw,
                    start,
                ));
            }
            content.push(ch);
        }

        Err(self.error(start, "Unterminated string literal."))
    }

    fn read_digits(&mut self, number: &mut String) -> usize {
        let mut count = 0;
        while let Some(ch) = self.current_char() {
            if ch.is_ascii_digit() {
                number.push(ch);
                self.advance();
                count += 1;
            } else {
                break;
            }
        }
        count
    }

    fn read_number(&mut self, start: Location) -> Result<Token> {
        let mut number = String::new();
        self.read_digits(&mut number);

        if self.current_char() == Some('.') {
            number.push('.');
            self.advance();
            if self.read_digits(&mut number) == 0 {
                return Err(self.error(start, format!("Malformed numeric literal '{number}'.")));
            }
        }

        if let Some(e @ ('e' | 'E')) = self.current_char() {
            number.push(e);
            self.advance();
            if let Some(sign @ ('+' | '-')) = self.current_char() {
                number.push(sign);
                self.advance();
            }
            if self.read_digits(&mut number) == 0 {
                return Err(self.error(start, format!("Malformed numeric literal '{number}'.")));
            }
        }

        if let Some(ch) = self.current_char()
            && (ch.is_alphanumeric() || ch == '_' || ch == '.')
        {
            number.push(ch);
            return Err(self.error(start, format!("Malformed numeric literal '{number}'.")));
        }

        let value = number
            .parse::<f64>()
            .map_err(|_| self.error(start, format!("Malformed numeric literal '{number}'.")))?;
        if !value.is_finite() {
            return Err(self.error(start, format!("Numeric literal '{number}' is out of range.")));
        }

        Ok(Token::new(
            TokenKind::Number,
            Some(Literal::Number {
                value,
                raw: number.clone(),
            }),
            number,
            start,
        ))
    }

    /// Consumes one or two characters and produces an operator token.
    fn operator(&mut self, kind: TokenKind, width: usize, start: Location) -> Token {
        let raw: String = self.input[self.position..self.position + width].iter().collect();
        for _ in 0..width {
            self.advance();
        }
        Token::new(kind, None, raw, start)
    }

    pub fn next_token(&mut self) -> Result<Token> {
        self.skip_whitespace();
        let start = self.location();

        let Some(ch) = self.current_char() else {
            return Ok(Token::new(TokenKind::Eof, None, "", start));
        };
        let next = self.peek_char(1);

        let token = match (ch, next) {
            ('&', Some('&')) => self.operator(TokenKind::And, 2, start),
            ('|', Some('|')) => self.operator(TokenKind::Or, 2, start),
            ('=', Some('=')) => self.operator(TokenKind::EqEq, 2, start),
            ('!', Some('=')) => self.operator(TokenKind::NotEq, 2, start),
            ('<', Some('=')) => self.operator(TokenKind::LtEq, 2, start),
            ('>', Some('=')) => self.operator(TokenKind::GtEq, 2, start),
            ('<', _) => self.operator(TokenKind::Lt, 1, start),
            ('>', _) => self.operator(TokenKind::Gt, 1, start),
            ('!', _) => self.operator(TokenKind::Not, 1, start),
            ('+', _) => self.operator(TokenKind::Plus, 1, start),
            ('-', _) => self.operator(TokenKind::Minus, 1, start),
            ('*', _) => self.operator(TokenKind::Star, 1, start),
            ('/', _) => self.operator(TokenKind::Slash, 1, start),
            ('%', _) => self.operator(TokenKind::Percent, 1, start),
            ('?', _) => self.operator(TokenKind::Question, 1, start),
            (':', _) => self.operator(TokenKind::Colon, 1, start),
            ('(', _) => self.operator(TokenKind::LParen, 1, start),
            (')', _) => self.operator(TokenKind::RParen, 1, start),
            (',', _) => self.operator(TokenKind::Comma, 1, start),
            ('\'', _) => self.read_string(start)?,
            (c, _) if c.is_ascii_digit() => self.read_number(start)?,
            (c, _) if Self::is_identifier_start(c) => {
                let ident = self.read_identifier();
                match ident.as_str() {
                    "true" => Token::new(TokenKind::Bool, Some(Literal::Bool(true)), ident, start),
                    "false" => Token::new(TokenKind::Bool, Some(Literal::Bool(false)), ident, start),
                    "null" => Token::new(TokenKind::Null, Some(Literal::Null), ident, start),
                    _ if self.followed_by_paren() => Token::new(TokenKind::Function, None, ident, start),
                    _ => Token::new(TokenKind::Identifier, None, ident, start),
                }
            }
            ('=', _) => {
                return Err(self.error(start, "Invalid token. Unexpected '=' (did you mean '=='?)."));
            }
            (c, _) => return Err(self.error(start, format!("Invalid token. Unexpected character '{c}'."))),
        };

        Ok(token)
    }

    /// Tokenizes the whole input. The last token is always `Eof`.
    pub fn tokenize(&mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }
}

/// Tokenizes an expression in one call.
pub fn tokenize(expression: &str) -> Result<Vec<Token>> {
    Lexer::new(expression).tokenize()
}

#[test]
fn test_keywords() {
    let mut lexer = Lexer::new("true false null");
    assert_eq!(lexer.next_token().unwrap().value, Some(Literal::Bool(true)));
    assert_eq!(lexer.next_token().unwrap().value, Some(Literal::Bool(false)));
    assert_eq!(lexer.next_token().unwrap().kind, TokenKind::Null);
    assert_eq!(lexer.next_token().unwrap().kind, TokenKind::Eof);
}

#[test]
fn test_function_vs_identifier() {
    let tokens = tokenize("Today () > Date").unwrap();
    assert_eq!(tokens[0].kind, TokenKind::Function);
    assert_eq!(tokens[0].raw, "Today");
    assert_eq!(tokens[1].kind, TokenKind::LParen);
    assert_eq!(tokens[4].kind, TokenKind::Identifier);
}
