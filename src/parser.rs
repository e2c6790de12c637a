use crate::{
    ast::{BinOp, Expr, Literal, Location, Token, TokenKind, UnaryOp},
    error::{Error, Result},
    lexer::Lexer,
};

const PRIMARY: &str = "\"null\", bool, number, string, func, property or \"(\"";

/// Deepest nesting of parentheses, calls, operators and conditionals accepted.
pub const MAX_NESTING: usize = 100;

pub struct Parser {
    source: String,
    tokens: Vec<Token>,
    position: usize,
    depth: usize,
}

impl Parser {
    /// Tokenizes the lexer's input up front; lexing errors surface here.
    pub fn new(mut lexer: Lexer) -> Result<Self> {
        let tokens = lexer.tokenize()?;
        Ok(Parser {
            source: lexer.source().to_string(),
            tokens,
            position: 0,
            depth: 0,
        })
    }

    /// Parser over an existing token stream. A missing `Eof` is appended.
    pub fn from_tokens(mut tokens: Vec<Token>, source: &str) -> Self {
        if tokens.last().is_none_or(|t| t.kind != TokenKind::Eof) {
            let location = end_location(source);
            tokens.push(Token::new(TokenKind::Eof, None, "", location));
        }
        Parser {
            source: source.to_string(),
            tokens,
            position: 0,
            depth: 0,
        }
    }

    fn current(&self) -> &Token {
        // from_tokens/new guarantee a trailing Eof, which is never consumed
        &self.tokens[self.position.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if token.kind != TokenKind::Eof {
            self.position += 1;
        }
        token
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current().kind == kind
    }

    fn unexpected(&self, expected: &str) -> Error {
        let token = self.current();
        let message = if token.kind == TokenKind::Eof {
            format!("Expected {expected}. Unexpected end of expression.")
        } else {
            format!("Expected {expected}. Unexpected token \"{}\".", token.raw)
        };
        Error::syntax(token.location, message, &self.source)
    }

    /// One level deeper into the tree; paired with `leave` on success.
    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(Error::syntax(
                self.current().location,
                format!("Expression nested deeper than {MAX_NESTING} levels."),
                &self.source,
            ));
        }
        Ok(())
    }

    fn leave(&mut self, levels: usize) {
        self.depth -= levels;
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(&kind.to_string()))
        }
    }

    /// Parse primary expressions (atoms): literals, field paths, calls, '(' ')'
    fn parse_primary(&mut self) -> Result<Expr> {
        match self.current().kind {
            TokenKind::Bool | TokenKind::Number | TokenKind::String | TokenKind::Null => {
                let token = self.advance();
                Ok(Expr::Literal {
                    value: token.value.unwrap_or(Literal::Null),
                    location: token.location,
                })
            }
            TokenKind::Identifier => {
                let token = self.advance();
                Ok(Expr::Field {
                    path: token.raw.split('.').map(str::to_string).collect(),
                    location: token.location,
                })
            }
            TokenKind::Function => self.parse_call(),
            TokenKind::LParen => {
                self.advance();
                self.enter()?;
                let expr = self.parse_expression()?;
                self.expect(TokenKind::RParen)?;
                self.leave(1);
                Ok(expr)
            }
            _ => Err(self.unexpected(PRIMARY)),
        }
    }

    fn parse_call(&mut self) -> Result<Expr> {
        let name = self.advance();
        self.expect(TokenKind::LParen)?;
        self.enter()?;

        let mut args = vec![];
        if !self.check(TokenKind::RParen) {
            loop {
                args.push(self.parse_expression()?);
                if self.check(TokenKind::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        if !self.check(TokenKind::RParen) {
            return Err(self.unexpected("\",\" or \")\""));
        }
        self.advance();
        self.leave(1);

        Ok(Expr::Call {
            name: name.raw,
            args,
            location: name.location,
        })
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        let op = match self.current().kind {
            TokenKind::Not => UnaryOp::Not,
            TokenKind::Minus => UnaryOp::Negate,
            _ => return self.parse_primary(),
        };
        let location = self.advance().location;
        self.enter()?;
        let operand = self.parse_unary()?; // Right-associative
        self.leave(1);

        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
            location,
        })
    }

    /// Left-associative binary level: `next (op next)*`.
    fn parse_binary(
        &mut self,
        next: fn(&mut Self) -> Result<Expr>,
        operator: fn(TokenKind) -> Option<BinOp>,
    ) -> Result<Expr> {
        let mut left = next(self)?;

        // Each operator nests everything parsed so far one level deeper
        let mut levels = 0;
        while let Some(op) = operator(self.current().kind) {
            let location = self.advance().location;
            self.enter()?;
            levels += 1;
            let right = next(self)?;

            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                location,
            };
        }
        self.leave(levels);
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr> {
        self.parse_binary(Self::parse_unary, |kind| match kind {
            TokenKind::Star => Some(BinOp::Multiply),
            TokenKind::Slash => Some(BinOp::Divide),
            TokenKind::Percent => Some(BinOp::Modulo),
            _ => None,
        })
    }

    fn parse_additive(&mut self) -> Result<Expr> {
        self.parse_binary(Self::parse_multiplicative, |kind| match kind {
            TokenKind::Plus => Some(BinOp::Add),
            TokenKind::Minus => Some(BinOp::Subtract),
            _ => None,
        })
    }

    fn parse_relational(&mut self) -> Result<Expr> {
        self.parse_binary(Self::parse_additive, |kind| match kind {
            TokenKind::Lt => Some(BinOp::LessThan),
            TokenKind::Gt => Some(BinOp::GreaterThan),
            TokenKind::LtEq => Some(BinOp::LessEqual),
            TokenKind::GtEq => Some(BinOp::GreaterEqual),
            _ => None,
        })
    }

    fn parse_equality(&mut self) -> Result<Expr> {
        self.parse_binary(Self::parse_relational, |kind| match kind {
            TokenKind::EqEq => Some(BinOp::Equal),
            TokenKind::NotEq => Some(BinOp::NotEqual),
            _ => None,
        })
    }

    fn parse_and(&mut self) -> Result<Expr> {
        self.parse_binary(Self::parse_equality, |kind| {
            (kind == TokenKind::And).then_some(BinOp::And)
        })
    }

    fn parse_or(&mut self) -> Result<Expr> {
        self.parse_binary(Self::parse_and, |kind| {
            (kind == TokenKind::Or).then_some(BinOp::Or)
        })
    }

    fn parse_conditional(&mut self) -> Result<Expr> {
        let condition = self.parse_or()?;
        if !self.check(TokenKind::Question) {
            return Ok(condition);
        }

        let location = self.advance().location;
        self.enter()?;
        let then_branch = self.parse_conditional()?;
        self.expect(TokenKind::Colon)?;
        let else_branch = self.parse_conditional()?;
        self.leave(1);

        Ok(Expr::Conditional {
            condition: Box::new(condition),
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
            location,
        })
    }

    pub fn parse_expression(&mut self) -> Result<Expr> {
        self.parse_conditional()
    }

    /// Parses a complete expression; anything left after it is an error.
    pub fn parse(&mut self) -> Result<Expr> {
        let expr = self.parse_expression()?;
        if !self.check(TokenKind::Eof) {
            return Err(self.unexpected("end of expression"));
        }
        Ok(expr)
    }
}

/// Lexes and parses an expression in one call.
pub fn parse(expression: &str) -> Result<Expr> {
    Parser::new(Lexer::new(expression))?.parse()
}

/// Location just past the last character of `source`.
fn end_location(source: &str) -> Location {
    let line = source.matches('\n').count() + 1;
    let last = source.rsplit('\n').next().unwrap_or("");
    Location::new(line, last.chars().count() + 1)
}
