use std::rc::Rc;

use crate::{
    ast::{BinaryOp, Expr, ExprKind, Literal, LogicalOp, Stmt, StmtKind, UnaryOp},
    diagnostics::{Diagnostic, DiagnosticKind, SourceSpan},
    lexer::{Keyword, Lexer, Token, TokenKind},
};

/// Nesting limit for statements and expressions, kept well inside the
/// stack a recursive descent parser can rely on.
pub const MAX_NESTING_DEPTH: usize = 256;

pub fn parse_program(source: &str) -> Result<Vec<Stmt>, Diagnostic> {
    let tokens = Lexer::new(source).tokenize()?;
    Parser::new(tokens).parse_program()
}

struct Parser {
    tokens: Vec<Token>,
    current: usize,
    depth: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            current: 0,
            depth: 0,
        }
    }

    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, Diagnostic>,
    ) -> Result<T, Diagnostic> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(self.error(self.peek(), "too deeply nested"));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn parse_program(&mut self) -> Result<Vec<Stmt>, Diagnostic> {
        let mut items = Vec::new();
        while !self.check(TokenKind::Eof) {
            items.push(self.parse_statement()?);
        }
        Ok(items)
    }

    fn parse_block(&mut self) -> Result<(Vec<Stmt>, SourceSpan), Diagnostic> {
        let start = self
            .consume(TokenKind::LBrace, "expected `{` to start block")?
            .span
            .start;
        let mut items = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.check(TokenKind::Eof) {
            items.push(self.parse_statement()?);
        }
        let end = self
            .consume(TokenKind::RBrace, "expected `}` to close block")?
            .span
            .end;
        Ok((items, SourceSpan { start, end }))
    }

    fn parse_statement(&mut self) -> Result<Stmt, Diagnostic> {
        self.nested(Self::parse_statement_kind)
    }

    fn parse_statement_kind(&mut self) -> Result<Stmt, Diagnostic> {
        match self.peek_kind() {
            TokenKind::Keyword(Keyword::Let) => self.parse_let(),
            TokenKind::Keyword(Keyword::Function) => self.parse_function_declaration(),
            TokenKind::Keyword(Keyword::If) => self.parse_if(),
            TokenKind::Keyword(Keyword::While) => self.parse_while(),
            TokenKind::Keyword(Keyword::For) => self.parse_for(),
            TokenKind::Keyword(Keyword::Return) => self.parse_return(),
            TokenKind::Keyword(Keyword::Break) => {
                let span = self.advance().span;
                self.consume_optional_semicolon();
                Ok(Stmt {
                    kind: StmtKind::Break,
                    span,
                })
            }
            TokenKind::Keyword(Keyword::Continue) => {
                let span = self.advance().span;
                self.consume_optional_semicolon();
                Ok(Stmt {
                    kind: StmtKind::Continue,
                    span,
                })
            }
            TokenKind::LBrace => {
                let (items, span) = self.parse_block()?;
                Ok(Stmt {
                    kind: StmtKind::Block(items),
                    span,
                })
            }
            TokenKind::Semicolon => {
                let span = self.advance().span;
                Ok(Stmt {
                    kind: StmtKind::Block(Vec::new()),
                    span,
                })
            }
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_let(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.advance().span.start;
        let mut declarations = Vec::new();
        let mut end;
        loop {
            let name = self.consume_identifier("expected variable name after `let`")?;
            end = name.span.end;
            let initializer = if self.matches(TokenKind::Assign) {
                let value = self.parse_expression()?;
                end = value.span.end;
                Some(value)
            } else {
                None
            };
            declarations.push((name.lexeme, initializer));
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        self.consume_optional_semicolon();
        Ok(Stmt {
            kind: StmtKind::Let(declarations),
            span: SourceSpan { start, end },
        })
    }

    fn parse_function_declaration(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.advance().span.start;
        let name = self.consume_identifier("expected function name")?;
        let params = self.parse_params()?;
        let (body, span) = self.parse_block()?;
        Ok(Stmt {
            kind: StmtKind::Function {
                name: name.lexeme,
                params,
                body: Rc::from(body),
            },
            span: SourceSpan {
                start,
                end: span.end,
            },
        })
    }

    fn parse_params(&mut self) -> Result<Vec<String>, Diagnostic> {
        self.consume(TokenKind::LParen, "expected `(` before parameter list")?;
        let mut params = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                params.push(self.consume_identifier("expected parameter name")?.lexeme);
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RParen, "expected `)` after parameters")?;
        Ok(params)
    }

    fn parse_condition(&mut self, keyword: &str) -> Result<Expr, Diagnostic> {
        self.consume(TokenKind::LParen, &format!("expected `(` after `{keyword}`"))?;
        let condition = self.parse_expression()?;
        self.consume(TokenKind::RParen, "expected `)` after condition")?;
        Ok(condition)
    }

    fn parse_if(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.advance().span.start;
        let condition = self.parse_condition("if")?;
        let then_branch = self.parse_statement()?;
        let mut end = then_branch.span.end;
        let else_branch = if self.matches_keyword(Keyword::Else) {
            let branch = self.parse_statement()?;
            end = branch.span.end;
            Some(Box::new(branch))
        } else {
            None
        };
        Ok(Stmt {
            kind: StmtKind::If {
                condition,
                then_branch: Box::new(then_branch),
                else_branch,
            },
            span: SourceSpan { start, end },
        })
    }

    fn parse_while(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.advance().span.start;
        let condition = self.parse_condition("while")?;
        let body = self.parse_statement()?;
        Ok(Stmt {
            span: SourceSpan {
                start,
                end: body.span.end,
            },
            kind: StmtKind::While {
                condition,
                body: Box::new(body),
            },
        })
    }

    fn parse_for(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.advance().span.start;
        self.consume(TokenKind::LParen, "expected `(` after `for`")?;
        let _ = self.matches_keyword(Keyword::Let);
        let binding = self.consume_identifier("expected loop variable")?;
        self.consume_keyword(Keyword::In, "expected `in` after loop variable")?;
        let iterable = self.parse_expression()?;
        self.consume(TokenKind::RParen, "expected `)` after loop header")?;
        let body = self.parse_statement()?;
        Ok(Stmt {
            span: SourceSpan {
                start,
                end: body.span.end,
            },
            kind: StmtKind::ForIn {
                binding: binding.lexeme,
                iterable,
                body: Box::new(body),
            },
        })
    }

    fn parse_return(&mut self) -> Result<Stmt, Diagnostic> {
        let keyword = self.advance();
        let value = if self.check(TokenKind::Semicolon)
            || self.check(TokenKind::RBrace)
            || self.check(TokenKind::Eof)
        {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.consume_optional_semicolon();
        let end = value
            .as_ref()
            .map_or(keyword.span.end, |expr| expr.span.end);
        Ok(Stmt {
            kind: StmtKind::Return(value),
            span: SourceSpan {
                start: keyword.span.start,
                end,
            },
        })
    }

    fn parse_expression_statement(&mut self) -> Result<Stmt, Diagnostic> {
        let expr = self.parse_expression()?;
        self.consume_optional_semicolon();
        Ok(Stmt {
            span: expr.span,
            kind: StmtKind::Expr(expr),
        })
    }

    fn parse_expression(&mut self) -> Result<Expr, Diagnostic> {
        self.nested(Self::parse_assignment)
    }

    fn parse_assignment(&mut self) -> Result<Expr, Diagnostic> {
        let target = self.parse_or()?;
        if self.check(TokenKind::Assign) {
            let equals = self.advance();
            let value = self.nested(Self::parse_assignment)?;
            return match target.kind {
                ExprKind::Variable(_) | ExprKind::Field { .. } | ExprKind::Index { .. } => {
                    Ok(Expr {
                        span: SourceSpan {
                            start: target.span.start,
                            end: value.span.end,
                        },
                        kind: ExprKind::Assign {
                            target: Box::new(target),
                            value: Box::new(value),
                        },
                    })
                }
                _ => Err(self.error(&equals, "invalid left-hand side in assignment")),
            };
        }
        Ok(target)
    }

    fn parse_or(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_and()?;
        while self.matches(TokenKind::DoublePipe) {
            let right = self.parse_and()?;
            expr = logical(LogicalOp::Or, expr, right);
        }
        Ok(expr)
    }

    fn parse_and(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_equality()?;
        while self.matches(TokenKind::DoubleAmpersand) {
            let right = self.parse_equality()?;
            expr = logical(LogicalOp::And, expr, right);
        }
        Ok(expr)
    }

    fn parse_equality(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_comparison()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::EqualEqual => BinaryOp::Equal,
                TokenKind::BangEqual => BinaryOp::NotEqual,
                _ => break,
            };
            self.advance();
            let right = self.parse_comparison()?;
            expr = binary(op, expr, right);
        }
        Ok(expr)
    }

    fn parse_comparison(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_term()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Less => BinaryOp::Less,
                TokenKind::LessEqual => BinaryOp::LessEqual,
                TokenKind::Greater => BinaryOp::Greater,
                TokenKind::GreaterEqual => BinaryOp::GreaterEqual,
                _ => break,
            };
            self.advance();
            let right = self.parse_term()?;
            expr = binary(op, expr, right);
        }
        Ok(expr)
    }

    fn parse_term(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_factor()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_factor()?;
            expr = binary(op, expr, right);
        }
        Ok(expr)
    }

    fn parse_factor(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_unary()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            expr = binary(op, expr, right);
        }
        Ok(expr)
    }

    fn parse_unary(&mut self) -> Result<Expr, Diagnostic> {
        let op = match self.peek_kind() {
            TokenKind::Minus => UnaryOp::Negate,
            TokenKind::Bang => UnaryOp::Not,
            _ => return self.parse_call(),
        };
        let start = self.advance().span.start;
        let operand = self.nested(Self::parse_unary)?;
        Ok(Expr {
            span: SourceSpan {
                start,
                end: operand.span.end,
            },
            kind: ExprKind::Unary {
                op,
                expr: Box::new(operand),
            },
        })
    }

    fn parse_call(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.matches(TokenKind::LParen) {
                let mut args = Vec::new();
                if !self.check(TokenKind::RParen) {
                    loop {
                        args.push(self.parse_expression()?);
                        if !self.matches(TokenKind::Comma) {
                            break;
                        }
                    }
                }
                let end = self
                    .consume(TokenKind::RParen, "expected `)` after arguments")?
                    .span
                    .end;
                expr = Expr {
                    span: SourceSpan {
                        start: expr.span.start,
                        end,
                    },
                    kind: ExprKind::Call {
                        callee: Box::new(expr),
                        args,
                    },
                };
            } else if self.matches(TokenKind::Dot) {
                let field = self.consume_property_name("expected property name after `.`")?;
                expr = Expr {
                    span: SourceSpan {
                        start: expr.span.start,
                        end: field.span.end,
                    },
                    kind: ExprKind::Field {
                        target: Box::new(expr),
                        field: field.lexeme,
                    },
                };
            } else if self.matches(TokenKind::LBracket) {
                let index = self.parse_expression()?;
                let end = self
                    .consume(TokenKind::RBracket, "expected `]` after index")?
                    .span
                    .end;
                expr = Expr {
                    span: SourceSpan {
                        start: expr.span.start,
                        end,
                    },
                    kind: ExprKind::Index {
                        target: Box::new(expr),
                        index: Box::new(index),
                    },
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, Diagnostic> {
        let token = self.advance();
        let kind = match &token.kind {
            TokenKind::Number => ExprKind::Literal(number_literal(&token)?),
            TokenKind::String => ExprKind::Literal(Literal::String(token.lexeme.clone())),
            TokenKind::Keyword(Keyword::True) => ExprKind::Literal(Literal::Bool(true)),
            TokenKind::Keyword(Keyword::False) => ExprKind::Literal(Literal::Bool(false)),
            TokenKind::Keyword(Keyword::Null) => ExprKind::Literal(Literal::Null),
            TokenKind::Identifier => ExprKind::Variable(token.lexeme.clone()),
            TokenKind::LParen => {
                let inner = self.parse_expression()?;
                let end = self
                    .consume(TokenKind::RParen, "expected `)` after expression")?
                    .span
                    .end;
                return Ok(Expr {
                    kind: inner.kind,
                    span: SourceSpan {
                        start: token.span.start,
                        end,
                    },
                });
            }
            TokenKind::LBracket => return self.parse_array_literal(token.span.start),
            TokenKind::LBrace => return self.parse_object_literal(token.span.start),
            TokenKind::Keyword(Keyword::Function) => {
                let name = if self.check(TokenKind::Identifier) {
                    Some(self.advance().lexeme)
                } else {
                    None
                };
                let params = self.parse_params()?;
                let (body, span) = self.parse_block()?;
                return Ok(Expr {
                    kind: ExprKind::Function {
                        name,
                        params,
                        body: Rc::from(body),
                    },
                    span: SourceSpan {
                        start: token.span.start,
                        end: span.end,
                    },
                });
            }
            TokenKind::Eof => return Err(self.error(&token, "unexpected end of input")),
            _ => {
                return Err(self.error(
                    &token,
                    &format!("unexpected token `{}`", token.lexeme),
                ));
            }
        };
        Ok(Expr {
            kind,
            span: token.span,
        })
    }

    fn parse_array_literal(&mut self, start: usize) -> Result<Expr, Diagnostic> {
        let mut elements = Vec::new();
        while !self.check(TokenKind::RBracket) {
            elements.push(self.parse_expression()?);
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        let end = self
            .consume(TokenKind::RBracket, "expected `]` after array elements")?
            .span
            .end;
        Ok(Expr {
            kind: ExprKind::ArrayLiteral(elements),
            span: SourceSpan { start, end },
        })
    }

    fn parse_object_literal(&mut self, start: usize) -> Result<Expr, Diagnostic> {
        let mut entries = Vec::new();
        while !self.check(TokenKind::RBrace) {
            let key = self.consume_property_name("expected property name in object literal")?;
            self.consume(TokenKind::Colon, "expected `:` after property name")?;
            let value = self.parse_expression()?;
            entries.push((key.lexeme, value));
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        let end = self
            .consume(TokenKind::RBrace, "expected `}` after object properties")?
            .span
            .end;
        Ok(Expr {
            kind: ExprKind::ObjectLiteral(entries),
            span: SourceSpan { start, end },
        })
    }

    fn consume_optional_semicolon(&mut self) {
        let _ = self.matches(TokenKind::Semicolon);
    }

    fn matches(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn matches_keyword(&mut self, keyword: Keyword) -> bool {
        self.matches(TokenKind::Keyword(keyword))
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> Result<Token, Diagnostic> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error(self.peek(), message))
        }
    }

    fn consume_keyword(&mut self, keyword: Keyword, message: &str) -> Result<Token, Diagnostic> {
        self.consume(TokenKind::Keyword(keyword), message)
    }

    fn consume_identifier(&mut self, message: &str) -> Result<Token, Diagnostic> {
        self.consume(TokenKind::Identifier, message)
    }

    /// Property names may be identifiers, keywords or string literals.
    fn consume_property_name(&mut self, message: &str) -> Result<Token, Diagnostic> {
        match self.peek_kind() {
            TokenKind::Identifier | TokenKind::Keyword(_) | TokenKind::String => Ok(self.advance()),
            _ => Err(self.error(self.peek(), message)),
        }
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind.clone()
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.current += 1;
        }
        token
    }

    /// The lexer always terminates the stream with `Eof`, which is never
    /// consumed, so the cursor stays in bounds.
    fn peek(&self) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.current.min(last)]
    }

    fn error(&self, token: &Token, message: &str) -> Diagnostic {
        Diagnostic::new(DiagnosticKind::Parser, message.to_string()).with_span(token.span)
    }
}

fn number_literal(token: &Token) -> Result<Literal, Diagnostic> {
    let text = &token.lexeme;
    if !text.contains(['.', 'e', 'E']) {
        if let Ok(value) = text.parse::<i64>() {
            return Ok(Literal::Int(value));
        }
    }
    text.parse::<f64>().map(Literal::Double).map_err(|_| {
        Diagnostic::new(
            DiagnosticKind::Lexer,
            format!("invalid number literal `{text}`"),
        )
        .with_span(token.span)
    })
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr {
        span: SourceSpan {
            start: left.span.start,
            end: right.span.end,
        },
        kind: ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
    }
}

fn logical(op: LogicalOp, left: Expr, right: Expr) -> Expr {
    Expr {
        span: SourceSpan {
            start: left.span.start,
            end: right.span.end,
        },
        kind: ExprKind::Logical {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
    }
}
