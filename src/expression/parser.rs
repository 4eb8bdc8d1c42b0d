use super::ast::{Accessor, BinaryOp, Node, UnaryOp};
use super::lexer::{Lexer, Token};
use super::ParseError;
use crate::json::{DynamicValue, Segment};

type Result<T> = std::result::Result<T, ParseError>;

/// Parse the binding whose `@{` starts at byte `start` of `src`
///
/// Returns the expression tree and the offset right after the closing `}`.
pub(crate) fn parse_binding(src: &str, start: usize) -> Result<(Node, usize)> {
    let mut parser = Parser {
        lexer: Lexer::new(src, start + 2),
        peeked: None,
        start,
        depth: 0,
    };

    if let Some((Token::CloseBrace, _)) = parser.peek()? {
        return Err(ParseError::Empty { offset: start });
    }

    let node = parser.expression()?;
    match parser.next()? {
        Some((Token::CloseBrace, _)) => Ok((node, parser.lexer.offset())),
        other => Err(parser.unexpected(other, start)),
    }
}

const EQUALITY: &[(Token, BinaryOp)] = &[(Token::EqEq, BinaryOp::Eq), (Token::NotEq, BinaryOp::Ne)];

const COMPARISON: &[(Token, BinaryOp)] = &[
    (Token::Lt, BinaryOp::Lt),
    (Token::LtEq, BinaryOp::Le),
    (Token::Gt, BinaryOp::Gt),
    (Token::GtEq, BinaryOp::Ge),
];

const ADDITIVE: &[(Token, BinaryOp)] = &[(Token::Plus, BinaryOp::Add), (Token::Minus, BinaryOp::Sub)];

const MULTIPLICATIVE: &[(Token, BinaryOp)] = &[
    (Token::Star, BinaryOp::Mul),
    (Token::Slash, BinaryOp::Div),
    (Token::Percent, BinaryOp::Rem),
];

const LEVELS: [&[(Token, BinaryOp)]; 4] = [EQUALITY, COMPARISON, ADDITIVE, MULTIPLICATIVE];

/// Maximum depth of the tree built for a single binding
const MAX_DEPTH: usize = 64;

struct Parser<'a> {
    lexer: Lexer<'a>,
    peeked: Option<(Token, usize)>,
    /// offset of the outermost `@{`
    start: usize,
    /// depth of the node being built
    depth: usize,
}

impl Parser<'_> {
    fn peek(&mut self) -> Result<Option<&(Token, usize)>> {
        if self.peeked.is_none() {
            self.peeked = self.lexer.next_token()?;
        }
        Ok(self.peeked.as_ref())
    }

    fn next(&mut self) -> Result<Option<(Token, usize)>> {
        match self.peeked.take() {
            Some(token) => Ok(Some(token)),
            None => self.lexer.next_token(),
        }
    }

    fn eat(&mut self, expected: &Token) -> Result<bool> {
        if matches!(self.peek()?, Some((token, _)) if token == expected) {
            self.peeked = None;
            return Ok(true);
        }
        Ok(false)
    }

    /// Build the error for a token that does not fit where it was found
    ///
    /// `opened_at` is the offset of the bracket or binding that was expected to be closed.
    fn unexpected(&self, found: Option<(Token, usize)>, opened_at: usize) -> ParseError {
        match found {
            None => ParseError::Unterminated { offset: self.start },
            Some((Token::RBracket | Token::RParen | Token::CloseBrace, _))
                if opened_at != self.start =>
            {
                ParseError::UnbalancedBrackets { offset: opened_at }
            }
            Some((Token::RBracket | Token::RParen, offset)) => {
                ParseError::UnbalancedBrackets { offset }
            }
            Some((token, offset)) => ParseError::UnexpectedToken {
                found: token.to_string(),
                offset,
            },
        }
    }

    /// Account for one more level in the tree being built
    fn descend(&mut self) -> Result<()> {
        if self.depth >= MAX_DEPTH {
            return Err(ParseError::TooDeep {
                offset: self.lexer.offset(),
            });
        }
        self.depth += 1;
        Ok(())
    }

    fn expression(&mut self) -> Result<Node> {
        self.conditional()
    }

    fn conditional(&mut self) -> Result<Node> {
        self.descend()?;
        let node = self.ternary();
        self.depth -= 1;
        node
    }

    fn ternary(&mut self) -> Result<Node> {
        let condition = self.or()?;
        if !self.eat(&Token::Question)? {
            return Ok(condition);
        }
        let then = self.conditional()?;
        match self.next()? {
            Some((Token::Colon, _)) => {}
            None => return Err(ParseError::Unterminated { offset: self.start }),
            Some((token, offset)) => {
                return Err(ParseError::UnexpectedToken {
                    found: token.to_string(),
                    offset,
                })
            }
        }
        let otherwise = self.conditional()?;
        Ok(Node::Conditional {
            condition: Box::new(condition),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        })
    }

    fn or(&mut self) -> Result<Node> {
        let depth = self.depth;
        let mut lhs = self.and()?;
        while self.eat(&Token::OrOr)? {
            self.descend()?;
            let rhs = self.and()?;
            lhs = binary(BinaryOp::Or, lhs, rhs);
        }
        self.depth = depth;
        Ok(lhs)
    }

    fn and(&mut self) -> Result<Node> {
        let depth = self.depth;
        let mut lhs = self.level(0)?;
        while self.eat(&Token::AndAnd)? {
            self.descend()?;
            let rhs = self.level(0)?;
            lhs = binary(BinaryOp::And, lhs, rhs);
        }
        self.depth = depth;
        Ok(lhs)
    }

    /// Left associative binary levels, from equality down to multiplication
    fn level(&mut self, depth: usize) -> Result<Node> {
        let table = LEVELS[depth];
        let operand = |parser: &mut Self| {
            if depth + 1 < LEVELS.len() {
                parser.level(depth + 1)
            } else {
                parser.unary()
            }
        };

        let start_depth = self.depth;
        let mut lhs = operand(self)?;
        loop {
            let op = match self.peek()? {
                Some((token, _)) => table
                    .iter()
                    .find(|(candidate, _)| candidate == token)
                    .map(|(_, op)| *op),
                None => None,
            };
            let Some(op) = op else {
                break;
            };
            self.peeked = None;
            // each operator in a chain wraps the left operand one level deeper
            self.descend()?;
            let rhs = operand(self)?;
            lhs = binary(op, lhs, rhs);
        }
        self.depth = start_depth;
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Node> {
        if self.eat(&Token::Bang)? {
            self.descend()?;
            let operand = self.unary();
            self.depth -= 1;
            let operand = operand?;
            return Ok(Node::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        if self.eat(&Token::Minus)? {
            self.descend()?;
            let operand = self.unary();
            self.depth -= 1;
            let operand = operand?;
            return Ok(match operand {
                Node::Literal(DynamicValue::Int(i)) if i != i64::MIN => {
                    Node::Literal(DynamicValue::Int(-i))
                }
                Node::Literal(DynamicValue::Double(d)) => Node::Literal(DynamicValue::Double(-d)),
                operand => Node::Unary {
                    op: UnaryOp::Neg,
                    operand: Box::new(operand),
                },
            });
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Node> {
        let Some((token, offset)) = self.next()? else {
            return Err(ParseError::Unterminated { offset: self.start });
        };
        match token {
            Token::Int(i) => Ok(Node::Literal(DynamicValue::Int(i))),
            Token::Double(d) => Ok(Node::Literal(DynamicValue::Double(d))),
            Token::Str(s) => Ok(Node::Literal(DynamicValue::String(s))),
            Token::True => Ok(Node::Literal(DynamicValue::Bool(true))),
            Token::False => Ok(Node::Literal(DynamicValue::Bool(false))),
            Token::Null => Ok(Node::Literal(DynamicValue::Null)),
            Token::Ident(context) => self.path(context),
            Token::LParen => {
                let node = self.expression()?;
                match self.next()? {
                    Some((Token::RParen, _)) => Ok(node),
                    other => Err(self.unexpected(other, offset)),
                }
            }
            Token::OpenBinding => {
                let node = self.expression()?;
                match self.next()? {
                    Some((Token::CloseBrace, _)) => Ok(node),
                    other => Err(self.unexpected(other, offset)),
                }
            }
            Token::RBracket | Token::RParen => Err(ParseError::UnbalancedBrackets { offset }),
            token => Err(ParseError::UnexpectedToken {
                found: token.to_string(),
                offset,
            }),
        }
    }

    fn path(&mut self, context: String) -> Result<Node> {
        let mut accessors = Vec::new();
        loop {
            match self.peek()? {
                Some((Token::Dot, _)) => {
                    self.peeked = None;
                    let field = match self.next()? {
                        Some((Token::Ident(name), _)) => name,
                        Some((Token::True, _)) => "true".to_owned(),
                        Some((Token::False, _)) => "false".to_owned(),
                        Some((Token::Null, _)) => "null".to_owned(),
                        None => return Err(ParseError::Unterminated { offset: self.start }),
                        Some((_, offset)) => {
                            return Err(ParseError::MalformedPath {
                                offset,
                                reason: "expected a field name after '.'",
                            })
                        }
                    };
                    accessors.push(Accessor::Static(Segment::Key(field)));
                }
                Some((Token::LBracket, open)) => {
                    let open = *open;
                    self.peeked = None;
                    if let Some((Token::RBracket, offset)) = self.peek()? {
                        return Err(ParseError::MalformedPath {
                            offset: *offset,
                            reason: "empty brackets",
                        });
                    }
                    let inner = self.expression()?;
                    match self.next()? {
                        Some((Token::RBracket, _)) => {}
                        other => return Err(self.unexpected(other, open)),
                    }
                    accessors.push(accessor(inner, open)?);
                }
                _ => break,
            }
        }
        Ok(Node::Path { context, accessors })
    }
}

fn binary(op: BinaryOp, lhs: Node, rhs: Node) -> Node {
    Node::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

fn accessor(inner: Node, offset: usize) -> Result<Accessor> {
    match inner {
        Node::Literal(DynamicValue::Int(i)) => usize::try_from(i)
            .map(|i| Accessor::Static(Segment::Index(i)))
            .map_err(|_| ParseError::MalformedPath {
                offset,
                reason: "negative index",
            }),
        Node::Literal(DynamicValue::String(key)) => Ok(Accessor::Static(Segment::Key(key))),
        Node::Literal(_) => Err(ParseError::MalformedPath {
            offset,
            reason: "brackets expect an index or a quoted key",
        }),
        dynamic => Ok(Accessor::Dynamic(Box::new(dynamic))),
    }
}
