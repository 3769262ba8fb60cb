use crate::ast::{Ast, ControlKind, Literal, Node, NodeId};
use crate::dispatch::{AssignOp, BinaryOp, UnaryOp};
use crate::error::ParseError;
use crate::lexer::Token;
use std::slice::Iter;

pub struct Parser<'a> {
    tokens: Iter<'a, (Token, u32)>,
    line: u32,
    ast: Ast,
}

/// Parses a token stream into an arena and the id of its `Program` root.
pub fn parse(tokens: &[(Token, u32)]) -> Result<(Ast, NodeId), ParseError> {
    Parser::new(tokens).parse()
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [(Token, u32)]) -> Self {
        Self {
            tokens: tokens.iter(),
            line: 1,
            ast: Ast::new(),
        }
    }

    pub fn parse(mut self) -> Result<(Ast, NodeId), ParseError> {
        let mut actions = Vec::new();
        while self.peek_nth(0) != Token::EndOfFile {
            actions.push(self.parse_statement()?);
        }
        let body = self.ast.push(Node::Block { actions, line: 1 });
        let root = self.ast.push(Node::Program { body, line: 1 });
        Ok((self.ast, root))
    }

    fn parse_statement(&mut self) -> Result<NodeId, ParseError> {
        match self.peek_nth(0) {
            Token::If => self.parse_if_statement(),
            Token::While => self.parse_while_statement(),
            Token::For => self.parse_for_statement(),
            Token::Function => self.parse_function_statement(),
            Token::Return => self.parse_return_statement(),
            Token::Break => self.parse_control_statement(ControlKind::Break),
            Token::Continue => self.parse_control_statement(ControlKind::Continue),
            Token::Print => self.parse_print_statement(),
            _ => self.parse_assignment_or_expression(),
        }
    }

    fn parse_block(&mut self) -> Result<NodeId, ParseError> {
        let line = self.expect(Token::LeftBrace, "`{`")?;
        let mut actions = Vec::new();
        while self.peek_nth(0) != Token::RightBrace {
            if self.peek_nth(0) == Token::EndOfFile {
                return Err(ParseError::UnexpectedEof {
                    expected: "`}`".to_string(),
                });
            }
            actions.push(self.parse_statement()?);
        }
        self.expect(Token::RightBrace, "`}`")?;
        Ok(self.ast.push(Node::Block { actions, line }))
    }

    fn parse_if_statement(&mut self) -> Result<NodeId, ParseError> {
        let line = self.expect(Token::If, "`if`")?;
        let condition = self.parse_expression()?;
        let body = self.parse_block()?;
        let else_body = if self.peek_nth(0) == Token::Else {
            self.read_token();
            if self.peek_nth(0) == Token::If {
                Some(self.parse_if_statement()?)
            } else {
                Some(self.parse_block()?)
            }
        } else {
            None
        };
        Ok(self.ast.push(Node::If {
            condition,
            body,
            else_body,
            line,
        }))
    }

    fn parse_while_statement(&mut self) -> Result<NodeId, ParseError> {
        let line = self.expect(Token::While, "`while`")?;
        let condition = self.parse_expression()?;
        let body = self.parse_block()?;
        Ok(self.ast.push(Node::While {
            condition,
            body,
            line,
        }))
    }

    fn parse_for_statement(&mut self) -> Result<NodeId, ParseError> {
        let line = self.expect(Token::For, "`for`")?;
        self.expect(Token::LeftParentheses, "`(`")?;
        let (name, name_line) = self.expect_identifier()?;
        let iterator = self.ast.push(Node::Identifier {
            name,
            line: name_line,
        });
        self.expect(Token::In, "`in`")?;
        let range = self.parse_expression()?;
        self.expect(Token::RightParentheses, "`)`")?;
        let body = self.parse_block()?;
        Ok(self.ast.push(Node::For {
            iterator,
            range,
            body,
            line,
        }))
    }

    fn parse_function_statement(&mut self) -> Result<NodeId, ParseError> {
        let line = self.expect(Token::Function, "`function`")?;
        let (name, _) = self.expect_identifier()?;
        self.expect(Token::LeftParentheses, "`(`")?;
        let mut parameters = Vec::new();
        if self.peek_nth(0) != Token::RightParentheses {
            loop {
                let (parameter, parameter_line) = self.expect_identifier()?;
                parameters.push(self.ast.push(Node::Identifier {
                    name: parameter,
                    line: parameter_line,
                }));
                if self.peek_nth(0) != Token::Comma {
                    break;
                }
                self.read_token();
            }
        }
        self.expect(Token::RightParentheses, "`)`")?;
        let body = self.parse_block()?;
        Ok(self.ast.push(Node::Function {
            name,
            parameters,
            body,
            line,
        }))
    }

    fn parse_return_statement(&mut self) -> Result<NodeId, ParseError> {
        let line = self.expect(Token::Return, "`return`")?;
        let value = if self.peek_nth(0) == Token::Semicolon {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(Token::Semicolon, "`;`")?;
        Ok(self.ast.push(Node::Return { value, line }))
    }

    fn parse_control_statement(&mut self, kind: ControlKind) -> Result<NodeId, ParseError> {
        let (_, line) = self.read_token();
        self.expect(Token::Semicolon, "`;`")?;
        Ok(self.ast.push(Node::Control { kind, line }))
    }

    fn parse_print_statement(&mut self) -> Result<NodeId, ParseError> {
        let line = self.expect(Token::Print, "`print`")?;
        let mut arguments = vec![self.parse_expression()?];
        while self.peek_nth(0) == Token::Comma {
            self.read_token();
            arguments.push(self.parse_expression()?);
        }
        self.expect(Token::Semicolon, "`;`")?;
        Ok(self.ast.push(Node::Print { arguments, line }))
    }

    fn parse_assignment_or_expression(&mut self) -> Result<NodeId, ParseError> {
        let expression = self.parse_expression()?;
        let operator = match self.peek_nth(0) {
            Token::Assign => Some(AssignOp::Assign),
            Token::PlusAssign => Some(AssignOp::Add),
            Token::MinusAssign => Some(AssignOp::Sub),
            Token::AsteriskAssign => Some(AssignOp::Mul),
            Token::SlashAssign => Some(AssignOp::Div),
            Token::PercentAssign => Some(AssignOp::Rem),
            _ => None,
        };
        let statement = match operator {
            Some(operator) => {
                let (_, line) = self.read_token();
                if !matches!(
                    self.ast.node(expression),
                    Node::Identifier { .. } | Node::Subscription { .. }
                ) {
                    return Err(ParseError::BadAssignmentTarget { line });
                }
                let value = self.parse_expression()?;
                self.ast.push(Node::Assignment {
                    operator,
                    target: expression,
                    value,
                    line,
                })
            }
            None => expression,
        };
        self.expect(Token::Semicolon, "`;`")?;
        Ok(statement)
    }

    fn parse_expression(&mut self) -> Result<NodeId, ParseError> {
        let start = self.parse_logical()?;
        if self.peek_nth(0) == Token::Colon {
            let (_, line) = self.read_token();
            let end = self.parse_logical()?;
            return Ok(self.ast.push(Node::Range { start, end, line }));
        }
        Ok(start)
    }

    fn parse_logical(&mut self) -> Result<NodeId, ParseError> {
        let mut left = self.parse_relational()?;
        loop {
            let operator = match self.peek_nth(0) {
                Token::And => BinaryOp::And,
                Token::Or => BinaryOp::Or,
                Token::Xor => BinaryOp::Xor,
                _ => break,
            };
            let (_, line) = self.read_token();
            let right = self.parse_relational()?;
            left = self.ast.push(Node::Binary {
                operator,
                left,
                right,
                line,
            });
        }
        Ok(left)
    }

    fn parse_relational(&mut self) -> Result<NodeId, ParseError> {
        let mut left = self.parse_additive()?;
        loop {
            let operator = match self.peek_nth(0) {
                Token::Equal => BinaryOp::Equal,
                Token::NotEqual => BinaryOp::NotEqual,
                Token::LessThan => BinaryOp::Less,
                Token::LessEqual => BinaryOp::LessEqual,
                Token::GreaterThan => BinaryOp::Greater,
                Token::GreaterEqual => BinaryOp::GreaterEqual,
                _ => break,
            };
            let (_, line) = self.read_token();
            let right = self.parse_additive()?;
            left = self.ast.push(Node::Binary {
                operator,
                left,
                right,
                line,
            });
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<NodeId, ParseError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let operator = match self.peek_nth(0) {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                Token::DotPlus => BinaryOp::DotAdd,
                Token::DotMinus => BinaryOp::DotSub,
                _ => break,
            };
            let (_, line) = self.read_token();
            let right = self.parse_multiplicative()?;
            left = self.ast.push(Node::Binary {
                operator,
                left,
                right,
                line,
            });
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<NodeId, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            let operator = match self.peek_nth(0) {
                Token::Asterisk => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                Token::Percent => BinaryOp::Rem,
                Token::DotAsterisk => BinaryOp::DotMul,
                Token::DotSlash => BinaryOp::DotDiv,
                Token::DotPercent => BinaryOp::DotRem,
                _ => break,
            };
            let (_, line) = self.read_token();
            let right = self.parse_unary()?;
            left = self.ast.push(Node::Binary {
                operator,
                left,
                right,
                line,
            });
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<NodeId, ParseError> {
        let operator = match self.peek_nth(0) {
            Token::Minus => UnaryOp::Negate,
            Token::Not => UnaryOp::Not,
            _ => return self.parse_postfix(),
        };
        let (_, line) = self.read_token();
        let operand = self.parse_unary()?;
        Ok(self.ast.push(Node::Unary {
            operator,
            operand,
            line,
        }))
    }

    fn parse_postfix(&mut self) -> Result<NodeId, ParseError> {
        let mut expression = self.parse_primary()?;
        loop {
            match self.peek_nth(0) {
                Token::Apostrophe => {
                    let (_, line) = self.read_token();
                    expression = self.ast.push(Node::Unary {
                        operator: UnaryOp::Transpose,
                        operand: expression,
                        line,
                    });
                }
                Token::LeftBracket => {
                    let (_, line) = self.read_token();
                    let mut indices = vec![self.parse_expression()?];
                    while self.peek_nth(0) == Token::Comma {
                        self.read_token();
                        indices.push(self.parse_expression()?);
                    }
                    self.expect(Token::RightBracket, "`]`")?;
                    expression = self.ast.push(Node::Subscription {
                        source: expression,
                        indices,
                        line,
                    });
                }
                _ => break,
            }
        }
        Ok(expression)
    }

    fn parse_primary(&mut self) -> Result<NodeId, ParseError> {
        let (token, line) = self.read_token();
        let node = match token {
            Token::Integer(value) => Node::Literal {
                value: Literal::Int(value),
                line,
            },
            Token::Float(value) => Node::Literal {
                value: Literal::Float(value),
                line,
            },
            Token::True => Node::Literal {
                value: Literal::Bool(true),
                line,
            },
            Token::False => Node::Literal {
                value: Literal::Bool(false),
                line,
            },
            Token::Str(value) => Node::Literal {
                value: Literal::Str(value),
                line,
            },
            Token::Identifier(name) => {
                // Calls are by name only; a call never nests as a callee.
                if self.peek_nth(0) == Token::LeftParentheses {
                    self.read_token();
                    let mut arguments = Vec::new();
                    if self.peek_nth(0) != Token::RightParentheses {
                        arguments.push(self.parse_expression()?);
                        while self.peek_nth(0) == Token::Comma {
                            self.read_token();
                            arguments.push(self.parse_expression()?);
                        }
                    }
                    self.expect(Token::RightParentheses, "`)`")?;
                    Node::Call {
                        callee: name,
                        arguments,
                        line,
                    }
                } else {
                    Node::Identifier { name, line }
                }
            }
            Token::LeftParentheses => {
                let inner = self.parse_expression()?;
                self.expect(Token::RightParentheses, "`)`")?;
                return Ok(inner);
            }
            Token::LeftBracket => return self.parse_container(line),
            Token::EndOfFile => {
                return Err(ParseError::UnexpectedEof {
                    expected: "an expression".to_string(),
                })
            }
            found => {
                return Err(ParseError::UnexpectedToken {
                    found: format!("{:?}", found),
                    expected: "an expression".to_string(),
                    line,
                })
            }
        };
        Ok(self.ast.push(node))
    }

    /// Parses the remainder of a `[`-opened literal. A second `[` makes it
    /// a matrix of bracketed rows, anything else a flat vector.
    fn parse_container(&mut self, line: u32) -> Result<NodeId, ParseError> {
        if self.peek_nth(0) == Token::LeftBracket {
            let mut rows = Vec::new();
            loop {
                let (_, row_line) = self.read_token();
                let mut elements = vec![self.parse_expression()?];
                while self.peek_nth(0) == Token::Comma {
                    self.read_token();
                    elements.push(self.parse_expression()?);
                }
                self.expect(Token::RightBracket, "`]`")?;
                rows.push(self.ast.push(Node::Vector {
                    elements,
                    line: row_line,
                }));
                if self.peek_nth(0) != Token::Comma {
                    break;
                }
                self.read_token();
                if self.peek_nth(0) != Token::LeftBracket {
                    let (found, found_line) = self.read_token();
                    return Err(ParseError::UnexpectedToken {
                        found: format!("{:?}", found),
                        expected: "a matrix row".to_string(),
                        line: found_line,
                    });
                }
            }
            self.expect(Token::RightBracket, "`]`")?;
            Ok(self.ast.push(Node::Matrix { rows, line }))
        } else {
            let mut elements = Vec::new();
            if self.peek_nth(0) != Token::RightBracket {
                elements.push(self.parse_expression()?);
                while self.peek_nth(0) == Token::Comma {
                    self.read_token();
                    elements.push(self.parse_expression()?);
                }
            }
            self.expect(Token::RightBracket, "`]`")?;
            Ok(self.ast.push(Node::Vector { elements, line }))
        }
    }

    fn expect(&mut self, token: Token, expected: &str) -> Result<u32, ParseError> {
        let (found, line) = self.read_token();
        if found == token {
            Ok(line)
        } else if found == Token::EndOfFile {
            Err(ParseError::UnexpectedEof {
                expected: expected.to_string(),
            })
        } else {
            Err(ParseError::UnexpectedToken {
                found: format!("{:?}", found),
                expected: expected.to_string(),
                line,
            })
        }
    }

    fn expect_identifier(&mut self) -> Result<(String, u32), ParseError> {
        match self.read_token() {
            (Token::Identifier(name), line) => Ok((name, line)),
            (Token::EndOfFile, _) => Err(ParseError::UnexpectedEof {
                expected: "an identifier".to_string(),
            }),
            (found, line) => Err(ParseError::UnexpectedToken {
                found: format!("{:?}", found),
                expected: "an identifier".to_string(),
                line,
            }),
        }
    }

    fn read_token(&mut self) -> (Token, u32) {
        match self.tokens.next() {
            Some((token, line)) => {
                self.line = *line;
                (token.clone(), *line)
            }
            None => (Token::EndOfFile, self.line),
        }
    }

    fn peek_nth(&self, n: usize) -> Token {
        self.tokens
            .clone()
            .nth(n)
            .map(|(token, _)| token.clone())
            .unwrap_or(Token::EndOfFile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    fn parse_source(input: &str) -> Result<(Ast, NodeId), ParseError> {
        parse(&tokenize(input)?)
    }

    fn program_actions(ast: &Ast, root: NodeId) -> Vec<NodeId> {
        let Node::Program { body, .. } = ast.node(root) else {
            panic!("expected a program root");
        };
        let Node::Block { actions, .. } = ast.node(*body) else {
            panic!("expected a block body");
        };
        actions.clone()
    }

    #[test]
    fn test_assignment_statements() -> Result<(), ParseError> {
        let (ast, root) = parse_source("a = 1;\nb += a * 2;")?;
        let actions = program_actions(&ast, root);
        assert_eq!(actions.len(), 2);

        let Node::Assignment {
            operator, target, ..
        } = ast.node(actions[0])
        else {
            panic!("expected an assignment");
        };
        assert_eq!(*operator, AssignOp::Assign);
        assert_eq!(
            ast.node(*target),
            &Node::Identifier {
                name: "a".to_string(),
                line: 1
            }
        );

        let Node::Assignment {
            operator, value, ..
        } = ast.node(actions[1])
        else {
            panic!("expected an assignment");
        };
        assert_eq!(*operator, AssignOp::Add);
        assert!(matches!(
            ast.node(*value),
            Node::Binary {
                operator: BinaryOp::Mul,
                ..
            }
        ));
        Ok(())
    }

    #[test]
    fn test_precedence() -> Result<(), ParseError> {
        // 1 + 2 * 3 < 7 and true
        let (ast, root) = parse_source("x = 1 + 2 * 3 < 7 and true;")?;
        let actions = program_actions(&ast, root);
        let Node::Assignment { value, .. } = ast.node(actions[0]) else {
            panic!("expected an assignment");
        };
        let Node::Binary {
            operator: BinaryOp::And,
            left,
            ..
        } = ast.node(*value)
        else {
            panic!("expected `and` at the top");
        };
        let Node::Binary {
            operator: BinaryOp::Less,
            left,
            ..
        } = ast.node(*left)
        else {
            panic!("expected `<` under `and`");
        };
        let Node::Binary {
            operator: BinaryOp::Add,
            right,
            ..
        } = ast.node(*left)
        else {
            panic!("expected `+` under `<`");
        };
        assert!(matches!(
            ast.node(*right),
            Node::Binary {
                operator: BinaryOp::Mul,
                ..
            }
        ));
        Ok(())
    }

    #[test]
    fn test_containers() -> Result<(), ParseError> {
        let (ast, root) = parse_source("v = [1, 2, 3];\nm = [[1, 2], [3, 4]];\ne = [];")?;
        let actions = program_actions(&ast, root);

        let Node::Assignment { value, .. } = ast.node(actions[0]) else {
            panic!("expected an assignment");
        };
        let Node::Vector { elements, .. } = ast.node(*value) else {
            panic!("expected a vector literal");
        };
        assert_eq!(elements.len(), 3);

        let Node::Assignment { value, .. } = ast.node(actions[1]) else {
            panic!("expected an assignment");
        };
        let Node::Matrix { rows, .. } = ast.node(*value) else {
            panic!("expected a matrix literal");
        };
        assert_eq!(rows.len(), 2);
        for row in rows {
            assert!(matches!(ast.node(*row), Node::Vector { .. }));
        }

        let Node::Assignment { value, .. } = ast.node(actions[2]) else {
            panic!("expected an assignment");
        };
        assert!(matches!(ast.node(*value), Node::Vector { elements, .. } if elements.is_empty()));
        Ok(())
    }

    #[test]
    fn test_postfix_chain() -> Result<(), ParseError> {
        // transpose binds after subscription: m[1]' is (m[1])'
        let (ast, root) = parse_source("x = m[1, 2]';")?;
        let actions = program_actions(&ast, root);
        let Node::Assignment { value, .. } = ast.node(actions[0]) else {
            panic!("expected an assignment");
        };
        let Node::Unary {
            operator: UnaryOp::Transpose,
            operand,
            ..
        } = ast.node(*value)
        else {
            panic!("expected a transpose");
        };
        let Node::Subscription {
            source, indices, ..
        } = ast.node(*operand)
        else {
            panic!("expected a subscription");
        };
        assert_eq!(indices.len(), 2);
        assert!(matches!(ast.node(*source), Node::Identifier { name, .. } if name == "m"));
        Ok(())
    }

    #[test]
    fn test_control_flow() -> Result<(), ParseError> {
        let input = r#"
i = 0;
while i < 5 {
    if i == 3 { break; } else { i += 1; }
}
for (x in 1:4) { print x; }
function add(a, b) { return a + b; }
"#;
        let (ast, root) = parse_source(input)?;
        let actions = program_actions(&ast, root);
        assert_eq!(actions.len(), 4);
        assert!(matches!(ast.node(actions[1]), Node::While { .. }));

        let Node::While { body, .. } = ast.node(actions[1]) else {
            unreachable!();
        };
        let Node::Block {
            actions: inner, ..
        } = ast.node(*body)
        else {
            panic!("expected a block body");
        };
        let Node::If { else_body, .. } = ast.node(inner[0]) else {
            panic!("expected an if statement");
        };
        assert!(else_body.is_some());

        let Node::For { range, .. } = ast.node(actions[2]) else {
            panic!("expected a for statement");
        };
        assert!(matches!(ast.node(*range), Node::Range { .. }));

        let Node::Function {
            name, parameters, ..
        } = ast.node(actions[3])
        else {
            panic!("expected a function definition");
        };
        assert_eq!(name, "add");
        assert_eq!(parameters.len(), 2);
        Ok(())
    }

    #[test]
    fn test_call_expression() -> Result<(), ParseError> {
        let (ast, root) = parse_source("z = zeros(2, 3);")?;
        let actions = program_actions(&ast, root);
        let Node::Assignment { value, .. } = ast.node(actions[0]) else {
            panic!("expected an assignment");
        };
        let Node::Call {
            callee, arguments, ..
        } = ast.node(*value)
        else {
            panic!("expected a call");
        };
        assert_eq!(callee, "zeros");
        assert_eq!(arguments.len(), 2);
        Ok(())
    }

    #[test]
    fn test_bad_assignment_target() -> Result<(), ParseError> {
        let result = parse_source("1 + 2 = 3;");
        assert_eq!(result, Err(ParseError::BadAssignmentTarget { line: 1 }));
        Ok(())
    }
}
