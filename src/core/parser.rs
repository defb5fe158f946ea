//! Expression parser: tokenize, shunting-yard to postfix, build the tree.
//!
//! Grammar: numbers (`12`, `2.5`), the binary operators `+ - * /` with the
//! usual precedence, parentheses, and whitespace anywhere between tokens.
//! Every failure is reported as `Error::InvalidExpression`; no partial tree
//! is ever returned.

use crate::core::ast::{Ast, AstBuilder};
use crate::core::operator::Operator;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Number(f64),
    Op(Operator),
    LParen,
    RParen,
}

/// Parse `text` into an operation tree.
///
/// # Errors
/// Returns `Error::InvalidExpression` on empty input, unknown characters,
/// malformed numbers, unbalanced parentheses or misplaced operators/operands.
pub fn parse(text: &str) -> Result<Ast> {
    let tokens = tokenize(text)?;
    if tokens.is_empty() {
        return Err(Error::invalid("empty expression"));
    }
    let postfix = to_postfix(&tokens)?;
    build_tree(&postfix)
}

fn tokenize(text: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = text.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c.is_ascii_digit() || c == '.' {
            let mut end = start;
            while let Some(&(i, d)) = chars.peek() {
                if d.is_ascii_digit() || d == '.' {
                    end = i + d.len_utf8();
                    chars.next();
                } else {
                    break;
                }
            }
            let literal = &text[start..end];
            let value = literal
                .parse::<f64>()
                .map_err(|_| Error::invalid(format!("malformed number '{}'", literal)))?;
            if !value.is_finite() {
                return Err(Error::invalid("number out of range"));
            }
            tokens.push(Token::Number(value));
        } else {
            let token = match c {
                '(' => Token::LParen,
                ')' => Token::RParen,
                _ => Token::Op(Operator::from_char(c).ok_or_else(|| {
                    Error::invalid(format!("unknown token '{}' at position {}", c, start))
                })?),
            };
            tokens.push(token);
            chars.next();
        }
    }

    Ok(tokens)
}

/// Shunting-yard conversion to postfix order.
///
/// Also checks that operands and operators alternate, which rejects inputs
/// such as `2 3 +`, `()` or a trailing operator that plain shunting-yard
/// would let through.
fn to_postfix(tokens: &[Token]) -> Result<Vec<Token>> {
    let mut output = Vec::with_capacity(tokens.len());
    let mut stack: Vec<Token> = Vec::new();
    let mut expect_operand = true;

    for &token in tokens {
        match token {
            Token::Number(_) => {
                if !expect_operand {
                    return Err(Error::invalid("missing operator between operands"));
                }
                output.push(token);
                expect_operand = false;
            }
            Token::LParen => {
                if !expect_operand {
                    return Err(Error::invalid("missing operator before '('"));
                }
                stack.push(token);
            }
            Token::RParen => {
                if expect_operand {
                    return Err(Error::invalid("missing operand before ')'"));
                }
                loop {
                    match stack.pop() {
                        Some(Token::LParen) => break,
                        Some(op) => output.push(op),
                        None => return Err(Error::invalid("unbalanced parentheses")),
                    }
                }
            }
            Token::Op(op) => {
                if expect_operand {
                    return Err(Error::invalid(format!("missing operand before '{}'", op)));
                }
                while let Some(&Token::Op(top)) = stack.last() {
                    if top.precedence() < op.precedence() {
                        break;
                    }
                    output.push(Token::Op(top));
                    stack.pop();
                }
                stack.push(token);
                expect_operand = true;
            }
        }
    }

    if expect_operand {
        return Err(Error::invalid("expression ends without an operand"));
    }
    while let Some(token) = stack.pop() {
        if token == Token::LParen {
            return Err(Error::invalid("unbalanced parentheses"));
        }
        output.push(token);
    }

    Ok(output)
}

fn build_tree(postfix: &[Token]) -> Result<Ast> {
    let mut builder = AstBuilder::new();
    let mut operands = Vec::new();

    for &token in postfix {
        match token {
            Token::Number(value) => operands.push(builder.literal(value)),
            Token::Op(op) => {
                let (Some(right), Some(left)) = (operands.pop(), operands.pop()) else {
                    return Err(Error::invalid(format!("not enough operands for '{}'", op)));
                };
                operands.push(builder.operation(op, left, right));
            }
            Token::LParen | Token::RParen => {
                return Err(Error::invalid("unbalanced parentheses"));
            }
        }
    }

    match operands.as_slice() {
        [root] => Ok(builder.finish(*root)),
        [] => Err(Error::invalid("empty expression")),
        _ => Err(Error::invalid("too many operands")),
    }
}
