use std::fmt::{self, Display};

use alloy::primitives::{Address, U256};
use argus_common::{
    ether::signatures::selector,
    utils::strings::{decode_hex, encode_hex},
    Error,
};
use argus_vm::core::{code::Instructions, opcodes::PUSH4};
use tracing::debug;

use crate::ContractDatabase;

/// A parsed search expression.
///
/// ```text
/// expr := term ("or" term)*
/// term := factor ("and" factor)*
/// factor := "not" factor | "(" expr ")" | "code#" INSTR ("," INSTR)* "#" | "func#" SIGNATURE "#"
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expression {
    /// The instructions appear consecutively in the code, e.g. `PUSH1 0x50`.
    Code(Vec<String>),
    /// The selector of the signature is pushed by a PUSH4.
    Function([u8; 4]),
    /// Both sides match.
    And(Box<Expression>, Box<Expression>),
    /// Either side matches.
    Or(Box<Expression>, Box<Expression>),
    /// The inner expression does not match.
    Not(Box<Expression>),
}

/// A contract that matched a search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    /// Address of the contract.
    pub address: Address,
    /// Balance recorded for it, in wei.
    pub balance: U256,
}

impl Display for Match {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x} (balance: {} wei)", self.address, self.balance)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Open,
    Close,
    And,
    Or,
    Not,
    Code(String),
    Function(String),
}

fn invalid(expression: &str, reason: impl Display) -> Error {
    Error::InvalidExpression(format!("'{expression}': {reason}"))
}

fn tokenize(expression: &str) -> Result<Vec<Token>, Error> {
    let mut tokens = Vec::new();
    let mut rest = expression.trim_start();

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix('(') {
            tokens.push(Token::Open);
            rest = after;
        } else if let Some(after) = rest.strip_prefix(')') {
            tokens.push(Token::Close);
            rest = after;
        } else if let Some(term) = ["code#", "func#"]
            .into_iter()
            .find(|prefix| rest.get(..5).is_some_and(|head| head.eq_ignore_ascii_case(prefix)))
        {
            let (body, after) = rest[5..]
                .split_once('#')
                .ok_or_else(|| invalid(expression, format!("unterminated '{term}'")))?;
            tokens.push(if term == "code#" {
                Token::Code(body.to_string())
            } else {
                Token::Function(body.trim().to_string())
            });
            rest = after;
        } else {
            let end = rest
                .find(|c: char| c.is_whitespace() || c == '(' || c == ')')
                .unwrap_or(rest.len());
            let word = &rest[..end];
            tokens.push(match word.to_lowercase().as_str() {
                "and" => Token::And,
                "or" => Token::Or,
                "not" => Token::Not,
                _ => return Err(invalid(expression, format!("unexpected '{word}'"))),
            });
            rest = &rest[end..];
        }

        // terms are only recognised at a word boundary
        if let Some(Token::Code(_) | Token::Function(_)) = tokens.last() {
            if rest.starts_with(|c: char| !c.is_whitespace() && c != ')') {
                return Err(invalid(expression, "expected whitespace after term"));
            }
        }
        rest = rest.trim_start();
    }

    Ok(tokens)
}

/// Normalize an instruction pattern to the form produced by [`instruction_lines`].
fn normalize_instruction(pattern: &str) -> Option<String> {
    let mut parts = pattern.split_whitespace();
    let mnemonic = parts.next()?.to_uppercase();
    let line = match parts.next() {
        Some(argument) => format!("{mnemonic} {}", argument.to_lowercase()),
        None => mnemonic,
    };
    parts.next().is_none().then_some(line)
}

struct Parser<'a> {
    expression: &'a str,
    tokens: Vec<Token>,
    position: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        self.position += 1;
        token
    }

    fn expr(&mut self) -> Result<Expression, Error> {
        let mut left = self.term()?;
        while self.peek() == Some(&Token::Or) {
            self.next();
            left = Expression::Or(Box::new(left), Box::new(self.term()?));
        }
        Ok(left)
    }

    fn term(&mut self) -> Result<Expression, Error> {
        let mut left = self.factor()?;
        while self.peek() == Some(&Token::And) {
            self.next();
            left = Expression::And(Box::new(left), Box::new(self.factor()?));
        }
        Ok(left)
    }

    fn factor(&mut self) -> Result<Expression, Error> {
        match self.next() {
            Some(Token::Not) => Ok(Expression::Not(Box::new(self.factor()?))),
            Some(Token::Open) => {
                let inner = self.expr()?;
                match self.next() {
                    Some(Token::Close) => Ok(inner),
                    _ => Err(invalid(self.expression, "missing ')'")),
                }
            }
            Some(Token::Code(body)) => {
                let instructions = body
                    .split(',')
                    .map(|pattern| {
                        normalize_instruction(pattern).ok_or_else(|| {
                            let reason = format!("bad instruction '{}'", pattern.trim());
                            invalid(self.expression, reason)
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Expression::Code(instructions))
            }
            Some(Token::Function(signature)) => {
                if signature.is_empty() {
                    return Err(invalid(self.expression, "empty function signature"));
                }
                let bytes = decode_hex(&selector(&signature))
                    .map_err(|e| invalid(self.expression, e))?;
                let mut function = [0u8; 4];
                function.copy_from_slice(&bytes[..4]);
                Ok(Expression::Function(function))
            }
            Some(token) => Err(invalid(self.expression, format!("unexpected {token:?}"))),
            None => Err(invalid(self.expression, "unexpected end of expression")),
        }
    }
}

/// The disassembly of `code` in the form search patterns are written in.
fn instruction_lines(code: &[u8]) -> Vec<String> {
    Instructions::new(code)
        .map(|instruction| match instruction.push_value() {
            Some(_) if !instruction.argument.is_empty() => {
                format!("{} 0x{}", instruction.name(), encode_hex(&instruction.argument))
            }
            _ => instruction.name().to_string(),
        })
        .collect()
}

/// Precomputed view of one contract that expressions are evaluated against.
struct Haystack {
    lines: Vec<String>,
    selectors: Vec<[u8; 4]>,
}

impl Haystack {
    fn new(code: &[u8]) -> Self {
        let selectors = Instructions::new(code)
            .filter(|instruction| instruction.opcode == PUSH4 && instruction.argument.len() == 4)
            .map(|instruction| {
                let mut selector = [0u8; 4];
                selector.copy_from_slice(&instruction.argument);
                selector
            })
            .collect();
        Self { lines: instruction_lines(code), selectors }
    }
}

impl Expression {
    /// Parse a search expression.
    ///
    /// ```
    /// use argus_db::Expression;
    ///
    /// let expression =
    ///     Expression::parse("code#PUSH1 0x50,POP# and not func#bar()#").expect("valid");
    /// assert!(matches!(expression, Expression::And(_, _)));
    /// assert!(Expression::parse("code#PUSH1 0x50").is_err());
    /// ```
    pub fn parse(expression: &str) -> Result<Self, Error> {
        let tokens = tokenize(expression)?;
        let mut parser = Parser { expression, tokens, position: 0 };
        let parsed = parser.expr()?;
        if parser.position != parser.tokens.len() {
            return Err(invalid(expression, "trailing input"));
        }
        Ok(parsed)
    }

    /// Whether `code` matches.
    pub fn matches(&self, code: &[u8]) -> bool {
        self.evaluate(&Haystack::new(code))
    }

    fn evaluate(&self, haystack: &Haystack) -> bool {
        match self {
            Expression::Code(needle) => {
                !needle.is_empty() &&
                    haystack.lines.windows(needle.len()).any(|window| window == needle.as_slice())
            }
            Expression::Function(selector) => haystack.selectors.contains(selector),
            Expression::And(left, right) => left.evaluate(haystack) && right.evaluate(haystack),
            Expression::Or(left, right) => left.evaluate(haystack) || right.evaluate(haystack),
            Expression::Not(inner) => !inner.evaluate(haystack),
        }
    }
}

/// Every contract in `database` matching `expression`, in address order.
pub fn search(database: &ContractDatabase, expression: &str) -> Result<Vec<Match>, Error> {
    let parsed = Expression::parse(expression)?;
    let matches = database
        .contracts
        .iter()
        .filter(|(_, contract)| parsed.evaluate(&Haystack::new(&contract.code)))
        .map(|(address, contract)| Match { address: *address, balance: contract.balance })
        .collect::<Vec<_>>();

    debug!("{} of {} contracts matched '{}'", matches.len(), database.contracts.len(), expression);
    Ok(matches)
}
