//! AST builder: a Pratt parser over the token sequence.
//!
//! Precedence, low to high: comparison operators, addition/subtraction,
//! multiplication/division, unary minus, exponentiation (right-associative),
//! then atoms. Function calls are recognized when an identifier token is
//! immediately followed by a left bracket; argument counts are validated
//! against the function registry at parse time. Identifiers resolve in
//! order: registered constant, then function (call position only), then
//! variable reference.
//!
//! Type resolution happens during construction through the [`Expr`] smart
//! constructors, so the tree that leaves this module already carries unified
//! data types and explicit conversion nodes.

use crate::error::{CalcError, Result};
use crate::context::FunctionRegistry;
use crate::lexer::{Token, Tokenizer};
use crate::types::{BinaryOp, CompareOp, Expr, TokenKind};

/// Nesting limit; deeper formulas fail with `RecursionLimit` instead of
/// risking stack exhaustion.
const MAX_RECURSION_DEPTH: usize = 256;

/// Token binding powers.
#[derive(Debug, Clone, Copy)]
struct BindingPower {
    left: u8,
    right: u8,
}

impl BindingPower {
    // For left-associative operators, right binding power is left + 1
    const fn left_assoc(power: u8) -> Self {
        Self {
            left: power,
            right: power + 1,
        }
    }

    // For right-associative operators, right binding power equals left
    const fn right_assoc(power: u8) -> Self {
        Self {
            left: power,
            right: power,
        }
    }
}

const PREFIX_MINUS_POWER: u8 = 8;

/// Builds a typed AST from a token sequence.
pub struct AstBuilder<'a> {
    tokens: &'a [Token],
    pos: usize,
    registry: &'a FunctionRegistry,
    case_sensitive: bool,
    recursion_depth: usize,
}

impl<'a> AstBuilder<'a> {
    pub fn new(tokens: &'a [Token], registry: &'a FunctionRegistry, case_sensitive: bool) -> Self {
        Self {
            tokens,
            pos: 0,
            registry,
            case_sensitive,
            recursion_depth: 0,
        }
    }

    /// Parse the whole token sequence into one expression. Trailing tokens
    /// are an error.
    pub fn build(mut self) -> Result<Expr> {
        if self.tokens.is_empty() {
            return Err(CalcError::EmptyInput);
        }
        let expr = self.parse_expr(0)?;
        if let Some(tok) = self.peek() {
            return Err(unexpected(tok));
        }
        Ok(expr)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&Token> {
        let tok = self.tokens.get(self.pos);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn end_position(&self) -> usize {
        self.tokens
            .last()
            .map(|t| t.position + t.length)
            .unwrap_or(0)
    }

    fn binding_power(op: &str) -> Option<BindingPower> {
        match op {
            "<" | ">" | "<=" | ">=" | "==" | "!=" => Some(BindingPower::left_assoc(2)),
            "+" | "-" => Some(BindingPower::left_assoc(4)),
            "*" | "/" => Some(BindingPower::left_assoc(6)),
            "^" => Some(BindingPower::right_assoc(9)),
            _ => None,
        }
    }

    fn parse_expr(&mut self, min_bp: u8) -> Result<Expr> {
        self.recursion_depth += 1;
        if self.recursion_depth > MAX_RECURSION_DEPTH {
            self.recursion_depth -= 1;
            return Err(CalcError::RecursionLimit {
                limit: MAX_RECURSION_DEPTH,
            });
        }

        let mut lhs = self.parse_prefix()?;

        loop {
            let op = match self.peek() {
                Some(tok) if tok.kind == TokenKind::Operator => {
                    tok.text.as_deref().unwrap_or("").to_string()
                }
                _ => break,
            };
            let Some(bp) = Self::binding_power(&op) else {
                break;
            };
            if bp.left < min_bp {
                break;
            }
            self.next();

            // Right-associative exponentiation recurses with its own right
            // binding power minus one so `2^3^2` groups as `2^(3^2)`.
            let rhs = if op == "^" {
                self.parse_expr(bp.right - 1)?
            } else {
                self.parse_expr(bp.right)?
            };

            lhs = match op.as_str() {
                "+" => Expr::binary(BinaryOp::Add, lhs, rhs),
                "-" => Expr::binary(BinaryOp::Sub, lhs, rhs),
                "*" => Expr::binary(BinaryOp::Mul, lhs, rhs),
                "/" => Expr::binary(BinaryOp::Div, lhs, rhs),
                "^" => Expr::binary(BinaryOp::Pow, lhs, rhs),
                "<" => Expr::compare(CompareOp::Lt, lhs, rhs),
                ">" => Expr::compare(CompareOp::Gt, lhs, rhs),
                "<=" => Expr::compare(CompareOp::Le, lhs, rhs),
                ">=" => Expr::compare(CompareOp::Ge, lhs, rhs),
                "==" => Expr::compare(CompareOp::Eq, lhs, rhs),
                "!=" => Expr::compare(CompareOp::Ne, lhs, rhs),
                _ => unreachable!("binding_power only accepts known operators"),
            };
        }

        self.recursion_depth -= 1;
        Ok(lhs)
    }

    fn parse_prefix(&mut self) -> Result<Expr> {
        let sign = match self.peek() {
            Some(tok) if tok.kind == TokenKind::Operator => match tok.text.as_deref() {
                Some("-") => Some('-'),
                Some("+") => Some('+'),
                _ => None,
            },
            _ => None,
        };
        match sign {
            Some('-') => {
                self.next();
                let rhs = self.parse_expr(PREFIX_MINUS_POWER)?;
                Ok(Expr::negate(rhs))
            }
            Some('+') => {
                // Unary plus is a no-op.
                self.next();
                self.parse_expr(PREFIX_MINUS_POWER)
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let end = self.end_position();
        let Some(tok) = self.next() else {
            return Err(CalcError::UnexpectedToken {
                position: end,
                found: "end of formula".to_string(),
            });
        };

        match tok.kind {
            TokenKind::Integer | TokenKind::FloatingPoint => {
                let value = tok.value.ok_or(CalcError::Internal(
                    "number token without value",
                ))?;
                Ok(Expr::constant(value))
            }
            TokenKind::Identifier => {
                let text = tok.text.clone().unwrap_or_default();
                let name = self.fold(&text);
                if matches!(self.peek(), Some(t) if t.kind == TokenKind::LeftBracket) {
                    return self.parse_call(name);
                }
                if let Some(info) = self.registry.constant_info(&name) {
                    return Ok(Expr::float(info.value));
                }
                Ok(Expr::variable(name))
            }
            TokenKind::LeftBracket => {
                let open_position = tok.position;
                let expr = self.parse_expr(0)?;
                match self.next() {
                    Some(t) if t.kind == TokenKind::RightBracket => Ok(expr),
                    Some(t) => Err(unexpected(t)),
                    None => Err(CalcError::MissingClosingBracket {
                        position: open_position,
                    }),
                }
            }
            _ => Err(unexpected(tok)),
        }
    }

    /// Parse `name(arg, arg, ...)` with the left bracket as the current
    /// token. The name must be a registered function and the argument count
    /// must match its declared arity.
    fn parse_call(&mut self, name: String) -> Result<Expr> {
        let Some(info) = self.registry.function_info(&name) else {
            return Err(CalcError::UnknownFunction { name });
        };
        let expected = info.arity;
        let pure = info.pure;

        let open = self.next().ok_or(CalcError::Internal(
            "call parsed without left bracket",
        ))?;
        let open_position = open.position;

        let mut args = Vec::new();
        if matches!(self.peek(), Some(t) if t.kind == TokenKind::RightBracket) {
            self.next();
        } else {
            loop {
                args.push(self.parse_expr(0)?);
                match self.next() {
                    Some(t) if t.kind == TokenKind::ArgumentSeparator => continue,
                    Some(t) if t.kind == TokenKind::RightBracket => break,
                    Some(t) => return Err(unexpected(t)),
                    None => {
                        return Err(CalcError::MissingClosingBracket {
                            position: open_position,
                        });
                    }
                }
            }
        }

        if args.len() != expected {
            return Err(CalcError::ArgumentCountMismatch {
                name,
                expected,
                found: args.len(),
            });
        }
        Ok(Expr::call(name, args, pure))
    }

    /// Apply the engine's case rule to an identifier.
    fn fold(&self, name: &str) -> String {
        if self.case_sensitive {
            name.to_string()
        } else {
            name.to_ascii_lowercase()
        }
    }
}

fn unexpected(tok: &Token) -> CalcError {
    CalcError::UnexpectedToken {
        position: tok.position,
        found: tok
            .text
            .clone()
            .unwrap_or_else(|| "unknown".to_string()),
    }
}

/// Tokenize and parse a formula in one step.
pub fn parse_formula(
    formula: &str,
    registry: &FunctionRegistry,
    decimal_separator: char,
    case_sensitive: bool,
) -> Result<Expr> {
    let tokens = Tokenizer::new(decimal_separator).read(formula)?;
    AstBuilder::new(&tokens, registry, case_sensitive).build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DataType, ExprKind, Value};

    fn parse(formula: &str) -> Result<Expr> {
        parse_formula(formula, &FunctionRegistry::with_defaults(), '.', true)
    }

    #[test]
    fn test_precedence_mul_over_add() {
        let ast = parse("2+3*7").unwrap();
        match ast.kind() {
            ExprKind::Binary { op, right, .. } => {
                assert_eq!(*op, BinaryOp::Add);
                assert!(matches!(
                    right.kind(),
                    ExprKind::Binary {
                        op: BinaryOp::Mul,
                        ..
                    }
                ));
            }
            other => panic!("expected addition at root, got {other:?}"),
        }
    }

    #[test]
    fn test_brackets_override_precedence() {
        let ast = parse("(2+3)*7").unwrap();
        assert!(matches!(
            ast.kind(),
            ExprKind::Binary {
                op: BinaryOp::Mul,
                ..
            }
        ));
    }

    #[test]
    fn test_subtraction_left_associative() {
        // 2-3-4 must group as (2-3)-4
        let ast = parse("2-3-4").unwrap();
        match ast.kind() {
            ExprKind::Binary { op, left, right } => {
                assert_eq!(*op, BinaryOp::Sub);
                assert!(matches!(
                    left.kind(),
                    ExprKind::Binary {
                        op: BinaryOp::Sub,
                        ..
                    }
                ));
                assert!(matches!(right.kind(), ExprKind::Constant(Value::Integer(4))));
            }
            other => panic!("expected subtraction at root, got {other:?}"),
        }
    }

    #[test]
    fn test_exponentiation_right_associative() {
        let ast = parse("2^3^2").unwrap();
        fn pow_depth(e: &Expr) -> usize {
            match e.kind() {
                ExprKind::Binary {
                    op: BinaryOp::Pow,
                    right,
                    ..
                } => 1 + pow_depth(right),
                _ => 0,
            }
        }
        assert_eq!(pow_depth(&ast), 2);
    }

    #[test]
    fn test_unary_minus_binds_below_power() {
        // -2^2 parses as -(2^2)
        let ast = parse("-2^2").unwrap();
        match ast.kind() {
            ExprKind::Binary { op, left, right } => {
                assert_eq!(*op, BinaryOp::Sub);
                assert!(matches!(left.kind(), ExprKind::Constant(Value::Integer(0))));
                assert!(matches!(
                    right.kind(),
                    ExprKind::Binary {
                        op: BinaryOp::Pow,
                        ..
                    }
                ));
            }
            other => panic!("expected negation at root, got {other:?}"),
        }
    }

    #[test]
    fn test_integer_literals_build_integer_nodes() {
        let ast = parse("2+3").unwrap();
        assert_eq!(ast.data_type(), DataType::Integer);
    }

    #[test]
    fn test_mixed_literals_promote() {
        let ast = parse("2+3.5").unwrap();
        assert_eq!(ast.data_type(), DataType::FloatingPoint);
    }

    #[test]
    fn test_identifier_resolution_order() {
        // pi is a registered constant, x is not
        let pi = parse("pi").unwrap();
        assert!(matches!(pi.kind(), ExprKind::Constant(Value::Float(_))));
        let x = parse("x").unwrap();
        assert!(matches!(x.kind(), ExprKind::Variable(name) if name == "x"));
    }

    #[test]
    fn test_case_folding_applied_to_identifiers() {
        fn find_var(e: &Expr) -> Option<&str> {
            match e.kind() {
                ExprKind::Variable(name) => Some(name),
                ExprKind::Conversion { operand } => find_var(operand),
                ExprKind::Binary { left, right, .. } => {
                    find_var(left).or_else(|| find_var(right))
                }
                _ => None,
            }
        }
        let registry = FunctionRegistry::with_defaults();
        // PI resolves as the constant pi, VAR1 folds to var1
        let ast = parse_formula("VAR1 + PI", &registry, '.', false).unwrap();
        assert_eq!(find_var(&ast), Some("var1"));
        let sensitive = parse_formula("VAR1 + 1", &registry, '.', true).unwrap();
        assert_eq!(find_var(&sensitive), Some("VAR1"));
    }

    #[cfg(feature = "libm")]
    #[test]
    fn test_function_call_parses() {
        let ast = parse("sin(1)").unwrap();
        match ast.kind() {
            ExprKind::Call { name, args } => {
                assert_eq!(name, "sin");
                assert_eq!(args.len(), 1);
            }
            other => panic!("expected call, got {other:?}"),
        }
        assert_eq!(ast.data_type(), DataType::FloatingPoint);
    }

    #[cfg(feature = "libm")]
    #[test]
    fn test_function_arity_checked_at_parse_time() {
        assert_eq!(
            parse("sin(1, 2)").unwrap_err(),
            CalcError::ArgumentCountMismatch {
                name: "sin".to_string(),
                expected: 1,
                found: 2
            }
        );
    }

    #[test]
    fn test_unknown_function() {
        assert_eq!(
            parse("nope(1)").unwrap_err(),
            CalcError::UnknownFunction {
                name: "nope".to_string()
            }
        );
    }

    #[test]
    fn test_function_name_without_call_is_variable() {
        let ast = parse("max").unwrap();
        assert!(matches!(ast.kind(), ExprKind::Variable(name) if name == "max"));
    }

    #[test]
    fn test_missing_closing_bracket() {
        assert_eq!(
            parse("(2+3").unwrap_err(),
            CalcError::MissingClosingBracket { position: 0 }
        );
        assert_eq!(
            parse("max(1, 2").unwrap_err(),
            CalcError::MissingClosingBracket { position: 3 }
        );
    }

    #[test]
    fn test_unbalanced_closing_bracket() {
        assert!(matches!(
            parse("2+3)").unwrap_err(),
            CalcError::UnexpectedToken { position: 3, .. }
        ));
    }

    #[test]
    fn test_trailing_tokens_rejected() {
        assert!(matches!(
            parse("2 3").unwrap_err(),
            CalcError::UnexpectedToken { .. }
        ));
        assert!(matches!(
            parse("2x").unwrap_err(),
            CalcError::UnexpectedToken { .. }
        ));
    }

    #[test]
    fn test_dangling_operator_rejected() {
        assert!(matches!(
            parse("2+").unwrap_err(),
            CalcError::UnexpectedToken { .. }
        ));
        assert!(matches!(
            parse("2+*3").unwrap_err(),
            CalcError::UnexpectedToken { .. }
        ));
    }

    #[test]
    fn test_recursion_limit() {
        let mut formula = String::new();
        for _ in 0..600 {
            formula.push('(');
        }
        formula.push('1');
        for _ in 0..600 {
            formula.push(')');
        }
        assert_eq!(
            parse(&formula).unwrap_err(),
            CalcError::RecursionLimit { limit: 256 }
        );
    }

    #[test]
    fn test_comparison_yields_integer() {
        let ast = parse("1 <= 2").unwrap();
        assert_eq!(ast.data_type(), DataType::Integer);
        assert!(matches!(
            ast.kind(),
            ExprKind::Compare {
                op: CompareOp::Le,
                ..
            }
        ));
    }
}
