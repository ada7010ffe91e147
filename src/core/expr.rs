use std::{f64::consts, fmt, str::FromStr};

use error_stack::{Report, Result};

use crate::generator::Error;

/// A parsed arithmetic expression over a single variable.
///
/// The variable is `x` or `@`, or whatever a leading `lambda v:` names.
/// Supported: numeric literals, `+ - * / %`, `^` or `**` (right
/// associative), unary minus, parentheses, `pi`, `e` and the functions
/// `abs sqrt exp ln log10 floor ceil round min max pow`.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    root: Node,
    source: String,
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Num(f64),
    Var,
    Neg(Box<Node>),
    Binary(Op, Box<Node>, Box<Node>),
    Call(Func, Vec<Node>),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Func {
    Abs,
    Sqrt,
    Exp,
    Ln,
    Log10,
    Floor,
    Ceil,
    Round,
    Min,
    Max,
    Pow,
}

impl Func {
    fn lookup(name: &str) -> Option<Self> {
        Some(match name {
            "abs" => Self::Abs,
            "sqrt" => Self::Sqrt,
            "exp" => Self::Exp,
            "ln" | "log" => Self::Ln,
            "log10" => Self::Log10,
            "floor" => Self::Floor,
            "ceil" => Self::Ceil,
            "round" => Self::Round,
            "min" => Self::Min,
            "max" => Self::Max,
            "pow" => Self::Pow,
            _ => return None,
        })
    }

    const fn arity(self) -> usize {
        match self {
            Self::Min | Self::Max | Self::Pow => 2,
            _ => 1,
        }
    }

    fn apply(self, args: &[f64]) -> f64 {
        match (self, args) {
            (Self::Abs, [a]) => a.abs(),
            (Self::Sqrt, [a]) => a.sqrt(),
            (Self::Exp, [a]) => a.exp(),
            (Self::Ln, [a]) => a.ln(),
            (Self::Log10, [a]) => a.log10(),
            (Self::Floor, [a]) => a.floor(),
            (Self::Ceil, [a]) => a.ceil(),
            (Self::Round, [a]) => a.round(),
            (Self::Min, [a, b]) => a.min(*b),
            (Self::Max, [a, b]) => a.max(*b),
            (Self::Pow, [a, b]) => a.powf(*b),
            _ => f64::NAN,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Ident(String),
    Op(char),
    Pow,
    Open,
    Close,
    Comma,
}

fn tokenize(source: &str) -> std::result::Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();
    while let Some((start, c)) = chars.next() {
        match c {
            c if c.is_whitespace() => {}
            '0'..='9' | '.' => {
                let mut end = start + c.len_utf8();
                let mut prev = c;
                while let Some(&(i, next)) = chars.peek() {
                    let exponent_sign = matches!(next, '+' | '-') && matches!(prev, 'e' | 'E');
                    if next.is_ascii_digit() || matches!(next, '.' | 'e' | 'E') || exponent_sign {
                        end = i + next.len_utf8();
                        prev = next;
                        chars.next();
                    } else {
                        break;
                    }
                }
                let literal = &source[start..end];
                tokens.push(Token::Num(
                    literal
                        .parse()
                        .map_err(|_| format!("bad number {literal:?}"))?,
                ));
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut end = start + c.len_utf8();
                while let Some(&(i, next)) = chars.peek() {
                    if next.is_alphanumeric() || next == '_' {
                        end = i + next.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(source[start..end].to_string()));
            }
            '*' if chars.peek().is_some_and(|&(_, next)| next == '*') => {
                chars.next();
                tokens.push(Token::Pow);
            }
            '^' => tokens.push(Token::Pow),
            '+' | '-' | '*' | '/' | '%' => tokens.push(Token::Op(c)),
            '(' => tokens.push(Token::Open),
            ')' => tokens.push(Token::Close),
            ',' => tokens.push(Token::Comma),
            _ => return Err(format!("unexpected character {c:?}")),
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    var: &'a str,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.pos);
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: &Token) -> std::result::Result<(), String> {
        match self.bump() {
            Some(t) if t == expected => Ok(()),
            t => Err(format!("expected {expected:?}, found {t:?}")),
        }
    }

    fn sum(&mut self) -> std::result::Result<Node, String> {
        let mut lhs = self.product()?;
        while let Some(&Token::Op(c @ ('+' | '-'))) = self.peek() {
            self.pos += 1;
            let op = if c == '+' { Op::Add } else { Op::Sub };
            lhs = Node::Binary(op, Box::new(lhs), Box::new(self.product()?));
        }
        Ok(lhs)
    }

    fn product(&mut self) -> std::result::Result<Node, String> {
        let mut lhs = self.unary()?;
        while let Some(&Token::Op(c @ ('*' | '/' | '%'))) = self.peek() {
            self.pos += 1;
            let op = match c {
                '*' => Op::Mul,
                '/' => Op::Div,
                _ => Op::Rem,
            };
            lhs = Node::Binary(op, Box::new(lhs), Box::new(self.unary()?));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> std::result::Result<Node, String> {
        match self.peek() {
            Some(Token::Op('-')) => {
                self.pos += 1;
                Ok(Node::Neg(Box::new(self.unary()?)))
            }
            Some(Token::Op('+')) => {
                self.pos += 1;
                self.unary()
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> std::result::Result<Node, String> {
        let base = self.atom()?;
        if self.peek() == Some(&Token::Pow) {
            self.pos += 1;
            return Ok(Node::Binary(
                Op::Pow,
                Box::new(base),
                Box::new(self.unary()?),
            ));
        }
        Ok(base)
    }

    fn atom(&mut self) -> std::result::Result<Node, String> {
        let var = self.var;
        match self.bump().cloned() {
            Some(Token::Num(n)) => Ok(Node::Num(n)),
            Some(Token::Open) => {
                let inner = self.sum()?;
                self.expect(&Token::Close)?;
                Ok(inner)
            }
            Some(Token::Ident(name)) if name == var => Ok(Node::Var),
            Some(Token::Ident(name)) => {
                if let Some(func) = Func::lookup(&name) {
                    self.expect(&Token::Open)?;
                    let mut args = vec![self.sum()?];
                    while self.peek() == Some(&Token::Comma) {
                        self.pos += 1;
                        args.push(self.sum()?);
                    }
                    self.expect(&Token::Close)?;
                    if args.len() != func.arity() {
                        return Err(format!(
                            "{name} takes {} argument(s), got {}",
                            func.arity(),
                            args.len()
                        ));
                    }
                    return Ok(Node::Call(func, args));
                }
                match name.as_str() {
                    "pi" => Ok(Node::Num(consts::PI)),
                    "e" => Ok(Node::Num(consts::E)),
                    _ => Err(format!("unknown name {name:?}")),
                }
            }
            t => Err(format!("unexpected {t:?}")),
        }
    }
}

impl Expr {
    pub fn parse(source: &str) -> Result<Self, Error> {
        let invalid = |e: String| {
            Report::new(Error::InvalidParameter)
                .attach_printable(format!("Bad expression {source:?}: {e}"))
        };

        let trimmed = source.trim();
        let (var, body) = match trimmed.strip_prefix("lambda") {
            Some(rest) if rest.starts_with(char::is_whitespace) => {
                let (var, body) = rest
                    .split_once(':')
                    .ok_or_else(|| invalid("lambda without ':'".to_string()))?;
                (var.trim(), body)
            }
            _ => ("x", trimmed),
        };
        if var.is_empty() || !var.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(invalid(format!("bad variable name {var:?}")));
        }
        // `@` always refers to the row value
        let body = body.replace('@', var);

        let tokens = tokenize(&body).map_err(invalid)?;
        let mut parser = Parser {
            tokens: &tokens,
            pos: 0,
            var,
        };
        let root = parser.sum().map_err(invalid)?;
        if let Some(extra) = parser.peek() {
            return Err(invalid(format!("trailing {extra:?}")));
        }
        Ok(Self {
            root,
            source: source.to_string(),
        })
    }

    #[must_use]
    pub fn eval(&self, x: f64) -> f64 {
        eval(&self.root, x)
    }
}

fn eval(node: &Node, x: f64) -> f64 {
    match node {
        Node::Num(n) => *n,
        Node::Var => x,
        Node::Neg(inner) => -eval(inner, x),
        Node::Binary(op, lhs, rhs) => {
            let (l, r) = (eval(lhs, x), eval(rhs, x));
            match op {
                Op::Add => l + r,
                Op::Sub => l - r,
                Op::Mul => l * r,
                Op::Div => l / r,
                Op::Rem => l - r * (l / r).floor(),
                Op::Pow => l.powf(r),
            }
        }
        Node::Call(func, args) => {
            let args = args.iter().map(|a| eval(a, x)).collect::<Vec<_>>();
            func.apply(&args)
        }
    }
}

impl FromStr for Expr {
    type Err = Report<Error>;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("x", 3., 3.)]
    #[case("@ * 2 + 1", 3., 7.)]
    #[case("lambda v: (v - 3) / 2", 7., 2.)]
    #[case("lambda value:value*value", 4., 16.)]
    #[case("-x^2", 3., -9.)]
    #[case("2 ** 3 ** 2", 0., 512.)]
    #[case("2^-1", 0., 0.5)]
    #[case("10 - 4 - 3", 0., 3.)]
    #[case("x % 3", -1., 2.)]
    #[case("x % -3", 5., -1.)]
    #[case("7.5 % 2", 0., 1.5)]
    #[case("abs(x) + sqrt(16)", -2., 6.)]
    #[case("max(x, 0) + min(x, 0)", -5., -5.)]
    #[case("round(x * 10) / 10", 1.26, 1.3)]
    #[case("floor(x) + ceil(x)", 1.5, 3.)]
    #[case("pow(x, 2) + 1e2", 3., 109.)]
    #[case("1.5e-1 * x", 10., 1.5)]
    #[case("ln(e) + log10(1000)", 0., 4.)]
    #[case("lambda x: x + @", 2., 4.)]
    fn expressions_evaluate(#[case] source: &str, #[case] x: f64, #[case] expected: f64) {
        let value = Expr::parse(source).unwrap().eval(x);
        assert!((value - expected).abs() < 1e-12, "{source} at {x} = {value}");
    }

    #[test]
    fn pi_is_available() {
        let value = Expr::parse("pi * x").unwrap().eval(2.);
        assert!((value - std::f64::consts::TAU).abs() < 1e-12);
    }

    #[rstest]
    #[case("")]
    #[case("x +")]
    #[case("(x")]
    #[case("x)")]
    #[case("y + 1")]
    #[case("__import__('os')")]
    #[case("open(x)")]
    #[case("min(x)")]
    #[case("lambda : x")]
    #[case("lambda x x")]
    #[case("x; 1")]
    #[case("1..2")]
    fn junk_is_rejected(#[case] source: &str) {
        let e = Expr::parse(source).unwrap_err();
        assert!(matches!(e.current_context(), Error::InvalidParameter));
    }

    #[test]
    fn display_keeps_source() {
        assert_eq!(Expr::parse("x + 1").unwrap().to_string(), "x + 1");
    }
}
