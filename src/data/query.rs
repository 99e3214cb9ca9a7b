//! Row-selection expressions in the style of `DataFrame.query`.
//!
//! ```text
//! or      := and  (("or" | "|") and)*
//! and     := not  (("and" | "&") not)*
//! not     := "not" not | compare
//! compare := sum (cmp-op sum)* | sum ["not"] "in" "[" sum ("," sum)* "]"
//! sum     := product (("+" | "-") product)*
//! product := unary (("*" | "/" | "%") unary)*
//! unary   := ("-" | "+" | "~") unary | power
//! power   := atom ["**" unary]
//! atom    := number | True | False | name | `quoted name` | func "(" args ")" | "(" or ")"
//! ```
//!
//! `&` and `|` share the precedence of `and` and `or`, comparisons chain
//! (`0 < x <= 5`), and booleans compare as `0`/`1`.

use std::fmt;

use thiserror::Error;

use super::model::Table;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    #[error("unexpected character '{ch}' at position {pos}")]
    UnexpectedChar { ch: char, pos: usize },

    #[error("unterminated quoted name starting at position {0}")]
    UnterminatedName(usize),

    #[error("invalid number '{0}'")]
    InvalidNumber(String),

    #[error("unexpected {found} at position {pos}, expected {expected}")]
    UnexpectedToken {
        found: String,
        pos: usize,
        expected: &'static str,
    },

    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    #[error("function '{name}' takes {expected} argument(s), got {found}")]
    Arity {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("'{0}' needs conditions on both sides, not numbers")]
    NotACondition(&'static str),

    #[error("query evaluates to a number, not a condition")]
    NotAFilter,

    #[error("query refers to unknown column '{0}'")]
    UnknownColumn(String),
}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Number(f64),
    Ident(String),
    Quoted(String),
    Sym(&'static str),
    End,
}

impl fmt::Display for Tok {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tok::Number(n) => write!(f, "number {n}"),
            Tok::Ident(s) => write!(f, "'{s}'"),
            Tok::Quoted(s) => write!(f, "`{s}`"),
            Tok::Sym(s) => write!(f, "'{s}'"),
            Tok::End => write!(f, "end of query"),
        }
    }
}

const SYMBOLS: [&str; 20] = [
    "**", "==", "!=", "<=", ">=", "<", ">", "(", ")", "[", "]", ",", "+", "-", "*", "/", "%",
    "&", "|", "~",
];

fn tokenize(src: &str) -> Result<Vec<(Tok, usize)>, QueryError> {
    let chars: Vec<char> = src.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        let start = i;

        if c.is_ascii_digit() || (c == '.' && chars.get(i + 1).is_some_and(|d| d.is_ascii_digit())) {
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                let mut j = i + 1;
                if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
                    j += 1;
                }
                if j < chars.len() && chars[j].is_ascii_digit() {
                    i = j;
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                }
            }
            let text: String = chars[start..i].iter().collect();
            let value = text
                .parse::<f64>()
                .map_err(|_| QueryError::InvalidNumber(text.clone()))?;
            tokens.push((Tok::Number(value), start));
        } else if c.is_alphabetic() || c == '_' {
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            tokens.push((Tok::Ident(chars[start..i].iter().collect()), start));
        } else if c == '`' {
            let close = chars[i + 1..]
                .iter()
                .position(|&ch| ch == '`')
                .ok_or(QueryError::UnterminatedName(start))?;
            let name: String = chars[i + 1..i + 1 + close].iter().collect();
            i += close + 2;
            tokens.push((Tok::Quoted(name), start));
        } else {
            let rest: String = chars[i..(i + 2).min(chars.len())].iter().collect();
            let sym = SYMBOLS
                .iter()
                .find(|s| rest.starts_with(**s))
                .ok_or(QueryError::UnexpectedChar { ch: c, pos: start })?;
            i += sym.len();
            tokens.push((Tok::Sym(sym), start));
        }
    }
    tokens.push((Tok::End, chars.len()));
    Ok(tokens)
}

// ---------------------------------------------------------------------------
// Syntax tree
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
enum Arith {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Cmp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Cmp {
    fn from_sym(sym: &str) -> Option<Cmp> {
        Some(match sym {
            "==" => Cmp::Eq,
            "!=" => Cmp::Ne,
            "<" => Cmp::Lt,
            "<=" => Cmp::Le,
            ">" => Cmp::Gt,
            ">=" => Cmp::Ge,
            _ => return None,
        })
    }

    fn holds(self, a: f64, b: f64) -> bool {
        match self {
            Cmp::Eq => a == b,
            Cmp::Ne => a != b,
            Cmp::Lt => a < b,
            Cmp::Le => a <= b,
            Cmp::Gt => a > b,
            Cmp::Ge => a >= b,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Func {
    Abs,
    Sqrt,
    Exp,
    Log,
    Log10,
    Log1p,
    Sin,
    Cos,
    Tan,
    Arcsin,
    Arccos,
    Arctan,
    Arctan2,
}

impl Func {
    fn lookup(name: &str) -> Option<Func> {
        Some(match name {
            "abs" => Func::Abs,
            "sqrt" => Func::Sqrt,
            "exp" => Func::Exp,
            "log" => Func::Log,
            "log10" => Func::Log10,
            "log1p" => Func::Log1p,
            "sin" => Func::Sin,
            "cos" => Func::Cos,
            "tan" => Func::Tan,
            "arcsin" => Func::Arcsin,
            "arccos" => Func::Arccos,
            "arctan" => Func::Arctan,
            "arctan2" => Func::Arctan2,
            _ => return None,
        })
    }

    fn arity(self) -> usize {
        match self {
            Func::Arctan2 => 2,
            _ => 1,
        }
    }

    fn apply(self, args: &[f64]) -> f64 {
        let x = args[0];
        match self {
            Func::Abs => x.abs(),
            Func::Sqrt => x.sqrt(),
            Func::Exp => x.exp(),
            Func::Log => x.ln(),
            Func::Log10 => x.log10(),
            Func::Log1p => x.ln_1p(),
            Func::Sin => x.sin(),
            Func::Cos => x.cos(),
            Func::Tan => x.tan(),
            Func::Arcsin => x.asin(),
            Func::Arccos => x.acos(),
            Func::Arctan => x.atan(),
            Func::Arctan2 => x.atan2(args[1]),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Number(f64),
    Bool(bool),
    /// Slot in [`Query::columns`].
    Column(usize),
    Neg(Box<Expr>),
    Not(Box<Expr>),
    Arith(Arith, Box<Expr>, Box<Expr>),
    Compare(Box<Expr>, Vec<(Cmp, Expr)>),
    In {
        value: Box<Expr>,
        set: Vec<Expr>,
        negated: bool,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Call(Func, Vec<Expr>),
}

impl Expr {
    /// Whether the expression can stand as a row selection. A bare column
    /// selects its non-zero rows, as a boolean column does.
    fn is_condition(&self) -> bool {
        matches!(
            self,
            Expr::Bool(_)
                | Expr::Column(_)
                | Expr::Not(_)
                | Expr::Compare(..)
                | Expr::In { .. }
                | Expr::And(..)
                | Expr::Or(..)
        )
    }

    fn number(&self, row: usize, cols: &[&[f64]]) -> f64 {
        match self {
            Expr::Number(n) => *n,
            Expr::Column(slot) => cols[*slot][row],
            Expr::Neg(e) => -e.number(row, cols),
            Expr::Arith(op, a, b) => {
                let (a, b) = (a.number(row, cols), b.number(row, cols));
                match op {
                    Arith::Add => a + b,
                    Arith::Sub => a - b,
                    Arith::Mul => a * b,
                    Arith::Div => a / b,
                    // Sign of the divisor, as in Python.
                    Arith::Rem => a - b * (a / b).floor(),
                    Arith::Pow => a.powf(b),
                }
            }
            Expr::Call(func, args) => {
                let args: Vec<f64> = args.iter().map(|a| a.number(row, cols)).collect();
                func.apply(&args)
            }
            cond => {
                if cond.condition(row, cols) {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    fn condition(&self, row: usize, cols: &[&[f64]]) -> bool {
        match self {
            Expr::Bool(b) => *b,
            Expr::Not(e) => !e.condition(row, cols),
            Expr::And(a, b) => a.condition(row, cols) && b.condition(row, cols),
            Expr::Or(a, b) => a.condition(row, cols) || b.condition(row, cols),
            Expr::Compare(first, chain) => {
                let mut left = first.number(row, cols);
                for (op, rhs) in chain {
                    let right = rhs.number(row, cols);
                    if !op.holds(left, right) {
                        return false;
                    }
                    left = right;
                }
                true
            }
            Expr::In {
                value,
                set,
                negated,
            } => {
                let v = value.number(row, cols);
                set.iter().any(|e| e.number(row, cols) == v) != *negated
            }
            numeric => numeric.number(row, cols) != 0.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser {
    tokens: Vec<(Tok, usize)>,
    at: usize,
    columns: Vec<String>,
}

impl Parser {
    fn peek(&self) -> &Tok {
        &self.tokens[self.at].0
    }

    fn peek_at(&self, offset: usize) -> &Tok {
        let i = (self.at + offset).min(self.tokens.len() - 1);
        &self.tokens[i].0
    }

    fn next(&mut self) -> Tok {
        let tok = self.tokens[self.at].0.clone();
        if self.at < self.tokens.len() - 1 {
            self.at += 1;
        }
        tok
    }

    fn unexpected(&self, expected: &'static str) -> QueryError {
        let (tok, pos) = &self.tokens[self.at];
        QueryError::UnexpectedToken {
            found: tok.to_string(),
            pos: *pos,
            expected,
        }
    }

    fn is_sym(&self, sym: &str) -> bool {
        matches!(self.peek(), Tok::Sym(s) if *s == sym)
    }

    fn is_word(&self, word: &str) -> bool {
        matches!(self.peek(), Tok::Ident(s) if s == word)
    }

    fn expect_sym(&mut self, sym: &'static str) -> Result<(), QueryError> {
        if self.is_sym(sym) {
            self.next();
            Ok(())
        } else {
            Err(self.unexpected(sym))
        }
    }

    fn column_slot(&mut self, name: String) -> usize {
        match self.columns.iter().position(|c| *c == name) {
            Some(slot) => slot,
            None => {
                self.columns.push(name);
                self.columns.len() - 1
            }
        }
    }

    fn or(&mut self) -> Result<Expr, QueryError> {
        let mut left = self.and()?;
        while self.is_word("or") || self.is_sym("|") {
            self.next();
            let right = self.and()?;
            left = Expr::Or(
                Box::new(conditional(left, "or")?),
                Box::new(conditional(right, "or")?),
            );
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr, QueryError> {
        let mut left = self.not()?;
        while self.is_word("and") || self.is_sym("&") {
            self.next();
            let right = self.not()?;
            left = Expr::And(
                Box::new(conditional(left, "and")?),
                Box::new(conditional(right, "and")?),
            );
        }
        Ok(left)
    }

    fn not(&mut self) -> Result<Expr, QueryError> {
        if self.is_word("not") {
            self.next();
            let inner = self.not()?;
            return Ok(Expr::Not(Box::new(conditional(inner, "not")?)));
        }
        self.compare()
    }

    fn compare(&mut self) -> Result<Expr, QueryError> {
        let first = self.sum()?;

        let negated = self.is_word("not") && matches!(self.peek_at(1), Tok::Ident(s) if s == "in");
        if negated || self.is_word("in") {
            if negated {
                self.next();
            }
            self.next();
            self.expect_sym("[")?;
            let mut set = vec![self.sum()?];
            while self.is_sym(",") {
                self.next();
                set.push(self.sum()?);
            }
            self.expect_sym("]")?;
            return Ok(Expr::In {
                value: Box::new(first),
                set,
                negated,
            });
        }

        let mut chain = Vec::new();
        while let Tok::Sym(s) = self.peek() {
            let Some(op) = Cmp::from_sym(s) else { break };
            self.next();
            chain.push((op, self.sum()?));
        }
        if chain.is_empty() {
            Ok(first)
        } else {
            Ok(Expr::Compare(Box::new(first), chain))
        }
    }

    fn sum(&mut self) -> Result<Expr, QueryError> {
        let mut left = self.product()?;
        loop {
            let op = if self.is_sym("+") {
                Arith::Add
            } else if self.is_sym("-") {
                Arith::Sub
            } else {
                return Ok(left);
            };
            self.next();
            left = Expr::Arith(op, Box::new(left), Box::new(self.product()?));
        }
    }

    fn product(&mut self) -> Result<Expr, QueryError> {
        let mut left = self.unary()?;
        loop {
            let op = if self.is_sym("*") {
                Arith::Mul
            } else if self.is_sym("/") {
                Arith::Div
            } else if self.is_sym("%") {
                Arith::Rem
            } else {
                return Ok(left);
            };
            self.next();
            left = Expr::Arith(op, Box::new(left), Box::new(self.unary()?));
        }
    }

    fn unary(&mut self) -> Result<Expr, QueryError> {
        if self.is_sym("-") {
            self.next();
            return Ok(Expr::Neg(Box::new(self.unary()?)));
        }
        if self.is_sym("+") {
            self.next();
            return self.unary();
        }
        if self.is_sym("~") {
            self.next();
            let inner = self.unary()?;
            return Ok(Expr::Not(Box::new(conditional(inner, "~")?)));
        }
        self.power()
    }

    fn power(&mut self) -> Result<Expr, QueryError> {
        let base = self.atom()?;
        if self.is_sym("**") {
            self.next();
            let exponent = self.unary()?;
            return Ok(Expr::Arith(Arith::Pow, Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<Expr, QueryError> {
        match self.peek().clone() {
            Tok::Number(n) => {
                self.next();
                Ok(Expr::Number(n))
            }
            Tok::Quoted(name) => {
                self.next();
                Ok(Expr::Column(self.column_slot(name)))
            }
            Tok::Ident(word) => {
                match word.as_str() {
                    "True" | "true" => {
                        self.next();
                        return Ok(Expr::Bool(true));
                    }
                    "False" | "false" => {
                        self.next();
                        return Ok(Expr::Bool(false));
                    }
                    "and" | "or" | "not" | "in" => return Err(self.unexpected("a value")),
                    _ => {}
                }
                self.next();
                if self.is_sym("(") {
                    return self.call(word);
                }
                Ok(Expr::Column(self.column_slot(word)))
            }
            Tok::Sym("(") => {
                self.next();
                let inner = self.or()?;
                self.expect_sym(")")?;
                Ok(inner)
            }
            _ => Err(self.unexpected("a value")),
        }
    }

    fn call(&mut self, name: String) -> Result<Expr, QueryError> {
        let func = Func::lookup(&name).ok_or_else(|| QueryError::UnknownFunction(name.clone()))?;
        self.expect_sym("(")?;
        let mut args = Vec::new();
        if !self.is_sym(")") {
            args.push(self.sum()?);
            while self.is_sym(",") {
                self.next();
                args.push(self.sum()?);
            }
        }
        self.expect_sym(")")?;
        if args.len() != func.arity() {
            return Err(QueryError::Arity {
                name,
                expected: func.arity(),
                found: args.len(),
            });
        }
        Ok(Expr::Call(func, args))
    }
}

fn conditional(expr: Expr, op: &'static str) -> Result<Expr, QueryError> {
    if expr.is_condition() {
        Ok(expr)
    } else {
        Err(QueryError::NotACondition(op))
    }
}

// ---------------------------------------------------------------------------
// Query – parsed, ready to evaluate against a table
// ---------------------------------------------------------------------------

/// A parsed row-selection expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    source: String,
    expr: Expr,
    columns: Vec<String>,
}

impl Query {
    pub fn parse(source: &str) -> Result<Self, QueryError> {
        let mut parser = Parser {
            tokens: tokenize(source)?,
            at: 0,
            columns: Vec::new(),
        };
        let expr = parser.or()?;
        if *parser.peek() != Tok::End {
            return Err(parser.unexpected("an operator or end of query"));
        }
        if !expr.is_condition() {
            return Err(QueryError::NotAFilter);
        }
        Ok(Query {
            source: source.to_string(),
            expr,
            columns: parser.columns,
        })
    }

    /// Columns the expression refers to, in order of first use.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Indices of the rows for which the expression holds.
    pub fn matching_rows(&self, table: &Table) -> Result<Vec<usize>, QueryError> {
        let cols = self
            .columns
            .iter()
            .map(|name| {
                table
                    .column(name)
                    .map_err(|_| QueryError::UnknownColumn(name.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok((0..table.len())
            .filter(|&row| self.expr.condition(row, &cols))
            .collect())
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
