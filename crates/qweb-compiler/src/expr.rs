//! Expression translator.
//!
//! Template expressions are a whitelisted JS-like dialect. This module
//! parses them into a small expression IR before they are embedded in the
//! emitted program. The word operators `and`, `or`, `gt`, `lt` rewrite to
//! their symbolic forms, and bare identifiers resolve at compile time:
//! names declared in the compilation scope (via `t-set`, `t-foreach t-as`
//! or `t-call` parameters) become scope lookups, everything else becomes a
//! context lookup.

use smol_str::SmolStr;
use std::fmt;

/// A parsed template expression.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Expr {
    /// A literal value.
    Lit(Literal),
    /// Lookup against the evaluation context root (`context.<name>`).
    Ctx(SmolStr),
    /// Lookup against the runtime scope chain.
    Scope(SmolStr),
    /// Member access `base.name`.
    Member(Box<Expr>, SmolStr),
    /// Index access `base[index]`.
    Index(Box<Expr>, Box<Expr>),
    /// Unary operation.
    Unary(UnaryOp, Box<Expr>),
    /// Binary operation.
    Binary(BinOp, Box<Expr>, Box<Expr>),
    /// Conditional `cond ? then : else`.
    Ternary(Box<Expr>, Box<Expr>, Box<Expr>),
    /// Array literal.
    Array(Vec<Expr>),
    /// Object literal with literal keys.
    Object(Vec<(SmolStr, Expr)>),
}

/// A literal in an expression.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
}

/// A parsed `t-on-*` handler: a bare or called method name resolved against
/// the rendering context, or a plain expression.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum HandlerExpr {
    /// `inc` or `inc(a, b)`.
    Named { name: SmolStr, args: Vec<Expr> },
    /// Any other expression, evaluated when the event fires.
    Eval(Expr),
}

/// A segment of a `t-attf-*` interpolated attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum InterpPart {
    Lit(String),
    Expr(Expr),
}

/// An expression syntax error; the compiler wraps it with the template name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExprError {
    pub detail: String,
    pub offset: usize,
}

impl ExprError {
    fn new(detail: impl Into<String>, offset: usize) -> Self {
        Self {
            detail: detail.into(),
            offset,
        }
    }
}

impl fmt::Display for ExprError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at offset {}", self.detail, self.offset)
    }
}

impl std::error::Error for ExprError {}

/// Parse a template expression.
pub fn parse_expression(source: &str, declared: &dyn Fn(&str) -> bool) -> Result<Expr, ExprError> {
    // the t-call body fragment is exposed under the scope name "0"
    if source.trim() == "0" {
        return Ok(Expr::Scope(SmolStr::new("0")));
    }
    let tokens = tokenize(source)?;
    let mut parser = ExprParser {
        tokens,
        pos: 0,
        declared,
    };
    let expr = parser.parse_ternary()?;
    parser.expect_eof()?;
    Ok(expr)
}

/// Parse a `t-on-*` handler expression.
pub fn parse_handler(source: &str, declared: &dyn Fn(&str) -> bool) -> Result<HandlerExpr, ExprError> {
    let tokens = tokenize(source)?;
    // bare name: `inc`
    if let [Token::Ident(name, _)] = tokens.as_slice() {
        if !is_keyword(name) {
            return Ok(HandlerExpr::Named {
                name: SmolStr::new(name),
                args: Vec::new(),
            });
        }
    }
    // call form: `inc(a, b)`
    if let Some((Token::Ident(name, _), Token::Punct("(", _))) =
        tokens.first().zip(tokens.get(1))
    {
        if !is_keyword(name) && matches!(tokens.last(), Some(Token::Punct(")", _))) {
            let mut parser = ExprParser {
                tokens: tokens[2..tokens.len() - 1].to_vec(),
                pos: 0,
                declared,
            };
            let mut args = Vec::new();
            if !parser.at_eof() {
                loop {
                    args.push(parser.parse_ternary()?);
                    if !parser.eat_punct(",") {
                        break;
                    }
                }
            }
            parser.expect_eof()?;
            return Ok(HandlerExpr::Named {
                name: SmolStr::new(name),
                args,
            });
        }
    }
    parse_expression(source, declared).map(HandlerExpr::Eval)
}

/// Parse an interpolated attribute value: literal segments with `{{ expr }}`
/// holes.
pub fn parse_interpolation(
    source: &str,
    declared: &dyn Fn(&str) -> bool,
) -> Result<Vec<InterpPart>, ExprError> {
    let mut parts = Vec::new();
    let mut rest = source;
    let mut consumed = 0usize;
    while let Some(open) = rest.find("{{") {
        if open > 0 {
            parts.push(InterpPart::Lit(rest[..open].to_string()));
        }
        let after = &rest[open + 2..];
        let close = after.find("}}").ok_or_else(|| {
            ExprError::new("unterminated '{{' in interpolated attribute", consumed + open)
        })?;
        let expr = parse_expression(after[..close].trim(), declared)
            .map_err(|e| ExprError::new(e.detail, consumed + open + 2 + e.offset))?;
        parts.push(InterpPart::Expr(expr));
        consumed += open + 2 + close + 2;
        rest = &after[close + 2..];
    }
    if !rest.is_empty() {
        parts.push(InterpPart::Lit(rest.to_string()));
    }
    Ok(parts)
}

fn is_keyword(name: &str) -> bool {
    matches!(
        name,
        "and" | "or" | "gt" | "lt" | "true" | "false" | "null" | "undefined"
    )
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String, usize),
    Int(i64, usize),
    Float(f64, usize),
    Str(String, usize),
    Punct(&'static str, usize),
}

impl Token {
    fn offset(&self) -> usize {
        match self {
            Token::Ident(_, o)
            | Token::Int(_, o)
            | Token::Float(_, o)
            | Token::Str(_, o)
            | Token::Punct(_, o) => *o,
        }
    }
}

const PUNCTS: &[&str] = &[
    "===", "!==", "==", "!=", "<=", ">=", "&&", "||", "<", ">", "+", "-", "*", "/", "%", "!", "?",
    ":", ",", ".", "(", ")", "[", "]", "{", "}",
];

fn tokenize(source: &str) -> Result<Vec<Token>, ExprError> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0usize;
    while i < bytes.len() {
        let c = bytes[i] as char;
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < bytes.len()
                && ((bytes[i] as char).is_ascii_alphanumeric() || bytes[i] == b'_')
            {
                i += 1;
            }
            tokens.push(Token::Ident(source[start..i].to_string(), start));
            continue;
        }
        if c.is_ascii_digit() {
            let start = i;
            while i < bytes.len() && (bytes[i] as char).is_ascii_digit() {
                i += 1;
            }
            if i < bytes.len() && bytes[i] == b'.' && bytes.get(i + 1).is_some_and(|b| b.is_ascii_digit()) {
                i += 1;
                while i < bytes.len() && (bytes[i] as char).is_ascii_digit() {
                    i += 1;
                }
                let value: f64 = source[start..i]
                    .parse()
                    .map_err(|_| ExprError::new("invalid number literal", start))?;
                tokens.push(Token::Float(value, start));
            } else {
                let value: i64 = source[start..i]
                    .parse()
                    .map_err(|_| ExprError::new("invalid number literal", start))?;
                tokens.push(Token::Int(value, start));
            }
            continue;
        }
        if c == '"' || c == '\'' {
            let quote = c;
            let start = i;
            i += 1;
            let mut value = String::new();
            loop {
                if i >= bytes.len() {
                    return Err(ExprError::new("unterminated string literal", start));
                }
                let ch = source[i..].chars().next().unwrap();
                i += ch.len_utf8();
                if ch == quote {
                    break;
                }
                if ch == '\\' {
                    let escaped = source[i..]
                        .chars()
                        .next()
                        .ok_or_else(|| ExprError::new("unterminated string literal", start))?;
                    i += escaped.len_utf8();
                    value.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        other => other,
                    });
                } else {
                    value.push(ch);
                }
            }
            tokens.push(Token::Str(value, start));
            continue;
        }
        let mut matched = false;
        for punct in PUNCTS {
            if source[i..].starts_with(punct) {
                tokens.push(Token::Punct(punct, i));
                i += punct.len();
                matched = true;
                break;
            }
        }
        if !matched {
            return Err(ExprError::new(format!("unexpected character '{}'", c), i));
        }
    }
    Ok(tokens)
}

struct ExprParser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    declared: &'a dyn Fn(&str) -> bool,
}

impl<'a> ExprParser<'a> {
    fn at_eof(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat_punct(&mut self, punct: &str) -> bool {
        if matches!(self.peek(), Some(Token::Punct(p, _)) if *p == punct) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_ident(&mut self, word: &str) -> bool {
        if matches!(self.peek(), Some(Token::Ident(w, _)) if w == word) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, punct: &'static str) -> Result<(), ExprError> {
        if self.eat_punct(punct) {
            Ok(())
        } else {
            let offset = self.peek().map(|t| t.offset()).unwrap_or(0);
            Err(ExprError::new(format!("expected '{}'", punct), offset))
        }
    }

    fn expect_eof(&self) -> Result<(), ExprError> {
        match self.peek() {
            None => Ok(()),
            Some(t) => Err(ExprError::new("unexpected trailing tokens", t.offset())),
        }
    }

    fn parse_ternary(&mut self) -> Result<Expr, ExprError> {
        let cond = self.parse_or()?;
        if self.eat_punct("?") {
            let then = self.parse_ternary()?;
            self.expect_punct(":")?;
            let otherwise = self.parse_ternary()?;
            return Ok(Expr::Ternary(
                Box::new(cond),
                Box::new(then),
                Box::new(otherwise),
            ));
        }
        Ok(cond)
    }

    fn parse_or(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_and()?;
        while self.eat_punct("||") || self.eat_ident("or") {
            let right = self.parse_and()?;
            left = Expr::Binary(BinOp::Or, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_equality()?;
        while self.eat_punct("&&") || self.eat_ident("and") {
            let right = self.parse_equality()?;
            left = Expr::Binary(BinOp::And, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_comparison()?;
        loop {
            let op = if self.eat_punct("==") || self.eat_punct("===") {
                BinOp::Eq
            } else if self.eat_punct("!=") || self.eat_punct("!==") {
                BinOp::Ne
            } else {
                break;
            };
            let right = self.parse_comparison()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_additive()?;
        loop {
            let op = if self.eat_punct("<=") {
                BinOp::Le
            } else if self.eat_punct(">=") {
                BinOp::Ge
            } else if self.eat_punct("<") || self.eat_ident("lt") {
                BinOp::Lt
            } else if self.eat_punct(">") || self.eat_ident("gt") {
                BinOp::Gt
            } else {
                break;
            };
            let right = self.parse_additive()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = if self.eat_punct("+") {
                BinOp::Add
            } else if self.eat_punct("-") {
                BinOp::Sub
            } else {
                break;
            };
            let right = self.parse_multiplicative()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = if self.eat_punct("*") {
                BinOp::Mul
            } else if self.eat_punct("/") {
                BinOp::Div
            } else if self.eat_punct("%") {
                BinOp::Mod
            } else {
                break;
            };
            let right = self.parse_unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ExprError> {
        if self.eat_punct("!") {
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(self.parse_unary()?)));
        }
        if self.eat_punct("-") {
            return Ok(Expr::Unary(UnaryOp::Neg, Box::new(self.parse_unary()?)));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, ExprError> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.eat_punct(".") {
                match self.next() {
                    Some(Token::Ident(name, _)) => {
                        expr = Expr::Member(Box::new(expr), SmolStr::new(name));
                    }
                    other => {
                        let offset = other.map(|t| t.offset()).unwrap_or(0);
                        return Err(ExprError::new("expected member name after '.'", offset));
                    }
                }
            } else if self.eat_punct("[") {
                let index = self.parse_ternary()?;
                self.expect_punct("]")?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ExprError> {
        let token = self
            .next()
            .ok_or_else(|| ExprError::new("unexpected end of expression", 0))?;
        match token {
            Token::Int(v, _) => Ok(Expr::Lit(Literal::Int(v))),
            Token::Float(v, _) => Ok(Expr::Lit(Literal::Float(v))),
            Token::Str(v, _) => Ok(Expr::Lit(Literal::Str(v))),
            Token::Ident(name, offset) => match name.as_str() {
                "true" => Ok(Expr::Lit(Literal::Bool(true))),
                "false" => Ok(Expr::Lit(Literal::Bool(false))),
                "null" | "undefined" => Ok(Expr::Lit(Literal::Null)),
                "and" | "or" | "gt" | "lt" => {
                    Err(ExprError::new(format!("misplaced operator '{}'", name), offset))
                }
                _ => {
                    if (self.declared)(&name) {
                        Ok(Expr::Scope(SmolStr::new(name)))
                    } else {
                        Ok(Expr::Ctx(SmolStr::new(name)))
                    }
                }
            },
            Token::Punct("(", _) => {
                let inner = self.parse_ternary()?;
                self.expect_punct(")")?;
                Ok(inner)
            }
            Token::Punct("[", _) => {
                let mut items = Vec::new();
                if !self.eat_punct("]") {
                    loop {
                        items.push(self.parse_ternary()?);
                        if !self.eat_punct(",") {
                            break;
                        }
                    }
                    self.expect_punct("]")?;
                }
                Ok(Expr::Array(items))
            }
            Token::Punct("{", _) => {
                let mut entries = Vec::new();
                if !self.eat_punct("}") {
                    loop {
                        let key = match self.next() {
                            Some(Token::Ident(name, _)) => SmolStr::new(name),
                            Some(Token::Str(name, _)) => SmolStr::new(name),
                            other => {
                                let offset = other.map(|t| t.offset()).unwrap_or(0);
                                return Err(ExprError::new("expected object key", offset));
                            }
                        };
                        self.expect_punct(":")?;
                        entries.push((key, self.parse_ternary()?));
                        if !self.eat_punct(",") {
                            break;
                        }
                    }
                    self.expect_punct("}")?;
                }
                Ok(Expr::Object(entries))
            }
            other => Err(ExprError::new("unexpected token", other.offset())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Expr {
        parse_expression(source, &|name| name == "item" || name == "item_index").unwrap()
    }

    #[test]
    fn test_scope_vs_context_resolution() {
        assert_eq!(parse("item"), Expr::Scope("item".into()));
        assert_eq!(parse("value"), Expr::Ctx("value".into()));
        match parse("state.counter") {
            Expr::Member(base, name) => {
                assert_eq!(*base, Expr::Ctx("state".into()));
                assert_eq!(name, "counter");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_word_operators() {
        let expr = parse("a and b or item gt 3");
        // ((a && b) || (item > 3))
        match expr {
            Expr::Binary(BinOp::Or, left, right) => {
                assert!(matches!(*left, Expr::Binary(BinOp::And, _, _)));
                assert!(matches!(*right, Expr::Binary(BinOp::Gt, _, _)));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(parse("1 lt 2"), Expr::Binary(BinOp::Lt, _, _)));
    }

    #[test]
    fn test_literals() {
        assert_eq!(parse("42"), Expr::Lit(Literal::Int(42)));
        assert_eq!(parse("4.5"), Expr::Lit(Literal::Float(4.5)));
        assert_eq!(parse("'hi'"), Expr::Lit(Literal::Str("hi".into())));
        assert_eq!(parse("\"a\\nb\""), Expr::Lit(Literal::Str("a\nb".into())));
        assert_eq!(parse("undefined"), Expr::Lit(Literal::Null));
    }

    #[test]
    fn test_array_and_object() {
        assert_eq!(
            parse("[1, 2]"),
            Expr::Array(vec![Expr::Lit(Literal::Int(1)), Expr::Lit(Literal::Int(2))])
        );
        match parse("{a: 1, 'b': 2}") {
            Expr::Object(entries) => {
                assert_eq!(entries.len(), 2);
                assert_eq!(entries[0].0, "a");
                assert_eq!(entries[1].0, "b");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_ternary_and_index() {
        assert!(matches!(parse("item ? 1 : 2"), Expr::Ternary(_, _, _)));
        assert!(matches!(parse("list[item_index]"), Expr::Index(_, _)));
    }

    #[test]
    fn test_call_body_variable() {
        assert_eq!(parse("0"), Expr::Scope("0".into()));
    }

    #[test]
    fn test_handlers() {
        let declared = |_: &str| false;
        assert_eq!(
            parse_handler("inc", &declared).unwrap(),
            HandlerExpr::Named {
                name: "inc".into(),
                args: vec![]
            }
        );
        match parse_handler("add(2, item)", &|n| n == "item").unwrap() {
            HandlerExpr::Named { name, args } => {
                assert_eq!(name, "add");
                assert_eq!(args.len(), 2);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            parse_handler("counter + 1", &declared).unwrap(),
            HandlerExpr::Eval(_)
        ));
    }

    #[test]
    fn test_interpolation() {
        let parts = parse_interpolation("item-{{ item_index }}-end", &|n| n == "item_index").unwrap();
        assert_eq!(parts.len(), 3);
        assert!(matches!(&parts[0], InterpPart::Lit(l) if l == "item-"));
        assert!(matches!(&parts[1], InterpPart::Expr(Expr::Scope(_))));
        assert!(matches!(&parts[2], InterpPart::Lit(l) if l == "-end"));
    }

    #[test]
    fn test_errors() {
        let declared = |_: &str| false;
        assert!(parse_expression("a +", &declared).is_err());
        assert!(parse_expression("'unterminated", &declared).is_err());
        assert!(parse_expression("a ; b", &declared).is_err());
        assert!(parse_interpolation("x{{ a", &declared).is_err());
    }
}
