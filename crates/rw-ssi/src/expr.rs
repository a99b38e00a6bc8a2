//! Boolean expressions for `#if` and `#elif`.
//!
//! Grammar, loosest binding first:
//!
//! ```text
//! or         := and ( "||" and )*
//! and        := unary ( "&&" unary )*
//! unary      := "!" unary | comparison
//! comparison := "(" or ")" | string [ op string ]
//! op         := "=" | "==" | "!=" | "<" | "<=" | ">" | ">="
//! string     := word+            adjacent words join with one space
//! ```
//!
//! A comparison only has string operands, so `!` applies to the whole
//! comparison that follows it: `!$a = b` reads as `!($a = b)`, as in Apache.
//!
//! Strings are variable-substituted before use. A string on its own is true
//! when non-empty. A right operand written as `/pattern/` is a regex search.

use std::cmp::Ordering;
use std::fmt;
use std::iter::Peekable;
use std::vec::IntoIter;

use regex::Regex;

use crate::error::ExpressionError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    LParen,
    RParen,
    Not,
    And,
    Or,
    Compare(CompareOp),
    Str(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareOp {
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    fn holds(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::NotEq => ordering != Ordering::Equal,
            Self::Lt => ordering == Ordering::Less,
            Self::Le => ordering != Ordering::Greater,
            Self::Gt => ordering == Ordering::Greater,
            Self::Ge => ordering != Ordering::Less,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LParen => f.write_str("("),
            Self::RParen => f.write_str(")"),
            Self::Not => f.write_str("!"),
            Self::And => f.write_str("&&"),
            Self::Or => f.write_str("||"),
            Self::Compare(op) => f.write_str(match op {
                CompareOp::Eq => "=",
                CompareOp::NotEq => "!=",
                CompareOp::Lt => "<",
                CompareOp::Le => "<=",
                CompareOp::Gt => ">",
                CompareOp::Ge => ">=",
            }),
            Self::Str(s) => f.write_str(s),
        }
    }
}

#[derive(Debug)]
enum Node {
    Str(String),
    Not(Box<Node>),
    And(Box<Node>, Box<Node>),
    Or(Box<Node>, Box<Node>),
    Compare(CompareOp, String, String),
}

/// Evaluate an expression, expanding strings with `substitute`.
///
/// # Example
///
/// ```
/// use rw_ssi::evaluate;
///
/// let vars = |s: &str| s.replace("$USER", "ada");
/// assert_eq!(evaluate("$USER = ada && !(1 > 2)", vars), Ok(true));
/// assert_eq!(evaluate("$USER = /^b/", vars), Ok(false));
/// assert!(evaluate("(1 = 1", vars).is_err());
/// ```
pub fn evaluate<F>(expression: &str, substitute: F) -> Result<bool, ExpressionError>
where
    F: Fn(&str) -> String,
{
    let tree = parse(expression)?;
    Ok(eval(&tree, &substitute))
}

fn parse(expression: &str) -> Result<Node, ExpressionError> {
    let tokens = tokenize(expression);
    if tokens.is_empty() {
        return Err(ExpressionError::Empty);
    }

    let mut parser = Parser {
        tokens: tokens.into_iter().peekable(),
    };
    let node = parser.parse_or()?;
    match parser.tokens.next() {
        None => Ok(node),
        Some(Token::RParen) => Err(ExpressionError::UnbalancedParens),
        Some(token) => Err(ExpressionError::UnexpectedToken(token.to_string())),
    }
}

fn eval<F: Fn(&str) -> String>(node: &Node, substitute: &F) -> bool {
    match node {
        Node::Str(s) => !substitute(s).is_empty(),
        Node::Not(inner) => !eval(inner, substitute),
        Node::And(left, right) => eval(left, substitute) && eval(right, substitute),
        Node::Or(left, right) => eval(left, substitute) || eval(right, substitute),
        Node::Compare(op, left, right) => {
            let left = substitute(left);
            let right = substitute(right);
            op.holds(compare(&left, &right))
        }
    }
}

/// Compare two operands; `/pattern/` on the right matches as a regex.
fn compare(left: &str, right: &str) -> Ordering {
    let is_regex = right.len() > 1 && right.starts_with('/') && right.ends_with('/');
    if !is_regex {
        return left.cmp(right);
    }

    let pattern = &right[1..right.len() - 1];
    match Regex::new(pattern) {
        Ok(re) if re.is_match(left) => Ordering::Equal,
        Ok(_) => Ordering::Less,
        Err(e) => {
            tracing::warn!(pattern, error = %e, "Invalid regular expression");
            Ordering::Equal
        }
    }
}

fn is_meta(c: char) -> bool {
    c.is_whitespace() || matches!(c, '(' | ')' | '!' | '<' | '>' | '|' | '&' | '=')
}

fn tokenize(expression: &str) -> Vec<Token> {
    let chars: Vec<char> = expression.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    loop {
        while i < chars.len() && chars[i].is_whitespace() {
            i += 1;
        }
        if i >= chars.len() {
            return tokens;
        }

        let c = chars[i];
        let next = chars.get(i + 1).copied();
        i += 1;

        let operator = match (c, next) {
            ('(', _) => Some(Token::LParen),
            (')', _) => Some(Token::RParen),
            ('=', Some('=')) | ('!', Some('=')) | ('|', Some('|')) | ('&', Some('&'))
            | ('<', Some('=')) | ('>', Some('=')) => {
                i += 1;
                Some(match c {
                    '=' => Token::Compare(CompareOp::Eq),
                    '!' => Token::Compare(CompareOp::NotEq),
                    '|' => Token::Or,
                    '&' => Token::And,
                    '<' => Token::Compare(CompareOp::Le),
                    _ => Token::Compare(CompareOp::Ge),
                })
            }
            ('=', _) => Some(Token::Compare(CompareOp::Eq)),
            ('!', _) => Some(Token::Not),
            ('<', _) => Some(Token::Compare(CompareOp::Lt)),
            ('>', _) => Some(Token::Compare(CompareOp::Gt)),
            _ => None,
        };
        if let Some(token) = operator {
            tokens.push(token);
            continue;
        }

        let (start, end) = match c {
            '"' | '\'' => {
                let end = scan_until(&chars, i, c);
                let span = (i, end);
                i = (end + 1).min(chars.len());
                span
            }
            '/' => {
                let start = i - 1;
                let end = (scan_until(&chars, i, '/') + 1).min(chars.len());
                i = end;
                (start, end)
            }
            _ => {
                let start = i - 1;
                while i < chars.len() && !is_meta(chars[i]) {
                    i += 1;
                }
                (start, i)
            }
        };
        tokens.push(Token::Str(chars[start..end].iter().collect()));
    }
}

/// Index of the next unescaped `quote` at or after `from`, or the input length.
fn scan_until(chars: &[char], from: usize, quote: char) -> usize {
    let mut escaped = false;
    for (offset, &c) in chars[from..].iter().enumerate() {
        if c == '\\' && !escaped {
            escaped = true;
            continue;
        }
        if c == quote && !escaped {
            return from + offset;
        }
        escaped = false;
    }
    chars.len()
}

struct Parser {
    tokens: Peekable<IntoIter<Token>>,
}

impl Parser {
    fn parse_or(&mut self) -> Result<Node, ExpressionError> {
        let mut left = self.parse_and()?;
        while self.tokens.next_if_eq(&Token::Or).is_some() {
            let right = self.parse_and()?;
            left = Node::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Node, ExpressionError> {
        let mut left = self.parse_unary()?;
        while self.tokens.next_if_eq(&Token::And).is_some() {
            let right = self.parse_unary()?;
            left = Node::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Node, ExpressionError> {
        if self.tokens.next_if_eq(&Token::Not).is_some() {
            return Ok(Node::Not(Box::new(self.parse_unary()?)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Node, ExpressionError> {
        match self.tokens.next() {
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                if self.tokens.next_if_eq(&Token::RParen).is_none() {
                    return Err(ExpressionError::UnbalancedParens);
                }
                if let Some(Token::Compare(_)) = self.tokens.peek() {
                    let op = self.tokens.next().map(|t| t.to_string()).unwrap_or_default();
                    return Err(ExpressionError::StrayOperator(op));
                }
                Ok(inner)
            }
            Some(Token::Str(first)) => {
                let left = self.join_strings(first);
                let Some(Token::Compare(op)) = self.tokens.peek().cloned() else {
                    return Ok(Node::Str(left));
                };
                self.tokens.next();
                match self.tokens.next() {
                    Some(Token::Str(first)) => {
                        let right = self.join_strings(first);
                        Ok(Node::Compare(op, left, right))
                    }
                    Some(_) => Err(ExpressionError::StrayOperator(Token::Compare(op).to_string())),
                    None => Err(ExpressionError::UnexpectedEnd),
                }
            }
            Some(Token::RParen) => Err(ExpressionError::UnbalancedParens),
            Some(token) => Err(ExpressionError::UnexpectedToken(token.to_string())),
            None => Err(ExpressionError::UnexpectedEnd),
        }
    }

    fn join_strings(&mut self, first: String) -> String {
        let mut joined = first;
        while let Some(Token::Str(next)) = self.tokens.next_if(|t| matches!(t, Token::Str(_))) {
            joined.push(' ');
            joined.push_str(&next);
        }
        joined
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn literal(s: &str) -> String {
        s.to_owned()
    }

    fn eval_str(expr: &str) -> Result<bool, ExpressionError> {
        evaluate(expr, literal)
    }

    #[test]
    fn test_tokenize_operators() {
        let tokens = tokenize("a==b != c<=d>=e<f>g && h || !i");
        assert_eq!(
            tokens
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>(),
            vec![
                "a", "=", "b", "!=", "c", "<=", "d", ">=", "e", "<", "f", ">", "g", "&&", "h",
                "||", "!", "i"
            ]
        );
    }

    #[test]
    fn test_tokenize_quoted_and_regex() {
        let tokens = tokenize(r#"'a b' = "c\"d" /x y/"#);
        assert_eq!(
            tokens,
            vec![
                Token::Str("a b".to_owned()),
                Token::Compare(CompareOp::Eq),
                Token::Str(r#"c\"d"#.to_owned()),
                Token::Str("/x y/".to_owned()),
            ]
        );
    }

    #[test]
    fn test_equality() {
        assert_eq!(eval_str("1=1"), Ok(true));
        assert_eq!(eval_str("0=1"), Ok(false));
        assert_eq!(eval_str("a == a"), Ok(true));
        assert_eq!(eval_str("a != b"), Ok(true));
    }

    #[test]
    fn test_lexicographic() {
        assert_eq!(eval_str("abc < abd"), Ok(true));
        assert_eq!(eval_str("b <= b"), Ok(true));
        assert_eq!(eval_str("10 > 9"), Ok(false));
        assert_eq!(eval_str("z >= a"), Ok(true));
    }

    #[test]
    fn test_string_truthiness() {
        assert_eq!(eval_str("nonempty"), Ok(true));
        assert_eq!(evaluate("$EMPTY", |s| s.replace("$EMPTY", "")), Ok(false));
    }

    #[test]
    fn test_precedence() {
        assert_eq!(eval_str("a = b || a = a && b = b"), Ok(true));
        assert_eq!(eval_str("a = a || b = c && c = d"), Ok(true));
        assert_eq!(eval_str("(a = a || b = c) && c = d"), Ok(false));
        assert_eq!(eval_str("!a = b"), Ok(true));
        assert_eq!(eval_str("!(a = a) || !!x"), Ok(true));
    }

    #[test]
    fn test_not_negates_whole_comparison() {
        assert_eq!(eval_str("!a = a"), Ok(false));
        assert_eq!(eval_str("!a != a"), Ok(true));
        assert_eq!(eval_str("!a = a || b = b"), Ok(true));
        assert_eq!(eval_str("!a = a && b = b"), Ok(false));
    }

    #[test]
    fn test_adjacent_strings_join() {
        assert_eq!(eval_str("'hello world' = hello world"), Ok(true));
    }

    #[test]
    fn test_regex_match() {
        assert_eq!(eval_str("foobar = /^foo/"), Ok(true));
        assert_eq!(eval_str("foobar = /^bar/"), Ok(false));
        assert_eq!(eval_str("foobar != /^bar/"), Ok(true));
    }

    #[test]
    fn test_invalid_regex_counts_as_match() {
        assert_eq!(eval_str("x = /(/"), Ok(true));
    }

    #[test]
    fn test_substitution_applied() {
        let vars = |s: &str| s.replace("$A", "one");
        assert_eq!(evaluate("$A = one", vars), Ok(true));
    }

    #[test]
    fn test_malformed() {
        assert_eq!(eval_str(""), Err(ExpressionError::Empty));
        assert_eq!(eval_str("   "), Err(ExpressionError::Empty));
        assert_eq!(eval_str("(a = a"), Err(ExpressionError::UnbalancedParens));
        assert_eq!(eval_str("a = a)"), Err(ExpressionError::UnbalancedParens));
        assert_eq!(eval_str("a ="), Err(ExpressionError::UnexpectedEnd));
        assert_eq!(eval_str("a &&"), Err(ExpressionError::UnexpectedEnd));
        assert_eq!(
            eval_str("= a"),
            Err(ExpressionError::UnexpectedToken("=".to_owned()))
        );
        assert_eq!(
            eval_str("(a) = b"),
            Err(ExpressionError::StrayOperator("=".to_owned()))
        );
        assert_eq!(
            eval_str("a = (b)"),
            Err(ExpressionError::StrayOperator("=".to_owned()))
        );
    }
}
