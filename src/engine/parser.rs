//! Recursive-descent parser for SSSOM/Transform rulesets.
//!
//! The parser only builds a syntax tree; it does not know which functions
//! exist or what filter fields mean. That is the reader's job (`reader.rs`).
//!
//! ## Grammar
//!
//! ```text
//! ruleset   := prefix* header* rule*
//! prefix    := 'prefix' NAME ':' '<' IRI '>'
//! header    := call ';'
//! rule      := tags? filter ( '->' actions | '{' rule* '}' )
//! tags      := '[' TAG (',' TAG)* ']'
//! actions   := call ';' | '{' (call ';')+ '}'
//! filter    := item (('&&' | '||')? item)*        # missing operator means '&&'
//! item      := '!' item | '(' filter ')' | '*' | call
//!            | FIELD ('==' | '>' | '>=' | '<' | '<=') value
//! call      := NAME '(' (value (',' value)*)? ')'
//! value     := STRING | '<' IRI '>' | BARE
//! ```
//!
//! The final `;` of a source may be omitted.
//!
//! ## Error recovery
//!
//! A syntax error abandons the current top-level rule: the parser records the
//! error, skips to the `;` or closing `}` that ends the rule at nesting depth
//! zero, and carries on with the next rule.

use super::lexer::{self, Cursor};
use crate::error::TransformError;
use std::fmt;

/// 1-based source position of a syntax element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct Position {
    pub line: usize,
    pub column: usize,
}

/// A value as written in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Literal {
    /// Quoted string, already unescaped.
    Quoted(String),
    /// `<...>`, without the brackets.
    Iri(String),
    /// Unquoted token: CURIE, number, `*`, `~`, cardinality.
    Bare(String),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Quoted(s) => write!(f, "\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
            Literal::Iri(s) => write!(f, "<{s}>"),
            Literal::Bare(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CallSyntax {
    pub name: String,
    pub args: Vec<Literal>,
    pub pos: Position,
}

impl fmt::Display for CallSyntax {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{arg}")?;
        }
        f.write_str(")")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CompareOp {
    Eq,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CompareOp {
    fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "==" => CompareOp::Eq,
            ">" => CompareOp::Gt,
            ">=" => CompareOp::Ge,
            "<" => CompareOp::Lt,
            "<=" => CompareOp::Le,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FilterItem {
    /// Bare `*`: matches everything.
    All,
    Compare { field: String, op: CompareOp, value: Literal, pos: Position },
    Call(CallSyntax),
    Not(Box<FilterItem>),
    Group(FilterExpr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Connective {
    And,
    Or,
}

/// A flat, left-to-right chain of filter items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FilterExpr {
    pub first: Box<FilterItem>,
    pub rest: Vec<(Connective, FilterItem)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RuleBody {
    Actions(Vec<CallSyntax>),
    Nested(Vec<RuleSyntax>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RuleSyntax {
    pub tags: Vec<String>,
    pub filter: FilterExpr,
    pub body: RuleBody,
    pub pos: Position,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PrefixDecl {
    pub name: String,
    pub iri: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct RulesetSyntax {
    pub prefixes: Vec<PrefixDecl>,
    pub headers: Vec<CallSyntax>,
    pub rules: Vec<RuleSyntax>,
}

/// Parse a complete ruleset, collecting every syntax error found.
pub(crate) fn parse_ruleset(src: &str) -> (RulesetSyntax, Vec<TransformError>) {
    let mut parser = Parser { cur: Cursor::new(src) };
    let mut tree = RulesetSyntax::default();
    let mut errors = Vec::new();

    while !parser.cur.at_eof() {
        let start = parser.cur.pos();
        let result = parser.parse_top_level(&mut tree);
        if let Err(failure) = result {
            errors.push(parser.to_error(&failure));
            parser.recover(start, failure.pos);
        }
    }

    (tree, errors)
}

/// Parse a standalone filter expression (no action).
#[cfg(test)]
pub(crate) fn parse_filter_source(src: &str) -> Result<FilterExpr, TransformError> {
    let mut parser = Parser { cur: Cursor::new(src) };
    let expr = parser.parse_filter().map_err(|f| parser.to_error(&f))?;
    if !parser.cur.at_eof() {
        let failure = parser.fail("unexpected text after filter");
        return Err(parser.to_error(&failure));
    }
    Ok(expr)
}

#[derive(Debug)]
struct SyntaxFailure {
    pos: usize,
    message: String,
}

type PResult<T> = Result<T, SyntaxFailure>;

struct Parser<'a> {
    cur: Cursor<'a>,
}

impl<'a> Parser<'a> {
    fn parse_top_level(&mut self, tree: &mut RulesetSyntax) -> PResult<()> {
        if self.cur.looking_at("prefix") {
            if let Some(groups) = self.cur.eat_re(lexer::prefix_decl()) {
                if !tree.headers.is_empty() || !tree.rules.is_empty() {
                    let message = "prefix declarations must precede rules and header actions";
                    return Err(self.fail_at(self.cur.pos(), message));
                }
                let name = groups[1].unwrap_or_default().to_string();
                let iri = groups[2].unwrap_or_default().to_string();
                tree.prefixes.push(PrefixDecl { name, iri });
                return Ok(());
            }
        }

        // A call followed by ';' (or the end of input) is a header action;
        // anything else starting with a call is a function filter.
        let start = self.cur.pos();
        if self.cur.eat_re(lexer::name()).is_some() && self.cur.looking_at("(") {
            self.cur.reset(start);
            let call = self.parse_call()?;
            if self.cur.eat(";") || self.cur.at_eof() {
                if !tree.rules.is_empty() {
                    return Err(SyntaxFailure {
                        pos: start,
                        message: "header actions must precede rules".to_string(),
                    });
                }
                tree.headers.push(call);
                return Ok(());
            }
        }
        self.cur.reset(start);

        let rule = self.parse_rule()?;
        tree.rules.push(rule);
        Ok(())
    }

    fn parse_rule(&mut self) -> PResult<RuleSyntax> {
        self.cur.skip_trivia();
        let pos = self.position(self.cur.pos());

        let mut tags = Vec::new();
        if self.cur.eat("[") {
            loop {
                let tag = self.cur.eat_re(lexer::tag()).ok_or_else(|| self.fail("expected tag name"))?;
                tags.push(tag[0].unwrap_or_default().to_string());
                if self.cur.eat(",") {
                    continue;
                }
                if self.cur.eat("]") {
                    break;
                }
                return Err(self.fail("expected ',' or ']' in tag list"));
            }
        }

        let filter = self.parse_filter()?;

        let body = if self.cur.eat("->") {
            RuleBody::Actions(self.parse_actions()?)
        } else if self.cur.eat("{") {
            let mut nested = Vec::new();
            loop {
                if self.cur.eat("}") {
                    break;
                }
                if self.cur.at_eof() {
                    return Err(self.fail("unterminated rule block"));
                }
                nested.push(self.parse_rule()?);
            }
            RuleBody::Nested(nested)
        } else {
            return Err(self.fail("expected '->' or '{' after filter"));
        };

        Ok(RuleSyntax { tags, filter, body, pos })
    }

    fn parse_actions(&mut self) -> PResult<Vec<CallSyntax>> {
        if self.cur.eat("{") {
            let mut calls = Vec::new();
            while !self.cur.eat("}") {
                if self.cur.at_eof() {
                    return Err(self.fail("unterminated action block"));
                }
                calls.push(self.parse_call()?);
                self.expect_terminator()?;
            }
            if calls.is_empty() {
                return Err(self.fail("empty action block"));
            }
            self.cur.eat(";");
            return Ok(calls);
        }

        let call = self.parse_call()?;
        self.expect_terminator()?;
        Ok(vec![call])
    }

    fn expect_terminator(&mut self) -> PResult<()> {
        if self.cur.eat(";") || self.cur.at_eof() { Ok(()) } else { Err(self.fail("expected ';'")) }
    }

    fn parse_filter(&mut self) -> PResult<FilterExpr> {
        let first = Box::new(self.parse_item()?);
        let mut rest = Vec::new();
        loop {
            let op = if self.cur.eat("&&") {
                Connective::And
            } else if self.cur.eat("||") {
                Connective::Or
            } else if self.starts_item() {
                Connective::And
            } else {
                break;
            };
            rest.push((op, self.parse_item()?));
        }
        Ok(FilterExpr { first, rest })
    }

    fn starts_item(&mut self) -> bool {
        matches!(self.cur.peek(), Some(c) if c == '!' || c == '(' || c == '*' || c == '_' || c.is_ascii_alphabetic())
    }

    fn parse_item(&mut self) -> PResult<FilterItem> {
        if self.cur.eat("!") {
            return Ok(FilterItem::Not(Box::new(self.parse_item()?)));
        }
        if self.cur.eat("(") {
            let inner = self.parse_filter()?;
            if !self.cur.eat(")") {
                return Err(self.fail("expected ')'"));
            }
            return Ok(FilterItem::Group(inner));
        }
        if self.cur.eat("*") {
            return Ok(FilterItem::All);
        }

        self.cur.skip_trivia();
        let start = self.cur.pos();
        let field = self.cur.eat_re(lexer::name()).ok_or_else(|| self.fail("expected filter"))?;
        let field = field[0].unwrap_or_default().to_string();

        if self.cur.looking_at("(") {
            self.cur.reset(start);
            return Ok(FilterItem::Call(self.parse_call()?));
        }

        let op = self
            .cur
            .eat_re(lexer::comparison())
            .and_then(|g| g[0].and_then(CompareOp::parse))
            .ok_or_else(|| self.fail(&format!("expected comparison operator after '{field}'")))?;
        let value = self.parse_literal()?;
        Ok(FilterItem::Compare { field, op, value, pos: self.position(start) })
    }

    fn parse_call(&mut self) -> PResult<CallSyntax> {
        self.cur.skip_trivia();
        let pos = self.position(self.cur.pos());
        let name = self.cur.eat_re(lexer::name()).ok_or_else(|| self.fail("expected function name"))?;
        let name = name[0].unwrap_or_default().to_string();
        if !self.cur.eat("(") {
            return Err(self.fail("expected '('"));
        }

        let mut args = Vec::new();
        if !self.cur.eat(")") {
            loop {
                args.push(self.parse_literal()?);
                if self.cur.eat(",") {
                    continue;
                }
                if self.cur.eat(")") {
                    break;
                }
                return Err(self.fail("expected ',' or ')' in argument list"));
            }
        }
        Ok(CallSyntax { name, args, pos })
    }

    fn parse_literal(&mut self) -> PResult<Literal> {
        if let Some(g) = self.cur.eat_re(lexer::double_quoted()).or_else(|| self.cur.eat_re(lexer::single_quoted())) {
            return Ok(Literal::Quoted(lexer::unescape(g[1].unwrap_or_default())));
        }
        if let Some(g) = self.cur.eat_re(lexer::iri()) {
            return Ok(Literal::Iri(g[1].unwrap_or_default().to_string()));
        }
        if let Some(g) = self.cur.eat_re(lexer::bare()) {
            return Ok(Literal::Bare(g[0].unwrap_or_default().to_string()));
        }
        Err(self.fail("expected value"))
    }

    // --- errors --------------------------------------------------------------

    fn fail(&mut self, message: &str) -> SyntaxFailure {
        self.cur.skip_trivia();
        self.fail_at(self.cur.pos(), message)
    }

    fn fail_at(&self, pos: usize, message: &str) -> SyntaxFailure {
        let found = match self.cur.rest().chars().next() {
            Some(c) if pos == self.cur.pos() => format!(" (found '{c}')"),
            None if pos == self.cur.pos() => " (found end of input)".to_string(),
            _ => String::new(),
        };
        SyntaxFailure { pos, message: format!("{message}{found}") }
    }

    fn position(&self, pos: usize) -> Position {
        let (line, column) = self.cur.line_col(pos);
        Position { line, column }
    }

    fn to_error(&self, failure: &SyntaxFailure) -> TransformError {
        let Position { line, column } = self.position(failure.pos);
        TransformError::Syntax { line, column, message: failure.message.clone() }
    }

    /// Skip past the rule that started at `start` and failed at `failed`.
    fn recover(&mut self, start: usize, failed: usize) {
        let src = self.cur.source();
        let failed = failed.max(start);
        let mut depth: i32 = 0;
        for c in src[start..failed].chars() {
            match c {
                '{' => depth += 1,
                '}' => depth -= 1,
                _ => {}
            }
        }

        let mut end = src.len();
        for (offset, c) in src[failed..].char_indices() {
            match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth <= 0 {
                        end = failed + offset + 1;
                        break;
                    }
                }
                ';' if depth <= 0 => {
                    end = failed + offset + 1;
                    break;
                }
                _ => {}
            }
        }

        if end <= start {
            end = start + src[start..].chars().next().map_or(1, char::len_utf8);
        }
        self.cur.reset(end);
    }
}
