//! Lexer boundary
//!
//! Raw tokenization is delegated to sqlparser's tokenizer. This module only
//! classifies its tokens into the small set of leaf kinds the grouping passes
//! care about.

use sqlparser::tokenizer::{Token, Tokenizer, Whitespace, Word};

use crate::dialect::SqlDialect;
use crate::error::{LineageError, Result};

/// Classification of a leaf token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Keyword,
    /// SELECT, INSERT, ...
    Dml,
    /// CREATE, DROP, ...
    Ddl,
    Name,
    Literal,
    Wildcard,
    Operator,
    Comparison,
    Punctuation,
    Whitespace,
    Comment,
    Other,
}

/// A single classified token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leaf {
    pub kind: TokenKind,
    /// Exact source text
    pub value: String,
    normalized: String,
}

impl Leaf {
    pub fn new(kind: TokenKind, value: impl Into<String>) -> Self {
        let value = value.into();
        let normalized = match kind {
            TokenKind::Keyword | TokenKind::Dml | TokenKind::Ddl => value.to_uppercase(),
            _ => value.clone(),
        };
        Self {
            kind,
            value,
            normalized,
        }
    }

    fn name(value: String, unquoted: String) -> Self {
        Self {
            kind: TokenKind::Name,
            value,
            normalized: unquoted,
        }
    }

    /// Upper-cased keyword, unquoted name, or the raw text for everything else
    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    pub fn is_keyword_like(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Keyword | TokenKind::Dml | TokenKind::Ddl
        )
    }

    pub fn is_negligible(&self) -> bool {
        matches!(self.kind, TokenKind::Whitespace | TokenKind::Comment)
    }
}

const DML: &[&str] = &["SELECT", "INSERT", "UPDATE", "DELETE", "MERGE", "UPSERT"];

const DDL: &[&str] = &["CREATE", "DROP", "ALTER", "TRUNCATE"];

const KEYWORDS: &[&str] = &[
    "ALL", "AND", "ANTI", "ANY", "AS", "ASC", "BETWEEN", "BY", "CASE", "CLUSTER", "COLLATE",
    "CROSS", "CURRENT", "DEFAULT", "DESC", "DIRECTORY", "DISTINCT", "DISTRIBUTE", "ELSE", "END",
    "ESCAPE", "EXCEPT", "EXISTS", "EXTERNAL", "FALSE", "FETCH", "FILTER", "FOLLOWING", "FROM",
    "FULL", "GROUP", "HAVING", "IF", "ILIKE", "IN", "INNER", "INTERSECT", "INTERVAL", "INTO",
    "IS", "JOIN", "LATERAL", "LEFT", "LIKE", "LIMIT", "LOCAL", "MATERIALIZED", "MINUS",
    "NATURAL", "NOT", "NULL", "NULLS", "OFFSET", "ON", "OR", "ORDER", "OUTER", "OVER",
    "OVERWRITE", "PARTITION", "PRECEDING", "QUALIFY", "RANGE", "RECURSIVE", "REGEXP", "REPLACE",
    "RETURNING", "RIGHT", "RLIKE", "ROW", "ROWS", "SEMI", "SET", "SOME", "SORT", "TABLE", "TEMP",
    "TEMPORARY", "THEN", "TRANSIENT", "TRUE", "UNBOUNDED", "UNION", "USING", "VALUES", "VIEW",
    "WHEN", "WHERE", "WINDOW", "WITH",
];

/// Keywords that keep their role even when directly followed by `(`
const NEVER_FUNCTION: &[&str] = &[
    "ALL", "AND", "ANY", "AS", "BY", "CASE", "DISTINCT", "ELSE", "EXISTS", "FILTER", "FROM",
    "IN", "INTO", "JOIN", "LATERAL", "NOT", "ON", "OR", "OVER", "SELECT", "SOME", "TABLE", "THEN",
    "UNION", "USING", "VALUES", "VIEW", "WHEN", "WHERE", "WITH",
];

/// Type names that introduce a typed literal, e.g. `DATE '2020-01-01'`
const TYPED_LITERAL_PREFIX: &[&str] = &["DATE", "TIME", "TIMESTAMP"];

/// Whether an unquoted word is reserved by the lineage grammar
pub fn is_keyword(word: &str) -> bool {
    let upper = word.to_uppercase();
    let upper = upper.as_str();
    KEYWORDS.contains(&upper) || DML.contains(&upper) || DDL.contains(&upper)
}

/// Split SQL text into classified leaves
pub fn tokenize(sql: &str, dialect: SqlDialect) -> Result<Vec<Leaf>> {
    let parser_dialect = dialect.parser_dialect();
    let tokens = Tokenizer::new(parser_dialect.as_ref(), sql)
        .with_unescape(false)
        .tokenize()
        .map_err(|e| LineageError::Tokenize {
            message: e.to_string(),
        })?;
    let tokens: Vec<Token> = tokens
        .into_iter()
        .filter(|t| !matches!(t, Token::EOF))
        .collect();

    Ok((0..tokens.len()).map(|i| classify(&tokens, i)).collect())
}

fn classify(tokens: &[Token], idx: usize) -> Leaf {
    let token = &tokens[idx];
    let text = token.to_string();
    let kind = match token {
        Token::Word(word) => return classify_word(tokens, idx, word, text),
        Token::Number(_, _)
        | Token::SingleQuotedString(_)
        | Token::DoubleQuotedString(_)
        | Token::NationalStringLiteral(_)
        | Token::EscapedStringLiteral(_)
        | Token::HexStringLiteral(_)
        | Token::DollarQuotedString(_)
        | Token::Placeholder(_) => TokenKind::Literal,
        Token::Whitespace(Whitespace::SingleLineComment { .. })
        | Token::Whitespace(Whitespace::MultiLineComment(_)) => TokenKind::Comment,
        Token::Whitespace(_) => TokenKind::Whitespace,
        Token::Mul if wildcard_position(tokens, idx) => TokenKind::Wildcard,
        Token::Mul
        | Token::Plus
        | Token::Minus
        | Token::Div
        | Token::Mod
        | Token::StringConcat
        | Token::Caret
        | Token::Ampersand
        | Token::Pipe => TokenKind::Operator,
        Token::Eq
        | Token::DoubleEq
        | Token::Neq
        | Token::Lt
        | Token::Gt
        | Token::LtEq
        | Token::GtEq
        | Token::Spaceship => TokenKind::Comparison,
        Token::Comma
        | Token::Period
        | Token::SemiColon
        | Token::LParen
        | Token::RParen
        | Token::LBracket
        | Token::RBracket
        | Token::Colon
        | Token::DoubleColon => TokenKind::Punctuation,
        _ => TokenKind::Other,
    };
    Leaf::new(kind, text)
}

fn classify_word(tokens: &[Token], idx: usize, word: &Word, text: String) -> Leaf {
    if word.quote_style.is_some() {
        return Leaf::name(text, word.value.clone());
    }

    let upper = word.value.to_uppercase();
    let next = tokens.get(idx + 1);
    let prev = idx.checked_sub(1).and_then(|i| tokens.get(i));
    let dotted = matches!(next, Some(Token::Period)) || matches!(prev, Some(Token::Period));
    let called = matches!(next, Some(Token::LParen)) && !NEVER_FUNCTION.contains(&upper.as_str());

    if dotted || called {
        return Leaf::name(text, word.value.clone());
    }
    if DML.contains(&upper.as_str()) {
        return Leaf::new(TokenKind::Dml, text);
    }
    if DDL.contains(&upper.as_str()) {
        return Leaf::new(TokenKind::Ddl, text);
    }
    if KEYWORDS.contains(&upper.as_str()) {
        return Leaf::new(TokenKind::Keyword, text);
    }
    if TYPED_LITERAL_PREFIX.contains(&upper.as_str())
        && matches!(
            next_significant(tokens, idx),
            Some(Token::SingleQuotedString(_))
        )
    {
        return Leaf::new(TokenKind::Keyword, text);
    }
    Leaf::name(text, word.value.clone())
}

fn next_significant(tokens: &[Token], idx: usize) -> Option<&Token> {
    tokens[idx + 1..]
        .iter()
        .find(|t| !matches!(t, Token::Whitespace(_)))
}

/// `*` right after one of these is a wildcard rather than multiplication
fn wildcard_position(tokens: &[Token], idx: usize) -> bool {
    let prev = tokens[..idx]
        .iter()
        .rev()
        .find(|t| !matches!(t, Token::Whitespace(_)));
    match prev {
        None => true,
        Some(Token::LParen | Token::Comma | Token::Period) => true,
        Some(Token::Word(word)) if word.quote_style.is_none() => matches!(
            word.value.to_uppercase().as_str(),
            "SELECT" | "DISTINCT" | "ALL"
        ),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(sql: &str) -> Vec<(TokenKind, String)> {
        tokenize(sql, SqlDialect::Generic)
            .unwrap()
            .into_iter()
            .filter(|leaf| !leaf.is_negligible())
            .map(|leaf| (leaf.kind, leaf.value))
            .collect()
    }

    #[test]
    fn test_leaves_reproduce_source_text() {
        let sql = "SELECT a.col1, -- note\n  'x' AS y FROM tab1 /* c */ WHERE b <> 1;";
        let text: String = tokenize(sql, SqlDialect::Generic)
            .unwrap()
            .iter()
            .map(|leaf| leaf.value.as_str())
            .collect();
        assert_eq!(text, sql);
    }

    #[test]
    fn test_keyword_before_parenthesis_becomes_name() {
        let leaves = kinds("SELECT replace(col1, 'a', 'b'), IF(x, 1, 0) FROM t");
        assert_eq!(leaves[1], (TokenKind::Name, "replace".to_string()));
        assert!(leaves.contains(&(TokenKind::Name, "IF".to_string())));
    }

    #[test]
    fn test_control_keywords_keep_their_role() {
        let leaves = kinds("SELECT x IN(1) FROM t");
        assert_eq!(leaves[2], (TokenKind::Keyword, "IN".to_string()));
    }

    #[test]
    fn test_star_classification() {
        let leaves = kinds("SELECT *, t.*, count(*), a * b FROM t");
        let stars: Vec<TokenKind> = leaves
            .iter()
            .filter(|(_, value)| value == "*")
            .map(|(kind, _)| *kind)
            .collect();
        assert_eq!(
            stars,
            vec![
                TokenKind::Wildcard,
                TokenKind::Wildcard,
                TokenKind::Wildcard,
                TokenKind::Operator
            ]
        );
    }

    #[test]
    fn test_quoted_and_dotted_words_are_names() {
        let leaves = kinds("SELECT \"select\", tab.order FROM t");
        assert_eq!(leaves[1].0, TokenKind::Name);
        assert_eq!(leaves[5], (TokenKind::Name, "order".to_string()));
    }

    #[test]
    fn test_typed_literal_prefix() {
        let leaves = kinds("SELECT DATE '2020-01-01', date FROM t");
        assert_eq!(leaves[1], (TokenKind::Keyword, "DATE".to_string()));
        assert_eq!(leaves[4], (TokenKind::Name, "date".to_string()));
    }
}
