//! Statement validation
//!
//! Each statement handed to a database must be exactly one complete
//! top-level statement. Splitting a script naively on `;` cuts procedural
//! blocks apart (`DO $$ BEGIN ...; END $$`), which leaves fragments like
//! `END IF` or `END $$` that fail on the server after earlier fragments have
//! already run. The validator catches those fragments before execution using
//! the dialect's own tokenizer, so semicolons inside strings, comments and
//! dollar-quoted bodies are never miscounted.

use sqlparser::tokenizer::{Token, Word};

use crate::dialect::SqlDialect;
use crate::error::{SqlError, SqlResult};

const TRANSACTION_CONTROL: &[&str] = &["BEGIN", "COMMIT", "ROLLBACK", "START", "SAVEPOINT", "RELEASE"];

/// Validate that `sql` is a single, complete statement for `dialect`
pub fn validate_statement(sql: &str, dialect: &dyn SqlDialect) -> SqlResult<()> {
    let tokens = dialect.tokenize(sql).map_err(|e| {
        let message = e.to_string();
        if !message.to_ascii_lowercase().contains("dollar") {
            SqlError::TokenizeError { message }
        } else if starts_with_end(sql) {
            // `END $$` closes a block whose opening ran as another statement.
            SqlError::DanglingBlockFragment {
                fragment: fragment(sql),
            }
        } else {
            SqlError::UnterminatedBlock { message }
        }
    })?;

    let significant: Vec<&Token> = tokens.iter().filter(|t| is_significant(t)).collect();

    let statements = significant
        .split(|t| matches!(t, Token::SemiColon))
        .filter(|segment| !segment.is_empty())
        .count();
    if statements == 0 {
        return Err(SqlError::EmptyStatement);
    }
    if statements > 1 {
        return Err(SqlError::MultipleStatements { count: statements });
    }

    let Some(first) = significant.iter().find(|t| !matches!(t, Token::SemiColon)) else {
        return Err(SqlError::EmptyStatement);
    };

    match first {
        Token::DollarQuotedString(_) => {
            return Err(SqlError::DanglingBlockFragment {
                fragment: fragment(sql),
            })
        }
        Token::Word(w) if is_word(w, "END") => {
            return Err(SqlError::DanglingBlockFragment {
                fragment: fragment(sql),
            })
        }
        Token::Word(w) if TRANSACTION_CONTROL.iter().any(|kw| is_word(w, kw)) => {
            return Err(SqlError::UnsupportedConstruct {
                dialect: dialect.name(),
                construct: format!("transaction control statement {}", w.value.to_uppercase()),
            });
        }
        Token::Word(w) if is_word(w, "DO") => return validate_block(&significant, dialect),
        _ => {}
    }

    Ok(())
}

fn validate_block(tokens: &[&Token], dialect: &dyn SqlDialect) -> SqlResult<()> {
    if !dialect.supports_procedural_blocks() {
        return Err(SqlError::UnsupportedConstruct {
            dialect: dialect.name(),
            construct: "procedural DO block".to_string(),
        });
    }

    let body = tokens.iter().find_map(|t| match t {
        Token::DollarQuotedString(s) => Some(s.value.as_str()),
        Token::SingleQuotedString(s) => Some(s.as_str()),
        _ => None,
    });
    let Some(body) = body else {
        return Err(SqlError::UnterminatedBlock {
            message: "DO statement has no quoted body".to_string(),
        });
    };

    let inner = dialect
        .tokenize(body)
        .map_err(|e| SqlError::TokenizeError {
            message: e.to_string(),
        })?;
    let words: Vec<&Word> = inner
        .iter()
        .filter_map(|t| match t {
            Token::Word(w) if w.quote_style.is_none() => Some(w),
            _ => None,
        })
        .collect();

    let mut begins = 0;
    let mut ends = 0;
    for (i, word) in words.iter().enumerate() {
        if is_word(word, "BEGIN") {
            begins += 1;
        } else if is_word(word, "END") {
            let closes_statement = words
                .get(i + 1)
                .is_some_and(|next| ["IF", "LOOP", "CASE"].iter().any(|kw| is_word(next, kw)));
            if !closes_statement {
                ends += 1;
            }
        }
    }

    if begins != ends {
        return Err(SqlError::UnbalancedBlock { begins, ends });
    }
    Ok(())
}

fn is_significant(token: &Token) -> bool {
    !matches!(token, Token::Whitespace(_) | Token::EOF)
}

fn starts_with_end(sql: &str) -> bool {
    sql.split_whitespace()
        .next()
        .is_some_and(|w| w.eq_ignore_ascii_case("END"))
}

fn is_word(word: &Word, keyword: &str) -> bool {
    word.quote_style.is_none() && word.value.eq_ignore_ascii_case(keyword)
}

/// Leading text of a statement for error messages
fn fragment(sql: &str) -> String {
    let trimmed = sql.trim();
    match trimmed.char_indices().nth(40) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
#[path = "validator_test.rs"]
mod tests;
