//! In-process evaluation of a clause tree against records

use quarry_core::{Boolean, Clause, CoreError, Direction, Operator, OrderSpec, Record, Value};
use std::cmp::Ordering;

/// Whether `record` satisfies `clauses`
///
/// Connectors follow SQL precedence: AND binds tighter than OR, and the
/// connector of the first clause is ignored.
pub fn matches(record: &Record, clauses: &[Clause]) -> Result<bool, CoreError> {
    let mut any = false;
    let mut current = true;

    for (index, clause) in clauses.iter().enumerate() {
        let hit = eval_clause(record, clause)?;
        if index > 0 && clause.boolean() == Boolean::Or {
            any |= current;
            current = hit;
        } else {
            current &= hit;
        }
    }

    Ok(any || current)
}

fn eval_clause(record: &Record, clause: &Clause) -> Result<bool, CoreError> {
    match clause {
        Clause::Compare {
            field,
            operator,
            value,
            ..
        } => match present(record, field) {
            Some(actual) => compare(actual, *operator, value),
            None => Ok(false),
        },
        Clause::In {
            field,
            values,
            negated,
            ..
        } => Ok(present(record, field).is_some_and(|actual| {
            values.iter().any(|v| actual.loose_eq(v)) != *negated
        })),
        Clause::Between {
            field,
            low,
            high,
            negated,
            ..
        } => Ok(present(record, field).is_some_and(|actual| {
            let inside = matches!(
                actual.loose_cmp(low),
                Some(Ordering::Greater | Ordering::Equal)
            ) && matches!(
                actual.loose_cmp(high),
                Some(Ordering::Less | Ordering::Equal)
            );
            inside != *negated
        })),
        Clause::Null { field, negated, .. } => Ok(present(record, field).is_none() != *negated),
        Clause::Date {
            field,
            operator,
            date,
            ..
        } => {
            let Some(text) = present(record, field).and_then(Value::to_text) else {
                return Ok(false);
            };
            let day = text.get(..10).unwrap_or(&text);
            let ordering = day.cmp(date.as_str());
            match operator {
                Operator::Eq | Operator::DateEq => Ok(ordering == Ordering::Equal),
                Operator::Ne => Ok(ordering != Ordering::Equal),
                Operator::Gt => Ok(ordering == Ordering::Greater),
                Operator::Gte => Ok(ordering != Ordering::Less),
                Operator::Lt => Ok(ordering == Ordering::Less),
                Operator::Lte => Ok(ordering != Ordering::Greater),
                other => Err(CoreError::InvalidOperator(format!(
                    "'{}' cannot compare dates",
                    other
                ))),
            }
        }
        Clause::Fuzzy {
            field,
            term,
            distance,
            ..
        } => {
            let Some(text) = present(record, field).and_then(Value::to_text) else {
                return Ok(false);
            };
            let text = text.to_lowercase();
            let term = term.to_lowercase();
            let limit = *distance as usize;
            Ok(levenshtein_distance(&text, &term) <= limit
                || text
                    .split_whitespace()
                    .any(|word| levenshtein_distance(word, &term) <= limit))
        }
        Clause::Group { clauses, .. } => matches(record, clauses),
        Clause::Has {
            relation,
            clauses,
            negated,
            ..
        } => {
            let mut exists = false;
            for related in related_records(record, relation) {
                if matches(related, clauses)? {
                    exists = true;
                    break;
                }
            }
            Ok(exists != *negated)
        }
    }
}

fn compare(actual: &Value, operator: Operator, expected: &Value) -> Result<bool, CoreError> {
    let ordering = || actual.loose_cmp(expected);
    let result = match operator {
        Operator::Eq => actual.loose_eq(expected),
        Operator::Ne => !actual.loose_eq(expected),
        Operator::Gt => ordering() == Some(Ordering::Greater),
        Operator::Gte => matches!(ordering(), Some(Ordering::Greater | Ordering::Equal)),
        Operator::Lt => ordering() == Some(Ordering::Less),
        Operator::Lte => matches!(ordering(), Some(Ordering::Less | Ordering::Equal)),
        Operator::Like | Operator::Ilike | Operator::NotLike => {
            match (actual.to_text(), expected.to_text()) {
                (Some(text), Some(pattern)) => {
                    let hit = like_match(&pattern, &text, operator == Operator::Ilike);
                    hit != (operator == Operator::NotLike)
                }
                _ => false,
            }
        }
        other => {
            return Err(CoreError::InvalidOperator(format!(
                "'{}' is not a binary comparison",
                other
            )))
        }
    };
    Ok(result)
}

/// Field value at a dotted path, treating null as absent
fn present<'a>(record: &'a Record, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut value = record.get(segments.next()?)?;
    for segment in segments {
        value = value.as_object()?.get(segment)?;
    }
    (!value.is_null()).then_some(value)
}

/// Records reachable through a dotted relation path; to-many relations are
/// arrays of objects, to-one relations are objects
fn related_records<'a>(record: &'a Record, relation: &str) -> Vec<&'a Record> {
    let mut current = vec![record];
    for segment in relation.split('.') {
        let mut next = Vec::new();
        for row in current {
            match row.get(segment) {
                Some(Value::Object(map)) => next.push(map),
                Some(Value::Array(items)) => {
                    next.extend(items.iter().filter_map(Value::as_object));
                }
                _ => {}
            }
        }
        current = next;
    }
    current
}

enum LikeToken {
    AnySeq,
    AnyChar,
    Literal(char),
}

/// SQL LIKE matching: `%` any run, `_` one character, `\` escapes
pub fn like_match(pattern: &str, text: &str, case_insensitive: bool) -> bool {
    let (pattern, text) = if case_insensitive {
        (pattern.to_lowercase(), text.to_lowercase())
    } else {
        (pattern.to_string(), text.to_string())
    };

    let mut tokens = Vec::new();
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        tokens.push(match c {
            '\\' => LikeToken::Literal(chars.next().unwrap_or('\\')),
            '%' => LikeToken::AnySeq,
            '_' => LikeToken::AnyChar,
            other => LikeToken::Literal(other),
        });
    }

    let text: Vec<char> = text.chars().collect();
    let (mut p, mut t) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match tokens.get(p) {
            Some(LikeToken::AnySeq) => {
                backtrack = Some((p + 1, t));
                p += 1;
            }
            Some(LikeToken::AnyChar) => {
                p += 1;
                t += 1;
            }
            Some(LikeToken::Literal(c)) if *c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match backtrack {
                Some((resume, start)) => {
                    p = resume;
                    t = start + 1;
                    backtrack = Some((resume, start + 1));
                }
                None => return false,
            },
        }
    }

    tokens[p..].iter().all(|token| matches!(token, LikeToken::AnySeq))
}

/// Calculate Levenshtein distance between two strings
pub fn levenshtein_distance(s1: &str, s2: &str) -> usize {
    let s1_chars: Vec<char> = s1.chars().collect();
    let s2_chars: Vec<char> = s2.chars().collect();
    let len1 = s1_chars.len();
    let len2 = s2_chars.len();

    if len1 == 0 {
        return len2;
    }
    if len2 == 0 {
        return len1;
    }

    let mut matrix = vec![vec![0; len2 + 1]; len1 + 1];
    for (i, row) in matrix.iter_mut().enumerate() {
        row[0] = i;
    }
    for j in 0..=len2 {
        matrix[0][j] = j;
    }

    for (i, &c1) in s1_chars.iter().enumerate() {
        for (j, &c2) in s2_chars.iter().enumerate() {
            let cost = usize::from(c1 != c2);
            matrix[i + 1][j + 1] = (matrix[i][j + 1] + 1)
                .min(matrix[i + 1][j] + 1)
                .min(matrix[i][j] + cost);
        }
    }

    matrix[len1][len2]
}

/// Stable multi-key sort; nulls sort first ascending
pub(crate) fn sort_records(records: &mut [Record], orders: &[OrderSpec]) {
    if orders.is_empty() {
        return;
    }
    records.sort_by(|a, b| {
        for order in orders {
            let ordering = match (present(a, &order.field), present(b, &order.field)) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (Some(x), Some(y)) => x.loose_cmp(y).unwrap_or(Ordering::Equal),
            };
            let ordering = match order.direction {
                Direction::Asc => ordering,
                Direction::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}
