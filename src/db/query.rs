//! SELECT / INSERT text built from table shapes.

use crate::db::entity::{Column, Relation, TableShape};
use crate::db::schema::quote;

fn select_list(shape: &TableShape, alias: &str, prefix: &str) -> Vec<String> {
    shape
        .columns
        .iter()
        .map(|c| {
            format!(
                "{}.{} AS {}",
                quote(alias),
                quote(c.name),
                quote(&format!("{prefix}{}", c.name))
            )
        })
        .collect()
}

/// `SELECT` every column of `shape`, optionally LEFT JOINing one has-one
/// relation whose columns come back as `<alias>__<column>`.
///
/// No `ORDER BY` is added.
pub fn select_sql(shape: &TableShape, relation: Option<&Relation>) -> String {
    let mut columns = select_list(shape, shape.alias, "");
    let mut join = String::new();
    if let Some(rel) = relation {
        columns.extend(select_list(rel.target, rel.alias, &rel.prefix()));
        join = format!(
            " LEFT JOIN {} AS {} ON {}.{} = {}.{}",
            quote(rel.target.table),
            quote(rel.alias),
            quote(rel.alias),
            quote(rel.join_column),
            quote(shape.alias),
            quote(rel.base_column)
        );
    }
    format!(
        "SELECT {} FROM {} AS {}{}",
        columns.join(", "),
        quote(shape.table),
        quote(shape.alias),
        join
    )
}

pub fn select_where_sql(shape: &TableShape, condition: &str) -> String {
    format!("{} WHERE {} LIMIT 1", select_sql(shape, None), condition)
}

pub fn insert_sql(table: &str, columns: &[&Column]) -> String {
    if columns.is_empty() {
        return format!("INSERT INTO {} DEFAULT VALUES", quote(table));
    }
    let names: Vec<String> = columns.iter().map(|c| quote(c.name)).collect();
    let marks = vec!["?"; columns.len()].join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote(table),
        names.join(", "),
        marks
    )
}

/// Number of values a condition binds, counting `?` and `?NNN` placeholders
/// outside quoted literals and identifiers.
///
/// A bare `?` takes the number after the largest seen so far and `?NNN`
/// names slot `NNN`, so `"a = ?1 OR b = ?1"` needs one value.
pub fn count_placeholders(condition: &str) -> usize {
    let mut largest = 0usize;
    let mut quote_char: Option<char> = None;
    let mut chars = condition.chars().peekable();
    while let Some(ch) = chars.next() {
        match (quote_char, ch) {
            (None, '\'' | '"') => quote_char = Some(ch),
            (None, '?') => {
                let mut digits = String::new();
                while let Some(d) = chars.next_if(char::is_ascii_digit) {
                    digits.push(d);
                }
                match digits.parse::<usize>() {
                    Ok(n) => largest = largest.max(n),
                    Err(_) => largest += 1,
                }
            }
            (Some(q), c) if c == q => quote_char = None,
            _ => {}
        }
    }
    largest
}
