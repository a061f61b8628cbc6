//! Translation of [`Predicate`] trees into SQLite `WHERE` fragments.
//!
//! Field, table and key names come from compiled-in relation metadata and are
//! written verbatim; every value is bound.

use sqlx::{QueryBuilder, Sqlite};

use crate::authz::{Comparison, Predicate, Scalar};

/// Append `predicate` to `builder`, with `root` as the alias of the queried table.
pub fn push_predicate(builder: &mut QueryBuilder<'_, Sqlite>, predicate: &Predicate, root: &str) {
    let mut aliases = 0usize;
    push_node(builder, predicate, root, &mut aliases);
}

fn push_node(builder: &mut QueryBuilder<'_, Sqlite>, predicate: &Predicate, alias: &str, aliases: &mut usize) {
    match predicate {
        Predicate::Always => {
            builder.push("1 = 1");
        }
        Predicate::Never => {
            builder.push("1 = 0");
        }
        Predicate::All(parts) => push_joined(builder, parts, " AND ", "1 = 1", alias, aliases),
        Predicate::Any(parts) => push_joined(builder, parts, " OR ", "1 = 0", alias, aliases),
        Predicate::Not(inner) => {
            // NULL comparisons count as false before negation, as in memory.
            builder.push("NOT COALESCE((");
            push_node(builder, inner, alias, aliases);
            builder.push("), 0)");
        }
        Predicate::Compare { field, op, value } => {
            let op = match op {
                Comparison::Eq => "=",
                Comparison::Ne => "<>",
            };
            builder.push(format!("{alias}.{field} {op} "));
            push_scalar(builder, value);
        }
        Predicate::In { field, values } => {
            if values.is_empty() {
                builder.push("1 = 0");
                return;
            }
            builder.push(format!("{alias}.{field} IN ("));
            for (i, value) in values.iter().enumerate() {
                if i > 0 {
                    builder.push(", ");
                }
                push_scalar(builder, value);
            }
            builder.push(")");
        }
        Predicate::Related { relation, predicate } => {
            *aliases += 1;
            let child = format!("t{aliases}");
            builder.push(format!(
                "EXISTS (SELECT 1 FROM {table} AS {child} WHERE {child}.{fk} = {alias}.{lk} AND (",
                table = relation.table,
                fk = relation.foreign_key,
                lk = relation.local_key,
            ));
            push_node(builder, predicate, &child, aliases);
            builder.push("))");
        }
    }
}

fn push_joined(
    builder: &mut QueryBuilder<'_, Sqlite>,
    parts: &[Predicate],
    separator: &str,
    empty: &str,
    alias: &str,
    aliases: &mut usize,
) {
    if parts.is_empty() {
        builder.push(empty);
        return;
    }

    builder.push("(");
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            builder.push(separator);
        }
        push_node(builder, part, alias, aliases);
    }
    builder.push(")");
}

fn push_scalar(builder: &mut QueryBuilder<'_, Sqlite>, value: &Scalar) {
    match value {
        Scalar::Text(s) => {
            builder.push_bind(s.clone());
        }
        Scalar::Int(i) => {
            builder.push_bind(*i);
        }
        Scalar::Bool(b) => {
            builder.push_bind(*b);
        }
    }
}
