//! Constraint naming convention.
//!
//! Generated DDL names its constraints through these helpers so migration
//! tooling sees stable names across schema revisions.

/// `ix_<table>_<column>`: keyed on the column label, i.e. the table-qualified column.
pub fn index(table: &str, column: &str) -> String {
    format!("ix_{}_{}", table, column)
}

pub fn unique(table: &str, column: &str) -> String {
    format!("uq_{}_{}", table, column)
}

pub fn check(table: &str, name: &str) -> String {
    format!("ck_{}_{}", table, name)
}

pub fn foreign_key(table: &str, column: &str, referred_table: &str) -> String {
    format!("fk_{}_{}_{}", table, column, referred_table)
}

pub fn primary_key(table: &str) -> String {
    format!("pk_{}", table)
}
