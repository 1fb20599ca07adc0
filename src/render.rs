// meshctl - CLI for the mesh data API
// Copyright (C) 2025 meshctl contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use crate::config::OutputFormat;
use crate::query::{self, ItemKind};
use anyhow::Result;
use chrono::{DateTime, FixedOffset};
use serde_json::Value;

const NO_RESULTS: &str = "Your query returned no results. Please refine your search and try again.";
const JSON_HINT: &str =
    "Hint: to view output in JSON format, append --json or -j to the previous command.";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputMode {
    Table,
    Json,
}

/// An explicit per-invocation flag wins over the persisted preference.
pub fn resolve_mode(json_flag: bool, stored: OutputFormat) -> OutputMode {
    if json_flag || stored == OutputFormat::Json {
        OutputMode::Json
    } else {
        OutputMode::Table
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Ancestors,
    Descendants,
}

impl Direction {
    fn prefix(self) -> &'static str {
        match self {
            Direction::Ancestors => "ancestor",
            Direction::Descendants => "descendant",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Direction::Ancestors => "ANCESTOR",
            Direction::Descendants => "DESCENDANT",
        }
    }
}

/// Prints a result set for one item kind in the requested mode.
pub fn print_items(
    kind: ItemKind,
    rows: &[Value],
    mode: OutputMode,
    include_schema: bool,
    now: DateTime<FixedOffset>,
) -> Result<()> {
    if rows.is_empty() {
        println!("{NO_RESULTS}");
        return Ok(());
    }
    match mode {
        OutputMode::Json => print_json(rows)?,
        OutputMode::Table => {
            let (headers, table) = match kind {
                ItemKind::Node => (node_headers(), node_rows(rows, now)?),
                ItemKind::Port => (port_headers(), port_rows(rows)),
                ItemKind::Interface => (
                    interface_headers(include_schema),
                    interface_rows(rows, include_schema),
                ),
            };
            print_table(&headers, &table);
            println!();
            println!("{JSON_HINT}");
        }
    }
    Ok(())
}

/// Prints the lineage of a node as a table or tree, deduplicated by name.
pub fn print_lineage(
    edges: &[Value],
    root_name: &str,
    direction: Direction,
    tree: bool,
    mode: OutputMode,
) -> Result<()> {
    if mode == OutputMode::Json {
        return print_json(edges);
    }
    let entries = lineage_entries(edges, root_name, direction);
    if entries.is_empty() {
        println!("{NO_RESULTS}");
        return Ok(());
    }
    if tree {
        println!();
        println!("{} TREE: {}", direction.label(), root_name.to_uppercase());
        for (index, entry) in entries.iter().enumerate() {
            let branch = if index + 1 == entries.len() {
                "└─"
            } else {
                "├─"
            };
            println!("{branch} {}", entry.name);
        }
    } else {
        println!("{}S: {}", direction.label(), root_name.to_uppercase());
        let table: Vec<Vec<String>> = entries
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                vec![
                    (index + 1).to_string(),
                    entry.name.clone(),
                    entry.category.clone(),
                    entry.id.clone(),
                ]
            })
            .collect();
        print_table(&["#", "Name", "Category", "ID"], &table);
    }
    Ok(())
}

pub fn print_total(kind: ItemKind, count: usize) {
    println!("There are {count} {}s in your mesh.", kind.singular());
}

#[derive(Debug, PartialEq, Eq)]
struct LineageEntry {
    name: String,
    category: String,
    id: String,
}

/// Related nodes in response order, collapsed by name. The root's own name is
/// seeded into the seen-set so the queried node never lists itself.
fn lineage_entries(edges: &[Value], root_name: &str, direction: Direction) -> Vec<LineageEntry> {
    let prefix = direction.prefix();
    let mut seen = vec![root_name.to_string()];
    let mut entries = Vec::new();
    for edge in edges {
        let name = cell(edge, &format!("{prefix}_node_name"));
        if seen.contains(&name) {
            continue;
        }
        entries.push(LineageEntry {
            name: name.clone(),
            category: cell(edge, &format!("{prefix}_node_category")),
            id: cell(edge, &format!("{prefix}_node_id")),
        });
        seen.push(name);
    }
    entries
}

fn node_headers() -> Vec<&'static str> {
    vec!["#", "Name", "State", "Age (days)", "ID"]
}

fn node_rows(rows: &[Value], now: DateTime<FixedOffset>) -> Result<Vec<Vec<String>>> {
    rows.iter()
        .enumerate()
        .map(|(index, item)| {
            let age = query::item_age_days(now, &cell(item, "date_created"))?;
            Ok(vec![
                (index + 1).to_string(),
                cell(item, "name"),
                cell(item, "node_state"),
                age.to_string(),
                cell(item, "id"),
            ])
        })
        .collect()
}

fn port_headers() -> Vec<&'static str> {
    vec!["Number", "Name", "State", "Description", "Associated node"]
}

fn port_rows(rows: &[Value]) -> Vec<Vec<String>> {
    rows.iter()
        .map(|item| {
            vec![
                cell(item, "port_number"),
                cell(item, "name"),
                cell(item, "port_state"),
                cell(item, "description"),
                cell(item, "node_id"),
            ]
        })
        .collect()
}

fn interface_headers(include_schema: bool) -> Vec<&'static str> {
    let mut headers = vec!["Interface ID", "Sub scheme", "Port number", "Node ID"];
    if include_schema {
        headers.push("Schema definition");
    }
    headers
}

fn interface_rows(rows: &[Value], include_schema: bool) -> Vec<Vec<String>> {
    rows.iter()
        .map(|item| {
            let mut row = vec![
                cell(item, "id"),
                cell(item, "interface_sub_scheme"),
                cell(item, "port_number"),
                cell(item, "node_id"),
            ];
            if include_schema {
                row.push(cell(item, "schema_definition_function"));
            }
            row
        })
        .collect()
}

fn print_json(rows: &[Value]) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&Value::Array(rows.to_vec()))?);
    Ok(())
}

fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (index, cell) in row.iter().enumerate() {
            widths[index] = widths[index].max(cell.len());
        }
    }
    for (index, header) in headers.iter().enumerate() {
        if index > 0 {
            print!("  ");
        }
        print!("{:width$}", header, width = widths[index]);
    }
    println!();
    for (index, width) in widths.iter().enumerate() {
        if index > 0 {
            print!("  ");
        }
        print!("{:-<width$}", "", width = *width);
    }
    println!();
    for row in rows {
        for (index, cell) in row.iter().enumerate() {
            if index > 0 {
                print!("  ");
            }
            print!("{:width$}", cell, width = widths[index]);
        }
        println!();
    }
}

fn cell(item: &Value, key: &str) -> String {
    match item.get(key) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => other.to_string(),
    }
}
