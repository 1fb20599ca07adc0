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

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Duration, FixedOffset, Utc};

// All day counting happens at UTC+02:00, regardless of where the CLI runs.
const REFERENCE_OFFSET_SECS: i32 = 2 * 3600;

/// Format of `date_created` values returned by the mesh API.
pub const DATE_CREATED_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f%z";

const THRESHOLD_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f%:z";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ItemKind {
    Node,
    Port,
    Interface,
}

/// Per-kind collection and field names plus the legal filter vocabularies.
/// Resolved from this table once, never rebuilt from the kind label.
pub struct KindFields {
    pub collection: &'static str,
    pub singular: &'static str,
    pub state_field: &'static str,
    pub type_field: &'static str,
    pub states: &'static [&'static str],
    pub types: &'static [&'static str],
}

const NODE_FIELDS: KindFields = KindFields {
    collection: "nodes",
    singular: "node",
    state_field: "node_state",
    type_field: "node_type",
    states: &[
        "provisioned",
        "started",
        "active",
        "error",
        "stopped",
        "suspended",
    ],
    types: &["operational", "digital-twin", "aggregate"],
};

const PORT_FIELDS: KindFields = KindFields {
    collection: "ports",
    singular: "port",
    state_field: "port_state",
    type_field: "port_type",
    states: &["open", "closed"],
    types: &[],
};

const INTERFACE_FIELDS: KindFields = KindFields {
    collection: "interfaces",
    singular: "interface",
    state_field: "interface_state",
    type_field: "interface_type",
    states: &[],
    types: &[],
};

impl ItemKind {
    pub fn fields(self) -> &'static KindFields {
        match self {
            ItemKind::Node => &NODE_FIELDS,
            ItemKind::Port => &PORT_FIELDS,
            ItemKind::Interface => &INTERFACE_FIELDS,
        }
    }

    pub fn collection(self) -> &'static str {
        self.fields().collection
    }

    pub fn singular(self) -> &'static str {
        self.fields().singular
    }
}

/// One query against a single collection endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub collection: &'static str,
    pub params: Vec<(String, String)>,
}

/// Raw list flags as they arrive from the CLI, before resolution.
#[derive(Debug, Default, Clone)]
pub struct ListFlags {
    pub all: bool,
    pub state: Option<String>,
    pub item_type: Option<String>,
    pub interface: Option<String>,
    pub age: Option<u32>,
}

/// The legal filter combinations for `ls`, in precedence order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListFilter {
    StateAndAge { state: String, age: u32 },
    TypeAndAge { item_type: String, age: u32 },
    TypeAndState { item_type: String, state: String },
    State(String),
    Type(String),
    Interfaces { node_id: String },
    Age(u32),
    All,
}

impl ListFilter {
    /// Resolves the flag set to a single filter. Exactly the documented
    /// combinations are accepted; anything else is ambiguous and rejected
    /// before any request goes out. `Ok(None)` means no flag was given.
    pub fn resolve(flags: &ListFlags) -> Result<Option<Self>> {
        let f = flags.clone();
        let filter = match (f.all, f.state, f.item_type, f.interface, f.age) {
            (false, Some(state), None, None, Some(age)) => Self::StateAndAge { state, age },
            (false, None, Some(item_type), None, Some(age)) => Self::TypeAndAge { item_type, age },
            (false, Some(state), Some(item_type), None, None) => {
                Self::TypeAndState { item_type, state }
            }
            (false, Some(state), None, None, None) => Self::State(state),
            (false, None, Some(item_type), None, None) => Self::Type(item_type),
            (false, None, None, Some(node_id), None) => Self::Interfaces { node_id },
            (false, None, None, None, Some(age)) => Self::Age(age),
            (true, None, None, None, None) => Self::All,
            (false, None, None, None, None) => return Ok(None),
            _ => bail!(
                "ambiguous filter combination; supported: --all, --state, --type, --age, \
                 --interface <node_id>, --state --age, --type --age, --type --state"
            ),
        };
        Ok(Some(filter))
    }

    /// Checks state/type values against the kind's vocabulary.
    pub fn validate(&self, kind: ItemKind) -> Result<()> {
        match self {
            Self::StateAndAge { state, .. } | Self::State(state) => check_state(kind, state),
            Self::TypeAndAge { item_type, .. } | Self::Type(item_type) => {
                check_type(kind, item_type)
            }
            Self::TypeAndState { item_type, state } => {
                check_state(kind, state)?;
                check_type(kind, item_type)
            }
            Self::Interfaces { .. } | Self::Age(_) | Self::All => Ok(()),
        }
    }

    /// Does this filter redirect the request to the interfaces collection?
    pub fn targets_interfaces(&self) -> bool {
        matches!(self, Self::Interfaces { .. })
    }

    pub fn into_query(self, kind: ItemKind, now: DateTime<FixedOffset>) -> Query {
        let fields = kind.fields();
        let (collection, params) = match self {
            Self::StateAndAge { state, age } => (
                fields.collection,
                vec![
                    select_all(),
                    ("date_created".into(), gte(&age_threshold(now, age))),
                    (fields.state_field.into(), eq(&state)),
                ],
            ),
            Self::TypeAndAge { item_type, age } => (
                fields.collection,
                vec![
                    select_all(),
                    ("date_created".into(), gte(&age_threshold(now, age))),
                    (fields.type_field.into(), eq(&item_type)),
                ],
            ),
            Self::TypeAndState { item_type, state } => (
                fields.collection,
                vec![
                    select_all(),
                    (fields.state_field.into(), eq(&state)),
                    (fields.type_field.into(), eq(&item_type)),
                ],
            ),
            Self::State(state) => (
                fields.collection,
                vec![select_all(), (fields.state_field.into(), eq(&state))],
            ),
            Self::Type(item_type) => (
                fields.collection,
                vec![(fields.type_field.into(), eq(&item_type))],
            ),
            Self::Interfaces { node_id } => (
                ItemKind::Interface.collection(),
                vec![("node_id".into(), eq(&node_id))],
            ),
            Self::Age(age) => (
                fields.collection,
                vec![
                    select_all(),
                    ("date_created".into(), gte(&age_threshold(now, age))),
                ],
            ),
            Self::All => (fields.collection, vec![]),
        };
        Query { collection, params }
    }
}

/// Phrase full-text search on the display name.
pub fn search_by_name(kind: ItemKind, argument: &str) -> Query {
    Query {
        collection: kind.collection(),
        params: vec![("name".into(), format!("phfts.{argument}"))],
    }
}

/// Exact-match lookup by id; expected to return zero or one records.
pub fn search_by_id(kind: ItemKind, argument: &str) -> Query {
    Query {
        collection: kind.collection(),
        params: vec![("id".into(), eq(argument))],
    }
}

/// Lineage edges for a node. Both directions query `ancestor_nodes` by
/// `root_node_id`; the direction only decides which edge fields get rendered.
pub fn lineage(node_id: &str) -> Query {
    Query {
        collection: "ancestor_nodes",
        params: vec![("root_node_id".into(), eq(node_id))],
    }
}

/// A query that fetches the whole collection, used by `total` and `--all`.
pub fn fetch_all(kind: ItemKind) -> Query {
    Query {
        collection: kind.collection(),
        params: vec![],
    }
}

fn check_state(kind: ItemKind, state: &str) -> Result<()> {
    let fields = kind.fields();
    if fields.states.is_empty() {
        bail!("{}s cannot be filtered by state", fields.singular);
    }
    if !fields.states.contains(&state) {
        bail!(
            "`{state}` is not a valid {} state (expected one of: {})",
            fields.singular,
            fields.states.join(", ")
        );
    }
    Ok(())
}

fn check_type(kind: ItemKind, item_type: &str) -> Result<()> {
    let fields = kind.fields();
    if fields.types.is_empty() {
        bail!("{}s cannot be filtered by type", fields.singular);
    }
    if !fields.types.contains(&item_type) {
        bail!(
            "`{item_type}` is not a valid {} type (expected one of: {})",
            fields.singular,
            fields.types.join(", ")
        );
    }
    Ok(())
}

fn select_all() -> (String, String) {
    ("select".into(), "*".into())
}

fn eq(value: &str) -> String {
    format!("eq.{value}")
}

fn gte(value: &str) -> String {
    format!("gte.{value}")
}

/// Current instant in the reference timezone. Every age computation — the
/// `gte.` threshold in filters and the displayed "age in days" column — goes
/// through this same clock.
pub fn reference_now() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&reference_offset())
}

fn reference_offset() -> FixedOffset {
    FixedOffset::east_opt(REFERENCE_OFFSET_SECS).expect("reference offset is in range")
}

/// Timestamp of `now - days`, formatted for a `date_created=gte.` clause.
pub fn age_threshold(now: DateTime<FixedOffset>, days: u32) -> String {
    (now - Duration::days(i64::from(days)))
        .format(THRESHOLD_FORMAT)
        .to_string()
}

/// Whole days elapsed between `date_created` and `now`.
pub fn item_age_days(now: DateTime<FixedOffset>, date_created: &str) -> Result<i64> {
    let created = DateTime::parse_from_str(date_created, DATE_CREATED_FORMAT)
        .with_context(|| format!("parsing date_created `{date_created}`"))?;
    Ok((now - created).num_days())
}
