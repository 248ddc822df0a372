//! Filter trees and their OData v2 serialization
//!
//! A filter is a tagged tree of conditions and logic-connected groups,
//! compiled into a single `$filter` expression string. Trees are either built
//! programmatically or reconstructed from the flat `field_<id>` /
//! `operator_<id>` / `value_<id>` key convention of the configuration form.

use anyhow::Result;
use serde_json::Value;
use std::collections::BTreeMap;

/// Comparison operator of one condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    Like,
    /// List membership; the dialect has no native operator for it, so it is
    /// compiled into a disjunction of equality clauses
    In,
}

impl FilterOperator {
    /// Parse a form operator tag. Unknown tags are rejected rather than
    /// silently treated as equality.
    pub fn parse(tag: &str) -> Result<Self> {
        match tag.to_ascii_lowercase().as_str() {
            "eq" => Ok(Self::Eq),
            "ne" => Ok(Self::Ne),
            "gt" => Ok(Self::Gt),
            "lt" => Ok(Self::Lt),
            "ge" => Ok(Self::Ge),
            "le" => Ok(Self::Le),
            "like" => Ok(Self::Like),
            "in" => Ok(Self::In),
            other => anyhow::bail!("Unknown filter operator: {}", other),
        }
    }

    fn token(&self) -> &'static str {
        match self {
            Self::Eq | Self::In => "eq",
            Self::Ne => "ne",
            Self::Gt => "gt",
            Self::Lt => "lt",
            Self::Ge => "ge",
            Self::Le => "le",
            Self::Like => "like",
        }
    }
}

/// Logic connector between the children of a group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connector {
    And,
    Or,
}

impl Connector {
    pub fn parse(tag: &str) -> Self {
        if tag.eq_ignore_ascii_case("or") { Self::Or } else { Self::And }
    }

    fn token(&self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
        }
    }
}

/// One node of a filter tree
#[derive(Debug, Clone, PartialEq)]
pub enum FilterNode {
    Condition {
        /// Slash-joined property path
        field: String,
        operator: FilterOperator,
        /// Single value, or several for `In`
        values: Vec<String>,
    },
    Group {
        connector: Connector,
        children: Vec<FilterNode>,
    },
}

/// Double embedded quotes so values cannot break out of the string literal
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

impl FilterNode {
    pub fn condition(field: impl Into<String>, operator: FilterOperator, value: impl Into<String>) -> Self {
        Self::Condition {
            field: field.into(),
            operator,
            values: vec![value.into()],
        }
    }

    pub fn in_list(field: impl Into<String>, values: &[&str]) -> Self {
        Self::Condition {
            field: field.into(),
            operator: FilterOperator::In,
            values: values.iter().map(|v| v.to_string()).collect(),
        }
    }

    pub fn group(connector: Connector, children: Vec<FilterNode>) -> Self {
        Self::Group { connector, children }
    }

    /// An empty root group; compiles to the empty string
    pub fn empty() -> Self {
        Self::Group {
            connector: Connector::And,
            children: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Condition { values, .. } => values.is_empty(),
            Self::Group { children, .. } => children.iter().all(|c| c.is_empty()),
        }
    }

    /// Compile the tree into a `$filter` expression. Condition-free trees,
    /// including conditions without values, compile to the empty string.
    pub fn compile(&self) -> String {
        match self {
            Self::Condition { field, operator, values } => match operator {
                FilterOperator::In => {
                    if values.is_empty() {
                        return String::new();
                    }
                    let clauses: Vec<String> = values
                        .iter()
                        .map(|v| format!("{} eq {}", field, quote(v)))
                        .collect();
                    format!("({})", clauses.join(" or "))
                }
                _ => match values.first() {
                    Some(value) => format!("{} {} {}", field, operator.token(), quote(value)),
                    None => String::new(),
                },
            },
            Self::Group { connector, children } => {
                let compiled: Vec<String> = children
                    .iter()
                    .map(|c| c.compile())
                    .filter(|s| !s.is_empty())
                    .collect();
                if compiled.is_empty() {
                    String::new()
                } else {
                    format!("({})", compiled.join(&format!(" {} ", connector.token())))
                }
            }
        }
    }

    /// Rebuild a filter tree from flat form entries.
    ///
    /// Keys follow the `field_<id>` / `operator_<id>` / `value_<id>` /
    /// `logic_<id>` / `group_<id>` convention; entries sharing a
    /// `group_<id>` value become one sub-group whose connector is read from
    /// `subLogic_<groupId>` (default and). Conditions missing any of field,
    /// operator or value are dropped silently; an unknown operator tag is an
    /// error.
    pub fn from_form(entries: &serde_json::Map<String, Value>) -> Result<FilterNode> {
        // Collect per-id fragments; BTreeMap for a deterministic order
        let mut fragments: BTreeMap<u32, Fragment> = BTreeMap::new();
        let mut sub_logic: BTreeMap<String, Connector> = BTreeMap::new();
        let mut root_connector = Connector::And;

        for (key, value) in entries {
            if let Some(group_id) = key.strip_prefix("subLogic_") {
                if let Some(tag) = value.as_str() {
                    sub_logic.insert(group_id.to_string(), Connector::parse(tag));
                }
                continue;
            }
            let Some((kind, id)) = key.split_once('_') else { continue };
            let Ok(id) = id.parse::<u32>() else { continue };
            let fragment = fragments.entry(id).or_default();
            match kind {
                "field" => fragment.field = value.as_str().map(|s| s.to_string()),
                "operator" => fragment.operator = value.as_str().map(|s| s.to_string()),
                "value" => fragment.values = form_values(value),
                "group" => fragment.group = value.as_str().map(|s| s.to_string()),
                "logic" => {
                    if let Some(tag) = value.as_str() {
                        root_connector = Connector::parse(tag);
                    }
                }
                _ => {}
            }
        }

        let mut root_children: Vec<FilterNode> = Vec::new();
        let mut groups: BTreeMap<String, Vec<FilterNode>> = BTreeMap::new();
        let mut group_order: Vec<String> = Vec::new();

        for fragment in fragments.values() {
            let (Some(field), Some(operator), values) =
                (&fragment.field, &fragment.operator, &fragment.values)
            else {
                continue;
            };
            if values.is_empty() {
                continue;
            }
            let condition = FilterNode::Condition {
                field: field.clone(),
                operator: FilterOperator::parse(operator)?,
                values: values.clone(),
            };
            match &fragment.group {
                Some(group_id) => {
                    if !groups.contains_key(group_id) {
                        group_order.push(group_id.clone());
                    }
                    groups.entry(group_id.clone()).or_default().push(condition);
                }
                None => root_children.push(condition),
            }
        }

        for group_id in group_order {
            let connector = sub_logic.get(&group_id).copied().unwrap_or(Connector::And);
            let children = groups.remove(&group_id).unwrap_or_default();
            root_children.push(FilterNode::Group { connector, children });
        }

        Ok(FilterNode::Group {
            connector: root_connector,
            children: root_children,
        })
    }
}

#[derive(Debug, Default)]
struct Fragment {
    field: Option<String>,
    operator: Option<String>,
    values: Vec<String>,
    group: Option<String>,
}

/// A form value is a single scalar or, for `in` conditions, an array
fn form_values(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(scalar_to_string).collect(),
        other => scalar_to_string(other).into_iter().collect(),
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
