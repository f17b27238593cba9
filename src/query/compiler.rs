//! Query compilation: a filter tree in, a parameterized pseudo-SQL string, a
//! human-readable Hebrew description and an insertion-ordered parameter map
//! out.
//!
//! Compilation is pure and deterministic. The parameter counter restarts at
//! `p1` on every call, so compiling the same tree twice yields identical
//! output. Malformed condition values (`between` without a two-element
//! array, `in`/`notIn` without an array) render as empty strings and
//! register no parameters; empty renders are dropped before joining, so a
//! group of nothing but malformed children compiles to the empty query.

use serde_json::{Map, Value, json};

use crate::catalog::{FieldCatalog, FilterOperator, FilterType, operator_phrase, value_display};
use crate::query::model::{BoolOperator, FilterCondition, FilterGroup, Query};

/// The three artifacts of one compilation pass.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompiledQuery {
    /// Parameterized pseudo-SQL, e.g. `(name LIKE :p1 AND available > :p2)`.
    pub query_string: String,
    /// Hebrew description, e.g. `(שם אירוע מכיל Lear וגם כרטיסים זמינים גדול מ 10)`.
    pub human_readable: String,
    /// Parameter name to value, in first-use order. LIKE values are stored
    /// with their `%` wildcards already applied.
    pub params: Map<String, Value>,
}

impl CompiledQuery {
    pub fn is_empty(&self) -> bool {
        self.query_string.is_empty()
    }
}

/// Compile `query` against `catalog`.
pub fn compile(query: &Query, catalog: &FieldCatalog) -> CompiledQuery {
    let mut params = Map::new();
    let mut counter = 0usize;
    let query_string = group_sql(&query.root_group, &mut counter, &mut params);
    let human_readable = group_human(&query.root_group, catalog);
    CompiledQuery { query_string, human_readable, params }
}

fn sql_op(op: BoolOperator) -> &'static str {
    match op {
        BoolOperator::And => "AND",
        BoolOperator::Or => "OR",
    }
}

fn human_op(op: BoolOperator) -> &'static str {
    match op {
        BoolOperator::And => "וגם",
        BoolOperator::Or => "או",
    }
}

/// Join the non-empty renders of a group's children. `rendered` holds one
/// entry per combined child (conditions first, then groups, in order); the
/// connective for each kept pair comes from the gap between their combined
/// positions.
fn join_children(
    group: &FilterGroup,
    rendered: Vec<String>,
    op_text: fn(BoolOperator) -> &'static str,
) -> String {
    let mut joined = String::new();
    let mut kept = 0usize;
    for (index, part) in rendered.into_iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if kept > 0 {
            joined.push_str(&format!(" {} ", op_text(group.gap_operator(index - 1))));
        }
        joined.push_str(&part);
        kept += 1;
    }
    if joined.is_empty() {
        return joined;
    }
    let body = if kept > 1 { format!("({joined})") } else { joined };
    if group.negated { format!("NOT ({body})") } else { body }
}

fn group_sql(group: &FilterGroup, counter: &mut usize, params: &mut Map<String, Value>) -> String {
    // Conditions first, then child groups, rendered sequentially so the
    // parameter counter threads through in combined-child order.
    let mut rendered: Vec<String> =
        group.conditions.iter().map(|c| condition_sql(c, counter, params)).collect();
    rendered.extend(group.groups.iter().map(|g| group_sql(g, counter, params)));
    join_children(group, rendered, sql_op)
}

fn next_param(counter: &mut usize) -> String {
    *counter += 1;
    format!("p{counter}")
}

fn condition_sql(
    condition: &FilterCondition,
    counter: &mut usize,
    params: &mut Map<String, Value>,
) -> String {
    let field = &condition.field;
    let sql = match condition.operator {
        FilterOperator::Equals => {
            let name = next_param(counter);
            params.insert(name.clone(), condition.value.clone());
            format!("{field} = :{name}")
        }
        FilterOperator::NotEquals => {
            let name = next_param(counter);
            params.insert(name.clone(), condition.value.clone());
            format!("{field} != :{name}")
        }
        FilterOperator::GreaterThan => {
            let name = next_param(counter);
            params.insert(name.clone(), condition.value.clone());
            format!("{field} > :{name}")
        }
        FilterOperator::LessThan => {
            let name = next_param(counter);
            params.insert(name.clone(), condition.value.clone());
            format!("{field} < :{name}")
        }
        FilterOperator::Contains => {
            let name = next_param(counter);
            params.insert(name.clone(), json!(format!("%{}%", value_display(&condition.value))));
            format!("{field} LIKE :{name}")
        }
        FilterOperator::StartsWith => {
            let name = next_param(counter);
            params.insert(name.clone(), json!(format!("{}%", value_display(&condition.value))));
            format!("{field} LIKE :{name}")
        }
        FilterOperator::EndsWith => {
            let name = next_param(counter);
            params.insert(name.clone(), json!(format!("%{}", value_display(&condition.value))));
            format!("{field} LIKE :{name}")
        }
        FilterOperator::Between => {
            let Some(bounds) = condition.value.as_array().filter(|a| a.len() == 2) else {
                return String::new();
            };
            let low = next_param(counter);
            let high = next_param(counter);
            params.insert(low.clone(), bounds[0].clone());
            params.insert(high.clone(), bounds[1].clone());
            format!("{field} BETWEEN :{low} AND :{high}")
        }
        FilterOperator::In | FilterOperator::NotIn => {
            let Some(items) = condition.value.as_array() else {
                return String::new();
            };
            let base = next_param(counter);
            let names: Vec<String> = items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    let name = format!("{base}_{i}");
                    params.insert(name.clone(), item.clone());
                    format!(":{name}")
                })
                .collect();
            let keyword =
                if condition.operator == FilterOperator::NotIn { "NOT IN" } else { "IN" };
            format!("{field} {keyword} ({})", names.join(", "))
        }
    };
    // notIn is already a negative form; wrapping it again would double the
    // negation.
    if condition.negated && condition.operator != FilterOperator::NotIn {
        format!("NOT ({sql})")
    } else {
        sql
    }
}

fn group_human(group: &FilterGroup, catalog: &FieldCatalog) -> String {
    let rendered: Vec<String> = group
        .conditions
        .iter()
        .map(|c| condition_human(c, catalog))
        .chain(group.groups.iter().map(|g| group_human(g, catalog)))
        .collect();
    let mut joined = String::new();
    let mut kept = 0usize;
    for (index, part) in rendered.into_iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if kept > 0 {
            joined.push_str(&format!(" {} ", human_op(group.gap_operator(index - 1))));
        }
        joined.push_str(&part);
        kept += 1;
    }
    if joined.is_empty() {
        return joined;
    }
    let body = if kept > 1 { format!("({joined})") } else { joined };
    if group.negated { format!("לא ({body})") } else { body }
}

fn human_value(condition: &FilterCondition, catalog: &FieldCatalog) -> Option<String> {
    let resolve = |value: &Value| -> String {
        match condition.field_type {
            FilterType::Select | FilterType::MultiSelect => catalog
                .find_field(&condition.field)
                .map(|f| f.option_label(value))
                .unwrap_or_else(|| value_display(value)),
            FilterType::Boolean => {
                if value.as_bool().unwrap_or(false) { "כן".to_string() } else { "לא".to_string() }
            }
            _ => value_display(value),
        }
    };
    match condition.operator {
        FilterOperator::Between => {
            let bounds = condition.value.as_array().filter(|a| a.len() == 2)?;
            Some(format!("{} ל {}", resolve(&bounds[0]), resolve(&bounds[1])))
        }
        FilterOperator::In | FilterOperator::NotIn => {
            let items = condition.value.as_array()?;
            Some(items.iter().map(resolve).collect::<Vec<_>>().join(", "))
        }
        _ => Some(resolve(&condition.value)),
    }
}

fn condition_human(condition: &FilterCondition, catalog: &FieldCatalog) -> String {
    let Some(value) = human_value(condition, catalog) else {
        return String::new();
    };
    let label = catalog.field_label(&condition.field);
    let phrase = operator_phrase(condition.operator);
    if condition.negated && condition.operator != FilterOperator::NotIn {
        format!("{label} לא {phrase} {value}")
    } else {
        format!("{label} {phrase} {value}")
    }
}
