//! Filter tree model: conditions, groups and the id-addressed mutations the
//! query builder dialog performs on them.
//!
//! Every node carries a unique string id and all mutations address nodes by
//! id. Lookups are depth-first pre-order (a group before its child groups)
//! and the first match wins. A mutation with an id that does not exist in
//! the tree returns the tree unchanged rather than failing; the dialog only
//! ever hands out ids it obtained from the tree, so a miss means the node
//! was already deleted.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::Display;
use uuid::Uuid;

use crate::catalog::{FieldCatalog, FilterOperator, FilterType, default_operator, default_value};

/// Boolean connective joining the children of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum BoolOperator {
    #[default]
    And,
    Or,
}

/// Generate a node id: millisecond timestamp plus a short random suffix.
/// Uniqueness, not secrecy, is the requirement.
pub fn node_id() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{:x}{}", millis, &suffix[..6])
}

/// A single leaf comparison. `value` is free-form JSON: a scalar for most
/// operators, a two-element array for `between`, an array for `in`/`notIn`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCondition {
    pub id: String,
    pub field: String,
    pub operator: FilterOperator,
    pub value: Value,
    #[serde(rename = "type")]
    pub field_type: FilterType,
    #[serde(default)]
    pub negated: bool,
}

impl FilterCondition {
    /// A condition defaulted from a catalog field: the type's first legal
    /// operator and default value.
    pub fn for_field(field: &crate::catalog::FieldDefinition) -> Self {
        Self {
            id: node_id(),
            field: field.value.clone(),
            operator: default_operator(field.field_type),
            value: default_value(field.field_type),
            field_type: field.field_type,
            negated: false,
        }
    }

    /// A condition not bound to any catalog field: empty field id with text
    /// defaults. Appended when the catalog has no fields at all.
    pub fn unbound() -> Self {
        Self {
            id: node_id(),
            field: String::new(),
            operator: default_operator(FilterType::Text),
            value: default_value(FilterType::Text),
            field_type: FilterType::Text,
            negated: false,
        }
    }

    fn defaulted_from(catalog: &FieldCatalog) -> Self {
        match catalog.first_field() {
            Some(field) => Self::for_field(field),
            None => Self::unbound(),
        }
    }
}

/// A boolean group: ordered conditions, then ordered child groups. When
/// `child_operators` is present it supplies the connective for each gap
/// between adjacent rendered children, overriding `operator` per gap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterGroup {
    pub id: String,
    pub operator: BoolOperator,
    #[serde(rename = "childOperators", default, skip_serializing_if = "Option::is_none")]
    pub child_operators: Option<Vec<BoolOperator>>,
    #[serde(default)]
    pub negated: bool,
    pub conditions: Vec<FilterCondition>,
    pub groups: Vec<FilterGroup>,
}

impl FilterGroup {
    pub fn new() -> Self {
        Self {
            id: node_id(),
            operator: BoolOperator::And,
            child_operators: None,
            negated: false,
            conditions: Vec::new(),
            groups: Vec::new(),
        }
    }

    /// Conditions plus child groups.
    pub fn child_count(&self) -> usize {
        self.conditions.len() + self.groups.len()
    }

    /// Connective for the gap between combined children `gap` and `gap + 1`,
    /// falling back to the group operator when no per-gap override exists.
    pub fn gap_operator(&self, gap: usize) -> BoolOperator {
        self.child_operators
            .as_ref()
            .and_then(|ops| ops.get(gap).copied())
            .unwrap_or(self.operator)
    }

    /// Make sure `child_operators` covers every gap, extending with the
    /// group operator. Called before toggling a single gap in the editor.
    pub fn materialize_child_operators(&mut self) {
        let gaps = self.child_count().saturating_sub(1);
        let ops = self.child_operators.get_or_insert_with(Vec::new);
        while ops.len() < gaps {
            ops.push(self.operator);
        }
        ops.truncate(gaps);
    }
}

impl Default for FilterGroup {
    fn default() -> Self {
        Self::new()
    }
}

/// Partial update of a group. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct GroupPatch {
    pub operator: Option<BoolOperator>,
    pub child_operators: Option<Vec<BoolOperator>>,
    pub negated: Option<bool>,
}

/// Partial update of a condition. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct ConditionPatch {
    pub field: Option<String>,
    pub operator: Option<FilterOperator>,
    pub value: Option<Value>,
    pub field_type: Option<FilterType>,
    pub negated: Option<bool>,
}

/// The whole filter expression: a single root group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    #[serde(rename = "rootGroup")]
    pub root_group: FilterGroup,
}

impl Query {
    /// An empty query: root group with no children.
    pub fn new() -> Self {
        Self { root_group: FilterGroup::new() }
    }

    /// The query the dialog starts from (and resets to): a root group with
    /// one condition defaulted from the first catalog field.
    pub fn with_default_condition(catalog: &FieldCatalog) -> Self {
        let mut root = FilterGroup::new();
        root.conditions.push(FilterCondition::defaulted_from(catalog));
        Self { root_group: root }
    }

    /// Append a defaulted condition to the group with `group_id`. An empty
    /// catalog still appends, as an unbound text condition.
    pub fn add_condition(mut self, group_id: &str, catalog: &FieldCatalog) -> Self {
        if let Some(group) = find_group_mut(&mut self.root_group, group_id) {
            group.conditions.push(FilterCondition::defaulted_from(catalog));
        }
        self
    }

    /// Append an empty AND group to the group with `parent_group_id`.
    pub fn add_group(mut self, parent_group_id: &str) -> Self {
        if let Some(group) = find_group_mut(&mut self.root_group, parent_group_id) {
            group.groups.push(FilterGroup::new());
        }
        self
    }

    /// Splice the direct child group with `group_id` out of its parent. The
    /// root group has no parent and is never removed.
    pub fn remove_group(mut self, group_id: &str) -> Self {
        remove_group_in(&mut self.root_group, group_id);
        self
    }

    /// Shallow-merge `patch` into the group with `group_id`.
    pub fn update_group(mut self, group_id: &str, patch: GroupPatch) -> Self {
        if let Some(group) = find_group_mut(&mut self.root_group, group_id) {
            if let Some(operator) = patch.operator {
                group.operator = operator;
            }
            if let Some(child_operators) = patch.child_operators {
                group.child_operators = Some(child_operators);
            }
            if let Some(negated) = patch.negated {
                group.negated = negated;
            }
        }
        self
    }

    /// Shallow-merge `patch` into the condition with `condition_id`.
    pub fn update_condition(mut self, condition_id: &str, patch: ConditionPatch) -> Self {
        if let Some(condition) = find_condition_mut(&mut self.root_group, condition_id) {
            if let Some(field) = patch.field {
                condition.field = field;
            }
            if let Some(operator) = patch.operator {
                condition.operator = operator;
            }
            if let Some(value) = patch.value {
                condition.value = value;
            }
            if let Some(field_type) = patch.field_type {
                condition.field_type = field_type;
            }
            if let Some(negated) = patch.negated {
                condition.negated = negated;
            }
        }
        self
    }

    /// Splice the condition with `condition_id` out of its group.
    pub fn remove_condition(mut self, condition_id: &str) -> Self {
        remove_condition_in(&mut self.root_group, condition_id);
        self
    }
}

impl Default for Query {
    fn default() -> Self {
        Self::new()
    }
}

/// Pre-order path from `group` to the group with `id`, pushed onto `path`
/// as child-group indices. Returns true when found.
fn path_to_group(group: &FilterGroup, id: &str, path: &mut Vec<usize>) -> bool {
    if group.id == id {
        return true;
    }
    for (i, child) in group.groups.iter().enumerate() {
        path.push(i);
        if path_to_group(child, id, path) {
            return true;
        }
        path.pop();
    }
    false
}

/// Walk a path of child-group indices down from `root`.
fn group_at_mut<'a>(root: &'a mut FilterGroup, path: &[usize]) -> &'a mut FilterGroup {
    let mut current = root;
    for &index in path {
        current = &mut current.groups[index];
    }
    current
}

// A recursive `&mut` search trips over the borrow checker when the hit is
// returned out of a loop, so the lookup is two-phase: an immutable path
// search followed by an index walk.
fn find_group_mut<'a>(root: &'a mut FilterGroup, id: &str) -> Option<&'a mut FilterGroup> {
    let mut path = Vec::new();
    if path_to_group(root, id, &mut path) {
        Some(group_at_mut(root, &path))
    } else {
        None
    }
}

/// Pre-order path to the group holding condition `id`, plus the condition's
/// index within that group.
fn path_to_condition(group: &FilterGroup, id: &str, path: &mut Vec<usize>) -> Option<usize> {
    if let Some(index) = group.conditions.iter().position(|c| c.id == id) {
        return Some(index);
    }
    for (i, child) in group.groups.iter().enumerate() {
        path.push(i);
        if let Some(index) = path_to_condition(child, id, path) {
            return Some(index);
        }
        path.pop();
    }
    None
}

fn find_condition_mut<'a>(root: &'a mut FilterGroup, id: &str) -> Option<&'a mut FilterCondition> {
    let mut path = Vec::new();
    let index = path_to_condition(root, id, &mut path)?;
    Some(&mut group_at_mut(root, &path).conditions[index])
}

fn remove_group_in(group: &mut FilterGroup, id: &str) -> bool {
    if let Some(index) = group.groups.iter().position(|g| g.id == id) {
        group.groups.remove(index);
        return true;
    }
    for child in &mut group.groups {
        if remove_group_in(child, id) {
            return true;
        }
    }
    false
}

fn remove_condition_in(group: &mut FilterGroup, id: &str) -> bool {
    if let Some(index) = group.conditions.iter().position(|c| c.id == id) {
        group.conditions.remove(index);
        return true;
    }
    for child in &mut group.groups {
        if remove_condition_in(child, id) {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::catalog::event_field_catalog;

    fn sample_tree() -> Query {
        // root(AND) { c1, c2, g1(OR) { c3, g2(AND) { c4 } } }
        Query {
            root_group: FilterGroup {
                id: "root".into(),
                operator: BoolOperator::And,
                child_operators: None,
                negated: false,
                conditions: vec![
                    FilterCondition {
                        id: "c1".into(),
                        field: "name".into(),
                        operator: FilterOperator::Contains,
                        value: json!("Lear"),
                        field_type: FilterType::Text,
                        negated: false,
                    },
                    FilterCondition {
                        id: "c2".into(),
                        field: "available".into(),
                        operator: FilterOperator::GreaterThan,
                        value: json!(10),
                        field_type: FilterType::Number,
                        negated: false,
                    },
                ],
                groups: vec![FilterGroup {
                    id: "g1".into(),
                    operator: BoolOperator::Or,
                    child_operators: None,
                    negated: false,
                    conditions: vec![FilterCondition {
                        id: "c3".into(),
                        field: "hall".into(),
                        operator: FilterOperator::Equals,
                        value: json!("אולם ראשי"),
                        field_type: FilterType::Select,
                        negated: false,
                    }],
                    groups: vec![FilterGroup {
                        id: "g2".into(),
                        operator: BoolOperator::And,
                        child_operators: None,
                        negated: false,
                        conditions: vec![FilterCondition {
                            id: "c4".into(),
                            field: "price".into(),
                            operator: FilterOperator::LessThan,
                            value: json!(100),
                            field_type: FilterType::Number,
                            negated: false,
                        }],
                        groups: vec![],
                    }],
                }],
            },
        }
    }

    #[test]
    fn test_add_condition_defaults_from_first_field() {
        let catalog = event_field_catalog();
        let query = sample_tree().add_condition("g1", &catalog);
        let nested = &query.root_group.groups[0];
        assert_eq!(nested.conditions.len(), 2);
        let added = &nested.conditions[1];
        assert_eq!(added.field, "name");
        assert_eq!(added.operator, FilterOperator::Contains);
        assert_eq!(added.value, json!(""));
        assert!(!added.negated);
    }

    #[test]
    fn test_empty_catalog_appends_unbound_text_condition() {
        let empty = FieldCatalog::default();
        let query = Query::with_default_condition(&empty);
        assert_eq!(query.root_group.conditions.len(), 1);

        let root_id = query.root_group.id.clone();
        let query = query.add_condition(&root_id, &empty);
        assert_eq!(query.root_group.conditions.len(), 2);
        let added = &query.root_group.conditions[1];
        assert_eq!(added.field, "");
        assert_eq!(added.field_type, FilterType::Text);
        assert_eq!(added.operator, FilterOperator::Contains);
        assert_eq!(added.value, json!(""));
    }

    #[test]
    fn test_add_group_appends_empty_and_group() {
        let query = sample_tree().add_group("root");
        assert_eq!(query.root_group.groups.len(), 2);
        let added = &query.root_group.groups[1];
        assert_eq!(added.operator, BoolOperator::And);
        assert!(added.conditions.is_empty());
        assert!(added.groups.is_empty());
    }

    #[test]
    fn test_update_condition_preserves_rest_of_tree() {
        let before = sample_tree();
        let after = before.clone().update_condition(
            "c3",
            ConditionPatch { value: Some(json!("אולם קטן")), ..Default::default() },
        );
        assert_eq!(after.root_group.groups[0].conditions[0].value, json!("אולם קטן"));
        // Siblings and ancestors are untouched.
        assert_eq!(after.root_group.conditions, before.root_group.conditions);
        assert_eq!(after.root_group.id, before.root_group.id);
    }

    #[test]
    fn test_update_group_shallow_merge() {
        let query = sample_tree().update_group(
            "g1",
            GroupPatch { operator: Some(BoolOperator::And), negated: Some(true), ..Default::default() },
        );
        let nested = &query.root_group.groups[0];
        assert_eq!(nested.operator, BoolOperator::And);
        assert!(nested.negated);
        // Conditions survive the patch.
        assert_eq!(nested.conditions.len(), 1);
    }

    #[test]
    fn test_mutations_reach_third_level_nodes() {
        let query = sample_tree().update_condition(
            "c4",
            ConditionPatch { value: Some(json!(75)), ..Default::default() },
        );
        assert_eq!(query.root_group.groups[0].groups[0].conditions[0].value, json!(75));

        let query = sample_tree().remove_group("g2");
        assert!(query.root_group.groups[0].groups.is_empty());
        assert_eq!(query.root_group.groups[0].conditions.len(), 1);
    }

    #[test]
    fn test_absent_id_is_a_no_op() {
        let before = sample_tree();
        let after = before
            .clone()
            .add_condition("missing", &event_field_catalog())
            .remove_group("missing")
            .remove_condition("missing")
            .update_group("missing", GroupPatch { negated: Some(true), ..Default::default() })
            .update_condition("missing", ConditionPatch { negated: Some(true), ..Default::default() });
        assert_eq!(after, before);
    }

    #[test]
    fn test_remove_group_splices_child_only() {
        let query = sample_tree().remove_group("g1");
        assert!(query.root_group.groups.is_empty());
        // The root has no parent; removing it leaves the tree intact.
        let query = sample_tree().remove_group("root");
        assert_eq!(query, sample_tree());
    }

    #[test]
    fn test_remove_condition_first_match_wins() {
        let mut query = sample_tree();
        // Duplicate id in a nested group; the root-level one goes first.
        query.root_group.groups[0].conditions.push(FilterCondition {
            id: "c1".into(),
            field: "sold".into(),
            operator: FilterOperator::Equals,
            value: json!(5),
            field_type: FilterType::Number,
            negated: false,
        });
        let after = query.remove_condition("c1");
        assert_eq!(after.root_group.conditions[0].id, "c2");
        assert_eq!(after.root_group.groups[0].conditions.len(), 2);
    }

    #[test]
    fn test_gap_operator_falls_back_to_group_operator() {
        let mut group = sample_tree().root_group;
        assert_eq!(group.gap_operator(0), BoolOperator::And);
        group.child_operators = Some(vec![BoolOperator::Or]);
        assert_eq!(group.gap_operator(0), BoolOperator::Or);
        // Gaps past the override list fall back too.
        assert_eq!(group.gap_operator(1), BoolOperator::And);
    }

    #[test]
    fn test_materialize_child_operators_covers_gaps() {
        let mut group = sample_tree().root_group;
        group.materialize_child_operators();
        assert_eq!(group.child_operators, Some(vec![BoolOperator::And, BoolOperator::And]));
    }

    #[test]
    fn test_node_ids_are_unique() {
        let ids: Vec<String> = (0..64).map(|_| node_id()).collect();
        let mut dedup = ids.clone();
        dedup.sort();
        dedup.dedup();
        assert_eq!(dedup.len(), ids.len());
    }

    #[test]
    fn test_query_json_round_trip() {
        let query = sample_tree();
        let json = serde_json::to_string(&query).unwrap();
        assert!(json.contains("\"rootGroup\""));
        assert!(json.contains("\"type\":\"text\""));
        let back: Query = serde_json::from_str(&json).unwrap();
        assert_eq!(back, query);
    }

    #[test]
    fn test_bool_operator_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&BoolOperator::And).unwrap(), "\"AND\"");
        assert_eq!(serde_json::from_str::<BoolOperator>("\"OR\"").unwrap(), BoolOperator::Or);
    }
}
