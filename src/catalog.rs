//! Field and operator catalogs: the static reference data the query builder
//! and compiler are driven by.
//!
//! A [`FieldCatalog`] describes which event fields can be filtered, what type
//! each field has, and (for select-style fields) the enumerated options. The
//! operator table maps each [`FilterType`] to the operators that are legal
//! for it; the compiler itself never validates legality and trusts whatever
//! operator is present on a condition.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use strum::Display;

/// Input type of a filterable field. Determines the default operator and
/// default value a condition receives when its field changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "camelCase")]
pub enum FilterType {
    Text,
    Number,
    Date,
    Select,
    MultiSelect,
    Boolean,
}

/// Comparison operator of a single filter condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "camelCase")]
pub enum FilterOperator {
    Equals,
    NotEquals,
    Contains,
    StartsWith,
    EndsWith,
    GreaterThan,
    LessThan,
    Between,
    In,
    NotIn,
}

/// One enumerated option of a select/multiSelect field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldOption {
    pub value: Value,
    pub label: String,
}

impl FieldOption {
    pub fn new(value: impl Into<String>) -> Self {
        let value: String = value.into();
        Self { label: value.clone(), value: Value::String(value) }
    }
}

/// A single filterable field. Immutable reference data, created at
/// configuration time and never mutated by the tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Field id, unique within a catalog; used as the pseudo-SQL identifier.
    pub value: String,
    /// Display label; used by the human-readable renderer.
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: FilterType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<FieldOption>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl FieldDefinition {
    pub fn new(value: impl Into<String>, label: impl Into<String>, field_type: FilterType) -> Self {
        Self { value: value.into(), label: label.into(), field_type, options: None, category: None }
    }

    pub fn with_options(mut self, options: Vec<FieldOption>) -> Self {
        self.options = Some(options);
        self
    }

    /// Resolve a stored value through this field's options, falling back to a
    /// plain string rendering when there is no matching option.
    pub fn option_label(&self, value: &Value) -> String {
        if let Some(options) = &self.options
            && let Some(option) = options.iter().find(|o| &o.value == value)
        {
            return option.label.clone();
        }
        value_display(value)
    }
}

/// Presentation-only grouping of fields. Does not affect compiler semantics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldCategory {
    pub id: String,
    pub name: String,
    pub fields: Vec<FieldDefinition>,
}

/// The full catalog: categorized fields plus a flat lookup list.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FieldCatalog {
    pub categories: Vec<FieldCategory>,
    pub fields: Vec<FieldDefinition>,
}

impl FieldCatalog {
    /// Build a catalog from categories; the flat field list is derived.
    pub fn from_categories(categories: Vec<FieldCategory>) -> Self {
        let fields = categories.iter().flat_map(|c| c.fields.iter().cloned()).collect();
        Self { categories, fields }
    }

    /// Find a field by id, searching categories first and the flat list as a
    /// fallback.
    pub fn find_field(&self, value: &str) -> Option<&FieldDefinition> {
        for category in &self.categories {
            if let Some(field) = category.fields.iter().find(|f| f.value == value) {
                return Some(field);
            }
        }
        self.fields.iter().find(|f| f.value == value)
    }

    /// Label of a field, or the raw id when the field is unknown.
    pub fn field_label(&self, value: &str) -> String {
        self.find_field(value).map(|f| f.label.clone()).unwrap_or_else(|| value.to_string())
    }

    /// The field a brand new condition defaults to: first field of the first
    /// category, else first of the flat list.
    pub fn first_field(&self) -> Option<&FieldDefinition> {
        self.categories
            .first()
            .and_then(|c| c.fields.first())
            .or_else(|| self.fields.first())
    }
}

/// Operators that are legal for a field type, in the order the editor cycles
/// through them. The first entry is the type's default operator.
pub fn operators_for(field_type: FilterType) -> &'static [FilterOperator] {
    use FilterOperator::*;
    match field_type {
        FilterType::Text => &[Contains, Equals, NotEquals, StartsWith, EndsWith],
        FilterType::Number | FilterType::Date => &[Equals, NotEquals, GreaterThan, LessThan, Between],
        FilterType::Select => &[Equals, NotEquals, In],
        FilterType::MultiSelect => &[In, NotIn],
        FilterType::Boolean => &[Equals],
    }
}

/// Default operator assigned when a condition is created or its field type
/// changes.
pub fn default_operator(field_type: FilterType) -> FilterOperator {
    operators_for(field_type)[0]
}

/// Default value per field type. Numeric conditions default to `0` on every
/// code path.
pub fn default_value(field_type: FilterType) -> Value {
    match field_type {
        FilterType::Number => json!(0),
        FilterType::Boolean => json!(false),
        FilterType::MultiSelect => json!([]),
        FilterType::Text | FilterType::Date | FilterType::Select => json!(""),
    }
}

/// Localized phrase used by the human-readable renderer for an operator.
pub fn operator_phrase(operator: FilterOperator) -> &'static str {
    match operator {
        FilterOperator::Equals => "שווה ל",
        FilterOperator::NotEquals => "לא שווה ל",
        FilterOperator::Contains => "מכיל",
        FilterOperator::StartsWith => "מתחיל ב",
        FilterOperator::EndsWith => "מסתיים ב",
        FilterOperator::GreaterThan => "גדול מ",
        FilterOperator::LessThan => "קטן מ",
        FilterOperator::Between => "בין",
        FilterOperator::In => "נמצא בתוך",
        FilterOperator::NotIn => "לא נמצא בתוך",
    }
}

/// Render a JSON scalar the way the UI shows it (strings without quotes).
pub fn value_display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// The event field catalog used by the admin console: event details, venue,
/// tickets and dates, with enumerated options for status/hall/department.
pub fn event_field_catalog() -> FieldCatalog {
    FieldCatalog::from_categories(vec![
        FieldCategory {
            id: "event".to_string(),
            name: "פרטי אירוע".to_string(),
            fields: vec![
                FieldDefinition::new("name", "שם אירוע", FilterType::Text),
                FieldDefinition::new("description", "תיאור", FilterType::Text),
                FieldDefinition::new("duration", "משך", FilterType::Number),
                FieldDefinition::new("status", "סטטוס אירוע", FilterType::Select).with_options(vec![
                    FieldOption::new("פעיל"),
                    FieldOption::new("כמעט אזל"),
                    FieldOption::new("אזל"),
                ]),
            ],
        },
        FieldCategory {
            id: "venue".to_string(),
            name: "מיקום".to_string(),
            fields: vec![
                FieldDefinition::new("hall", "אולם", FilterType::Select).with_options(vec![
                    FieldOption::new("אולם ראשי"),
                    FieldOption::new("אולם קטן"),
                    FieldOption::new("אולם הרצאות"),
                    FieldOption::new("אולם משפחה"),
                    FieldOption::new("אולם קולנוע"),
                ]),
                FieldDefinition::new("department", "מחלקה", FilterType::Select).with_options(vec![
                    FieldOption::new("תיאטרון"),
                    FieldOption::new("מוזיקה"),
                    FieldOption::new("הרצאות"),
                    FieldOption::new("ילדים"),
                    FieldOption::new("מחול"),
                    FieldOption::new("קולנוע"),
                    FieldOption::new("סטנדאפ"),
                ]),
                FieldDefinition::new("location", "מיקום", FilterType::Text),
            ],
        },
        FieldCategory {
            id: "tickets".to_string(),
            name: "כרטיסים".to_string(),
            fields: vec![
                FieldDefinition::new("available", "כרטיסים זמינים", FilterType::Number),
                FieldDefinition::new("sold", "כרטיסים שנמכרו", FilterType::Number),
                FieldDefinition::new("forSale", "כרטיסים למכירה", FilterType::Number),
                FieldDefinition::new("reserved", "כרטיסים משוריינים", FilterType::Number),
                FieldDefinition::new("price", "מחיר", FilterType::Number),
            ],
        },
        FieldCategory {
            id: "dates".to_string(),
            name: "תאריכים וזמנים".to_string(),
            fields: vec![
                FieldDefinition::new("date", "תאריך אירוע", FilterType::Date),
                FieldDefinition::new("time", "שעה", FilterType::Text),
                FieldDefinition::new("createdAt", "תאריך יצירה", FilterType::Date),
            ],
        },
    ])
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_operator_table_defaults() {
        assert_eq!(default_operator(FilterType::Text), FilterOperator::Contains);
        assert_eq!(default_operator(FilterType::Number), FilterOperator::Equals);
        assert_eq!(default_operator(FilterType::MultiSelect), FilterOperator::In);
        assert_eq!(default_operator(FilterType::Boolean), FilterOperator::Equals);
    }

    #[test]
    fn test_default_values_per_type() {
        assert_eq!(default_value(FilterType::Text), json!(""));
        assert_eq!(default_value(FilterType::Number), json!(0));
        assert_eq!(default_value(FilterType::Boolean), json!(false));
        assert_eq!(default_value(FilterType::MultiSelect), json!([]));
    }

    #[test]
    fn test_find_field_prefers_categories() {
        let catalog = event_field_catalog();
        let field = catalog.find_field("hall").expect("hall should exist");
        assert_eq!(field.label, "אולם");
        assert_eq!(field.field_type, FilterType::Select);
        assert!(catalog.find_field("no_such_field").is_none());
    }

    #[test]
    fn test_first_field_is_event_name() {
        let catalog = event_field_catalog();
        let first = catalog.first_field().expect("catalog is not empty");
        assert_eq!(first.value, "name");
        assert_eq!(first.field_type, FilterType::Text);
    }

    #[test]
    fn test_option_label_resolution() {
        let catalog = event_field_catalog();
        let status = catalog.find_field("status").unwrap();
        assert_eq!(status.option_label(&json!("פעיל")), "פעיל");
        // Unknown values fall back to the raw rendering.
        assert_eq!(status.option_label(&json!("???")), "???");
    }

    #[test]
    fn test_serde_uses_camel_case_tags() {
        assert_eq!(serde_json::to_string(&FilterType::MultiSelect).unwrap(), "\"multiSelect\"");
        assert_eq!(serde_json::to_string(&FilterOperator::NotEquals).unwrap(), "\"notEquals\"");
        assert_eq!(
            serde_json::from_str::<FilterOperator>("\"startsWith\"").unwrap(),
            FilterOperator::StartsWith
        );
    }
}
