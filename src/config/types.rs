//! Raw declarative entity source, one JSON object per entity (camelCase keys).

use serde::{Deserialize, Deserializer};
use std::collections::HashMap;

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityDeclaration {
    /// Entity name; the requested name is used when absent.
    #[serde(default, alias = "modelName")]
    pub name: Option<String>,
    #[serde(default)]
    pub page_title: Option<String>,
    #[serde(default)]
    pub db_table: Option<String>,
    /// Row filter template; may contain `{{variable}}` placeholders.
    #[serde(default)]
    pub sql_where: Option<String>,
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub order_by: Option<String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub titles: HashMap<String, String>,
    #[serde(default)]
    pub classes: HashMap<String, String>,
    #[serde(default)]
    pub display_mode: HashMap<String, String>,
    #[serde(default)]
    pub date_time_fields: HashMap<String, String>,
    #[serde(default)]
    pub related_data: HashMap<String, RelatedDataDecl>,
    #[serde(default)]
    pub addable_fields: Vec<String>,
    #[serde(default)]
    pub required_fields: Vec<String>,
    #[serde(default)]
    pub editable_fields: Vec<String>,
    /// Per-field editor: `{"type": "summernote", ...extra options}`.
    #[serde(default)]
    pub fields_editor: HashMap<String, serde_json::Map<String, serde_json::Value>>,
    #[serde(default)]
    pub no_zero_value_fields: Vec<String>,
    #[serde(default)]
    pub password_fields: Vec<String>,
    #[serde(default)]
    pub column_data_func: HashMap<String, String>,
    #[serde(default)]
    pub count_related_data: HashMap<String, CountRelatedDecl>,
    #[serde(default)]
    pub links: HashMap<String, LinkDecl>,
    #[serde(default)]
    pub parent: Option<ParentDecl>,
    #[serde(default)]
    pub breadcrumb: Option<BreadcrumbDecl>,
}

/// Related data: `"table.column"`, a raw `SELECT key, value FROM ...` statement, or an object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RelatedDataDecl {
    Columns {
        table: String,
        value_field: String,
        key_field: Option<String>,
        order_by: Option<String>,
    },
    RawSql(String),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RelatedDataObject {
    table: String,
    value_field: String,
    #[serde(default)]
    key_field: Option<String>,
    #[serde(default)]
    order_by: Option<String>,
}

impl<'de> Deserialize<'de> for RelatedDataDecl {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let v = serde_json::Value::deserialize(deserializer)?;
        match v {
            serde_json::Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.to_lowercase().starts_with("select") {
                    return Ok(RelatedDataDecl::RawSql(trimmed.to_string()));
                }
                match trimmed.split('.').collect::<Vec<_>>().as_slice() {
                    [table, column] if !table.is_empty() && !column.is_empty() => Ok(RelatedDataDecl::Columns {
                        table: table.to_string(),
                        value_field: column.to_string(),
                        key_field: None,
                        order_by: None,
                    }),
                    _ => Err(serde::de::Error::custom(format!(
                        "invalid relatedData string format: {:?} (expected \"table.column\" or a SELECT statement)",
                        s
                    ))),
                }
            }
            obj @ serde_json::Value::Object(_) => {
                let o: RelatedDataObject = serde_json::from_value(obj).map_err(serde::de::Error::custom)?;
                Ok(RelatedDataDecl::Columns {
                    table: o.table,
                    value_field: o.value_field,
                    key_field: o.key_field.filter(|k| !k.is_empty()),
                    order_by: o.order_by.filter(|o| !o.is_empty()),
                })
            }
            _ => Err(serde::de::Error::custom(
                "relatedData entry must be a string or an object with table and valueField",
            )),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct CountRelatedDecl {
    #[serde(rename = "localFieldID")]
    pub local_field_id: String,
    pub table: String,
    #[serde(rename = "targetFieldID")]
    pub target_field_id: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct LinkDecl {
    #[serde(default)]
    pub preset: Option<String>,
    #[serde(default)]
    pub template: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentDecl {
    pub model_name: String,
    #[serde(default)]
    pub local_connection_field: Option<String>,
    #[serde(default)]
    pub query_variable_name: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreadcrumbDecl {
    #[serde(default)]
    pub label_field: Option<String>,
}
