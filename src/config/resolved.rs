//! Resolved entity configuration: declaration merged with schema defaults and per-field policy.

use std::collections::HashMap;
use std::sync::Arc;

/// Editor kind of a field, by precedence: explicit declaration, related-data select,
/// boolean naming convention, column type inference.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EditorKind {
    #[default]
    None,
    Input,
    Textarea,
    Select,
    RichText,
    ToggleSwitch,
}

impl EditorKind {
    /// Parse a declared editor type name.
    pub fn parse(name: &str) -> Option<EditorKind> {
        match name.trim().to_lowercase().as_str() {
            "none" => Some(EditorKind::None),
            "input" | "text" => Some(EditorKind::Input),
            "textarea" => Some(EditorKind::Textarea),
            "select" => Some(EditorKind::Select),
            "summernote" | "richtext" | "rich-text" => Some(EditorKind::RichText),
            "bs5switch" | "switch" | "toggle" => Some(EditorKind::ToggleSwitch),
            _ => None,
        }
    }

    /// Name used in CSS classes (`editable-<name>`).
    pub fn as_str(&self) -> &'static str {
        match self {
            EditorKind::None => "none",
            EditorKind::Input => "input",
            EditorKind::Textarea => "textarea",
            EditorKind::Select => "select",
            EditorKind::RichText => "summernote",
            EditorKind::ToggleSwitch => "bs5switch",
        }
    }
}

/// Computed-column producers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ColumnFunc {
    /// Standard edit link to the record's update view.
    RecordControls,
    /// Deferred to the caller-supplied dynamic column callback.
    Dynamic,
    Unknown(String),
}

impl ColumnFunc {
    pub fn parse(name: &str) -> ColumnFunc {
        match name.trim() {
            "stdRecordControls" => ColumnFunc::RecordControls,
            "dynamicColumnDataFunc" | "dynamic" => ColumnFunc::Dynamic,
            other => ColumnFunc::Unknown(other.to_string()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DisplayModes {
    pub table: bool,
    pub record: bool,
    pub create: bool,
    pub update: bool,
}

impl Default for DisplayModes {
    fn default() -> Self {
        DisplayModes::all()
    }
}

impl DisplayModes {
    pub fn all() -> Self {
        DisplayModes {
            table: true,
            record: true,
            create: true,
            update: true,
        }
    }

    /// Empty, "*" and "all" permit every mode; otherwise each mode is enabled by substring
    /// ("table", "record", "create" or "insert", "update").
    pub fn parse(mode: &str) -> Self {
        let m = mode.trim().to_lowercase();
        if m.is_empty() || m == "*" || m == "all" {
            return DisplayModes::all();
        }
        DisplayModes {
            table: m.contains("table"),
            record: m.contains("record"),
            create: m.contains("create") || m.contains("insert"),
            update: m.contains("update"),
        }
    }
}

/// Lookup of a display value in another table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelatedDataBinding {
    pub table: String,
    pub key_field: String,
    pub value_field: String,
    pub order_by: Option<String>,
    pub where_clause: Option<String>,
}

impl RelatedDataBinding {
    /// Render cache key prefix, e.g. "customers.name".
    pub fn table_and_field(&self) -> String {
        format!("{}.{}", self.table, self.value_field)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CountBinding {
    pub table: String,
    pub local_field: String,
    pub target_field: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldPolicy {
    pub field: String,
    pub header: String,
    pub title: Option<String>,
    pub editor: EditorKind,
    /// Editor came from an explicit declaration.
    pub explicit_editor: bool,
    pub addable: bool,
    pub editable: bool,
    pub required: bool,
    pub password: bool,
    pub no_zero: bool,
    pub classes: String,
    pub display: DisplayModes,
    pub related: Option<RelatedDataBinding>,
    pub count: Option<CountBinding>,
    /// Link template with `$field$` placeholders.
    pub link: Option<String>,
    pub date_format: Option<String>,
    pub column_func: Option<ColumnFunc>,
}

impl FieldPolicy {
    pub fn new(field: &str) -> Self {
        FieldPolicy {
            field: field.to_string(),
            header: field.to_string(),
            title: None,
            editor: EditorKind::None,
            explicit_editor: false,
            addable: false,
            editable: false,
            required: false,
            password: false,
            no_zero: false,
            classes: String::new(),
            display: DisplayModes::all(),
            related: None,
            count: None,
            link: None,
            date_format: None,
            column_func: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParentLink {
    pub entity: String,
    /// Local column holding the parent's key.
    pub local_field: Option<String>,
    /// Request variable (query or payload key) supplying the parent value.
    pub query_variable: Option<String>,
}

/// Shared, immutable configuration of one entity. Cached by the loader.
#[derive(Clone, Debug)]
pub struct EntityConfig {
    pub name: String,
    pub title: String,
    pub table: String,
    /// Row filter before variable substitution.
    pub sql_where_template: String,
    /// Declared display order.
    pub fields: Vec<String>,
    pub order_by: String,
    pub addable_fields: Vec<String>,
    pub editable_fields: Vec<String>,
    /// Declared order of required fields, checked on create.
    pub required_fields: Vec<String>,
    pub primary_key: Option<String>,
    pub column_types: HashMap<String, String>,
    pub policies: HashMap<String, FieldPolicy>,
    pub parent: Option<ParentLink>,
    pub breadcrumb_label_field: Option<String>,
    /// Auxiliary presentation directives (editor scripts/options) gathered during resolution.
    pub header_tags: Vec<String>,
}

impl EntityConfig {
    pub fn policy(&self, field: &str) -> Option<&FieldPolicy> {
        self.policies.get(field)
    }

    pub fn column_type(&self, column: &str) -> Option<&str> {
        self.column_types.get(column).map(String::as_str)
    }

    pub fn require_primary_key(&self) -> Result<&str, crate::error::ConfigError> {
        self.primary_key
            .as_deref()
            .ok_or_else(|| crate::error::ConfigError::MissingPrimaryKey(self.name.clone()))
    }
}

/// Per-request view of an entity: the shared configuration plus values derived from this request.
#[derive(Clone, Debug)]
pub struct LoadedEntity {
    pub config: Arc<EntityConfig>,
    /// Row filter after variable substitution.
    pub sql_where: String,
    /// Value of the parent query variable for this request.
    pub parent_value: Option<String>,
    /// Accumulated `?k=v&...` string of the parent chain (root first); empty without parents.
    pub parent_query: String,
    pub parent: Option<Box<LoadedEntity>>,
}

impl LoadedEntity {
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Ancestors from the root down to the direct parent.
    pub fn ancestors(&self) -> Vec<&LoadedEntity> {
        let mut out = Vec::new();
        let mut cur = self.parent.as_deref();
        while let Some(p) = cur {
            out.push(p);
            cur = p.parent.as_deref();
        }
        out.reverse();
        out
    }
}
