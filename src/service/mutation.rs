//! Create and update handling.

use super::{AdminService, RequestValidator};
use crate::case::to_snake_case;
use crate::config::{EditorKind, EntityConfig, FieldPolicy};
use crate::context::{Action, RequestContext};
use crate::db::{display_value, id_value, Dialect, Record};
use crate::error::{AppError, SchemaError};
use crate::hooks::HookDecision;
use crate::schema::{is_boolean_type, is_numeric_type};
use crate::sql;
use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CreateOutcome {
    /// Key of the new row; null when the backend cannot return it.
    pub id: Value,
    /// Detail view of the new row when the payload asked for `show_record`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated { changed: Vec<String> },
    /// Every submitted value matched the stored one; nothing was written.
    NoChanges,
}

struct Assignment {
    field: String,
    column: String,
    value: Value,
}

fn to_record(assignments: &[Assignment]) -> Record {
    assignments
        .iter()
        .map(|a| (a.column.clone(), a.value.clone()))
        .collect()
}

fn model_name(payload: &Record) -> Result<String, AppError> {
    payload
        .get("modelName")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::BadRequest("Model name is required".into()))
}

/// Integer id from a number or numeric string.
fn record_id(payload: &Record) -> Result<Value, AppError> {
    match payload.get("id") {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .map(Value::from)
            .ok_or_else(|| AppError::BadRequest(format!("ID {} is not an integer", n))),
        Some(Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| AppError::BadRequest(format!("ID '{}' is not numeric", s))),
        _ => Err(AppError::BadRequest("ID is required".into())),
    }
}

fn lookup<'p>(payload: &'p Record, field: &str) -> Option<&'p Value> {
    payload.get(field).or_else(|| payload.get(&to_snake_case(field)))
}

/// Column a field writes to: snake_case unless only the literal name exists in the table.
fn column_for(cfg: &EntityConfig, field: &str) -> String {
    let snake = to_snake_case(field);
    if cfg.column_types.contains_key(&snake) || !cfg.column_types.contains_key(field) {
        snake
    } else {
        field.to_string()
    }
}

fn is_password(cfg: &EntityConfig, field: &str) -> bool {
    cfg.policy(field).is_some_and(|p| p.password)
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Toggle normalisation and numeric sanitising. `None` drops the value (blank optional number on create).
fn prepare_value(
    cfg: &EntityConfig,
    policy: Option<&FieldPolicy>,
    field: &str,
    column: &str,
    value: &Value,
    creating: bool,
) -> Result<Option<Value>, AppError> {
    let boolean_column = cfg.column_type(column).is_some_and(is_boolean_type);
    if boolean_column || column == "is_active" || policy.is_some_and(|p| p.editor == EditorKind::ToggleSwitch) {
        return Ok(Some(RequestValidator::normalize_toggle(value, boolean_column)));
    }
    match cfg.column_type(column) {
        Some(type_tag) if is_numeric_type(type_tag) => {
            if creating && is_blank(value) {
                return Ok(None);
            }
            let label = policy.map(|p| p.header.as_str()).unwrap_or(field);
            RequestValidator::sanitize_numeric(label, value).map(Some)
        }
        _ => Ok(Some(value.clone())),
    }
}

fn number_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn flag_of(value: &Value) -> Option<bool> {
    match value {
        Value::Null => Some(false),
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "1" | "t" | "true" | "on" => Some(true),
            "" | "0" | "f" | "false" | "off" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Stored and submitted values are equal: as flags for switch values, as numbers for numeric
/// columns ("12.50" equals 12.5), as display text otherwise.
fn same_value(type_tag: Option<&str>, stored: &Value, submitted: &Value) -> bool {
    if let Value::Bool(b) = submitted {
        return flag_of(stored) == Some(*b);
    }
    if type_tag.is_some_and(is_numeric_type) {
        if let (Some(a), Some(b)) = (number_of(stored), number_of(submitted)) {
            return a == b;
        }
    }
    display_value(stored) == display_value(submitted)
}

/// Database failures become a generic persistence error; the cause is logged only.
fn persistence(err: AppError, entity: &str, message: &str) -> AppError {
    match err {
        AppError::Db(e) => {
            tracing::error!(entity, error = %e, "{}", message);
            AppError::Persistence(message.to_string())
        }
        other => other,
    }
}

impl AdminService {
    /// Insert a record from a create payload (`modelName` plus field values).
    pub async fn create(&self, ctx: &RequestContext, payload: Record) -> Result<CreateOutcome, AppError> {
        let entity = model_name(&payload)?;
        let loaded = self.load_checked(&entity, ctx, Action::Create, Some(&payload)).await?;
        let cfg = &loaded.config;

        RequestValidator::validate_required(cfg.required_fields.iter().map(String::as_str), |f| lookup(&payload, f))?;

        let mut assignments: Vec<Assignment> = Vec::new();
        for field in &cfg.addable_fields {
            let Some(value) = lookup(&payload, field) else {
                continue;
            };
            if !self.hooks.permits(ctx, &cfg.name, field, Action::Create) {
                tracing::debug!(entity = %cfg.name, field = %field, "field not permitted for create, ignored");
                continue;
            }
            let policy = cfg.policy(field);
            if policy.is_some_and(|p| p.no_zero) {
                RequestValidator::validate_no_zero(field, value)?;
            }
            let column = column_for(cfg, field);
            if let Some(value) = prepare_value(cfg, policy, field, &column, value, true)? {
                assignments.push(Assignment {
                    field: field.clone(),
                    column,
                    value,
                });
            }
        }

        if let (Some(local), Some(parent_value)) = (
            cfg.parent.as_ref().and_then(|p| p.local_field.as_deref()),
            loaded.parent_value.as_deref(),
        ) {
            let value = match cfg.column_type(local) {
                Some(t) if is_numeric_type(t) => id_value(parent_value),
                _ => Value::String(parent_value.to_string()),
            };
            assignments.retain(|a| a.column != local);
            assignments.push(Assignment {
                field: local.to_string(),
                column: local.to_string(),
                value,
            });
        }

        if assignments.is_empty() {
            return Err(AppError::Validation("No data to insert".into()));
        }

        self.encrypt_passwords(ctx, cfg, &mut assignments).await?;

        if let Some(lifecycle) = &self.hooks.lifecycle {
            let record = to_record(&assignments);
            if let HookDecision::Deny(message) = lifecycle.before_create(ctx, self.db.as_ref(), &cfg.table, &record).await {
                tracing::info!(entity = %cfg.name, reason = %message, "create vetoed");
                return Err(AppError::Vetoed(message));
            }
        }

        let pk = cfg.primary_key.as_deref().unwrap_or("id");
        let columns: Vec<(String, Value)> = assignments.iter().map(|a| (a.column.clone(), a.value.clone())).collect();
        let q = sql::insert(self.db.dialect(), &cfg.table, &columns, &cfg.column_types, pk);
        let id = match self.db.dialect() {
            Dialect::MySql => ctx
                .bounded(self.db.execute(&q.sql, &q.params))
                .await
                .map(|_| Value::Null),
            Dialect::Postgres | Dialect::Sqlite => ctx.bounded(self.db.insert_returning(&q.sql, &q.params, pk)).await,
        }
        .map_err(|e| persistence(e, &cfg.name, "Failed to insert data"))?;
        tracing::info!(entity = %cfg.name, id = %display_value(&id), "record created");

        if let Some(lifecycle) = self.hooks.lifecycle.clone() {
            let (ctx, db, table, id, record) = (
                ctx.clone(),
                self.db.clone(),
                cfg.table.clone(),
                id.clone(),
                to_record(&assignments),
            );
            tokio::spawn(async move {
                lifecycle.after_create(ctx, db, table, id, record).await;
            });
        }

        let redirect = match payload.get("successfullyCreatedDestination").and_then(Value::as_str) {
            Some("show_record") if !id.is_null() => Some(format!(
                "{}{}",
                self.settings.record_url(&cfg.name, &display_value(&id)),
                loaded.parent_query
            )),
            _ => None,
        };
        Ok(CreateOutcome { id, redirect })
    }

    /// Update the editable fields present in the payload (`modelName`, `id` plus values).
    /// Values equal to the stored ones are dropped; when nothing is left no write happens.
    pub async fn update(&self, ctx: &RequestContext, payload: Record) -> Result<UpdateOutcome, AppError> {
        let entity = model_name(&payload)?;
        let loaded = self.load_checked(&entity, ctx, Action::Update, Some(&payload)).await?;
        let cfg = &loaded.config;
        let id = record_id(&payload)?;
        let pk = cfg.require_primary_key()?;

        let mut assignments: Vec<Assignment> = Vec::new();
        for field in &cfg.editable_fields {
            let snake = to_snake_case(field);
            let Some(value) = payload.get(&snake).or_else(|| payload.get(field.as_str())) else {
                continue;
            };
            if !self.hooks.permits(ctx, &cfg.name, field, Action::Update) {
                tracing::debug!(entity = %cfg.name, field = %field, "field not permitted for update, ignored");
                continue;
            }
            assignments.push(Assignment {
                field: field.clone(),
                column: column_for(cfg, field),
                value: value.clone(),
            });
        }
        // An empty password input means "keep the current one".
        assignments.retain(|a| !(is_password(cfg, &a.field) && is_blank(&a.value)));
        if assignments.is_empty() {
            return Err(AppError::Validation("No valid fields to update".into()));
        }

        for a in assignments.iter_mut() {
            if cfg.column_type(&a.column).is_none() {
                return Err(SchemaError::UnknownColumn {
                    table: cfg.table.clone(),
                    column: a.column.clone(),
                }
                .into());
            }
            let policy = cfg.policy(&a.field);
            if policy.is_some_and(|p| p.no_zero) {
                RequestValidator::validate_no_zero(&a.field, &a.value)?;
            }
            if let Some(value) = prepare_value(cfg, policy, &a.field, &a.column, &a.value, false)? {
                a.value = value;
            }
        }

        let columns: Vec<String> = assignments.iter().map(|a| a.column.clone()).collect();
        let q = sql::select_columns_by_key(self.db.dialect(), &cfg.table, &columns, pk, &id, &loaded.sql_where);
        let original = ctx
            .bounded(self.db.fetch_optional(&q.sql, &q.params))
            .await
            .map_err(|e| persistence(e, &cfg.name, "Failed to retrieve original data"))?
            .ok_or_else(|| AppError::NotFound(format!("{} #{}", cfg.name, display_value(&id))))?;

        assignments.retain(|a| {
            is_password(cfg, &a.field)
                || !original
                    .get(&a.column)
                    .is_some_and(|stored| same_value(cfg.column_type(&a.column), stored, &a.value))
        });
        if assignments.is_empty() {
            tracing::info!(entity = %cfg.name, id = %display_value(&id), "no new data for update");
            return Ok(UpdateOutcome::NoChanges);
        }

        self.encrypt_passwords(ctx, cfg, &mut assignments).await?;

        if let Some(lifecycle) = &self.hooks.lifecycle {
            let record = to_record(&assignments);
            if let HookDecision::Deny(message) = lifecycle
                .before_update(ctx, self.db.as_ref(), &cfg.table, &id, &record)
                .await
            {
                tracing::info!(entity = %cfg.name, reason = %message, "update vetoed");
                return Err(AppError::Vetoed(message));
            }
        }

        let data: Vec<(String, Value)> = assignments.iter().map(|a| (a.column.clone(), a.value.clone())).collect();
        let q = sql::update(
            self.db.dialect(),
            &cfg.table,
            &data,
            &cfg.column_types,
            pk,
            &id,
            &loaded.sql_where,
        );
        ctx.bounded(self.db.execute(&q.sql, &q.params))
            .await
            .map_err(|e| persistence(e, &cfg.name, "Failed to update record"))?;

        let changed: Vec<String> = assignments.iter().map(|a| a.column.clone()).collect();
        tracing::info!(entity = %cfg.name, id = %display_value(&id), changed = ?changed, "record updated");

        if let Some(lifecycle) = &self.hooks.lifecycle {
            for a in &assignments {
                let old = original.get(&a.column).map(display_value).unwrap_or_default();
                let new = display_value(&a.value);
                let (lifecycle, ctx, db, table, id, field) = (
                    lifecycle.clone(),
                    ctx.clone(),
                    self.db.clone(),
                    cfg.table.clone(),
                    id.clone(),
                    a.column.clone(),
                );
                tokio::spawn(async move {
                    lifecycle.after_update(ctx, db, table, id, field, old, new).await;
                });
            }
        }

        Ok(UpdateOutcome::Updated { changed })
    }

    /// Replace password values with the encryptor's output. Fails when a password is submitted
    /// and no encryptor is configured.
    async fn encrypt_passwords(
        &self,
        ctx: &RequestContext,
        cfg: &EntityConfig,
        assignments: &mut [Assignment],
    ) -> Result<(), AppError> {
        if !assignments.iter().any(|a| is_password(cfg, &a.field)) {
            return Ok(());
        }
        let Some(encryptor) = &self.hooks.password else {
            tracing::error!(entity = %cfg.name, "password field submitted but no password encryptor is configured");
            return Err(AppError::Persistence("Password encryption is not configured".into()));
        };
        let fields = to_record(assignments);
        for a in assignments.iter_mut().filter(|a| is_password(cfg, &a.field)) {
            let plaintext = display_value(&a.value);
            let ciphertext = encryptor
                .encrypt(ctx, &cfg.table, &a.column, &fields, &plaintext)
                .await
                .map_err(|e| {
                    tracing::error!(entity = %cfg.name, field = %a.field, error = %e, "password encryption failed");
                    AppError::Persistence(format!("Failed to encrypt field '{}'", a.field))
                })?;
            a.value = Value::String(ciphertext);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(v: Value) -> Record {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn ids_from_numbers_and_numeric_strings() {
        assert_eq!(record_id(&payload(json!({"id": 7}))).unwrap(), json!(7));
        assert_eq!(record_id(&payload(json!({"id": 7.0}))).unwrap(), json!(7));
        assert_eq!(record_id(&payload(json!({"id": " 12 "}))).unwrap(), json!(12));
        assert!(matches!(record_id(&payload(json!({"id": "x"}))), Err(AppError::BadRequest(_))));
        assert!(matches!(record_id(&payload(json!({}))), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn model_name_is_required() {
        assert_eq!(model_name(&payload(json!({"modelName": "Order"}))).unwrap(), "Order");
        assert!(model_name(&payload(json!({"modelName": ""}))).is_err());
        assert!(model_name(&payload(json!({}))).is_err());
    }

    #[test]
    fn payload_lookup_falls_back_to_snake_case() {
        let p = payload(json!({"customer_id": 3, "note": "x"}));
        assert_eq!(lookup(&p, "customerId"), Some(&json!(3)));
        assert_eq!(lookup(&p, "note"), Some(&json!("x")));
        assert_eq!(lookup(&p, "missing"), None);
    }

    #[test]
    fn numeric_columns_compare_by_value() {
        assert!(same_value(Some("numeric(10,2)"), &json!("12.50"), &json!(12.5)));
        assert!(same_value(Some("integer"), &json!(2), &json!(2)));
        assert!(!same_value(Some("numeric(10,2)"), &json!("12.50"), &json!(12.51)));
        assert!(!same_value(Some("varchar(10)"), &json!("12.50"), &json!("12.5")));
    }

    #[test]
    fn switch_values_compare_as_flags() {
        assert!(same_value(Some("boolean"), &json!(true), &json!(true)));
        assert!(same_value(Some("boolean"), &json!(1), &json!(true)));
        assert!(same_value(Some("boolean"), &Value::Null, &json!(false)));
        assert!(!same_value(Some("boolean"), &json!(false), &json!(true)));
    }

    #[test]
    fn database_errors_are_not_echoed() {
        let err = persistence(AppError::Db(sqlx::Error::PoolTimedOut), "order", "Failed to insert data");
        assert_eq!(err.to_string(), "Failed to insert data");
        let err = persistence(AppError::Timeout, "order", "Failed to insert data");
        assert!(matches!(err, AppError::Timeout));
    }
}
