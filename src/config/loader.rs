//! Load entity configurations from the declarative source, merge schema defaults, resolve parents.
//! Resolved configurations are cached by entity name and source timestamp; the request-scoped
//! subset (filter variables, parent values) is rebuilt on every load.

use crate::cache::SharedCache;
use crate::case::to_snake_case;
use crate::config::policy::{resolve_policies, PolicyInput};
use crate::config::resolved::{EntityConfig, LoadedEntity, ParentLink};
use crate::config::source::ConfigSource;
use crate::config::types::{EntityDeclaration, RelatedDataDecl};
use crate::config::variables::{has_placeholders, resolve_variables};
use crate::context::RequestContext;
use crate::db::{display_value, Record};
use crate::error::ConfigError;
use crate::hooks::VariableResolver;
use crate::schema::SchemaIntrospector;
use async_recursion::async_recursion;
use serde_json::Value;
use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::time::SystemTime;

#[derive(Clone)]
struct CachedEntity {
    config: Arc<EntityConfig>,
    modified: SystemTime,
}

pub struct ConfigLoader {
    source: Arc<dyn ConfigSource>,
    introspector: Arc<SchemaIntrospector>,
    variables: Option<Arc<dyn VariableResolver>>,
    cache: SharedCache<String, CachedEntity>,
    base_path: String,
    max_parent_depth: usize,
}

impl ConfigLoader {
    pub fn new(
        source: Arc<dyn ConfigSource>,
        introspector: Arc<SchemaIntrospector>,
        variables: Option<Arc<dyn VariableResolver>>,
        base_path: &str,
        max_parent_depth: usize,
    ) -> Self {
        ConfigLoader {
            source,
            introspector,
            variables,
            cache: SharedCache::new(),
            base_path: base_path.to_string(),
            max_parent_depth,
        }
    }

    /// Number of cached entity configurations.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    /// Resolve `entity` for this request. `payload` (mutation body) takes the place of the query
    /// string as the source of parent variable values.
    pub async fn load(
        &self,
        entity: &str,
        ctx: &RequestContext,
        payload: Option<&Record>,
    ) -> Result<LoadedEntity, ConfigError> {
        self.load_at_depth(entity, ctx, payload, 0).await.map_err(|e| {
            tracing::error!(entity, error = %e, "cannot load entity configuration");
            e
        })
    }

    #[async_recursion]
    async fn load_at_depth(
        &self,
        entity: &str,
        ctx: &RequestContext,
        payload: Option<&'async_recursion Record>,
        depth: usize,
    ) -> Result<LoadedEntity, ConfigError> {
        if depth > self.max_parent_depth {
            return Err(ConfigError::ParentChainTooDeep(entity.to_string(), self.max_parent_depth));
        }
        let config = self.shared_config(entity).await?;

        let parent = match &config.parent {
            Some(link) => {
                let loaded = self
                    .load_at_depth(&link.entity, ctx, payload, depth + 1)
                    .await
                    .map_err(|e| ConfigError::Parent {
                        entity: entity.to_string(),
                        parent: link.entity.clone(),
                        source: Box::new(e),
                    })?;
                Some(Box::new(loaded))
            }
            None => None,
        };

        if self.variables.is_none() && has_placeholders(&config.sql_where_template) {
            return Err(ConfigError::MissingVariableResolver(entity.to_string()));
        }
        let sql_where = resolve_variables(&config.sql_where_template, entity, ctx, self.variables.as_deref());

        let variable = config.parent.as_ref().and_then(|p| p.query_variable.as_deref());
        let parent_value = variable.and_then(|name| parent_value_of(name, ctx, payload));
        let inherited = parent.as_ref().map(|p| p.parent_query.as_str()).unwrap_or("");
        let parent_query = match (variable, &parent_value) {
            (Some(name), Some(value)) => append_query(inherited, name, value),
            _ => inherited.to_string(),
        };

        Ok(LoadedEntity {
            config,
            sql_where,
            parent_value,
            parent_query,
            parent,
        })
    }

    /// Cached configuration, rebuilt when the source timestamp changed.
    async fn shared_config(&self, entity: &str) -> Result<Arc<EntityConfig>, ConfigError> {
        let modified = self
            .source
            .stat(entity)
            .await
            .map_err(|e| source_error(entity, e))?;
        let key = entity.to_string();
        if let Some(cached) = self.cache.get(&key) {
            if cached.modified == modified {
                return Ok(cached.config);
            }
            tracing::info!(entity, "entity source changed, reloading");
            self.introspector.forget(&cached.config.table);
        }
        let config = Arc::new(self.build(entity).await?);
        self.cache.insert(
            key,
            CachedEntity {
                config: config.clone(),
                modified,
            },
        );
        Ok(config)
    }

    async fn build(&self, entity: &str) -> Result<EntityConfig, ConfigError> {
        let bytes = self.source.read(entity).await.map_err(|e| source_error(entity, e))?;
        let decl: EntityDeclaration = serde_json::from_slice(&bytes).map_err(|e| ConfigError::Parse {
            entity: entity.to_string(),
            message: e.to_string(),
        })?;

        let name = decl.name.clone().filter(|n| !n.is_empty()).unwrap_or_else(|| entity.to_string());
        let title = decl.page_title.clone().filter(|t| !t.is_empty()).unwrap_or_else(|| entity.to_string());
        let table = decl
            .db_table
            .clone()
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| to_snake_case(entity));

        let primary_key = match self.introspector.primary_key_of(&table).await {
            Ok(pk) => Some(pk),
            Err(e) => {
                tracing::warn!(entity, table = %table, error = %e, "cannot determine primary key");
                None
            }
        };
        let column_types = self.introspector.column_types_of(&table).await.unwrap_or_default();

        let mut related_keys = HashMap::new();
        for rd in decl.related_data.values() {
            if let RelatedDataDecl::Columns {
                table: related,
                key_field: None,
                ..
            } = rd
            {
                if related_keys.contains_key(related) {
                    continue;
                }
                match self.introspector.primary_key_of(related).await {
                    Ok(pk) => {
                        related_keys.insert(related.clone(), pk);
                    }
                    Err(e) => tracing::warn!(entity, table = %related, error = %e, "related table introspection failed"),
                }
            }
        }

        let resolved = resolve_policies(&PolicyInput {
            entity: &name,
            decl: &decl,
            primary_key: primary_key.as_deref(),
            column_types: &column_types,
            related_keys: &related_keys,
            base_path: &self.base_path,
        })?;

        let parent = decl.parent.as_ref().map(|p| ParentLink {
            entity: p.model_name.clone(),
            local_field: p.local_connection_field.clone().filter(|f| !f.is_empty()),
            query_variable: p.query_variable_name.clone().filter(|v| !v.is_empty()),
        });

        tracing::debug!(entity, table = %table, fields = resolved.policies.len(), "entity configuration resolved");
        Ok(EntityConfig {
            name,
            title,
            table,
            sql_where_template: decl.sql_where.clone().unwrap_or_default(),
            fields: decl.fields.clone(),
            order_by: decl.order_by.clone().unwrap_or_default(),
            addable_fields: decl.addable_fields.clone(),
            editable_fields: decl.editable_fields.clone(),
            required_fields: decl.required_fields.clone(),
            primary_key,
            column_types,
            policies: resolved.policies,
            parent,
            breadcrumb_label_field: decl
                .breadcrumb
                .as_ref()
                .and_then(|b| b.label_field.clone())
                .filter(|f| !f.is_empty()),
            header_tags: resolved.directives,
        })
    }
}

fn source_error(entity: &str, e: io::Error) -> ConfigError {
    if e.kind() == io::ErrorKind::NotFound {
        ConfigError::NotFound(entity.to_string())
    } else {
        ConfigError::Source {
            entity: entity.to_string(),
            message: e.to_string(),
        }
    }
}

/// Parent variable from the mutation payload when there is one, else from the query string.
fn parent_value_of(name: &str, ctx: &RequestContext, payload: Option<&Record>) -> Option<String> {
    let value = match payload {
        Some(p) => match p.get(name) {
            Some(Value::String(s)) => Some(s.clone()),
            Some(v @ Value::Number(_)) => Some(display_value(v)),
            _ => None,
        },
        None => ctx.query_param(name).map(str::to_string),
    };
    value.filter(|v| !v.is_empty())
}

fn append_query(inherited: &str, name: &str, value: &str) -> String {
    let sep = if inherited.is_empty() { '?' } else { '&' };
    format!(
        "{}{}{}={}",
        inherited,
        sep,
        urlencoding::encode(name),
        urlencoding::encode(value)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_string_accumulates_root_first() {
        let q = append_query("", "customer_id", "3");
        assert_eq!(q, "?customer_id=3");
        assert_eq!(append_query(&q, "order id", "7&8"), "?customer_id=3&order%20id=7%268");
    }

    #[test]
    fn payload_wins_over_query() {
        let ctx = RequestContext::with_query(HashMap::from([("order_id".to_string(), "9".to_string())]));
        let mut payload = Record::new();
        payload.insert("order_id".into(), Value::from(4));
        assert_eq!(parent_value_of("order_id", &ctx, Some(&payload)).as_deref(), Some("4"));
        assert_eq!(parent_value_of("order_id", &ctx, None).as_deref(), Some("9"));
        assert_eq!(parent_value_of("order_id", &ctx, Some(&Record::new())), None);
    }
}
