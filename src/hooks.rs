//! Caller-supplied callbacks: access checks, variable resolution, dynamic columns,
//! password encryption and lifecycle hooks.

use crate::context::{Action, RequestContext};
use crate::db::{Database, Record};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Consulted before every read/create/update and before exposing a field in a create form.
/// `field` is empty for entity-level checks.
pub trait AccessCheck: Send + Sync {
    fn permits(&self, ctx: &RequestContext, entity: &str, field: &str, action: Action) -> bool;
}

impl<F> AccessCheck for F
where
    F: Fn(&RequestContext, &str, &str, Action) -> bool + Send + Sync,
{
    fn permits(&self, ctx: &RequestContext, entity: &str, field: &str, action: Action) -> bool {
        self(ctx, entity, field, action)
    }
}

/// Supplies values for `{{name}}` placeholders in row filters. None or empty leaves the placeholder.
/// The returned text is pasted into the SQL filter as is: return trusted values (e.g. request
/// attributes set by the host application) and pass anything taken from the request itself
/// through [`crate::config::sql_literal`].
pub trait VariableResolver: Send + Sync {
    fn resolve(&self, ctx: &RequestContext, entity: &str, name: &str) -> Option<String>;
}

impl<F> VariableResolver for F
where
    F: Fn(&RequestContext, &str, &str) -> Option<String> + Send + Sync,
{
    fn resolve(&self, ctx: &RequestContext, entity: &str, name: &str) -> Option<String> {
        self(ctx, entity, name)
    }
}

/// Producer for fields bound to the "dynamic" computed column.
#[async_trait]
pub trait DynamicColumn: Send + Sync {
    async fn render(&self, ctx: &RequestContext, db: &dyn Database, table: &str, field: &str, record: &Record) -> String;
}

#[async_trait]
pub trait PasswordEncryptor: Send + Sync {
    /// `fields` is the full set of values being written.
    async fn encrypt(
        &self,
        ctx: &RequestContext,
        table: &str,
        field: &str,
        fields: &Record,
        plaintext: &str,
    ) -> Result<String, String>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HookDecision {
    Allow,
    Deny(String),
}

/// Before hooks may veto; after hooks run detached from the response.
#[async_trait]
pub trait LifecycleHooks: Send + Sync {
    async fn before_create(&self, _ctx: &RequestContext, _db: &dyn Database, _table: &str, _data: &Record) -> HookDecision {
        HookDecision::Allow
    }

    async fn after_create(&self, _ctx: RequestContext, _db: Arc<dyn Database>, _table: String, _id: Value, _data: Record) {}

    async fn before_update(
        &self,
        _ctx: &RequestContext,
        _db: &dyn Database,
        _table: &str,
        _id: &Value,
        _data: &Record,
    ) -> HookDecision {
        HookDecision::Allow
    }

    /// Once per changed field, with the text form of the old and new value.
    async fn after_update(
        &self,
        _ctx: RequestContext,
        _db: Arc<dyn Database>,
        _table: String,
        _id: Value,
        _field: String,
        _old: String,
        _new: String,
    ) {
    }
}

/// All callbacks of one service. Access defaults to permit-all.
#[derive(Clone)]
pub struct Hooks {
    pub access: Arc<dyn AccessCheck>,
    pub variables: Option<Arc<dyn VariableResolver>>,
    pub dynamic_column: Option<Arc<dyn DynamicColumn>>,
    pub password: Option<Arc<dyn PasswordEncryptor>>,
    pub lifecycle: Option<Arc<dyn LifecycleHooks>>,
}

fn permit_all(_: &RequestContext, _: &str, _: &str, _: Action) -> bool {
    true
}

impl Default for Hooks {
    fn default() -> Self {
        Hooks {
            access: Arc::new(permit_all),
            variables: None,
            dynamic_column: None,
            password: None,
            lifecycle: None,
        }
    }
}

impl Hooks {
    pub fn with_access(mut self, access: impl AccessCheck + 'static) -> Self {
        self.access = Arc::new(access);
        self
    }

    pub fn with_variables(mut self, resolver: impl VariableResolver + 'static) -> Self {
        self.variables = Some(Arc::new(resolver));
        self
    }

    pub fn with_dynamic_column(mut self, producer: impl DynamicColumn + 'static) -> Self {
        self.dynamic_column = Some(Arc::new(producer));
        self
    }

    pub fn with_password(mut self, encryptor: impl PasswordEncryptor + 'static) -> Self {
        self.password = Some(Arc::new(encryptor));
        self
    }

    pub fn with_lifecycle(mut self, hooks: impl LifecycleHooks + 'static) -> Self {
        self.lifecycle = Some(Arc::new(hooks));
        self
    }

    pub fn permits(&self, ctx: &RequestContext, entity: &str, field: &str, action: Action) -> bool {
        self.access.permits(ctx, entity, field, action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_permits_everything() {
        let hooks = Hooks::default();
        assert!(hooks.permits(&RequestContext::new(), "Order", "", Action::Update));
    }

    #[test]
    fn closures_act_as_callbacks() {
        let hooks = Hooks::default()
            .with_access(|_: &RequestContext, entity: &str, _: &str, action: Action| entity != "Secret" || action == Action::Read)
            .with_variables(|ctx: &RequestContext, _: &str, name: &str| ctx.attribute(name).map(str::to_string));
        let mut ctx = RequestContext::new();
        ctx.attributes.insert("tenant".into(), "42".into());
        assert!(!hooks.permits(&ctx, "Secret", "", Action::Create));
        assert!(hooks.permits(&ctx, "Secret", "", Action::Read));
        let resolver = hooks.variables.as_ref().unwrap();
        assert_eq!(resolver.resolve(&ctx, "Order", "tenant").as_deref(), Some("42"));
    }
}
