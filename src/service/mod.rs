//! AdminService: table/record/create views and create/update handling over configured entities.

mod mutation;
mod validation;
mod views;

pub use mutation::{CreateOutcome, UpdateOutcome};
pub use validation::RequestValidator;
pub use views::ViewMode;

use crate::config::{ConfigLoader, ConfigSource, FsConfigSource, LoadedEntity};
use crate::context::{Action, RequestContext};
use crate::db::{Database, Record};
use crate::error::AppError;
use crate::hooks::Hooks;
use crate::render::RenderEnv;
use crate::schema::SchemaIntrospector;
use crate::settings::Settings;
use std::sync::Arc;

/// Owns the caches (configuration, schema) and the caller's callbacks.
pub struct AdminService {
    db: Arc<dyn Database>,
    settings: Arc<Settings>,
    introspector: Arc<SchemaIntrospector>,
    loader: ConfigLoader,
    hooks: Hooks,
}

impl AdminService {
    /// Service reading entity declarations from `settings.config_dir`.
    pub fn new(db: Arc<dyn Database>, settings: Settings, hooks: Hooks) -> Self {
        let source = Arc::new(FsConfigSource::new(settings.config_dir.clone()));
        Self::with_source(db, settings, hooks, source)
    }

    pub fn with_source(db: Arc<dyn Database>, settings: Settings, hooks: Hooks, source: Arc<dyn ConfigSource>) -> Self {
        let introspector = Arc::new(SchemaIntrospector::new(db.clone()));
        let loader = ConfigLoader::new(
            source,
            introspector.clone(),
            hooks.variables.clone(),
            &settings.base_path,
            settings.max_parent_depth,
        );
        AdminService {
            db,
            settings: Arc::new(settings),
            introspector,
            loader,
            hooks,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn database(&self) -> &Arc<dyn Database> {
        &self.db
    }

    pub fn loader(&self) -> &ConfigLoader {
        &self.loader
    }

    pub fn introspector(&self) -> &SchemaIntrospector {
        &self.introspector
    }

    pub fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    /// Entity-level access check, then configuration load.
    async fn load_checked(
        &self,
        entity: &str,
        ctx: &RequestContext,
        action: Action,
        payload: Option<&Record>,
    ) -> Result<LoadedEntity, AppError> {
        if !self.hooks.permits(ctx, entity, "", action) {
            tracing::info!(entity, action = %action, user = ?ctx.user, "access denied");
            return Err(AppError::AccessDenied {
                entity: entity.to_string(),
                action: action.to_string(),
            });
        }
        Ok(self.loader.load(entity, ctx, payload).await?)
    }

    fn render_env<'a>(&'a self, ctx: &'a RequestContext) -> RenderEnv<'a> {
        RenderEnv {
            db: self.db.as_ref(),
            ctx,
            hooks: &self.hooks,
            settings: &self.settings,
        }
    }
}
