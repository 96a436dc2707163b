//! Service settings. Defaults can be overridden from the environment (`TABULA_*`, `.env` honoured).

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct Settings {
    /// Directory holding one `<entity>.json` declarative source per entity.
    pub config_dir: PathBuf,
    /// URL prefix for generated links, without trailing slash (e.g. "/tabula").
    pub base_path: String,
    pub page_size: u32,
    pub headers_tag: String,
    pub breadcrumbs_root_name: String,
    pub breadcrumbs_root_url: String,
    pub breadcrumbs_divider: String,
    /// Parent chains longer than this are rejected as cyclic.
    pub max_parent_depth: usize,
    pub body_limit: usize,
    /// Deadline for the database work of one HTTP request; `None` waits indefinitely.
    pub request_timeout: Option<Duration>,
    /// Take the caller identity from the `X-Tabula-User` header. Only for deployments behind a
    /// proxy that sets the header itself and strips it from client requests.
    pub trust_caller_header: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            config_dir: PathBuf::from("config/tabula"),
            base_path: "/tabula".into(),
            page_size: 100,
            headers_tag: "h2".into(),
            breadcrumbs_root_name: "Home".into(),
            breadcrumbs_root_url: "/".into(),
            breadcrumbs_divider: ">".into(),
            max_parent_depth: 8,
            body_limit: 1024 * 1024,
            request_timeout: None,
            trust_caller_header: false,
        }
    }
}

impl Settings {
    /// Defaults overlaid with `TABULA_*` environment variables. Loads `.env` if present.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let mut s = Settings::default();
        if let Ok(dir) = std::env::var("TABULA_CONFIG_DIR") {
            s.config_dir = PathBuf::from(dir);
        }
        if let Ok(base) = std::env::var("TABULA_BASE_PATH") {
            s.base_path = normalize_base_path(&base);
        }
        s.page_size = env_parsed("TABULA_PAGE_SIZE", s.page_size).max(1);
        s.max_parent_depth = env_parsed("TABULA_MAX_PARENT_DEPTH", s.max_parent_depth);
        s.body_limit = env_parsed("TABULA_BODY_LIMIT", s.body_limit);
        let timeout_ms: u64 = env_parsed("TABULA_REQUEST_TIMEOUT_MS", 0);
        s.request_timeout = (timeout_ms > 0).then(|| Duration::from_millis(timeout_ms));
        s.trust_caller_header = env_parsed("TABULA_TRUST_CALLER_HEADER", s.trust_caller_header);
        for (key, slot) in [
            ("TABULA_HEADERS_TAG", &mut s.headers_tag),
            ("TABULA_BREADCRUMBS_ROOT_NAME", &mut s.breadcrumbs_root_name),
            ("TABULA_BREADCRUMBS_ROOT_URL", &mut s.breadcrumbs_root_url),
            ("TABULA_BREADCRUMBS_DIVIDER", &mut s.breadcrumbs_divider),
        ] {
            if let Ok(v) = std::env::var(key) {
                if !v.is_empty() {
                    *slot = v;
                }
            }
        }
        s
    }

    pub fn with_config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config_dir = dir.into();
        self
    }

    pub fn with_base_path(mut self, base: &str) -> Self {
        self.base_path = normalize_base_path(base);
        self
    }

    /// Table view URL of an entity.
    pub fn entity_url(&self, entity: &str) -> String {
        format!("{}/{}", self.base_path, entity)
    }

    /// Detail view URL of a record.
    pub fn record_url(&self, entity: &str, id: &str) -> String {
        format!("{}/{}/{}", self.base_path, entity, id)
    }
}

fn normalize_base_path(base: &str) -> String {
    let trimmed = base.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

fn env_parsed<T: FromStr + Copy + std::fmt::Display>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(key, value = %raw, default = %default, "invalid setting, using default");
                default
            }
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_path_is_normalized() {
        assert_eq!(normalize_base_path("admin/"), "/admin");
        assert_eq!(normalize_base_path("/tabula"), "/tabula");
        assert_eq!(normalize_base_path("/"), "");
    }

    #[test]
    fn caller_header_is_not_trusted_by_default() {
        assert!(!Settings::default().trust_caller_header);
    }

    #[test]
    fn builds_urls_under_base_path() {
        let s = Settings::default().with_base_path("/admin");
        assert_eq!(s.entity_url("order"), "/admin/order");
        assert_eq!(s.record_url("order", "7"), "/admin/order/7");
    }
}
