//! Per-request data handed to the core and to caller-supplied callbacks.

use crate::error::AppError;
use std::collections::HashMap;
use std::future::Future;
use tokio::time::Instant;

/// Access-check vocabulary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    Read,
    Create,
    Update,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::Create => "create",
            Action::Update => "update",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request-scoped inputs: query string, caller identity and attributes for callbacks, optional deadline.
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    pub query: HashMap<String, String>,
    /// Opaque caller identity (set by the surrounding auth layer).
    pub user: Option<String>,
    /// Free-form values for variable resolvers and access checks (e.g. tenant, role).
    pub attributes: HashMap<String, String>,
    pub deadline: Option<Instant>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query(query: HashMap<String, String>) -> Self {
        RequestContext {
            query,
            ..Default::default()
        }
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// 1-based page number from `?page=`; absent or non-positive yields 1.
    pub fn page(&self) -> u32 {
        self.query_param("page")
            .and_then(|p| p.trim().parse::<i64>().ok())
            .filter(|p| *p >= 1)
            .map(|p| p.min(u32::MAX as i64) as u32)
            .unwrap_or(1)
    }

    /// Run a database future under the request deadline, if one is set.
    pub async fn bounded<T, F>(&self, fut: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        match self.deadline {
            Some(deadline) => match tokio::time::timeout_at(deadline, fut).await {
                Ok(res) => res.map_err(AppError::Db),
                Err(_) => Err(AppError::Timeout),
            },
            None => fut.await.map_err(AppError::Db),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn ctx_with_page(p: &str) -> RequestContext {
        RequestContext::with_query(HashMap::from([("page".to_string(), p.to_string())]))
    }

    #[test]
    fn page_defaults_to_one() {
        assert_eq!(RequestContext::new().page(), 1);
        assert_eq!(ctx_with_page("0").page(), 1);
        assert_eq!(ctx_with_page("-3").page(), 1);
        assert_eq!(ctx_with_page("abc").page(), 1);
        assert_eq!(ctx_with_page("4").page(), 4);
    }

    #[tokio::test]
    async fn bounded_times_out_past_deadline() {
        let ctx = RequestContext {
            deadline: Some(Instant::now() + Duration::from_millis(10)),
            ..Default::default()
        };
        let res = ctx
            .bounded(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, sqlx::Error>(1)
            })
            .await;
        assert!(matches!(res, Err(AppError::Timeout)));
    }
}
