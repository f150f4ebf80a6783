//! Shared DTO types used across multiple endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Query parameters for list endpoints: optional status filter plus
/// limit/offset pagination.
#[derive(Debug, Clone, Deserialize)]
pub struct ListParams {
    /// Status filter, as the lowercase wire name. `None` returns all.
    #[serde(default)]
    pub status: Option<String>,
    /// Maximum rows to return (max 100). Defaults to 20.
    #[serde(default = "default_limit")]
    pub limit: i64,
    /// Rows to skip. Defaults to 0.
    #[serde(default)]
    pub offset: i64,
}

/// Pagination echo included in list responses.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PageMeta {
    /// The limit the query ran with.
    pub limit: i64,
    /// The offset the query ran with.
    pub offset: i64,
    /// Number of rows in this page.
    pub count: i64,
}

fn default_limit() -> i64 {
    20
}

impl ListParams {
    /// Clamps `limit` to `1..=100` and `offset` to non-negative.
    #[must_use]
    pub fn clamped(&self) -> Self {
        Self {
            status: self.status.clone(),
            limit: self.limit.clamp(1, 100),
            offset: self.offset.max(0),
        }
    }
}
