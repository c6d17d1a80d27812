//! Tenant identity provider repository.
//!
//! Postgres-backed [`TenantDirectory`]. Each row of
//! `tenant_identity_providers` names the hosted user pool of one tenant
//! domain; the issuer and key set location are derived from it.
//!
//! # Security
//!
//! - All queries use parameterized statements (SQL injection safe)
//! - Database errors are logged here and surface only as `Unavailable`

use crate::directory::{DirectoryError, TenantDirectory, TenantRecord};
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;
use url::Url;

/// Tenant directory backed by the `tenant_identity_providers` table.
#[derive(Debug, Clone)]
pub struct PgTenantDirectory {
    pool: PgPool,
}

impl PgTenantDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TenantDirectory for PgTenantDirectory {
    #[instrument(skip_all, name = "auth.directory.resolve", fields(domain = %domain))]
    async fn resolve(&self, domain: &str) -> Result<TenantRecord, DirectoryError> {
        let row: Option<TenantIdentityProviderRow> = sqlx::query_as(
            r#"
            SELECT domain_name, region, user_pool_id, key_set_url
            FROM tenant_identity_providers
            WHERE domain_name = $1
            "#,
        )
        .bind(domain)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::warn!(target: "auth.directory", error = %e, "Tenant lookup failed");
            DirectoryError::Unavailable
        })?;

        let Some(row) = row else {
            tracing::debug!(target: "auth.directory", "Tenant not found");
            return Err(DirectoryError::NotFound);
        };

        row.into_record()
    }

    async fn health_check(&self) -> Result<(), DirectoryError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| {
                tracing::warn!(target: "auth.directory", error = %e, "Tenant directory health check failed");
                DirectoryError::Unavailable
            })
    }
}

// ============================================================================
// Row Types
// ============================================================================

#[derive(Debug, sqlx::FromRow)]
struct TenantIdentityProviderRow {
    domain_name: String,
    region: String,
    user_pool_id: String,
    key_set_url: Option<String>,
}

impl TenantIdentityProviderRow {
    /// A row whose identifiers do not form URLs is treated as a backend fault.
    fn into_record(self) -> Result<TenantRecord, DirectoryError> {
        let invalid = |e: url::ParseError| {
            tracing::error!(
                target: "auth.directory",
                domain = %self.domain_name,
                error = %e,
                "Tenant record has invalid identity provider coordinates"
            );
            DirectoryError::Unavailable
        };

        let record = TenantRecord::from_user_pool(&self.domain_name, &self.region, &self.user_pool_id)
            .map_err(invalid)?;

        match self.key_set_url.as_deref() {
            Some(key_set_url) => Ok(record.with_key_set_location(Url::parse(key_set_url).map_err(invalid)?)),
            None => Ok(record),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn row(key_set_url: Option<&str>) -> TenantIdentityProviderRow {
        TenantIdentityProviderRow {
            domain_name: "bar.example".to_string(),
            region: "eu-west-1".to_string(),
            user_pool_id: "eu-west-1_Pool123".to_string(),
            key_set_url: key_set_url.map(str::to_string),
        }
    }

    #[test]
    fn test_row_into_record_derives_issuer() {
        let record = row(None).into_record().unwrap();

        assert_eq!(record.domain, "bar.example");
        assert_eq!(
            record.issuer_authority,
            "https://cognito-idp.eu-west-1.amazonaws.com/eu-west-1_Pool123"
        );
        assert_eq!(
            record.key_set_location.as_str(),
            "https://cognito-idp.eu-west-1.amazonaws.com/eu-west-1_Pool123/.well-known/jwks.json"
        );
    }

    #[test]
    fn test_row_into_record_key_set_override() {
        let record = row(Some("https://keys.internal/bar/jwks.json"))
            .into_record()
            .unwrap();
        assert_eq!(
            record.key_set_location.as_str(),
            "https://keys.internal/bar/jwks.json"
        );
    }

    #[test]
    fn test_row_with_invalid_key_set_url_is_unavailable() {
        assert_eq!(
            row(Some("not a url")).into_record().unwrap_err(),
            DirectoryError::Unavailable
        );
    }

    #[test]
    fn test_row_with_invalid_region_is_unavailable() {
        let mut bad = row(None);
        bad.region = "eu west".to_string();
        assert_eq!(bad.into_record().unwrap_err(), DirectoryError::Unavailable);
    }
}
