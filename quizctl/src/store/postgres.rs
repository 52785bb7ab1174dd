//! PostgreSQL identity store, reading the tables written by the login layer.

use async_trait::async_trait;
use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use super::{
    ApiKeyRecord, ApiKeyStore, CreatedApiKey, CredentialSettings, KeyRejection, KeyVerification, NewApiKey, Result, Session,
    SessionOrigin, SessionStore, StoreError, User, expiry_from,
};
use crate::crypto::{generate_api_key, hash_api_key};
use crate::types::abbrev_id;

const API_KEY_COLUMNS: &str = "id, name, user_id, permissions, expires_at, enabled, created_at";
const USER_COLUMNS: &str = "id, name, email, display_name, given_name, family_name, preferred_username, groups";

#[derive(sqlx::FromRow)]
struct SessionRow {
    #[sqlx(flatten)]
    user: User,
    expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
    settings: CredentialSettings,
}

impl PostgresStore {
    pub fn new(pool: PgPool, settings: CredentialSettings) -> Self {
        Self { pool, settings }
    }

    async fn find_key(&self, secret: &str) -> Result<Option<ApiKeyRecord>> {
        let record = sqlx::query_as::<_, ApiKeyRecord>(&format!("SELECT {API_KEY_COLUMNS} FROM api_keys WHERE key_hash = $1"))
            .bind(hash_api_key(secret))
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    async fn find_user(&self, user_id: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }
}

#[async_trait]
impl ApiKeyStore for PostgresStore {
    #[instrument(skip_all, err)]
    async fn verify_key(&self, secret: &str) -> Result<KeyVerification> {
        Ok(match self.find_key(secret).await? {
            Some(record) => record.verify_at(Utc::now()),
            None => KeyVerification::Rejected(KeyRejection::Unknown),
        })
    }

    #[instrument(skip(self, request), fields(name = %request.name, user_id = %abbrev_id(&request.user_id)), err)]
    async fn create_key(&self, request: NewApiKey) -> Result<CreatedApiKey> {
        let secret = generate_api_key();
        let expires_at = expiry_from(Utc::now(), request.expires_in)?;
        let permissions = serde_json::to_string(&request.permissions)
            .map_err(|e| StoreError::Unavailable(format!("failed to encode permissions: {e}")))?;

        let record = sqlx::query_as::<_, ApiKeyRecord>(&format!(
            r#"
            INSERT INTO api_keys (id, name, key_hash, user_id, permissions, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {API_KEY_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4().to_string())
        .bind(&request.name)
        .bind(hash_api_key(&secret))
        .bind(&request.user_id)
        .bind(permissions)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(CreatedApiKey { record, secret })
    }

    #[instrument(skip(self), fields(key_id = %abbrev_id(key_id)), err)]
    async fn delete_key(&self, key_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM api_keys WHERE id = $1")
            .bind(key_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_id(user_id)), err)]
    async fn list_keys(&self, user_id: &str) -> Result<Vec<ApiKeyRecord>> {
        let keys = sqlx::query_as::<_, ApiKeyRecord>(&format!(
            "SELECT {API_KEY_COLUMNS} FROM api_keys WHERE user_id = $1 ORDER BY created_at ASC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(keys)
    }
}

#[async_trait]
impl SessionStore for PostgresStore {
    #[instrument(skip_all, err)]
    async fn get_session(&self, headers: &HeaderMap) -> Result<Option<Session>> {
        if self.settings.api_key_sessions
            && let Some(secret) = self.settings.api_key(headers)
            && let Some(record) = self.find_key(secret).await?
            && let KeyVerification::Valid(record) = record.verify_at(Utc::now())
            && let Some(user) = self.find_user(&record.user_id).await?
        {
            return Ok(Some(Session {
                user,
                expires_at: record.expires_at,
                origin: SessionOrigin::ApiKey,
            }));
        }

        let Some(token) = self.settings.session_token(headers) else {
            return Ok(None);
        };

        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT u.id, u.name, u.email, u.display_name, u.given_name, u.family_name, u.preferred_username, u.groups,
                   s.expires_at
            FROM sessions s
            JOIN users u ON u.id = s.user_id
            WHERE s.token = $1 AND s.expires_at > NOW()
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| Session {
            user: row.user,
            expires_at: Some(row.expires_at),
            origin: SessionOrigin::Cookie,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{api_key_header, headers, session_cookie_header};
    use std::collections::BTreeMap;
    use std::time::Duration;

    async fn insert_user(pool: &PgPool, id: &str, groups: Option<&str>) {
        sqlx::query("INSERT INTO users (id, name, email, display_name, groups) VALUES ($1, $1, $2, $3, $4)")
            .bind(id)
            .bind(format!("{id}@example.com"))
            .bind(format!("Test {id}"))
            .bind(groups)
            .execute(pool)
            .await
            .unwrap();
    }

    async fn insert_session(pool: &PgPool, token: &str, user_id: &str, expires_at: DateTime<Utc>) {
        sqlx::query("INSERT INTO sessions (token, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(token)
            .bind(user_id)
            .bind(expires_at)
            .execute(pool)
            .await
            .unwrap();
    }

    fn new_key(user_id: &str, expires_in: Option<Duration>) -> NewApiKey {
        NewApiKey {
            user_id: user_id.to_string(),
            name: "ci".to_string(),
            expires_in,
            permissions: BTreeMap::from([("quizzes".to_string(), vec!["read".to_string()])]),
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_list_and_delete_keys(pool: PgPool) {
        insert_user(&pool, "owner", None).await;
        let store = PostgresStore::new(pool, CredentialSettings::default());

        let created = store.create_key(new_key("owner", Some(Duration::from_secs(3600)))).await.unwrap();
        assert!(created.secret.starts_with(crate::crypto::API_KEY_PREFIX));
        assert_eq!(created.record.user_id, "owner");
        assert_eq!(created.record.permissions.as_deref(), Some(r#"{"quizzes":["read"]}"#));
        assert!(created.record.enabled);
        assert!(created.record.expires_at.is_some_and(|at| at > Utc::now()));

        let keys = store.list_keys("owner").await.unwrap();
        assert_eq!(keys, vec![created.record.clone()]);
        assert!(store.list_keys("someone-else").await.unwrap().is_empty());

        assert!(store.delete_key(&created.record.id).await.unwrap());
        assert!(!store.delete_key(&created.record.id).await.unwrap());
        assert!(!store.delete_key("no-such-key").await.unwrap());
        assert!(store.list_keys("owner").await.unwrap().is_empty());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_out_of_range_expiry_is_not_inserted(pool: PgPool) {
        insert_user(&pool, "owner", None).await;
        let store = PostgresStore::new(pool, CredentialSettings::default());

        let result = store
            .create_key(new_key("owner", Some(Duration::from_secs(1_000_000_000_000_000))))
            .await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
        assert!(store.list_keys("owner").await.unwrap().is_empty());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_verify_unknown_revoked_and_expired_keys(pool: PgPool) {
        insert_user(&pool, "owner", None).await;
        let store = PostgresStore::new(pool.clone(), CredentialSettings::default());

        assert_eq!(
            store.verify_key("qz_unknown").await.unwrap(),
            KeyVerification::Rejected(KeyRejection::Unknown)
        );

        let live = store.create_key(new_key("owner", None)).await.unwrap();
        assert_eq!(
            store.verify_key(&live.secret).await.unwrap(),
            KeyVerification::Valid(live.record.clone())
        );

        sqlx::query("UPDATE api_keys SET enabled = FALSE WHERE id = $1")
            .bind(&live.record.id)
            .execute(&pool)
            .await
            .unwrap();
        assert_eq!(
            store.verify_key(&live.secret).await.unwrap(),
            KeyVerification::Rejected(KeyRejection::Revoked)
        );

        let expiring = store.create_key(new_key("owner", Some(Duration::from_secs(3600)))).await.unwrap();
        sqlx::query("UPDATE api_keys SET expires_at = NOW() - INTERVAL '1 minute' WHERE id = $1")
            .bind(&expiring.record.id)
            .execute(&pool)
            .await
            .unwrap();
        assert_eq!(
            store.verify_key(&expiring.secret).await.unwrap(),
            KeyVerification::Rejected(KeyRejection::Expired)
        );
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_cookie_session_joins_user_profile(pool: PgPool) {
        insert_user(&pool, "alice", Some(r#"["staff"]"#)).await;
        insert_session(&pool, "live-token", "alice", Utc::now() + chrono::Duration::hours(1)).await;
        insert_session(&pool, "stale-token", "alice", Utc::now() - chrono::Duration::minutes(1)).await;
        let store = PostgresStore::new(pool, CredentialSettings::default());

        let session = store
            .get_session(&headers([session_cookie_header("live-token")]))
            .await
            .unwrap()
            .expect("live session should resolve");
        assert_eq!(session.origin, SessionOrigin::Cookie);
        assert_eq!(session.user.id, "alice");
        assert_eq!(session.user.email, "alice@example.com");
        assert_eq!(session.user.display_name.as_deref(), Some("Test alice"));
        assert_eq!(session.user.groups.as_deref(), Some(r#"["staff"]"#));
        assert!(session.expires_at.is_some());

        assert!(store.get_session(&headers([session_cookie_header("stale-token")])).await.unwrap().is_none());
        assert!(store.get_session(&headers([session_cookie_header("bogus")])).await.unwrap().is_none());
        assert!(store.get_session(&HeaderMap::new()).await.unwrap().is_none());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_valid_api_key_mints_implicit_session(pool: PgPool) {
        insert_user(&pool, "owner", Some(r#"["admin"]"#)).await;
        insert_user(&pool, "browser", None).await;
        insert_session(&pool, "browser-token", "browser", Utc::now() + chrono::Duration::hours(1)).await;
        let store = PostgresStore::new(pool.clone(), CredentialSettings::default());
        let key = store.create_key(new_key("owner", None)).await.unwrap();

        let session = store
            .get_session(&headers([api_key_header(&key.secret), session_cookie_header("browser-token")]))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(session.origin, SessionOrigin::ApiKey);
        assert_eq!(session.user.id, "owner");
        assert_eq!(session.expires_at, None);

        // Revoked keys no longer mint sessions, so the cookie wins
        sqlx::query("UPDATE api_keys SET enabled = FALSE WHERE id = $1")
            .bind(&key.record.id)
            .execute(&pool)
            .await
            .unwrap();
        let session = store
            .get_session(&headers([api_key_header(&key.secret), session_cookie_header("browser-token")]))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(session.origin, SessionOrigin::Cookie);
        assert_eq!(session.user.id, "browser");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_implicit_sessions_can_be_disabled(pool: PgPool) {
        insert_user(&pool, "owner", None).await;
        let store = PostgresStore::new(
            pool,
            CredentialSettings {
                api_key_sessions: false,
                ..Default::default()
            },
        );
        let key = store.create_key(new_key("owner", None)).await.unwrap();

        assert!(store.get_session(&headers([api_key_header(&key.secret)])).await.unwrap().is_none());
    }
}
