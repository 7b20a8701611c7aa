use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::entities::enums::Role;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    pub account_id: i32,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

#[async_trait]
pub trait SessionService: Send + Sync {
    async fn create(&self, account_id: i32, role: Role) -> Result<String, SessionError>;
    async fn get(&self, session_id: &str) -> Result<Option<SessionData>, SessionError>;
    async fn delete(&self, session_id: &str) -> Result<(), SessionError>;
}

fn new_session_id() -> String {
    Uuid::new_v4().simple().to_string()
}

pub struct RedisSessionService {
    conn: Arc<Mutex<MultiplexedConnection>>,
    ttl_seconds: u64,
    key_prefix: String,
}

impl RedisSessionService {
    pub async fn new(
        redis_url: &str,
        ttl_seconds: u64,
        key_prefix: String,
    ) -> Result<Self, SessionError> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            ttl_seconds,
            key_prefix,
        })
    }

    fn key(&self, session_id: &str) -> String {
        format!("{}:session:{}", self.key_prefix, session_id)
    }
}

#[async_trait]
impl SessionService for RedisSessionService {
    async fn create(&self, account_id: i32, role: Role) -> Result<String, SessionError> {
        let session_id = new_session_id();
        let payload = SessionData {
            account_id,
            role,
            created_at: Utc::now(),
        };
        let value = serde_json::to_string(&payload)?;

        let mut conn = self.conn.lock().await;
        let key = self.key(&session_id);
        conn.set_ex::<_, _, ()>(key, value, self.ttl_seconds).await?;
        Ok(session_id)
    }

    async fn get(&self, session_id: &str) -> Result<Option<SessionData>, SessionError> {
        let mut conn = self.conn.lock().await;
        let key = self.key(session_id);
        let value: Option<String> = conn.get(key).await?;
        let Some(value) = value else {
            return Ok(None);
        };
        let session = serde_json::from_str(&value)?;
        Ok(Some(session))
    }

    async fn delete(&self, session_id: &str) -> Result<(), SessionError> {
        let mut conn = self.conn.lock().await;
        let key = self.key(session_id);
        let _: () = conn.del(key).await?;
        Ok(())
    }
}

/// Process-local session store used when no `REDIS_URL` is configured.
/// Sessions do not survive a restart.
pub struct MemorySessionService {
    sessions: Mutex<HashMap<String, SessionData>>,
    ttl: Duration,
}

impl MemorySessionService {
    pub fn new(ttl_seconds: u64) -> Self {
        let ttl_seconds = i64::try_from(ttl_seconds).unwrap_or(i64::MAX);
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl: Duration::try_seconds(ttl_seconds).unwrap_or(Duration::MAX),
        }
    }

    fn is_expired(&self, session: &SessionData, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(session.created_at) >= self.ttl
    }
}

#[async_trait]
impl SessionService for MemorySessionService {
    async fn create(&self, account_id: i32, role: Role) -> Result<String, SessionError> {
        let session_id = new_session_id();
        let now = Utc::now();
        let mut sessions = self.sessions.lock().await;
        sessions.retain(|_, session| !self.is_expired(session, now));
        sessions.insert(
            session_id.clone(),
            SessionData {
                account_id,
                role,
                created_at: now,
            },
        );
        Ok(session_id)
    }

    async fn get(&self, session_id: &str) -> Result<Option<SessionData>, SessionError> {
        let mut sessions = self.sessions.lock().await;
        match sessions.get(session_id) {
            Some(session) if self.is_expired(session, Utc::now()) => {
                sessions.remove(session_id);
                Ok(None)
            }
            Some(session) => Ok(Some(session.clone())),
            None => Ok(None),
        }
    }

    async fn delete(&self, session_id: &str) -> Result<(), SessionError> {
        self.sessions.lock().await.remove(session_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_sessions_round_trip_and_delete() {
        let sessions = MemorySessionService::new(60);
        let id = sessions.create(7, Role::Nurse).await.unwrap();

        let found = sessions.get(&id).await.unwrap().expect("session present");
        assert_eq!(found.account_id, 7);
        assert_eq!(found.role, Role::Nurse);

        sessions.delete(&id).await.unwrap();
        assert!(sessions.get(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn memory_sessions_expire() {
        let sessions = MemorySessionService::new(0);
        let id = sessions.create(1, Role::Admin).await.unwrap();
        assert!(sessions.get(&id).await.unwrap().is_none());
    }

    #[test]
    fn session_errors_convert_and_describe_their_source() {
        let parse = serde_json::from_str::<SessionData>("not json").unwrap_err();
        let err = SessionError::from(parse);
        assert!(matches!(err, SessionError::Serde(_)));
        assert!(err.to_string().starts_with("serde error: "));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[tokio::test]
    async fn unknown_session_is_none() {
        let sessions = MemorySessionService::new(60);
        assert!(sessions.get("missing").await.unwrap().is_none());
    }
}
