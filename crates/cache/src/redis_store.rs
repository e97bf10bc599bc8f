//! Redis backend over a bounded deadpool connection pool.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{
    Config, ConnectionAddr, ConnectionInfo, Pool, PoolConfig, RedisConnectionInfo, Runtime,
};
use libris_kernel::settings::CacheSettings;
use redis::AsyncCommands;

use crate::{CacheError, CacheStore};

const SCAN_BATCH: usize = 200;

pub struct RedisStore {
    pool: Pool,
}

impl RedisStore {
    /// Build the pool. No connection is opened until first use.
    pub fn connect(settings: &CacheSettings) -> Result<Self, CacheError> {
        let mut pool_config = PoolConfig::new(settings.pool_size);
        pool_config.timeouts.wait = Some(settings.wait_timeout());
        pool_config.timeouts.create = Some(settings.wait_timeout());
        pool_config.timeouts.recycle = Some(settings.wait_timeout());

        let mut config = Config::from_connection_info(connection_info(settings)?);
        config.pool = Some(pool_config);

        let pool = config.create_pool(Some(Runtime::Tokio1))?;
        tracing::info!(
            address = %settings.address,
            db = settings.db,
            pool_size = settings.pool_size,
            "redis pool created"
        );
        Ok(Self { pool })
    }

    async fn connection(&self) -> Result<deadpool_redis::Connection, CacheError> {
        Ok(self.pool.get().await?)
    }
}

/// Endpoint and credentials as discrete fields, so the password never has to
/// survive URL parsing.
fn connection_info(settings: &CacheSettings) -> Result<ConnectionInfo, CacheError> {
    let (host, port) = settings
        .redis_endpoint()
        .map_err(|err| CacheError::Address(err.to_string()))?;
    Ok(ConnectionInfo {
        addr: ConnectionAddr::Tcp(host, port),
        redis: RedisConnectionInfo {
            db: settings.db,
            password: settings.redis_password().map(str::to_string),
            ..RedisConnectionInfo::default()
        },
    })
}

/// Escape Redis glob metacharacters so `prefix` matches literally.
fn glob_escape(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len() + 1);
    for ch in prefix.chars() {
        if matches!(ch, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[async_trait]
impl CacheStore for RedisStore {
    fn backend(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut conn = self.connection().await?;
        let value: Option<Vec<u8>> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let seconds = ttl.as_secs().max(1);
        let _: () = conn.set_ex(key, value, seconds).await?;
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<(), CacheError> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.connection().await?;
        let _: () = conn.del(keys).await?;
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64, CacheError> {
        let mut conn = self.connection().await?;
        let pattern = format!("{}*", glob_escape(prefix));
        let mut cursor: u64 = 0;
        let mut removed: u64 = 0;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await?;

            if !keys.is_empty() {
                let deleted: u64 = conn.del(&keys).await?;
                removed += deleted;
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        Ok(removed)
    }

    async fn flush(&self) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let _: () = redis::cmd("FLUSHDB").query_async(&mut conn).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    async fn len(&self) -> Result<u64, CacheError> {
        let mut conn = self.connection().await?;
        let size: u64 = redis::cmd("DBSIZE").query_async(&mut conn).await?;
        Ok(size)
    }

    async fn close(&self) {
        self.pool.close();
    }
}
