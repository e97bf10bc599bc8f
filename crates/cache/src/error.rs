use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("invalid redis address: {0}")]
    Address(String),

    #[error("failed to build redis pool: {0}")]
    Config(#[from] deadpool_redis::CreatePoolError),

    #[error("no redis connection available: {0}")]
    Pool(#[from] deadpool_redis::PoolError),

    #[error("redis command failed: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("cached value could not be (de)serialized: {0}")]
    Codec(#[from] serde_json::Error),
}
