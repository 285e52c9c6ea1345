//! Redis client implementation with connection management

use crate::Result;
use redis::{aio::ConnectionManager, AsyncCommands, FromRedisValue, Script, ToRedisArgs};

/// Redis client with automatic reconnection
///
/// Cloning is cheap: every clone shares the same multiplexed connection.
#[derive(Clone)]
pub struct RedisClient {
    conn: ConnectionManager,
}

impl RedisClient {
    /// Connect to Redis server
    ///
    /// Supports both redis:// and rediss:// (TLS) URLs
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    /// Get connection manager (for advanced operations)
    pub fn connection(&self) -> &ConnectionManager {
        &self.conn
    }

    /// Mutable access to the connection manager
    pub fn connection_mut(&mut self) -> &mut ConnectionManager {
        &mut self.conn
    }

    /// PING - Round trip to check the connection is usable
    pub async fn ping(&mut self) -> Result<()> {
        let _: String = redis::cmd("PING").query_async(&mut self.conn).await?;
        Ok(())
    }

    // ============================================================================
    // Key-Value Operations
    // ============================================================================

    /// GET - Get value by key
    pub async fn get<T: FromRedisValue>(&mut self, key: &str) -> Result<Option<T>> {
        self.conn.get(key).await
    }

    /// SETEX - Set key with expiry in seconds
    pub async fn set_ex<V>(&mut self, key: &str, value: V, seconds: u64) -> Result<()>
    where
        V: ToRedisArgs + Send + Sync,
    {
        self.conn.set_ex(key, value, seconds).await
    }

    /// DEL - Delete one or more keys
    pub async fn del<K>(&mut self, keys: K) -> Result<i64>
    where
        K: ToRedisArgs + Send + Sync,
    {
        self.conn.del(keys).await
    }

    /// EXISTS - Check if key exists
    pub async fn exists(&mut self, key: &str) -> Result<bool> {
        self.conn.exists(key).await
    }

    /// TTL - Get time to live in seconds (-2 missing key, -1 no expiry)
    pub async fn ttl(&mut self, key: &str) -> Result<i64> {
        self.conn.ttl(key).await
    }

    // ============================================================================
    // Atomic Operations
    // ============================================================================

    /// INCR - Increment integer value
    pub async fn incr(&mut self, key: &str) -> Result<u64> {
        self.conn.incr(key, 1).await
    }

    // ============================================================================
    // List Operations
    // ============================================================================

    /// LLEN - Get list length
    pub async fn llen(&mut self, key: &str) -> Result<u64> {
        self.conn.llen(key).await
    }

    /// LRANGE - Read a slice of a list without modifying it
    pub async fn lrange<T: FromRedisValue>(
        &mut self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<T>> {
        self.conn.lrange(key, start, stop).await
    }

    // ============================================================================
    // Set Operations
    // ============================================================================

    /// SMEMBERS - All members of a set
    pub async fn smembers<T: FromRedisValue>(&mut self, key: &str) -> Result<Vec<T>> {
        self.conn.smembers(key).await
    }

    /// SREM - Remove member from set
    pub async fn srem<V>(&mut self, key: &str, member: V) -> Result<i64>
    where
        V: ToRedisArgs + Send + Sync,
    {
        self.conn.srem(key, member).await
    }

    // ============================================================================
    // Lua Scripts
    // ============================================================================

    /// Build a script handle. Invocations go through EVALSHA and fall back
    /// to EVAL when the server has not cached the script yet.
    pub fn create_script(code: &str) -> Script {
        Script::new(code)
    }

    /// Run a script atomically on the server
    pub async fn eval_script<T, A>(&mut self, script: &Script, keys: &[&str], args: &[A]) -> Result<T>
    where
        T: FromRedisValue,
        A: ToRedisArgs,
    {
        let mut invocation = script.prepare_invoke();
        for key in keys {
            invocation.key(*key);
        }
        for arg in args {
            invocation.arg(arg);
        }
        tracing::trace!(keys = keys.len(), args = args.len(), "Evaluating Lua script");
        invocation.invoke_async(&mut self.conn).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Note: These tests require a running Redis instance
    // Run with: docker run -d -p 6379:6379 redis:7

    fn redis_url() -> String {
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string())
    }

    #[tokio::test]
    #[ignore] // Requires Redis
    async fn test_basic_operations() -> Result<()> {
        let mut client = RedisClient::connect(&redis_url()).await?;

        client.ping().await?;

        client.set_ex("rebus_store_test_key", "test_value", 30).await?;
        let value: Option<String> = client.get("rebus_store_test_key").await?;
        assert_eq!(value, Some("test_value".to_string()));

        client.del("rebus_store_test_key").await?;
        let value: Option<String> = client.get("rebus_store_test_key").await?;
        assert_eq!(value, None);
        assert!(!client.exists("rebus_store_test_key").await?);

        Ok(())
    }

    #[tokio::test]
    #[ignore] // Requires Redis
    async fn test_expiry() -> Result<()> {
        let mut client = RedisClient::connect(&redis_url()).await?;

        client.set_ex("rebus_store_expire_test", "value", 10).await?;
        let ttl = client.ttl("rebus_store_expire_test").await?;
        assert!(ttl > 0 && ttl <= 10);

        assert_eq!(client.ttl("rebus_store_missing_key").await?, -2);

        client.del("rebus_store_expire_test").await?;
        Ok(())
    }

    #[tokio::test]
    #[ignore] // Requires Redis
    async fn test_atomic_ops() -> Result<()> {
        let mut client = RedisClient::connect(&redis_url()).await?;

        let count1 = client.incr("rebus_store_counter").await?;
        let count2 = client.incr("rebus_store_counter").await?;
        assert_eq!(count2, count1 + 1);

        client.del("rebus_store_counter").await?;

        Ok(())
    }

    #[tokio::test]
    #[ignore] // Requires Redis
    async fn test_script_list_and_set() -> Result<()> {
        let mut client = RedisClient::connect(&redis_url()).await?;
        let script = RedisClient::create_script(
            r"
            redis.call('RPUSH', KEYS[1], ARGV[1], ARGV[2])
            redis.call('SADD', KEYS[2], ARGV[1])
            return redis.call('LLEN', KEYS[1])",
        );

        let len: u64 = client
            .eval_script(
                &script,
                &["rebus_store_list", "rebus_store_set"],
                &["a", "b"],
            )
            .await?;
        assert_eq!(len, 2);

        let items: Vec<String> = client.lrange("rebus_store_list", 0, -1).await?;
        assert_eq!(items, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(client.llen("rebus_store_list").await?, 2);

        let members: Vec<String> = client.smembers("rebus_store_set").await?;
        assert_eq!(members, vec!["a".to_string()]);
        assert_eq!(client.srem("rebus_store_set", "a").await?, 1);

        client.del(&["rebus_store_list", "rebus_store_set"]).await?;
        Ok(())
    }
}
