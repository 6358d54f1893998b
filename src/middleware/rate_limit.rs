use redis::AsyncCommands;

/// Outcome of a rate limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_in_secs: u64,
}

/// Fixed-window counter in Redis.
pub async fn check_rate_limit(
    redis_conn: &mut redis::aio::ConnectionManager,
    key: &str,
    max_requests: u32,
    window_seconds: u64,
) -> Result<RateLimitStatus, redis::RedisError> {
    let cache_key = format!("ratelimit:{}", key);

    // Get current count
    let current: u32 = redis_conn.get(&cache_key).await.unwrap_or(0);

    if current >= max_requests {
        let ttl: i64 = redis_conn.ttl(&cache_key).await.unwrap_or(0);
        return Ok(RateLimitStatus {
            allowed: false,
            remaining: 0,
            reset_in_secs: ttl.max(0) as u64,
        });
    }

    let new_count: u32 = redis_conn.incr(&cache_key, 1).await?;

    // Set expiry on first request
    if new_count == 1 {
        let _: () = redis_conn.expire(&cache_key, window_seconds as i64).await?;
    }

    let ttl: i64 = redis_conn
        .ttl(&cache_key)
        .await
        .unwrap_or(window_seconds as i64);

    Ok(RateLimitStatus {
        allowed: true,
        remaining: max_requests.saturating_sub(new_count),
        reset_in_secs: ttl.max(0) as u64,
    })
}

/// Clear a counter, e.g. after a successful login.
pub async fn reset_rate_limit(
    redis_conn: &mut redis::aio::ConnectionManager,
    key: &str,
) -> Result<(), redis::RedisError> {
    redis_conn.del(format!("ratelimit:{}", key)).await
}

/// Login attempts are limited per account. Nothing the client sends,
/// such as forwarding headers, takes part in the key.
pub fn login_rate_limit_key(email: &str) -> String {
    format!("login:{}", email.trim().to_lowercase())
}
