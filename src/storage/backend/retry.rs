//! Retry for transient database failures
//!
//! Lost connections, pool exhaustion, deadlocks and `database is locked` are
//! retried with capped exponential backoff. Everything else, unique
//! violations in particular, is returned on the first attempt.

use std::future::Future;
use std::time::Duration;

use sea_orm::DbErr;
use tokio::time::sleep;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 100,
            max_delay_ms: 2000,
        }
    }
}

pub fn is_retryable_error(err: &DbErr) -> bool {
    match err {
        DbErr::ConnectionAcquire(_) | DbErr::Conn(_) => true,
        DbErr::Exec(runtime) | DbErr::Query(runtime) => is_transient_runtime_error(runtime),
        _ => false,
    }
}

fn is_transient_runtime_error(err: &sea_orm::error::RuntimeErr) -> bool {
    use sea_orm::error::RuntimeErr;

    match err {
        RuntimeErr::SqlxError(sqlx_err) => {
            use std::ops::Deref;
            let code_matches = sqlx_err
                .deref()
                .as_database_error()
                .and_then(|db_err| db_err.code())
                .is_some_and(|code| is_transient_code(&code));
            code_matches || is_transient_message(&sqlx_err.to_string())
        }
        RuntimeErr::Internal(msg) => is_transient_message(msg),
        #[allow(unreachable_patterns)]
        _ => false,
    }
}

/// Vendor error codes worth another attempt.
fn is_transient_code(code: &str) -> bool {
    matches!(
        code,
        // MySQL 死锁 / 锁等待超时
        "1213" | "1205"
        // PostgreSQL 序列化失败 / 死锁
        | "40001" | "40P01"
        // SQLite BUSY / LOCKED 及其扩展码 (BUSY_RECOVERY, BUSY_SNAPSHOT, BUSY_TIMEOUT, LOCKED_SHAREDCACHE, LOCKED_VTAB)
        | "5" | "6" | "261" | "517" | "773" | "262" | "518"
    )
}

fn is_transient_message(message: &str) -> bool {
    let message = message.to_lowercase();
    ["deadlock", "lock wait timeout", "database is locked", "serialization failure"]
        .iter()
        .any(|needle| message.contains(needle))
}

/// Run `operation`, retrying transient failures up to `config.max_retries` times.
pub async fn with_retry<T, F, Fut>(
    operation_name: &str,
    config: RetryConfig,
    mut operation: F,
) -> Result<T, DbErr>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DbErr>>,
{
    let mut attempt = 0;
    loop {
        let err = match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!("'{}' succeeded after {} retries", operation_name, attempt);
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        if attempt >= config.max_retries || !is_retryable_error(&err) {
            return Err(err);
        }

        attempt += 1;
        let delay = backoff_delay(attempt, config.base_delay_ms, config.max_delay_ms);
        warn!(
            "'{}' failed (attempt {}/{}): {}; retrying in {} ms",
            operation_name,
            attempt,
            config.max_retries + 1,
            err,
            delay
        );
        sleep(Duration::from_millis(delay)).await;
    }
}

/// base * 2^(attempt-1), capped at `max_ms`, plus up to 25% jitter.
fn backoff_delay(attempt: u32, base_ms: u64, max_ms: u64) -> u64 {
    let exp = base_ms.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)));
    let capped = exp.min(max_ms);
    capped.saturating_add(rand::random_range(0..=capped / 4))
}
