//! Truncated exponential backoff / 截断指数退避重试
//!
//! While retries remain, the wait before retry `n` (1-based) is
//! `min(max_backoff, initial_delay * backoff_factor^(n-1))`, plus a random
//! `[0, initial_delay)` jitter when `randomize` is set so that many clients
//! failing together do not retry in synchronized waves.
//!
//! With the defaults (5 retries, 1s initial, 32s max, factor 2):
//! 1s, 2s, 4s, 8s, 16s (each plus jitter), then the sixth failure propagates.

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{GcsError, Result};

/// Status codes retried by default: every transient code / 默认重试的状态码
pub const DEFAULT_RETRY_CODES: &[u16] = &[408, 429, 500, 502, 503, 504];

/// Timeout-only retries / 仅超时重试
pub const TIMEOUT_CODES: &[u16] = &[408, 504];

/// Process-wide default retry configuration / 进程级默认重试配置
static DEFAULT_PARAMS: Lazy<RwLock<RetryParams>> = Lazy::new(|| RwLock::new(RetryParams::default()));

/// Backoff configuration / 退避配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryParams {
    /// Maximum retries before giving up / 最大重试次数
    pub max_retries: u32,
    /// Seconds to wait before the first retry / 首次重试等待秒数
    pub initial_delay: f64,
    /// Upper bound of the wait in seconds / 最大等待秒数
    pub max_backoff: f64,
    /// Base of the exponential / 指数底数
    pub backoff_factor: f64,
    /// Add random jitter to each wait / 是否加入随机抖动
    pub randomize: bool,
}

impl Default for RetryParams {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay: 1.0,
            max_backoff: 32.0,
            backoff_factor: 2.0,
            randomize: true,
        }
    }
}

impl RetryParams {
    pub fn new(max_retries: u32, initial_delay: f64, max_backoff: f64, backoff_factor: f64, randomize: bool) -> Self {
        Self {
            max_retries,
            initial_delay,
            max_backoff,
            backoff_factor,
            randomize,
        }
    }

    /// Snapshot of the process-wide default / 获取默认配置快照
    pub fn get_default() -> RetryParams {
        DEFAULT_PARAMS.read().clone()
    }

    /// Replace the process-wide default in place / 原地替换默认配置
    /// Every holder of [`RetrySetting::Default`] sees the new values on its next call.
    pub fn set_default(params: RetryParams) {
        tracing::debug!("Default retry params updated: {:?}", params);
        *DEFAULT_PARAMS.write() = params;
    }

    /// Fresh backoff state for one retried call / 为一次调用创建退避状态
    pub fn backoff(&self) -> Backoff {
        Backoff {
            params: self.clone(),
            attempt: 0,
            delay: 0.0,
        }
    }
}

/// Which retry configuration a component uses / 组件使用的重试配置
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RetrySetting {
    /// Follow the process-wide default, read at call time / 跟随进程默认配置
    #[default]
    Default,
    /// Private configuration / 自定义配置
    Custom(RetryParams),
    /// No retries: the first failure propagates / 不重试
    Disabled,
}

impl RetrySetting {
    pub fn resolve(&self) -> Option<RetryParams> {
        match self {
            RetrySetting::Default => Some(RetryParams::get_default()),
            RetrySetting::Custom(params) => Some(params.clone()),
            RetrySetting::Disabled => None,
        }
    }

    /// Run `op` under this setting with the default retry codes / 使用默认状态码重试执行
    pub fn call<T, F>(&self, op: F) -> Result<T>
    where
        F: FnMut() -> Result<T>,
    {
        call(self.resolve().as_ref(), DEFAULT_RETRY_CODES, op)
    }
}

impl From<Option<RetryParams>> for RetrySetting {
    fn from(params: Option<RetryParams>) -> Self {
        match params {
            Some(p) => RetrySetting::Custom(p),
            None => RetrySetting::Disabled,
        }
    }
}

impl From<RetryParams> for RetrySetting {
    fn from(params: RetryParams) -> Self {
        RetrySetting::Custom(params)
    }
}

/// Per-call backoff state / 单次调用的退避状态
#[derive(Debug, Clone)]
pub struct Backoff {
    params: RetryParams,
    attempt: u32,
    delay: f64,
}

impl Backoff {
    /// Retries consumed so far / 已使用的重试次数
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn exhausted(&self) -> bool {
        self.attempt >= self.params.max_retries
    }

    /// Advance to the next retry and return its wait without jitter / 计算下一次等待（不含抖动）
    pub fn next_base_delay(&mut self) -> Duration {
        self.attempt += 1;
        // Once clamped, the delay stays at max_backoff.
        if self.delay < self.params.max_backoff {
            let exponent = self.attempt.saturating_sub(1) as i32;
            let backoff = self.params.backoff_factor.powi(exponent) * self.params.initial_delay;
            self.delay = backoff.min(self.params.max_backoff);
        }
        seconds(self.delay)
    }

    /// Advance and return the wait including jitter / 计算下一次等待（含抖动）
    pub fn next_delay<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Duration {
        let base = self.next_base_delay();
        if self.params.randomize && self.params.initial_delay > 0.0 {
            let jitter = rng.gen::<f64>() * self.params.initial_delay;
            base.saturating_add(seconds(jitter))
        } else {
            base
        }
    }
}

/// Config-supplied seconds as a `Duration`; negatives wait zero, overflow waits `Duration::MAX`
fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value.max(0.0)).unwrap_or(Duration::MAX)
}

fn should_retry(err: &GcsError, codes: &[u16]) -> bool {
    match err {
        GcsError::Http(e) => e.is_transient() && codes.contains(&e.code),
        _ => false,
    }
}

/// Execute `op`, retrying transient failures in `codes` / 执行操作并重试瞬时错误
/// Blocks the calling thread while waiting.
pub fn call<T, F>(params: Option<&RetryParams>, codes: &[u16], op: F) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    call_with_sleeper(params, codes, std::thread::sleep, op)
}

/// Same as [`call`], with an injectable sleep / 可注入等待函数的版本
pub fn call_with_sleeper<T, F, S>(params: Option<&RetryParams>, codes: &[u16], mut sleep: S, mut op: F) -> Result<T>
where
    F: FnMut() -> Result<T>,
    S: FnMut(Duration),
{
    let mut backoff = params.map(RetryParams::backoff);
    let mut rng = rand::thread_rng();

    loop {
        let err = match op() {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        let state = match backoff.as_mut() {
            Some(b) if should_retry(&err, codes) => b,
            _ => return Err(err),
        };

        if state.exhausted() {
            tracing::debug!("Retries exhausted after {} attempts: {}", state.attempt() + 1, err);
            return Err(err);
        }

        let delay = state.next_delay(&mut rng);
        tracing::warn!(
            "Transient failure (retry {}, waiting {:?}): {}",
            state.attempt(),
            delay,
            err
        );
        sleep(delay);
    }
}
