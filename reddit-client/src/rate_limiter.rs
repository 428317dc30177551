use earthworm_core::RateLimitSettings;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub time_window: Duration,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl RateLimitConfig {
    pub fn reddit_default() -> Self {
        Self {
            max_requests: 30,                     // Conservative ceiling for app-only OAuth
            time_window: Duration::from_secs(60), // 1 minute window
            min_delay: Duration::from_millis(300),
            max_delay: Duration::from_millis(1200),
        }
    }

    pub fn without_jitter(max_requests: u32, time_window: Duration) -> Self {
        Self {
            max_requests,
            time_window,
            min_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::reddit_default()
    }
}

impl From<&RateLimitSettings> for RateLimitConfig {
    fn from(settings: &RateLimitSettings) -> Self {
        Self {
            max_requests: settings.max_requests_per_minute,
            time_window: Duration::from_secs(60),
            min_delay: Duration::from_millis(settings.min_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
        }
    }
}

#[derive(Debug)]
struct WindowState {
    records: VecDeque<Instant>,
    rng: fastrand::Rng,
}

impl WindowState {
    fn evict_expired(&mut self, now: Instant, window: Duration) {
        while let Some(oldest) = self.records.front() {
            if now.saturating_duration_since(*oldest) >= window {
                self.records.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Sliding-window limiter shared by every call an adapter makes.
///
/// At most `max_requests` calls return from [`RateLimiter::allow`] within any
/// `time_window`. Each call is additionally paced by a random delay drawn from
/// `min_delay..=max_delay`.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    state: Mutex<WindowState>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self::with_rng(config, fastrand::Rng::new())
    }

    /// Deterministic jitter sequence, for tests and reproducible runs.
    pub fn with_seed(config: RateLimitConfig, seed: u64) -> Self {
        Self::with_rng(config, fastrand::Rng::with_seed(seed))
    }

    fn with_rng(mut config: RateLimitConfig, rng: fastrand::Rng) -> Self {
        if config.max_requests == 0 {
            warn!("Rate limit ceiling of 0 requested, using 1");
            config.max_requests = 1;
        }
        if config.min_delay > config.max_delay {
            std::mem::swap(&mut config.min_delay, &mut config.max_delay);
        }

        Self {
            state: Mutex::new(WindowState {
                records: VecDeque::with_capacity(config.max_requests as usize),
                rng,
            }),
            config,
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Waits until a call is permitted and records it.
    ///
    /// Timestamps are taken when control returns to the caller, so the pacing
    /// delay runs before the slot is claimed. A call that had to wait for the
    /// window draws a fresh delay after the wait, so blocked calls do not all
    /// go out exactly one window after the oldest record.
    pub async fn allow(&self) -> RateLimitPermit {
        let start_time = Instant::now();
        let mut jitter = self.pace().await;

        loop {
            let wait = {
                let mut state = self.state.lock().await;
                let now = Instant::now();
                state.evict_expired(now, self.config.time_window);

                if state.records.len() < self.config.max_requests as usize {
                    state.records.push_back(now);
                    None
                } else {
                    let oldest = state.records.front().copied().unwrap_or(now);
                    Some((oldest + self.config.time_window).saturating_duration_since(now))
                }
            };

            match wait {
                None => break,
                Some(wait_time) => {
                    warn!(
                        "Rate limit of {} requests per {:?} reached, waiting {:?}",
                        self.config.max_requests, self.config.time_window, wait_time
                    );
                    sleep(wait_time).await;
                    jitter += self.pace().await;
                }
            }
        }

        RateLimitPermit {
            queue_wait_time: start_time.elapsed(),
            jitter,
        }
    }

    async fn pace(&self) -> Duration {
        let jitter = self.next_jitter().await;
        if !jitter.is_zero() {
            sleep(jitter).await;
        }
        jitter
    }

    async fn next_jitter(&self) -> Duration {
        let span = self.config.max_delay - self.config.min_delay;
        if span.is_zero() {
            return self.config.min_delay;
        }
        let mut state = self.state.lock().await;
        let extra = state.rng.u64(0..=span.as_millis() as u64);
        self.config.min_delay + Duration::from_millis(extra)
    }

    pub async fn status(&self) -> RateLimitStatus {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        state.evict_expired(now, self.config.time_window);

        let current_window_requests = state.records.len() as u32;
        let next_slot_in = if current_window_requests >= self.config.max_requests {
            state
                .records
                .front()
                .map(|oldest| (*oldest + self.config.time_window).saturating_duration_since(now))
        } else {
            None
        };

        RateLimitStatus {
            max_requests: self.config.max_requests,
            time_window: self.config.time_window,
            current_window_requests,
            next_slot_in,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitPermit {
    pub queue_wait_time: Duration,
    pub jitter: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitStatus {
    pub max_requests: u32,
    pub time_window: Duration,
    pub current_window_requests: u32,
    pub next_slot_in: Option<Duration>,
}

impl RateLimitStatus {
    pub fn requests_remaining_in_window(&self) -> u32 {
        self.max_requests
            .saturating_sub(self.current_window_requests)
    }

    pub fn window_utilization_percentage(&self) -> f64 {
        (self.current_window_requests as f64 / self.max_requests as f64) * 100.0
    }

    pub fn is_near_limit(&self) -> bool {
        self.window_utilization_percentage() > 80.0
    }
}
