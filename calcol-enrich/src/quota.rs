//! Per-provider request quota and rate admission
//!
//! Each provider has a short-term rate (requests per second) and a monthly
//! budget. Admission never blocks: a denied caller substitutes an empty result.
//!
//! # Concurrency
//! State is per provider and lock-free. The monthly counter is updated with
//! compare-and-set, the last-admitted timestamp only moves forward. Two tasks
//! checking admission at the same instant may both be admitted, so a provider
//! can exceed its monthly limit by at most one request.

use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicI32, AtomicI64, AtomicU32, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Marker for "no month observed yet"
const MONTH_UNSET: i32 = i32::MIN;
/// Marker for "never admitted"
const NEVER: i64 = i64::MIN;

// ============================================================================
// Clock
// ============================================================================

/// Wall-clock source (injectable for tests)
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// System time
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock
#[derive(Debug)]
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            millis: AtomicI64::new(start.timestamp_millis()),
        }
    }

    pub fn advance_ms(&self, ms: i64) {
        self.millis.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn set(&self, to: DateTime<Utc>) {
        self.millis.store(to.timestamp_millis(), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.millis.load(Ordering::SeqCst))
            .single()
            .unwrap_or_else(Utc::now)
    }
}

// ============================================================================
// Keys and Limits
// ============================================================================

/// Quota bucket; both generative providers share `Ai`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum QuotaKey {
    Brave,
    Google,
    Bing,
    Ai,
}

impl QuotaKey {
    pub const ALL: [QuotaKey; 4] = [QuotaKey::Brave, QuotaKey::Google, QuotaKey::Bing, QuotaKey::Ai];

    pub fn as_str(&self) -> &'static str {
        match self {
            QuotaKey::Brave => "brave",
            QuotaKey::Google => "google",
            QuotaKey::Bing => "bing",
            QuotaKey::Ai => "ai",
        }
    }

    /// Built-in (rate, monthly) defaults
    pub fn default_limits(&self) -> QuotaLimits {
        match self {
            QuotaKey::Brave => QuotaLimits::new(1, 2000),
            QuotaKey::Google => QuotaLimits::new(10, 10_000),
            QuotaKey::Bing => QuotaLimits::new(10, 10_000),
            QuotaKey::Ai => QuotaLimits::new(5, 5000),
        }
    }

    fn index(&self) -> usize {
        match self {
            QuotaKey::Brave => 0,
            QuotaKey::Google => 1,
            QuotaKey::Bing => 2,
            QuotaKey::Ai => 3,
        }
    }
}

impl fmt::Display for QuotaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rate and monthly limits for one provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaLimits {
    /// Requests per second
    pub rate_per_second: u32,
    /// Requests per calendar month
    pub monthly_limit: u32,
}

impl QuotaLimits {
    pub fn new(rate_per_second: u32, monthly_limit: u32) -> Self {
        Self {
            rate_per_second,
            monthly_limit,
        }
    }

    /// Minimum spacing between admitted requests
    fn min_interval_ms(&self) -> i64 {
        1000 / i64::from(self.rate_per_second.max(1))
    }
}

/// Snapshot reported by `status_all`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaStatus {
    pub used: u32,
    pub limit: u32,
    pub remaining: u32,
    pub rate_limit: u32,
    pub can_make_request: bool,
    pub next_reset: DateTime<Utc>,
}

// ============================================================================
// Per-provider State
// ============================================================================

#[derive(Debug)]
struct QuotaState {
    limits: QuotaLimits,
    used: AtomicU32,
    /// year * 12 + zero-based month of the current bucket
    month_key: AtomicI32,
    last_admitted_ms: AtomicI64,
}

fn month_key(at: DateTime<Utc>) -> i32 {
    at.year() * 12 + at.month0() as i32
}

/// First instant of the month after `at`
fn next_month_start(at: DateTime<Utc>) -> DateTime<Utc> {
    let (year, month) = if at.month() == 12 {
        (at.year() + 1, 1)
    } else {
        (at.year(), at.month() + 1)
    };
    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0)
        .single()
        .unwrap_or(at)
}

impl QuotaState {
    fn new(limits: QuotaLimits) -> Self {
        Self {
            limits,
            used: AtomicU32::new(0),
            month_key: AtomicI32::new(MONTH_UNSET),
            last_admitted_ms: AtomicI64::new(NEVER),
        }
    }

    /// Zero the counter when the observed month changes
    fn roll_over(&self, key: QuotaKey, now: DateTime<Utc>) {
        let current = month_key(now);
        let stored = self.month_key.load(Ordering::Acquire);
        if stored == current {
            return;
        }
        if self
            .month_key
            .compare_exchange(stored, current, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.used.store(0, Ordering::Release);
            if stored != MONTH_UNSET {
                debug!(provider = %key, "Monthly quota reset");
            }
        }
    }

    fn admissible(&self, now: DateTime<Utc>) -> bool {
        if self.used.load(Ordering::Acquire) >= self.limits.monthly_limit {
            return false;
        }
        let last = self.last_admitted_ms.load(Ordering::Acquire);
        last == NEVER || now.timestamp_millis() - last >= self.limits.min_interval_ms()
    }
}

// ============================================================================
// QuotaGuard
// ============================================================================

/// Process-wide quota tracker
pub struct QuotaGuard {
    clock: Arc<dyn Clock>,
    states: [QuotaState; 4],
}

impl fmt::Debug for QuotaGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuotaGuard").field("states", &self.states).finish()
    }
}

impl Default for QuotaGuard {
    fn default() -> Self {
        Self::new(&BTreeMap::new())
    }
}

impl QuotaGuard {
    /// Guard on system time; providers missing from `limits` use defaults
    pub fn new(limits: &BTreeMap<QuotaKey, QuotaLimits>) -> Self {
        Self::with_clock(limits, Arc::new(SystemClock))
    }

    pub fn with_clock(limits: &BTreeMap<QuotaKey, QuotaLimits>, clock: Arc<dyn Clock>) -> Self {
        let state_for = |key: QuotaKey| {
            QuotaState::new(limits.get(&key).copied().unwrap_or_else(|| key.default_limits()))
        };
        Self {
            clock,
            states: QuotaKey::ALL.map(state_for),
        }
    }

    fn state(&self, key: QuotaKey) -> &QuotaState {
        &self.states[key.index()]
    }

    /// True iff the monthly budget has room and the rate interval has elapsed
    pub fn can_make_request(&self, key: QuotaKey) -> bool {
        let now = self.clock.now();
        let state = self.state(key);
        state.roll_over(key, now);
        state.admissible(now)
    }

    /// Record a successful external call
    pub fn record_request(&self, key: QuotaKey) {
        let now = self.clock.now();
        let state = self.state(key);
        state.roll_over(key, now);

        state
            .last_admitted_ms
            .fetch_max(now.timestamp_millis(), Ordering::AcqRel);

        // Every real call counts; admission keeps the total near the limit
        let _ = state
            .used
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                Some(used.saturating_add(1))
            });
    }

    /// Requests used in the current month
    pub fn used(&self, key: QuotaKey) -> u32 {
        let state = self.state(key);
        state.roll_over(key, self.clock.now());
        state.used.load(Ordering::Acquire)
    }

    /// `max(0, limit - used)`
    pub fn remaining(&self, key: QuotaKey) -> u32 {
        let state = self.state(key);
        state.roll_over(key, self.clock.now());
        state
            .limits
            .monthly_limit
            .saturating_sub(state.used.load(Ordering::Acquire))
    }

    pub fn limits(&self, key: QuotaKey) -> QuotaLimits {
        self.state(key).limits
    }

    /// Snapshot for every provider, keyed by provider name
    pub fn status_all(&self) -> BTreeMap<String, QuotaStatus> {
        let now = self.clock.now();
        QuotaKey::ALL
            .iter()
            .map(|&key| {
                let state = self.state(key);
                state.roll_over(key, now);
                let used = state.used.load(Ordering::Acquire);
                let status = QuotaStatus {
                    used,
                    limit: state.limits.monthly_limit,
                    remaining: state.limits.monthly_limit.saturating_sub(used),
                    rate_limit: state.limits.rate_per_second,
                    can_make_request: state.admissible(now),
                    next_reset: next_month_start(now),
                };
                (key.as_str().to_string(), status)
            })
            .collect()
    }
}
