//! Pause schedules between model calls.
//!
//! `attempt` is always the zero-based index of the attempt that just failed.

use std::time::Duration;

use crate::config::Tuning;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Backoff {
  pub empty_unit: Duration,
  pub malformed_unit: Duration,
  pub exponential_base: Duration,
  pub rate_limit_base: Duration,
  pub rate_limit_padding: Duration,
  pub rate_limit_ceiling: Duration,
}

impl Default for Backoff {
  fn default() -> Self {
    Self::from_tuning(&Tuning::default())
  }
}

impl Backoff {
  pub fn from_tuning(t: &Tuning) -> Self {
    Self {
      empty_unit: secs(t.empty_pause_secs),
      malformed_unit: secs(t.malformed_pause_secs),
      exponential_base: secs(t.transient_base_secs),
      rate_limit_base: secs(t.rate_limit_base_secs),
      rate_limit_padding: secs(t.rate_limit_padding_secs),
      rate_limit_ceiling: ceiling(t.max_rate_limit_wait_secs),
    }
  }

  /// After a reply with no usable content: (attempt + 1) × empty unit.
  pub fn empty(&self, attempt: u32) -> Duration {
    self.empty_unit.saturating_mul(attempt + 1)
  }

  /// After a reply that did not have the required shape: (attempt + 1) × malformed unit.
  pub fn malformed(&self, attempt: u32) -> Duration {
    self.malformed_unit.saturating_mul(attempt + 1)
  }

  /// After a transport or service error: base × 2^attempt.
  pub fn exponential(&self, attempt: u32) -> Duration {
    self.exponential_base.saturating_mul(pow2(attempt))
  }

  /// After a rate-limit signal: the service hint plus padding, else base × 2^attempt.
  /// Never longer than the configured ceiling.
  pub fn rate_limited(&self, attempt: u32, hint: Option<Duration>) -> Duration {
    let wait = match hint {
      Some(h) => h.saturating_add(self.rate_limit_padding),
      None => self.rate_limit_base.saturating_mul(pow2(attempt)),
    };
    wait.min(self.rate_limit_ceiling)
  }
}

pub(crate) async fn pause(d: Duration) {
  if !d.is_zero() {
    tokio::time::sleep(d).await;
  }
}

fn pow2(attempt: u32) -> u32 {
  1u32.checked_shl(attempt.min(16)).unwrap_or(u32::MAX)
}

fn secs(v: f64) -> Duration {
  if v.is_finite() && v > 0.0 { Duration::try_from_secs_f64(v).unwrap_or(Duration::MAX) } else { Duration::ZERO }
}

// Non-positive means uncapped.
fn ceiling(v: f64) -> Duration {
  if v > 0.0 { secs(v) } else { Duration::MAX }
}
