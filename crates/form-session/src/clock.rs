use time::OffsetDateTime;

/// Time source behind TTL checks, debounce deadlines, rate-limit countdowns,
/// and snapshot timestamps. Tests substitute a manual clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;

    /// Milliseconds since the Unix epoch, the unit rate-limit deadlines use.
    fn now_ms(&self) -> i64 {
        let now = self.now();
        now.unix_timestamp() * 1_000 + i64::from(now.millisecond())
    }
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}
