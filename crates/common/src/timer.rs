use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};

const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Wall-clock reading refreshed every `period`.
///
/// Tick deadlines are fixed multiples of `period` from the start, so late
/// wakeups do not accumulate drift. The reading is the start time plus the
/// monotonic offset of the last deadline reached.
///
/// 自我校正的時鐘：依固定週期更新目前時間，不累積漂移。
#[derive(Debug)]
pub struct SelfCorrectingClock {
    current_ms: Arc<AtomicU64>,
    task: JoinHandle<()>,
}

impl SelfCorrectingClock {
    /// Starts ticking on the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// When called outside a Tokio runtime.
    pub fn start(period: Duration) -> Self {
        let period = period.max(MIN_PERIOD);
        let origin = Instant::now();
        let origin_ms = unix_millis(SystemTime::now());
        let current_ms = Arc::new(AtomicU64::new(origin_ms));

        let shared = Arc::clone(&current_ms);
        let task = tokio::spawn(async move {
            let mut ticker = interval_at(origin + period, period);
            loop {
                let deadline = ticker.tick().await;
                let now = origin_ms.saturating_add(millis(deadline.saturating_duration_since(origin)));
                shared.store(now, Ordering::Relaxed);
            }
        });
        Self { current_ms, task }
    }

    /// Milliseconds since the Unix epoch as of the last tick.
    pub fn current_value(&self) -> u64 {
        self.current_ms.load(Ordering::Relaxed)
    }

    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for SelfCorrectingClock {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Time left until a deadline, refreshed every `period` and stopping at zero.
/// 自我校正的倒數計時器。
#[derive(Debug)]
pub struct SelfCorrectingCountdown {
    remaining_ms: Arc<AtomicU64>,
    task: JoinHandle<()>,
}

impl SelfCorrectingCountdown {
    /// Counts down to the wall-clock `target`; a past target reads zero.
    ///
    /// # Panics
    ///
    /// When called outside a Tokio runtime.
    pub fn until(target: SystemTime, period: Duration) -> Self {
        let left = target
            .duration_since(SystemTime::now())
            .unwrap_or(Duration::ZERO);
        Self::starting_at(left, period)
    }

    /// Counts down `duration` from now.
    pub fn starting_at(duration: Duration, period: Duration) -> Self {
        let period = period.max(MIN_PERIOD);
        let origin = Instant::now();
        let remaining_ms = Arc::new(AtomicU64::new(millis(duration)));

        let shared = Arc::clone(&remaining_ms);
        let task = tokio::spawn(async move {
            let mut ticker = interval_at(origin + period, period);
            loop {
                let deadline = ticker.tick().await;
                let left = duration.saturating_sub(deadline.saturating_duration_since(origin));
                shared.store(millis(left), Ordering::Relaxed);
                if left.is_zero() {
                    break;
                }
            }
        });
        Self { remaining_ms, task }
    }

    /// Remaining time as of the last tick.
    pub fn remaining(&self) -> Duration {
        Duration::from_millis(self.remaining_ms.load(Ordering::Relaxed))
    }

    /// False once the countdown reached zero or was stopped.
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for SelfCorrectingCountdown {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn unix_millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(millis)
        .unwrap_or_default()
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
