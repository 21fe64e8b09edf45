//! Resource limits and safety controls for engine execution
//!
//! Every limit is read once from the environment at startup, with a default
//! and a [min, max] clamp. Unparseable values fall back to the default;
//! out-of-range values clamp to the nearest bound. Misconfiguration is never
//! fatal.

/// Process-wide limits applied before every engine invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Wall-clock bound for one engine call, in seconds
    pub timeout_seconds: u64,

    /// Hard cap on captured output returned inline to the caller, in chars
    pub max_capture_chars: usize,

    /// Maximum repetition count accepted for a run
    pub max_reps: u32,

    /// Maximum target record count accepted for a run
    pub max_target_count: u64,
}

pub const ENV_TIMEOUT_SECONDS: &str = "FAKESMITH_TIMEOUT_SECONDS";
pub const ENV_MAX_CAPTURE_CHARS: &str = "FAKESMITH_MAX_CAPTURE_CHARS";
pub const ENV_MAX_REPS: &str = "FAKESMITH_MAX_REPS";
pub const ENV_MAX_TARGET_COUNT: &str = "FAKESMITH_MAX_TARGET_COUNT";

impl Default for Limits {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            max_capture_chars: 20_000,
            max_reps: 10,
            max_target_count: 1_000,
        }
    }
}

impl Limits {
    /// Read limits from the environment, clamping each value into its range.
    pub fn from_env() -> Self {
        Self {
            timeout_seconds: clamped(std::env::var(ENV_TIMEOUT_SECONDS).ok(), 30, 1, 600),
            max_capture_chars: clamped(
                std::env::var(ENV_MAX_CAPTURE_CHARS).ok(),
                20_000,
                200,
                5_000_000,
            ),
            max_reps: clamped(std::env::var(ENV_MAX_REPS).ok(), 10, 1, 100_000),
            max_target_count: clamped(
                std::env::var(ENV_MAX_TARGET_COUNT).ok(),
                1_000,
                1,
                10_000_000,
            ),
        }
    }

    /// Restrictive limits for tests
    pub fn testing() -> Self {
        Self {
            timeout_seconds: 2,
            max_capture_chars: 200,
            max_reps: 5,
            max_target_count: 50,
        }
    }
}

/// Parse an optional env value into `[min, max]`, defaulting on absence or
/// parse failure and clamping otherwise.
fn clamped<T>(raw: Option<String>, default: T, min: T, max: T) -> T
where
    T: std::str::FromStr + PartialOrd + Copy,
{
    let value = raw
        .and_then(|s| s.trim().parse::<T>().ok())
        .unwrap_or(default);
    if value < min {
        min
    } else if value > max {
        max
    } else {
        value
    }
}
