use mellon_core::{AppError, AppResult};
use mellon_domain::GrantDuration;

/// Duration bounds applied to every grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrantPolicy {
    default_duration: GrantDuration,
    failsafe_duration: GrantDuration,
    max_duration: GrantDuration,
}

impl GrantPolicy {
    /// Creates a policy. Requires `failsafe <= default <= max`; every
    /// duration is already bounded by [`GrantDuration::MAX_SECONDS`].
    pub fn new(
        default_duration: GrantDuration,
        failsafe_duration: GrantDuration,
        max_duration: GrantDuration,
    ) -> AppResult<Self> {
        if failsafe_duration > default_duration || default_duration > max_duration {
            return Err(AppError::Validation(format!(
                "grant durations must satisfy failsafe ({failsafe_duration}) <= default ({default_duration}) <= max ({max_duration})"
            )));
        }

        Ok(Self {
            default_duration,
            failsafe_duration,
            max_duration,
        })
    }

    /// Builds a policy from minute values.
    pub fn from_minutes(
        default_minutes: i64,
        failsafe_minutes: i64,
        max_minutes: i64,
    ) -> AppResult<Self> {
        Self::new(
            GrantDuration::from_minutes(default_minutes)?,
            GrantDuration::from_minutes(failsafe_minutes)?,
            GrantDuration::from_minutes(max_minutes)?,
        )
    }

    /// Duration used when no risk decision is available.
    #[must_use]
    pub fn default_duration(&self) -> GrantDuration {
        self.default_duration
    }

    /// Minimum safe duration used by fail-safe decisions.
    #[must_use]
    pub fn failsafe_duration(&self) -> GrantDuration {
        self.failsafe_duration
    }

    /// Upper bound for any grant.
    #[must_use]
    pub fn max_duration(&self) -> GrantDuration {
        self.max_duration
    }

    /// Normalizes an oracle recommendation: missing or non-positive values
    /// fall back to the default, oversized values are clamped to the maximum.
    #[must_use]
    pub fn normalize_minutes(&self, minutes: Option<i64>) -> GrantDuration {
        match minutes {
            Some(minutes) if minutes > 0 => GrantDuration::from_minutes(minutes)
                .map_or(self.max_duration, |duration| duration.min(self.max_duration)),
            _ => self.default_duration,
        }
    }
}

impl Default for GrantPolicy {
    fn default() -> Self {
        Self {
            default_duration: GrantDuration::from_whole_minutes(30),
            failsafe_duration: GrantDuration::from_whole_minutes(15),
            max_duration: GrantDuration::from_whole_minutes(240),
        }
    }
}
