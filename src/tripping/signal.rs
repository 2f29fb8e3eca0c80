use std::fmt;

/// A failure that counts against a breaker's error budget.
///
/// The cost is always at least 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureSignal<E> {
    cause: E,
    cost: u64,
}

impl<E> FailureSignal<E> {
    /// Wrap `cause` as a failure with unit cost
    pub fn new(cause: E) -> Self {
        Self::with_cost(cause, 1)
    }

    /// Wrap `cause` as a failure weighing `cost`. A cost of 0 is raised to 1.
    pub fn with_cost(cause: E, cost: u64) -> Self {
        Self {
            cause,
            cost: cost.max(1),
        }
    }

    pub fn cause(&self) -> &E {
        &self.cause
    }

    pub fn cost(&self) -> u64 {
        self.cost
    }

    pub fn into_cause(self) -> E {
        self.cause
    }
}

impl<E: fmt::Display> fmt::Display for FailureSignal<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.cause.fmt(f)
    }
}

/// Error type returned by operations passed to a breaker's `call`.
///
/// Only [`CallError::Counted`] influences the breaker. Either variant is
/// unwrapped before the error reaches the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallError<E> {
    /// Counts against the breaker's error budget
    Counted(FailureSignal<E>),
    /// Passed through to the caller untouched
    Uncounted(E),
}

impl<E> CallError<E> {
    /// A counted failure with unit cost
    pub fn counted(cause: E) -> Self {
        CallError::Counted(FailureSignal::new(cause))
    }

    /// A counted failure weighing `cost`
    pub fn weighted(cause: E, cost: u64) -> Self {
        CallError::Counted(FailureSignal::with_cost(cause, cost))
    }

    /// An error the breaker ignores
    pub fn uncounted(cause: E) -> Self {
        CallError::Uncounted(cause)
    }

    pub fn is_counted(&self) -> bool {
        matches!(self, CallError::Counted(_))
    }

    /// Strip the breaker bookkeeping and return the caller's error
    pub fn into_inner(self) -> E {
        match self {
            CallError::Counted(signal) => signal.into_cause(),
            CallError::Uncounted(cause) => cause,
        }
    }
}

impl<E> From<FailureSignal<E>> for CallError<E> {
    fn from(signal: FailureSignal<E>) -> Self {
        CallError::Counted(signal)
    }
}

impl<E: fmt::Display> fmt::Display for CallError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallError::Counted(signal) => signal.fmt(f),
            CallError::Uncounted(cause) => cause.fmt(f),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for CallError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CallError::Counted(signal) => Some(signal.cause()),
            CallError::Uncounted(cause) => Some(cause),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_cost_is_one() {
        let signal = FailureSignal::new("boom");
        assert_eq!(signal.cost(), 1);
        assert_eq!(*signal.cause(), "boom");
    }

    #[test]
    fn test_zero_cost_is_raised_to_one() {
        assert_eq!(FailureSignal::with_cost("boom", 0).cost(), 1);
        assert_eq!(FailureSignal::with_cost("boom", 7).cost(), 7);
    }

    #[test]
    fn test_call_error_unwraps_to_cause() {
        assert_eq!(CallError::counted("a").into_inner(), "a");
        assert_eq!(CallError::weighted("b", 3).into_inner(), "b");
        assert_eq!(CallError::uncounted("c").into_inner(), "c");
    }

    #[test]
    fn test_display_shows_cause_only() {
        assert_eq!(CallError::weighted("upstream down", 4).to_string(), "upstream down");
        assert_eq!(CallError::uncounted("bad input").to_string(), "bad input");
    }

    #[test]
    fn test_is_counted() {
        assert!(CallError::counted(()).is_counted());
        assert!(!CallError::uncounted(()).is_counted());
    }
}
