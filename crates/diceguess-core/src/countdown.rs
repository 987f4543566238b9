use serde::{Deserialize, Serialize};

/// One visible step of the pre-round countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CountdownStep {
    Number(u32),
    Go,
    /// The "GO" display has elapsed; answering may begin.
    Finished,
}

impl std::fmt::Display for CountdownStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Go => f.write_str("GO!"),
            Self::Finished => Ok(()),
        }
    }
}

/// Local, purely cosmetic countdown: `from, from-1, .., 1, GO`, one step per
/// `interval` seconds. Driven by the caller's clock via [`Countdown::advance`].
#[derive(Debug, Clone)]
pub struct Countdown {
    from: u32,
    interval: f32,
    current: Option<CountdownStep>,
    accumulator: f32,
}

impl Countdown {
    pub fn new(from: u32, interval_secs: f32) -> Self {
        Self {
            from,
            interval: interval_secs.max(0.0),
            current: None,
            accumulator: 0.0,
        }
    }

    /// Start (or restart) the countdown and return its first step.
    pub fn start(&mut self) -> CountdownStep {
        let first = if self.from == 0 {
            CountdownStep::Go
        } else {
            CountdownStep::Number(self.from)
        };
        self.current = Some(first);
        self.accumulator = 0.0;
        first
    }

    pub fn current(&self) -> Option<CountdownStep> {
        self.current
    }

    pub fn is_running(&self) -> bool {
        matches!(
            self.current,
            Some(CountdownStep::Number(_) | CountdownStep::Go)
        )
    }

    pub fn is_finished(&self) -> bool {
        self.current == Some(CountdownStep::Finished)
    }

    /// Advance by `dt` seconds, returning every step crossed in order. A large
    /// `dt` may cross several steps at once.
    pub fn advance(&mut self, dt: f32) -> Vec<CountdownStep> {
        let mut steps = Vec::new();
        if !self.is_running() {
            return steps;
        }
        self.accumulator += dt.max(0.0);
        while self.is_running() && self.accumulator >= self.interval {
            self.accumulator -= self.interval;
            let next = match self.current {
                Some(CountdownStep::Number(n)) if n > 1 => CountdownStep::Number(n - 1),
                Some(CountdownStep::Number(_)) => CountdownStep::Go,
                _ => CountdownStep::Finished,
            };
            self.current = Some(next);
            steps.push(next);
        }
        steps
    }

    pub fn cancel(&mut self) {
        self.current = None;
        self.accumulator = 0.0;
    }
}
