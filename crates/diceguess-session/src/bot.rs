use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use diceguess_core::coordinator::RoundCoordinator;
use diceguess_core::dice;

/// How a simulated player behaves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BotProfile {
    /// Probability that an answer is the true product.
    pub accuracy: f64,
    pub think_min_secs: f32,
    pub think_max_secs: f32,
}

impl Default for BotProfile {
    fn default() -> Self {
        Self {
            accuracy: 0.7,
            think_min_secs: 0.5,
            think_max_secs: 2.5,
        }
    }
}

/// Something a bot decided to do this tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotAction {
    /// Text typed into the answer box.
    Answer(String),
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlanKind {
    Answer,
    Ready,
}

#[derive(Debug)]
struct Plan {
    kind: PlanKind,
    round: u32,
    remaining: f32,
    input: String,
}

/// Drives a peer the way a player would: looks at the dice, thinks for a
/// while, types an answer, then acknowledges the results.
#[derive(Debug)]
pub struct Bot {
    profile: BotProfile,
    rng: StdRng,
    plan: Option<Plan>,
}

impl Bot {
    pub fn new(profile: BotProfile, seed: u64) -> Self {
        Self {
            profile,
            rng: StdRng::seed_from_u64(seed),
            plan: None,
        }
    }

    pub fn profile(&self) -> BotProfile {
        self.profile
    }

    /// Advance the bot's think timer by `dt` and return an action once one
    /// is due.
    pub fn poll(&mut self, coordinator: &RoundCoordinator, dt: f32) -> Option<BotAction> {
        let round = coordinator.current_round();
        let wanted = if coordinator.accepts_answer() {
            Some(PlanKind::Answer)
        } else if coordinator.accepts_ready() {
            Some(PlanKind::Ready)
        } else {
            None
        };

        let Some(kind) = wanted else {
            self.plan = None;
            return None;
        };

        let stale = self
            .plan
            .as_ref()
            .is_none_or(|p| p.kind != kind || p.round != round);
        if stale {
            let input = match kind {
                PlanKind::Answer => self.guess(dice::product(coordinator.dice())).to_string(),
                PlanKind::Ready => String::new(),
            };
            let remaining = self.think_time();
            tracing::trace!(round, ?kind, remaining, "bot planning");
            self.plan = Some(Plan {
                kind,
                round,
                remaining,
                input,
            });
        }

        let plan = self.plan.as_mut()?;
        plan.remaining -= dt;
        if plan.remaining > 0.0 {
            return None;
        }
        let plan = self.plan.take()?;
        Some(match plan.kind {
            PlanKind::Answer => BotAction::Answer(plan.input),
            PlanKind::Ready => BotAction::Ready,
        })
    }

    fn think_time(&mut self) -> f32 {
        let (lo, hi) = (self.profile.think_min_secs, self.profile.think_max_secs);
        if hi > lo {
            self.rng.random_range(lo..=hi)
        } else {
            lo
        }
    }

    /// The true product, or a nearby wrong one.
    fn guess(&mut self, product: i64) -> i64 {
        if self.rng.random_bool(self.profile.accuracy.clamp(0.0, 1.0)) {
            return product;
        }
        let offset: i64 = self.rng.random_range(1..=6);
        if product > offset && self.rng.random_bool(0.5) {
            product - offset
        } else {
            product + offset
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diceguess_core::settings::RoundSettings;
    use diceguess_core::test_helpers::LocalRoom;

    fn instant(accuracy: f64) -> BotProfile {
        BotProfile {
            accuracy,
            think_min_secs: 0.0,
            think_max_secs: 0.0,
        }
    }

    #[test]
    fn idle_coordinator_produces_no_action() {
        let room = LocalRoom::new(2, 3, 2, RoundSettings::default());
        let mut bot = Bot::new(instant(1.0), 1);
        assert_eq!(bot.poll(room.peer(2), 0.1), None);
    }

    #[test]
    fn accurate_bot_answers_the_product() {
        let mut room = LocalRoom::new(2, 3, 2, RoundSettings::default());
        room.start_game();
        room.run_for(4.0, 0.5);

        let expected = room.answer_for(2);
        let mut bot = Bot::new(instant(1.0), 1);
        assert_eq!(
            bot.poll(room.peer(2), 0.1),
            Some(BotAction::Answer(expected.to_string()))
        );
    }

    #[test]
    fn inaccurate_bot_never_answers_the_product() {
        let mut room = LocalRoom::new(2, 3, 2, RoundSettings::default());
        room.start_game();
        room.run_for(4.0, 0.5);

        let expected = room.answer_for(2);
        for seed in 0..20 {
            let mut bot = Bot::new(instant(0.0), seed);
            match bot.poll(room.peer(2), 0.1) {
                Some(BotAction::Answer(text)) => {
                    assert_ne!(text.parse::<i64>().unwrap(), expected)
                },
                other => panic!("expected an answer, got {other:?}"),
            }
        }
    }

    #[test]
    fn bot_waits_for_think_time() {
        let mut room = LocalRoom::new(2, 3, 2, RoundSettings::default());
        room.start_game();
        room.run_for(4.0, 0.5);

        let mut bot = Bot::new(
            BotProfile {
                accuracy: 1.0,
                think_min_secs: 1.0,
                think_max_secs: 1.0,
            },
            3,
        );
        assert_eq!(bot.poll(room.peer(2), 0.4), None);
        assert_eq!(bot.poll(room.peer(2), 0.4), None);
        assert!(matches!(
            bot.poll(room.peer(2), 0.4),
            Some(BotAction::Answer(_))
        ));
    }

    #[test]
    fn bot_acknowledges_results() {
        let mut room = LocalRoom::new(2, 3, 2, RoundSettings::default());
        room.start_game();
        room.run_for(4.0, 0.5);
        for id in room.actor_ids() {
            let answer = room.answer_for(id).to_string();
            room.submit(id, &answer);
        }

        let mut bot = Bot::new(instant(1.0), 1);
        assert_eq!(bot.poll(room.peer(2), 0.1), Some(BotAction::Ready));
    }
}
