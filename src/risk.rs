// ===============================
// src/risk.rs
// ===============================
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::domain::Decision;

/// Cooldown antar trade: setelah trade tereksekusi (entry, exit, flip),
/// semua keputusan selain Hold ditahan sampai `cooldown` lewat.
/// Time comes from observation timestamps, not the wall clock.
#[derive(Debug, Default)]
pub struct CooldownGuard {
    cooldown: Duration,
    last_trade: Option<DateTime<Utc>>,
}

impl CooldownGuard {
    pub fn new(cooldown: Duration) -> Self { Self { cooldown, last_trade: None } }

    pub fn allows(&self, decision: &Decision, now: DateTime<Utc>) -> bool {
        if matches!(decision, Decision::Hold) || self.cooldown.is_zero() {
            return true;
        }
        match self.last_trade {
            None => true,
            Some(t) => (now - t).to_std().map(|el| el >= self.cooldown).unwrap_or(false),
        }
    }

    pub fn record_trade(&mut self, at: DateTime<Utc>) { self.last_trade = Some(at); }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Direction;
    use chrono::Duration as ChronoDuration;

    #[test]
    fn holds_every_transition_inside_the_window() {
        let t0 = Utc::now();
        let mut g = CooldownGuard::new(Duration::from_secs(300));
        let enter = Decision::Enter(Direction::Long);
        assert!(g.allows(&enter, t0));
        g.record_trade(t0);
        let t = t0 + ChronoDuration::seconds(60);
        assert!(!g.allows(&enter, t));
        assert!(!g.allows(&Decision::Flip(Direction::Short), t));
        assert!(!g.allows(&Decision::Exit, t));
        assert!(g.allows(&Decision::Hold, t));
        assert!(g.allows(&enter, t0 + ChronoDuration::seconds(300)));
    }

    #[test]
    fn every_trade_restarts_the_window() {
        let t0 = Utc::now();
        let at = |s: i64| t0 + ChronoDuration::seconds(s);
        let mut g = CooldownGuard::new(Duration::from_secs(300));
        g.record_trade(at(0));
        assert!(g.allows(&Decision::Exit, at(400)));
        g.record_trade(at(400));
        assert!(!g.allows(&Decision::Enter(Direction::Long), at(401)));
        assert!(g.allows(&Decision::Enter(Direction::Long), at(700)));
    }

    #[test]
    fn zero_cooldown_is_off() {
        let t0 = Utc::now();
        let mut g = CooldownGuard::new(Duration::ZERO);
        g.record_trade(t0);
        assert!(g.allows(&Decision::Enter(Direction::Short), t0));
    }
}
