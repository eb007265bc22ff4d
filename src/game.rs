use chrono::Utc;
use color_eyre::eyre::{
    Report,
    eyre,
};
use rand::Rng;
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    collections::VecDeque,
    fmt,
    str::FromStr,
    time::Duration,
};

/// Points added to the score for a correct guess.
pub const WIN_REWARD: u64 = 10;
/// Number of flips kept in the history strip.
pub const HISTORY_LIMIT: usize = 20;
pub const MIN_ROTATIONS: u32 = 2;
// exclusive upper bound of the extra spins drawn on top of MIN_ROTATIONS
const EXTRA_ROTATIONS: u32 = 4;
const ROTATION_MILLIS: u64 = 500;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Heads,
    Tails,
}

impl Side {
    /// On-chain encoding of the side (`u8`, heads = 0, tails = 1).
    pub fn as_u8(self) -> u8 {
        match self {
            Side::Heads => 0,
            Side::Tails => 1,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Side::Heads),
            1 => Some(Side::Tails),
            _ => None,
        }
    }

    pub fn glyph(self) -> &'static str {
        match self {
            Side::Heads => "H",
            Side::Tails => "T",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Side::Heads => "heads",
            Side::Tails => "tails",
        }
    }

    pub fn random(rng: &mut impl Rng) -> Self {
        if rng.random_bool(0.5) {
            Side::Heads
        } else {
            Side::Tails
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Side {
    type Err = Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "heads" | "h" => Ok(Side::Heads),
            "tails" | "t" => Ok(Side::Tails),
            other => Err(eyre!("Unknown coin side: {other}")),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct FlipResult {
    pub side: Side,
    /// Milliseconds since the unix epoch.
    pub timestamp: i64,
}

impl FlipResult {
    pub fn now(side: Side) -> Self {
        Self {
            side,
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Stats {
    pub heads: u64,
    pub tails: u64,
}

impl Stats {
    pub fn record(&mut self, side: Side) {
        match side {
            Side::Heads => self.heads += 1,
            Side::Tails => self.tails += 1,
        }
    }

    pub fn count(&self, side: Side) -> u64 {
        match side {
            Side::Heads => self.heads,
            Side::Tails => self.tails,
        }
    }

    pub fn total(&self) -> u64 {
        self.heads + self.tails
    }

    pub fn heads_percentage(&self) -> u64 {
        self.percentage(Side::Heads)
    }

    pub fn tails_percentage(&self) -> u64 {
        self.percentage(Side::Tails)
    }

    fn percentage(&self, side: Side) -> u64 {
        let total = self.total();
        if total == 0 {
            return 0;
        }
        (self.count(side) as f64 * 100.0 / total as f64).round() as u64
    }
}

/// Most-recent-first window over the last [`HISTORY_LIMIT`] flips.
#[derive(Clone, Debug, Default)]
pub struct History {
    entries: VecDeque<FlipResult>,
}

impl History {
    pub fn push(&mut self, result: FlipResult) {
        self.entries.push_front(result);
        self.entries.truncate(HISTORY_LIMIT);
    }

    pub fn iter(&self) -> impl Iterator<Item = &FlipResult> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&FlipResult> {
        self.entries.front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_vec(&self) -> Vec<FlipResult> {
        self.entries.iter().copied().collect()
    }
}

/// Spins used by the coin animation, in `[2, 5]`.
pub fn roll_rotations(rng: &mut impl Rng) -> u32 {
    MIN_ROTATIONS + rng.random_range(0..EXTRA_ROTATIONS)
}

pub fn animation_delay(rotations: u32) -> Duration {
    Duration::from_millis(u64::from(rotations) * ROTATION_MILLIS)
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FlipRejection {
    AlreadyFlipping,
    WalletDisconnected,
    NoSelection,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FlipOutcome {
    Won { side: Side, reward: u64 },
    Lost { landed: Side, guess: Side },
}

impl FlipOutcome {
    pub fn landed(&self) -> Side {
        match self {
            FlipOutcome::Won { side, .. } => *side,
            FlipOutcome::Lost { landed, .. } => *landed,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct GameState {
    selection: Option<Side>,
    flipping: bool,
    score: u64,
    high_score: u64,
    stats: Stats,
    history: History,
}

impl GameState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selection(&self) -> Option<Side> {
        self.selection
    }

    pub fn is_flipping(&self) -> bool {
        self.flipping
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    pub fn high_score(&self) -> u64 {
        self.high_score
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Returns `false` when the selection controls are disabled.
    pub fn select(&mut self, side: Side) -> bool {
        if self.flipping {
            return false;
        }
        self.selection = Some(side);
        true
    }

    /// Checks the flip preconditions and, when they hold, marks the flip
    /// as in flight. Returns the side the user is betting on.
    pub fn begin_flip(&mut self, wallet_connected: bool) -> Result<Side, FlipRejection> {
        if self.flipping {
            return Err(FlipRejection::AlreadyFlipping);
        }
        if !wallet_connected {
            return Err(FlipRejection::WalletDisconnected);
        }
        let Some(side) = self.selection else {
            return Err(FlipRejection::NoSelection);
        };
        self.flipping = true;
        Ok(side)
    }

    pub fn abort_flip(&mut self) {
        self.flipping = false;
    }

    /// Applies a display outcome: history, stats and score, then clears the
    /// selection and the in-flight flag. `guess` is the selection captured
    /// when the flip started.
    pub fn resolve_flip(&mut self, guess: Side, landed: Side, timestamp: i64) -> FlipOutcome {
        self.history.push(FlipResult {
            side: landed,
            timestamp,
        });
        self.stats.record(landed);
        let outcome = if guess == landed {
            self.score = self.score.saturating_add(WIN_REWARD);
            self.high_score = self.high_score.max(self.score);
            FlipOutcome::Won {
                side: landed,
                reward: WIN_REWARD,
            }
        } else {
            FlipOutcome::Lost { landed, guess }
        };
        self.selection = None;
        self.flipping = false;
        outcome
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use proptest::prelude::*;
    use rand::{
        SeedableRng,
        rngs::StdRng,
    };

    fn flipping_state(side: Side) -> GameState {
        let mut state = GameState::new();
        state.select(side);
        state.begin_flip(true).unwrap();
        state
    }

    #[test]
    fn side__encodes_heads_as_zero_and_tails_as_one() {
        assert_eq!(Side::Heads.as_u8(), 0);
        assert_eq!(Side::Tails.as_u8(), 1);
        assert_eq!(Side::from_u8(1), Some(Side::Tails));
        assert_eq!(Side::from_u8(2), None);
    }

    #[test]
    fn side__parses_names_and_initials() {
        assert_eq!("Heads".parse::<Side>().unwrap(), Side::Heads);
        assert_eq!(" t ".parse::<Side>().unwrap(), Side::Tails);
        assert!("edge".parse::<Side>().is_err());
    }

    #[test]
    fn stats__percentages_are_zero_without_flips() {
        let stats = Stats::default();
        assert_eq!(stats.heads_percentage(), 0);
        assert_eq!(stats.tails_percentage(), 0);
    }

    #[test]
    fn stats__percentages_round_to_nearest() {
        // given
        let stats = Stats { heads: 1, tails: 2 };

        // then
        assert_eq!(stats.heads_percentage(), 33);
        assert_eq!(stats.tails_percentage(), 67);
    }

    #[test]
    fn roll_rotations__stays_between_two_and_five() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let rotations = roll_rotations(&mut rng);
            assert!((2..=5).contains(&rotations), "{rotations}");
        }
    }

    #[test]
    fn animation_delay__is_half_a_second_per_rotation() {
        assert_eq!(animation_delay(2), Duration::from_millis(1000));
        assert_eq!(animation_delay(5), Duration::from_millis(2500));
    }

    #[test]
    fn begin_flip__rejects_disconnected_wallet_before_missing_selection() {
        // given
        let mut state = GameState::new();

        // when
        let result = state.begin_flip(false);

        // then
        assert_eq!(result, Err(FlipRejection::WalletDisconnected));
        assert!(!state.is_flipping());
    }

    #[test]
    fn begin_flip__rejects_missing_selection() {
        let mut state = GameState::new();
        assert_eq!(state.begin_flip(true), Err(FlipRejection::NoSelection));
        assert!(!state.is_flipping());
        assert_eq!(state.stats().total(), 0);
    }

    #[test]
    fn begin_flip__marks_flip_in_flight_and_blocks_selection() {
        // given
        let mut state = GameState::new();
        state.select(Side::Heads);

        // when
        let guess = state.begin_flip(true);

        // then
        assert_eq!(guess, Ok(Side::Heads));
        assert!(state.is_flipping());
        assert!(!state.select(Side::Tails));
        assert_eq!(state.selection(), Some(Side::Heads));
        assert_eq!(state.begin_flip(true), Err(FlipRejection::AlreadyFlipping));
    }

    #[test]
    fn resolve_flip__win_adds_reward_and_clears_selection() {
        // given
        let mut state = flipping_state(Side::Heads);

        // when
        let outcome = state.resolve_flip(Side::Heads, Side::Heads, 42);

        // then
        assert_eq!(
            outcome,
            FlipOutcome::Won {
                side: Side::Heads,
                reward: WIN_REWARD
            }
        );
        assert_eq!(state.score(), 10);
        assert_eq!(state.high_score(), 10);
        assert_eq!(state.stats().heads, 1);
        assert_eq!(
            state.history().latest(),
            Some(&FlipResult {
                side: Side::Heads,
                timestamp: 42
            })
        );
        assert_eq!(state.selection(), None);
        assert!(!state.is_flipping());
    }

    #[test]
    fn resolve_flip__loss_keeps_score() {
        let mut state = flipping_state(Side::Heads);
        let outcome = state.resolve_flip(Side::Heads, Side::Tails, 1);
        assert_eq!(
            outcome,
            FlipOutcome::Lost {
                landed: Side::Tails,
                guess: Side::Heads
            }
        );
        assert_eq!(state.score(), 0);
        assert_eq!(state.stats().tails, 1);
    }

    #[test]
    fn abort_flip__leaves_selection_and_counters_untouched() {
        let mut state = flipping_state(Side::Tails);
        state.abort_flip();
        assert!(!state.is_flipping());
        assert_eq!(state.selection(), Some(Side::Tails));
        assert!(state.history().is_empty());
        assert_eq!(state.score(), 0);
    }

    fn side_strategy() -> impl Strategy<Value = Side> {
        prop_oneof![Just(Side::Heads), Just(Side::Tails)]
    }

    proptest! {
        #[test]
        fn resolve_flip__keeps_history_capped_and_counters_consistent(
            flips in prop::collection::vec((side_strategy(), side_strategy()), 0..60)
        ) {
            let mut state = GameState::new();
            let mut wins = 0u64;
            for (i, (guess, landed)) in flips.iter().enumerate() {
                let before = state.stats();
                let score_before = state.score();
                prop_assert!(state.select(*guess));
                prop_assert_eq!(state.begin_flip(true), Ok(*guess));
                state.resolve_flip(*guess, *landed, i as i64);
                if guess == landed {
                    wins += 1;
                    prop_assert_eq!(state.score(), score_before + WIN_REWARD);
                } else {
                    prop_assert_eq!(state.score(), score_before);
                }
                prop_assert!(state.stats().heads >= before.heads);
                prop_assert!(state.stats().tails >= before.tails);
            }

            prop_assert_eq!(state.score(), wins * WIN_REWARD);
            prop_assert_eq!(state.stats().total(), flips.len() as u64);
            prop_assert_eq!(state.history().len(), flips.len().min(HISTORY_LIMIT));
            let stamps: Vec<i64> = state.history().iter().map(|f| f.timestamp).collect();
            prop_assert!(stamps.windows(2).all(|w| w[0] > w[1]));
            if let Some(latest) = state.history().latest() {
                prop_assert_eq!(latest.timestamp, flips.len() as i64 - 1);
            }
        }
    }
}
