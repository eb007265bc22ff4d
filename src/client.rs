use crate::{
    deployment::GameDeployment,
    game::{
        FlipOutcome,
        FlipRejection,
        FlipResult,
        GameState,
        Side,
        Stats,
        animation_delay,
        roll_rotations,
    },
    notices::{
        Notice,
        NoticeBoard,
        NoticeLevel,
        NoticeOptions,
    },
    rpc::RelayError,
    transaction::{
        DEFAULT_STAKE,
        GameContract,
    },
    wallets::WalletConnector,
};
use color_eyre::eyre::{
    Report,
    Result,
};
use rand::{
    SeedableRng,
    rngs::StdRng,
};
use std::time::{
    Duration,
    Instant,
};
use tracing::{
    error,
    info,
};

const ALREADY_CLAIMED_ABORT: &str = "EAlreadyClaimed";
const ALREADY_CLAIMED_TEXT: &str = "already claimed";

pub const CONNECT_FIRST: &str = "Please connect your wallet first!";
pub const SELECT_FIRST: &str = "Please select a side first!";
pub const SELECT_FIRST_DETAIL: &str = "Choose heads or tails before flipping the coin.";
pub const TRANSACTION_FAILED: &str = "Transaction failed";
pub const CLAIM_SUCCEEDED: &str = "Free coins claimed!";
pub const CLAIM_DUPLICATE: &str = "Already claimed";
pub const CLAIM_FAILED: &str = "Claim failed";
pub const FLIP_WON: &str = "You won! 🎉";
pub const FLIP_LOST: &str = "You lost! 😢";

/// A play transaction the wallet acknowledged. The coin keeps spinning for
/// `delay` before the display outcome is drawn.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PendingFlip {
    pub guess: Side,
    pub rotations: u32,
    pub delay: Duration,
    pub digest: String,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ClaimOutcome {
    NotConnected,
    Claimed { digest: String },
    AlreadyClaimed,
    Failed,
}

/// Everything the renderer needs for one frame.
#[derive(Clone, Debug)]
pub struct GameSnapshot {
    pub wallet_connected: bool,
    pub wallet_label: String,
    pub selection: Option<Side>,
    pub flipping: bool,
    pub score: u64,
    pub high_score: u64,
    pub stats: Stats,
    pub history: Vec<FlipResult>,
    pub notices: Vec<Notice>,
    pub show_instructions: bool,
    pub status: String,
    pub stake: u64,
}

impl GameSnapshot {
    pub fn last_result(&self) -> Option<&FlipResult> {
        self.history.first()
    }
}

pub struct GameController<W> {
    wallet: W,
    contract: GameContract,
    already_claimed_marker: Option<String>,
    state: GameState,
    notices: NoticeBoard,
    show_instructions: bool,
    status: String,
    rng: StdRng,
}

impl<W: WalletConnector> GameController<W> {
    pub fn new(wallet: W, deployment: &GameDeployment) -> Result<Self> {
        let contract = deployment.contract()?;
        let mut controller = Self::with_contract(wallet, contract, StdRng::from_os_rng());
        controller.already_claimed_marker = deployment.already_claimed_marker.clone();
        Ok(controller)
    }

    /// Controller with a deterministic outcome stream.
    pub fn seeded(wallet: W, contract: GameContract, seed: u64) -> Self {
        Self::with_contract(wallet, contract, StdRng::seed_from_u64(seed))
    }

    fn with_contract(wallet: W, contract: GameContract, rng: StdRng) -> Self {
        Self {
            wallet,
            contract,
            already_claimed_marker: None,
            state: GameState::new(),
            notices: NoticeBoard::new(),
            show_instructions: false,
            status: String::from("Ready"),
            rng,
        }
    }

    pub fn with_already_claimed_marker(mut self, marker: impl Into<String>) -> Self {
        self.already_claimed_marker = Some(marker.into());
        self
    }

    pub fn wallet(&self) -> &W {
        &self.wallet
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn notices(&self) -> &NoticeBoard {
        &self.notices
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    pub fn select(&mut self, side: Side) {
        if self.state.select(side) {
            self.status = format!("Selected {side}");
        }
    }

    pub fn toggle_instructions(&mut self) {
        self.show_instructions = !self.show_instructions;
    }

    pub fn connect(&mut self) {
        if self.wallet.is_connected() {
            return;
        }
        match self.wallet.connect() {
            Ok(()) => {
                let label = self.wallet.label();
                self.status = format!("Connected {label}");
                self.notices.notify(
                    "Wallet connected",
                    NoticeOptions::described(label).level(NoticeLevel::Success),
                );
            }
            Err(err) => {
                error!("wallet connection failed: {err:#}");
                self.notices.notify(
                    "Wallet connection failed",
                    NoticeOptions::described(format!("{err}")).level(NoticeLevel::Error),
                );
            }
        }
    }

    pub fn disconnect(&mut self) {
        if !self.wallet.is_connected() {
            return;
        }
        self.wallet.disconnect();
        self.status = String::from("Wallet disconnected");
        self.notices
            .notify("Wallet disconnected", NoticeOptions::default());
    }

    pub fn dismiss_notice(&mut self) -> bool {
        self.notices.dismiss_latest()
    }

    pub fn expire_notices(&mut self, now: Instant) -> bool {
        self.notices.expire(now)
    }

    /// Submits the one-time claim of free coins. Never touches the game
    /// state.
    pub async fn request_claim(&mut self) -> ClaimOutcome {
        if !self.wallet.is_connected() {
            self.status = String::from("Wallet not connected");
            self.notices.notify(CONNECT_FIRST, NoticeOptions::default());
            return ClaimOutcome::NotConnected;
        }

        let transaction = self.contract.claim();
        match self.wallet.sign_and_execute(&transaction).await {
            Ok(ack) => {
                info!(digest = %ack.digest, "free coins claimed");
                self.status = String::from("Claimed free coins");
                self.notices.notify(
                    CLAIM_SUCCEEDED,
                    NoticeOptions::described(format!("Transaction: {}", ack.digest))
                        .level(NoticeLevel::Success),
                );
                ClaimOutcome::Claimed { digest: ack.digest }
            }
            Err(err) if self.is_already_claimed(&err) => {
                info!("claim rejected, coins already claimed");
                self.status = String::from("Free coins already claimed");
                self.notices.notify(
                    CLAIM_DUPLICATE,
                    NoticeOptions::described("You have already claimed your free coins.")
                        .level(NoticeLevel::Error),
                );
                ClaimOutcome::AlreadyClaimed
            }
            Err(err) => {
                error!("claim failed: {err:#}");
                self.status = String::from("Claim failed");
                self.notices.notify(
                    CLAIM_FAILED,
                    NoticeOptions::described(format!("{err}")).level(NoticeLevel::Error),
                );
                ClaimOutcome::Failed
            }
        }
    }

    fn is_already_claimed(&self, err: &Report) -> bool {
        let mut texts = vec![format!("{err:#}")];
        if let Some(relay) = err.downcast_ref::<RelayError>() {
            texts.push(relay.message.clone());
        }
        texts.iter().any(|text| {
            let lowered = text.to_lowercase();
            self.already_claimed_marker
                .as_deref()
                .filter(|marker| !marker.trim().is_empty())
                .is_some_and(|marker| text.contains(marker))
                || text.contains(ALREADY_CLAIMED_ABORT)
                || lowered.contains(ALREADY_CLAIMED_TEXT)
        })
    }

    /// First half of a flip: checks the preconditions, marks the flip in
    /// flight and awaits the play transaction. Returns `None` when the flip
    /// did not start or the wallet rejected it.
    pub async fn submit_flip(&mut self) -> Option<PendingFlip> {
        let guess = match self.state.begin_flip(self.wallet.is_connected()) {
            Ok(side) => side,
            Err(FlipRejection::AlreadyFlipping) => return None,
            Err(FlipRejection::WalletDisconnected) => {
                self.status = String::from("Wallet not connected");
                self.notices.notify(CONNECT_FIRST, NoticeOptions::default());
                return None;
            }
            Err(FlipRejection::NoSelection) => {
                self.status = String::from("Select a side first");
                self.notices
                    .notify(SELECT_FIRST, NoticeOptions::described(SELECT_FIRST_DETAIL));
                return None;
            }
        };

        let transaction = self.contract.play(guess);
        match self.wallet.sign_and_execute(&transaction).await {
            Ok(ack) => {
                let rotations = roll_rotations(&mut self.rng);
                info!(digest = %ack.digest, %guess, rotations, "flip acknowledged");
                self.status = format!("Flipping on {guess}...");
                Some(PendingFlip {
                    guess,
                    rotations,
                    delay: animation_delay(rotations),
                    digest: ack.digest,
                })
            }
            Err(err) => {
                error!("flip transaction failed: {err:#}");
                self.state.abort_flip();
                self.status = String::from("Flip failed");
                self.notices.notify(
                    TRANSACTION_FAILED,
                    NoticeOptions::described(format!("{err}")).level(NoticeLevel::Error),
                );
                None
            }
        }
    }

    /// Uniform display outcome for a pending flip.
    pub fn draw_outcome(&mut self) -> Side {
        Side::random(&mut self.rng)
    }

    /// Second half of a flip: records `landed` and posts the result notice.
    pub fn resolve_flip(&mut self, pending: &PendingFlip, landed: Side) -> FlipOutcome {
        let result = FlipResult::now(landed);
        let outcome = self
            .state
            .resolve_flip(pending.guess, landed, result.timestamp);
        match outcome {
            FlipOutcome::Won { side, reward } => {
                self.status = format!("Landed on {side}, +{reward}");
                self.notices.notify(
                    FLIP_WON,
                    NoticeOptions::described(format!(
                        "You correctly guessed {side} and earned {reward} points!"
                    ))
                    .level(NoticeLevel::Success),
                );
            }
            FlipOutcome::Lost { landed, guess } => {
                self.status = format!("Landed on {landed}");
                self.notices.notify(
                    FLIP_LOST,
                    NoticeOptions::described(format!(
                        "The coin landed on {landed}, but you guessed {guess}."
                    ))
                    .level(NoticeLevel::Error),
                );
            }
        }
        outcome
    }

    /// Full flip: submit, wait out the animation, resolve.
    pub async fn request_flip(&mut self) -> Option<FlipOutcome> {
        let pending = self.submit_flip().await?;
        tokio::time::sleep(pending.delay).await;
        let landed = self.draw_outcome();
        Some(self.resolve_flip(&pending, landed))
    }

    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            wallet_connected: self.wallet.is_connected(),
            wallet_label: self.wallet.label(),
            selection: self.state.selection(),
            flipping: self.state.is_flipping(),
            score: self.state.score(),
            high_score: self.state.high_score(),
            stats: self.state.stats(),
            history: self.state.history().to_vec(),
            notices: self.notices.notices().to_vec(),
            show_instructions: self.show_instructions,
            status: self.status.clone(),
            stake: DEFAULT_STAKE,
        }
    }
}
