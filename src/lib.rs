pub mod client;

pub mod deployment;

pub mod game;

pub mod notices;

pub mod rpc;

pub mod transaction;

pub mod wallets;

pub mod test_helpers;

pub use client::{
    ClaimOutcome,
    GameController,
    GameSnapshot,
    PendingFlip,
};
pub use game::{
    FlipOutcome,
    FlipResult,
    Side,
};
