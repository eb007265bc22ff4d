use crate::{
    deployment::GameDeployment,
    rpc::RelayError,
    transaction::{
        GameContract,
        ObjectId,
        Transaction,
    },
    wallets::{
        Acknowledgment,
        WalletConnector,
    },
};
use color_eyre::eyre::{
    Result,
    eyre,
};
use std::{
    cell::RefCell,
    collections::VecDeque,
};

/// Canned reply for the next transaction a [`ScriptedWallet`] receives.
#[derive(Clone, Debug)]
pub enum ScriptedResponse {
    Ack(String),
    Relay(RelayError),
    Fail(String),
}

impl ScriptedResponse {
    pub fn relay_abort(message: impl Into<String>) -> Self {
        ScriptedResponse::Relay(RelayError {
            code: -32002,
            message: message.into(),
        })
    }
}

/// Wallet double that records every submitted transaction and answers from
/// a queue of scripted responses. Once the queue is empty it acknowledges
/// with the transaction digest.
#[derive(Debug, Default)]
pub struct ScriptedWallet {
    connected: bool,
    responses: RefCell<VecDeque<ScriptedResponse>>,
    submitted: RefCell<Vec<Transaction>>,
}

impl ScriptedWallet {
    pub fn connected() -> Self {
        Self {
            connected: true,
            ..Self::default()
        }
    }

    pub fn disconnected() -> Self {
        Self::default()
    }

    pub fn respond_with(self, response: ScriptedResponse) -> Self {
        self.responses.borrow_mut().push_back(response);
        self
    }

    pub fn push_response(&self, response: ScriptedResponse) {
        self.responses.borrow_mut().push_back(response);
    }

    pub fn submitted(&self) -> Vec<Transaction> {
        self.submitted.borrow().clone()
    }
}

impl WalletConnector for ScriptedWallet {
    fn is_connected(&self) -> bool {
        self.connected
    }

    fn connect(&mut self) -> Result<()> {
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }

    fn label(&self) -> String {
        String::from("scripted")
    }

    async fn sign_and_execute(&self, transaction: &Transaction) -> Result<Acknowledgment> {
        self.submitted.borrow_mut().push(transaction.clone());
        let next = self.responses.borrow_mut().pop_front();
        match next {
            Some(ScriptedResponse::Ack(digest)) => Ok(Acknowledgment { digest }),
            Some(ScriptedResponse::Relay(error)) => Err(error.into()),
            Some(ScriptedResponse::Fail(message)) => Err(eyre!(message)),
            None => Ok(Acknowledgment {
                digest: transaction.digest_hex()?,
            }),
        }
    }
}

fn short_id(tail: &[u8]) -> ObjectId {
    let mut bytes = [0u8; 32];
    bytes[32 - tail.len()..].copy_from_slice(tail);
    ObjectId::new(bytes)
}

/// Contract coordinates matching [`test_deployment`].
pub fn test_contract() -> GameContract {
    GameContract {
        package: short_id(&[0xc0, 0xff, 0xee]),
        module: String::from("coin_flip"),
        game_object: short_id(&[0x42]),
        random_object: short_id(&[0x08]),
    }
}

pub fn test_deployment() -> GameDeployment {
    GameDeployment {
        package_id: String::from("0xc0ffee"),
        game_object_id: String::from("0x42"),
        already_claimed_marker: Some(String::from("ECoinsAlreadyClaimed")),
        ..GameDeployment::offline()
    }
}
