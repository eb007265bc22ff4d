use crate::game::Side;
use color_eyre::eyre::{
    Report,
    Result,
    WrapErr,
    eyre,
};
use serde::{
    Deserialize,
    Serialize,
};
use sha2::{
    Digest,
    Sha256,
};
use std::{
    fmt,
    str::FromStr,
};

pub const CLAIM_FUNCTION: &str = "claim";
pub const PLAY_FUNCTION: &str = "play";
pub const DEFAULT_STAKE: u64 = 100;

/// 32 byte on-chain object reference, written as `0x`-prefixed hex.
/// Short forms such as `0x6` are left-padded with zeros.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectId([u8; 32]);

impl ObjectId {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl FromStr for ObjectId {
    type Err = Report;

    fn from_str(s: &str) -> Result<Self> {
        let raw = s.trim();
        let digits = raw
            .strip_prefix("0x")
            .or_else(|| raw.strip_prefix("0X"))
            .unwrap_or(raw);
        if digits.is_empty() || digits.len() > 64 {
            return Err(eyre!("Invalid object id length: {raw:?}"));
        }
        let padded = format!("{digits:0>64}");
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(&padded, &mut bytes)
            .wrap_err_with(|| format!("Invalid object id: {raw:?}"))?;
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for ObjectId {
    type Error = Report;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ObjectId> for String {
    fn from(id: ObjectId) -> Self {
        id.to_string()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct CallTarget {
    pub package: ObjectId,
    pub module: String,
    pub function: String,
}

impl fmt::Display for CallTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}::{}", self.package, self.module, self.function)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CallArg {
    Object(ObjectId),
    U8(u8),
    U64(u64),
}

/// A contract call ready to be handed to a wallet for signing.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub target: CallTarget,
    pub arguments: Vec<CallArg>,
}

impl Transaction {
    /// SHA-256 over the canonical JSON encoding. This is what wallets sign.
    pub fn digest(&self) -> Result<[u8; 32]> {
        let bytes =
            serde_json::to_vec(self).wrap_err("Failed to encode transaction")?;
        Ok(Sha256::digest(bytes).into())
    }

    pub fn digest_hex(&self) -> Result<String> {
        Ok(hex::encode(self.digest()?))
    }
}

/// Fixed coordinates of the deployed game contract.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GameContract {
    pub package: ObjectId,
    pub module: String,
    pub game_object: ObjectId,
    pub random_object: ObjectId,
}

impl GameContract {
    fn target(&self, function: &str) -> CallTarget {
        CallTarget {
            package: self.package,
            module: self.module.clone(),
            function: function.to_string(),
        }
    }

    fn object_args(&self) -> Vec<CallArg> {
        vec![
            CallArg::Object(self.game_object),
            CallArg::Object(self.random_object),
        ]
    }

    pub fn claim(&self) -> Transaction {
        Transaction {
            target: self.target(CLAIM_FUNCTION),
            arguments: self.object_args(),
        }
    }

    pub fn play(&self, side: Side) -> Transaction {
        let mut arguments = self.object_args();
        arguments.push(CallArg::U8(side.as_u8()));
        arguments.push(CallArg::U64(DEFAULT_STAKE));
        Transaction {
            target: self.target(PLAY_FUNCTION),
            arguments,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    fn contract() -> GameContract {
        GameContract {
            package: "0xabc".parse().unwrap(),
            module: "coin_flip".to_string(),
            game_object: "0x11".parse().unwrap(),
            random_object: "0x8".parse().unwrap(),
        }
    }

    #[test]
    fn object_id__pads_short_hex() {
        // when
        let id: ObjectId = "0x8".parse().unwrap();

        // then
        let mut expected = [0u8; 32];
        expected[31] = 8;
        assert_eq!(id.as_bytes(), &expected);
        assert_eq!(id.to_string(), format!("0x{}8", "0".repeat(63)));
    }

    #[test]
    fn object_id__rejects_garbage() {
        assert!("0x".parse::<ObjectId>().is_err());
        assert!("0xzz".parse::<ObjectId>().is_err());
        assert!(format!("0x{}", "1".repeat(65)).parse::<ObjectId>().is_err());
    }

    #[test]
    fn claim__carries_only_the_two_object_refs() {
        // when
        let tx = contract().claim();

        // then
        assert_eq!(tx.target.function, CLAIM_FUNCTION);
        assert_eq!(tx.target.module, "coin_flip");
        assert_eq!(
            tx.arguments,
            vec![
                CallArg::Object("0x11".parse().unwrap()),
                CallArg::Object("0x8".parse().unwrap()),
            ]
        );
    }

    #[test]
    fn play__appends_side_byte_and_stake() {
        // when
        let tx = contract().play(Side::Tails);

        // then
        assert_eq!(tx.target.function, PLAY_FUNCTION);
        assert_eq!(tx.arguments.len(), 4);
        assert_eq!(tx.arguments[2], CallArg::U8(1));
        assert_eq!(tx.arguments[3], CallArg::U64(100));
    }

    #[test]
    fn digest__differs_between_sides() {
        let c = contract();
        let heads = c.play(Side::Heads).digest().unwrap();
        let tails = c.play(Side::Tails).digest().unwrap();
        assert_ne!(heads, tails);
        assert_eq!(heads, c.play(Side::Heads).digest().unwrap());
    }

    #[test]
    fn transaction__json_shape_is_tagged() {
        let json = serde_json::to_value(contract().play(Side::Heads)).unwrap();
        assert_eq!(json["arguments"][2]["type"], "u8");
        assert_eq!(json["arguments"][2]["value"], 0);
        assert_eq!(json["arguments"][0]["type"], "object");
        assert_eq!(json["target"]["function"], "play");
    }
}
