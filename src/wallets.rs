use crate::transaction::Transaction;
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use eth_keystore::decrypt_key;
use fuels::crypto::{
    Message,
    PublicKey,
    SecretKey,
    Signature,
};
use rpassword::prompt_password;
use std::{
    fmt,
    fs,
    future::Future,
    path::{
        Path,
        PathBuf,
    },
};

const DERIVATION_PATH: &str = "m/44'/1179993420'/0'/0/0";

/// Receipt returned by a wallet once a transaction has been signed and
/// accepted for execution.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Acknowledgment {
    pub digest: String,
}

/// Connection handle to the user's wallet.
pub trait WalletConnector {
    fn is_connected(&self) -> bool;

    fn connect(&mut self) -> Result<()>;

    fn disconnect(&mut self);

    /// Short human readable account label for the header.
    fn label(&self) -> String;

    fn sign_and_execute(
        &self,
        transaction: &Transaction,
    ) -> impl Future<Output = Result<Acknowledgment>>;
}

/// Wallet that acknowledges every transaction locally without touching a
/// chain. Used by `--offline`.
#[derive(Clone, Debug, Default)]
pub struct OfflineWallet {
    connected: bool,
}

impl OfflineWallet {
    pub fn connected() -> Self {
        Self { connected: true }
    }
}

impl WalletConnector for OfflineWallet {
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
        String::from("offline")
    }

    async fn sign_and_execute(&self, transaction: &Transaction) -> Result<Acknowledgment> {
        if !self.connected {
            return Err(eyre!("Wallet is not connected"));
        }
        let digest = transaction.digest_hex()?;
        tracing::debug!(%digest, call = %transaction.target, "offline acknowledgment");
        Ok(Acknowledgment { digest })
    }
}

#[derive(Clone, Debug)]
pub struct WalletDescriptor {
    pub name: String,
    pub path: PathBuf,
}

impl WalletDescriptor {
    pub fn new(name: impl Into<String>, path: PathBuf) -> Self {
        Self {
            name: name.into(),
            path,
        }
    }
}

pub fn default_wallet_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").wrap_err("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".fuel").join("wallets"))
}

pub fn resolve_wallet_dir(dir: Option<&str>) -> Result<PathBuf> {
    match dir {
        Some(raw) => {
            let expanded = shellexpand::tilde(raw);
            Ok(PathBuf::from(expanded.into_owned()))
        }
        None => default_wallet_dir(),
    }
}

pub fn list_wallets(dir: &Path) -> Result<Vec<WalletDescriptor>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut wallets = Vec::new();
    for entry in fs::read_dir(dir).wrap_err("Failed to read wallet directory")? {
        let entry = entry.wrap_err("Failed to read wallet entry")?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if path.extension().and_then(|ext| ext.to_str()) != Some("wallet") {
            continue;
        }
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| eyre!("Invalid wallet filename {:?}", path))?
            .to_owned();
        wallets.push(WalletDescriptor::new(name, path));
    }
    wallets.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(wallets)
}

pub fn find_wallet(dir: &Path, name: &str) -> Result<WalletDescriptor> {
    let wallets = list_wallets(dir)?;
    wallets
        .into_iter()
        .find(|w| w.name == name)
        .ok_or_else(|| eyre!("Wallet '{name}' not found in {}", dir.to_string_lossy()))
}

/// secp256k1 key pair unlocked from a keystore file.
#[derive(Clone)]
pub struct KeystoreSigner {
    name: String,
    secret: SecretKey,
    public: PublicKey,
}

impl fmt::Debug for KeystoreSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeystoreSigner")
            .field("name", &self.name)
            .field("public_key", &self.public_key_hex())
            .finish_non_exhaustive()
    }
}

impl KeystoreSigner {
    pub fn new(name: impl Into<String>, secret: SecretKey) -> Self {
        let public = PublicKey::from(&secret);
        Self {
            name: name.into(),
            secret,
            public,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(&self.public[..])
    }

    /// Signs the transaction digest and returns the hex encoded signature.
    pub fn sign(&self, transaction: &Transaction) -> Result<String> {
        let digest = transaction.digest()?;
        let message = Message::new(digest);
        let signature = Signature::sign(&self.secret, &message);
        Ok(hex::encode(&signature[..]))
    }
}

pub fn unlock_wallet(descriptor: &WalletDescriptor) -> Result<KeystoreSigner> {
    let prompt = format!("Enter password for wallet '{}': ", descriptor.name);
    let password = prompt_password(prompt).wrap_err("Failed to read wallet password")?;
    signer_from_keystore(descriptor, &password)
}

pub fn signer_from_keystore(
    descriptor: &WalletDescriptor,
    password: &str,
) -> Result<KeystoreSigner> {
    let secret = decrypt_key(&descriptor.path, password.as_bytes())
        .map_err(|_| eyre!("Invalid password for wallet '{}'", descriptor.name))?;

    if let Ok(secret_key) = SecretKey::try_from(secret.as_slice()) {
        return Ok(KeystoreSigner::new(descriptor.name.clone(), secret_key));
    }

    if let Ok(mnemonic) = std::str::from_utf8(&secret) {
        let word_count = mnemonic.split_whitespace().count();
        if word_count >= 12 {
            let secret_key =
                SecretKey::new_from_mnemonic_phrase_with_path(mnemonic, DERIVATION_PATH)
                    .map_err(|e| {
                        eyre!(
                            "Failed to derive key for wallet '{}': {e:?}",
                            descriptor.name
                        )
                    })?;
            return Ok(KeystoreSigner::new(descriptor.name.clone(), secret_key));
        }
    }

    Err(eyre!(
        "Wallet '{}' contained unsupported key material",
        descriptor.name
    ))
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::{
        game::Side,
        transaction::GameContract,
    };
    use tempdir::TempDir;

    fn contract() -> GameContract {
        GameContract {
            package: "0x1".parse().unwrap(),
            module: "coin_flip".to_string(),
            game_object: "0x2".parse().unwrap(),
            random_object: "0x8".parse().unwrap(),
        }
    }

    #[test]
    fn list_wallets__returns_sorted_wallet_files_only() {
        // given
        let dir = TempDir::new("wallets").unwrap();
        fs::write(dir.path().join("zed.wallet"), "{}").unwrap();
        fs::write(dir.path().join("amy.wallet"), "{}").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();
        fs::create_dir(dir.path().join("nested.wallet")).unwrap();

        // when
        let wallets = list_wallets(dir.path()).unwrap();

        // then
        let names: Vec<_> = wallets.iter().map(|w| w.name.as_str()).collect();
        assert_eq!(names, vec!["amy", "zed"]);
    }

    #[test]
    fn list_wallets__missing_dir_is_empty() {
        let wallets = list_wallets(Path::new("/definitely/not/here")).unwrap();
        assert!(wallets.is_empty());
    }

    #[test]
    fn find_wallet__errors_on_unknown_name() {
        let dir = TempDir::new("wallets").unwrap();
        let err = find_wallet(dir.path(), "ghost").unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn resolve_wallet_dir__expands_tilde() {
        let home = std::env::var("HOME").unwrap();
        let dir = resolve_wallet_dir(Some("~/keys")).unwrap();
        assert_eq!(dir, PathBuf::from(home).join("keys"));
    }

    #[test]
    fn keystore_signer__signature_depends_on_transaction() {
        // given
        let secret = SecretKey::try_from([7u8; 32].as_slice()).unwrap();
        let signer = KeystoreSigner::new("alice", secret);

        // when
        let heads = signer.sign(&contract().play(Side::Heads)).unwrap();
        let tails = signer.sign(&contract().play(Side::Tails)).unwrap();

        // then
        assert_eq!(heads.len(), 128);
        assert_ne!(heads, tails);
        assert_eq!(signer.public_key_hex().len(), 128);
    }

    #[tokio::test]
    async fn offline_wallet__acknowledges_with_transaction_digest() {
        // given
        let wallet = OfflineWallet::connected();
        let tx = contract().claim();

        // when
        let ack = wallet.sign_and_execute(&tx).await.unwrap();

        // then
        assert_eq!(ack.digest, tx.digest_hex().unwrap());
    }

    #[tokio::test]
    async fn offline_wallet__refuses_when_disconnected() {
        let mut wallet = OfflineWallet::connected();
        wallet.disconnect();
        assert!(!wallet.is_connected());
        assert!(wallet.sign_and_execute(&contract().claim()).await.is_err());
    }
}
