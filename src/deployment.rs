use crate::transaction::{
    GameContract,
    ObjectId,
};
use chrono::Utc;
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fmt,
    fs,
    path::{
        Path,
        PathBuf,
    },
};

pub const DEPLOYMENTS_ROOT: &str = ".deployments";
const DEPLOYMENT_FILE: &str = "deployment.json";

pub const DEFAULT_DEVNET_RPC_URL: &str = "https://wallet-relay.devnet.catcoinflip.xyz";
pub const DEFAULT_TESTNET_RPC_URL: &str = "https://wallet-relay.testnet.catcoinflip.xyz";
pub const DEFAULT_LOCAL_RPC_URL: &str = "http://localhost:9000/";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeploymentEnv {
    Dev,
    Test,
    Local,
}

impl DeploymentEnv {
    pub const ALL: [DeploymentEnv; 3] =
        [DeploymentEnv::Dev, DeploymentEnv::Test, DeploymentEnv::Local];

    pub fn dir_name(self) -> &'static str {
        match self {
            DeploymentEnv::Dev => "dev",
            DeploymentEnv::Test => "test",
            DeploymentEnv::Local => "local",
        }
    }

    pub fn default_rpc_url(self) -> &'static str {
        match self {
            DeploymentEnv::Dev => DEFAULT_DEVNET_RPC_URL,
            DeploymentEnv::Test => DEFAULT_TESTNET_RPC_URL,
            DeploymentEnv::Local => DEFAULT_LOCAL_RPC_URL,
        }
    }
}

impl fmt::Display for DeploymentEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeploymentEnv::Dev => "Devnet",
            DeploymentEnv::Test => "Testnet",
            DeploymentEnv::Local => "Local",
        };
        write!(f, "{name}")
    }
}

fn default_module() -> String {
    String::from("coin_flip")
}

/// Where the coin flip contract lives on a given network.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct GameDeployment {
    pub deployed_at: String,
    pub package_id: String,
    #[serde(default = "default_module")]
    pub module: String,
    pub game_object_id: String,
    pub random_object_id: String,
    pub network_url: String,
    /// Text the relay includes in its error when the contract rejects a
    /// second claim from the same wallet.
    #[serde(default)]
    pub already_claimed_marker: Option<String>,
}

impl GameDeployment {
    /// Placeholder coordinates for playing without a chain.
    pub fn offline() -> Self {
        Self {
            deployed_at: Utc::now().to_rfc3339(),
            package_id: String::from("0x0"),
            module: default_module(),
            game_object_id: String::from("0x1"),
            random_object_id: String::from("0x8"),
            network_url: String::from("offline"),
            already_claimed_marker: None,
        }
    }

    pub fn contract(&self) -> Result<GameContract> {
        let package: ObjectId = self
            .package_id
            .parse()
            .wrap_err("Deployment record contains an invalid package id")?;
        let game_object: ObjectId = self
            .game_object_id
            .parse()
            .wrap_err("Deployment record contains an invalid game object id")?;
        let random_object: ObjectId = self
            .random_object_id
            .parse()
            .wrap_err("Deployment record contains an invalid random object id")?;
        if self.module.trim().is_empty() {
            return Err(eyre!("Deployment record is missing the module name"));
        }
        Ok(GameContract {
            package,
            module: self.module.clone(),
            game_object,
            random_object,
        })
    }
}

#[derive(Debug)]
pub struct DeploymentStore {
    env: DeploymentEnv,
    path: PathBuf,
}

impl DeploymentStore {
    pub fn new(env: DeploymentEnv) -> Result<Self> {
        Self::open(Path::new(DEPLOYMENTS_ROOT), env)
    }

    pub fn open(root: &Path, env: DeploymentEnv) -> Result<Self> {
        let path = ensure_store(root, env)?;
        Ok(Self { env, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<GameDeployment>> {
        read_record(&self.path)
    }

    pub fn save(&self, record: &GameDeployment) -> Result<()> {
        write_record(&self.path, record)
    }

    /// Loads the record or explains how to provide one.
    pub fn require(&self) -> Result<GameDeployment> {
        self.load()?.ok_or_else(|| {
            eyre!(
                "No coin flip deployment recorded for {}.\n\
                 Write one to {} with package_id, game_object_id, random_object_id and network_url,\n\
                 or start with --offline to play without a wallet relay.",
                self.env,
                self.path.display()
            )
        })
    }
}

pub fn ensure_structure(root: &Path) -> Result<()> {
    for env in DeploymentEnv::ALL {
        let _ = ensure_store(root, env)?;
    }
    Ok(())
}

fn ensure_store(root: &Path, env: DeploymentEnv) -> Result<PathBuf> {
    let env_dir = root.join(env.dir_name());
    if !env_dir.exists() {
        fs::create_dir_all(&env_dir).wrap_err_with(|| {
            format!("Failed to create {} directory", env_dir.display())
        })?;
    }

    let file_path = env_dir.join(DEPLOYMENT_FILE);
    if !file_path.exists() {
        fs::write(&file_path, b"").wrap_err_with(|| {
            format!(
                "Failed to create deployment record file for {} at {:?}",
                env, file_path
            )
        })?;
    }

    Ok(file_path)
}

fn read_record(path: impl AsRef<Path>) -> Result<Option<GameDeployment>> {
    let data = fs::read(path.as_ref()).wrap_err("Failed to read deployment record")?;
    if data.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    let record = serde_json::from_slice::<GameDeployment>(&data)
        .wrap_err("Failed to parse deployment record JSON")?;
    Ok(Some(record))
}

fn write_record(path: impl AsRef<Path>, record: &GameDeployment) -> Result<()> {
    let json = serde_json::to_vec_pretty(record)
        .wrap_err("Failed to serialize deployment record")?;
    fs::write(path.as_ref(), json).wrap_err("Failed to write deployment record")?;
    Ok(())
}
