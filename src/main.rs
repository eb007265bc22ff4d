use cat_coin_flip::{
    GameController,
    deployment::{
        DEPLOYMENTS_ROOT,
        DeploymentEnv,
        DeploymentStore,
        GameDeployment,
        ensure_structure,
    },
    rpc::RpcWallet,
    wallets::{
        self,
        OfflineWallet,
    },
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use std::{
    path::{
        Path,
        PathBuf,
    },
    sync::OnceLock,
};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::{
    EnvFilter,
    fmt,
};

mod app;
mod ui;

const DEFAULT_LOG_DIR: &str = "logs";
const LOG_FILE_PREFIX: &str = "cat-coin-flip.log";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

enum WalletMode {
    Offline,
    Keystore { name: String, dir: PathBuf },
}

struct AppConfig {
    env: DeploymentEnv,
    rpc_url: String,
    wallet: WalletMode,
    log_dir: PathBuf,
}

fn print_usage_and_exit() -> ! {
    println!(
        "Usage: cat-coin-flip [--devnet | --testnet | --local] [--rpc-url <url>]\n\
         [--wallet <name>] [--wallet-dir <path>] [--offline] [--log-dir <path>]\n\
         \n\
         Flags:\n\
           --devnet            Play against the devnet deployment (default relay {})\n\
           --testnet           Play against the testnet deployment (default relay {})\n\
           --local             Play against a local deployment (default relay {})\n\
           --rpc-url <url>     Override the wallet relay URL for the selected network\n\
           --wallet <name>     Keystore wallet used to sign transactions\n\
           --wallet-dir <path> Override the keystore directory (defaults to ~/.fuel/wallets)\n\
           --offline           Play without a chain; every transaction is acknowledged locally\n\
           --log-dir <path>    Directory for the rolling log file (defaults to ./{})",
        DeploymentEnv::Dev.default_rpc_url(),
        DeploymentEnv::Test.default_rpc_url(),
        DeploymentEnv::Local.default_rpc_url(),
        DEFAULT_LOG_DIR,
    );
    std::process::exit(0);
}

fn set_env(current: &mut Option<DeploymentEnv>, next: DeploymentEnv) -> Result<()> {
    if current.is_some() {
        return Err(eyre!(
            "Multiple network flags provided; choose one of --devnet/--testnet/--local"
        ));
    }
    *current = Some(next);
    Ok(())
}

fn parse_cli_args() -> Result<AppConfig> {
    let mut args = std::env::args().skip(1);
    let mut env: Option<DeploymentEnv> = None;
    let mut custom_url: Option<String> = None;
    let mut wallet_dir: Option<String> = None;
    let mut wallet_name: Option<String> = None;
    let mut offline = false;
    let mut log_dir: Option<String> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--devnet" => set_env(&mut env, DeploymentEnv::Dev)?,
            "--testnet" => set_env(&mut env, DeploymentEnv::Test)?,
            "--local" => set_env(&mut env, DeploymentEnv::Local)?,
            "--rpc-url" => {
                let url = args
                    .next()
                    .ok_or_else(|| eyre!("--rpc-url requires a URL argument"))?;
                if custom_url.is_some() {
                    return Err(eyre!("--rpc-url may only be specified once"));
                }
                if env.is_none() {
                    return Err(eyre!(
                        "--rpc-url must follow a network flag (--devnet/--testnet/--local)"
                    ));
                }
                custom_url = Some(url);
            }
            "--wallet-dir" => {
                let dir = args
                    .next()
                    .ok_or_else(|| eyre!("--wallet-dir requires a path argument"))?;
                if wallet_dir.is_some() {
                    return Err(eyre!("--wallet-dir may only be specified once"));
                }
                wallet_dir = Some(dir);
            }
            "--wallet" => {
                let name = args
                    .next()
                    .ok_or_else(|| eyre!("--wallet requires a wallet name"))?;
                if wallet_name.is_some() {
                    return Err(eyre!("--wallet may only be specified once"));
                }
                wallet_name = Some(name);
            }
            "--log-dir" => {
                let dir = args
                    .next()
                    .ok_or_else(|| eyre!("--log-dir requires a path argument"))?;
                log_dir = Some(dir);
            }
            "--offline" => offline = true,
            "--help" | "-h" => print_usage_and_exit(),
            other => return Err(eyre!("Unknown argument: {other}")),
        }
    }

    let log_dir = log_dir.as_deref().unwrap_or(DEFAULT_LOG_DIR);
    let log_dir = PathBuf::from(shellexpand::tilde(log_dir).into_owned());

    if offline {
        if wallet_name.is_some() {
            return Err(eyre!("--offline cannot be combined with --wallet"));
        }
        return Ok(AppConfig {
            env: env.unwrap_or(DeploymentEnv::Local),
            rpc_url: String::from("offline"),
            wallet: WalletMode::Offline,
            log_dir,
        });
    }

    let env = env.ok_or_else(|| {
        eyre!("Select a network with --devnet, --testnet, or --local (or pass --offline)")
    })?;
    let rpc_url = custom_url.unwrap_or_else(|| env.default_rpc_url().to_string());
    let name = wallet_name
        .ok_or_else(|| eyre!("Specify --wallet <name> to select a keystore wallet"))?;
    let dir = wallets::resolve_wallet_dir(wallet_dir.as_deref())?;

    Ok(AppConfig {
        env,
        rpc_url,
        wallet: WalletMode::Keystore { name, dir },
        log_dir,
    })
}

fn init_tracing(log_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(log_dir)
        .wrap_err_with(|| format!("Failed to create log directory {}", log_dir.display()))?;
    let appender = rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|e| eyre!("Failed to install log subscriber: {e}"))?;
    let _ = LOG_GUARD.set(guard);
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let config = parse_cli_args()?;
    init_tracing(&config.log_dir)?;
    tracing::info!(env = %config.env, relay = %config.rpc_url, "starting cat-coin-flip client");

    match config.wallet {
        WalletMode::Offline => {
            let controller =
                GameController::new(OfflineWallet::connected(), &GameDeployment::offline())?;
            app::run_app(controller).await
        }
        WalletMode::Keystore { name, dir } => {
            ensure_structure(Path::new(DEPLOYMENTS_ROOT))?;
            let deployment = DeploymentStore::new(config.env)?.require()?;
            let descriptor = wallets::find_wallet(&dir, &name)?;
            let signer = wallets::unlock_wallet(&descriptor)?;
            let wallet = RpcWallet::new(signer, &config.rpc_url)?;
            tracing::info!(
                wallet = %name,
                relay = %wallet.endpoint(),
                network = %deployment.network_url,
                "wallet unlocked"
            );
            let controller = GameController::new(wallet, &deployment)?;
            app::run_app(controller).await
        }
    }
}
