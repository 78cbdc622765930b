//! Biometric Vault - Demo CLI
//!
//! Drives the verify-only and encrypted-secret flows against a scripted
//! authenticator.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use biometric_vault::verify::{is_biometrics_available, request_verification};
use biometric_vault::{
    AuthEvent, FilePreferences, SessionConfig, SessionManager, SimulatedAuthenticator,
    SoftwareKeyStore, VerificationOutcome,
};

#[derive(Parser)]
#[command(name = "bio-vault")]
#[command(version = biometric_vault::VERSION)]
#[command(about = "Biometric Vault - biometric-gated encrypted secrets (demo)")]
struct Cli {
    /// Ciphertext store directory
    #[arg(short, long, default_value = "./biometric_store")]
    store: PathBuf,

    /// Session config (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify-only ceremony
    Verify {
        /// Ceremony events, e.g. "fail,success" or "fail,lockout"
        #[arg(long, default_value = "success")]
        script: String,
    },

    /// Encrypt data under a key name
    Encrypt {
        #[arg(short, long)]
        key: String,
        #[arg(short, long)]
        data: String,
        #[arg(long, default_value = "success")]
        script: String,
    },

    /// Decrypt the record stored for a key name.
    ///
    /// Keys live in this process only, so a record written by an earlier
    /// run reports the key as unavailable.
    Decrypt {
        #[arg(short, long)]
        key: String,
        #[arg(long, default_value = "success")]
        script: String,
    },

    /// Encrypt then decrypt within one process
    Roundtrip {
        #[arg(short, long)]
        key: String,
        #[arg(short, long)]
        data: String,
        #[arg(long, default_value = "success")]
        encrypt_script: String,
        #[arg(long, default_value = "success")]
        decrypt_script: String,
    },
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => SessionConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => SessionConfig::default(),
    };

    let auth = Arc::new(SimulatedAuthenticator::new());
    let store = cli.store;
    let open_session = |config: SessionConfig| -> anyhow::Result<SessionManager> {
        let prefs = Arc::new(
            FilePreferences::open(&store)
                .with_context(|| format!("opening store {}", store.display()))?,
        );
        let keys = Arc::new(SoftwareKeyStore::new());
        Ok(SessionManager::with_config(keys, prefs, auth.clone(), config))
    };

    match cli.command {
        Commands::Verify { script } => {
            if !is_biometrics_available(auth.as_ref(), config.verification_authenticators) {
                println!("Biometrics unavailable");
                return Ok(());
            }
            auth.push_script(AuthEvent::parse_script(&script)?);
            let outcome = request_verification(auth.as_ref(), &config.verification_prompt()).await;
            report(Some(outcome));
        }

        Commands::Encrypt { key, data, script } => {
            let mut session = open_session(config)?;
            auth.push_script(AuthEvent::parse_script(&script)?);
            report(Some(session.encrypt(&key, &data).await));
        }

        Commands::Decrypt { key, script } => {
            let mut session = open_session(config)?;
            auth.push_script(AuthEvent::parse_script(&script)?);
            report(session.decrypt(&key).await);
        }

        Commands::Roundtrip {
            key,
            data,
            encrypt_script,
            decrypt_script,
        } => {
            let mut session = open_session(config)?;
            auth.push_script(AuthEvent::parse_script(&encrypt_script)?);
            print!("encrypt: ");
            report(Some(session.encrypt(&key, &data).await));

            auth.push_script(AuthEvent::parse_script(&decrypt_script)?);
            print!("decrypt: ");
            report(session.decrypt(&key).await);
        }
    }

    Ok(())
}

fn report(outcome: Option<VerificationOutcome>) {
    match outcome {
        None => println!("No stored secret - nothing to do"),
        Some(VerificationOutcome::Success(None)) => println!("Success"),
        Some(VerificationOutcome::Success(Some(result))) => println!("Success: {:?}", result),
        Some(VerificationOutcome::Failure { is_locked: true }) => {
            println!("Failure: biometrics locked out")
        }
        Some(VerificationOutcome::Failure { is_locked: false }) => println!("Failure"),
        Some(VerificationOutcome::Error(message)) => println!("Error: {}", message),
    }
}
