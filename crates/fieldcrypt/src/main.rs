//! `fieldcrypt` — encrypt and decrypt customer address envelopes.
//!
//! Startup sequence:
//! 1. Parse the command line.
//! 2. Build the codec against an empty [`SecretCell`].
//! 3. Load and validate [`Config`] from environment variables.
//! 4. Initialise structured logging.
//! 5. Populate the secret cell; the codec derives its key on first use.
//! 6. Run the requested command.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use common::CustomerAddress;
use fieldcrypt::config::Config;
use fieldcrypt::crypto::{describe_envelope, hex_decode};
use fieldcrypt::{telemetry, FieldCodec, SecretCell};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "fieldcrypt", version, about = "Field-level encryption of customer addresses")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Encrypt an address given as JSON and print the hex envelope.
    Encrypt {
        /// Address JSON, e.g. '{"street":"Main St","city":"Springfield"}'.
        json: String,
    },
    /// Decrypt a hex envelope and print the address as JSON.
    Decrypt {
        /// Identity to attach to the decrypted address.
        #[arg(long)]
        id: i64,
        /// Hex envelope as stored in the address column.
        hex: String,
    },
    /// Show the IV and ciphertext blocks of a hex envelope without decrypting it.
    Inspect {
        /// Hex envelope as stored in the address column.
        hex: String,
    },
}

fn main() -> Result<()> {
    // -----------------------------------------------------------------------
    // 1. Command line
    // -----------------------------------------------------------------------
    let cli = Cli::parse();

    // -----------------------------------------------------------------------
    // 2. Codec (secret not yet available)
    // -----------------------------------------------------------------------
    let secret_cell = SecretCell::new();
    let codec: FieldCodec<CustomerAddress> = FieldCodec::new(Arc::new(secret_cell.clone()));

    // -----------------------------------------------------------------------
    // 3. Configuration
    // -----------------------------------------------------------------------
    let cfg = Config::from_env().map_err(|e| {
        // Logging is not yet up; write to stderr directly.
        eprintln!("ERROR: configuration invalid: {e}");
        e
    })?;

    // -----------------------------------------------------------------------
    // 4. Telemetry
    // -----------------------------------------------------------------------
    telemetry::init(&cfg.log_level)?;
    info!(version = env!("CARGO_PKG_VERSION"), "fieldcrypt starting");

    // -----------------------------------------------------------------------
    // 5. Secret
    // -----------------------------------------------------------------------
    secret_cell.set(cfg.secret()?)?;

    // -----------------------------------------------------------------------
    // 6. Command
    // -----------------------------------------------------------------------
    match cli.command {
        Command::Encrypt { json } => {
            let address: Option<CustomerAddress> =
                serde_json::from_str(&json).context("address is not valid JSON")?;
            match codec.encrypt_object(address.as_ref())? {
                Some(hex) => println!("{hex}"),
                None => println!("null"),
            }
        }
        Command::Decrypt { id, hex } => {
            let address = codec.decrypt_object(id, None, Some(&hex));
            if address.is_none() {
                info!(id, "no address recovered from envelope");
            }
            let out = serde_json::json!({ "id": id, "address": address });
            println!("{out}");
        }
        Command::Inspect { hex } => {
            let envelope = hex_decode(&hex).context("envelope is not valid hex")?;
            println!("{}", describe_envelope(&envelope)?);
        }
    }

    Ok(())
}
