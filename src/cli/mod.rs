//! # Command Line Interface
//!
//! Operator tooling around [`VaultIssuer`]: sign a CSR file, query Vault health, or
//! check an issuer configuration without contacting Vault.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use crate::config::{load_issuer_spec, IssuerConfig, IssuerSpec, TransportConfig};
use crate::observability::{init_logging, LoggingConfig};
use crate::secrets::{DirectorySecretStore, SecretStore};
use crate::utils::parse_go_duration;
use crate::vault::{CertificateSigner, SystemStatus, VaultIssuer};

/// Where mounted issuer secrets are looked up by default
pub const DEFAULT_SECRETS_DIR: &str = "/var/run/vault-issuer/secrets";

#[derive(Parser)]
#[command(name = crate::APP_NAME)]
#[command(about = "Sign certificate requests with a HashiCorp Vault PKI mount")]
#[command(version = crate::VERSION)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Issuer configuration file (YAML, TOML or JSON)
    #[arg(short, long)]
    pub config: PathBuf,

    /// Namespace secret references resolve in
    #[arg(long, default_value = "default")]
    pub namespace: String,

    /// Root of the mounted secrets tree (<dir>/<namespace>/<name>/<key>)
    #[arg(long, default_value = DEFAULT_SECRETS_DIR)]
    pub secrets_dir: PathBuf,

    /// PEM file with the CA certificates to trust for Vault, replacing `ca_bundle`
    #[arg(long)]
    pub ca_bundle: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Log as JSON lines
    #[arg(long)]
    pub log_json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign a PEM encoded CSR
    Sign {
        /// CSR file
        #[arg(long)]
        csr: PathBuf,

        /// Requested validity in Go duration syntax
        #[arg(long, default_value = "2160h")]
        duration: String,

        /// Write the certificate chain here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,

        /// Write the issuing CA here
        #[arg(long)]
        ca_out: Option<PathBuf>,
    },

    /// Print Vault's sys/health status
    Health,

    /// Validate the issuer configuration without contacting Vault
    Check,
}

/// Run the CLI
pub async fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(&LoggingConfig::for_verbosity(cli.verbose, cli.log_json));

    let spec = load_spec(&cli).await?;

    match cli.command {
        Commands::Sign { csr, duration, out, ca_out } => {
            let duration = parse_go_duration(&duration)?;
            let csr_pem = tokio::fs::read(&csr)
                .await
                .with_context(|| format!("failed to read CSR from {}", csr.display()))?;

            let issuer = connect(&cli.namespace, &spec, &cli.secrets_dir).await?;
            let signed = issuer.sign(&csr_pem, duration).await?;

            write_pem(out.as_deref(), &signed.chain_pem).await?;

            if let Some(ca_out) = ca_out {
                match &signed.ca_pem {
                    Some(ca_pem) => write_pem(Some(ca_out.as_path()), ca_pem).await?,
                    None => {
                        warn!(path = %ca_out.display(), "Vault returned no CA certificate")
                    }
                }
            }
        }

        Commands::Health => {
            let issuer = connect(&cli.namespace, &spec, &cli.secrets_dir).await?;
            let health = issuer.health().await?;

            println!("{}", serde_json::to_string_pretty(&health)?);

            if !health.is_ready() {
                bail!(
                    "Vault is not ready (initialized: {}, sealed: {})",
                    health.initialized,
                    health.sealed
                );
            }
        }

        Commands::Check => {
            let config = IssuerConfig::from_spec(&cli.namespace, &spec)?;
            let transport = TransportConfig::build(&config)?;

            println!("Issuer configuration is valid");
            println!("  server:      {}", config.server);
            println!("  mount path:  {}", config.mount_path);
            println!("  auth method: {}", config.auth.method());
            println!("  custom CA:   {}", transport.uses_custom_roots());
        }
    }

    Ok(())
}

async fn load_spec(cli: &Cli) -> anyhow::Result<IssuerSpec> {
    let mut spec = load_issuer_spec(&cli.config)?;

    if let Some(path) = &cli.ca_bundle {
        let bundle = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read CA bundle from {}", path.display()))?;
        spec.ca_bundle = Some(bundle);
    }

    Ok(spec)
}

async fn connect(
    namespace: &str,
    spec: &IssuerSpec,
    secrets_dir: &Path,
) -> anyhow::Result<VaultIssuer> {
    let store: Arc<dyn SecretStore> = Arc::new(DirectorySecretStore::new(secrets_dir));

    let issuer = VaultIssuer::from_spec(namespace, spec, store)
        .await
        .context("failed to initialise Vault issuer")?;

    info!(server = %issuer.address(), "Connected to Vault");
    Ok(issuer)
}

async fn write_pem(path: Option<&Path>, pem: &[u8]) -> anyhow::Result<()> {
    let mut contents = pem.to_vec();
    if !contents.ends_with(b"\n") {
        contents.push(b'\n');
    }

    match path {
        Some(path) => tokio::fs::write(path, &contents)
            .await
            .with_context(|| format!("failed to write {}", path.display())),
        None => {
            print!("{}", String::from_utf8_lossy(&contents));
            Ok(())
        }
    }
}
