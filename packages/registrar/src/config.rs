//! Run configuration
//!
//! Paths come from CLI flags with environment fallbacks; the signing key only
//! ever comes from the environment (`SIGNER`, optionally via `.env`).

use eyre::{eyre, Result, WrapErr};
use helix_chain::evm::address_from_key;
use helix_chain::Redacted;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for one registrar run
#[derive(Debug, Clone)]
pub struct Config {
    pub datadir: PathBuf,
    pub definition_path: PathBuf,
    pub lock_dir: PathBuf,
    pub signer: Option<Redacted<String>>,
    pub http_timeout: Duration,
}

fn default_http_timeout_secs() -> u64 {
    30
}

impl Config {
    /// Resolve configuration; flags win over environment variables
    pub fn load(datadir: Option<PathBuf>, definition: Option<PathBuf>) -> Result<Self> {
        let datadir = datadir
            .or_else(|| env::var("HELIX_DATADIR").ok().map(PathBuf::from))
            .ok_or_else(|| {
                eyre!("missing datadir, please add --datadir=/path/to/data or set HELIX_DATADIR")
            })?;

        let definition_path = definition
            .or_else(|| env::var("HELIX_DEFINITION").ok().map(PathBuf::from))
            .unwrap_or_else(|| datadir.join("definition.yml"));

        let lock_dir = env::var("HELIX_LOCK_DIR")
            .ok()
            .map(PathBuf::from)
            .unwrap_or_else(|| datadir.join("lock"));

        let signer = env::var("SIGNER")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(Redacted);

        let http_timeout = match env::var("HELIX_HTTP_TIMEOUT_SECS") {
            Ok(v) => v
                .parse()
                .wrap_err("HELIX_HTTP_TIMEOUT_SECS must be a valid u64")?,
            Err(_) => default_http_timeout_secs(),
        };

        Ok(Self {
            datadir,
            definition_path,
            lock_dir,
            signer,
            http_timeout: Duration::from_secs(http_timeout),
        })
    }

    /// Pre-flight checks before any chain interaction
    pub fn validate(&self) -> Result<()> {
        if !self.datadir.is_dir() {
            return Err(eyre!("the datadir [{}] not exists", self.datadir.display()));
        }
        if !self.definition_path.is_file() {
            return Err(eyre!(
                "definition file [{}] not exists",
                self.definition_path.display()
            ));
        }
        address_from_key(self.signer_key()?).wrap_err("SIGNER is not a valid private key")?;
        Ok(())
    }

    pub fn signer_key(&self) -> Result<&str> {
        self.signer
            .as_ref()
            .map(|s| s.expose().as_str())
            .ok_or_else(|| eyre!("missing signer, please set SIGNER"))
    }
}
