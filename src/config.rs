use crate::assets::manager::DEFAULT_STORE_TIMEOUT;
use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use std::{env, fmt, time::Duration};

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_ttl: Duration,
    pub assets: AssetStoreConfig,
    pub upload_timeout: Duration,
}

/// Where product images are stored.
#[derive(Debug, Clone)]
pub enum AssetStoreConfig {
    R2(R2Settings),
    Disk {
        storage_dir: String,
        public_domain: String,
    },
}

impl AssetStoreConfig {
    pub fn public_domain(&self) -> &str {
        match self {
            AssetStoreConfig::R2(settings) => &settings.public_domain,
            AssetStoreConfig::Disk { public_domain, .. } => public_domain,
        }
    }
}

#[derive(Clone)]
pub struct R2Settings {
    pub account_id: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket: String,
    pub public_domain: String,
}

impl R2Settings {
    pub fn endpoint(&self) -> String {
        format!("https://{}.r2.cloudflarestorage.com", self.account_id)
    }
}

// Keep credentials out of the startup log line.
impl fmt::Debug for R2Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("R2Settings")
            .field("account_id", &self.account_id)
            .field("access_key_id", &format!("<{} chars>", self.access_key_id.len()))
            .field("secret_access_key", &"<redacted>")
            .field("bucket", &self.bucket)
            .field("public_domain", &self.public_domain)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AssetBackend {
    R2,
    Disk,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Storefront catalogue and order API")]
pub struct Args {
    /// Host to bind to (overrides STOREFRONT_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides STOREFRONT_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides STOREFRONT_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Image storage backend (overrides STOREFRONT_ASSET_BACKEND)
    #[arg(long, value_enum)]
    pub asset_backend: Option<AssetBackend>,

    /// Directory for the disk backend (overrides STOREFRONT_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Per-call object store timeout (overrides STOREFRONT_UPLOAD_TIMEOUT_SECS)
    #[arg(long)]
    pub upload_timeout_secs: Option<u64>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

const SECS_PER_DAY: u64 = 24 * 60 * 60;

const R2_REQUIRED_VARS: [&str; 5] = [
    "R2_ACCOUNT_ID",
    "R2_ACCESS_KEY_ID",
    "R2_SECRET_ACCESS_KEY",
    "R2_BUCKET_NAME",
    "R2_PUBLIC_DOMAIN",
];

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        dotenv::dotenv().ok();
        let args = Args::parse();
        let migrate = args.migrate;
        let cfg = Self::from_sources(args, |key| env::var(key).ok())?;
        Ok((cfg, migrate))
    }

    /// Merge CLI args over values from `lookup`. Missing R2 variables are
    /// reported together.
    pub fn from_sources(args: Args, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let port = match args.port {
            Some(port) => port,
            None => parse_or("STOREFRONT_PORT", var("STOREFRONT_PORT"), 3000)?,
        };
        let upload_timeout_secs = match args.upload_timeout_secs {
            Some(secs) => secs,
            None => parse_or(
                "STOREFRONT_UPLOAD_TIMEOUT_SECS",
                var("STOREFRONT_UPLOAD_TIMEOUT_SECS"),
                DEFAULT_STORE_TIMEOUT.as_secs(),
            )?,
        };
        if upload_timeout_secs == 0 {
            bail!("upload timeout must be at least one second");
        }
        let jwt_ttl_days: u64 = parse_or("JWT_TTL_DAYS", var("JWT_TTL_DAYS"), 30)?;
        let Some(jwt_ttl_secs) = jwt_ttl_days
            .checked_mul(SECS_PER_DAY)
            .filter(|secs| i64::try_from(*secs).is_ok())
        else {
            bail!("JWT_TTL_DAYS value `{jwt_ttl_days}` is too large");
        };

        let backend = match args.asset_backend {
            Some(backend) => backend,
            None => match var("STOREFRONT_ASSET_BACKEND") {
                Some(value) => AssetBackend::from_str(&value, true)
                    .map_err(|err| anyhow::anyhow!(err))
                    .with_context(|| {
                        format!("parsing STOREFRONT_ASSET_BACKEND value `{value}`")
                    })?,
                None => AssetBackend::R2,
            },
        };

        let assets = match backend {
            AssetBackend::R2 => {
                let missing: Vec<&str> = R2_REQUIRED_VARS
                    .iter()
                    .copied()
                    .filter(|key| var(*key).is_none())
                    .collect();
                if !missing.is_empty() {
                    bail!(
                        "missing required environment variable(s): {}",
                        missing.join(", ")
                    );
                }
                let get = |key: &str| var(key).unwrap_or_default();
                AssetStoreConfig::R2(R2Settings {
                    account_id: get("R2_ACCOUNT_ID"),
                    access_key_id: get("R2_ACCESS_KEY_ID"),
                    secret_access_key: get("R2_SECRET_ACCESS_KEY"),
                    bucket: get("R2_BUCKET_NAME"),
                    public_domain: get("R2_PUBLIC_DOMAIN"),
                })
            }
            AssetBackend::Disk => AssetStoreConfig::Disk {
                storage_dir: args
                    .storage_dir
                    .or_else(|| var("STOREFRONT_STORAGE_DIR"))
                    .unwrap_or_else(|| "./data/uploads".into()),
                public_domain: var("STOREFRONT_PUBLIC_DOMAIN")
                    .unwrap_or_else(|| format!("http://localhost:{port}/uploads")),
            },
        };

        let jwt_secret =
            var("JWT_SECRET").context("missing required environment variable: JWT_SECRET")?;

        Ok(Self {
            host: args
                .host
                .or_else(|| var("STOREFRONT_HOST"))
                .unwrap_or_else(|| "0.0.0.0".into()),
            port,
            database_url: args
                .database_url
                .or_else(|| var("STOREFRONT_DATABASE_URL"))
                .unwrap_or_else(|| "sqlite://./data/storefront.db".into()),
            jwt_secret,
            jwt_ttl: Duration::from_secs(jwt_ttl_secs),
            assets,
            upload_timeout: Duration::from_secs(upload_timeout_secs),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T>(key: &str, value: Option<String>, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match value {
        Some(value) => value
            .trim()
            .parse::<T>()
            .with_context(|| format!("parsing {key} value `{value}`")),
        None => Ok(default),
    }
}
