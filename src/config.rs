use crate::store::s3::S3Settings;
use anyhow::{Context, Result, bail};
use clap::Parser;
use std::{env, time::Duration};

/// Longest presign validity S3 accepts (7 days).
const MAX_PRESIGN_EXPIRY_SECS: u64 = 7 * 24 * 60 * 60;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub force_path_style: bool,
    pub presign_expiry: Duration,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("access_key_id", &self.access_key_id.as_ref().map(|_| "<redacted>"))
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "<redacted>"),
            )
            .field("force_path_style", &self.force_path_style)
            .field("presign_expiry", &self.presign_expiry)
            .finish()
    }
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Multipart upload companion for S3")]
pub struct Args {
    /// Host to bind to (overrides COMPANION_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides COMPANION_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Target bucket (overrides COMPANION_AWS_BUCKET)
    #[arg(long)]
    pub bucket: Option<String>,

    /// Bucket region (overrides COMPANION_AWS_REGION)
    #[arg(long)]
    pub region: Option<String>,

    /// Custom S3-compatible endpoint (overrides COMPANION_AWS_ENDPOINT)
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Use path-style bucket addressing (or COMPANION_AWS_FORCE_PATH_STYLE=true)
    #[arg(long)]
    pub force_path_style: bool,

    /// Lifetime of presigned part URLs (overrides COMPANION_PRESIGN_EXPIRY_SECS)
    #[arg(long)]
    pub presign_expiry_secs: Option<u64>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        let args = Args::parse();
        Self::resolve(args, |name| env::var(name).ok())
    }

    /// Merge CLI args over values produced by `lookup` (normally the process env).
    pub fn resolve(args: Args, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env_or = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let port = match args.port {
            Some(port) => port,
            None => match env_or("COMPANION_PORT") {
                Some(value) => value
                    .parse::<u16>()
                    .with_context(|| format!("parsing COMPANION_PORT value `{}`", value))?,
                None => 3001,
            },
        };

        let bucket = args
            .bucket
            .or_else(|| env_or("COMPANION_AWS_BUCKET"))
            .context("a bucket is required: pass --bucket or set COMPANION_AWS_BUCKET")?;

        let access_key_id = env_or("COMPANION_AWS_KEY");
        let secret_access_key = env_or("COMPANION_AWS_SECRET");
        if access_key_id.is_some() != secret_access_key.is_some() {
            bail!("COMPANION_AWS_KEY and COMPANION_AWS_SECRET must be set together");
        }

        let force_path_style = args.force_path_style
            || env_or("COMPANION_AWS_FORCE_PATH_STYLE")
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false);

        let expiry_secs = match args.presign_expiry_secs {
            Some(secs) => secs,
            None => match env_or("COMPANION_PRESIGN_EXPIRY_SECS") {
                Some(value) => value.parse::<u64>().with_context(|| {
                    format!("parsing COMPANION_PRESIGN_EXPIRY_SECS value `{}`", value)
                })?,
                None => 60,
            },
        };
        if !(1..=MAX_PRESIGN_EXPIRY_SECS).contains(&expiry_secs) {
            bail!(
                "presign expiry must be between 1 and {} seconds, got {}",
                MAX_PRESIGN_EXPIRY_SECS,
                expiry_secs
            );
        }

        Ok(Self {
            host: args
                .host
                .or_else(|| env_or("COMPANION_HOST"))
                .unwrap_or_else(|| "0.0.0.0".into()),
            port,
            bucket,
            region: args
                .region
                .or_else(|| env_or("COMPANION_AWS_REGION"))
                .unwrap_or_else(|| "us-east-1".into()),
            endpoint: args.endpoint.or_else(|| env_or("COMPANION_AWS_ENDPOINT")),
            access_key_id,
            secret_access_key,
            force_path_style,
            presign_expiry: Duration::from_secs(expiry_secs),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn s3_settings(&self) -> S3Settings {
        S3Settings {
            bucket: self.bucket.clone(),
            region: Some(self.region.clone()),
            endpoint: self.endpoint.clone(),
            access_key_id: self.access_key_id.clone(),
            secret_access_key: self.secret_access_key.clone(),
            force_path_style: self.force_path_style,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_only_bucket_is_set() {
        let cfg =
            AppConfig::resolve(Args::default(), lookup(&[("COMPANION_AWS_BUCKET", "uploads")]))
                .unwrap();
        assert_eq!(cfg.addr(), "0.0.0.0:3001");
        assert_eq!(cfg.bucket, "uploads");
        assert_eq!(cfg.region, "us-east-1");
        assert_eq!(cfg.presign_expiry, Duration::from_secs(60));
        assert!(!cfg.force_path_style);
        assert!(cfg.access_key_id.is_none());
    }

    #[test]
    fn args_override_environment() {
        let args = Args {
            port: Some(8080),
            bucket: Some("from-args".into()),
            presign_expiry_secs: Some(300),
            ..Args::default()
        };
        let cfg = AppConfig::resolve(
            args,
            lookup(&[
                ("COMPANION_PORT", "9000"),
                ("COMPANION_AWS_BUCKET", "from-env"),
                ("COMPANION_AWS_REGION", "eu-central-1"),
                ("COMPANION_AWS_FORCE_PATH_STYLE", "true"),
            ]),
        )
        .unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.bucket, "from-args");
        assert_eq!(cfg.region, "eu-central-1");
        assert_eq!(cfg.presign_expiry, Duration::from_secs(300));
        assert!(cfg.force_path_style);
    }

    #[test]
    fn missing_bucket_is_an_error() {
        assert!(AppConfig::resolve(Args::default(), lookup(&[])).is_err());
    }

    #[test]
    fn credentials_must_come_in_pairs() {
        let err = AppConfig::resolve(
            Args::default(),
            lookup(&[("COMPANION_AWS_BUCKET", "b"), ("COMPANION_AWS_KEY", "id")]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("set together"));
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        let vars = [("COMPANION_AWS_BUCKET", "b"), ("COMPANION_PORT", "http")];
        assert!(AppConfig::resolve(Args::default(), lookup(&vars)).is_err());

        let vars = [("COMPANION_AWS_BUCKET", "b"), ("COMPANION_PRESIGN_EXPIRY_SECS", "0")];
        assert!(AppConfig::resolve(Args::default(), lookup(&vars)).is_err());
    }

    #[test]
    fn debug_output_hides_secrets() {
        let cfg = AppConfig::resolve(
            Args::default(),
            lookup(&[
                ("COMPANION_AWS_BUCKET", "b"),
                ("COMPANION_AWS_KEY", "AKIDEXAMPLE"),
                ("COMPANION_AWS_SECRET", "wJalrXUtnFEMI"),
            ]),
        )
        .unwrap();
        let rendered = format!("{:?}", cfg);
        assert!(!rendered.contains("AKIDEXAMPLE"));
        assert!(!rendered.contains("wJalrXUtnFEMI"));
    }
}
