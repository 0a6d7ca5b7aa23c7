use anyhow::{Context, Result};
use chrono::FixedOffset;
use clap::Parser;
use serde::Deserialize;
use serde_yaml;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "hypobackup")]
#[command(about = "Mirrors Hypothesis annotations into local markdown files", long_about = None)]
pub struct Cli {
    #[arg(short = 'c', long = "config")]
    pub config_path: Option<String>,

    /// Ignore the saved sync state and resync everything
    #[arg(long)]
    pub reset: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json: bool,
}

pub fn default_config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".hypobackup")
}

pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.yaml")
}

#[derive(Debug, Deserialize, Clone)]
pub struct Hypothesis {
    pub user: String,
    pub token: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_page_limit")]
    pub page_limit: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_min_delay")]
    pub retry_min_delay_secs: u64,
    #[serde(default = "default_retry_max_delay")]
    pub retry_max_delay_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_api_url() -> String {
    "https://api.hypothes.is/api".to_string()
}

fn default_page_limit() -> u32 {
    200
}

fn default_max_retries() -> u32 {
    10
}

fn default_retry_min_delay() -> u64 {
    2
}

fn default_retry_max_delay() -> u64 {
    9
}

fn default_request_timeout() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct Backup {
    dir: PathBuf,
    #[serde(default = "default_state_file")]
    state_file: PathBuf,
    /// Offset used for header times. Defaults to Asia/Shanghai, which has
    /// kept a fixed +08:00 with no DST since 1991.
    #[serde(default = "default_utc_offset")]
    utc_offset: String,
}

fn default_state_file() -> PathBuf {
    PathBuf::from("sync_info.json")
}

fn default_utc_offset() -> String {
    "+08:00".to_string()
}

impl Backup {
    pub fn get_dir(&self) -> &Path {
        &self.dir
    }

    /// Relative state paths live inside the backup directory.
    pub fn get_state_path(&self) -> PathBuf {
        if self.state_file.is_absolute() {
            self.state_file.clone()
        } else {
            self.dir.join(&self.state_file)
        }
    }

    pub fn get_utc_offset(&self) -> Result<FixedOffset> {
        self.utc_offset
            .parse::<FixedOffset>()
            .map_err(|e| anyhow::anyhow!("invalid utc_offset {:?}: {}", self.utc_offset, e))
    }
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub hypothesis: Hypothesis,
    pub backup: Backup,
}

impl Config {
    pub fn new(path: &str) -> Result<Self> {
        let cfg = Config::load_config(path)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn load_config(path: &str) -> Result<Config> {
        let yaml_str =
            fs::read_to_string(path).with_context(|| format!("failed to read {}", path))?;
        Config::parse(&yaml_str)
    }

    fn parse(yaml_str: &str) -> Result<Config> {
        let yaml_with_env = Config::substitute_env_vars(yaml_str)?;
        let config: Config = serde_yaml::from_str(&yaml_with_env)?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let h = &self.hypothesis;
        if h.user.trim().is_empty() {
            anyhow::bail!("hypothesis.user must be set");
        }
        if h.token.trim().is_empty() {
            anyhow::bail!("hypothesis.token must be set");
        }
        if h.page_limit == 0 {
            anyhow::bail!("hypothesis.page_limit must be greater than zero");
        }
        if h.max_retries == 0 {
            anyhow::bail!("hypothesis.max_retries must be greater than zero");
        }
        if h.retry_min_delay_secs > h.retry_max_delay_secs {
            anyhow::bail!(
                "hypothesis.retry_min_delay_secs ({}) exceeds retry_max_delay_secs ({})",
                h.retry_min_delay_secs,
                h.retry_max_delay_secs
            );
        }
        if self.backup.dir.as_os_str().is_empty() {
            anyhow::bail!("backup.dir must be set");
        }
        self.backup.get_utc_offset()?;
        Ok(())
    }

    fn substitute_env_vars(yaml_str: &str) -> Result<String> {
        let mut result = yaml_str.to_string();
        let mut offset = 0;

        while let Some(start) = result[offset..].find("${") {
            let actual_start = offset + start;
            if let Some(end) = result[actual_start..].find("}") {
                let var_name = &result[actual_start + 2..actual_start + end];

                // ${VAR:-default}
                let env_value = if let Some(default_start) = var_name.find(":-") {
                    let actual_var = &var_name[..default_start];
                    let default_val = &var_name[default_start + 2..];
                    env::var(actual_var).unwrap_or_else(|_| default_val.to_string())
                } else {
                    env::var(var_name).unwrap_or_else(|_| {
                        tracing::warn!("environment variable '{}' not found", var_name);
                        String::new()
                    })
                };

                result.replace_range(actual_start..actual_start + end + 1, &env_value);
                offset = actual_start + env_value.len();
            } else {
                break;
            }
        }

        Ok(result)
    }
}
