//! Command-line interface definitions using clap

use clap::Parser;

use crate::config::StaticConfig;

/// Content-addressed URL shortener
#[derive(Parser, Debug, Default)]
#[command(name = "shortener")]
#[command(version)]
#[command(about = "A content-addressed URL shortener", long_about = None)]
pub struct Cli {
    /// HTTP listen address, e.g. 127.0.0.1:8080
    #[arg(short = 'a', long = "address")]
    pub address: Option<String>,

    /// Prefix for generated short URLs, e.g. https://sho.rt
    #[arg(short = 'b', long = "base-url")]
    pub base_url: Option<String>,

    /// Append-only log file used as storage
    #[arg(short = 'f', long = "file-storage-path")]
    pub file_storage_path: Option<String>,

    /// Database DSN (sqlite://, mysql://, postgres://)
    #[arg(short = 'd', long = "database-dsn")]
    pub database_url: Option<String>,

    /// Path to the TOML config file
    #[arg(short = 'c', long = "config")]
    pub config: Option<String>,

    /// CIDR allowed to read /api/internal/stats
    #[arg(short = 't', long = "trusted-subnet")]
    pub trusted_subnet: Option<String>,

    /// Print a sample config.toml and exit
    #[arg(long)]
    pub generate_config: bool,
}

impl Cli {
    /// 命令行参数覆盖配置文件和环境变量
    pub fn apply(&self, config: &mut StaticConfig) {
        if let Some(address) = &self.address {
            config.server.address = address.clone();
        }
        if let Some(base_url) = &self.base_url {
            config.server.base_url = Some(base_url.clone());
        }
        if let Some(path) = &self.file_storage_path {
            config.storage.file_storage_path = Some(path.clone());
        }
        if let Some(url) = &self.database_url {
            config.storage.database_url = Some(url.clone());
        }
        if let Some(subnet) = &self.trusted_subnet {
            config.server.trusted_subnet = Some(subnet.clone());
        }
    }
}
