use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::lightning::LndConfig;

#[derive(Parser, Clone, Debug)]
#[command(name = "payhistd", about = "Lightning payment history daemon")]
pub struct Config {
    /// LND gRPC host.
    #[arg(long, env = "PAYHIST_LND_HOST", default_value = "localhost")]
    pub lnd_host: String,

    /// LND gRPC port.
    #[arg(long, env = "PAYHIST_LND_PORT", default_value_t = 10009)]
    pub lnd_port: u32,

    /// Path to LND's tls.cert.
    #[arg(long, env = "PAYHIST_LND_CERT")]
    pub lnd_cert: String,

    /// Path to an LND macaroon allowed to read payments and create invoices.
    #[arg(long, env = "PAYHIST_LND_MACAROON")]
    pub lnd_macaroon: String,

    /// Public key of the routing node; payments to it are withdrawals.
    #[arg(long, env = "PAYHIST_ROUTING_NODE_PUBKEY", default_value = "")]
    pub routing_node_pubkey: String,

    /// HTTP port to listen on.
    #[arg(long, default_value_t = 3030)]
    pub port: u16,

    /// Directory holding the history file (default: <data dir>/payhist).
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Copy the history file here after new payments are recorded.
    #[arg(long)]
    pub backup_dir: Option<PathBuf>,

    /// Delay between a new payment and its backup snapshot.
    #[arg(long, default_value_t = 2000)]
    pub backup_delay_ms: u64,

    /// How often to poll the node for readiness.
    #[arg(long, default_value_t = 30)]
    pub readiness_interval_secs: u64,
}

impl Config {
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("/tmp"))
                .join("payhist")
        })
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_dir().join("history.json")
    }

    pub fn backup_delay(&self) -> Duration {
        Duration::from_millis(self.backup_delay_ms)
    }

    pub fn readiness_interval(&self) -> Duration {
        Duration::from_secs(self.readiness_interval_secs.max(1))
    }

    pub fn lnd(&self) -> LndConfig {
        LndConfig {
            host: self.lnd_host.clone(),
            port: self.lnd_port,
            cert_path: self.lnd_cert.clone(),
            macaroon_path: self.lnd_macaroon.clone(),
        }
    }
}
