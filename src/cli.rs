use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "lanfeed", version, about = "Browse, cache and stream media from SMB network shares")]
pub struct Cli {
    /// Configuration file (defaults to the platform config directory).
    #[arg(long, global = true, env = "LANFEED_CONFIG")]
    pub config: Option<PathBuf>,
    /// User for ad-hoc hosts; guest access when omitted.
    #[arg(long, short = 'u', global = true)]
    pub username: Option<String>,
    #[arg(long, global = true, env = "LANFEED_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
    #[arg(long, global = true)]
    pub domain: Option<String>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    #[command(flatten)]
    Network(NetworkCommand),
    /// Inspect or empty the local cache.
    Cache {
        #[command(subcommand)]
        command: CacheCommand,
    },
}

/// Commands that talk to SMB servers.
#[derive(Debug, Subcommand)]
pub enum NetworkCommand {
    /// Report which SMB protocol generation a server speaks.
    Detect { host: String },
    /// List the shares a server offers.
    Shares { host: String },
    /// List one folder of a share.
    Browse {
        host: String,
        share: String,
        #[arg(default_value = "")]
        path: String,
    },
    /// List the media files of a configured source.
    List {
        source: String,
        /// Also cache small images and print what each item resolves to.
        #[arg(long)]
        resolve: bool,
    },
    /// Download a `smb-cache://` marker into the cache and print its path.
    Fetch { marker: String },
}

#[derive(Debug, Subcommand)]
pub enum CacheCommand {
    Stats,
    Clear,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_browse_path_defaults_to_share_root() {
        let cli = Cli::try_parse_from(["lanfeed", "browse", "nas", "media"]).unwrap();
        let Command::Network(NetworkCommand::Browse { host, share, path }) = cli.command else {
            panic!("expected browse");
        };
        assert_eq!((host.as_str(), share.as_str(), path.as_str()), ("nas", "media", ""));
    }

    #[test]
    fn test_cache_and_network_commands_are_disjoint() {
        let cli = Cli::try_parse_from(["lanfeed", "cache", "stats"]).unwrap();
        assert!(matches!(cli.command, Command::Cache { command: CacheCommand::Stats }));
        let cli = Cli::try_parse_from(["lanfeed", "detect", "nas"]).unwrap();
        assert!(matches!(cli.command, Command::Network(NetworkCommand::Detect { .. })));
    }

    #[test]
    fn test_global_credentials_after_subcommand() {
        let cli = Cli::try_parse_from(["lanfeed", "shares", "nas", "-u", "alice", "--domain", "HOME"]).unwrap();
        assert_eq!(cli.username.as_deref(), Some("alice"));
        assert_eq!(cli.domain.as_deref(), Some("HOME"));
    }
}
