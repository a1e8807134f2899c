mod cli;

use crate::cli::{CacheCommand, Cli, Command, NetworkCommand};
use clap::Parser;
use lanfeed_cache::CacheStore;
use lanfeed_config::Config;
use lanfeed_library::{CacheMarker, MediaService, PlayableReference};
use lanfeed_smb::transport::MountedTransport;
use lanfeed_smb::{BrowseItem, Credentials, ServerEndpoint};
use miette::miette;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cli_credentials = credentials(&cli);
    let config = Config::load(cli.config.as_deref()).map_err(report)?;
    let location = config.cache.location().map_err(report)?;
    let store = CacheStore::new(&location, config.cache.settings()).map_err(report)?;

    let command = match cli.command {
        Command::Cache { command } => return cache(&store, command).await,
        Command::Network(command) => command,
    };

    let Some(mount_root) = &config.network.mount_root else {
        return Err(miette!(help = "set `network.mount_root` in lanfeed.toml", "no share mount root configured"));
    };
    let transport = MountedTransport::new("mounted", mount_root).map_err(report)?;
    let service = MediaService::new(Arc::new(transport), store, config.network.timeouts());
    let session = Session { cli_credentials, config: &config, service: &service };

    tokio::select! {
        result = session.run(command) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("interrupted, ending browse session");
            service.shutdown().await.map_err(report)?;
            Err(miette!("interrupted"))
        },
    }
}

/// Credentials given on the command line, if any were.
fn credentials(cli: &Cli) -> Option<Credentials> {
    match (&cli.username, &cli.password, &cli.domain) {
        (None, None, None) => None,
        (username, password, domain) => {
            Some(Credentials::new(domain.as_deref(), username.as_deref(), password.as_deref()))
        },
    }
}

fn report<E>(err: exn::Exn<E>) -> miette::Report
where
    E: std::error::Error + Send + Sync + 'static,
{
    miette!("{err:?}")
}

async fn cache(store: &CacheStore, command: CacheCommand) -> miette::Result<()> {
    match command {
        CacheCommand::Stats => {
            let usage = store.usage().await.map_err(report)?;
            println!("{}: {} files, {} bytes", store.root().display(), usage.files, usage.bytes);
        },
        CacheCommand::Clear => {
            let removed = store.clear_all().await.map_err(report)?;
            println!("removed {removed} files");
        },
    }
    Ok(())
}

struct Session<'a> {
    cli_credentials: Option<Credentials>,
    config: &'a Config,
    service: &'a MediaService,
}
impl Session<'_> {
    /// Endpoint for an ad-hoc host: command-line credentials win, then those
    /// of a configured source on the same host, then guest.
    fn endpoint(&self, host: &str) -> miette::Result<ServerEndpoint> {
        let endpoint = ServerEndpoint::new(host).map_err(report)?;
        if let Some(credentials) = &self.cli_credentials {
            return Ok(endpoint.with_credentials(credentials.clone()));
        }
        let configured = self
            .config
            .sources
            .iter()
            .filter_map(|source| source.endpoint().ok())
            .find(|configured| configured.host().eq_ignore_ascii_case(endpoint.host()));
        Ok(configured.unwrap_or(endpoint))
    }

    async fn run(&self, command: NetworkCommand) -> miette::Result<()> {
        match command {
            NetworkCommand::Detect { host } => {
                let endpoint = self.endpoint(&host)?;
                println!("{}: {}", endpoint.host(), self.service.detect_protocol(&endpoint).await);
            },
            NetworkCommand::Shares { host } => {
                for share in self.service.list_shares(&self.endpoint(&host)?).await {
                    match share.is_accessible {
                        true => println!("{}", share.name),
                        false => println!("({})", share.name),
                    }
                }
            },
            NetworkCommand::Browse { host, share, path } => {
                let items = self.service.browse(&self.endpoint(&host)?, &share, &path).await.map_err(report)?;
                for item in &items {
                    match item {
                        BrowseItem::Entry(entry) if entry.is_directory => println!("{}/", entry.name),
                        item => println!("{}", item.label()),
                    }
                }
            },
            NetworkCommand::List { source, resolve } => {
                let source = self.config.source(&source).map_err(report)?;
                let media = self.service.list_media(&source).await.map_err(report)?;
                if !resolve {
                    for item in &media {
                        println!("{}\t{}\t{}", item.kind, item.size_bytes, item.source_identity);
                    }
                    return Ok(());
                }
                let resolved = self.service.resolve_all(&media).await;
                for (item, reference) in media.iter().zip(&resolved) {
                    let target = match reference {
                        PlayableReference::Local(path) => path.display().to_string(),
                        PlayableReference::Deferred(marker) => marker.to_string(),
                        PlayableReference::Placeholder => "-".to_string(),
                        PlayableReference::Remote(url) => url.clone(),
                    };
                    println!("{}\t{target}", item.display_name);
                }
            },
            NetworkCommand::Fetch { marker } => {
                let marker: CacheMarker = marker.parse().map_err(report)?;
                match self.service.materialize(&marker).await {
                    Some(path) => println!("{}", path.display()),
                    None => return Err(miette!("could not fetch {marker}")),
                }
            },
        }
        Ok(())
    }
}
