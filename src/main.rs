mod cloud;
mod helpers;
mod provider;

use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use cloud::Catalog;
use helpers::image_resolver::{ImageData, Resolution, resolve, select};
use helpers::pick_image;
use provider::{ApiClient, CatalogSource, ProviderConfig};

#[derive(Parser)]
#[command(name = "cloud-image-lookup")]
#[command(about = "Resolve a datacenter image from an os/code pair or a private image name")]
struct Cli {
    /// JSON file with api_url, api_client_id and api_secret
    /// (defaults to CLOUD_API_URL / CLOUD_API_CLIENT_ID / CLOUD_API_SECRET)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the provider API url
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve the inputs to a single image id
    Resolve(ResolveArgs),
    /// Print the public images of a datacenter
    List {
        /// Datacenter id
        #[arg(short, long)]
        datacenter: String,
    },
    /// Pick a public image interactively
    Pick {
        /// Datacenter id
        #[arg(short, long)]
        datacenter: String,

        /// Print the resolution as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct ResolveArgs {
    /// Datacenter id
    #[arg(short, long)]
    datacenter: String,

    /// Image id; prefer os/code or a private image name
    #[arg(long)]
    id: Option<String>,

    /// Image OS
    #[arg(long)]
    os: Option<String>,

    /// Image code
    #[arg(long)]
    code: Option<String>,

    /// Private image name; must not be combined with os/code
    #[arg(long)]
    private_image_name: Option<String>,

    /// Print the resolution as JSON
    #[arg(long)]
    json: bool,
}

impl ResolveArgs {
    fn into_image_data(self) -> ImageData {
        ImageData {
            id: self.id,
            datacenter_id: self.datacenter,
            os: self.os,
            code: self.code,
            private_image_name: self.private_image_name,
        }
    }
}

fn load_config(cli: &Cli) -> Result<ProviderConfig> {
    let config = match &cli.config {
        Some(path) => ProviderConfig::from_file(path)
            .with_context(|| format!("load provider config from {}", path.display()))?,
        None => ProviderConfig::from_env().context("load provider config from environment")?,
    };

    let config = match &cli.api_url {
        Some(url) => config.with_api_url(url),
        None => config,
    };
    tracing::debug!(api_url = config.api_url(), "Loaded provider config");
    Ok(config)
}

/// Spinner on stderr while waiting on the API; hidden when not a terminal.
fn spinner(msg: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(msg);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

async fn fetch_catalog(client: &ApiClient, datacenter: &str) -> Result<Catalog> {
    let pb = spinner(format!("Fetching images for datacenter {datacenter}"));
    let images = client.fetch_images(datacenter).await;
    pb.finish_and_clear();

    let images = images.with_context(|| format!("fetch images for datacenter '{datacenter}'"))?;
    Ok(images.into_iter().collect())
}

fn print_resolution(resolution: &Resolution, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(resolution)?);
        return Ok(());
    }

    println!("\n=== Image ===");
    println!("id:    {}", resolution.id);
    if !resolution.os.is_empty() {
        println!("os:    {}", resolution.os);
    }
    if !resolution.code.is_empty() {
        println!("code:  {}", resolution.code);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive("cloud_image_lookup=info".parse()?))
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let client = ApiClient::new(&config).context("build API client")?;

    match cli.command {
        Command::Resolve(args) => {
            let json = args.json;
            let mut data = args.into_image_data();

            let pb = spinner(format!("Resolving image in datacenter {}", data.datacenter_id));
            let resolution = resolve(&client, &mut data).await;
            pb.finish_and_clear();

            print_resolution(&resolution?, json)?;
        }
        Command::List { datacenter } => {
            let catalog = fetch_catalog(&client, &datacenter).await?;
            println!("{}", catalog.available_images());
        }
        Command::Pick { datacenter, json } => {
            let catalog = fetch_catalog(&client, &datacenter).await?;
            let id = pick_image(&catalog)?;
            let resolution = select(&catalog, &id, "", "").context("selected image is no longer in the catalog")?;
            print_resolution(&resolution, json)?;
        }
    }

    Ok(())
}
