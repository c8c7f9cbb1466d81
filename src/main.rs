use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use tenure_export::export::{DirectorySink, Exporter};
use tenure_export::settings::{DEFAULT_TARGET_CRS, ExportConfig};
use tenure_export::source::ArcGisClient;
use tenure_export::types::FeatureCollection;

#[derive(Parser)]
#[command(name = "tenure-export", version, about = "Export mining tenure polygons as shapefiles or KML")]
struct Cli {
    /// Config file; defaults to config.toml in the platform config dir.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write shapefile bundles projected into `--crs`.
    Shp {
        code: String,
        #[arg(long, default_value = DEFAULT_TARGET_CRS)]
        crs: String,
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Write a single-placemark KML document.
    Kml {
        code: String,
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Print the label point of the first feature.
    Label {
        code: String,
        #[arg(long)]
        crs: Option<String>,
    },
    /// Print the vertices of the first feature.
    Vertices {
        code: String,
        #[arg(long)]
        crs: Option<String>,
    },
    /// Print the transformed features as GeoJSON.
    Geojson {
        code: String,
        #[arg(long, default_value = DEFAULT_TARGET_CRS)]
        crs: String,
    },
    /// Find which layer ids serve the configured layer names.
    Layers,
}

fn tenure_code(raw: &str) -> anyhow::Result<String> {
    let code = raw.trim().to_uppercase();
    if code.is_empty() {
        bail!("no tenure code given");
    }
    Ok(code)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = ExportConfig::load(cli.config.as_deref()).context("loading configuration")?;
    let client = ArcGisClient::new(config.request_timeout());

    if let Command::Layers = cli.command {
        let layers = client.discover_layers(&config.service_url, &config.layer_names);
        if layers.is_empty() {
            bail!("none of {:?} found under {}", config.layer_names, config.service_url);
        }
        for (name, id) in layers {
            println!("{}\t{}", id, name);
        }
        return Ok(());
    }

    let exporter = Exporter::new(config, client);

    match cli.command {
        Command::Shp { code, crs, out } => {
            let code = tenure_code(&code)?;
            let files = exporter
                .export_shapefile(&code, &crs, &DirectorySink::new(&out))
                .with_context(|| format!("exporting shapefiles for {}", code))?;
            for file in files {
                println!("{}", out.join(file).display());
            }
        }
        Command::Kml { code, out } => {
            let code = tenure_code(&code)?;
            let file = exporter
                .export_kml(&code, &DirectorySink::new(&out))
                .with_context(|| format!("exporting KML for {}", code))?;
            println!("{}", out.join(file).display());
        }
        Command::Label { code, crs } => {
            let code = tenure_code(&code)?;
            let label = exporter
                .label(&code, crs.as_deref())
                .with_context(|| format!("locating label for {}", code))?;
            if !label.is_usable() {
                info!("No polygon with positive area in {}", code);
            }
            println!("{} {} (area {})", label.point.x, label.point.y, label.area);
        }
        Command::Vertices { code, crs } => {
            let code = tenure_code(&code)?;
            let vertices = exporter
                .vertices(&code, crs.as_deref())
                .with_context(|| format!("listing vertices for {}", code))?;
            for (index, vertex) in vertices.iter().enumerate() {
                println!("{}\t{}\t{}", index + 1, vertex.x, vertex.y);
            }
        }
        Command::Geojson { code, crs } => {
            let code = tenure_code(&code)?;
            let collection = exporter
                .fetch_projected(&code, &crs)
                .with_context(|| format!("transforming {}", code))?;
            println!("{}", to_geojson(&collection)?);
        }
        Command::Layers => {}
    }

    Ok(())
}

fn to_geojson(collection: &FeatureCollection) -> anyhow::Result<String> {
    let geojson = geojson::FeatureCollection::from(collection);
    Ok(serde_json::to_string_pretty(&geojson)?)
}
