use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::config::{self, Config};
use crate::http::server::{HttpServer, Stages};
use crate::pipeline::{
    load::{LoadReport, run_load},
    query::{QueryResponse, run_query},
    request::{ObjectEvent, unwrap_body},
    transform::{TransformReport, run_transform},
};
use crate::storage::{
    db::i64_seconds_to_local_time, error::StorageError, objects::ObjectStore, tracks::Warehouse,
};

#[derive(Parser)]
#[command(name = "trackflow")]
#[command(version = "0.1")]
#[command(about = "Track export ETL: normalize, load and query")]
pub struct Cli {
    /// Path to the config TOML file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Upload a local csv export into the raw bucket
    Upload {
        file: PathBuf,
        /// Object key, defaults to the file name
        #[arg(short, long)]
        key: Option<String>,
        #[arg(short, long)]
        bucket: Option<String>,
    },
    /// Normalize a raw export into the transformed bucket
    Transform {
        #[arg(short, long)]
        key: Option<String>,
        #[arg(short, long)]
        bucket: Option<String>,
        /// Read the triggering event from a json file instead
        #[arg(short, long, conflicts_with = "key")]
        event: Option<PathBuf>,
    },
    /// Load a transformed export into the tracks table
    Load {
        #[arg(short, long)]
        key: Option<String>,
        #[arg(short, long)]
        bucket: Option<String>,
        #[arg(short, long, conflicts_with = "key")]
        event: Option<PathBuf>,
    },
    /// Transform a raw export and load the result
    Run {
        key: String,
        #[arg(short, long)]
        bucket: Option<String>,
    },
    /// Run an analytical query given as json, e.g. '{"action": "top_artists"}'
    Query { spec: String },
    /// List objects in a bucket
    Objects {
        /// Defaults to the raw bucket
        #[arg(short, long)]
        bucket: Option<String>,
        #[arg(short, long, default_value = "")]
        prefix: String,
    },
    /// Show how many tracks are loaded and the most recent load
    Status,
    /// Run http server exposing the pipeline stages
    Serve,
}

#[derive(Serialize)]
struct RunReport {
    transform: TransformReport,
    load: LoadReport,
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn read_event(
    path: Option<&Path>,
    bucket: Option<String>,
    key: Option<String>,
) -> anyhow::Result<ObjectEvent> {
    match path {
        Some(path) => {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read event file {}", path.display()))?;
            serde_json::from_str(&contents).with_context(|| "Failed to parse event json")
        }
        None => Ok(ObjectEvent {
            bucket,
            key,
            ..Default::default()
        }),
    }
}

fn open_warehouse(cfg: &Config) -> anyhow::Result<Warehouse> {
    Warehouse::new(&cfg.database).with_context(|| "Failed to open warehouse database")
}

/// Entrypoint for CLI
pub fn run() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config_path = cli
        .config
        .to_str()
        .ok_or_else(|| anyhow!("config path is not valid utf-8"))?;
    let cfg = config::Config::load(config_path)?;
    let store = ObjectStore::new(&cfg.storage.root);

    match cli.command {
        Commands::Upload { file, key, bucket } => {
            let key = match key {
                Some(key) => key,
                None => file
                    .file_name()
                    .and_then(|name| name.to_str())
                    .map(str::to_string)
                    .ok_or_else(|| anyhow!("cannot derive a key from {}", file.display()))?,
            };
            let bucket = bucket
                .as_deref()
                .or(cfg.storage.raw_bucket())
                .ok_or_else(|| anyhow!("no bucket given and no raw bucket configured"))?;

            let meta = store.put_file(bucket, &key, &file)?;
            print_json(&meta)?;
        }

        Commands::Transform { key, bucket, event } => {
            let event = read_event(event.as_deref(), bucket, key)?;
            let report = run_transform(&store, &cfg.storage, &cfg.transform, event)?;
            print_json(&report)?;
        }

        Commands::Load { key, bucket, event } => {
            let event = read_event(event.as_deref(), bucket, key)?;
            let mut warehouse = open_warehouse(&cfg)?;
            let report = run_load(&store, &cfg.storage, &cfg.load, &mut warehouse, event)?;
            print_json(&report)?;
        }

        Commands::Run { key, bucket } => {
            let transformed = run_transform(
                &store,
                &cfg.storage,
                &cfg.transform,
                ObjectEvent::for_key(bucket, key),
            )?;
            let mut warehouse = open_warehouse(&cfg)?;
            let loaded = run_load(
                &store,
                &cfg.storage,
                &cfg.load,
                &mut warehouse,
                ObjectEvent::for_key(
                    Some(transformed.output_bucket.clone()),
                    transformed.output_key.clone(),
                ),
            )?;
            print_json(&RunReport {
                transform: transformed,
                load: loaded,
            })?;
        }

        Commands::Query { spec } => {
            let spec = unwrap_body(
                serde_json::from_str(&spec).with_context(|| "Query spec is not valid json")?,
            );
            let warehouse = open_warehouse(&cfg)?;
            match run_query(&warehouse, &spec) {
                Ok(response) => print_json(&response)?,
                Err(StorageError::UnknownAction(_)) => {
                    print_json(&QueryResponse::unknown_action(&spec))?
                }
                Err(e) => return Err(e.into()),
            }
        }

        Commands::Objects { bucket, prefix } => {
            let bucket = bucket
                .as_deref()
                .or(cfg.storage.raw_bucket())
                .ok_or_else(|| anyhow!("no bucket given and no raw bucket configured"))?;
            for object in store.list(bucket, &prefix)? {
                println!("{:>10}  {:<24}  {}", object.size, object.content_type, object.key);
            }
        }

        Commands::Status => {
            let warehouse = open_warehouse(&cfg)?;
            println!("Warehouse contains {} tracks", warehouse.count_tracks()?);
            match warehouse.last_load()? {
                Some(load) => println!(
                    "Last load: {} rows from {}/{} at {}",
                    load.rows,
                    load.bucket,
                    load.key,
                    i64_seconds_to_local_time(load.loaded_at)?
                ),
                None => println!("Nothing has been loaded yet"),
            }
        }

        Commands::Serve => {
            println!("Starting HTTP server...");

            let warehouse = open_warehouse(&cfg)?;
            let stages = Stages {
                store,
                storage: cfg.storage,
                transform: cfg.transform,
                load: cfg.load,
            };
            let http_server = HttpServer::new(warehouse, stages, cfg.http);

            println!(
                "HTTP server running at http://{}:{}",
                http_server.config.bind_addr, http_server.config.port
            );
            http_server.run();
        }
    }

    Ok(())
}
