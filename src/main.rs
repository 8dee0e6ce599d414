use clap::{Parser, Subcommand};
use std::path::PathBuf;

use memorial_gallery::config::GalleryConfig;
use memorial_gallery::serve::serve_gallery;
use memorial_gallery::MetadataStore;

#[derive(Parser, Debug)]
#[command(author, version, about = "Serve a memorial photo and video gallery")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the gallery HTTP server
    Serve {
        /// Path to config file (TOML format)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Port to listen on (overrides config file)
        #[arg(short, long)]
        port: Option<u16>,

        /// Public directory to serve (overrides config file)
        #[arg(long)]
        public_dir: Option<PathBuf>,

        /// Accept uploads through POST /api/upload (overrides config file)
        #[arg(long)]
        enable_uploads: bool,
    },
    /// Add local images or videos to the gallery
    Add {
        /// Public directory holding uploads/
        #[arg(long, default_value = "public")]
        public_dir: PathBuf,

        /// Files to add, in order
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Print the media records of the gallery
    List {
        /// Public directory holding uploads/
        #[arg(long, default_value = "public")]
        public_dir: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    match args.command {
        Command::Serve {
            config,
            port,
            public_dir,
            enable_uploads,
        } => serve(config, port, public_dir, enable_uploads),
        Command::Add { public_dir, files } => add(public_dir, files),
        Command::List { public_dir } => list(public_dir),
    }
}

fn serve(
    config_path: Option<PathBuf>,
    port: Option<u16>,
    public_dir: Option<PathBuf>,
    enable_uploads: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match config_path {
        Some(path) => GalleryConfig::load(&path)?,
        None => GalleryConfig::default(),
    };

    if let Some(port) = port {
        config.port = port;
    }
    if let Some(dir) = public_dir {
        config.public_dir = dir;
    }
    if enable_uploads {
        config.upload_enabled = true;
    }

    serve_gallery(config)
}

fn add(public_dir: PathBuf, files: Vec<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let store = MetadataStore::new(&public_dir);

    for path in files {
        let record = store
            .import_file(&path)
            .map_err(|e| format!("Failed to add '{}': {}", path.display(), e))?;
        println!("{} -> {}", path.display(), record.url);
    }

    Ok(())
}

fn list(public_dir: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let store = MetadataStore::new(&public_dir);
    let records = store
        .list()
        .map_err(|e| format!("Failed to read '{}': {}", store.metadata_path().display(), e))?;

    if records.is_empty() {
        println!("No media in {}", store.uploads_dir().display());
        return Ok(());
    }

    for record in &records {
        println!("{}\t{}\t{}", record.id, record.media_type.as_str(), record.url);
    }
    println!("{} records", records.len());

    Ok(())
}
