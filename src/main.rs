mod cli;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use bf_av::{Engine, FfmpegEngine, ToolRegistry};
use bf_core::config::Config;
use bf_core::{ChapterMetadata, JobSubmission, UploadedChapter};
use bf_pipeline::{duration_to_ms, JobCoordinator};
use clap::Parser;
use cli::{ChapterArg, Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "bookforge=trace,bf_pipeline=trace,bf_av=trace,bf_server=trace,tower_http=debug"
                .to_string()
        } else {
            "bookforge=debug,bf_pipeline=debug,bf_av=debug,bf_server=debug,tower_http=info"
                .to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Serve { host, port } => {
            let mut config = Config::load_or_default(config_path);
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            tracing::info!("Starting bookforge server");
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(bf_server::start(config))?;
            Ok(())
        }
        Commands::Build {
            title,
            author,
            cover,
            chapters,
            output,
        } => {
            let config = Config::load_or_default(config_path);
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(build_book(
                config,
                title,
                author,
                cover,
                chapters,
                output.as_deref(),
            ))
        }
        Commands::Probe { file, json } => {
            let config = Config::load_or_default(config_path);
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(probe_file(&config, &file, json))
        }
        Commands::CheckTools => {
            let config = Config::load_or_default(config_path);
            check_tools(&config);
            Ok(())
        }
        Commands::Validate {
            config: validate_path,
        } => {
            let path = validate_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("bookforge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn engine_from_config(config: &Config) -> Result<Arc<dyn Engine>> {
    let tools = ToolRegistry::discover(&config.tools);
    let engine = FfmpegEngine::from_registry(&tools, &config.encode)?;
    Ok(Arc::new(engine))
}

async fn build_book(
    config: Config,
    title: String,
    author: String,
    cover: Option<std::path::PathBuf>,
    chapters: Vec<ChapterArg>,
    output: Option<&Path>,
) -> Result<()> {
    for chapter in &chapters {
        if !chapter.path.is_file() {
            anyhow::bail!("Chapter file does not exist: {}", chapter.path.display());
        }
    }
    if let Some(cover) = &cover {
        if !cover.is_file() {
            anyhow::bail!("Cover image does not exist: {}", cover.display());
        }
    }

    let engine = engine_from_config(&config)?;
    let coordinator = JobCoordinator::new(engine, &config);

    let (files, chapter_metadata) = chapters
        .into_iter()
        .map(|c| {
            let name = c
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned());
            (
                UploadedChapter {
                    path: c.path,
                    original_name: name.clone(),
                },
                ChapterMetadata {
                    original_name: name.unwrap_or_default(),
                    title: c.title.unwrap_or_default(),
                },
            )
        })
        .unzip();

    let submission = JobSubmission {
        book_title: title,
        author,
        cover_art_path: cover,
        files,
        chapter_metadata,
    };

    // Local files belong to the user, so there is no staging scope to release.
    let job = coordinator.run(submission, None).await?;

    let dest = match output {
        Some(p) => p.to_path_buf(),
        None => std::env::current_dir()?.join(&job.file_name),
    };

    println!("Chapters:");
    for ts in &job.timestamps {
        println!(
            "  {} - {}  {}",
            format_ms(ts.start_ms),
            format_ms(ts.end_ms),
            ts.title
        );
    }

    let bytes = job
        .persist_to(&dest)
        .await
        .with_context(|| format!("writing {}", dest.display()))?;
    println!("\nWrote {} ({bytes} bytes)", dest.display());
    Ok(())
}

async fn probe_file(config: &Config, file: &Path, json: bool) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {}", file.display());
    }

    let engine = engine_from_config(config)?;
    let duration_ms = duration_to_ms(engine.probe_duration(file).await?);

    if json {
        let value = serde_json::json!({
            "file": file,
            "duration_ms": duration_ms,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("File: {}", file.display());
        println!("Duration: {} ({duration_ms} ms)", format_ms(duration_ms));
    }
    Ok(())
}

fn check_tools(config: &Config) {
    println!("Checking external tools...\n");

    let tools = ToolRegistry::discover(&config.tools).check_all();
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version);
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Install ffmpeg to build audiobooks.");
    }
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {}", p.display());
            let contents = std::fs::read_to_string(p)
                .with_context(|| format!("reading {}", p.display()))?;
            let config = Config::from_json(&contents)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    println!("  Server: {}:{}", config.server.host, config.server.port);
    println!(
        "  Encode: {} @ {} (timeout {}s, probe concurrency {})",
        config.encode.audio_codec,
        config.encode.audio_bitrate,
        config.encode.timeout_secs,
        config.encode.probe_concurrency
    );

    let warnings = config.validate();
    for warning in &warnings {
        println!("  ! {warning}");
    }
    Ok(())
}

/// `HH:MM:SS.mmm`
fn format_ms(ms: u64) -> String {
    let secs = ms / 1000;
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        secs / 3600,
        (secs / 60) % 60,
        secs % 60,
        ms % 1000
    )
}
