use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "bookforge")]
#[command(author, version, about = "Assemble chapter audio files into a chaptered M4B audiobook")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Build an audiobook from local chapter files
    Build {
        /// Book title
        #[arg(long)]
        title: String,

        /// Author name
        #[arg(long)]
        author: String,

        /// Cover image
        #[arg(long)]
        cover: Option<PathBuf>,

        /// Chapter file, optionally with a title: FILE or FILE::TITLE.
        /// Repeat in playback order.
        #[arg(long = "chapter", required = true, value_parser = parse_chapter)]
        chapters: Vec<ChapterArg>,

        /// Where to write the audiobook (defaults to a name derived from the
        /// title, in the current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the duration of an audio file
    Probe {
        /// File to probe
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}

/// One `--chapter` argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterArg {
    pub path: PathBuf,
    pub title: Option<String>,
}

fn parse_chapter(s: &str) -> Result<ChapterArg, String> {
    let (path, title) = match s.split_once("::") {
        Some((path, title)) => (path, Some(title.trim().to_string()).filter(|t| !t.is_empty())),
        None => (s, None),
    };
    if path.is_empty() {
        return Err("chapter path must not be empty".into());
    }
    Ok(ChapterArg {
        path: PathBuf::from(path),
        title,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chapter_with_title() {
        let arg = parse_chapter("01.mp3::The Beginning").unwrap();
        assert_eq!(arg.path, PathBuf::from("01.mp3"));
        assert_eq!(arg.title.as_deref(), Some("The Beginning"));
    }

    #[test]
    fn chapter_without_title() {
        let arg = parse_chapter("/books/02.m4a").unwrap();
        assert_eq!(arg.path, PathBuf::from("/books/02.m4a"));
        assert!(arg.title.is_none());
        assert!(parse_chapter("03.mp3::  ").unwrap().title.is_none());
    }

    #[test]
    fn empty_path_rejected() {
        assert!(parse_chapter("::Title").is_err());
    }

    #[test]
    fn cli_parses_build() {
        let cli = Cli::try_parse_from([
            "bookforge", "build", "--title", "T", "--author", "A", "--chapter", "a.mp3",
            "--chapter", "b.mp3::Two",
        ])
        .unwrap();
        match cli.command {
            Commands::Build { chapters, cover, .. } => {
                assert_eq!(chapters.len(), 2);
                assert_eq!(chapters[1].title.as_deref(), Some("Two"));
                assert!(cover.is_none());
            }
            _ => panic!("expected build"),
        }
    }
}
