use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Args, Debug, Clone, Default)]
pub struct RenderArgs {
    /// Configuration file to read
    #[clap(short, long, default_value = crate::config::CONFIG_FILE)]
    pub config: PathBuf,

    /// Content document, overriding `[input] content`
    #[clap(long)]
    pub content: Option<PathBuf>,

    /// Style descriptor, overriding `[style] path`
    #[clap(short, long)]
    pub style: Option<PathBuf>,

    /// Page size to render (A4, A5, LETTER, LEGAL, US_TRADE or WIDTHxHEIGHT in points).
    /// Repeat to render several sizes.
    #[clap(short, long = "format")]
    pub formats: Vec<String>,

    /// Split the book into parts of at most this many estimated pages
    #[clap(long = "max-pages")]
    pub max_pages_per_part: Option<u32>,

    /// Directory to write PDFs into
    #[clap(short, long = "out-dir")]
    pub out_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Writes a starter book-press.toml and the bundled styles
    Init {
        /// Overwrite files that already exist
        #[clap(long)]
        force: bool,
    },
    /// Renders the book to one PDF per part and page size
    Render(RenderArgs),
    /// Prints page estimates and the part split without rendering anything
    Plan(RenderArgs),
}

#[derive(Parser, Debug)]
#[clap(author, version, about)]
pub struct Cli {
    /// More logging; repeat for more detail. RUST_LOG takes precedence.
    #[clap(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[clap(subcommand)]
    pub command: Commands,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn can_parse_repeated_formats() {
        let cli = Cli::try_parse_from([
            "book-press", "-vv", "render", "--format", "A4", "-f", "LETTER", "--max-pages", "200",
        ])
        .expect("arguments parse");
        assert_eq!(cli.verbose, 2);
        let Commands::Render(args) = cli.command else {
            panic!("expected the render command");
        };
        assert_eq!(args.formats, vec!["A4", "LETTER"]);
        assert_eq!(args.max_pages_per_part, Some(200));
        assert_eq!(args.config, PathBuf::from("book-press.toml"));
    }
}
