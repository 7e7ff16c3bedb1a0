//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Search a book catalog and relay the selected file locally.
///
/// Bookrelay runs the full search → select → deliver pipeline against a
/// catalog endpoint, delivering files into an output directory with the
/// same progress, size-gating, and archival behavior a messaging
/// deployment would see.
#[derive(Parser, Debug)]
#[command(name = "bookrelay")]
#[command(author, version, about)]
pub struct Args {
    /// Free-text search query
    pub query: Vec<String>,

    /// Base URL of the catalog search endpoint
    #[arg(short = 'u', long)]
    pub catalog_url: String,

    /// Directory delivered files are written to
    #[arg(short, long, default_value = "downloads")]
    pub output_dir: PathBuf,

    /// Result index to download after searching (skips the prompt)
    #[arg(short, long)]
    pub select: Option<usize>,

    /// Path of the SQLite title store (in-memory when omitted)
    #[arg(long)]
    pub title_store: Option<PathBuf>,

    /// Seconds after which a delivered file is removed again (0 disables)
    #[arg(long, default_value_t = 0)]
    pub auto_delete_secs: u64,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parse_minimal() {
        let args = Args::parse_from(["bookrelay", "-u", "https://catalog.example", "dune"]);
        assert_eq!(args.query, vec!["dune"]);
        assert_eq!(args.catalog_url, "https://catalog.example");
        assert_eq!(args.output_dir, PathBuf::from("downloads"));
        assert!(args.select.is_none());
        assert_eq!(args.auto_delete_secs, 0);
    }

    #[test]
    fn test_args_parse_select_and_output() {
        let args = Args::parse_from([
            "bookrelay",
            "--catalog-url",
            "https://catalog.example",
            "--select",
            "2",
            "--output-dir",
            "/tmp/books",
            "great",
            "gatsby",
        ]);
        assert_eq!(args.query.join(" "), "great gatsby");
        assert_eq!(args.select, Some(2));
        assert_eq!(args.output_dir, PathBuf::from("/tmp/books"));
    }
}
