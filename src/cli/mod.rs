use clap::{Args as ClapArgs, Parser, Subcommand};

mod handlers;

pub use handlers::*;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct PageArgs {
    /// Page number, starting at 1
    #[clap(short, long, default_value = "1")]
    pub page: usize,

    /// Rows per page (defaults to browse.per_page from config.yaml)
    #[clap(long)]
    pub per_page: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Semantic search over paper abstracts
    Search {
        /// Free-text query
        query: String,

        /// Number of results (defaults to semantic_search.default_top_k)
        #[clap(short = 'k', long)]
        top_k: Option<usize>,
    },
    /// List papers
    Papers {
        /// Paper area
        #[clap(short, long)]
        area: Option<String>,

        /// Paper subarea
        #[clap(short, long)]
        subarea: Option<String>,

        /// Any author name containing this
        #[clap(short = 'u', long)]
        author: Option<String>,

        /// Paper title
        #[clap(short, long)]
        title: Option<String>,

        #[clap(flatten)]
        page_args: PageArgs,
    },
    /// List repositories
    Repos {
        /// Repository area
        #[clap(short, long)]
        area: Option<String>,

        /// Repository subarea
        #[clap(short, long)]
        subarea: Option<String>,

        /// Repository author
        #[clap(short = 'u', long)]
        author: Option<String>,

        /// Repository name
        #[clap(short, long)]
        name: Option<String>,

        #[clap(flatten)]
        page_args: PageArgs,
    },
    /// Show a single paper
    Paper { id: u64 },
    /// Show a single repository
    Repo { id: u64 },
    /// Catalog totals and top authors
    Dashboard {},
    /// Embed papers that don't have an embedding yet
    Backfill {
        /// Re-embed every paper, replacing existing embeddings
        #[clap(long, default_value = "false")]
        force: bool,
    },
}
