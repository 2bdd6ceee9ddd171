use anyhow::Result;
use serde::Serialize;

use crate::{
    app::App,
    browse::{PaperFilter, RepoFilter},
};

use super::{Command, PageArgs};

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn handle_search(app: &App, query: &str, top_k: Option<usize>) -> Result<()> {
    let results = app.search(query, top_k)?;
    if results.skipped > 0 {
        eprintln!(
            "warning: {} papers have unreadable embeddings and were left out",
            results.skipped
        );
    }
    print_json(&results.hits)
}

pub fn handle_papers(app: &App, filter: PaperFilter, page_args: PageArgs) -> Result<()> {
    let paged = app.papers(&filter, page_args.page, page_args.per_page)?;
    print_json(&paged)
}

pub fn handle_repos(app: &App, filter: RepoFilter, page_args: PageArgs) -> Result<()> {
    let paged = app.repos(&filter, page_args.page, page_args.per_page)?;
    print_json(&paged)
}

pub fn handle_command(app: &mut App, command: Command) -> Result<()> {
    match command {
        Command::Search { query, top_k } => handle_search(app, &query, top_k),
        Command::Papers {
            area,
            subarea,
            author,
            title,
            page_args,
        } => handle_papers(
            app,
            PaperFilter {
                area,
                subarea,
                author,
                title,
            },
            page_args,
        ),
        Command::Repos {
            area,
            subarea,
            author,
            name,
            page_args,
        } => handle_repos(
            app,
            RepoFilter {
                area,
                subarea,
                author,
                name,
            },
            page_args,
        ),
        Command::Paper { id } => print_json(&app.paper(id)?),
        Command::Repo { id } => print_json(&app.repo(id)?),
        Command::Dashboard {} => print_json(&app.dashboard()?),
        Command::Backfill { force } => print_json(&app.backfill(force)?),
    }
}
