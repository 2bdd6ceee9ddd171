//! Catalog-wide counts: totals, papers per area, most prolific authors.

use std::collections::HashMap;

use serde::Serialize;

use crate::catalog::{RecordStore, StoreError};

const TOP_AUTHORS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Count {
    pub name: String,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub paper_count: usize,
    pub repo_count: usize,
    pub papers_by_area: Vec<Count>,
    pub top_paper_authors: Vec<Count>,
    pub top_repo_authors: Vec<Count>,
}

/// Count occurrences, ordered by total descending then name ascending.
fn tally<'a>(names: impl Iterator<Item = &'a str>) -> Vec<Count> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for name in names {
        *counts.entry(name).or_default() += 1;
    }

    let mut counts: Vec<Count> = counts
        .into_iter()
        .map(|(name, total)| Count {
            name: name.to_string(),
            total,
        })
        .collect();
    counts.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.name.cmp(&b.name)));
    counts
}

pub fn dashboard(store: &dyn RecordStore) -> Result<DashboardStats, StoreError> {
    let papers = store.papers()?;
    let repos = store.repos()?;

    let papers_by_area = tally(papers.iter().map(|p| p.area.as_str()));

    let mut top_paper_authors = tally(
        papers
            .iter()
            .flat_map(|p| p.authors.iter().map(String::as_str)),
    );
    top_paper_authors.truncate(TOP_AUTHORS);

    let mut top_repo_authors = tally(
        repos
            .iter()
            .map(|r| r.author.as_str())
            .filter(|a| !a.is_empty()),
    );
    top_repo_authors.truncate(TOP_AUTHORS);

    Ok(DashboardStats {
        paper_count: papers.len(),
        repo_count: repos.len(),
        papers_by_area,
        top_paper_authors,
        top_repo_authors,
    })
}
