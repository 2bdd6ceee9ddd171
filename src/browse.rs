//! Filtering and pagination for listing papers and repositories.

use serde::{Deserialize, Serialize};

use crate::catalog::{PaperRecord, RecordStore, RepoRecord, StoreError};

#[derive(thiserror::Error, Debug)]
pub enum BrowseError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Case-insensitive substring filters; unset or empty fields match everything.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PaperFilter {
    pub area: Option<String>,
    pub subarea: Option<String>,
    /// Matches if any single author name contains it
    pub author: Option<String>,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RepoFilter {
    pub area: Option<String>,
    pub subarea: Option<String>,
    pub author: Option<String>,
    pub name: Option<String>,
}

fn needle(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_lowercase)
}

fn contains(haystack: &str, needle: &Option<String>) -> bool {
    match needle {
        Some(needle) => haystack.to_lowercase().contains(needle.as_str()),
        None => true,
    }
}

impl PaperFilter {
    pub fn matches(&self, paper: &PaperRecord) -> bool {
        let author = needle(&self.author);

        contains(&paper.area, &needle(&self.area))
            && contains(&paper.subarea, &needle(&self.subarea))
            && contains(&paper.title, &needle(&self.title))
            && (author.is_none() || paper.authors.iter().any(|name| contains(name, &author)))
    }
}

impl RepoFilter {
    pub fn matches(&self, repo: &RepoRecord) -> bool {
        contains(&repo.area, &needle(&self.area))
            && contains(&repo.subarea, &needle(&self.subarea))
            && contains(&repo.author, &needle(&self.author))
            && contains(&repo.name, &needle(&self.name))
    }
}

/// 1-based page request.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct Page {
    pub number: usize,
    pub per_page: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub max_page: usize,
}

/// Slice `items` to the requested page. Out-of-range page numbers are clamped.
pub fn paginate<T>(items: Vec<T>, page: Page) -> Result<Paged<T>, BrowseError> {
    if page.per_page == 0 {
        return Err(BrowseError::InvalidArgument(
            "per_page must be greater than 0".to_string(),
        ));
    }

    let total = items.len();
    let max_page = total.div_ceil(page.per_page).max(1);
    let number = page.number.clamp(1, max_page);

    let items = items
        .into_iter()
        .skip((number - 1) * page.per_page)
        .take(page.per_page)
        .collect();

    Ok(Paged {
        items,
        total,
        page: number,
        max_page,
    })
}

pub fn browse_papers(
    store: &dyn RecordStore,
    filter: &PaperFilter,
    page: Page,
) -> Result<Paged<PaperRecord>, BrowseError> {
    let papers = store
        .papers()?
        .into_iter()
        .filter(|paper| filter.matches(paper))
        .collect();
    paginate(papers, page)
}

pub fn browse_repos(
    store: &dyn RecordStore,
    filter: &RepoFilter,
    page: Page,
) -> Result<Paged<RepoRecord>, BrowseError> {
    let repos = store
        .repos()?
        .into_iter()
        .filter(|repo| filter.matches(repo))
        .collect();
    paginate(repos, page)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(number: usize, per_page: usize) -> Page {
        Page { number, per_page }
    }

    #[test]
    fn test_paginate_middle_page() {
        let paged = paginate((1..=25).collect::<Vec<_>>(), page(2, 10)).unwrap();
        assert_eq!(paged.items, (11..=20).collect::<Vec<_>>());
        assert_eq!(paged.total, 25);
        assert_eq!(paged.max_page, 3);
        assert_eq!(paged.page, 2);
    }

    #[test]
    fn test_paginate_last_partial_page() {
        let paged = paginate((1..=25).collect::<Vec<_>>(), page(3, 10)).unwrap();
        assert_eq!(paged.items, vec![21, 22, 23, 24, 25]);
    }

    #[test]
    fn test_paginate_clamps_out_of_range() {
        let paged = paginate((1..=5).collect::<Vec<_>>(), page(9, 10)).unwrap();
        assert_eq!(paged.page, 1);
        assert_eq!(paged.items.len(), 5);

        let paged = paginate((1..=5).collect::<Vec<_>>(), page(0, 2)).unwrap();
        assert_eq!(paged.page, 1);
        assert_eq!(paged.items, vec![1, 2]);
    }

    #[test]
    fn test_paginate_empty_has_one_page() {
        let paged = paginate(Vec::<u8>::new(), page(1, 10)).unwrap();
        assert_eq!(paged.max_page, 1);
        assert!(paged.items.is_empty());
    }

    #[test]
    fn test_paginate_zero_per_page() {
        let result = paginate(vec![1], page(1, 0));
        assert!(matches!(result, Err(BrowseError::InvalidArgument(_))));
    }

    #[test]
    fn test_paper_filter() {
        let paper = PaperRecord {
            id: 1,
            title: "Physics-Informed Neural Networks".into(),
            authors: vec!["Maziar Raissi".into(), "George Karniadakis".into()],
            area: "Machine Learning".into(),
            subarea: "PINN".into(),
            ..Default::default()
        };

        assert!(PaperFilter::default().matches(&paper));
        assert!(PaperFilter {
            title: Some("neural".into()),
            area: Some("MACHINE".into()),
            ..Default::default()
        }
        .matches(&paper));
        assert!(PaperFilter {
            author: Some("karniadakis".into()),
            ..Default::default()
        }
        .matches(&paper));
        assert!(!PaperFilter {
            subarea: Some("operator".into()),
            ..Default::default()
        }
        .matches(&paper));
        // a needle spanning two names is not a single author
        assert!(!PaperFilter {
            author: Some("raissi, george".into()),
            ..Default::default()
        }
        .matches(&paper));
        // blank fields are ignored
        assert!(PaperFilter {
            title: Some("  ".into()),
            ..Default::default()
        }
        .matches(&paper));
    }

    #[test]
    fn test_repo_filter() {
        let repo = RepoRecord {
            id: 1,
            name: "DeepXDE".into(),
            author: "lululxvi".into(),
            area: "Scientific ML".into(),
            subarea: "PINN".into(),
            ..Default::default()
        };

        assert!(RepoFilter {
            name: Some("xde".into()),
            author: Some("LULU".into()),
            ..Default::default()
        }
        .matches(&repo));
        assert!(!RepoFilter {
            area: Some("robotics".into()),
            ..Default::default()
        }
        .matches(&repo));
    }
}
