// On-page SEO checks over crawled page records

use seoscope_scanner::PageRecord;
use serde::{Serialize, Serializer};
use std::fmt;

pub const TITLE_MIN_CHARS: usize = 30;
pub const TITLE_MAX_CHARS: usize = 60;
pub const DESCRIPTION_MIN_CHARS: usize = 120;
pub const DESCRIPTION_MAX_CHARS: usize = 160;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeoIssue {
    MissingTitle,
    TitleTooShort(usize),
    TitleTooLong(usize),
    MissingDescription,
    DescriptionTooShort(usize),
    DescriptionTooLong(usize),
    MissingH1,
    MissingCanonical,
    NonOkStatus(u16),
}

impl fmt::Display for SeoIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeoIssue::MissingTitle => write!(f, "Missing title"),
            SeoIssue::TitleTooShort(n) => {
                write!(f, "Title too short ({} chars, minimum {})", n, TITLE_MIN_CHARS)
            }
            SeoIssue::TitleTooLong(n) => {
                write!(f, "Title too long ({} chars, maximum {})", n, TITLE_MAX_CHARS)
            }
            SeoIssue::MissingDescription => write!(f, "Missing meta description"),
            SeoIssue::DescriptionTooShort(n) => write!(
                f,
                "Meta description too short ({} chars, minimum {})",
                n, DESCRIPTION_MIN_CHARS
            ),
            SeoIssue::DescriptionTooLong(n) => write!(
                f,
                "Meta description too long ({} chars, maximum {})",
                n, DESCRIPTION_MAX_CHARS
            ),
            SeoIssue::MissingH1 => write!(f, "Missing H1"),
            SeoIssue::MissingCanonical => write!(f, "Missing canonical link"),
            SeoIssue::NonOkStatus(status) => write!(f, "Non-200 status: {}", status),
        }
    }
}

impl Serialize for SeoIssue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

pub fn check_title(page: &PageRecord) -> Option<SeoIssue> {
    let length = page.title.trim().chars().count();
    match length {
        0 => Some(SeoIssue::MissingTitle),
        n if n < TITLE_MIN_CHARS => Some(SeoIssue::TitleTooShort(n)),
        n if n > TITLE_MAX_CHARS => Some(SeoIssue::TitleTooLong(n)),
        _ => None,
    }
}

pub fn check_meta_description(page: &PageRecord) -> Option<SeoIssue> {
    let length = page.meta_description.trim().chars().count();
    match length {
        0 => Some(SeoIssue::MissingDescription),
        n if n < DESCRIPTION_MIN_CHARS => Some(SeoIssue::DescriptionTooShort(n)),
        n if n > DESCRIPTION_MAX_CHARS => Some(SeoIssue::DescriptionTooLong(n)),
        _ => None,
    }
}

pub fn check_h1(page: &PageRecord) -> Option<SeoIssue> {
    page.h1.trim().is_empty().then_some(SeoIssue::MissingH1)
}

pub fn check_canonical(page: &PageRecord) -> Option<SeoIssue> {
    page.canonical.trim().is_empty().then_some(SeoIssue::MissingCanonical)
}

pub fn check_status(page: &PageRecord) -> Option<SeoIssue> {
    (page.status_code != 200).then_some(SeoIssue::NonOkStatus(page.status_code))
}

/// Every issue found on one page, in a fixed order.
pub fn analyze_page(page: &PageRecord) -> Vec<SeoIssue> {
    [
        check_title(page),
        check_meta_description(page),
        check_h1(page),
        check_canonical(page),
        check_status(page),
    ]
    .into_iter()
    .flatten()
    .collect()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageIssues {
    #[serde(flatten)]
    pub page: PageRecord,
    pub issues: Vec<SeoIssue>,
    pub issue_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeoStats {
    pub total_pages: usize,
    pub pages_with_issues: usize,
    pub missing_titles: usize,
    pub missing_descriptions: usize,
    #[serde(rename = "missingH1")]
    pub missing_h1: usize,
    pub missing_canonical: usize,
    #[serde(rename = "non200Status")]
    pub non_200_status: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SeoReport {
    pub stats: SeoStats,
    pub issues: Vec<PageIssues>,
}

/// Check every page and tally the results. Pages without issues are
/// counted but not listed.
pub fn analyze_pages(pages: &[PageRecord]) -> SeoReport {
    let mut report = SeoReport {
        stats: SeoStats {
            total_pages: pages.len(),
            ..Default::default()
        },
        issues: Vec::new(),
    };

    for page in pages {
        let issues = analyze_page(page);
        if issues.is_empty() {
            continue;
        }

        for issue in &issues {
            match issue {
                SeoIssue::MissingTitle => report.stats.missing_titles += 1,
                SeoIssue::MissingDescription => report.stats.missing_descriptions += 1,
                SeoIssue::MissingH1 => report.stats.missing_h1 += 1,
                SeoIssue::MissingCanonical => report.stats.missing_canonical += 1,
                SeoIssue::NonOkStatus(_) => report.stats.non_200_status += 1,
                _ => {}
            }
        }

        report.stats.pages_with_issues += 1;
        report.issues.push(PageIssues {
            page: page.clone(),
            issue_count: issues.len(),
            issues,
        });
    }

    report
}
