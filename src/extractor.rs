//! Visible-text and link extraction from HTML pages.

use scraper::{ElementRef, Html, Selector};
use tracing::warn;
use url::Url;

use crate::{Result, SearchError};

/// Elements whose content is never visible prose.
const EXCLUDED: &[&str] = &[
    "script", "style", "meta", "link", "head", "header", "footer", "nav", "noscript", "template",
    "iframe", "svg",
];

/// Elements whose text forms a block.
const BLOCKS: &[&str] = &[
    "p", "h1", "h2", "h3", "h4", "h5", "h6", "div", "section", "article", "main", "blockquote", "li",
];

/// Plain-text view of a page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedPage {
    /// Page title, or the page URL when the document has none.
    pub title: String,
    /// Text of each content block in document order.
    pub blocks: Vec<String>,
}

impl ExtractedPage {
    /// All blocks joined with single spaces.
    pub fn text(&self) -> String {
        self.blocks.join(" ")
    }

    fn empty(url: &str) -> Self {
        Self {
            title: url.to_string(),
            blocks: Vec::new(),
        }
    }
}

/// Extracts the title and content blocks of `html`.
///
/// Never fails: when extraction cannot proceed the page is treated as having
/// no text and the URL stands in for the title.
pub fn extract(html: &str, url: &str) -> ExtractedPage {
    match try_extract(html, url) {
        Ok(page) => page,
        Err(e) => {
            warn!("Failed to extract text from {}: {}", url, e);
            ExtractedPage::empty(url)
        }
    }
}

/// Collapses runs of whitespace into single spaces and trims the ends.
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn try_extract(html: &str, url: &str) -> Result<ExtractedPage> {
    let document = Html::parse_document(html);
    let title_selector = selector("title")?;
    let block_selector = selector(&BLOCKS.join(", "))?;

    let title = document
        .select(&title_selector)
        .next()
        .map(|t| clean_text(&t.text().collect::<String>()))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| url.to_string());

    let blocks = document
        .select(&block_selector)
        .filter(|block| !inside_excluded(block))
        .map(|block| block_text(&block))
        .filter(|text| !text.is_empty())
        .collect();

    Ok(ExtractedPage { title, blocks })
}

/// Resolves every `a[href]` against `base`, keeping http(s) links without fragments.
///
/// Hrefs that do not resolve to a valid URL are skipped.
pub fn extract_links(html: &str, base: &Url) -> Vec<Url> {
    let document = Html::parse_document(html);
    let link_selector = match selector("a[href]") {
        Ok(s) => s,
        Err(e) => {
            warn!("Failed to extract links from {}: {}", base, e);
            return Vec::new();
        }
    };

    document
        .select(&link_selector)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| base.join(href.trim()).ok())
        .filter(|url| matches!(url.scheme(), "http" | "https") && url.host_str().is_some())
        .map(|mut url| {
            url.set_fragment(None);
            url
        })
        .collect()
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css)
        .map_err(|e| SearchError::Parse(format!("Failed to parse selector '{}': {:?}", css, e)))
}

fn is_excluded(name: &str) -> bool {
    EXCLUDED.contains(&name)
}

fn is_block(name: &str) -> bool {
    BLOCKS.contains(&name)
}

fn inside_excluded(element: &ElementRef<'_>) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| is_excluded(a.value().name()))
}

/// Text owned by `block`: descendant text that sits neither in a nested
/// block nor in an excluded element.
fn block_text(block: &ElementRef<'_>) -> String {
    let mut text = String::new();
    for node in block.descendants() {
        let Some(fragment) = node.value().as_text() else {
            continue;
        };
        let owned_elsewhere = node
            .ancestors()
            .take_while(|a| a.id() != block.id())
            .filter_map(ElementRef::wrap)
            .any(|a| is_block(a.value().name()) || is_excluded(a.value().name()));
        if !owned_elsewhere {
            text.push_str(fragment);
        }
    }
    clean_text(&text)
}
