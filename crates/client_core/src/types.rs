use std::{collections::BTreeSet, path::PathBuf, sync::Arc};

use shared::domain::{ResultItem, SortMode};

/// Identifies one logical search/listing context. Text is trimmed and tags
/// are kept as a set, so equality ignores surrounding whitespace and tag order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct QuerySignature {
    text: String,
    tags: BTreeSet<String>,
    sort: SortMode,
}

impl QuerySignature {
    pub fn new<I, S>(text: &str, tags: I, sort: SortMode) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            text: text.trim().to_string(),
            tags: tags.into_iter().map(Into::into).collect(),
            sort,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(String::as_str)
    }

    pub fn sort(&self) -> SortMode {
        self.sort
    }

    /// Empty text and no tags: served by the unfiltered listing source.
    pub fn is_unfiltered(&self) -> bool {
        self.text.is_empty() && self.tags.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultPage {
    pub offset: usize,
    pub items: Vec<ResultItem>,
    pub total_count: usize,
}

impl ResultPage {
    pub fn end(&self) -> usize {
        self.offset + self.items.len()
    }
}

pub type SharedPage = Arc<ResultPage>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Movement {
    #[default]
    None,
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollAlign {
    Start,
    End,
}

/// Side effects the presentation adapter is asked to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewCommand {
    FocusInput,
    BlurInput,
    ScrollIntoView { index: usize, align: ScrollAlign },
    ScrollToTop,
    OpenFile { path: PathBuf },
    OpenContainingFolder { path: PathBuf },
    CopyToClipboard { text: String },
}
