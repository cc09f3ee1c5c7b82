//! Tag filter state encoded in the page URL.
//!
//! The URL is the only copy of the filter. Every change produces a new URL
//! that the page navigates to; nothing is updated in place.

use std::fmt;

use tracing::info;
use url::Url;

pub const TAGS_PARAM: &str = "tags";
pub const PAGE_PARAM: &str = "page";
pub const PROGRESS_JSON_PARAM: &str = "progressjson";
pub const UPDATE_LIST_PARAM: &str = "updatelist";
pub const NO_FILTER_PARAM: &str = "no_filter";

const TERM_SEPARATOR: &str = ",";
const NEGATION_PREFIX: char = '-';

/// One entry of the tag filter. A leading `-` excludes the tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FilterTerm {
    tag: String,
    excluded: bool,
}

impl FilterTerm {
    pub fn new(tag: impl Into<String>, excluded: bool) -> Self {
        Self {
            tag: tag.into(),
            excluded,
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw.strip_prefix(NEGATION_PREFIX) {
            Some(tag) => Self::new(tag, true),
            None => Self::new(raw, false),
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn is_excluded(&self) -> bool {
        self.excluded
    }
}

impl fmt::Display for FilterTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.excluded {
            write!(f, "{NEGATION_PREFIX}{}", self.tag)
        } else {
            f.write_str(&self.tag)
        }
    }
}

/// Ordered filter terms as currently encoded in a URL. Duplicates are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterQuery {
    terms: Vec<FilterTerm>,
}

impl FilterQuery {
    pub fn from_url(url: &Url) -> Self {
        let terms: Vec<FilterTerm> = query_value(url, TAGS_PARAM)
            .filter(|tags| !tags.is_empty())
            .map(|tags| tags.split(TERM_SEPARATOR).map(FilterTerm::parse).collect())
            .unwrap_or_default();
        Self { terms }
    }

    pub fn terms(&self) -> &[FilterTerm] {
        &self.terms
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn included(&self) -> impl Iterator<Item = &str> {
        self.terms
            .iter()
            .filter(|term| !term.is_excluded())
            .map(FilterTerm::tag)
    }

    pub fn excluded(&self) -> impl Iterator<Item = &str> {
        self.terms
            .iter()
            .filter(|term| term.is_excluded())
            .map(FilterTerm::tag)
    }
}

/// Returns `url` with `term` appended to the tag filter and pagination reset.
pub fn add_term(url: &Url, term: &str, negate: bool) -> Url {
    let term = FilterTerm::new(term, negate).to_string();
    let mut pairs = query_pairs(url);

    let tags = match take_param(&mut pairs, TAGS_PARAM) {
        Some((index, existing)) if !existing.is_empty() => {
            (index, format!("{existing}{TERM_SEPARATOR}{term}"))
        }
        Some((index, _)) => (index, term),
        None => (pairs.len(), term),
    };
    pairs.insert(tags.0, (TAGS_PARAM.to_string(), tags.1));
    pairs.retain(|(key, _)| key != PAGE_PARAM);

    with_query(url, pairs)
}

/// Returns `url` with the first exact match of `term` removed from the tag
/// filter and pagination reset. An absent term leaves the filter as it was.
pub fn remove_term(url: &Url, term: &str) -> Url {
    let mut pairs = query_pairs(url);

    if let Some((index, existing)) = take_param(&mut pairs, TAGS_PARAM) {
        let mut terms: Vec<&str> = existing.split(TERM_SEPARATOR).collect();
        if let Some(position) = terms.iter().position(|candidate| *candidate == term) {
            terms.remove(position);
        }
        let joined = terms.join(TERM_SEPARATOR);
        pairs.insert(index, (TAGS_PARAM.to_string(), joined));
    }
    pairs.retain(|(key, _)| key != PAGE_PARAM);

    with_query(url, pairs)
}

/// Returns `url` with `key=1` set, keeping every other parameter.
pub fn with_flag(url: &Url, key: &str) -> Url {
    let mut pairs = query_pairs(url);
    pairs.retain(|(existing, _)| existing != key);
    pairs.push((key.to_string(), "1".to_string()));
    with_query(url, pairs)
}

/// First decoded value of `key` in the query string.
pub fn query_value(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(candidate, _)| candidate == key)
        .map(|(_, value)| value.into_owned())
}

fn query_pairs(url: &Url) -> Vec<(String, String)> {
    url.query_pairs()
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect()
}

// Removes every occurrence of `key`, returning the position and value of the first.
fn take_param(pairs: &mut Vec<(String, String)>, key: &str) -> Option<(usize, String)> {
    let index = pairs.iter().position(|(candidate, _)| candidate == key)?;
    let (_, value) = pairs.remove(index);
    pairs.retain(|(candidate, _)| candidate != key);
    Some((index, value))
}

fn with_query(url: &Url, pairs: Vec<(String, String)>) -> Url {
    let mut next = url.clone();
    if pairs.is_empty() {
        next.set_query(None);
    } else {
        next.query_pairs_mut().clear().extend_pairs(pairs);
    }
    next
}

/// The side-effect boundary of a filter change: a full page navigation.
pub trait Navigator: Send + Sync {
    fn navigate(&self, target: &Url);
}

/// Add/remove tag actions of the page. Both consume the filter because the
/// navigation replaces the page it was built from.
pub struct TagFilter<N: Navigator> {
    page_url: Url,
    navigator: N,
}

impl<N: Navigator> TagFilter<N> {
    pub fn new(page_url: Url, navigator: N) -> Self {
        Self {
            page_url,
            navigator,
        }
    }

    pub fn current(&self) -> FilterQuery {
        FilterQuery::from_url(&self.page_url)
    }

    pub fn add_tag(self, tag: &str, negate: bool) -> Url {
        let target = add_term(&self.page_url, tag, negate);
        info!(tag, negate, target = %target, "filter: adding tag");
        self.navigator.navigate(&target);
        target
    }

    pub fn remove_tag(self, term: &str) -> Url {
        let target = remove_term(&self.page_url, term);
        info!(term, target = %target, "filter: removing tag");
        self.navigator.navigate(&target);
        target
    }
}

#[cfg(test)]
#[path = "tests/query_state_tests.rs"]
mod tests;
