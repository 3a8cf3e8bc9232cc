// Two-stage odds extraction: structural locators first, then a bounded
// proximity search over normalized page text.
use crate::model::{OddsPair, PageContent, Quote, QuoteKind};
use crate::normalizer::{normalize_text, parse_decimal};
use crate::parser::profiles::{LocatorStrategy, SiteProfile};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;

const SKIPPED_TAGS: &[&str] = &["head", "script", "style", "noscript", "template"];
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "body", "dd", "div", "dl", "dt",
    "fieldset", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header",
    "hr", "li", "main", "nav", "ol", "p", "pre", "section", "table", "tr", "ul",
];
const EXACTLY_KEYWORDS: &[&str] = &["Exatamente", "Exactly"];

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExtractorSettings {
    pub over_keywords: Vec<String>,
    pub under_keywords: Vec<String>,
    /// Maximum number of characters between the market line and the odd.
    pub lookahead: usize,
}

impl Default for ExtractorSettings {
    fn default() -> Self {
        Self {
            over_keywords: vec!["Mais de".into(), "Over".into()],
            under_keywords: vec!["Menos de".into(), "Under".into()],
            lookahead: 40,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OddsExtractor {
    settings: ExtractorSettings,
    over_head: Option<Regex>,
    under_head: Option<Regex>,
    quote_row: Option<Regex>,
}

impl Default for OddsExtractor {
    fn default() -> Self {
        Self::new(ExtractorSettings::default())
    }
}

impl OddsExtractor {
    pub fn new(settings: ExtractorSettings) -> Self {
        let over_head = head_regex(settings.over_keywords.iter().map(String::as_str));
        let under_head = head_regex(settings.under_keywords.iter().map(String::as_str));
        let quote_row = keyword_alternation(
            settings
                .over_keywords
                .iter()
                .chain(settings.under_keywords.iter())
                .map(String::as_str)
                .chain(EXACTLY_KEYWORDS.iter().copied()),
        )
        .and_then(|alt| Regex::new(&format!(r"(?i)\b({alt}) (\d+(?:\.\d+)?) (\d+(?:\.\d+)?)")).ok());

        Self { settings, over_head, under_head, quote_row }
    }

    /// Pulls the over/under pair for `market` out of a fetched page.
    ///
    /// Structural locators from `profile` run first, side by side. The text
    /// search only runs for a side the locators left empty. A miss is `None`,
    /// never an error.
    pub fn extract(&self, content: &PageContent, market: &str, profile: &SiteProfile) -> OddsPair {
        let mut document = None;
        let mut odds = OddsPair::default();

        if !profile.over.is_empty() || !profile.under.is_empty() {
            let doc = Html::parse_document(&content.markup);
            odds.over = locate_any(&doc, &profile.over, market);
            odds.under = locate_any(&doc, &profile.under, market);
            document = Some(doc);
        }

        if odds.over.is_none() || odds.under.is_none() {
            let text = searchable_text(content, document.as_ref());
            if odds.over.is_none() {
                odds.over = self.search_text(&text, market, self.over_head.as_ref());
            }
            if odds.under.is_none() {
                odds.under = self.search_text(&text, market, self.under_head.as_ref());
            }
        }

        odds
    }

    /// Lists every "kind line odd" row on the page, in document order.
    pub fn scan_quotes(&self, content: &PageContent) -> Vec<Quote> {
        let Some(re) = &self.quote_row else {
            return Vec::new();
        };
        let text = searchable_text(content, None);

        re.captures_iter(&text)
            .filter_map(|caps| {
                let kind = self.classify(&caps[1])?;
                let line = parse_decimal(&caps[2])?;
                let odd = parse_decimal(&caps[3])?;
                Some(Quote { kind, line, odd })
            })
            .collect()
    }

    fn classify(&self, keyword: &str) -> Option<QuoteKind> {
        let listed = |list: &[String]| list.iter().any(|k| same_keyword(k, keyword));
        if listed(&self.settings.over_keywords) {
            Some(QuoteKind::Over)
        } else if listed(&self.settings.under_keywords) {
            Some(QuoteKind::Under)
        } else if EXACTLY_KEYWORDS.iter().any(|k| same_keyword(k, keyword)) {
            Some(QuoteKind::Exactly)
        } else {
            None
        }
    }

    /// First `<keyword> <market>` occurrence followed by a number that starts
    /// within the lookahead window on the same line.
    fn search_text(&self, text: &str, market: &str, head: Option<&Regex>) -> Option<f64> {
        head?.captures_iter(text).find_map(|caps| {
            let line = caps.get(1)?;
            if line.as_str() != market {
                return None;
            }
            let rest = &text[line.end()..];
            if continues_number(rest) {
                return None;
            }
            let window = window_end(rest, self.settings.lookahead);
            let start = rest[..window].find(|c: char| c.is_ascii_digit())?;
            parse_decimal(leading_number(&rest[start..]))
        })
    }
}

/// `<keyword> <line>` with the line captured; `None` when no keyword is usable.
fn head_regex<'a>(keywords: impl Iterator<Item = &'a str>) -> Option<Regex> {
    let alt = keyword_alternation(keywords)?;
    Regex::new(&format!(r"(?i:\b(?:{alt}))\s+(\d+(?:\.\d+)?)")).ok()
}

fn keyword_alternation<'a>(keywords: impl Iterator<Item = &'a str>) -> Option<String> {
    let alternatives: Vec<String> = keywords
        .map(|k| {
            k.split_whitespace()
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(r"\s+")
        })
        .filter(|k| !k.is_empty())
        .collect();
    if alternatives.is_empty() {
        None
    } else {
        Some(alternatives.join("|"))
    }
}

fn same_keyword(configured: &str, found: &str) -> bool {
    let a = configured.split_whitespace().collect::<Vec<_>>().join(" ");
    let b = found.split_whitespace().collect::<Vec<_>>().join(" ");
    a.eq_ignore_ascii_case(&b)
}

/// The market line must end where the match ends: "9.5" never matches "9.55".
fn continues_number(rest: &str) -> bool {
    let mut chars = rest.chars();
    match chars.next() {
        Some(c) if c.is_ascii_digit() => true,
        Some('.') | Some(',') => chars.next().is_some_and(|c| c.is_ascii_digit()),
        _ => false,
    }
}

/// Byte offset where the lookahead window stops: after `lookahead` chars or
/// at the first newline, whichever comes first.
fn window_end(rest: &str, lookahead: usize) -> usize {
    for (count, (idx, c)) in rest.char_indices().enumerate() {
        if count == lookahead || c == '\n' {
            return idx;
        }
    }
    rest.len()
}

fn leading_number(s: &str) -> &str {
    let int_len = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let tail = &s[int_len..];
    if let Some(frac) = tail.strip_prefix('.') {
        let frac_len = frac.find(|c: char| !c.is_ascii_digit()).unwrap_or(frac.len());
        if frac_len > 0 {
            return &s[..int_len + 1 + frac_len];
        }
    }
    &s[..int_len]
}

fn locate_any(document: &Html, strategies: &[LocatorStrategy], market: &str) -> Option<f64> {
    strategies.iter().find_map(|strategy| locate(document, strategy, market))
}

fn locate(document: &Html, strategy: &LocatorStrategy, market: &str) -> Option<f64> {
    match strategy {
        LocatorStrategy::Css { css } => {
            let selector = Selector::parse(css).ok()?;
            document
                .select(&selector)
                .find_map(|el| parse_decimal(&element_text(el)))
        }
        LocatorStrategy::Row { row, label, value, keyword } => {
            let row_sel = Selector::parse(row).ok()?;
            let label_sel = Selector::parse(label).ok()?;
            let value_sel = Selector::parse(value).ok()?;
            document
                .select(&row_sel)
                .filter(|r| {
                    r.select(&label_sel)
                        .any(|l| label_matches(&element_text(l), market, keyword.as_deref()))
                })
                .flat_map(|r| r.select(&value_sel))
                .find_map(|v| parse_decimal(&element_text(v)))
        }
    }
}

fn element_text(el: ElementRef) -> String {
    el.text().collect::<String>()
}

fn label_matches(label: &str, market: &str, keyword: Option<&str>) -> bool {
    let label = normalize_text(label);
    if let Some(keyword) = keyword {
        if !label.to_lowercase().contains(&keyword.to_lowercase()) {
            return false;
        }
    }
    contains_line(&label, market)
}

/// True when `market` appears as a whole number in `text`.
fn contains_line(text: &str, market: &str) -> bool {
    text.match_indices(market).any(|(idx, _)| {
        let before_ok = text[..idx]
            .chars()
            .next_back()
            .is_none_or(|c| !c.is_ascii_digit() && c != '.');
        before_ok && !continues_number(&text[idx + market.len()..])
    })
}

/// Normalized text for the regex stage: the rendered text when the driver
/// gave one, otherwise text nodes from the markup.
fn searchable_text(content: &PageContent, document: Option<&Html>) -> String {
    match (&content.text, document) {
        (Some(text), _) => normalize_text(text),
        (None, Some(doc)) => normalize_text(&markup_text(doc)),
        (None, None) => normalize_text(&markup_text(&Html::parse_document(&content.markup))),
    }
}

/// Text nodes outside scripts and styles; nodes sharing a block element join
/// with a space, different blocks or a `<br>` start a new line.
fn markup_text(document: &Html) -> String {
    let mut out = String::new();
    let mut current_block = None;
    let mut line_break = false;

    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            if node.value().as_element().is_some_and(|el| el.name() == "br") {
                line_break = true;
            }
            continue;
        };
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }

        let mut block = None;
        let mut skipped = false;
        for ancestor in node.ancestors() {
            if let Some(el) = ancestor.value().as_element() {
                if SKIPPED_TAGS.contains(&el.name()) {
                    skipped = true;
                    break;
                }
                if block.is_none() && BLOCK_TAGS.contains(&el.name()) {
                    block = Some(ancestor.id());
                }
            }
        }
        if skipped {
            continue;
        }

        if !out.is_empty() {
            out.push(if block == current_block && !line_break { ' ' } else { '\n' });
        }
        out.push_str(trimmed);
        current_block = block;
        line_break = false;
    }

    out
}
