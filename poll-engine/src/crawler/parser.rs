//! Poll table extraction.
//!
//! `scraper::Html` is not `Send`, so a page is parsed in one synchronous step
//! into an owned [`ParsedPage`] that can cross await points.

use chrono::NaiveDate;
use poll_common::{CrawlerConfig, Error, Result, SelectorConfig};
use scraper::{ElementRef, Html, Selector};
use tracing::trace;
use url::Url;

use crate::party::{NameFallback, Party, PartyId};
use crate::poll::RawPoll;
use crate::region::Region;

/// Path prefix of per-state poll pages.
const STATE_PAGE_PREFIX: &str = "landtage/";

/// Everything extracted from one page.
#[derive(Debug, Clone, Default)]
pub struct ParsedPage {
    pub polls: Vec<RawPoll>,
    /// Absolute, fragment-free "more sources" links.
    pub links: Vec<Url>,
}

/// Compiled selectors plus the base URL pollster labels are relative to.
#[derive(Debug, Clone)]
pub struct PageParser {
    base: Url,
    table: Selector,
    rows: Selector,
    links: Selector,
    party_class: String,
    date_class: String,
}

fn compile(selector: &str) -> Result<Selector> {
    Selector::parse(selector)
        .map_err(|e| Error::Config(format!("Invalid CSS selector {selector:?}: {e:?}")))
}

impl PageParser {
    pub fn new(base: Url, selectors: &SelectorConfig) -> Result<Self> {
        Ok(Self {
            base,
            table: compile(&selectors.table)?,
            rows: compile("tr")?,
            links: compile(&selectors.more_sources)?,
            party_class: selectors.party_header_class.clone(),
            date_class: selectors.date_cell_class.clone(),
        })
    }

    pub fn from_config(config: &CrawlerConfig) -> Result<Self> {
        let base = config
            .base()
            .map_err(|e| Error::Config(e.to_string()))?;
        Self::new(base, &config.selectors)
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Extract every poll row and navigation link from `html`.
    pub fn parse(&self, page_url: &Url, html: &str) -> ParsedPage {
        let document = Html::parse_document(html);

        let label = self.pollster_label(page_url);
        let region = region_of(&label);

        let mut polls = Vec::new();
        for table in document.select(&self.table) {
            polls.extend(self.parse_table(table, page_url, &label, region));
        }

        let links = document
            .select(&self.links)
            .filter_map(|a| a.value().attr("href"))
            .filter_map(|href| resolve_link(page_url, href))
            .collect();

        ParsedPage { polls, links }
    }

    fn parse_table(
        &self,
        table: ElementRef<'_>,
        page_url: &Url,
        label: &str,
        region: Option<Region>,
    ) -> Vec<RawPoll> {
        let rows: Vec<ElementRef<'_>> = table.select(&self.rows).collect();

        let Some(header_at) = rows
            .iter()
            .position(|row| cells(*row).any(|c| has_class(c, &self.party_class)))
        else {
            return Vec::new();
        };

        let columns: Vec<Option<PartyId>> = cells(rows[header_at])
            .map(|cell| {
                if has_class(cell, &self.party_class) {
                    Party::resolve(&text_of(cell), NameFallback::Other)
                } else {
                    None
                }
            })
            .collect();

        let mut polls = Vec::new();
        for row in &rows[header_at + 1..] {
            let row_cells: Vec<ElementRef<'_>> = cells(*row).collect();

            let Some(date) = row_cells
                .iter()
                .find(|c| has_class(**c, &self.date_class))
                .and_then(|c| parse_date(&text_of(*c)))
            else {
                continue;
            };
            if row_cells.len() < columns.len() {
                trace!(url = %page_url, %date, "Skipping short row");
                continue;
            }

            let mut builder = RawPoll::builder(date)
                .region(region)
                .pollster(label)
                .url(page_url.as_str());
            for (cell, party) in row_cells.iter().zip(&columns) {
                if let Some(party) = party {
                    builder = builder.share(*party, parse_percentage(&text_of(*cell)));
                }
            }
            polls.push(builder.build());
        }
        polls
    }

    /// Page path relative to the base URL, without file extension.
    pub fn pollster_label(&self, page_url: &Url) -> String {
        let path = page_url.path();
        let relative = path
            .strip_prefix(self.base.path())
            .unwrap_or(path)
            .trim_start_matches('/');

        match relative.rsplit_once('.') {
            Some((stem, ext)) if !ext.contains('/') => stem.to_string(),
            _ => relative.to_string(),
        }
    }
}

/// Region of a `landtage/<state>` label; anything else is nation-wide.
pub fn region_of(label: &str) -> Option<Region> {
    label
        .strip_prefix(STATE_PAGE_PREFIX)
        .and_then(Region::resolve)
}

fn cells<'a>(row: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|el| matches!(el.value().name(), "td" | "th"))
}

fn has_class(el: ElementRef<'_>, class: &str) -> bool {
    el.value().classes().any(|c| c == class)
}

fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Resolve an `href` against the page it appeared on. Only http(s) links
/// are kept; fragments are dropped.
pub fn resolve_link(page_url: &Url, href: &str) -> Option<Url> {
    let mut url = page_url.join(href.trim()).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_fragment(None);
    Some(url)
}

/// Parse an exact `dd.MM.yyyy` date.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    let bytes = text.as_bytes();
    let shaped = bytes.len() == 10
        && bytes[2] == b'.'
        && bytes[5] == b'.'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 2 || i == 5 || b.is_ascii_digit());
    if !shaped {
        return None;
    }
    NaiveDate::parse_from_str(text, "%d.%m.%Y").ok()
}

/// Parse a European percentage such as `31,5 %` into a fraction.
/// Anything unparseable is zero.
pub fn parse_percentage(text: &str) -> f64 {
    let text = text.trim();
    let number = text.strip_suffix('%').unwrap_or(text).trim();
    number
        .replace(',', ".")
        .parse::<f64>()
        .map(|v| v / 100.0)
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poll::PollResult;

    const PAGE: &str = r#"
        <html><body>
        <p class="navi">
            <a href="emnid.htm">Verian</a>
            <a href="landtage/bayern.htm#top">Bayern</a>
            <a href="mailto:info@example.org">Mail</a>
        </p>
        <table class="wilko">
            <thead>
                <tr>
                    <th>Datum</th>
                    <th class="part">CDU/CSU</th>
                    <th class="part">SPD</th>
                    <th class="part">GRÜNE</th>
                    <th class="part">Tierschutz</th>
                    <th class="part">Sonstige</th>
                    <th>Befragte</th>
                </tr>
            </thead>
            <tbody>
                <tr><td class="s">14.03.2024</td><td>30,5 %</td><td>15 %</td><td>13 %</td><td>2 %</td><td>39,5 %</td><td>1.234</td></tr>
                <tr><td class="s">Wahl 2021</td><td>24,1 %</td><td>25,7 %</td><td>14,8 %</td><td>1 %</td><td>34,4 %</td><td></td></tr>
                <tr><td class="s">01.03.2024</td><td>31 %</td><td>–</td><td>12 %</td><td>1 %</td><td>56 %</td><td>1.001</td></tr>
                <tr><td class="s">01.02.2024</td><td>31 %</td></tr>
            </tbody>
        </table>
        </body></html>
    "#;

    fn parser() -> PageParser {
        let base = Url::parse("https://polls.example.org/umfragen/").unwrap();
        PageParser::new(base, &SelectorConfig::default()).unwrap()
    }

    #[test]
    fn test_parse_percentage() {
        assert!((parse_percentage("31,5 %") - 0.315).abs() < 1e-12);
        assert!((parse_percentage("7%") - 0.07).abs() < 1e-12);
        assert_eq!(parse_percentage("–"), 0.0);
        assert_eq!(parse_percentage(""), 0.0);
    }

    #[test]
    fn test_parse_date_is_exact() {
        assert_eq!(parse_date("14.03.2024"), NaiveDate::from_ymd_opt(2024, 3, 14));
        assert_eq!(parse_date(" 01.12.1998 "), NaiveDate::from_ymd_opt(1998, 12, 1));
        assert_eq!(parse_date("1.3.2024"), None);
        assert_eq!(parse_date("2024-03-14"), None);
        assert_eq!(parse_date("31.02.2024"), None);
    }

    #[test]
    fn test_pollster_label_and_region() {
        let parser = parser();
        let url = Url::parse("https://polls.example.org/umfragen/forsa.htm").unwrap();
        assert_eq!(parser.pollster_label(&url), "forsa");

        let url = Url::parse("https://polls.example.org/umfragen/landtage/bayern.htm").unwrap();
        assert_eq!(parser.pollster_label(&url), "landtage/bayern");
        assert_eq!(region_of("landtage/bayern"), Some(Region::Bayern));
        assert_eq!(region_of("landtage/index"), None);
        assert_eq!(region_of("forsa"), None);
    }

    #[test]
    fn test_parse_table_rows() {
        let url = Url::parse("https://polls.example.org/umfragen/forsa.htm").unwrap();
        let page = parser().parse(&url, PAGE);

        // Election row has no valid date; the last row is too short
        assert_eq!(page.polls.len(), 2);

        let first = &page.polls[0];
        assert_eq!(first.date(), NaiveDate::from_ymd_opt(2024, 3, 14).unwrap());
        assert_eq!(first.pollster(), "forsa");
        assert_eq!(first.region(), None);
        assert_eq!(first.url(), Some(url.as_str()));
        // The unknown party column folds into Other
        assert!((first.share(PartyId::CDU) - 0.305).abs() < 1e-9);
        assert!((first.share(PartyId::GRUENE) - 0.13).abs() < 1e-9);
        assert!((first.share(PartyId::OTHER) - 0.415).abs() < 1e-9);
        assert!((first.total() - 1.0).abs() < 1e-9);

        let second = &page.polls[1];
        assert_eq!(second.share(PartyId::SPD), 0.0);
    }

    #[test]
    fn test_links_are_resolved() {
        let url = Url::parse("https://polls.example.org/umfragen/forsa.htm").unwrap();
        let page = parser().parse(&url, PAGE);
        let links: Vec<&str> = page.links.iter().map(|u| u.as_str()).collect();
        assert_eq!(
            links,
            vec![
                "https://polls.example.org/umfragen/emnid.htm",
                "https://polls.example.org/umfragen/landtage/bayern.htm",
            ]
        );
    }

    #[test]
    fn test_relative_backtracking() {
        let page = Url::parse("https://polls.example.org/umfragen/landtage/bayern.htm").unwrap();
        let link = resolve_link(&page, "../forsa.htm").unwrap();
        assert_eq!(link.as_str(), "https://polls.example.org/umfragen/forsa.htm");
        let link = resolve_link(&page, "https://other.example.org/a.htm").unwrap();
        assert_eq!(link.as_str(), "https://other.example.org/a.htm");
    }

    #[test]
    fn test_state_page_is_scoped() {
        let url = Url::parse("https://polls.example.org/umfragen/landtage/bayern.htm").unwrap();
        let page = parser().parse(&url, PAGE);
        assert!(page.polls.iter().all(|p| p.region() == Some(Region::Bayern)));
    }

    #[test]
    fn test_page_without_table() {
        let url = Url::parse("https://polls.example.org/umfragen/index.htm").unwrap();
        let page = parser().parse(&url, "<html><body><p>nothing</p></body></html>");
        assert!(page.polls.is_empty());
        assert!(page.links.is_empty());
    }
}
