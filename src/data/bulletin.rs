//! Bulletin page scraping.
//!
//! The bulletin publishes only the latest totals, but it is refreshed ahead
//! of the workbook, so its one record is worth a day of series. The page is
//! hand-maintained HTML; everything here anchors on structure that has been
//! stable (the `Stand:` paragraph, the table that follows it, the `Gesamt`
//! summary row) and fails loudly when that structure moves.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::domain::LatestEntry;
use crate::error::PipelineError;

const CONTEXT: &str = "bulletin page";

/// Column layout of the bulletin's totals table.
const COL_REGION: usize = 0;
const COL_CASES: usize = 1;
const COL_DEATHS: usize = 5;

/// Extract the latest record: the as-of date from the `Stand:` paragraph and
/// the totals from the `Gesamt` row of the table that follows it.
pub fn parse_latest_entry(html: &str) -> Result<LatestEntry, PipelineError> {
    let document = Html::parse_document(html);
    let main = document
        .select(&selector("div#main")?)
        .next()
        .ok_or_else(|| PipelineError::malformed(CONTEXT, "no `div#main` container"))?;

    let stand_re = Regex::new(r"Stand:\s*(\d{1,2}\.\d{1,2}\.\d{4})")
        .map_err(|e| PipelineError::malformed(CONTEXT, format!("bad date pattern: {e}")))?;

    let mut dated_paragraph = None;
    for paragraph in main.select(&selector("p")?) {
        let text = flat_text(paragraph);
        if let Some(caps) = stand_re.captures(&text) {
            let date = chrono::NaiveDate::parse_from_str(&caps[1], "%d.%m.%Y").map_err(|_| {
                PipelineError::TypeMismatch {
                    field: "Stand".to_string(),
                    expected: "a DD.MM.YYYY date",
                    value: caps[1].to_string(),
                }
            })?;
            dated_paragraph = Some((date, paragraph));
            break;
        }
    }
    let (date, paragraph) = dated_paragraph
        .ok_or_else(|| PipelineError::malformed(CONTEXT, "no paragraph with a `Stand:` date"))?;

    let table = following_table(paragraph).ok_or_else(|| {
        PipelineError::malformed(CONTEXT, "no table follows the `Stand:` paragraph")
    })?;

    let last_row = table
        .select(&selector("tbody tr")?)
        .last()
        .ok_or_else(|| PipelineError::malformed(CONTEXT, "totals table has no body rows"))?;
    let cells: Vec<String> = last_row
        .select(&selector("td, th")?)
        .map(flat_text)
        .collect();

    if cells.get(COL_REGION).map(String::as_str) != Some("Gesamt") {
        return Err(PipelineError::malformed(
            CONTEXT,
            format!(
                "last table row starts with {:?}, not the `Gesamt` summary",
                cells.first().map(String::as_str).unwrap_or("")
            ),
        ));
    }
    if cells.len() <= COL_DEATHS {
        return Err(PipelineError::malformed(
            CONTEXT,
            format!("summary row has {} columns, expected more than {COL_DEATHS}", cells.len()),
        ));
    }

    Ok(LatestEntry {
        date,
        cases: parse_grouped_count("Gesamt cases", &cells[COL_CASES])?,
        deaths: parse_grouped_count("Gesamt deaths", &cells[COL_DEATHS])?,
    })
}

/// Resolve the single workbook download link on a landing page.
pub fn find_download_link(html: &str, base: &str) -> Result<reqwest::Url, PipelineError> {
    let document = Html::parse_document(html);
    let links: Vec<ElementRef<'_>> = document
        .select(&selector("a.more.downloadLink.InternalLink")?)
        .collect();
    if links.len() != 1 {
        return Err(PipelineError::malformed(
            "download landing page",
            format!("expected exactly one download link, found {}", links.len()),
        ));
    }
    let href = links[0].value().attr("href").ok_or_else(|| {
        PipelineError::malformed("download landing page", "download link has no href")
    })?;
    let base = reqwest::Url::parse(base)
        .map_err(|e| PipelineError::Config(format!("invalid base URI '{base}': {e}")))?;
    base.join(href).map_err(|e| {
        PipelineError::malformed("download landing page", format!("unusable href '{href}': {e}"))
    })
}

fn selector(css: &str) -> Result<Selector, PipelineError> {
    Selector::parse(css)
        .map_err(|e| PipelineError::malformed(CONTEXT, format!("invalid selector `{css}`: {e}")))
}

/// First `<table>` element among the following siblings.
fn following_table(from: ElementRef<'_>) -> Option<ElementRef<'_>> {
    let mut node = from.next_sibling();
    while let Some(current) = node {
        if let Some(element) = ElementRef::wrap(current) {
            if element.value().name() == "table" {
                return Some(element);
            }
        }
        node = current.next_sibling();
    }
    None
}

/// Element text with collapsed whitespace.
fn flat_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Counts are printed with dotted thousands separators (`154.545`).
fn parse_grouped_count(field_label: &'static str, text: &str) -> Result<u64, PipelineError> {
    text.trim()
        .replace('.', "")
        .parse::<u64>()
        .map_err(|_| PipelineError::TypeMismatch {
            field: field_label.to_string(),
            expected: "a dot-grouped count",
            value: text.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body><div id="main">
            <h1>Fallzahlen</h1>
            <p>Hinweis zur Methodik.</p>
            <p>Fallzahlen in Deutschland (Stand: 24.4.2020, 0:00 Uhr)</p>
            <table>
                <thead><tr><th>Bundesland</th><th>F&auml;lle</th><th>Differenz</th>
                    <th>pro 100k</th><th>..</th><th>Todesf&auml;lle</th></tr></thead>
                <tbody>
                    <tr><td>Bayern</td><td>40.511</td><td>+840</td><td>310</td><td>..</td><td>1.373</td></tr>
                    <tr><td>Berlin</td><td>5.312</td><td>+89</td><td>145</td><td>..</td><td>119</td></tr>
                    <tr><td>Gesamt</td><td>150.383</td><td>+2.337</td><td>181</td><td>..</td><td>5.321</td></tr>
                </tbody>
            </table>
        </div></body></html>
    "#;

    #[test]
    fn latest_entry_from_the_totals_row() {
        let entry = parse_latest_entry(PAGE).unwrap();
        assert_eq!(entry.date, "2020-04-24".parse().unwrap());
        assert_eq!(entry.cases, 150_383);
        assert_eq!(entry.deaths, 5_321);
    }

    #[test]
    fn page_without_a_dated_paragraph_is_malformed() {
        let html = r#"<div id="main"><p>Kein Datum hier.</p><table><tbody>
            <tr><td>Gesamt</td><td>1</td></tr></tbody></table></div>"#;
        assert!(parse_latest_entry(html).is_err());
    }

    #[test]
    fn page_whose_last_row_is_not_the_summary_is_malformed() {
        let html = r#"<div id="main">
            <p>Stand: 24.04.2020</p>
            <table><tbody>
                <tr><td>Gesamt</td><td>150.383</td><td>a</td><td>b</td><td>c</td><td>5.321</td></tr>
                <tr><td>Bayern</td><td>40.511</td><td>a</td><td>b</td><td>c</td><td>1.373</td></tr>
            </tbody></table></div>"#;
        let err = parse_latest_entry(html).unwrap_err();
        assert!(err.to_string().contains("Gesamt"));
    }

    #[test]
    fn short_summary_rows_are_malformed() {
        let html = r#"<div id="main">
            <p>Stand: 24.04.2020</p>
            <table><tbody><tr><td>Gesamt</td><td>150.383</td></tr></tbody></table></div>"#;
        assert!(parse_latest_entry(html).is_err());
    }

    #[test]
    fn garbled_counts_are_type_mismatches() {
        let html = r#"<div id="main">
            <p>Stand: 24.04.2020</p>
            <table><tbody>
                <tr><td>Gesamt</td><td>viele</td><td>a</td><td>b</td><td>c</td><td>5.321</td></tr>
            </tbody></table></div>"#;
        let err = parse_latest_entry(html).unwrap_err();
        match err {
            PipelineError::TypeMismatch { field, .. } => assert_eq!(field, "Gesamt cases"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn intervening_markup_between_paragraph_and_table_is_fine() {
        let html = r#"<div id="main">
            <p>Stand: 2.3.2020</p>
            <div class="hinweis">Siehe auch.</div>
            <table><tbody>
                <tr><td>Gesamt</td><td>157</td><td>a</td><td>b</td><td>c</td><td>0</td></tr>
            </tbody></table></div>"#;
        let entry = parse_latest_entry(html).unwrap();
        assert_eq!(entry.date, "2020-03-02".parse().unwrap());
        assert_eq!(entry.cases, 157);
        assert_eq!(entry.deaths, 0);
    }

    #[test]
    fn download_link_resolves_against_the_base() {
        let html = r#"<html><body>
            <a class="more downloadLink InternalLink"
               href="/DE/Daten/Fallzahlen_Tab.xlsx?__blob=publicationFile">Tabelle</a>
        </body></html>"#;
        let url =
            find_download_link(html, "https://www.rki.de/DE/Content/InfAZ/Daten.html").unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.rki.de/DE/Daten/Fallzahlen_Tab.xlsx?__blob=publicationFile"
        );
    }

    #[test]
    fn ambiguous_download_links_are_rejected() {
        let none = r#"<html><body><a href="/x.xlsx">x</a></body></html>"#;
        assert!(find_download_link(none, "https://www.rki.de/").is_err());

        let two = r#"<html><body>
            <a class="more downloadLink InternalLink" href="/a.xlsx">a</a>
            <a class="more downloadLink InternalLink" href="/b.xlsx">b</a>
        </body></html>"#;
        assert!(find_download_link(two, "https://www.rki.de/").is_err());
    }
}
