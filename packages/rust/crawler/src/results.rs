//! Parsing of the rendered search results grid.

use docketrace_shared::{Case, Defendant};
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};
use url::Url;

use crate::session::{RESULTS_TABLE_ID, STATUS_MESSAGE_ID};

/// Minimum number of `td` cells in a data row.
const MIN_CELLS: usize = 5;

/// Separator between plaintiff and defendant in a case name.
const PARTY_SEPARATOR: &str = " v. ";

/// One result row: the case and the defendant named on it.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedCase {
    pub case: Case,
    pub defendant: Defendant,
}

/// Parse the results grid out of a rendered page.
///
/// A page without the grid yields no cases; its status message, if any, is
/// logged. Rows with too few cells or no docket number are skipped.
pub fn parse_results(html: &str, origin: &Url, region: &str) -> Vec<ExtractedCase> {
    let doc = Html::parse_document(html);

    let table_sel = Selector::parse(&format!("table#{RESULTS_TABLE_ID}")).unwrap();
    let Some(table) = doc.select(&table_sel).next() else {
        let msg_sel = Selector::parse(&format!("#{STATUS_MESSAGE_ID}")).unwrap();
        match doc.select(&msg_sel).next().map(|el| cell_text(&el)) {
            Some(msg) if !msg.is_empty() => info!(region, message = %msg, "no results table"),
            _ => warn!(region, "no results table and no status message"),
        }
        return Vec::new();
    };

    let tr_sel = Selector::parse("tr").unwrap();
    let td_sel = Selector::parse("td").unwrap();
    let a_sel = Selector::parse("a[href]").unwrap();

    let mut cases = Vec::new();
    let mut skipped = 0usize;

    for row in table.select(&tr_sel) {
        let cells: Vec<ElementRef<'_>> = row.select(&td_sel).collect();
        if cells.len() < MIN_CELLS {
            skipped += 1;
            continue;
        }

        let docket_cell = &cells[4];
        let docket_number = cell_text(docket_cell);
        if docket_number.is_empty() {
            skipped += 1;
            continue;
        }

        let docket_url = docket_cell
            .select(&a_sel)
            .next()
            .and_then(|a| a.value().attr("href"))
            .map(|href| resolve_link(origin, href))
            .unwrap_or_default();

        let address = cell_text(&cells[1]);
        let case_name = cell_text(&cells[3]);
        let defendant_name = defendant_from_case_name(&case_name);

        let normalized = docketrace_address::normalize(&address, region);
        let defendant = Defendant {
            name: defendant_name,
            docket_number: docket_number.clone(),
            address: (!address.is_empty()).then_some(address),
            region: region.to_string(),
            state: non_empty(normalized.state),
            postal_code: non_empty(normalized.postal_code),
        };

        cases.push(ExtractedCase {
            case: Case {
                case_name,
                docket_number,
                docket_url,
                region: region.to_string(),
            },
            defendant,
        });
    }

    debug!(region, rows = cases.len(), skipped, "parsed results table");
    cases
}

/// Last party named in a case title.
pub fn defendant_from_case_name(case_name: &str) -> String {
    case_name
        .rsplit(PARTY_SEPARATOR)
        .next()
        .unwrap_or(case_name)
        .trim()
        .to_string()
}

fn resolve_link(origin: &Url, href: &str) -> String {
    match origin.join(href.trim()) {
        Ok(url) => url.to_string(),
        Err(e) => {
            warn!(href, error = %e, "unresolvable docket link");
            String::new()
        }
    }
}

fn cell_text(el: &ElementRef<'_>) -> String {
    el.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn non_empty(s: String) -> Option<String> {
    (!s.is_empty()).then_some(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> Url {
        Url::parse("https://civilinquiry.jud.ct.gov/").unwrap()
    }

    fn row(address: &str, case_name: &str, docket: &str, href: Option<&str>) -> String {
        let docket_cell = match href {
            Some(h) => format!(r#"<a href="{h}">{docket}</a>"#),
            None => docket.to_string(),
        };
        format!(
            "<tr><td>1</td><td>{address}</td><td>x</td><td>{case_name}</td><td>{docket_cell}</td></tr>"
        )
    }

    fn page(rows: &[String]) -> String {
        format!(
            r#"<html><body><table id="{RESULTS_TABLE_ID}">
            <tr><th>#</th><th>Address</th><th>Town</th><th>Case</th><th>Docket</th></tr>
            {}
            </table></body></html>"#,
            rows.join("\n")
        )
    }

    #[test]
    fn parses_rows_and_resolves_links() {
        let html = page(&[row(
            "123 Main St, Middletown CT 06457",
            "US Bank v. John Smith",
            "MMX-CV24-6012345-S",
            Some("CaseDetail/PublicCaseDetail.aspx?DocketNo=MMXCV246012345S"),
        )]);

        let cases = parse_results(&html, &origin(), "Middletown");
        assert_eq!(cases.len(), 1);

        let c = &cases[0];
        assert_eq!(c.case.docket_number, "MMX-CV24-6012345-S");
        assert_eq!(c.case.case_name, "US Bank v. John Smith");
        assert_eq!(
            c.case.docket_url,
            "https://civilinquiry.jud.ct.gov/CaseDetail/PublicCaseDetail.aspx?DocketNo=MMXCV246012345S"
        );
        assert_eq!(c.case.region, "Middletown");
        assert_eq!(c.defendant.name, "John Smith");
        assert_eq!(c.defendant.docket_number, c.case.docket_number);
        assert_eq!(c.defendant.state.as_deref(), Some("CT"));
        assert_eq!(c.defendant.postal_code.as_deref(), Some("06457"));
    }

    #[test]
    fn short_and_empty_rows_are_skipped() {
        let mut rows = vec![
            "<tr><td>only</td><td>three</td><td>cells</td></tr>".to_string(),
            row("See Clerk", "A v. B", "", None),
        ];
        rows.push(row("See Clerk", "Bank v. Jane Doe", "NNH-CV23-1", None));

        let cases = parse_results(&page(&rows), &origin(), "New Haven");
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].defendant.name, "Jane Doe");
        assert_eq!(cases[0].defendant.address.as_deref(), Some("See Clerk"));
        assert!(cases[0].defendant.state.is_none());
        assert!(cases[0].case.docket_url.is_empty());
    }

    #[test]
    fn status_message_means_zero_results() {
        let html = format!(
            r#"<html><body><span id="{STATUS_MESSAGE_ID}">No records found.</span></body></html>"#
        );
        assert!(parse_results(&html, &origin(), "Union").is_empty());
    }

    #[test]
    fn unrecognised_page_means_zero_results() {
        assert!(parse_results("<html><body>Service unavailable</body></html>", &origin(), "Union").is_empty());
    }

    #[test]
    fn defendant_is_last_party() {
        assert_eq!(defendant_from_case_name("A v. B v. C"), "C");
        assert_eq!(defendant_from_case_name("No separator"), "No separator");
        assert_eq!(defendant_from_case_name("Bank v.  Ann Lee "), "Ann Lee");
    }
}
