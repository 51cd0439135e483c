//! Parser for the live region reference page.
//!
//! The page groups towns under county headings inside LibGuides content boxes.
//! Two passes are tried: the structured heading walk, then a looser search for
//! the first list following each known county name.

use docketrace_shared::Region;
use scraper::{ElementRef, Html, Node, Selector};
use tracing::debug;

use crate::embedded::known_areas;

/// Parse regions grouped by parent area. Returns an empty list when the
/// markup does not match either layout.
pub(crate) fn parse_regions(html: &str) -> Vec<Region> {
    let doc = Html::parse_document(html);

    let mut groups = parse_county_sections(&doc);
    if groups.is_empty() {
        debug!("county headings not found, trying alternative layout");
        groups = parse_by_known_areas(&doc);
    }

    groups
        .into_iter()
        .flat_map(|(area, names)| {
            names
                .into_iter()
                .map(move |name| Region::new(name, area.clone()))
        })
        .collect()
}

/// Strip descriptive decoration from a region name.
///
/// `"Middletown (city)"`, `"City of Middletown"`, `"Middletown."` all clean to
/// `"Middletown"`.
pub fn clean_region_name(text: &str) -> String {
    let mut cleaned = strip_prefix_ignore_case(text.trim(), &["town of ", "city of "]).to_string();

    if let Some(idx) = cleaned.find('(') {
        cleaned.truncate(idx);
    }

    cleaned
        .trim()
        .trim_end_matches(['.', ',', ';', ':'])
        .trim()
        .to_string()
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefixes: &[&str]) -> &'a str {
    for prefix in prefixes {
        if let Some(head) = text.get(..prefix.len()) {
            if head.eq_ignore_ascii_case(prefix) {
                return text[prefix.len()..].trim_start();
            }
        }
    }
    text
}

// ---------------------------------------------------------------------------
// Primary layout: county headings followed by lists
// ---------------------------------------------------------------------------

fn parse_county_sections(doc: &Html) -> Vec<(String, Vec<String>)> {
    let box_sel = Selector::parse("div.s-lg-box-content").unwrap();
    let header_sel = Selector::parse("h3, h4, strong").unwrap();
    let li_sel = Selector::parse("li").unwrap();

    let mut groups: Vec<(String, Vec<String>)> = Vec::new();

    for content in doc.select(&box_sel) {
        for header in content.select(&header_sel) {
            let header_text = element_text(&header);
            if !header_text.contains("County") {
                continue;
            }
            let area = header_text.replace("County", "").trim().to_string();

            let mut names = Vec::new();
            for sibling in header.next_siblings().filter_map(ElementRef::wrap) {
                let tag = sibling.value().name();
                if is_county_header(&sibling) {
                    break;
                }
                match tag {
                    "ul" => {
                        names.extend(
                            sibling
                                .select(&li_sel)
                                .map(|li| clean_region_name(&element_text(&li)))
                                .filter(|n| !n.is_empty()),
                        );
                    }
                    "p" => {
                        names.extend(
                            element_text(&sibling)
                                .split(',')
                                .map(clean_region_name)
                                .filter(|n| n.chars().count() > 2),
                        );
                    }
                    _ => {}
                }
            }

            if !names.is_empty() {
                merge_group(&mut groups, area, names);
            }
        }
    }

    groups
}

fn is_county_header(el: &ElementRef<'_>) -> bool {
    matches!(el.value().name(), "h3" | "h4" | "strong") && element_text(el).contains("County")
}

// ---------------------------------------------------------------------------
// Alternative layout: first list after a known county mention
// ---------------------------------------------------------------------------

fn parse_by_known_areas(doc: &Html) -> Vec<(String, Vec<String>)> {
    let li_sel = Selector::parse("li").unwrap();
    let mut groups = Vec::new();

    for area in known_areas() {
        let mut seen_mention = false;

        for node in doc.root_element().descendants() {
            match node.value() {
                Node::Text(text) if text.contains(area) => seen_mention = true,
                Node::Element(el) if seen_mention && el.name() == "ul" => {
                    let Some(list) = ElementRef::wrap(node) else {
                        continue;
                    };
                    let names: Vec<String> = list
                        .select(&li_sel)
                        .map(|li| clean_region_name(&element_text(&li)))
                        .filter(|n| !n.is_empty())
                        .collect();
                    if !names.is_empty() {
                        groups.push((area.to_string(), names));
                        break;
                    }
                    seen_mention = false;
                }
                _ => {}
            }
        }
    }

    groups
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn element_text(el: &ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn merge_group(groups: &mut Vec<(String, Vec<String>)>, area: String, names: Vec<String>) {
    match groups.iter_mut().find(|(a, _)| *a == area) {
        Some((_, existing)) => existing.extend(names),
        None => groups.push((area, names)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_strips_decoration() {
        assert_eq!(clean_region_name("Middletown (city)"), "Middletown");
        assert_eq!(clean_region_name("  City of Norwich "), "Norwich");
        assert_eq!(clean_region_name("Town of Vernon"), "Vernon");
        assert_eq!(clean_region_name("Groton (includes Mystic)"), "Groton");
        assert_eq!(clean_region_name("Putnam.;"), "Putnam");
        assert_eq!(clean_region_name("East Hampton (town)"), "East Hampton");
    }

    #[test]
    fn parses_county_sections() {
        let html = r#"<html><body>
            <div class="s-lg-box-content">
                <h3>Middlesex County</h3>
                <ul><li>Middletown (city)</li><li>Durham</li><li>Town of Essex</li></ul>
                <h3>Tolland County</h3>
                <p>Andover, Bolton, Columbia, ab</p>
            </div>
            <div class="s-lg-box-content"><h4>Resources</h4><ul><li>Ignored</li></ul></div>
        </body></html>"#;

        let regions = parse_regions(html);
        assert_eq!(regions.len(), 6);
        assert_eq!(regions[0], Region::new("Middletown", "Middlesex"));
        assert_eq!(regions[2], Region::new("Essex", "Middlesex"));
        assert!(regions.contains(&Region::new("Bolton", "Tolland")));
        // Too-short paragraph fragments are dropped
        assert!(!regions.iter().any(|r| r.name == "ab"));
        assert!(!regions.iter().any(|r| r.name == "Ignored"));
    }

    #[test]
    fn falls_back_to_known_area_mentions() {
        let html = r#"<html><body>
            <p>Towns of Windham</p>
            <ul><li>Ashford</li><li>Brooklyn</li></ul>
            <div>Hartford area</div>
            <ul><li>Avon</li></ul>
        </body></html>"#;

        let regions = parse_regions(html);
        assert!(regions.contains(&Region::new("Ashford", "Windham")));
        assert!(regions.contains(&Region::new("Avon", "Hartford")));
    }

    #[test]
    fn unrelated_markup_yields_nothing() {
        let html = "<html><body><h1>Maintenance</h1><p>Back soon.</p></body></html>";
        assert!(parse_regions(html).is_empty());
    }
}
