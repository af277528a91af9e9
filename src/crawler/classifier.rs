//! Page classification
//!
//! Every page of the code directory lists the children of one node as table
//! rows whose CSS class names the level (`villagetr`, `towntr`, ...). This
//! module decides which level a page holds and lifts its rows out of the DOM
//! into owned values, so the parsed document never outlives classification.

use crate::area::AreaLevel;
use scraper::{ElementRef, Html, Selector};

/// Row markers in priority order, deepest level first
///
/// Malformed pages can carry stray rows of several levels; the deepest
/// one wins because that is how the publisher nests them.
const ROW_MARKERS: [(AreaLevel, &str); 5] = [
    (AreaLevel::Village, "tr.villagetr"),
    (AreaLevel::Town, "tr.towntr"),
    (AreaLevel::County, "tr.countytr"),
    (AreaLevel::City, "tr.citytr"),
    (AreaLevel::Province, "tr.provincetr td"),
];

/// Marker of the placeholder page used for merged leaf entries
const PLACEHOLDER_MARKER: &str = "a.STYLE3";

/// One table cell: its text and the target of its first link, if any
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub text: String,
    pub href: Option<String>,
}

/// One table row of a directory page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    pub cells: Vec<Cell>,
}

impl RawRow {
    /// Returns the cell at `index`
    pub fn cell(&self, index: usize) -> Option<&Cell> {
        self.cells.get(index)
    }
}

/// Outcome of classifying one page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageClass {
    /// Rows of a single level, in document order
    Rows { level: AreaLevel, rows: Vec<RawRow> },

    /// A recognised terminal page with nothing to persist or follow
    NoData,

    /// No known marker; the branch cannot be interpreted
    Unrecognized { document: String },
}

/// Classifies a directory page by its row markers
///
/// # Example
///
/// ```
/// use area_info::crawler::{classify, PageClass};
/// use area_info::AreaLevel;
///
/// let html = r#"<table><tr class="citytr">
///     <td><a href="11/1101.html">110100000000</a></td>
///     <td><a href="11/1101.html">市辖区</a></td>
/// </tr></table>"#;
///
/// match classify(html) {
///     PageClass::Rows { level, rows } => {
///         assert_eq!(level, AreaLevel::City);
///         assert_eq!(rows[0].cells[1].text, "市辖区");
///     }
///     other => panic!("unexpected {:?}", other),
/// }
/// ```
pub fn classify(html: &str) -> PageClass {
    let document = Html::parse_document(html);

    for (level, css) in ROW_MARKERS {
        let Ok(selector) = Selector::parse(css) else {
            continue;
        };

        let rows: Vec<RawRow> = if level == AreaLevel::Province {
            // Each province is one cell of a grid row.
            document
                .select(&selector)
                .map(|td| RawRow {
                    cells: vec![read_cell(td)],
                })
                .filter(|row| !row.cells[0].text.is_empty())
                .collect()
        } else {
            document.select(&selector).map(read_row).collect()
        };

        if !rows.is_empty() {
            return PageClass::Rows { level, rows };
        }
    }

    if let Ok(placeholder) = Selector::parse(PLACEHOLDER_MARKER) {
        if document.select(&placeholder).next().is_some() {
            return PageClass::NoData;
        }
    }

    PageClass::Unrecognized {
        document: html.to_string(),
    }
}

fn read_row(tr: ElementRef<'_>) -> RawRow {
    let cells = match Selector::parse("td") {
        Ok(td) => tr.select(&td).map(read_cell).collect(),
        Err(_) => Vec::new(),
    };
    RawRow { cells }
}

fn read_cell(td: ElementRef<'_>) -> Cell {
    let text = td.text().collect::<String>().trim().to_string();
    let href = Selector::parse("a[href]").ok().and_then(|a| {
        td.select(&a)
            .next()
            .and_then(|link| link.value().attr("href"))
            .map(|href| href.trim().to_string())
    });
    Cell { text, href }
}
