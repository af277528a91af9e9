//! Record building
//!
//! Turns the rows of one classified page into `AreaRecord`s and the list of
//! child pages to visit next.

use crate::area::{AreaId, AreaLevel, AreaRecord, ChildPage, ParentNode};
use crate::crawler::classifier::RawRow;
use crate::{AreaError, Result};
use chrono::NaiveDate;
use url::Url;

/// Width of a synthesized province code
const CODE_WIDTH: usize = 12;

/// Everything the rows of one page inherit
#[derive(Debug, Clone, Copy)]
pub struct PageScope<'a> {
    /// URL of the page the rows came from; child links resolve against it
    pub url: &'a Url,

    pub year: u16,

    pub release_date: NaiveDate,

    /// The node whose children this page lists; None on a year index page
    pub parent: Option<&'a ParentNode>,

    /// Ancestor ids shared by every record on the page
    pub parents_id: &'a [AreaId],
}

/// Builds the records of one page
///
/// Each record is pushed onto `sink` as soon as it is built. The returned
/// child pages are in row order.
///
/// # Errors
///
/// * `IdOverflow` - the page has more rows than the level's id field holds
/// * `MalformedRow` - a row lacks the columns its level needs, or the page
///   level does not sit below its parent
pub fn build_records(
    rows: &[RawRow],
    level: AreaLevel,
    scope: &PageScope<'_>,
    sink: &mut Vec<AreaRecord>,
) -> Result<Vec<ChildPage>> {
    if rows.len() as u64 > level.capacity() {
        return Err(AreaError::IdOverflow {
            level,
            index: rows.len() - 1,
            capacity: level.capacity(),
        });
    }

    match (level, scope.parent) {
        (AreaLevel::Province, None) => build_provinces(rows, scope, sink),
        (AreaLevel::Province, Some(_)) => Err(malformed(
            scope,
            level,
            rows.first(),
            "province rows below the year index",
        )),
        (_, None) => Err(malformed(scope, level, rows.first(), "no parent node")),
        (_, Some(parent)) if parent.level >= level => Err(malformed(
            scope,
            level,
            rows.first(),
            &format!("page is not below its {} parent", parent.level),
        )),
        (AreaLevel::Village, Some(parent)) => {
            build_villages(rows, parent, scope, sink)?;
            Ok(Vec::new())
        }
        (_, Some(parent)) => build_divisions(rows, level, parent, scope, sink),
    }
}

/// Province cells: the link supplies both the child page and the code prefix
///
/// Territories without a published code (台湾省, 香港, 澳门) appear without a
/// link; they are skipped and do not take a sibling index.
fn build_provinces(
    rows: &[RawRow],
    scope: &PageScope<'_>,
    sink: &mut Vec<AreaRecord>,
) -> Result<Vec<ChildPage>> {
    let mut children = Vec::with_capacity(rows.len());
    let mut index = 0;

    for row in rows {
        let Some(cell) = row.cell(0) else {
            continue;
        };
        let Some(href) = cell.href.as_deref() else {
            tracing::debug!("Skipping province without a link: {}", cell.text);
            continue;
        };

        let record = AreaRecord {
            id: AreaId::encode(AreaLevel::Province, index, None)?,
            number: province_number(href),
            name: cell.text.clone(),
            full_name: cell.text.clone(),
            area_type: None,
            level: AreaLevel::Province,
            year: scope.year,
            parents_id: Vec::new(),
            release_date: scope.release_date,
        };
        children.push(ChildPage::new(scope.url.join(href)?, &record));
        sink.push(record);
        index += 1;
    }

    Ok(children)
}

/// City, county and town rows: `[code, name]`, with an optional link on the code
fn build_divisions(
    rows: &[RawRow],
    level: AreaLevel,
    parent: &ParentNode,
    scope: &PageScope<'_>,
    sink: &mut Vec<AreaRecord>,
) -> Result<Vec<ChildPage>> {
    let mut children = Vec::new();

    for (index, row) in rows.iter().enumerate() {
        let (Some(code), Some(name)) = (row.cell(0), row.cell(1)) else {
            return Err(malformed(scope, level, Some(row), "expected code and name columns"));
        };

        let record = AreaRecord {
            id: AreaId::encode(level, index, Some(parent.id))?,
            number: code.text.clone(),
            name: name.text.clone(),
            full_name: parent.child_full_name(&name.text),
            area_type: None,
            level,
            year: scope.year,
            parents_id: scope.parents_id.to_vec(),
            release_date: scope.release_date,
        };
        // No link means the division has no further subdivision.
        if let Some(href) = code.href.as_deref() {
            children.push(ChildPage::new(scope.url.join(href)?, &record));
        }
        sink.push(record);
    }

    Ok(children)
}

/// Village rows: `[code, type, name]`, always leaves
fn build_villages(
    rows: &[RawRow],
    parent: &ParentNode,
    scope: &PageScope<'_>,
    sink: &mut Vec<AreaRecord>,
) -> Result<()> {
    let level = AreaLevel::Village;

    for (index, row) in rows.iter().enumerate() {
        let (Some(code), Some(kind), Some(name)) = (row.cell(0), row.cell(1), row.cell(2)) else {
            return Err(malformed(scope, level, Some(row), "expected code, type and name columns"));
        };
        let area_type = kind.text.parse::<u16>().map_err(|_| {
            malformed(scope, level, Some(row), &format!("type '{}' is not a number", kind.text))
        })?;

        sink.push(AreaRecord {
            id: AreaId::encode(level, index, Some(parent.id))?,
            number: code.text.clone(),
            name: name.text.clone(),
            full_name: parent.child_full_name(&name.text),
            area_type: Some(area_type),
            level,
            year: scope.year,
            parents_id: scope.parents_id.to_vec(),
            release_date: scope.release_date,
        });
    }

    Ok(())
}

/// `"11.html"` → `"110000000000"`
fn province_number(href: &str) -> String {
    let prefix: String = href.chars().take(2).collect();
    format!("{:0<width$}", prefix, width = CODE_WIDTH)
}

fn malformed(
    scope: &PageScope<'_>,
    level: AreaLevel,
    row: Option<&RawRow>,
    reason: &str,
) -> AreaError {
    let row = row
        .map(|r| {
            r.cells
                .iter()
                .map(|c| c.text.as_str())
                .collect::<Vec<_>>()
                .join(" | ")
        })
        .unwrap_or_default();
    AreaError::MalformedRow {
        url: scope.url.to_string(),
        level,
        row,
        reason: reason.to_string(),
    }
}
