use crate::area::{AreaId, AreaLevel};
use chrono::NaiveDate;
use url::Url;

/// One persisted node of the division tree
///
/// Records are built once from a page row and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AreaRecord {
    /// Composite identifier, unique within a year
    pub id: AreaId,

    /// Division code as published (12 characters)
    pub number: String,

    /// Display name
    pub name: String,

    /// "/"-joined names from the province down to this node
    pub full_name: String,

    /// Urban/rural classification code, villages only
    pub area_type: Option<u16>,

    pub level: AreaLevel,

    /// Publication year this record was crawled for
    pub year: u16,

    /// Ancestor ids, root first, excluding self
    pub parents_id: Vec<AreaId>,

    /// Publication date of `year`
    pub release_date: NaiveDate,
}

impl AreaRecord {
    /// Returns the ancestor chain for this record's children
    pub fn lineage(&self) -> Vec<AreaId> {
        let mut chain = Vec::with_capacity(self.parents_id.len() + 1);
        chain.extend_from_slice(&self.parents_id);
        chain.push(self.id);
        chain
    }
}

/// The parent fields a page's rows need to build their records
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentNode {
    pub id: AreaId,
    pub level: AreaLevel,
    pub full_name: String,
}

impl ParentNode {
    /// Returns the `full_name` a child named `name` carries
    pub fn child_full_name(&self, name: &str) -> String {
        format!("{}/{}", self.full_name, name)
    }
}

impl From<&AreaRecord> for ParentNode {
    fn from(record: &AreaRecord) -> Self {
        Self {
            id: record.id,
            level: record.level,
            full_name: record.full_name.clone(),
        }
    }
}

/// A page still to be visited, with everything its rows inherit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildPage {
    /// Absolute URL of the page
    pub url: Url,

    /// The record whose row linked to this page
    pub parent: ParentNode,

    /// `parent.parents_id` with `parent.id` appended, resolved once
    pub parents_id: Vec<AreaId>,
}

impl ChildPage {
    pub fn new(url: Url, parent: &AreaRecord) -> Self {
        Self {
            url,
            parent: ParentNode::from(parent),
            parents_id: parent.lineage(),
        }
    }
}
