//! Member-bucketed manifest representation.
//!
//! On disk a group manifest is an array of member records, each holding the
//! member's posts in chronological order. In memory the crawler works on a
//! flat id-indexed map; this module converts between the two.
//!
//! Posts written under a shared column (e.g. a relay blog rotated among a
//! cohort) are attributed to a single cohort member: the member whose name
//! occurs earliest in the title wins, otherwise the post is assigned
//! round-robin by its position among the column's posts.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::{Item, ItemMap};

/// Shared column name to the ordered list of members it rotates through.
pub type CohortMap = BTreeMap<String, Vec<String>>;

/// One member's entry in the manifest file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MemberRecord {
    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "Group")]
    pub group: String,

    #[serde(rename = "BlogList", default)]
    pub items: Vec<Item>,
}

/// Build the member-bucketed manifest for a group.
///
/// Output is fully deterministic for a given input: members are ordered by
/// name and each member's posts by timestamp, then id.
pub fn build_records(group_id: &str, items: &ItemMap, cohorts: &CohortMap) -> Vec<MemberRecord> {
    let mut by_author: BTreeMap<&str, Vec<&Item>> = BTreeMap::new();
    for item in items.values() {
        by_author.entry(&item.author_name).or_default().push(item);
    }

    let mut buckets: BTreeMap<String, Vec<Item>> = BTreeMap::new();
    for (author, mut posts) in by_author {
        sort_chronologically(&mut posts);

        match cohorts.get(author).filter(|members| !members.is_empty()) {
            Some(members) => {
                for (index, post) in posts.into_iter().enumerate() {
                    let member = attribute(&post.title, members, index);
                    buckets.entry(member.to_string()).or_default().push(post.clone());
                }
            }
            None => buckets
                .entry(author.to_string())
                .or_default()
                .extend(posts.into_iter().cloned()),
        }
    }

    buckets
        .into_iter()
        .map(|(name, mut items)| {
            items.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
            MemberRecord {
                name,
                group: group_id.to_string(),
                items,
            }
        })
        .collect()
}

/// Flatten member records back into an id-indexed map.
///
/// If an id somehow appears in more than one record the last one wins, so
/// the result never holds duplicates.
pub fn flatten_records(records: Vec<MemberRecord>) -> ItemMap {
    records
        .into_iter()
        .flat_map(|record| record.items)
        .map(|item| (item.id.clone(), item))
        .collect()
}

/// Pick the cohort member a shared-column post belongs to.
///
/// `index` is the post's position among the column's chronologically
/// sorted posts. `members` must not be empty.
pub fn attribute<'a>(title: &str, members: &'a [String], index: usize) -> &'a str {
    match first_mentioned(title, members) {
        Some(member) => member,
        None => &members[index % members.len()],
    }
}

/// The member whose name appears earliest in the title, ignoring whitespace.
///
/// Ties at the same position go to the member listed first.
fn first_mentioned<'a>(title: &str, members: &'a [String]) -> Option<&'a str> {
    let compact: String = title.chars().filter(|c| !c.is_whitespace()).collect();

    members
        .iter()
        .filter(|name| !name.is_empty())
        .filter_map(|name| compact.find(name.as_str()).map(|pos| (pos, name.as_str())))
        .min_by_key(|(pos, _)| *pos)
        .map(|(_, name)| name)
}

fn sort_chronologically(posts: &mut [&Item]) {
    posts.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
}
