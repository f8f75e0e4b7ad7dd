//! Bigtable request builders
//!
//! ドメインの行選択・フィルタ・書き込みを Bigtable のプロトコル型に変換する

use std::collections::BTreeMap;

use bigtable_rs::bigtable::RowCell;
use bigtable_rs::google::bigtable::v2::mutation::{self, SetCell};
use bigtable_rs::google::bigtable::v2::row_filter::{Chain, Filter};
use bigtable_rs::google::bigtable::v2::row_range::{EndKey, StartKey};
use bigtable_rs::google::bigtable::v2::{Mutation, RowFilter as ProtoFilter, RowRange, RowSet};
use bigtable_rs::util::get_row_range_from_prefix;
use serde::Deserialize;

use crate::domain::entities::wide_row::{ColumnValues, RowFilter, RowSelection, WideCell, WideRow};

/// Converts a row selection into a row set; `None` reads the whole table
///
/// A prefix becomes the half-open range covering every key that starts with it.
pub fn build_row_set(selection: &RowSelection) -> Option<RowSet> {
    match selection {
        RowSelection::All => None,
        RowSelection::Keys(keys) => Some(RowSet {
            row_keys: keys.iter().map(|k| k.as_bytes().to_vec()).collect(),
            row_ranges: Vec::new(),
        }),
        RowSelection::Prefix(prefix) => Some(RowSet {
            row_keys: Vec::new(),
            row_ranges: vec![get_row_range_from_prefix(prefix.as_bytes().to_vec())],
        }),
        RowSelection::Range { start, end } => Some(RowSet {
            row_keys: Vec::new(),
            row_ranges: vec![RowRange {
                start_key: Some(StartKey::StartKeyClosed(start.as_bytes().to_vec())),
                end_key: Some(EndKey::EndKeyOpen(end.as_bytes().to_vec())),
            }],
        }),
    }
}

pub fn build_filter(filter: &RowFilter) -> ProtoFilter {
    let inner = match filter {
        RowFilter::LatestN(n) => {
            Filter::CellsPerColumnLimitFilter(i32::try_from(*n).unwrap_or(i32::MAX))
        }
        RowFilter::FamilyRegex(re) => Filter::FamilyNameRegexFilter(re.clone()),
        RowFilter::QualifierRegex(re) => Filter::ColumnQualifierRegexFilter(re.as_bytes().to_vec()),
        RowFilter::ValueRegex(re) => Filter::ValueRegexFilter(re.as_bytes().to_vec()),
        RowFilter::Chain(filters) => Filter::Chain(Chain {
            filters: filters.iter().map(build_filter).collect(),
        }),
    };

    ProtoFilter {
        filter: Some(inner),
    }
}

/// One SetCell per column, all with the same timestamp
pub fn set_cell_mutations(
    family: &str,
    columns: &ColumnValues,
    timestamp_micros: i64,
) -> Vec<Mutation> {
    columns
        .iter()
        .map(|(qualifier, value)| Mutation {
            mutation: Some(mutation::Mutation::SetCell(SetCell {
                family_name: family.to_string(),
                column_qualifier: qualifier.as_bytes().to_vec(),
                timestamp_micros,
                value: value.clone(),
            })),
        })
        .collect()
}

pub fn to_wide_row(key: Vec<u8>, cells: Vec<RowCell>) -> WideRow {
    WideRow::new(
        String::from_utf8_lossy(&key).into_owned(),
        cells
            .into_iter()
            .map(|cell| WideCell {
                family: cell.family_name,
                qualifier: String::from_utf8_lossy(&cell.qualifier).into_owned(),
                value: cell.value,
                timestamp_micros: cell.timestamp_micros,
            })
            .collect(),
    )
}

/// Strips `projects/{p}/instances/{i}/tables/` from a table resource name
pub fn short_table_name(name: &str) -> &str {
    name.rsplit_once("/tables/")
        .map(|(_, table)| table)
        .unwrap_or(name)
}

/// Admin API `tables.list` response
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdminTableList {
    pub tables: Vec<AdminTable>,
    pub next_page_token: Option<String>,
}

/// Admin API table resource
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdminTable {
    pub name: String,
    pub column_families: BTreeMap<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_set_for_all() {
        assert!(build_row_set(&RowSelection::All).is_none());
    }

    #[test]
    fn test_row_set_for_keys() {
        let set = build_row_set(&RowSelection::Keys(vec!["a".into(), "b".into()])).unwrap();
        assert_eq!(set.row_keys, vec![b"a".to_vec(), b"b".to_vec()]);
        assert!(set.row_ranges.is_empty());
    }

    #[test]
    fn test_row_set_for_prefix() {
        let set = build_row_set(&RowSelection::Prefix("user#".into())).unwrap();
        let range = &set.row_ranges[0];
        assert_eq!(
            range.start_key,
            Some(StartKey::StartKeyClosed(b"user#".to_vec()))
        );
        assert_eq!(range.end_key, Some(EndKey::EndKeyOpen(b"user$".to_vec())));
    }

    #[test]
    fn test_row_set_for_range() {
        let set = build_row_set(&RowSelection::Range {
            start: "a".into(),
            end: "m".into(),
        })
        .unwrap();
        let range = &set.row_ranges[0];
        assert_eq!(range.start_key, Some(StartKey::StartKeyClosed(b"a".to_vec())));
        assert_eq!(range.end_key, Some(EndKey::EndKeyOpen(b"m".to_vec())));
    }

    #[test]
    fn test_build_filter_chain() {
        let filter = build_filter(&RowFilter::Chain(vec![
            RowFilter::FamilyRegex("cf".into()),
            RowFilter::LatestN(1),
        ]));

        match filter.filter {
            Some(Filter::Chain(chain)) => {
                assert_eq!(chain.filters.len(), 2);
                assert_eq!(
                    chain.filters[0].filter,
                    Some(Filter::FamilyNameRegexFilter("cf".into()))
                );
                assert_eq!(
                    chain.filters[1].filter,
                    Some(Filter::CellsPerColumnLimitFilter(1))
                );
            }
            other => panic!("unexpected filter {:?}", other),
        }
    }

    #[test]
    fn test_set_cell_mutations() {
        let mut columns = ColumnValues::new();
        columns.insert("name".into(), b"alice".to_vec());
        columns.insert("age".into(), b"30".to_vec());

        let mutations = set_cell_mutations("cf", &columns, 1_000);
        assert_eq!(mutations.len(), 2);

        // BTreeMap の順序（age, name）
        match &mutations[0].mutation {
            Some(mutation::Mutation::SetCell(cell)) => {
                assert_eq!(cell.family_name, "cf");
                assert_eq!(cell.column_qualifier, b"age".to_vec());
                assert_eq!(cell.value, b"30".to_vec());
                assert_eq!(cell.timestamp_micros, 1_000);
            }
            other => panic!("unexpected mutation {:?}", other),
        }
    }

    #[test]
    fn test_short_table_name() {
        assert_eq!(
            short_table_name("projects/p/instances/i/tables/users"),
            "users"
        );
        assert_eq!(short_table_name("users"), "users");
    }

    #[test]
    fn test_admin_table_deserialize() {
        let table: AdminTable = serde_json::from_value(serde_json::json!({
            "name": "projects/p/instances/i/tables/users",
            "columnFamilies": {"cf2": {}, "cf1": {"gcRule": {"maxNumVersions": 1}}}
        }))
        .unwrap();

        let families: Vec<&String> = table.column_families.keys().collect();
        assert_eq!(families, vec!["cf1", "cf2"]);
    }
}
