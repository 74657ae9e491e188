//! Item table loading, wide-to-long reshaping and label table output.

use crate::error::PrepError;
use crate::layout::Variant;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::io::Write;
use std::path::Path;

/// One row of the wide item table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ItemRecord {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Type1")]
    pub type1: String,
    #[serde(rename = "Type2", default, deserialize_with = "blank_as_none")]
    pub type2: Option<String>,
}

impl ItemRecord {
    pub fn new(name: &str, type1: &str, type2: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            type1: type1.to_string(),
            type2: type2.map(str::to_string),
        }
    }
}

fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

/// Which label column a long-form row came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeSlot {
    #[serde(rename = "Type1")]
    Primary,
    #[serde(rename = "Type2")]
    Secondary,
}

impl TypeSlot {
    /// Only primary-slot rows are placed in the held-out split.
    pub fn is_test_eligible(self) -> bool {
        matches!(self, TypeSlot::Primary)
    }
}

/// One `(item, label)` pair of the long table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LabelRow {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Type")]
    pub label: String,
    #[serde(skip_serializing, default = "default_slot")]
    pub slot: TypeSlot,
}

fn default_slot() -> TypeSlot {
    TypeSlot::Primary
}

impl LabelRow {
    pub fn new(name: &str, label: &str, slot: TypeSlot) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            slot,
        }
    }
}

/// Read the wide item table.
pub fn read_items(path: &Path) -> Result<Vec<ItemRecord>, PrepError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|source| PrepError::LabelTable {
            path: path.to_path_buf(),
            source,
        })?;

    let mut items = Vec::new();
    for record in reader.deserialize() {
        let item: ItemRecord = record.map_err(|source| PrepError::LabelTable {
            path: path.to_path_buf(),
            source,
        })?;
        items.push(item);
    }
    tracing::debug!(count = items.len(), path = %path.display(), "Loaded item table");
    Ok(items)
}

/// Unpivot `Type1`/`Type2` into one row per present label.
///
/// Rows come out column-wise: every `Type1` row in item order, then every
/// `Type2` row in item order.
pub fn reshape(items: &[ItemRecord]) -> Vec<LabelRow> {
    let primary = items
        .iter()
        .map(|item| LabelRow::new(&item.name, &item.type1, TypeSlot::Primary));
    let secondary = items.iter().filter_map(|item| {
        item.type2
            .as_deref()
            .map(|t| LabelRow::new(&item.name, t, TypeSlot::Secondary))
    });
    let rows: Vec<LabelRow> = primary.chain(secondary).collect();
    tracing::info!(items = items.len(), rows = rows.len(), "Reshaped label table");
    rows
}

/// Distinct label values in first-seen order.
pub fn distinct_labels(rows: &[LabelRow]) -> Vec<String> {
    let mut seen = HashSet::new();
    rows.iter()
        .filter(|row| seen.insert(row.label.as_str()))
        .map(|row| row.label.clone())
        .collect()
}

/// Extend the table with one row per augmented derivative.
///
/// The original rows come first, then for each original row its seven
/// suffixed names in variant order, all carrying the source label.
pub fn expand_with_variants(rows: &[LabelRow]) -> Vec<LabelRow> {
    let mut expanded = rows.to_vec();
    expanded.reserve(rows.len() * Variant::DERIVED.len());
    for row in rows {
        for variant in Variant::DERIVED {
            expanded.push(LabelRow::new(&variant.apply(&row.name), &row.label, row.slot));
        }
    }
    expanded
}

/// Write `Name,Type` rows to any writer.
pub fn write_labels<W: Write>(writer: W, rows: &[LabelRow]) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write `Name,Type` rows to `path`.
pub fn write_label_table(path: &Path, rows: &[LabelRow]) -> Result<(), PrepError> {
    let file = std::fs::File::create(path)
        .map_err(|e| PrepError::file_op(crate::error::FileOp::Write, path, e))?;
    write_labels(file, rows).map_err(|source| PrepError::LabelTable {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!(rows = rows.len(), path = %path.display(), "Wrote label table");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_read_items_treats_empty_type2_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pokemon.csv");
        std::fs::write(
            &path,
            "Name,Type1,Type2\nbulbasaur,Grass,Poison\ncharmander,Fire,\nsquirtle,Water, \n",
        )
        .unwrap();

        let items = read_items(&path).unwrap();
        assert_eq!(
            items,
            vec![
                ItemRecord::new("bulbasaur", "Grass", Some("Poison")),
                ItemRecord::new("charmander", "Fire", None),
                ItemRecord::new("squirtle", "Water", None),
            ]
        );
    }

    #[test]
    fn test_read_items_ignores_extra_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pokemon.csv");
        std::fs::write(&path, "Name,Type1,Type2,Evolution\npikachu,Electric,,raichu\n").unwrap();
        let items = read_items(&path).unwrap();
        assert_eq!(items, vec![ItemRecord::new("pikachu", "Electric", None)]);
    }

    #[test]
    fn test_read_items_missing_column_is_label_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pokemon.csv");
        std::fs::write(&path, "Name,Kind\npikachu,Electric\n").unwrap();
        let err = read_items(&path).unwrap_err();
        assert!(matches!(err, PrepError::LabelTable { .. }));
    }

    #[test]
    fn test_reshape_melt_order() {
        let items = vec![
            ItemRecord::new("bulbasaur", "Grass", Some("Poison")),
            ItemRecord::new("charmander", "Fire", None),
            ItemRecord::new("gastly", "Ghost", Some("Poison")),
        ];
        let rows = reshape(&items);
        assert_eq!(
            rows,
            vec![
                LabelRow::new("bulbasaur", "Grass", TypeSlot::Primary),
                LabelRow::new("charmander", "Fire", TypeSlot::Primary),
                LabelRow::new("gastly", "Ghost", TypeSlot::Primary),
                LabelRow::new("bulbasaur", "Poison", TypeSlot::Secondary),
                LabelRow::new("gastly", "Poison", TypeSlot::Secondary),
            ]
        );
    }

    #[test]
    fn test_distinct_labels_first_seen() {
        let rows = reshape(&[
            ItemRecord::new("bulbasaur", "Grass", Some("Poison")),
            ItemRecord::new("oddish", "Grass", Some("Poison")),
            ItemRecord::new("charmander", "Fire", None),
        ]);
        assert_eq!(distinct_labels(&rows), vec!["Grass", "Fire", "Poison"]);
    }

    #[test]
    fn test_expand_with_variants() {
        let rows = vec![
            LabelRow::new("bulbasaur", "Grass", TypeSlot::Primary),
            LabelRow::new("bulbasaur", "Poison", TypeSlot::Secondary),
        ];
        let expanded = expand_with_variants(&rows);
        assert_eq!(expanded.len(), 16);
        assert_eq!(expanded[..2], rows[..]);
        let names: Vec<&str> = expanded[2..9].iter().map(|r| r.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "bulbasaur_f",
                "bulbasaur_m",
                "bulbasaur_fm",
                "bulbasaur_r",
                "bulbasaur_rf",
                "bulbasaur_rm",
                "bulbasaur_rfm",
            ]
        );
        assert!(expanded[9..].iter().all(|r| r.label == "Poison"));
    }

    #[test]
    fn test_write_labels_has_name_type_header() {
        let rows = vec![
            LabelRow::new("bulbasaur", "Grass", TypeSlot::Primary),
            LabelRow::new("bulbasaur_f", "Grass", TypeSlot::Primary),
        ];
        let mut out = Vec::new();
        write_labels(&mut out, &rows).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Name,Type\nbulbasaur,Grass\nbulbasaur_f,Grass\n"
        );
    }
}
