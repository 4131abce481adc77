use std::collections::{BTreeMap, BTreeSet};

use super::model::{MetadataValue, SpikeDataset};

// ---------------------------------------------------------------------------
// Filter predicate: which unique values are selected per column
// ---------------------------------------------------------------------------

/// Per-column selection state: maps column_name → set of selected values.
pub type FilterState = BTreeMap<String, BTreeSet<MetadataValue>>;

/// Initialise a [`FilterState`] with all values selected (i.e., show every unit).
pub fn init_filter_state(dataset: &SpikeDataset) -> FilterState {
    dataset.unique_values.clone()
}

/// Return indices of units that pass all active filters.
///
/// A unit passes a column filter when:
/// * The column is not present in `filters` → passes (no constraint)
/// * The filter set for that column is empty → nothing selected → fails
/// * Every unique value of the column is selected → passes
/// * The unit's value for that column is in the selected set → passes
/// * The unit has no value for the column → passes only if `Null` is selected
pub fn filtered_indices(dataset: &SpikeDataset, filters: &FilterState) -> Vec<usize> {
    dataset
        .units
        .iter()
        .enumerate()
        .filter(|(_, unit)| {
            filters.iter().all(|(col, selected)| {
                if selected.is_empty() {
                    return false;
                }
                let everything = dataset
                    .unique_values
                    .get(col)
                    .is_some_and(|all| selected.is_superset(all));
                if everything {
                    return true;
                }
                match unit.metadata.get(col) {
                    Some(val) => selected.contains(val),
                    None => selected.contains(&MetadataValue::Null),
                }
            })
        })
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::Unit;

    fn dataset() -> SpikeDataset {
        let units = [("good", Some(0)), ("mua", Some(1)), ("good", None)]
            .into_iter()
            .map(|(quality, shank)| {
                let mut metadata = BTreeMap::new();
                metadata.insert("quality".to_string(), MetadataValue::String(quality.into()));
                if let Some(s) = shank {
                    metadata.insert("shank".to_string(), MetadataValue::Integer(s));
                }
                Unit {
                    spike_times: vec![1.0],
                    metadata,
                    ..Default::default()
                }
            })
            .collect();
        SpikeDataset::from_units(units)
    }

    #[test]
    fn initial_state_shows_everything() {
        let ds = dataset();
        let filters = init_filter_state(&ds);
        assert_eq!(filtered_indices(&ds, &filters), vec![0, 1, 2]);
    }

    #[test]
    fn partial_selection_filters_units() {
        let ds = dataset();
        let mut filters = init_filter_state(&ds);
        filters
            .get_mut("quality")
            .unwrap()
            .remove(&MetadataValue::String("mua".into()));
        assert_eq!(filtered_indices(&ds, &filters), vec![0, 2]);
    }

    #[test]
    fn empty_selection_hides_everything() {
        let ds = dataset();
        let mut filters = init_filter_state(&ds);
        filters.insert("quality".to_string(), BTreeSet::new());
        assert!(filtered_indices(&ds, &filters).is_empty());
    }

    #[test]
    fn missing_value_needs_null_selected() {
        let ds = dataset();
        let mut filters = init_filter_state(&ds);
        filters.insert(
            "shank".to_string(),
            BTreeSet::from([MetadataValue::Integer(0)]),
        );
        assert_eq!(filtered_indices(&ds, &filters), vec![0]);

        filters
            .get_mut("shank")
            .unwrap()
            .insert(MetadataValue::Null);
        assert_eq!(filtered_indices(&ds, &filters), vec![0, 2]);
    }
}
