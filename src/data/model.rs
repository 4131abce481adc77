use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

// ---------------------------------------------------------------------------
// MetadataValue – a single cell in a unit metadata column
// ---------------------------------------------------------------------------

/// A dynamically-typed metadata value (cluster label, shank, quality, ...).
/// Using `BTreeMap` / `BTreeSet` downstream so `MetadataValue` must be `Ord`.
#[derive(Debug, Clone)]
pub enum MetadataValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    /// ISO-8601 date (`YYYY-MM-DD`) kept as text so it sorts by date.
    Date(String),
    Null,
}

// Equality follows `cmp` so that NaN floats equal themselves and
// `0.0`/`-0.0` stay distinct, as `total_cmp` orders them.
impl PartialEq for MetadataValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for MetadataValue {}

impl PartialOrd for MetadataValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MetadataValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use MetadataValue::*;
        fn rank(v: &MetadataValue) -> u8 {
            match v {
                Null => 0,
                Bool(_) => 1,
                Integer(_) => 2,
                Float(_) => 3,
                String(_) => 4,
                Date(_) => 5,
            }
        }
        match (self, other) {
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (String(a), String(b)) | (Date(a), Date(b)) => a.cmp(b),
            _ => rank(self).cmp(&rank(other)),
        }
    }
}

impl std::hash::Hash for MetadataValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            MetadataValue::String(s) | MetadataValue::Date(s) => s.hash(state),
            MetadataValue::Integer(i) => i.hash(state),
            MetadataValue::Float(f) => f.to_bits().hash(state),
            MetadataValue::Bool(b) => b.hash(state),
            MetadataValue::Null => {}
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::String(s) => write!(f, "{s}"),
            MetadataValue::Integer(i) => write!(f, "{i}"),
            MetadataValue::Float(v) => write!(f, "{v:.4}"),
            MetadataValue::Bool(b) => write!(f, "{b}"),
            MetadataValue::Date(d) => write!(f, "{d}"),
            MetadataValue::Null => write!(f, "<null>"),
        }
    }
}

// ---------------------------------------------------------------------------
// Unit – one sorted cluster
// ---------------------------------------------------------------------------

/// A single sorted unit (one row of the source table).
#[derive(Debug, Clone, Default)]
pub struct Unit {
    /// Spike times in seconds.
    pub spike_times: Vec<f64>,
    /// Spike depths in µm from the probe tip. Empty, or same length as
    /// `spike_times`.
    pub spike_depths: Vec<f64>,
    /// Dynamic metadata columns: column_name → value.
    pub metadata: BTreeMap<String, MetadataValue>,
}

impl Unit {
    pub fn spike_count(&self) -> usize {
        self.spike_times.len()
    }

    pub fn has_depths(&self) -> bool {
        !self.spike_depths.is_empty()
    }
}

// ---------------------------------------------------------------------------
// SpikeDataset – the complete loaded dataset
// ---------------------------------------------------------------------------

/// The full parsed dataset with pre-computed column indices.
#[derive(Debug, Clone, Default)]
pub struct SpikeDataset {
    /// All units (rows).
    pub units: Vec<Unit>,
    /// Ordered list of metadata column names (excludes spike arrays).
    pub column_names: Vec<String>,
    /// For each metadata column the sorted set of unique values.
    pub unique_values: BTreeMap<String, BTreeSet<MetadataValue>>,
}

impl SpikeDataset {
    /// Build column indices from the loaded units. A unit without a column
    /// counts as `Null` in that column's unique values.
    pub fn from_units(units: Vec<Unit>) -> Self {
        let column_names: Vec<String> = units
            .iter()
            .flat_map(|u| u.metadata.keys())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .cloned()
            .collect();

        let mut unique_values: BTreeMap<String, BTreeSet<MetadataValue>> = BTreeMap::new();
        for unit in &units {
            for col in &column_names {
                let val = unit.metadata.get(col).cloned().unwrap_or(MetadataValue::Null);
                unique_values.entry(col.clone()).or_default().insert(val);
            }
        }
        SpikeDataset {
            units,
            column_names,
            unique_values,
        }
    }

    /// Number of units.
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Whether the dataset is empty.
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Total number of spikes across the given units.
    pub fn spike_count(&self, indices: &[usize]) -> usize {
        indices.iter().map(|&i| self.units[i].spike_count()).sum()
    }

    /// Spike trains of the given units, in order.
    pub fn spike_trains(&self, indices: &[usize]) -> Vec<&[f64]> {
        indices
            .iter()
            .map(|&i| self.units[i].spike_times.as_slice())
            .collect()
    }

    /// Flatten the given units into parallel `(times, depths)` arrays.
    /// Units without depths are skipped.
    pub fn flatten_spikes(&self, indices: &[usize]) -> (Vec<f64>, Vec<f64>) {
        let capacity = self.spike_count(indices);
        let mut times = Vec::with_capacity(capacity);
        let mut depths = Vec::with_capacity(capacity);
        for unit in indices.iter().map(|&i| &self.units[i]) {
            if !unit.has_depths() {
                continue;
            }
            times.extend_from_slice(&unit.spike_times);
            depths.extend_from_slice(&unit.spike_depths);
        }
        (times, depths)
    }
}
