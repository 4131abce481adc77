/// Data layer: units, loading, and filtering.
///
/// Architecture:
/// ```text
///  .parquet / .json / .csv
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → SpikeDataset
///   └──────────┘
///        │
///        ▼
///   ┌──────────────┐
///   │ SpikeDataset │  Vec<Unit>, column index
///   └──────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  apply metadata predicates → visible units
///   └──────────┘
/// ```

pub mod loader;
pub mod model;
pub mod filter;
