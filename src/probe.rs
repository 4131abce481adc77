use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Probe types
// ---------------------------------------------------------------------------

/// Neuropixels probe models with a known electrode layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProbeType {
    #[serde(rename = "neuropixels 1.0 - 3A")]
    Neuropixels1_3A,
    #[serde(rename = "neuropixels 1.0 - 3B")]
    Neuropixels1_3B,
    #[serde(rename = "neuropixels UHD")]
    NeuropixelsUhd,
    #[serde(rename = "neuropixels 2.0 - SS")]
    Neuropixels2SingleShank,
    #[serde(rename = "neuropixels 2.0 - MS")]
    Neuropixels2MultiShank,
}

/// Layout parameters of one probe model. Distances are in µm.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeGeometry {
    /// Sites per shank.
    pub site_count: usize,
    /// Horizontal spacing between columns.
    pub col_spacing: f64,
    /// Vertical spacing between rows.
    pub row_spacing: f64,
    /// Extra x offset applied to every other row (staggered layouts).
    pub white_spacing: f64,
    pub col_count: usize,
    pub shank_count: usize,
    pub shank_spacing: f64,
}

impl ProbeType {
    pub const ALL: [ProbeType; 5] = [
        ProbeType::Neuropixels1_3A,
        ProbeType::Neuropixels1_3B,
        ProbeType::NeuropixelsUhd,
        ProbeType::Neuropixels2SingleShank,
        ProbeType::Neuropixels2MultiShank,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ProbeType::Neuropixels1_3A => "neuropixels 1.0 - 3A",
            ProbeType::Neuropixels1_3B => "neuropixels 1.0 - 3B",
            ProbeType::NeuropixelsUhd => "neuropixels UHD",
            ProbeType::Neuropixels2SingleShank => "neuropixels 2.0 - SS",
            ProbeType::Neuropixels2MultiShank => "neuropixels 2.0 - MS",
        }
    }

    pub fn geometry(self) -> ProbeGeometry {
        match self {
            ProbeType::Neuropixels1_3A | ProbeType::Neuropixels1_3B => ProbeGeometry {
                site_count: 960,
                col_spacing: 32.0,
                row_spacing: 20.0,
                white_spacing: 16.0,
                col_count: 2,
                shank_count: 1,
                shank_spacing: 0.0,
            },
            ProbeType::NeuropixelsUhd => ProbeGeometry {
                site_count: 384,
                col_spacing: 6.0,
                row_spacing: 6.0,
                white_spacing: 0.0,
                col_count: 8,
                shank_count: 1,
                shank_spacing: 0.0,
            },
            ProbeType::Neuropixels2SingleShank => ProbeGeometry {
                site_count: 1280,
                col_spacing: 32.0,
                row_spacing: 15.0,
                white_spacing: 0.0,
                col_count: 2,
                shank_count: 1,
                shank_spacing: 250.0,
            },
            ProbeType::Neuropixels2MultiShank => ProbeGeometry {
                site_count: 1280,
                col_spacing: 32.0,
                row_spacing: 15.0,
                white_spacing: 0.0,
                col_count: 2,
                shank_count: 4,
                shank_spacing: 250.0,
            },
        }
    }

    pub fn electrodes(self) -> Vec<Electrode> {
        build_electrodes(&self.geometry())
    }

    /// Distance of the highest site from the tip.
    pub fn depth_extent(self) -> f64 {
        let g = self.geometry();
        (g.site_count / g.col_count).saturating_sub(1) as f64 * g.row_spacing
    }
}

impl fmt::Display for ProbeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown probe type '{0}'")]
pub struct UnknownProbeType(pub String);

impl FromStr for ProbeType {
    type Err = UnknownProbeType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProbeType::ALL
            .into_iter()
            .find(|p| p.label() == s.trim())
            .ok_or_else(|| UnknownProbeType(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Electrodes
// ---------------------------------------------------------------------------

/// One recording site. `(0, 0)` is the bottom left corner of the probe,
/// ignoring the tip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Electrode {
    /// Index across all shanks, from 0.
    pub electrode: usize,
    /// Shank, from 0, left to right.
    pub shank: usize,
    /// Column within the shank, from 0, left to right.
    pub shank_col: usize,
    /// Row within the shank, from 0, tip to tail.
    pub shank_row: usize,
    pub x_coord: f64,
    pub y_coord: f64,
}

/// Sites of every shank, row by row from the tip, columns left to right.
pub fn build_electrodes(g: &ProbeGeometry) -> Vec<Electrode> {
    let col_count = g.col_count.max(1);
    let row_count = g.site_count / col_count;
    let mut electrodes = Vec::with_capacity(row_count * col_count * g.shank_count);

    for shank in 0..g.shank_count {
        for site in 0..row_count * col_count {
            let (row, col) = (site / col_count, site % col_count);
            let stagger = if row % 2 == 0 { g.white_spacing } else { 0.0 };
            electrodes.push(Electrode {
                electrode: g.site_count * shank + site,
                shank,
                shank_col: col,
                shank_row: row,
                x_coord: col as f64 * g.col_spacing + stagger + shank as f64 * g.shank_spacing,
                y_coord: row as f64 * g.row_spacing,
            });
        }
    }
    electrodes
}

// ---------------------------------------------------------------------------
// Electrode configurations
// ---------------------------------------------------------------------------

/// Channels a Neuropixels headstage records at once.
pub const RECORDING_CHANNELS: usize = 384;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// A named selection of electrodes recorded from on one probe type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectrodeConfig {
    pub name: String,
    pub probe_type: ProbeType,
    /// Sorted, deduplicated electrode indices.
    pub electrodes: Vec<usize>,
}

impl ElectrodeConfig {
    pub fn new(name: impl Into<String>, probe_type: ProbeType, mut electrodes: Vec<usize>) -> Self {
        electrodes.sort_unstable();
        electrodes.dedup();
        Self {
            name: name.into(),
            probe_type,
            electrodes,
        }
    }

    /// Contiguous block of [`RECORDING_CHANNELS`] electrodes starting at
    /// `bank * RECORDING_CHANNELS`, cut short at the end of the probe.
    pub fn bank(probe_type: ProbeType, bank: usize) -> Self {
        let g = probe_type.geometry();
        let total = g.site_count * g.shank_count;
        let start = (bank * RECORDING_CHANNELS).min(total);
        let end = (start + RECORDING_CHANNELS).min(total);
        Self::new(format!("bank {bank}"), probe_type, (start..end).collect())
    }

    /// Number of banks needed to cover every electrode.
    pub fn bank_count(probe_type: ProbeType) -> usize {
        let g = probe_type.geometry();
        (g.site_count * g.shank_count).div_ceil(RECORDING_CHANNELS)
    }

    /// Identifier of the selection: equal for the same probe type and set
    /// of electrodes, whatever the name or input order. 64-bit FNV-1a over
    /// the probe label, a NUL byte, and each index as little-endian `u64`,
    /// so the value does not change between builds.
    pub fn config_hash(&self) -> u64 {
        let indices = self
            .electrodes
            .iter()
            .flat_map(|&e| (e as u64).to_le_bytes());
        self.probe_type
            .label()
            .bytes()
            .chain([0])
            .chain(indices)
            .fold(FNV_OFFSET, |h, b| (h ^ b as u64).wrapping_mul(FNV_PRIME))
    }

    /// The selected sites with their coordinates.
    pub fn sites(&self) -> Vec<Electrode> {
        self.probe_type
            .electrodes()
            .into_iter()
            .filter(|e| self.electrodes.binary_search(&e.electrode).is_ok())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neuropixels_1_is_staggered() {
        let e = ProbeType::Neuropixels1_3A.electrodes();
        assert_eq!(e.len(), 960);
        assert_eq!((e[0].x_coord, e[0].y_coord), (16.0, 0.0));
        assert_eq!((e[1].x_coord, e[1].y_coord), (48.0, 0.0));
        assert_eq!((e[2].x_coord, e[2].y_coord), (0.0, 20.0));
        assert_eq!((e[3].x_coord, e[3].y_coord), (32.0, 20.0));
        assert_eq!(e[959].shank_row, 479);
        assert_eq!(e[959].y_coord, 9580.0);
    }

    #[test]
    fn multi_shank_offsets_and_numbering() {
        let e = ProbeType::Neuropixels2MultiShank.electrodes();
        assert_eq!(e.len(), 4 * 1280);
        let first_of_shank_2 = &e[2 * 1280];
        assert_eq!(first_of_shank_2.electrode, 2560);
        assert_eq!(first_of_shank_2.shank, 2);
        assert_eq!(first_of_shank_2.x_coord, 500.0);
        assert_eq!(first_of_shank_2.y_coord, 0.0);
    }

    #[test]
    fn single_shank_2_0_keeps_shank_zero_offset() {
        let e = ProbeType::Neuropixels2SingleShank.electrodes();
        assert_eq!(e.len(), 1280);
        assert_eq!(e[1].x_coord, 32.0);
        assert_eq!(e[2].y_coord, 15.0);
    }

    #[test]
    fn uhd_has_eight_columns() {
        let e = ProbeType::NeuropixelsUhd.electrodes();
        assert_eq!(e.len(), 384);
        assert_eq!(e[7].x_coord, 42.0);
        assert_eq!(e[8].shank_row, 1);
        assert_eq!(ProbeType::NeuropixelsUhd.depth_extent(), 47.0 * 6.0);
    }

    #[test]
    fn depth_extent_matches_highest_site() {
        for probe in ProbeType::ALL {
            let top = probe
                .electrodes()
                .iter()
                .map(|e| e.y_coord)
                .fold(0.0, f64::max);
            assert_eq!(probe.depth_extent(), top, "{probe}");
        }
    }

    #[test]
    fn labels_round_trip() {
        for probe in ProbeType::ALL {
            assert_eq!(probe.label().parse::<ProbeType>().unwrap(), probe);
        }
        assert!("neuropixels 3.0".parse::<ProbeType>().is_err());
    }

    #[test]
    fn config_hash_ignores_name_and_order() {
        let a = ElectrodeConfig::new("bank 0", ProbeType::Neuropixels1_3B, vec![3, 1, 2, 2]);
        let b = ElectrodeConfig::new("other", ProbeType::Neuropixels1_3B, vec![1, 2, 3]);
        let c = ElectrodeConfig::new("bank 0", ProbeType::Neuropixels1_3A, vec![1, 2, 3]);
        assert_eq!(a.electrodes, vec![1, 2, 3]);
        assert_eq!(a.config_hash(), b.config_hash());
        assert_ne!(a.config_hash(), c.config_hash());
        assert_eq!(a.config_hash(), 0x2159_a21e_dedc_08c4);
        assert_eq!(a.sites().len(), 3);
        assert_eq!(a.sites()[0].electrode, 1);
    }

    #[test]
    fn banks_cover_the_probe() {
        assert_eq!(ElectrodeConfig::bank_count(ProbeType::Neuropixels1_3B), 3);
        assert_eq!(ElectrodeConfig::bank_count(ProbeType::NeuropixelsUhd), 1);

        let last = ElectrodeConfig::bank(ProbeType::Neuropixels1_3B, 2);
        assert_eq!(last.name, "bank 2");
        assert_eq!(last.electrodes.len(), 960 - 768);
        assert_eq!(last.electrodes[0], 768);
        assert!(ElectrodeConfig::bank(ProbeType::Neuropixels1_3B, 9).electrodes.is_empty());

        let first = ElectrodeConfig::bank(ProbeType::Neuropixels1_3B, 0);
        let top = first.sites().iter().map(|e| e.y_coord).fold(0.0, f64::max);
        assert_eq!(top, 191.0 * 20.0);
    }
}
