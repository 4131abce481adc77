use std::sync::Arc;

use arrow::array::{Float64Builder, Int64Array, ListBuilder, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const DURATION_S: f64 = 600.0;
const UNITS_PER_SHANK: usize = 20;
/// Neuropixels 2.0 multi-shank: 4 shanks of 640 rows, 15 µm apart.
const SHANKS: i64 = 4;
/// Top row of a shank, in µm from the tip.
const PROBE_DEPTH_UM: f64 = 639.0 * 15.0;
/// Slow probe movement over the recording, in µm.
const DRIFT_UM: f64 = 60.0;

struct SampleUnit {
    spike_times: Vec<f64>,
    spike_depths: Vec<f64>,
    quality: &'static str,
    shank: i64,
}

/// Homogeneous Poisson train: exponential gaps at `rate` Hz up to `duration`.
fn poisson_train(rng: &mut StdRng, rate: f64, duration: f64) -> Vec<f64> {
    let mut times = Vec::new();
    let mut t = 0.0;
    loop {
        let u: f64 = rng.gen_range(f64::EPSILON..1.0);
        t += -u.ln() / rate;
        if t >= duration {
            return times;
        }
        times.push(t);
    }
}

/// Depth of a unit at time `t`, following a sinusoidal drift plus jitter.
fn drifting_depth(rng: &mut StdRng, base: f64, t: f64) -> f64 {
    let drift = DRIFT_UM * (2.0 * std::f64::consts::PI * t / DURATION_S).sin();
    let jitter: f64 = rng.gen_range(-8.0..8.0);
    (base + drift + jitter).clamp(0.0, PROBE_DEPTH_UM)
}

fn make_units(rng: &mut StdRng) -> Vec<SampleUnit> {
    let mut units = Vec::new();
    for shank in 0..SHANKS {
        for _ in 0..UNITS_PER_SHANK {
            let rate = rng.gen_range(0.5..20.0);
            let base = rng.gen_range(200.0..PROBE_DEPTH_UM - 200.0);
            let quality = match rng.gen_range(0..10) {
                0..=5 => "good",
                6..=8 => "mua",
                _ => "noise",
            };
            let spike_times = poisson_train(rng, rate, DURATION_S);
            let spike_depths = spike_times
                .iter()
                .map(|&t| drifting_depth(rng, base, t))
                .collect();
            units.push(SampleUnit {
                spike_times,
                spike_depths,
                quality,
                shank,
            });
        }
    }
    units
}

fn list_array<'a>(rows: impl Iterator<Item = &'a [f64]>) -> arrow::array::ListArray {
    let mut builder = ListBuilder::new(Float64Builder::new());
    for row in rows {
        builder.values().append_slice(row);
        builder.append(true);
    }
    builder.finish()
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let mut rng = StdRng::seed_from_u64(42);
    let units = make_units(&mut rng);

    let times_array = list_array(units.iter().map(|u| u.spike_times.as_slice()));
    let depths_array = list_array(units.iter().map(|u| u.spike_depths.as_slice()));
    let unit_array = Int64Array::from_iter_values(0..units.len() as i64);
    let quality_array = StringArray::from_iter_values(units.iter().map(|u| u.quality));
    let shank_array = Int64Array::from_iter_values(units.iter().map(|u| u.shank));

    let item = Arc::new(Field::new("item", DataType::Float64, true));
    let schema = Arc::new(Schema::new(vec![
        Field::new("spike_times", DataType::List(item.clone()), false),
        Field::new("spike_depths", DataType::List(item), false),
        Field::new("unit", DataType::Int64, false),
        Field::new("quality", DataType::Utf8, false),
        Field::new("shank", DataType::Int64, false),
    ]));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(times_array),
            Arc::new(depths_array),
            Arc::new(unit_array),
            Arc::new(quality_array),
            Arc::new(shank_array),
        ],
    )?;

    let output_path = "sample_spikes.parquet";
    let file = std::fs::File::create(output_path)?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;

    let total: usize = units.iter().map(|u| u.spike_times.len()).sum();
    log::info!("Wrote {} units ({total} spikes) to {output_path}", units.len());
    println!("Wrote {} units ({total} spikes) to {output_path}", units.len());
    Ok(())
}
