//! Read → diff → table pipeline over solver-format files.

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use sdiff_output::{
    max_relative_diff, Catalog, ColumnKey, DiffEngine, DiffRecord, OutputReader, ReferenceTables,
    ResultTable, Series, SeriesPair,
};
use sdiff_test_utils::{write_pk, write_scaled_outputs};

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * b.abs().max(1.0)
}

#[test]
fn scaled_outputs_diff_by_the_scale() {
    let dir = tempfile::tempdir().unwrap();
    write_scaled_outputs(dir.path(), "run_v1", 1.0);
    write_scaled_outputs(dir.path(), "run_v2", 1.02);

    let reader = OutputReader::new(Catalog::builtin());
    let v1 = reader.read(dir.path(), "run_v1").unwrap();
    let v2 = reader.read(dir.path(), "run_v2").unwrap();

    let diffs = DiffEngine::new(Catalog::builtin()).compare(&v1, &v2, None).unwrap();
    let keys: Vec<String> = diffs.keys().map(ToString::to_string).collect();
    assert_eq!(keys, vec!["background:H", "cl:TT", "cl:EE"]);
    for value in diffs.values() {
        assert!(approx(*value, 2.0), "got {value}");
    }
}

#[test]
fn reference_runs_cancel_model_offset() {
    let dir = tempfile::tempdir().unwrap();
    write_scaled_outputs(dir.path(), "run_v1", 1.0);
    write_scaled_outputs(dir.path(), "run_v2", 1.05);
    write_scaled_outputs(dir.path(), "run_ref_v1", 1.0);
    write_scaled_outputs(dir.path(), "run_ref_v2", 1.05);

    let reader = OutputReader::new(Catalog::builtin());
    let read = |stem: &str| reader.read(dir.path(), stem).unwrap();
    let (v1, v2, r1, r2) = (read("run_v1"), read("run_v2"), read("run_ref_v1"), read("run_ref_v2"));

    let diffs = DiffEngine::new(Catalog::builtin())
        .compare(&v1, &v2, Some(ReferenceTables { v1: &r1, v2: &r2 }))
        .unwrap();
    assert!(diffs.values().all(|v| *v == 0.0));
}

#[test]
fn power_spectrum_columns_are_renamed() {
    let dir = tempfile::tempdir().unwrap();
    let k = [1e-3, 1e-2, 1e-1];
    write_pk(dir.path(), "a", &k, &[1.0e4, 2.0e4, 5.0e3]);
    write_pk(dir.path(), "b", &k, &[1.0e4, 2.0e4, 5.5e3]);

    let reader = OutputReader::new(Catalog::builtin());
    let a = reader.read(dir.path(), "a").unwrap();
    let b = reader.read(dir.path(), "b").unwrap();

    let diffs = DiffEngine::new(Catalog::builtin()).compare(&a, &b, None).unwrap();
    assert!(approx(diffs[&ColumnKey::new("pk", "P")], 10.0));
}

#[test]
fn accumulated_table_survives_a_write() {
    let dir = tempfile::tempdir().unwrap();
    let mut table = ResultTable::new();

    for (step, factor) in [1.01, 1.03].into_iter().enumerate() {
        let stem_v2 = format!("s{step}_v2");
        let stem_v1 = format!("s{step}_v1");
        write_scaled_outputs(dir.path(), &stem_v1, 1.0);
        write_scaled_outputs(dir.path(), &stem_v2, factor);

        let reader = OutputReader::new(Catalog::builtin());
        let v1 = reader.read(dir.path(), &stem_v1).unwrap();
        let v2 = reader.read(dir.path(), &stem_v2).unwrap();
        let diffs = DiffEngine::new(Catalog::builtin()).compare(&v1, &v2, None).unwrap();

        let mut record = DiffRecord {
            diffs,
            ..DiffRecord::default()
        };
        record.inputs.insert("h".to_string(), 0.6 + 0.01 * step as f64);
        table.append(record).unwrap();
    }

    let path = dir.path().join("diffs.dat");
    table.write(&path).unwrap();
    let columns = ResultTable::read(&path).unwrap();

    assert_eq!(columns.len(), 4);
    assert_eq!(columns["h"].len(), 2);
    assert!(approx(columns["cl:TT"][1], 3.0));
}

fn series_strategy() -> impl Strategy<Value = (Vec<f64>, Vec<f64>)> {
    proptest::collection::vec((-1.0e3f64..1.0e3, -1.0e3f64..1.0e3), 1..40).prop_map(|points| {
        let mut x: Vec<f64> = points.iter().map(|p| p.0).collect();
        x.sort_by(f64::total_cmp);
        x.dedup();
        let y = points.iter().take(x.len()).map(|p| p.1).collect();
        (x, y)
    })
}

proptest! {
    #[test]
    fn prop_identical_series_have_zero_diff((x, y) in series_strategy()) {
        let series = Series::new(&x, &y);
        let diff = max_relative_diff(SeriesPair::new(series, series), None).unwrap();
        prop_assert_eq!(diff, 0.0);
    }

    #[test]
    fn prop_reference_equal_to_primary_cancels(
        (x1, y1) in series_strategy(),
        (x2, y2) in series_strategy(),
    ) {
        let pair = SeriesPair::new(Series::new(&x1, &y1), Series::new(&x2, &y2));
        match max_relative_diff(pair, Some(pair)) {
            Ok(diff) => prop_assert_eq!(diff, 0.0),
            Err(e) => prop_assert!(matches!(e, sdiff_output::DiffError::EmptyOverlap { .. }), "expected EmptyOverlap, got {:?}", e),
        }
    }
}
