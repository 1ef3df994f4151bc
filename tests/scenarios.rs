use std::fs;

use tapesort::error::CliError;
use tapesort::predicate::{evaluate_stop, evaluate_where, Predicate, PredicateValue};

use crate::workdir::{self, Workdir};

fn i32_record(v: i32) -> [u8; 4] {
    v.to_be_bytes()
}

#[test]
fn s1_string_ascending_over_newline_delimited_input() {
    let wrk = Workdir::new("s1");
    let input = wrk.create("in.txt", b"banana\napple \ncherry\n");
    let output = wrk.path("out.txt");

    workdir::run(&[
        "--inputFileName",
        input.to_str().unwrap(),
        "--outputFileName",
        output.to_str().unwrap(),
        "--columnsIn",
        "name:String:0:6",
        "--orderBy",
        "name:ASC",
    ])
    .unwrap();

    assert_eq!(fs::read(output).unwrap(), b"apple \nbanana\ncherry\n");
}

#[test]
fn s2_signed_int_descending_over_fixed_width_input() {
    let wrk = Workdir::new("s2");
    let mut data = Vec::new();
    for v in [3i32, -1, 0, 2] {
        data.extend_from_slice(&i32_record(v));
    }
    let input = wrk.create("in.bin", &data);
    let output = wrk.path("out.bin");

    workdir::run(&[
        "--inputFileName",
        input.to_str().unwrap(),
        "--outputFileName",
        output.to_str().unwrap(),
        "--fixedIn",
        "4",
        "--fixedOut",
        "4",
        "--columnsIn",
        "v:Int4:0:4",
        "--orderBy",
        "v:DESC",
    ])
    .unwrap();

    let out = fs::read(output).unwrap();
    let values: Vec<i32> = out
        .chunks(4)
        .map(|c| i32::from_be_bytes(c.try_into().unwrap()))
        .collect();
    assert_eq!(values, vec![3, 2, 0, -1]);
}

fn run_sorted_ints(wrk: &Workdir, name: &str, values: &[i32], power: &str) -> Vec<i32> {
    let mut data = Vec::new();
    for v in values {
        data.extend_from_slice(&i32_record(*v));
    }
    let input = wrk.create(&format!("{name}-in.bin"), &data);
    let output = wrk.path(&format!("{name}-out.bin"));

    workdir::run(&[
        "--inputFileName",
        input.to_str().unwrap(),
        "--outputFileName",
        output.to_str().unwrap(),
        "--fixedIn",
        "4",
        "--fixedOut",
        "4",
        "--columnsIn",
        "v:Int4:0:4",
        "--orderBy",
        "v:ASC",
        "--power",
        power,
    ])
    .unwrap();

    fs::read(output)
        .unwrap()
        .chunks(4)
        .map(|c| i32::from_be_bytes(c.try_into().unwrap()))
        .collect()
}

#[test]
fn s3_exactly_leaf_capacity_records_is_one_phase_one_pass() {
    let wrk = Workdir::new("s3-exact");
    // --power 2 => leaf capacity M = 2.
    let sorted = run_sorted_ints(&wrk, "exact", &[9, -4], "2");
    assert_eq!(sorted, vec![-4, 9]);
}

#[test]
fn s3_leaf_capacity_plus_one_records_forces_a_second_phase() {
    let wrk = Workdir::new("s3-plus-one");
    let sorted = run_sorted_ints(&wrk, "plusone", &[9, -4, 0], "2");
    assert_eq!(sorted, vec![-4, 0, 9]);
}

#[test]
fn s3_many_more_than_leaf_capacity_records_forces_merge_passes() {
    let wrk = Workdir::new("s3-merge");
    let values: Vec<i32> = (0..50).rev().collect();
    let sorted = run_sorted_ints(&wrk, "merge", &values, "2");
    let mut expected = values;
    expected.sort();
    assert_eq!(sorted, expected);
}

#[test]
fn s4_last_only_keeps_the_record_with_largest_ordinal_per_key() {
    let wrk = Workdir::new("s4");
    // Key is the first byte; "a1" (record 1) and "a3" (record 3) share key 'a'.
    let input = wrk.create("in.txt", b"a1\nb2\na3\n");
    let output = wrk.path("out.txt");

    workdir::run(&[
        "--inputFileName",
        input.to_str().unwrap(),
        "--outputFileName",
        output.to_str().unwrap(),
        "--columnsIn",
        "name:String:0:1",
        "--orderBy",
        "name:ASC",
        "--duplicate",
        "LastOnly",
    ])
    .unwrap();

    assert_eq!(fs::read(output).unwrap(), b"a3\nb2\n");
}

#[test]
fn s4_first_only_keeps_the_record_with_smallest_ordinal_per_key() {
    let wrk = Workdir::new("s4-first");
    let input = wrk.create("in.txt", b"a1\nb2\na3\n");
    let output = wrk.path("out.txt");

    workdir::run(&[
        "--inputFileName",
        input.to_str().unwrap(),
        "--outputFileName",
        output.to_str().unwrap(),
        "--columnsIn",
        "name:String:0:1",
        "--orderBy",
        "name:ASC",
        "--duplicate",
        "FirstOnly",
    ])
    .unwrap();

    assert_eq!(fs::read(output).unwrap(), b"a1\nb2\n");
}

/// `recordNumber OP N` is the only equation grammar this crate's CLI ever
/// parses (`tapesort::equation::RecordNumberPredicate`); the scenario's
/// literal `recordNumber % 2 == 0` clause has no modulo operator to express
/// through it, since a full expression evaluator is explicitly out of scope.
/// The two halves of its behaviour are tested at the level they actually
/// live at instead: `--stopWhen`'s counter-back-out through a real run
/// below, and the asymmetric Null resolution directly against the public
/// `Predicate` seam a modulo clause would plug into.
#[test]
fn s4_reverse_publishes_descending_key_order_not_just_descending_ordinal() {
    let wrk = Workdir::new("s4-reverse");
    // No duplicate keys here: a plain ASC run would give "apple\nbanana\ncherry\n".
    // Reverse must publish genuinely descending key order, not just reorder
    // ties within a (nonexistent) duplicate group.
    let input = wrk.create("in.txt", b"banana\napple \ncherry\n");
    let output = wrk.path("out.txt");

    workdir::run(&[
        "--inputFileName",
        input.to_str().unwrap(),
        "--outputFileName",
        output.to_str().unwrap(),
        "--columnsIn",
        "name:String:0:6",
        "--orderBy",
        "name:ASC",
        "--duplicate",
        "Reverse",
    ])
    .unwrap();

    assert_eq!(fs::read(output).unwrap(), b"cherry\nbanana\napple \n");
}

#[test]
fn s5_stop_when_halts_before_the_triggering_record_is_published() {
    let wrk = Workdir::new("s5-stop");
    let input = wrk.create("in.txt", b"1\n2\n3\n4\n5\n");
    let output = wrk.path("out.txt");

    workdir::run(&[
        "--inputFileName",
        input.to_str().unwrap(),
        "--outputFileName",
        output.to_str().unwrap(),
        "--columnsIn",
        "n:String:0:1",
        "--orderBy",
        "n:ASC",
        "--stopWhen",
        "recordNumber > 3",
    ])
    .unwrap();

    // Records 1-3 are admitted; record 4 triggers the stop and is never
    // read into the run, so only "1", "2", "3" are published (sorted).
    assert_eq!(fs::read(output).unwrap(), b"1\n2\n3\n");
}

struct EvenRecordNumber;

impl Predicate for EvenRecordNumber {
    fn evaluate(&self, record_number: u64) -> Result<PredicateValue, CliError> {
        Ok(if record_number % 2 == 0 {
            PredicateValue::True
        } else {
            PredicateValue::False
        })
    }
}

struct AlwaysNull;

impl Predicate for AlwaysNull {
    fn evaluate(&self, _record_number: u64) -> Result<PredicateValue, CliError> {
        Ok(PredicateValue::Null)
    }
}

#[test]
fn s5_where_admits_only_even_record_numbers() {
    let p = EvenRecordNumber;
    let admitted: Vec<u64> = (1..=6).filter(|&n| evaluate_where(&p, n).unwrap()).collect();
    assert_eq!(admitted, vec![2, 4, 6]);
}

#[test]
fn s5_null_is_asymmetric_between_where_and_stop() {
    // A Null-valued WHERE clause filters the record out...
    assert!(!evaluate_where(&AlwaysNull, 1).unwrap());
    // ...but a Null-valued STOP clause never halts the scan, even though
    // both are "falsy" in the sense of not being definitely True.
    assert!(!evaluate_stop(&AlwaysNull, 1).unwrap());
}

#[test]
fn s6_csv_field_sort_republishes_every_row_verbatim() {
    let wrk = Workdir::new("s6");
    let input = wrk.create("in.csv", b"c,a\nb,b\na,c\n");
    let output = wrk.path("out.csv");

    workdir::run(&[
        "--inputFileName",
        input.to_str().unwrap(),
        "--outputFileName",
        output.to_str().unwrap(),
        "--csv",
        "--columnsIn",
        "f:Csv:1",
        "--orderBy",
        "f:ASC",
    ])
    .unwrap();

    assert_eq!(fs::read(output).unwrap(), b"a,c\nb,b\nc,a\n");
}

#[test]
fn boundary_empty_input_yields_empty_output() {
    let wrk = Workdir::new("empty");
    let input = wrk.create("in.txt", b"");
    let output = wrk.path("out.txt");

    workdir::run(&[
        "--inputFileName",
        input.to_str().unwrap(),
        "--outputFileName",
        output.to_str().unwrap(),
        "--columnsIn",
        "name:String:0:6",
        "--orderBy",
        "name:ASC",
    ])
    .unwrap();

    assert_eq!(fs::read(output).unwrap(), b"");
}

#[test]
fn boundary_single_record_round_trips_unchanged() {
    let wrk = Workdir::new("single");
    let input = wrk.create("in.txt", b"banana\n");
    let output = wrk.path("out.txt");

    workdir::run(&[
        "--inputFileName",
        input.to_str().unwrap(),
        "--outputFileName",
        output.to_str().unwrap(),
        "--columnsIn",
        "name:String:0:6",
        "--orderBy",
        "name:ASC",
    ])
    .unwrap();

    assert_eq!(fs::read(output).unwrap(), b"banana\n");
}

#[test]
fn header_in_and_header_out_round_trip() {
    let wrk = Workdir::new("header");
    let input = wrk.create("in.txt", b"HEADER\nbanana\napple \ncherry\n");
    let output = wrk.path("out.txt");

    workdir::run(&[
        "--inputFileName",
        input.to_str().unwrap(),
        "--outputFileName",
        output.to_str().unwrap(),
        "--columnsIn",
        "name:String:0:6",
        "--orderBy",
        "name:ASC",
        "--headerIn",
        "--headerOut",
    ])
    .unwrap();

    assert_eq!(fs::read(output).unwrap(), b"HEADER\napple \nbanana\ncherry\n");
}

#[test]
fn replace_rewrites_the_single_input_file_in_place() {
    let wrk = Workdir::new("replace");
    let input = wrk.create("in.txt", b"banana\napple \ncherry\n");

    workdir::run(&[
        "--inputFileName",
        input.to_str().unwrap(),
        "--replace",
        "--columnsIn",
        "name:String:0:6",
        "--orderBy",
        "name:ASC",
    ])
    .unwrap();

    assert_eq!(fs::read(&input).unwrap(), b"apple \nbanana\ncherry\n");
}

#[test]
fn invariant_7_counters_balance_read_selected_filtered_and_published() {
    let wrk = Workdir::new("counters");
    // Records 1-5: "a","a","b","c","d". --where admits only the first 4
    // (selecting "a","a","b","c"), leaving "d" filtered. Of the 4 selected,
    // FirstOnly drops the second "a" as a duplicate.
    let input = wrk.create("in.txt", b"a\na\nb\nc\nd\n");
    let output = wrk.path("out.txt");

    let outcome = workdir::run(&[
        "--inputFileName",
        input.to_str().unwrap(),
        "--outputFileName",
        output.to_str().unwrap(),
        "--columnsIn",
        "name:String:0:1",
        "--orderBy",
        "name:ASC",
        "--duplicate",
        "FirstOnly",
        "--where",
        "recordNumber <= 4",
    ])
    .unwrap();

    assert_eq!(outcome.counters.read, 5);
    assert_eq!(outcome.counters.selected, 4);
    assert_eq!(outcome.counters.filtered, 1);
    assert_eq!(outcome.counters.read, outcome.counters.selected + outcome.counters.filtered);
    assert_eq!(outcome.duplicates_dropped, 1);
    assert_eq!(outcome.published, outcome.counters.selected - outcome.duplicates_dropped);
    assert_eq!(fs::read(output).unwrap(), b"a\nb\nc\n");
}

#[test]
fn missing_columns_in_is_a_config_error_not_a_panic() {
    let wrk = Workdir::new("missing-columns");
    let input = wrk.create("in.txt", b"banana\n");
    let output = wrk.path("out.txt");

    let err = workdir::run(&[
        "--inputFileName",
        input.to_str().unwrap(),
        "--outputFileName",
        output.to_str().unwrap(),
        "--orderBy",
        "name:ASC",
    ]);

    assert!(matches!(err, Err(CliError::Config(_))));
}

#[test]
fn row_max_requiring_more_depth_than_power_allows_is_rejected_before_any_io() {
    let wrk = Workdir::new("rowmax");
    let input = wrk.create("in.txt", b"banana\n");
    let output = wrk.path("out.txt");

    let err = workdir::run(&[
        "--inputFileName",
        input.to_str().unwrap(),
        "--outputFileName",
        output.to_str().unwrap(),
        "--columnsIn",
        "name:String:0:6",
        "--orderBy",
        "name:ASC",
        "--power",
        "2",
        "--rowMax",
        "1000000",
    ]);

    assert!(matches!(err, Err(CliError::Config(_))));
    assert!(!output.exists());
}
