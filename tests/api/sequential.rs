//! tests/api/sequential.rs
use crate::helpers::{
    expected_number_count, make_number_inputs, read_result, test_paths, FailingMapper,
};
use claims::{assert_err, assert_ok};
use mapred::mappers::{LineCounter, WordCounter};
use mapred::master::Master;
use mapred::reducers::Counter;
use mapred::storage;
use mapred::worker::JobName;

#[test]
fn counting_distinct_numbers_produces_one_sorted_line_per_number() {
    let paths = test_paths();
    let files = make_number_inputs(&paths.input, 10, 100);
    let job = JobName::from("numbers");

    assert_ok!(Master::sequential(
        job.clone(),
        files,
        5,
        &LineCounter,
        &Counter,
        &paths,
    ));

    let result = read_result(&paths);
    assert_eq!(expected_number_count(100), result);

    // Every (map task, reduce partition) pair left exactly one intermediate
    // file behind.
    for m in 0..10 {
        for r in 0..5 {
            let path = storage::partition_path(&paths.output, &job, m, r);
            assert!(path.exists(), "missing partition file {}", path.display());
        }
    }

    // Keys are strictly ascending: no duplicates, lexicographic order.
    let keys: Vec<&str> = result
        .lines()
        .map(|line| line.split_once(':').expect("malformed line").0)
        .collect();
    for pair in keys.windows(2) {
        assert!(pair[0] < pair[1], "keys out of order: {pair:?}");
    }
}

#[test]
fn counting_words_across_files_matches_the_hand_computed_totals() {
    let paths = test_paths();
    let file_1 = paths.input.join("words-1.txt");
    let file_2 = paths.input.join("words-2.txt");
    std::fs::write(&file_1, "hello world\nhello mapreduce\n").unwrap();
    std::fs::write(&file_2, "world of\nmapreduce\n").unwrap();

    assert_ok!(Master::sequential(
        JobName::from("wordcount"),
        vec![file_1, file_2],
        2,
        &WordCounter,
        &Counter,
        &paths,
    ));

    assert_eq!(
        "hello: [2]\nmapreduce: [2]\nof: [1]\nworld: [2]\n",
        read_result(&paths)
    );
}

#[test]
fn a_single_reduce_partition_receives_every_record() {
    let paths = test_paths();
    let files = make_number_inputs(&paths.input, 4, 40);
    let job = JobName::from("single");

    assert_ok!(Master::sequential(
        job.clone(),
        files,
        1,
        &LineCounter,
        &Counter,
        &paths,
    ));

    // With one partition, all of a map task's records land in file ...-m-0.
    let mut total_records = 0;
    for m in 0..4 {
        let path = storage::partition_path(&paths.output, &job, m, 0);
        let file = std::fs::File::open(path).expect("partition file missing");
        total_records += mapred::record::read_records(std::io::BufReader::new(file)).count();
    }
    assert_eq!(40, total_records);
    assert_eq!(expected_number_count(40), read_result(&paths));
}

#[test]
fn an_empty_input_file_yields_empty_partition_files_and_no_records() {
    let paths = test_paths();
    let empty = paths.input.join("empty.txt");
    let full = paths.input.join("full.txt");
    std::fs::write(&empty, "").unwrap();
    std::fs::write(&full, "alpha beta\n").unwrap();
    let job = JobName::from("sparse");

    assert_ok!(Master::sequential(
        job.clone(),
        vec![empty, full],
        3,
        &WordCounter,
        &Counter,
        &paths,
    ));

    for r in 0..3 {
        let path = storage::partition_path(&paths.output, &job, 0, r);
        let metadata = std::fs::metadata(&path).expect("partition file missing");
        assert_eq!(0, metadata.len(), "partition {r} of the empty task");
    }
    assert_eq!("alpha: [1]\nbeta: [1]\n", read_result(&paths));
}

#[test]
fn a_deterministically_failing_map_function_fails_the_sequential_run() {
    let paths = test_paths();
    let file = paths.input.join("in.txt");
    std::fs::write(&file, "data\n").unwrap();

    assert_err!(Master::sequential(
        JobName::from("doomed"),
        vec![file],
        2,
        &FailingMapper,
        &Counter,
        &paths,
    ));
}
