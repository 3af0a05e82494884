//! tests/api/distributed.rs
use crate::helpers::{
    expected_number_count, init_telemetry, make_number_inputs, read_result, spawn_worker,
    test_paths, FailingMapper, FailingReducer, FlakyMapper,
};
use claims::assert_ok;
use mapred::mappers::{LineCounter, WordCounter};
use mapred::master::Master;
use mapred::reducers::Counter;
use mapred::storage;
use mapred::worker::JobName;
use std::sync::Arc;
use std::time::Duration;

const JOB_TIMEOUT: Duration = Duration::from_secs(120);

async fn wait_with_timeout(master: &Master) {
    tokio::time::timeout(JOB_TIMEOUT, master.wait())
        .await
        .expect("job did not complete in time");
}

#[tokio::test(flavor = "multi_thread")]
async fn two_workers_complete_a_job_and_report_their_task_counts() {
    init_telemetry();
    let paths = test_paths();
    let files = make_number_inputs(&paths.input, 10, 100);
    let job = JobName::from("basic");

    let master = Master::distributed(job.clone(), files, 5, paths.clone())
        .await
        .expect("Failed to start master");

    let worker_0 = spawn_worker(&paths, 0, Arc::new(LineCounter), Arc::new(Counter));
    let worker_1 = spawn_worker(&paths, 1, Arc::new(LineCounter), Arc::new(Counter));

    wait_with_timeout(&master).await;

    assert_eq!(expected_number_count(100), read_result(&paths));
    for m in 0..10 {
        for r in 0..5 {
            assert!(storage::partition_path(&paths.output, &job, m, r).exists());
        }
    }

    // Healthy workers execute each of the 10 map and 5 reduce tasks once.
    let counts = master.completed_task_counts().await;
    assert_eq!(2, counts.len());
    assert_eq!(15, counts.iter().sum::<usize>());

    // Both workers got the shutdown call and exited cleanly.
    assert_ok!(worker_0.await.expect("worker task panicked"));
    assert_ok!(worker_1.await.expect("worker task panicked"));
}

#[tokio::test(flavor = "multi_thread")]
async fn the_map_phase_blocks_until_the_first_worker_registers() {
    init_telemetry();
    let paths = test_paths();
    let files = make_number_inputs(&paths.input, 2, 20);

    let master = Master::distributed(JobName::from("late"), files, 2, paths.clone())
        .await
        .expect("Failed to start master");

    // Nothing is dispatched yet; let the scheduler sit on an empty pool.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(master.registered_workers().await.is_empty());

    let worker = spawn_worker(&paths, 0, Arc::new(LineCounter), Arc::new(Counter));
    wait_with_timeout(&master).await;

    assert_eq!(expected_number_count(20), read_result(&paths));
    assert_ok!(worker.await.expect("worker task panicked"));
}

#[tokio::test(flavor = "multi_thread")]
async fn a_worker_that_fails_every_call_does_not_stop_the_job() {
    init_telemetry();
    let paths = test_paths();
    let files = make_number_inputs(&paths.input, 4, 40);

    let master = Master::distributed(JobName::from("flaky"), files, 2, paths.clone())
        .await
        .expect("Failed to start master");

    let broken = spawn_worker(&paths, 0, Arc::new(FailingMapper), Arc::new(FailingReducer));
    let healthy = spawn_worker(&paths, 1, Arc::new(LineCounter), Arc::new(Counter));

    wait_with_timeout(&master).await;

    assert_eq!(expected_number_count(40), read_result(&paths));

    assert_ok!(broken.await.expect("worker task panicked"));
    assert_ok!(healthy.await.expect("worker task panicked"));
}

#[tokio::test(flavor = "multi_thread")]
async fn transient_failures_recover_within_the_per_worker_retry_budget() {
    init_telemetry();
    let paths = test_paths();
    let files = make_number_inputs(&paths.input, 3, 30);

    let master = Master::distributed(JobName::from("retry"), files, 2, paths.clone())
        .await
        .expect("Failed to start master");

    // The first two attempts on every map task fail; the third succeeds, well
    // inside the five-attempt budget, so no task ever reaches the failed
    // queue and every retry stays on this worker.
    let mapper = Arc::new(FlakyMapper::new(LineCounter, 2));
    let worker = spawn_worker(&paths, 0, mapper, Arc::new(Counter));

    wait_with_timeout(&master).await;

    assert_eq!(expected_number_count(30), read_result(&paths));

    // 3 map tasks x 3 attempts each, plus 2 clean reduce tasks.
    let counts = master.completed_task_counts().await;
    assert_eq!(vec![11], counts);

    assert_ok!(worker.await.expect("worker task panicked"));
}

#[tokio::test(flavor = "multi_thread")]
async fn sequential_and_distributed_runs_produce_identical_results() {
    init_telemetry();
    let job = JobName::from("parity");

    let sequential_paths = test_paths();
    let file_1 = sequential_paths.input.join("words-1.txt");
    let file_2 = sequential_paths.input.join("words-2.txt");
    std::fs::write(&file_1, "hello world\nhello mapreduce\n").unwrap();
    std::fs::write(&file_2, "world of\nmapreduce\n").unwrap();
    assert_ok!(Master::sequential(
        job.clone(),
        vec![file_1.clone(), file_2.clone()],
        2,
        &WordCounter,
        &Counter,
        &sequential_paths,
    ));

    let distributed_paths = test_paths();
    let dist_1 = distributed_paths.input.join("words-1.txt");
    let dist_2 = distributed_paths.input.join("words-2.txt");
    std::fs::copy(&file_1, &dist_1).unwrap();
    std::fs::copy(&file_2, &dist_2).unwrap();

    let master = Master::distributed(
        job,
        vec![dist_1, dist_2],
        2,
        distributed_paths.clone(),
    )
    .await
    .expect("Failed to start master");
    let workers: Vec<_> = (0..3)
        .map(|n| {
            spawn_worker(
                &distributed_paths,
                n,
                Arc::new(WordCounter),
                Arc::new(Counter),
            )
        })
        .collect();

    wait_with_timeout(&master).await;

    let sequential_bytes =
        std::fs::read(storage::result_path(&sequential_paths.result)).unwrap();
    let distributed_bytes =
        std::fs::read(storage::result_path(&distributed_paths.result)).unwrap();
    assert_eq!(sequential_bytes, distributed_bytes);
    assert_eq!(
        "hello: [2]\nmapreduce: [2]\nof: [1]\nworld: [2]\n",
        read_result(&distributed_paths)
    );

    for worker in workers {
        assert_ok!(worker.await.expect("worker task panicked"));
    }
}
