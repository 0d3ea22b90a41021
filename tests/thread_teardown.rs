//! Single test in its own binary: no other test's threads may show up in the
//! task list.

#![cfg(target_os = "linux")]

mod common;

use std::fs;
use std::thread;
use std::time::{Duration, Instant};

use common::{init_tracing, Recorder};
use renderhost::{AudioHost, HostConfig, ManualDriver};

/// Threads of this process whose name starts with `prefix`. Linux truncates
/// thread names to 15 bytes.
fn threads_named(prefix: &str) -> usize {
    fs::read_dir("/proc/self/task")
        .unwrap()
        .filter_map(|entry| fs::read_to_string(entry.ok()?.path().join("comm")).ok())
        .filter(|name| name.trim_end().starts_with(prefix))
        .count()
}

/// Polls until `threads_named(prefix)` equals `expected`. An exiting thread
/// can stay listed briefly after it has been joined.
fn settles_to(prefix: &str, expected: usize) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        if threads_named(prefix) == expected {
            return true;
        }
        if Instant::now() > deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn stop_and_failed_start_join_every_thread() {
    init_tracing();
    let driver = ManualDriver::new(48_000);
    let handle = driver.handle();
    let mut host = AudioHost::with_config(
        driver,
        Recorder::default(),
        HostConfig::default()
            .with_worker_threads(4)
            .with_busy_threads(2)
            .with_process_in_driver_thread(false),
    )
    .unwrap();

    for _ in 0..5 {
        host.start().unwrap();
        assert!(settles_to("renderhost-work", 4));
        assert!(settles_to("renderhost-busy", 2));
        handle.render(64).unwrap();

        host.stop();
        assert!(settles_to("renderhost-work", 0));
        assert!(settles_to("renderhost-busy", 0));
    }

    host.set_num_worker_threads(1).unwrap();
    host.set_num_busy_threads(0).unwrap();
    host.start().unwrap();
    assert!(settles_to("renderhost-work", 1));
    assert!(settles_to("renderhost-busy", 0));

    drop(host);
    assert!(settles_to("renderhost-work", 0));

    // A failed start joins whatever it spawned.
    let driver = ManualDriver::new(48_000);
    let handle = driver.handle();
    let mut host = AudioHost::with_config(
        driver,
        Recorder::default(),
        HostConfig::default().with_worker_threads(3).with_busy_threads(1),
    )
    .unwrap();

    handle.fail_next_start();
    assert!(host.start().is_err());
    assert!(settles_to("renderhost-", 0));
}
