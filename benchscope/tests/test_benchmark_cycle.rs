use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use benchscope::detection::{FinishNotifier, NotifierConfig};
use benchscope::pipelines::{analysis_router, AccessLogConfig, AccessLogProfiler, AnalyzerConfig};
use benchscope::profiling::{Profiler, SubProfiler};

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    condition()
}

#[test]
fn test_idle_benchmark_is_registered_as_new_session() {
    let dir = tempfile::tempdir().expect("tempdir");
    let profiler = Arc::new(Mutex::new(Profiler::new(dir.path())));
    let sessions = profiler.lock().expect("lock").session_server();

    let runtime = tokio::runtime::Runtime::new().expect("runtime");
    let server = Arc::clone(&sessions);
    runtime.spawn(async move {
        server.serve("127.0.0.1:0".parse().expect("addr")).await.ok();
    });
    assert!(wait_until(Duration::from_secs(5), || sessions.is_serving()));

    let stopper = Arc::clone(&profiler);
    let notifier = FinishNotifier::spawn(
        NotifierConfig {
            poll_interval: Duration::from_millis(20),
            idle_threshold: Duration::from_millis(150),
        },
        move || {
            stopper.lock().expect("lock").stop().expect("stop");
        },
    )
    .expect("spawn notifier");

    for run in 0..2 {
        // The /initialize request itself counts as traffic
        notifier.on_request();
        profiler.lock().expect("lock").start().expect("start");
        notifier.arm();

        // Traffic keeps the run alive
        for _ in 0..10 {
            notifier.on_request();
            std::thread::sleep(Duration::from_millis(30));
        }
        assert_eq!(sessions.session_count(), run);
        assert!(profiler.lock().expect("lock").is_running());

        assert!(wait_until(Duration::from_secs(5), || sessions.session_count() == run + 1));
        assert!(!profiler.lock().expect("lock").is_running());
    }

    let artifacts: Vec<_> = std::fs::read_dir(dir.path())
        .expect("read_dir")
        .filter_map(Result::ok)
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "pprof"))
        .collect();
    assert_eq!(artifacts.len(), 2);
    assert_eq!(sessions.latest(), Some(benchscope::domain::SessionIndex(1)));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_access_log_run_is_analyzed_by_endpoint() {
    let dir = tempfile::tempdir().expect("tempdir");
    let reports = dir.path().join("reports");
    let access_log = dir.path().join("access.log");
    std::fs::write(&access_log, "time:t0\thost:10.0.0.9\treq:GET / HTTP/1.1\n").expect("write");

    let analyzer = AnalyzerConfig {
        report_dir: reports.clone(),
        alp_command: r#"echo "{routes}" > {output}; cat {input} >> {output}"#.to_string(),
        kataribe_command: "cat {input} > {output}".to_string(),
        ..AnalyzerConfig::default()
    };
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, analysis_router(analyzer)).await.ok();
    });

    let config = AccessLogConfig {
        access_log: access_log.clone(),
        host_addr: addr.to_string(),
        routes: vec!["/users/:id".to_string(), "/users".to_string()],
        // Recreate the live log the way nginx -s reopen would
        rotate_command: "mv {input} {output}".to_string(),
        reopen_command: format!("touch {}", access_log.display()),
        ..AccessLogConfig::default()
    };

    let outcome = tokio::task::spawn_blocking(move || {
        let mut profiler = AccessLogProfiler::new(config);
        profiler.start()?;
        std::fs::write(
            &access_log,
            "time:t1\thost:10.0.0.1\treq:GET /users/1 HTTP/1.1\tstatus:200\n",
        )?;
        profiler.stop()
    })
    .await
    .expect("join");
    outcome.expect("run");

    let mut names: Vec<String> = std::fs::read_dir(&reports)
        .expect("reports")
        .filter_map(Result::ok)
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names.len(), 3, "{names:?}");
    assert!(names[0].starts_with("access.log.kataribe."));
    assert!(names[1].starts_with("alp.log."));
    assert!(names[2].starts_with("kataribe.log."));

    let alp = std::fs::read_to_string(reports.join(&names[1])).expect("alp report");
    assert!(alp.starts_with("/users/.+,/users\n"));
    // Only this run's traffic was analyzed
    assert!(alp.contains("10.0.0.1"));
    assert!(!alp.contains("10.0.0.9"));

    let kataribe = std::fs::read_to_string(reports.join(&names[2])).expect("kataribe report");
    assert!(kataribe.starts_with("10.0.0.1 - - [t1] \"GET /users/1 HTTP/1.1\" 200"));
}
