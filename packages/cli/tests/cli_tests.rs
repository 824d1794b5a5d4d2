use std::error::Error;
use std::path::Path;
use std::process::{Command, Output};
use std::time::{Duration, Instant};

use serde_json::Value;

fn queuectl(data_dir: &Path, args: &[&str]) -> Result<Output, Box<dyn Error>> {
    let output = Command::new(env!("CARGO_BIN_EXE_queuectl"))
        .arg("--data-dir")
        .arg(data_dir)
        .args(args)
        .env_remove("QUEUECTL_LOG")
        .output()?;
    Ok(output)
}

fn stdout_of(data_dir: &Path, args: &[&str]) -> Result<String, Box<dyn Error>> {
    let output = queuectl(data_dir, args)?;
    if !output.status.success() {
        return Err(format!(
            "queuectl {args:?} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        )
        .into());
    }
    Ok(String::from_utf8(output.stdout)?)
}

fn json_of(data_dir: &Path, args: &[&str]) -> Result<Value, Box<dyn Error>> {
    Ok(serde_json::from_str(&stdout_of(data_dir, args)?)?)
}

fn exit_code(data_dir: &Path, args: &[&str]) -> Result<Option<i32>, Box<dyn Error>> {
    Ok(queuectl(data_dir, args)?.status.code())
}

#[test]
fn test_enqueue_then_list() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;

    let out = stdout_of(dir.path(), &["enqueue", "-r", "2", "echo", "hi"])?;
    assert!(out.contains("Job enqueued"));

    let jobs = json_of(dir.path(), &["list", "--json"])?;
    let jobs = jobs.as_array().ok_or("expected an array")?;
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0]["command"], "echo hi");
    assert_eq!(jobs[0]["state"], "pending");
    assert_eq!(jobs[0]["max_retries"], 2);
    assert_eq!(jobs[0]["attempts"], 0);

    let done = json_of(dir.path(), &["list", "--state", "completed", "--json"])?;
    assert_eq!(done, Value::Array(vec![]));

    Ok(())
}

#[test]
fn test_status_counts_jobs() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    stdout_of(dir.path(), &["enqueue", "true"])?;
    stdout_of(dir.path(), &["enqueue", "false"])?;

    let status = json_of(dir.path(), &["status", "--json"])?;
    assert_eq!(status["jobs"]["pending"], 2);
    assert_eq!(status["jobs"]["total"], 2);
    assert_eq!(status["workers"], Value::Array(vec![]));

    let text = stdout_of(dir.path(), &["status"])?;
    assert!(text.contains("Pending:     2"));
    Ok(())
}

#[test]
fn test_config_get_and_set() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;

    let out = stdout_of(dir.path(), &["config", "get", "max_retries"])?;
    assert_eq!(out.trim(), "max_retries = 3 (default)");

    stdout_of(dir.path(), &["config", "set", "max_retries", "5"])?;
    let out = stdout_of(dir.path(), &["config", "get", "max_retries"])?;
    assert_eq!(out.trim(), "max_retries = 5");

    let all = stdout_of(dir.path(), &["config", "get"])?;
    assert!(all.contains("backoff_base"));
    assert!(all.contains("lock_timeout_seconds"));

    stdout_of(dir.path(), &["enqueue", "true"])?;
    let jobs = json_of(dir.path(), &["list", "--json"])?;
    assert_eq!(jobs[0]["max_retries"], 5);

    Ok(())
}

#[test]
fn test_errors_exit_with_status_one() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    stdout_of(dir.path(), &["enqueue", "true"])?;
    let jobs = json_of(dir.path(), &["list", "--json"])?;
    let pending_id = jobs[0]["id"].as_str().ok_or("missing id")?.to_string();

    assert_eq!(exit_code(dir.path(), &["enqueue", "   "])?, Some(1));
    assert_eq!(exit_code(dir.path(), &["list", "--state", "stuck"])?, Some(1));
    assert_eq!(exit_code(dir.path(), &["dlq", "retry", "not-an-id"])?, Some(1));
    assert_eq!(
        exit_code(dir.path(), &["dlq", "retry", "01ARZ3NDEKTSV4RRFFQ69G5FAV"])?,
        Some(1)
    );
    assert_eq!(exit_code(dir.path(), &["dlq", "retry", &pending_id])?, Some(1));
    assert_eq!(
        exit_code(dir.path(), &["config", "set", "backoff_base", "0"])?,
        Some(1)
    );
    assert_eq!(exit_code(dir.path(), &["config", "get", "nope"])?, Some(1));

    // The failed retry left the job alone.
    let after = json_of(dir.path(), &["list", "--json"])?;
    assert_eq!(after, jobs);
    Ok(())
}

#[test]
fn test_logs_before_any_worker() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let out = stdout_of(dir.path(), &["logs"])?;
    assert!(out.contains("No logs found"));
    Ok(())
}

fn wait_for<F>(timeout: Duration, mut done: F) -> Result<bool, Box<dyn Error>>
where
    F: FnMut() -> Result<bool, Box<dyn Error>>,
{
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if done()? {
            return Ok(true);
        }
        std::thread::sleep(Duration::from_millis(200));
    }
    done()
}

#[cfg(unix)]
#[test]
fn test_background_workers_drain_the_queue() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let data = dir.path();

    stdout_of(data, &["config", "set", "backoff_base", "1"])?;
    stdout_of(data, &["enqueue", "echo", "one"])?;
    stdout_of(data, &["enqueue", "echo", "two"])?;
    stdout_of(data, &["enqueue", "-r", "2", "exit", "1"])?;
    stdout_of(data, &["enqueue", "echo", "four"])?;

    let out = stdout_of(data, &["worker", "start", "--count", "2"])?;
    assert_eq!(out.matches("Worker started").count(), 2);

    let settled = wait_for(Duration::from_secs(30), || {
        let status = json_of(data, &["status", "--json"])?;
        Ok(status["jobs"]["completed"] == 3 && status["jobs"]["dead"] == 1)
    })?;

    let workers = json_of(data, &["worker", "list", "--json"])?;
    let stopped = stdout_of(data, &["worker", "stop"])?;
    assert!(settled, "workers did not finish the queue");
    assert_eq!(workers.as_array().map(Vec::len), Some(2));
    assert_eq!(stopped.matches("Worker stopped").count(), 2);

    let dead = json_of(data, &["dlq", "list", "--json"])?;
    assert_eq!(dead[0]["command"], "exit 1");
    assert_eq!(dead[0]["attempts"], 2);
    assert!(dead[0]["error_message"].is_string());

    assert_eq!(
        json_of(data, &["worker", "list", "--json"])?,
        Value::Array(vec![])
    );

    let gone = wait_for(Duration::from_secs(10), || {
        let logs = stdout_of(data, &["logs", "-n", "500"])?;
        Ok(logs.matches("stopped gracefully").count() == 2)
    })?;
    assert!(gone, "workers did not exit after stop");

    let logs = stdout_of(data, &["logs", "-n", "500"])?;
    assert!(logs.contains("completed in"));
    assert!(logs.contains("moved to DLQ after 2 attempts"));
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_data_dir_with_url_characters() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let data = dir.path().join("q%41?x");

    stdout_of(&data, &["enqueue", "echo", "odd"])?;
    let jobs = json_of(&data, &["list", "--json"])?;
    assert_eq!(jobs[0]["command"], "echo odd");
    assert!(data.join("queue.db").exists());
    assert!(!dir.path().join("qA").exists());
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_sigterm_right_after_start_is_graceful() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let data = dir.path();
    stdout_of(data, &["enqueue", "sleep", "1"])?;

    let mut worker = Command::new(env!("CARGO_BIN_EXE_queuectl"))
        .arg("--data-dir")
        .arg(data)
        .args(["worker", "run"])
        .env_remove("QUEUECTL_LOG")
        .spawn()?;
    let started = format!("Worker worker-{} started", worker.id());

    let ready = wait_for(Duration::from_secs(10), || {
        let log = std::fs::read_to_string(data.join("worker.log")).unwrap_or_default();
        Ok(log.contains(&started))
    })?;
    let sent = Command::new("kill")
        .args(["-TERM", &worker.id().to_string()])
        .status()?;
    assert!(ready, "worker never logged its start");
    assert!(sent.success());

    let mut status = None;
    wait_for(Duration::from_secs(15), || {
        status = worker.try_wait()?;
        Ok(status.is_some())
    })?;
    let status = match status {
        Some(status) => status,
        None => {
            worker.kill()?;
            return Err("worker ignored SIGTERM".into());
        }
    };
    assert!(status.success(), "worker died from the signal: {status:?}");

    let log = std::fs::read_to_string(data.join("worker.log"))?;
    assert!(log.contains("stopped gracefully"));
    Ok(())
}
