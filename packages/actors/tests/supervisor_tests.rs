#![cfg(unix)]

use std::error::Error;

use actors::{RosterStore, WorkerCommand, WorkerRecord, WorkerSupervisor, process};

fn reaped_pid() -> Result<u32, Box<dyn Error>> {
    let mut child = std::process::Command::new("true").spawn()?;
    let pid = child.id();
    child.wait()?;
    Ok(pid)
}

#[tokio::test]
async fn test_list_active_prunes_dead_workers() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let roster = RosterStore::in_dir(dir.path());
    let alive = WorkerRecord::new(std::process::id());
    let dead = WorkerRecord::new(reaped_pid()?);
    roster.save(&[alive.clone(), dead]).await?;

    let supervisor = WorkerSupervisor::new(roster.clone(), WorkerCommand::new("true"));
    let active = supervisor.list_active().await?;

    assert_eq!(active, vec![alive.clone()]);
    assert_eq!(roster.load().await?, vec![alive]);
    Ok(())
}

#[tokio::test]
async fn test_spawn_records_and_stop_all_signals() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let roster = RosterStore::in_dir(dir.path());
    let supervisor = WorkerSupervisor::new(roster.clone(), WorkerCommand::new("sleep").arg("30"));

    let spawned = supervisor.spawn(2).await?;
    assert_eq!(spawned.len(), 2);
    assert_eq!(roster.load().await?, spawned);
    for record in &spawned {
        assert!(process::is_alive(record.pid));
    }

    let listed = supervisor.list_active().await?;
    assert_eq!(listed.len(), 2);

    let mut outcomes = supervisor.stop_all().await?;
    outcomes.sort_by_key(|o| o.pid);
    let mut expected: Vec<u32> = spawned.iter().map(|r| r.pid).collect();
    expected.sort();
    assert_eq!(outcomes.iter().map(|o| o.pid).collect::<Vec<_>>(), expected);
    assert!(outcomes.iter().all(|o| o.stopped));
    assert!(roster.load().await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_failed_spawn_is_an_error() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let roster = RosterStore::in_dir(dir.path());
    let supervisor = WorkerSupervisor::new(
        roster.clone(),
        WorkerCommand::new(dir.path().join("no-such-binary")),
    );

    let result = supervisor.spawn(1).await;
    assert!(matches!(result, Err(actors::SupervisorError::Spawn { .. })));
    assert!(roster.load().await?.is_empty());

    // Nothing to stop.
    assert!(supervisor.stop_all().await?.is_empty());
    Ok(())
}
