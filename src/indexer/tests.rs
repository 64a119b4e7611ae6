// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;

use super::*;
use crate::datasource::memory::{ChainBuilder, FailurePoint};
use crate::storage::memory::MemoryStorage;

fn indexer(builder: &ChainBuilder) -> (Indexer, Arc<MemoryStorage>) {
    let storage = Arc::new(MemoryStorage::new(false));
    let indexer = Indexer::new(builder.source(), storage.clone(), "test")
        .unwrap()
        .with_parallelism(4);
    (indexer, storage)
}

fn status_of(report: &TipsetReport, task: Task) -> ReportStatus {
    report
        .reports
        .iter()
        .find(|r| r.task == task.name() && r.height == report.height)
        .map(|r| r.status)
        .unwrap()
}

#[tokio::test]
async fn indexes_every_task() {
    let mut builder = ChainBuilder::new();
    let ts1 = builder.extend_to(1);
    let ts2 = builder.extend_to(2);
    let (indexer, storage) = indexer(&builder);

    let report = indexer.index(&ts2, &ts1, &Task::all(), &CancellationToken::new()).await.unwrap();
    assert_eq!(report.reports.len(), Task::all().len());
    assert!(report.is_complete());
    assert_eq!(report.count(ReportStatus::Error), 0);
    assert_eq!(storage.count("processing_reports"), Task::all().len());
    assert_eq!(storage.count("messages"), 4);
    assert_eq!(storage.count("block_headers"), 2);
}

#[tokio::test]
async fn failing_task_is_isolated() {
    let mut builder = ChainBuilder::new();
    let ts1 = builder.extend_to(1);
    let ts2 = builder.extend_to(2);
    builder.source().inject_failure(FailurePoint::ChangedActors, 2);
    let (indexer, storage) = indexer(&builder);

    let tasks = [Task::Message, Task::Actor, Task::ActorState];
    let report = indexer.index(&ts2, &ts1, &tasks, &CancellationToken::new()).await.unwrap();
    assert_eq!(status_of(&report, Task::Message), ReportStatus::Ok);
    assert_eq!(status_of(&report, Task::Actor), ReportStatus::Error);
    assert_eq!(status_of(&report, Task::ActorState), ReportStatus::Error);
    assert!(!report.is_complete());

    assert_eq!(storage.count("messages"), 4);
    assert_eq!(storage.count("actors"), 0);
    assert_eq!(storage.count("actor_states"), 0);
    let failed = report
        .reports
        .iter()
        .find(|r| r.status == ReportStatus::Error)
        .unwrap();
    assert!(failed.errors_detected.is_some());
    assert!(failed.status_information.as_deref().unwrap().contains("ChangedActors"));
}

#[tokio::test]
async fn null_rounds_are_reported() {
    let mut builder = ChainBuilder::new();
    let ts3 = builder.extend_to(3);
    let ts6 = builder.push(6);
    let (indexer, storage) = indexer(&builder);

    let tasks = [Task::BlockHeader, Task::Message];
    let report = indexer.index(&ts6, &ts3, &tasks, &CancellationToken::new()).await.unwrap();
    assert_eq!(report.reports.len(), 6);
    assert!(report.is_complete());

    let mut stored: Vec<_> = storage
        .reports()
        .unwrap()
        .into_iter()
        .map(|r| (r.height, r.task, r.status))
        .collect();
    stored.sort();
    assert_eq!(
        stored,
        vec![
            (4, "block_header".into(), ReportStatus::Info),
            (4, "message".into(), ReportStatus::Info),
            (5, "block_header".into(), ReportStatus::Info),
            (5, "message".into(), ReportStatus::Info),
            (6, "block_header".into(), ReportStatus::Ok),
            (6, "message".into(), ReportStatus::Ok),
        ]
    );
}

#[tokio::test]
async fn window_bounds_slow_tasks() {
    let mut builder = ChainBuilder::new();
    let ts1 = builder.extend_to(1);
    let ts2 = builder.extend_to(2);
    builder
        .source()
        .inject_delay(FailurePoint::MessageExecutions, 2, Duration::from_secs(5));
    let (indexer, storage) = indexer(&builder);
    let indexer = indexer.with_window(Duration::from_millis(200));

    let started = std::time::Instant::now();
    let report = indexer
        .index(
            &ts2,
            &ts1,
            &[Task::BlockHeader, Task::VmMessages],
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert!(started.elapsed() < Duration::from_secs(4));
    assert_eq!(status_of(&report, Task::BlockHeader), ReportStatus::Ok);
    assert_eq!(status_of(&report, Task::VmMessages), ReportStatus::Error);
    assert_eq!(storage.count("vm_messages"), 0);
    assert_eq!(storage.count("block_headers"), 2);
}

#[tokio::test]
async fn cancellation_stops_running_tasks() {
    let mut builder = ChainBuilder::new();
    let ts1 = builder.extend_to(1);
    let ts2 = builder.extend_to(2);
    builder
        .source()
        .inject_delay(FailurePoint::MessageExecutions, 2, Duration::from_secs(5));
    let (indexer, storage) = indexer(&builder);
    let indexer = indexer.with_window(Duration::ZERO);

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            cancel.cancel();
        }
    });
    let started = std::time::Instant::now();
    let report = indexer
        .index(&ts2, &ts1, &[Task::BlockHeader, Task::VmMessages], &cancel)
        .await
        .unwrap();
    assert!(started.elapsed() < Duration::from_secs(4));
    assert_eq!(status_of(&report, Task::BlockHeader), ReportStatus::Ok);
    assert_eq!(status_of(&report, Task::VmMessages), ReportStatus::Error);
    assert_eq!(storage.count("vm_messages"), 0);
    assert_eq!(storage.count("processing_reports"), 2);
}

#[tokio::test]
async fn null_rounds_alone_leave_tipsets_untouched() {
    let mut builder = ChainBuilder::new();
    let ts3 = builder.extend_to(3);
    let ts7 = builder.push(7);
    let (indexer, storage) = indexer(&builder);

    let heights = HeightRange::new(5, 9).unwrap();
    let report = indexer
        .index_null_rounds(&ts7, &ts3, heights, &[Task::ChainConsensus, Task::Message])
        .await
        .unwrap();
    assert_eq!(report.height, 6);
    assert_eq!(report.reports.len(), 4);
    assert_eq!(report.count(ReportStatus::Info), 4);
    assert_eq!(storage.count("chain_consensus"), 2);
    assert_eq!(storage.count_at("chain_consensus", 7), 0);
    assert_eq!(storage.count("messages"), 0);
    assert!(storage.reports().unwrap().iter().all(|r| (5..=6).contains(&r.height)));
}

#[tokio::test]
async fn genesis_skips_parent_tasks() {
    let builder = ChainBuilder::new();
    let genesis = builder.genesis().clone();
    let (indexer, storage) = indexer(&builder);

    let report = indexer
        .index(
            &genesis,
            &genesis,
            &[Task::BlockHeader, Task::Receipt],
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(status_of(&report, Task::BlockHeader), ReportStatus::Ok);
    assert_eq!(status_of(&report, Task::Receipt), ReportStatus::Info);
    assert_eq!(storage.count("block_headers"), 1);
    assert_eq!(storage.count("receipts"), 0);
}

#[tokio::test]
async fn records_shed_work() {
    let mut builder = ChainBuilder::new();
    let ts1 = builder.extend_to(1);
    let (indexer, storage) = indexer(&builder);

    indexer
        .record(&ts1, &[Task::Message, Task::Receipt], ReportStatus::Skipped, "backlog")
        .await
        .unwrap();
    let reports = storage.reports().unwrap();
    assert_eq!(reports.len(), 2);
    assert!(reports.iter().all(|r| r.status == ReportStatus::Skipped && r.height == 1));
}
