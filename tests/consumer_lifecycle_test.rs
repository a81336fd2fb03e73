//! Consumer state machine and worker loop behavior, driven end to end
//! through command envelopes and the status event stream.

mod common;

use std::sync::Arc;
use std::time::Duration;

use scanq_core::config::ScanqConfig;
use scanq_core::consumer::{ConsumerState, QueueConsumer};
use scanq_core::messaging::{CommandEnvelope, InProcessBus, QueueCommand, ReplyPayload};
use scanq_core::models::{JobRecord, JobStatus};
use scanq_core::StatusEvent;

use common::{
    await_reply, await_started, FailingExecutor, GatedExecutor, RecordingExecutor, WAIT,
};

fn test_config() -> ScanqConfig {
    ScanqConfig::default()
}

/// Wait on the status stream until the named job reaches the given status.
async fn await_job_status(
    events: &mut tokio::sync::broadcast::Receiver<StatusEvent>,
    job_id: uuid::Uuid,
    status: JobStatus,
) {
    tokio::time::timeout(WAIT, async {
        loop {
            if let StatusEvent::Job(event) = events.recv().await.expect("status channel closed") {
                if event.job.job_id == job_id && event.job.status == status {
                    return;
                }
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for job {job_id} to reach {status}"));
}

#[tokio::test]
async fn test_jobs_run_in_submission_order() {
    let bus = Arc::new(InProcessBus::new(64));
    let (executor, mut started) = RecordingExecutor::new();
    let consumer = QueueConsumer::spawn("q", executor.clone(), bus.clone(), test_config());
    let handle = consumer.handle();
    let mut events = consumer.status_events();

    let jobs: Vec<JobRecord> = (0..3).map(|i| JobRecord::new(format!("job-{i}"))).collect();
    let ids: Vec<_> = jobs.iter().map(|j| j.job_id).collect();
    for job in jobs {
        handle.submit(job).await.unwrap();
    }

    for expected in &ids {
        assert_eq!(await_started(&mut started).await, *expected);
    }
    await_job_status(&mut events, ids[2], JobStatus::Complete).await;

    // the completed history holds all three, in start order, marked complete
    let mut replies = bus.subscribe_replies();
    let envelope = CommandEnvelope::for_queue("q", QueueCommand::GetRunningAndCompleted);
    let envelope_id = envelope.envelope_id;
    handle.deliver(envelope).await.unwrap();
    let reply = await_reply(&mut replies, envelope_id).await;

    match reply.result {
        Some(ReplyPayload::RunningAndCompleted(records)) => {
            let completed: Vec<_> = records
                .iter()
                .filter(|j| j.status == JobStatus::Complete)
                .map(|j| j.job_id)
                .collect();
            assert_eq!(completed, ids);
        }
        other => panic!("Expected RunningAndCompleted payload, got {other:?}"),
    }

    consumer.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_pause_lets_current_job_finish_and_holds_the_next() {
    let bus = Arc::new(InProcessBus::new(64));
    let (executor, mut started) = GatedExecutor::new();
    let consumer = QueueConsumer::spawn("q", executor.clone(), bus.clone(), test_config());
    let handle = consumer.handle();
    let mut events = consumer.status_events();
    let mut replies = bus.subscribe_replies();

    let job_a = JobRecord::new("a");
    let job_b = JobRecord::new("b");
    let (id_a, id_b) = (job_a.job_id, job_b.job_id);
    handle.submit(job_a).await.unwrap();
    handle.submit(job_b).await.unwrap();

    // pause arrives mid-execution of A
    assert_eq!(await_started(&mut started).await, id_a);
    let pause = CommandEnvelope::for_queue("q", QueueCommand::Pause);
    let pause_id = pause.envelope_id;
    handle.deliver(pause).await.unwrap();
    let reply = await_reply(&mut replies, pause_id).await;
    assert!(!reply.is_error());
    assert_eq!(handle.state(), ConsumerState::Paused);

    // A still finishes and lands in the completed history
    executor.release();
    await_job_status(&mut events, id_a, JobStatus::Complete).await;

    // B must not start while paused
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(started.try_recv().is_err(), "job B started while paused");

    // resume pulls B
    handle
        .deliver(CommandEnvelope::for_queue("q", QueueCommand::Resume))
        .await
        .unwrap();
    assert_eq!(await_started(&mut started).await, id_b);
    executor.release();
    await_job_status(&mut events, id_b, JobStatus::Complete).await;

    consumer.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_stop_cancels_in_flight_job_and_is_terminal() {
    let bus = Arc::new(InProcessBus::new(64));
    let (executor, mut started) = GatedExecutor::new();
    let consumer = QueueConsumer::spawn("q", executor.clone(), bus.clone(), test_config());
    let handle = consumer.handle();
    let mut events = consumer.status_events();
    let mut replies = bus.subscribe_replies();

    let job_a = JobRecord::new("a");
    let job_b = JobRecord::new("b");
    let (id_a, id_b) = (job_a.job_id, job_b.job_id);
    handle.submit(job_a).await.unwrap();
    handle.submit(job_b).await.unwrap();
    assert_eq!(await_started(&mut started).await, id_a);

    let stop = CommandEnvelope::for_queue("q", QueueCommand::Stop);
    let stop_id = stop.envelope_id;
    handle.deliver(stop).await.unwrap();
    let reply = await_reply(&mut replies, stop_id).await;
    assert!(!reply.is_error());

    // the in-flight job is terminated, not completed
    await_job_status(&mut events, id_a, JobStatus::Terminated).await;
    handle.wait_until_stopped().await.unwrap();

    // B never started and is still pending
    assert!(started.try_recv().is_err());
    let get_queue = CommandEnvelope::for_queue("q", QueueCommand::GetQueue);
    let get_queue_id = get_queue.envelope_id;
    handle.deliver(get_queue).await.unwrap();
    match await_reply(&mut replies, get_queue_id).await.result {
        Some(ReplyPayload::PendingJobs(pending)) => {
            assert_eq!(pending.len(), 1);
            assert_eq!(pending[0].job_id, id_b);
        }
        other => panic!("Expected PendingJobs payload, got {other:?}"),
    }

    consumer.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_stopped_state_rejects_pause_resume_restart() {
    let bus = Arc::new(InProcessBus::new(64));
    let (executor, _started) = RecordingExecutor::new();
    let consumer = QueueConsumer::spawn("q", executor, bus.clone(), test_config());
    let handle = consumer.handle();
    let mut replies = bus.subscribe_replies();

    handle
        .deliver(CommandEnvelope::for_queue("q", QueueCommand::Stop))
        .await
        .unwrap();
    handle.wait_until_stopped().await.unwrap();

    for command in [QueueCommand::Pause, QueueCommand::Resume, QueueCommand::Restart] {
        let envelope = CommandEnvelope::for_queue("q", command);
        let envelope_id = envelope.envelope_id;
        handle.deliver(envelope).await.unwrap();
        let reply = await_reply(&mut replies, envelope_id).await;
        assert!(reply.is_error(), "{} must fail once stopped", reply.command.name());
        assert_eq!(handle.state(), ConsumerState::Stopped);
    }

    // a second STOP is an idempotent no-op
    let stop = CommandEnvelope::for_queue("q", QueueCommand::Stop);
    let stop_id = stop.envelope_id;
    handle.deliver(stop).await.unwrap();
    assert!(!await_reply(&mut replies, stop_id).await.is_error());

    consumer.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_executor_failure_fails_the_job_and_continues() {
    let bus = Arc::new(InProcessBus::new(64));
    let consumer = QueueConsumer::spawn("q", Arc::new(FailingExecutor), bus.clone(), test_config());
    let handle = consumer.handle();
    let mut events = consumer.status_events();
    let mut replies = bus.subscribe_replies();

    let job_a = JobRecord::new("a");
    let job_b = JobRecord::new("b");
    let (id_a, id_b) = (job_a.job_id, job_b.job_id);
    handle.submit(job_a).await.unwrap();
    handle.submit(job_b).await.unwrap();

    // both jobs fail in turn; the consumer keeps draining
    await_job_status(&mut events, id_a, JobStatus::Failed).await;
    await_job_status(&mut events, id_b, JobStatus::Failed).await;
    assert_eq!(handle.state(), ConsumerState::Running);

    let get_info = CommandEnvelope::for_queue("q", QueueCommand::GetInfo);
    let get_info_id = get_info.envelope_id;
    handle.deliver(get_info).await.unwrap();
    match await_reply(&mut replies, get_info_id).await.result {
        Some(ReplyPayload::ConsumerInfo(info)) => {
            assert_eq!(info.state, ConsumerState::Running);
        }
        other => panic!("Expected ConsumerInfo payload, got {other:?}"),
    }

    consumer.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_pause_and_resume_are_idempotent() {
    let bus = Arc::new(InProcessBus::new(64));
    let (executor, _started) = RecordingExecutor::new();
    let consumer = QueueConsumer::spawn("q", executor, bus.clone(), test_config());
    let handle = consumer.handle();
    let mut replies = bus.subscribe_replies();

    for _ in 0..2 {
        let pause = CommandEnvelope::for_queue("q", QueueCommand::Pause);
        let pause_id = pause.envelope_id;
        handle.deliver(pause).await.unwrap();
        assert!(!await_reply(&mut replies, pause_id).await.is_error());
        assert_eq!(handle.state(), ConsumerState::Paused);
    }

    for _ in 0..2 {
        let resume = CommandEnvelope::for_queue("q", QueueCommand::Resume);
        let resume_id = resume.envelope_id;
        handle.deliver(resume).await.unwrap();
        assert!(!await_reply(&mut replies, resume_id).await.is_error());
        assert_eq!(handle.state(), ConsumerState::Running);
    }

    consumer.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_restart_in_place_clears_bookkeeping() {
    let bus = Arc::new(InProcessBus::new(64));
    let (executor, _started) = RecordingExecutor::new();
    let consumer = QueueConsumer::spawn("q", executor, bus.clone(), test_config());
    let handle = consumer.handle();
    let mut replies = bus.subscribe_replies();

    // provoke a command error so last_error is populated
    let bad = CommandEnvelope::for_queue(
        "q",
        QueueCommand::Remove {
            job_id: uuid::Uuid::new_v4(),
        },
    );
    let bad_id = bad.envelope_id;
    handle.deliver(bad).await.unwrap();
    assert!(await_reply(&mut replies, bad_id).await.is_error());

    let info = CommandEnvelope::for_queue("q", QueueCommand::GetInfo);
    let info_id = info.envelope_id;
    handle.deliver(info).await.unwrap();
    match await_reply(&mut replies, info_id).await.result {
        Some(ReplyPayload::ConsumerInfo(info)) => assert!(info.last_error.is_some()),
        other => panic!("Expected ConsumerInfo payload, got {other:?}"),
    }

    // restart succeeds on a running consumer and resets the bookkeeping
    let restart = CommandEnvelope::for_queue("q", QueueCommand::Restart);
    let restart_id = restart.envelope_id;
    handle.deliver(restart).await.unwrap();
    let reply = await_reply(&mut replies, restart_id).await;
    assert!(!reply.is_error());
    assert_eq!(handle.state(), ConsumerState::Running);

    let info = CommandEnvelope::for_queue("q", QueueCommand::GetInfo);
    let info_id = info.envelope_id;
    handle.deliver(info).await.unwrap();
    match await_reply(&mut replies, info_id).await.result {
        Some(ReplyPayload::ConsumerInfo(info)) => assert!(info.last_error.is_none()),
        other => panic!("Expected ConsumerInfo payload, got {other:?}"),
    }

    consumer.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_pause_on_start_with_restored_pending_queue() {
    let bus = Arc::new(InProcessBus::new(64));
    let (executor, mut started) = RecordingExecutor::new();
    let config = ScanqConfig {
        pause_on_start: true,
        ..ScanqConfig::default()
    };

    let restored = vec![JobRecord::new("restored-a"), JobRecord::new("restored-b")];
    let consumer =
        QueueConsumer::spawn_with_pending("q", executor, bus.clone(), config, restored);
    let handle = consumer.handle();

    handle.wait_for_state(ConsumerState::Paused).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(started.try_recv().is_err(), "restored jobs ran before resume");

    handle
        .deliver(CommandEnvelope::for_queue("q", QueueCommand::Resume))
        .await
        .unwrap();
    await_started(&mut started).await;
    await_started(&mut started).await;

    consumer.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_consumer_state_events_reach_remote_observers() {
    let bus = Arc::new(InProcessBus::new(64));
    let (executor, _started) = RecordingExecutor::new();
    let consumer = QueueConsumer::spawn("q", executor, bus.clone(), test_config());
    let handle = consumer.handle();
    let mut events = consumer.status_events();

    handle
        .deliver(CommandEnvelope::for_queue("q", QueueCommand::Pause))
        .await
        .unwrap();

    let paused_seen = tokio::time::timeout(WAIT, async {
        loop {
            if let StatusEvent::Consumer(event) =
                events.recv().await.expect("status channel closed")
            {
                if event.state == ConsumerState::Paused {
                    assert_eq!(event.queue_name, "q");
                    return;
                }
            }
        }
    })
    .await;
    assert!(paused_seen.is_ok(), "no paused status event observed");

    consumer.shutdown().await.unwrap();
}
