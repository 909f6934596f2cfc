use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use taskdeck_core::TaskdeckError;
use taskdeck_core::config::AppConfig;
use taskdeck_core::error::Result;
use taskdeck_core::event::{DashboardEvent, NotificationLevel};
use taskdeck_core::executor::{ExecutionOutcome, RemoteExecutor};
use taskdeck_core::intent::{DeviceInstruction, IntentKind, ScrollDirection};
use taskdeck_core::status::OverallHealth;
use taskdeck_core::task::{Task, TaskStatus};
use taskdeck_execution::{SimulatedMetrics, Subscription, TaskOrchestrator};
use tokio::sync::Semaphore;

/// Blocks every call until the test releases a permit.
struct Gated {
    gate: Arc<Semaphore>,
}

#[async_trait]
impl RemoteExecutor for Gated {
    async fn execute(&self, _instruction: DeviceInstruction) -> Result<ExecutionOutcome> {
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| TaskdeckError::internal(e.to_string()))?;
        permit.forget();
        Ok(ExecutionOutcome::Succeeded)
    }

    fn name(&self) -> &str {
        "gated"
    }
}

/// Cycles through success, reported failure and executor error.
struct Mixed {
    calls: AtomicUsize,
}

#[async_trait]
impl RemoteExecutor for Mixed {
    async fn execute(&self, _instruction: DeviceInstruction) -> Result<ExecutionOutcome> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(5 + (call % 4) as u64 * 5)).await;
        match call % 3 {
            0 => Ok(ExecutionOutcome::Succeeded),
            1 => Ok(ExecutionOutcome::failed("actuator rejected instruction")),
            _ => Err(TaskdeckError::executor("connection reset")),
        }
    }

    fn name(&self) -> &str {
        "mixed"
    }
}

struct Unreachable;

#[async_trait]
impl RemoteExecutor for Unreachable {
    async fn execute(&self, _instruction: DeviceInstruction) -> Result<ExecutionOutcome> {
        Err(TaskdeckError::executor("ssh: connect to host raspberrypi.local: No route to host"))
    }

    fn name(&self) -> &str {
        "unreachable"
    }
}

fn orchestrator_with(
    executor: Arc<dyn RemoteExecutor>,
    max_concurrent_tasks: usize,
) -> Arc<TaskOrchestrator> {
    let mut config = AppConfig::default();
    config.orchestrator.max_concurrent_tasks = max_concurrent_tasks;
    config.orchestrator.progress_tick_ms = 5;
    config.broadcast.subscriber_buffer = 4096;
    TaskOrchestrator::from_config(&config, executor, Arc::new(SimulatedMetrics::default()))
}

async fn eventually<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..500 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}

async fn all_terminal(orchestrator: &TaskOrchestrator) -> bool {
    orchestrator
        .list()
        .await
        .iter()
        .all(|task| task.status.is_terminal())
}

async fn count_with(orchestrator: &TaskOrchestrator, status: TaskStatus) -> usize {
    orchestrator
        .list()
        .await
        .iter()
        .filter(|task| task.status == status)
        .count()
}

fn drain(subscription: &mut Subscription) -> Vec<DashboardEvent> {
    let mut events = Vec::new();
    while let Some(event) = subscription.try_recv() {
        events.push(event);
    }
    events
}

fn task_updates(events: &[DashboardEvent]) -> HashMap<String, Vec<Task>> {
    let mut by_task: HashMap<String, Vec<Task>> = HashMap::new();
    for event in events {
        if let DashboardEvent::TaskUpdate(task) = event {
            by_task.entry(task.task_id.clone()).or_default().push(task.clone());
        }
    }
    by_task
}

#[tokio::test]
async fn test_new_subscriber_gets_snapshot_even_when_empty() {
    let orchestrator = orchestrator_with(Arc::new(Unreachable), 2);
    let mut subscription = orchestrator.subscribe().await;

    match subscription.recv().await {
        Some(DashboardEvent::SystemStatus(status)) => {
            assert_eq!(status.status, OverallHealth::Healthy);
            assert_eq!(status.performance.total_tasks, 0);
        }
        other => panic!("expected system status first, got {other:?}"),
    }
    assert_eq!(
        subscription.recv().await,
        Some(DashboardEvent::TasksUpdate { tasks: Vec::new() })
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_active_counter_matches_running_tasks_under_load() {
    let orchestrator = orchestrator_with(
        Arc::new(Mixed {
            calls: AtomicUsize::new(0),
        }),
        3,
    );
    let mut subscription = orchestrator.subscribe().await;

    let done = Arc::new(AtomicBool::new(false));
    let checker = {
        let orchestrator = orchestrator.clone();
        let done = done.clone();
        tokio::spawn(async move {
            let mut samples = 0usize;
            while !done.load(Ordering::SeqCst) {
                let (tasks, counts) = orchestrator.registry().snapshot().await;
                let running = tasks
                    .iter()
                    .filter(|task| task.status == TaskStatus::Running)
                    .count();
                assert_eq!(counts.active, running);
                assert_eq!(counts.total, tasks.len() as u64);
                samples += 1;
                tokio::task::yield_now().await;
            }
            samples
        })
    };

    let commands = ["click ok", "scroll up", "type \"bob\"", "scroll left", "press the submit button"];
    let mut submissions = Vec::new();
    for i in 0..30 {
        let orchestrator = orchestrator.clone();
        let command = commands[i % commands.len()];
        submissions.push(tokio::spawn(async move {
            orchestrator.submit(command, "load", 5).await
        }));
    }
    let mut ids = Vec::new();
    for submission in submissions {
        ids.push(submission.await.unwrap().unwrap().task_id);
    }
    for id in ids.iter().step_by(7) {
        // may already be finished; either outcome is fine
        let _ = orchestrator.cancel(id).await;
    }

    eventually("all tasks to finish", || all_terminal(&orchestrator)).await;
    done.store(true, Ordering::SeqCst);
    assert!(checker.await.unwrap() > 0);

    let status = orchestrator.status().await;
    assert_eq!(status.performance.active_tasks, 0);
    assert_eq!(status.performance.total_tasks, 30);

    // Every task's observed updates form a valid lifecycle path.
    let updates = task_updates(&drain(&mut subscription));
    assert_eq!(updates.len(), 30);
    for (task_id, history) in updates {
        assert_eq!(history[0].status, TaskStatus::Pending, "task {task_id}");
        for pair in history.windows(2) {
            let (from, to) = (pair[0].status, pair[1].status);
            assert!(!from.is_terminal(), "task {task_id} changed after {from}");
            assert!(
                from == to || from.can_transition_to(to),
                "task {task_id} moved {from} -> {to}"
            );
            if from == to {
                assert!(pair[1].progress >= pair[0].progress);
            }
        }
        assert!(history.last().unwrap().status.is_terminal());
    }
}

#[tokio::test]
async fn test_kill_switch_cancels_everything_and_reset_keeps_history() {
    let gate = Arc::new(Semaphore::new(0));
    let orchestrator = orchestrator_with(Arc::new(Gated { gate: gate.clone() }), 2);

    let mut tasks = Vec::new();
    for _ in 0..4 {
        tasks.push(orchestrator.submit("click ok", "tester", 5).await.unwrap());
    }
    eventually("two running tasks", || async {
        count_with(&orchestrator, TaskStatus::Running).await == 2
    })
    .await;
    assert_eq!(count_with(&orchestrator, TaskStatus::Pending).await, 2);

    let mut subscription = orchestrator.subscribe().await;
    drain(&mut subscription);

    let cancelled = orchestrator.activate_kill_switch("operator pressed stop").await;
    assert_eq!(cancelled.len(), 4);

    let status = orchestrator.status().await;
    assert!(status.security.kill_switch_active);
    assert_eq!(status.status, OverallHealth::Critical);
    assert_eq!(status.performance.active_tasks, 0);
    for task in &tasks {
        let current = orchestrator.get(&task.task_id).await.unwrap();
        assert_eq!(current.status, TaskStatus::Cancelled);
        assert!(current.finished_at.is_some());
    }

    let events = drain(&mut subscription);
    assert!(events.iter().any(|event| matches!(
        event,
        DashboardEvent::Notification(n) if n.level == NotificationLevel::Warning
            && n.message == "operator pressed stop"
    )));
    assert!(events.iter().any(|event| matches!(
        event,
        DashboardEvent::SystemStatus(s) if s.security.kill_switch_active
    )));

    // Releasing the gate now must not revive anything.
    gate.add_permits(4);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(count_with(&orchestrator, TaskStatus::Cancelled).await, 4);

    orchestrator.reset_kill_switch().await;
    let status = orchestrator.status().await;
    assert!(!status.security.kill_switch_active);
    assert_eq!(status.status, OverallHealth::Healthy);
    assert_eq!(count_with(&orchestrator, TaskStatus::Cancelled).await, 4);

    let fresh = orchestrator.submit("click ok", "tester", 5).await.unwrap();
    gate.add_permits(1);
    eventually("fresh task to complete", || async {
        orchestrator.get(&fresh.task_id).await.unwrap().status == TaskStatus::Completed
    })
    .await;
}

#[tokio::test]
async fn test_pending_task_cancelled_before_it_starts() {
    let gate = Arc::new(Semaphore::new(0));
    let orchestrator = orchestrator_with(Arc::new(Gated { gate: gate.clone() }), 1);

    let running = orchestrator.submit("click ok", "tester", 5).await.unwrap();
    let queued = orchestrator.submit("scroll up", "tester", 5).await.unwrap();
    eventually("first task running", || async {
        orchestrator.get(&running.task_id).await.unwrap().status == TaskStatus::Running
    })
    .await;

    let cancelled = orchestrator.cancel(&queued.task_id).await.unwrap();
    assert_eq!(cancelled.status, TaskStatus::Cancelled);
    assert_eq!(cancelled.progress, 0);

    gate.add_permits(1);
    eventually("first task to complete", || async {
        orchestrator.get(&running.task_id).await.unwrap().status == TaskStatus::Completed
    })
    .await;
    assert_eq!(
        orchestrator.get(&queued.task_id).await.unwrap().status,
        TaskStatus::Cancelled
    );
}

#[tokio::test]
async fn test_rapid_submissions_against_unreachable_host() {
    let orchestrator = orchestrator_with(Arc::new(Unreachable), 8);
    let mut subscription = orchestrator.subscribe().await;
    drain(&mut subscription);

    let first = orchestrator.submit("click ok", "tester", 5).await.unwrap();
    let second = orchestrator.submit("scroll up", "tester", 5).await.unwrap();

    eventually("both tasks to fail", || async {
        count_with(&orchestrator, TaskStatus::Failed).await == 2
    })
    .await;

    for id in [&first.task_id, &second.task_id] {
        let task = orchestrator.get(id).await.unwrap();
        assert_eq!(task.progress, 0);
        assert!(task.error.as_deref().unwrap_or_default().contains("No route to host"));
    }
    assert_eq!(orchestrator.status().await.performance.active_tasks, 0);

    // Allow the final status broadcasts to land.
    tokio::time::sleep(Duration::from_millis(20)).await;
    let events = drain(&mut subscription);
    let errors = events
        .iter()
        .filter(|event| matches!(
            event,
            DashboardEvent::Notification(n) if n.level == NotificationLevel::Error && n.title == "Task Error"
        ))
        .count();
    assert_eq!(errors, 2);
    assert!(events.iter().any(|event| matches!(
        event,
        DashboardEvent::SystemStatus(s) if s.performance.active_tasks == 0
    )));
}

#[tokio::test]
async fn test_submissions_are_interpreted() {
    let gate = Arc::new(Semaphore::new(0));
    let orchestrator = orchestrator_with(Arc::new(Gated { gate }), 4);

    let login = orchestrator
        .submit("click on the \"Login\" button", "web_user", 5)
        .await
        .unwrap();
    assert_eq!(
        login.parsed_command.kind,
        IntentKind::Click {
            target: "Login".to_string()
        }
    );
    assert_eq!(login.estimated_duration, 2);

    let typed = orchestrator
        .submit("type \"alice\" in the username field", "web_user", 5)
        .await
        .unwrap();
    match &typed.parsed_command.kind {
        IntentKind::Type { text, .. } => assert_eq!(text, "alice"),
        other => panic!("expected type intent, got {other:?}"),
    }
    assert_eq!(typed.estimated_duration, 3);

    let scroll = orchestrator.submit("scroll up", "web_user", 5).await.unwrap();
    assert_eq!(
        scroll.parsed_command.kind,
        IntentKind::Scroll {
            direction: ScrollDirection::Up
        }
    );
    assert_eq!(scroll.estimated_duration, 1);

    let unknown = orchestrator.submit("make coffee", "web_user", 5).await.unwrap();
    assert_eq!(unknown.parsed_command.kind.name(), "unknown");
    assert_eq!(unknown.parsed_command.confidence, 0.5);

    eventually("unknown command to fail", || async {
        orchestrator.get(&unknown.task_id).await.unwrap().status == TaskStatus::Failed
    })
    .await;
}
