//! Bounded-concurrency FIFO scheduler for [`Task`]s.

use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, trace, warn};

use super::error::{contain, TaskError, TaskFault};
use super::traits::Task;
use super::types::{Completion, QueueCommand, TaskContext, TaskId, TaskMessage};
use crate::metrics;

const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    Idle,
    Running,
    Paused,
}

/// A task together with its queue-assigned id.
#[derive(Debug)]
pub struct Slot<T> {
    id: TaskId,
    task: T,
}

impl<T> Slot<T> {
    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn task(&self) -> &T {
        &self.task
    }

    pub fn task_mut(&mut self) -> &mut T {
        &mut self.task
    }
}

/// Summary of a run that reached its finished hook.
#[derive(Debug)]
pub struct RunSummary {
    pub elapsed: Duration,
    pub finished: usize,
    pub still_running: usize,
    pub faults: Vec<TaskFault>,
}

/// How a run ended.
#[derive(Debug)]
pub enum RunOutcome {
    Finished(RunSummary),
    Aborted,
}

/// Callbacks a queue owner plugs into the control loop.
pub trait QueueHooks<T: Task> {
    /// Called once per task after it completed, before it is moved to the
    /// finished list.
    fn on_task_finished(&mut self, _task: &mut T) {}

    /// Called periodically while a run is in progress.
    fn on_tick(&mut self, _queue: &TaskQueue<T>) {}

    /// Called exactly once per run, after the last task finished.
    fn finished(&mut self, _summary: &RunSummary) -> Result<(), TaskError> {
        Ok(())
    }

    /// Called after an abort instead of `finished`.
    fn aborted(&mut self) {}
}

impl<T: Task> QueueHooks<T> for () {}

/// Cloneable remote control for a running queue.
pub struct QueueHandle<E> {
    tx: mpsc::UnboundedSender<TaskMessage<E>>,
}

impl<E> Clone for QueueHandle<E> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<E> QueueHandle<E> {
    pub fn pause(&self) -> bool {
        self.send(QueueCommand::Pause)
    }

    pub fn resume(&self) -> bool {
        self.send(QueueCommand::Resume)
    }

    pub fn abort(&self) -> bool {
        self.send(QueueCommand::Abort)
    }

    fn send(&self, command: QueueCommand) -> bool {
        self.tx.send(TaskMessage::Control(command)).is_ok()
    }
}

/// Runs tasks in insertion order with at most `max_concurrency` running.
pub struct TaskQueue<T: Task> {
    max_concurrency: usize,
    waiting: VecDeque<Slot<T>>,
    running: Vec<Slot<T>>,
    finished: Vec<Slot<T>>,
    state: QueueState,
    next_id: u64,
    tx: mpsc::UnboundedSender<TaskMessage<T::Event>>,
    rx: mpsc::UnboundedReceiver<TaskMessage<T::Event>>,
    started_at: Option<Instant>,
    faults: Vec<TaskFault>,
    outcome: Option<RunOutcome>,
    tick_interval: Duration,
}

impl<T: Task> TaskQueue<T> {
    /// Creates a queue. A concurrency of zero is raised to one.
    pub fn new(max_concurrency: usize) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            max_concurrency: max_concurrency.max(1),
            waiting: VecDeque::new(),
            running: Vec::new(),
            finished: Vec::new(),
            state: QueueState::Idle,
            next_id: 0,
            tx,
            rx,
            started_at: None,
            faults: Vec::new(),
            outcome: None,
            tick_interval: DEFAULT_TICK_INTERVAL,
        }
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    pub fn handle(&self) -> QueueHandle<T::Event> {
        QueueHandle {
            tx: self.tx.clone(),
        }
    }

    pub fn state(&self) -> QueueState {
        self.state
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    pub fn waiting(&self) -> impl Iterator<Item = &Slot<T>> {
        self.waiting.iter()
    }

    pub fn running(&self) -> impl Iterator<Item = &Slot<T>> {
        self.running.iter()
    }

    pub fn finished(&self) -> impl Iterator<Item = &Slot<T>> {
        self.finished.iter()
    }

    pub fn waiting_count(&self) -> usize {
        self.waiting.len()
    }

    pub fn running_count(&self) -> usize {
        self.running.len()
    }

    pub fn finished_count(&self) -> usize {
        self.finished.len()
    }

    /// Removes and returns the finished tasks.
    pub fn take_finished(&mut self) -> Vec<Slot<T>> {
        std::mem::take(&mut self.finished)
    }

    /// Total number of tasks across all three lists.
    pub fn len(&self) -> usize {
        self.waiting.len() + self.running.len() + self.finished.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Time since the current run started.
    pub fn elapsed(&self) -> Option<Duration> {
        self.started_at.map(|t| t.elapsed())
    }

    /// Appends a task to the waiting list.
    ///
    /// Added to a running queue with a free slot, it starts immediately.
    pub fn add_task(&mut self, mut task: T) -> TaskId {
        self.next_id += 1;
        let id = TaskId::new(self.next_id);
        task.set_callback(Completion::new(id, self.tx.clone()));
        debug!(task = %id, name = %task.name(), "Task queued");
        self.waiting.push_back(Slot { id, task });
        self.promote();
        id
    }

    /// Starts a run. Use [`TaskQueue::run`] to also drive the control loop.
    pub fn start(&mut self) {
        if self.state != QueueState::Idle {
            warn!(state = ?self.state, "Queue already started");
            return;
        }
        info!(
            tasks = self.waiting.len(),
            max_concurrency = self.max_concurrency,
            "Starting task queue"
        );
        self.state = QueueState::Running;
        self.started_at = Some(Instant::now());
        self.faults.clear();
        self.outcome = None;
        self.promote();
    }

    /// Pauses every running task and stops promoting waiting ones.
    pub fn pause(&mut self) {
        if self.state != QueueState::Running {
            debug!(state = ?self.state, "Pause ignored");
            return;
        }
        self.state = QueueState::Paused;
        for i in 0..self.running.len() {
            let slot = &mut self.running[i];
            let id = slot.id;
            if let Err(fault) = contain(id, || slot.task.pause()) {
                self.contain_fault(fault);
            }
        }
        info!(running = self.running.len(), "Task queue paused");
    }

    pub fn resume(&mut self) {
        if self.state != QueueState::Paused {
            debug!(state = ?self.state, "Resume ignored");
            return;
        }
        self.state = QueueState::Running;
        for i in 0..self.running.len() {
            let slot = &mut self.running[i];
            let id = slot.id;
            if let Err(fault) = contain(id, || slot.task.resume()) {
                self.contain_fault(fault);
            }
        }
        info!(running = self.running.len(), "Task queue resumed");
        self.promote();
    }

    /// Cancels running tasks, discards all tasks and returns to idle.
    ///
    /// The finished hook is not called for an aborted run.
    pub fn abort(&mut self) {
        for slot in self.running.iter_mut() {
            let id = slot.id;
            if let Err(fault) = contain(id, || slot.task.cancel()) {
                error!(task = %fault.task, error = %fault.error, "Cancel failed");
            }
        }
        info!(
            running = self.running.len(),
            waiting = self.waiting.len(),
            "Task queue aborted"
        );
        metrics::TASKS_RUNNING.sub(self.running.len() as i64);
        self.running.clear();
        self.waiting.clear();
        self.finished.clear();
        self.faults.clear();
        self.started_at = None;
        self.state = QueueState::Idle;
        self.outcome = Some(RunOutcome::Aborted);
    }

    /// Runs the queue until every task finished or the run is aborted.
    pub async fn run<H: QueueHooks<T>>(&mut self, hooks: &mut H) -> RunOutcome {
        self.start();
        if self.is_drained() {
            self.finish(hooks);
        }

        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        while self.outcome.is_none() {
            tokio::select! {
                Some(message) = self.rx.recv() => self.dispatch(message, hooks),
                _ = ticker.tick() => hooks.on_tick(self),
            }
        }
        self.outcome.take().unwrap_or(RunOutcome::Aborted)
    }

    /// Processes every message already queued on the channel, without
    /// waiting. Returns the number of messages handled.
    pub fn process_pending<H: QueueHooks<T>>(&mut self, hooks: &mut H) -> usize {
        let mut handled = 0;
        while let Ok(message) = self.rx.try_recv() {
            self.dispatch(message, hooks);
            handled += 1;
        }
        handled
    }

    /// Takes the outcome of the last run, if it ended.
    pub fn take_outcome(&mut self) -> Option<RunOutcome> {
        self.outcome.take()
    }

    /// Handles a single control-loop message.
    pub fn dispatch<H: QueueHooks<T>>(&mut self, message: TaskMessage<T::Event>, hooks: &mut H) {
        match message {
            TaskMessage::Event { task, event } => {
                let Some(slot) = self.running.iter_mut().find(|s| s.id == task) else {
                    trace!(task = %task, "Dropping event for inactive task");
                    return;
                };
                if let Err(fault) = contain(task, || slot.task.on_event(event)) {
                    self.contain_fault(fault);
                }
            }
            TaskMessage::Completed { task } => self.complete(task, hooks),
            TaskMessage::Control(QueueCommand::Pause) => self.pause(),
            TaskMessage::Control(QueueCommand::Resume) => self.resume(),
            TaskMessage::Control(QueueCommand::Abort) => {
                self.abort();
                hooks.aborted();
            }
        }
    }

    fn is_drained(&self) -> bool {
        self.waiting.is_empty() && self.running.is_empty()
    }

    fn promote(&mut self) {
        while self.state == QueueState::Running && self.running.len() < self.max_concurrency {
            let Some(mut slot) = self.waiting.pop_front() else {
                break;
            };
            let id = slot.id;
            let ctx = TaskContext::new(id, self.tx.clone());
            debug!(task = %id, name = %slot.task.name(), "Starting task");
            let result = contain(id, || slot.task.run(&ctx));
            self.running.push(slot);
            metrics::TASKS_RUNNING.inc();
            if let Err(fault) = result {
                self.contain_fault(fault);
            }
        }
    }

    /// Marks the faulted task errored and routes it through the normal
    /// completion path.
    fn contain_fault(&mut self, fault: TaskFault) {
        error!(task = %fault.task, error = %fault.error, "Task fault contained");
        metrics::TASK_FAULTS.inc();
        if let Some(slot) = self.running.iter_mut().find(|s| s.id == fault.task) {
            let error = TaskError::failed(fault.error.to_string());
            if let Err(nested) = contain(fault.task, || {
                slot.task.fail(error);
                Ok(())
            }) {
                error!(task = %nested.task, error = %nested.error, "Task failed while failing");
            }
            let _ = self.tx.send(TaskMessage::Completed { task: fault.task });
        }
        self.faults.push(fault);
    }

    fn complete<H: QueueHooks<T>>(&mut self, id: TaskId, hooks: &mut H) {
        let Some(pos) = self.running.iter().position(|s| s.id == id) else {
            trace!(task = %id, "Ignoring completion of inactive task");
            return;
        };
        let mut slot = self.running.remove(pos);
        metrics::TASKS_RUNNING.dec();
        debug!(task = %id, state = ?slot.task.state(), "Task completed");

        let task = &mut slot.task;
        if let Err(fault) = contain(id, || {
            hooks.on_task_finished(task);
            Ok(())
        }) {
            error!(task = %fault.task, error = %fault.error, "Task finished hook failed");
            self.faults.push(fault);
        }
        self.finished.push(slot);

        self.promote();
        if self.state != QueueState::Idle && self.is_drained() {
            self.finish(hooks);
        }
    }

    fn finish<H: QueueHooks<T>>(&mut self, hooks: &mut H) {
        let summary = RunSummary {
            elapsed: self.elapsed().unwrap_or_default(),
            finished: self.finished.len(),
            still_running: self.running.len(),
            faults: std::mem::take(&mut self.faults),
        };
        self.state = QueueState::Idle;
        info!(
            finished = summary.finished,
            faults = summary.faults.len(),
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "Task queue finished"
        );
        if let Err(e) = hooks.finished(&summary) {
            error!(error = %e, "Queue finished hook failed");
        }
        self.outcome = Some(RunOutcome::Finished(summary));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Progress, TaskState};

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Step {
        Finish,
        Fail,
        Panic,
    }

    struct TestTask {
        label: &'static str,
        state: TaskState,
        completion: Option<Completion<Step>>,
        error: Option<TaskError>,
        fail_on_run: bool,
    }

    impl TestTask {
        fn new(label: &'static str) -> Self {
            Self {
                label,
                state: TaskState::Pending,
                completion: None,
                error: None,
                fail_on_run: false,
            }
        }

        fn failing(label: &'static str) -> Self {
            Self {
                fail_on_run: true,
                ..Self::new(label)
            }
        }

        fn done(&mut self, state: TaskState) {
            self.state = state;
            if let Some(c) = self.completion.take() {
                c.fire();
            }
        }
    }

    impl Task for TestTask {
        type Event = Step;

        fn name(&self) -> String {
            self.label.to_string()
        }

        fn state(&self) -> TaskState {
            self.state
        }

        fn set_callback(&mut self, completion: Completion<Step>) {
            self.completion = Some(completion);
        }

        fn run(&mut self, _ctx: &TaskContext<Step>) -> Result<(), TaskError> {
            if self.fail_on_run {
                return Err(TaskError::failed("cannot start"));
            }
            self.state = TaskState::Running;
            Ok(())
        }

        fn on_event(&mut self, event: Step) -> Result<(), TaskError> {
            match event {
                Step::Finish => self.done(TaskState::Done),
                Step::Fail => return Err(TaskError::failed("event failed")),
                Step::Panic => panic!("handler exploded"),
            }
            Ok(())
        }

        fn cancel(&mut self) -> Result<(), TaskError> {
            self.state = TaskState::Aborted;
            Ok(())
        }

        fn pause(&mut self) -> Result<(), TaskError> {
            self.state = TaskState::Paused;
            Ok(())
        }

        fn resume(&mut self) -> Result<(), TaskError> {
            self.state = TaskState::Running;
            Ok(())
        }

        fn progress(&self) -> Progress {
            Progress::unknown()
        }

        fn error(&self) -> Option<&TaskError> {
            self.error.as_ref()
        }

        fn fail(&mut self, error: TaskError) {
            self.state = TaskState::Errored;
            self.error = Some(error);
            self.completion = None;
        }
    }

    #[derive(Default)]
    struct Recorder {
        finished_tasks: Vec<String>,
        finished_calls: usize,
        aborted_calls: usize,
    }

    impl QueueHooks<TestTask> for Recorder {
        fn on_task_finished(&mut self, task: &mut TestTask) {
            self.finished_tasks.push(task.name());
        }

        fn finished(&mut self, _summary: &RunSummary) -> Result<(), TaskError> {
            self.finished_calls += 1;
            Ok(())
        }

        fn aborted(&mut self) {
            self.aborted_calls += 1;
        }
    }

    fn event(id: TaskId, event: Step) -> TaskMessage<Step> {
        TaskMessage::Event { task: id, event }
    }

    #[test]
    fn test_concurrency_bound_and_fifo_order() {
        let mut queue = TaskQueue::new(2);
        let a = queue.add_task(TestTask::new("a"));
        let b = queue.add_task(TestTask::new("b"));
        let c = queue.add_task(TestTask::new("c"));
        let mut hooks = Recorder::default();

        queue.start();
        assert_eq!(queue.running_count(), 2);
        assert_eq!(queue.waiting_count(), 1);

        queue.dispatch(event(b, Step::Finish), &mut hooks);
        queue.process_pending(&mut hooks);
        assert_eq!(queue.running_count(), 2);
        assert_eq!(queue.waiting().count(), 0);
        let running: Vec<_> = queue.running().map(|s| s.id()).collect();
        assert_eq!(running, vec![a, c]);

        queue.dispatch(event(a, Step::Finish), &mut hooks);
        queue.dispatch(event(c, Step::Finish), &mut hooks);
        queue.process_pending(&mut hooks);

        assert_eq!(hooks.finished_tasks, vec!["b", "a", "c"]);
        assert_eq!(hooks.finished_calls, 1);
        assert_eq!(queue.state(), QueueState::Idle);
        assert!(matches!(queue.take_outcome(), Some(RunOutcome::Finished(s)) if s.finished == 3));
    }

    #[test]
    fn test_zero_concurrency_is_raised_to_one() {
        let queue: TaskQueue<TestTask> = TaskQueue::new(0);
        assert_eq!(queue.max_concurrency(), 1);
    }

    #[test]
    fn test_duplicate_completion_is_ignored() {
        let mut queue = TaskQueue::new(1);
        let a = queue.add_task(TestTask::new("a"));
        let mut hooks = Recorder::default();
        queue.start();

        queue.dispatch(event(a, Step::Finish), &mut hooks);
        queue.dispatch(TaskMessage::Completed { task: a }, &mut hooks);
        queue.process_pending(&mut hooks);

        assert_eq!(hooks.finished_tasks.len(), 1);
        assert_eq!(hooks.finished_calls, 1);
    }

    #[test]
    fn test_failing_run_is_contained() {
        let mut queue = TaskQueue::new(1);
        queue.add_task(TestTask::failing("bad"));
        let good = queue.add_task(TestTask::new("good"));
        let mut hooks = Recorder::default();

        queue.start();
        queue.process_pending(&mut hooks);
        assert_eq!(hooks.finished_tasks, vec!["bad"]);
        assert_eq!(queue.running().next().map(|s| s.id()), Some(good));

        let bad = queue.finished().next().unwrap();
        assert_eq!(bad.task().state(), TaskState::Errored);
        assert!(bad.task().error().is_some());

        queue.dispatch(event(good, Step::Finish), &mut hooks);
        queue.process_pending(&mut hooks);
        assert_eq!(hooks.finished_calls, 1);
        match queue.take_outcome() {
            Some(RunOutcome::Finished(summary)) => assert_eq!(summary.faults.len(), 1),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_event_errors_and_panics_are_contained() {
        let mut queue = TaskQueue::new(2);
        let a = queue.add_task(TestTask::new("a"));
        let b = queue.add_task(TestTask::new("b"));
        let mut hooks = Recorder::default();
        queue.start();

        queue.dispatch(event(a, Step::Fail), &mut hooks);
        queue.dispatch(event(b, Step::Panic), &mut hooks);
        queue.process_pending(&mut hooks);

        assert_eq!(hooks.finished_calls, 1);
        assert!(queue
            .finished()
            .all(|s| s.task().state() == TaskState::Errored));
    }

    #[test]
    fn test_abort_skips_finished_hook() {
        let mut queue = TaskQueue::new(1);
        queue.add_task(TestTask::new("a"));
        queue.add_task(TestTask::new("b"));
        let mut hooks = Recorder::default();
        queue.start();

        queue.dispatch(TaskMessage::Control(QueueCommand::Abort), &mut hooks);
        queue.process_pending(&mut hooks);

        assert_eq!(hooks.aborted_calls, 1);
        assert_eq!(hooks.finished_calls, 0);
        assert!(queue.is_empty());
        assert_eq!(queue.state(), QueueState::Idle);
    }

    #[test]
    fn test_pause_holds_back_waiting_tasks() {
        let mut queue = TaskQueue::new(1);
        let a = queue.add_task(TestTask::new("a"));
        queue.add_task(TestTask::new("b"));
        let mut hooks = Recorder::default();
        queue.start();

        queue.pause();
        assert_eq!(queue.running().next().unwrap().task().state(), TaskState::Paused);

        queue.dispatch(event(a, Step::Finish), &mut hooks);
        queue.process_pending(&mut hooks);
        assert_eq!(queue.running_count(), 0);
        assert_eq!(queue.waiting_count(), 1);

        queue.resume();
        assert_eq!(queue.running_count(), 1);
    }

    #[tokio::test]
    async fn test_run_with_no_tasks_finishes_immediately() {
        let mut queue: TaskQueue<TestTask> = TaskQueue::new(3);
        let mut hooks = Recorder::default();
        let outcome = queue.run(&mut hooks).await;
        assert!(matches!(outcome, RunOutcome::Finished(ref s) if s.finished == 0));
        assert_eq!(hooks.finished_calls, 1);
    }

    #[tokio::test]
    async fn test_run_drives_events_from_handle() {
        let mut queue = TaskQueue::new(1);
        let a = queue.add_task(TestTask::new("a"));
        let tx = queue.tx.clone();
        tx.send(event(a, Step::Finish)).unwrap();

        let mut hooks = Recorder::default();
        let outcome = queue.run(&mut hooks).await;
        assert!(matches!(outcome, RunOutcome::Finished(_)));
        assert_eq!(hooks.finished_tasks, vec!["a"]);
    }

    #[tokio::test]
    async fn test_handle_abort_stops_run() {
        let mut queue = TaskQueue::new(1);
        queue.add_task(TestTask::new("a"));
        let handle = queue.handle();
        assert!(handle.abort());

        let outcome = queue.run(&mut ()).await;
        assert!(matches!(outcome, RunOutcome::Aborted));
    }
}
