//! Per-run step bookkeeping
//!
//! A [`Run`] owns the expanded main sequence, its cursor, the interim stack,
//! and the iteration counters. [`Run::advance`] is the synchronous half of the
//! step algorithm: it decides what the next step is without performing it.

use automator_core::{Action, ActionShape, RunId};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use crate::status::{RunPhase, RunStatus};

/// Kill latch shared between the [`Automator`](crate::Automator) and a run's driver
#[derive(Debug)]
pub(crate) struct RunControl {
    id: RunId,
    killed: AtomicBool,
    halt: Notify,
}

impl RunControl {
    pub(crate) fn new() -> Self {
        Self {
            id: RunId::new(),
            killed: AtomicBool::new(false),
            halt: Notify::new(),
        }
    }

    pub(crate) fn id(&self) -> &RunId {
        &self.id
    }

    /// Set the latch and wake anything waiting in [`unless_killed`](Self::unless_killed);
    /// the latch is never cleared
    pub(crate) fn kill(&self) {
        self.killed.store(true, Ordering::SeqCst);
        self.halt.notify_waiters();
    }

    pub(crate) fn is_killed(&self) -> bool {
        self.killed.load(Ordering::SeqCst)
    }

    /// Drive `fut` to completion unless the latch is set first
    pub(crate) async fn unless_killed<F: Future>(&self, fut: F) -> Option<F::Output> {
        let halted = self.halt.notified();
        tokio::pin!(halted);
        // Register before checking the latch so a concurrent kill is not missed
        halted.as_mut().enable();
        if self.is_killed() {
            return None;
        }

        tokio::select! {
            output = fut => Some(output),
            _ = halted => None,
        }
    }
}

/// LIFO stack of sequences injected by handlers
///
/// Never holds an empty sequence: empty pushes are refused and a sequence
/// is removed as soon as its last action is taken.
#[derive(Debug, Default)]
pub(crate) struct InterimStack {
    frames: Vec<VecDeque<Action>>,
}

impl InterimStack {
    /// Push a sequence; returns `false` if it was empty
    pub(crate) fn push(&mut self, actions: Vec<Action>) -> bool {
        if actions.is_empty() {
            return false;
        }
        self.frames.push(actions.into());
        true
    }

    /// Take the next action from the top sequence
    pub(crate) fn pop(&mut self) -> Option<Action> {
        let top = self.frames.last_mut()?;
        let action = top.pop_front();
        if top.is_empty() {
            self.frames.pop();
        }
        action
    }

    pub(crate) fn peek(&self) -> Option<&Action> {
        self.frames.last().and_then(VecDeque::front)
    }

    pub(crate) fn depth(&self) -> usize {
        self.frames.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// What the driver should do next
#[derive(Debug)]
pub(crate) enum Step {
    /// The kill latch is set
    Halted,

    /// Every action of an iteration ran
    ///
    /// `iteration` is the index that just finished; `finished` is true when
    /// it was the last one requested.
    IterationDone { iteration: usize, finished: bool },

    /// A null action was taken and should be skipped
    Skipped,

    /// Hand `action` to its handler, then wait `delay` before the next step
    Dispatch {
        action: Action,
        shape: ActionShape,
        delay: Duration,
        from_interim: bool,
    },
}

/// State of one `automate` invocation
#[derive(Debug)]
pub(crate) struct Run {
    control: Arc<RunControl>,
    actions: Vec<Action>,
    action_index: usize,
    interim: InterimStack,
    iteration_index: usize,
    num_iterations: usize,
}

impl Run {
    pub(crate) fn new(control: Arc<RunControl>, actions: Vec<Action>, num_iterations: usize) -> Self {
        Self {
            control,
            actions,
            action_index: 0,
            interim: InterimStack::default(),
            iteration_index: 0,
            num_iterations,
        }
    }

    pub(crate) fn id(&self) -> &RunId {
        self.control.id()
    }

    pub(crate) fn is_killed(&self) -> bool {
        self.control.is_killed()
    }

    pub(crate) fn control(&self) -> &RunControl {
        &self.control
    }

    /// Cursor into the main sequence
    pub(crate) fn action_index(&self) -> usize {
        self.action_index
    }

    pub(crate) fn interim_depth(&self) -> usize {
        self.interim.depth()
    }

    /// Decide the next step
    ///
    /// Interim actions are taken before the main sequence. The main cursor
    /// advances before the action is dispatched. `step_delay` applies unless
    /// the action or the one after it is a delay, or nothing follows.
    pub(crate) fn advance(&mut self, step_delay: Duration) -> Step {
        if self.control.is_killed() {
            return Step::Halted;
        }

        let from_interim = !self.interim.is_empty();
        let action = if let Some(action) = self.interim.pop() {
            action
        } else if let Some(action) = self.actions.get(self.action_index) {
            self.action_index += 1;
            action.clone()
        } else {
            let iteration = self.iteration_index;
            self.iteration_index += 1;
            let finished = self.iteration_index >= self.num_iterations;
            if !finished {
                self.action_index = 0;
            }
            return Step::IterationDone {
                iteration,
                finished,
            };
        };

        let Some(shape) = action.shape() else {
            return Step::Skipped;
        };

        let next_is_gap = self
            .peek()
            .map_or(true, |next| next.is_delay() || next.is_null());
        let delay = if action.is_delay() || next_is_gap {
            Duration::ZERO
        } else {
            step_delay
        };

        Step::Dispatch {
            action,
            shape,
            delay,
            from_interim,
        }
    }

    /// Next pending action, without taking it
    pub(crate) fn peek(&self) -> Option<&Action> {
        self.interim
            .peek()
            .or_else(|| self.actions.get(self.action_index))
    }

    /// Push a handler-supplied sequence; returns `false` if it was empty
    pub(crate) fn push_interim(&mut self, actions: Vec<Action>) -> bool {
        self.interim.push(actions)
    }

    pub(crate) fn snapshot(&self, phase: RunPhase) -> RunStatus {
        RunStatus {
            run_id: Some(self.id().clone()),
            phase,
            action_index: self.action_index,
            action_count: self.actions.len(),
            iteration_index: self.iteration_index,
            num_iterations: self.num_iterations,
            interim_depth: self.interim.depth(),
            killed: self.control.is_killed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STEP: Duration = Duration::from_millis(100);

    fn run_of(actions: Vec<Action>, iterations: usize) -> Run {
        Run::new(Arc::new(RunControl::new()), actions, iterations)
    }

    /// Advance until the next dispatch, returning its token text and delay
    fn next_dispatch(run: &mut Run) -> (String, Duration) {
        loop {
            match run.advance(STEP) {
                Step::Dispatch { action, delay, .. } => return (action.to_string(), delay),
                Step::Skipped => continue,
                other => panic!("expected a dispatch, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_interim_stack_never_holds_empty_frames() {
        let mut stack = InterimStack::default();
        assert!(!stack.push(vec![]));
        assert_eq!(stack.depth(), 0);

        assert!(stack.push(vec![Action::key("a")]));
        assert_eq!(stack.depth(), 1);
        assert_eq!(stack.pop().unwrap().as_key(), Some("a"));
        assert_eq!(stack.depth(), 0);
        assert!(stack.pop().is_none());
    }

    #[test]
    fn test_interim_stack_is_lifo_across_frames() {
        let mut stack = InterimStack::default();
        stack.push(vec![Action::key("a1"), Action::key("a2")]);
        assert_eq!(stack.pop().unwrap().as_key(), Some("a1"));
        stack.push(vec![Action::key("b1")]);

        assert_eq!(stack.peek().and_then(Action::as_key), Some("b1"));
        assert_eq!(stack.pop().unwrap().as_key(), Some("b1"));
        assert_eq!(stack.pop().unwrap().as_key(), Some("a2"));
        assert!(stack.is_empty());
    }

    #[test]
    fn test_no_step_delay_around_delay_actions() {
        let mut run = run_of(
            vec![
                Action::delay(5),
                Action::key("a"),
                Action::delay(10),
                Action::key("b"),
            ],
            1,
        );

        for _ in 0..4 {
            let (_, delay) = next_dispatch(&mut run);
            assert_eq!(delay, Duration::ZERO);
        }
    }

    #[test]
    fn test_step_delay_between_plain_actions() {
        let mut run = run_of(
            vec![
                Action::key("a"),
                Action::key("b"),
                Action::Null,
                Action::key("c"),
            ],
            1,
        );

        assert_eq!(next_dispatch(&mut run), ("\"a\"".to_string(), STEP));
        // next is null
        assert_eq!(next_dispatch(&mut run), ("\"b\"".to_string(), Duration::ZERO));
        // last action
        assert_eq!(next_dispatch(&mut run), ("\"c\"".to_string(), Duration::ZERO));
    }

    #[test]
    fn test_iteration_bookkeeping() {
        let mut run = run_of(vec![Action::key("a")], 2);

        assert!(matches!(run.advance(STEP), Step::Dispatch { .. }));
        assert!(matches!(
            run.advance(STEP),
            Step::IterationDone {
                iteration: 0,
                finished: false
            }
        ));
        assert_eq!(run.snapshot(RunPhase::Iterating).action_index, 0);

        assert!(matches!(run.advance(STEP), Step::Dispatch { .. }));
        assert!(matches!(
            run.advance(STEP),
            Step::IterationDone {
                iteration: 1,
                finished: true
            }
        ));
    }

    #[test]
    fn test_zero_iterations_still_runs_once() {
        let mut run = run_of(vec![], 0);
        assert!(matches!(
            run.advance(STEP),
            Step::IterationDone {
                iteration: 0,
                finished: true
            }
        ));
    }

    #[test]
    fn test_interim_runs_before_main_sequence_resumes() {
        let mut run = run_of(vec![Action::key("a"), Action::key("d")], 1);

        assert_eq!(next_dispatch(&mut run).0, "\"a\"");
        run.push_interim(vec![Action::key("b"), Action::key("c")]);

        match run.advance(STEP) {
            Step::Dispatch {
                action,
                from_interim,
                delay,
                ..
            } => {
                assert_eq!(action.as_key(), Some("b"));
                assert!(from_interim);
                assert_eq!(delay, STEP);
            }
            other => panic!("unexpected step {:?}", other),
        }
        assert_eq!(next_dispatch(&mut run).0, "\"c\"");
        assert_eq!(run.interim_depth(), 0);
        assert_eq!(next_dispatch(&mut run).0, "\"d\"");
    }

    #[test]
    fn test_null_is_skipped() {
        let mut run = run_of(vec![Action::Null], 1);
        assert!(matches!(run.advance(STEP), Step::Skipped));
        assert!(matches!(run.advance(STEP), Step::IterationDone { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_kill_interrupts_wait() {
        let control = Arc::new(RunControl::new());
        let killer = control.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            killer.kill();
        });

        let waited = control.unless_killed(std::future::pending::<()>()).await;
        assert!(waited.is_none());
        assert!(control.unless_killed(async { 1 }).await.is_none());
    }

    #[tokio::test]
    async fn test_unless_killed_passes_output_through() {
        let control = RunControl::new();
        assert_eq!(control.unless_killed(async { 7 }).await, Some(7));
    }

    #[test]
    fn test_kill_halts() {
        let control = Arc::new(RunControl::new());
        let mut run = Run::new(control.clone(), vec![Action::key("a")], 1);

        control.kill();
        assert!(matches!(run.advance(STEP), Step::Halted));
        assert!(run.snapshot(RunPhase::Killed).killed);
    }
}
