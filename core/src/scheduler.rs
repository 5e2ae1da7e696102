use web_time::{Duration, Instant};

/// Identifies one scheduled task so it can be cancelled.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

#[derive(Clone, Debug)]
struct Scheduled<T> {
    handle: TimerHandle,
    task: T,
    due: Instant,
    period: Option<Duration>,
}

/// Explicit timer table, tasks only run when the owner polls it.
#[derive(Clone, Debug)]
pub struct Scheduler<T> {
    next_handle: u64,
    pending: Vec<Scheduled<T>>,
}

impl<T: Copy> Scheduler<T> {
    pub fn new() -> Self {
        Self {
            next_handle: 0,
            pending: Vec::new(),
        }
    }

    /// Schedules `task` to fire once at `due`.
    pub fn once(&mut self, task: T, due: Instant) -> TimerHandle {
        self.insert(task, due, None)
    }

    /// Schedules `task` to fire at `first_due` and every `period` after it.
    pub fn every(&mut self, task: T, first_due: Instant, period: Duration) -> TimerHandle {
        self.insert(task, first_due, Some(period))
    }

    fn insert(&mut self, task: T, due: Instant, period: Option<Duration>) -> TimerHandle {
        let handle = TimerHandle(self.next_handle);
        self.next_handle += 1;
        self.pending.push(Scheduled {
            handle,
            task,
            due,
            period,
        });
        handle
    }

    /// Returns whether the task was still pending.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        let before = self.pending.len();
        self.pending.retain(|scheduled| scheduled.handle != handle);
        before != self.pending.len()
    }

    /// Drops every pending task, returning how many there were.
    pub fn cancel_all(&mut self) -> usize {
        let count = self.pending.len();
        self.pending.clear();
        count
    }

    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.pending.iter().any(|scheduled| scheduled.handle == handle)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.iter().map(|scheduled| scheduled.due).min()
    }

    /// Takes the earliest task due at `now`.
    ///
    /// One-shot tasks are removed, periodic ones are rescheduled. A periodic task that
    /// fell more than one period behind fires once and resumes one period after `now`.
    pub fn pop_due(&mut self, now: Instant) -> Option<T> {
        let position = self
            .pending
            .iter()
            .enumerate()
            .filter(|(_, scheduled)| scheduled.due <= now)
            .min_by_key(|(_, scheduled)| (scheduled.due, scheduled.handle))
            .map(|(position, _)| position)?;

        let scheduled = &self.pending[position];
        let task = scheduled.task;
        match scheduled.period {
            Some(period) => {
                let next = scheduled.due + period;
                self.pending[position].due = if next <= now { now + period } else { next };
            }
            None => {
                self.pending.swap_remove(position);
            }
        }
        Some(task)
    }
}

impl<T: Copy> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}
