//! Counter producer task
//!
//! Counts activations, publishes the count, and keeps the display task
//! suspended for a fixed stretch of counts.

use crate::channel::LatestValue;
use crate::scheduler::{Context, Task, TaskHandle};

/// What the counter does with a given count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CounterAction {
    /// Publish the count
    Publish,
    /// Suspend the controlled task (count is not published)
    SuspendDisplay,
    /// Resume the controlled task (count is not published)
    ResumeDisplay,
    /// Inside the suspended stretch: do nothing
    Hold,
}

/// Suspend/resume thresholds
///
/// At `suspend_at` the controlled task is suspended, at `resume_at` it is
/// resumed, and counts outside `[suspend_at, resume_at]` are published.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DutyCycle {
    pub suspend_at: u32,
    pub resume_at: u32,
}

impl DutyCycle {
    /// Create a duty cycle
    pub const fn new(suspend_at: u32, resume_at: u32) -> Self {
        Self {
            suspend_at,
            resume_at,
        }
    }

    /// Decide what to do for `count`
    pub fn action(&self, count: u32) -> CounterAction {
        if count == self.suspend_at {
            CounterAction::SuspendDisplay
        } else if count == self.resume_at {
            CounterAction::ResumeDisplay
        } else if count < self.suspend_at || count > self.resume_at {
            CounterAction::Publish
        } else {
            CounterAction::Hold
        }
    }
}

impl Default for DutyCycle {
    fn default() -> Self {
        Self::new(6, 9)
    }
}

/// Counter producer task
pub struct CounterTask<'c> {
    count: u32,
    channel: &'c LatestValue<u32>,
    duty: DutyCycle,
    controls: Option<TaskHandle>,
}

impl<'c> CounterTask<'c> {
    /// Create a counter publishing to `channel`
    pub fn new(channel: &'c LatestValue<u32>, duty: DutyCycle) -> Self {
        Self {
            count: 0,
            channel,
            duty,
            controls: None,
        }
    }

    /// Bind the task this counter suspends and resumes
    ///
    /// Must happen before the counter itself is handed to the kernel.
    pub fn bind(&mut self, handle: TaskHandle) {
        self.controls = Some(handle);
    }

    /// The controlled task, if bound
    pub fn controls(&self) -> Option<TaskHandle> {
        self.controls
    }

    /// Current count
    pub fn count(&self) -> u32 {
        self.count
    }
}

impl Task for CounterTask<'_> {
    fn run(&mut self, cx: &mut Context<'_>) {
        self.count = self.count.wrapping_add(1);

        match self.duty.action(self.count) {
            CounterAction::Publish => self.channel.publish(self.count),
            CounterAction::SuspendDisplay => {
                if let Some(handle) = self.controls {
                    cx.suspend(handle);
                }
            }
            CounterAction::ResumeDisplay => {
                if let Some(handle) = self.controls {
                    cx.resume(handle);
                }
            }
            CounterAction::Hold => {}
        }

        cx.delay_period();
    }
}
