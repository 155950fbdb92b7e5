//! Node assembly
//!
//! Creates the three node tasks in dependency order: the display first,
//! so its handle can be bound into the counter that controls it, then the
//! counter and the sensor. The tasks land either on a single [`Kernel`](crate::scheduler::Kernel)
//! or on per-priority [`Levels`](crate::scheduler::Levels).

use crate::bridge::HardwareCall;
use crate::config::NodeConfig;
use crate::scheduler::{SpawnError, TaskHandle, TaskSpawner};
use crate::tasks::{CounterTask, DisplayTask, SensorTask};
use crate::traits::TextRenderer;

/// Task names as reported by the kernel
pub const COUNTER_TASK: &str = "counter";
pub const SENSOR_TASK: &str = "sensor";
pub const DISPLAY_TASK: &str = "display";

/// The node's task bodies
pub struct NodeTasks<'c, H, R> {
    pub counter: CounterTask<'c>,
    pub sensor: SensorTask<'c, H>,
    pub display: DisplayTask<'c, R>,
}

/// Handles of the spawned node tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NodeHandles {
    pub counter: TaskHandle,
    pub sensor: TaskHandle,
    pub display: TaskHandle,
}

/// Distinct priorities the node tasks run at
///
/// At most one per task, so this many levels always suffice.
pub const MAX_LEVELS: usize = 3;

/// Create the node tasks with the configured priorities and periods
///
/// On failure the task table is left halted, so nothing is ever
/// scheduled.
pub fn spawn_node<'a, 'c: 'a, H, R, S>(
    spawner: &mut S,
    tasks: &'a mut NodeTasks<'c, H, R>,
    config: &NodeConfig,
) -> Result<NodeHandles, SpawnError>
where
    S: TaskSpawner<'a>,
    H: HardwareCall + Send + 'a,
    R: TextRenderer + Send + 'a,
{
    let NodeTasks {
        counter,
        sensor,
        display,
    } = tasks;

    let display_handle = spawner.spawn_task(
        display,
        DISPLAY_TASK,
        config.display.priority(),
        config.display.period_ms,
    )?;

    counter.bind(display_handle);
    let counter_handle = spawner.spawn_task(
        counter,
        COUNTER_TASK,
        config.counter.priority(),
        config.counter.period_ms,
    )?;

    let sensor_handle = spawner.spawn_task(
        sensor,
        SENSOR_TASK,
        config.sensor.priority(),
        config.sensor.period_ms,
    )?;

    Ok(NodeHandles {
        counter: counter_handle,
        sensor: sensor_handle,
        display: display_handle,
    })
}
