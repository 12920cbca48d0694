// Current step shared between the orchestrating caller and the sampling thread.

use crate::error::{MetricsError, Result};
use std::sync::atomic::{AtomicU32, Ordering};

/// Written by the caller via `next_step`, read by the sampler on every tick.
#[derive(Debug)]
pub struct RunState {
    step: AtomicU32,
    number_of_steps: u32,
}

impl RunState {
    /// Starts at step 1.
    pub fn new(number_of_steps: u32) -> Result<Self> {
        if number_of_steps == 0 {
            return Err(MetricsError::Config(
                "number_of_steps must be > 0".into(),
            ));
        }
        Ok(Self {
            step: AtomicU32::new(1),
            number_of_steps,
        })
    }

    pub fn current_step(&self) -> u32 {
        self.step.load(Ordering::Acquire)
    }

    pub fn number_of_steps(&self) -> u32 {
        self.number_of_steps
    }

    /// Advances to the next step. Past the declared count this is a configuration error
    /// and the step is left unchanged.
    pub fn next_step(&self) -> Result<u32> {
        let declared = self.number_of_steps;
        self.step
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |s| {
                (s < declared).then_some(s + 1)
            })
            .map(|prev| prev + 1)
            .map_err(|current| MetricsError::StepOverflow {
                requested: current + 1,
                declared,
            })
    }
}
