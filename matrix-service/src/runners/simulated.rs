// Simulated Runner
// Stand-in leaf task: random latency, stochastic pass/fail, streamed log lines

use crate::runners::{LeafJob, LeafOutput, LeafTask, RunScope};
use crate::schema::RunnerConfig;
use crate::tree::Status;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use std::sync::Mutex;
use std::time::Duration;

/// Leaf task that sleeps for a random delay and draws a pass/fail outcome
#[derive(Debug)]
pub struct SimulatedRunner {
    min_delay: Duration,
    max_delay: Duration,
    pass_rate: f64,
    rng: Mutex<StdRng>,
}

impl SimulatedRunner {
    pub fn new(min_delay: Duration, max_delay: Duration, pass_rate: f64) -> Self {
        Self {
            min_delay: min_delay.min(max_delay),
            max_delay: max_delay.max(min_delay),
            pass_rate: pass_rate.clamp(0.0, 1.0),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn from_config(config: &RunnerConfig) -> Self {
        let runner = Self::new(
            Duration::from_millis(config.min_delay_ms),
            Duration::from_millis(config.max_delay_ms),
            config.pass_rate,
        );
        match config.seed {
            Some(seed) => runner.with_seed(seed),
            None => runner,
        }
    }

    /// Make outcomes and delays reproducible
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    // Draw delay and outcome together so the lock is never held across an await.
    fn draw(&self) -> (Duration, bool) {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let delay = if self.max_delay > self.min_delay {
            rng.gen_range(self.min_delay..=self.max_delay)
        } else {
            self.min_delay
        };
        (delay, rng.gen_bool(self.pass_rate))
    }
}

impl Default for SimulatedRunner {
    fn default() -> Self {
        Self::from_config(&RunnerConfig::default())
    }
}

#[async_trait::async_trait]
impl LeafTask for SimulatedRunner {
    async fn run(&self, job: &LeafJob, output: &LeafOutput) -> Status {
        let (delay, passed) = self.draw();
        let target = match &job.scope {
            RunScope::WholeLeaf => "all results".to_string(),
            RunScope::Result(key) => format!("result '{}'", key),
        };

        output.line(format!("Starting {} ({})", job.path.join(" › "), target));
        output.line(format!("Executing simulated checks for {}ms", delay.as_millis()));
        tokio::time::sleep(delay).await;

        let status = if passed { Status::Pass } else { Status::Fail };
        output.line(format!("Result: {}", status.as_str().to_uppercase()));
        status
    }
}
