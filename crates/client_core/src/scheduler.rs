use std::{future::Future, time::Duration};

use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tracing::debug;

const MIN_PERIOD: Duration = Duration::from_millis(1);

struct ScheduledTask {
    name: &'static str,
    handle: JoinHandle<()>,
}

/// Owns the controller's background tasks so they can be stopped together.
#[derive(Default)]
pub struct Scheduler {
    tasks: Vec<ScheduledTask>,
}

impl Scheduler {
    /// Sends `make()` into `tx` once per `period`, first after one full period.
    /// The task ends by itself once the receiver is gone.
    pub fn every<T, F>(&mut self, name: &'static str, period: Duration, tx: mpsc::Sender<T>, mut make: F)
    where
        T: Send + 'static,
        F: FnMut() -> T + Send + 'static,
    {
        let period = period.max(MIN_PERIOD);
        self.spawn(name, async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if tx.send(make()).await.is_err() {
                    break;
                }
            }
        });
    }

    pub fn spawn<F>(&mut self, name: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        debug!(task = name, "scheduling task");
        self.tasks.retain(|task| !task.handle.is_finished());
        self.tasks.push(ScheduledTask {
            name,
            handle: tokio::spawn(task),
        });
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.tasks
            .iter()
            .any(|task| task.name == name && !task.handle.is_finished())
    }

    pub fn shutdown(&mut self) {
        for task in self.tasks.drain(..) {
            debug!(task = task.name, "stopping task");
            task.handle.abort();
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_delivers_ticks_until_shutdown() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut scheduler = Scheduler::default();
        let mut count = 0u32;
        scheduler.every("counter", Duration::from_millis(5), tx, move || {
            count += 1;
            count
        });

        assert_eq!(rx.recv().await, Some(1));
        assert_eq!(rx.recv().await, Some(2));
        assert!(scheduler.is_running("counter"));

        scheduler.shutdown();
        assert!(!scheduler.is_running("counter"));
        // the aborted task drops its sender, closing the channel
        while rx.recv().await.is_some() {}
    }

    #[tokio::test]
    async fn finished_tasks_are_not_reported_running() {
        let mut scheduler = Scheduler::default();
        let (done_tx, done_rx) = tokio::sync::oneshot::channel();
        scheduler.spawn("one-shot", async move {
            let _ = done_tx.send(());
        });
        done_rx.await.expect("task ran");
        tokio::task::yield_now().await;
        for _ in 0..100 {
            if !scheduler.is_running("one-shot") {
                return;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        panic!("one-shot task still reported running");
    }
}
