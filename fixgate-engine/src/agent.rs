/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Polling units and the threads that run them.
//!
//! Every unit owns its state exclusively and is driven by exactly one
//! [`AgentRunner`]. State is only shared through command queues and the
//! replicated streams.

use crate::idle::{BackoffIdleStrategy, IdleConfig};
use crossbeam_channel::{RecvTimeoutError, Sender, bounded};
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A unit of work polled on a dedicated thread.
pub trait Agent: Send + 'static {
    /// Name used for the thread and in logs.
    fn role_name(&self) -> &'static str;

    /// Performs one tick.
    ///
    /// # Returns
    /// The number of work items performed. Zero lets the runner back off.
    fn do_work(&mut self) -> usize;

    /// Releases resources once the runner has stopped.
    fn on_close(&mut self) {}
}

/// Drives one agent on a named thread until closed.
#[derive(Debug)]
pub struct AgentRunner<A: Agent> {
    role_name: &'static str,
    running: Arc<AtomicBool>,
    done: crossbeam_channel::Receiver<()>,
    handle: Option<JoinHandle<A>>,
}

impl<A: Agent> AgentRunner<A> {
    /// Starts a thread polling `agent`.
    ///
    /// # Errors
    /// Returns an error if the thread cannot be spawned.
    pub fn start(agent: A, idle: IdleConfig) -> io::Result<Self> {
        let role_name = agent.role_name();
        let running = Arc::new(AtomicBool::new(true));
        let (done_tx, done) = bounded::<()>(0);
        let flag = Arc::clone(&running);
        let handle = std::thread::Builder::new()
            .name(format!("fixgate-{role_name}"))
            .spawn(move || run(agent, flag, BackoffIdleStrategy::new(idle), done_tx))?;
        info!(role = role_name, "agent started");
        Ok(Self {
            role_name,
            running,
            done,
            handle: Some(handle),
        })
    }

    /// Returns the agent's role name.
    #[inline]
    #[must_use]
    pub const fn role_name(&self) -> &'static str {
        self.role_name
    }

    /// Returns true while the loop has not been asked to stop.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Stops the loop and waits up to `grace` for the thread to exit.
    ///
    /// # Returns
    /// The agent, if the thread stopped within the grace period. A thread
    /// stuck in a tick is left detached.
    pub fn close(mut self, grace: Duration) -> Option<A> {
        self.running.store(false, Ordering::Release);
        let handle = self.handle.take()?;
        handle.thread().unpark();
        match self.done.recv_timeout(grace) {
            Err(RecvTimeoutError::Disconnected) | Ok(()) => match handle.join() {
                Ok(agent) => {
                    debug!(role = self.role_name, "agent stopped");
                    Some(agent)
                }
                Err(_) => {
                    warn!(role = self.role_name, "agent thread panicked");
                    None
                }
            },
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    role = self.role_name,
                    grace_ms = grace.as_millis() as u64,
                    "agent did not stop within grace period"
                );
                None
            }
        }
    }
}

impl<A: Agent> Drop for AgentRunner<A> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = &self.handle {
            handle.thread().unpark();
        }
    }
}

fn run<A: Agent>(
    mut agent: A,
    running: Arc<AtomicBool>,
    mut idle: BackoffIdleStrategy,
    done: Sender<()>,
) -> A {
    while running.load(Ordering::Acquire) {
        let work = agent.do_work();
        idle.idle(work);
    }
    drop(done);
    agent
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct Counter {
        ticks: Arc<AtomicUsize>,
        closed: bool,
    }

    impl Agent for Counter {
        fn role_name(&self) -> &'static str {
            "counter"
        }

        fn do_work(&mut self) -> usize {
            self.ticks.fetch_add(1, Ordering::Relaxed);
            0
        }

        fn on_close(&mut self) {
            self.closed = true;
        }
    }

    struct Stuck;

    impl Agent for Stuck {
        fn role_name(&self) -> &'static str {
            "stuck"
        }

        fn do_work(&mut self) -> usize {
            std::thread::sleep(Duration::from_millis(500));
            0
        }
    }

    #[test]
    fn test_runner_polls_and_returns_agent() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let runner = AgentRunner::start(
            Counter {
                ticks: Arc::clone(&ticks),
                closed: false,
            },
            IdleConfig::default(),
        )
        .unwrap();
        assert_eq!(runner.role_name(), "counter");
        assert!(runner.is_running());

        std::thread::sleep(Duration::from_millis(20));
        let mut agent = runner.close(Duration::from_secs(1)).unwrap();
        assert!(ticks.load(Ordering::Relaxed) > 0);
        agent.on_close();
        assert!(agent.closed);
    }

    #[test]
    fn test_close_gives_up_after_grace() {
        let runner = AgentRunner::start(Stuck, IdleConfig::default()).unwrap();
        std::thread::sleep(Duration::from_millis(10));
        assert!(runner.close(Duration::from_millis(20)).is_none());
    }
}
