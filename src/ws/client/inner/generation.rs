use std::future::Future;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Cancellation scope of all tasks spawned for one transport.
///
/// Tasks of a generation stop when its token is cancelled, and [`Generation::retire`]
/// waits for all of them, so nothing from a retired generation keeps running when
/// the next one starts.
#[derive(Debug)]
pub(crate) struct Generation {
    id: u64,
    token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl Generation {
    pub fn new(id: u64, parent: &CancellationToken) -> Self {
        Self {
            id,
            token: parent.child_token(),
            tasks: Vec::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// A token cancelled with this generation, which can also be cancelled alone.
    pub fn guard(&self) -> CancellationToken {
        self.token.child_token()
    }

    pub fn spawn<F>(&mut self, name: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.spawn_guarded(self.token.clone(), name, task)
    }

    pub fn spawn_guarded<F>(&mut self, guard: CancellationToken, name: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let id = self.id;
        self.tasks.push(tokio::spawn(async move {
            tokio::select! {
                biased;

                _ = guard.cancelled() => {
                    log::trace!("Generation {} {} cancelled", id, name);
                }

                _ = task => {
                    log::trace!("Generation {} {} finished", id, name);
                }
            }
        }));
    }

    /// Cancel every task of this generation and wait them to stop.
    pub async fn retire(mut self) {
        log::debug!("Retire generation {}", self.id);

        self.token.cancel();

        for task in std::mem::take(&mut self.tasks) {
            if let Err(err) = task.await {
                log::error!("Task of generation {} ended abnormally: {}", self.id, err);
            }
        }
    }
}

impl Drop for Generation {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod test {
    use std::{
        sync::{
            atomic::{AtomicBool, Ordering},
            Arc,
        },
        time::Duration,
    };

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_retire_stops_all_tasks() {
        let root = CancellationToken::new();
        let mut generation = Generation::new(1, &root);
        let fired = Arc::new(AtomicBool::new(false));

        let flag = fired.clone();
        generation.spawn("timer", async move {
            tokio::time::sleep(Duration::from_secs(6)).await;
            flag.store(true, Ordering::SeqCst);
        });
        generation.spawn("forever", std::future::pending());

        generation.retire().await;
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert!(!fired.load(Ordering::SeqCst));
        assert!(!root.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_guard_cancel_alone() {
        let root = CancellationToken::new();
        let mut generation = Generation::new(2, &root);
        let fired = Arc::new(AtomicBool::new(false));

        let guard = generation.guard();
        let flag = fired.clone();
        generation.spawn_guarded(guard.clone(), "watcher", async move {
            tokio::time::sleep(Duration::from_secs(6)).await;
            flag.store(true, Ordering::SeqCst);
        });

        guard.cancel();
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert!(!fired.load(Ordering::SeqCst));
        assert!(!generation.token.is_cancelled());

        generation.retire().await;
    }

    #[tokio::test]
    async fn test_root_cancel_reaches_generation() {
        let root = CancellationToken::new();
        let mut generation = Generation::new(3, &root);
        generation.spawn("forever", std::future::pending());

        root.cancel();

        generation.retire().await;
    }
}
