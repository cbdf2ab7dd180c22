use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Global cap on concurrently open connections.
///
/// Acquisition is a compare-and-swap loop, so the open-connection count never
/// exceeds the cap even under concurrent accepts. Each permit releases its
/// slot exactly once, on drop.
pub struct ConnectionLimiter {
    active: Arc<AtomicUsize>,
    cap: usize,
    drained_tx: watch::Sender<()>,
}

/// Token for one open connection; the slot is returned when this drops.
pub struct ConnectionPermit {
    active: Arc<AtomicUsize>,
    drained_tx: watch::Sender<()>,
}

impl ConnectionLimiter {
    pub fn new(cap: usize) -> Self {
        let (drained_tx, _) = watch::channel(());
        Self { active: Arc::new(AtomicUsize::new(0)), cap, drained_tx }
    }

    /// Try to reserve a connection slot. Returns `None` when the cap is
    /// reached; the caller closes the socket without handshaking.
    pub fn try_acquire(&self) -> Option<ConnectionPermit> {
        let mut current = self.active.load(Ordering::Relaxed);
        loop {
            if current >= self.cap {
                return None;
            }
            match self.active.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    return Some(ConnectionPermit {
                        active: Arc::clone(&self.active),
                        drained_tx: self.drained_tx.clone(),
                    });
                }
                Err(observed) => current = observed,
            }
        }
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Wait until every outstanding permit has been released.
    pub async fn drained(&self) {
        let mut rx = self.drained_tx.subscribe();
        while self.active.load(Ordering::Acquire) > 0 {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Drop for ConnectionPermit {
    fn drop(&mut self) {
        let previous = self.active.fetch_sub(1, Ordering::AcqRel);
        if previous == 1 {
            let _ = self.drained_tx.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cap_enforced() {
        let limiter = ConnectionLimiter::new(2);
        let p1 = limiter.try_acquire();
        let p2 = limiter.try_acquire();
        assert!(p1.is_some());
        assert!(p2.is_some());
        assert!(limiter.try_acquire().is_none());
        assert_eq!(limiter.active(), 2);
    }

    #[test]
    fn test_release_on_drop() {
        let limiter = ConnectionLimiter::new(1);
        let permit = limiter.try_acquire();
        assert!(limiter.try_acquire().is_none());
        drop(permit);
        assert_eq!(limiter.active(), 0);
        assert!(limiter.try_acquire().is_some());
    }

    #[test]
    fn test_concurrent_acquire_never_exceeds_cap() {
        let limiter = Arc::new(ConnectionLimiter::new(50));
        let mut joins = Vec::new();
        for _ in 0..8 {
            let limiter = Arc::clone(&limiter);
            joins.push(std::thread::spawn(move || {
                let mut granted = 0usize;
                for _ in 0..100 {
                    if let Some(permit) = limiter.try_acquire() {
                        assert!(limiter.active() <= 50);
                        granted += 1;
                        drop(permit);
                    }
                }
                granted
            }));
        }
        for join in joins {
            let granted = join.join().unwrap_or(0);
            assert!(granted > 0);
        }
        assert_eq!(limiter.active(), 0);
    }

    #[tokio::test]
    async fn test_drained_wakes_on_last_release() {
        let limiter = Arc::new(ConnectionLimiter::new(4));
        let permit = limiter.try_acquire();

        let waiter = {
            let limiter = Arc::clone(&limiter);
            tokio::spawn(async move { limiter.drained().await })
        };

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());
        drop(permit);
        assert!(tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_drained_returns_immediately_when_idle() {
        let limiter = ConnectionLimiter::new(4);
        tokio::time::timeout(std::time::Duration::from_millis(100), limiter.drained())
            .await
            .unwrap_or_else(|_| panic!("drained() should not block with no permits"));
    }
}
