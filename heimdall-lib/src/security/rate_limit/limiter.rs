use ahash::{AHashMap, RandomState};
use std::hash::{BuildHasher, Hash, Hasher};
use std::net::IpAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::warn;

use super::bucket::TokenBucket;
use crate::config::RateLimitConfig;

/// Shards for the per-IP map; keyed by IP hash to avoid global contention.
const SHARDS: usize = 16;

/// Outcome of admitting one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Request proceeds.
    Granted,
    /// Soft threshold exceeded: respond 429 but keep the connection.
    SoftLimited,
    /// Hard threshold also exhausted: respond 429, then close the connection.
    HardLimited,
}

impl Admission {
    pub fn is_granted(&self) -> bool {
        matches!(self, Admission::Granted)
    }
}

/// Per-IP state: a soft and a hard bucket sharing the configured burst.
///
/// The hard bucket is only charged once the soft bucket is exhausted, so a
/// client ramping past the soft rate sees 429s before its connections start
/// being closed.
struct IpEntry {
    soft: TokenBucket,
    hard: TokenBucket,
}

impl IpEntry {
    fn new(soft_burst: f64, hard_burst: f64, now: Instant) -> Self {
        Self {
            soft: TokenBucket::full(soft_burst, now),
            hard: TokenBucket::full(hard_burst, now),
        }
    }

    fn admit(
        &mut self,
        soft_rate: f64,
        hard_rate: f64,
        soft_burst: f64,
        hard_burst: f64,
        now: Instant,
    ) -> Admission {
        self.soft.refill(soft_rate, soft_burst, now);
        self.hard.refill(hard_rate, hard_burst, now);
        if self.soft.try_take() {
            Admission::Granted
        } else if self.hard.try_take() {
            Admission::SoftLimited
        } else {
            Admission::HardLimited
        }
    }

    /// Eligible for removal: idle past the timeout and both buckets would be
    /// full after refill, so dropping the entry loses no state.
    fn evictable(
        &self,
        soft_rate: f64,
        hard_rate: f64,
        burst: f64,
        idle_timeout: Duration,
        now: Instant,
    ) -> bool {
        let idle = now.saturating_duration_since(self.soft.last_refill());
        if idle < idle_timeout {
            return false;
        }
        let idle_secs = idle.as_secs_f64();
        self.soft.tokens() + idle_secs * soft_rate >= burst
            && self.hard.tokens() + idle_secs * hard_rate >= burst
    }
}

/// Per-remote-IP request admission with soft and hard thresholds.
pub struct RateLimiter {
    shards: Vec<Mutex<AHashMap<IpAddr, IpEntry>>>,
    /// Shared fallback charged on first sight of an IP so address-spraying
    /// clients cannot grow the map without bound.
    global: Mutex<IpEntry>,
    hasher: RandomState,
    soft_rate: f64,
    hard_rate: f64,
    burst: f64,
    global_soft_rate: f64,
    global_hard_rate: f64,
    idle_timeout: Duration,
}

impl RateLimiter {
    pub fn new(cfg: &RateLimitConfig) -> Self {
        let now = Instant::now();
        Self {
            shards: (0..SHARDS).map(|_| Mutex::new(AHashMap::new())).collect(),
            global: Mutex::new(IpEntry::new(
                cfg.global_soft_req_per_sec,
                cfg.global_hard_req_per_sec,
                now,
            )),
            hasher: RandomState::new(),
            soft_rate: cfg.soft_req_per_sec,
            hard_rate: cfg.hard_req_per_sec,
            burst: f64::from(cfg.burst),
            global_soft_rate: cfg.global_soft_req_per_sec,
            global_hard_rate: cfg.global_hard_req_per_sec,
            idle_timeout: Duration::from_secs(cfg.idle_timeout_secs),
        }
    }

    pub fn check(&self, ip: IpAddr) -> Admission {
        self.check_at(ip, Instant::now())
    }

    pub fn check_at(&self, ip: IpAddr, now: Instant) -> Admission {
        let shard = &self.shards[self.shard_index(&ip)];
        let mut entries = match shard.lock() {
            Ok(guard) => guard,
            Err(_) => {
                warn!("Rate limiter shard lock poisoned");
                return Admission::Granted;
            }
        };

        if let Some(entry) = entries.get_mut(&ip) {
            return entry.admit(self.soft_rate, self.hard_rate, self.burst, self.burst, now);
        }

        // First sight of this IP: the insertion is charged to the shared
        // fallback bucket, and a request the fallback refuses never creates
        // an entry.
        match self.global.lock() {
            Ok(mut global) => {
                let admission = global.admit(
                    self.global_soft_rate,
                    self.global_hard_rate,
                    self.global_soft_rate,
                    self.global_hard_rate,
                    now,
                );
                if !admission.is_granted() {
                    return admission;
                }
            }
            Err(_) => {
                warn!("Rate limiter global lock poisoned");
            }
        }

        self.evict_idle(&mut entries, now);

        let mut entry = IpEntry::new(self.burst, self.burst, now);
        let admission = entry.admit(self.soft_rate, self.hard_rate, self.burst, self.burst, now);
        entries.insert(ip, entry);
        admission
    }

    fn shard_index(&self, ip: &IpAddr) -> usize {
        let mut hasher = self.hasher.build_hasher();
        ip.hash(&mut hasher);
        (hasher.finish() as usize) % SHARDS
    }

    fn evict_idle(&self, entries: &mut AHashMap<IpAddr, IpEntry>, now: Instant) {
        entries.retain(|_, entry| {
            !entry.evictable(self.soft_rate, self.hard_rate, self.burst, self.idle_timeout, now)
        });
    }

    #[cfg(test)]
    fn contains(&self, ip: IpAddr) -> bool {
        self.shards[self.shard_index(&ip)]
            .lock()
            .map(|entries| entries.contains_key(&ip))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn limiter(soft: f64, hard: f64, burst: u32) -> RateLimiter {
        RateLimiter::new(&RateLimitConfig {
            enabled: true,
            soft_req_per_sec: soft,
            hard_req_per_sec: hard,
            burst,
            idle_timeout_secs: 60,
            global_soft_req_per_sec: 10_000.0,
            global_hard_req_per_sec: 20_000.0,
        })
    }

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(203, 0, 113, last))
    }

    #[test]
    fn test_soft_then_hard_ladder() {
        // Mirrors the two-tier cap: burst admissions first, then 429s that
        // keep the connection, then 429s that close it.
        let limiter = limiter(2.0, 4.0, 2);
        let now = Instant::now();
        let client = ip(1);

        let decisions: Vec<Admission> =
            (0..10).map(|_| limiter.check_at(client, now)).collect();

        assert_eq!(&decisions[..2], &[Admission::Granted, Admission::Granted]);
        assert_eq!(&decisions[2..4], &[Admission::SoftLimited, Admission::SoftLimited]);
        assert!(decisions[4..].iter().all(|d| *d == Admission::HardLimited));
    }

    #[test]
    fn test_refill_restores_admission() {
        let limiter = limiter(2.0, 4.0, 2);
        let now = Instant::now();
        let client = ip(2);

        assert!(limiter.check_at(client, now).is_granted());
        assert!(limiter.check_at(client, now).is_granted());
        assert!(!limiter.check_at(client, now).is_granted());

        // One second at 2 tokens/sec restores the soft bucket.
        let later = now + Duration::from_secs(1);
        assert!(limiter.check_at(client, later).is_granted());
        assert!(limiter.check_at(client, later).is_granted());
        assert!(!limiter.check_at(client, later).is_granted());
    }

    #[test]
    fn test_clients_are_isolated() {
        let limiter = limiter(1.0, 2.0, 1);
        let now = Instant::now();

        assert!(limiter.check_at(ip(3), now).is_granted());
        assert!(!limiter.check_at(ip(3), now).is_granted());
        // A different address still has its full burst.
        assert!(limiter.check_at(ip(4), now).is_granted());
    }

    #[test]
    fn test_global_fallback_bounds_first_seen_admissions() {
        let limiter = RateLimiter::new(&RateLimitConfig {
            enabled: true,
            soft_req_per_sec: 100.0,
            hard_req_per_sec: 200.0,
            burst: 100,
            idle_timeout_secs: 60,
            global_soft_req_per_sec: 3.0,
            global_hard_req_per_sec: 5.0,
        });
        let now = Instant::now();

        // Each request arrives from a fresh address; only the first three
        // insertions pass the global soft bucket.
        let decisions: Vec<Admission> =
            (0..8).map(|i| limiter.check_at(ip(i), now)).collect();
        let granted = decisions.iter().filter(|d| d.is_granted()).count();
        assert_eq!(granted, 3);
        // Refused first-sight requests must not have created entries.
        let tracked = (0..8u8).filter(|i| limiter.contains(ip(*i))).count();
        assert_eq!(tracked, 3);
    }

    #[test]
    fn test_idle_entries_evicted_on_insertion() {
        let limiter = limiter(10.0, 20.0, 5);
        let now = Instant::now();

        let old = ip(10);
        assert!(limiter.check_at(old, now).is_granted());
        assert!(limiter.contains(old));

        // Find a fresh address that lands in the same shard, so its insertion
        // triggers eviction there.
        let old_shard = limiter.shard_index(&old);
        let fresh = (11..=255u8)
            .map(ip)
            .find(|candidate| limiter.shard_index(candidate) == old_shard)
            .unwrap_or_else(|| panic!("no address found sharing the shard"));

        let later = now + Duration::from_secs(120);
        assert!(limiter.check_at(fresh, later).is_granted());
        assert!(!limiter.contains(old));
        assert!(limiter.contains(fresh));
    }

    #[test]
    fn test_busy_entries_survive_eviction() {
        let limiter = limiter(0.001, 0.002, 5);
        let now = Instant::now();

        let busy = ip(20);
        for _ in 0..5 {
            limiter.check_at(busy, now);
        }

        let busy_shard = limiter.shard_index(&busy);
        let fresh = (21..=255u8)
            .map(ip)
            .find(|candidate| limiter.shard_index(candidate) == busy_shard)
            .unwrap_or_else(|| panic!("no address found sharing the shard"));

        // Past the idle timeout, but with a drained bucket and a near-zero
        // refill rate the entry is not yet full, so it must be kept.
        let later = now + Duration::from_secs(120);
        limiter.check_at(fresh, later);
        assert!(limiter.contains(busy));
    }
}
