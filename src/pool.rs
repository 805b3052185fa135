//! Worker pool sizing shared by the parallel kernel and the host device.

use std::sync::OnceLock;

use crate::config::LifeConfig;
use crate::error::LifeResult;

static PHYSICAL_CORES: OnceLock<usize> = OnceLock::new();

#[inline]
fn physical_core_count() -> usize {
    *PHYSICAL_CORES.get_or_init(|| num_cpus::get_physical().max(1))
}

/// Stencil stepping is memory-bound; past eight cores extra threads mostly
/// contend for bandwidth.
#[inline]
pub(crate) fn auto_pool_thread_count_for_physical(physical: usize) -> usize {
    let physical = physical.max(1);
    if physical <= 8 {
        physical
    } else {
        physical.div_ceil(2).max(8)
    }
}

#[inline]
pub fn auto_pool_thread_count() -> usize {
    auto_pool_thread_count_for_physical(physical_core_count())
}

/// Resolve the thread count from a config, falling back to auto-detect.
pub fn resolve_thread_count(config: &LifeConfig) -> usize {
    let mut threads = config.thread_count.unwrap_or_else(auto_pool_thread_count);
    if let Some(cap) = config.max_threads {
        threads = threads.min(cap);
    }
    threads.max(1)
}

pub(crate) fn build_pool(threads: usize, label: &'static str) -> LifeResult<rayon::ThreadPool> {
    let threads = threads.max(1);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(move |i| format!("{label}-{i}"))
        .build()?;
    tracing::debug!(threads, label, "worker pool ready");
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::{auto_pool_thread_count_for_physical, build_pool, resolve_thread_count};
    use crate::config::LifeConfig;

    #[test]
    fn auto_thread_count_is_monotonic_and_bounded() {
        let mut prev = 0;
        for physical in 1..=128 {
            let n = auto_pool_thread_count_for_physical(physical);
            assert!(n <= physical.max(8), "{physical} -> {n}");
            assert!(n >= prev, "{physical} -> {n}, prev={prev}");
            prev = n;
        }
        assert_eq!(auto_pool_thread_count_for_physical(0), 1);
        assert_eq!(auto_pool_thread_count_for_physical(8), 8);
        assert_eq!(auto_pool_thread_count_for_physical(32), 16);
    }

    #[test]
    fn max_threads_caps_explicit_count() {
        let config = LifeConfig::default().thread_count(12).max_threads(3);
        assert_eq!(resolve_thread_count(&config), 3);
        let config = LifeConfig::default().thread_count(2);
        assert_eq!(resolve_thread_count(&config), 2);
    }

    #[test]
    fn pool_has_requested_width() {
        let pool = build_pool(3, "test").unwrap();
        assert_eq!(pool.current_num_threads(), 3);
    }
}
