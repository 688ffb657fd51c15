//! 容器统计信息

use std::sync::atomic::{AtomicUsize, Ordering};

/// 内部容器统计信息（原子计数器）
#[derive(Default)]
pub(crate) struct InnerStats {
    total_resolutions: AtomicUsize,
    cache_hits: AtomicUsize,
    cache_misses: AtomicUsize,
    factory_invocations: AtomicUsize,
    starts: AtomicUsize,
    stops: AtomicUsize,
}

impl InnerStats {
    pub fn record_resolution(&self, cached: bool) {
        self.total_resolutions.fetch_add(1, Ordering::Relaxed);
        if cached {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.cache_misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_factory_invocation(&self) {
        self.factory_invocations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_start(&self) {
        self.starts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stop(&self) {
        self.stops.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ContainerStats {
        ContainerStats {
            total_resolutions: self.total_resolutions.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            factory_invocations: self.factory_invocations.load(Ordering::Relaxed),
            starts: self.starts.load(Ordering::Relaxed),
            stops: self.stops.load(Ordering::Relaxed),
        }
    }
}

/// 容器统计信息
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContainerStats {
    /// 解析次数（含依赖的递归解析）
    pub total_resolutions: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
    /// 工厂实际执行次数
    pub factory_invocations: usize,
    /// 成功完成的 start 次数
    pub starts: usize,
    /// 成功完成的 stop 次数
    pub stops: usize,
}

impl ContainerStats {
    /// 获取缓存命中率
    pub fn hit_rate(&self) -> f64 {
        if self.total_resolutions == 0 {
            0.0
        } else {
            self.cache_hits as f64 / self.total_resolutions as f64
        }
    }
}
