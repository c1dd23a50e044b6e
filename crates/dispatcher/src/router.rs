//! 执行器机器路由
//!
//! 路由策略是一个封闭枚举，策略标识到枚举的映射表在启动时构建且之后只读。
//! 未知标识回退到哈希策略。

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use rand::Rng;
use tracing::{debug, warn};

use tesseract_core::{SchedulerError, SchedulerResult, Trigger, WorkerEndpoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteStrategy {
    /// 同一触发器总是落到同一位置
    Hash,
    RoundRobin,
    Random,
    LeastRecentlyUsed,
    LeastFrequentlyUsed,
    LoadFactor,
    First,
    Last,
}

impl RouteStrategy {
    pub const ALL: [RouteStrategy; 8] = [
        RouteStrategy::Hash,
        RouteStrategy::RoundRobin,
        RouteStrategy::Random,
        RouteStrategy::LeastRecentlyUsed,
        RouteStrategy::LeastFrequentlyUsed,
        RouteStrategy::LoadFactor,
        RouteStrategy::First,
        RouteStrategy::Last,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            RouteStrategy::Hash => "hash",
            RouteStrategy::RoundRobin => "round_robin",
            RouteStrategy::Random => "random",
            RouteStrategy::LeastRecentlyUsed => "lru",
            RouteStrategy::LeastFrequentlyUsed => "lfu",
            RouteStrategy::LoadFactor => "load_factor",
            RouteStrategy::First => "first",
            RouteStrategy::Last => "last",
        }
    }
}

/// 策略标识到策略的只读映射，标识不区分大小写
#[derive(Debug, Clone)]
pub struct StrategyTable {
    entries: HashMap<String, RouteStrategy>,
}

impl StrategyTable {
    pub fn new() -> Self {
        let mut entries: HashMap<String, RouteStrategy> = RouteStrategy::ALL
            .iter()
            .map(|strategy| (strategy.id().to_string(), *strategy))
            .collect();
        entries.insert("polling".to_string(), RouteStrategy::RoundRobin);
        Self { entries }
    }

    pub fn resolve(&self, strategy_id: &str) -> RouteStrategy {
        match self.entries.get(&strategy_id.trim().to_ascii_lowercase()) {
            Some(strategy) => *strategy,
            None => {
                warn!("未知的路由策略 {}，回退到哈希策略", strategy_id);
                RouteStrategy::Hash
            }
        }
    }
}

impl Default for StrategyTable {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct EndpointUsage {
    last_selected: u64,
    selections: u64,
}

pub struct Router {
    table: StrategyTable,
    round_robin: AtomicUsize,
    sequence: AtomicU64,
    /// 按机器ID记录的选中情况，供 LRU/LFU 使用
    usage: Mutex<HashMap<i64, EndpointUsage>>,
}

impl Router {
    pub fn new() -> Self {
        Self {
            table: StrategyTable::new(),
            round_robin: AtomicUsize::new(0),
            sequence: AtomicU64::new(0),
            usage: Mutex::new(HashMap::new()),
        }
    }

    pub fn strategy(&self, strategy_id: &str) -> RouteStrategy {
        self.table.resolve(strategy_id)
    }

    /// 从候选机器中选出一台，返回值总是候选列表中的成员
    pub fn select<'a>(
        &self,
        strategy_id: &str,
        trigger: &Trigger,
        candidates: &'a [WorkerEndpoint],
    ) -> SchedulerResult<&'a WorkerEndpoint> {
        if candidates.is_empty() {
            return Err(SchedulerError::NoCandidates);
        }

        let strategy = self.strategy(strategy_id);
        let index = match strategy {
            RouteStrategy::Hash => {
                trigger.id.rem_euclid(candidates.len() as i64) as usize
            }
            RouteStrategy::RoundRobin => {
                self.round_robin.fetch_add(1, Ordering::Relaxed) % candidates.len()
            }
            RouteStrategy::Random => rand::rng().random_range(0..candidates.len()),
            RouteStrategy::LeastRecentlyUsed => self.least_by(candidates, |u| u.last_selected),
            RouteStrategy::LeastFrequentlyUsed => self.least_by(candidates, |u| u.selections),
            RouteStrategy::LoadFactor => candidates
                .iter()
                .enumerate()
                .fold(0, |best, (i, endpoint)| {
                    if endpoint.load_factor < candidates[best].load_factor {
                        i
                    } else {
                        best
                    }
                }),
            RouteStrategy::First => 0,
            RouteStrategy::Last => candidates.len() - 1,
        };

        let selected = &candidates[index];
        self.record_selection(selected.id);

        debug!(
            "路由策略 {} 选择机器: {} (索引: {}/{})",
            strategy.id(),
            selected.address,
            index,
            candidates.len()
        );
        Ok(selected)
    }

    /// 取使用记录最小的候选，从未被选中的机器记为 0，相同时取靠前的
    fn least_by(&self, candidates: &[WorkerEndpoint], key: impl Fn(&EndpointUsage) -> u64) -> usize {
        let usage = self.usage.lock().unwrap_or_else(|e| e.into_inner());
        candidates
            .iter()
            .enumerate()
            .min_by_key(|(i, endpoint)| {
                let value = usage.get(&endpoint.id).map(&key).unwrap_or(0);
                (value, *i)
            })
            .map(|(i, _)| i)
            .unwrap_or(0)
    }

    fn record_selection(&self, endpoint_id: i64) {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let mut usage = self.usage.lock().unwrap_or_else(|e| e.into_inner());
        let entry = usage.entry(endpoint_id).or_default();
        entry.last_selected = sequence;
        entry.selections += 1;
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}
