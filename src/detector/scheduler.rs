//! 扫描调度器
//! 全量模式：固定数量的worker从有界队列取规则并发检测；定向模式：按规则库顺序逐条检测。
//! 两种模式结束后都会执行一次 implies 推导。

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tracing::{debug, error, info, warn};
use url::Url;

use super::baseline::{page_title, resolve_ips};
use super::evaluator::RuleEvaluator;
use super::matcher::MatchEvaluator;
use super::resolver::resolve_implies;
use super::state::ScanState;
use crate::config::ScanConfig;
use crate::error::{WebhuntError, WhResult};
use crate::fetcher::{Fetcher, HttpTransport, RequestCache, ReqwestTransport};
use crate::rule::{Rule, RuleStore, ScanRecord};

type TaskQueue = Arc<AsyncMutex<mpsc::Receiver<Arc<Rule>>>>;

/// 扫描阶段，Drained 为终态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    Idle,
    Running,
    Drained,
}

impl fmt::Display for ScanPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScanPhase::Idle => "idle",
            ScanPhase::Running => "running",
            ScanPhase::Drained => "drained",
        };
        f.write_str(s)
    }
}

/// 单个目标的扫描器，每个实例只能扫描一次
pub struct Scanner {
    target: Url,
    config: ScanConfig,
    rules: Arc<RuleStore>,
    fetcher: Fetcher,
    evaluator: Arc<RuleEvaluator>,
    phase: Mutex<ScanPhase>,
}

impl Scanner {
    /// 使用reqwest传输和全新的请求缓存创建扫描器
    pub fn new(target: &str, config: ScanConfig, rules: Arc<RuleStore>) -> WhResult<Self> {
        let transport = Arc::new(ReqwestTransport::new(&config)?);
        Self::with_transport(target, config, rules, transport, Arc::new(RequestCache::new()))
    }

    /// 指定传输层与请求缓存创建扫描器
    pub fn with_transport(
        target: &str,
        config: ScanConfig,
        rules: Arc<RuleStore>,
        transport: Arc<dyn HttpTransport>,
        cache: Arc<RequestCache>,
    ) -> WhResult<Self> {
        config.validate()?;
        let target = Url::parse(target)?;
        if target.host_str().is_none_or(str::is_empty) {
            return Err(WebhuntError::ConfigError(format!("扫描目标缺少主机：{}", target)));
        }

        let fetcher = Fetcher::new(transport, cache);
        let matcher = MatchEvaluator::new(fetcher.clone(), target.to_string(), config.aggression);

        Ok(Self {
            target,
            config,
            rules,
            fetcher,
            evaluator: Arc::new(RuleEvaluator::new(matcher)),
            phase: Mutex::new(ScanPhase::Idle),
        })
    }

    pub fn target(&self) -> &Url {
        &self.target
    }

    pub fn phase(&self) -> ScanPhase {
        *self.phase.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn cache(&self) -> &Arc<RequestCache> {
        self.fetcher.cache()
    }

    fn set_phase(&self, phase: ScanPhase) {
        *self.phase.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = phase;
    }

    fn enter_running(&self) -> WhResult<()> {
        let mut phase = self.phase.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if *phase != ScanPhase::Idle {
            return Err(WebhuntError::ScanStateError(format!(
                "扫描器当前处于 {} 阶段，不能再次启动",
                phase
            )));
        }
        *phase = ScanPhase::Running;
        Ok(())
    }

    /// 写入标题与IP两条基础信息
    async fn seed_baseline(&self, state: &ScanState) {
        let title = page_title(&self.fetcher, self.target.as_str()).await;
        let ips = resolve_ips(&self.target, self.config.timeout()).await;
        debug!("基础信息：title={:?}，ip={:?}", title, ips);
        state.push_baseline(ScanRecord::title(title));
        state.push_baseline(ScanRecord::ip(ips));
    }

    /// 全量扫描：所有规则进入有界队列，由固定数量的worker并发检测
    pub async fn start(&self) -> WhResult<Vec<ScanRecord>> {
        self.enter_running()?;
        let start = Instant::now();
        info!(
            "开始扫描：{}，规则数：{}，worker数：{}",
            self.target,
            self.rules.len(),
            self.config.max_workers
        );

        let state = Arc::new(ScanState::new());
        self.seed_baseline(&state).await;

        let (sender, receiver) = mpsc::channel::<Arc<Rule>>(self.config.queue_capacity);
        let queue: TaskQueue = Arc::new(AsyncMutex::new(receiver));

        let mut workers = Vec::with_capacity(self.config.max_workers);
        for id in 0..self.config.max_workers {
            let queue = queue.clone();
            let evaluator = self.evaluator.clone();
            let state = state.clone();
            workers.push(tokio::spawn(run_worker(id, queue, evaluator, state)));
        }

        // 队列已满时在此等待
        for rule in self.rules.iter() {
            if sender.send(rule.clone()).await.is_err() {
                error!("任务队列已关闭，剩余规则未投递");
                break;
            }
        }
        // 关闭发送端，worker取空队列后退出
        drop(sender);

        let mut processed = 0usize;
        for worker in workers {
            match worker.await {
                Ok(count) => processed += count,
                Err(e) => error!("{}", WebhuntError::WorkerError(e.to_string())),
            }
        }

        let implied = resolve_implies(&self.rules, &state);
        self.set_phase(ScanPhase::Drained);

        let results = state.results();
        info!(
            "扫描完成：{}，处理规则：{}，隐含组件：{}，结果数：{}，耗时{:?}",
            self.target,
            processed,
            implied,
            results.len(),
            start.elapsed()
        );
        Ok(results)
    }

    /// 定向扫描：只按规则库顺序逐条检测指定名称的规则
    pub async fn test(&self, names: &[String]) -> WhResult<Vec<ScanRecord>> {
        self.enter_running()?;
        for name in names.iter().filter(|name| self.rules.get(name).is_none()) {
            warn!("规则库中不存在组件：{}", name);
        }

        let state = ScanState::new();
        self.seed_baseline(&state).await;

        for rule in self.rules.select(names) {
            if let Err(e) = self.evaluator.process_rule(rule, &state).await {
                warn!("规则 [{}] 检测失败：{}", rule.name, e);
            }
        }

        resolve_implies(&self.rules, &state);
        self.set_phase(ScanPhase::Drained);
        Ok(state.into_results())
    }
}

/// worker主循环：每条规则在独立任务中检测，出错或panic只记录日志；返回处理的规则数
async fn run_worker(id: usize, queue: TaskQueue, evaluator: Arc<RuleEvaluator>, state: Arc<ScanState>) -> usize {
    let mut processed = 0;

    loop {
        let next = queue.lock().await.recv().await;
        let Some(rule) = next else {
            break;
        };
        processed += 1;

        let name = rule.name.clone();
        let evaluator = evaluator.clone();
        let state = state.clone();
        let task = tokio::spawn(async move { evaluator.process_rule(&rule, &state).await });

        match task.await {
            Ok(Ok(true)) => debug!("worker#{} 命中组件：{}", id, name),
            Ok(Ok(false)) => {}
            Ok(Err(e)) => warn!("worker#{} 规则 [{}] 检测失败：{}", id, name, e),
            Err(e) => error!(
                "worker#{} 规则 [{}] {}",
                id,
                name,
                WebhuntError::WorkerError(e.to_string())
            ),
        }
    }

    debug!("worker#{} 退出，处理规则数：{}", id, processed);
    processed
}
