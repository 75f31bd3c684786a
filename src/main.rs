use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use webhunt::{ConfigManager, RuleStore, ScanConfig, Scanner};

#[derive(Parser)]
#[command(name = "webhunt", about = "Web组件指纹识别工具", version, author)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 扫描目标站点
    Scan {
        /// 目标URL
        #[arg(short = 'u', long)]
        url: String,

        /// 规则目录
        #[arg(short = 'd', long = "dir", default_value = "components")]
        rule_dir: PathBuf,

        /// 攻击模式：允许请求规则中的附加路径
        #[arg(short = 'a', long)]
        aggression: bool,

        /// 自定义User-Agent
        #[arg(short = 'U', long = "user-agent")]
        user_agent: Option<String>,

        /// 自定义Header，格式 "Name: value"，可重复
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,

        /// 禁止跟随重定向
        #[arg(long)]
        disallow_redirect: bool,

        /// 只检测指定组件，可重复
        #[arg(short = 'c', long = "component")]
        components: Vec<String>,

        /// worker数量
        #[arg(short = 't', long = "threads", default_value_t = 8)]
        threads: usize,

        /// 请求超时（秒）
        #[arg(long, default_value_t = 30)]
        timeout: u64,

        /// 代理，格式 TYPE/addr:port 或 TYPE/user@password/addr:port
        #[arg(long)]
        proxy: Option<String>,

        /// 由代理端解析域名
        #[arg(long)]
        proxy_rdns: bool,

        /// 详细日志
        #[arg(short = 'v', long)]
        verbose: bool,
    },

    /// 管理本地规则
    Manage {
        /// 规则目录
        #[arg(short = 'd', long = "dir", default_value = "components")]
        rule_dir: PathBuf,

        /// 列出全部规则
        #[arg(long, conflicts_with = "search")]
        list: bool,

        /// 按名称搜索规则，可重复
        #[arg(long, num_args = 1..)]
        search: Vec<String>,

        /// 详细日志
        #[arg(short = 'v', long)]
        verbose: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Scan {
            url,
            rule_dir,
            aggression,
            user_agent,
            headers,
            disallow_redirect,
            components,
            threads,
            timeout,
            proxy,
            proxy_rdns,
            verbose,
        } => {
            let mut builder = ConfigManager::custom()
                .rule_dir(rule_dir)
                .aggression(aggression)
                .allow_redirect(!disallow_redirect)
                .max_workers(threads)
                .http_timeout(timeout)
                .proxy(proxy, proxy_rdns)
                .verbose(verbose);
            if let Some(ua) = user_agent {
                builder = builder.user_agent(ua);
            }
            for line in headers {
                builder = builder.header(line);
            }
            let config = builder.build();
            init_logging(config.verbose);
            cmd_scan(&url, config, &components).await
        }
        Commands::Manage { rule_dir, list, search, verbose } => {
            init_logging(verbose);
            cmd_manage(&rule_dir, list, &search)
        }
    }
}

/// 安装日志订阅器，RUST_LOG 优先
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn cmd_scan(url: &str, config: ScanConfig, components: &[String]) -> Result<()> {
    let rules = RuleStore::load_dir(&config.rule_dir)
        .with_context(|| format!("加载规则目录失败：{}", config.rule_dir.display()))?;
    info!("已加载规则：{}", rules.len());

    let scanner = Scanner::new(url, config, Arc::new(rules)).context("初始化扫描器失败")?;
    info!("扫描目标：{}", scanner.target());
    let results = if components.is_empty() {
        scanner.start().await?
    } else {
        scanner.test(components).await?
    };

    println!("{}", serde_json::to_string(&results)?);
    Ok(())
}

fn cmd_manage(rule_dir: &Path, list: bool, search: &[String]) -> Result<()> {
    let rules = RuleStore::load_dir(rule_dir)
        .with_context(|| format!("加载规则目录失败：{}", rule_dir.display()))?;

    if list {
        for rule in rules.iter() {
            println!("{}", rule);
        }
        let summary: Vec<String> = rules
            .count_by_type()
            .into_iter()
            .map(|(kind, count)| format!("{}: {}", kind, count))
            .collect();
        println!("共 {} 条规则（{}）", rules.len(), summary.join(", "));
        return Ok(());
    }

    if search.is_empty() {
        bail!("请指定 --list 或 --search");
    }

    let hits = rules.search(search);
    for rule in &hits {
        let path = rule
            .source
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        println!("{}\n    {}", path, rule);
    }
    println!("找到 {} 条匹配规则", hits.len());
    Ok(())
}
