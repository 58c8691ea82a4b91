//! Steer - 转向控制器命令行
//!
//! 入口：加载配置、初始化日志、构建存储 / 增强器 / 注册表，对任务文件做演练或查看、重置队列状态。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use steer::config::load_config;
use steer::observability;
use steer::steering::{
    create_queue_state_store, FilePromptEnhancer, PromptEnhancer, QueueStateStore,
    StaticPromptEnhancer, SteeringController, SteeringTask, StrategyRegistry,
};
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "steer", version, about = "Steering controller for automated agent tasks")]
struct Cli {
    /// Extra config file layered over config/default.toml.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Dry-run a task (JSON file) through prepare/complete cycles.
    Run {
        task: PathBuf,
        /// Maximum number of cycles.
        #[arg(short, long, default_value_t = 1)]
        runs: usize,
        /// Scenario name passed to the profile strategy.
        #[arg(short, long, default_value = "")]
        scenario: String,
    },
    /// Print the stored queue state of a task.
    Status { task_id: String },
    /// Clear steering state of a task across all strategies.
    Reset { task_id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = load_config(cli.config).context("Failed to load config")?;
    observability::init(&cfg.logging.level);

    let store = create_queue_state_store(&cfg.store);
    let enhancer: Arc<dyn PromptEnhancer> = match cfg.prompts.modes_dir {
        Some(ref dir) if dir.is_dir() => Arc::new(FilePromptEnhancer::new(dir)),
        _ => {
            tracing::info!("Mode prompt directory not found, using built-in sections");
            Arc::new(StaticPromptEnhancer::builtin())
        }
    };
    // profile 集成由宿主进程注入，命令行下不可用
    let registry = StrategyRegistry::with_defaults(Some(store.clone()), Some(enhancer), None);
    let controller = SteeringController::new(Arc::new(registry));

    match cli.command {
        Command::Run {
            task,
            runs,
            scenario,
        } => run_task(&controller, &task, runs, &scenario).await,
        Command::Status { task_id } => print_status(store.as_ref(), &task_id).await,
        Command::Reset { task_id } => {
            controller
                .reset(&task_id)
                .await
                .with_context(|| format!("Failed to reset task {}", task_id))?;
            println!("reset {}", task_id);
            Ok(())
        }
    }
}

async fn run_task(
    controller: &SteeringController,
    task_path: &Path,
    runs: usize,
    scenario: &str,
) -> anyhow::Result<()> {
    let raw = tokio::fs::read_to_string(task_path)
        .await
        .with_context(|| format!("Failed to read task file {:?}", task_path))?;
    let task: SteeringTask = serde_json::from_str(&raw).context("Invalid task JSON")?;
    let cancel = CancellationToken::new();

    for cycle in 1..=runs.max(1) {
        let prepared = controller
            .prepare(&task, &cancel)
            .await
            .context("Steering prepare failed")?;
        println!("== cycle {} ==", cycle);
        println!("{}", serde_json::to_string_pretty(&prepared)?);

        let outcome = controller
            .complete(&task, scenario, &cancel)
            .await
            .context("Steering complete failed")?;
        println!("{}", serde_json::to_string_pretty(&outcome)?);

        if !outcome.requeue {
            break;
        }
    }
    Ok(())
}

async fn print_status(store: &dyn QueueStateStore, task_id: &str) -> anyhow::Result<()> {
    match store.get(task_id).await? {
        Some(state) => println!("{}", serde_json::to_string_pretty(&state)?),
        None => println!("no queue state for {}", task_id),
    }
    Ok(())
}
