//! segfetch：多连接、可断点续传的下载命令行。
//!
//! 续传数据写在输出文件旁的 `<文件名>.segfetch` 里：启动时读取，运行中定期刷新，
//! Ctrl-C 时保存后退出，下载完成后删除。

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use clap::Parser;
use thiserror::Error;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use segfetch::transfer::{
    DEFAULT_BYTES_PER_BLOCK, DEFAULT_MIN_SESSION_BLOCKS, DEFAULT_RETRY_COUNT,
    DEFAULT_SESSION_NUMBER, Engine, ResumeData, TaskBuilder, TaskId, TaskState, TransferError,
    guess_file_name,
};
use segfetch::transport::HttpTransport;

/// 续传文件后缀
const RESUME_SUFFIX: &str = "segfetch";

/// 两次 tick 之间的等待
const TICK_INTERVAL: Duration = Duration::from_millis(20);

/// 续传文件刷新间隔
const SAVE_INTERVAL: Duration = Duration::from_secs(5);

/// Multi-connection, resumable downloader.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// URL of the file to download.
    uri: String,

    /// Output directory (defaults to the user's download directory).
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Output file name (defaults to the last path segment of the URL).
    #[arg(short = 'n', long)]
    name: Option<String>,

    /// Target number of concurrent sessions.
    #[arg(short, long, default_value_t = DEFAULT_SESSION_NUMBER)]
    sessions: usize,

    /// Bytes per progress block.
    #[arg(short, long, default_value_t = DEFAULT_BYTES_PER_BLOCK)]
    block_size: u64,

    /// Minimum blocks per session when splitting.
    #[arg(short, long, default_value_t = DEFAULT_MIN_SESSION_BLOCKS)]
    min_blocks: u64,

    /// Consecutive failed sessions tolerated before giving up (0 = unlimited).
    #[arg(long, default_value_t = DEFAULT_RETRY_COUNT)]
    retry: usize,

    /// Referer header.
    #[arg(long)]
    referer: Option<String>,

    /// User-Agent header.
    #[arg(long)]
    user_agent: Option<String>,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("初始化失败: {0}")]
    Setup(String),

    #[error("续传文件读写失败: {0}")]
    ResumeFile(#[from] std::io::Error),

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error("已中断，续传数据保存在 {0}")]
    Interrupted(PathBuf),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hyper=warn,reqwest=warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

fn resume_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_owned();
    name.push(".");
    name.push(RESUME_SUFFIX);
    PathBuf::from(name)
}

fn load_resume(path: &Path) -> Result<Option<ResumeData>, CliError> {
    if !path.exists() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(path)?;
    match ResumeData::from_xml(&text) {
        Ok(data) => Ok(Some(data)),
        Err(e) => {
            warn!("续传文件无效，重新下载: {e}");
            Ok(None)
        }
    }
}

fn save_resume(engine: &Engine, id: TaskId, path: &Path) -> Result<(), CliError> {
    let data = engine.resume_data(id)?;
    if data.total_size == 0 {
        return Ok(());
    }
    std::fs::write(path, data.to_xml()?)?;
    Ok(())
}

fn run(args: Args) -> Result<(), CliError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::Setup(e.to_string()))?;
    let transport = HttpTransport::new(runtime.handle().clone())?;
    let mut engine = Engine::new(transport);

    let output_dir = args
        .output_dir
        .or_else(dirs::download_dir)
        .unwrap_or_else(|| PathBuf::from("."));
    let name = args.name.unwrap_or_else(|| guess_file_name(&args.uri));
    let output = output_dir.join(&name);
    let sidecar = resume_path(&output);

    let mut builder = TaskBuilder::new(args.uri.clone())
        .save_to(&output_dir)
        .file_name(name)
        .session_number(args.sessions)
        .bytes_per_block(args.block_size)
        .min_session_blocks(args.min_blocks)
        .retry_count(args.retry)
        .on_error(|e| error!("下载失败: {e}"));
    if let Some(referer) = args.referer {
        builder = builder.referer(referer);
    }
    if let Some(agent) = args.user_agent {
        builder = builder.user_agent(agent);
    }
    if output.exists() {
        if let Some(data) = load_resume(&sidecar)? {
            info!("从 {} 继续下载", sidecar.display());
            builder = builder.resume_from(data);
        }
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    ctrlc::set_handler(move || {
        shutdown_clone.store(true, Ordering::SeqCst);
    })
    .map_err(|e| CliError::Setup(format!("无法注册信号处理: {e}")))?;

    let id = engine.add_task(builder)?;
    let progress = engine
        .task(id)
        .map(|t| t.progress())
        .ok_or(TransferError::TaskNotFound(id))?;
    info!("开始下载 {} -> {}", args.uri, output.display());

    let mut last_save = Instant::now();
    let mut last_report = Instant::now();
    while engine.tick() > 0 {
        if shutdown.load(Ordering::SeqCst) {
            save_resume(&engine, id, &sidecar)?;
            engine.remove_task(id)?;
            return Err(CliError::Interrupted(sidecar));
        }
        if last_save.elapsed() >= SAVE_INTERVAL {
            save_resume(&engine, id, &sidecar)?;
            last_save = Instant::now();
        }
        if last_report.elapsed() >= Duration::from_secs(1) {
            if let Some(p) = progress.get_current() {
                info!(
                    "{} / {} 字节 ({:.1}%)，{} 个会话",
                    p.bytes_done,
                    p.total.map(|t| t.to_string()).unwrap_or_else(|| "?".into()),
                    p.pct(),
                    p.sessions
                );
            }
            last_report = Instant::now();
        }
        runtime.block_on(tokio::time::sleep(TICK_INTERVAL));
    }

    match engine.state(id) {
        Some(TaskState::Finish) => {
            if sidecar.exists() {
                std::fs::remove_file(&sidecar)?;
            }
            info!("下载完成: {}", output.display());
            Ok(())
        }
        _ => {
            save_resume(&engine, id, &sidecar)?;
            let err = engine
                .task(id)
                .and_then(|t| t.error().cloned())
                .unwrap_or(TransferError::TaskNotFound(id));
            Err(err.into())
        }
    }
}

fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e @ CliError::Interrupted(_)) => {
            warn!("{e}");
            ExitCode::from(130)
        }
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
