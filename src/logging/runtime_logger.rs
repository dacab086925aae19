// src/logging/runtime_logger.rs

use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use std::time::SystemTime;

use chrono::{FixedOffset, TimeZone, Utc};
use serde_json::json;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::task;
use tokio::time::{self, Duration};
use tracing_appender::rolling::{self, RollingFileAppender};
use tracing_subscriber::fmt::MakeWriter;

const LEVELS: [&str; 5] = ["TRACE", "DEBUG", "INFO", "WARN", "ERROR"];
const RETENTION_HOURS: u64 = 72;

/// 单条运行日志
pub struct LogEntry {
    pub level: String,
    pub content: String,
}

/// 运行日志记录器：运行状态、合作方调用诊断等按级别分流到不同文件，
/// 经 mpsc 通道批量异步落盘。
pub struct RuntimeLogger {
    sender: Sender<LogEntry>,
}

impl RuntimeLogger {
    /// - `log_dir`: 日志目录
    /// - `file_prefix`: 文件前缀（最终文件名形如 runtime_info.json）
    /// - `buffer_size`: 通道缓冲大小
    /// - `batch_size`: 单级别批量落盘条数
    /// - `flush_interval_ms`: 定时刷盘间隔（毫秒）
    pub fn new(
        log_dir: &str,
        file_prefix: &str,
        buffer_size: usize,
        batch_size: usize,
        flush_interval_ms: u64,
    ) -> Arc<Self> {
        let (sender, receiver) = mpsc::channel(buffer_size);
        let mut sinks: HashMap<String, Arc<RollingFileAppender>> = HashMap::new();
        for level in LEVELS {
            let file_name = format!("{}_{}.json", file_prefix, level.to_lowercase());
            sinks.insert(level.to_string(), Arc::new(rolling::hourly(log_dir, &file_name)));
        }
        tokio::spawn(Self::background_writer(
            sinks,
            receiver,
            batch_size,
            flush_interval_ms,
        ));
        {
            let log_dir = log_dir.to_string();
            tokio::spawn(async move {
                loop {
                    Self::cleanup_old_logs(&log_dir, Duration::from_secs(RETENTION_HOURS * 3600))
                        .await;
                    time::sleep(Duration::from_secs(3600)).await;
                }
            });
        }
        Arc::new(Self { sender })
    }

    pub async fn log(&self, level: &str, message: &str) {
        let tz = FixedOffset::east_opt(8 * 3600).expect("valid utc offset");
        let timestamp = tz.from_utc_datetime(&Utc::now().naive_utc()).to_rfc3339();
        let entry = LogEntry {
            level: level.to_string(),
            content: json!({
                "timestamp": timestamp,
                "level": level,
                "message": message,
            })
            .to_string(),
        };
        if let Err(err) = self.sender.send(entry).await {
            eprintln!("Failed to queue runtime log message: {}", err);
        }
    }

    async fn background_writer(
        sinks: HashMap<String, Arc<RollingFileAppender>>,
        mut receiver: Receiver<LogEntry>,
        batch_size: usize,
        flush_interval_ms: u64,
    ) {
        let mut buffers: HashMap<String, Vec<String>> =
            sinks.keys().map(|level| (level.clone(), Vec::new())).collect();
        let mut ticker = time::interval(Duration::from_millis(flush_interval_ms));
        loop {
            tokio::select! {
                entry = receiver.recv() => {
                    match entry {
                        Some(entry) => {
                            let buffer = buffers.entry(entry.level.clone()).or_default();
                            buffer.push(entry.content);
                            if buffer.len() >= batch_size {
                                if let Some(sink) = sinks.get(&entry.level) {
                                    Self::flush(Arc::clone(sink), std::mem::take(buffer)).await;
                                }
                            }
                        }
                        // 所有 sender 已关闭：残余日志落盘后退出
                        None => {
                            for (level, buffer) in buffers.iter_mut() {
                                if buffer.is_empty() {
                                    continue;
                                }
                                if let Some(sink) = sinks.get(level) {
                                    Self::flush(Arc::clone(sink), std::mem::take(buffer)).await;
                                }
                            }
                            break;
                        }
                    }
                }
                _ = ticker.tick() => {
                    for (level, buffer) in buffers.iter_mut() {
                        if buffer.is_empty() {
                            continue;
                        }
                        if let Some(sink) = sinks.get(level) {
                            Self::flush(Arc::clone(sink), std::mem::take(buffer)).await;
                        }
                    }
                }
            }
        }
    }

    async fn flush(sink: Arc<RollingFileAppender>, batch: Vec<String>) {
        let content = batch.join("\n") + "\n";
        let result = task::spawn_blocking(move || {
            let mut writer = sink.make_writer();
            writer.write_all(content.as_bytes())
        })
        .await;
        match result {
            Ok(Err(err)) => eprintln!("Failed to write runtime logs: {}", err),
            Err(err) => eprintln!("Runtime log writer task failed: {}", err),
            Ok(Ok(())) => {}
        }
    }

    async fn cleanup_old_logs(log_dir: &str, retention: Duration) {
        let now = SystemTime::now();
        let mut dir = match tokio::fs::read_dir(log_dir).await {
            Ok(dir) => dir,
            Err(err) => {
                eprintln!("Failed to read log directory {}: {}", log_dir, err);
                return;
            }
        };
        while let Ok(Some(entry)) = dir.next_entry().await {
            let path = entry.path();
            let modified = match entry.metadata().await.and_then(|m| m.modified()) {
                Ok(modified) => modified,
                Err(_) => continue,
            };
            if now.duration_since(modified).unwrap_or_default() > retention {
                if let Err(err) = tokio::fs::remove_file(&path).await {
                    eprintln!("Failed to delete old log file {:?}: {}", path, err);
                }
            }
        }
    }

    /// 等待后台任务把已入队的日志刷盘
    pub async fn shutdown(&self) {
        time::sleep(Duration::from_secs(1)).await;
    }
}
