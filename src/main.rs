// src/main.rs

use axum::{routing::post, serve, Router};
use clap::Parser;
use reqwest::Certificate;
use std::collections::HashMap;
use std::fs;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};
use tracing_appender::rolling;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

mod adapters;
mod api;
mod bidding;
mod config;
mod logging;
mod mock_bidder;
mod model;
mod openrtb;

use adapters::xhb::{self, XhbAdapter};
use adapters::{Adapter, HttpAdapter, HttpAdapterConfig};
use config::config_manager::{ConfigAdapter, FileConfigAdapter};
use config::ConfigManager;
use logging::runtime_logger::RuntimeLogger;

#[derive(Clone)]
pub struct AppState {
    pub runtime_logger: Arc<RuntimeLogger>,
    pub adapters: Arc<HashMap<String, Arc<dyn Adapter>>>,
}

#[derive(Parser, Debug)]
#[command(author = "whiteCcinn", version = "1.0", about = "An OpenRTB-based Header Bidding Auction Server")]
struct CliArgs {
    #[arg(short, long, default_value_t = 8080)]
    port: u16,
    #[arg(long, default_value = "logs")]
    log_dir: String,
    /// usersync 回跳使用的对外地址
    #[arg(long, default_value = "http://localhost:8080")]
    external_url: String,
    #[arg(long, default_value = "static/partner_info.json")]
    partner_file: String,
    /// 额外信任的根证书（PEM bundle）
    #[arg(long)]
    ca_bundle: Option<String>,
    #[arg(long, default_value_t = 9001)]
    mock_port: u16,
}

#[tokio::main]
async fn main() {
    // 设置环境变量 TZ 为东八区
    std::env::set_var("TZ", "Asia/Shanghai");

    let args = CliArgs::parse();

    // 初始化全局 tracing 日志
    fs::create_dir_all(&args.log_dir).expect("Unable to create log directory");
    let log_file = rolling::hourly(&args.log_dir, "hbs_log.json");
    let (non_blocking, _guard) = tracing_appender::non_blocking(log_file);
    let subscriber = Registry::default()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer().json().with_writer(non_blocking));
    tracing::subscriber::set_global_default(subscriber)
        .expect("Unable to set global tracing subscriber");
    info!("HBS server starting on port {}", args.port);

    // 初始化运行日志记录器（服务状态、合作方调用诊断）
    let runtime_logger = RuntimeLogger::new(&args.log_dir, "runtime", 1000, 100, 1000);
    runtime_logger.log("INFO", "HBS server is starting...").await;

    // 从 /static 目录读取合作方注册表
    let adapter_source = FileConfigAdapter::new(&args.partner_file);
    let config = Arc::new(ConfigManager::new(&args.external_url));
    config.update_partners(adapter_source.get_partner_configs());

    // 根证书池（可选）；作为现成集合消费，这里不做构建
    let mut root_certs = Vec::new();
    if let Some(path) = &args.ca_bundle {
        let pem = fs::read(path).expect("Unable to read CA bundle");
        root_certs = Certificate::from_pem_bundle(&pem).expect("Unable to parse CA bundle");
    }

    // 进程级共享 HTTP 客户端：启动时构造一次，注入所有 adapter
    let http = HttpAdapter::new(&HttpAdapterConfig::default(), &root_certs)
        .expect("Unable to build shared HTTP client");

    let mut adapters: HashMap<String, Arc<dyn Adapter>> = HashMap::new();
    for partner in config.active_partners() {
        match partner.code.as_str() {
            "xhb" => {
                let endpoint = partner.endpoint.as_deref().unwrap_or(xhb::DEFAULT_ENDPOINT);
                adapters.insert(
                    partner.code.clone(),
                    Arc::new(XhbAdapter::new(http.clone(), &config.external_url, endpoint)),
                );
            }
            other => warn!("no adapter registered for partner '{}'", other),
        }
    }

    // 启动 Mock 合作方服务器
    let mock_port = args.mock_port;
    let mock_server = tokio::spawn(async move {
        mock_bidder::start_mock_bidder_server(mock_port).await;
    });

    let state = Arc::new(AppState {
        runtime_logger: runtime_logger.clone(),
        adapters: Arc::new(adapters),
    });

    let hbs_server = tokio::spawn({
        let state = state.clone();
        let port = args.port;
        let runtime_logger = runtime_logger.clone();
        async move {
            let app = Router::new()
                .route("/auction", post(api::handlers::handle_auction_request))
                .with_state(state);
            let addr = format!("0.0.0.0:{}", port);
            runtime_logger
                .log("INFO", &format!("HBS server running at http://{}", addr))
                .await;
            let listener = TcpListener::bind(&addr).await.unwrap();
            serve(listener, app).await.unwrap();
        }
    });

    tokio::select! {
        _ = signal::ctrl_c() => {
            runtime_logger.log("INFO", "Shutting down gracefully...").await;
        }
    }

    runtime_logger.shutdown().await;
    hbs_server.abort();
    mock_server.abort();
    info!("HBS server shut down.");
}
