//! Prometheus 指标模块
//!
//! 基于 metrics crate 和 metrics-exporter-prometheus 实现指标收集与导出。
//! 指标通过独立的 HTTP 端口暴露，供 Prometheus 抓取。

use anyhow::Result;
use axum::{Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::OnceLock;
use tokio::net::TcpListener;
use tracing::{error, info};

use super::ObservabilityConfig;

/// 全局 Prometheus handle，用于渲染指标
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics 资源守卫
pub struct MetricsHandle {
    _server_handle: tokio::task::JoinHandle<()>,
}

/// 初始化 Prometheus 指标导出
///
/// 在独立端口启动 HTTP 服务器暴露 `/metrics` 端点。
pub async fn init(config: &ObservabilityConfig) -> Result<MetricsHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    let _ = PROMETHEUS_HANDLE.set(handle.clone());

    register_common_metrics(&config.service_name);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    let server_handle = start_metrics_server(addr, handle).await?;

    Ok(MetricsHandle {
        _server_handle: server_handle,
    })
}

/// 注册预定义指标的描述，出现在 /metrics 的 HELP 注释中
fn register_common_metrics(service_name: &str) {
    metrics::describe_counter!("http_requests_total", "Total number of HTTP requests");
    metrics::describe_histogram!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds"
    );

    metrics::describe_counter!(
        "checkins_total",
        "Total number of check-in attempts by outcome"
    );
    metrics::describe_histogram!(
        "checkin_duration_seconds",
        "Check-in transaction duration in seconds"
    );
    metrics::describe_counter!(
        "points_awarded_total",
        "Total number of points credited by check-ins"
    );
    metrics::describe_counter!("stamps_awarded_total", "Total number of stamps awarded");

    metrics::counter!("service_starts_total", "service" => service_name.to_string()).increment(1);
}

async fn start_metrics_server(
    addr: SocketAddr,
    handle: PrometheusHandle,
) -> Result<tokio::task::JoinHandle<()>> {
    let app = Router::new()
        .route("/metrics", get(move || std::future::ready(handle.render())))
        .route("/health", get(|| async { "OK" }));

    let listener = TcpListener::bind(addr).await?;
    info!("Metrics server listening on {}", addr);

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Metrics server error: {}", e);
        }
    });

    Ok(server_handle)
}

/// 获取全局 Prometheus handle（用于自定义渲染）
pub fn get_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

// ==================== 指标记录函数 ====================

/// 记录 HTTP 请求
#[inline]
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let status_str = status.to_string();
    metrics::counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status_str.clone()
    )
    .increment(1);

    metrics::histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status_str
    )
    .record(duration_secs);
}

/// 记录一次打卡尝试
///
/// outcome 取值如 "success"、"duplicate"、"place_not_found"、"timeout"
#[inline]
pub fn record_checkin(outcome: &str, duration_secs: f64) {
    metrics::counter!("checkins_total", "outcome" => outcome.to_string()).increment(1);

    metrics::histogram!("checkin_duration_seconds", "outcome" => outcome.to_string())
        .record(duration_secs);
}

/// 记录打卡入账的积分
#[inline]
pub fn record_points_awarded(points: i64) {
    if points > 0 {
        metrics::counter!("points_awarded_total").increment(points as u64);
    }
}

/// 记录授予的印章
#[inline]
pub fn record_stamp_awarded(stamp: &str) {
    metrics::counter!("stamps_awarded_total", "stamp" => stamp.to_string()).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_functions_do_not_panic() {
        // 未安装 recorder 时记录操作为空操作
        record_http_request("POST", "/checkins", 201, 0.1);
        record_checkin("success", 0.02);
        record_checkin("duplicate", 0.01);
        record_points_awarded(600);
        record_points_awarded(0);
        record_stamp_awarded("first_visit");
    }
}
