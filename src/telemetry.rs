//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了日志输出和链路追踪的初始化。

use opentelemetry::global;
use opentelemetry::trace::TracerProvider;
use opentelemetry_sdk::trace::TracerProvider as SdkTracerProvider;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Registry};

/// 初始化日志和 OpenTelemetry Tracing
///
/// 日志写到标准错误，标准输出只留给步骤状态行和汇总。
/// 过滤级别优先取 `RUST_LOG`，否则默认 `warn`，`verbose` 时为 `debug`。
///
/// # 参数
///
/// * `service_name` - 服务名称
/// * `verbose` - 是否输出调试日志
pub fn init_tracing(service_name: &str, verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    // 未配置导出器，span 只在进程内传播 run_id
    let provider = SdkTracerProvider::builder().build();
    global::set_tracer_provider(provider.clone());
    let tracer = provider.tracer(service_name.to_string());
    let telemetry = tracing_opentelemetry::layer().with_tracer(tracer);

    let subscriber = Registry::default()
        .with(filter)
        .with(fmt_layer)
        .with(telemetry);

    let _ = tracing::subscriber::set_global_default(subscriber);
}
