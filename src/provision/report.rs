//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 步骤状态输出和汇总渲染。

use crate::provision::invalidator::PurgeReport;
use crate::provision::mapping::MappingChange;
use crate::provision::orchestrator::{
    ProvisionFailure, ProvisionSummary, RegistrationOutcome, Step,
};
use crate::registry::model::{
    BackendConfig, BackendDescriptor, CacheMode, ModeMappings, RegistryState,
};
use crate::utils::redaction::Redacted;
use secrecy::ExposeSecret;
use std::fmt::Write;

/// 编排过程中每完成一步产生的事件
#[derive(Debug)]
pub enum StepEvent<'a> {
    Inspected { store: &'a str, exists: bool },
    Created(&'a BackendDescriptor),
    Skipped { store: &'a str },
    Mapped(&'a MappingChange),
    Purged(&'a PurgeReport),
    Failed { step: Step, error: &'a str },
}

/// 步骤事件接收者
pub trait StepReporter: Send + Sync {
    fn on_step(&self, event: &StepEvent<'_>);
}

/// 丢弃所有事件
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl StepReporter for NullReporter {
    fn on_step(&self, _event: &StepEvent<'_>) {}
}

/// 把每一步的状态行输出到标准输出
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleReporter;

impl StepReporter for ConsoleReporter {
    fn on_step(&self, event: &StepEvent<'_>) {
        println!("{}", status_line(event));
    }
}

/// 单个事件对应的状态行
pub fn status_line(event: &StepEvent<'_>) -> String {
    match event {
        StepEvent::Inspected { store, exists: true } => {
            format!("[inspect] store '{}' already exists", store)
        }
        StepEvent::Inspected {
            store,
            exists: false,
        } => format!("[inspect] store '{}' not found", store),
        StepEvent::Created(descriptor) => {
            let mut line = format!("[register] created store '{}'", descriptor.name);
            if let Some(target) = descriptor.connection_target() {
                let _ = write!(line, " ({})", target);
            }
            line
        }
        StepEvent::Skipped { store } => {
            format!("[register] skipped, store '{}' already configured", store)
        }
        StepEvent::Mapped(change) => {
            let modes: Vec<String> = change
                .changed_modes()
                .iter()
                .map(|m| format!("{} -> [{}]", m, change.after.get(*m).join(", ")))
                .collect();
            if modes.is_empty() {
                "[map] mappings already up to date".to_string()
            } else {
                format!("[map] mapped {}", modes.join("; "))
            }
        }
        StepEvent::Purged(report) => format!(
            "[purge] purged {} of {} store(s)",
            report.succeeded().count(),
            report.outcomes.len()
        ),
        StepEvent::Failed { step, error } => format!("[{}] FAILED: {}", step, error),
    }
}

fn render_mappings(out: &mut String, indent: &str, mappings: &ModeMappings) {
    for mode in CacheMode::ALL {
        let _ = writeln!(out, "{}{:<12} [{}]", indent, mode, mappings.get(mode).join(", "));
    }
}

/// 成功（或部分成功）运行的汇总
pub fn render_summary(summary: &ProvisionSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\n=== Cache provisioning summary ===");
    match &summary.registration {
        RegistrationOutcome::Created(descriptor) => {
            let _ = writeln!(out, "Store:        '{}' created", descriptor.name);
        }
        RegistrationOutcome::Skipped { store } => {
            let _ = writeln!(out, "Store:        '{}' already existed (skipped)", store);
        }
    }

    let _ = writeln!(out, "Mappings before:");
    render_mappings(&mut out, "  ", &summary.mapping.before);
    let _ = writeln!(out, "Mappings after:");
    render_mappings(&mut out, "  ", &summary.mapping.after);

    let _ = writeln!(out, "Purge:");
    for outcome in &summary.purge.outcomes {
        match &outcome.error {
            None => {
                let _ = writeln!(out, "  {:<20} ok", outcome.store);
            }
            Some(err) => {
                let _ = writeln!(out, "  {:<20} FAILED ({})", outcome.store, err);
            }
        }
    }

    if summary.is_success() {
        let _ = writeln!(
            out,
            "\n✅ Cache configuration complete (registry version {})",
            summary.mapping.version
        );
    } else {
        let _ = writeln!(
            out,
            "\n⚠️  Mappings applied but {} store(s) could not be purged; stale entries may remain",
            summary.purge.failed().count()
        );
    }
    out
}

/// 致命失败的说明
pub fn render_failure(failure: &ProvisionFailure) -> String {
    let mut out = format!(
        "\n❌ Cache provisioning failed at step '{}': {}",
        failure.step, failure.error
    );
    if failure.step != Step::Inspect {
        out.push_str("\n   Changes applied by earlier steps were not rolled back.");
    }
    out
}

/// 注册表当前内容（存储及映射）
pub fn render_state(state: &RegistryState) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== Cache stores (registry version {}) ===\n", state.version);
    for descriptor in state.stores.values() {
        let default_marker = if descriptor.is_default { " (default)" } else { "" };
        let _ = writeln!(out, "{}{}", descriptor.name, default_marker);
        let _ = writeln!(out, "  kind:       {}", descriptor.kind());
        match &descriptor.config {
            BackendConfig::Redis(redis) => {
                let _ = writeln!(out, "  server:     {}", redis.server);
                let _ = writeln!(out, "  database:   {}", redis.database);
                let _ = writeln!(out, "  prefix:     {}", redis.prefix);
                let _ = writeln!(
                    out,
                    "  serializer: {:?} ({})",
                    redis.serializer,
                    redis.serializer.code()
                );
                let _ = writeln!(
                    out,
                    "  compressor: {:?} ({})",
                    redis.compressor,
                    redis.compressor.code()
                );
                if let Some(password) = &redis.password {
                    let masked = Redacted::new(password.expose_secret());
                    let _ = writeln!(out, "  password:   {}", masked);
                }
            }
            BackendConfig::File(file) => {
                let _ = writeln!(out, "  path:       {}", file.path.display());
            }
            BackendConfig::Memory => {}
        }
    }

    let _ = writeln!(out, "\n=== Mode mappings ===\n");
    render_mappings(&mut out, "", &state.mappings);
    out
}
