//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 幂等配置下发编排。
//!
//! 状态机：`Start → Inspected → Registered | Skipped → Mapped → Purged → Done`，
//! 任一步骤失败进入 `Failed`。已生效的副作用不回滚。

use crate::config::ProvisionConfig;
use crate::error::{ProvisionError, Result};
use crate::provision::inspector::RegistryInspector;
use crate::provision::invalidator::{CacheInvalidator, PurgeReport};
use crate::provision::mapping::{MappingChange, MappingRewriter};
use crate::provision::registrar::Registrar;
use crate::provision::report::{StepEvent, StepReporter};
use crate::registry::model::{BackendDescriptor, CacheMode};
use crate::registry::RegistryClient;
use std::fmt;
use std::process::ExitCode;
use tokio::time::Duration;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// 编排步骤
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Inspect,
    Register,
    Map,
    Purge,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Step::Inspect => "inspect",
            Step::Register => "register",
            Step::Map => "map",
            Step::Purge => "purge",
        })
    }
}

/// 编排状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionState {
    Start,
    Inspected,
    Registered,
    Skipped,
    Mapped,
    Purged,
    Done,
    Failed,
}

/// 注册步骤的结果
#[derive(Debug, Clone)]
pub enum RegistrationOutcome {
    /// 新建了存储
    Created(BackendDescriptor),
    /// 存储已存在，未写入
    Skipped { store: String },
}

impl RegistrationOutcome {
    pub fn is_created(&self) -> bool {
        matches!(self, RegistrationOutcome::Created(_))
    }
}

/// 下发计划：要注册的存储及其目标模式
#[derive(Debug, Clone)]
pub struct ProvisionPlan {
    pub descriptor: BackendDescriptor,
    pub modes: Vec<CacheMode>,
}

impl ProvisionPlan {
    pub fn new(descriptor: BackendDescriptor, modes: Vec<CacheMode>) -> Self {
        Self { descriptor, modes }
    }

    /// 由配置构建下发计划
    pub fn from_config(config: &ProvisionConfig) -> Result<Self> {
        Ok(Self::new(config.store_descriptor()?, config.store.modes.clone()))
    }

    fn mapping_changes(&self) -> Vec<(CacheMode, Vec<String>)> {
        self.modes
            .iter()
            .map(|mode| (*mode, vec![self.descriptor.name.clone()]))
            .collect()
    }
}

/// 完成全部步骤后的汇总
#[derive(Debug, Clone)]
pub struct ProvisionSummary {
    pub run_id: Uuid,
    pub registration: RegistrationOutcome,
    pub mapping: MappingChange,
    pub purge: PurgeReport,
    pub transitions: Vec<ProvisionState>,
}

impl ProvisionSummary {
    /// 所有存储都清理成功才算成功
    pub fn is_success(&self) -> bool {
        self.purge.is_success()
    }

    /// 0 表示成功，2 表示映射已生效但有存储清理失败
    pub fn exit_code(&self) -> ExitCode {
        if self.is_success() {
            ExitCode::SUCCESS
        } else {
            ExitCode::from(2)
        }
    }
}

/// 致命失败：失败的步骤及原因
#[derive(Debug)]
pub struct ProvisionFailure {
    pub run_id: Uuid,
    pub step: Step,
    pub error: ProvisionError,
    pub transitions: Vec<ProvisionState>,
}

impl ProvisionFailure {
    pub fn exit_code(&self) -> ExitCode {
        ExitCode::FAILURE
    }
}

impl fmt::Display for ProvisionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} step failed: {}", self.step, self.error)
    }
}

impl std::error::Error for ProvisionFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// 配置下发编排器
pub struct Provisioner<'a, C: RegistryClient + ?Sized> {
    client: &'a C,
    plan: ProvisionPlan,
    timeout: Duration,
    reporter: &'a dyn StepReporter,
}

impl<'a, C: RegistryClient + ?Sized> Provisioner<'a, C> {
    /// # 参数
    ///
    /// * `client` - 宿主注册表客户端
    /// * `plan` - 下发计划
    /// * `timeout` - 单次注册表或清理调用的超时时间
    /// * `reporter` - 步骤事件接收者
    pub fn new(
        client: &'a C,
        plan: ProvisionPlan,
        timeout: Duration,
        reporter: &'a dyn StepReporter,
    ) -> Self {
        Self {
            client,
            plan,
            timeout,
            reporter,
        }
    }

    /// 执行完整流程
    pub async fn run(&self) -> std::result::Result<ProvisionSummary, ProvisionFailure> {
        let run_id = Uuid::new_v4();
        let span = info_span!("provision", %run_id, store = %self.plan.descriptor.name);
        self.run_steps(run_id).instrument(span).await
    }

    async fn run_steps(
        &self,
        run_id: Uuid,
    ) -> std::result::Result<ProvisionSummary, ProvisionFailure> {
        let mut transitions = vec![ProvisionState::Start];
        let name = self.plan.descriptor.name.as_str();

        // Start -> Inspected
        let inspection = match RegistryInspector::new(self.client, self.timeout)
            .inspect(name)
            .await
        {
            Ok(inspection) => inspection,
            Err(e) => return Err(self.fail(run_id, Step::Inspect, e, transitions)),
        };
        transitions.push(ProvisionState::Inspected);
        self.reporter.on_step(&StepEvent::Inspected {
            store: name,
            exists: inspection.exists,
        });

        let mut state = inspection.state;

        // Inspected -> Registered | Skipped
        let registration = if inspection.exists {
            if let Some(existing) = state.get(name) {
                if !existing.same_as(&self.plan.descriptor) {
                    warn!(
                        "Store '{}' exists with different settings, leaving it unchanged",
                        name
                    );
                }
            }
            transitions.push(ProvisionState::Skipped);
            self.reporter.on_step(&StepEvent::Skipped { store: name });
            RegistrationOutcome::Skipped {
                store: name.to_string(),
            }
        } else {
            let registrar = Registrar::new(self.client, self.timeout);
            let persisted = match registrar
                .register(self.plan.descriptor.clone(), state.version)
                .await
            {
                Ok(persisted) => persisted,
                Err(e) => return Err(self.fail(run_id, Step::Register, e, transitions)),
            };
            // 注册成功后版本号加一，本地快照同步推进，后续写入继续做版本校验
            state
                .stores
                .insert(persisted.name.clone(), persisted.clone());
            state.version += 1;

            transitions.push(ProvisionState::Registered);
            self.reporter.on_step(&StepEvent::Created(&persisted));
            RegistrationOutcome::Created(persisted)
        };

        // -> Mapped
        let rewriter = MappingRewriter::new(self.client, self.timeout);
        let mapping = match rewriter
            .apply_to(&state, &self.plan.mapping_changes())
            .await
        {
            Ok(change) => change,
            Err(e) => return Err(self.fail(run_id, Step::Map, e, transitions)),
        };
        state.mappings = mapping.after.clone();
        state.version = mapping.version;
        transitions.push(ProvisionState::Mapped);
        self.reporter.on_step(&StepEvent::Mapped(&mapping));

        // -> Purged
        let purge = CacheInvalidator::new(self.client, self.timeout)
            .purge_for_change(&state, &mapping)
            .await;
        transitions.push(ProvisionState::Purged);
        self.reporter.on_step(&StepEvent::Purged(&purge));

        transitions.push(ProvisionState::Done);
        if purge.is_success() {
            info!("Provisioning complete");
        } else {
            error!(
                failed = purge.failed().count(),
                "Provisioning complete but some stores could not be purged"
            );
        }

        Ok(ProvisionSummary {
            run_id,
            registration,
            mapping,
            purge,
            transitions,
        })
    }

    fn fail(
        &self,
        run_id: Uuid,
        step: Step,
        error: ProvisionError,
        mut transitions: Vec<ProvisionState>,
    ) -> ProvisionFailure {
        let message = error.to_string();
        error!(%step, "Provisioning failed: {}", message);
        self.reporter.on_step(&StepEvent::Failed {
            step,
            error: &message,
        });
        transitions.push(ProvisionState::Failed);
        ProvisionFailure {
            run_id,
            step,
            error,
            transitions,
        }
    }
}
