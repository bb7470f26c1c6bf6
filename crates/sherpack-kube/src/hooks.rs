//! Improved hooks system with better policies and error handling
//!
//! Key improvements over Helm:
//! - Unique hook names per revision (prevents "already exists" errors)
//! - Configurable failure policies (fail, continue, rollback, retry)
//! - Better cleanup policies including "keep last N"
//! - "During" phase hooks (after resources created, before ready)
//! - Explicit timeouts

use chrono::{DateTime, Duration, Utc};
use kube::api::{Api, DeleteParams, DynamicObject, ListParams};
use kube::discovery::Discovery;
use serde::{Deserialize, Serialize};

use crate::resources::ResourceManager;

const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by=sherpack";
const HOOK_POLL_INTERVAL_SECS: u64 = 2;

/// Hook execution phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum HookPhase {
    /// Before installation begins
    PreInstall,
    /// After resources created, before they're ready
    DuringInstall,
    /// After installation completes successfully
    PostInstall,

    /// Before upgrade begins
    PreUpgrade,
    /// After new resources created, before ready
    DuringUpgrade,
    /// After upgrade completes successfully
    PostUpgrade,

    /// Before rollback begins
    PreRollback,
    /// After rollback completes
    PostRollback,

    /// Before uninstall begins
    PreDelete,
    /// After uninstall completes
    PostDelete,

    /// Test hooks (run on demand)
    Test,
}

impl HookPhase {
    /// Get all phases for an install operation
    pub fn install_phases() -> &'static [HookPhase] {
        &[
            HookPhase::PreInstall,
            HookPhase::DuringInstall,
            HookPhase::PostInstall,
        ]
    }

    /// Get all phases for an upgrade operation
    pub fn upgrade_phases() -> &'static [HookPhase] {
        &[
            HookPhase::PreUpgrade,
            HookPhase::DuringUpgrade,
            HookPhase::PostUpgrade,
        ]
    }

    /// Get all phases for a rollback operation
    pub fn rollback_phases() -> &'static [HookPhase] {
        &[HookPhase::PreRollback, HookPhase::PostRollback]
    }

    /// Get all phases for an uninstall operation
    pub fn delete_phases() -> &'static [HookPhase] {
        &[HookPhase::PreDelete, HookPhase::PostDelete]
    }

    /// Is this a "pre" phase (before the operation)?
    pub fn is_pre(&self) -> bool {
        matches!(
            self,
            HookPhase::PreInstall
                | HookPhase::PreUpgrade
                | HookPhase::PreRollback
                | HookPhase::PreDelete
        )
    }

    /// Is this a "post" phase (after the operation)?
    pub fn is_post(&self) -> bool {
        matches!(
            self,
            HookPhase::PostInstall
                | HookPhase::PostUpgrade
                | HookPhase::PostRollback
                | HookPhase::PostDelete
        )
    }

    /// Is this a "during" phase?
    pub fn is_during(&self) -> bool {
        matches!(self, HookPhase::DuringInstall | HookPhase::DuringUpgrade)
    }
}

impl std::fmt::Display for HookPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HookPhase::PreInstall => "pre-install",
            HookPhase::DuringInstall => "during-install",
            HookPhase::PostInstall => "post-install",
            HookPhase::PreUpgrade => "pre-upgrade",
            HookPhase::DuringUpgrade => "during-upgrade",
            HookPhase::PostUpgrade => "post-upgrade",
            HookPhase::PreRollback => "pre-rollback",
            HookPhase::PostRollback => "post-rollback",
            HookPhase::PreDelete => "pre-delete",
            HookPhase::PostDelete => "post-delete",
            HookPhase::Test => "test",
        };
        write!(f, "{}", s)
    }
}

/// Hook definition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hook {
    /// Hook name (used to generate unique resource names)
    pub name: String,

    /// Phases when this hook should run
    pub phases: Vec<HookPhase>,

    /// The Kubernetes resource to create (as YAML)
    pub resource: String,

    /// Weight for ordering (lower = runs first)
    #[serde(default)]
    pub weight: i32,

    /// What to do if the hook fails
    #[serde(default)]
    pub on_failure: HookFailurePolicy,

    /// Timeout for hook execution
    #[serde(default = "default_hook_timeout")]
    #[serde(with = "duration_serde")]
    pub timeout: Duration,

    /// Cleanup policy after hook completes
    #[serde(default)]
    pub cleanup: HookCleanupPolicy,

    /// When to capture and record the hook resource's logs
    #[serde(default)]
    pub output_log_policy: OutputLogPolicy,
}

fn default_hook_timeout() -> Duration {
    Duration::minutes(5)
}

impl Hook {
    /// Generate a unique resource name for this hook
    ///
    /// Format: {release}-{hook_name}-{phase}-{revision}
    /// This prevents "already exists" errors that plague Helm
    pub fn unique_name(&self, release: &str, phase: HookPhase, revision: u32) -> String {
        format!("{}-{}-{}-v{}", release, self.name, phase, revision)
    }

    /// Check if this hook should run for a given phase
    pub fn runs_in_phase(&self, phase: HookPhase) -> bool {
        self.phases.contains(&phase)
    }
}

/// What to do when a hook fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HookFailurePolicy {
    /// Fail the entire operation (default for pre-* hooks)
    #[default]
    FailOperation,

    /// Log the error but continue (default for post-* hooks)
    Continue,

    /// Automatically rollback the operation
    Rollback,

    /// Retry the hook N times before failing
    Retry {
        max_attempts: u32,
        #[serde(default = "default_retry_backoff")]
        #[serde(with = "duration_serde")]
        backoff: Duration,
    },
}

fn default_retry_backoff() -> Duration {
    Duration::seconds(5)
}

/// When to clean up hook resources
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HookCleanupPolicy {
    /// Never delete the hook resource
    Never,

    /// Delete before the next run of this hook (Helm's before-hook-creation)
    #[default]
    BeforeNextRun,

    /// Delete immediately after successful completion
    OnSuccess,

    /// Delete immediately after the hook fails (Helm's hook-failed)
    OnFailure,

    /// Delete after a delay (useful for debugging)
    AfterDelay(#[serde(with = "duration_serde")] Duration),

    /// Keep the last N executions (useful for auditing)
    KeepLast(u32),
}

/// When to capture and record a hook resource's logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputLogPolicy {
    /// Never fetch hook output
    #[default]
    Never,

    /// Fetch and record output only when the hook fails
    OnFailed,

    /// Fetch and record output only when the hook succeeds
    OnSucceeded,

    /// Fetch and record output on both outcomes
    Always,
}

impl OutputLogPolicy {
    fn captures_on_success(self) -> bool {
        matches!(self, OutputLogPolicy::OnSucceeded | OutputLogPolicy::Always)
    }

    fn captures_on_failure(self) -> bool {
        matches!(self, OutputLogPolicy::OnFailed | OutputLogPolicy::Always)
    }
}

/// Result of executing a hook
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookResult {
    /// Hook name
    pub name: String,

    /// Phase it ran in
    pub phase: HookPhase,

    /// Whether it succeeded
    pub success: bool,

    /// Error message if failed
    pub error: Option<String>,

    /// When execution started
    pub started_at: DateTime<Utc>,

    /// When execution completed
    pub completed_at: DateTime<Utc>,

    /// Number of retry attempts
    pub attempts: u32,

    /// Captured hook resource output, recorded per `output_log_policy`
    #[serde(default)]
    pub output_log: Option<String>,
}

impl HookResult {
    /// Create a successful result
    pub fn success(name: String, phase: HookPhase, started_at: DateTime<Utc>) -> Self {
        Self {
            name,
            phase,
            success: true,
            error: None,
            started_at,
            completed_at: Utc::now(),
            attempts: 1,
            output_log: None,
        }
    }

    /// Create a failed result
    pub fn failure(
        name: String,
        phase: HookPhase,
        error: String,
        started_at: DateTime<Utc>,
        attempts: u32,
    ) -> Self {
        Self {
            name,
            phase,
            success: false,
            error: Some(error),
            started_at,
            completed_at: Utc::now(),
            attempts,
            output_log: None,
        }
    }

    /// Attach captured hook output to this result
    pub fn with_output_log(mut self, output_log: Option<String>) -> Self {
        self.output_log = output_log;
        self
    }

    /// Duration of execution
    pub fn duration(&self) -> Duration {
        self.completed_at.signed_duration_since(self.started_at)
    }
}

/// Hook executor for running hooks against a Kubernetes cluster
pub struct HookExecutor {
    /// Results of executed hooks
    pub results: Vec<HookResult>,
}

impl HookExecutor {
    /// Create a new hook executor
    pub fn new() -> Self {
        Self {
            results: Vec::new(),
        }
    }

    /// Execute all hooks for a given phase
    ///
    /// Returns Ok(()) if all hooks succeeded or were configured to continue on failure.
    /// Returns Err if any hook failed with FailOperation policy.
    pub async fn execute_phase(
        &mut self,
        hooks: &[Hook],
        phase: HookPhase,
        release_name: &str,
        revision: u32,
        namespace: &str,
        client: &kube::Client,
    ) -> crate::Result<()> {
        // Filter and sort hooks for this phase
        let mut phase_hooks: Vec<&Hook> = hooks
            .iter()
            .filter(|h| h.runs_in_phase(phase))
            .collect();

        phase_hooks.sort_by_key(|h| h.weight);

        for hook in phase_hooks {
            let started_at = Utc::now();
            let unique_name = hook.unique_name(release_name, phase, revision);

            let result = self
                .execute_single_hook(
                    hook,
                    &unique_name,
                    phase,
                    started_at,
                    release_name,
                    namespace,
                    client,
                )
                .await;

            match result {
                Ok(r) => self.results.push(r),
                Err(e) => {
                    let error_msg = e.to_string();
                    match hook.on_failure {
                        HookFailurePolicy::FailOperation => {
                            self.results.push(HookResult::failure(
                                hook.name.clone(),
                                phase,
                                error_msg.clone(),
                                started_at,
                                1,
                            ));
                            return Err(crate::KubeError::HookFailed {
                                hook_name: hook.name.clone(),
                                phase: phase.to_string(),
                                message: error_msg,
                            });
                        }
                        HookFailurePolicy::Continue => {
                            self.results.push(HookResult::failure(
                                hook.name.clone(),
                                phase,
                                error_msg,
                                started_at,
                                1,
                            ));
                            // Continue to next hook
                        }
                        HookFailurePolicy::Rollback => {
                            self.results.push(HookResult::failure(
                                hook.name.clone(),
                                phase,
                                error_msg.clone(),
                                started_at,
                                1,
                            ));
                            return Err(crate::KubeError::HookFailed {
                                hook_name: hook.name.clone(),
                                phase: phase.to_string(),
                                message: format!("{} (triggering rollback)", error_msg),
                            });
                        }
                        HookFailurePolicy::Retry { max_attempts, backoff } => {
                            let mut attempts = 1;
                            #[allow(unused_assignments)]
                            let mut last_error = error_msg; // Initial error that triggered retry

                            while attempts < max_attempts {
                                tokio::time::sleep(backoff.to_std().unwrap_or_default()).await;
                                attempts += 1;

                                match self
                                    .execute_single_hook(
                                        hook,
                                        &unique_name,
                                        phase,
                                        started_at,
                                        release_name,
                                        namespace,
                                        client,
                                    )
                                    .await
                                {
                                    Ok(r) => {
                                        let mut success_result = r;
                                        success_result.attempts = attempts;
                                        self.results.push(success_result);
                                        break;
                                    }
                                    Err(e) => {
                                        last_error = e.to_string();
                                        if attempts >= max_attempts {
                                            self.results.push(HookResult::failure(
                                                hook.name.clone(),
                                                phase,
                                                last_error.clone(),
                                                started_at,
                                                attempts,
                                            ));
                                            return Err(crate::KubeError::HookFailed {
                                                hook_name: hook.name.clone(),
                                                phase: phase.to_string(),
                                                message: format!(
                                                    "{} (after {} attempts)",
                                                    last_error, attempts
                                                ),
                                            });
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Execute a single hook: apply its resource, wait for Job/Pod completion,
    /// then clean it up according to `hook.cleanup`.
    async fn execute_single_hook(
        &self,
        hook: &Hook,
        unique_name: &str,
        phase: HookPhase,
        started_at: DateTime<Utc>,
        release_name: &str,
        namespace: &str,
        client: &kube::Client,
    ) -> crate::Result<HookResult> {
        let mut doc: serde_yaml::Value = serde_yaml::from_str(&hook.resource).map_err(|e| {
            crate::KubeError::InvalidConfig(format!(
                "hook '{}' resource is not valid YAML: {}",
                hook.name, e
            ))
        })?;

        let kind = doc
            .get("kind")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        let label_selector = hook_label_selector(release_name, &hook.name, phase);
        stamp_hook_metadata(&mut doc, unique_name, release_name, &hook.name, phase);

        if hook.cleanup == HookCleanupPolicy::BeforeNextRun {
            self.delete_matching(client, namespace, &label_selector, Some(unique_name))
                .await;
        }

        let manifest = serde_yaml::to_string(&doc).map_err(|e| {
            crate::KubeError::Serialization(format!(
                "failed to serialize hook '{}': {}",
                hook.name, e
            ))
        })?;

        let outcome = self
            .apply_and_wait(&manifest, &kind, unique_name, namespace, hook, client)
            .await;

        match outcome {
            Ok(()) => {
                let output_log = if hook.output_log_policy.captures_on_success() {
                    fetch_hook_logs(client, namespace, &kind, unique_name).await
                } else {
                    None
                };

                self.cleanup_after_success(
                    client,
                    namespace,
                    hook,
                    unique_name,
                    &label_selector,
                    &manifest,
                )
                .await;

                Ok(HookResult::success(hook.name.clone(), phase, started_at)
                    .with_output_log(output_log))
            }
            Err(message) => {
                let output_log = if hook.output_log_policy.captures_on_failure() {
                    fetch_hook_logs(client, namespace, &kind, unique_name).await
                } else {
                    None
                };

                if hook.cleanup == HookCleanupPolicy::OnFailure {
                    self.delete_matching(client, namespace, &label_selector, None)
                        .await;
                }

                let message = match &output_log {
                    Some(log) => format!(
                        "{}\n--- hook '{}' output ---\n{}",
                        message,
                        unique_name,
                        log.trim_end()
                    ),
                    None => message,
                };

                Err(crate::KubeError::HookFailed {
                    hook_name: hook.name.clone(),
                    phase: phase.to_string(),
                    message,
                })
            }
        }
    }

    /// Apply the hook's resource and wait for it to become ready, returning a
    /// plain error message on failure (the caller decides cleanup/logging).
    async fn apply_and_wait(
        &self,
        manifest: &str,
        kind: &str,
        unique_name: &str,
        namespace: &str,
        hook: &Hook,
        client: &kube::Client,
    ) -> std::result::Result<(), String> {
        let manager = ResourceManager::new(client.clone())
            .await
            .map_err(|e| format!("discovery failed: {}", e))?;

        let apply_summary = manager
            .apply_manifest(namespace, manifest, false)
            .await
            .map_err(|e| e.to_string())?;

        if !apply_summary.is_success() {
            return Err(apply_summary.summary());
        }

        let wait_result = match kind {
            "Job" => {
                wait_for_job(client, namespace, unique_name, hook.timeout.to_std().ok()).await
            }
            "Pod" => {
                wait_for_pod(client, namespace, unique_name, hook.timeout.to_std().ok()).await
            }
            _ => Ok(()),
        };

        wait_result.map_err(|e| e.to_string())
    }

    /// Apply the hook's cleanup policy once the hook has succeeded.
    async fn cleanup_after_success(
        &self,
        client: &kube::Client,
        namespace: &str,
        hook: &Hook,
        unique_name: &str,
        label_selector: &str,
        manifest: &str,
    ) {
        match &hook.cleanup {
            HookCleanupPolicy::Never | HookCleanupPolicy::BeforeNextRun => {}
            // OnFailure only deletes when the hook fails; a successful run leaves it in place.
            HookCleanupPolicy::OnFailure => {}
            HookCleanupPolicy::OnSuccess => {
                if let Ok(manager) = ResourceManager::new(client.clone()).await {
                    let _ = manager.delete_manifest(namespace, manifest, false).await;
                }
            }
            HookCleanupPolicy::AfterDelay(delay) => {
                let client = client.clone();
                let namespace = namespace.to_string();
                let manifest = manifest.to_string();
                let std_delay = delay.to_std().unwrap_or_default();
                tokio::spawn(async move {
                    tokio::time::sleep(std_delay).await;
                    if let Ok(manager) = ResourceManager::new(client).await {
                        let _ = manager.delete_manifest(&namespace, &manifest, false).await;
                    }
                });
            }
            HookCleanupPolicy::KeepLast(n) => {
                self.enforce_keep_last(client, namespace, label_selector, *n)
                    .await;
                let _ = unique_name;
            }
        }
    }

    /// Delete every hook resource matching `label_selector`, optionally keeping
    /// one name exempt (used to protect the resource just created).
    async fn delete_matching(
        &self,
        client: &kube::Client,
        namespace: &str,
        label_selector: &str,
        keep: Option<&str>,
    ) {
        let discovery = match Discovery::new(client.clone()).run().await {
            Ok(d) => d,
            Err(_) => return,
        };

        for group in discovery.groups() {
            for (ar, caps) in group.recommended_resources() {
                if caps.scope != kube::discovery::Scope::Namespaced {
                    continue;
                }
                let api: Api<DynamicObject> =
                    Api::namespaced_with(client.clone(), namespace, &ar);
                let lp = ListParams::default().labels(label_selector);
                let Ok(list) = api.list(&lp).await else {
                    continue;
                };
                for obj in list.items {
                    let Some(name) = obj.metadata.name.clone() else {
                        continue;
                    };
                    if Some(name.as_str()) == keep {
                        continue;
                    }
                    let _ = api.delete(&name, &DeleteParams::default()).await;
                }
            }
        }
    }

    /// Keep only the `n` most recently created resources matching `label_selector`,
    /// deleting the rest (oldest first).
    async fn enforce_keep_last(
        &self,
        client: &kube::Client,
        namespace: &str,
        label_selector: &str,
        n: u32,
    ) {
        let discovery = match Discovery::new(client.clone()).run().await {
            Ok(d) => d,
            Err(_) => return,
        };

        for group in discovery.groups() {
            for (ar, caps) in group.recommended_resources() {
                if caps.scope != kube::discovery::Scope::Namespaced {
                    continue;
                }
                let api: Api<DynamicObject> =
                    Api::namespaced_with(client.clone(), namespace, &ar);
                let lp = ListParams::default().labels(label_selector);
                let Ok(mut list) = api.list(&lp).await else {
                    continue;
                };
                if list.items.len() <= n as usize {
                    continue;
                }
                list.items.sort_by_key(|o| {
                    o.metadata
                        .creation_timestamp
                        .as_ref()
                        .map(|t| t.0)
                        .unwrap_or_default()
                });
                let overflow = list.items.len() - n as usize;
                for obj in list.items.into_iter().take(overflow) {
                    if let Some(name) = obj.metadata.name {
                        let _ = api.delete(&name, &DeleteParams::default()).await;
                    }
                }
            }
        }
    }

    /// Get all results for a phase
    pub fn results_for_phase(&self, phase: HookPhase) -> Vec<&HookResult> {
        self.results.iter().filter(|r| r.phase == phase).collect()
    }

    /// Check if any hooks failed
    pub fn has_failures(&self) -> bool {
        self.results.iter().any(|r| !r.success)
    }

    /// Get all failed hooks
    pub fn failures(&self) -> Vec<&HookResult> {
        self.results.iter().filter(|r| !r.success).collect()
    }
}

impl Default for HookExecutor {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse hooks from template annotations
pub fn parse_hooks_from_manifest(manifest: &str) -> Vec<Hook> {
    let mut hooks = Vec::new();

    // Split manifest into documents
    for doc in manifest.split("---") {
        let doc = doc.trim();
        if doc.is_empty() {
            continue;
        }

        // Parse as YAML
        let yaml: serde_yaml::Value = match serde_yaml::from_str(doc) {
            Ok(v) => v,
            Err(_) => continue,
        };

        // Check for hook annotations
        let annotations = yaml
            .get("metadata")
            .and_then(|m| m.get("annotations"))
            .and_then(|a| a.as_mapping());

        if let Some(annotations) = annotations {
            // Check for sherpack.io/hook or helm.sh/hook (for compatibility)
            let hook_phases: Option<Vec<HookPhase>> = annotations
                .get(&serde_yaml::Value::String("sherpack.io/hook".to_string()))
                .or_else(|| {
                    annotations.get(&serde_yaml::Value::String("helm.sh/hook".to_string()))
                })
                .and_then(|v| v.as_str())
                .map(|s| parse_hook_phases(s));

            if let Some(phases) = hook_phases {
                let name = yaml
                    .get("metadata")
                    .and_then(|m| m.get("name"))
                    .and_then(|n| n.as_str())
                    .unwrap_or("unnamed-hook")
                    .to_string();

                let weight = annotations
                    .get(&serde_yaml::Value::String("sherpack.io/hook-weight".to_string()))
                    .or_else(|| {
                        annotations
                            .get(&serde_yaml::Value::String("helm.sh/hook-weight".to_string()))
                    })
                    .and_then(|v| v.as_str())
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0);

                let cleanup = annotations
                    .get(&serde_yaml::Value::String(
                        "sherpack.io/hook-delete-policy".to_string(),
                    ))
                    .or_else(|| {
                        annotations.get(&serde_yaml::Value::String(
                            "helm.sh/hook-delete-policy".to_string(),
                        ))
                    })
                    .and_then(|v| v.as_str())
                    .map(parse_cleanup_policy)
                    .unwrap_or_default();

                let output_log_policy = annotations
                    .get(&serde_yaml::Value::String(
                        "sherpack.io/hook-output-log-policy".to_string(),
                    ))
                    .and_then(|v| v.as_str())
                    .map(parse_output_log_policy)
                    .unwrap_or_default();

                hooks.push(Hook {
                    name,
                    phases,
                    resource: doc.to_string(),
                    weight,
                    on_failure: HookFailurePolicy::default(),
                    timeout: default_hook_timeout(),
                    cleanup,
                    output_log_policy,
                });
            }
        }
    }

    hooks
}

/// Parse comma-separated hook phases
fn parse_hook_phases(s: &str) -> Vec<HookPhase> {
    s.split(',')
        .filter_map(|p| match p.trim() {
            "pre-install" => Some(HookPhase::PreInstall),
            "during-install" => Some(HookPhase::DuringInstall),
            "post-install" => Some(HookPhase::PostInstall),
            "pre-upgrade" => Some(HookPhase::PreUpgrade),
            "during-upgrade" => Some(HookPhase::DuringUpgrade),
            "post-upgrade" => Some(HookPhase::PostUpgrade),
            "pre-rollback" => Some(HookPhase::PreRollback),
            "post-rollback" => Some(HookPhase::PostRollback),
            "pre-delete" => Some(HookPhase::PreDelete),
            "post-delete" => Some(HookPhase::PostDelete),
            "test" | "test-success" => Some(HookPhase::Test),
            _ => None,
        })
        .collect()
}

/// Parse hook cleanup policy
fn parse_cleanup_policy(s: &str) -> HookCleanupPolicy {
    match s.trim() {
        "before-hook-creation" => HookCleanupPolicy::BeforeNextRun,
        "hook-succeeded" => HookCleanupPolicy::OnSuccess,
        "hook-failed" => HookCleanupPolicy::OnFailure,
        _ => HookCleanupPolicy::default(),
    }
}

/// Parse hook output-log policy
fn parse_output_log_policy(s: &str) -> OutputLogPolicy {
    match s.trim() {
        "on-failed" => OutputLogPolicy::OnFailed,
        "on-succeeded" => OutputLogPolicy::OnSucceeded,
        "always" | "both" => OutputLogPolicy::Always,
        _ => OutputLogPolicy::default(),
    }
}

/// Build the label selector used to find a hook's own resources across revisions.
fn hook_label_selector(release_name: &str, hook_name: &str, phase: HookPhase) -> String {
    format!(
        "{},sherpack.io/release={},sherpack.io/hook={},sherpack.io/hook-phase={}",
        MANAGED_BY_LABEL, release_name, hook_name, phase
    )
}

/// Set `metadata.name` and tracking labels on a hook's resource document in place.
fn stamp_hook_metadata(
    doc: &mut serde_yaml::Value,
    unique_name: &str,
    release_name: &str,
    hook_name: &str,
    phase: HookPhase,
) {
    let metadata = doc
        .as_mapping_mut()
        .and_then(|m| {
            m.entry(serde_yaml::Value::String("metadata".to_string()))
                .or_insert_with(|| serde_yaml::Value::Mapping(serde_yaml::Mapping::new()))
                .as_mapping_mut()
        });

    let Some(metadata) = metadata else { return };

    metadata.insert(
        serde_yaml::Value::String("name".to_string()),
        serde_yaml::Value::String(unique_name.to_string()),
    );

    let labels = metadata
        .entry(serde_yaml::Value::String("labels".to_string()))
        .or_insert_with(|| serde_yaml::Value::Mapping(serde_yaml::Mapping::new()))
        .as_mapping_mut();

    if let Some(labels) = labels {
        for (k, v) in [
            ("app.kubernetes.io/managed-by", "sherpack"),
            ("sherpack.io/release", release_name),
            ("sherpack.io/hook", hook_name),
        ] {
            labels.insert(
                serde_yaml::Value::String(k.to_string()),
                serde_yaml::Value::String(v.to_string()),
            );
        }
        labels.insert(
            serde_yaml::Value::String("sherpack.io/hook-phase".to_string()),
            serde_yaml::Value::String(phase.to_string()),
        );
    }
}

/// Poll a Job until it reports completion, failure, or `timeout` elapses.
async fn wait_for_job(
    client: &kube::Client,
    namespace: &str,
    name: &str,
    timeout: Option<std::time::Duration>,
) -> crate::Result<()> {
    use k8s_openapi::api::batch::v1::Job;

    let api: Api<Job> = Api::namespaced(client.clone(), namespace);
    let deadline = timeout.map(|t| std::time::Instant::now() + t);

    loop {
        let job = api.get(name).await.map_err(crate::KubeError::Api)?;
        if let Some(status) = &job.status {
            if status.succeeded.unwrap_or(0) > 0 {
                return Ok(());
            }
            if status.failed.unwrap_or(0) > 0 {
                return Err(crate::KubeError::HookFailed {
                    hook_name: name.to_string(),
                    phase: "hook".to_string(),
                    message: "job reported failed pod(s)".to_string(),
                });
            }
        }

        if let Some(deadline) = deadline {
            if std::time::Instant::now() >= deadline {
                return Err(crate::KubeError::Timeout(format!(
                    "job '{}' did not complete in time",
                    name
                )));
            }
        }

        tokio::time::sleep(std::time::Duration::from_secs(HOOK_POLL_INTERVAL_SECS)).await;
    }
}

/// Poll a Pod until it reports completion, failure, or `timeout` elapses.
async fn wait_for_pod(
    client: &kube::Client,
    namespace: &str,
    name: &str,
    timeout: Option<std::time::Duration>,
) -> crate::Result<()> {
    use k8s_openapi::api::core::v1::Pod;

    let api: Api<Pod> = Api::namespaced(client.clone(), namespace);
    let deadline = timeout.map(|t| std::time::Instant::now() + t);

    loop {
        let pod = api.get(name).await.map_err(crate::KubeError::Api)?;
        let phase = pod.status.as_ref().and_then(|s| s.phase.as_deref());

        match phase {
            Some("Succeeded") => return Ok(()),
            Some("Failed") => {
                return Err(crate::KubeError::HookFailed {
                    hook_name: name.to_string(),
                    phase: "hook".to_string(),
                    message: "pod phase is Failed".to_string(),
                });
            }
            _ => {}
        }

        if let Some(deadline) = deadline {
            if std::time::Instant::now() >= deadline {
                return Err(crate::KubeError::Timeout(format!(
                    "pod '{}' did not complete in time",
                    name
                )));
            }
        }

        tokio::time::sleep(std::time::Duration::from_secs(HOOK_POLL_INTERVAL_SECS)).await;
    }
}

/// Fetch the hook resource's logs for recording per `output_log_policy`.
///
/// For a `Pod` hook, reads the pod's own logs. For a `Job` hook, reads logs
/// from every pod the job owns (identified by the `job-name` label Kubernetes
/// sets automatically) and concatenates them with a header per pod. Other
/// kinds have no log stream and return `None`.
async fn fetch_hook_logs(
    client: &kube::Client,
    namespace: &str,
    kind: &str,
    name: &str,
) -> Option<String> {
    use k8s_openapi::api::core::v1::Pod;

    let log_params = kube::api::LogParams::default();
    let pods: Api<Pod> = Api::namespaced(client.clone(), namespace);

    match kind {
        "Pod" => pods.logs(name, &log_params).await.ok(),
        "Job" => {
            let lp = ListParams::default().labels(&format!("job-name={}", name));
            let list = pods.list(&lp).await.ok()?;
            let mut combined = String::new();
            for pod in list.items {
                let Some(pod_name) = pod.metadata.name else {
                    continue;
                };
                if let Ok(log) = pods.logs(&pod_name, &log_params).await {
                    combined.push_str(&format!("--- {} ---\n", pod_name));
                    combined.push_str(&log);
                    if !combined.ends_with('\n') {
                        combined.push('\n');
                    }
                }
            }
            if combined.is_empty() {
                None
            } else {
                Some(combined)
            }
        }
        _ => None,
    }
}

/// Serialization helper for chrono::Duration
mod duration_serde {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.num_seconds().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let seconds = i64::deserialize(deserializer)?;
        Ok(Duration::seconds(seconds))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_hook(name: &str, phases: Vec<HookPhase>) -> Hook {
        Hook {
            name: name.to_string(),
            phases,
            resource: "apiVersion: batch/v1\nkind: Job".to_string(),
            weight: 0,
            on_failure: HookFailurePolicy::default(),
            timeout: default_hook_timeout(),
            cleanup: HookCleanupPolicy::default(),
            output_log_policy: OutputLogPolicy::default(),
        }
    }

    #[test]
    fn test_unique_hook_name() {
        let hook = test_hook("migrate-db", vec![HookPhase::PreUpgrade]);

        let name = hook.unique_name("myapp", HookPhase::PreUpgrade, 5);
        assert_eq!(name, "myapp-migrate-db-pre-upgrade-v5");
    }

    #[test]
    fn test_unique_hook_name_different_phases() {
        let hook = test_hook("backup", vec![HookPhase::PreDelete]);

        assert_eq!(
            hook.unique_name("release", HookPhase::PreDelete, 1),
            "release-backup-pre-delete-v1"
        );
        assert_eq!(
            hook.unique_name("release", HookPhase::PreInstall, 3),
            "release-backup-pre-install-v3"
        );
    }

    #[test]
    fn test_parse_hook_phases() {
        let phases = parse_hook_phases("pre-install,post-install,pre-upgrade");
        assert_eq!(
            phases,
            vec![
                HookPhase::PreInstall,
                HookPhase::PostInstall,
                HookPhase::PreUpgrade
            ]
        );
    }

    #[test]
    fn test_parse_hook_phases_with_spaces() {
        let phases = parse_hook_phases("pre-install, post-install, pre-upgrade");
        assert_eq!(phases.len(), 3);
    }

    #[test]
    fn test_parse_hook_phases_invalid() {
        let phases = parse_hook_phases("invalid-phase,also-invalid");
        assert!(phases.is_empty());
    }

    #[test]
    fn test_parse_hook_phases_all() {
        let phases = parse_hook_phases(
            "pre-install,during-install,post-install,pre-upgrade,during-upgrade,post-upgrade,pre-rollback,post-rollback,pre-delete,post-delete,test"
        );
        assert_eq!(phases.len(), 11);
    }

    #[test]
    fn test_parse_hooks_from_manifest() {
        let manifest = r#"
apiVersion: batch/v1
kind: Job
metadata:
  name: db-migration
  annotations:
    sherpack.io/hook: pre-upgrade
    sherpack.io/hook-weight: "-5"
    sherpack.io/hook-delete-policy: before-hook-creation
spec:
  template:
    spec:
      containers:
      - name: migrate
        image: myapp:migrate
"#;

        let hooks = parse_hooks_from_manifest(manifest);
        assert_eq!(hooks.len(), 1);

        let hook = &hooks[0];
        assert_eq!(hook.name, "db-migration");
        assert_eq!(hook.phases, vec![HookPhase::PreUpgrade]);
        assert_eq!(hook.weight, -5);
        assert_eq!(hook.cleanup, HookCleanupPolicy::BeforeNextRun);
    }

    #[test]
    fn test_parse_multiple_hooks() {
        let manifest = r#"
---
apiVersion: batch/v1
kind: Job
metadata:
  name: pre-hook
  annotations:
    sherpack.io/hook: pre-install
spec:
  template:
    spec:
      containers:
      - name: pre
        image: pre:latest
---
apiVersion: batch/v1
kind: Job
metadata:
  name: post-hook
  annotations:
    sherpack.io/hook: post-install
spec:
  template:
    spec:
      containers:
      - name: post
        image: post:latest
"#;

        let hooks = parse_hooks_from_manifest(manifest);
        assert_eq!(hooks.len(), 2);
        assert_eq!(hooks[0].name, "pre-hook");
        assert_eq!(hooks[1].name, "post-hook");
    }

    #[test]
    fn test_helm_compatibility() {
        let manifest = r#"
apiVersion: batch/v1
kind: Job
metadata:
  name: test-job
  annotations:
    helm.sh/hook: test-success
    helm.sh/hook-weight: "0"
spec:
  template:
    spec:
      containers:
      - name: test
        image: test:latest
"#;

        let hooks = parse_hooks_from_manifest(manifest);
        assert_eq!(hooks.len(), 1);
        assert_eq!(hooks[0].phases, vec![HookPhase::Test]);
    }

    #[test]
    fn test_hook_phase_is_pre() {
        assert!(HookPhase::PreInstall.is_pre());
        assert!(HookPhase::PreUpgrade.is_pre());
        assert!(HookPhase::PreRollback.is_pre());
        assert!(HookPhase::PreDelete.is_pre());
        assert!(!HookPhase::PostInstall.is_pre());
        assert!(!HookPhase::DuringInstall.is_pre());
    }

    #[test]
    fn test_hook_phase_is_post() {
        assert!(HookPhase::PostInstall.is_post());
        assert!(HookPhase::PostUpgrade.is_post());
        assert!(HookPhase::PostRollback.is_post());
        assert!(HookPhase::PostDelete.is_post());
        assert!(!HookPhase::PreInstall.is_post());
        assert!(!HookPhase::DuringInstall.is_post());
    }

    #[test]
    fn test_hook_phase_is_during() {
        assert!(HookPhase::DuringInstall.is_during());
        assert!(HookPhase::DuringUpgrade.is_during());
        assert!(!HookPhase::PreInstall.is_during());
        assert!(!HookPhase::PostInstall.is_during());
    }

    #[test]
    fn test_hook_phases_lists() {
        assert_eq!(HookPhase::install_phases().len(), 3);
        assert_eq!(HookPhase::upgrade_phases().len(), 3);
        assert_eq!(HookPhase::rollback_phases().len(), 2);
        assert_eq!(HookPhase::delete_phases().len(), 2);
    }

    #[test]
    fn test_hook_runs_in_phase() {
        let hook = test_hook("test", vec![HookPhase::PreInstall, HookPhase::PreUpgrade]);

        assert!(hook.runs_in_phase(HookPhase::PreInstall));
        assert!(hook.runs_in_phase(HookPhase::PreUpgrade));
        assert!(!hook.runs_in_phase(HookPhase::PostInstall));
    }

    #[test]
    fn test_hook_phase_display() {
        assert_eq!(HookPhase::PreInstall.to_string(), "pre-install");
        assert_eq!(HookPhase::DuringInstall.to_string(), "during-install");
        assert_eq!(HookPhase::PostUpgrade.to_string(), "post-upgrade");
        assert_eq!(HookPhase::Test.to_string(), "test");
    }

    #[test]
    fn test_hook_result_success() {
        let started = Utc::now();
        let result = HookResult::success("my-hook".to_string(), HookPhase::PreInstall, started);

        assert!(result.success);
        assert!(result.error.is_none());
        assert_eq!(result.attempts, 1);
        assert!(result.duration().num_milliseconds() >= 0);
    }

    #[test]
    fn test_hook_result_failure() {
        let started = Utc::now();
        let result = HookResult::failure(
            "my-hook".to_string(),
            HookPhase::PreInstall,
            "Connection refused".to_string(),
            started,
            3,
        );

        assert!(!result.success);
        assert_eq!(result.error, Some("Connection refused".to_string()));
        assert_eq!(result.attempts, 3);
    }

    #[test]
    fn test_hook_executor_new() {
        let executor = HookExecutor::new();
        assert!(executor.results.is_empty());
        assert!(!executor.has_failures());
    }

    #[test]
    fn test_hook_executor_results_for_phase() {
        let mut executor = HookExecutor::new();
        executor.results.push(HookResult::success(
            "hook1".to_string(),
            HookPhase::PreInstall,
            Utc::now(),
        ));
        executor.results.push(HookResult::success(
            "hook2".to_string(),
            HookPhase::PostInstall,
            Utc::now(),
        ));
        executor.results.push(HookResult::success(
            "hook3".to_string(),
            HookPhase::PreInstall,
            Utc::now(),
        ));

        let pre_results = executor.results_for_phase(HookPhase::PreInstall);
        assert_eq!(pre_results.len(), 2);

        let post_results = executor.results_for_phase(HookPhase::PostInstall);
        assert_eq!(post_results.len(), 1);
    }

    #[test]
    fn test_hook_executor_failures() {
        let mut executor = HookExecutor::new();
        executor.results.push(HookResult::success(
            "hook1".to_string(),
            HookPhase::PreInstall,
            Utc::now(),
        ));
        executor.results.push(HookResult::failure(
            "hook2".to_string(),
            HookPhase::PreInstall,
            "Error".to_string(),
            Utc::now(),
            1,
        ));

        assert!(executor.has_failures());
        assert_eq!(executor.failures().len(), 1);
        assert_eq!(executor.failures()[0].name, "hook2");
    }

    #[test]
    fn test_cleanup_policy_parsing() {
        assert_eq!(
            parse_cleanup_policy("before-hook-creation"),
            HookCleanupPolicy::BeforeNextRun
        );
        assert_eq!(
            parse_cleanup_policy("hook-succeeded"),
            HookCleanupPolicy::OnSuccess
        );
        assert_eq!(
            parse_cleanup_policy("hook-failed"),
            HookCleanupPolicy::OnFailure
        );
        assert_eq!(
            parse_cleanup_policy("unknown"),
            HookCleanupPolicy::default()
        );
    }

    #[test]
    fn test_output_log_policy_parsing() {
        assert_eq!(
            parse_output_log_policy("on-failed"),
            OutputLogPolicy::OnFailed
        );
        assert_eq!(
            parse_output_log_policy("on-succeeded"),
            OutputLogPolicy::OnSucceeded
        );
        assert_eq!(parse_output_log_policy("always"), OutputLogPolicy::Always);
        assert_eq!(parse_output_log_policy("both"), OutputLogPolicy::Always);
        assert_eq!(
            parse_output_log_policy("unknown"),
            OutputLogPolicy::default()
        );
        assert_eq!(OutputLogPolicy::default(), OutputLogPolicy::Never);
    }

    #[test]
    fn test_output_log_policy_captures() {
        assert!(OutputLogPolicy::OnFailed.captures_on_failure());
        assert!(!OutputLogPolicy::OnFailed.captures_on_success());
        assert!(OutputLogPolicy::OnSucceeded.captures_on_success());
        assert!(!OutputLogPolicy::OnSucceeded.captures_on_failure());
        assert!(OutputLogPolicy::Always.captures_on_success());
        assert!(OutputLogPolicy::Always.captures_on_failure());
        assert!(!OutputLogPolicy::Never.captures_on_success());
        assert!(!OutputLogPolicy::Never.captures_on_failure());
    }

    #[test]
    fn test_hook_failure_policy_default() {
        assert!(matches!(
            HookFailurePolicy::default(),
            HookFailurePolicy::FailOperation
        ));
    }

    #[test]
    fn test_hook_serialization() {
        let hook = Hook {
            name: "test".to_string(),
            phases: vec![HookPhase::PreInstall],
            resource: "apiVersion: v1".to_string(),
            weight: -5,
            on_failure: HookFailurePolicy::Retry {
                max_attempts: 3,
                backoff: Duration::seconds(10),
            },
            timeout: Duration::minutes(2),
            cleanup: HookCleanupPolicy::KeepLast(3),
            output_log_policy: OutputLogPolicy::OnFailed,
        };

        let json = serde_json::to_string(&hook).unwrap();
        let deserialized: Hook = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized.name, "test");
        assert_eq!(deserialized.weight, -5);
        assert!(matches!(
            deserialized.on_failure,
            HookFailurePolicy::Retry { max_attempts: 3, .. }
        ));
    }

    #[test]
    fn test_parse_empty_manifest() {
        let hooks = parse_hooks_from_manifest("");
        assert!(hooks.is_empty());
    }

    #[test]
    fn test_parse_manifest_without_hooks() {
        let manifest = r#"
apiVersion: v1
kind: ConfigMap
metadata:
  name: my-config
data:
  key: value
"#;
        let hooks = parse_hooks_from_manifest(manifest);
        assert!(hooks.is_empty());
    }

    #[tokio::test]
    async fn test_hook_executor_execute_phase_empty() {
        let mut executor = HookExecutor::new();
        let client = kube::Client::try_default().await.ok();

        // Skip if no cluster available
        if let Some(client) = client {
            let result = executor
                .execute_phase(&[], HookPhase::PreInstall, "test", 1, "default", &client)
                .await;
            assert!(result.is_ok());
            assert!(executor.results.is_empty());
        }
    }
}
