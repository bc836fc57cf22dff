pub mod approval;
pub mod config;
pub mod confirm;
pub mod migrate;
pub mod policy;
pub mod seed;
pub mod views;

use std::future::Future;

use serde::Serialize;
use serde_json::Value;
use tracing::Instrument;

use salesgate_core::config::LoadOptions;
use salesgate_core::domain::actor::Actor;
use salesgate_core::errors::ApplicationError;
use salesgate_workflow::{bootstrap, Application, BootstrapError};

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self::success_with_data(command, message, None)
    }

    pub fn success_with_data(
        command: &str,
        message: impl Into<String>,
        data: Option<Value>,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            data,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        Self::failure_with_data(command, error_class, message, exit_code, None)
    }

    pub fn failure_with_data(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
        data: Option<Value>,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            data,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    /// Business rule blocks exit with 1; infrastructure failures use the
    /// same codes as bootstrap failures.
    pub fn from_application_error(
        command: &str,
        error: ApplicationError,
        correlation_id: &str,
    ) -> Self {
        Self::from_application_error_with_data(command, error, correlation_id, None)
    }

    pub fn from_application_error_with_data(
        command: &str,
        error: ApplicationError,
        correlation_id: &str,
        data: Option<Value>,
    ) -> Self {
        let error_class = error.kind();
        let exit_code = match &error {
            ApplicationError::Persistence(_) => 4,
            ApplicationError::Configuration(_) => 2,
            _ => 1,
        };
        let interface = error.into_interface(correlation_id);
        Self::failure_with_data(command, error_class, interface.message(), exit_code, data)
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

pub(crate) fn to_data<T: Serialize>(value: &T) -> Option<Value> {
    serde_json::to_value(value).ok()
}

/// Identity the command acts as.
#[derive(Debug, Clone, clap::Args)]
pub struct ActorArgs {
    #[arg(long, default_value = "operator", help = "User id recorded on approval requests")]
    pub user: String,
    #[arg(long = "role", help = "Role held by the user; repeat for several roles")]
    pub roles: Vec<String>,
}

impl ActorArgs {
    pub fn actor(&self) -> Actor {
        self.roles.iter().fold(Actor::new(self.user.clone()), |actor, role| actor.with_role(role))
    }
}

impl Default for ActorArgs {
    fn default() -> Self {
        Self { user: "operator".to_string(), roles: Vec::new() }
    }
}

/// Bootstraps the application on a fresh current-thread runtime and runs
/// `work` against it inside a span carrying a new correlation id.
pub(crate) fn with_application<F, Fut>(command: &'static str, work: F) -> CommandResult
where
    F: FnOnce(Application, String) -> Fut,
    Fut: Future<Output = CommandResult>,
{
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                command,
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let correlation_id = uuid::Uuid::new_v4().to_string();
    let span = tracing::info_span!("command", command, correlation_id = %correlation_id);

    runtime.block_on(
        async move {
            let app = match bootstrap(LoadOptions::default()).await {
                Ok(app) => app,
                Err(error) => return bootstrap_failure(command, error, &correlation_id),
            };
            let pool = app.db_pool.clone();
            let result = work(app, correlation_id).await;
            pool.close().await;
            result
        }
        .instrument(span),
    )
}

fn bootstrap_failure(command: &str, error: BootstrapError, correlation_id: &str) -> CommandResult {
    match error {
        BootstrapError::Config(error) => CommandResult::from_application_error(
            command,
            ApplicationError::Configuration(format!("configuration issue: {error}")),
            correlation_id,
        ),
        BootstrapError::DatabaseConnect(error) => {
            CommandResult::failure(command, "db_connectivity", error.to_string(), 4)
        }
        BootstrapError::Migration(error) => {
            CommandResult::failure(command, "migration", error.to_string(), 5)
        }
    }
}
