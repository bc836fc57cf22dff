use crate::commands::{with_application, CommandResult};

/// Applies pending migrations. Bootstrapping already runs them, so a
/// successful bootstrap is the whole command.
pub fn run() -> CommandResult {
    with_application("migrate", |_app, _correlation_id| async {
        CommandResult::success("migrate", "applied pending migrations")
    })
}
