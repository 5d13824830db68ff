use chatorder_core::config::{AppConfig, ConfigOverrides, LoadOptions};
use chatorder_db::{connect_with_settings, migrations};

use crate::commands::CommandResult;

const COMMAND: &str = "migrate";

/// Applies pending migrations. `database_url` wins over file and environment.
pub fn run(database_url: Option<String>) -> CommandResult {
    let options = LoadOptions {
        overrides: ConfigOverrides { database_url, ..ConfigOverrides::default() },
        ..LoadOptions::default()
    };
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;
        let applied = migrations::applied_count(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;
        pool.close().await;
        Ok::<i64, (&'static str, String, u8)>(applied)
    });

    match result {
        Ok(applied) => CommandResult::success(
            COMMAND,
            format!("schema is current at `{}` ({applied} migrations applied)", config.database.url),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure(COMMAND, error_class, message, exit_code)
        }
    }
}
