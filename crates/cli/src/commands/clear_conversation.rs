use std::sync::Arc;

use crate::commands::{prepare_storage, CommandResult};
use concierge_agent::SessionContextStore;
use concierge_core::domain::conversation::ConversationKey;
use concierge_core::resilience::ResiliencePolicies;
use concierge_db::{connect_with_settings, migrations, SqlSessionCache};

pub fn run(key: &str) -> CommandResult {
    let key = key.trim();
    if key.is_empty() {
        return CommandResult::failure(
            "clear-conversation",
            "invalid_argument",
            "conversation key must not be empty",
            2,
        );
    }

    let (config, runtime) = match prepare_storage("clear-conversation") {
        Ok(prepared) => prepared,
        Err(result) => return result,
    };

    let conversation_key = ConversationKey::new(key);
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

        let policies = ResiliencePolicies::from(&config.resilience);
        let store =
            SessionContextStore::new(Arc::new(SqlSessionCache::new(pool.clone())), policies.lookup);
        let cleared = store.clear_window(&conversation_key).await;
        pool.close().await;

        if cleared {
            Ok(())
        } else {
            Err(("session_store", "session store rejected the delete".to_owned(), 6u8))
        }
    });

    match result {
        Ok(()) => CommandResult::success(
            "clear-conversation",
            format!("cleared conversation window for {conversation_key}"),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("clear-conversation", error_class, message, exit_code)
        }
    }
}
