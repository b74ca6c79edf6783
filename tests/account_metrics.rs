use std::collections::HashMap;
use std::sync::Arc;

use metrics_util::debugging::{DebugValue, DebuggingRecorder};
use sqlx::PgPool;
use warbler::application::accounts::AccountService;
use warbler::application::messages::MessageService;
use warbler::domain::messages::MessageInput;
use warbler::domain::users::{LoginInput, SignupInput};
use warbler::infra::db::PostgresRepositories;

#[sqlx::test(migrations = "./migrations")]
async fn account_and_message_paths_emit_counters(pool: PgPool) {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let repos = Arc::new(PostgresRepositories::new(pool));
    let accounts = AccountService::new(repos.clone());
    let messages = MessageService::new(repos.clone(), repos.clone());

    let user = accounts
        .signup(SignupInput {
            username: "counted".to_string(),
            email: "counted@example.com".to_string(),
            password: "password".to_string(),
            image_url: None,
        })
        .await
        .expect("signup");

    let login = |password: &str| LoginInput {
        username: "counted".to_string(),
        password: password.to_string(),
    };
    assert!(accounts.authenticate(login("password")).await.expect("login").is_some());
    assert!(accounts.authenticate(login("wrong-pass")).await.expect("login").is_none());
    assert!(accounts.authenticate(login("wrong-again")).await.expect("login").is_none());

    let message = messages
        .post(
            &user,
            MessageInput {
                text: "counting".to_string(),
            },
        )
        .await
        .expect("post");
    messages.toggle_like(&user, message.id).await.expect("like");
    messages.toggle_like(&user, message.id).await.expect("unlike");

    let counters: HashMap<String, u64> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .filter_map(|(composite_key, _, _, value)| match value {
            DebugValue::Counter(count) => Some((composite_key.key().name().to_string(), count)),
            _ => None,
        })
        .collect();

    let expected = [
        ("warbler_signups_total", 1),
        ("warbler_logins_total", 1),
        ("warbler_login_failures_total", 2),
        ("warbler_messages_created_total", 1),
        ("warbler_likes_toggled_total", 2),
    ];
    for (metric, count) in expected {
        assert_eq!(counters.get(metric), Some(&count), "metric: {metric}");
    }
}
