//! 限流端到端测试：完整装配 AccountGate，验证各作用域的窗口语义

use std::sync::Arc;

use accountgate::config::{GateConfig, ThrottleConfig};
use accountgate::error::GateError;
use accountgate::infra::{ManualClock, MemoryCounterStore};
use accountgate::repository::MemoryAccountRepository;
use accountgate::service::{LogNotifier, RegisterRequest};
use accountgate::throttle::ThrottleActor;
use accountgate::AccountGate;

fn gate_with(throttle: ThrottleConfig) -> (AccountGate, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::from_system());
    let store = Arc::new(MemoryCounterStore::new(clock.clone()));
    let repo = Arc::new(MemoryAccountRepository::new());

    let mut config = GateConfig::default();
    config.token.signing_secret = "integration-test-secret-0123456789".to_string();
    config.throttle = throttle;

    let gate = AccountGate::new(config, store, repo, Arc::new(LogNotifier), clock.clone()).unwrap();
    (gate, clock)
}

fn register_form(username: &str, email: &str) -> RegisterRequest {
    RegisterRequest {
        username: username.to_string(),
        email: email.to_string(),
        full_name: "Test User".to_string(),
        password: "password".to_string(),
    }
}

async fn seed_account(gate: &AccountGate, username: &str, email: &str) {
    gate.auth
        .register(register_form(username, email), &ThrottleActor::anonymous("10.0.0.1"))
        .await
        .unwrap();
}

#[tokio::test]
async fn login_fail_quota_blocks_even_correct_credentials() {
    let (gate, _clock) = gate_with(ThrottleConfig {
        login_fail: Some("1/min".to_string()),
        ..ThrottleConfig::default()
    });
    seed_account(&gate, "mmcfly", "mmcfly@bttf.com").await;
    let actor = ThrottleActor::anonymous("10.0.0.1");

    // 第 1 次失败：放行并记录
    let err = gate.auth.login("mmcfly", "wrong", &actor).await.unwrap_err();
    assert!(matches!(err, GateError::Validation(_)));

    // 第 2 次失败（同窗口）：被限流
    let err = gate.auth.login("mmcfly", "wrong", &actor).await.unwrap_err();
    assert!(err.is_rate_limited());

    // 第 3 次用正确密码：配额已耗尽，照样被拒
    let err = gate.auth.login("mmcfly", "password", &actor).await.unwrap_err();
    assert!(err.is_rate_limited());
}

#[tokio::test]
async fn login_admitted_again_after_window() {
    let (gate, clock) = gate_with(ThrottleConfig {
        login_fail: Some("1/min".to_string()),
        ..ThrottleConfig::default()
    });
    seed_account(&gate, "mmcfly", "mmcfly@bttf.com").await;
    let actor = ThrottleActor::anonymous("10.0.0.1");

    gate.auth.login("mmcfly", "wrong", &actor).await.unwrap_err();
    assert!(gate
        .auth
        .login("mmcfly", "password", &actor)
        .await
        .unwrap_err()
        .is_rate_limited());

    clock.advance(chrono::Duration::seconds(61));

    let account = gate.auth.login("mmcfly", "password", &actor).await.unwrap();
    assert_eq!(account.username, "mmcfly");
}

#[tokio::test]
async fn successful_login_does_not_consume_fail_quota() {
    let (gate, _clock) = gate_with(ThrottleConfig {
        login_fail: Some("1/min".to_string()),
        ..ThrottleConfig::default()
    });
    seed_account(&gate, "mmcfly", "mmcfly@bttf.com").await;
    let actor = ThrottleActor::anonymous("10.0.0.1");

    // 连续成功登录不计入 failure-only 作用域
    for _ in 0..5 {
        gate.auth.login("mmcfly", "password", &actor).await.unwrap();
    }
    // 之后仍有完整的失败配额
    assert!(matches!(
        gate.auth.login("mmcfly", "wrong", &actor).await.unwrap_err(),
        GateError::Validation(_)
    ));
}

#[tokio::test]
async fn register_success_scope_is_global_across_callers() {
    let (gate, _clock) = gate_with(ThrottleConfig {
        register_success: Some("1/min".to_string()),
        ..ThrottleConfig::default()
    });

    // 第一次注册成功
    gate.auth
        .register(
            register_form("alice", "alice@example.com"),
            &ThrottleActor::anonymous("10.0.0.1"),
        )
        .await
        .unwrap();

    // 另一个调用方在同一窗口内注册：全局配额已耗尽
    let err = gate
        .auth
        .register(
            register_form("bob", "bob@example.com"),
            &ThrottleActor::anonymous("10.0.0.2"),
        )
        .await
        .unwrap_err();
    assert!(err.is_rate_limited());
}

#[tokio::test]
async fn failed_registration_does_not_consume_success_quota() {
    let (gate, _clock) = gate_with(ThrottleConfig {
        register_success: Some("1/min".to_string()),
        ..ThrottleConfig::default()
    });
    let actor = ThrottleActor::anonymous("10.0.0.1");

    // 用户名非法，注册失败，不计入 success-only 作用域
    let err = gate
        .auth
        .register(register_form("bad name", "x@example.com"), &actor)
        .await
        .unwrap_err();
    assert!(matches!(err, GateError::Validation(_)));

    // 成功注册仍然放行
    gate.auth
        .register(register_form("alice", "alice@example.com"), &actor)
        .await
        .unwrap();
}

#[tokio::test]
async fn rate_limited_error_carries_retry_after() {
    let (gate, clock) = gate_with(ThrottleConfig {
        login_fail: Some("1/min".to_string()),
        ..ThrottleConfig::default()
    });
    seed_account(&gate, "mmcfly", "mmcfly@bttf.com").await;
    let actor = ThrottleActor::anonymous("10.0.0.1");

    gate.auth.login("mmcfly", "wrong", &actor).await.unwrap_err();
    clock.advance(chrono::Duration::seconds(20));

    match gate.auth.login("mmcfly", "wrong", &actor).await.unwrap_err() {
        GateError::RateLimited { retry_after } => assert_eq!(retry_after, Some(40)),
        other => panic!("expected RateLimited, got {:?}", other),
    }
}

#[tokio::test]
async fn user_detail_scope_is_shared_across_readers() {
    let (gate, _clock) = gate_with(ThrottleConfig {
        user_detail: Some("2/min".to_string()),
        ..ThrottleConfig::default()
    });
    seed_account(&gate, "mmcfly", "mmcfly@bttf.com").await;

    let alice = ThrottleActor::user(10, "10.0.0.1");
    let bob = ThrottleActor::user(11, "10.0.0.2");

    gate.users.by_username("mmcfly", &alice).await.unwrap();
    gate.users.by_username("mmcfly", &bob).await.unwrap();

    // 全局配额耗尽，谁来都一样
    let err = gate.users.by_username("mmcfly", &alice).await.unwrap_err();
    assert!(err.is_rate_limited());
}

#[tokio::test]
async fn user_update_scope_is_per_actor() {
    let (gate, _clock) = gate_with(ThrottleConfig {
        user_update: Some("1/min".to_string()),
        ..ThrottleConfig::default()
    });
    seed_account(&gate, "alice", "alice@example.com").await;
    seed_account(&gate, "bob", "bob@example.com").await;

    let alice = ThrottleActor::user(1, "10.0.0.1");
    let bob = ThrottleActor::user(2, "10.0.0.1");

    let update = accountgate::service::ProfileUpdate {
        bio: Some("hello".to_string()),
        ..Default::default()
    };

    gate.users.partial_update(1, update.clone(), &alice).await.unwrap();
    assert!(gate
        .users
        .partial_update(1, update.clone(), &alice)
        .await
        .unwrap_err()
        .is_rate_limited());

    // 另一个操作者有独立配额
    gate.users.partial_update(2, update, &bob).await.unwrap();
}

#[tokio::test]
async fn whitelisted_source_is_exempt() {
    let (gate, _clock) = gate_with(ThrottleConfig {
        login_fail: Some("1/min".to_string()),
        whitelist: vec!["10.0.0.99".to_string()],
        ..ThrottleConfig::default()
    });
    seed_account(&gate, "mmcfly", "mmcfly@bttf.com").await;
    let trusted = ThrottleActor::anonymous("10.0.0.99");

    // 白名单身份怎么失败都不会被限流
    for _ in 0..5 {
        let err = gate.auth.login("mmcfly", "wrong", &trusted).await.unwrap_err();
        assert!(matches!(err, GateError::Validation(_)));
    }
}

#[tokio::test]
async fn disabled_scopes_never_throttle() {
    // 默认配置：所有作用域关闭
    let (gate, _clock) = gate_with(ThrottleConfig::default());
    seed_account(&gate, "mmcfly", "mmcfly@bttf.com").await;
    let actor = ThrottleActor::anonymous("10.0.0.1");

    for _ in 0..20 {
        let err = gate.auth.login("mmcfly", "wrong", &actor).await.unwrap_err();
        assert!(matches!(err, GateError::Validation(_)));
    }
}
