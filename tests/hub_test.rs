//! Hub 生命周期状态机集成测试

mod common;

use std::sync::Arc;
use std::time::Duration;

use chatrelay::core::Event;
use chatrelay::gateway::{ClientHandle, HubSnapshot, JOINED_MID_CONVERSATION};
use chatrelay::{ConversationEngine, EngineConfig, Hub, HubConfig, HubHandle};
use common::{ManualConnector, RecordingModel, SessionControl};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const TIMEOUT: Duration = Duration::from_secs(15);

struct Fixture {
    hub: HubHandle,
    opened: mpsc::UnboundedReceiver<SessionControl>,
    model: Arc<RecordingModel>,
    shutdown: CancellationToken,
}

fn fixture() -> Fixture {
    let (connector, opened) = ManualConnector::new();
    let model = RecordingModel::new();
    let engine = Arc::new(ConversationEngine::new(
        model.clone(),
        connector,
        EngineConfig {
            min_response_delta: Duration::from_secs(2),
            reply_min_tokens: 2,
            reply_max_tokens: 10,
            event_buffer: 64,
        },
    ));
    let config = HubConfig {
        stranger_timeout: TIMEOUT,
        max_recv: 200,
        prompt_min_tokens: 1,
        prompt_max_tokens: 3,
    };
    let shutdown = CancellationToken::new();
    let hub = Hub::spawn(config, engine, shutdown.clone());
    Fixture {
        hub,
        opened,
        model,
        shutdown,
    }
}

fn join(hub: &HubHandle, id: &str) -> mpsc::UnboundedReceiver<String> {
    let (client, rx) = ClientHandle::new(id);
    hub.register(client).unwrap();
    rx
}

fn wire(event: &Event) -> String {
    serde_json::to_string(event).unwrap()
}

async fn snapshot(hub: &HubHandle) -> HubSnapshot {
    hub.snapshot().await.unwrap()
}

/// 等待 Hub 处理完对话结束
async fn wait_idle_or_restarted(hub: &HubHandle, started: u64) -> HubSnapshot {
    for _ in 0..100 {
        let snap = snapshot(hub).await;
        if !snap.active || snap.conversations_started > started {
            return snap;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("conversation never ended");
}

#[tokio::test(start_paused = true)]
async fn test_first_client_starts_armed_conversation() {
    let mut f = fixture();
    let _a = join(&f.hub, "a");

    let snap = snapshot(&f.hub).await;
    assert_eq!(
        snap,
        HubSnapshot {
            clients: 1,
            active: true,
            armed_prompt: true,
            watchdog_running: false,
            conversations_started: 1,
        }
    );
    assert!(f.opened.try_recv().is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_late_joiner_alone_gets_info() {
    let mut f = fixture();
    let mut a = join(&f.hub, "a");
    let mut b = join(&f.hub, "b");

    assert_eq!(
        b.recv().await.unwrap(),
        r#"{"Kind":"info","Value":"<joined in the middle of a conversation>"}"#
    );
    assert_eq!(
        b.try_recv().ok(),
        None,
        "only one info message for the late joiner"
    );

    let snap = snapshot(&f.hub).await;
    assert_eq!(snap.clients, 2);
    assert_eq!(snap.conversations_started, 1);
    assert!(a.try_recv().is_err());

    // 中途加入不会开启第二个会话
    assert!(f.opened.try_recv().is_ok());
    assert!(f.opened.try_recv().is_err());
    assert!(JOINED_MID_CONVERSATION.contains("middle"));
}

#[tokio::test(start_paused = true)]
async fn test_events_broadcast_in_order_to_every_client() {
    let mut f = fixture();
    let mut a = join(&f.hub, "a");
    let mut b = join(&f.hub, "b");
    let control = f.opened.recv().await.unwrap();
    b.recv().await.unwrap(); // info

    let events = vec![
        Event::connected(),
        Event::got_message("hi"),
        Event::we_message("hello"),
        Event::got_message("bye"),
        Event::stranger_disconnected(),
    ];
    for e in &events {
        control.send(e.clone());
    }

    for rx in [&mut a, &mut b] {
        for e in &events {
            assert_eq!(rx.recv().await.unwrap(), wire(e));
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_silence_prompts_then_disconnects() {
    let mut f = fixture();
    let mut a = join(&f.hub, "a");
    let control = f.opened.recv().await.unwrap();

    control.send(Event::connected());
    a.recv().await.unwrap();
    assert!(snapshot(&f.hub).await.watchdog_running);

    // 15s：催促一句短消息
    tokio::time::sleep(TIMEOUT + Duration::from_millis(100)).await;
    assert_eq!(control.said(), vec!["reply to ''".to_string()]);
    assert_eq!(f.model.responds(), vec![(String::new(), 1, 3)]);
    let snap = snapshot(&f.hub).await;
    assert!(!snap.armed_prompt);
    assert!(snap.watchdog_running);
    assert_eq!(control.disconnects(), 0);

    // 30s：仍然沉默，请求断开
    tokio::time::sleep(TIMEOUT).await;
    assert_eq!(control.disconnects(), 1);
    assert_eq!(control.said().len(), 1);
    let snap = snapshot(&f.hub).await;
    assert!(!snap.watchdog_running);
    assert!(snap.active, "stop is advisory until the session ends");
}

#[tokio::test(start_paused = true)]
async fn test_got_message_rearms_after_prompt() {
    let mut f = fixture();
    let mut a = join(&f.hub, "a");
    let control = f.opened.recv().await.unwrap();

    control.send(Event::connected());
    a.recv().await.unwrap();
    tokio::time::sleep(TIMEOUT + Duration::from_millis(100)).await;
    assert!(!snapshot(&f.hub).await.armed_prompt);

    control.send(Event::got_message("oh hi"));
    a.recv().await.unwrap();
    assert!(snapshot(&f.hub).await.armed_prompt);

    // 重新计时：再过一个间隔是催促而不是断开
    tokio::time::sleep(TIMEOUT + Duration::from_millis(100)).await;
    assert_eq!(control.disconnects(), 0);
    assert!(!snapshot(&f.hub).await.armed_prompt);
}

#[tokio::test(start_paused = true)]
async fn test_bot_message_does_not_reset_watchdog() {
    let mut f = fixture();
    let mut a = join(&f.hub, "a");
    let control = f.opened.recv().await.unwrap();

    control.send(Event::connected());
    a.recv().await.unwrap();

    tokio::time::sleep(Duration::from_secs(10)).await;
    control.send(Event::we_message("anyone there?"));
    a.recv().await.unwrap();

    // 仍按 connected 的时间点到期
    tokio::time::sleep(Duration::from_secs(5) + Duration::from_millis(100)).await;
    assert_eq!(control.said().len(), 1);
    assert!(!snapshot(&f.hub).await.armed_prompt);
}

#[tokio::test(start_paused = true)]
async fn test_got_message_postpones_prompt() {
    let mut f = fixture();
    let mut a = join(&f.hub, "a");
    let control = f.opened.recv().await.unwrap();

    control.send(Event::connected());
    a.recv().await.unwrap();
    tokio::time::sleep(Duration::from_secs(10)).await;
    control.send(Event::got_message("still typing"));
    a.recv().await.unwrap();

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(f.model.responds().iter().all(|(seed, _, _)| !seed.is_empty()));
    assert!(snapshot(&f.hub).await.armed_prompt);

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert!(!snapshot(&f.hub).await.armed_prompt);
}

#[tokio::test(start_paused = true)]
async fn test_restarts_while_clients_remain() {
    let mut f = fixture();
    let mut a = join(&f.hub, "a");
    let first = f.opened.recv().await.unwrap();

    first.send(Event::stranger_disconnected());
    first.end();
    assert_eq!(a.recv().await.unwrap(), wire(&Event::stranger_disconnected()));

    let second = f.opened.recv().await.unwrap();
    let snap = wait_idle_or_restarted(&f.hub, 1).await;
    assert!(snap.active);
    assert!(snap.armed_prompt);
    assert_eq!(snap.conversations_started, 2);

    second.send(Event::connected());
    assert_eq!(a.recv().await.unwrap(), wire(&Event::connected()));
}

#[tokio::test(start_paused = true)]
async fn test_goes_idle_when_everyone_left() {
    let mut f = fixture();
    let mut a = join(&f.hub, "a");
    let first = f.opened.recv().await.unwrap();

    f.hub.unregister("a").unwrap();
    assert_eq!(a.recv().await, None, "queue closed on unregister");

    first.send(Event::we_disconnected());
    first.end();
    let snap = wait_idle_or_restarted(&f.hub, 1).await;
    assert_eq!(
        snap,
        HubSnapshot {
            clients: 0,
            active: false,
            armed_prompt: true,
            watchdog_running: false,
            conversations_started: 1,
        }
    );
    assert!(f.opened.try_recv().is_err(), "no restart without clients");

    // 新观察者到来才重新开始
    let _c = join(&f.hub, "c");
    let snap = snapshot(&f.hub).await;
    assert!(snap.active);
    assert_eq!(snap.conversations_started, 2);
    assert!(f.opened.recv().await.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_connect_failure_triggers_restart() {
    let (connector, mut opened) = ManualConnector::new();
    connector.fail_next("refused");
    let engine = Arc::new(ConversationEngine::new(
        RecordingModel::new(),
        connector,
        EngineConfig::default(),
    ));
    let hub = Hub::spawn(HubConfig::default(), engine, CancellationToken::new());

    let _a = join(&hub, "a");
    let _failed = opened.recv().await.unwrap();
    let _retry = opened.recv().await.unwrap();
    let snap = wait_idle_or_restarted(&hub, 1).await;
    assert_eq!(snap.conversations_started, 2);
    assert!(snap.active);
}

#[tokio::test(start_paused = true)]
async fn test_at_most_one_conversation_active() {
    let mut f = fixture();
    let _clients: Vec<_> = (0..5).map(|i| join(&f.hub, &format!("c{}", i))).collect();

    let snap = snapshot(&f.hub).await;
    assert_eq!(snap.clients, 5);
    assert_eq!(snap.conversations_started, 1);
    assert!(f.opened.try_recv().is_ok());
    assert!(f.opened.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_requests_stop_and_closes_queues() {
    let mut f = fixture();
    let mut a = join(&f.hub, "a");
    let control = f.opened.recv().await.unwrap();
    snapshot(&f.hub).await;

    f.shutdown.cancel();
    assert_eq!(a.recv().await, None);
    assert_eq!(control.disconnects(), 1);
    assert!(f.hub.snapshot().await.is_err());
}
