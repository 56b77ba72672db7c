//! 消费循环集成测试
//!
//! 使用脚本化的 RecordSource 模拟 broker，验证退避、无限重试和关闭语义。

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use notify_shared::error::NotifyError;
use notify_shared::kafka::{ConsumerLoop, ConsumerStats, QueueRecord, RecordSource};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_test::assert_ok;

const BACKOFF: Duration = Duration::from_secs(5);

/// 按脚本依次返回结果，脚本耗尽后永久挂起（模拟没有新消息）
///
/// 每次被调用时把调用时刻发送给测试，便于断言退避间隔。
struct ScriptedSource {
    script: VecDeque<Result<QueueRecord, NotifyError>>,
    calls: mpsc::UnboundedSender<Instant>,
}

impl ScriptedSource {
    fn new(
        script: Vec<Result<QueueRecord, NotifyError>>,
    ) -> (Self, mpsc::UnboundedReceiver<Instant>) {
        let (calls, rx) = mpsc::unbounded_channel();
        (
            Self {
                script: script.into(),
                calls,
            },
            rx,
        )
    }
}

#[async_trait]
impl RecordSource for ScriptedSource {
    async fn next_record(&mut self) -> Result<QueueRecord, NotifyError> {
        let _ = self.calls.send(Instant::now());
        match self.script.pop_front() {
            Some(result) => result,
            None => std::future::pending().await,
        }
    }
}

fn record(offset: i64, payload: &str) -> QueueRecord {
    QueueRecord {
        topic: "notifications".to_string(),
        partition: 0,
        offset,
        key: None,
        payload: payload.as_bytes().to_vec(),
        timestamp: None,
        headers: HashMap::new(),
    }
}

fn read_error() -> NotifyError {
    NotifyError::Kafka("Broker transport failure".to_string())
}

#[tokio::test(start_paused = true)]
async fn test_records_logged_in_order_without_delay() {
    let (source, mut calls) = ScriptedSource::new(vec![
        Ok(record(0, r#"{"to":"+15551234567","body":"a"}"#)),
        Ok(record(1, r#"{"to":"+15551234567","body":"b"}"#)),
        Ok(record(2, "not json at all")),
    ]);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let start = Instant::now();
    let handle = tokio::spawn(ConsumerLoop::new("sms-service", source, BACKOFF).run(shutdown_rx));

    // 三条消息 + 第四次挂起的读取
    for _ in 0..4 {
        let at = calls.recv().await.unwrap();
        assert_eq!(at, start, "成功读取后应立即请求下一条");
    }

    shutdown_tx.send(true).unwrap();
    let stats = handle.await.unwrap();
    assert_eq!(
        stats,
        ConsumerStats {
            records: 3,
            read_errors: 0
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_read_error_backs_off_then_retries() {
    let (source, mut calls) =
        ScriptedSource::new(vec![Err(read_error()), Ok(record(7, "hello"))]);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let handle = tokio::spawn(ConsumerLoop::new("sms-service", source, BACKOFF).run(shutdown_rx));

    let first = calls.recv().await.unwrap();
    let second = calls.recv().await.unwrap();
    assert!(
        second - first >= BACKOFF,
        "读取失败后应等待退避时间再重试，实际间隔 {:?}",
        second - first
    );

    let third = calls.recv().await.unwrap();
    assert_eq!(third, second, "成功读取后不应再退避");

    shutdown_tx.send(true).unwrap();
    let stats = handle.await.unwrap();
    assert_eq!(stats.records, 1);
    assert_eq!(stats.read_errors, 1);
}

#[tokio::test(start_paused = true)]
async fn test_retries_indefinitely_on_repeated_errors() {
    let script = (0..20).map(|_| Err(read_error())).collect();
    let (source, mut calls) = ScriptedSource::new(script);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let handle = tokio::spawn(ConsumerLoop::new("sms-service", source, BACKOFF).run(shutdown_rx));

    let first = calls.recv().await.unwrap();
    let mut last = first;
    for _ in 0..20 {
        last = calls.recv().await.unwrap();
    }
    assert!(last - first >= BACKOFF * 20);
    assert!(!handle.is_finished(), "连续失败不应导致循环退出");

    shutdown_tx.send(true).unwrap();
    let stats = handle.await.unwrap();
    assert_eq!(stats.read_errors, 20);
    assert_eq!(stats.records, 0);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_during_backoff_exits_promptly() {
    let (source, mut calls) = ScriptedSource::new(vec![Err(read_error())]);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let start = Instant::now();
    let handle = tokio::spawn(ConsumerLoop::new("sms-service", source, BACKOFF).run(shutdown_rx));

    calls.recv().await.unwrap();
    shutdown_tx.send(true).unwrap();

    let stats = handle.await.unwrap();
    assert!(start.elapsed() < BACKOFF, "退避期间收到关闭信号应立即退出");
    assert_eq!(stats.read_errors, 1);
}

#[tokio::test]
async fn test_shutdown_before_start_reads_nothing() {
    let (source, mut calls) = ScriptedSource::new(vec![Ok(record(0, "never read"))]);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    assert_ok!(shutdown_tx.send(true));

    let stats = ConsumerLoop::new("sms-service", source, BACKOFF)
        .run(shutdown_rx)
        .await;

    assert_eq!(stats, ConsumerStats::default());
    assert!(calls.try_recv().is_err(), "关闭后不应再读取");
}

#[tokio::test]
async fn test_sender_dropped_stops_loop() {
    let (source, _calls) = ScriptedSource::new(vec![]);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let handle = tokio::spawn(ConsumerLoop::new("sms-service", source, BACKOFF).run(shutdown_rx));
    drop(shutdown_tx);

    let stats = handle.await.unwrap();
    assert_eq!(stats.records, 0);
}
