mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use common::{FakeReplier, FakeSynth, Harness, channel};
use ivr_relay::admin::AdminCommand;
use ivr_relay::message::InboundMessage;
use ivr_relay::rules::RuleStore;
use ivr_relay::worker::{Job, PipelineQueue};

const CHANNEL: i64 = -42;

fn harness_with_slow_synth() -> Harness {
    let mut h = Harness::new(vec![channel(CHANNEL, "ivr2:1/", None, true)]);
    h.synth = Arc::new(FakeSynth {
        delay: Some(Duration::from_millis(20)),
        ..FakeSynth::default()
    });
    h
}

#[tokio::test]
async fn jobs_run_one_at_a_time_in_order() {
    let h = harness_with_slow_synth();
    let replier = Arc::new(FakeReplier::default());
    let (queue, worker) = PipelineQueue::spawn(
        Arc::new(h.pipeline()),
        h.rules.clone(),
        replier.clone(),
        8,
    );

    let texts = ["אחת", "שתיים", "שלוש", "ארבע"];
    for text in texts {
        queue
            .submit(Job::Message(InboundMessage::text(CHANNEL, text)))
            .await
            .unwrap();
    }
    drop(queue);
    worker.await.unwrap();

    assert_eq!(h.synth.max_in_flight.load(Ordering::SeqCst), 1);
    assert_eq!(h.synth.calls(), texts.map(str::to_string).to_vec());
    let uploaded: Vec<String> = h.uploader.uploads().into_iter().map(|(_, c)| c).collect();
    assert_eq!(uploaded, texts.map(|t| format!("tts({t})")).to_vec());
    assert!(h.leftovers().is_empty());
}

#[tokio::test]
async fn admin_changes_apply_to_later_messages() {
    let h = harness_with_slow_synth();
    let replier = Arc::new(FakeReplier::default());
    let (queue, worker) = PipelineQueue::spawn(
        Arc::new(h.pipeline()),
        h.rules.clone(),
        replier.clone(),
        8,
    );

    queue
        .submit(Job::Admin {
            chat_id: 7,
            command: AdminCommand::AddWord("פרסומת".to_string()),
        })
        .await
        .unwrap();
    queue
        .submit(Job::Message(InboundMessage::text(CHANNEL, "חדשות פרסומת")))
        .await
        .unwrap();
    queue
        .submit(Job::Admin {
            chat_id: 7,
            command: AdminCommand::AddWord("פרסומת".to_string()),
        })
        .await
        .unwrap();
    drop(queue);
    worker.await.unwrap();

    assert_eq!(h.rules.load_blacklist().unwrap(), vec!["פרסומת".to_string()]);
    assert_eq!(h.synth.calls(), vec!["חדשות".to_string()]);

    let replies = replier.replies.lock().unwrap().clone();
    assert_eq!(
        replies,
        vec![
            (7, "המילה 'פרסומת' נוספה לרשימה השחורה.".to_string()),
            (7, "המילה כבר קיימת ברשימה.".to_string()),
        ]
    );
}

#[tokio::test]
async fn submit_fails_once_worker_is_gone() {
    let h = harness_with_slow_synth();
    let (queue, worker) = PipelineQueue::spawn(
        Arc::new(h.pipeline()),
        h.rules.clone(),
        Arc::new(FakeReplier::default()),
        1,
    );
    worker.abort();
    let _ = worker.await;

    let result = queue
        .submit(Job::Message(InboundMessage::text(CHANNEL, "x")))
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn shutdown_drains_pending_jobs() {
    let h = harness_with_slow_synth();
    let (queue, worker) = PipelineQueue::spawn(
        Arc::new(h.pipeline()),
        h.rules.clone(),
        Arc::new(FakeReplier::default()),
        4,
    );
    queue
        .submit(Job::Message(InboundMessage::text(CHANNEL, "אחרונה")))
        .await
        .unwrap();

    assert!(queue.shutdown(worker).await);
    assert_eq!(h.uploader.uploads().len(), 1);
}

#[tokio::test]
async fn shutdown_reports_a_worker_that_died() {
    let h = harness_with_slow_synth();
    let (queue, worker) = PipelineQueue::spawn(
        Arc::new(h.pipeline()),
        h.rules.clone(),
        Arc::new(FakeReplier::default()),
        1,
    );
    worker.abort();

    assert!(!queue.shutdown(worker).await);
}
