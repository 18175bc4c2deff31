//! Queue consumer lifecycle, ordering, failure reporting, the poll loop,
//! and the snapshot side channel.

mod support;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use plancast_core::{
    BuildPlan, ElementKind, ElementNode, ItemStatus, QueueItemDraft, QueueItemRecord, StyleDef,
};
use plancast_runtime::{
    CollectionStore, ConsumerConfig, MemoryCanvas, MemoryStore, PlanExecutor, QueueConsumer,
    SnapshotResponder, TickOutcome,
};

use support::FlakyStore;

const SITE: &str = "s1";

fn hero_plan_json(section: &str) -> String {
    BuildPlan::new(
        SITE,
        section,
        1,
        ElementNode::new(ElementKind::Section, "hero-section").with_child(
            ElementNode::new(ElementKind::Heading, "hero-h1")
                .with_heading_level(1)
                .with_text("Welcome"),
        ),
    )
    .with_style(StyleDef::new("hero-section").with_property("padding-top", "80px"))
    .to_json()
    .expect("should serialize")
}

async fn enqueue(store: &dyn CollectionStore, name: &str, order: i64, plan: String) -> String {
    store
        .create_item(
            SITE,
            QueueItemDraft {
                name: name.to_string(),
                plan,
                order,
            },
        )
        .await
        .expect("should create")
        .id
}

fn consumer(
    store: Arc<dyn CollectionStore>,
    canvas: Arc<MemoryCanvas>,
) -> QueueConsumer {
    QueueConsumer::new(
        store,
        PlanExecutor::new(canvas),
        ConsumerConfig::new(SITE),
    )
}

#[tokio::test]
async fn test_idle_when_nothing_is_pending() {
    let store = Arc::new(MemoryStore::new());
    let consumer = consumer(Arc::clone(&store) as _, Arc::new(MemoryCanvas::new()));

    let outcome = consumer.process_next().await.expect("should tick");
    assert!(matches!(outcome, TickOutcome::Idle));
}

#[tokio::test]
async fn test_processes_lowest_order_first() {
    support::init_tracing();
    let store = Arc::new(MemoryStore::new());
    let third = enqueue(store.as_ref(), "third", 3, hero_plan_json("third")).await;
    let first = enqueue(store.as_ref(), "first", 1, hero_plan_json("first")).await;
    let second = enqueue(store.as_ref(), "second", 2, hero_plan_json("second")).await;

    let consumer = consumer(Arc::clone(&store) as _, Arc::new(MemoryCanvas::new()));
    let outcome = consumer.process_next().await.expect("should tick");

    let TickOutcome::Processed { item_id, result } = outcome else {
        panic!("expected a processed item");
    };
    assert_eq!(item_id, first);
    assert!(result.success);

    let by_id = |records: &[QueueItemRecord], id: &str| {
        records
            .iter()
            .find(|record| record.id == id)
            .expect("item present")
            .status
    };
    let items = store.list_items(SITE).await.expect("should list");
    assert_eq!(by_id(&items, &first), ItemStatus::Done);
    assert_eq!(by_id(&items, &second), ItemStatus::Pending);
    assert_eq!(by_id(&items, &third), ItemStatus::Pending);
}

#[tokio::test]
async fn test_one_item_per_tick() {
    let store = Arc::new(MemoryStore::new());
    enqueue(store.as_ref(), "a", 1, hero_plan_json("a")).await;
    enqueue(store.as_ref(), "b", 2, hero_plan_json("b")).await;

    let canvas = Arc::new(MemoryCanvas::new());
    let consumer = consumer(Arc::clone(&store) as _, Arc::clone(&canvas));

    consumer.process_next().await.expect("first tick");
    assert_eq!(canvas.element_count(), 2);

    consumer.process_next().await.expect("second tick");
    assert_eq!(canvas.element_count(), 4);

    let outcome = consumer.process_next().await.expect("third tick");
    assert!(matches!(outcome, TickOutcome::Idle));
}

#[tokio::test]
async fn test_observer_sees_building_then_done() {
    let store = Arc::new(MemoryStore::new());
    let item = enqueue(store.as_ref(), "hero", 1, hero_plan_json("hero")).await;

    let seen: Arc<Mutex<Vec<ItemStatus>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let observed_id = item.clone();
    let consumer = consumer(Arc::clone(&store) as _, Arc::new(MemoryCanvas::new()))
        .with_items_observer(Box::new(move |records| {
            if let Some(record) = records.iter().find(|record| record.id == observed_id) {
                sink.lock().expect("lock").push(record.status);
            }
        }));

    consumer.process_next().await.expect("should tick");

    let seen = seen.lock().expect("lock");
    assert_eq!(*seen, vec![ItemStatus::Building, ItemStatus::Done]);
}

#[tokio::test]
async fn test_malformed_payload_marks_item_error() {
    let store = Arc::new(MemoryStore::new());
    let item = enqueue(store.as_ref(), "broken", 1, "not json at all".to_string()).await;

    let canvas = Arc::new(MemoryCanvas::new());
    let consumer = consumer(Arc::clone(&store) as _, Arc::clone(&canvas));
    let outcome = consumer.process_next().await.expect("should tick");

    let TickOutcome::Processed { result, .. } = outcome else {
        panic!("expected a processed item");
    };
    assert!(!result.success);
    assert_eq!(canvas.element_count(), 0);

    let items = store.list_items(SITE).await.expect("should list");
    let record = items.iter().find(|record| record.id == item).expect("item");
    assert_eq!(record.status, ItemStatus::Error);
    assert!(record
        .error_message
        .as_deref()
        .expect("should carry message")
        .contains("could not parse plan payload"));
}

#[tokio::test]
async fn test_invalid_plan_message_lands_on_the_item() {
    let store = Arc::new(MemoryStore::new());
    let mut plan = BuildPlan::from_json(&hero_plan_json("hero")).expect("should parse");
    plan.order = Some(0);
    let item = enqueue(
        store.as_ref(),
        "bad-order",
        1,
        plan.to_json().expect("should serialize"),
    )
    .await;

    let consumer = consumer(Arc::clone(&store) as _, Arc::new(MemoryCanvas::new()));
    consumer.process_next().await.expect("should tick");

    let items = store.list_items(SITE).await.expect("should list");
    let record = items.iter().find(|record| record.id == item).expect("item");
    assert_eq!(record.status, ItemStatus::Error);
    assert_eq!(
        record.error_message.as_deref(),
        Some("order must be a positive integer")
    );
}

#[tokio::test]
async fn test_terminal_write_failure_never_masks_the_result() {
    let inner = Arc::new(MemoryStore::new());
    let item = enqueue(inner.as_ref(), "hero", 1, hero_plan_json("hero")).await;
    let store = Arc::new(FlakyStore::new(Arc::clone(&inner)));
    store.fail_terminal_writes();

    let consumer = consumer(Arc::clone(&store) as _, Arc::new(MemoryCanvas::new()));
    let outcome = consumer.process_next().await.expect("should tick");

    // The build succeeded and the caller learns that, even though the
    // done-write never landed.
    let TickOutcome::Processed { result, .. } = outcome else {
        panic!("expected a processed item");
    };
    assert!(result.success);

    let items = inner.list_items(SITE).await.expect("should list");
    let record = items.iter().find(|record| record.id == item).expect("item");
    assert_eq!(record.status, ItemStatus::Building);
}

#[tokio::test]
async fn test_store_failure_reaches_the_error_observer() {
    let store = Arc::new(FlakyStore::new(Arc::new(MemoryStore::new())));
    store.fail_list();

    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&errors);
    let consumer = consumer(Arc::clone(&store) as _, Arc::new(MemoryCanvas::new()))
        .with_error_observer(Box::new(move |error| {
            sink.lock().expect("lock").push(error.to_string());
        }));

    consumer.tick().await;

    let errors = errors.lock().expect("lock");
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("queue store error"));
}

#[tokio::test]
async fn test_poll_loop_drains_and_stops_cooperatively() {
    let store = Arc::new(MemoryStore::new());
    enqueue(store.as_ref(), "hero", 1, hero_plan_json("hero")).await;

    let canvas = Arc::new(MemoryCanvas::new());
    let consumer = Arc::new(
        QueueConsumer::new(
            Arc::clone(&store) as _,
            PlanExecutor::new(Arc::clone(&canvas) as _),
            ConsumerConfig::new(SITE).with_poll_interval(Duration::from_millis(20)),
        ),
    );

    let handle = Arc::clone(&consumer).spawn();
    tokio::time::sleep(Duration::from_millis(60)).await;

    // The immediate first tick processed the item.
    assert_eq!(canvas.element_count(), 2);

    handle.stop();
    handle.join().await.expect("should stop");

    // New work enqueued after stop is never picked up.
    enqueue(store.as_ref(), "late", 1, hero_plan_json("late")).await;
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(canvas.element_count(), 2);

    let items = store.list_items(SITE).await.expect("should list");
    assert_eq!(items[1].status, ItemStatus::Pending);
}

#[tokio::test]
async fn test_snapshot_request_is_serviced_on_the_tick() {
    let store = Arc::new(MemoryStore::new());
    enqueue(store.as_ref(), "hero", 1, hero_plan_json("hero")).await;

    let canvas = Arc::new(MemoryCanvas::new());
    let responder = Arc::new(SnapshotResponder::new(Arc::clone(&canvas) as _));
    let consumer = QueueConsumer::new(
        Arc::clone(&store) as _,
        PlanExecutor::new(Arc::clone(&canvas) as _),
        ConsumerConfig::new(SITE),
    )
    .with_snapshots(Arc::clone(&responder));

    // First tick: snapshot of the empty canvas, then the hero build.
    responder.request(SITE);
    consumer.tick().await;
    let payload = responder.poll(SITE).expect("should have snapshot");
    assert!(payload.summary.contains("styles: (none)"));

    // Second tick: the snapshot now reflects the built section.
    responder.request(SITE);
    consumer.tick().await;
    let payload = responder.poll(SITE).expect("should have snapshot");
    assert!(payload.summary.contains("- section.hero-section"));
    assert!(payload.summary.contains("\"Welcome\""));
    assert!(payload.summary.contains("styles: hero-section"));
}
