use std::time::Duration;

use harvester_core::task_queue::TaskQueue;
use harvester_db::PgTaskQueue;
use harvester_db::task_queue_repository::DEFAULT_VISIBILITY_TIMEOUT;

use crate::integration::common::setup_test_db;

const URL: &str = "https://www.olx.uz/d/obyavlenie/kvartira-ID4a2ig.html";

#[tokio::test]
async fn publish_and_claim() {
    let (pool, _container) = setup_test_db().await;
    let queue = PgTaskQueue::new(pool, "post");

    let published = queue.publish(URL).await.unwrap();
    assert_eq!(published.body, URL);
    assert_eq!(published.delivery_count, 0);
    assert_eq!(queue.depth().await.unwrap(), 1);

    let delivery = queue
        .next_delivery("consumer-1")
        .await
        .unwrap()
        .expect("Should claim the message");
    assert_eq!(delivery.id, published.id);
    assert_eq!(delivery.delivery_count, 1);
    assert_eq!(queue.depth().await.unwrap(), 0);
    assert_eq!(queue.in_flight().await.unwrap(), 1);
}

#[tokio::test]
async fn empty_queue_returns_none() {
    let (pool, _container) = setup_test_db().await;
    let queue = PgTaskQueue::new(pool, "post");

    assert!(queue.next_delivery("consumer-1").await.unwrap().is_none());
}

#[tokio::test]
async fn claimed_message_is_not_handed_out_twice() {
    let (pool, _container) = setup_test_db().await;
    let queue = PgTaskQueue::new(pool, "post");
    queue.publish(URL).await.unwrap();

    assert!(queue.next_delivery("consumer-1").await.unwrap().is_some());
    assert!(queue.next_delivery("consumer-2").await.unwrap().is_none());
}

#[tokio::test]
async fn concurrent_claims_are_disjoint() {
    let (pool, _container) = setup_test_db().await;
    let queue = PgTaskQueue::new(pool, "post");
    for i in 0..4 {
        queue.publish(&format!("{URL}?n={i}")).await.unwrap();
    }

    let (a, b) = tokio::join!(queue.next_delivery("a"), queue.next_delivery("b"));
    let (a, b) = (a.unwrap().unwrap(), b.unwrap().unwrap());

    assert_ne!(a.id, b.id);
    assert_eq!(queue.depth().await.unwrap(), 2);
}

#[tokio::test]
async fn delivery_order_is_fifo() {
    let (pool, _container) = setup_test_db().await;
    let queue = PgTaskQueue::new(pool, "post");
    let first = queue.publish("https://www.olx.uz/1").await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    queue.publish("https://www.olx.uz/2").await.unwrap();

    let delivery = queue.next_delivery("c").await.unwrap().unwrap();
    assert_eq!(delivery.id, first.id);
}

#[tokio::test]
async fn ack_removes_message() {
    let (pool, _container) = setup_test_db().await;
    let queue = PgTaskQueue::new(pool, "post");
    queue.publish(URL).await.unwrap();

    let delivery = queue.next_delivery("c").await.unwrap().unwrap();
    queue.ack(delivery.id).await.unwrap();

    assert_eq!(queue.depth().await.unwrap(), 0);
    assert_eq!(queue.in_flight().await.unwrap(), 0);
    assert!(queue.next_delivery("c").await.unwrap().is_none());
}

#[tokio::test]
async fn nack_with_requeue_redelivers() {
    let (pool, _container) = setup_test_db().await;
    let queue = PgTaskQueue::new(pool, "post");
    queue.publish(URL).await.unwrap();

    let first = queue.next_delivery("c").await.unwrap().unwrap();
    queue.nack(first.id, true).await.unwrap();
    assert_eq!(queue.depth().await.unwrap(), 1);

    let second = queue.next_delivery("c").await.unwrap().unwrap();
    assert_eq!(second.id, first.id);
    assert_eq!(second.delivery_count, 2);
}

#[tokio::test]
async fn requeued_message_goes_to_the_back() {
    let (pool, _container) = setup_test_db().await;
    let queue = PgTaskQueue::new(pool, "post");
    queue.publish("https://www.olx.uz/1").await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    let later = queue.publish("https://www.olx.uz/2").await.unwrap();

    let first = queue.next_delivery("c").await.unwrap().unwrap();
    queue.nack(first.id, true).await.unwrap();

    let next = queue.next_delivery("c").await.unwrap().unwrap();
    assert_eq!(next.id, later.id);
}

#[tokio::test]
async fn nack_without_requeue_discards() {
    let (pool, _container) = setup_test_db().await;
    let queue = PgTaskQueue::new(pool, "post");
    queue.publish(URL).await.unwrap();

    let delivery = queue.next_delivery("c").await.unwrap().unwrap();
    queue.nack(delivery.id, false).await.unwrap();

    assert_eq!(queue.depth().await.unwrap(), 0);
    assert_eq!(queue.in_flight().await.unwrap(), 0);
}

#[tokio::test]
async fn release_consumer_returns_in_flight_messages() {
    let (pool, _container) = setup_test_db().await;
    let queue = PgTaskQueue::new(pool, "post");
    queue.publish("https://www.olx.uz/1").await.unwrap();
    queue.publish("https://www.olx.uz/2").await.unwrap();

    queue.next_delivery("crashed").await.unwrap().unwrap();
    queue.next_delivery("other").await.unwrap().unwrap();

    let released = queue.release_consumer("crashed").await.unwrap();
    assert_eq!(released, 1);
    assert_eq!(queue.depth().await.unwrap(), 1);
    assert_eq!(queue.in_flight().await.unwrap(), 1);

    assert_eq!(queue.release_consumer("nobody").await.unwrap(), 0);
}

#[tokio::test]
async fn abandoned_claim_is_redelivered_after_visibility_timeout() {
    let (pool, _container) = setup_test_db().await;
    let queue =
        PgTaskQueue::new(pool, "post").with_visibility_timeout(Duration::from_millis(300));
    let published = queue.publish(URL).await.unwrap();

    let first = queue.next_delivery("crashed").await.unwrap().unwrap();
    assert_eq!(first.delivery_count, 1);
    assert!(queue.next_delivery("survivor").await.unwrap().is_none());

    tokio::time::sleep(Duration::from_millis(500)).await;

    let second = queue
        .next_delivery("survivor")
        .await
        .unwrap()
        .expect("Abandoned claim should be handed out again");
    assert_eq!(second.id, published.id);
    assert_eq!(second.delivery_count, 2);
    assert_eq!(queue.in_flight().await.unwrap(), 1);

    // The new owner is the one whose release returns it.
    assert_eq!(queue.release_consumer("crashed").await.unwrap(), 0);
    assert_eq!(queue.release_consumer("survivor").await.unwrap(), 1);
}

#[tokio::test]
async fn fresh_claim_is_not_redelivered() {
    let (pool, _container) = setup_test_db().await;
    let queue = PgTaskQueue::new(pool, "post");
    queue.publish(URL).await.unwrap();

    queue.next_delivery("a").await.unwrap().unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(queue.next_delivery("b").await.unwrap().is_none());
    assert_eq!(queue.visibility_timeout(), DEFAULT_VISIBILITY_TIMEOUT);
}

#[tokio::test]
async fn queues_are_isolated_by_name() {
    let (pool, _container) = setup_test_db().await;
    let posts = PgTaskQueue::new(pool.clone(), "post");
    let other = PgTaskQueue::new(pool, "other");
    posts.publish(URL).await.unwrap();

    assert_eq!(other.depth().await.unwrap(), 0);
    assert!(other.next_delivery("c").await.unwrap().is_none());
    assert_eq!(posts.name(), "post");
    assert_eq!(posts.depth().await.unwrap(), 1);
}
