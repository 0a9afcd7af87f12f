//! Integration tests for the in-process event channel.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use messaging::{EventPublisherExt, InMemoryBroker};

fn broker() -> InMemoryBroker {
    let broker = InMemoryBroker::new();
    broker.declare_exchange("payment.exchange");
    broker.declare_exchange("booking.exchange");
    broker.declare_queue("booking-side");
    broker.declare_queue("notifications");
    broker
        .bind("booking-side", "payment.exchange", "payment.*")
        .unwrap();
    broker
        .bind("notifications", "payment.exchange", "#")
        .unwrap();
    broker
        .bind("notifications", "booking.exchange", "booking.#")
        .unwrap();
    broker
}

#[tokio::test]
async fn each_bound_queue_gets_its_own_copy() {
    let broker = broker();

    broker
        .publish("payment.exchange", "payment.completed", &1)
        .await
        .unwrap();
    broker
        .publish("booking.exchange", "booking.confirmed", &2)
        .await
        .unwrap();

    assert_eq!(broker.queue_depth("booking-side"), 1);
    assert_eq!(broker.queue_depth("notifications"), 2);
}

#[tokio::test]
async fn competing_consumers_share_the_work() {
    let broker = broker();
    for i in 0..50 {
        broker
            .publish("payment.exchange", "payment.completed", &i)
            .await
            .unwrap();
    }
    broker.close();

    let mut handles = Vec::new();
    for _ in 0..4 {
        let consumer = Arc::new(broker.consume("booking-side").unwrap());
        handles.push(tokio::spawn(async move {
            let mut seen = Vec::new();
            while let Some(delivery) = consumer.recv().await {
                seen.push(delivery.decode::<i32>().unwrap());
                consumer.ack(delivery.delivery_tag).unwrap();
            }
            seen
        }));
    }

    let mut all = HashSet::new();
    let mut total = 0;
    for handle in handles {
        let seen = handle.await.unwrap();
        total += seen.len();
        all.extend(seen);
    }

    assert_eq!(total, 50);
    assert_eq!(all.len(), 50);
}

#[tokio::test]
async fn unacknowledged_message_survives_a_crashed_consumer() {
    let broker = broker();
    let crashed = broker.consume("booking-side").unwrap();

    broker
        .publish("payment.exchange", "payment.failed", &"declined")
        .await
        .unwrap();
    let first = crashed.recv().await.unwrap();
    drop(crashed);

    let replacement = broker.consume("booking-side").unwrap();
    let again = tokio::time::timeout(Duration::from_secs(1), replacement.recv())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(again.delivery_tag, first.delivery_tag);
    assert!(again.redelivered);
    assert_eq!(again.decode::<String>().unwrap(), "declined");
}

#[tokio::test]
async fn per_queue_order_is_fifo() {
    let broker = broker();
    for i in 0..5 {
        broker
            .publish("payment.exchange", "payment.initiated", &i)
            .await
            .unwrap();
    }

    let consumer = broker.consume("booking-side").unwrap();
    let mut received = Vec::new();
    while let Some(delivery) = consumer.try_recv() {
        received.push(delivery.decode::<i32>().unwrap());
        consumer.ack(delivery.delivery_tag).unwrap();
    }

    assert_eq!(received, vec![0, 1, 2, 3, 4]);
}
