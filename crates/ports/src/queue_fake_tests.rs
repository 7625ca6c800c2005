// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use taskd_core::TaskId;

fn created(id: u64) -> TaskEvent {
    TaskEvent::TaskCreated {
        task_id: TaskId::new(id),
        round: 1,
    }
}

#[tokio::test]
async fn recv_returns_puts_in_order() {
    let queue = FakeEventQueue::new();
    queue.put(created(1)).await.unwrap();
    queue.put(created(2)).await.unwrap();

    let (_, first) = queue.recv().await.unwrap();
    let (_, second) = queue.recv().await.unwrap();
    assert_eq!(first.task_id(), TaskId::new(1));
    assert_eq!(second.task_id(), TaskId::new(2));
}

#[tokio::test]
async fn ack_clears_outstanding() {
    let queue = FakeEventQueue::new();
    queue.put(created(1)).await.unwrap();
    let (ack_id, _) = queue.recv().await.unwrap();
    assert_eq!(queue.outstanding_acks(), vec![ack_id]);
    queue.ack(ack_id).await.unwrap();
    assert!(queue.outstanding_acks().is_empty());
}

#[tokio::test]
async fn no_ack_redelivers_at_back_of_queue() {
    let queue = FakeEventQueue::new();
    queue.put(created(1)).await.unwrap();
    queue.put(created(2)).await.unwrap();

    let (ack_id, event) = queue.recv().await.unwrap();
    assert_eq!(event.task_id(), TaskId::new(1));
    queue.no_ack(ack_id).await.unwrap();

    let (_, second) = queue.recv().await.unwrap();
    assert_eq!(second.task_id(), TaskId::new(2));
    let (_, redelivered) = queue.recv().await.unwrap();
    assert_eq!(redelivered.task_id(), TaskId::new(1));
}

#[tokio::test]
async fn ack_unknown_id_errors() {
    let queue = FakeEventQueue::new();
    let err = queue.ack(AckId::from(999)).await.unwrap_err();
    assert!(matches!(err, QueueError::UnknownAck(_)));
}

#[tokio::test]
async fn recv_blocks_until_put() {
    let queue = FakeEventQueue::new();
    let queue2 = queue.clone();
    let handle = tokio::spawn(async move { queue2.recv().await.unwrap() });

    tokio::task::yield_now().await;
    queue.put(created(5)).await.unwrap();

    let (_, event) = handle.await.unwrap();
    assert_eq!(event.task_id(), TaskId::new(5));
}
