// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Tests for the request/reply correlation layer.

use super::*;
use crate::error::Error;
use crate::qos::{History, Reliability};
use crate::transport::Domain;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

fn pair(domain: &Domain, service: &str) -> (Requester<u32, String>, Replier<u32, String>) {
    let params = EndpointParams::new(service).with_discovery_poll_interval(Duration::from_millis(5));
    let replier = Replier::new(domain, params.clone()).unwrap();
    let requester = Requester::new(domain, params).unwrap();
    (requester, replier)
}

#[test]
fn test_rpc_qos_profile() {
    let qos = rpc_qos();
    assert_eq!(qos.reliability, Reliability::Reliable);
    assert_eq!(qos.history, History::KeepAll);
}

#[test]
fn test_endpoint_topics() {
    let params = EndpointParams::new("PrimeCalculator");
    assert_eq!(params.request_topic(), "rq/PrimeCalculator");
    assert_eq!(params.reply_topic(), "rr/PrimeCalculator");
    assert_eq!(params.discovery_poll_interval, DEFAULT_DISCOVERY_POLL);
}

#[test]
fn test_send_without_replier_fails() {
    let domain = Domain::new(0).unwrap();
    let requester = Requester::<u32, String>::new(&domain, EndpointParams::new("lonely")).unwrap();

    assert_eq!(requester.matched_replier_count(), 0);
    let err = requester.send_request(1).unwrap_err();
    assert!(matches!(err, Error::NoMatchedReplier(ref s) if s == "lonely"));
    assert_eq!(requester.outstanding_requests(), 0);
}

#[test]
fn test_correlation_ids_carry_writer_guid() {
    let domain = Domain::new(0).unwrap();
    let (requester, _replier) = pair(&domain, "ids");

    let a = requester.send_request(1).unwrap();
    let b = requester.send_request(2).unwrap();
    assert_eq!(a.writer_guid, requester.guid());
    assert_eq!(a.sequence_number, 1);
    assert_eq!(b.sequence_number, 2);
}

#[test]
fn test_stream_delivered_in_order() {
    let domain = Domain::new(0).unwrap();
    let (requester, replier) = pair(&domain, "stream");
    assert_eq!(replier.matched_requester_count(), 1);

    let id = requester.send_request(3).unwrap();
    assert_eq!(requester.stream_state(&id), Some(StreamState::AwaitingFirstReply));

    let requests = replier.take_requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.correlation_id(), id);
    assert_eq!(request.data, 3);
    assert_eq!(replier.open_streams(), 1);

    replier.send_reply("a".into(), &request.info, ReplyStatus::InProgress).unwrap();
    replier.send_reply("b".into(), &request.info, ReplyStatus::InProgress).unwrap();
    replier.send_reply("c".into(), &request.info, ReplyStatus::Completed).unwrap();
    assert_eq!(replier.open_streams(), 0);
    assert_eq!(replier.requests_processed(), 1);

    let replies = requester.take_replies();
    let payloads: Vec<_> = replies.iter().filter_map(|r| r.data().cloned()).collect();
    assert_eq!(payloads, vec!["a", "b", "c"]);
    assert!(replies.iter().all(|r| r.related_request_id() == id));
    assert_eq!(replies.iter().filter(|r| r.is_terminal()).count(), 1);
    assert_eq!(replies[2].info().reply_sequence, 2);

    assert_eq!(requester.stream_state(&id), None);
    assert_eq!(requester.outstanding_requests(), 0);
    assert!(requester.take_replies().is_empty());
}

#[test]
fn test_reply_after_terminal_is_refused() {
    let domain = Domain::new(0).unwrap();
    let (requester, replier) = pair(&domain, "terminal");

    requester.send_request(1).unwrap();
    let request = replier.take_requests().remove(0);
    replier
        .send_reply(String::new(), &request.info, ReplyStatus::Error)
        .unwrap();

    let err = replier
        .send_reply(String::new(), &request.info, ReplyStatus::InProgress)
        .unwrap_err();
    assert!(matches!(err, Error::StreamAlreadyTerminal(_)));

    let replies = requester.take_replies();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].status(), ReplyStatus::Error);
    assert!(replies[0].data().is_none());
}

#[test]
fn test_reply_to_unknown_request_is_refused() {
    let domain = Domain::new(0).unwrap();
    let (_requester, replier) = pair(&domain, "unknown");

    let info = RequestInfo {
        correlation_id: CorrelationId::zero(),
        received_at: Instant::now(),
    };
    let err = replier
        .send_reply(String::new(), &info, ReplyStatus::Completed)
        .unwrap_err();
    assert!(matches!(err, Error::UnknownStream(_)));
}

#[test]
fn test_requesters_are_isolated() {
    let domain = Domain::new(0).unwrap();
    let params = EndpointParams::new("shared");
    let replier = Replier::<u32, String>::new(&domain, params.clone()).unwrap();
    let first = Requester::<u32, String>::new(&domain, params.clone()).unwrap();
    let second = Requester::<u32, String>::new(&domain, params).unwrap();

    let id1 = first.send_request(1).unwrap();
    let id2 = second.send_request(2).unwrap();
    assert_ne!(id1, id2);

    for request in replier.take_requests() {
        let text = format!("for {}", request.data);
        replier
            .send_reply(text, &request.info, ReplyStatus::Completed)
            .unwrap();
    }

    let r1 = first.take_replies();
    let r2 = second.take_replies();
    assert_eq!(r1.len(), 1);
    assert_eq!(r2.len(), 1);
    assert_eq!(r1[0].data().map(String::as_str), Some("for 1"));
    assert_eq!(r2[0].data().map(String::as_str), Some("for 2"));
}

#[test]
fn test_concurrent_outstanding_requests() {
    let domain = Domain::new(0).unwrap();
    let (requester, replier) = pair(&domain, "concurrent");

    let a = requester.send_request(10).unwrap();
    let b = requester.send_request(20).unwrap();
    assert_eq!(requester.outstanding_requests(), 2);

    let requests = replier.take_requests();
    // Interleave the two streams.
    replier.send_reply("b0".into(), &requests[1].info, ReplyStatus::InProgress).unwrap();
    replier.send_reply("a0".into(), &requests[0].info, ReplyStatus::Completed).unwrap();
    replier.send_reply("b1".into(), &requests[1].info, ReplyStatus::Completed).unwrap();

    let replies = requester.take_replies();
    let of = |id: CorrelationId| -> Vec<String> {
        replies
            .iter()
            .filter(|r| r.related_request_id() == id)
            .filter_map(|r| r.data().cloned())
            .collect()
    };
    assert_eq!(of(a), vec!["a0"]);
    assert_eq!(of(b), vec!["b0", "b1"]);
    assert_eq!(requester.outstanding_requests(), 0);
}

#[test]
fn test_cancelled_request_drops_late_replies() {
    let domain = Domain::new(0).unwrap();
    let (requester, replier) = pair(&domain, "abandon");

    let id = requester.send_request(1).unwrap();
    let request = replier.take_requests().remove(0);

    assert!(requester.cancel_request(&id));
    assert!(!requester.cancel_request(&id));

    replier
        .send_reply("late".into(), &request.info, ReplyStatus::Completed)
        .unwrap();
    assert!(requester.take_replies().is_empty());
}

#[tokio::test]
async fn test_wait_ignores_replies_of_cancelled_request() {
    let domain = Domain::new(0).unwrap();
    let (requester, replier) = pair(&domain, "abandon-wait");

    let id = requester.send_request(1).unwrap();
    let request = replier.take_requests().remove(0);
    assert!(requester.cancel_request(&id));

    replier
        .send_reply("late".into(), &request.info, ReplyStatus::Completed)
        .unwrap();

    let token = CancellationToken::new();
    let waited = tokio::time::timeout(
        Duration::from_millis(50),
        requester.wait_for_replies(1, &token),
    )
    .await;
    assert!(waited.is_err(), "a discarded reply must not satisfy the wait");
    assert!(requester.take_replies().is_empty());
}

#[tokio::test]
async fn test_cancel_purges_accepted_replies() {
    let domain = Domain::new(0).unwrap();
    let (requester, replier) = pair(&domain, "purge");

    let kept = requester.send_request(1).unwrap();
    let dropped = requester.send_request(2).unwrap();
    let requests = replier.take_requests();
    replier.send_reply("d".into(), &requests[1].info, ReplyStatus::InProgress).unwrap();
    replier.send_reply("k".into(), &requests[0].info, ReplyStatus::InProgress).unwrap();

    let token = CancellationToken::new();
    requester.wait_for_replies(2, &token).await.unwrap();
    assert!(requester.cancel_request(&dropped));

    let replies = requester.take_replies();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].related_request_id(), kept);
    assert_eq!(replies[0].data().map(String::as_str), Some("k"));
}

#[test]
fn test_abandoned_stream_refuses_replies() {
    let domain = Domain::new(0).unwrap();
    let (requester, replier) = pair(&domain, "abandon-stream");

    requester.send_request(1).unwrap();
    let request = replier.take_requests().remove(0);
    assert_eq!(replier.open_streams(), 1);

    assert!(replier.abandon_stream(&request.info));
    assert!(!replier.abandon_stream(&request.info));
    assert_eq!(replier.open_streams(), 0);

    let err = replier
        .send_reply("late".into(), &request.info, ReplyStatus::Completed)
        .unwrap_err();
    assert!(matches!(err, Error::StreamAlreadyTerminal(_)));
    assert!(requester.take_replies().is_empty());
}

#[tokio::test]
async fn test_send_when_ready_waits_for_room() {
    let domain = Domain::new(0).unwrap();
    let params = EndpointParams::new("full").with_discovery_poll_interval(Duration::from_millis(5));
    let replier = Replier::<u32, String>::new(&domain, params.clone()).unwrap();
    let requester =
        Requester::<u32, String>::new(&domain, params.with_reader_qos(rpc_qos().max_samples(1))).unwrap();

    requester.send_request(1).unwrap();
    let request = replier.take_requests().remove(0);
    replier
        .send_reply("first".into(), &request.info, ReplyStatus::InProgress)
        .unwrap();
    let err = replier
        .send_reply("second".into(), &request.info, ReplyStatus::Completed)
        .unwrap_err();
    assert!(matches!(err, Error::ResourceLimitExceeded(_)));

    let token = CancellationToken::new();
    let (sent, first) = tokio::join!(
        replier.send_reply_when_ready("second".into(), &request.info, ReplyStatus::Completed, &token),
        async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            requester.take_replies()
        }
    );
    sent.unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(replier.open_streams(), 0);

    let rest = requester.take_replies();
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].info().reply_sequence, 1);
    assert!(rest[0].is_terminal());
}

#[tokio::test]
async fn test_send_when_ready_cancelled_keeps_stream() {
    let domain = Domain::new(0).unwrap();
    let params = EndpointParams::new("stuck");
    let replier = Replier::<u32, String>::new(&domain, params.clone()).unwrap();
    let requester =
        Requester::<u32, String>::new(&domain, params.with_reader_qos(rpc_qos().max_samples(1))).unwrap();

    requester.send_request(1).unwrap();
    let request = replier.take_requests().remove(0);
    replier
        .send_reply("first".into(), &request.info, ReplyStatus::InProgress)
        .unwrap();

    let token = CancellationToken::new();
    token.cancel();
    let err = replier
        .send_reply_when_ready("second".into(), &request.info, ReplyStatus::Completed, &token)
        .await
        .unwrap_err();
    assert!(err.is_cancellation());
    assert_eq!(replier.open_streams(), 1);
}

#[test]
fn test_duplicate_request_is_dropped() {
    let domain = Domain::new(0).unwrap();
    let params = EndpointParams::new("dup");
    let replier = Replier::<u32, String>::new(&domain, params.clone()).unwrap();
    let writer = domain
        .create_writer::<types::RequestMessage<u32>>(&params.request_topic(), rpc_qos())
        .unwrap();

    let message = types::RequestMessage {
        header: RequestHeader {
            request_id: CorrelationId::new(writer.guid(), 1),
        },
        data: 5,
    };
    writer.write(&message).unwrap();
    writer.write(&message).unwrap();

    assert_eq!(replier.take_requests().len(), 1);
    assert_eq!(replier.requests_processed(), 1);
}

#[tokio::test]
async fn test_wait_for_matched_replier() {
    let domain = Domain::new(0).unwrap();
    let params = EndpointParams::new("late-replier").with_discovery_poll_interval(Duration::from_millis(5));
    let requester = Requester::<u32, String>::new(&domain, params.clone()).unwrap();
    let token = CancellationToken::new();

    let spawner = {
        let domain = domain.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Replier::<u32, String>::new(&domain, params).unwrap()
        })
    };

    tokio::time::timeout(Duration::from_secs(5), requester.wait_for_matched_replier(&token))
        .await
        .expect("replier should match")
        .unwrap();
    let _replier = spawner.await.unwrap();
    assert_eq!(requester.matched_replier_count(), 1);
}

#[tokio::test]
async fn test_wait_for_matched_replier_cancelled() {
    let domain = Domain::new(0).unwrap();
    let requester = Requester::<u32, String>::new(&domain, EndpointParams::new("nobody")).unwrap();
    let token = CancellationToken::new();
    token.cancel();

    let err = requester.wait_for_matched_replier(&token).await.unwrap_err();
    assert!(err.is_cancellation());
}

#[tokio::test]
async fn test_cancelled_wait_keeps_replies() {
    let domain = Domain::new(0).unwrap();
    let (requester, replier) = pair(&domain, "keep");

    requester.send_request(1).unwrap();
    let request = replier.take_requests().remove(0);
    replier
        .send_reply("first".into(), &request.info, ReplyStatus::InProgress)
        .unwrap();

    let token = CancellationToken::new();
    let canceller = {
        let token = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            token.cancel();
        })
    };
    let err = requester.wait_for_replies(2, &token).await.unwrap_err();
    canceller.await.unwrap();

    assert!(matches!(err, Error::Cancelled));
    let replies = requester.take_replies();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].status(), ReplyStatus::InProgress);
}

#[tokio::test]
async fn test_receive_replies_timeout_is_empty() {
    let domain = Domain::new(0).unwrap();
    let (requester, _replier) = pair(&domain, "silent");

    requester.send_request(1).unwrap();
    let replies = requester
        .receive_replies(1, Duration::from_millis(20))
        .await
        .unwrap();
    assert!(replies.is_empty());
    assert_eq!(requester.outstanding_requests(), 1);
}

#[tokio::test]
async fn test_receive_requests_and_replies() {
    let domain = Domain::new(0).unwrap();
    let (requester, replier) = pair(&domain, "roundtrip");

    let id = requester.send_request(9).unwrap();
    let requests = replier
        .receive_requests(1, Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(requests.len(), 1);
    replier
        .send_reply("nine".into(), &requests[0].info, ReplyStatus::Completed)
        .unwrap();

    let replies = requester
        .receive_replies(1, Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].related_request_id(), id);
    assert_eq!(replies[0].status(), ReplyStatus::Completed);
}
