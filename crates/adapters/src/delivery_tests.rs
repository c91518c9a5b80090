// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn stdout_delivery_always_succeeds() {
    let delivery = StdoutDelivery;
    delivery.send("subject", "body").await.expect("send");
}

#[tokio::test]
async fn fake_delivery_records_calls() {
    let delivery = FakeDelivery::new();
    delivery.send("first", "body-1").await.expect("send");
    delivery.send("second", "body-2").await.expect("send");

    let calls = delivery.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].subject, "first");
    assert_eq!(calls[1].body, "body-2");
}
