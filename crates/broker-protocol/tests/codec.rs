// crates/broker-protocol/tests/codec.rs
//
// Line-level parsing and formatting for requests and replies.

use broker_core::{ErrorKind, OrderId, OrderStatus, Side};
use broker_protocol::{
    format_reply, format_request, parse_reply_line, parse_request_line, BalanceLine,
    OrderLine, ParseError, Reply, Request,
};
use chrono::{TimeZone, Utc};
use rust_decimal_macros::dec;

#[test]
fn blank_and_comment_lines_are_skipped() {
    assert_eq!(parse_request_line("").unwrap(), None);
    assert_eq!(parse_request_line("   ").unwrap(), None);
    assert_eq!(parse_request_line("# setup").unwrap(), None);
}

#[test]
fn parses_new_order_with_whitespace() {
    let req = parse_request_line("N, admin ,alice, AAPL , B, 10.5, 3")
        .unwrap()
        .unwrap();
    assert_eq!(
        req,
        Request::CreateOrder {
            actor: "admin".into(),
            customer: "alice".into(),
            asset: "AAPL".into(),
            side: Side::Buy,
            price: dec!(10.5),
            size: dec!(3),
        }
    );
    assert_eq!(req.actor(), Some("admin"));
}

#[test]
fn register_has_no_actor() {
    let req = parse_request_line("R, alice, pw").unwrap().unwrap();
    assert_eq!(req.actor(), None);
}

#[test]
fn list_orders_absent_fields_become_none() {
    let req = parse_request_line("O, alice, alice, -, -, -, -")
        .unwrap()
        .unwrap();
    match req {
        Request::ListOrders { filter, .. } => {
            assert!(filter.side.is_none());
            assert!(filter.asset_name.is_none());
            assert!(filter.min_date.is_none());
            assert!(filter.max_date.is_none());
        }
        other => panic!("unexpected request {:?}", other),
    }
}

#[test]
fn list_orders_parses_filter() {
    let req = parse_request_line(
        "O, alice, alice, S, AAPL, 2024-01-01T00:00:00Z, 2024-12-31T23:59:59+03:00",
    )
    .unwrap()
    .unwrap();
    match req {
        Request::ListOrders { filter, .. } => {
            assert_eq!(filter.side, Some(Side::Sell));
            assert_eq!(filter.asset_name.as_deref(), Some("AAPL"));
            assert_eq!(
                filter.min_date,
                Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
            );
            assert_eq!(
                filter.max_date,
                Some(Utc.with_ymd_and_hms(2024, 12, 31, 20, 59, 59).unwrap())
            );
        }
        other => panic!("unexpected request {:?}", other),
    }
}

#[test]
fn rejects_malformed_lines() {
    assert_eq!(
        parse_request_line("Z, 1, 2"),
        Err(ParseError::UnknownCommand("Z".into()))
    );
    assert_eq!(
        parse_request_line("X, alice"),
        Err(ParseError::FieldCount {
            command: "X".into(),
            expected: 3,
            got: 2,
        })
    );
    assert!(matches!(
        parse_request_line("X, alice, seven"),
        Err(ParseError::InvalidField { field: "orderId", .. })
    ));
    assert!(matches!(
        parse_request_line("N, a, a, X, Q, 1, 1"),
        Err(ParseError::InvalidField { field: "side", .. })
    ));
    assert!(matches!(
        parse_request_line("D, a, a, lots"),
        Err(ParseError::InvalidField { field: "amount", .. })
    ));
    assert!(matches!(
        parse_request_line("D, -, a, 10"),
        Err(ParseError::InvalidField { field: "actor", .. })
    ));
    assert!(matches!(
        parse_request_line("O, a, a, -, -, yesterday, -"),
        Err(ParseError::InvalidField { field: "minDate", .. })
    ));
}

#[test]
fn formatted_requests_parse_back() {
    let lines = [
        "R, alice, pw",
        "D, admin, alice, 100.25",
        "W, alice, alice, 5, TR330006100519786457841326",
        "N, alice, alice, AAPL, S, 3, 7",
        "O, admin, alice, B, -, -, 2024-05-01T10:00:00Z",
        "X, alice, 4",
        "M, admin, 4",
        "B, alice, alice, -",
    ];
    for line in lines {
        let req = parse_request_line(line).unwrap().unwrap();
        assert_eq!(format_request(&req), line);
    }
}

#[test]
fn formats_order_reply() {
    let reply = Reply::Order(OrderLine {
        id: OrderId(12),
        customer: "alice".into(),
        asset: "AAPL".into(),
        side: Side::Sell,
        price: dec!(10.500),
        size: dec!(2),
        status: OrderStatus::Matched,
        created_at: Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap(),
    });
    let line = format_reply(&reply);
    assert_eq!(
        line,
        "ORD, 12, alice, AAPL, S, 10.5, 2, MATCHED, 2024-03-01T09:30:00Z"
    );
    assert_eq!(parse_reply_line(&line).unwrap(), reply);
}

#[test]
fn formats_balance_and_end() {
    let bal = Reply::Balance(BalanceLine {
        customer: "bob".into(),
        asset: "TRY".into(),
        size: dec!(100.00),
        usable_size: dec!(40),
    });
    assert_eq!(format_reply(&bal), "BAL, bob, TRY, 100, 40");
    assert_eq!(format_reply(&Reply::End(3)), "END, 3");
    assert_eq!(parse_reply_line("END, 3").unwrap(), Reply::End(3));
}

#[test]
fn error_reply_keeps_commas_in_message() {
    let line = "ERR, INSUFFICIENT_BALANCE, need 10, have 5";
    let reply = parse_reply_line(line).unwrap();
    assert_eq!(
        reply,
        Reply::Error {
            kind: ErrorKind::InsufficientBalance,
            message: "need 10, have 5".into(),
        }
    );
    assert!(reply.is_error());
    assert_eq!(format_reply(&reply), line);
}

#[test]
fn unknown_error_kind_is_rejected() {
    assert!(matches!(
        parse_reply_line("ERR, BOOM, oops"),
        Err(ParseError::InvalidField { field: "error kind", .. })
    ));
}
