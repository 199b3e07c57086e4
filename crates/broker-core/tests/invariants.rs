// crates/broker-core/tests/invariants.rs
//
// Property tests: random operation sequences must keep every balance
// record within 0 <= usable_size <= size, and must conserve value.

use broker_core::{BrokerConfig, Brokerage, OrderFilter, OrderId, OrderStatus, Role, Side};
use proptest::prelude::*;
use rust_decimal::Decimal;

#[derive(Debug, Clone)]
enum Op {
    Deposit(u32),
    Withdraw(u32),
    Buy { price: u32, size: u32 },
    Sell { price: u32, size: u32 },
    Cancel(u64),
    Match(u64),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1u32..500).prop_map(Op::Deposit),
        (1u32..500).prop_map(Op::Withdraw),
        (1u32..20, 1u32..20).prop_map(|(price, size)| Op::Buy { price, size }),
        (1u32..20, 1u32..20).prop_map(|(price, size)| Op::Sell { price, size }),
        (1u64..40).prop_map(Op::Cancel),
        (1u64..40).prop_map(Op::Match),
    ]
}

fn assert_invariants(b: &Brokerage) {
    for asset in b.list_balances("alice", None).unwrap() {
        assert!(
            asset.check_invariant(),
            "broken record {:?}",
            asset
        );
    }
}

/// Everything alice holds in reserve must equal what her pending
/// orders say they reserved.
fn assert_reservations_match_orders(b: &Brokerage) {
    let pending: Vec<_> = b
        .list_orders("alice", &OrderFilter::default())
        .unwrap()
        .into_iter()
        .filter(|o| o.status == OrderStatus::Pending)
        .collect();

    for asset in b.list_balances("alice", None).unwrap() {
        let expected: Decimal = pending
            .iter()
            .map(|o| {
                b.engine()
                    .legs(o.customer_id, o.side, &o.asset_name, o.price, o.size)
                    .unwrap()
            })
            .filter(|legs| legs.reserve == asset.key)
            .map(|legs| legs.reserve_amount)
            .sum();
        assert_eq!(asset.reserved(), expected, "reservation drift on {}", asset.key);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn ledger_stays_consistent(ops in proptest::collection::vec(op(), 1..60)) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();

        rt.block_on(async {
            let b = Brokerage::new(BrokerConfig::default());
            b.register("alice", "pw", Role::Customer).unwrap();

            for op in ops {
                // Business rejections are expected; only invariants matter.
                let _ = match op {
                    Op::Deposit(n) => b.deposit_cash("alice", n.into()).await.map(|_| ()),
                    Op::Withdraw(n) => b.withdraw_cash("alice", n.into(), "TR01").await.map(|_| ()),
                    Op::Buy { price, size } => b
                        .create_order("alice", "X", Side::Buy, price.into(), size.into())
                        .await
                        .map(|_| ()),
                    Op::Sell { price, size } => b
                        .create_order("alice", "X", Side::Sell, price.into(), size.into())
                        .await
                        .map(|_| ()),
                    Op::Cancel(id) => b.cancel_order(OrderId(id), "alice").await.map(|_| ()),
                    Op::Match(id) => b.match_order(OrderId(id)).await.map(|_| ()),
                };
                assert_invariants(&b);
                assert_reservations_match_orders(&b);
            }
        });
    }
}
