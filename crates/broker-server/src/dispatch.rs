//! Request dispatch.
//!
//! Turns one parsed [`Request`] into the replies for its client by
//! calling the shared [`Brokerage`]. This is where the boundary checks
//! the actor against the target customer before touching the core:
//!
//! - `R` needs no actor.
//! - `D`, `W`, `N`, `O`, `B` require the actor to own the target
//!   customer or be an ADMIN.
//! - `X` is checked by the order engine itself.
//! - `M` requires an ADMIN.
//!
//! Requests carrying an unknown actor are refused with `UNAUTHORIZED`.

use broker_core::{BrokerError, BrokerResult, Brokerage, CustomerId, Role};
use broker_protocol::{parse_request_line, Reply, Request};
use tracing::{debug, warn};

/// Parse and dispatch one raw line. Blank and comment lines produce no
/// replies; unparseable lines produce a single `INVALID_ARGUMENT` error.
pub async fn handle_line(brokerage: &Brokerage, line: &str) -> Vec<Reply> {
    match parse_request_line(line) {
        Ok(Some(req)) => handle_request(brokerage, req).await,
        Ok(None) => Vec::new(),
        Err(e) => {
            debug!(line, error = %e, "rejecting malformed line");
            vec![Reply::error(&BrokerError::InvalidArgument(e.to_string()))]
        }
    }
}

/// Dispatch one request and collect its replies in order.
pub async fn handle_request(brokerage: &Brokerage, req: Request) -> Vec<Reply> {
    match execute(brokerage, req).await {
        Ok(replies) => replies,
        Err(e) => {
            if e.is_retryable() {
                warn!(error = %e, "request lost a commit race");
            } else {
                debug!(error = %e, "request rejected");
            }
            vec![Reply::error(&e)]
        }
    }
}

async fn execute(b: &Brokerage, req: Request) -> BrokerResult<Vec<Reply>> {
    if let Some(actor) = req.actor() {
        ensure_known(b, actor)?;
    }

    match req {
        Request::Register { username, password } => {
            b.register(&username, &password, Role::Customer)?;
            Ok(vec![Reply::ok(format!("registered {}", username.trim()))])
        }

        Request::Deposit {
            actor,
            customer,
            amount,
        } => {
            authorize(b, &actor, &customer, "deposit")?;
            b.deposit_cash(&customer, amount).await?;
            Ok(vec![Reply::ok(format!("deposited {}", amount.normalize()))])
        }

        Request::Withdraw {
            actor,
            customer,
            amount,
            iban,
        } => {
            authorize(b, &actor, &customer, "withdraw")?;
            b.withdraw_cash(&customer, amount, &iban).await?;
            Ok(vec![Reply::ok(format!("withdrew {}", amount.normalize()))])
        }

        Request::CreateOrder {
            actor,
            customer,
            asset,
            side,
            price,
            size,
        } => {
            authorize(b, &actor, &customer, "create order")?;
            let order = b.create_order(&customer, &asset, side, price, size).await?;
            Ok(vec![Reply::order(&order, customer)])
        }

        Request::ListOrders {
            actor,
            customer,
            filter,
        } => {
            authorize(b, &actor, &customer, "list orders")?;
            let orders = b.list_orders(&customer, &filter)?;
            let count = orders.len();
            let mut replies: Vec<Reply> = orders
                .iter()
                .map(|o| Reply::order(o, customer.as_str()))
                .collect();
            replies.push(Reply::End(count));
            Ok(replies)
        }

        Request::CancelOrder { actor, order_id } => {
            let order = b.cancel_order(order_id, &actor).await?;
            Ok(vec![Reply::ok(format!("cancelled {}", order.id))])
        }

        Request::MatchOrder { actor, order_id } => {
            if !b.directory().is_admin(&actor) {
                return Err(unauthorized(&actor, "match order"));
            }
            let order = b.match_order(order_id).await?;
            Ok(vec![Reply::ok(format!("matched {}", order.id))])
        }

        Request::ListBalances {
            actor,
            customer,
            asset,
        } => {
            authorize(b, &actor, &customer, "list balances")?;
            let balances = b.list_balances(&customer, asset.as_deref())?;
            let count = balances.len();
            let mut replies: Vec<Reply> = balances
                .iter()
                .map(|a| Reply::balance(a, customer.as_str()))
                .collect();
            replies.push(Reply::End(count));
            Ok(replies)
        }
    }
}

fn ensure_known(b: &Brokerage, actor: &str) -> BrokerResult<()> {
    b.directory()
        .resolve_customer_id(actor)
        .map(|_| ())
        .map_err(|_| unauthorized(actor, "act"))
}

/// Resolve `customer` and check that `actor` may act on it.
fn authorize(
    b: &Brokerage,
    actor: &str,
    customer: &str,
    action: &'static str,
) -> BrokerResult<CustomerId> {
    // Only ADMINs learn whether someone else's account exists.
    let target = match b.directory().resolve_customer_id(customer) {
        Ok(id) => id,
        Err(e) if b.directory().is_admin(actor) => return Err(e),
        Err(_) => return Err(unauthorized(actor, action)),
    };
    if b.directory().may_act(actor, target) {
        Ok(target)
    } else {
        Err(unauthorized(actor, action))
    }
}

fn unauthorized(actor: &str, action: &'static str) -> BrokerError {
    BrokerError::Unauthorized {
        actor: actor.to_string(),
        action,
    }
}
