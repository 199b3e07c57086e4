// crates/broker-protocol/src/csv_codec.rs

//! CSV line codec.
//!
//! One request or reply per line, fields separated by `,` and trimmed.
//! A lone `-` marks an absent optional field. Sides are `B` / `S`,
//! amounts use decimal notation, dates are RFC 3339.
//!
//! Input format (lines → [`Request`]):
//!
//! - Register:      `R, username, password`
//! - Deposit:       `D, actor, customer, amount`
//! - Withdraw:      `W, actor, customer, amount, iban`
//! - New order:     `N, actor, customer, asset, side(B or S), price, size`
//! - List orders:   `O, actor, customer, side|-, asset|-, minDate|-, maxDate|-`
//! - Cancel order:  `X, actor, orderId`
//! - Match order:   `M, actor, orderId`
//! - List balances: `B, actor, customer, asset|-`
//!
//! Output format ([`Reply`] → line):
//!
//! - Success:  `OK, what`
//! - Order:    `ORD, id, customer, asset, side, price, size, status, createdAt`
//! - Balance:  `BAL, customer, asset, size, usableSize`
//! - List end: `END, count`
//! - Error:    `ERR, KIND, message`

use std::str::FromStr;

use broker_core::{ErrorKind, OrderFilter, OrderId, OrderStatus, Side};
use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::messages::{BalanceLine, OrderLine, Reply, Request};

/// Marker for an absent optional field.
pub const ABSENT: &str = "-";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("{command} expects {expected} fields, got {got}")]
    FieldCount {
        command: String,
        expected: usize,
        got: usize,
    },

    #[error("invalid {field}: {value:?}")]
    InvalidField { field: &'static str, value: String },
}

/// Parse a single request line.
///
/// Returns `Ok(None)` for blank lines and comments (starting with `#`).
pub fn parse_request_line(line: &str) -> Result<Option<Request>, ParseError> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }

    let tokens = split_and_trim(trimmed, ',');
    let request = match tokens[0].as_str() {
        "R" => {
            expect_fields(&tokens, 3)?;
            Request::Register {
                username: required(&tokens[1], "username")?,
                password: required(&tokens[2], "password")?,
            }
        }
        "D" => {
            expect_fields(&tokens, 4)?;
            Request::Deposit {
                actor: required(&tokens[1], "actor")?,
                customer: required(&tokens[2], "customer")?,
                amount: parse_decimal(&tokens[3], "amount")?,
            }
        }
        "W" => {
            expect_fields(&tokens, 5)?;
            Request::Withdraw {
                actor: required(&tokens[1], "actor")?,
                customer: required(&tokens[2], "customer")?,
                amount: parse_decimal(&tokens[3], "amount")?,
                iban: required(&tokens[4], "iban")?,
            }
        }
        "N" => {
            expect_fields(&tokens, 7)?;
            Request::CreateOrder {
                actor: required(&tokens[1], "actor")?,
                customer: required(&tokens[2], "customer")?,
                asset: required(&tokens[3], "asset")?,
                side: parse_side(&tokens[4])?,
                price: parse_decimal(&tokens[5], "price")?,
                size: parse_decimal(&tokens[6], "size")?,
            }
        }
        "O" => {
            expect_fields(&tokens, 7)?;
            Request::ListOrders {
                actor: required(&tokens[1], "actor")?,
                customer: required(&tokens[2], "customer")?,
                filter: OrderFilter {
                    side: optional(&tokens[3]).map(parse_side).transpose()?,
                    asset_name: optional(&tokens[4]).map(str::to_string),
                    min_date: optional(&tokens[5])
                        .map(|s| parse_date(s, "minDate"))
                        .transpose()?,
                    max_date: optional(&tokens[6])
                        .map(|s| parse_date(s, "maxDate"))
                        .transpose()?,
                },
            }
        }
        "X" => {
            expect_fields(&tokens, 3)?;
            Request::CancelOrder {
                actor: required(&tokens[1], "actor")?,
                order_id: parse_order_id(&tokens[2])?,
            }
        }
        "M" => {
            expect_fields(&tokens, 3)?;
            Request::MatchOrder {
                actor: required(&tokens[1], "actor")?,
                order_id: parse_order_id(&tokens[2])?,
            }
        }
        "B" => {
            expect_fields(&tokens, 4)?;
            Request::ListBalances {
                actor: required(&tokens[1], "actor")?,
                customer: required(&tokens[2], "customer")?,
                asset: optional(&tokens[3]).map(str::to_string),
            }
        }
        other => return Err(ParseError::UnknownCommand(other.to_string())),
    };
    Ok(Some(request))
}

/// Format a request as a line (used by clients and tools).
pub fn format_request(req: &Request) -> String {
    match req {
        Request::Register { username, password } => format!("R, {}, {}", username, password),
        Request::Deposit {
            actor,
            customer,
            amount,
        } => format!("D, {}, {}, {}", actor, customer, amount),
        Request::Withdraw {
            actor,
            customer,
            amount,
            iban,
        } => format!("W, {}, {}, {}, {}", actor, customer, amount, iban),
        Request::CreateOrder {
            actor,
            customer,
            asset,
            side,
            price,
            size,
        } => format!(
            "N, {}, {}, {}, {}, {}, {}",
            actor,
            customer,
            asset,
            side.as_char(),
            price,
            size
        ),
        Request::ListOrders {
            actor,
            customer,
            filter,
        } => format!(
            "O, {}, {}, {}, {}, {}, {}",
            actor,
            customer,
            filter
                .side
                .map_or(ABSENT.to_string(), |s| s.as_char().to_string()),
            filter.asset_name.as_deref().unwrap_or(ABSENT),
            filter.min_date.map_or(ABSENT.to_string(), format_date),
            filter.max_date.map_or(ABSENT.to_string(), format_date),
        ),
        Request::CancelOrder { actor, order_id } => format!("X, {}, {}", actor, order_id),
        Request::MatchOrder { actor, order_id } => format!("M, {}, {}", actor, order_id),
        Request::ListBalances {
            actor,
            customer,
            asset,
        } => format!(
            "B, {}, {}, {}",
            actor,
            customer,
            asset.as_deref().unwrap_or(ABSENT)
        ),
    }
}

/// Format a reply as a line.
pub fn format_reply(reply: &Reply) -> String {
    match reply {
        Reply::Ok(what) => format!("OK, {}", what),
        Reply::Order(o) => format!(
            "ORD, {}, {}, {}, {}, {}, {}, {}, {}",
            o.id,
            o.customer,
            o.asset,
            o.side.as_char(),
            o.price.normalize(),
            o.size.normalize(),
            o.status,
            format_date(o.created_at)
        ),
        Reply::Balance(b) => format!(
            "BAL, {}, {}, {}, {}",
            b.customer,
            b.asset,
            b.size.normalize(),
            b.usable_size.normalize()
        ),
        Reply::End(count) => format!("END, {}", count),
        Reply::Error { kind, message } => format!("ERR, {}, {}", kind.code(), message),
    }
}

/// Parse a reply line (used by clients and tests).
pub fn parse_reply_line(line: &str) -> Result<Reply, ParseError> {
    let trimmed = line.trim();

    // Error messages may themselves contain commas.
    if let Some(rest) = trimmed.strip_prefix("ERR,") {
        let mut parts = rest.splitn(2, ',');
        let code = parts.next().unwrap_or_default().trim();
        let kind = ErrorKind::from_code(code).ok_or_else(|| ParseError::InvalidField {
            field: "error kind",
            value: code.to_string(),
        })?;
        let message = parts.next().unwrap_or_default().trim().to_string();
        return Ok(Reply::Error { kind, message });
    }

    let tokens = split_and_trim(trimmed, ',');
    match tokens[0].as_str() {
        "OK" => {
            expect_fields(&tokens, 2)?;
            Ok(Reply::Ok(tokens[1].clone()))
        }
        "ORD" => {
            expect_fields(&tokens, 9)?;
            Ok(Reply::Order(OrderLine {
                id: parse_order_id(&tokens[1])?,
                customer: tokens[2].clone(),
                asset: tokens[3].clone(),
                side: parse_side(&tokens[4])?,
                price: parse_decimal(&tokens[5], "price")?,
                size: parse_decimal(&tokens[6], "size")?,
                status: OrderStatus::parse(&tokens[7]).ok_or_else(|| {
                    ParseError::InvalidField {
                        field: "status",
                        value: tokens[7].clone(),
                    }
                })?,
                created_at: parse_date(&tokens[8], "createdAt")?,
            }))
        }
        "BAL" => {
            expect_fields(&tokens, 5)?;
            Ok(Reply::Balance(BalanceLine {
                customer: tokens[1].clone(),
                asset: tokens[2].clone(),
                size: parse_decimal(&tokens[3], "size")?,
                usable_size: parse_decimal(&tokens[4], "usableSize")?,
            }))
        }
        "END" => {
            expect_fields(&tokens, 2)?;
            let count = tokens[1].parse::<usize>().map_err(|_| ParseError::InvalidField {
                field: "count",
                value: tokens[1].clone(),
            })?;
            Ok(Reply::End(count))
        }
        other => Err(ParseError::UnknownCommand(other.to_string())),
    }
}

// -----------------------------------------------------------------------------
// Helpers
// -----------------------------------------------------------------------------

fn split_and_trim(s: &str, delimiter: char) -> Vec<String> {
    s.split(delimiter)
        .map(|tok| tok.trim().to_string())
        .collect()
}

fn expect_fields(tokens: &[String], expected: usize) -> Result<(), ParseError> {
    if tokens.len() == expected {
        Ok(())
    } else {
        Err(ParseError::FieldCount {
            command: tokens[0].clone(),
            expected,
            got: tokens.len(),
        })
    }
}

fn required(token: &str, field: &'static str) -> Result<String, ParseError> {
    if token.is_empty() || token == ABSENT {
        Err(ParseError::InvalidField {
            field,
            value: token.to_string(),
        })
    } else {
        Ok(token.to_string())
    }
}

fn optional(token: &str) -> Option<&str> {
    if token.is_empty() || token == ABSENT {
        None
    } else {
        Some(token)
    }
}

fn parse_side(token: &str) -> Result<Side, ParseError> {
    let mut chars = token.chars();
    match (chars.next().and_then(Side::from_char), chars.next()) {
        (Some(side), None) => Ok(side),
        _ => Err(ParseError::InvalidField {
            field: "side",
            value: token.to_string(),
        }),
    }
}

fn parse_decimal(token: &str, field: &'static str) -> Result<Decimal, ParseError> {
    Decimal::from_str(token).map_err(|_| ParseError::InvalidField {
        field,
        value: token.to_string(),
    })
}

fn parse_order_id(token: &str) -> Result<OrderId, ParseError> {
    token
        .parse::<u64>()
        .map(OrderId)
        .map_err(|_| ParseError::InvalidField {
            field: "orderId",
            value: token.to_string(),
        })
}

fn parse_date(token: &str, field: &'static str) -> Result<DateTime<Utc>, ParseError> {
    DateTime::parse_from_rfc3339(token)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|_| ParseError::InvalidField {
            field,
            value: token.to_string(),
        })
}

fn format_date(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}
