//! Internal order status model.
//!
//! Every sales channel speaks its own status vocabulary; the channel
//! modules in `sewmart-channels` map those onto this single enumeration.
//! Transitions are validated against an explicit table so a stray webhook
//! redelivery or an out-of-order marketplace poll cannot walk an order
//! backwards through its lifecycle.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Lifecycle state of an order, shared across all sales channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Just registered; not yet confirmed by a manager or a channel.
    New,
    /// Confirmed for fulfilment.
    Confirmed,
    /// Items are being picked from stock.
    Assembling,
    /// Picked and packed, ready to hand to the carrier.
    Assembled,
    /// Handed to the carrier or marketplace logistics.
    Shipped,
    /// Received by the customer.
    Delivered,
    /// Closed successfully.
    Done,
    /// Needs manual attention (mismatched payment, failed push, etc.).
    Problem,
    /// Shipped but never picked up by the customer.
    Unclaimed,
    /// On its way back to the warehouse.
    Returning,
    /// Returned to the warehouse and closed.
    Returned,
    /// Cancelled before completion.
    Cancelled,
}

impl OrderStatus {
    /// Every status, in lifecycle order. Useful for building SQL filter
    /// sets from the predicates below.
    pub const ALL: [Self; 12] = [
        Self::New,
        Self::Confirmed,
        Self::Assembling,
        Self::Assembled,
        Self::Shipped,
        Self::Delivered,
        Self::Done,
        Self::Problem,
        Self::Unclaimed,
        Self::Returning,
        Self::Returned,
        Self::Cancelled,
    ];

    /// Stable lowercase identifier, used for storage and APIs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Confirmed => "confirmed",
            Self::Assembling => "assembling",
            Self::Assembled => "assembled",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Done => "done",
            Self::Problem => "problem",
            Self::Unclaimed => "unclaimed",
            Self::Returning => "returning",
            Self::Returned => "returned",
            Self::Cancelled => "cancelled",
        }
    }

    /// Terminal states admit no further transitions.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Returned | Self::Cancelled)
    }

    /// States whose order lines still reserve stock: the goods are
    /// committed but have not physically left the warehouse.
    #[must_use]
    pub fn reserves_stock(self) -> bool {
        matches!(
            self,
            Self::New | Self::Confirmed | Self::Assembling | Self::Assembled
        )
    }

    /// Whether moving from `self` to `to` is a legal lifecycle step.
    ///
    /// A transition to the same status is always legal so that webhook
    /// redeliveries stay idempotent.
    #[must_use]
    pub fn can_transition(self, to: Self) -> bool {
        if self == to {
            return true;
        }
        match self {
            Self::New => matches!(to, Self::Confirmed | Self::Problem | Self::Cancelled),
            Self::Confirmed => matches!(
                to,
                Self::Assembling | Self::Assembled | Self::Problem | Self::Cancelled
            ),
            Self::Assembling => {
                matches!(to, Self::Assembled | Self::Problem | Self::Cancelled)
            }
            Self::Assembled => matches!(to, Self::Shipped | Self::Problem | Self::Cancelled),
            Self::Shipped => matches!(
                to,
                Self::Delivered | Self::Unclaimed | Self::Returning | Self::Problem
            ),
            Self::Delivered => matches!(to, Self::Done | Self::Returning | Self::Problem),
            Self::Problem => matches!(
                to,
                Self::Confirmed
                    | Self::Assembling
                    | Self::Assembled
                    | Self::Shipped
                    | Self::Delivered
                    | Self::Done
                    | Self::Cancelled
            ),
            Self::Unclaimed => matches!(to, Self::Returning | Self::Problem),
            Self::Returning => matches!(to, Self::Returned | Self::Problem),
            Self::Done | Self::Returned | Self::Cancelled => false,
        }
    }

    /// The forward fulfilment chain, used to walk a lagging order up to
    /// the state a channel reports.
    const FULFILMENT_CHAIN: [Self; 6] = [
        Self::New,
        Self::Confirmed,
        Self::Assembling,
        Self::Assembled,
        Self::Shipped,
        Self::Delivered,
    ];

    /// Legal steps that take an order from `self` to `to`.
    ///
    /// A directly legal transition yields just `to`. When `to` lies
    /// further ahead on the fulfilment chain (the poller was down, or a
    /// marketplace order was first seen past `Confirmed`), the
    /// intermediate chain states are included so every step stays
    /// inside the transition table. Returns `None` when `to` is not
    /// reachable going forward.
    #[must_use]
    pub fn catch_up_path(self, to: Self) -> Option<Vec<Self>> {
        if self.can_transition(to) {
            return Some(vec![to]);
        }
        let from_pos = Self::FULFILMENT_CHAIN.iter().position(|s| *s == self)?;
        let to_pos = Self::FULFILMENT_CHAIN.iter().position(|s| *s == to)?;
        if to_pos <= from_pos {
            return None;
        }
        Some(Self::FULFILMENT_CHAIN[from_pos + 1..=to_pos].to_vec())
    }

    /// Validates the transition, returning a typed error on an illegal step.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::IllegalTransition`] if the step is not in the
    /// transition table.
    pub fn transition(self, to: Self) -> Result<Self, CoreError> {
        if self.can_transition(to) {
            Ok(to)
        } else {
            Err(CoreError::IllegalTransition { from: self, to })
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(Self::New),
            "confirmed" => Ok(Self::Confirmed),
            "assembling" => Ok(Self::Assembling),
            "assembled" => Ok(Self::Assembled),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "done" => Ok(Self::Done),
            "problem" => Ok(Self::Problem),
            "unclaimed" => Ok(Self::Unclaimed),
            "returning" => Ok(Self::Returning),
            "returned" => Ok(Self::Returned),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(CoreError::UnknownStatus(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [OrderStatus; 12] = OrderStatus::ALL;

    #[test]
    fn round_trips_through_strings() {
        for status in ALL {
            let parsed: OrderStatus = status.as_str().parse().expect("parse back");
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn unknown_status_is_an_error() {
        assert!("paid".parse::<OrderStatus>().is_err());
        assert!("".parse::<OrderStatus>().is_err());
        assert!("New".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn terminal_states_admit_no_transitions() {
        for from in [
            OrderStatus::Done,
            OrderStatus::Returned,
            OrderStatus::Cancelled,
        ] {
            for to in ALL {
                if to == from {
                    assert!(from.can_transition(to), "self-transition must be legal");
                } else {
                    assert!(!from.can_transition(to), "{from} -> {to} must be illegal");
                }
            }
        }
    }

    #[test]
    fn happy_path_is_legal_end_to_end() {
        let path = [
            OrderStatus::New,
            OrderStatus::Confirmed,
            OrderStatus::Assembling,
            OrderStatus::Assembled,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Done,
        ];
        for pair in path.windows(2) {
            assert!(
                pair[0].can_transition(pair[1]),
                "{} -> {} must be legal",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn orders_cannot_walk_backwards() {
        assert!(!OrderStatus::Shipped.can_transition(OrderStatus::New));
        assert!(!OrderStatus::Delivered.can_transition(OrderStatus::Assembling));
        assert!(!OrderStatus::Confirmed.can_transition(OrderStatus::New));
    }

    #[test]
    fn catch_up_path_walks_lagging_orders_forward() {
        assert_eq!(
            OrderStatus::New.catch_up_path(OrderStatus::Assembled),
            Some(vec![
                OrderStatus::Confirmed,
                OrderStatus::Assembling,
                OrderStatus::Assembled,
            ])
        );
        assert_eq!(
            OrderStatus::New.catch_up_path(OrderStatus::Delivered),
            Some(vec![
                OrderStatus::Confirmed,
                OrderStatus::Assembling,
                OrderStatus::Assembled,
                OrderStatus::Shipped,
                OrderStatus::Delivered,
            ])
        );
        assert_eq!(
            OrderStatus::Confirmed.catch_up_path(OrderStatus::Shipped),
            Some(vec![
                OrderStatus::Assembling,
                OrderStatus::Assembled,
                OrderStatus::Shipped,
            ])
        );
    }

    #[test]
    fn catch_up_path_steps_are_all_legal() {
        for from in ALL {
            for to in ALL {
                let Some(path) = from.catch_up_path(to) else {
                    continue;
                };
                let mut current = from;
                for step in path {
                    assert!(
                        current.can_transition(step),
                        "{current} -> {step} must be legal on the way to {to}"
                    );
                    current = step;
                }
                assert_eq!(current, to);
            }
        }
    }

    #[test]
    fn catch_up_path_is_single_step_when_direct() {
        assert_eq!(
            OrderStatus::New.catch_up_path(OrderStatus::Confirmed),
            Some(vec![OrderStatus::Confirmed])
        );
        assert_eq!(
            OrderStatus::New.catch_up_path(OrderStatus::Cancelled),
            Some(vec![OrderStatus::Cancelled])
        );
        assert_eq!(
            OrderStatus::Shipped.catch_up_path(OrderStatus::Shipped),
            Some(vec![OrderStatus::Shipped])
        );
    }

    #[test]
    fn catch_up_path_never_walks_backwards_or_out_of_terminal() {
        assert_eq!(OrderStatus::Shipped.catch_up_path(OrderStatus::Confirmed), None);
        assert_eq!(OrderStatus::Done.catch_up_path(OrderStatus::Delivered), None);
        assert_eq!(OrderStatus::Cancelled.catch_up_path(OrderStatus::Confirmed), None);
        assert_eq!(OrderStatus::Delivered.catch_up_path(OrderStatus::Shipped), None);
    }

    #[test]
    fn transition_returns_typed_error() {
        let err = OrderStatus::Done
            .transition(OrderStatus::New)
            .expect_err("done is terminal");
        assert!(matches!(
            err,
            CoreError::IllegalTransition {
                from: OrderStatus::Done,
                to: OrderStatus::New
            }
        ));
    }

    #[test]
    fn reservation_ends_at_shipment() {
        assert!(OrderStatus::New.reserves_stock());
        assert!(OrderStatus::Assembled.reserves_stock());
        assert!(!OrderStatus::Shipped.reserves_stock());
        assert!(!OrderStatus::Cancelled.reserves_stock());
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&OrderStatus::Assembling).expect("serialize");
        assert_eq!(json, "\"assembling\"");
        let back: OrderStatus = serde_json::from_str("\"returning\"").expect("deserialize");
        assert_eq!(back, OrderStatus::Returning);
    }
}
