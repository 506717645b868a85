//! Order lifecycle rules
//!
//! Pure transition logic over [`DeliveryState`] and [`PaymentState`]. The
//! order service checks a [`Transition`] here first and then hands the
//! allowed source states to the store, which applies the change as a single
//! conditional update.

use std::fmt;

use crate::models::{DeliveryState, PaymentState};

/// States from which a buyer may still cancel.
pub const CANCELLABLE: [DeliveryState; 3] = [
    DeliveryState::Ordered,
    DeliveryState::Picking,
    DeliveryState::Packing,
];

impl DeliveryState {
    pub const ALL: [DeliveryState; 8] = [
        DeliveryState::Ordered,
        DeliveryState::ReceivedByPlatform,
        DeliveryState::Picking,
        DeliveryState::Packing,
        DeliveryState::Shipping,
        DeliveryState::Delivered,
        DeliveryState::Received,
        DeliveryState::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryState::Ordered => "Ordered Successfully",
            DeliveryState::ReceivedByPlatform => "Platform Received",
            DeliveryState::Picking => "Getting Product",
            DeliveryState::Packing => "Packing",
            DeliveryState::Shipping => "Shipping",
            DeliveryState::Delivered => "Delivered",
            DeliveryState::Received => "Received",
            DeliveryState::Cancelled => "Cancelled",
        }
    }

    /// Position in the delivery sequence; `None` for `Cancelled`.
    fn rank(&self) -> Option<u8> {
        match self {
            DeliveryState::Ordered => Some(0),
            DeliveryState::ReceivedByPlatform => Some(1),
            DeliveryState::Picking => Some(2),
            DeliveryState::Packing => Some(3),
            DeliveryState::Shipping => Some(4),
            DeliveryState::Delivered => Some(5),
            DeliveryState::Received => Some(6),
            DeliveryState::Cancelled => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DeliveryState::Received | DeliveryState::Cancelled)
    }

    pub fn can_cancel(&self) -> bool {
        CANCELLABLE.contains(self)
    }
}

impl fmt::Display for DeliveryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PaymentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentState::Pending => "Pending",
            PaymentState::Paid => "Paid",
            PaymentState::Failed => "Failed",
        }
    }

    pub fn is_settled(&self) -> bool {
        !matches!(self, PaymentState::Pending)
    }
}

impl fmt::Display for PaymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A requested change of delivery state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Cancel,
    ConfirmReceived,
    /// Seller-side progress, strictly forward and never past `Delivered`.
    Advance(DeliveryState),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    IllegalFrom {
        transition: Transition,
        current: DeliveryState,
    },
    UnreachableTarget(DeliveryState),
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionError::IllegalFrom { transition, current } => write!(
                f,
                "Cannot {} order with current state {}",
                transition.verb(),
                current
            ),
            TransitionError::UnreachableTarget(target) => {
                write!(f, "State {} cannot be set directly", target)
            }
        }
    }
}

impl Transition {
    pub fn verb(&self) -> &'static str {
        match self {
            Transition::Cancel => "cancel",
            Transition::ConfirmReceived => "confirm",
            Transition::Advance(_) => "advance",
        }
    }

    pub fn target(&self) -> DeliveryState {
        match self {
            Transition::Cancel => DeliveryState::Cancelled,
            Transition::ConfirmReceived => DeliveryState::Received,
            Transition::Advance(target) => *target,
        }
    }

    /// Confirming receipt settles the payment regardless of its prior state.
    pub fn forces_paid(&self) -> bool {
        matches!(self, Transition::ConfirmReceived)
    }

    /// Source states from which this transition is legal.
    pub fn allowed_from(&self) -> Vec<DeliveryState> {
        match self {
            Transition::Cancel => CANCELLABLE.to_vec(),
            Transition::ConfirmReceived => vec![DeliveryState::Delivered],
            Transition::Advance(target) => match target.rank() {
                Some(rank) if Self::is_advance_target(*target) => DeliveryState::ALL
                    .iter()
                    .copied()
                    .filter(|state| state.rank().is_some_and(|r| r < rank))
                    .collect(),
                _ => Vec::new(),
            },
        }
    }

    fn is_advance_target(target: DeliveryState) -> bool {
        !matches!(
            target,
            DeliveryState::Ordered | DeliveryState::Received | DeliveryState::Cancelled
        )
    }

    /// Check the transition against the current state.
    pub fn check(&self, current: DeliveryState) -> Result<DeliveryState, TransitionError> {
        if let Transition::Advance(target) = self {
            if !Self::is_advance_target(*target) {
                return Err(TransitionError::UnreachableTarget(*target));
            }
        }

        if self.allowed_from().contains(&current) {
            Ok(self.target())
        } else {
            Err(TransitionError::IllegalFrom {
                transition: *self,
                current,
            })
        }
    }
}
