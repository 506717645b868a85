//! Who may do what to an order
//!
//! Every guarded operation is listed once in [`requirement`]; handlers call
//! [`authorize`] with the action and, where it matters, the owner of the
//! order being touched.

use uuid::Uuid;

use super::AuthenticatedUser;
use crate::error::ApiError;
use crate::models::UserRole;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Checkout,
    ViewHistory,
    UpdateOrder,
    DeleteOrder,
    CancelOrder,
    ConfirmOrder,
    AdvanceOrder,
    ViewShopOrders,
    InitiatePayment,
    QueryPayment,
    RefundPayment,
}

impl Action {
    fn verb(&self) -> &'static str {
        match self {
            Action::UpdateOrder => "update",
            Action::DeleteOrder => "delete",
            Action::CancelOrder => "cancel",
            Action::ConfirmOrder => "confirm",
            Action::AdvanceOrder => "advance",
            Action::InitiatePayment => "pay for",
            _ => "access",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Requirement {
    Authenticated,
    Owner,
    OwnerOr(&'static [UserRole]),
    Role(&'static [UserRole]),
}

const STAFF: &[UserRole] = &[UserRole::Seller, UserRole::Admin];

fn requirement(action: Action) -> Requirement {
    match action {
        Action::Checkout | Action::QueryPayment => Requirement::Authenticated,
        Action::ViewHistory => Requirement::Role(&[UserRole::User, UserRole::Admin]),
        Action::CancelOrder | Action::ConfirmOrder => Requirement::Owner,
        Action::UpdateOrder | Action::DeleteOrder => Requirement::OwnerOr(STAFF),
        Action::InitiatePayment => Requirement::OwnerOr(&[UserRole::Admin]),
        Action::AdvanceOrder | Action::ViewShopOrders | Action::RefundPayment => {
            Requirement::Role(STAFF)
        }
    }
}

/// Check `user` against the requirement of `action`.
///
/// `owner` is the buyer of the order involved, if any.
pub fn authorize(
    user: &AuthenticatedUser,
    action: Action,
    owner: Option<Uuid>,
) -> Result<(), ApiError> {
    let is_owner = owner == Some(user.id);

    let allowed = match requirement(action) {
        Requirement::Authenticated => true,
        Requirement::Owner => is_owner,
        Requirement::OwnerOr(roles) => is_owner || roles.contains(&user.role),
        Requirement::Role(roles) => roles.contains(&user.role),
    };

    if allowed {
        return Ok(());
    }

    tracing::warn!(user_id = %user.id, ?action, "Authorization denied");

    Err(match (requirement(action), owner) {
        (Requirement::Role(_), _) | (_, None) => ApiError::Unauthorized(format!(
            "User role {} is not authorized to access this route",
            role_name(user.role)
        )),
        _ => ApiError::Unauthorized(format!("This user cannot {} this order", action.verb())),
    })
}

fn role_name(role: UserRole) -> &'static str {
    match role {
        UserRole::User => "user",
        UserRole::Seller => "seller",
        UserRole::Admin => "admin",
    }
}
