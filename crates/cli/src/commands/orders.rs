//! Order management commands.
//!
//! Payment status is owned by the webhook; these commands only move the
//! fulfillment status along its allowed transitions.

use chrono::Utc;
use openme_core::OrderStatus;
use openme_storefront::db::{OrderStore, PgOrderStore, Transition};

use super::CommandError;

async fn store() -> Result<PgOrderStore, CommandError> {
    Ok(PgOrderStore::new(super::connect().await?))
}

/// Print an order as pretty JSON.
pub async fn show(order_number: &str) -> Result<(), CommandError> {
    let order = store()
        .await?
        .get_by_number(order_number)
        .await?
        .ok_or_else(|| CommandError::OrderNotFound(order_number.to_owned()))?;

    #[allow(clippy::print_stdout)]
    {
        println!("{}", serde_json::to_string_pretty(&order)?);
    }
    Ok(())
}

/// Apply a fulfillment transition, refusing moves the state machine forbids.
pub async fn advance(order_number: &str, to: OrderStatus) -> Result<(), CommandError> {
    let store = store().await?;
    let order = store
        .get_by_number(order_number)
        .await?
        .ok_or_else(|| CommandError::OrderNotFound(order_number.to_owned()))?;

    if !order.status.can_transition_to(to) {
        return Err(CommandError::InvalidTransition {
            order_number: order_number.to_owned(),
            from: order.status,
            to,
        });
    }

    match store.update_status(order.id, order.status, to, Utc::now()).await? {
        Transition::Applied(_) => {
            tracing::info!(order_number, from = %order.status, to = %to, "Order status updated");
            Ok(())
        }
        Transition::AlreadyApplied => Err(CommandError::Concurrent(order_number.to_owned())),
        Transition::NotFound => Err(CommandError::OrderNotFound(order_number.to_owned())),
    }
}
