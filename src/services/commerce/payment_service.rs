use crate::{
    entities::{CardDetails, CardSummary, PaymentMethod, PaymentModel, PaymentStatus},
    errors::ServiceError,
    events::{Event, EventSender},
    repositories::{CheckoutRepository, PaymentRepository},
};
use sea_orm::{ConnectionTrait, DatabaseConnection, TransactionTrait};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use validator::Validate;

/// Route the client should call next when card details are needed.
pub const DIGITAL_PAYMENT_ROUTE: &str = "/api/v1/checkout/payment/digital";

/// Result of choosing a payment method for the active checkout.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PaymentSelection {
    /// A new payment was created and attached to the session.
    Attached { payment: PaymentModel },
    /// The attached payment switched method.
    Changed { payment: PaymentModel },
    /// The session already uses the requested method.
    Unchanged { payment: PaymentModel },
    /// Nothing was written; card details must be submitted first.
    CardDetailsRequired {
        #[serde(rename = "nextApi")]
        next_api: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DigitalPaymentReceipt {
    pub payment: PaymentModel,
    pub card: CardSummary,
    pub transaction_id: i32,
}

/// Payment ledger: methods, statuses and card transactions.
#[derive(Clone)]
pub struct PaymentService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    payments: PaymentRepository,
    checkouts: CheckoutRepository,
}

impl PaymentService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db,
            event_sender,
            payments: PaymentRepository,
            checkouts: CheckoutRepository,
        }
    }

    /// Chooses how the active checkout will be paid.
    #[instrument(skip(self))]
    pub async fn set_payment(
        &self,
        customer_id: i32,
        method: PaymentMethod,
    ) -> Result<PaymentSelection, ServiceError> {
        let txn = self.db.begin().await?;
        let session = self
            .checkouts
            .find_session(&txn, customer_id)
            .await?
            .ok_or(ServiceError::NoActiveSession { customer_id })?;

        let selection = match (session.payment_id, method) {
            (None, PaymentMethod::Cod) => {
                let payment = self
                    .payments
                    .insert(&txn, customer_id, PaymentMethod::Cod, session.amount)
                    .await?;
                self.attach(&txn, customer_id, payment.payment_id).await?;
                PaymentSelection::Attached { payment }
            }
            (None, PaymentMethod::Digital) => card_details_required(),
            (Some(payment_id), method) => {
                let payment = self.pending_payment(&txn, payment_id, method).await?;
                if payment.method == method {
                    PaymentSelection::Unchanged { payment }
                } else if method == PaymentMethod::Digital {
                    card_details_required()
                } else {
                    // digital -> cod drops the card link
                    self.payments.delete_transactions(&txn, payment_id).await?;
                    self.payments
                        .set_method(&txn, payment_id, PaymentMethod::Cod)
                        .await?;
                    PaymentSelection::Changed {
                        payment: PaymentModel {
                            method: PaymentMethod::Cod,
                            ..payment
                        },
                    }
                }
            }
        };
        txn.commit().await?;

        match &selection {
            PaymentSelection::Attached { payment } => {
                info!(customer_id, payment_id = payment.payment_id, "Attached cash-on-delivery payment");
                self.event_sender
                    .send_or_log(Event::PaymentAttached {
                        customer_id,
                        payment_id: payment.payment_id,
                        method: payment.method,
                    })
                    .await;
            }
            PaymentSelection::Changed { payment } => {
                info!(customer_id, payment_id = payment.payment_id, "Switched payment to cash on delivery");
                self.event_sender
                    .send_or_log(Event::PaymentMethodChanged {
                        customer_id,
                        payment_id: payment.payment_id,
                        method: payment.method,
                    })
                    .await;
            }
            PaymentSelection::Unchanged { .. } => {}
            PaymentSelection::CardDetailsRequired { .. } => {
                info!(customer_id, "Digital payment requested; waiting for card details");
            }
        }

        Ok(selection)
    }

    /// Charges a stored card for the active checkout.
    ///
    /// With a payment already attached the card is linked to it and its
    /// method becomes digital. Otherwise a new digital payment for the
    /// session amount is created and attached. Either way one transaction.
    #[instrument(skip(self, card))]
    pub async fn process_digital_payment(
        &self,
        customer_id: i32,
        card: &CardDetails,
    ) -> Result<DigitalPaymentReceipt, ServiceError> {
        card.validate()?;

        let txn = self.db.begin().await?;
        let session = self
            .checkouts
            .find_session(&txn, customer_id)
            .await?
            .ok_or(ServiceError::NoActiveSession { customer_id })?;

        let stored = self.payments.find_card(&txn, card).await?.ok_or_else(|| {
            warn!(customer_id, "Presented card matches no stored card");
            ServiceError::CardNotFound
        })?;

        let (payment, attached) = match session.payment_id {
            Some(payment_id) => {
                let payment = self
                    .payments
                    .find(&txn, payment_id)
                    .await?
                    .ok_or(ServiceError::PaymentNotFound { payment_id })?;
                if payment.status != PaymentStatus::Pending {
                    return Err(status_conflict(payment_id, payment.status));
                }
                if self
                    .payments
                    .transaction_exists(&txn, stored.card_id, payment_id)
                    .await?
                {
                    return Err(ServiceError::TransactionAlreadyRecorded {
                        card_id: stored.card_id,
                        payment_id,
                    });
                }
                self.payments.delete_transactions(&txn, payment_id).await?;
                self.payments
                    .set_method(&txn, payment_id, PaymentMethod::Digital)
                    .await?;
                (
                    PaymentModel {
                        method: PaymentMethod::Digital,
                        ..payment
                    },
                    false,
                )
            }
            None => {
                let payment = self
                    .payments
                    .insert(&txn, customer_id, PaymentMethod::Digital, session.amount)
                    .await?;
                self.attach(&txn, customer_id, payment.payment_id).await?;
                (payment, true)
            }
        };

        let transaction = self
            .payments
            .insert_transaction(&txn, stored.card_id, payment.payment_id)
            .await?;
        txn.commit().await?;

        info!(
            customer_id,
            payment_id = payment.payment_id,
            card_id = stored.card_id,
            "Recorded digital payment"
        );
        if attached {
            self.event_sender
                .send_or_log(Event::PaymentAttached {
                    customer_id,
                    payment_id: payment.payment_id,
                    method: PaymentMethod::Digital,
                })
                .await;
        }
        self.event_sender
            .send_or_log(Event::DigitalPaymentRecorded {
                customer_id,
                payment_id: payment.payment_id,
                card_id: stored.card_id,
            })
            .await;

        Ok(DigitalPaymentReceipt {
            card: CardSummary::from(&stored),
            transaction_id: transaction.transaction_id,
            payment,
        })
    }

    /// `pending -> paid`.
    #[instrument(skip(self))]
    pub async fn make_payment(
        &self,
        customer_id: i32,
        payment_id: i32,
    ) -> Result<PaymentModel, ServiceError> {
        let payment = self
            .transition(customer_id, payment_id, PaymentStatus::Pending, PaymentStatus::Paid)
            .await?;

        info!(customer_id, payment_id, "Payment captured");
        self.event_sender
            .send_or_log(Event::PaymentCaptured {
                customer_id,
                payment_id,
            })
            .await;
        Ok(payment)
    }

    /// `paid -> refund`.
    #[instrument(skip(self))]
    pub async fn refund_payment(
        &self,
        customer_id: i32,
        payment_id: i32,
    ) -> Result<PaymentModel, ServiceError> {
        let payment = self
            .transition(customer_id, payment_id, PaymentStatus::Paid, PaymentStatus::Refund)
            .await?;

        info!(customer_id, payment_id, "Payment refunded");
        self.event_sender
            .send_or_log(Event::PaymentRefunded {
                customer_id,
                payment_id,
            })
            .await;
        Ok(payment)
    }

    pub async fn get_payment(
        &self,
        customer_id: i32,
        payment_id: i32,
    ) -> Result<PaymentModel, ServiceError> {
        let payment = self
            .payments
            .find(&*self.db, payment_id)
            .await?
            .ok_or(ServiceError::PaymentNotFound { payment_id })?;
        if payment.customer_id != customer_id {
            return Err(ServiceError::PaymentNotOwned {
                payment_id,
                customer_id,
            });
        }
        Ok(payment)
    }

    /// Stores a card that later digital payments can match against.
    #[instrument(skip(self, card))]
    pub async fn register_card(
        &self,
        holder_name: &str,
        card: &CardDetails,
    ) -> Result<CardSummary, ServiceError> {
        card.validate()?;
        if holder_name.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "holder name must not be blank".to_string(),
            ));
        }

        let stored = self
            .payments
            .insert_card(&*self.db, holder_name.trim(), card)
            .await?;
        info!(card_id = stored.card_id, brand = %stored.brand, "Registered payment card");
        Ok(CardSummary::from(&stored))
    }

    async fn transition(
        &self,
        customer_id: i32,
        payment_id: i32,
        from: PaymentStatus,
        to: PaymentStatus,
    ) -> Result<PaymentModel, ServiceError> {
        let txn = self.db.begin().await?;
        let payment = self
            .payments
            .find(&txn, payment_id)
            .await?
            .ok_or(ServiceError::PaymentNotFound { payment_id })?;
        if payment.customer_id != customer_id {
            return Err(ServiceError::PaymentNotOwned {
                payment_id,
                customer_id,
            });
        }

        if payment.status != from {
            return Err(status_conflict(payment_id, payment.status));
        }
        if self
            .payments
            .transition_status(&txn, payment_id, from, to)
            .await?
            == 0
        {
            // lost a race with another transition
            let current = self
                .payments
                .find(&txn, payment_id)
                .await?
                .map(|p| p.status)
                .unwrap_or(to);
            return Err(status_conflict(payment_id, current));
        }
        txn.commit().await?;

        Ok(PaymentModel {
            status: to,
            ..payment
        })
    }

    /// Links a freshly inserted payment to the session. Losing the race to
    /// another attach, settle or abort fails the whole transaction.
    async fn attach<C>(&self, conn: &C, customer_id: i32, payment_id: i32) -> Result<(), ServiceError>
    where
        C: ConnectionTrait,
    {
        if self.checkouts.attach_payment(conn, customer_id, payment_id).await? == 0 {
            warn!(customer_id, payment_id, "Checkout session changed while attaching payment");
            return Err(ServiceError::PaymentAlreadyAttached { customer_id });
        }
        Ok(())
    }

    /// Loads an attached payment. Switching to another method is only allowed
    /// while it is pending.
    async fn pending_payment<C>(
        &self,
        conn: &C,
        payment_id: i32,
        requested: PaymentMethod,
    ) -> Result<PaymentModel, ServiceError>
    where
        C: ConnectionTrait,
    {
        let payment = self
            .payments
            .find(conn, payment_id)
            .await?
            .ok_or(ServiceError::PaymentNotFound { payment_id })?;
        if payment.method != requested && payment.status != PaymentStatus::Pending {
            return Err(status_conflict(payment_id, payment.status));
        }
        Ok(payment)
    }
}

fn card_details_required() -> PaymentSelection {
    PaymentSelection::CardDetailsRequired {
        next_api: DIGITAL_PAYMENT_ROUTE,
    }
}

/// Error for a payment found in a status the caller cannot act on.
fn status_conflict(payment_id: i32, status: PaymentStatus) -> ServiceError {
    match status {
        PaymentStatus::Pending => ServiceError::NotPaid { payment_id },
        PaymentStatus::Paid => ServiceError::AlreadyPaid { payment_id },
        PaymentStatus::Refund => ServiceError::AlreadyRefunded { payment_id },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn status_conflicts_name_the_current_status() {
        assert_matches!(status_conflict(4, PaymentStatus::Paid), ServiceError::AlreadyPaid { payment_id: 4 });
        assert_matches!(
            status_conflict(4, PaymentStatus::Refund),
            ServiceError::AlreadyRefunded { payment_id: 4 }
        );
        assert_matches!(status_conflict(4, PaymentStatus::Pending), ServiceError::NotPaid { payment_id: 4 });
    }

    #[test]
    fn card_details_required_points_at_digital_route() {
        let json = serde_json::to_value(card_details_required()).unwrap();
        assert_eq!(json["outcome"], "card_details_required");
        assert_eq!(json["nextApi"], DIGITAL_PAYMENT_ROUTE);
    }
}
