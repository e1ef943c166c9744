use chrono::{DateTime, Duration, Utc};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Serialize;
use std::sync::{Arc, Mutex};

use crate::config::AppConfig;
use crate::entities::{CustomerOrderModel, OrderSimulationModel, OrderStatus};

/// Source of the random offsets used to schedule deliveries.
pub trait DeliveryRng: Send + Sync {
    /// Whole hours in `min..=max`.
    fn hours_between(&self, min: i64, max: i64) -> i64;
}

/// `StdRng`-backed source; a fixed seed makes schedules reproducible.
pub struct SeededDeliveryRng {
    inner: Mutex<StdRng>,
}

impl SeededDeliveryRng {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            inner: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            inner: Mutex::new(StdRng::from_entropy()),
        }
    }
}

impl DeliveryRng for SeededDeliveryRng {
    fn hours_between(&self, min: i64, max: i64) -> i64 {
        if max <= min {
            return min;
        }
        let mut rng = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        rng.gen_range(min..=max)
    }
}

/// Bounds, in hours, of the two legs of a simulated delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryWindow {
    pub out_for_delivery_min_hours: i64,
    pub out_for_delivery_max_hours: i64,
    pub delivery_min_hours: i64,
    pub delivery_max_hours: i64,
}

impl Default for DeliveryWindow {
    fn default() -> Self {
        Self {
            out_for_delivery_min_hours: 12,
            out_for_delivery_max_hours: 48,
            delivery_min_hours: 4,
            delivery_max_hours: 36,
        }
    }
}

impl From<&AppConfig> for DeliveryWindow {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            out_for_delivery_min_hours: cfg.out_for_delivery_min_hours,
            out_for_delivery_max_hours: cfg.out_for_delivery_max_hours,
            delivery_min_hours: cfg.delivery_min_hours,
            delivery_max_hours: cfg.delivery_max_hours,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeliveryMilestones {
    pub out_for_delivery_date: DateTime<Utc>,
    pub delivery_date: DateTime<Utc>,
}

/// Outcome of evaluating an order against its milestones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub status: OrderStatus,
    pub estimated_delivery_date: Option<DateTime<Utc>>,
}

/// Precomputes milestone dates for new orders and decides, on read, which
/// status an order has reached.
pub struct DeliverySimulator {
    window: DeliveryWindow,
    rng: Arc<dyn DeliveryRng>,
}

impl DeliverySimulator {
    pub fn new(window: DeliveryWindow, rng: Arc<dyn DeliveryRng>) -> Self {
        Self { window, rng }
    }

    pub fn from_config(cfg: &AppConfig) -> Self {
        let rng: Arc<dyn DeliveryRng> = match cfg.delivery_seed {
            Some(seed) => Arc::new(SeededDeliveryRng::from_seed(seed)),
            None => Arc::new(SeededDeliveryRng::from_entropy()),
        };
        Self::new(DeliveryWindow::from(cfg), rng)
    }

    /// Out for delivery lands inside the first window after placement and
    /// delivery inside the second window after that, so delivery is always
    /// strictly later.
    pub fn schedule(&self, placed_at: DateTime<Utc>) -> DeliveryMilestones {
        let w = &self.window;
        let first_leg = self
            .rng
            .hours_between(w.out_for_delivery_min_hours, w.out_for_delivery_max_hours);
        let second_leg = self
            .rng
            .hours_between(w.delivery_min_hours, w.delivery_max_hours)
            .max(1);

        let out_for_delivery_date = placed_at + Duration::hours(first_leg);
        DeliveryMilestones {
            out_for_delivery_date,
            delivery_date: out_for_delivery_date + Duration::hours(second_leg),
        }
    }
}

impl std::fmt::Debug for DeliverySimulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliverySimulator")
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}

/// Status transition rule, evaluated lazily whenever orders are read.
///
/// A single evaluation moves straight to `Delivered` once the delivery date
/// has passed, never stopping at `OutForDelivery` on the way. Terminal
/// orders are left alone.
pub fn next_status(
    order: &CustomerOrderModel,
    milestones: &OrderSimulationModel,
    now: DateTime<Utc>,
) -> Option<StatusChange> {
    if order.order_status.is_terminal() {
        return None;
    }

    if now >= milestones.delivery_date {
        return Some(StatusChange {
            status: OrderStatus::Delivered,
            estimated_delivery_date: order
                .estimated_delivery_date
                .or(Some(milestones.delivery_date)),
        });
    }

    if order.order_status == OrderStatus::Processing && now >= milestones.out_for_delivery_date {
        return Some(StatusChange {
            status: OrderStatus::OutForDelivery,
            estimated_delivery_date: Some(milestones.delivery_date),
        });
    }

    None
}
