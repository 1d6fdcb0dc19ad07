//! Inbound booking request and its validation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::model::CancellationPolicy;
use super::value_objects::{
    ContactInfo, Currency, DateRange, Money, PaymentMethod, ProviderId, ServiceType,
};
use crate::error::ValidationError;

/// Booking creation payload.
///
/// The booked period is given either as a `dateRange`, as flat
/// `startDate`/`endDate` fields, or (guide bookings) as a single `tourDate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    #[serde(default)]
    pub user_id: String,
    pub service_type: Option<ServiceType>,
    #[serde(default)]
    pub service_id: String,
    pub service_name: Option<String>,
    #[serde(default)]
    pub provider_id: String,
    pub package_id: Option<String>,
    pub date_range: Option<DateRange>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub tour_date: Option<DateTime<Utc>>,
    pub quantity: Option<u32>,
    pub total_amount: Option<Money>,
    pub currency: Option<String>,
    pub payment_method: Option<PaymentMethod>,
    pub cancellation_policy: Option<CancellationPolicy>,
    pub contact_info: Option<ContactInfo>,
    pub notes: Option<String>,
}

/// A validated request, ready to become a `pending` booking.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBooking {
    pub user_id: String,
    pub service_type: ServiceType,
    pub service_id: String,
    pub service_name: Option<String>,
    pub provider_id: ProviderId,
    pub package_id: Option<String>,
    pub date_range: DateRange,
    pub quantity: u32,
    pub total_amount: Money,
    pub currency: Currency,
    pub payment_method: PaymentMethod,
    pub cancellation_policy: CancellationPolicy,
    pub contact_info: ContactInfo,
    pub notes: Option<String>,
}

impl BookingRequest {
    /// Checks the request shape, collecting every problem found.
    pub fn validate(&self, default_currency: &Currency) -> Result<NewBooking, ValidationError> {
        let mut problems = Vec::new();

        require(&mut problems, "userId", &self.user_id);
        require(&mut problems, "serviceId", &self.service_id);
        require(&mut problems, "providerId", &self.provider_id);

        if self.service_type.is_none() {
            problems.push("serviceType is required".to_string());
        }

        let date_range = self.resolve_date_range(&mut problems);

        let quantity = self.quantity.unwrap_or(1);
        if quantity == 0 {
            problems.push("quantity must be at least 1".to_string());
        }

        match self.total_amount {
            None => problems.push("totalAmount is required".to_string()),
            Some(amount) if amount.is_negative() => {
                problems.push("totalAmount must not be negative".to_string())
            }
            Some(_) => {}
        }

        let currency = match self.currency.as_deref() {
            None => Some(default_currency.clone()),
            Some(code) => Currency::new(code)
                .map_err(|msg| problems.push(msg))
                .ok(),
        };

        match &self.contact_info {
            None => problems.push("contactInfo is required".to_string()),
            Some(contact) => {
                if !contact.email.contains('@') {
                    problems.push("contactInfo.email must be a valid email".to_string());
                }
                if contact.phone.trim().is_empty() {
                    problems.push("contactInfo.phone is required".to_string());
                }
            }
        }

        let (
            true,
            Some(service_type),
            Some(date_range),
            Some(total_amount),
            Some(currency),
            Some(contact),
        ) = (
            problems.is_empty(),
            self.service_type,
            date_range,
            self.total_amount,
            currency,
            &self.contact_info,
        )
        else {
            return Err(ValidationError::new(problems));
        };

        Ok(NewBooking {
            user_id: self.user_id.trim().to_string(),
            service_type,
            service_id: self.service_id.trim().to_string(),
            service_name: self.service_name.clone(),
            provider_id: ProviderId::new(self.provider_id.trim()),
            package_id: self.package_id.clone(),
            date_range,
            quantity,
            total_amount,
            currency,
            payment_method: self.payment_method.unwrap_or_default(),
            cancellation_policy: self.cancellation_policy.unwrap_or_default(),
            contact_info: contact.clone(),
            notes: self.notes.clone(),
        })
    }

    fn resolve_date_range(&self, problems: &mut Vec<String>) -> Option<DateRange> {
        let explicit = match (self.date_range, self.start_date, self.end_date) {
            (Some(range), _, _) => Some((range.start_date, range.end_date)),
            (None, Some(start), Some(end)) => Some((start, end)),
            (None, Some(_), None) => {
                problems.push("endDate is required when startDate is given".to_string());
                return None;
            }
            (None, None, Some(_)) => {
                problems.push("startDate is required when endDate is given".to_string());
                return None;
            }
            (None, None, None) => None,
        };

        match (explicit, self.tour_date) {
            (Some((start, end)), _) => DateRange::new(start, end)
                .map_err(|msg| problems.push(msg))
                .ok(),
            (None, Some(tour_date)) if self.service_type == Some(ServiceType::Guide) => {
                Some(DateRange::single_day(tour_date))
            }
            (None, Some(_)) => {
                problems.push("tourDate is only accepted for guide bookings".to_string());
                None
            }
            (None, None) => {
                problems.push("a dateRange (startDate/endDate) or tourDate is required".to_string());
                None
            }
        }
    }
}

fn require(problems: &mut Vec<String>, field: &str, value: &str) {
    if value.trim().is_empty() {
        problems.push(format!("{field} is required"));
    }
}
