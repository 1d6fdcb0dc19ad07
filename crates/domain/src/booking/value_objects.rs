//! Value objects for the booking domain.

use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::error::MoneyError;

/// Currency used when a request does not name one.
pub const DEFAULT_CURRENCY: &str = "LKR";

const CONFIRMATION_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const CONFIRMATION_LENGTH: usize = 8;

/// Money amount with exactly two fractional digits.
///
/// Accepted amounts have at most two fractional digits and fit in an `i64`
/// number of minor units. Serialized as a decimal string (`"100.00"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(Decimal);

impl Money {
    fn new(mut amount: Decimal) -> Self {
        amount.rescale(2);
        Self(amount)
    }

    /// Creates a new Money amount from cents.
    pub fn from_cents(cents: i64) -> Self {
        Self::new(Decimal::new(cents, 2))
    }

    /// Creates a new Money amount from whole currency units.
    pub fn from_major(units: i64) -> Self {
        Self::new(Decimal::from(units))
    }

    /// Validates an exact amount.
    pub fn from_decimal(amount: Decimal) -> Result<Self, MoneyError> {
        let amount = amount.normalize();
        if amount.scale() > 2 {
            return Err(MoneyError::TooManyDecimalPlaces(amount.to_string()));
        }
        Self::bounded(amount)
    }

    /// Rounds to the nearest cent, halves away from zero.
    ///
    /// For amounts reported by downstream services, which may carry binary
    /// floating point noise such as `2.9000000000000004`.
    pub fn rounded(amount: Decimal) -> Result<Self, MoneyError> {
        Self::bounded(amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
    }

    fn bounded(amount: Decimal) -> Result<Self, MoneyError> {
        amount
            .checked_mul(Decimal::ONE_HUNDRED)
            .and_then(|cents| cents.to_i64())
            .map(|_| Self::new(amount))
            .ok_or_else(|| MoneyError::Overflow(amount.to_string()))
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self::new(Decimal::ZERO)
    }

    /// Returns the amount as a decimal.
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Returns true if the amount is negative.
    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// Applies a rate expressed in basis points (1/100 of a percent),
    /// rounding half away from zero to the nearest cent.
    ///
    /// `Money::from_major(100).apply_bps(290)` is `2.90`.
    pub fn apply_bps(&self, bps: u32) -> Money {
        let fee = self.0 * Decimal::from(bps) / Decimal::from(10_000);
        Self::new(fee.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl FromStr for Money {
    type Err = MoneyError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let amount = Decimal::from_str(text.trim()).map_err(|e| match e {
            rust_decimal::Error::ExceedsMaximumPossibleValue
            | rust_decimal::Error::LessThanMinimumPossibleValue => {
                MoneyError::Overflow(text.to_string())
            }
            _ => MoneyError::InvalidFormat(text.to_string()),
        })?;
        Money::from_decimal(amount)
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.0 - rhs.0)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// Numbers and strings are both accepted; either way the two-digit rule applies.
impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let amount = <Decimal as Deserialize>::deserialize(deserializer)?;
        Money::from_decimal(amount).map_err(de::Error::custom)
    }
}

/// ISO 4217 currency code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    /// Validates and wraps a three-letter uppercase currency code.
    pub fn new(code: impl Into<String>) -> Result<Self, String> {
        let code = code.into();
        if code.len() == 3 && code.chars().all(|c| c.is_ascii_uppercase()) {
            Ok(Self(code))
        } else {
            Err(format!("currency must be a three-letter ISO code, got '{code}'"))
        }
    }

    /// Returns the currency code.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Currency {
    fn default() -> Self {
        Self(DEFAULT_CURRENCY.to_string())
    }
}

impl TryFrom<String> for Currency {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Currency::new(value)
    }
}

impl From<Currency> for String {
    fn from(currency: Currency) -> Self {
        currency.0
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Half-open interval `[start, end)` of booked time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

impl DateRange {
    /// Creates a range; the end must be strictly after the start.
    pub fn new(start_date: DateTime<Utc>, end_date: DateTime<Utc>) -> Result<Self, String> {
        if end_date <= start_date {
            return Err(format!(
                "endDate ({end_date}) must be after startDate ({start_date})"
            ));
        }
        Ok(Self {
            start_date,
            end_date,
        })
    }

    /// The one-day range covering a single tour date.
    pub fn single_day(date: DateTime<Utc>) -> Self {
        Self {
            start_date: date,
            end_date: date + Duration::days(1),
        }
    }

    /// Two ranges overlap iff `s1 < e2 && s2 < e1`.
    ///
    /// A range ending exactly when another starts does not overlap it.
    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start_date < other.end_date && other.start_date < self.end_date
    }

    /// Returns true once `now` has reached the end of the range.
    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        self.end_date <= now
    }

    /// Returns true if the start is strictly before the end.
    pub fn is_well_formed(&self) -> bool {
        self.start_date < self.end_date
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}, {})",
            self.start_date.to_rfc3339(),
            self.end_date.to_rfc3339()
        )
    }
}

/// The kind of third-party service being booked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    Accommodation,
    Transportation,
    Guide,
}

impl ServiceType {
    /// Resource segment used by the provider-metrics service (`/{resource}/{id}/...`).
    pub fn resource_name(&self) -> &'static str {
        match self {
            ServiceType::Accommodation => "accommodation",
            ServiceType::Transportation => "transportation",
            ServiceType::Guide => "guide",
        }
    }

    /// Returns the service type name as a string.
    pub fn as_str(&self) -> &'static str {
        self.resource_name()
    }
}

impl std::fmt::Display for ServiceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "accommodation" => Ok(ServiceType::Accommodation),
            "transportation" => Ok(ServiceType::Transportation),
            "guide" => Ok(ServiceType::Guide),
            other => Err(format!("unknown service type '{other}'")),
        }
    }
}

/// How the customer intends to pay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    Card,
    Wallet,
    Bank,
    Cash,
    Mock,
}

impl PaymentMethod {
    /// Returns the method name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "card",
            PaymentMethod::Wallet => "wallet",
            PaymentMethod::Bank => "bank",
            PaymentMethod::Cash => "cash",
            PaymentMethod::Mock => "mock",
        }
    }
}

/// Identifier of the provider (hotel, transport operator, guide) that owns the booked resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderId(String);

impl ProviderId {
    /// Creates a provider ID from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the provider ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProviderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ProviderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Short human-facing booking code, eight characters from `[A-Z0-9]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfirmationNumber(String);

impl ConfirmationNumber {
    /// Generates a random confirmation number.
    ///
    /// Global uniqueness is enforced by the booking store, not here.
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        let code = (0..CONFIRMATION_LENGTH)
            .map(|_| {
                let idx = rng.random_range(0..CONFIRMATION_ALPHABET.len());
                char::from(CONFIRMATION_ALPHABET[idx])
            })
            .collect();
        Self(code)
    }

    /// Wraps an existing code.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConfirmationNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Customer contact details captured at booking time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ContactInfo {
    pub email: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emergency_contact: Option<String>,
}
