use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use voyage_shared::pii::Masked;

use crate::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PassengerType {
    Adult,
    Child,
    Infant,
}

/// Client-side row identifier; the booking wizard uses either an index or a string key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PassengerRef {
    Number(i64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Passenger {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<PassengerRef>,
    #[serde(rename = "type")]
    pub passenger_type: PassengerType,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub title: Option<String>,
    pub first_name: String,
    pub last_name: String,
    #[serde(default, deserialize_with = "optional_date")]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub nationality: Option<String>,
    #[serde(default)]
    pub passport_number: Option<Masked<String>>,
    #[serde(default, deserialize_with = "optional_date")]
    pub passport_expiry: Option<NaiveDate>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub gender: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrimaryContact {
    pub name: String,
    pub email: Masked<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyContact {
    pub name: String,
    pub phone: String,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub relationship: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub line1: String,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub line2: Option<String>,
    pub city: String,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub state: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub postal_code: Option<String>,
    pub country: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactDetails {
    pub primary: PrimaryContact,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emergency: Option<EmergencyContact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
}

/// The wizard historically posted these blobs either as JSON values or as
/// `JSON.stringify`-ed strings. Both are accepted; strings must decode.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum JsonField<T> {
    Structured(T),
    Encoded(String),
}

impl<T: serde::de::DeserializeOwned> JsonField<T> {
    pub fn decode(self, field: &str) -> CoreResult<T> {
        match self {
            JsonField::Structured(value) => Ok(value),
            JsonField::Encoded(raw) => serde_json::from_str(&raw)
                .map_err(|e| CoreError::ValidationError(format!("{} is not valid: {}", field, e))),
        }
    }
}

impl Passenger {
    pub fn validate(&self, index: usize) -> CoreResult<()> {
        if self.first_name.trim().is_empty() || self.last_name.trim().is_empty() {
            return Err(CoreError::ValidationError(format!(
                "passenger_details[{}]: firstName and lastName are required",
                index
            )));
        }
        if let (Some(dob), Some(expiry)) = (self.date_of_birth, self.passport_expiry) {
            if expiry <= dob {
                return Err(CoreError::ValidationError(format!(
                    "passenger_details[{}]: passportExpiry must be after dateOfBirth",
                    index
                )));
            }
        }
        Ok(())
    }
}

impl ContactDetails {
    pub fn validate(&self) -> CoreResult<()> {
        if self.primary.name.trim().is_empty() {
            return Err(CoreError::validation("contact_details.primary.name is required"));
        }
        if !looks_like_email(self.primary.email.expose()) {
            return Err(CoreError::validation("contact_details.primary.email is not a valid email"));
        }
        if let Some(emergency) = &self.emergency {
            if emergency.name.trim().is_empty() || emergency.phone.trim().is_empty() {
                return Err(CoreError::validation(
                    "contact_details.emergency requires name and phone",
                ));
            }
        }
        Ok(())
    }
}

/// Passenger records must agree with the declared traveler counts.
/// An empty list is accepted: passenger details may follow later via update.
pub fn check_passenger_mix(passengers: &[Passenger], adults: u32, children: u32, infants: u32) -> CoreResult<()> {
    for (i, p) in passengers.iter().enumerate() {
        p.validate(i)?;
    }
    if passengers.is_empty() {
        return Ok(());
    }

    let count = |kind: PassengerType| passengers.iter().filter(|p| p.passenger_type == kind).count() as u32;
    let (a, c, i) = (count(PassengerType::Adult), count(PassengerType::Child), count(PassengerType::Infant));

    if (a, c, i) != (adults, children, infants) {
        return Err(CoreError::ValidationError(format!(
            "passenger_details has {} adult(s), {} child(ren), {} infant(s) but the booking declares {}/{}/{}",
            a, c, i, adults, children, infants
        )));
    }
    Ok(())
}

pub(crate) fn looks_like_email(value: &str) -> bool {
    match value.trim().split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.'),
        None => false,
    }
}

fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

fn optional_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    match blank_as_none(deserializer)? {
        None => Ok(None),
        Some(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}
