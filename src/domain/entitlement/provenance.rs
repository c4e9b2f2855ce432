//! Charge references and provenance.
//!
//! A subscription does not store where it came from. The payment charge
//! identifiers carry that information instead:
//!
//! - `"promocode"` in either field marks a row created by a promocode;
//! - `<renewal_prefix>:<subscription_id>:<country>` marks a renewal
//!   payment for an existing row;
//! - anything else is a plain purchase.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{CountryCode, SubscriptionId, ValidationError};

/// Charge id recorded on rows created by promocode redemption.
pub const PROMOCODE_CHARGE_ID: &str = "promocode";

/// Charge identifiers reported by the payment platform.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChargeRefs {
    pub telegram_charge_id: Option<String>,
    pub provider_charge_id: Option<String>,
}

/// Where a paid row came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provenance {
    Purchase,
    Promocode,
    Renewal {
        subscription_id: SubscriptionId,
        country: Option<CountryCode>,
    },
}

impl ChargeRefs {
    /// Builds charge refs, treating blank ids as absent.
    pub fn new(telegram_charge_id: Option<String>, provider_charge_id: Option<String>) -> Self {
        fn clean(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }
        Self {
            telegram_charge_id: clean(telegram_charge_id),
            provider_charge_id: clean(provider_charge_id),
        }
    }

    /// Charge refs stamped on promocode-issued rows.
    pub fn promocode() -> Self {
        Self {
            telegram_charge_id: None,
            provider_charge_id: Some(PROMOCODE_CHARGE_ID.to_string()),
        }
    }

    pub fn is_promocode(&self) -> bool {
        self.ids().any(|id| id == PROMOCODE_CHARGE_ID)
    }

    /// Classifies the refs. Renewal payloads are looked up in the provider
    /// charge id first, then the telegram one.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` when a renewal payload carries no usable
    /// subscription id.
    pub fn provenance(&self, renewal_prefix: &str) -> Result<Provenance, ValidationError> {
        if self.is_promocode() {
            return Ok(Provenance::Promocode);
        }
        let marker = format!("{}:", renewal_prefix);
        match self.ids().find(|id| id.starts_with(&marker)) {
            Some(payload) => parse_renewal_payload(payload),
            None => Ok(Provenance::Purchase),
        }
    }

    fn ids(&self) -> impl Iterator<Item = &str> {
        self.provider_charge_id
            .as_deref()
            .into_iter()
            .chain(self.telegram_charge_id.as_deref())
    }
}

/// Formats the payload attached to a renewal invoice.
pub fn renewal_payload(
    renewal_prefix: &str,
    subscription_id: SubscriptionId,
    country: Option<&CountryCode>,
) -> String {
    format!(
        "{}:{}:{}",
        renewal_prefix,
        subscription_id,
        country.map(CountryCode::as_str).unwrap_or_default()
    )
}

fn parse_renewal_payload(payload: &str) -> Result<Provenance, ValidationError> {
    let mut parts = payload.split(':').skip(1);
    let subscription_id = parts
        .next()
        .and_then(|raw| raw.trim().parse::<i64>().ok())
        .filter(|id| *id > 0)
        .map(SubscriptionId::new)
        .ok_or_else(|| {
            ValidationError::invalid_format("renewal_payload", "subscription_id not found")
        })?;
    let country = CountryCode::parse_optional(parts.next())?;
    Ok(Provenance::Renewal {
        subscription_id,
        country,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREFIX: &str = "vpn_renewal_v1";

    #[test]
    fn blank_ids_become_none() {
        let refs = ChargeRefs::new(Some("  ".to_string()), Some(" ch_1 ".to_string()));
        assert_eq!(refs.telegram_charge_id, None);
        assert_eq!(refs.provider_charge_id.as_deref(), Some("ch_1"));
    }

    #[test]
    fn promocode_in_either_field_is_promocode() {
        let refs = ChargeRefs::new(Some("promocode".to_string()), None);
        assert!(refs.is_promocode());
        assert_eq!(refs.provenance(PREFIX).unwrap(), Provenance::Promocode);
        assert!(ChargeRefs::promocode().is_promocode());
    }

    #[test]
    fn plain_charge_is_purchase() {
        let refs = ChargeRefs::new(Some("tg_123".to_string()), Some("prov_456".to_string()));
        assert_eq!(refs.provenance(PREFIX).unwrap(), Provenance::Purchase);
    }

    #[test]
    fn renewal_payload_is_parsed() {
        let refs = ChargeRefs::new(None, Some("vpn_renewal_v1:17:NL".to_string()));
        assert_eq!(
            refs.provenance(PREFIX).unwrap(),
            Provenance::Renewal {
                subscription_id: SubscriptionId::new(17),
                country: Some(CountryCode::new("nl").unwrap()),
            }
        );
    }

    #[test]
    fn renewal_payload_in_telegram_field_is_parsed() {
        let refs = ChargeRefs::new(Some("vpn_renewal_v1:9:".to_string()), Some("x".to_string()));
        assert_eq!(
            refs.provenance(PREFIX).unwrap(),
            Provenance::Renewal {
                subscription_id: SubscriptionId::new(9),
                country: None,
            }
        );
    }

    #[test]
    fn renewal_payload_without_id_is_invalid() {
        let refs = ChargeRefs::new(None, Some("vpn_renewal_v1:abc:nl".to_string()));
        assert!(refs.provenance(PREFIX).is_err());

        let refs = ChargeRefs::new(None, Some("vpn_renewal_v1:0:nl".to_string()));
        assert!(refs.provenance(PREFIX).is_err());
    }

    #[test]
    fn prefix_must_be_followed_by_colon() {
        let refs = ChargeRefs::new(None, Some("vpn_renewal_v1".to_string()));
        assert_eq!(refs.provenance(PREFIX).unwrap(), Provenance::Purchase);
    }

    #[test]
    fn renewal_payload_formats_round_trip_fields() {
        let country = CountryCode::new("hk").unwrap();
        assert_eq!(
            renewal_payload(PREFIX, SubscriptionId::new(5), Some(&country)),
            "vpn_renewal_v1:5:hk"
        );
    }
}
