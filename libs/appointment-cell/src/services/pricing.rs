use tracing::{debug, warn};

use crate::models::{AppointmentError, MedicalService, PriceRule};

/// Resolves a service's final price from its base price or weight bands.
#[derive(Debug, Default, Clone, Copy)]
pub struct PricingService;

impl PricingService {
    pub fn new() -> Self {
        Self
    }

    /// Price in minor currency units.
    ///
    /// Weight-banded services scan `price_rules` in stored order and take the
    /// first band with `min <= weight <= max`. When bands overlap, list order
    /// decides; see `overlapping_rules`.
    pub fn calculate_price(
        &self,
        service: &MedicalService,
        pet_weight: Option<f64>,
    ) -> Result<i64, AppointmentError> {
        if !service.requires_weight {
            debug!("Service {} has flat price {}", service.id, service.base_price);
            return Ok(service.base_price);
        }

        let weight = pet_weight.ok_or(AppointmentError::WeightRequired { service_id: service.id })?;

        if !weight.is_finite() || weight < 0.0 {
            return Err(AppointmentError::InvalidRequest(format!(
                "pet weight must be a non-negative number, got {}",
                weight
            )));
        }

        let (index, rule) = service
            .price_rules
            .iter()
            .enumerate()
            .find(|(_, rule)| rule.matches(weight))
            .ok_or(AppointmentError::NoPriceForWeight { service_id: service.id, weight })?;

        if service.price_rules[index + 1..].iter().any(|later| later.matches(weight)) {
            warn!(
                "Weight {} kg matches several bands of service {}; using band #{} in stored order",
                weight, service.id, index
            );
        }

        debug!(
            "Priced service {} at {} for {} kg (band {}-{})",
            service.id, rule.price, weight, rule.min_weight, rule.max_weight
        );
        Ok(rule.price)
    }

    /// Index pairs of bands that share at least one weight. Data-quality check
    /// for catalog maintenance; pricing itself never rejects overlaps.
    pub fn overlapping_rules(&self, rules: &[PriceRule]) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        for (i, a) in rules.iter().enumerate() {
            for (j, b) in rules.iter().enumerate().skip(i + 1) {
                if a.min_weight <= b.max_weight && b.min_weight <= a.max_weight {
                    pairs.push((i, j));
                }
            }
        }
        pairs
    }
}
