//! Weighted A/B variant selection.

use aperture_core::FeatureVariant;

/// Picks a variant from the same bucket used for rollout, so a user's
/// enablement and variant assignment are stable together.
pub struct VariantSelector;

impl VariantSelector {
    /// Cumulative-weight walk over the variants in stored order.
    ///
    /// Returns the first variant whose cumulative weight exceeds the
    /// bucket; if rounding leaves the bucket uncovered, falls back to the
    /// first variant. `None` only when there are no variants.
    pub fn select(variants: &[FeatureVariant], bucket: u8) -> Option<&FeatureVariant> {
        if variants.is_empty() {
            return None;
        }

        let mut cumulative = 0.0;
        for variant in variants {
            cumulative += variant.weight;
            if f64::from(bucket) < cumulative {
                return Some(variant);
            }
        }

        variants.first()
    }
}
