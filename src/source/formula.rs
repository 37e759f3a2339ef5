//! Buildable quantity: how many units the components on hand would make.

/// Availability of one component line of an assembly
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComponentAvailability {
    pub available: u32,
    pub quantity_per_unit: f64,
}

/// Minimum over components of `round(available / quantity_per_unit)`.
///
/// Rounds half away from zero. A component with no per-unit quantity
/// contributes 0. Returns `None` when there are no components.
pub fn buildable_quantity(components: &[ComponentAvailability]) -> Option<u32> {
    components
        .iter()
        .map(|component| {
            if component.quantity_per_unit <= 0.0 {
                0
            } else {
                let ratio = (f64::from(component.available) / component.quantity_per_unit).round();
                ratio.clamp(0.0, f64::from(u32::MAX)) as u32
            }
        })
        .min()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn component(available: u32, quantity_per_unit: f64) -> ComponentAvailability {
        ComponentAvailability {
            available,
            quantity_per_unit,
        }
    }

    #[test]
    fn test_minimum_across_components() {
        let components = [component(10, 2.0), component(9, 3.0), component(100, 1.0)];
        assert_eq!(buildable_quantity(&components), Some(3));
    }

    #[test]
    fn test_rounds_half_away_from_zero() {
        assert_eq!(buildable_quantity(&[component(5, 2.0)]), Some(3));
        assert_eq!(buildable_quantity(&[component(7, 3.0)]), Some(2));
    }

    #[test]
    fn test_zero_quantity_per_unit_contributes_zero() {
        assert_eq!(
            buildable_quantity(&[component(50, 0.0), component(50, 1.0)]),
            Some(0)
        );
    }

    #[test]
    fn test_no_components() {
        assert_eq!(buildable_quantity(&[]), None);
    }
}
