//! Tonnage, levy and invoice total arithmetic.

use db::models::{
    invoice::LineItem,
    job::{Job, PricingUnit},
};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Density used when a material is not in the table, in tonnes per cubic metre.
pub const DEFAULT_DENSITY: f64 = 1.6;

const DENSITIES: &[(&str, f64)] = &[
    ("crushed rock", 1.9),
    ("topsoil", 1.3),
    ("concrete", 2.4),
    ("asphalt", 2.3),
    ("gravel", 1.8),
    ("mulch", 0.5),
    ("sand", 1.6),
    ("clay", 1.9),
    ("rock", 2.0),
    ("fill", 1.6),
];

/// Rounds to cents, half away from zero.
pub fn round_money(value: f64) -> f64 {
    round_to(value, 2)
}

/// Rounds on the shortest decimal form of `value`, so 1.005 is a tie and
/// not 1.00499... Values outside `Decimal`'s range fall back to float rounding.
fn round_to(value: f64, places: u32) -> f64 {
    value
        .to_string()
        .parse::<Decimal>()
        .ok()
        .and_then(|decimal| {
            decimal
                .round_dp_with_strategy(places, RoundingStrategy::MidpointAwayFromZero)
                .to_string()
                .parse::<f64>()
                .ok()
        })
        .unwrap_or_else(|| {
            let factor = 10f64.powi(places as i32);
            (value * factor).round() / factor
        })
}

/// Bulk density of a material, matched by substring so "Clean Fill" and
/// "20mm crushed rock" resolve.
pub fn material_density(material: Option<&str>) -> f64 {
    let Some(material) = material else {
        return DEFAULT_DENSITY;
    };
    let material = material.to_lowercase();
    DENSITIES
        .iter()
        .find(|(name, _)| material.contains(name))
        .map(|(_, density)| *density)
        .unwrap_or(DEFAULT_DENSITY)
}

/// Weighed tonnes win over volume estimates.
pub fn tonnage(weight_tonnes: Option<f64>, volume_m3: Option<f64>, material: Option<&str>) -> Option<f64> {
    match (weight_tonnes, volume_m3) {
        (Some(weight), _) => Some(round_to(weight, 3)),
        (None, Some(volume)) => Some(round_to(volume * material_density(material), 3)),
        (None, None) => None,
    }
}

pub fn levy(tonnage: f64, rate_per_tonne: f64) -> f64 {
    round_money(tonnage * rate_per_tonne)
}

/// Quantity the price is multiplied by. Loads default to one per job.
pub fn billable_quantity(
    unit: PricingUnit,
    loads: Option<f64>,
    tonnage: Option<f64>,
    volume_m3: Option<f64>,
    hours: Option<f64>,
) -> f64 {
    match unit {
        PricingUnit::Load => loads.unwrap_or(1.0),
        PricingUnit::Tonne => tonnage.unwrap_or(0.0),
        PricingUnit::CubicMetre => volume_m3.unwrap_or(0.0),
        PricingUnit::Hour => hours.unwrap_or(0.0),
    }
}

pub fn line_amount(quantity: f64, price: f64) -> f64 {
    round_money(quantity * price)
}

pub fn unit_label(unit: PricingUnit) -> &'static str {
    match unit {
        PricingUnit::Load => "load",
        PricingUnit::Tonne => "t",
        PricingUnit::CubicMetre => "m³",
        PricingUnit::Hour => "hr",
    }
}

/// Figures derived from a job's raw measurements.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
pub struct JobFigures {
    pub tonnage: Option<f64>,
    pub quantity: f64,
    pub amount: f64,
    pub levy: f64,
}

impl JobFigures {
    pub fn for_job(job: &Job, levy_rate: f64) -> Self {
        let tonnage = tonnage(job.weight_tonnes, job.volume_m3, job.material.as_deref());
        let quantity = billable_quantity(job.pricing_unit, job.loads, tonnage, job.volume_m3, job.hours);
        Self {
            tonnage,
            quantity,
            amount: line_amount(quantity, job.price),
            levy: levy(tonnage.unwrap_or(0.0), levy_rate),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
pub struct InvoiceTotals {
    pub subtotal: f64,
    pub vat: f64,
    pub tax: f64,
    pub levy: f64,
    pub discount: f64,
    pub total: f64,
}

impl InvoiceTotals {
    /// Rates are percentages. The total never goes negative.
    pub fn calculate(
        items: &[LineItem],
        vat_rate: f64,
        tax_rate: f64,
        discount: f64,
        levy: f64,
    ) -> Self {
        let subtotal = round_money(items.iter().map(|item| item.amount).sum());
        let vat = round_money(subtotal * vat_rate / 100.0);
        let tax = round_money(subtotal * tax_rate / 100.0);
        let levy = round_money(levy);
        let discount = round_money(discount);
        let total = round_money((subtotal + vat + tax + levy - discount).max(0.0));
        Self {
            subtotal,
            vat,
            tax,
            levy,
            discount,
            total,
        }
    }
}

/// Recomputes each line's amount from quantity and price.
pub fn normalize_line_items(items: Vec<LineItem>) -> Vec<LineItem> {
    items
        .into_iter()
        .map(|item| LineItem {
            amount: line_amount(item.quantity, item.price),
            description: item.description.trim().to_string(),
            ..item
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};
    use db::models::job::JobStatus;
    use uuid::Uuid;

    use super::*;

    fn job(unit: PricingUnit) -> Job {
        Job {
            id: Uuid::new_v4(),
            team_id: Uuid::new_v4(),
            customer_id: None,
            customer_name: Some("Acme Civil".to_string()),
            invoice_id: None,
            job_number: None,
            job_date: NaiveDate::from_ymd_opt(2025, 3, 4).unwrap(),
            material: Some("Clean Fill".to_string()),
            source: Some("Quarry Rd".to_string()),
            destination: Some("Lot 12".to_string()),
            truck: None,
            driver: None,
            loads: Some(3.0),
            volume_m3: Some(10.0),
            weight_tonnes: None,
            hours: Some(2.5),
            price: 40.0,
            pricing_unit: unit,
            status: JobStatus::Completed,
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn item(amount: f64) -> LineItem {
        LineItem {
            description: "Haulage".to_string(),
            quantity: 1.0,
            unit: None,
            price: amount,
            amount,
            job_id: None,
        }
    }

    #[test]
    fn rounds_money_half_away_from_zero() {
        assert_eq!(round_money(1.005), 1.01);
        assert_eq!(round_money(1.015), 1.02);
        assert_eq!(round_money(0.145), 0.15);
        assert_eq!(round_money(2.675), 2.68);
        assert_eq!(round_money(-1.005), -1.01);
        assert_eq!(round_money(1.004), 1.0);
        assert_eq!(round_money(10.0), 10.0);
        assert!(round_money(f64::NAN).is_nan());
    }

    #[test]
    fn density_matches_by_substring() {
        assert_eq!(material_density(Some("20mm Crushed Rock")), 1.9);
        assert_eq!(material_density(Some("Premium topsoil")), 1.3);
        assert_eq!(material_density(Some("mystery spoil")), DEFAULT_DENSITY);
        assert_eq!(material_density(None), DEFAULT_DENSITY);
    }

    #[test]
    fn weight_beats_volume() {
        assert_eq!(tonnage(Some(12.3456), Some(100.0), Some("sand")), Some(12.346));
        assert_eq!(tonnage(None, Some(10.0), Some("gravel")), Some(18.0));
        assert_eq!(tonnage(None, None, Some("gravel")), None);
    }

    #[test]
    fn job_figures_follow_pricing_unit() {
        let by_load = JobFigures::for_job(&job(PricingUnit::Load), 5.0);
        assert_eq!(by_load.quantity, 3.0);
        assert_eq!(by_load.amount, 120.0);
        assert_eq!(by_load.tonnage, Some(16.0));
        assert_eq!(by_load.levy, 80.0);

        let by_tonne = JobFigures::for_job(&job(PricingUnit::Tonne), 0.0);
        assert_eq!(by_tonne.quantity, 16.0);
        assert_eq!(by_tonne.amount, 640.0);
        assert_eq!(by_tonne.levy, 0.0);

        let by_hour = JobFigures::for_job(&job(PricingUnit::Hour), 0.0);
        assert_eq!(by_hour.amount, 100.0);

        let mut single = job(PricingUnit::Load);
        single.loads = None;
        assert_eq!(JobFigures::for_job(&single, 0.0).quantity, 1.0);
    }

    #[test]
    fn invoice_totals_include_vat_tax_levy_and_discount() {
        let totals = InvoiceTotals::calculate(&[item(100.0), item(50.5)], 10.0, 2.0, 20.0, 15.0);
        assert_eq!(totals.subtotal, 150.5);
        assert_eq!(totals.vat, 15.05);
        assert_eq!(totals.tax, 3.01);
        assert_eq!(totals.levy, 15.0);
        assert_eq!(totals.total, 163.56);

        let ten_percent_on_tie = InvoiceTotals::calculate(&[item(1.45)], 10.0, 0.0, 0.0, 0.0);
        assert_eq!(ten_percent_on_tie.vat, 0.15);
        assert_eq!(ten_percent_on_tie.total, 1.6);
    }

    #[test]
    fn invoice_total_is_floored_at_zero() {
        let totals = InvoiceTotals::calculate(&[item(10.0)], 0.0, 0.0, 50.0, 0.0);
        assert_eq!(totals.total, 0.0);
    }

    #[test]
    fn normalizing_recomputes_amounts() {
        let items = normalize_line_items(vec![LineItem {
            description: "  Fill  ".to_string(),
            quantity: 2.5,
            unit: Some("t".to_string()),
            price: 33.333,
            amount: 999.0,
            job_id: None,
        }]);
        assert_eq!(items[0].amount, 83.33);
        assert_eq!(items[0].description, "Fill");
    }
}
