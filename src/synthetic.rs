//! Seeded synthetic telco customers for demos and tests.
//!
//! Churn is drawn from a latent log-odds driven by contract type, tenure,
//! monthly charges, fiber internet and electronic-check payment, which is
//! the shape of the public telco churn dataset.

use crate::models::classifier::sigmoid;
use crate::types::customer::CustomerInput;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Customer attributes plus the churn label (1 = churned)
#[derive(Debug, Clone)]
pub struct LabelledCustomer {
    pub customer: CustomerInput,
    pub churned: u8,
}

/// Generator of synthetic customers
pub struct CustomerGenerator {
    rng: StdRng,
}

impl CustomerGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Generate one labelled customer
    pub fn generate(&mut self) -> LabelledCustomer {
        let contract = self.pick(&["Month-to-month", "One year", "Two year"]);
        let tenure_months: i64 = match contract {
            "Month-to-month" => self.rng.gen_range(0..=36),
            "One year" => self.rng.gen_range(6..=60),
            _ => self.rng.gen_range(12..=72),
        };
        let phone_service = self.yes_no(0.9);
        let internet_service = self.pick(&["DSL", "Fiber optic", "No"]);
        let has_internet = internet_service != "No";

        let mut monthly_charges = if phone_service == "Yes" { 20.0 } else { 0.0 };
        monthly_charges += match internet_service {
            "Fiber optic" => 70.0,
            "DSL" => 45.0,
            _ => 0.0,
        };
        monthly_charges += self.rng.gen_range(-5.0..10.0);
        let monthly_charges = f64::max(monthly_charges, 18.0);
        let total_charges = monthly_charges * tenure_months.max(1) as f64;

        let online_security = self.addon(has_internet, 0.35);
        let online_backup = self.addon(has_internet, 0.4);
        let device_protection = self.addon(has_internet, 0.4);
        let tech_support = self.addon(has_internet, 0.35);
        let streaming_tv = self.addon(has_internet, 0.5);
        let streaming_movies = self.addon(has_internet, 0.5);
        let multiple_lines = if phone_service == "Yes" {
            self.yes_no(0.45)
        } else {
            "No"
        };
        let payment_method = self.pick(&[
            "Electronic check",
            "Mailed check",
            "Credit card (automatic)",
            "Bank transfer (automatic)",
        ]);

        let mut logit = -1.0;
        logit += match contract {
            "Month-to-month" => 1.5,
            "One year" => -0.5,
            _ => -2.0,
        };
        logit -= 0.04 * tenure_months as f64;
        logit += 0.02 * (monthly_charges - 65.0);
        if internet_service == "Fiber optic" {
            logit += 0.6;
        }
        if payment_method == "Electronic check" {
            logit += 0.4;
        }
        if tech_support == "Yes" {
            logit -= 0.4;
        }
        let churned = u8::from(self.rng.gen_bool(sigmoid(logit)));

        let customer = CustomerInput {
            gender: self.pick(&["Male", "Female"]).to_string(),
            senior_citizen: self.yes_no(0.16).to_string(),
            partner: self.yes_no(0.48).to_string(),
            dependents: self.yes_no(0.23).to_string(),
            tenure_months,
            phone_service: phone_service.to_string(),
            multiple_lines: multiple_lines.to_string(),
            internet_service: internet_service.to_string(),
            online_security: online_security.to_string(),
            online_backup: online_backup.to_string(),
            device_protection: device_protection.to_string(),
            tech_support: tech_support.to_string(),
            streaming_tv: streaming_tv.to_string(),
            streaming_movies: streaming_movies.to_string(),
            contract: contract.to_string(),
            paperless_billing: self.yes_no(0.6).to_string(),
            payment_method: payment_method.to_string(),
            monthly_charges,
            total_charges,
            cltv: self.rng.gen_range(2000.0..6500.0),
            latitude: self.rng.gen_range(32.5..42.0),
            longitude: self.rng.gen_range(-124.3..-114.2),
        };

        LabelledCustomer { customer, churned }
    }

    fn pick(&mut self, choices: &[&'static str]) -> &'static str {
        choices[self.rng.gen_range(0..choices.len())]
    }

    /// Internet add-ons are only available with an internet service
    fn addon(&mut self, has_internet: bool, p_yes: f64) -> &'static str {
        if has_internet {
            self.yes_no(p_yes)
        } else {
            "No"
        }
    }

    fn yes_no(&mut self, p_yes: f64) -> &'static str {
        if self.rng.gen_bool(p_yes) {
            "Yes"
        } else {
            "No"
        }
    }
}

/// Generate `count` labelled customers from a fixed seed
pub fn generate(count: usize, seed: u64) -> Vec<LabelledCustomer> {
    let mut generator = CustomerGenerator::new(seed);
    (0..count).map(|_| generator.generate()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_is_seeded() {
        let a = generate(20, 7);
        let b = generate(20, 7);
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.customer, y.customer);
            assert_eq!(x.churned, y.churned);
        }
    }

    #[test]
    fn test_generated_customers_are_valid() {
        let customers = generate(200, 42);
        assert!(customers.iter().all(|c| c.customer.validate().is_ok()));

        let churned = customers.iter().filter(|c| c.churned == 1).count();
        assert!(churned > 0 && churned < customers.len());
    }
}
