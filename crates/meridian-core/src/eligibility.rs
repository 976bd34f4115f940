//! # Eligibility Policy
//!
//! Age-based purchase eligibility for restricted products.
//!
//! The policy is a pure function: `today` is supplied by the caller so the
//! same inputs always produce the same answer. A customer without a birth
//! date is treated as age 0, i.e. maximally restricted.

use chrono::{Datelike, NaiveDate};

use crate::types::{Customer, Product};

/// Whole calendar years between `birth` and `today`.
///
/// Month/day aware: the year only counts once the birthday has passed.
/// Returns 0 when `today` precedes `birth`.
pub fn years_between(birth: NaiveDate, today: NaiveDate) -> i64 {
    let mut years = i64::from(today.year() - birth.year());
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        years -= 1;
    }
    years.max(0)
}

/// The customer's age in whole years on `today`; 0 with no birth date.
pub fn age_on(customer: &Customer, today: NaiveDate) -> i64 {
    customer
        .birth_date
        .map(|birth| years_between(birth, today))
        .unwrap_or(0)
}

/// Whether the customer may purchase the product on `today`.
///
/// A product without a minimum age is always eligible; otherwise the
/// customer's age must reach it.
pub fn is_eligible(customer: &Customer, product: &Product, today: NaiveDate) -> bool {
    match product.min_age {
        None => true,
        Some(min_age) => age_on(customer, today) >= min_age,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn customer(birth_date: Option<NaiveDate>) -> Customer {
        Customer {
            id: "c-1".to_string(),
            name: "Jane".to_string(),
            surname: "Doe".to_string(),
            email: "jane@example.com".to_string(),
            birth_date,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn product(min_age: Option<i64>) -> Product {
        Product {
            id: "p-1".to_string(),
            name: "Test Product".to_string(),
            price_cents: 1000,
            quantity: 10,
            is_restricted: min_age.is_some(),
            min_age,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_years_between_counts_whole_years() {
        assert_eq!(years_between(date(2000, 6, 15), date(2026, 6, 15)), 26);
        assert_eq!(years_between(date(2000, 6, 15), date(2026, 6, 14)), 25);
        assert_eq!(years_between(date(2000, 6, 15), date(2026, 6, 16)), 26);
    }

    #[test]
    fn test_years_between_never_negative() {
        assert_eq!(years_between(date(2030, 1, 1), date(2026, 1, 1)), 0);
    }

    #[test]
    fn test_unrestricted_product_always_eligible() {
        let c = customer(None);
        assert!(is_eligible(&c, &product(None), date(2026, 8, 4)));
    }

    #[test]
    fn test_missing_birth_date_is_age_zero() {
        let c = customer(None);
        assert_eq!(age_on(&c, date(2026, 8, 4)), 0);
        assert!(!is_eligible(&c, &product(Some(18)), date(2026, 8, 4)));
    }

    #[test]
    fn test_under_age_rejected_exact_boundary_allowed() {
        let c = customer(Some(date(2010, 8, 4)));
        // 16th birthday today: age 16
        assert!(!is_eligible(&c, &product(Some(18)), date(2026, 8, 4)));
        // 18th birthday exactly: eligible
        assert!(is_eligible(&c, &product(Some(18)), date(2028, 8, 4)));
        // Day before the 18th birthday: still 17
        assert!(!is_eligible(&c, &product(Some(18)), date(2028, 8, 3)));
    }
}
