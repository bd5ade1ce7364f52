use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use crate::meal_record::{Category, MealRecord};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CategoryStats {
    pub category: Category,
    pub color: String,
    pub total: u64,
    pub most_frequent_shop: Option<String>,
    pub most_frequent_meal: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StatsSummary {
    pub total_spending: u64,
    pub entries: usize,
    pub top_category: Option<Category>,
    pub categories: Vec<CategoryStats>,
    /// Categories with spending, for the proportion chart.
    pub pie: Vec<CategoryStats>,
}

/// Occurrence counts in first-seen order.
#[derive(Default)]
struct Tally(Vec<(String, u32)>);

impl Tally {
    fn add(&mut self, name: &str) {
        match self.0.iter_mut().find(|(n, _)| n == name) {
            Some((_, count)) => *count += 1,
            None => self.0.push((name.to_string(), 1)),
        }
    }

    /// Ties go to the name seen later.
    fn most_frequent(&self) -> Option<String> {
        self.0
            .iter()
            .reduce(|best, entry| if best.1 > entry.1 { best } else { entry })
            .map(|(name, _)| name.clone())
    }
}

pub fn summarize(records: &[MealRecord]) -> StatsSummary {
    let categories: Vec<CategoryStats> = Category::iter()
        .map(|category| {
            let mut total = 0u64;
            let mut shops = Tally::default();
            let mut meals = Tally::default();
            for record in records.iter().filter(|r| r.category == category) {
                total += u64::from(record.price);
                shops.add(&record.shop_name);
                meals.add(&record.meal_name);
            }
            CategoryStats {
                category,
                color: category.color().to_string(),
                total,
                most_frequent_shop: shops.most_frequent(),
                most_frequent_meal: meals.most_frequent(),
            }
        })
        .collect();

    let total_spending = categories.iter().map(|c| c.total).sum();
    let top_category = if total_spending == 0 {
        None
    } else {
        categories
            .iter()
            .reduce(|best, c| if best.total > c.total { best } else { c })
            .map(|c| c.category)
    };
    let pie = categories.iter().filter(|c| c.total > 0).cloned().collect();

    StatsSummary {
        total_spending,
        entries: records.len(),
        top_category,
        categories,
        pie,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(category: Category, shop: &str, meal: &str, price: u32) -> MealRecord {
        MealRecord {
            id: format!("{}-{}", shop, meal),
            date: "2024-05-01".to_string(),
            category,
            shop_name: shop.to_string(),
            meal_name: meal.to_string(),
            price,
            image: None,
        }
    }

    #[test]
    fn test_empty_summary() {
        let summary = summarize(&[]);
        assert_eq!(summary.total_spending, 0);
        assert_eq!(summary.entries, 0);
        assert!(summary.top_category.is_none());
        assert!(summary.pie.is_empty());
        assert_eq!(summary.categories.len(), 4);
        assert!(summary.categories.iter().all(|c| c.most_frequent_shop.is_none()));
    }

    #[test]
    fn test_totals_and_frequencies() {
        let records = vec![
            record(Category::Lunch, "Ramen Ya", "Tonkotsu", 280),
            record(Category::Lunch, "Curry Club", "Katsu curry", 220),
            record(Category::Lunch, "Ramen Ya", "Shoyu", 260),
            record(Category::Breakfast, "Corner Cafe", "Toast", 60),
        ];
        let summary = summarize(&records);
        assert_eq!(summary.total_spending, 820);
        assert_eq!(summary.entries, 4);
        assert_eq!(summary.top_category, Some(Category::Lunch));

        let lunch = &summary.categories[1];
        assert_eq!(lunch.total, 760);
        assert_eq!(lunch.most_frequent_shop.as_deref(), Some("Ramen Ya"));
        // three meals seen once each: the last one wins the tie
        assert_eq!(lunch.most_frequent_meal.as_deref(), Some("Shoyu"));

        let pie: Vec<_> = summary.pie.iter().map(|c| c.category).collect();
        assert_eq!(pie, vec![Category::Breakfast, Category::Lunch]);
    }

    #[test]
    fn test_top_category_tie_goes_to_later() {
        let records = vec![
            record(Category::Breakfast, "A", "x", 100),
            record(Category::Dinner, "B", "y", 100),
        ];
        assert_eq!(summarize(&records).top_category, Some(Category::Dinner));
    }
}
