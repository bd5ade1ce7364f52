use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, IntoEnumIterator};
use validator::Validate;

use crate::constants::{BREAKFAST_COLOR, DINNER_COLOR, LUNCH_COLOR, SNACKS_COLOR};
use crate::validation::*;

/// Meal slots of a day, in display order.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, EnumIter, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Category {
    Breakfast,
    Lunch,
    Dinner,
    Snacks, // drinks, snacks and late-night food
}

impl Category {
    pub fn color(&self) -> &'static str {
        match self {
            Self::Breakfast => BREAKFAST_COLOR,
            Self::Lunch => LUNCH_COLOR,
            Self::Dinner => DINNER_COLOR,
            Self::Snacks => SNACKS_COLOR,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MealRecord {
    pub id: String,
    pub date: String,
    pub category: Category,
    pub shop_name: String,
    pub meal_name: String,
    pub price: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl MealRecord {
    /// Merge-write semantics of the document store: fields the incoming
    /// record leaves empty keep the stored value.
    pub fn merged_over(mut self, existing: &MealRecord) -> Self {
        if self.image.is_none() {
            self.image = existing.image.clone();
        }
        self
    }
}

#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct NewRecord {
    #[validate(custom = "validate_record_date")]
    pub date: String,
    pub category: Category,
    #[validate(custom = "validate_label")]
    pub shop_name: String,
    #[validate(custom = "validate_label")]
    pub meal_name: String,
    #[validate(range(max = 1000000))]
    pub price: u32,
    #[validate(custom = "validate_image_data_url")]
    pub image: Option<String>,
}

impl NewRecord {
    pub fn into_record(self, id: String) -> MealRecord {
        MealRecord {
            id,
            date: self.date,
            category: self.category,
            shop_name: self.shop_name.trim().to_string(),
            meal_name: self.meal_name.trim().to_string(),
            price: self.price,
            image: self.image.filter(|image| !image.is_empty()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Validate, Clone, Default)]
pub struct RecordPatch {
    #[validate(custom = "validate_record_date")]
    pub date: Option<String>,
    pub category: Option<Category>,
    #[validate(custom = "validate_label")]
    pub shop_name: Option<String>,
    #[validate(custom = "validate_label")]
    pub meal_name: Option<String>,
    #[validate(range(max = 1000000))]
    pub price: Option<u32>,
    /// `Some("")` removes the stored image.
    #[validate(custom = "validate_image_data_url")]
    pub image: Option<String>,
}

impl RecordPatch {
    pub fn apply(self, mut record: MealRecord) -> MealRecord {
        if let Some(date) = self.date {
            record.date = date;
        }
        if let Some(category) = self.category {
            record.category = category;
        }
        if let Some(shop_name) = self.shop_name {
            record.shop_name = shop_name.trim().to_string();
        }
        if let Some(meal_name) = self.meal_name {
            record.meal_name = meal_name.trim().to_string();
        }
        if let Some(price) = self.price {
            record.price = price;
        }
        match self.image {
            Some(image) if image.is_empty() => record.image = None,
            Some(image) => record.image = Some(image),
            None => {}
        }
        record
    }
}

/// Newest day first, ties ordered by id.
pub fn compare_records(a: &MealRecord, b: &MealRecord) -> Ordering {
    b.date.cmp(&a.date).then_with(|| a.id.cmp(&b.id))
}

pub fn sort_records(records: &mut [MealRecord]) {
    records.sort_by(compare_records);
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DaySlot {
    pub category: Category,
    pub color: String,
    pub meal: Option<MealRecord>,
}

/// One slot per category for `date`; a slot shows the first record of its category.
pub fn day_slots(records: &[MealRecord], date: &str) -> Vec<DaySlot> {
    Category::iter()
        .map(|category| DaySlot {
            category,
            color: category.color().to_string(),
            meal: records
                .iter()
                .find(|r| r.date == date && r.category == category)
                .cloned(),
        })
        .collect()
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuthProvider {
    Google,
    Line,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct User {
    pub id: String,
    pub name: String,
    pub avatar: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<AuthProvider>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::MAX_PRICE;

    fn record(id: &str, date: &str, category: Category) -> MealRecord {
        MealRecord {
            id: id.to_string(),
            date: date.to_string(),
            category,
            shop_name: "Corner Cafe".to_string(),
            meal_name: "Toast".to_string(),
            price: 60,
            image: None,
        }
    }

    #[test]
    fn test_sort_newest_first_then_id() {
        let mut records = vec![
            record("b", "2024-05-01", Category::Lunch),
            record("c", "2024-05-03", Category::Lunch),
            record("a", "2024-05-01", Category::Dinner),
        ];
        sort_records(&mut records);
        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_new_record_validation() {
        let request = NewRecord {
            date: "2024-05-01".to_string(),
            category: Category::Breakfast,
            shop_name: "   ".to_string(),
            meal_name: "Egg crepe".to_string(),
            price: 45,
            image: None,
        };
        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("shop_name"));

        let request = NewRecord {
            shop_name: " Mei Er Mei ".to_string(),
            ..request
        };
        assert!(request.validate().is_ok());
        assert_eq!(request.into_record("id-1".to_string()).shop_name, "Mei Er Mei");
    }

    #[test]
    fn test_price_upper_bound() {
        let patch = RecordPatch {
            price: Some(MAX_PRICE + 1),
            ..Default::default()
        };
        assert!(patch.validate().is_err());
    }

    #[test]
    fn test_patch_clears_and_keeps_image() {
        let mut base = record("a", "2024-05-01", Category::Dinner);
        base.image = Some("data:image/jpeg;base64,AAAA".to_string());

        let kept = RecordPatch { price: Some(120), ..Default::default() }.apply(base.clone());
        assert_eq!(kept.price, 120);
        assert!(kept.image.is_some());

        let cleared = RecordPatch { image: Some(String::new()), ..Default::default() }.apply(base);
        assert!(cleared.image.is_none());
    }

    #[test]
    fn test_merge_keeps_stored_image() {
        let mut stored = record("a", "2024-05-01", Category::Dinner);
        stored.image = Some("data:image/jpeg;base64,AAAA".to_string());
        let incoming = record("a", "2024-05-02", Category::Dinner);
        let merged = incoming.merged_over(&stored);
        assert_eq!(merged.date, "2024-05-02");
        assert_eq!(merged.image, stored.image);
    }

    #[test]
    fn test_day_slots() {
        let records = vec![
            record("a", "2024-05-01", Category::Lunch),
            record("b", "2024-05-01", Category::Lunch),
            record("c", "2024-05-02", Category::Dinner),
        ];
        let slots = day_slots(&records, "2024-05-01");
        assert_eq!(slots.len(), 4);
        assert_eq!(slots[0].category, Category::Breakfast);
        assert!(slots[0].meal.is_none());
        assert_eq!(slots[1].meal.as_ref().map(|m| m.id.as_str()), Some("a"));
        assert!(slots[2].meal.is_none());
    }

    #[test]
    fn test_category_wire_format() {
        assert_eq!(serde_json::to_string(&Category::Snacks).unwrap(), "\"snacks\"");
        assert_eq!(Category::Breakfast.to_string(), "breakfast");
    }
}
