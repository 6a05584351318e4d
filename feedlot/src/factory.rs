//! Animal creation with per-category starting weights.

use rand::Rng;
use tracing::debug;

use crate::animal::{Animal, Category};

/// Starting weight range in kg for each category.
pub fn weight_range(category: Category) -> (f64, f64) {
    match category {
        Category::Young => (150.0, 220.0),
        Category::Growing => (250.0, 350.0),
        Category::Adult => (400.0, 550.0),
    }
}

/// Create an animal; without an explicit weight, one is drawn uniformly
/// from the category's range.
pub fn create_animal(id: u32, category: Category, initial_weight: Option<f64>) -> Animal {
    let weight = initial_weight.unwrap_or_else(|| {
        let (min, max) = weight_range(category);
        rand::thread_rng().gen_range(min..max)
    });
    debug!("created {category} #{id} at {weight:.1} kg");
    Animal::new(id, category, weight)
}

/// Create a batch of animals of one category with sequential ids.
pub fn create_batch(count: usize, category: Category, first_id: u32) -> Vec<Animal> {
    (0..count)
        .map(|i| create_animal(first_id + i as u32, category, None))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_weight_stays_in_category_range() {
        for _ in 0..50 {
            let animal = create_animal(1, Category::Growing, None);
            let (min, max) = weight_range(Category::Growing);
            assert!(animal.weight() >= min && animal.weight() < max);
        }
    }

    #[test]
    fn explicit_weight_is_respected() {
        let animal = create_animal(9, Category::Adult, Some(480.0));
        assert_eq!(animal.weight(), 480.0);
        assert_eq!(animal.initial_weight(), 480.0);
    }

    #[test]
    fn batch_ids_are_sequential() {
        let batch = create_batch(3, Category::Young, 10);
        let ids: Vec<u32> = batch.iter().map(|a| a.id()).collect();
        assert_eq!(ids, vec![10, 11, 12]);
    }
}
