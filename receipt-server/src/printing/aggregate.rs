//! Line-item aggregation
//!
//! Collapses repeated line items into one receipt row per product id.

use std::collections::BTreeMap;

use shared::models::{AggregateProduct, Product};

/// Aggregate line items into receipt rows, sorted by product id
///
/// Quantity is the number of occurrences; price is quantity × the unit price
/// of the first occurrence. Same-id items are assumed to share a price.
pub fn aggregate(line_items: &[Product]) -> Vec<AggregateProduct> {
    let mut groups: BTreeMap<u64, (&Product, u32)> = BTreeMap::new();

    for item in line_items {
        groups.entry(item.id).or_insert((item, 0)).1 += 1;
    }

    groups
        .into_values()
        .map(|(first, quantity)| AggregateProduct {
            id: first.id,
            name: first.name.clone(),
            quantity,
            price: first.price * rust_decimal::Decimal::from(quantity),
            product_type: first.product_type.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::collections::{HashMap, HashSet};

    fn product(id: u64, cents: i64) -> Product {
        Product::new(id, format!("Product {}", id), Decimal::new(cents, 2))
    }

    #[test]
    fn test_aggregate_duplicates() {
        let items = vec![product(1, 350), product(1, 350), product(2, 500)];

        let rows = aggregate(&items);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, 1);
        assert_eq!(rows[0].quantity, 2);
        assert_eq!(rows[0].price, Decimal::new(700, 2));
        assert_eq!(rows[1].id, 2);
        assert_eq!(rows[1].quantity, 1);
        assert_eq!(rows[1].price, Decimal::new(500, 2));
    }

    #[test]
    fn test_aggregate_empty() {
        assert!(aggregate(&[]).is_empty());
    }

    #[test]
    fn test_output_sorted_regardless_of_input_order() {
        let items = vec![product(9, 100), product(3, 200), product(9, 100), product(1, 50)];

        let ids: Vec<u64> = aggregate(&items).iter().map(|r| r.id).collect();

        assert_eq!(ids, vec![1, 3, 9]);
    }

    #[test]
    fn test_first_occurrence_wins_for_name_and_type() {
        let items = vec![
            Product::new(5, "Latte", Decimal::new(400, 2)).with_type("drink"),
            Product::new(5, "Latte (renamed)", Decimal::new(400, 2)).with_type("other"),
        ];

        let rows = aggregate(&items);

        assert_eq!(rows[0].name, "Latte");
        assert_eq!(rows[0].product_type, "drink");
    }

    #[test]
    fn test_totals_and_counts_preserved() {
        // Deterministic pseudo-random mix of ids and prices
        let mut seed: u64 = 0x2545_F491_4F6C_DD1D;
        let mut items = Vec::new();
        let mut prices: HashMap<u64, i64> = HashMap::new();
        for _ in 0..500 {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            let id = seed % 37;
            let cents = *prices.entry(id).or_insert((seed % 5000) as i64 + 1);
            items.push(product(id, cents));
        }

        let rows = aggregate(&items);

        let input_total: Decimal = items.iter().map(|p| p.price).sum();
        let output_total: Decimal = rows.iter().map(|r| r.price).sum();
        assert_eq!(input_total, output_total);

        let input_ids: HashSet<u64> = items.iter().map(|p| p.id).collect();
        let output_ids: HashSet<u64> = rows.iter().map(|r| r.id).collect();
        assert_eq!(input_ids, output_ids);
        assert_eq!(rows.len(), output_ids.len());

        for row in &rows {
            let count = items.iter().filter(|p| p.id == row.id).count();
            assert_eq!(row.quantity as usize, count);
        }
    }
}
