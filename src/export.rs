//! Plain-text rendering of the aggregated shopping list.

use crate::schema::ShoppingListItem;

pub fn render_shopping_list(username: &str, items: &[ShoppingListItem]) -> String {
    let mut document = format!("Shopping list for {username}\n\n");

    if items.is_empty() {
        document.push_str("Your shopping cart is empty.\n");
        return document;
    }

    for item in items {
        document.push_str(&format!(
            "{} ({}): {}\n",
            item.name, item.measurement_unit, item.total
        ));
    }

    document
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, unit: &str, total: i64) -> ShoppingListItem {
        ShoppingListItem {
            name: name.to_string(),
            measurement_unit: unit.to_string(),
            total,
        }
    }

    #[test]
    fn renders_one_line_per_ingredient() {
        let document = render_shopping_list(
            "cook",
            &[item("flour", "g", 700), item("milk", "ml", 250)],
        );

        assert_eq!(
            document,
            "Shopping list for cook\n\nflour (g): 700\nmilk (ml): 250\n"
        );
    }

    #[test]
    fn renders_empty_cart() {
        let document = render_shopping_list("cook", &[]);
        assert!(document.ends_with("Your shopping cart is empty.\n"));
    }
}
