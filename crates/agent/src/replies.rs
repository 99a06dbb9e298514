//! Fixed reply texts and the builders that turn lookup results into
//! outbound messages.

use concierge_core::domain::intent::{BrowseTrigger, OrderId};
use concierge_core::domain::order::{Order, OrderStatus};
use concierge_core::domain::outbound::{ListRow, MenuOption, OutboundMessage};
use concierge_core::domain::product::Product;

pub const CATALOG_PAGE_SIZE: usize = 10;
pub const VISUAL_SEARCH_LIMIT: usize = 5;

const LIST_TITLE_MAX_CHARS: usize = 24;
const LIST_DESCRIPTION_MAX_CHARS: usize = 72;

pub const TRACK_ORDER_PROMPT: &str =
    "Please enter your order ID (e.g., ORD-2024-001234) to track your order.";

pub const HELP_TEXT: &str = "*Need help?*\n\n\
• Send a photo to find similar items\n\
• Type 'New Arrivals' to browse products\n\
• Enter your order ID to track shipping\n\
• Ask any question about our products!";

pub const PRODUCT_NOT_FOUND: &str = "Sorry, I couldn't find that product. Please try again.";

pub const VISUAL_SEARCH_NO_MATCH: &str =
    "I couldn't find any matching items in our catalog right now.\n\n\
     Try sending another photo, or type 'New Arrivals' to browse our latest products!";

pub fn fallback_menu() -> OutboundMessage {
    OutboundMessage::Menu {
        header: "How can I help?".to_owned(),
        body: "I'm having trouble understanding. Please choose an option or try rephrasing your question."
            .to_owned(),
        options: vec![
            menu_option("browse", "Browse Products"),
            menu_option("track", "Track Order"),
            menu_option("help", "Get Help"),
        ],
    }
}

pub fn order_status(order: &Order) -> OutboundMessage {
    let mut lines = vec![
        "*Order Status*".to_owned(),
        String::new(),
        format!("Order: {}", order.id),
        format!("Status: {}", title_case(order.status.as_str())),
    ];

    match order.status {
        OrderStatus::Shipped => {
            if let Some(tracking_number) = &order.tracking_number {
                lines.push(format!("Tracking: {tracking_number}"));
            }
            if let Some(carrier) = &order.carrier {
                lines.push(format!("Carrier: {carrier}"));
            }
            if let Some(estimated_delivery) = &order.estimated_delivery {
                lines.push(format!("Est. Delivery: {estimated_delivery}"));
            }
        }
        OrderStatus::Delivered => {
            if let Some(delivered_at) = &order.delivered_at {
                lines.push(format!("Delivered: {delivered_at}"));
            }
        }
        _ => {}
    }

    if !order.items.is_empty() {
        lines.push(String::new());
        lines.push("*Items:*".to_owned());
        lines.extend(order.items.iter().map(|item| format!("• {} x{}", item.name, item.quantity)));
    }

    if let Some(total) = order.total_amount {
        lines.push(String::new());
        lines.push(format!("Total: {} {:.2}", order.currency, total));
    }

    OutboundMessage::text(lines.join("\n"))
}

pub fn order_not_found(order_id: &OrderId) -> OutboundMessage {
    OutboundMessage::text(format!(
        "I couldn't find order *{order_id}* in our system.\n\n\
         Please check the order ID and try again. You can find your order ID in your confirmation email.\n\n\
         If you need help, type 'Help' to see options."
    ))
}

/// One list row per product; an empty slice yields the empty-category text.
pub fn catalog_list(trigger: BrowseTrigger, products: &[Product]) -> OutboundMessage {
    if products.is_empty() {
        return empty_category(trigger);
    }

    OutboundMessage::List {
        header: trigger.display_name().to_owned(),
        body: format!("Found {} items. Tap to see details:", products.len()),
        button_label: "View Products".to_owned(),
        rows: product_rows(products),
    }
}

/// Catalog matches for a customer photo; no matches yields the try-again text.
pub fn visual_matches(products: &[Product]) -> OutboundMessage {
    if products.is_empty() {
        return OutboundMessage::text(VISUAL_SEARCH_NO_MATCH);
    }

    OutboundMessage::List {
        header: "Similar Items".to_owned(),
        body: format!("Found {} similar items. Tap to see details:", products.len()),
        button_label: "View Products".to_owned(),
        rows: product_rows(products),
    }
}

pub fn not_clothing(reason: &str) -> OutboundMessage {
    OutboundMessage::text(format!(
        "I can only help with clothing items. {reason}\n\n\
         Please send a clear photo of a dress, shirt, or other clothing item you'd like to find."
    ))
}

pub fn empty_category(trigger: BrowseTrigger) -> OutboundMessage {
    OutboundMessage::text(format!(
        "We don't have any {} products right now.\n\n\
         Try browsing:\n\
         • *New Arrivals* - Our latest products\n\
         • *Trending* - Popular items\n\
         • *Sale* - Discounted items\n\n\
         Or send a photo of what you're looking for!",
        trigger.display_name()
    ))
}

pub fn product_detail(product: &Product) -> OutboundMessage {
    let mut lines = vec![format!("*{}*", product.name), String::new()];

    if let Some(description) = product.description.as_deref().filter(|text| !text.trim().is_empty()) {
        lines.push(description.to_owned());
        lines.push(String::new());
    }

    lines.push(format!("Price: {} {:.2}", product.currency, product.price));
    if !product.sizes.is_empty() {
        lines.push(format!("Sizes: {}", product.sizes.join(", ")));
    }
    if !product.colors.is_empty() {
        lines.push(format!("Colors: {}", product.colors.join(", ")));
    }

    lines.push(String::new());
    lines.push("Reply with the size and color you want to order!".to_owned());
    OutboundMessage::text(lines.join("\n"))
}

fn product_rows(products: &[Product]) -> Vec<ListRow> {
    products
        .iter()
        .map(|product| ListRow {
            id: product.id.0.clone(),
            title: truncate_chars(&product.name, LIST_TITLE_MAX_CHARS),
            description: truncate_chars(
                &format!("{} {:.2}", product.currency, product.price),
                LIST_DESCRIPTION_MAX_CHARS,
            ),
        })
        .collect()
}

fn menu_option(id: &str, title: &str) -> MenuOption {
    MenuOption { id: id.to_owned(), title: title.to_owned() }
}

fn title_case(value: &str) -> String {
    let mut characters = value.chars();
    match characters.next() {
        Some(first) => first.to_uppercase().chain(characters).collect(),
        None => String::new(),
    }
}

fn truncate_chars(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use rust_decimal::Decimal;

    use concierge_core::domain::intent::{BrowseTrigger, OrderId};
    use concierge_core::domain::order::{Order, OrderItem, OrderStatus};
    use concierge_core::domain::outbound::OutboundMessage;
    use concierge_core::domain::product::{Product, ProductId};

    use super::{
        catalog_list, fallback_menu, not_clothing, order_not_found, order_status, product_detail,
        visual_matches, VISUAL_SEARCH_NO_MATCH,
    };

    fn shipped_order() -> Order {
        Order {
            id: OrderId("ORD-2024-001234".to_owned()),
            status: OrderStatus::Shipped,
            items: vec![
                OrderItem { name: "Linen Shirt".to_owned(), quantity: 2 },
                OrderItem { name: "Silk Scarf".to_owned(), quantity: 1 },
            ],
            total_amount: Some(Decimal::from_str("129.5").expect("decimal")),
            currency: "USD".to_owned(),
            tracking_number: Some("1Z999AA10123456784".to_owned()),
            carrier: Some("UPS".to_owned()),
            estimated_delivery: Some("2024-06-12".to_owned()),
            delivered_at: None,
        }
    }

    fn product(id: &str, name: &str) -> Product {
        Product {
            id: ProductId(id.to_owned()),
            name: name.to_owned(),
            description: Some("Breathable summer linen.".to_owned()),
            price: Decimal::from_str("49.9").expect("decimal"),
            currency: "USD".to_owned(),
            sizes: vec!["S".to_owned(), "M".to_owned()],
            colors: vec!["White".to_owned()],
            on_sale: false,
        }
    }

    fn body(message: &OutboundMessage) -> &str {
        match message {
            OutboundMessage::Text { body } => body,
            _ => "",
        }
    }

    #[test]
    fn shipped_order_lists_tracking_items_and_total() {
        let message = order_status(&shipped_order());
        let text = body(&message);

        assert!(text.starts_with("*Order Status*\n\nOrder: ORD-2024-001234\nStatus: Shipped"));
        assert!(text.contains("Tracking: 1Z999AA10123456784\nCarrier: UPS\nEst. Delivery: 2024-06-12"));
        assert!(text.contains("*Items:*\n• Linen Shirt x2\n• Silk Scarf x1"));
        assert!(text.ends_with("Total: USD 129.50"));
    }

    #[test]
    fn pending_order_omits_shipping_details() {
        let mut order = shipped_order();
        order.status = OrderStatus::Pending;
        let message = order_status(&order);

        assert!(body(&message).contains("Status: Pending"));
        assert!(!body(&message).contains("Tracking"));
    }

    #[test]
    fn missing_order_names_the_id() {
        let message = order_not_found(&OrderId("ORD-2024-999999".to_owned()));
        assert!(body(&message).starts_with("I couldn't find order *ORD-2024-999999* in our system."));
    }

    #[test]
    fn catalog_rows_respect_list_limits() {
        let products = vec![
            product("p-1", "Extra Long Relaxed Fit Linen Shirt"),
            product("p-2", "Silk Scarf"),
        ];
        let message = catalog_list(BrowseTrigger::NewArrivals, &products);

        let OutboundMessage::List { header, body, button_label, rows } = message else {
            panic!("expected a list message");
        };
        assert_eq!(header, "New Arrivals");
        assert_eq!(body, "Found 2 items. Tap to see details:");
        assert_eq!(button_label, "View Products");
        assert_eq!(rows[0].id, "p-1");
        assert_eq!(rows[0].title.chars().count(), 24);
        assert_eq!(rows[1].description, "USD 49.90");
    }

    #[test]
    fn empty_catalog_suggests_other_categories() {
        let message = catalog_list(BrowseTrigger::Sale, &[]);
        assert!(body(&message).starts_with("We don't have any Sale products right now."));
    }

    #[test]
    fn visual_matches_use_the_similar_items_list() {
        let message = visual_matches(&[product("p-1", "Linen Shirt")]);
        let OutboundMessage::List { header, body, rows, .. } = message else {
            panic!("expected a list message");
        };
        assert_eq!(header, "Similar Items");
        assert_eq!(body, "Found 1 similar items. Tap to see details:");
        assert_eq!(rows[0].id, "p-1");

        assert_eq!(visual_matches(&[]), OutboundMessage::text(VISUAL_SEARCH_NO_MATCH));
    }

    #[test]
    fn non_clothing_photo_explains_the_limit() {
        let message = not_clothing("This looks like a sunset.");
        assert!(body(&message).starts_with(
            "I can only help with clothing items. This looks like a sunset.\n\nPlease send a clear photo"
        ));
    }

    #[test]
    fn product_detail_lists_price_sizes_and_colors() {
        let message = product_detail(&product("p-1", "Linen Shirt"));
        assert_eq!(
            body(&message),
            "*Linen Shirt*\n\nBreathable summer linen.\n\nPrice: USD 49.90\nSizes: S, M\nColors: White\n\n\
             Reply with the size and color you want to order!"
        );
    }

    #[test]
    fn fallback_menu_offers_three_options() {
        let OutboundMessage::Menu { options, .. } = fallback_menu() else {
            panic!("expected a menu");
        };
        let ids = options.iter().map(|option| option.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["browse", "track", "help"]);
    }
}
