//! Rendering of the inventory/sales snapshot into priming text.

use serde::Deserialize;
use time::{Date, OffsetDateTime};

/// One inventory row as served by `GET /inventory/`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Product {
    pub name: String,
    pub price: f64,
    pub stock: i64,
    #[serde(default)]
    pub category: Option<String>,
}

/// One sale as served by `GET /sales/`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Sale {
    pub quantity: i64,
    pub total_amount: f64,
    /// ISO 8601 timestamp; only the date prefix is inspected
    pub timestamp: String,
    #[serde(default)]
    pub product_name: Option<String>,
}

/// Today's UTC date as `YYYY-MM-DD`.
pub fn today_utc() -> String {
    format_date(OffsetDateTime::now_utc().date())
}

fn format_date(date: Date) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}

/// Amounts keep one decimal place when whole, like the shop backend prints them.
fn format_amount(amount: f64) -> String {
    if amount.fract() == 0.0 {
        format!("{amount:.1}")
    } else {
        format!("{amount}")
    }
}

pub fn render_inventory(products: &[Product]) -> String {
    let mut text = String::from("Current Inventory:\n");
    if products.is_empty() {
        text.push_str("No items in stock.\n");
        return text;
    }
    for p in products {
        text.push_str(&format!(
            "- {}: {} units (Price: ₹{})\n",
            p.name,
            p.stock,
            format_amount(p.price)
        ));
    }
    text
}

/// Summarise the sales whose timestamp falls on `today` (`YYYY-MM-DD`).
pub fn render_sales_today(sales: &[Sale], today: &str) -> String {
    let todays: Vec<&Sale> = sales
        .iter()
        .filter(|s| s.timestamp.starts_with(today))
        .collect();

    let mut text = String::from("Sales Today:\n");
    if todays.is_empty() {
        text.push_str("No sales yet today.\n");
        return text;
    }
    let revenue: f64 = todays.iter().map(|s| s.total_amount).sum();
    text.push_str(&format!("Total Revenue: ₹{}\n", format_amount(revenue)));
    text.push_str(&format!("Total Transactions: {}\n", todays.len()));
    text
}

/// Render the raw snapshot block.
pub fn render_snapshot(products: &[Product], sales: &[Sale], today: &str) -> String {
    format!(
        "{}\n{}",
        render_inventory(products),
        render_sales_today(sales, today)
    )
}

/// Wrap a snapshot in the assistant preamble and response guidelines.
pub fn build_system_context(snapshot: &str) -> String {
    format!(
        "System Instruction: You are KiranaAI, an intelligent and helpful shop assistant. \
         Your goal is to assist the shopkeeper using the real-time data provided below.\n\n\
         <shop_data>\n{snapshot}\n</shop_data>\n\n\
         Guidelines:\n\
         1. **Language Matching**: You MUST reply in the EXACT SAME language as the user's input. \
         If the user speaks Hindi, reply in Hindi. If Telugu, reply in Telugu. If English, reply in English.\n\
         2. **Voice-Only Output**: You are a voice assistant. Do NOT output any internal thoughts, headers, \
         markdown formatting (like **bold**, ## headers), or status updates.\n\
         3. **Conciseness**: Be direct, natural, and concise. Do not narrate your actions \
         (e.g., 'Checking the database...'). Just give the answer.\n\
         4. **Data Grounding**: Use the data in <shop_data> to answer questions accurately. \
         If the information is not there, politely say you don't know."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(name: &str, price: f64, stock: i64) -> Product {
        Product {
            name: name.to_string(),
            price,
            stock,
            category: None,
        }
    }

    fn sale(total: f64, timestamp: &str) -> Sale {
        Sale {
            quantity: 1,
            total_amount: total,
            timestamp: timestamp.to_string(),
            product_name: None,
        }
    }

    #[test]
    fn test_render_inventory() {
        let text = render_inventory(&[product("Rice", 60.0, 25), product("Dal", 112.5, 4)]);
        assert_eq!(
            text,
            "Current Inventory:\n- Rice: 25 units (Price: ₹60.0)\n- Dal: 4 units (Price: ₹112.5)\n"
        );
    }

    #[test]
    fn test_render_empty_inventory() {
        assert_eq!(render_inventory(&[]), "Current Inventory:\nNo items in stock.\n");
    }

    #[test]
    fn test_render_sales_filters_today() {
        let sales = vec![
            sale(120.0, "2026-03-04T09:15:00"),
            sale(30.5, "2026-03-04T18:01:22.123456"),
            sale(999.0, "2026-03-03T23:59:59"),
        ];
        let text = render_sales_today(&sales, "2026-03-04");
        assert_eq!(
            text,
            "Sales Today:\nTotal Revenue: ₹150.5\nTotal Transactions: 2\n"
        );
    }

    #[test]
    fn test_render_no_sales_today() {
        let sales = vec![sale(10.0, "2020-01-01T00:00:00")];
        assert_eq!(
            render_sales_today(&sales, "2026-03-04"),
            "Sales Today:\nNo sales yet today.\n"
        );
    }

    #[test]
    fn test_snapshot_and_preamble() {
        let snapshot = render_snapshot(&[], &[], "2026-03-04");
        assert_eq!(
            snapshot,
            "Current Inventory:\nNo items in stock.\n\nSales Today:\nNo sales yet today.\n"
        );

        let context = build_system_context(&snapshot);
        assert!(context.starts_with("System Instruction: You are KiranaAI"));
        assert!(context.contains(&format!("<shop_data>\n{snapshot}\n</shop_data>")));
        assert!(context.contains("Language Matching"));
        assert!(context.ends_with("politely say you don't know."));
    }

    #[test]
    fn test_today_utc_shape() {
        let today = today_utc();
        assert_eq!(today.len(), 10);
        assert_eq!(&today[4..5], "-");
        assert_eq!(&today[7..8], "-");
    }

    #[test]
    fn test_product_deserialize_ignores_extra_fields() {
        let json = r#"{"id":3,"name":"Sugar","category":"Staples","price":45,"stock":10,"shelf_position":"A2"}"#;
        let p: Product = serde_json::from_str(json).unwrap();
        assert_eq!(p.name, "Sugar");
        assert_eq!(p.price, 45.0);
        assert_eq!(p.category.as_deref(), Some("Staples"));
    }
}
