//! The event record and the built-in demo dataset.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// One venue event as shown in the table. Dates are `DD/MM/YYYY` strings and
/// compare correctly as strings only within a month; the demo dataset keeps
/// that quirk of the source data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: u32,
    pub department: String,
    pub name: String,
    pub date: String,
    pub hall: String,
    pub for_sale: u32,
    pub sold: u32,
    pub reserved: u32,
    pub available: u32,
    pub status: String,
    pub price: u32,
    pub duration: String,
}

impl Event {
    /// Dynamic field access by catalog field id. Unknown ids yield `Null`,
    /// which no condition matches.
    pub fn field(&self, name: &str) -> Value {
        match name {
            "id" => json!(self.id),
            "department" => json!(self.department),
            "name" => json!(self.name),
            "date" => json!(self.date),
            "hall" => json!(self.hall),
            "forSale" => json!(self.for_sale),
            "sold" => json!(self.sold),
            "reserved" => json!(self.reserved),
            "available" => json!(self.available),
            "status" => json!(self.status),
            "price" => json!(self.price),
            "duration" => json!(self.duration),
            _ => Value::Null,
        }
    }
}

macro_rules! event {
    ($id:expr, $department:expr, $name:expr, $date:expr, $hall:expr,
     $for_sale:expr, $sold:expr, $reserved:expr, $available:expr,
     $status:expr, $price:expr, $duration:expr) => {
        Event {
            id: $id,
            department: $department.to_string(),
            name: $name.to_string(),
            date: $date.to_string(),
            hall: $hall.to_string(),
            for_sale: $for_sale,
            sold: $sold,
            reserved: $reserved,
            available: $available,
            status: $status.to_string(),
            price: $price,
            duration: $duration.to_string(),
        }
    };
}

/// The seven demo events served by the mock fetcher.
pub fn mock_events() -> Vec<Event> {
    vec![
        event!(1, "תיאטרון", "המלך ליר", "12/05/2025", "אולם ראשי", 200, 120, 30, 50, "פעיל", 120, "120 דקות"),
        event!(2, "מוזיקה", "מופע ג'אז", "15/05/2025", "אולם קטן", 100, 65, 15, 20, "פעיל", 90, "90 דקות"),
        event!(3, "הרצאות", "חדשנות בעידן הדיגיטלי", "20/05/2025", "אולם הרצאות", 150, 90, 25, 35, "פעיל", 60, "75 דקות"),
        event!(4, "ילדים", "הצגת ילדים - הענק והגמד", "25/05/2025", "אולם משפחה", 180, 160, 10, 10, "כמעט אזל", 80, "60 דקות"),
        event!(5, "מחול", "מופע בלט קלאסי", "01/06/2025", "אולם ראשי", 200, 100, 20, 80, "פעיל", 150, "140 דקות"),
        event!(6, "קולנוע", "הקרנת בכורה - סרט ישראלי חדש", "05/06/2025", "אולם קולנוע", 120, 85, 10, 25, "פעיל", 50, "110 דקות"),
        event!(7, "סטנדאפ", "ערב קומדיה", "10/06/2025", "אולם קטן", 100, 98, 2, 0, "אזל", 100, "90 דקות"),
    ]
}
