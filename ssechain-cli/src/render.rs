//! Plain-text rendering of stream payloads for the terminal client.

use serde_json::Value;
use ssechain_core::StreamEvent;

pub const RULE_WIDTH: usize = 70;

pub fn rule(ch: char) -> String {
    std::iter::repeat(ch).take(RULE_WIDTH).collect()
}

fn field(value: &Value, key: &str) -> String {
    match value.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => "N/A".to_string(),
        Some(other) => other.to_string(),
    }
}

/// `1200000` -> `1,200,000`; non-integers are printed as they are
fn thousands(value: Option<&Value>) -> String {
    let n = match value {
        Some(Value::Null) | None => return "N/A".to_string(),
        Some(v) => match v.as_i64() {
            Some(n) => n,
            None => return v.to_string(),
        },
    };

    let digits = n.unsigned_abs().to_string();
    let mut out = String::new();
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if n < 0 {
        out.insert(0, '-');
    }
    out
}

/// Listing printed for a search `result` event
pub fn result_lines(payload: &Value) -> Vec<String> {
    let mut lines = Vec::new();

    if let Some(properties) = payload.get("properties").and_then(Value::as_array) {
        lines.push("Properties Found:".to_string());
        for prop in properties {
            lines.push(String::new());
            lines.push(format!("   • {}", field(prop, "address")));
            lines.push(format!(
                "     Price: ${} | Bedrooms: {} | Bathrooms: {} | Size: {} sq ft",
                thousands(prop.get("price")),
                field(prop, "bedrooms"),
                field(prop, "bathrooms"),
                field(prop, "square_feet"),
            ));
            lines.push(format!(
                "     Type: {} | Year Built: {}",
                field(prop, "property_type"),
                field(prop, "year_built"),
            ));

            let schools = prop.get("schools").and_then(Value::as_array);
            if let Some(schools) = schools.filter(|s| !s.is_empty()) {
                lines.push("     Nearby Schools:".to_string());
                for school in schools {
                    lines.push(format!(
                        "        - {} (Rating: {}/10, Distance: {}, Grade: {})",
                        field(school, "name"),
                        field(school, "rating"),
                        field(school, "distance"),
                        field(school, "grade"),
                    ));
                }
            }
        }
    }

    if let Some(landmarks) = payload.get("landmarks").and_then(Value::as_array) {
        lines.push(String::new());
        lines.push("Nearby Landmarks:".to_string());
        for landmark in landmarks {
            lines.push(format!(
                "   • {} ({}) - {}",
                field(landmark, "name"),
                field(landmark, "distance"),
                field(landmark, "type"),
            ));
        }
    }

    lines
}

/// Lines printed for a terminal `error` event
pub fn error_lines(event: &StreamEvent, backend: &str) -> Vec<String> {
    let mut lines = vec![format!(
        "Error: {}",
        event.error_message().unwrap_or("unknown error")
    )];

    match event.payload.get("code").and_then(Value::as_str) {
        Some("upstream_unavailable") => {
            lines.push(format!("   Cannot reach {}. Make sure the relay service is running.", backend));
            lines.push("   The relay in turn needs the origin service.".to_string());
        }
        Some(code) => lines.push(format!("Details: {}", code)),
        None => {}
    }
    lines
}
