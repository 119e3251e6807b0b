use serde_json::Value;

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_SIZE: u64 = 50;
pub const MAX_SIZE: u64 = 500;
pub const MAX_PAGE: u64 = i32::MAX as u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u64,
    pub size: u64,
    pub offset: u64,
}

/// Derives page, size and offset from raw parameters. A missing, unreadable
/// or zero value falls back to the default before clamping.
pub fn resolve(page_raw: Option<&str>, size_raw: Option<&str>) -> Page {
    let page = page_raw
        .and_then(leading_integer)
        .filter(|page| *page != 0)
        .unwrap_or(DEFAULT_PAGE as i64)
        .clamp(1, MAX_PAGE as i64) as u64;

    let size = size_raw
        .and_then(leading_integer)
        .filter(|size| *size != 0)
        .unwrap_or(DEFAULT_SIZE as i64)
        .clamp(1, MAX_SIZE as i64) as u64;

    Page {
        page,
        size,
        offset: (page - 1) * size,
    }
}

/// The indexer reports `hits.total` either as a bare number or as
/// `{ "value": n, "relation": "eq" | "gte" }`.
pub fn reconcile_total(total: Option<&Value>, returned: usize) -> u64 {
    match total {
        Some(Value::Number(number)) => number.as_u64(),
        Some(Value::Object(object)) => object
            .get("value")
            .and_then(Value::as_u64)
            .filter(|value| *value > 0),
        _ => None,
    }
    .unwrap_or(returned as u64)
}

/// Reads an optional sign followed by digits and ignores whatever trails
/// them, so `"3abc"` is page 3.
fn leading_integer(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    let (negative, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let digits_end = rest
        .find(|ch: char| !ch.is_ascii_digit())
        .unwrap_or(rest.len());
    if digits_end == 0 {
        return None;
    }
    let magnitude = rest[..digits_end].parse::<i64>().unwrap_or(i64::MAX);
    Some(if negative { -magnitude } else { magnitude })
}
