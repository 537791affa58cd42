/// Four decimals, the usual quoting precision for EUR/USD.
pub fn format_price(price: f64) -> String {
    format!("{price:.4}")
}

pub fn format_change(change: f64) -> String {
    let sign = if change >= 0.0 { "+" } else { "" };
    format!("{sign}{change:.4}")
}

/// Percent change from `previous` to `current`; `None` when there is no usable base.
pub fn format_percent_change(current: f64, previous: f64) -> Option<String> {
    if previous.abs() < f64::EPSILON {
        return None;
    }
    let percent = (current - previous) / previous * 100.0;
    let sign = if percent >= 0.0 { "+" } else { "" };
    Some(format!("{sign}{percent:.3}%"))
}

/// Replace every occurrence of `secret` in `text` so URLs can be logged.
pub fn mask_secret(text: &str, secret: &str) -> String {
    if secret.is_empty() {
        text.to_string()
    } else {
        text.replace(secret, "***")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_prices_and_changes() {
        assert_eq!(format_price(1.16594), "1.1659");
        assert_eq!(format_change(0.0012), "+0.0012");
        assert_eq!(format_change(-0.00034), "-0.0003");
        assert_eq!(
            format_percent_change(1.1671, 1.1659).as_deref(),
            Some("+0.103%")
        );
        assert_eq!(format_percent_change(1.0, 0.0), None);
    }

    #[test]
    fn masks_secrets_in_urls() {
        let url = "https://example.test/query?apikey=SECRET123&function=X";
        assert_eq!(
            mask_secret(url, "SECRET123"),
            "https://example.test/query?apikey=***&function=X"
        );
        assert_eq!(mask_secret(url, ""), url);
    }
}
