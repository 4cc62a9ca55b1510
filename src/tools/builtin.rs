//! Ready-made tool definitions.

use serde_json::json;

use super::definition::{HttpMethod, InvocationTemplate, ToolDefinition};

/// Currency exchange-rate lookup (Frankfurter-style `GET /latest`).
///
/// `base_url` is the endpoint root, e.g. `https://api.frankfurter.app`.
pub fn currency_rate(base_url: &str) -> ToolDefinition {
    ToolDefinition::new(
        "get_rate",
        "Get the latest foreign exchange rate between two currencies",
        json!({
            "type": "object",
            "properties": {
                "base": { "type": "string", "description": "Base currency code, e.g. USD" },
                "target": { "type": "string", "description": "Target currency code, e.g. EUR" },
            },
            "required": ["base", "target"],
        }),
        InvocationTemplate::new(
            HttpMethod::Get,
            format!("{}/latest", base_url.trim_end_matches('/')),
        ),
    )
}

/// Stock quote lookup by ticker symbol.
pub fn stock_quote(base_url: &str) -> ToolDefinition {
    ToolDefinition::new(
        "get_quote",
        "Get the latest quoted price for a stock ticker symbol",
        json!({
            "type": "object",
            "properties": {
                "symbol": { "type": "string", "description": "Ticker symbol, e.g. MSFT" },
            },
            "required": ["symbol"],
        }),
        InvocationTemplate::new(
            HttpMethod::Get,
            format!("{}/quote/{{symbol}}", base_url.trim_end_matches('/')),
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn currency_rate_renders_as_query_lookup() {
        let definition = currency_rate("https://api.test/");
        let request = definition
            .invocation
            .render("get_rate", &json!({"base": "USD", "target": "EUR"}))
            .expect("render");

        assert_eq!(request.url, "https://api.test/latest");
        assert!(request.query.contains(&("base".to_string(), "USD".to_string())));
    }

    #[test]
    fn stock_quote_renders_symbol_into_path() {
        let definition = stock_quote("https://api.test");
        let request = definition
            .invocation
            .render("get_quote", &json!({"symbol": "MSFT"}))
            .expect("render");

        assert_eq!(request.url, "https://api.test/quote/MSFT");
        assert!(request.query.is_empty());
    }
}
