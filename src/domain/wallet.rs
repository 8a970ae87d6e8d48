use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryItemType {
    #[default]
    Final,
    Pending,
}

/// One line of the cart shown on the wallet sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSummaryItem {
    pub label: String,
    pub amount: Decimal,
    #[serde(default, rename = "type")]
    pub item_type: SummaryItemType,
}

/// Caller-supplied cart summary for a wallet authorization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletRequest {
    pub currency: Option<String>,
    pub country: Option<String>,
    #[serde(default)]
    pub cart_items: Vec<CartSummaryItem>,
}

/// A wallet request that passed validation and is ready to present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizedWallet {
    pub merchant_identifier: Option<String>,
    pub country: String,
    pub currency: String,
    pub items: Vec<CartSummaryItem>,
    pub total: Decimal,
}

/// Opaque payment token produced by the device wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WalletToken(pub Value);

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_cart_item_deserialization_accepts_string_amounts() {
        let item: CartSummaryItem =
            serde_json::from_str(r#"{"label":"Ticket","amount":"2.50"}"#).unwrap();
        assert_eq!(item.amount, dec!(2.50));
        assert_eq!(item.item_type, SummaryItemType::Final);

        let item: CartSummaryItem =
            serde_json::from_str(r#"{"label":"Tax","amount":"0.20","type":"pending"}"#).unwrap();
        assert_eq!(item.item_type, SummaryItemType::Pending);
    }
}
