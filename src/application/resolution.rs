//! Turns a caller's payment method request into provider-ready parameters.

use crate::domain::method::{
    Address, BillingDetails, CardTokenParams, ConfirmParams, PaymentMethodOptions, PaymentMethodParams,
    PaymentMethodRequest, PaymentMethodSource, PaymentMethodType, SetupFutureUsage,
    ShippingDetails,
};
use crate::domain::platform::Platform;
use crate::domain::session::SessionContext;
use crate::domain::wallet::{AuthorizedWallet, CartSummaryItem, WalletRequest};
use crate::error::{PaymentError, Result};
use rust_decimal::Decimal;
use url::Url;

const TEST_OFFLINE_BANK: &str = "test_offline_bank";

/// What a confirmation attempt does next.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Parameters are complete; submit them.
    Ready(ConfirmParams),
    /// The user has to pick a bank first.
    BankSelection(PaymentMethodType),
    /// The device wallet has to authorize the cart first.
    Wallet(AuthorizedWallet),
}

pub struct PaymentMethodResolver<'s> {
    session: &'s SessionContext,
    platform: Platform,
}

impl<'s> PaymentMethodResolver<'s> {
    pub fn new(session: &'s SessionContext, platform: Platform) -> Self {
        Self { session, platform }
    }

    pub fn return_url(&self) -> Option<Url> {
        self.session.return_url(self.platform)
    }

    pub fn for_confirmation(
        &self,
        client_secret: &str,
        request: &PaymentMethodRequest<'_>,
    ) -> Result<Resolution> {
        let method_type = request.declared_type()?;

        if request.text("paymentMethodId").is_none() {
            if method_type == PaymentMethodType::Fpx && !request.flag("testOfflineBank") {
                return Ok(Resolution::BankSelection(method_type));
            }
            if method_type.is_wallet() {
                return self.wallet_for_type(method_type, request).map(Resolution::Wallet);
            }
        }

        let source = self.source(method_type, request)?;
        self.confirm_params(client_secret, source, method_type, request)
            .map(Resolution::Ready)
    }

    /// Setup intents only accept types whose parameters can be built right away.
    pub fn for_setup(
        &self,
        client_secret: &str,
        request: &PaymentMethodRequest<'_>,
    ) -> Result<ConfirmParams> {
        let method_type = request.declared_type()?;
        if request.text("paymentMethodId").is_none() {
            reject_interactive(method_type, request)?;
        }
        let source = self.source(method_type, request)?;
        self.confirm_params(client_secret, source, method_type, request)
    }

    /// Parameters for a standalone payment method creation.
    pub fn params(&self, request: &PaymentMethodRequest<'_>) -> Result<PaymentMethodParams> {
        let method_type = request.declared_type()?;
        reject_interactive(method_type, request)?;
        build_params(method_type, request)
    }

    /// Parameters for a card token. Only cards can be tokenized.
    pub fn card_token(&self, request: &PaymentMethodRequest<'_>) -> Result<CardTokenParams> {
        if let Some(tag) = non_blank(request.method_type.as_deref()) {
            if tag != PaymentMethodType::Card.as_str() {
                return Err(PaymentError::validation(format!(
                    "{tag} type is not supported yet"
                )));
            }
        }
        let card = request
            .card
            .ok_or_else(|| PaymentError::validation("Card details not complete"))?;
        Ok(CardTokenParams {
            card: card.clone(),
            name: request.text("name").map(str::to_string),
            address: request.object::<Address>("address")?,
        })
    }

    fn source(
        &self,
        method_type: PaymentMethodType,
        request: &PaymentMethodRequest<'_>,
    ) -> Result<PaymentMethodSource> {
        match request.text("paymentMethodId") {
            Some(id) => Ok(PaymentMethodSource::Id(id.to_string())),
            None => build_params(method_type, request).map(PaymentMethodSource::Params),
        }
    }

    fn confirm_params(
        &self,
        client_secret: &str,
        payment_method: PaymentMethodSource,
        method_type: PaymentMethodType,
        request: &PaymentMethodRequest<'_>,
    ) -> Result<ConfirmParams> {
        let options = PaymentMethodOptions {
            card_cvc: request.text("cvc").map(str::to_string),
            wechat_app_id: match method_type {
                PaymentMethodType::WeChatPay => request.text("appId").map(str::to_string),
                _ => None,
            },
        };
        Ok(ConfirmParams {
            client_secret: client_secret.to_string(),
            payment_method,
            options: (!options.is_empty()).then_some(options),
            shipping: request.object::<ShippingDetails>("shippingDetails")?,
            return_url: self.return_url(),
            setup_future_usage: request.object::<SetupFutureUsage>("setupFutureUsage")?,
        })
    }

    fn wallet_for_type(
        &self,
        method_type: PaymentMethodType,
        request: &PaymentMethodRequest<'_>,
    ) -> Result<AuthorizedWallet> {
        let native = match self.platform {
            Platform::Ios => PaymentMethodType::ApplePay,
            Platform::Android => PaymentMethodType::GooglePay,
        };
        if method_type != native {
            return Err(PaymentError::validation(format!(
                "{method_type} is not available on {}",
                self.platform
            )));
        }
        let wallet = WalletRequest {
            currency: request.text("currency").map(str::to_string),
            country: request.text("country").map(str::to_string),
            cart_items: request
                .object::<Vec<CartSummaryItem>>("cartItems")?
                .unwrap_or_default(),
        };
        self.wallet(&wallet)
    }

    /// Checks a wallet cart and totals it.
    pub fn wallet(&self, request: &WalletRequest) -> Result<AuthorizedWallet> {
        let merchant_identifier = self.session.merchant_identifier().map(str::to_string);
        if self.platform == Platform::Ios && merchant_identifier.is_none() {
            return Err(PaymentError::missing("merchantIdentifier"));
        }
        if request.cart_items.is_empty() {
            return Err(PaymentError::missing("the items for purchase"));
        }
        if let Some(item) = request
            .cart_items
            .iter()
            .find(|item| item.amount < Decimal::ZERO)
        {
            return Err(PaymentError::validation(format!(
                "Invalid amount for {}",
                item.label
            )));
        }
        let country = non_blank(request.country.as_deref())
            .ok_or_else(|| PaymentError::missing("the country"))?;
        let currency = non_blank(request.currency.as_deref())
            .ok_or_else(|| PaymentError::missing("the payment currency"))?;

        Ok(AuthorizedWallet {
            merchant_identifier,
            country: country.to_string(),
            currency: currency.to_string(),
            total: request.cart_items.iter().map(|item| item.amount).sum::<Decimal>(),
            items: request.cart_items.clone(),
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn reject_interactive(method_type: PaymentMethodType, request: &PaymentMethodRequest<'_>) -> Result<()> {
    let interactive = method_type.is_wallet()
        || (method_type == PaymentMethodType::Fpx && !request.flag("testOfflineBank"));
    if interactive {
        return Err(PaymentError::validation(format!(
            "{method_type} type is not supported yet"
        )));
    }
    Ok(())
}

fn require<'r>(request: &'r PaymentMethodRequest<'_>, key: &str) -> Result<&'r str> {
    request.text(key).ok_or_else(|| PaymentError::missing(key))
}

fn require_billing(
    billing: Option<&BillingDetails>,
    name: bool,
    email: bool,
) -> Result<()> {
    let present = |field: Option<&String>| field.is_some_and(|v| !v.trim().is_empty());
    if name && !present(billing.and_then(|b| b.name.as_ref())) {
        return Err(PaymentError::missing("billingDetails.name"));
    }
    if email && !present(billing.and_then(|b| b.email.as_ref())) {
        return Err(PaymentError::missing("billingDetails.email"));
    }
    Ok(())
}

fn build_params(
    method_type: PaymentMethodType,
    request: &PaymentMethodRequest<'_>,
) -> Result<PaymentMethodParams> {
    let billing = request.object::<BillingDetails>("billingDetails")?;
    let mut params = PaymentMethodParams::new(method_type);

    match method_type {
        PaymentMethodType::Card => {
            let card = request
                .card
                .ok_or_else(|| PaymentError::validation("Card details not complete"))?;
            params.card = Some(card.clone());
        }
        PaymentMethodType::Ideal => {
            if let Some(bank) = request.text("bankName") {
                params.fields.insert("bankName".into(), bank.into());
            }
        }
        PaymentMethodType::Sofort => {
            let country = require(request, "country")?;
            params.fields.insert("country".into(), country.into());
        }
        PaymentMethodType::Bancontact | PaymentMethodType::Giropay | PaymentMethodType::Eps => {
            require_billing(billing.as_ref(), true, false)?;
        }
        PaymentMethodType::P24 | PaymentMethodType::Oxxo => {
            require_billing(billing.as_ref(), true, true)?;
        }
        PaymentMethodType::SepaDebit => {
            let iban = require(request, "iban")?;
            require_billing(billing.as_ref(), true, true)?;
            params.fields.insert("iban".into(), iban.into());
        }
        PaymentMethodType::AuBecsDebit => {
            let bsb = require(request, "bsbNumber")?;
            let account = require(request, "accountNumber")?;
            require_billing(billing.as_ref(), true, true)?;
            params.fields.insert("bsbNumber".into(), bsb.into());
            params.fields.insert("accountNumber".into(), account.into());
        }
        PaymentMethodType::Upi => {
            let vpa = require(request, "vpa")?;
            params.fields.insert("vpa".into(), vpa.into());
        }
        PaymentMethodType::WeChatPay => {
            let app_id = require(request, "appId")?;
            params.fields.insert("appId".into(), app_id.into());
        }
        PaymentMethodType::AfterpayClearpay => {
            if request.object::<ShippingDetails>("shippingDetails")?.is_none() {
                return Err(PaymentError::missing("shippingDetails"));
            }
        }
        PaymentMethodType::Fpx => {
            params.fields.insert("bank".into(), TEST_OFFLINE_BANK.into());
        }
        PaymentMethodType::Alipay | PaymentMethodType::GrabPay => {}
        PaymentMethodType::ApplePay | PaymentMethodType::GooglePay => {
            return Err(PaymentError::validation(format!(
                "{method_type} type is not supported yet"
            )));
        }
    }

    params.billing_details = billing;
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::method::CardCapture;
    use crate::domain::session::SessionConfig;
    use crate::domain::wallet::SummaryItemType;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn session() -> SessionContext {
        SessionContext::new(SessionConfig {
            publishable_key: "pk_test_1".into(),
            url_scheme: Some("shop".into()),
            merchant_identifier: Some("merchant.com.shop".into()),
            ..Default::default()
        })
        .unwrap()
    }

    fn card() -> CardCapture {
        CardCapture {
            handle: "card_field_1".into(),
            brand: Some("visa".into()),
            last4: Some("4242".into()),
            postal_code: None,
        }
    }

    #[test]
    fn test_card_requires_capture() {
        let session = session();
        let resolver = PaymentMethodResolver::new(&session, Platform::Ios);
        let err = resolver
            .for_confirmation("pi_secret", &PaymentMethodRequest::new("Card"))
            .unwrap_err();
        assert_eq!(err, PaymentError::Validation("Card details not complete".into()));
    }

    #[test]
    fn test_card_with_capture_and_cvc() {
        let session = session();
        let resolver = PaymentMethodResolver::new(&session, Platform::Ios);
        let card = card();
        let request = PaymentMethodRequest::new("Card")
            .with_card(&card)
            .with_field("cvc", "123")
            .with_field("setupFutureUsage", "OffSession");

        let Resolution::Ready(params) = resolver.for_confirmation("pi_secret", &request).unwrap()
        else {
            panic!("card should resolve synchronously");
        };
        assert_eq!(params.client_secret, "pi_secret");
        assert_eq!(params.options.unwrap().card_cvc.as_deref(), Some("123"));
        assert_eq!(params.setup_future_usage, Some(SetupFutureUsage::OffSession));
        assert_eq!(params.return_url.unwrap().as_str(), "shop://safepay");
        match params.payment_method {
            PaymentMethodSource::Params(p) => assert_eq!(p.card, Some(card.clone())),
            other => panic!("unexpected source {other:?}"),
        }
    }

    #[test]
    fn test_existing_payment_method_id_skips_field_checks() {
        let session = session();
        let resolver = PaymentMethodResolver::new(&session, Platform::Android);
        let request = PaymentMethodRequest::new("SepaDebit").with_field("paymentMethodId", "pm_9");

        let Resolution::Ready(params) = resolver.for_confirmation("pi_secret", &request).unwrap()
        else {
            panic!("expected ready params");
        };
        assert_eq!(params.payment_method, PaymentMethodSource::Id("pm_9".into()));
        // Android without opt-in does not get the url scheme
        assert_eq!(params.return_url, None);
    }

    #[test]
    fn test_first_missing_field_is_named() {
        let session = session();
        let resolver = PaymentMethodResolver::new(&session, Platform::Ios);

        let sepa = PaymentMethodRequest::new("SepaDebit").with_field("iban", "DE89370400440532013000");
        assert_eq!(
            resolver.for_confirmation("s", &sepa).unwrap_err(),
            PaymentError::missing("billingDetails.name")
        );

        let becs = PaymentMethodRequest::new("AuBecsDebit").with_field("bsbNumber", "000000");
        assert_eq!(
            resolver.for_confirmation("s", &becs).unwrap_err(),
            PaymentError::missing("accountNumber")
        );

        let oxxo = PaymentMethodRequest::new("Oxxo")
            .with_field("billingDetails", json!({"name": "Ana"}));
        assert_eq!(
            resolver.for_confirmation("s", &oxxo).unwrap_err(),
            PaymentError::missing("billingDetails.email")
        );

        assert_eq!(
            resolver
                .for_confirmation("s", &PaymentMethodRequest::new("Sofort"))
                .unwrap_err(),
            PaymentError::missing("country")
        );
        assert_eq!(
            resolver
                .for_confirmation("s", &PaymentMethodRequest::new("AfterpayClearpay"))
                .unwrap_err(),
            PaymentError::missing("shippingDetails")
        );
    }

    #[test]
    fn test_fpx_defers_to_bank_selection() {
        let session = session();
        let resolver = PaymentMethodResolver::new(&session, Platform::Android);
        assert_eq!(
            resolver
                .for_confirmation("s", &PaymentMethodRequest::new("Fpx"))
                .unwrap(),
            Resolution::BankSelection(PaymentMethodType::Fpx)
        );

        let test_bank = PaymentMethodRequest::new("Fpx").with_field("testOfflineBank", true);
        assert!(matches!(
            resolver.for_confirmation("s", &test_bank).unwrap(),
            Resolution::Ready(_)
        ));
    }

    #[test]
    fn test_wechat_app_id_goes_into_options() {
        let session = session();
        let resolver = PaymentMethodResolver::new(&session, Platform::Ios);
        let request = PaymentMethodRequest::new("WeChatPay").with_field("appId", "wx_1");
        let Resolution::Ready(params) = resolver.for_confirmation("s", &request).unwrap() else {
            panic!("expected ready params");
        };
        assert_eq!(params.options.unwrap().wechat_app_id.as_deref(), Some("wx_1"));
    }

    #[test]
    fn test_wallet_type_validates_cart() {
        let session = session();
        let resolver = PaymentMethodResolver::new(&session, Platform::Ios);

        let empty = PaymentMethodRequest::new("ApplePay");
        assert_eq!(
            resolver.for_confirmation("s", &empty).unwrap_err(),
            PaymentError::missing("the items for purchase")
        );

        let request = PaymentMethodRequest::new("ApplePay")
            .with_field(
                "cartItems",
                json!([{"label": "Shirt", "amount": "10.50"}, {"label": "Tax", "amount": "1.05"}]),
            )
            .with_field("country", "US")
            .with_field("currency", "usd");
        let Resolution::Wallet(wallet) = resolver.for_confirmation("s", &request).unwrap() else {
            panic!("expected wallet sub-flow");
        };
        assert_eq!(wallet.total, dec!(11.55));
        assert_eq!(wallet.merchant_identifier.as_deref(), Some("merchant.com.shop"));

        let android = PaymentMethodResolver::new(&session, Platform::Android);
        assert!(android.for_confirmation("s", &request).is_err());
    }

    #[test]
    fn test_wallet_check_order() {
        let session = SessionContext::new(SessionConfig {
            publishable_key: "pk_test_1".into(),
            ..Default::default()
        })
        .unwrap();
        let items = vec![CartSummaryItem {
            label: "Coffee".into(),
            amount: dec!(3.00),
            item_type: SummaryItemType::Final,
        }];

        let ios = PaymentMethodResolver::new(&session, Platform::Ios);
        assert_eq!(
            ios.wallet(&WalletRequest::default()).unwrap_err(),
            PaymentError::missing("merchantIdentifier")
        );

        let android = PaymentMethodResolver::new(&session, Platform::Android);
        let mut request = WalletRequest {
            cart_items: items,
            ..Default::default()
        };
        assert_eq!(
            android.wallet(&request).unwrap_err(),
            PaymentError::missing("the country")
        );
        request.country = Some("US".into());
        assert_eq!(
            android.wallet(&request).unwrap_err(),
            PaymentError::missing("the payment currency")
        );
        request.currency = Some("usd".into());
        request.cart_items[0].amount = dec!(-1);
        assert!(android.wallet(&request).is_err());
    }

    #[test]
    fn test_setup_rejects_interactive_types() {
        let session = session();
        let resolver = PaymentMethodResolver::new(&session, Platform::Ios);
        assert!(resolver
            .for_setup("seti_secret", &PaymentMethodRequest::new("Fpx"))
            .is_err());
        assert!(resolver
            .params(&PaymentMethodRequest::new("ApplePay"))
            .is_err());

        let ideal = PaymentMethodRequest::new("Ideal").with_field("bankName", "ing");
        let params = resolver.for_setup("seti_secret", &ideal).unwrap();
        match params.payment_method {
            PaymentMethodSource::Params(p) => {
                assert_eq!(p.fields.get("bankName").map(String::as_str), Some("ing"))
            }
            other => panic!("unexpected source {other:?}"),
        }
    }

    #[test]
    fn test_card_token_only_for_cards() {
        let session = session();
        let resolver = PaymentMethodResolver::new(&session, Platform::Android);
        assert_eq!(
            resolver
                .card_token(&PaymentMethodRequest::new("BankAccount"))
                .unwrap_err(),
            PaymentError::Validation("BankAccount type is not supported yet".into())
        );
        assert_eq!(
            resolver
                .card_token(&PaymentMethodRequest::default())
                .unwrap_err(),
            PaymentError::Validation("Card details not complete".into())
        );

        let card = card();
        let request = PaymentMethodRequest::new("Card")
            .with_card(&card)
            .with_field("name", "Jane Doe")
            .with_field("address", json!({"city": "Berlin", "country": "DE"}));
        let params = resolver.card_token(&request).unwrap();
        assert_eq!(params.card, card);
        assert_eq!(params.name.as_deref(), Some("Jane Doe"));
        assert_eq!(
            params.address.and_then(|a| a.country).as_deref(),
            Some("DE")
        );
    }
}
