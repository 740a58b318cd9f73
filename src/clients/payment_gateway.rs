//! Hosted checkout links, requested through the backend's gateway endpoint.

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, instrument, warn};

use super::error_message;
use crate::error::{CheckoutError, Result};
use crate::models::{OrderId, PaymentLinkRequest, PaymentLinkResponse};

/// A redirect into the gateway's hosted checkout for one order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentLink {
    pub order_id: OrderId,
    pub redirect_url: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_payment_link(&self, request: &PaymentLinkRequest) -> Result<PaymentLink>;
}

#[derive(Clone)]
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPaymentGateway {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    #[instrument(skip(self, request), fields(order_id = %request.order_id, amount = request.amount))]
    async fn create_payment_link(&self, request: &PaymentLinkRequest) -> Result<PaymentLink> {
        let link_error = |reason: String| CheckoutError::PaymentLink {
            order_id: request.order_id.clone(),
            reason,
        };

        let response = self
            .client
            .post(format!("{}/api/create-mercadopago-payment", self.base_url))
            .json(request)
            .send()
            .await
            .map_err(|e| link_error(e.to_string()))?;

        if !response.status().is_success() {
            let (status, message) = error_message(response).await;
            warn!(status, "Gateway endpoint rejected payment link request");
            return Err(link_error(format!("{} ({})", message, status)));
        }

        let body: PaymentLinkResponse = response
            .json()
            .await
            .map_err(|e| link_error(format!("unreadable gateway response: {}", e)))?;

        if !body.success {
            return Err(link_error(
                body.error
                    .unwrap_or_else(|| "gateway did not create a payment link".to_string()),
            ));
        }

        let redirect_url = body
            .redirect_url()
            .ok_or_else(|| link_error("no payment URL in gateway response".to_string()))?
            .to_string();

        info!(%redirect_url, "Payment link created");
        Ok(PaymentLink {
            order_id: request.order_id.clone(),
            redirect_url,
        })
    }
}
