use async_trait::async_trait;
use regex::Regex;
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::db::{service::DbService, DbPool};
use crate::llm::{
    models::{ChatOptions, Message},
    LlmProvider,
};

const SYSTEM_PERSONA: &str = "You are a helpful customer support assistant for an electric scooter company.
You help customers with questions about:
- Scooter models, features, and specifications
- Battery life, charging, and maintenance
- Troubleshooting common issues
- Order status and delivery information (you have access to their order history when they ask)
- Warranty and repair services
- Safety tips and riding guidelines

When customers ask about their orders, use the provided order history to give specific, accurate information about their purchases, delivery status, and order details.
Always be friendly, helpful, and provide clear, accurate information. If you don't know something specific about our scooters, suggest they contact our support team for detailed assistance.";

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub message: String,
    pub has_file: bool,
    pub file_name: Option<String>,
    /// Caller identity; when present and the message looks order-related, the
    /// user's order history is folded into the prompt.
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("completion call failed: {0}")]
    Upstream(String),
}

#[async_trait]
pub trait CompletionGateway: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String, GatewayError>;
}

/// Returns true when the message matches the order-intent keyword list.
pub fn is_order_query(message: &str) -> bool {
    static ORDER_INTENT: OnceLock<Regex> = OnceLock::new();
    ORDER_INTENT
        .get_or_init(|| {
            Regex::new(r"(?i)\b(order|orders|purchase|bought|delivery|shipped|status|tracking)\b")
                .unwrap()
        })
        .is_match(message)
}

/// Production gateway: classifies order intent, assembles the support persona
/// plus any order context, and calls the configured provider.
pub struct SupportGateway {
    llm: Arc<dyn LlmProvider>,
    pool: DbPool,
}

impl SupportGateway {
    pub fn new(llm: Arc<dyn LlmProvider>, pool: DbPool) -> Self {
        Self { llm, pool }
    }

    fn order_context(&self, user_id: Uuid) -> Option<String> {
        let conn = self.pool.lock().unwrap();
        let orders = match DbService::list_orders(&conn, user_id) {
            Ok(orders) => orders,
            Err(e) => {
                warn!("Could not fetch orders for {}: {}", user_id, e);
                return None;
            }
        };
        if orders.is_empty() {
            return None;
        }

        let lines: Vec<String> = orders
            .iter()
            .map(|o| {
                let mut line = format!(
                    "Order #{}: {} ({}) - Status: {} - Ordered: {} - Amount: ${:.2}",
                    o.order_number,
                    o.product_name,
                    o.product_model,
                    o.status,
                    o.order_date.format("%m/%d/%Y"),
                    o.total_amount,
                );
                if let Some(delivery) = o.delivery_date {
                    line.push_str(&format!(" - Delivery: {}", delivery.format("%m/%d/%Y")));
                }
                line
            })
            .collect();

        Some(format!("\n\nUser's Order History:\n{}", lines.join("\n")))
    }
}

#[async_trait]
impl CompletionGateway for SupportGateway {
    async fn complete(&self, request: CompletionRequest) -> Result<String, GatewayError> {
        let mut system_prompt = SYSTEM_PERSONA.to_string();

        if is_order_query(&request.message) {
            if let Some(user_id) = request.user_id {
                if let Some(context) = self.order_context(user_id) {
                    debug!("Appending order context for user {}", user_id);
                    system_prompt.push_str(&context);
                }
            }
        }

        let messages = [Message::user(request.message)];
        let options = ChatOptions {
            temperature: Some(0.7),
            max_tokens: Some(500),
            system_prompt: Some(system_prompt),
            ..Default::default()
        };

        let response = self
            .llm
            .chat(&messages, options)
            .await
            .map_err(|e| GatewayError::Upstream(e.to_string()))?;

        Ok(response.content)
    }
}
