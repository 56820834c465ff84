//! Order processing workflow.
//!
//! Demonstrates:
//! - Typed values stored in the context through serde
//! - Retry with exponential backoff on a flaky payment gateway
//! - Branching on the payment method
//! - Fanning out notifications in parallel
//! - Lifecycle hooks and metrics

#![allow(dead_code)]

use async_trait::async_trait;
use kumihimo::prelude::*;
use kumihimo::{RequiredKeys, TracingMetrics, ValueKind};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Order {
    id: String,
    items: Vec<OrderItem>,
    payment_method: PaymentMethod,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OrderItem {
    product_id: String,
    quantity: u32,
    price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum PaymentMethod {
    CreditCard,
    BankTransfer,
}

/// Fails the first two calls to simulate a flaky gateway.
#[derive(Debug, Default)]
struct ChargeCardTask {
    calls: AtomicU32,
}

#[async_trait]
impl Task for ChargeCardTask {
    async fn run(&self, ctx: &mut Context) -> Result<(), TaskError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call < 3 {
            return Err(TaskError::new(format!("gateway unavailable (call {})", call)));
        }

        let total: f64 = ctx.require("total")?;
        println!("Charged {:.2} to credit card", total);
        ctx.insert("transaction_id", format!("TX-{}", call));
        Ok(())
    }
}

struct PrintHooks;

#[async_trait]
impl WorkflowHooks for PrintHooks {
    async fn before_step(&self, step: &StepName, _ctx: &Context) -> Result<(), TaskError> {
        println!("-> {}", step);
        Ok(())
    }

    async fn on_error(
        &self,
        error: &WorkflowError,
        step: &StepName,
        _ctx: &Context,
    ) -> Result<(), TaskError> {
        eprintln!("!! {} failed: {}", step, error);
        Ok(())
    }
}

fn notify(channel: &'static str) -> Result<Workflow, WorkflowError> {
    Workflow::builder()
        .name(format!("notify-{}", channel))
        .add_step(
            format!("send-{}", channel),
            task_fn(move |ctx| {
                Box::pin(async move {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    let order_id: String = ctx.require("order_id")?;
                    println!("Sent {} confirmation for {}", channel, order_id);
                    ctx.insert(format!("{}_sent", channel), true);
                    Ok(())
                })
            }),
        )
        .build()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let card = Workflow::builder()
        .name("card-payment")
        .add_configured(
            StepConfig::new("charge-card")
                .retry(RetryConfig::exponential(4, Duration::from_millis(100)))
                .timeout(Duration::from_secs(2)),
            ChargeCardTask::default(),
        )
        .build()?;

    let transfer = Workflow::builder()
        .name("bank-transfer")
        .add_fn("issue-invoice", |ctx| {
            let order_id: String = ctx.require("order_id")?;
            ctx.insert("invoice", format!("INV-{}", order_id));
            Ok(())
        })
        .build()?;

    let workflow = Workflow::builder()
        .name("order-processing")
        .hooks(PrintHooks)
        .metrics(Arc::new(TracingMetrics))
        .validator(RequiredKeys::new().typed("order", ValueKind::Object))
        .add_fn("price-order", |ctx| {
            let order: Order = ctx.require("order")?;
            if order.items.is_empty() {
                return Err("order has no items".into());
            }
            let total: f64 = order
                .items
                .iter()
                .map(|item| item.price * f64::from(item.quantity))
                .sum();
            ctx.insert("order_id", order.id);
            ctx.insert("total", total);
            ctx.insert_serialized("payment_method", &order.payment_method)?;
            Ok(())
        })
        .add_condition(
            Condition::new()
                .named("payment")
                .branch(ConditionBranch::new(
                    "credit card",
                    |ctx: &Context| {
                        matches!(
                            ctx.get::<PaymentMethod>("payment_method"),
                            Some(PaymentMethod::CreditCard)
                        )
                    },
                    card,
                ))
                .otherwise(transfer),
        )
        .add_parallel(Parallel::new([notify("email")?, notify("sms")?]).named("notify"))
        .build()?;

    let order = Order {
        id: "ORD-001".to_string(),
        items: vec![
            OrderItem {
                product_id: "PROD-1".to_string(),
                quantity: 2,
                price: 29.99,
            },
            OrderItem {
                product_id: "PROD-2".to_string(),
                quantity: 1,
                price: 49.99,
            },
        ],
        payment_method: PaymentMethod::CreditCard,
    };

    let mut ctx = Context::new();
    ctx.insert_serialized("order", &order)?;

    let result = workflow.execute(&ctx).await?;
    println!(
        "Order {} done, transaction {:?}, email sent: {:?}",
        order.id,
        result.get::<String>("transaction_id"),
        result.get::<bool>("email_sent")
    );

    Ok(())
}
