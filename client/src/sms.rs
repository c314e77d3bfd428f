//! SMS operations on top of the session client
//!
//! The router only exposes the first page (8 entries) of each box, and
//! entries are addressed by their 1-based position in that page rather than
//! by their stored index. Positions shift as messages arrive, so `mark_read`
//! and the deletes should follow a fresh unfiltered `inbox()`/`outbox()`.

use crate::error::{ClientError, Result};
use crate::session::SessionClient;
use chrono::NaiveDateTime;
use mr600_protocol::{Command, Method, Record, ResponsePayload, Stack, Value, controller};
use serde::Serialize;
use tracing::{debug, info};

/// Entries per box page
pub const PAGE_SIZE: u32 = 8;

const INBOX_ATTRIBUTES: [&str; 5] = ["index", "from", "content", "receivedTime", "unread"];
const OUTBOX_ATTRIBUTES: [&str; 4] = ["index", "to", "content", "sendTime"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InboxMessage {
    /// Position in the page, used to address the message
    pub order: u32,
    /// Router storage id
    pub index: Option<i64>,
    pub from: Option<String>,
    pub content: Option<String>,
    pub received_time: Option<NaiveDateTime>,
    pub unread: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboxMessage {
    pub order: u32,
    pub index: Option<i64>,
    pub to: Option<String>,
    pub content: Option<String>,
    pub send_time: Option<NaiveDateTime>,
}

/// Outcome reported by `LTE_SMS_SENDNEWMSG` after a send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SendStatus {
    Sent,
    Pending,
    Failed(i64),
    Unknown,
}

impl SendStatus {
    fn from_code(code: Option<i64>) -> Self {
        match code {
            Some(1) => SendStatus::Sent,
            Some(3) => SendStatus::Pending,
            Some(n) => SendStatus::Failed(n),
            None => SendStatus::Unknown,
        }
    }
}

/// SMS facade borrowing a session client
pub struct Sms<'a> {
    client: &'a SessionClient,
}

impl SessionClient {
    pub fn sms(&self) -> Sms<'_> {
        Sms { client: self }
    }
}

impl<'a> Sms<'a> {
    /// Received messages, optionally keeping only those whose `unread` flag matches
    pub async fn inbox(&self, unread: Option<bool>) -> Result<Vec<InboxMessage>> {
        let payload = self
            .run(vec![
                Command::new(Method::Set, controller::LTE_SMS_RECVMSGBOX).with_attr("PageNumber", 1),
                Command::new(Method::GetList, controller::LTE_SMS_RECVMSGENTRY)
                    .with_names(INBOX_ATTRIBUTES),
            ])
            .await?;

        let messages = numbered(&payload.records)
            .map(|(order, record)| InboxMessage {
                order,
                index: record.get("index").and_then(|v| v.as_i64()),
                from: text(record, "from"),
                content: text(record, "content"),
                received_time: record.get("receivedTime").and_then(|v| v.as_timestamp()),
                unread: record.get("unread").and_then(|v| v.as_bool()),
            })
            .collect();

        Ok(match unread {
            Some(flag) => filter_by_unread(messages, flag),
            None => messages,
        })
    }

    pub async fn outbox(&self) -> Result<Vec<OutboxMessage>> {
        let payload = self
            .run(vec![
                Command::new(Method::Set, controller::LTE_SMS_SENDMSGBOX).with_attr("PageNumber", 1),
                Command::new(Method::GetList, controller::LTE_SMS_SENDMSGENTRY)
                    .with_names(OUTBOX_ATTRIBUTES),
            ])
            .await?;

        Ok(numbered(&payload.records)
            .map(|(order, record)| OutboxMessage {
                order,
                index: record.get("index").and_then(|v| v.as_i64()),
                to: text(record, "to"),
                content: text(record, "content"),
                send_time: record.get("sendTime").and_then(|v| v.as_timestamp()),
            })
            .collect())
    }

    /// Submit a message. Acceptance only; see `send_status` for delivery.
    pub async fn send(&self, to: &str, content: &str) -> Result<()> {
        if to.is_empty() {
            return Err(ClientError::InvalidArgument("empty recipient".into()));
        }
        self.run(vec![
            Command::new(Method::Set, controller::LTE_SMS_SENDNEWMSG)
                .with_attr("index", 1)
                .with_attr("to", to)
                .with_attr("textContent", content),
        ])
        .await?;
        info!("SMS to {} accepted by router", to);
        Ok(())
    }

    pub async fn send_status(&self) -> Result<SendStatus> {
        let payload = self
            .run(vec![
                Command::new(Method::Get, controller::LTE_SMS_SENDNEWMSG).with_names(["sendResult"]),
            ])
            .await?;
        let code = payload
            .records
            .first()
            .and_then(|r| r.get("sendResult"))
            .and_then(|v| v.as_i64());
        Ok(SendStatus::from_code(code))
    }

    pub async fn mark_read(&self, order: u32) -> Result<()> {
        check_order(order)?;
        self.run(vec![
            Command::new(Method::Set, controller::LTE_SMS_RECVMSGENTRY)
                .with_stack(Stack::entry(order))
                .with_attr("unread", 0),
        ])
        .await?;
        Ok(())
    }

    pub async fn delete_inbox(&self, order: u32) -> Result<()> {
        self.delete(controller::LTE_SMS_RECVMSGENTRY, order).await
    }

    pub async fn delete_outbox(&self, order: u32) -> Result<()> {
        self.delete(controller::LTE_SMS_SENDMSGENTRY, order).await
    }

    async fn delete(&self, target: &str, order: u32) -> Result<()> {
        check_order(order)?;
        self.run(vec![
            Command::new(Method::Delete, target).with_stack(Stack::entry(order)),
        ])
        .await?;
        debug!("Deleted {} entry {}", target, order);
        Ok(())
    }

    async fn run(&self, commands: Vec<Command>) -> Result<ResponsePayload> {
        let payload = self.client.execute(commands).await?;
        if payload.error_code != 0 {
            return Err(ClientError::Router {
                code: payload.error_code,
            });
        }
        Ok(payload)
    }
}

/// Keep messages whose `unread` flag equals `unread`, preserving order.
/// Messages without the flag never match.
pub fn filter_by_unread(messages: Vec<InboxMessage>, unread: bool) -> Vec<InboxMessage> {
    messages
        .into_iter()
        .filter(|m| m.unread == Some(unread))
        .collect()
}

fn check_order(order: u32) -> Result<()> {
    if (1..=PAGE_SIZE).contains(&order) {
        Ok(())
    } else {
        Err(ClientError::InvalidArgument(format!(
            "order must be between 1 and {}, got {}",
            PAGE_SIZE, order
        )))
    }
}

fn numbered(records: &[Record]) -> impl Iterator<Item = (u32, &Record)> {
    records
        .iter()
        .filter(|r| !r.is_empty())
        .zip(1u32..)
        .map(|(record, order)| (order, record))
}

fn text(record: &Record, name: &str) -> Option<String> {
    record.get(name).map(|v| match v {
        Value::Text(s) => s.clone(),
        Value::Integer(n) => n.to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Timestamp(t) => t.to_string(),
    })
}
