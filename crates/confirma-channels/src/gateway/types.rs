//! Gateway API request and response bodies.

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub(crate) struct CreateSubscriber<'a> {
    pub phone: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
}

/// Subscriber as returned by create and lookup. Other fields are ignored.
#[derive(Debug, Deserialize)]
pub(crate) struct Subscriber {
    pub id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SendMessage<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub value: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct SendFlow {
    pub flow: i64,
}

#[derive(Debug, Serialize)]
pub(crate) struct CustomFieldValue<'a> {
    pub value: &'a str,
}
