use std::collections::HashMap;
use std::fmt;

/// Name of the optional employee id attribute carried by messages.
pub const EMP_ID_ATTRIBUTE: &str = "empId";

/// A message delivered by the queue service.
///
/// Received messages are read-only; the receipt handle is what the service
/// needs to delete (acknowledge) this particular delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub message_id: String,
    pub body: String,
    pub receipt_handle: String,
    /// String-valued message attributes.
    pub attributes: HashMap<String, String>,
}

impl QueueMessage {
    pub fn new(message_id: &str, body: &str, receipt_handle: &str) -> Self {
        QueueMessage {
            message_id: message_id.to_string(),
            body: body.to_string(),
            receipt_handle: receipt_handle.to_string(),
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn emp_id(&self) -> Option<&str> {
        self.attribute(EMP_ID_ATTRIBUTE)
    }

    /// Converts an SDK message. Messages without a body are kept with an empty body.
    pub fn from_sqs(message: &aws_sdk_sqs::types::Message) -> Self {
        let attributes = message
            .message_attributes()
            .map(|attrs| {
                attrs
                    .iter()
                    .filter_map(|(name, value)| {
                        value
                            .string_value()
                            .map(|v| (name.clone(), v.to_string()))
                    })
                    .collect()
            })
            .unwrap_or_default();

        QueueMessage {
            message_id: message.message_id().unwrap_or_default().to_string(),
            body: message.body().unwrap_or_default().to_string(),
            receipt_handle: message.receipt_handle().unwrap_or_default().to_string(),
            attributes,
        }
    }
}

impl fmt::Display for QueueMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Message(id={}, body={}", self.message_id, self.body)?;
        if let Some(emp_id) = self.emp_id() {
            write!(f, ", empId={}", emp_id)?;
        }
        write!(f, ")")
    }
}
