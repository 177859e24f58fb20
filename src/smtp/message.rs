use crate::resource::EmailSpec;
use crate::smtp::{SmtpError, SmtpResult};
use lettre::{
    message::{Mailbox, Mailboxes, MultiPart, SinglePart},
    Address, Message,
};
use std::str::FromStr;

/// Which alternative a body is attached as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Plain,
    Html,
}

impl BodyKind {
    /// A body whose first non-blank character is `<` is treated as HTML
    pub fn detect(body: &str) -> Self {
        if body.trim().starts_with('<') {
            BodyKind::Html
        } else {
            BodyKind::Plain
        }
    }
}

/// Builds a `multipart/alternative` message carrying a single rendering
pub struct MessageBuilder {
    from: Option<Mailbox>,
    to: Vec<Mailbox>,
    subject: String,
    body: String,
}

impl MessageBuilder {
    /// Create a new message builder
    pub fn new() -> Self {
        Self {
            from: None,
            to: Vec::new(),
            subject: String::new(),
            body: String::new(),
        }
    }

    /// Prepare a builder from the fields of an Email resource
    pub fn from_spec(spec: &EmailSpec) -> SmtpResult<Self> {
        Ok(Self::new()
            .sender(&spec.from_name, &spec.from_address)?
            .to_str(&spec.to_address)?
            .subject(&spec.subject)
            .body(&spec.body))
    }

    /// Set the sender, rendered as `Name <address>`. The name is kept as given.
    pub fn sender(mut self, name: &str, address: &str) -> SmtpResult<Self> {
        let address = Address::from_str(address.trim())?;
        let name = (!name.is_empty()).then(|| name.to_string());
        self.from = Some(Mailbox::new(name, address));
        Ok(self)
    }

    /// Add To recipients from an address list (`a@b, "Doe, John" <c@d>`)
    pub fn to_str(mut self, to: &str) -> SmtpResult<Self> {
        self.to.extend(Mailboxes::from_str(to.trim())?);
        Ok(self)
    }

    /// Set the subject
    pub fn subject<S: Into<String>>(mut self, subject: S) -> Self {
        self.subject = subject.into();
        self
    }

    /// Set the body; its kind is decided at build time
    pub fn body<S: Into<String>>(mut self, body: S) -> Self {
        self.body = body.into();
        self
    }

    /// Build the message
    pub fn build(self) -> SmtpResult<Message> {
        let from = self
            .from
            .ok_or_else(|| SmtpError::MessageFormatError("From address is required".to_string()))?;

        if self.to.is_empty() {
            return Err(SmtpError::MessageFormatError(
                "At least one recipient is required".to_string(),
            ));
        }

        let mut message_builder = Message::builder().from(from).subject(self.subject);
        for to in self.to {
            message_builder = message_builder.to(to);
        }
        message_builder = message_builder.date_now();

        let part = match BodyKind::detect(&self.body) {
            BodyKind::Html => SinglePart::html(self.body),
            BodyKind::Plain => SinglePart::plain(self.body),
        };

        let message = message_builder.multipart(MultiPart::alternative().singlepart(part))?;
        Ok(message)
    }
}

impl Default for MessageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(body: &str) -> EmailSpec {
        EmailSpec {
            to_address: "customer@example.com".to_string(),
            from_name: "Web Shop".to_string(),
            from_address: "shop@example.com".to_string(),
            subject: "Your order".to_string(),
            body: body.to_string(),
        }
    }

    fn formatted(message: &Message) -> String {
        String::from_utf8(message.formatted()).unwrap()
    }

    #[test]
    fn test_body_kind_detection() {
        assert_eq!(BodyKind::detect("<p>Hi</p>"), BodyKind::Html);
        assert_eq!(BodyKind::detect("  \n<p>Hi</p>  "), BodyKind::Html);
        assert_eq!(BodyKind::detect("Hi"), BodyKind::Plain);
        assert_eq!(BodyKind::detect("Hi <b>there</b>"), BodyKind::Plain);
    }

    #[test]
    fn test_html_body_attached_as_html() {
        let message = MessageBuilder::from_spec(&spec("<p>Hi</p>"))
            .unwrap()
            .build()
            .unwrap();
        let raw = formatted(&message);

        assert!(raw.contains("multipart/alternative"));
        assert!(raw.contains("text/html"));
        assert!(!raw.contains("text/plain"));
    }

    #[test]
    fn test_plain_body_attached_as_text() {
        let message = MessageBuilder::from_spec(&spec("Hi"))
            .unwrap()
            .build()
            .unwrap();
        let raw = formatted(&message);

        assert!(raw.contains("multipart/alternative"));
        assert!(raw.contains("text/plain"));
        assert!(!raw.contains("text/html"));
    }

    #[test]
    fn test_headers() {
        let message = MessageBuilder::from_spec(&spec("Hi"))
            .unwrap()
            .build()
            .unwrap();

        let from = message.headers().get_raw("From").unwrap();
        assert!(from.contains("Web Shop"));
        assert!(from.contains("<shop@example.com>"));
        assert_eq!(
            message.headers().get_raw("To"),
            Some("customer@example.com")
        );
        assert_eq!(message.headers().get_raw("Subject"), Some("Your order"));
        assert_eq!(message.envelope().to().len(), 1);
    }

    #[test]
    fn test_multiple_recipients() {
        let mut fields = spec("Hi");
        fields.to_address = "a@example.com, Bob <b@example.com>".to_string();

        let message = MessageBuilder::from_spec(&fields).unwrap().build().unwrap();
        assert_eq!(message.envelope().to().len(), 2);
    }

    #[test]
    fn test_quoted_recipient_name_with_comma() {
        let mut fields = spec("Hi");
        fields.to_address = "\"Doe, John\" <john@example.com>, c@example.com".to_string();

        let message = MessageBuilder::from_spec(&fields).unwrap().build().unwrap();
        let to = message.envelope().to();
        assert_eq!(to.len(), 2);
        assert_eq!(to[0].to_string(), "john@example.com");
        assert!(message.headers().get_raw("To").unwrap().contains("Doe, John"));
    }

    #[test]
    fn test_sender_name_kept_as_given() {
        let builder = MessageBuilder::new()
            .sender("  Web Shop ", "shop@example.com")
            .unwrap();
        let from = builder.from.unwrap();

        assert_eq!(from.name.as_deref(), Some("  Web Shop "));
        assert_eq!(from.email.to_string(), "shop@example.com");
    }

    #[test]
    fn test_invalid_sender_address() {
        let mut fields = spec("Hi");
        fields.from_address = "not-an-address".to_string();

        assert!(matches!(
            MessageBuilder::from_spec(&fields),
            Err(SmtpError::AddressParseError(_))
        ));
    }

    #[test]
    fn test_missing_recipient() {
        let result = MessageBuilder::new()
            .sender("Shop", "shop@example.com")
            .unwrap()
            .subject("Test")
            .body("Body")
            .build();

        assert!(matches!(result, Err(SmtpError::MessageFormatError(_))));
    }
}
