use std::collections::HashMap;

pub mod models;
use reqwest::{header, Client};

use crate::models::MessageResponse;

#[derive(Debug, Clone)]
pub struct TwilioOptions {
    pub account_sid: String,
    pub auth_token: String,
    pub whatsapp_number: String,
}

#[derive(Debug, Clone)]
pub struct TwilioService {
    options: TwilioOptions,
}

/// Prefix a phone number with the `whatsapp:` channel marker exactly once.
fn whatsapp_address(number: &str) -> String {
    if number.starts_with("whatsapp:") {
        number.to_string()
    } else {
        format!("whatsapp:{}", number)
    }
}

impl TwilioService {
    pub fn new(options: TwilioOptions) -> Self {
        Self { options }
    }

    /// Send a freeform WhatsApp message.
    ///
    /// Twilio only accepts freeform bodies inside an open conversation
    /// window; outside of it use `send_template`.
    pub async fn send_message(
        &self,
        recipient: &str,
        body: &str,
    ) -> Result<MessageResponse, &'static str> {
        let mut form_body: HashMap<&str, String> = HashMap::new();
        form_body.insert("To", whatsapp_address(recipient));
        form_body.insert("From", whatsapp_address(&self.options.whatsapp_number));
        form_body.insert("Body", body.to_string());

        self.post_message(form_body).await
    }

    /// Send a pre-approved content template with its variable values.
    pub async fn send_template(
        &self,
        recipient: &str,
        content_sid: &str,
        variables: &HashMap<String, String>,
    ) -> Result<MessageResponse, &'static str> {
        let content_variables = serde_json::to_string(variables)
            .map_err(|_| "Failed to serialize template variables")?;

        let mut form_body: HashMap<&str, String> = HashMap::new();
        form_body.insert("To", whatsapp_address(recipient));
        form_body.insert("From", whatsapp_address(&self.options.whatsapp_number));
        form_body.insert("ContentSid", content_sid.to_string());
        form_body.insert("ContentVariables", content_variables);

        self.post_message(form_body).await
    }

    async fn post_message(
        &self,
        form_body: HashMap<&str, String>,
    ) -> Result<MessageResponse, &'static str> {
        let account_sid = self.options.account_sid.clone();
        let auth_token = self.options.auth_token.clone();

        let url = format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Messages.json",
            account_sid
        );

        let mut headers = header::HeaderMap::new();
        headers.insert(
            "Content-Type",
            "application/x-www-form-urlencoded"
                .parse()
                .expect("Header value should parse correctly"),
        );

        let client = Client::new();
        let res = client
            .post(url)
            .basic_auth(account_sid, Some(auth_token))
            .headers(headers)
            .form(&form_body)
            .send()
            .await;

        match res {
            Ok(response) => {
                let status = response.status();
                if !status.is_success() {
                    // Log the error response from Twilio
                    let error_body = response.text().await.unwrap_or_default();
                    eprintln!("Twilio error ({}): {}", status, error_body);
                    return Err("Twilio returned an error");
                }

                let result = response.json::<MessageResponse>().await;
                match result {
                    Ok(data) => Ok(data),
                    Err(e) => {
                        eprintln!("Failed to parse Twilio response: {}", e);
                        Err("Error parsing message response")
                    }
                }
            }
            Err(e) => {
                eprintln!("Request to Twilio failed: {}", e);
                Err("Error sending WhatsApp message")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whatsapp_prefix_added_once() {
        assert_eq!(whatsapp_address("+31612345678"), "whatsapp:+31612345678");
        assert_eq!(
            whatsapp_address("whatsapp:+31612345678"),
            "whatsapp:+31612345678"
        );
    }
}
