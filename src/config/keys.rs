use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::DEFAULT_CLIENT_DATA_ID_FORMAT;
use crate::constants::DEFAULT_CONFIG_GROUP;
use crate::constants::DEFAULT_SERVER_DATA_ID_FORMAT;
use crate::KeyParams;
use crate::Result;
use crate::SubscriptionKey;

/// Templates for store keys.
///
/// Recognised placeholders: `{{.ClientServiceName}}`, `{{.ServerServiceName}}`
/// and `{{.Category}}`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct KeyConfig {
    pub group: String,
    pub server_data_id_format: String,
    pub client_data_id_format: String,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            group: DEFAULT_CONFIG_GROUP.to_string(),
            server_data_id_format: DEFAULT_SERVER_DATA_ID_FORMAT.to_string(),
            client_data_id_format: DEFAULT_CLIENT_DATA_ID_FORMAT.to_string(),
        }
    }
}

impl KeyConfig {
    pub fn validate(&self) -> Result<()> {
        let probe = KeyParams::default();
        render(&self.group, &probe)?;
        render(&self.server_data_id_format, &probe)?;
        render(&self.client_data_id_format, &probe)?;
        Ok(())
    }

    pub fn client_key(
        &self,
        params: &KeyParams,
    ) -> Result<SubscriptionKey> {
        Ok(SubscriptionKey::new(
            render(&self.client_data_id_format, params)?,
            render(&self.group, params)?,
        ))
    }

    pub fn server_key(
        &self,
        params: &KeyParams,
    ) -> Result<SubscriptionKey> {
        Ok(SubscriptionKey::new(
            render(&self.server_data_id_format, params)?,
            render(&self.group, params)?,
        ))
    }
}

/// Substitutes `{{.Name}}` placeholders from `params`.
///
/// A single leading `.` is trimmed from the result, which shows up when a
/// leading placeholder renders empty.
pub fn render(
    template: &str,
    params: &KeyParams,
) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find("}}")
            .ok_or_else(|| template_error(template, "unterminated placeholder"))?;

        let value = match after[..end].trim() {
            ".ClientServiceName" => params.client_service.as_str(),
            ".ServerServiceName" => params.server_service.as_str(),
            ".Category" => params.category.as_str(),
            other => {
                return Err(template_error(template, &format!("unknown placeholder `{other}`")));
            }
        };
        out.push_str(value);
        rest = &after[end + 2..];
    }
    out.push_str(rest);

    if out.starts_with('.') {
        out.remove(0);
    }
    Ok(out)
}

fn template_error(
    template: &str,
    reason: &str,
) -> crate::Error {
    ConfigError::Message(format!("invalid key template {template:?}: {reason}")).into()
}
