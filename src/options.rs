use crate::dlive;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
#[serde(deny_unknown_fields)]
pub struct Options {
    pub features: Features,
    pub exec: Exec,
    pub net: Net,
    pub auth: Auth,
    pub gateway: Gateway,
    pub listen: Listen,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
#[serde(deny_unknown_fields)]
pub struct Features {
    pub listener: bool,
    pub seed_default_commands: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
#[serde(deny_unknown_fields)]
pub struct Exec {
    pub debug: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
#[serde(deny_unknown_fields)]
pub struct Net {
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub reconnect_delay_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
#[serde(deny_unknown_fields)]
pub struct Auth {
    pub authorize_url: String,
    pub token_url: String,
    pub scopes: Vec<String>,
}

/// The payload shape is a configuration point: observed deployments differ
/// on the role/subscribing argument names and on whether the Authorization
/// header wants a scheme prefix.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
#[serde(deny_unknown_fields)]
pub struct Gateway {
    pub endpoint: String,
    pub auth_scheme: String,
    pub role_field: String,
    pub subscribing_field: String,
    pub default_role: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
#[serde(deny_unknown_fields)]
pub struct Listen {
    pub endpoint: String,
}

impl Options {
    pub fn read<P: AsRef<std::path::Path>>(
        path: P,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        Ok(toml::from_str(&std::fs::read_to_string(path)?)?)
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.net.request_timeout_secs)
    }
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.net.connect_timeout_secs)
    }
    #[must_use]
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.net.reconnect_delay_secs)
    }
}

impl Default for Options {
    fn default() -> Self {
        Self {
            features: Features::default(),
            exec: Exec::default(),
            net: Net::default(),
            auth: Auth::default(),
            gateway: Gateway::default(),
            listen: Listen::default(),
        }
    }
}
impl Default for Features {
    fn default() -> Self {
        Self {
            listener: true,
            seed_default_commands: true,
        }
    }
}
impl Default for Exec {
    fn default() -> Self {
        Self { debug: false }
    }
}
impl Default for Net {
    fn default() -> Self {
        Self {
            request_timeout_secs: 12,
            connect_timeout_secs: 15,
            reconnect_delay_secs: 3,
        }
    }
}
impl Default for Auth {
    fn default() -> Self {
        Self {
            authorize_url: String::from(dlive::AUTHORIZE_URL),
            token_url: String::from(dlive::TOKEN_URL),
            scopes: dlive::OAUTH_SCOPES.iter().map(|s| String::from(*s)).collect(),
        }
    }
}
impl Default for Gateway {
    fn default() -> Self {
        Self {
            endpoint: String::from(dlive::GRAPHQL_URL),
            auth_scheme: String::new(),
            role_field: String::from("roomRole"),
            subscribing_field: String::from("subscribing"),
            default_role: String::from("Member"),
        }
    }
}
impl Default for Listen {
    fn default() -> Self {
        Self {
            endpoint: String::from(dlive::SUBSCRIPTION_URL),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_all_defaults() {
        let options: Options = toml::from_str("").unwrap();
        assert!(options.features.listener);
        assert_eq!(options.net.reconnect_delay_secs, 3);
        assert_eq!(options.gateway.role_field, "roomRole");
    }

    #[test]
    fn sections_override_independently() {
        let options: Options = toml::from_str(
            "[gateway]\nauth_scheme = \"Bearer\"\n\n[net]\nreconnect_delay_secs = 5\n",
        )
        .unwrap();
        assert_eq!(options.gateway.auth_scheme, "Bearer");
        assert_eq!(options.reconnect_delay(), Duration::from_secs(5));
        assert!(options.features.seed_default_commands);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(toml::from_str::<Options>("[exec]\ndebgu = true\n").is_err());
    }
}
