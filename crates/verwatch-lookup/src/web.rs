//! `url` lookups: query an HTTP endpoint for the deployed version

use std::any::Any;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::Instrument;
use verwatch_core::secret::is_secret_placeholder;
use verwatch_core::{LookupDefaults, SECRET_VALUE, SecretRef, expand_env_vars};

use crate::binding::Binding;
use crate::error::{LookupError, Result};
use crate::extract::{extract_version, parse_json_path};
use crate::http::{self, FetchRequest};
use crate::lookup::{DeployedVersionLookup, LookupType, record_query, tagged_value};
use crate::patch::{apply_option, apply_string, nullable};
use crate::reconcile::handle_new_version;

const SUPPORTED_METHODS: [&str; 2] = ["GET", "POST"];

/// Basic auth credentials for the request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicAuth {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// A request header
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub value: String,
}

impl Header {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Finds the deployed version by querying a URL
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebLookup {
    /// HTTP method (GET or POST)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub method: String,

    /// URL to query (`${VAR}` is expanded)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,

    /// Accept invalid HTTPS certificates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_invalid_certs: Option<bool>,

    /// Response header holding the version (the body is ignored)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub target_header: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basic_auth: Option<BasicAuth>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<Header>,

    /// Request body (POST only)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub body: String,

    /// JSON path to the version, e.g. `data.versions[0].name`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub json: String,

    /// Regex applied to the extracted text
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub regex: String,

    /// Template for the regex match (`$1`, `$2`...)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub regex_template: String,

    #[serde(skip)]
    binding: Binding,
}

/// Partial update of a [`WebLookup`]
#[derive(Debug, Default, Deserialize)]
pub struct WebLookupOverrides {
    #[serde(default, deserialize_with = "nullable")]
    pub method: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub url: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub allow_invalid_certs: Option<Option<bool>>,
    #[serde(default, deserialize_with = "nullable")]
    pub target_header: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub basic_auth: Option<Option<BasicAuthOverrides>>,
    #[serde(default, deserialize_with = "nullable")]
    pub headers: Option<Option<Vec<Header>>>,
    #[serde(default, deserialize_with = "nullable")]
    pub body: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub json: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub regex: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub regex_template: Option<Option<String>>,
}

/// Basic auth keys to change (absent keys keep their value)
#[derive(Debug, Default, Deserialize)]
pub struct BasicAuthOverrides {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl BasicAuthOverrides {
    fn merge(self, previous: Option<&BasicAuth>) -> BasicAuth {
        let previous = previous.cloned().unwrap_or_default();
        BasicAuth {
            username: self.username.unwrap_or(previous.username),
            password: self.password.unwrap_or(previous.password),
        }
    }
}

impl WebLookup {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Resolved HTTP method
    pub fn method(&self) -> &str {
        LookupDefaults::resolve_method(
            &self.method,
            &self.binding.defaults,
            &self.binding.hard_defaults,
        )
    }

    /// Resolved `allow_invalid_certs`
    pub fn allow_invalid_certs(&self) -> bool {
        LookupDefaults::resolve_allow_invalid_certs(
            self.allow_invalid_certs,
            &self.binding.defaults,
            &self.binding.hard_defaults,
        )
    }

    /// URL with environment variables expanded
    pub fn url(&self) -> String {
        expand_env_vars(&self.url)
    }

    /// Merge an overrides patch into this lookup
    pub fn apply(&mut self, overrides: WebLookupOverrides) {
        apply_string(&mut self.method, overrides.method);
        apply_string(&mut self.url, overrides.url);
        apply_option(&mut self.allow_invalid_certs, overrides.allow_invalid_certs);
        apply_string(&mut self.target_header, overrides.target_header);
        if let Some(basic_auth) = overrides.basic_auth {
            self.basic_auth = basic_auth.map(|patch| patch.merge(self.basic_auth.as_ref()));
        }
        if let Some(headers) = overrides.headers {
            self.headers = headers.unwrap_or_default();
        }
        apply_string(&mut self.body, overrides.body);
        apply_string(&mut self.json, overrides.json);
        apply_string(&mut self.regex, overrides.regex);
        apply_string(&mut self.regex_template, overrides.regex_template);
    }

    fn fetch_request(&self) -> FetchRequest {
        let method = self.method().to_uppercase();
        let body = (method == "POST" && !self.body.is_empty()).then(|| self.body.clone());
        FetchRequest {
            method,
            url: self.url(),
            headers: self
                .headers
                .iter()
                .map(|h| (expand_env_vars(&h.key), expand_env_vars(&h.value)))
                .collect(),
            basic_auth: self.basic_auth.as_ref().map(|auth| {
                (
                    expand_env_vars(&auth.username),
                    expand_env_vars(&auth.password),
                )
            }),
            body,
            allow_invalid_certs: self.allow_invalid_certs(),
            target_header: Some(self.target_header.clone()).filter(|h| !h.is_empty()),
        }
    }

    /// Fetch and extract the version (no status changes)
    pub async fn fetch_version(&self) -> Result<String> {
        let request = self.fetch_request();
        let raw = http::fetch(&request).await?;
        let version = extract_version(
            &raw,
            &self.json,
            &self.regex,
            &self.regex_template,
            &request.url,
        )?;

        let options = &self.binding.options;
        if options.semantic_versioning() {
            options.verify_semantic_versioning(&version)?;
        }
        Ok(version)
    }

    async fn query_and_reconcile(&self, write_to_db: bool) -> Result<()> {
        let version = self.fetch_version().await.inspect_err(|e| e.log())?;

        if version != self.binding.status.deployed_version() {
            handle_new_version(&self.binding, &version, None, write_to_db);
        }
        Ok(())
    }
}

#[async_trait]
impl DeployedVersionLookup for WebLookup {
    fn lookup_type(&self) -> LookupType {
        LookupType::Url
    }

    fn binding(&self) -> &Binding {
        &self.binding
    }

    fn init(&mut self, binding: Binding) {
        self.binding = binding;
    }

    fn check_values(&mut self, prefix: &str) -> Result<()> {
        let mut errors = Vec::new();

        self.method = self.method.to_uppercase();
        let method = self.method().to_uppercase();
        if !SUPPORTED_METHODS.contains(&method.as_str()) {
            errors.push(format!(
                "{}method: {:?} <invalid> (only {} allowed)",
                prefix,
                method,
                SUPPORTED_METHODS.join(", ")
            ));
        }

        if self.url.is_empty() {
            errors.push(format!("{}url: <required>", prefix));
        }

        if !self.json.is_empty() {
            if let Err(e) = parse_json_path(&self.json) {
                errors.push(format!("{}json: {:?} <invalid> ({})", prefix, self.json, e));
            }
        }

        if !self.regex.is_empty() {
            if let Err(e) = Regex::new(&self.regex) {
                errors.push(format!("{}regex: {:?} <invalid> ({})", prefix, self.regex, e));
            }
        }

        if method == "GET" {
            self.body.clear();
        }
        if self.regex.is_empty() {
            self.regex_template.clear();
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(LookupError::invalid_config(errors.join("\n")))
        }
    }

    async fn query(&self, metrics: bool) -> Result<()> {
        let result = self
            .query_and_reconcile(metrics)
            .instrument(self.binding.span.clone())
            .await;

        if metrics {
            record_query(&self.binding, LookupType::Url, result.is_ok());
        }
        result
    }

    async fn track(&self) {
        let status = &self.binding.status;
        loop {
            if status.deleting() {
                return;
            }

            // Failures are logged by the query.
            let _ = self.query(true).await;

            tokio::time::sleep(self.binding.options.interval_duration()).await;
        }
    }

    fn inherit_secrets(&mut self, other: &dyn DeployedVersionLookup, refs: &SecretRef) {
        let Some(other) = other.as_any().downcast_ref::<WebLookup>() else {
            return;
        };

        if let (Some(auth), Some(other_auth)) = (self.basic_auth.as_mut(), other.basic_auth.as_ref()) {
            if is_secret_placeholder(&auth.password) {
                auth.password = other_auth.password.clone();
            }
        }

        if other.headers.is_empty() {
            return;
        }
        for (i, header) in self.headers.iter_mut().enumerate() {
            if !is_secret_placeholder(&header.value) {
                continue;
            }
            if i >= refs.headers.len() {
                break;
            }
            if let Some(previous) = refs.header_old_index(i).and_then(|old| other.headers.get(old)) {
                header.value = previous.value.clone();
            }
        }
    }

    fn apply_overrides(&mut self, overrides: &str) -> Result<()> {
        let overrides: WebLookupOverrides = serde_json::from_str(overrides).map_err(|e| {
            LookupError::invalid_config(format!("failed to parse url overrides: {}", e))
        })?;
        self.apply(overrides);
        Ok(())
    }

    fn boxed_clone(&self) -> Box<dyn DeployedVersionLookup> {
        Box::new(self.clone())
    }

    fn to_value(&self) -> serde_json::Value {
        tagged_value(
            serde_json::to_value(self).unwrap_or_default(),
            LookupType::Url,
        )
    }

    fn redacted(&self) -> serde_json::Value {
        let mut copy = self.clone();
        if let Some(auth) = copy.basic_auth.as_mut() {
            auth.password = SECRET_VALUE.to_string();
        }
        for header in &mut copy.headers {
            header.value = SECRET_VALUE.to_string();
        }
        copy.to_value()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use verwatch_core::HeaderSecretRef;

    fn lookup(yaml: &str) -> WebLookup {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_decode_yaml() {
        let l = lookup(
            r#"
type: url
method: post
url: https://example.com/version
allow_invalid_certs: true
basic_auth:
  username: user
  password: pass
headers:
  - key: X-Token
    value: abc
body: '{"q": 1}'
json: data.version
regex: v([0-9.]+)
regex_template: $1
"#,
        );
        assert_eq!(l.method, "post");
        assert_eq!(l.allow_invalid_certs, Some(true));
        assert_eq!(l.basic_auth.as_ref().unwrap().password, "pass");
        assert_eq!(l.headers, vec![Header::new("X-Token", "abc")]);
        assert_eq!(l.json, "data.version");
    }

    #[test]
    fn test_check_values_valid() {
        let mut l = lookup("method: gEt\nurl: https://example.com\nbody: foo\n");
        l.check_values("").unwrap();
        assert_eq!(l.method, "GET");
        assert_eq!(l.body, "", "body is dropped for GET");
    }

    #[test]
    fn test_check_values_defaults_method() {
        let mut l = lookup("url: https://example.com\n");
        l.check_values("").unwrap();
        assert_eq!(l.method, "");
        assert_eq!(l.fetch_request().method, "GET");

        let mut l = lookup("url: https://example.com\nbody: foo\n");
        l.init(Binding {
            defaults: Arc::new(LookupDefaults {
                method: Some("post".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        });
        l.check_values("").unwrap();
        assert_eq!(l.method, "", "the service default is not copied in");
        assert_eq!(l.body, "foo");
        assert_eq!(l.fetch_request().method, "POST");
        assert!(l.to_value().get("method").is_none());
    }

    #[test]
    fn test_method_follows_default_changes() {
        let mut l = lookup("url: https://example.com\n");
        l.check_values("").unwrap();

        l.init(Binding {
            defaults: Arc::new(LookupDefaults {
                method: Some("POST".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        });
        assert_eq!(l.fetch_request().method, "POST");
    }

    #[test]
    fn test_check_values_invalid_default_method() {
        let mut l = lookup("url: https://example.com\n");
        l.init(Binding {
            defaults: Arc::new(LookupDefaults {
                method: Some("put".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        });
        let err = l.check_values("").unwrap_err();
        assert!(err.to_string().starts_with("method: \"PUT\" <invalid>"));
    }

    #[test]
    fn test_check_values_keeps_post_body() {
        let mut l = lookup("method: POST\nurl: https://example.com\nbody: foo\n");
        l.check_values("").unwrap();
        assert_eq!(l.body, "foo");
    }

    #[test]
    fn test_check_values_clears_orphan_template() {
        let mut l = lookup("url: https://example.com\nregex_template: $1.$2\n");
        l.check_values("").unwrap();
        assert_eq!(l.regex_template, "");
    }

    #[test]
    fn test_check_values_all_errors() {
        let mut l = lookup("method: asd\nurl: ''\njson: 'foo[bar]'\nregex: '[0-'\n");
        let err = l.check_values("  ").unwrap_err();
        assert!(err.is_config_error());

        let message = err.to_string();
        let lines: Vec<&str> = message.lines().collect();
        assert_eq!(lines.len(), 4, "{}", message);
        assert!(lines[0].starts_with("  method: \"ASD\" <invalid>"));
        assert_eq!(lines[1], "  url: <required>");
        assert!(lines[2].starts_with("  json: \"foo[bar]\" <invalid>"));
        assert!(lines[3].starts_with("  regex: \"[0-\" <invalid>"));
    }

    #[test]
    fn test_fetch_request() {
        // SAFETY: test-only variable, not read concurrently
        unsafe { std::env::set_var("VERWATCH_TEST_WEB_TOKEN", "s3cret") };

        let mut l = lookup(
            r#"
url: https://example.com/${VERWATCH_TEST_WEB_TOKEN}
headers:
  - key: Authorization
    value: Bearer ${VERWATCH_TEST_WEB_TOKEN}
basic_auth:
  username: ${VERWATCH_TEST_WEB_UNSET}
  password: ${VERWATCH_TEST_WEB_TOKEN}
body: ignored
"#,
        );
        l.check_values("").unwrap();
        let request = l.fetch_request();

        assert_eq!(request.method, "GET");
        assert_eq!(request.url, "https://example.com/s3cret");
        assert_eq!(
            request.headers,
            vec![("Authorization".to_string(), "Bearer s3cret".to_string())]
        );
        assert_eq!(
            request.basic_auth,
            Some((
                "${VERWATCH_TEST_WEB_UNSET}".to_string(),
                "s3cret".to_string()
            ))
        );
        assert_eq!(request.body, None);
        assert!(!request.allow_invalid_certs);
        assert_eq!(request.target_header, None);
    }

    #[test]
    fn test_apply_overrides() {
        let mut l = lookup(
            r#"
url: https://example.com
allow_invalid_certs: true
basic_auth:
  username: user
  password: pass
headers:
  - key: A
    value: "1"
json: version
regex: ([0-9.]+)
"#,
        );

        l.apply_overrides(
            r#"{
                "url": "https://other.example.com",
                "allow_invalid_certs": null,
                "basic_auth": {"username": "admin"},
                "headers": [{"key": "B", "value": "2"}],
                "regex": null
            }"#,
        )
        .unwrap();

        assert_eq!(l.url, "https://other.example.com");
        assert_eq!(l.allow_invalid_certs, None);
        assert_eq!(
            l.basic_auth,
            Some(BasicAuth {
                username: "admin".to_string(),
                password: "pass".to_string(),
            })
        );
        assert_eq!(l.headers, vec![Header::new("B", "2")]);
        assert_eq!(l.json, "version", "absent keys are kept");
        assert_eq!(l.regex, "");
    }

    #[test]
    fn test_apply_overrides_invalid() {
        let mut l = WebLookup::new("https://example.com");
        let err = l.apply_overrides(r#"{"headers": "nope"}"#).unwrap_err();
        assert!(err.to_string().starts_with("failed to parse url overrides"));
    }

    #[test]
    fn test_redacted() {
        let l = lookup(
            r#"
url: https://example.com
basic_auth:
  username: user
  password: pass
headers:
  - key: A
    value: "1"
"#,
        );

        let value = l.redacted();
        assert_eq!(value["type"], "url");
        assert_eq!(value["basic_auth"]["username"], "user");
        assert_eq!(value["basic_auth"]["password"], SECRET_VALUE);
        assert_eq!(value["headers"][0]["key"], "A");
        assert_eq!(value["headers"][0]["value"], SECRET_VALUE);

        // The lookup itself is untouched
        assert_eq!(l.to_value()["basic_auth"]["password"], "pass");
    }

    #[test]
    fn test_inherit_secrets() {
        let old = lookup(
            r#"
url: https://example.com
basic_auth:
  username: user
  password: pass
headers:
  - key: A
    value: a-secret
  - key: B
    value: b-secret
"#,
        );
        let mut new = lookup(&format!(
            r#"
url: https://example.com
basic_auth:
  username: user
  password: "{secret}"
headers:
  - key: B
    value: "{secret}"
  - key: C
    value: "{secret}"
  - key: D
    value: "{secret}"
  - key: E
    value: plain
"#,
            secret = SECRET_VALUE
        ));
        let refs = SecretRef {
            headers: vec![
                HeaderSecretRef::new(Some(1)),
                HeaderSecretRef::new(None),
                HeaderSecretRef::new(Some(7)),
            ],
        };

        new.inherit_secrets(&old, &refs);

        assert_eq!(new.basic_auth.unwrap().password, "pass");
        assert_eq!(new.headers[0].value, "b-secret");
        assert_eq!(new.headers[1].value, SECRET_VALUE, "no old index");
        assert_eq!(new.headers[2].value, SECRET_VALUE, "old index out of range");
        assert_eq!(new.headers[3].value, "plain");
    }

    #[test]
    fn test_inherit_secrets_other_type() {
        let mut l = lookup(&format!(
            "url: https://example.com\nbasic_auth:\n  username: u\n  password: \"{}\"\n",
            SECRET_VALUE
        ));
        let manual = crate::manual::ManualLookup::default();

        l.inherit_secrets(&manual, &SecretRef::default());

        assert_eq!(l.basic_auth.unwrap().password, SECRET_VALUE);
    }
}
