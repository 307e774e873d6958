use crate::error::{DocFlowError, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Represents the overall service configuration read from YAML.
///
/// Every section has defaults, so an empty file (or no file at all) yields a
/// runnable configuration in which all integrations fall back to their mock
/// behaviour.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub pipeline: PipelineConfig,
    pub providers: ProvidersConfig,
    pub classifications: ClassificationSeeds,
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        self.server.validate()?;
        self.storage.validate()?;
        self.pipeline.validate()?;
        self.providers.validate()?;
        self.classifications.validate()?;
        Ok(())
    }

    /// Overlays credentials from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Overlays credentials using `lookup`. Empty values are ignored.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("GOOGLE_CLOUD_VISION_API_KEY") {
            self.providers.vision.api_key = Some(v);
        }
        if let Some(v) = get("MISTRAL_API_KEY") {
            self.providers.mistral.api_key = Some(v);
        }
        if let Some(v) = get("EMAIL_API_KEY") {
            self.providers.email.api_key = Some(v);
        }
        if let Some(v) = get("EMAIL_SERVICE") {
            self.providers.email.service = Some(v);
        }
        if let Some(v) = get("WHATSAPP_BUSINESS_API_KEY") {
            self.providers.whatsapp.api_key = Some(v);
        }
        if let Some(v) = get("WHATSAPP_BUSINESS_NUMBER") {
            self.providers.whatsapp.business_number = Some(v);
        }
        if let Some(v) = get("MICROSOFT_GRAPH_API_KEY") {
            self.providers.microsoft_graph.api_key = Some(v);
        }
        self.clear_blank_credentials();
    }

    /// Blank credentials count as absent, so the integration falls back to
    /// its mock instead of calling the provider with an empty key.
    pub fn clear_blank_credentials(&mut self) {
        let providers = &mut self.providers;
        for value in [
            &mut providers.vision.api_key,
            &mut providers.mistral.api_key,
            &mut providers.email.api_key,
            &mut providers.email.service,
            &mut providers.whatsapp.api_key,
            &mut providers.whatsapp.business_number,
            &mut providers.microsoft_graph.api_key,
        ] {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                *value = None;
            }
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub body_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_addr: "127.0.0.1:3000".to_string(),
            body_limit_bytes: 25 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.bind_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(DocFlowError::ConfigValidationError(format!(
                "server.bind_addr is not a socket address: '{}'",
                self.bind_addr
            )));
        }
        if self.body_limit_bytes == 0 {
            return Err(DocFlowError::ConfigValidationError(
                "server.body_limit_bytes must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct StorageConfig {
    /// Bucket name used for uploaded blobs.
    pub bucket: String,
    /// Base URL under which stored objects are publicly resolvable.
    pub public_base_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            bucket: "documents".to_string(),
            public_base_url: "http://127.0.0.1:3000/storage/v1/object/public".to_string(),
        }
    }
}

impl StorageConfig {
    pub fn validate(&self) -> Result<()> {
        if self.bucket.trim().is_empty() {
            return Err(DocFlowError::ConfigValidationError(
                "storage.bucket must not be empty".to_string(),
            ));
        }
        if !(self.public_base_url.starts_with("http://")
            || self.public_base_url.starts_with("https://"))
        {
            return Err(DocFlowError::ConfigValidationError(format!(
                "storage.public_base_url must be an http(s) URL, got '{}'",
                self.public_base_url
            )));
        }
        Ok(())
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct PipelineConfig {
    /// Finish runs with a failed step at `degraded` instead of `completed`.
    pub degrade_on_step_failure: bool,
    /// Confidence reported for recognised text.
    pub ocr_confidence: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            degrade_on_step_failure: false,
            ocr_confidence: 0.95,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.ocr_confidence) {
            return Err(DocFlowError::ConfigValidationError(format!(
                "pipeline.ocr_confidence must be between 0.0 and 1.0, got {}",
                self.ocr_confidence
            )));
        }
        Ok(())
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ProvidersConfig {
    pub request_timeout_secs: u64,
    pub vision: VisionConfig,
    pub mistral: MistralConfig,
    pub email: EmailConfig,
    pub whatsapp: WhatsAppConfig,
    pub microsoft_graph: GraphConfig,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            request_timeout_secs: 30,
            vision: VisionConfig::default(),
            mistral: MistralConfig::default(),
            email: EmailConfig::default(),
            whatsapp: WhatsAppConfig::default(),
            microsoft_graph: GraphConfig::default(),
        }
    }
}

impl ProvidersConfig {
    pub fn validate(&self) -> Result<()> {
        if self.request_timeout_secs == 0 {
            return Err(DocFlowError::ConfigValidationError(
                "providers.request_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.mistral.temperature) {
            return Err(DocFlowError::ConfigValidationError(format!(
                "providers.mistral.temperature must be between 0.0 and 2.0, got {}",
                self.mistral.temperature
            )));
        }
        if self.mistral.max_tokens == 0 {
            return Err(DocFlowError::ConfigValidationError(
                "providers.mistral.max_tokens must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct VisionConfig {
    pub api_key: Option<String>,
    pub endpoint: String,
}

impl Default for VisionConfig {
    fn default() -> Self {
        VisionConfig {
            api_key: None,
            endpoint: "https://vision.googleapis.com/v1/images:annotate".to_string(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct MistralConfig {
    pub api_key: Option<String>,
    pub endpoint: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl Default for MistralConfig {
    fn default() -> Self {
        MistralConfig {
            api_key: None,
            endpoint: "https://api.mistral.ai/v1/chat/completions".to_string(),
            model: "mistral-small-latest".to_string(),
            temperature: 0.7,
            max_tokens: 1000,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct EmailConfig {
    pub api_key: Option<String>,
    /// `sendgrid` relays through SendGrid; any other value logs a mock send.
    pub service: Option<String>,
    pub endpoint: String,
    pub from_address: String,
    pub from_name: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        EmailConfig {
            api_key: None,
            service: None,
            endpoint: "https://api.sendgrid.com/v3/mail/send".to_string(),
            from_address: "notifications@docflowpro.com".to_string(),
            from_name: "DocFlow Pro".to_string(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct WhatsAppConfig {
    pub api_key: Option<String>,
    pub business_number: Option<String>,
    pub graph_base_url: String,
    pub template_name: String,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        WhatsAppConfig {
            api_key: None,
            business_number: None,
            graph_base_url: "https://graph.facebook.com/v18.0".to_string(),
            template_name: "notification_template".to_string(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct GraphConfig {
    pub api_key: Option<String>,
}

/// One seeded classification reference row.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ClassificationSeed {
    pub name: String,
    #[serde(default)]
    pub auto_assign_department: Option<String>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(transparent)]
pub struct ClassificationSeeds(pub Vec<ClassificationSeed>);

impl Default for ClassificationSeeds {
    fn default() -> Self {
        let seed = |name: &str, department: Option<&str>| ClassificationSeed {
            name: name.to_string(),
            auto_assign_department: department.map(str::to_string),
        };
        ClassificationSeeds(vec![
            seed("Contract", Some("Legal")),
            seed("Invoice", Some("Finance")),
            seed("Report", None),
            seed("Form", None),
            seed("Certificate", None),
            seed("Medical", Some("Healthcare")),
            seed("Other", None),
        ])
    }
}

impl ClassificationSeeds {
    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for seed in &self.0 {
            if seed.name.trim().is_empty() {
                return Err(DocFlowError::ConfigValidationError(
                    "classifications: name must not be empty".to_string(),
                ));
            }
            if !seen.insert(seed.name.as_str()) {
                return Err(DocFlowError::ConfigValidationError(format!(
                    "classifications: duplicate name '{}'",
                    seed.name
                )));
            }
        }
        Ok(())
    }
}

/// Loads and parses the service configuration YAML file.
pub fn load_app_config<P: AsRef<Path>>(config_path: P) -> Result<AppConfig> {
    let path_ref = config_path.as_ref();
    let config_content = fs::read_to_string(path_ref).map_err(|e| {
        DocFlowError::ConfigError(format!(
            "Failed to read config file '{}': {}",
            path_ref.display(),
            e
        ))
    })?;

    parse_app_config(&config_content).map_err(|e| match e {
        DocFlowError::ConfigError(msg) => DocFlowError::ConfigError(format!(
            "{} (in '{}')",
            msg,
            path_ref.display()
        )),
        other => other,
    })
}

pub fn parse_app_config(content: &str) -> Result<AppConfig> {
    if content.trim().is_empty() {
        return Ok(AppConfig::default());
    }
    let mut config: AppConfig = serde_yaml::from_str(content)
        .map_err(|e| DocFlowError::ConfigError(format!("Failed to parse config YAML: {}", e)))?;
    config.clear_blank_credentials();
    Ok(config)
}
