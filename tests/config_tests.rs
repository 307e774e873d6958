#[cfg(test)]
mod tests {
    use docflow::config::app::*;
    use docflow::error::DocFlowError;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    // Helper to create a temporary config file with given content
    fn create_temp_config_file(content: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
        writeln!(temp_file, "{}", content).expect("Failed to write to temp file");
        temp_file
    }

    #[test]
    fn test_load_valid_config() {
        let yaml_content = r#"
server:
  bind_addr: "0.0.0.0:8080"
storage:
  bucket: "scans"
pipeline:
  degrade_on_step_failure: true
providers:
  mistral:
    api_key: "from-file"
    temperature: 0.2
  email:
    service: "sendgrid"
classifications:
  - name: Contract
    auto_assign_department: Legal
  - name: Other
        "#;
        let temp_file = create_temp_config_file(yaml_content);
        let config_result = load_app_config(temp_file.path());

        assert!(
            config_result.is_ok(),
            "Should load valid config: {:?}",
            config_result.err()
        );
        let config = config_result.unwrap();
        assert_eq!(config.server.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.server.body_limit_bytes, 25 * 1024 * 1024);
        assert_eq!(config.storage.bucket, "scans");
        assert!(config.pipeline.degrade_on_step_failure);
        assert_eq!(config.pipeline.ocr_confidence, 0.95);
        assert_eq!(config.providers.mistral.api_key.as_deref(), Some("from-file"));
        assert_eq!(config.providers.mistral.temperature, 0.2);
        assert_eq!(config.providers.mistral.model, "mistral-small-latest");
        assert_eq!(config.providers.email.service.as_deref(), Some("sendgrid"));
        assert_eq!(config.classifications.0.len(), 2);
        assert_eq!(
            config.classifications.0[0].auto_assign_department.as_deref(),
            Some("Legal")
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let temp_file = create_temp_config_file("");
        let config = load_app_config(temp_file.path()).unwrap();
        assert_eq!(config.server.bind_addr, "127.0.0.1:3000");
        assert!(!config.pipeline.degrade_on_step_failure);
        assert!(config.providers.vision.api_key.is_none());
        let names: Vec<&str> = config
            .classifications
            .0
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(
            names,
            vec!["Contract", "Invoice", "Report", "Form", "Certificate", "Medical", "Other"]
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_shipped_config_is_valid() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/docflow.yaml");
        let config = load_app_config(path).expect("shipped config should parse");
        assert!(config.validate().is_ok());
        assert_eq!(config.classifications, ClassificationSeeds::default());
    }

    #[test]
    fn test_load_non_existent_file() {
        let result = load_app_config("non_existent_config_file.yaml");
        assert!(result.is_err());
        match result.err().unwrap() {
            DocFlowError::ConfigError(msg) => {
                assert!(msg.contains("Failed to read config file"));
                assert!(msg.contains("non_existent_config_file.yaml"));
            }
            e => panic!("Expected ConfigError, got {:?}", e),
        }
    }

    #[test]
    fn test_load_malformed_yaml() {
        let temp_file = create_temp_config_file("server: [unclosed");
        match load_app_config(temp_file.path()).err().unwrap() {
            DocFlowError::ConfigError(msg) => {
                assert!(msg.contains("Failed to parse config YAML"));
            }
            e => panic!("Expected ConfigError, got {:?}", e),
        }
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let bad_bind = parse_app_config("server:\n  bind_addr: \"not an address\"").unwrap();
        assert!(matches!(
            bad_bind.validate(),
            Err(DocFlowError::ConfigValidationError(_))
        ));

        let bad_confidence = parse_app_config("pipeline:\n  ocr_confidence: 1.5").unwrap();
        assert!(bad_confidence.validate().is_err());

        let bad_url = parse_app_config("storage:\n  public_base_url: \"ftp://files\"").unwrap();
        assert!(bad_url.validate().is_err());

        let duplicate = parse_app_config("classifications:\n  - name: Invoice\n  - name: Invoice").unwrap();
        match duplicate.validate() {
            Err(DocFlowError::ConfigValidationError(msg)) => {
                assert!(msg.contains("duplicate name 'Invoice'"))
            }
            other => panic!("Expected ConfigValidationError, got {:?}", other),
        }
    }

    #[test]
    fn test_env_overrides_fill_credentials() {
        let mut config = parse_app_config("providers:\n  mistral:\n    api_key: \"from-file\"").unwrap();
        let env: HashMap<&str, &str> = HashMap::from([
            ("GOOGLE_CLOUD_VISION_API_KEY", "vision-key"),
            ("MISTRAL_API_KEY", "mistral-key"),
            ("EMAIL_API_KEY", "mail-key"),
            ("EMAIL_SERVICE", "sendgrid"),
            ("WHATSAPP_BUSINESS_API_KEY", "wa-key"),
            ("WHATSAPP_BUSINESS_NUMBER", "15550001111"),
            ("MICROSOFT_GRAPH_API_KEY", ""),
        ]);
        config.apply_overrides_from(|key| env.get(key).map(|v| v.to_string()));

        let providers = &config.providers;
        assert_eq!(providers.vision.api_key.as_deref(), Some("vision-key"));
        assert_eq!(providers.mistral.api_key.as_deref(), Some("mistral-key"));
        assert_eq!(providers.email.api_key.as_deref(), Some("mail-key"));
        assert_eq!(providers.email.service.as_deref(), Some("sendgrid"));
        assert_eq!(providers.whatsapp.api_key.as_deref(), Some("wa-key"));
        assert_eq!(providers.whatsapp.business_number.as_deref(), Some("15550001111"));
        // empty values never clobber
        assert!(providers.microsoft_graph.api_key.is_none());
    }

    #[test]
    fn test_blank_credentials_count_as_absent() {
        let yaml_content = r#"
providers:
  vision:
    api_key: ""
  mistral:
    api_key: "   "
  whatsapp:
    api_key: "wa-key"
    business_number: ""
"#;
        let config = parse_app_config(yaml_content).unwrap();
        assert!(config.providers.vision.api_key.is_none());
        assert!(config.providers.mistral.api_key.is_none());
        assert_eq!(config.providers.whatsapp.api_key.as_deref(), Some("wa-key"));
        assert!(config.providers.whatsapp.business_number.is_none());

        let ocr = docflow::providers::build_ocr_provider(&config, reqwest::Client::new());
        assert_eq!(ocr.name(), "mock");
    }
}
